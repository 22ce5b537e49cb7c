//! # lexmacro
//!
//! A lexical macro layer for a Lua-style scripting language. It sits between a chunk's
//! characters and the tokenizer and substitutes macro names as characters are pulled:
//!
//! ```lua
//! macro PI "3.14159"
//! macro SQUARE (x) return "((" .. x .. ")*(" .. x .. "))" end
//! readermacro QUOTE (advance, peek, word) return "'" .. word() .. "'" end
//! ```
//!
//! ## Module Structure
//!
//! - **`source`**: the character source with its one-character pushback
//! - **`syntax`**: the host tokenizer, fed through [`syntax::CharFeed`]
//! - **`macros`**: registry, expansion automaton, invocation engine and form parser
//! - **`runtime`**: the [`runtime::Host`] seam and the bundled script interpreter
//! - **`atoms`**: builtins available to macro bodies
//! - **`session`**: [`Session`], the entry point
//! - **`cli`**: the `lexmacro` command line

pub mod atoms;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod macros;
pub mod runtime;
pub mod session;
pub mod source;
pub mod syntax;

pub use crate::config::Limits;
pub use crate::diagnostics::{BufferKind, ErrorContext, ErrorType, MacroError};
pub use crate::macros::{ExpansionStep, MacroDefinition, MacroKind, Registry};
pub use crate::runtime::{Host, ScriptHost};
pub use crate::session::{MacroLexer, Session};
pub use crate::source::Span;
pub use crate::syntax::Token;
