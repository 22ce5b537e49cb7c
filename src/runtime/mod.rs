//! # Host Runtime
//!
//! The macro layer compiles and calls macro bodies through the [`Host`] trait and never
//! looks inside the callables it gets back. [`ScriptHost`] is the bundled implementation:
//! a small interpreter for the part of the scripting language macro bodies are written in.
//!
//! ## Module Structure
//!
//! - **`ast`**: syntax tree of compiled bodies
//! - **`parser`**: recursive-descent parser over plain tokens
//! - **`value`**: runtime values and tables
//! - **`eval`**: the evaluator
//! - **`host`**: [`ScriptHost`], the [`Host`] implementation

use serde::Serialize;

use crate::{err_msg, MacroError};

pub mod ast;
pub mod eval;
pub mod host;
pub mod parser;
pub mod value;

pub use host::ScriptHost;
pub use value::Value;

/// Opaque handle to a compiled macro body owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CallableId(pub usize);

/// What a macro body returned, as far as the expansion engine cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Str(String),
    /// Any other value, named by its type.
    Other(&'static str),
}

impl HostValue {
    /// The expansion text, or the error for a body that did not produce a string.
    pub fn into_expansion(self) -> Result<String, MacroError> {
        match self {
            HostValue::Str(text) => Ok(text),
            HostValue::Other(type_name) => Err(err_msg!(Invocation, "macro expansion must return a string")
                .with_help(format!("the macro body returned a {} value", type_name))),
        }
    }
}

/// The raw-stream primitives granted to a reader macro. Characters seen through this
/// interface are never macro-expanded.
pub trait ReaderStream {
    /// Consumes and returns the pending character.
    fn advance(&mut self) -> Result<char, MacroError>;

    /// The pending character, `None` at end of stream.
    fn peek(&self) -> Option<char>;

    /// Skips whitespace, then consumes `delimiter` if it is next. Otherwise it consumes
    /// one run: an identifier, a run of digits, or a run of ASCII punctuation that stops
    /// before `delimiter`. Any other character is read alone. Returns `None` at end of
    /// stream.
    fn word(&mut self, delimiter: Option<char>) -> Result<Option<String>, MacroError>;
}

/// The runtime that compiles and runs macro bodies.
pub trait Host {
    /// Compiles `source` (a chunk that returns a function) under the chunk name `chunk`.
    fn compile(&mut self, source: &str, chunk: &str) -> Result<CallableId, MacroError>;

    /// Calls a function macro with its raw argument texts.
    fn call(&mut self, id: CallableId, args: &[String]) -> Result<HostValue, MacroError>;

    /// Calls a reader macro with the three stream capabilities.
    fn call_reader(&mut self, id: CallableId, stream: &mut dyn ReaderStream) -> Result<HostValue, MacroError>;
}
