//! # Lexical Macro Expansion
//!
//! This module sits between a chunk's characters and the tokenizer. It substitutes macro
//! names with their expansions character by character, so the tokenizer only ever sees
//! the expanded text.
//!
//! ## Core Principles
//!
//! - **Character level**: matching runs on raw characters against a prefix trie of names.
//!   Names need not be identifiers and may appear anywhere outside comments and strings.
//! - **Single pass**: expansions are delivered as they are and never rescanned.
//! - **Host callables**: function and reader macro bodies are compiled and run by a
//!   [`Host`](crate::runtime::Host); this module only holds their handles.
//! - **Fail loudly**: every buffer has a fixed capacity and overflowing it is an error,
//!   never a truncation.
//!
//! ## Module Structure
//!
//! - **`types`**: definitions, kinds and trace records
//! - **`registry`**: the name trie
//! - **`expander`**: expansion state and the automaton feeding the lexer
//! - **`invoke`**: argument collection and the reader stream
//! - **`definition`**: the `macro` / `readermacro` form parser

pub mod definition;
pub mod expander;
pub mod invoke;
pub mod registry;
pub mod types;

pub use definition::parse_definition;
pub use expander::{Buffer, Expander, ExpansionState};
pub use registry::{Registry, Step, TrieNode};
pub use types::{ExpansionStep, MacroDefinition, MacroKind};
