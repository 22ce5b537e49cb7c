//! Fundamental macro types. This module has no dependencies on other macro modules.
//!
//! ## Ownership
//!
//! - `MacroDefinition` is owned by the registry trie and cloned out of it on a match, so the
//!   registry is never borrowed while an invocation runs.
//! - Callables themselves live inside the host; the registry only holds their handles.

use serde::Serialize;

use crate::runtime::CallableId;

/// The value bound to a complete macro name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroDefinition {
    /// Literal substitution text.
    Simple(String),
    /// A compiled callable taking raw argument substrings, or, when `reader` is set, the
    /// three raw-stream capabilities.
    Callable { callable: CallableId, reader: bool },
}

impl MacroDefinition {
    pub fn function(callable: CallableId) -> Self {
        MacroDefinition::Callable {
            callable,
            reader: false,
        }
    }

    pub fn reader(callable: CallableId) -> Self {
        MacroDefinition::Callable {
            callable,
            reader: true,
        }
    }

    /// Reader membership is checked before treating a callable as a function macro.
    pub fn is_reader(&self) -> bool {
        matches!(self, MacroDefinition::Callable { reader: true, .. })
    }

    pub fn kind(&self) -> MacroKind {
        match self {
            MacroDefinition::Simple(_) => MacroKind::Simple,
            MacroDefinition::Callable { reader: false, .. } => MacroKind::Function,
            MacroDefinition::Callable { reader: true, .. } => MacroKind::Reader,
        }
    }
}

/// Kind tag used by listings and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroKind {
    Simple,
    Function,
    Reader,
}

impl MacroKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacroKind::Simple => "simple",
            MacroKind::Function => "function",
            MacroKind::Reader => "reader",
        }
    }
}

impl std::fmt::Display for MacroKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded expansion, for `trace` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionStep {
    /// The matched macro name.
    pub name: String,
    pub kind: MacroKind,
    /// Raw argument substrings (function macros only).
    pub args: Vec<String>,
    /// The text delivered in place of the name.
    pub output: String,
    /// Tokenizer line at the point of use.
    pub line: usize,
}
