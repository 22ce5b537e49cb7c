//! Capacity limits for the expansion state, the form parser and the script host.
//!
//! Limits are fixed for the lifetime of a session. They can be loaded from a YAML or JSON
//! file (chosen by extension) and individually overridden from the command line.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{err_msg, MacroError};

pub const DEFAULT_LOOKAHEAD_CAPACITY: usize = 256;
pub const DEFAULT_REPLACEMENT_CAPACITY: usize = 4096;
pub const DEFAULT_ARGUMENT_CAPACITY: usize = 1024;
pub const DEFAULT_BODY_CAPACITY: usize = 16384;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Fixed capacities. Exceeding any of them is a fatal overflow, never a truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Characters tentatively consumed while matching a macro name.
    pub lookahead_capacity: usize,
    /// Characters of one expansion result.
    pub replacement_capacity: usize,
    /// Total characters of one function-macro argument list.
    pub argument_capacity: usize,
    /// Characters of a reconstructed function/reader macro body.
    pub body_capacity: usize,
    /// Nested call depth inside the script host.
    pub max_call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            lookahead_capacity: DEFAULT_LOOKAHEAD_CAPACITY,
            replacement_capacity: DEFAULT_REPLACEMENT_CAPACITY,
            argument_capacity: DEFAULT_ARGUMENT_CAPACITY,
            body_capacity: DEFAULT_BODY_CAPACITY,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Limits {
    /// Parses limits from YAML text. Missing fields keep their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, MacroError> {
        serde_yaml::from_str(text).map_err(|e| err_msg!(Internal, "invalid limits: {}", e))
    }

    /// Parses limits from JSON text. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, MacroError> {
        serde_json::from_str(text).map_err(|e| err_msg!(Internal, "invalid limits: {}", e))
    }

    /// Loads a limits file; `.json` is read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self, MacroError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| err_msg!(Internal, "cannot read '{}': {}", path.display(), e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_keep_defaults() {
        let limits = Limits::from_yaml("lookahead_capacity: 8\n").unwrap();
        assert_eq!(limits.lookahead_capacity, 8);
        assert_eq!(limits.replacement_capacity, DEFAULT_REPLACEMENT_CAPACITY);
    }

    #[test]
    fn json_and_unknown_fields() {
        let limits = Limits::from_json(r#"{"max_call_depth": 3}"#).unwrap();
        assert_eq!(limits.max_call_depth, 3);
        assert!(Limits::from_json(r#"{"bogus": 1}"#).is_err());
    }
}
