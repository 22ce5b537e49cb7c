//! # External Interface Atoms
//!
//! Builtins that reach outside the interpreter. Output goes through an [`OutputSink`] so
//! tests can capture it and the CLI can route it to stderr, away from expanded text.
//!
//! ## Atoms Provided
//!
//! - **I/O**: `print`

use std::io::Write;

use crate::atoms::helpers::AtomResult;
use crate::runtime::eval::Exec;
use crate::runtime::value::{Table, Value};

// ============================================================================
// OUTPUT SINKS
// ============================================================================

/// Destination of `print` output.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

/// Discards everything.
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _text: &str) {}
}

/// Collects output in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub text: String,
}

impl BufferSink {
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

impl OutputSink for BufferSink {
    fn emit(&mut self, text: &str) {
        self.text.push_str(text);
    }
}

/// Writes straight to stderr.
pub struct StderrSink;

impl OutputSink for StderrSink {
    fn emit(&mut self, text: &str) {
        let _ = std::io::stderr().write_all(text.as_bytes());
    }
}

// ============================================================================
// I/O OPERATIONS
// ============================================================================

/// Writes its arguments, converted with `tostring` and separated by tabs, plus a newline.
///
/// Usage: print(<value>...)
///
/// Returns: nothing.
pub fn atom_print(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let line = args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\t");
    exec.output().emit(&format!("{}\n", line));
    Ok(Vec::new())
}

pub fn register_external_atoms(globals: &mut Table) {
    globals.set_str("print", Value::native("print", atom_print));
}
