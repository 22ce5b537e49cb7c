//! # Builtin Library
//!
//! The builtins available to macro bodies run by the script host. Each builtin is a plain
//! function with the [`NativeFn`] signature; the domain modules register theirs in the
//! global table.
//!
//! ## Module Structure
//!
//! - **`helpers`**: argument extraction and error wording shared by all builtins
//! - **`execution`**: `error`, `assert`, `type`, `select`, `tostring`, `tonumber`
//! - **`collections`**: `ipairs`, `pairs`, `next`, and the `table` library
//! - **`string`**: the `string` library
//! - **`external`**: `print` and the output sinks it writes to

use crate::runtime::value::{NativeFn, Table, Value};

pub mod collections;
pub mod execution;
pub mod external;
pub mod helpers;
pub mod string;

/// Builds a library table (`string`, `table`) from its builtins.
pub(crate) fn library(entries: &[(&'static str, NativeFn)]) -> Value {
    let mut table = Table::default();
    for (name, func) in entries {
        table.set_str(name, Value::native(*name, *func));
    }
    Value::Table(std::rc::Rc::new(std::cell::RefCell::new(table)))
}

// ============================================================================
// UNIFIED REGISTRATION FUNCTION
// ============================================================================

/// Registers every builtin in `globals`.
pub fn register_all_atoms(globals: &mut Table) {
    execution::register_execution_atoms(globals);
    collections::register_collection_atoms(globals);
    string::register_string_atoms(globals);
    external::register_external_atoms(globals);
}
