//! # Atom Helper Infrastructure
//!
//! Argument extraction shared by every builtin. All helpers report failures in the
//! scripting language's wording: `bad argument #N to 'name' (reason)`.

use std::rc::Rc;

use crate::runtime::eval::Exec;
use crate::runtime::value::{TableRef, Value};
use crate::MacroError;

/// Return type of every builtin.
pub type AtomResult = Result<Vec<Value>, MacroError>;

/// The `i`th argument (0-based), nil when absent.
pub fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

pub fn bad_argument(exec: &Exec<'_>, i: usize, name: &str, reason: impl std::fmt::Display) -> MacroError {
    exec.error(format!("bad argument #{} to '{}' ({})", i + 1, name, reason))
}

fn type_reason(expected: &str, got: &Value) -> String {
    let got = if got.is_nil() { "no value" } else { got.type_name() };
    format!("{} expected, got {}", expected, got)
}

/// A string argument; numbers are converted.
pub fn check_str(exec: &Exec<'_>, args: &[Value], i: usize, name: &str) -> Result<Rc<str>, MacroError> {
    let value = arg(args, i);
    value
        .to_text()
        .ok_or_else(|| bad_argument(exec, i, name, type_reason("string", &value)))
}

/// An integer argument; numeric strings and integral floats are converted.
pub fn check_int(exec: &Exec<'_>, args: &[Value], i: usize, name: &str) -> Result<i64, MacroError> {
    let value = arg(args, i);
    if let Some(n) = value.to_integer() {
        return Ok(n);
    }
    if value.to_number().is_some() {
        return Err(bad_argument(exec, i, name, "number has no integer representation"));
    }
    Err(bad_argument(exec, i, name, type_reason("number", &value)))
}

pub fn opt_int(exec: &Exec<'_>, args: &[Value], i: usize, name: &str, default: i64) -> Result<i64, MacroError> {
    if arg(args, i).is_nil() {
        return Ok(default);
    }
    check_int(exec, args, i, name)
}

pub fn check_number(exec: &Exec<'_>, args: &[Value], i: usize, name: &str) -> Result<f64, MacroError> {
    let value = arg(args, i);
    value
        .to_float()
        .ok_or_else(|| bad_argument(exec, i, name, type_reason("number", &value)))
}

pub fn check_table(exec: &Exec<'_>, args: &[Value], i: usize, name: &str) -> Result<TableRef, MacroError> {
    match arg(args, i) {
        Value::Table(table) => Ok(table),
        other => Err(bad_argument(exec, i, name, type_reason("table", &other))),
    }
}

/// Fails with `value expected` when the argument is missing entirely.
pub fn check_any(exec: &Exec<'_>, args: &[Value], i: usize, name: &str) -> Result<Value, MacroError> {
    args.get(i)
        .cloned()
        .ok_or_else(|| bad_argument(exec, i, name, "value expected"))
}
