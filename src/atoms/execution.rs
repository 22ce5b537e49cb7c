//! # Execution Control Atoms
//!
//! Errors, assertions and the basic value conversions.
//!
//! ## Atoms Provided
//!
//! - **Errors**: `error`, `assert`
//! - **Introspection**: `type`, `select`
//! - **Conversion**: `tostring`, `tonumber`

use crate::atoms::helpers::{arg, bad_argument, check_any, check_int, check_str, opt_int, AtomResult};
use crate::runtime::eval::Exec;
use crate::runtime::value::{parse_number, Table, Value};
use crate::err_msg;

// ============================================================================
// ERRORS
// ============================================================================

/// Raises an error. String messages get the caller's position unless `level` is 0.
///
/// Usage: error(<message> [, <level>])
pub fn atom_error(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let level = opt_int(exec, &args, 1, "error", 1)?;
    match arg(&args, 0) {
        Value::Str(message) if level > 0 => Err(exec.error(message)),
        Value::Str(message) => Err(err_msg!(Invocation, "{}", message)),
        Value::Nil => Err(err_msg!(Invocation, "nil")),
        other => Err(err_msg!(Invocation, "(error object is a {} value)", other.type_name())),
    }
}

/// Returns all its arguments when the first is truthy, raises otherwise.
///
/// Usage: assert(<value> [, <message>])
pub fn atom_assert(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let value = check_any(exec, &args, 0, "assert")?;
    if value.truthy() {
        return Ok(args);
    }
    match arg(&args, 1) {
        Value::Nil => Err(err_msg!(Invocation, "assertion failed!")),
        message => Err(err_msg!(Invocation, "{}", message)),
    }
}

// ============================================================================
// INTROSPECTION
// ============================================================================

/// Usage: type(<value>)
pub fn atom_type(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let value = check_any(exec, &args, 0, "type")?;
    Ok(vec![Value::str(value.type_name())])
}

/// `select('#', ...)` counts the extra arguments; `select(n, ...)` returns them from `n` on.
/// Negative `n` counts from the end.
pub fn atom_select(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let rest = args.len().saturating_sub(1) as i64;
    if let Value::Str(s) = arg(&args, 0) {
        if &*s == "#" {
            return Ok(vec![Value::Int(rest)]);
        }
    }
    let n = check_int(exec, &args, 0, "select")?;
    let start = if n < 0 { rest + n } else { n - 1 };
    if n == 0 || start < 0 {
        return Err(bad_argument(exec, 0, "select", "index out of range"));
    }
    Ok(args.into_iter().skip(1 + start as usize).collect())
}

// ============================================================================
// CONVERSION
// ============================================================================

/// Usage: tostring(<value>)
pub fn atom_tostring(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let value = check_any(exec, &args, 0, "tostring")?;
    Ok(vec![Value::str(&value.to_string())])
}

/// Converts a string or number to a number, or returns nil. With a base (2 to 36) the
/// string is read as an integer in that base.
///
/// Usage: tonumber(<value> [, <base>])
pub fn atom_tonumber(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    if arg(&args, 1).is_nil() {
        let value = check_any(exec, &args, 0, "tonumber")?;
        let number = match value {
            Value::Int(_) | Value::Float(_) => value,
            Value::Str(s) => parse_number(&s).unwrap_or_default(),
            _ => Value::Nil,
        };
        return Ok(vec![number]);
    }
    let base = check_int(exec, &args, 1, "tonumber")?;
    if !(2..=36).contains(&base) {
        return Err(bad_argument(exec, 1, "tonumber", "base out of range"));
    }
    let text = check_str(exec, &args, 0, "tonumber")?;
    let trimmed = text.trim().to_ascii_lowercase();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.as_str()),
    };
    let number = match i64::from_str_radix(digits, base as u32) {
        Ok(n) if !digits.starts_with('+') => Value::Int(if negative { n.wrapping_neg() } else { n }),
        _ => Value::Nil,
    };
    Ok(vec![number])
}

pub fn register_execution_atoms(globals: &mut Table) {
    globals.set_str("error", Value::native("error", atom_error));
    globals.set_str("assert", Value::native("assert", atom_assert));
    globals.set_str("type", Value::native("type", atom_type));
    globals.set_str("select", Value::native("select", atom_select));
    globals.set_str("tostring", Value::native("tostring", atom_tostring));
    globals.set_str("tonumber", Value::native("tonumber", atom_tonumber));
}
