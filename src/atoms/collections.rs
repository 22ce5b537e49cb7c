//! # Collection Atoms
//!
//! Table traversal and the `table` library.
//!
//! ## Atoms Provided
//!
//! - **Iteration**: `ipairs`, `pairs`, `next`
//! - **`table` library**: `concat`, `insert`, `unpack`

use crate::atoms::helpers::{arg, bad_argument, check_table, opt_int, AtomResult};
use crate::atoms::library;
use crate::runtime::eval::Exec;
use crate::runtime::value::{Key, Table, Value};

// ============================================================================
// ITERATION
// ============================================================================

/// Usage: for i, v in ipairs(<table>) do ... end
pub fn atom_ipairs(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let table = check_table(exec, &args, 0, "ipairs")?;
    Ok(vec![
        Value::native("ipairs_iterator", ipairs_iterator),
        Value::Table(table),
        Value::Int(0),
    ])
}

fn ipairs_iterator(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let table = check_table(exec, &args, 0, "ipairs_iterator")?;
    let index = opt_int(exec, &args, 1, "ipairs_iterator", 0)? + 1;
    let value = table.borrow().get(&Key::Int(index));
    if value.is_nil() {
        return Ok(vec![Value::Nil]);
    }
    Ok(vec![Value::Int(index), value])
}

/// Usage: for k, v in pairs(<table>) do ... end
pub fn atom_pairs(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let table = check_table(exec, &args, 0, "pairs")?;
    Ok(vec![Value::native("next", atom_next), Value::Table(table), Value::Nil])
}

/// Returns the entry after `key` (the first entry for nil), or nil at the end.
///
/// Usage: next(<table> [, <key>])
pub fn atom_next(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let table = check_table(exec, &args, 0, "next")?;
    let key = match arg(&args, 1) {
        Value::Nil => None,
        other => Some(Key::from_value(&other).map_err(|reason| bad_argument(exec, 1, "next", reason))?),
    };
    let entry = table.borrow().next(key.as_ref());
    Ok(match entry {
        Some((key, value)) => vec![key.to_value(), value],
        None => vec![Value::Nil],
    })
}

// ============================================================================
// TABLE LIBRARY
// ============================================================================

/// Joins `t[i..=j]` with `sep`. Every element must be a string or a number.
///
/// Usage: table.concat(<table> [, <sep> [, <i> [, <j>]]])
pub fn atom_concat(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let table = check_table(exec, &args, 0, "concat")?;
    let sep = match arg(&args, 1) {
        Value::Nil => String::new(),
        other => other
            .to_text()
            .map(|s| s.to_string())
            .ok_or_else(|| bad_argument(exec, 1, "concat", "string expected"))?,
    };
    let len = table.borrow().len();
    let first = opt_int(exec, &args, 2, "concat", 1)?;
    let last = opt_int(exec, &args, 3, "concat", len)?;
    let mut parts = Vec::new();
    let mut i = first;
    while i <= last {
        let value = table.borrow().get(&Key::Int(i));
        let text = value.to_text().ok_or_else(|| {
            exec.error(format!(
                "invalid value (at index {}) in table for 'concat'",
                i
            ))
        })?;
        parts.push(text.to_string());
        i += 1;
    }
    Ok(vec![Value::str(&parts.join(&sep))])
}

/// Appends a value, or inserts it at `pos` shifting later elements up.
///
/// Usage: table.insert(<table>, [<pos>,] <value>)
pub fn atom_insert(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let table = check_table(exec, &args, 0, "insert")?;
    match args.len() {
        2 => table.borrow_mut().push(arg(&args, 1)),
        3 => {
            let len = table.borrow().len();
            let pos = opt_int(exec, &args, 1, "insert", len + 1)?;
            if pos < 1 || pos > len + 1 {
                return Err(bad_argument(exec, 1, "insert", "position out of bounds"));
            }
            table.borrow_mut().insert(pos, arg(&args, 2));
        }
        _ => return Err(exec.error("wrong number of arguments to 'insert'")),
    }
    Ok(Vec::new())
}

/// Usage: table.unpack(<table> [, <i> [, <j>]])
pub fn atom_unpack(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let table = check_table(exec, &args, 0, "unpack")?;
    let len = table.borrow().len();
    let first = opt_int(exec, &args, 1, "unpack", 1)?;
    let last = opt_int(exec, &args, 2, "unpack", len)?;
    let table = table.borrow();
    Ok((first..=last).map(|i| table.get(&Key::Int(i))).collect())
}

pub fn register_collection_atoms(globals: &mut Table) {
    globals.set_str("ipairs", Value::native("ipairs", atom_ipairs));
    globals.set_str("pairs", Value::native("pairs", atom_pairs));
    globals.set_str("next", Value::native("next", atom_next));
    globals.set_str(
        "table",
        library(&[
            ("concat", atom_concat),
            ("insert", atom_insert),
            ("unpack", atom_unpack),
        ]),
    );
}
