//! # String Manipulation Atoms
//!
//! The `string` library. Strings are indexed by character, 1-based, with negative
//! positions counting from the end. Every function here is also reachable with method
//! syntax (`s:upper()`), since indexing a string looks up this table.
//!
//! ## Atoms Provided
//!
//! - **Case**: `upper`, `lower`
//! - **Slicing**: `sub`, `len`, `reverse`, `rep`
//! - **Codes**: `byte`, `char`
//! - **Formatting**: `format`

use crate::atoms::helpers::{arg, bad_argument, check_int, check_number, check_str, opt_int, AtomResult};
use crate::atoms::library;
use crate::runtime::eval::Exec;
use crate::runtime::value::{format_general, Table, Value};

// ============================================================================
// CASE AND SLICING
// ============================================================================

pub fn atom_upper(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let s = check_str(exec, &args, 0, "upper")?;
    Ok(vec![Value::str(&s.to_uppercase())])
}

pub fn atom_lower(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let s = check_str(exec, &args, 0, "lower")?;
    Ok(vec![Value::str(&s.to_lowercase())])
}

pub fn atom_len(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let s = check_str(exec, &args, 0, "len")?;
    Ok(vec![Value::Int(s.chars().count() as i64)])
}

pub fn atom_reverse(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let s = check_str(exec, &args, 0, "reverse")?;
    Ok(vec![Value::str(&s.chars().rev().collect::<String>())])
}

/// Usage: string.rep(<s>, <n> [, <sep>])
pub fn atom_rep(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let s = check_str(exec, &args, 0, "rep")?;
    let n = check_int(exec, &args, 1, "rep")?;
    let sep = match arg(&args, 2) {
        Value::Nil => String::new(),
        _ => check_str(exec, &args, 2, "rep")?.to_string(),
    };
    if n <= 0 {
        return Ok(vec![Value::str("")]);
    }
    let parts = vec![s.to_string(); n as usize];
    Ok(vec![Value::str(&parts.join(&sep))])
}

/// Clamps a 1-based, possibly negative `[i, j]` range to `len` characters.
fn char_range(i: i64, j: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if i < 0 { (len + i + 1).max(1) } else { i.max(1) };
    let end = if j < 0 { len + j + 1 } else { j.min(len) };
    if start > end {
        return None;
    }
    Some((start as usize - 1, end as usize))
}

/// Usage: string.sub(<s> [, <i> [, <j>]])
pub fn atom_sub(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let s = check_str(exec, &args, 0, "sub")?;
    let i = opt_int(exec, &args, 1, "sub", 1)?;
    let j = opt_int(exec, &args, 2, "sub", -1)?;
    let chars: Vec<char> = s.chars().collect();
    let slice = match char_range(i, j, chars.len()) {
        Some((start, end)) => chars[start..end].iter().collect::<String>(),
        None => String::new(),
    };
    Ok(vec![Value::str(&slice)])
}

// ============================================================================
// CODES
// ============================================================================

/// Usage: string.byte(<s> [, <i> [, <j>]])
pub fn atom_byte(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let s = check_str(exec, &args, 0, "byte")?;
    let i = opt_int(exec, &args, 1, "byte", 1)?;
    let j = opt_int(exec, &args, 2, "byte", i)?;
    let chars: Vec<char> = s.chars().collect();
    Ok(match char_range(i, j, chars.len()) {
        Some((start, end)) => chars[start..end].iter().map(|c| Value::Int(*c as i64)).collect(),
        None => Vec::new(),
    })
}

/// Usage: string.char(<code>...)
pub fn atom_char(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let mut text = String::with_capacity(args.len());
    for i in 0..args.len() {
        let code = check_int(exec, &args, i, "char")?;
        let c = u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| bad_argument(exec, i, "char", "value out of range"))?;
        text.push(c);
    }
    Ok(vec![Value::str(&text)])
}

// ============================================================================
// FORMATTING
// ============================================================================

#[derive(Debug, Default)]
struct FormatSpec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
}

impl FormatSpec {
    fn sign(&self, negative: bool) -> &'static str {
        match (negative, self.plus, self.space) {
            (true, _, _) => "-",
            (false, true, _) => "+",
            (false, false, true) => " ",
            _ => "",
        }
    }

    /// Pads `sign` + `body` to the field width.
    fn pad(&self, sign: &str, body: &str, numeric: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        if len >= self.width {
            return format!("{}{}", sign, body);
        }
        let fill = self.width - len;
        if self.left {
            format!("{}{}{}", sign, body, " ".repeat(fill))
        } else if self.zero && numeric {
            format!("{}{}{}", sign, "0".repeat(fill), body)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, body)
        }
    }
}

/// Rewrites Rust's `1.5e2` exponent as C's `1.5e+02`.
fn c_exponent(text: &str) -> String {
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text.to_string(),
    }
}

fn quoted(text: &str) -> String {
    let mut out = String::from("\"");
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => match chars.peek() {
                Some(d) if d.is_ascii_digit() => out.push_str("\\000"),
                _ => out.push_str("\\0"),
            },
            c if c.is_control() => out.push_str(&format!("\\{}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// C-style formatting: `%d %i %c %x %X %o %e %E %f %F %g %G %s %q %%`, with flags,
/// width and precision.
///
/// Usage: string.format(<fmt>, <value>...)
pub fn atom_format(exec: &mut Exec<'_>, args: Vec<Value>) -> AtomResult {
    let fmt = check_str(exec, &args, 0, "format")?;
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    let mut next_arg = 1;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let mut spec = FormatSpec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            spec.width = spec.width * 10 + d as usize;
            chars.next();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = 0;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                precision = precision * 10 + d as usize;
                chars.next();
            }
            spec.precision = Some(precision);
        }
        let Some(conversion) = chars.next() else {
            return Err(exec.error("invalid conversion '%' to 'format'"));
        };
        let i = next_arg;
        next_arg += 1;
        let piece = match conversion {
            'd' | 'i' => {
                let n = check_int(exec, &args, i, "format")?;
                spec.pad(spec.sign(n < 0), &n.unsigned_abs().to_string(), true)
            }
            'c' => {
                let code = check_int(exec, &args, i, "format")?;
                let c = u32::try_from(code).ok().and_then(char::from_u32).unwrap_or('\u{fffd}');
                spec.pad("", &c.to_string(), false)
            }
            'x' | 'X' | 'o' => {
                let n = check_int(exec, &args, i, "format")?;
                let body = match conversion {
                    'x' => format!("{:x}", n),
                    'X' => format!("{:X}", n),
                    _ => format!("{:o}", n),
                };
                let prefix = match (spec.alternate && n != 0, conversion) {
                    (true, 'x') => "0x",
                    (true, 'X') => "0X",
                    (true, _) => "0",
                    _ => "",
                };
                spec.pad(prefix, &body, true)
            }
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' => {
                let f = check_number(exec, &args, i, "format")?;
                let precision = spec.precision.unwrap_or(6);
                let magnitude = f.abs();
                let body = if !magnitude.is_finite() {
                    if magnitude.is_nan() { "nan" } else { "inf" }.to_string()
                } else {
                    match conversion.to_ascii_lowercase() {
                        'e' => c_exponent(&format!("{:.*e}", precision, magnitude)),
                        'f' => format!("{:.*}", precision, magnitude),
                        _ => format_general(magnitude, if precision == 0 { 1 } else { precision }, spec.alternate),
                    }
                };
                let body = if conversion.is_ascii_uppercase() { body.to_uppercase() } else { body };
                spec.pad(spec.sign(f.is_sign_negative() && f != 0.0), &body, magnitude.is_finite())
            }
            's' => {
                let value = arg(&args, i);
                if i >= args.len() {
                    return Err(bad_argument(exec, i, "format", "no value"));
                }
                let text = value.to_string();
                let text = match spec.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                };
                spec.pad("", &text, false)
            }
            'q' => match arg(&args, i) {
                Value::Str(s) => quoted(&s),
                value @ (Value::Int(_) | Value::Float(_) | Value::Nil | Value::Bool(_)) => value.to_string(),
                other => {
                    return Err(bad_argument(exec, i, "format", format!("value has no literal form ({})", other.type_name())))
                }
            },
            other => {
                return Err(exec.error(format!("invalid conversion '%{}' to 'format'", other)));
            }
        };
        out.push_str(&piece);
    }
    Ok(vec![Value::str(&out)])
}

pub fn register_string_atoms(globals: &mut Table) {
    globals.set_str(
        "string",
        library(&[
            ("upper", atom_upper),
            ("lower", atom_lower),
            ("len", atom_len),
            ("reverse", atom_reverse),
            ("rep", atom_rep),
            ("sub", atom_sub),
            ("byte", atom_byte),
            ("char", atom_char),
            ("format", atom_format),
        ]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_follow_negative_indexing() {
        assert_eq!(char_range(2, -2, 5), Some((1, 4)));
        assert_eq!(char_range(-3, -1, 5), Some((2, 5)));
        assert_eq!(char_range(0, 100, 3), Some((0, 3)));
        assert_eq!(char_range(4, 2, 5), None);
    }

    #[test]
    fn format_helpers() {
        assert_eq!(c_exponent("1.500000e2"), "1.500000e+02");
        assert_eq!(c_exponent("2.0e-7"), "2.0e-07");
        assert_eq!(quoted("a\"b\\"), "\"a\\\"b\\\\\"");
        let spec = FormatSpec {
            width: 5,
            zero: true,
            ..FormatSpec::default()
        };
        assert_eq!(spec.pad("-", "42", true), "-0042");
    }
}
