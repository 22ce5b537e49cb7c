//! Runtime values of the script host.
//!
//! Tables are shared by reference (`Rc<RefCell<_>>`) and compared by identity, strings are
//! immutable `Rc<str>`. Table keys are restricted to strings, numbers and booleans.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::rc::Rc;

use crate::runtime::ast::FuncBody;
use crate::runtime::eval::{Exec, Scope};
use crate::syntax::lexer::str_to_number;
use crate::syntax::Token;
use crate::MacroError;

pub type TableRef = Rc<RefCell<Table>>;

/// Signature shared by every builtin.
pub type NativeFn = fn(&mut Exec<'_>, Vec<Value>) -> Result<Vec<Value>, MacroError>;

#[derive(Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "builtin:{}", self.name)
    }
}

/// The three stream primitives handed to a reader macro, in argument order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Advance,
    Peek,
    Word,
}

pub struct Closure {
    pub body: Rc<FuncBody>,
    pub env: Rc<Scope>,
}

// Environments can be cyclic (a local function captures its own scope).
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {} ({}:{})", self.body.name, self.body.chunk, self.body.line)
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Table(TableRef),
    Function(Rc<Closure>),
    Native(Native),
    Capability(Capability),
}

impl Value {
    pub fn str(text: &str) -> Value {
        Value::Str(Rc::from(text))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Value {
        Value::Native(Native { name, func })
    }

    pub fn new_table() -> Value {
        Value::Table(Rc::new(RefCell::new(Table::default())))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) | Value::Native(_) | Value::Capability(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Numeric view, converting numeric strings the way arithmetic does.
    pub fn to_number(&self) -> Option<Value> {
        match self {
            Value::Int(_) | Value::Float(_) => Some(self.clone()),
            Value::Str(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn to_float(&self) -> Option<f64> {
        match self.to_number()? {
            Value::Int(i) => Some(i as f64),
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Integer view; floats qualify only when they have an exact integer value.
    pub fn to_integer(&self) -> Option<i64> {
        match self.to_number()? {
            Value::Int(i) => Some(i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(f as i64),
            _ => None,
        }
    }

    /// Text view used by concatenation and string builtins: strings and numbers only.
    pub fn to_text(&self) -> Option<Rc<str>> {
        match self {
            Value::Str(s) => Some(Rc::clone(s)),
            Value::Int(_) | Value::Float(_) => Some(Rc::from(self.to_string().as_str())),
            _ => None,
        }
    }

    /// Primitive equality: by value for scalars and strings, by identity otherwise.
    pub fn raw_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::Capability(a), Value::Capability(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => f.write_str(&format_float(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Function(c) => write!(f, "function: {:p}", Rc::as_ptr(c)),
            Value::Native(n) => write!(f, "function: builtin: {}", n.name),
            Value::Capability(c) => write!(f, "function: reader {:?}", c),
        }
    }
}

/// Parses a numeral the way `tonumber` does, allowing surrounding whitespace and a sign.
pub fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let token = str_to_number(digits)?;
    Some(match (token, negative) {
        (Token::Int(i), false) => Value::Int(i),
        (Token::Int(i), true) => Value::Int(i.wrapping_neg()),
        (Token::Float(f), false) => Value::Float(f),
        (Token::Float(f), true) => Value::Float(-f),
        _ => return None,
    })
}

/// `%.14g`, with a `.0` suffix on integral values so floats stay recognizable.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let text = format_general(f, 14, false);
    if text.contains(['.', 'e']) {
        text
    } else {
        format!("{}.0", text)
    }
}

/// C-style `%g` with the given precision.
pub fn format_general(f: f64, precision: usize, alternate: bool) -> String {
    if !f.is_finite() {
        return format_float(f);
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, f);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= precision as i32 {
        let mantissa = if alternate { mantissa.to_string() } else { trim_fraction(mantissa) };
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }
    let decimals = (precision as i32 - 1 - exp).max(0) as usize;
    let fixed = format!("{:.*}", decimals, f);
    if alternate {
        fixed
    } else {
        trim_fraction(&fixed)
    }
}

fn trim_fraction(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

// ============================================================================
// TABLES
// ============================================================================

/// A table key; floats with an integer value are stored as integers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
}

impl Key {
    /// Fails (with the reason) for nil, NaN and reference values.
    pub fn from_value(value: &Value) -> Result<Key, &'static str> {
        match value {
            Value::Nil => Err("table index is nil"),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Int(i) => Ok(Key::Int(*i)),
            Value::Float(f) if f.is_nan() => Err("table index is NaN"),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Ok(Key::Int(*f as i64)),
            Value::Float(f) => Ok(Key::Float(f.to_bits())),
            Value::Str(s) => Ok(Key::Str(Rc::clone(s))),
            _ => Err("table keys must be strings, numbers or booleans"),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Float(bits) => Value::Float(f64::from_bits(*bits)),
            Key::Str(s) => Value::Str(Rc::clone(s)),
        }
    }
}

#[derive(Debug, Default)]
pub struct Table {
    entries: BTreeMap<Key, Value>,
}

impl Table {
    pub fn get(&self, key: &Key) -> Value {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.get(&Key::Str(Rc::from(key)))
    }

    /// Assigning nil removes the entry.
    pub fn set(&mut self, key: Key, value: Value) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn set_str(&mut self, key: &str, value: Value) {
        self.set(Key::Str(Rc::from(key)), value);
    }

    /// Border of the sequence part: the last `n` such that `1..=n` are all present.
    pub fn len(&self) -> i64 {
        let mut n = 0;
        while self.entries.contains_key(&Key::Int(n + 1)) {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry following `key` in iteration order (the first entry for `None`).
    pub fn next(&self, key: Option<&Key>) -> Option<(Key, Value)> {
        let mut range = match key {
            Some(k) => self.entries.range((Bound::Excluded(k.clone()), Bound::Unbounded)),
            None => self.entries.range::<Key, _>(..),
        };
        range.next().map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Inserts at `pos` (1-based), shifting the sequence up.
    pub fn insert(&mut self, pos: i64, value: Value) {
        let len = self.len();
        let mut i = len;
        while i >= pos {
            let moved = self.get(&Key::Int(i));
            self.set(Key::Int(i + 1), moved);
            i -= 1;
        }
        self.set(Key::Int(pos), value);
    }

    pub fn push(&mut self, value: Value) {
        let len = self.len();
        self.set(Key::Int(len + 1), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_formatting_matches_the_language() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(1e100), "1e+100");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_general(0.0001234, 3, false), "0.000123");
    }

    #[test]
    fn numeric_strings_convert() {
        assert!(matches!(parse_number(" 42 "), Some(Value::Int(42))));
        assert!(matches!(parse_number("-0x10"), Some(Value::Int(-16))));
        assert!(matches!(parse_number("1.5"), Some(Value::Float(f)) if f == 1.5));
        assert!(parse_number("abc").is_none());
    }

    #[test]
    fn table_border_and_iteration() {
        let mut t = Table::default();
        t.push(Value::str("a"));
        t.push(Value::str("b"));
        t.set_str("k", Value::Bool(true));
        assert_eq!(t.len(), 2);
        t.insert(1, Value::str("z"));
        assert_eq!(t.get(&Key::Int(1)).to_string(), "z");
        assert_eq!(t.len(), 3);
        let mut seen = 0;
        let mut key = None;
        while let Some((k, _)) = t.next(key.as_ref()) {
            seen += 1;
            key = Some(k);
        }
        assert_eq!(seen, 4);
        assert_eq!(Key::from_value(&Value::Float(2.0)), Ok(Key::Int(2)));
    }
}
