//! Token kinds of the host scripting language, plus the two macro-definition keywords.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Reserved words
    And,
    Break,
    Do,
    Else,
    Elseif,
    End,
    False,
    For,
    Function,
    Goto,
    If,
    In,
    Local,
    Nil,
    Not,
    Or,
    Repeat,
    Return,
    Then,
    True,
    Until,
    While,
    // Definition keywords
    Macro,
    ReaderMacro,
    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Caret,
    Hash,
    Amp,
    Tilde,
    Pipe,
    Shl,
    Shr,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    DoubleColon,
    Semi,
    Colon,
    Comma,
    Dot,
    Concat,
    Ellipsis,
    // Literals
    Name(String),
    Str(String),
    Int(i64),
    Float(f64),
    Eof,
}

static RESERVED: Lazy<HashMap<&'static str, Token>> = Lazy::new(|| {
    use Token::*;
    [
        ("and", And),
        ("break", Break),
        ("do", Do),
        ("else", Else),
        ("elseif", Elseif),
        ("end", End),
        ("false", False),
        ("for", For),
        ("function", Function),
        ("goto", Goto),
        ("if", If),
        ("in", In),
        ("local", Local),
        ("nil", Nil),
        ("not", Not),
        ("or", Or),
        ("repeat", Repeat),
        ("return", Return),
        ("then", Then),
        ("true", True),
        ("until", Until),
        ("while", While),
        ("macro", Macro),
        ("readermacro", ReaderMacro),
    ]
    .into_iter()
    .collect()
});

/// Maps an identifier to its reserved-word token, if it is one.
pub fn reserved(word: &str) -> Option<Token> {
    RESERVED.get(word).cloned()
}

impl Token {
    /// Canonical spelling of reserved words and punctuation.
    pub fn symbol(&self) -> Option<&'static str> {
        use Token::*;
        let text = match self {
            And => "and",
            Break => "break",
            Do => "do",
            Else => "else",
            Elseif => "elseif",
            End => "end",
            False => "false",
            For => "for",
            Function => "function",
            Goto => "goto",
            If => "if",
            In => "in",
            Local => "local",
            Nil => "nil",
            Not => "not",
            Or => "or",
            Repeat => "repeat",
            Return => "return",
            Then => "then",
            True => "true",
            Until => "until",
            While => "while",
            Macro => "macro",
            ReaderMacro => "readermacro",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            DoubleSlash => "//",
            Percent => "%",
            Caret => "^",
            Hash => "#",
            Amp => "&",
            Tilde => "~",
            Pipe => "|",
            Shl => "<<",
            Shr => ">>",
            Eq => "==",
            Ne => "~=",
            Le => "<=",
            Ge => ">=",
            Lt => "<",
            Gt => ">",
            Assign => "=",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            DoubleColon => "::",
            Semi => ";",
            Colon => ":",
            Comma => ",",
            Dot => ".",
            Concat => "..",
            Ellipsis => "...",
            Name(_) | Str(_) | Int(_) | Float(_) | Eof => return None,
        };
        Some(text)
    }

    /// Re-serializes the token as source text that lexes back to the same token.
    ///
    /// Strings are wrapped in long brackets so no escaping is needed; numbers are rendered
    /// from their value.
    pub fn to_source(&self) -> String {
        match self {
            Token::Name(name) => name.clone(),
            Token::Str(text) => long_bracket(text),
            Token::Int(i) => i.to_string(),
            Token::Float(f) => render_float(*f),
            Token::Eof => String::new(),
            other => other.symbol().unwrap_or_default().to_string(),
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Token::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "<name> {}", name),
            Token::Str(text) => write!(f, "<string> {:?}", text),
            Token::Int(i) => write!(f, "<integer> {}", i),
            Token::Float(n) => write!(f, "<number> {}", render_float(*n)),
            Token::Eof => f.write_str("<eof>"),
            other => f.write_str(other.symbol().unwrap_or_default()),
        }
    }
}

/// Wraps `text` in the lowest long-bracket level that cannot close early.
pub fn long_bracket(text: &str) -> String {
    let probe = format!("{}]", text);
    let mut level = 0;
    while probe.contains(&format!("]{}]", "=".repeat(level))) {
        level += 1;
    }
    let eqs = "=".repeat(level);
    // A newline right after the opening bracket is dropped by the lexer.
    let lead = if text.starts_with('\n') || text.starts_with('\r') {
        "\n"
    } else {
        ""
    };
    format!("[{eqs}[{lead}{text}]{eqs}]")
}

/// Renders a float so it lexes back as a float.
pub fn render_float(f: f64) -> String {
    if f.is_nan() {
        "(0/0)".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "(1/0)" } else { "(-1/0)" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{:?}", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_round_trip() {
        for word in ["function", "elseif", "readermacro", "macro", "end"] {
            let token = reserved(word).unwrap();
            assert_eq!(token.symbol(), Some(word));
        }
        assert_eq!(reserved("macros"), None);
    }

    #[test]
    fn long_bracket_picks_safe_level() {
        assert_eq!(long_bracket("abc"), "[[abc]]");
        assert_eq!(long_bracket("a]]b"), "[=[a]]b]=]");
        assert_eq!(long_bracket("x]"), "[=[x]]=]");
        assert_eq!(long_bracket("\nline"), "[[\n\nline]]");
    }

    #[test]
    fn floats_stay_floats() {
        assert_eq!(render_float(3.0), "3.0");
        assert_eq!(render_float(0.5), "0.5");
        assert_eq!(render_float(1e300), "1e300");
        assert_eq!(Token::Float(2.0).to_source(), "2.0");
        assert_eq!(Token::Int(42).to_source(), "42");
    }
}
