//! Pull-based tokenizer for the host scripting language.
//!
//! The lexer never touches the chunk text directly: every character comes from a
//! [`CharFeed`]. Plain text is fed by [`StrFeed`]; the macro layer feeds expanded text.
//! Comment and string-literal bodies are announced to the feed as suppressed regions so
//! the macro automaton leaves them alone.
//!
//! ## Error Handling
//!
//! Lexical errors are `MacroError::Syntax`, built with `err_ctx!` at the position of the
//! token being read. Errors raised by the feed are passed through and given the same
//! position if they have none.

use crate::diagnostics::SourceArc;
use crate::source::{CharSource, Span};
use crate::syntax::token::{reserved, Token};
use crate::{err_ctx, MacroError};

/// Where the lexer gets its characters from.
pub trait CharFeed {
    /// Next character, `None` at end of stream.
    fn next_char(&mut self) -> Result<Option<char>, MacroError>;

    /// Enters or leaves a region (comment, string body) that must not be macro-expanded.
    fn set_suppressed(&mut self, _on: bool) {}

    /// Newlines the feed consumed on its own, which the lexer never saw.
    fn hidden_lines(&self) -> usize {
        0
    }

    /// Newlines the lexer saw that did not come from the source text.
    fn replayed_lines(&self) -> usize {
        0
    }

    /// Byte offset of the next raw character, for spans.
    fn offset(&self) -> usize;

    fn named_source(&self) -> &SourceArc;

    /// Called whenever a token may start at `current`, the character the lexer holds.
    fn mark_token(&mut self, _current: Option<char>) {}
}

/// Feeds a chunk verbatim.
#[derive(Debug)]
pub struct StrFeed {
    source: CharSource,
}

impl StrFeed {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            source: CharSource::from_text(name, text),
        }
    }
}

impl CharFeed for StrFeed {
    fn next_char(&mut self) -> Result<Option<char>, MacroError> {
        Ok(self.source.next_raw())
    }

    fn offset(&self) -> usize {
        self.source.offset()
    }

    fn named_source(&self) -> &SourceArc {
        self.source.named_source()
    }
}

pub struct Lexer<F: CharFeed> {
    feed: F,
    current: Option<char>,
    current_offset: usize,
    token_start: usize,
    line: usize,
}

impl<F: CharFeed> Lexer<F> {
    /// Creates a lexer and reads the first character.
    pub fn new(feed: F) -> Result<Self, MacroError> {
        let mut lexer = Self {
            feed,
            current: None,
            current_offset: 0,
            token_start: 0,
            line: 1,
        };
        lexer.advance()?;
        Ok(lexer)
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut F {
        &mut self.feed
    }

    pub fn current(&self) -> Option<char> {
        self.current
    }

    /// Replaces the lookahead character, for callers that consumed input behind the lexer.
    pub fn set_current(&mut self, c: Option<char>, offset: usize) {
        self.current = c;
        self.current_offset = offset;
    }

    pub fn line(&self) -> usize {
        (self.line + self.feed.hidden_lines()).saturating_sub(self.feed.replayed_lines())
    }

    /// Span of the token currently being read.
    pub fn span(&self) -> Span {
        Span {
            start: self.token_start,
            end: self.current_offset.max(self.token_start),
        }
    }

    /// Gives `err` this lexer's position if it has none.
    pub fn locate(&self, err: MacroError) -> MacroError {
        err.at(self.feed.named_source(), self.span(), self.line())
    }

    fn error(&self, message: impl std::fmt::Display) -> MacroError {
        let near = match self.current {
            Some(c) => format!("{} near '{}'", message, c),
            None => format!("{} near <eof>", message),
        };
        err_ctx!(Syntax, near, self.feed.named_source(), self.span(), self.line())
    }

    /// Moves to the next character.
    pub fn advance(&mut self) -> Result<(), MacroError> {
        self.current_offset = self.feed.offset();
        self.current = self.feed.next_char().map_err(|e| self.locate(e))?;
        Ok(())
    }

    fn suppress(&mut self, on: bool) {
        self.feed.set_suppressed(on);
    }

    fn check_next(&mut self, c: char) -> Result<bool, MacroError> {
        if self.current == Some(c) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Skips a `\n`, `\r`, `\n\r` or `\r\n` sequence and counts one line.
    pub fn inc_line(&mut self) -> Result<(), MacroError> {
        let old = self.current;
        self.line += 1;
        self.advance()?;
        if is_newline(self.current) && self.current != old {
            self.advance()?;
        }
        Ok(())
    }

    /// Reads the next token, without any handling of the definition keywords.
    pub fn raw_next_token(&mut self) -> Result<Token, MacroError> {
        loop {
            self.token_start = self.current_offset;
            self.feed.mark_token(self.current);
            let Some(c) = self.current else {
                return Ok(Token::Eof);
            };
            match c {
                '\n' | '\r' => self.inc_line()?,
                ' ' | '\t' | '\x0b' | '\x0c' => self.advance()?,
                '-' => {
                    self.advance()?;
                    if self.current != Some('-') {
                        return Ok(Token::Minus);
                    }
                    self.skip_comment()?;
                }
                '[' => {
                    let (level, opened) = self.skip_sep()?;
                    if opened {
                        let text = self.read_long_string(level, false)?;
                        return Ok(Token::Str(text));
                    }
                    if level > 0 {
                        return Err(self.error("invalid long string delimiter"));
                    }
                    return Ok(Token::LBracket);
                }
                '=' => {
                    self.advance()?;
                    return Ok(if self.check_next('=')? { Token::Eq } else { Token::Assign });
                }
                '<' => {
                    self.advance()?;
                    if self.check_next('=')? {
                        return Ok(Token::Le);
                    }
                    return Ok(if self.check_next('<')? { Token::Shl } else { Token::Lt });
                }
                '>' => {
                    self.advance()?;
                    if self.check_next('=')? {
                        return Ok(Token::Ge);
                    }
                    return Ok(if self.check_next('>')? { Token::Shr } else { Token::Gt });
                }
                '/' => {
                    self.advance()?;
                    return Ok(if self.check_next('/')? {
                        Token::DoubleSlash
                    } else {
                        Token::Slash
                    });
                }
                '~' => {
                    self.advance()?;
                    return Ok(if self.check_next('=')? { Token::Ne } else { Token::Tilde });
                }
                ':' => {
                    self.advance()?;
                    return Ok(if self.check_next(':')? {
                        Token::DoubleColon
                    } else {
                        Token::Colon
                    });
                }
                '"' | '\'' => return self.read_string(c),
                '.' => {
                    self.advance()?;
                    if self.check_next('.')? {
                        return Ok(if self.check_next('.')? {
                            Token::Ellipsis
                        } else {
                            Token::Concat
                        });
                    }
                    if matches!(self.current, Some(d) if d.is_ascii_digit()) {
                        return self.read_numeral(String::from("."));
                    }
                    return Ok(Token::Dot);
                }
                '0'..='9' => return self.read_numeral(String::new()),
                c if is_ident_start(c) => {
                    let mut word = String::new();
                    while let Some(c) = self.current.filter(|c| is_ident_char(*c)) {
                        word.push(c);
                        self.advance()?;
                    }
                    return Ok(reserved(&word).unwrap_or(Token::Name(word)));
                }
                _ => {
                    let token = match c {
                        '+' => Token::Plus,
                        '*' => Token::Star,
                        '%' => Token::Percent,
                        '^' => Token::Caret,
                        '#' => Token::Hash,
                        '&' => Token::Amp,
                        '|' => Token::Pipe,
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        '{' => Token::LBrace,
                        '}' => Token::RBrace,
                        ']' => Token::RBracket,
                        ';' => Token::Semi,
                        ',' => Token::Comma,
                        _ => return Err(self.error("unexpected symbol")),
                    };
                    self.advance()?;
                    return Ok(token);
                }
            }
        }
    }

    /// Current is the second `-` of a comment opener.
    fn skip_comment(&mut self) -> Result<(), MacroError> {
        self.suppress(true);
        self.advance()?;
        if self.current == Some('[') {
            let (level, opened) = self.skip_sep()?;
            if opened {
                self.read_long_string(level, true)?;
                return Ok(());
            }
        }
        while self.current.is_some() && !is_newline(self.current) {
            self.advance()?;
        }
        self.suppress(false);
        Ok(())
    }

    /// Current is `[` or `]`. Skips it and any `=` run; reports the run length and whether
    /// the same bracket follows (leaving current on it).
    fn skip_sep(&mut self) -> Result<(usize, bool), MacroError> {
        let bracket = self.current;
        self.advance()?;
        let mut level = 0;
        while self.current == Some('=') {
            level += 1;
            self.advance()?;
        }
        Ok((level, self.current == bracket))
    }

    /// Current is the second bracket of a `[=*[` opener.
    fn read_long_string(&mut self, level: usize, comment: bool) -> Result<String, MacroError> {
        self.suppress(true);
        self.advance()?;
        if is_newline(self.current) {
            self.inc_line()?;
        }
        let mut text = String::new();
        loop {
            match self.current {
                None => {
                    let what = if comment { "comment" } else { "string" };
                    self.suppress(false);
                    return Err(self.error(format!("unfinished long {}", what)));
                }
                Some(']') => {
                    let (closing, closed) = self.skip_sep()?;
                    if closed && closing == level {
                        self.suppress(false);
                        self.advance()?;
                        return Ok(text);
                    }
                    text.push(']');
                    text.push_str(&"=".repeat(closing));
                }
                Some('\n') | Some('\r') => {
                    text.push('\n');
                    self.inc_line()?;
                }
                Some(c) => {
                    text.push(c);
                    self.advance()?;
                }
            }
        }
    }

    fn read_string(&mut self, delimiter: char) -> Result<Token, MacroError> {
        self.suppress(true);
        self.advance()?;
        let mut text = String::new();
        loop {
            match self.current {
                None | Some('\n') | Some('\r') => {
                    self.suppress(false);
                    return Err(self.error("unfinished string"));
                }
                Some('\\') => self.read_escape(&mut text)?,
                Some(c) if c == delimiter => break,
                Some(c) => {
                    text.push(c);
                    self.advance()?;
                }
            }
        }
        self.suppress(false);
        self.advance()?;
        Ok(Token::Str(text))
    }

    /// Current is the backslash.
    fn read_escape(&mut self, text: &mut String) -> Result<(), MacroError> {
        self.advance()?;
        let Some(c) = self.current else {
            return Err(self.error("unfinished string"));
        };
        let simple = match c {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            'f' => Some('\x0c'),
            'v' => Some('\x0b'),
            '\\' | '"' | '\'' => Some(c),
            _ => None,
        };
        if let Some(escaped) = simple {
            text.push(escaped);
            return self.advance();
        }
        match c {
            '\n' | '\r' => {
                text.push('\n');
                self.inc_line()
            }
            'x' => {
                let mut value = 0u32;
                for _ in 0..2 {
                    self.advance()?;
                    let digit = self
                        .current
                        .and_then(|d| d.to_digit(16))
                        .ok_or_else(|| self.error("hexadecimal digit expected"))?;
                    value = value * 16 + digit;
                }
                text.push(byte_char(value));
                self.advance()
            }
            'z' => {
                self.advance()?;
                while let Some(c) = self.current.filter(|c| c.is_whitespace()) {
                    if is_newline(Some(c)) {
                        self.inc_line()?;
                    } else {
                        self.advance()?;
                    }
                }
                Ok(())
            }
            'u' => {
                self.advance()?;
                if self.current != Some('{') {
                    return Err(self.error("missing '{' in \\u{xxxx}"));
                }
                self.advance()?;
                let mut value = 0u32;
                let mut digits = 0;
                while let Some(d) = self.current.and_then(|d| d.to_digit(16)) {
                    value = value
                        .checked_mul(16)
                        .and_then(|v| v.checked_add(d))
                        .ok_or_else(|| self.error("UTF-8 value too large"))?;
                    digits += 1;
                    self.advance()?;
                }
                if digits == 0 {
                    return Err(self.error("hexadecimal digit expected"));
                }
                if self.current != Some('}') {
                    return Err(self.error("missing '}' in \\u{xxxx}"));
                }
                let decoded = char::from_u32(value).ok_or_else(|| self.error("UTF-8 value too large"))?;
                text.push(decoded);
                self.advance()
            }
            d if d.is_ascii_digit() => {
                let mut value = 0u32;
                let mut count = 0;
                while let Some(digit) = self.current.and_then(|d| d.to_digit(10)) {
                    if count == 3 {
                        break;
                    }
                    value = value * 10 + digit;
                    count += 1;
                    self.advance()?;
                }
                if value > 255 {
                    return Err(self.error("decimal escape too large"));
                }
                text.push(byte_char(value));
                Ok(())
            }
            _ => Err(self.error("invalid escape sequence")),
        }
    }

    /// Reads a numeral; `text` holds any characters already consumed (a leading `.`).
    fn read_numeral(&mut self, mut text: String) -> Result<Token, MacroError> {
        let mut exponent = ['e', 'E'];
        if text.is_empty() && self.current == Some('0') {
            text.push('0');
            self.advance()?;
            if let Some(x) = self.current.filter(|c| *c == 'x' || *c == 'X') {
                text.push(x);
                self.advance()?;
                exponent = ['p', 'P'];
            }
        }
        loop {
            match self.current {
                Some(c) if exponent.contains(&c) => {
                    text.push(c);
                    self.advance()?;
                    if let Some(sign) = self.current.filter(|c| *c == '+' || *c == '-') {
                        text.push(sign);
                        self.advance()?;
                    }
                }
                Some(c) if c.is_ascii_hexdigit() || c == '.' => {
                    text.push(c);
                    self.advance()?;
                }
                _ => break,
            }
        }
        // A numeral glued to a name is malformed (`3x`).
        if matches!(self.current, Some(c) if is_ident_char(c)) {
            return Err(self.error(format!("malformed number '{}'", text)));
        }
        str_to_number(&text).ok_or_else(|| self.error(format!("malformed number '{}'", text)))
    }
}

/// Converts a numeral to an integer or float token, following the language's rules:
/// decimal integers that overflow become floats, hexadecimal integers wrap around.
pub fn str_to_number(text: &str) -> Option<Token> {
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        if !hex.contains(['.', 'p']) {
            if hex.is_empty() {
                return None;
            }
            let mut value: i64 = 0;
            for d in hex.chars() {
                value = value.wrapping_mul(16).wrapping_add(d.to_digit(16)? as i64);
            }
            return Some(Token::Int(value));
        }
        return hex_float(hex).map(Token::Float);
    }
    if !lower.contains(['.', 'e']) {
        if lower.is_empty() || !lower.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        return Some(match lower.parse::<i64>() {
            Ok(i) => Token::Int(i),
            Err(_) => Token::Float(lower.parse::<f64>().ok()?),
        });
    }
    if lower.contains(|c: char| c.is_ascii_alphabetic() && c != 'e') {
        return None;
    }
    lower.parse::<f64>().ok().map(Token::Float)
}

fn hex_float(hex: &str) -> Option<f64> {
    let (mantissa, exp) = match hex.split_once('p') {
        Some((m, e)) => (m, e.parse::<i32>().ok()?),
        None => (hex, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut value = 0f64;
    for d in int_part.chars() {
        value = value * 16.0 + d.to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for d in frac_part.chars() {
        value += d.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exp))
}

fn byte_char(value: u32) -> char {
    char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
}

pub fn is_newline(c: Option<char>) -> bool {
    matches!(c, Some('\n') | Some('\r'))
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenizes a whole chunk without any macro handling.
pub fn tokenize_plain(name: &str, text: &str) -> Result<Vec<(Token, usize)>, MacroError> {
    let mut lexer = Lexer::new(StrFeed::new(name, text))?;
    let mut tokens = Vec::new();
    loop {
        let token = lexer.raw_next_token()?;
        let line = lexer.line();
        if token.is_eof() {
            return Ok(tokens);
        }
        tokens.push((token, line));
    }
}
