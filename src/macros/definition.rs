//! # Macro Form Parser
//!
//! Consumes a definition once the lexer has read `macro` or `readermacro`:
//!
//! ```text
//! macro NAME "replacement text"
//! macro NAME (params) body end
//! readermacro NAME (advance, peek, word) body end
//! ```
//!
//! The whole definition is read with the automaton switched off, so macro names inside a
//! body are only expanded when the body runs. Bodies are re-serialized token by token
//! behind a `return function ` prologue and compiled by the host.
//!
//! ## Error Handling
//!
//! Malformed definitions are `Definition` errors, end of stream inside a name or body is a
//! `Stream` error, and a body over capacity is an `Overflow` of the body buffer. Compile
//! failures come back from the host as `Invocation` errors.

use crate::diagnostics::BufferKind;
use crate::macros::expander::Expander;
use crate::macros::types::MacroDefinition;
use crate::syntax::lexer::is_newline;
use crate::syntax::{Lexer, Token};
use crate::{err_msg, MacroError};

const BODY_PROLOGUE: &str = "return function ";

/// Parses one definition and registers it. On return the lexer holds the first character
/// after the definition, read through the automaton again.
pub fn parse_definition(lexer: &mut Lexer<Expander<'_>>, reader: bool) -> Result<(), MacroError> {
    lexer.feed_mut().discard_echo_token();
    lexer.feed_mut().set_raw_mode(true);

    let keyword = if reader { "readermacro" } else { "macro" };
    let name = read_name(lexer, keyword)?;
    skip_whitespace(lexer)?;

    let definition = if lexer.current() == Some('(') {
        let body = read_body(lexer)?;
        let chunk = format!("{} {}", keyword, name);
        let callable = lexer.feed_mut().host.compile(&body, &chunk)?;
        if reader {
            MacroDefinition::reader(callable)
        } else {
            MacroDefinition::function(callable)
        }
    } else if reader {
        return Err(err_msg!(Definition, "reader macro '{}' needs a parameter list", name));
    } else {
        match lexer.raw_next_token()? {
            Token::Str(text) => MacroDefinition::Simple(text),
            other => {
                return Err(err_msg!(
                    Definition,
                    "string literal expected after macro name '{}'",
                    name
                )
                .with_help(format!("found {}", other)))
            }
        }
    };
    lexer.feed_mut().registry_mut().define(&name, definition)?;

    if let Some(c) = lexer.current() {
        lexer.feed_mut().unread_raw(c)?;
    }
    lexer.feed_mut().set_raw_mode(false);
    lexer.advance()
}

/// The name runs from after the keyword's single separator to the next whitespace.
fn read_name(lexer: &mut Lexer<Expander<'_>>, keyword: &str) -> Result<String, MacroError> {
    if !matches!(lexer.current(), Some(c) if c.is_whitespace()) {
        return Err(err_msg!(Definition, "expected whitespace after '{}'", keyword));
    }
    step_over_whitespace(lexer)?;

    let mut name = String::new();
    loop {
        match lexer.current() {
            None => return Err(err_msg!(Stream, "unfinished macro name")),
            Some(c) if c.is_whitespace() => break,
            Some(c) => {
                name.push(c);
                lexer.advance()?;
            }
        }
    }
    if name.is_empty() {
        return Err(err_msg!(Definition, "expected macro name after '{}'", keyword)
            .with_help(format!("put exactly one space between '{}' and the name", keyword)));
    }
    validate_name(&name)?;
    Ok(name)
}

fn validate_name(name: &str) -> Result<(), MacroError> {
    if name.contains('(') {
        return Err(err_msg!(Definition, "invalid macro name '{}'", name)
            .with_help("separate the name from its parameter list with a space"));
    }
    let bracket = |open: char, close: char| {
        name.match_indices(open).any(|(at, _)| {
            let rest = name[at + 1..].trim_start_matches('=');
            rest.starts_with(close)
        })
    };
    if bracket('[', '[') || bracket(']', ']') {
        return Err(err_msg!(Definition, "invalid macro name '{}'", name)
            .with_help("macro names must not contain long-bracket delimiters"));
    }
    Ok(())
}

fn step_over_whitespace(lexer: &mut Lexer<Expander<'_>>) -> Result<(), MacroError> {
    if is_newline(lexer.current()) {
        lexer.inc_line()
    } else {
        lexer.advance()
    }
}

fn skip_whitespace(lexer: &mut Lexer<Expander<'_>>) -> Result<(), MacroError> {
    while matches!(lexer.current(), Some(c) if c.is_whitespace()) {
        step_over_whitespace(lexer)?;
    }
    Ok(())
}

/// Reads `(params) ... end` and returns it as a chunk that evaluates to the function.
fn read_body(lexer: &mut Lexer<Expander<'_>>) -> Result<String, MacroError> {
    let capacity = lexer.feed().limits().body_capacity;
    let mut text = String::from(BODY_PROLOGUE);
    let mut len = BODY_PROLOGUE.len();
    let mut parens: isize = 0;
    let mut blocks: isize = 1;
    let mut after_elseif = false;
    let mut line = lexer.line();

    loop {
        let token = lexer.raw_next_token()?;
        match token {
            Token::Eof => return Err(err_msg!(Stream, "unfinished macro body")),
            Token::LParen => parens += 1,
            Token::RParen => parens -= 1,
            Token::Do | Token::Function => blocks += 1,
            Token::Elseif => after_elseif = true,
            Token::Then if after_elseif => after_elseif = false,
            Token::Then => blocks += 1,
            Token::End => blocks -= 1,
            _ => {}
        }
        if parens < 0 {
            return Err(err_msg!(Definition, "unbalanced ')' in macro body"));
        }
        if blocks < 0 {
            return Err(err_msg!(Definition, "unbalanced 'end' in macro body"));
        }

        // Body lines stay aligned with the source lines.
        let now = lexer.line();
        let source = token.to_source();
        len += now.saturating_sub(line) + source.chars().count() + 1;
        if len > capacity {
            return Err(MacroError::overflow(BufferKind::Body));
        }
        for _ in line..now {
            text.push('\n');
        }
        line = now;
        text.push_str(&source);
        text.push(' ');

        if parens == 0 && blocks == 0 {
            return Ok(text);
        }
    }
}
