//! # Invocation Engine
//!
//! Runs a matched function or reader macro against the raw character stream.
//!
//! - **Function macros** read a parenthesised argument list as raw text. Arguments are
//!   split on top-level commas; commas and parentheses inside quoted strings or nested
//!   parentheses do not count. `()` is zero arguments, `(1,)` is `"1"` and `""`.
//! - **Reader macros** get the stream itself through [`ReaderStream`]. Expansion is
//!   suppressed for as long as the reader runs, and the character it peeked at last is
//!   returned to the stream afterwards.
//!
//! ## Error Handling
//!
//! | Situation                          | Error                                         |
//! |------------------------------------|-----------------------------------------------|
//! | no `(` after a function macro name | `Definition`: expected '(' to start ...       |
//! | end of stream inside the arguments | `Stream`: unfinished macro argument list      |
//! | unpaired quote, as in `F(it's)`    | `Stream`: unfinished macro argument list      |
//! | argument text over capacity        | `Overflow` (argument buffer)                  |
//! | reader advances past the end       | `Stream`: unexpected end of stream in ...     |

use crate::diagnostics::BufferKind;
use crate::macros::expander::{ExpansionState, Origin};
use crate::runtime::{CallableId, Host, ReaderStream};
use crate::syntax::lexer::{is_ident_char, is_ident_start};
use crate::{err_msg, MacroError};

// ============================================================================
// FUNCTION MACROS
// ============================================================================

/// Reads `( arg, ... )` raw from the stream. Characters read here never reach the lexer;
/// newlines among them are counted as hidden lines.
pub fn collect_arguments(state: &mut ExpansionState, capacity: usize) -> Result<Vec<String>, MacroError> {
    let open = loop {
        match state.pull_hidden() {
            Some(c) if c.is_whitespace() => continue,
            other => break other,
        }
    };
    if open != Some('(') {
        return Err(err_msg!(Definition, "expected '(' to start argument list"));
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut total = 0usize;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut saw_comma = false;

    loop {
        let c = state
            .pull_hidden()
            .ok_or_else(|| err_msg!(Stream, "unfinished macro argument list"))?;

        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' if depth == 0 => {
                    if saw_comma || !current.is_empty() {
                        args.push(current);
                    }
                    return Ok(args);
                }
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    saw_comma = true;
                    args.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            }
        }

        total += 1;
        if total > capacity {
            return Err(MacroError::overflow(BufferKind::Argument));
        }
        current.push(c);
    }
}

// ============================================================================
// READER MACROS
// ============================================================================

/// Calls a reader macro with suppression on, and returns its expansion.
pub fn run_reader(state: &mut ExpansionState, host: &mut dyn Host, callable: CallableId) -> Result<String, MacroError> {
    state.suppressed = true;
    let result = call_with_stream(state, host, callable);
    state.suppressed = false;
    result?.into_expansion()
}

fn call_with_stream(
    state: &mut ExpansionState,
    host: &mut dyn Host,
    callable: CallableId,
) -> Result<crate::runtime::HostValue, MacroError> {
    let mut input = ReaderInput::new(state);
    let value = host.call_reader(callable, &mut input);
    let restored = input.finish();
    let value = value?;
    restored?;
    Ok(value)
}

/// The raw stream as a reader macro sees it: one pending character, pulled ahead.
struct ReaderInput<'a> {
    state: &'a mut ExpansionState,
    pending: Option<(char, Origin)>,
}

impl<'a> ReaderInput<'a> {
    fn new(state: &'a mut ExpansionState) -> Self {
        let pending = state.pull_raw();
        Self { state, pending }
    }

    /// Returns the pending character to the stream.
    fn finish(mut self) -> Result<(), MacroError> {
        match self.pending.take() {
            Some((c, origin)) => self.state.unread(c, origin),
            None => Ok(()),
        }
    }

    fn take_if(&mut self, accept: impl Fn(char) -> bool, word: &mut String) -> Result<bool, MacroError> {
        match self.peek() {
            Some(c) if accept(c) => {
                word.push(self.advance()?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl ReaderStream for ReaderInput<'_> {
    fn advance(&mut self) -> Result<char, MacroError> {
        let (c, origin) = self
            .pending
            .take()
            .ok_or_else(|| err_msg!(Stream, "unexpected end of stream in reader macro"))?;
        self.state.count_hidden(c, origin);
        self.pending = self.state.pull_raw();
        Ok(c)
    }

    fn peek(&self) -> Option<char> {
        self.pending.map(|(c, _)| c)
    }

    fn word(&mut self, delimiter: Option<char>) -> Result<Option<String>, MacroError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance()?;
        }
        let Some(first) = self.peek() else {
            return Ok(None);
        };
        let mut word = String::new();
        if Some(first) == delimiter {
            word.push(self.advance()?);
            return Ok(Some(word));
        }
        if is_ident_start(first) {
            while self.take_if(is_ident_char, &mut word)? {}
        } else if first.is_ascii_digit() {
            while self.take_if(|c| c.is_ascii_digit(), &mut word)? {}
        } else if first.is_ascii_punctuation() {
            while self.take_if(|c| c.is_ascii_punctuation() && Some(c) != delimiter, &mut word)? {}
        } else {
            word.push(self.advance()?);
        }
        Ok(Some(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::source::CharSource;
    use crate::ErrorType;

    fn state(text: &str) -> ExpansionState {
        ExpansionState::new(CharSource::from_text("t", text), &Limits::default())
    }

    fn args(text: &str) -> Result<Vec<String>, MacroError> {
        collect_arguments(&mut state(text), 64)
    }

    #[test]
    fn splits_on_top_level_commas_only() {
        assert_eq!(args("(1,2)").unwrap(), vec!["1", "2"]);
        assert_eq!(args("( a , (b,c) )").unwrap(), vec![" a ", " (b,c) "]);
        assert_eq!(args("('x,)', \"y\\\"(\")").unwrap(), vec!["'x,)'", " \"y\\\"(\""]);
        assert_eq!(args("()").unwrap(), Vec::<String>::new());
        assert_eq!(args("(1,)").unwrap(), vec!["1", ""]);
        assert_eq!(args("(,)").unwrap(), vec!["", ""]);
    }

    #[test]
    fn whitespace_before_the_list_counts_lines() {
        let mut st = state(" \n (a\nb) rest");
        assert_eq!(collect_arguments(&mut st, 64).unwrap(), vec!["a\nb"]);
        assert_eq!(st.hidden_lines(), 2);
        assert_eq!(st.pull_raw().map(|(c, _)| c), Some(' '));
    }

    #[test]
    fn malformed_lists() {
        let err = args("x(1)").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Definition);
        assert_eq!(err.to_string(), "expected '(' to start argument list");
        assert_eq!(args("").unwrap_err().error_type(), ErrorType::Definition);
        let err = args("(1, (2)").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Stream);
        assert_eq!(err.to_string(), "unfinished macro argument list");
        let err = collect_arguments(&mut state("(abcdef)"), 4).unwrap_err();
        assert_eq!(err.to_string(), "macro expansion overflows argument buffer");
    }

    #[test]
    fn reader_words_and_pushback() {
        let mut st = state("  foo_1 = 42;; x");
        {
            let mut input = ReaderInput::new(&mut st);
            assert_eq!(input.word(None).unwrap().as_deref(), Some("foo_1"));
            assert_eq!(input.word(None).unwrap().as_deref(), Some("="));
            assert_eq!(input.word(None).unwrap().as_deref(), Some("42"));
            assert_eq!(input.word(Some(';')).unwrap().as_deref(), Some(";"));
            assert_eq!(input.peek(), Some(';'));
            input.finish().unwrap();
        }
        assert_eq!(st.pull_raw().map(|(c, _)| c), Some(';'));
    }

    #[test]
    fn reader_punctuation_runs_stop_at_the_delimiter() {
        let mut st = state("==> ; ~= é");
        let mut input = ReaderInput::new(&mut st);
        assert_eq!(input.word(Some(';')).unwrap().as_deref(), Some("==>"));
        assert_eq!(input.word(Some(';')).unwrap().as_deref(), Some(";"));
        assert_eq!(input.word(None).unwrap().as_deref(), Some("~="));
        assert_eq!(input.word(None).unwrap().as_deref(), Some("é"));
        assert_eq!(input.word(None).unwrap(), None);
    }

    #[test]
    fn expansion_newlines_are_not_hidden_lines() {
        let mut st = state("\n");
        st.replacement.load("a\nb".chars()).unwrap();
        let mut input = ReaderInput::new(&mut st);
        while input.peek().is_some() {
            input.advance().unwrap();
        }
        input.finish().unwrap();
        assert_eq!(st.hidden_lines(), 1);
    }

    #[test]
    fn reader_at_end_of_stream() {
        let mut st = state("a");
        let mut input = ReaderInput::new(&mut st);
        assert_eq!(input.advance().unwrap(), 'a');
        assert_eq!(input.peek(), None);
        assert_eq!(input.word(None).unwrap(), None);
        let err = input.advance().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Stream);
        input.finish().unwrap();
    }
}
