//! # Session
//!
//! A [`Session`] owns everything that outlives a single chunk: the macro registry, the host
//! runtime and the limits. Chunks processed by the same session share their macros.
//!
//! [`Session::lexer`] hands out a [`MacroLexer`], the tokenizer-facing surface. Its
//! `next_token` consumes `macro` / `readermacro` definitions itself, so callers only see
//! the tokens of the expanded program.
//!
//! ## Example
//!
//! ```
//! use lexmacro::Session;
//!
//! let mut session = Session::default();
//! let text = session.expand("demo", "macro PI \"3.14\"\nprint(PI)").unwrap();
//! assert_eq!(text, "\nprint(3.14)");
//! ```

use tracing::debug;

use crate::config::Limits;
use crate::macros::expander::Expander;
use crate::macros::registry::Registry;
use crate::macros::types::ExpansionStep;
use crate::macros::parse_definition;
use crate::runtime::{Host, ScriptHost, Value};
use crate::source::CharSource;
use crate::syntax::{Lexer, Token};
use crate::MacroError;

// ============================================================================
// MACRO-AWARE LEXER
// ============================================================================

/// A tokenizer over one chunk whose input goes through the expansion automaton.
pub struct MacroLexer<'s> {
    lexer: Lexer<Expander<'s>>,
}

impl<'s> MacroLexer<'s> {
    /// The next expanded character. Definitions are not handled at this level.
    pub fn next_char(&mut self) -> Result<Option<char>, MacroError> {
        let c = self.lexer.current();
        if c.is_some() {
            self.lexer.advance()?;
        }
        Ok(c)
    }

    /// The next token of the expanded program. Definitions are parsed, registered and
    /// skipped.
    pub fn next_token(&mut self) -> Result<Token, MacroError> {
        loop {
            let reader = match self.lexer.raw_next_token()? {
                Token::Macro => false,
                Token::ReaderMacro => true,
                token => return Ok(token),
            };
            parse_definition(&mut self.lexer, reader).map_err(|e| self.lexer.locate(e))?;
        }
    }

    /// Tokenizer line of the last token read.
    pub fn line(&self) -> usize {
        self.lexer.line()
    }

    pub fn take_trace(&mut self) -> Vec<ExpansionStep> {
        self.lexer.feed_mut().take_trace()
    }

    /// Every character delivered so far, with definitions left out.
    pub fn take_echo(&mut self) -> String {
        self.lexer.feed_mut().take_echo()
    }

    /// Reads the rest of the chunk as `(token, line)` pairs.
    pub fn collect_tokens(&mut self) -> Result<Vec<(Token, usize)>, MacroError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.is_eof() {
                return Ok(tokens);
            }
            tokens.push((token, self.line()));
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session<H: Host = ScriptHost> {
    registry: Registry,
    host: H,
    limits: Limits,
    trace_enabled: bool,
}

impl<H: Host> Session<H> {
    pub fn new(host: H, limits: Limits) -> Self {
        Self {
            registry: Registry::new(),
            host,
            limits,
            trace_enabled: false,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Records an [`ExpansionStep`] for every expansion in lexers created afterwards.
    pub fn set_trace(&mut self, on: bool) {
        self.trace_enabled = on;
    }

    /// A macro-aware lexer over `text`, named `name` in diagnostics.
    pub fn lexer(&mut self, name: &str, text: &str) -> Result<MacroLexer<'_>, MacroError> {
        self.make_lexer(name, text, false)
    }

    fn make_lexer(&mut self, name: &str, text: &str, echo: bool) -> Result<MacroLexer<'_>, MacroError> {
        debug!(chunk = name, macros = self.registry.len(), "starting chunk");
        let source = CharSource::from_text(name, text);
        let mut feed = Expander::new(source, &mut self.registry, &mut self.host, self.limits);
        if self.trace_enabled {
            feed = feed.with_trace();
        }
        if echo {
            feed = feed.with_echo();
        }
        Ok(MacroLexer {
            lexer: Lexer::new(feed)?,
        })
    }

    /// Tokenizes a whole chunk into `(token, line)` pairs.
    pub fn tokenize(&mut self, name: &str, text: &str) -> Result<Vec<(Token, usize)>, MacroError> {
        self.lexer(name, text)?.collect_tokens()
    }

    /// The exact character stream the tokenizer sees, with definitions removed.
    pub fn expand(&mut self, name: &str, text: &str) -> Result<String, MacroError> {
        Ok(self.expand_traced(name, text)?.0)
    }

    /// Like [`Session::expand`], also returning the expansions performed.
    pub fn expand_traced(&mut self, name: &str, text: &str) -> Result<(String, Vec<ExpansionStep>), MacroError> {
        let mut lexer = self.make_lexer(name, text, true)?;
        lexer.collect_tokens()?;
        Ok((lexer.take_echo(), lexer.take_trace()))
    }
}

impl Session<ScriptHost> {
    pub fn with_limits(limits: Limits) -> Self {
        Self::new(ScriptHost::new(&limits), limits)
    }

    /// Tokenizes `text` with macro expansion and runs it as a chunk.
    pub fn run(&mut self, name: &str, text: &str) -> Result<Vec<Value>, MacroError> {
        let tokens = self.tokenize(name, text)?;
        self.host.run_tokens(name, tokens)
    }
}

impl Default for Session<ScriptHost> {
    fn default() -> Self {
        Self::with_limits(Limits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorType;

    #[test]
    fn definitions_are_invisible_to_the_tokenizer() {
        let mut session = Session::default();
        let tokens = session.tokenize("t", "macro X \"1\"\nlocal a = X").unwrap();
        let kinds: Vec<Token> = tokens.into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Local,
                Token::Name("a".to_string()),
                Token::Assign,
                Token::Int(1)
            ]
        );
    }

    #[test]
    fn registry_is_shared_across_chunks() {
        let mut session = Session::default();
        session.expand("a", "macro GREETING \"'hi'\"").unwrap();
        assert_eq!(session.expand("b", "print(GREETING)").unwrap(), "print('hi')");
        assert_eq!(session.registry().len(), 1);
    }

    #[test]
    fn next_char_walks_the_expanded_stream() {
        let mut session = Session::default();
        session.registry_mut()
            .define("AB", crate::macros::MacroDefinition::Simple("xy".to_string()))
            .unwrap();
        let mut lexer = session.lexer("t", "zAB").unwrap();
        let mut out = String::new();
        while let Some(c) = lexer.next_char().unwrap() {
            out.push(c);
        }
        assert_eq!(out, "zxy");
    }

    #[test]
    fn errors_carry_a_line() {
        let mut session = Session::default();
        let err = session.tokenize("t", "\n\nmacro 1").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Stream);
        assert_eq!(err.line(), Some(3));
    }
}
