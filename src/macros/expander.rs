//! # Expansion Automaton
//!
//! [`Expander`] sits between a chunk's characters and the tokenizer. Every character the
//! lexer asks for goes through [`Expander::next_char`], which either delivers a source
//! character unchanged or, when a registered macro name completes, delivers the expansion
//! in its place.
//!
//! ## State
//!
//! [`ExpansionState`] owns the source and two bounded buffers:
//!
//! - `replacement`: the expansion being delivered. Its characters are never rescanned.
//! - `lookahead`: characters read while a partial match was pending and then abandoned.
//!   Each one is re-tested as a possible match start when it is delivered.
//!
//! Raw pulls (argument collection, reader macros, the form parser) take characters in
//! the same order the automaton would: replacement, then lookahead, then source.
//!
//! ## Error Handling
//!
//! Buffer overflows are `MacroError::Overflow` naming the buffer. Host failures pass
//! through unchanged. Positions are attached by the lexer that drives the feed.

use tracing::{debug, trace};

use crate::config::Limits;
use crate::diagnostics::{BufferKind, SourceArc};
use crate::macros::invoke;
use crate::macros::registry::{Registry, Step};
use crate::macros::types::{ExpansionStep, MacroDefinition};
use crate::runtime::Host;
use crate::source::CharSource;
use crate::syntax::CharFeed;
use crate::MacroError;

// ============================================================================
// BOUNDED BUFFERS
// ============================================================================

/// A fixed-capacity character buffer drained front to back.
#[derive(Debug, Clone)]
pub struct Buffer {
    chars: Vec<char>,
    pos: usize,
    capacity: usize,
    kind: BufferKind,
}

impl Buffer {
    pub fn new(kind: BufferKind, capacity: usize) -> Self {
        Self {
            chars: Vec::new(),
            pos: 0,
            capacity,
            kind,
        }
    }

    pub fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        Some(c)
    }

    pub fn is_drained(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Characters not delivered yet.
    pub fn remaining(&self) -> &[char] {
        &self.chars[self.pos.min(self.chars.len())..]
    }

    /// Makes `text` the next characters to deliver, ahead of whatever is still unread.
    pub fn load(&mut self, text: impl IntoIterator<Item = char>) -> Result<(), MacroError> {
        let mut chars: Vec<char> = text.into_iter().collect();
        chars.extend_from_slice(self.remaining());
        if chars.len() > self.capacity {
            return Err(MacroError::overflow(self.kind));
        }
        self.chars = chars;
        self.pos = 0;
        Ok(())
    }

    /// Steps back over the character delivered last.
    fn unread(&mut self) -> bool {
        if self.pos == 0 {
            return false;
        }
        self.pos -= 1;
        true
    }
}

/// Where a raw character was pulled from, so it can be returned there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Replacement,
    Lookahead,
    Source,
}

// ============================================================================
// EXPANSION STATE
// ============================================================================

/// Per-chunk state of the automaton.
#[derive(Debug)]
pub struct ExpansionState {
    pub source: CharSource,
    pub replacement: Buffer,
    pub lookahead: Buffer,
    /// Set inside comments, string literals and running reader macros.
    pub suppressed: bool,
    /// Newlines consumed raw, outside the lexer's view.
    hidden_lines: usize,
    /// Newlines handed to the lexer.
    seen_lines: usize,
    /// Newlines handed to the lexer out of the replacement buffer. They are not source
    /// lines, so they are taken off again.
    replayed_lines: usize,
}

impl ExpansionState {
    pub fn new(source: CharSource, limits: &Limits) -> Self {
        Self {
            source,
            replacement: Buffer::new(BufferKind::Replacement, limits.replacement_capacity),
            lookahead: Buffer::new(BufferKind::Lookahead, limits.lookahead_capacity),
            suppressed: false,
            hidden_lines: 0,
            seen_lines: 0,
            replayed_lines: 0,
        }
    }

    /// Next raw character and where it came from; no macro interception.
    pub fn pull_raw(&mut self) -> Option<(char, Origin)> {
        if let Some(c) = self.replacement.next() {
            return Some((c, Origin::Replacement));
        }
        if let Some(c) = self.lookahead.next() {
            return Some((c, Origin::Lookahead));
        }
        self.source.next_raw().map(|c| (c, Origin::Source))
    }

    /// Pulls a raw character that the lexer will never see, counting it if it is a
    /// source newline.
    pub fn pull_hidden(&mut self) -> Option<char> {
        let (c, origin) = self.pull_raw()?;
        self.count_hidden(c, origin);
        Some(c)
    }

    /// Counts `c` as a skipped source line. Expansion text has no source lines.
    pub fn count_hidden(&mut self, c: char, origin: Origin) {
        if c == '\n' && origin != Origin::Replacement {
            self.hidden_lines += 1;
        }
    }

    /// Returns the character pulled last to where it came from.
    pub fn unread(&mut self, c: char, origin: Origin) -> Result<(), MacroError> {
        let restored = match origin {
            Origin::Replacement => self.replacement.unread(),
            Origin::Lookahead => self.lookahead.unread(),
            Origin::Source => {
                self.source.push_back(c)?;
                true
            }
        };
        if !restored {
            return Err(crate::err_msg!(Internal, "cannot return {:?} to the {:?} buffer", c, origin));
        }
        Ok(())
    }

    pub fn hidden_lines(&self) -> usize {
        self.hidden_lines
    }

    pub fn replayed_lines(&self) -> usize {
        self.replayed_lines
    }

    /// Best-effort source line of the next character.
    pub fn line(&self) -> usize {
        (1 + self.seen_lines + self.hidden_lines).saturating_sub(self.replayed_lines)
    }
}

// ============================================================================
// THE AUTOMATON
// ============================================================================

/// Outcome of testing one character as the start of a macro name.
enum Match {
    /// No macro starts here; deliver the character.
    Deliver(char),
    Found { name: String, definition: MacroDefinition },
}

/// The macro-expanding character feed for one chunk.
pub struct Expander<'s> {
    pub(crate) state: ExpansionState,
    registry: &'s mut Registry,
    pub(crate) host: &'s mut dyn Host,
    limits: Limits,
    /// Set by the form parser while it reads a definition: characters bypass the automaton.
    raw_mode: bool,
    /// Origin of the last character delivered in raw mode.
    raw_origin: Option<Origin>,
    /// The character last delivered was a newline from the replacement buffer. It is
    /// counted once the lexer asks for the next one, which is when it has counted it too.
    replayed_newline: bool,
    trace: Option<Vec<ExpansionStep>>,
    echo: Option<String>,
    echo_mark: usize,
}

impl<'s> Expander<'s> {
    pub fn new(source: CharSource, registry: &'s mut Registry, host: &'s mut dyn Host, limits: Limits) -> Self {
        Self {
            state: ExpansionState::new(source, &limits),
            registry,
            host,
            limits,
            raw_mode: false,
            raw_origin: None,
            replayed_newline: false,
            trace: None,
            echo: None,
            echo_mark: 0,
        }
    }

    /// Records every expansion as an [`ExpansionStep`].
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    /// Records every character delivered to the lexer, minus macro definitions.
    pub fn with_echo(mut self) -> Self {
        self.echo = Some(String::new());
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        self.registry
    }

    pub fn state_mut(&mut self) -> &mut ExpansionState {
        &mut self.state
    }

    pub fn take_trace(&mut self) -> Vec<ExpansionStep> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn take_echo(&mut self) -> String {
        self.echo.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Drops the echo of the token being read (a definition keyword).
    pub fn discard_echo_token(&mut self) {
        let mark = self.echo_mark;
        if let Some(echo) = self.echo.as_mut() {
            echo.truncate(mark.min(echo.len()));
        }
    }

    pub fn set_raw_mode(&mut self, on: bool) {
        self.raw_mode = on;
        self.raw_origin = None;
    }

    /// Returns the lexer's lookahead, pulled in raw mode, so the automaton sees it again.
    pub fn unread_raw(&mut self, c: char) -> Result<(), MacroError> {
        let origin = self
            .raw_origin
            .take()
            .ok_or_else(|| crate::err_msg!(Internal, "no raw character to return"))?;
        if c == '\n' {
            self.state.seen_lines = self.state.seen_lines.saturating_sub(1);
        }
        self.replayed_newline = false;
        self.state.unread(c, origin)
    }

    /// The automaton: the next character the tokenizer should see.
    fn next_expanded(&mut self) -> Result<Option<(char, Origin)>, MacroError> {
        loop {
            if let Some(c) = self.state.replacement.next() {
                return Ok(Some((c, Origin::Replacement)));
            }
            let next = match self.state.lookahead.next() {
                Some(c) => Some(c),
                None => self.state.source.next_raw(),
            };
            let Some(c) = next else {
                return Ok(None);
            };
            // Lookahead holds source text that was read ahead.
            if self.state.suppressed {
                return Ok(Some((c, Origin::Source)));
            }
            match self.match_from(c)? {
                Match::Deliver(c) => return Ok(Some((c, Origin::Source))),
                Match::Found { name, definition } => self.expand(name, definition)?,
            }
        }
    }

    /// Tests `first` as the start of a macro name, reading ahead while the match is partial.
    fn match_from(&mut self, first: char) -> Result<Match, MacroError> {
        let registry: &Registry = self.registry;
        let mut node = match registry.step(registry.root(), first) {
            Step::Fail => return Ok(Match::Deliver(first)),
            Step::Terminal(definition) => {
                return Ok(Match::Found {
                    name: first.to_string(),
                    definition: definition.clone(),
                })
            }
            Step::Partial(node) => node,
        };
        let mut run = vec![first];
        loop {
            let next = match self.state.lookahead.next() {
                Some(c) => Some(c),
                None => self.state.source.next_raw(),
            };
            // End of stream never takes part in a match.
            let Some(c) = next else {
                break;
            };
            run.push(c);
            if run.len() > self.limits.lookahead_capacity {
                return Err(MacroError::overflow(BufferKind::Lookahead));
            }
            match registry.step(node, c) {
                Step::Partial(next) => node = next,
                Step::Terminal(definition) => {
                    return Ok(Match::Found {
                        name: run.iter().collect(),
                        definition: definition.clone(),
                    })
                }
                Step::Fail => break,
            }
        }
        trace!(run = %run.iter().collect::<String>(), "partial macro match abandoned");
        self.state.lookahead.load(run[1..].iter().copied())?;
        Ok(Match::Deliver(first))
    }

    /// Replaces a matched name with its expansion.
    fn expand(&mut self, name: String, definition: MacroDefinition) -> Result<(), MacroError> {
        let line = self.state.line();
        let (output, args) = match &definition {
            MacroDefinition::Simple(text) => (text.clone(), Vec::new()),
            MacroDefinition::Callable { callable, reader: false } => {
                let args = invoke::collect_arguments(&mut self.state, self.limits.argument_capacity)?;
                let output = self.host.call(*callable, &args)?.into_expansion()?;
                (output, args)
            }
            MacroDefinition::Callable { callable, reader: true } => {
                let output = invoke::run_reader(&mut self.state, &mut *self.host, *callable)?;
                (output, Vec::new())
            }
        };
        debug!(
            macro_name = name.as_str(),
            kind = definition.kind().as_str(),
            args = args.len(),
            line,
            "macro expanded"
        );
        self.state.replacement.load(output.chars())?;
        if let Some(trace) = self.trace.as_mut() {
            trace.push(ExpansionStep {
                name,
                kind: definition.kind(),
                args,
                output,
                line,
            });
        }
        Ok(())
    }
}

impl CharFeed for Expander<'_> {
    fn next_char(&mut self) -> Result<Option<char>, MacroError> {
        if std::mem::take(&mut self.replayed_newline) {
            self.state.replayed_lines += 1;
        }
        let next = if self.raw_mode {
            self.state.pull_raw().map(|(c, origin)| {
                self.raw_origin = Some(origin);
                (c, origin)
            })
        } else {
            let next = self.next_expanded()?;
            if let (Some((c, _)), Some(echo)) = (next, self.echo.as_mut()) {
                echo.push(c);
            }
            next
        };
        let Some((c, origin)) = next else {
            return Ok(None);
        };
        if c == '\n' {
            self.state.seen_lines += 1;
            self.replayed_newline = origin == Origin::Replacement;
        }
        Ok(Some(c))
    }

    fn set_suppressed(&mut self, on: bool) {
        self.state.suppressed = on;
    }

    fn hidden_lines(&self) -> usize {
        self.state.hidden_lines()
    }

    fn replayed_lines(&self) -> usize {
        self.state.replayed_lines()
    }

    fn offset(&self) -> usize {
        self.state.source.offset()
    }

    fn named_source(&self) -> &SourceArc {
        self.state.source.named_source()
    }

    fn mark_token(&mut self, current: Option<char>) {
        if let Some(echo) = self.echo.as_ref() {
            let held = current.map(char::len_utf8).unwrap_or(0);
            self.echo_mark = echo.len().saturating_sub(held);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CallableId, HostValue, ReaderStream};
    use crate::ErrorType;

    /// A host with no callables; only simple macros are used here.
    struct NoHost;

    impl Host for NoHost {
        fn compile(&mut self, _source: &str, _chunk: &str) -> Result<CallableId, MacroError> {
            Err(crate::err_msg!(Invocation, "no host"))
        }

        fn call(&mut self, _id: CallableId, _args: &[String]) -> Result<HostValue, MacroError> {
            Err(crate::err_msg!(Invocation, "no host"))
        }

        fn call_reader(&mut self, _id: CallableId, _stream: &mut dyn ReaderStream) -> Result<HostValue, MacroError> {
            Err(crate::err_msg!(Invocation, "no host"))
        }
    }

    fn drain(registry: &mut Registry, limits: Limits, text: &str) -> Result<String, MacroError> {
        let mut host = NoHost;
        let mut feed = Expander::new(CharSource::from_text("t", text), registry, &mut host, limits);
        let mut out = String::new();
        while let Some(c) = feed.next_char()? {
            out.push(c);
        }
        Ok(out)
    }

    fn simple(registry: &mut Registry, name: &str, text: &str) {
        registry.define(name, MacroDefinition::Simple(text.to_string())).unwrap();
    }

    #[test]
    fn buffer_load_keeps_unread_tail() {
        let mut buf = Buffer::new(BufferKind::Lookahead, 4);
        buf.load("ab".chars()).unwrap();
        assert_eq!(buf.next(), Some('a'));
        buf.load("xy".chars()).unwrap();
        assert_eq!(buf.remaining(), &['x', 'y', 'b']);
        let err = buf.load("123".chars()).unwrap_err();
        assert_eq!(err.to_string(), "macro expansion overflows lookahead buffer");
    }

    #[test]
    fn abandoned_partial_match_is_retested() {
        let mut reg = Registry::new();
        simple(&mut reg, "AB", "<ab>");
        simple(&mut reg, "BC", "<bc>");
        // "A" starts AB, fails on C; B is retested and starts BC.
        assert_eq!(drain(&mut reg, Limits::default(), "ABX ABC AAB").unwrap(), "<ab>X <ab>C A<ab>");
        assert_eq!(drain(&mut reg, Limits::default(), "ACBC").unwrap(), "AC<bc>");
    }

    #[test]
    fn expansion_is_not_rescanned() {
        let mut reg = Registry::new();
        simple(&mut reg, "X", "XY");
        simple(&mut reg, "Y", "!");
        assert_eq!(drain(&mut reg, Limits::default(), "XY").unwrap(), "XY!");
    }

    #[test]
    fn end_of_stream_ends_a_partial_match() {
        let mut reg = Registry::new();
        simple(&mut reg, "ABC", "x");
        assert_eq!(drain(&mut reg, Limits::default(), "zAB").unwrap(), "zAB");
    }

    #[test]
    fn overflowing_buffers_fail_loudly() {
        let mut reg = Registry::new();
        simple(&mut reg, "BIG", &"x".repeat(20));
        let limits = Limits {
            replacement_capacity: 10,
            lookahead_capacity: 3,
            ..Limits::default()
        };
        let err = drain(&mut reg, limits, "BIG").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Overflow);
        assert!(err.to_string().contains("replacement"));

        let mut reg = Registry::new();
        simple(&mut reg, "ABCDE", "y");
        let err = drain(&mut reg, limits, "ABCDE").unwrap_err();
        assert!(err.to_string().contains("lookahead"));
    }

    #[test]
    fn suppressed_characters_pass_through() {
        let mut reg = Registry::new();
        simple(&mut reg, "A", "1");
        let mut host = NoHost;
        let mut feed = Expander::new(CharSource::from_text("t", "AA"), &mut reg, &mut host, Limits::default());
        feed.set_suppressed(true);
        assert_eq!(feed.next_char().unwrap(), Some('A'));
        feed.set_suppressed(false);
        assert_eq!(feed.next_char().unwrap(), Some('1'));
    }
}
