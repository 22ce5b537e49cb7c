//! Character Source Adapter.
//!
//! Wraps an in-memory chunk and hands out one character at a time. The end of the chunk
//! is `None`, which no valid character can be confused with. A single pushback slot lets
//! the invocation engine return a character a reader macro fetched but did not consume.

use std::sync::Arc;

use miette::NamedSource;
use serde::{Deserialize, Serialize};

use crate::diagnostics::SourceArc;
use crate::{err_msg, MacroError};

/// Represents a byte span in a chunk.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn point(at: usize) -> Self {
        Self { start: at, end: at }
    }
}

/// A named chunk of source text, kept for error reporting.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> SourceArc {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// Pull-based character stream over one chunk.
#[derive(Debug)]
pub struct CharSource {
    named: SourceArc,
    text: String,
    pos: usize,
    pushback: Option<char>,
}

impl CharSource {
    pub fn new(context: SourceContext) -> Self {
        Self {
            named: context.to_named_source(),
            text: context.content,
            pos: 0,
            pushback: None,
        }
    }

    pub fn from_text(name: &str, text: &str) -> Self {
        Self::new(SourceContext::from_file(name, text))
    }

    pub fn name(&self) -> &str {
        self.named.name()
    }

    pub fn named_source(&self) -> &SourceArc {
        &self.named
    }

    /// Pulls the next raw character; the pushback slot is served first.
    pub fn next_raw(&mut self) -> Option<char> {
        if let Some(c) = self.pushback.take() {
            return Some(c);
        }
        let c = self.text[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Returns `c` to the stream. The slot holds one character.
    pub fn push_back(&mut self, c: char) -> Result<(), MacroError> {
        if let Some(held) = self.pushback {
            return Err(err_msg!(
                Internal,
                "pushback slot already holds {:?} while returning {:?}",
                held,
                c
            ));
        }
        self.pushback = Some(c);
        Ok(())
    }

    /// Byte offset of the next character to be delivered.
    pub fn offset(&self) -> usize {
        match self.pushback {
            Some(c) => self.pos.saturating_sub(c.len_utf8()),
            None => self.pos,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pushback.is_none() && self.pos >= self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulls_until_end_of_stream() {
        let mut src = CharSource::from_text("t", "aé");
        assert_eq!(src.next_raw(), Some('a'));
        assert_eq!(src.next_raw(), Some('é'));
        assert_eq!(src.offset(), 3);
        assert_eq!(src.next_raw(), None);
        assert_eq!(src.next_raw(), None);
        assert!(src.is_exhausted());
    }

    #[test]
    fn pushback_is_served_first_and_bounded() {
        let mut src = CharSource::from_text("t", "xy");
        let x = src.next_raw().unwrap();
        src.push_back(x).unwrap();
        assert_eq!(src.offset(), 0);
        assert!(src.push_back('z').is_err());
        assert_eq!(src.next_raw(), Some('x'));
        assert_eq!(src.next_raw(), Some('y'));
    }

    #[test]
    fn pushback_at_end_of_stream() {
        let mut src = CharSource::from_text("t", "q");
        let q = src.next_raw().unwrap();
        assert!(src.is_exhausted());
        src.push_back(q).unwrap();
        assert!(!src.is_exhausted());
        assert_eq!(src.next_raw(), Some('q'));
    }
}
