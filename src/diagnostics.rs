//! # lexmacro Diagnostics
//!
//! This module defines the unified, `miette`-based diagnostic system for the macro layer.
//! Every failure produced by the tokenizer, the expansion automaton, the form parser, the
//! invocation engine or the script host is represented by [`MacroError`].
//!
//! # Error Construction Macros
//!
//! - **Use `err_msg!` for message-only errors.** Position is attached later, at the lexer
//!   boundary, with [`MacroError::at`].
//!   - `err_msg!(Definition, "invalid macro name '{}'", name)`
//!
//! - **Use `err_ctx!` when a named source and span are already at hand.**
//!   - `err_ctx!(Syntax, "unfinished string", src, span, line)`
//!
//! # Rules
//!
//! - Errors never carry partial state: there is no local recovery, every error aborts the
//!   current chunk.
//! - Messages raised by the script host are surfaced verbatim inside `Invocation`.
//! - Buffer overflows are built with [`MacroError::overflow`] so the message names the buffer.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe classification of [`MacroError`] variants, used by tests and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Lexical errors raised by the host tokenizer
    Syntax,
    /// Malformed macro definitions
    Definition,
    /// A fixed-capacity buffer would have been exceeded
    Overflow,
    /// Host compile/runtime failures and non-string results
    Invocation,
    /// Unexpected end of stream inside a construct
    Stream,
    /// Engine bugs
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Syntax => "Syntax",
            ErrorType::Definition => "Definition",
            ErrorType::Overflow => "Overflow",
            ErrorType::Invocation => "Invocation",
            ErrorType::Stream => "Stream",
            ErrorType::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The fixed-capacity buffers owned by the expansion state and the form parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Lookahead,
    Replacement,
    Argument,
    Body,
}

impl BufferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferKind::Lookahead => "lookahead",
            BufferKind::Replacement => "replacement",
            BufferKind::Argument => "argument",
            BufferKind::Body => "body",
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    /// The chunk the error occurred in (if known).
    pub source: Option<SourceArc>,
    /// Byte span inside the chunk.
    pub span: Option<Span>,
    /// 1-based line number, as counted by the tokenizer.
    pub line: Option<usize>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: Span, line: usize) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            line: Some(line),
            help: None,
        }
    }
}

/// Unified error type for every failure mode of the macro layer.
#[derive(Debug, Error)]
pub enum MacroError {
    #[error("{message}")]
    Syntax {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Definition {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Overflow {
        buffer: BufferKind,
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Invocation {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Stream {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl MacroError {
    /// Builds the overflow error for `buffer`.
    pub fn overflow(buffer: BufferKind) -> Self {
        MacroError::Overflow {
            buffer,
            message: format!("macro expansion overflows {} buffer", buffer),
            ctx: ErrorContext::none(),
            source: None,
        }
    }

    fn ctx(&self) -> &ErrorContext {
        match self {
            MacroError::Syntax { ctx, .. }
            | MacroError::Definition { ctx, .. }
            | MacroError::Overflow { ctx, .. }
            | MacroError::Invocation { ctx, .. }
            | MacroError::Stream { ctx, .. }
            | MacroError::Internal { ctx, .. } => ctx,
        }
    }

    fn ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            MacroError::Syntax { ctx, .. }
            | MacroError::Definition { ctx, .. }
            | MacroError::Overflow { ctx, .. }
            | MacroError::Invocation { ctx, .. }
            | MacroError::Stream { ctx, .. }
            | MacroError::Internal { ctx, .. } => ctx,
        }
    }

    /// The bare message, without position.
    pub fn message(&self) -> &str {
        match self {
            MacroError::Syntax { message, .. }
            | MacroError::Definition { message, .. }
            | MacroError::Overflow { message, .. }
            | MacroError::Invocation { message, .. }
            | MacroError::Stream { message, .. }
            | MacroError::Internal { message, .. } => message,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            MacroError::Syntax { .. } => ErrorType::Syntax,
            MacroError::Definition { .. } => ErrorType::Definition,
            MacroError::Overflow { .. } => ErrorType::Overflow,
            MacroError::Invocation { .. } => ErrorType::Invocation,
            MacroError::Stream { .. } => ErrorType::Stream,
            MacroError::Internal { .. } => ErrorType::Internal,
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.ctx().line
    }

    pub fn span(&self) -> Option<Span> {
        self.ctx().span
    }

    /// Attaches a position unless the error already carries one.
    pub fn at(mut self, source: &SourceArc, span: Span, line: usize) -> Self {
        let ctx = self.ctx_mut();
        if ctx.source.is_none() {
            ctx.source = Some(Arc::clone(source));
        }
        if ctx.span.is_none() {
            ctx.span = Some(span);
        }
        if ctx.line.is_none() {
            ctx.line = Some(line);
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.ctx_mut().help = Some(help.into());
        self
    }

    /// `chunk:line: message`, the way the scripting language reports load errors.
    pub fn located(&self) -> String {
        let ctx = self.ctx();
        match (&ctx.source, ctx.line) {
            (Some(src), Some(line)) => format!("{}:{}: {}", src.name(), line, self),
            (None, Some(line)) => format!("?:{}: {}", line, self),
            _ => self.to_string(),
        }
    }
}

impl Diagnostic for MacroError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("lexmacro::{}", self.error_type())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.ctx();
        let span = ctx.span?;
        // Stream errors point at end of input; miette still needs a readable offset.
        let len = source_len(ctx);
        let start = span.start.min(len);
        let width = if span.end > span.start {
            span.end - span.start
        } else {
            usize::from(start < len)
        };
        let label = LabeledSpan::new(Some(self.message().to_string()), start, width);
        Some(Box::new(std::iter::once(label)))
    }
}

fn source_len(ctx: &ErrorContext) -> usize {
    ctx.source
        .as_ref()
        .map(|s| s.inner().len())
        .unwrap_or(usize::MAX)
}

/// Converts a chunk name and text into a shared `NamedSource`.
pub fn to_error_source(name: &str, text: &str) -> SourceArc {
    Arc::new(NamedSource::new(name, text.to_string()))
}

/// Constructs a `MacroError` variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)+) => {
        $crate::MacroError::$variant {
            message: format!($($arg)+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a `MacroError` variant with a message and a known position.
#[macro_export]
macro_rules! err_ctx {
    // Message, src, span, line, help
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $line:expr, $help:expr) => {
        $crate::MacroError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some($crate::diagnostics::SourceArc::clone($src)),
                span: Some($span),
                line: Some($line),
                help: Some(format!("{}", $help)),
            },
            source: None,
        }
    };
    // Message, src, span, line
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $line:expr) => {
        $crate::MacroError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
                $line,
            ),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn overflow_names_the_buffer() {
        let err = MacroError::overflow(BufferKind::Argument);
        assert_eq!(err.error_type(), ErrorType::Overflow);
        assert_eq!(err.to_string(), "macro expansion overflows argument buffer");
    }

    #[test]
    fn at_fills_only_missing_position() {
        let src = to_error_source("a.lua", "x = 1\ny = 2");
        let err = crate::err_msg!(Definition, "invalid macro name '{}'", "[[x")
            .at(&src, Span { start: 6, end: 7 }, 2);
        assert_eq!(err.line(), Some(2));
        let again = err.at(&src, Span { start: 0, end: 1 }, 1);
        assert_eq!(again.line(), Some(2));
        assert_eq!(again.located(), "a.lua:2: invalid macro name '[[x'");
    }

    #[test]
    fn report_renders_label_and_help() {
        let src = to_error_source("b.lua", "F(1, 2");
        let err = crate::err_ctx!(
            Stream,
            "unfinished macro argument list",
            &src,
            Span { start: 6, end: 6 },
            1,
            "close the list with ')'"
        );
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("unfinished macro argument list"));
        assert!(output.contains("close the list with ')'"));
    }
}
