//! [`ScriptHost`]: the bundled [`Host`] implementation.
//!
//! Compiling a macro body runs the chunk once; the function it returns is kept in an
//! append-only table and addressed by [`CallableId`]. Function macros receive their raw
//! argument texts as strings; reader macros receive the capabilities `advance`, `peek`
//! and `word`, in that order.
//!
//! ## Error Handling
//!
//! Every failure is `MacroError::Invocation` with the interpreter's message verbatim,
//! including lexical errors inside a body (reported as `chunk:line: message`).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::atoms::external::{OutputSink, StderrSink};
use crate::config::Limits;
use crate::runtime::ast::FuncBody;
use crate::runtime::eval::Interp;
use crate::runtime::parser::Parser;
use crate::runtime::value::{Capability, Value};
use crate::runtime::{CallableId, Host, HostValue, ReaderStream};
use crate::syntax::{tokenize_plain, Token};
use crate::{err_msg, ErrorType, MacroError};

pub struct ScriptHost {
    interp: Interp,
    callables: Vec<Value>,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new(&Limits::default())
    }
}

impl ScriptHost {
    /// A host whose `print` writes to stderr.
    pub fn new(limits: &Limits) -> Self {
        Self::with_output(limits, Rc::new(RefCell::new(StderrSink)))
    }

    pub fn with_output(limits: &Limits, output: Rc<RefCell<dyn OutputSink>>) -> Self {
        Self {
            interp: Interp::new(output, limits.max_call_depth),
            callables: Vec::new(),
        }
    }

    pub fn interp(&self) -> &Interp {
        &self.interp
    }

    /// Number of compiled macro bodies.
    pub fn len(&self) -> usize {
        self.callables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }

    /// Parses already-lexed tokens as a chunk.
    pub fn parse_tokens(&self, chunk: &str, tokens: Vec<(Token, usize)>) -> Result<Rc<FuncBody>, MacroError> {
        Parser::new(chunk, tokens).parse_chunk()
    }

    /// Runs a whole chunk given as tokens, e.g. the output of a macro-expanding lexer.
    pub fn run_tokens(&mut self, chunk: &str, tokens: Vec<(Token, usize)>) -> Result<Vec<Value>, MacroError> {
        let body = self.parse_tokens(chunk, tokens)?;
        let main = self.interp.load(body);
        self.interp.call(&main, Vec::new(), None)
    }

    fn callable(&self, id: CallableId) -> Result<Value, MacroError> {
        self.callables
            .get(id.0)
            .cloned()
            .ok_or_else(|| err_msg!(Internal, "unknown callable #{}", id.0))
    }
}

/// Strings pass; numbers convert the way the language converts them to strings.
fn to_host_value(values: Vec<Value>) -> HostValue {
    match values.into_iter().next().unwrap_or_default() {
        Value::Str(s) => HostValue::Str(s.to_string()),
        number @ (Value::Int(_) | Value::Float(_)) => HostValue::Str(number.to_string()),
        other => HostValue::Other(other.type_name()),
    }
}

impl Host for ScriptHost {
    fn compile(&mut self, source: &str, chunk: &str) -> Result<CallableId, MacroError> {
        let tokens = tokenize_plain(chunk, source).map_err(|e| match e.error_type() {
            ErrorType::Syntax => err_msg!(Invocation, "{}", e.located()),
            _ => e,
        })?;
        let body = self.parse_tokens(chunk, tokens)?;
        let main = self.interp.load(body);
        let produced = self.interp.call(&main, Vec::new(), None)?;
        let function = produced.into_iter().next().unwrap_or_default();
        if !matches!(function, Value::Function(_)) {
            return Err(err_msg!(
                Invocation,
                "{}: macro body did not produce a function (got {})",
                chunk,
                function.type_name()
            ));
        }
        let id = CallableId(self.callables.len());
        self.callables.push(function);
        debug!(chunk, id = id.0, "compiled macro body");
        Ok(id)
    }

    fn call(&mut self, id: CallableId, args: &[String]) -> Result<HostValue, MacroError> {
        let function = self.callable(id)?;
        let args = args.iter().map(|a| Value::str(a)).collect();
        let results = self.interp.call(&function, args, None)?;
        Ok(to_host_value(results))
    }

    fn call_reader(&mut self, id: CallableId, stream: &mut dyn ReaderStream) -> Result<HostValue, MacroError> {
        let function = self.callable(id)?;
        let capabilities = vec![
            Value::Capability(Capability::Advance),
            Value::Capability(Capability::Peek),
            Value::Capability(Capability::Word),
        ];
        let results = self.interp.call(&function, capabilities, Some(stream))?;
        Ok(to_host_value(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::external::BufferSink;

    /// Serves a fixed string through the reader capabilities.
    struct Fixed {
        chars: Vec<char>,
        pos: usize,
    }

    impl ReaderStream for Fixed {
        fn advance(&mut self) -> Result<char, MacroError> {
            let c = self.peek().ok_or_else(|| err_msg!(Stream, "end of stream"))?;
            self.pos += 1;
            Ok(c)
        }

        fn peek(&self) -> Option<char> {
            self.chars.get(self.pos).copied()
        }

        fn word(&mut self, _delimiter: Option<char>) -> Result<Option<String>, MacroError> {
            let rest: String = self.chars[self.pos..].iter().collect();
            self.pos = self.chars.len();
            Ok(Some(rest))
        }
    }

    #[test]
    fn compile_and_call_function_macro() {
        let mut host = ScriptHost::default();
        let id = host
            .compile("return function (a, b) return a .. '+' .. b end", "macro F")
            .unwrap();
        let out = host.call(id, &["x".to_string(), " y".to_string()]).unwrap();
        assert_eq!(out, HostValue::Str("x+ y".to_string()));
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn non_string_results_are_reported_by_type() {
        let mut host = ScriptHost::default();
        let id = host.compile("return function () return {} end", "macro T").unwrap();
        let out = host.call(id, &[]).unwrap();
        assert_eq!(out, HostValue::Other("table"));
        assert!(out.into_expansion().is_err());
        let id = host.compile("return function () return 7 end", "macro N").unwrap();
        assert_eq!(host.call(id, &[]).unwrap(), HostValue::Str("7".to_string()));
    }

    #[test]
    fn compile_errors_are_invocation_errors() {
        let mut host = ScriptHost::default();
        let err = host.compile("return function ( end", "macro BAD").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Invocation);
        assert!(err.to_string().starts_with("macro BAD:1:"), "{}", err);
        let err = host.compile("return 'x'", "macro S").unwrap_err();
        assert!(err.to_string().contains("did not produce a function"));
        let err = host.compile("return \"open", "macro Q").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Invocation);
        assert!(err.to_string().contains("unfinished string"));
    }

    #[test]
    fn reader_gets_capabilities_in_order() {
        let mut host = ScriptHost::default();
        let id = host
            .compile(
                "return function (next, peek, word) local a = next() local p = peek() return a .. p .. word() end",
                "macro R",
            )
            .unwrap();
        let mut stream = Fixed {
            chars: "abcd".chars().collect(),
            pos: 0,
        };
        let out = host.call_reader(id, &mut stream).unwrap();
        assert_eq!(out, HostValue::Str("abbcd".to_string()));
    }

    #[test]
    fn print_goes_to_the_sink() {
        let sink = Rc::new(RefCell::new(BufferSink::default()));
        let mut host = ScriptHost::with_output(&Limits::default(), sink.clone());
        let tokens = tokenize_plain("main", "print('a', 1, nil, 2.5)").unwrap();
        host.run_tokens("main", tokens).unwrap();
        assert_eq!(sink.borrow_mut().take(), "a\t1\tnil\t2.5\n");
    }
}
