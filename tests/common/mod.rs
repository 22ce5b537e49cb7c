//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use lexmacro::atoms::external::BufferSink;
use lexmacro::{Limits, MacroError, ScriptHost, Session, Token};
use walkdir::WalkDir;

pub fn session() -> Session {
    Session::default()
}

pub fn limited(limits: Limits) -> Session {
    Session::with_limits(limits)
}

/// Expands `text` in a fresh session, panicking on error.
pub fn expand(text: &str) -> String {
    session()
        .expand("test.lua", text)
        .unwrap_or_else(|e| panic!("expansion failed: {}\n{}", e, e.located()))
}

/// Expands `text` in a fresh session and returns the error it must raise.
pub fn expand_err(text: &str) -> MacroError {
    match session().expand("test.lua", text) {
        Ok(out) => panic!("expected an error, got {:?}", out),
        Err(e) => e,
    }
}

pub fn tokens(text: &str) -> Vec<(Token, usize)> {
    session()
        .tokenize("test.lua", text)
        .unwrap_or_else(|e| panic!("tokenize failed: {}", e))
}

/// Line of the first `Name(name)` token.
pub fn line_of(tokens: &[(Token, usize)], name: &str) -> usize {
    tokens
        .iter()
        .find(|(t, _)| matches!(t, Token::Name(n) if n == name))
        .map(|(_, line)| *line)
        .unwrap_or_else(|| panic!("no token named {}", name))
}

/// Runs `text` with `print` captured, returning the printed text.
pub fn run_output(text: &str) -> Result<String, MacroError> {
    let sink = Rc::new(RefCell::new(BufferSink::default()));
    let limits = Limits::default();
    let mut session = Session::new(ScriptHost::with_output(&limits, sink.clone()), limits);
    session.run("test.lua", text)?;
    let out = sink.borrow_mut().take();
    Ok(out)
}

/// All `.lua` files under `dir`, sorted.
pub fn scripts(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().map_or(false, |x| x == "lua"))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

pub fn fixture_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("scripts").join(name)
}
