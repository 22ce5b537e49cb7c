//! The lexmacro Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions. Files named on one command line share a session, so
//! macros defined in an earlier file are visible in later ones; `check` is the exception
//! and gives every file a fresh session.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::atoms::external::NullSink;
use crate::cli::args::{Command, LexmacroArgs};
use crate::config::Limits;
use crate::runtime::ScriptHost;
use crate::session::Session;
use crate::{err_msg, MacroError};

pub mod args;
pub mod diagnostics;
pub mod output;

/// Environment variable holding a `tracing` filter, used when `--verbose` is not given.
pub const LOG_ENV: &str = "LEXMACRO_LOG";

/// The main entry point for the CLI.
pub fn run() {
    let args = LexmacroArgs::parse();
    init_tracing(args.verbose);

    match execute(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            diagnostics::print_diagnostic_to_stderr(e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Runs one parsed command. `Ok(false)` means `check` found failing files.
pub fn execute(args: LexmacroArgs) -> Result<bool, MacroError> {
    let limits = load_limits(args.config.as_deref(), &args.limits)?;
    debug!(?limits, "limits");
    let mut out = output::stdout();
    let io = |e: std::io::Error| err_msg!(Internal, "cannot write output: {}", e);

    match args.command {
        Command::Expand { files } => {
            let mut session = Session::with_limits(limits);
            for file in &files {
                let (name, text) = read_source(file)?;
                print!("{}", session.expand(&name, &text)?);
            }
        }
        Command::Tokens { files } => {
            let mut session = Session::with_limits(limits);
            for file in &files {
                let (name, text) = read_source(file)?;
                let tokens = session.tokenize(&name, &text)?;
                output::print_tokens(&mut out, &tokens).map_err(io)?;
            }
        }
        Command::Trace { files, json } => {
            let mut session = Session::with_limits(limits);
            session.set_trace(true);
            for file in &files {
                let (name, text) = read_source(file)?;
                let (_, trace) = session.expand_traced(&name, &text)?;
                if json {
                    let text = serde_json::to_string_pretty(&trace)
                        .map_err(|e| err_msg!(Internal, "cannot serialize trace: {}", e))?;
                    println!("{}", text);
                } else {
                    output::print_trace(&mut out, &name, &trace).map_err(io)?;
                }
            }
        }
        Command::Diff { file } => {
            let mut session = Session::with_limits(limits);
            let (name, text) = read_source(&file)?;
            let expanded = session.expand(&name, &text)?;
            output::print_diff(&mut out, &text, &expanded).map_err(io)?;
        }
        Command::Check { paths } => {
            let files = discover_scripts(&paths)?;
            let mut failed = 0usize;
            for file in &files {
                let (name, text) = read_source(file)?;
                let host = ScriptHost::with_output(&limits, Rc::new(RefCell::new(NullSink)));
                let mut session = Session::new(host, limits);
                let failure = session.run(&name, &text).err().map(|e| diagnostics::summary(&e));
                failed += usize::from(failure.is_some());
                output::print_status(&mut out, &name, failure.as_deref()).map_err(io)?;
            }
            info!(files = files.len(), failed, "check finished");
            println!("{} passed, {} failed", files.len() - failed, failed);
            return Ok(failed == 0);
        }
        Command::Macros { files } => {
            let mut session = Session::with_limits(limits);
            for file in &files {
                let (name, text) = read_source(file)?;
                session.expand(&name, &text)?;
            }
            output::print_macros(&mut out, &session.registry().entries()).map_err(io)?;
        }
    }
    Ok(true)
}

fn load_limits(config: Option<&Path>, overrides: &args::LimitArgs) -> Result<Limits, MacroError> {
    let base = match config {
        Some(path) => Limits::load(path)?,
        None => Limits::default(),
    };
    Ok(overrides.apply(base))
}

fn read_source(path: &Path) -> Result<(String, String), MacroError> {
    let text = fs::read_to_string(path).map_err(|e| err_msg!(Internal, "cannot read '{}': {}", path.display(), e))?;
    Ok((path.display().to_string(), text))
}

/// Every `.lua` file named directly or found under a directory, sorted per root.
pub fn discover_scripts(paths: &[PathBuf]) -> Result<Vec<PathBuf>, MacroError> {
    let mut files = Vec::new();
    for root in paths {
        let mut found = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| err_msg!(Internal, "cannot walk '{}': {}", root.display(), e))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "lua") {
                found.push(path.to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}
