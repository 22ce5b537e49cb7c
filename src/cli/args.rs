//! Defines the command-line arguments and subcommands for the lexmacro CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Limits;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "lexmacro",
    version,
    about = "Expand lexical macros in Lua-style source and inspect the result."
)]
pub struct LexmacroArgs {
    /// Limits file (YAML, or JSON by extension).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level for diagnostics on stderr (-v debug, -vv trace). Overrides LEXMACRO_LOG.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub limits: LimitArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Individual overrides of the configured limits.
#[derive(Debug, Default, Args)]
pub struct LimitArgs {
    #[arg(long, global = true, value_name = "N")]
    pub lookahead_capacity: Option<usize>,
    #[arg(long, global = true, value_name = "N")]
    pub replacement_capacity: Option<usize>,
    #[arg(long, global = true, value_name = "N")]
    pub argument_capacity: Option<usize>,
    #[arg(long, global = true, value_name = "N")]
    pub body_capacity: Option<usize>,
    #[arg(long, global = true, value_name = "N")]
    pub max_call_depth: Option<usize>,
}

impl LimitArgs {
    pub fn apply(&self, mut limits: Limits) -> Limits {
        let overrides = [
            (self.lookahead_capacity, &mut limits.lookahead_capacity),
            (self.replacement_capacity, &mut limits.replacement_capacity),
            (self.argument_capacity, &mut limits.argument_capacity),
            (self.body_capacity, &mut limits.body_capacity),
            (self.max_call_depth, &mut limits.max_call_depth),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        limits
    }
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the expanded character stream, with definitions removed.
    Expand {
        /// Files processed in order in one session.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the tokens of the expanded stream, one per line.
    Tokens {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show every expansion performed.
    Trace {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print the trace as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show a line diff between a file and its expansion.
    Diff {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Expand and run every `.lua` file under the given paths, one session per file.
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List the macros the files define.
    Macros {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
