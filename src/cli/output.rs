//! Handles all user-facing output for the CLI.
//!
//! This module is responsible for colorizing output, rendering traces and diffs, and
//! generating JSON. By centralizing output logic here, every command writes to stdout
//! the same way.

use std::io;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::macros::{ExpansionStep, MacroKind};
use crate::syntax::Token;

/// Colour only when stdout is a terminal.
pub fn color_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(color_choice())
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints each expansion step with its arguments and output.
pub fn print_trace(out: &mut impl WriteColor, file: &str, trace: &[ExpansionStep]) -> io::Result<()> {
    for (i, step) in trace.iter().enumerate() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
        write!(out, "--- Step {}: {}", i, step.name)?;
        out.reset()?;
        writeln!(out, " ({}, {}:{}) ---", step.kind, file, step.line)?;
        if step.kind == MacroKind::Function {
            for (n, arg) in step.args.iter().enumerate() {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
                write!(out, "  arg {}:", n + 1)?;
                out.reset()?;
                writeln!(out, " {:?}", arg)?;
            }
        }
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(out, "  => {:?}", step.output)?;
        out.reset()?;
    }
    Ok(())
}

/// Prints a line diff between `before` and `after`.
pub fn print_diff(out: &mut impl WriteColor, before: &str, after: &str) -> io::Result<()> {
    let changeset = Changeset::new(before, after, "\n");
    for diff in &changeset.diffs {
        let (sign, color, text) = match diff {
            Difference::Same(x) => (' ', None, x),
            Difference::Add(x) => ('+', Some(Color::Green), x),
            Difference::Rem(x) => ('-', Some(Color::Red), x),
        };
        for line in text.split('\n') {
            out.set_color(ColorSpec::new().set_fg(color))?;
            write!(out, "{}{}", sign, line)?;
            out.reset()?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn print_tokens(out: &mut impl WriteColor, tokens: &[(Token, usize)]) -> io::Result<()> {
    for (token, line) in tokens {
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(out, "{:>5}", line)?;
        out.reset()?;
        writeln!(out, "  {}", token)?;
    }
    Ok(())
}

pub fn print_macros(out: &mut impl WriteColor, entries: &[(String, MacroKind)]) -> io::Result<()> {
    for (name, kind) in entries {
        let color = match kind {
            MacroKind::Simple => Color::Blue,
            MacroKind::Function => Color::Magenta,
            MacroKind::Reader => Color::Cyan,
        };
        out.set_color(ColorSpec::new().set_fg(Some(color)))?;
        write!(out, "{:<9}", kind.as_str())?;
        out.reset()?;
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

/// One `check` result line.
pub fn print_status(out: &mut impl WriteColor, path: &str, failure: Option<&str>) -> io::Result<()> {
    match failure {
        None => {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
            write!(out, "PASS")?;
            out.reset()?;
            writeln!(out, " {}", path)
        }
        Some(reason) => {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            write!(out, "FAIL")?;
            out.reset()?;
            writeln!(out, " {}: {}", path, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    fn render(f: impl FnOnce(&mut NoColor<Vec<u8>>) -> io::Result<()>) -> String {
        let mut out = NoColor::new(Vec::new());
        f(&mut out).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn diff_marks_changed_lines() {
        let text = render(|out| print_diff(out, "a\nPI\nc", "a\n3.14\nc"));
        assert!(text.starts_with(" a\n"), "{}", text);
        assert!(text.contains("-PI\n"));
        assert!(text.contains("+3.14\n"));
        assert!(text.ends_with(" c\n"));
    }

    #[test]
    fn trace_lists_arguments() {
        let step = ExpansionStep {
            name: "F".to_string(),
            kind: MacroKind::Function,
            args: vec!["1".to_string(), "".to_string()],
            output: "1+".to_string(),
            line: 2,
        };
        let text = render(|out| print_trace(out, "t.lua", &[step]));
        assert_eq!(
            text,
            "--- Step 0: F (function, t.lua:2) ---\n  arg 1: \"1\"\n  arg 2: \"\"\n  => \"1+\"\n"
        );
    }
}
