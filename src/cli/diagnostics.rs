//! Diagnostic presentation for the CLI.
//!
//! Fatal errors are rendered by `miette` with the offending source line and label. The
//! `check` command reports one compact line per failing file instead.

use miette::Report;
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

use crate::cli::output::color_choice;
use crate::MacroError;

/// `Type error at line N: message`, or without the position when none is known.
pub fn summary(error: &MacroError) -> String {
    match error.line() {
        Some(line) => format!("{} error at line {}: {}", error.error_type(), line, error),
        None => format!("{} error: {}", error.error_type(), error),
    }
}

/// Prints a full diagnostic to standard error.
pub fn print_diagnostic_to_stderr(error: MacroError) {
    let mut stderr = StandardStream::stderr(color_choice());
    // The header line is ours; miette renders the snippet below it.
    let header = print_header(&mut stderr, &error);
    if header.is_err() {
        eprintln!("{}", summary(&error));
    }
    eprintln!("{:?}", Report::new(error));
}

fn print_header(writer: &mut impl WriteColor, error: &MacroError) -> std::io::Result<()> {
    writer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(writer, "{} error", error.error_type())?;
    writer.reset()?;
    match error.line() {
        Some(line) => writeln!(writer, " at line {}", line),
        None => writeln!(writer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err_msg;

    #[test]
    fn summary_includes_the_line_when_known() {
        let err = err_msg!(Stream, "unfinished macro argument list");
        assert_eq!(summary(&err), "Stream error: unfinished macro argument list");
        let src = crate::diagnostics::to_error_source("t", "F(1");
        let err = err.at(&src, crate::Span { start: 0, end: 3 }, 4);
        assert_eq!(summary(&err), "Stream error at line 4: unfinished macro argument list");
    }
}
