use std::io;
use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};
use clap::ValueEnum;

use crate::ParseError;

/// How parse errors are shown to the user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum Diagnostics {
    /// One `❌ <message>` line per error.
    #[default]
    Plain,
    /// Annotated source excerpts.
    Pretty,
}

/// Writes every parse error in the chosen style.
pub fn report_parse_errors(
    errors: &[ParseError],
    source_name: &str,
    input: &str,
    mode: Diagnostics,
) -> io::Result<()> {
    for error in errors {
        match mode {
            Diagnostics::Plain => println!("❌ {}", error),
            Diagnostics::Pretty => error.pretty_print(source_name, input)?,
        }
    }
    Ok(())
}

impl ParseError {
    fn report<'a>(
        &self,
        source_name: &'a str,
        config: Config,
    ) -> Report<'a, (&'a str, Range<usize>)> {
        let mut span = self.span().to_range();
        // End of input has no width; give the label one column to sit on.
        if span.is_empty() {
            span.end = span.start + 1;
        }
        let label = match self {
            ParseError::ExpectedToken { expected, .. } => format!("expected {} here", expected),
            ParseError::NoPrefixParseFn { .. } => "cannot start an expression".to_string(),
            ParseError::InvalidInteger { .. } => "does not fit in a 64-bit integer".to_string(),
        };

        Report::build(ReportKind::Error, (source_name, span.clone()))
            .with_config(config)
            .with_message(self.to_string())
            .with_label(Label::new((source_name, span)).with_message(label))
            .finish()
    }

    /// Prints the error as an annotated source excerpt on stderr.
    pub fn pretty_print(&self, source_name: &str, input: &str) -> io::Result<()> {
        self.report(source_name, Config::default())
            .eprint((source_name, Source::from(input)))
    }

    /// Renders the annotated excerpt without colour.
    pub fn render(&self, source_name: &str, input: &str) -> String {
        let mut out = Vec::new();
        let written = self
            .report(source_name, Config::default().with_color(false))
            .write((source_name, Source::from(input)), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}
