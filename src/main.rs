use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use rustyline::EditMode;
use rustyline::error::ReadlineError;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sepia::pretty_print::{Diagnostics, report_parse_errors};
use sepia::repl::{self, DEFAULT_HISTORY_FILE, ReplConfig};
use sepia::{Environment, Value, eval, parse_str};

const SOURCE_EXTENSION: &str = "sp";

/// Runs a Sepia program, or starts the interactive shell when no file is given.
#[derive(Debug, Parser)]
#[command(name = "sepia", version, about = "The Sepia programming language")]
struct Cli {
    /// `.sp` program to run
    file: Option<PathBuf>,

    /// Increase logging verbosity (-v: debug, -vv+: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// How parse errors are shown
    #[arg(long, value_enum, default_value_t = Diagnostics::Plain)]
    diagnostics: Diagnostics,

    /// Use vi key bindings in the shell
    #[arg(long)]
    vi: bool,

    /// Shell history file
    #[arg(long, default_value = DEFAULT_HISTORY_FILE)]
    history: PathBuf,

    /// Do not load or save shell history
    #[arg(long)]
    no_history: bool,
}

impl Cli {
    fn repl_config(&self) -> ReplConfig {
        ReplConfig {
            edit_mode: if self.vi { EditMode::Vi } else { EditMode::Emacs },
            history: (!self.no_history).then(|| self.history.clone()),
            diagnostics: self.diagnostics,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("START ERROR")]
    NotASourceFile(PathBuf),
    #[error("START ERROR")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} parse error(s)")]
    Parse(usize),
    #[error("ERROR: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_directive = directive_for_verbosity(cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.file {
        Some(path) => run_file(path, cli.diagnostics),
        None => repl::run(cli.repl_config()).map_err(CliError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match &error {
                CliError::NotASourceFile(path) | CliError::Unreadable { path, .. } => {
                    debug!(path = %path.display(), ?error, "refusing to start");
                    println!("{}", error);
                }
                // Already reported line by line.
                CliError::Parse(count) => debug!(count, "parse failed"),
                _ => eprintln!("{}", error),
            }
            ExitCode::FAILURE
        }
    }
}

fn directive_for_verbosity(v: u8) -> &'static str {
    match v {
        0 => "warn",
        1 => "sepia=debug",
        _ => "sepia=trace",
    }
}

fn read_source(path: &Path) -> Result<String, CliError> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
        return Err(CliError::NotASourceFile(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| CliError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

fn run_file(path: &Path, diagnostics: Diagnostics) -> Result<(), CliError> {
    let source = read_source(path)?;
    info!(path = %path.display(), bytes = source.len(), "running program");

    let (program, errors) = parse_str(&source);
    if !errors.is_empty() {
        report_parse_errors(&errors, &path.display().to_string(), &source, diagnostics)?;
        return Err(CliError::Parse(errors.len()));
    }

    let env = Environment::new();
    match eval(&program, &env) {
        Value::Error(message) => Err(CliError::Runtime(message)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_defaults() {
        assert_eq!(directive_for_verbosity(0), "warn");
        assert_eq!(directive_for_verbosity(1), "sepia=debug");
        assert_eq!(directive_for_verbosity(3), "sepia=trace");
    }

    #[test]
    fn rejects_wrong_extension() {
        let error = read_source(Path::new("program.txt")).unwrap_err();
        assert!(matches!(error, CliError::NotASourceFile(_)));
        assert_eq!(error.to_string(), "START ERROR");
    }

    #[test]
    fn rejects_missing_file() {
        let error = read_source(Path::new("definitely/not/here.sp")).unwrap_err();
        assert!(matches!(error, CliError::Unreadable { .. }));
        assert_eq!(error.to_string(), "START ERROR");
    }

    #[test]
    fn repl_config_from_flags() {
        let cli = Cli::parse_from(["sepia", "--vi", "--no-history"]);
        let config = cli.repl_config();
        assert_eq!(config.edit_mode, EditMode::Vi);
        assert!(config.history.is_none());

        let cli = Cli::parse_from(["sepia", "--diagnostics", "pretty", "main.sp"]);
        assert_eq!(cli.diagnostics, Diagnostics::Pretty);
        assert_eq!(cli.file, Some(PathBuf::from("main.sp")));
        assert_eq!(
            cli.repl_config().history,
            Some(PathBuf::from(DEFAULT_HISTORY_FILE))
        );
    }
}
