use std::borrow::Cow;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{
    Cmd, Completer, Config, Context, EditMode, Editor, EventHandler, Helper, Highlighter, Hinter,
    KeyCode, KeyEvent, Modifiers, Validator,
};
use tracing::{debug, warn};

use crate::builtins;
use crate::environment::{Env, Environment};
use crate::evaluator::eval;
use crate::lexer::{KEYWORDS, Token, TokenKind, tokenize};
use crate::parser::{ParseError, parse_str};
use crate::pretty_print::{Diagnostics, report_parse_errors};
use crate::value::Value;

pub const PROMPT: &str = "#> ";
pub const DEFAULT_HISTORY_FILE: &str = ".sepia_history";

const GREEN: &str = "\x1b[32m";
const MAGENTA: &str = "\x1b[35m";
const RED: &str = "\x1b[31m";
const BOLD_BLUE: &str = "\x1b[1;34m";
const RESET: &str = "\x1b[0m";

/// Interactive shell settings.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    pub edit_mode: EditMode,
    /// `None` disables loading and saving history.
    pub history: Option<PathBuf>,
    pub diagnostics: Diagnostics,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            edit_mode: EditMode::Emacs,
            history: Some(PathBuf::from(DEFAULT_HISTORY_FILE)),
            diagnostics: Diagnostics::Plain,
        }
    }
}

/// What one line of input produced.
#[derive(Debug)]
pub enum Outcome {
    ParseErrors(Vec<ParseError>),
    /// A value to echo.
    Value(Value),
    /// The input only bound names, or was empty.
    Silent,
}

/// Parses and evaluates `input` against the shared environment.
pub fn evaluate_input(input: &str, env: &Env) -> Outcome {
    let (program, errors) = parse_str(input);
    if !errors.is_empty() {
        return Outcome::ParseErrors(errors);
    }
    let value = eval(&program, env);
    match program.statements.last() {
        Some(statement) if !statement.is_binding() || value.is_error() => Outcome::Value(value),
        _ => Outcome::Silent,
    }
}

pub fn greeting() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "there".to_string());
    format!("Hello {}! Welcome to the Sepia programming language.", user)
}

// --- Editor helpers ---

struct SepiaCompleter {
    env: Env,
}

impl SepiaCompleter {
    fn new(env: Env) -> Self {
        SepiaCompleter { env }
    }

    /// Names that extend `prefix`, as the text still to be typed.
    fn suffixes(&self, prefix: &str) -> Vec<String> {
        let mut names = self.env.borrow().identifiers();
        names.extend(KEYWORDS.iter().map(|k| k.to_string()));
        names.extend(builtins::names().map(str::to_string));

        let mut suffixes: Vec<String> = names
            .into_iter()
            .filter(|name| name.len() > prefix.len() && name.starts_with(prefix))
            .map(|name| name[prefix.len()..].to_string())
            .collect();
        suffixes.sort();
        suffixes
    }
}

impl rustyline::completion::Completer for SepiaCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let before = &line[..pos];
        let candidates = match tokenize(before).last() {
            // Only complete a word the cursor is still touching.
            Some(token) if token.span.end == pos && is_word(token) => self.suffixes(&token.literal),
            _ => vec![],
        };
        Ok((pos, candidates))
    }
}

fn is_word(token: &Token) -> bool {
    token.kind == TokenKind::Ident || token.kind.is_keyword()
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: SepiaValidator,
    #[rustyline(Highlighter)]
    highlighter: SepiaHighlighter,
    #[rustyline(Completer)]
    completer: SepiaCompleter,
}

fn closer_for(opener: TokenKind) -> Option<TokenKind> {
    match opener {
        TokenKind::LParen => Some(TokenKind::RParen),
        TokenKind::LBracket => Some(TokenKind::RBracket),
        TokenKind::LBrace => Some(TokenKind::RBrace),
        TokenKind::OpenBlock => Some(TokenKind::CloseBlock),
        _ => None,
    }
}

fn is_closer(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace | TokenKind::CloseBlock
    )
}

fn is_unterminated_string(token: &Token) -> bool {
    token.kind == TokenKind::Illegal && token.literal.starts_with('"')
}

struct SepiaValidator;

impl SepiaValidator {
    fn check(input: &str) -> ValidationResult {
        let mut open: Vec<TokenKind> = Vec::new();

        for token in tokenize(input) {
            if is_unterminated_string(&token) {
                return ValidationResult::Incomplete;
            }
            if let Some(closer) = closer_for(token.kind) {
                open.push(closer);
            } else if is_closer(token.kind) && open.pop() != Some(token.kind) {
                return ValidationResult::Invalid(Some(format!(
                    "  - Unmatched '{}' at position {}",
                    token.literal, token.span.start
                )));
            }
        }

        if open.is_empty() {
            ValidationResult::Valid(None)
        } else {
            ValidationResult::Incomplete
        }
    }
}

impl Validator for SepiaValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        Ok(Self::check(ctx.input()))
    }
}

struct SepiaHighlighter;

impl SepiaHighlighter {
    /// Token indices of the bracket pair touching the cursor, if any.
    fn bracket_pair(tokens: &[Token], pos: usize) -> Option<(usize, usize)> {
        let touches = |token: &Token| token.span.start == pos || token.span.end == pos;
        let mut open: Vec<usize> = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            if closer_for(token.kind).is_some() {
                open.push(i);
            } else if is_closer(token.kind) {
                let opener = open.pop()?;
                if closer_for(tokens[opener].kind) == Some(token.kind)
                    && (touches(&tokens[opener]) || touches(token))
                {
                    return Some((opener, i));
                }
            }
        }
        None
    }

    fn paint(line: &str, pos: usize) -> String {
        let tokens = tokenize(line);
        let pair = Self::bracket_pair(&tokens, pos);
        let mut highlighted = String::with_capacity(line.len() * 2);
        let mut last = 0;

        for (i, token) in tokens.iter().enumerate() {
            let range = token.span.to_range();
            highlighted.push_str(&line[last..range.start]);
            let text = &line[range.clone()];
            let color = match token.kind {
                TokenKind::Str => Some(GREEN),
                TokenKind::Illegal => Some(RED),
                kind if kind.is_keyword() => Some(MAGENTA),
                _ if pair.is_some_and(|(open, close)| i == open || i == close) => Some(BOLD_BLUE),
                _ => None,
            };
            match color {
                Some(color) => {
                    highlighted.push_str(color);
                    highlighted.push_str(text);
                    highlighted.push_str(RESET);
                }
                None => highlighted.push_str(text),
            }
            last = range.end;
        }
        highlighted.push_str(&line[last..]);
        highlighted
    }
}

impl Highlighter for SepiaHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        Cow::Owned(Self::paint(line, pos))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

// --- Main loop ---

/// Runs the interactive shell until `exit` or end of input.
pub fn run(config: ReplConfig) -> rustyline::Result<()> {
    println!("{}", greeting());
    println!("Type 'exit' or press Ctrl-D to quit.");

    let global_env = Environment::new();
    let helper = InputHelper {
        validator: SepiaValidator,
        highlighter: SepiaHighlighter,
        completer: SepiaCompleter::new(global_env.clone()),
    };
    let editor_config = Config::builder().edit_mode(config.edit_mode).build();
    let mut rl = Editor::with_config(editor_config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if let Some(path) = &config.history {
        if rl.load_history(path).is_err() {
            debug!(path = %path.display(), "no previous history");
        }
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                rl.add_history_entry(input)?;
                if input == "exit" {
                    break;
                }

                match evaluate_input(input, &global_env) {
                    Outcome::ParseErrors(errors) => {
                        if let Err(error) =
                            report_parse_errors(&errors, "REPL", input, config.diagnostics)
                        {
                            warn!(%error, "could not write diagnostics");
                        }
                    }
                    Outcome::Value(value) => println!("{}", value),
                    Outcome::Silent => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                println!("\nExiting.");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    match &config.history {
        Some(path) => rl.save_history(path),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_value(outcome: Outcome, expected: &str) {
        match outcome {
            Outcome::Value(value) => assert_eq!(value.to_string(), expected),
            other => panic!("Expected value {}, got {:?}", expected, other),
        }
    }

    #[test]
    fn test_environment_persists_between_lines() {
        let env = Environment::new();
        assert!(matches!(evaluate_input("value x = 40;", &env), Outcome::Silent));
        assert!(matches!(evaluate_input("update x = x + 1", &env), Outcome::Silent));
        assert_value(evaluate_input("x + 1", &env), "42");
    }

    #[test]
    fn test_errors_are_reported() {
        let env = Environment::new();
        match evaluate_input("value x 5;", &env) {
            Outcome::ParseErrors(errors) => assert_eq!(errors.len(), 1),
            other => panic!("Expected parse errors, got {:?}", other),
        }
        assert_value(
            evaluate_input("value y = missing;", &env),
            "ERROR: identifier not found: missing",
        );
        assert_value(evaluate_input("print(1)", &env), "null");
    }

    #[test]
    fn test_validator() {
        assert!(matches!(SepiaValidator::check("fn(x) {"), ValidationResult::Incomplete));
        assert!(matches!(SepiaValidator::check("if (x) -> 1"), ValidationResult::Incomplete));
        assert!(matches!(SepiaValidator::check("\"open"), ValidationResult::Incomplete));
        assert!(matches!(SepiaValidator::check("[1, 2]"), ValidationResult::Valid(None)));
        assert!(matches!(SepiaValidator::check("if (x) -> 1 end"), ValidationResult::Valid(None)));
        assert!(matches!(SepiaValidator::check("(1]"), ValidationResult::Invalid(Some(_))));
    }

    #[test]
    fn test_completion_candidates() {
        let env = Environment::new();
        env.borrow_mut().define("velocity", Value::Integer(1));
        let completer = SepiaCompleter::new(env);
        assert_eq!(completer.suffixes("val"), ["ue"]);
        assert_eq!(completer.suffixes("ve"), ["locity"]);
        assert_eq!(completer.suffixes("app"), ["end"]);
        assert!(completer.suffixes("zz").is_empty());
    }

    #[test]
    fn test_highlighting() {
        let painted = SepiaHighlighter::paint(r#"value s = "hi";"#, 0);
        assert!(painted.contains(&format!("{}value{}", MAGENTA, RESET)));
        assert!(painted.contains(&format!("{}\"hi\"{}", GREEN, RESET)));
        let painted = SepiaHighlighter::paint("f(1)", 4);
        assert!(painted.contains(&format!("{}({}", BOLD_BLUE, RESET)));
        assert!(painted.contains(&format!("{}){}", BOLD_BLUE, RESET)));
        // Text between tokens survives untouched.
        assert_eq!(SepiaHighlighter::paint("1  +  2 // sum", 0), "1  +  2 // sum");
    }

    #[test]
    fn test_greeting() {
        assert!(greeting().ends_with("! Welcome to the Sepia programming language."));
    }
}
