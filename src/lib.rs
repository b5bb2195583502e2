// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod builtins;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod repl;
pub mod source;
mod stack;
pub mod value;

pub use ast::{Node, Program};
pub use environment::{Env, EnvError, Environment};
pub use evaluator::{MAX_CALL_DEPTH, eval};
pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_str};
pub use source::Span;
pub use value::Value;
