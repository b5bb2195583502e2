use logos::Logos;
use std::fmt;

use crate::Span;

#[derive(Logos, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip comments
pub enum TokenKind {
    Eof,
    Illegal,

    #[regex(r"[a-zA-Z_]+")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    // Operators
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Asterisk,
    #[token("/")]
    Slash,
    #[token("!")]
    Bang,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("++")]
    Increment,
    #[token("--")]
    Decrement,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    AsteriskAssign,
    #[token("/=")]
    SlashAssign,

    // Delimiters
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(":")]
    Colon,
    #[token("::")]
    DoubleColon,
    #[token("|")]
    Bar,
    #[token("->")]
    OpenBlock,

    // Keywords, produced from `Ident` through `lookup_ident`
    Function,
    Value,
    Update,
    Constant,
    True,
    False,
    If,
    Else,
    Return,
    CloseBlock,
    Match,
    Default,
}

impl TokenKind {
    /// Maps identifier text to its keyword kind, or `Ident` when it is not reserved.
    pub fn lookup_ident(ident: &str) -> TokenKind {
        match ident {
            "fn" | "f" => TokenKind::Function,
            "value" => TokenKind::Value,
            "update" => TokenKind::Update,
            "constant" => TokenKind::Constant,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "is" => TokenKind::Eq,
            "not" => TokenKind::NotEq,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "end" => TokenKind::CloseBlock,
            "match" => TokenKind::Match,
            "default" => TokenKind::Default,
            _ => TokenKind::Ident,
        }
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Function
                | TokenKind::Value
                | TokenKind::Update
                | TokenKind::Constant
                | TokenKind::True
                | TokenKind::False
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::Return
                | TokenKind::CloseBlock
                | TokenKind::Match
                | TokenKind::Default
        )
    }
}

/// Every reserved word, used by the REPL completer.
pub const KEYWORDS: &[&str] = &[
    "fn", "value", "update", "constant", "true", "false", "if", "else", "return", "is", "not",
    "and", "or", "end", "match", "default",
];

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Eof => "EOF",
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Ident => "IDENT",
            TokenKind::Int => "INT",
            TokenKind::Str => "STRING",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Bang => "!",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Increment => "++",
            TokenKind::Decrement => "--",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::AsteriskAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Colon => ":",
            TokenKind::DoubleColon => "::",
            TokenKind::Bar => "|",
            TokenKind::OpenBlock => "->",
            TokenKind::Function => "FUNCTION",
            TokenKind::Value => "VALUE",
            TokenKind::Update => "UPDATE",
            TokenKind::Constant => "CONSTANT",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::If => "IF",
            TokenKind::Else => "ELSE",
            TokenKind::Return => "RETURN",
            TokenKind::CloseBlock => "end",
            TokenKind::Match => "MATCH",
            TokenKind::Default => "default",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            literal: literal.into(),
            span,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

mod unescape {
    pub fn unescape(s: &str) -> String {
        // un-escaping should only ever reduce the length of the string.
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some(other) => {
                        result.push('\\');
                        result.push(other);
                    }
                    None => result.push('\\'),
                }
            } else {
                result.push(c);
            }
        }
        result
    }
}

/// Pull-based scanner over Sepia source.
///
/// `next_token` never fails: unrecognised input becomes an `Illegal` token and
/// an exhausted lexer keeps returning `Eof`.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    exhausted: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str) -> Self {
        Lexer {
            inner: TokenKind::lexer(input),
            exhausted: false,
        }
    }

    pub fn next_token(&mut self) -> Token {
        if self.exhausted {
            return self.eof();
        }
        match self.inner.next() {
            Some(Ok(kind)) => {
                let slice = self.inner.slice();
                let span = Span::from(self.inner.span());
                match kind {
                    TokenKind::Ident => Token::new(TokenKind::lookup_ident(slice), slice, span),
                    TokenKind::Str => {
                        Token::new(kind, unescape::unescape(&slice[1..slice.len() - 1]), span)
                    }
                    _ => Token::new(kind, slice, span),
                }
            }
            Some(Err(())) => Token::new(
                TokenKind::Illegal,
                self.inner.slice(),
                Span::from(self.inner.span()),
            ),
            None => {
                self.exhausted = true;
                self.eof()
            }
        }
    }

    fn eof(&self) -> Token {
        let end = self.inner.source().len();
        Token::new(TokenKind::Eof, "", Span::new(end, end))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields tokens up to, but not including, `Eof`.
    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        (!token.is(TokenKind::Eof)).then_some(token)
    }
}

// Helper function to tokenize a string directly (useful for tests and completion)
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}
