use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::Span;
use crate::ast::{BlockStatement, Expression, FunctionLiteral, Identifier, Program, Statement};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Expected next token to be {expected}, got {found} instead")]
    ExpectedToken {
        expected: TokenKind,
        found: TokenKind,
        span: Span,
    },
    #[error("no prefix parse function for {kind} found")]
    NoPrefixParseFn { kind: TokenKind, span: Span },
    #[error("could not parse {literal} as integer")]
    InvalidInteger { literal: String, span: Span },
}

impl ParseError {
    /// Location of the token that triggered the error.
    pub fn span(&self) -> Span {
        match self {
            ParseError::ExpectedToken { span, .. }
            | ParseError::NoPrefixParseFn { span, .. }
            | ParseError::InvalidInteger { span, .. } => *span,
        }
    }
}

/// Binding power of operators, lowest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    And,
    Or,
    Equals,      // ==
    LessGreater, // > or <
    Sum,         // +
    Product,     // *
    Prefix,      // -x or !x
    Call,        // f(x)
    Index,       // xs[i]
}

impl Precedence {
    fn of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::And => Precedence::And,
            TokenKind::Or => Precedence::Or,
            TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => {
                Precedence::LessGreater
            }
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
            TokenKind::LParen => Precedence::Call,
            TokenKind::LBracket => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    peek: Token,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    pub fn new(mut lexer: Lexer<'src>) -> Self {
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Parser {
            lexer,
            current,
            peek,
            errors: Vec::new(),
        }
    }

    /// Parses statements until end of input.
    ///
    /// A statement that fails to parse is skipped; its error is recorded and
    /// parsing carries on with the next token, so one pass reports as many
    /// errors as possible.
    pub fn parse_program(&mut self) -> (Program, Vec<ParseError>) {
        let mut program = Program::default();
        while !self.current_is(TokenKind::Eof) {
            if let Some(statement) = self.parse_statement() {
                program.statements.push(statement);
            }
            self.next_token();
        }
        (program, std::mem::take(&mut self.errors))
    }

    fn next_token(&mut self) {
        let next = self.lexer.next_token();
        self.current = std::mem::replace(&mut self.peek, next);
    }

    fn current_is(&self, kind: TokenKind) -> bool {
        self.current.is(kind)
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.is(kind)
    }

    fn peek_precedence(&self) -> Precedence {
        Precedence::of(self.peek.kind)
    }

    fn current_precedence(&self) -> Precedence {
        Precedence::of(self.current.kind)
    }

    fn record(&mut self, error: ParseError) {
        debug!(%error, span = %error.span(), "parse error");
        self.errors.push(error);
    }

    fn peek_error(&mut self, expected: TokenKind) {
        self.record(ParseError::ExpectedToken {
            expected,
            found: self.peek.kind,
            span: self.peek.span,
        });
    }

    /// Advances when the peek token is `kind`; records an error otherwise.
    fn expect_peek(&mut self, kind: TokenKind) -> Option<()> {
        if self.peek_is(kind) {
            self.next_token();
            Some(())
        } else {
            self.peek_error(kind);
            None
        }
    }

    fn skip_semicolon(&mut self) {
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
    }

    // --- Statements ---

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.current.kind {
            TokenKind::Value => self.parse_binding_statement(false),
            TokenKind::Update => self.parse_binding_statement(true),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_binding_statement(&mut self, update: bool) -> Option<Statement> {
        let token = self.current.clone();
        self.expect_peek(TokenKind::Ident)?;
        let name = Identifier::new(self.current.clone());
        self.expect_peek(TokenKind::Assign)?;
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_semicolon();

        Some(if update {
            Statement::Update { token, name, value }
        } else {
            Statement::Value { token, name, value }
        })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        let token = self.current.clone();
        let bare = matches!(
            self.peek.kind,
            TokenKind::Semicolon | TokenKind::Eof | TokenKind::RBrace | TokenKind::CloseBlock
        );
        let value = if bare {
            None
        } else {
            self.next_token();
            Some(self.parse_expression(Precedence::Lowest)?)
        };
        self.skip_semicolon();
        Some(Statement::Return { token, value })
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let token = self.current.clone();
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.skip_semicolon();
        Some(Statement::Expression { token, expression })
    }

    /// Moves onto a block opener (`{` or `->`) sitting in the peek slot.
    fn expect_block_open(&mut self) -> Option<()> {
        if matches!(self.peek.kind, TokenKind::LBrace | TokenKind::OpenBlock) {
            self.next_token();
            Some(())
        } else {
            self.peek_error(TokenKind::LBrace);
            None
        }
    }

    /// Parses a block; the current token is its opener.
    fn parse_block_statement(&mut self) -> Option<BlockStatement> {
        let token = self.current.clone();
        let closer = match token.kind {
            TokenKind::OpenBlock => TokenKind::CloseBlock,
            _ => TokenKind::RBrace,
        };
        let mut statements = Vec::new();
        self.next_token();

        while !self.current_is(closer) {
            if self.current_is(TokenKind::Eof) {
                self.record(ParseError::ExpectedToken {
                    expected: closer,
                    found: TokenKind::Eof,
                    span: self.current.span,
                });
                return None;
            }
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            self.next_token();
        }

        Some(BlockStatement { token, statements })
    }

    // --- Expressions ---

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        ensure_sufficient_stack(|| self.parse_expression_inner(precedence))
    }

    fn parse_expression_inner(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(TokenKind::Semicolon) && precedence < self.peek_precedence() {
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.current.kind {
            TokenKind::Ident => Some(Expression::Identifier(Identifier::new(
                self.current.clone(),
            ))),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Str => Some(Expression::Str {
                token: self.current.clone(),
                value: self.current.literal.clone(),
            }),
            TokenKind::True | TokenKind::False => Some(Expression::Boolean {
                token: self.current.clone(),
                value: self.current_is(TokenKind::True),
            }),
            TokenKind::Bang | TokenKind::Minus => self.parse_prefix_expression(),
            TokenKind::LParen => self.parse_grouped_expression(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Function => self.parse_function_literal(),
            TokenKind::LBracket => {
                let token = self.current.clone();
                let elements = self.parse_expression_list(TokenKind::RBracket)?;
                Some(Expression::Array { token, elements })
            }
            TokenKind::LBrace => self.parse_map_literal(),
            kind => {
                self.record(ParseError::NoPrefixParseFn {
                    kind,
                    span: self.current.span,
                });
                None
            }
        }
    }

    /// Every token with a precedence above `Lowest` lands here.
    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        match self.current.kind {
            TokenKind::LParen => {
                let token = self.current.clone();
                let arguments = self.parse_expression_list(TokenKind::RParen)?;
                Some(Expression::Call {
                    token,
                    function: Box::new(left),
                    arguments,
                })
            }
            TokenKind::LBracket => {
                let token = self.current.clone();
                self.next_token();
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect_peek(TokenKind::RBracket)?;
                Some(Expression::Index {
                    token,
                    left: Box::new(left),
                    index: Box::new(index),
                })
            }
            _ => self.parse_infix_expression(left),
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        match self.current.literal.parse::<i64>() {
            Ok(value) => Some(Expression::Integer {
                token: self.current.clone(),
                value,
            }),
            Err(_) => {
                self.record(ParseError::InvalidInteger {
                    literal: self.current.literal.clone(),
                    span: self.current.span,
                });
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let token = self.current.clone();
        let operator = token.literal.clone();
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        Some(Expression::Prefix {
            token,
            operator,
            right: Box::new(right),
        })
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let token = self.current.clone();
        // Keyword spellings (`is`, `and`, ...) share their symbol's operator.
        let operator = token.kind.to_string();
        let precedence = self.current_precedence();
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            token,
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;
        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        let token = self.current.clone();
        self.expect_peek(TokenKind::LParen)?;
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;
        self.expect_block_open()?;
        let consequence = self.parse_block_statement()?;

        let alternative = if self.peek_is(TokenKind::Else) {
            self.next_token();
            self.expect_block_open()?;
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        Some(Expression::If {
            token,
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        let token = self.current.clone();
        self.expect_peek(TokenKind::LParen)?;
        let parameters = self.parse_function_parameters()?;
        self.expect_block_open()?;
        let body = self.parse_block_statement()?;
        Some(Expression::Function(Rc::new(FunctionLiteral {
            token,
            parameters,
            body,
        })))
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<Identifier>> {
        let mut parameters = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Some(parameters);
        }

        self.expect_peek(TokenKind::Ident)?;
        parameters.push(Identifier::new(self.current.clone()));
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.expect_peek(TokenKind::Ident)?;
            parameters.push(Identifier::new(self.current.clone()));
        }
        self.expect_peek(TokenKind::RParen)?;

        Some(parameters)
    }

    /// Comma separated expressions up to `end`; the current token is the opener.
    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut list = Vec::new();
        if self.peek_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }
        self.expect_peek(end)?;

        Some(list)
    }

    fn parse_map_literal(&mut self) -> Option<Expression> {
        let token = self.current.clone();
        let mut pairs = Vec::new();

        while !self.peek_is(TokenKind::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect_peek(TokenKind::Colon)?;
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(TokenKind::RBrace) {
                self.expect_peek(TokenKind::Comma)?;
            }
        }
        self.expect_peek(TokenKind::RBrace)?;

        Some(Expression::Map { token, pairs })
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> (Program, Vec<ParseError>) {
    Parser::new(Lexer::new(input)).parse_program()
}
