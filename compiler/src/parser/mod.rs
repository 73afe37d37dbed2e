use crate::lexer::{Token, TokenType};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Number(i64),
    String(String),
    Identifier(String),

    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    /// Call to a named function; at most one argument is ever parsed
    Call {
        callee: String,
        arguments: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, value: Expr },
    Expression(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    fn from_token(token_type: &TokenType) -> Option<Self> {
        match token_type {
            TokenType::Plus => Some(BinaryOp::Add),
            TokenType::Minus => Some(BinaryOp::Subtract),
            TokenType::Star => Some(BinaryOp::Multiply),
            TokenType::Slash => Some(BinaryOp::Divide),
            _ => None,
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Subtract => 10,
            BinaryOp::Multiply | BinaryOp::Divide => 20,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        };
        write!(f, "{}", symbol)
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.token_type) != Some(&TokenType::Eof) {
            let offset = tokens.last().map_or(0, |t| t.offset);
            tokens.push(Token::new(TokenType::Eof, offset));
        }
        Self { tokens, current: 0 }
    }

    /// Parse statements until end of input, stopping at the first error
    pub fn parse_program(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let statement = if self.check(&TokenType::Let) {
            self.parse_let()?
        } else {
            Stmt::Expression(self.parse_expression()?)
        };

        // Trailing semicolon is optional
        self.match_token(&TokenType::Semicolon);
        Ok(statement)
    }

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // consume 'let'

        let name = match &self.peek().token_type {
            TokenType::Identifier(name) => name.clone(),
            other => return Err(ParseError::ExpectedIdentifier(other.clone(), self.peek().offset)),
        };
        self.advance();

        self.consume(TokenType::Assign, "Expected '=' after variable name")?;
        let value = self.parse_expression()?;

        Ok(Stmt::Let { name, value })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(0)
    }

    /// Precedence climbing; `prec + 1` on the right keeps operators left-associative
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_primary()?;

        while let Some(operator) = BinaryOp::from_token(&self.peek().token_type) {
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();

        match token.token_type {
            TokenType::Number(digits) => {
                self.advance();
                digits
                    .parse::<i64>()
                    .map(Expr::Number)
                    .map_err(|_| ParseError::InvalidNumber(digits, token.offset))
            }
            TokenType::String(value) => {
                self.advance();
                Ok(Expr::String(value))
            }
            TokenType::Identifier(_) | TokenType::Print => {
                let name = token.name().unwrap_or_default().to_string();
                self.advance();
                if self.match_token(&TokenType::LeftParen) {
                    self.parse_call(name)
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                // A missing ')' is tolerated
                self.match_token(&TokenType::RightParen);
                Ok(expr)
            }
            other => Err(ParseError::UnexpectedToken(other, token.offset)),
        }
    }

    /// Arguments after the opening '('. Only the first argument is consumed;
    /// whatever follows it ends the list, and a missing ')' is tolerated.
    fn parse_call(&mut self, callee: String) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();

        if !self.check(&TokenType::RightParen) {
            arguments.push(self.parse_expression()?);
        }
        self.match_token(&TokenType::RightParen);

        Ok(Expr::Call { callee, arguments })
    }

    // Helper methods
    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        std::mem::discriminant(&self.peek().token_type) == std::mem::discriminant(token_type)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        // `new` guarantees a trailing Eof and `advance` never moves past it
        &self.tokens[self.current]
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<(), ParseError> {
        if self.check(&token_type) {
            self.advance();
            Ok(())
        } else {
            let found = self.peek();
            Err(ParseError::ExpectedToken(
                token_type,
                found.token_type.clone(),
                found.offset,
                message.to_string(),
            ))
        }
    }
}

/// Lex and parse one source text
pub fn parse_source(source: &str) -> Result<Vec<Stmt>, ParseError> {
    Parser::new(crate::lexer::tokenize(source)).parse_program()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Unexpected token {0} at offset {1}")]
    UnexpectedToken(TokenType, usize),

    #[error("Expected identifier after 'let', got {0} at offset {1}")]
    ExpectedIdentifier(TokenType, usize),

    #[error("Expected token {0}, got {1} at offset {2}: {3}")]
    ExpectedToken(TokenType, TokenType, usize, String),

    #[error("Invalid number '{0}' at offset {1}")]
    InvalidNumber(String, usize),
}
