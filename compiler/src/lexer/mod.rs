use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Literals
    String(String),
    Number(String),

    // Identifiers and Keywords
    Identifier(String),
    Let,
    Print,

    // Punctuation
    Assign,        // =
    Semicolon,     // ;
    LeftParen,     // (
    RightParen,    // )

    // Operators
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /

    /// Unrecognized character or unterminated string, rejected by the parser
    Unknown(String),

    // End of file
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Byte offset of the token's first character
    pub offset: usize,
}

impl Token {
    pub fn new(token_type: TokenType, offset: usize) -> Self {
        Self { token_type, offset }
    }

    /// Name of an identifier or keyword token, as written
    pub fn name(&self) -> Option<&str> {
        match &self.token_type {
            TokenType::Identifier(name) => Some(name),
            TokenType::Let => Some("let"),
            TokenType::Print => Some("print"),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::String(s) => write!(f, "\"{}\"", s),
            TokenType::Number(n) => write!(f, "{}", n),
            TokenType::Identifier(s) => write!(f, "{}", s),
            TokenType::Let => write!(f, "let"),
            TokenType::Print => write!(f, "print"),
            TokenType::Assign => write!(f, "="),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Star => write!(f, "*"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Unknown(s) => write!(f, "unknown token '{}'", s),
            TokenType::Eof => write!(f, "EOF"),
        }
    }
}

/// Streaming lexer; `next_token` returns `Eof` forever once input runs out
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    /// Lex the whole input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.token_type == TokenType::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let (start, ch) = match self.chars.next() {
            Some(next) => next,
            None => return Token::new(TokenType::Eof, self.input.len()),
        };

        let token_type = match ch {
            '=' => TokenType::Assign,
            ';' => TokenType::Semicolon,
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '"' => self.string(start),
            _ if ch.is_ascii_digit() => {
                TokenType::Number(self.take_while(start, |c| c.is_ascii_digit()).to_string())
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                self.identifier_or_keyword(start)
            }
            _ => TokenType::Unknown(ch.to_string()),
        };

        Token::new(token_type, start)
    }

    fn string(&mut self, start: usize) -> TokenType {
        let mut value = String::new();

        loop {
            match self.chars.next() {
                None => return TokenType::Unknown(self.input[start..].to_string()),
                Some((_, '"')) => return TokenType::String(value),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, escaped)) => value.push(escaped),
                    None => return TokenType::Unknown(self.input[start..].to_string()),
                },
                Some((_, ch)) => value.push(ch),
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> TokenType {
        let identifier = self.take_while(start, |c| c.is_alphanumeric() || c == '_');

        match identifier {
            "let" => TokenType::Let,
            "print" => TokenType::Print,
            _ => TokenType::Identifier(identifier.to_string()),
        }
    }

    /// Consume characters after the one at `start` while `pred` holds, and
    /// return the whole run including the first character
    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'a str {
        let input = self.input;
        let mut end = input.len();
        while let Some(&(offset, ch)) = self.chars.peek() {
            if !pred(ch) {
                end = offset;
                break;
            }
            self.chars.next();
        }
        &input[start..end]
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }
}

/// Lex `source` into a token vector ending in `Eof`
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}
