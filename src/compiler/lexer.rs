//! Lexical analysis for layout expressions

use crate::error::{LayoutError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Literals
    Number(f64),
    String(String),
    Color(String), // #RGB, #RGBA, #RRGGBB, #RRGGBBAA
    Identifier(String), // dotted symbol paths and #id references
    True,
    False,
    Nil,

    // Punctuation
    LeftParen,  // (
    RightParen, // )
    Comma,      // ,
    Question,   // ?
    Colon,      // :

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqualEquals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAnd,
    OrOr,

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub column: usize,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Number(n) => write!(f, "number({})", n),
            TokenType::String(s) => write!(f, "string(\"{}\")", s),
            TokenType::Color(c) => write!(f, "color({})", c),
            TokenType::Identifier(id) => write!(f, "identifier({})", id),
            TokenType::True => write!(f, "true"),
            TokenType::False => write!(f, "false"),
            TokenType::Nil => write!(f, "nil"),
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::Comma => write!(f, ","),
            TokenType::Question => write!(f, "?"),
            TokenType::Colon => write!(f, ":"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Star => write!(f, "*"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Percent => write!(f, "%"),
            TokenType::Bang => write!(f, "!"),
            TokenType::EqualEquals => write!(f, "=="),
            TokenType::NotEquals => write!(f, "!="),
            TokenType::LessThan => write!(f, "<"),
            TokenType::LessThanOrEqual => write!(f, "<="),
            TokenType::GreaterThan => write!(f, ">"),
            TokenType::GreaterThanOrEqual => write!(f, ">="),
            TokenType::AndAnd => write!(f, "&&"),
            TokenType::OrOr => write!(f, "||"),
            TokenType::Eof => write!(f, "end of expression"),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            tokens.push(self.next_token()?);
        }

        tokens.push(Token {
            token_type: TokenType::Eof,
            column: self.position + 1,
        });

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let column = self.position + 1;
        let ch = self.advance();

        let token_type = match ch {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            ',' => TokenType::Comma,
            '?' => TokenType::Question,
            ':' => TokenType::Colon,
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '%' => TokenType::Percent,
            '!' => {
                if self.match_char('=') {
                    TokenType::NotEquals
                } else {
                    TokenType::Bang
                }
            }
            '=' => {
                if self.match_char('=') {
                    TokenType::EqualEquals
                } else {
                    return Err(self.error(column, "Unexpected '=' (use '==' for comparison)"));
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenType::LessThanOrEqual
                } else {
                    TokenType::LessThan
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenType::GreaterThanOrEqual
                } else {
                    TokenType::GreaterThan
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenType::AndAnd
                } else {
                    return Err(self.error(column, "Unexpected '&' (use '&&')"));
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenType::OrOr
                } else {
                    return Err(self.error(column, "Unexpected '|' (use '||')"));
                }
            }
            '"' | '\'' => TokenType::String(self.read_string(ch, column)?),
            '#' => self.read_hash(column)?,
            ch if ch.is_ascii_digit()
                || (ch == '.' && self.peek().map_or(false, |c| c.is_ascii_digit())) =>
            {
                self.read_number(ch, column)?
            }
            ch if ch.is_alphabetic() || ch == '_' => {
                let identifier = self.read_identifier(ch);
                match identifier.as_str() {
                    "true" => TokenType::True,
                    "false" => TokenType::False,
                    "nil" => TokenType::Nil,
                    _ => TokenType::Identifier(identifier),
                }
            }
            _ => {
                return Err(self.error(column, format!("Unexpected character: '{}'", ch)));
            }
        };

        Ok(Token { token_type, column })
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn advance(&mut self) -> char {
        if self.position < self.input.len() {
            let ch = self.input[self.position];
            self.position += 1;
            ch
        } else {
            '\0'
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn error(&self, column: usize, message: impl Into<String>) -> LayoutError {
        LayoutError::syntax("", format!("{} at column {}", message.into(), column))
    }

    fn read_string(&mut self, quote: char, column: usize) -> Result<String> {
        let mut value = String::new();
        let mut escaped = false;

        while let Some(ch) = self.peek() {
            self.advance();
            if escaped {
                match ch {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    '\'' => value.push('\''),
                    _ => {
                        value.push('\\');
                        value.push(ch);
                    }
                }
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                return Ok(value);
            } else {
                value.push(ch);
            }
        }

        Err(self.error(column, "Unterminated string literal"))
    }

    fn read_number(&mut self, first: char, column: usize) -> Result<TokenType> {
        let mut text = String::from(first);
        let mut seen_dot = first == '.';

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
                seen_dot = true;
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        text.parse::<f64>()
            .map(TokenType::Number)
            .map_err(|_| self.error(column, format!("Invalid number: {}", text)))
    }

    /// Identifier segments joined by dots, e.g. `center.x` or `parent.contentSize.width`
    fn read_identifier(&mut self, first: char) -> String {
        let mut identifier = String::from(first);

        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else if ch == '.'
                && self
                    .peek_at(1)
                    .map_or(false, |c| c.is_alphabetic() || c == '_')
            {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    /// `#rrggbb` colors or `#id.symbol` references
    fn read_hash(&mut self, column: usize) -> Result<TokenType> {
        let start = self.position;
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if word.is_empty() {
            return Err(self.error(column, "Expected color or node id after '#'"));
        }

        if self.peek() == Some('.') {
            self.position = start;
            let first = self.advance();
            let rest = self.read_identifier(first);
            if !rest.contains('.') {
                return Err(self.error(column, format!("Expected symbol after '#{}.'", word)));
            }
            return Ok(TokenType::Identifier(format!("#{}", rest)));
        }

        let is_hex = word.chars().all(|c| c.is_ascii_hexdigit());
        match (is_hex, word.len()) {
            (true, 3 | 4 | 6 | 8) => Ok(TokenType::Color(format!("#{}", word))),
            _ => Err(self.error(
                column,
                format!("Invalid color format: #{} (expected 3, 4, 6, or 8 hex digits)", word),
            )),
        }
    }
}
