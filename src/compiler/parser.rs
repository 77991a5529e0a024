//! Recursive descent parser for layout expressions

use crate::compiler::ast::{BinaryOp, Expr, Part, UnaryOp};
use crate::compiler::lexer::{Lexer, Token, TokenType};
use crate::core::types::{Color, Value};
use crate::error::{LayoutError, Result};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    percent_reference: Option<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            percent_reference: None,
        }
    }

    /// Bind the postfix `%` operator to the symbol it is a percentage of
    pub fn with_percent_reference(mut self, reference: Option<String>) -> Self {
        self.percent_reference = reference;
        self
    }

    /// Parse a complete expression; trailing tokens are an error
    pub fn parse(&mut self) -> Result<Expr> {
        let expr = self.parse_ternary()?;
        if !self.is_at_end() {
            return Err(self.error(format!("Unexpected {}", self.peek().token_type)));
        }
        Ok(expr)
    }

    /// condition ? then : else
    fn parse_ternary(&mut self) -> Result<Expr> {
        let condition = self.parse_or()?;

        if self.match_token(&TokenType::Question) {
            let then_branch = self.parse_ternary()?;
            self.consume(TokenType::Colon, "Expected ':' in ternary expression")?;
            let else_branch = self.parse_ternary()?;
            Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            })
        } else {
            Ok(condition)
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.match_token(&TokenType::OrOr) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.match_token(&TokenType::AndAnd) {
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    /// Parse comparison expressions: ==, !=, <, <=, >, >=
    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.peek().token_type {
                TokenType::EqualEquals => BinaryOp::Equal,
                TokenType::NotEquals => BinaryOp::NotEqual,
                TokenType::LessThan => BinaryOp::Less,
                TokenType::LessThanOrEqual => BinaryOp::LessEqual,
                TokenType::GreaterThan => BinaryOp::Greater,
                TokenType::GreaterThanOrEqual => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek().token_type {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek().token_type {
                TokenType::Star => BinaryOp::Multiply,
                TokenType::Slash => BinaryOp::Divide,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.match_token(&TokenType::Minus) {
            let operand = self.parse_unary()?;
            // Fold negative literals so `-10` stays a literal
            if let Expr::Literal(Value::Number(n)) = operand {
                return Ok(Expr::Literal(Value::Number(-n)));
            }
            return Ok(Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }
        if self.match_token(&TokenType::Bang) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;

        while self.match_token(&TokenType::Percent) {
            let Some(reference) = self.percent_reference.clone() else {
                return Err(self.error("Percent operator is not supported for this attribute"));
            };
            expr = Expr::Percent {
                value: Box::new(expr),
                reference,
            };
        }

        Ok(expr)
    }

    /// Parse primary expressions: literals, symbols, calls, grouping
    fn parse_primary(&mut self) -> Result<Expr> {
        let token_type = self.peek().token_type.clone();
        match token_type {
            TokenType::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenType::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenType::Color(hex) => {
                self.advance();
                let color = Color::from_hex(&hex)
                    .ok_or_else(|| self.error(format!("Invalid color: {}", hex)))?;
                Ok(Expr::Literal(Value::Color(color)))
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenType::Nil => {
                self.advance();
                Ok(Expr::Literal(Value::Nil))
            }
            TokenType::Identifier(name) => {
                self.advance();
                if self.match_token(&TokenType::LeftParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Symbol(name))
                }
            }
            TokenType::LeftParen => {
                self.advance(); // consume '('
                let expr = self.parse_ternary()?;
                self.consume(TokenType::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            TokenType::Eof => Err(self.error("Unexpected end of expression")),
            other => Err(self.error(format!("Expected expression, found {}", other))),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.match_token(&TokenType::RightParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_ternary()?);
            if self.match_token(&TokenType::Comma) {
                continue;
            }
            self.consume(TokenType::RightParen, "Expected ')' after arguments")?;
            return Ok(args);
        }
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("{}, found {}", message, self.peek().token_type)))
        }
    }

    fn error(&self, message: impl Into<String>) -> LayoutError {
        LayoutError::syntax(
            "",
            format!("{} at column {}", message.into(), self.peek().column),
        )
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Parse a single expression
pub fn parse_expression(source: &str, percent_reference: Option<String>) -> Result<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens)
        .with_percent_reference(percent_reference)
        .parse()
}

/// Split literal text with `{expr}` substitutions into parts.
/// `{{` and `}}` produce literal braces.
pub fn parse_interpolated(source: &str, percent_reference: Option<String>) -> Result<Vec<Part>> {
    let chars: Vec<char> = source.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '{' && chars.get(i + 1) == Some(&'{') {
            literal.push('{');
            i += 2;
            continue;
        }
        if ch == '}' && chars.get(i + 1) == Some(&'}') {
            literal.push('}');
            i += 2;
            continue;
        }
        if ch != '{' {
            literal.push(ch);
            i += 1;
            continue;
        }

        let end = find_closing_brace(&chars, i + 1).ok_or_else(|| {
            LayoutError::syntax("", format!("Unterminated '{{' at column {}", i + 1))
        })?;
        let inner: String = chars[i + 1..end].iter().collect();
        if inner.trim().is_empty() {
            return Err(LayoutError::syntax(
                "",
                format!("Empty expression at column {}", i + 1),
            ));
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(&mut literal)));
        }
        parts.push(Part::Expr(parse_expression(&inner, percent_reference.clone())?));
        i = end + 1;
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }

    Ok(parts)
}

fn find_closing_brace(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = start;

    while i < chars.len() {
        let ch = chars[i];
        match quote {
            Some(q) => {
                if ch == '\\' {
                    i += 1;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '{' => depth += 1,
                '}' if depth == 0 => return Some(i),
                '}' => depth -= 1,
                _ => {}
            },
        }
        i += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_associativity() {
        let expr = parse_expression("a - b - c * 2", None).unwrap();
        assert_eq!(expr.to_string(), "a - b - c * 2");

        let expr = parse_expression("a || b && c == d", None).unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Or, .. } => {}
            other => panic!("Expected || at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_ternary_and_calls() {
        let expr = parse_expression("max(width, 10) > 5 ? 'wide' : 'narrow'", None).unwrap();
        match expr {
            Expr::Ternary { condition, .. } => match *condition {
                Expr::Binary { op: BinaryOp::Greater, left, .. } => {
                    assert!(matches!(*left, Expr::Call { ref name, ref args } if name == "max" && args.len() == 2));
                }
                other => panic!("Expected comparison, got {:?}", other),
            },
            other => panic!("Expected ternary, got {:?}", other),
        }
    }

    #[test]
    fn test_percent_requires_reference() {
        assert!(parse_expression("50%", None).is_err());

        let expr = parse_expression("100% - bottom", Some("containerSize.height".into())).unwrap();
        assert_eq!(expr.to_string(), "100% - bottom");
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse_expression("10 20", None).unwrap_err();
        assert!(err.to_string().contains("Unexpected number(20)"));
        assert!(parse_expression("(1 + 2", None).is_err());
        assert!(parse_expression("", None).is_err());
    }

    #[test]
    fn test_interpolation_parts() {
        let parts = parse_interpolated("Hello {name}! {{literal}}", None).unwrap();
        assert_eq!(
            parts,
            vec![
                Part::Literal("Hello ".into()),
                Part::Expr(Expr::symbol("name")),
                Part::Literal("! {literal}".into()),
            ]
        );

        let parts = parse_interpolated("{count > 1 ? \"}\" : 'x'}", None).unwrap();
        assert_eq!(parts.len(), 1);

        assert!(parse_interpolated("open {brace", None).is_err());
        assert!(parse_interpolated("empty {}", None).is_err());
    }
}
