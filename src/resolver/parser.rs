//! Recursive-descent parser producing the expression tree.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := '-' unary | postfix
//! postfix := primary ('.' IDENT | '[' expr ']')*
//! primary := literal | IDENT | IDENT '(' args ')' | '(' expr ')' | list | map
//! ```

use serde_json::Value;

use super::ExprError;
use super::lexer::{Spanned, Token, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Deepest expression tree the parser builds. Operator chains count one
/// level per operator, as evaluation recurses through them.
pub(crate) const MAX_DEPTH: usize = 256;

pub(crate) fn parse(src: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        Token::LParen => Err(parser.error("only builtin functions can be called")),
        other => Err(parser.error(format!("unexpected {:?}", other))),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.pos)
            .unwrap_or(0)
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::syntax(self.offset(), message)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExprError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn nest(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        let base = self.depth;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.advance();
            self.nest()?;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let base = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.advance();
            self.nest()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let base = self.depth;
        self.nest()?;
        let expr = if self.eat(&Token::Minus) {
            Expr::Neg(Box::new(self.unary()?))
        } else {
            self.postfix()?
        };
        self.depth = base;
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let base = self.depth;
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                self.nest()?;
                match self.advance() {
                    Token::Ident(attr) => expr = Expr::Attr(Box::new(expr), attr),
                    _ => return Err(self.error("expected attribute name after '.'")),
                }
            } else if self.eat(&Token::LBracket) {
                self.nest()?;
                let index = self.expr()?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let start = self.offset();
        match self.advance() {
            Token::Int(i) => Ok(Expr::Literal(Value::from(i))),
            Token::Float(f) => serde_json::Number::from_f64(f)
                .map(|n| Expr::Literal(Value::Number(n)))
                .ok_or_else(|| ExprError::syntax(start, "non-finite number")),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => {
                let keyword = match name.as_str() {
                    "true" | "True" => Some(Value::Bool(true)),
                    "false" | "False" => Some(Value::Bool(false)),
                    "null" | "None" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = keyword {
                    Ok(Expr::Literal(value))
                } else if self.eat(&Token::LParen) {
                    let args = self.items(Token::RParen, "')'", Self::expr)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.items(Token::RBracket, "']'", Self::expr)?)),
            Token::LBrace => Ok(Expr::Map(self.items(Token::RBrace, "'}'", Self::entry)?)),
            Token::Eof => Err(ExprError::syntax(start, "unexpected end of expression")),
            other => Err(ExprError::syntax(start, format!("unexpected {:?}", other))),
        }
    }

    fn entry(&mut self) -> Result<(String, Expr), ExprError> {
        let key = match self.advance() {
            Token::Ident(key) | Token::Str(key) => key,
            _ => return Err(self.error("expected map key")),
        };
        self.expect(Token::Colon, "':'")?;
        Ok((key, self.expr()?))
    }

    /// Comma-separated items up to `close`; a trailing comma is allowed.
    fn items<T>(
        &mut self,
        close: Token,
        what: &str,
        mut item: impl FnMut(&mut Self) -> Result<T, ExprError>,
    ) -> Result<Vec<T>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(item(self)?);
            if !self.eat(&Token::Comma) {
                self.expect(close.clone(), what)?;
                return Ok(items);
            }
        }
    }
}
