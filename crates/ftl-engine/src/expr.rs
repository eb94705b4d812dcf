/*
 * expr.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression tokenizer and recursive-descent parser.
//!
//! Precedence, loosest first: `||`, `&&`, `==`/`!=`, prefix `!`, postfix
//! (`.name`, `[index]`, `(args)`, `?builtin`, `??`, `!default`).

use crate::ast::Expr;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Bang,
    BuiltIn(String),
    Exists,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '"' | '\'' => {
                let (text, end) = read_string(&chars, i)?;
                tokens.push(Token::Str(text));
                i = end;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number literal: {}", text))?;
                tokens.push(Token::Num(value));
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_part(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '?' if next == Some('?') => {
                tokens.push(Token::Exists);
                i += 2;
            }
            '?' => {
                i += 1;
                let start = i;
                while i < chars.len() && is_ident_part(chars[i]) {
                    i += 1;
                }
                if start == i {
                    return Err("Expected built-in name after '?'".to_string());
                }
                tokens.push(Token::BuiltIn(chars[start..i].iter().collect()));
            }
            '=' if next == Some('=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            other => return Err(format!("Unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| "Unterminated escape sequence".to_string())?;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err("Unterminated string literal".to_string())
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$' || c == '@'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '@'
}

/// Parse a complete expression.
pub fn parse_expression(src: &str) -> Result<Expr, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("Expected an expression".to_string());
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("Unexpected {:?} after expression", token)),
    }
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("Expected {}", what))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let left = self.parse_unary()?;
        if self.eat(&Token::EqEq) {
            let right = self.parse_unary()?;
            return Ok(Expr::Eq(Box::new(left), Box::new(right)));
        }
        if self.eat(&Token::NotEq) {
            let right = self.parse_unary()?;
            return Ok(Expr::Ne(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Bang) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(name)) => expr = Expr::Dot(Box::new(expr), name),
                        _ => return Err("Expected name after '.'".to_string()),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_or()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if self.eat(&Token::Comma) {
                                continue;
                            }
                            self.expect(&Token::RParen, "')' after arguments")?;
                            break;
                        }
                    }
                    expr = Expr::Call(Box::new(expr), args);
                }
                Some(Token::BuiltIn(name)) => {
                    let name = name.clone();
                    self.pos += 1;
                    expr = Expr::BuiltIn(Box::new(expr), name);
                }
                Some(Token::Exists) => {
                    self.pos += 1;
                    expr = Expr::Exists(Box::new(expr));
                }
                Some(Token::Bang) => {
                    self.pos += 1;
                    let fallback = if self.starts_operand() {
                        Some(Box::new(self.parse_postfix()?))
                    } else {
                        None
                    };
                    // The default operand ends the postfix chain.
                    return Ok(Expr::Default(Box::new(expr), fallback));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Ident(_) | Token::Str(_) | Token::Num(_) | Token::LParen | Token::Dot)
        )
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::StringLit(s)),
            Some(Token::Num(n)) => Ok(Expr::NumberLit(n)),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::BoolLit(true),
                "false" => Expr::BoolLit(false),
                _ => Expr::Variable(name),
            }),
            Some(Token::Dot) => match self.advance() {
                Some(Token::Ident(name)) => Ok(Expr::Special(name)),
                _ => Err("Expected special variable name after '.'".to_string()),
            },
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(token) => Err(format!("Unexpected {:?}", token)),
            None => Err("Unexpected end of expression".to_string()),
        }
    }
}
