// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! A small sandboxed predicate language for the free-form group filters.
//!
//! Grammar: comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=`) over
//! `<binding>.<field>` accesses and string/number literals, combined with
//! `and`, `or`, `not` and parentheses. Exactly one binding name is in scope
//! (`queue` for job filters, `capacity` for node filters); any other root
//! name is an error. There is no function call, assignment, or any other
//! escape hatch.

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EvalError {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("unknown name {found:?}: only {expected:?} is in scope")]
    UnknownBinding { found: String, expected: &'static str },
    #[error("record has no field {0:?}")]
    UnknownField(String),
    #[error("cannot compare a number with a string")]
    TypeMismatch,
}

/// A field value surfaced to the predicate by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
}

/// A compiled predicate, ready to evaluate against one record at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expr,
}

impl Predicate {
    /// Parse `source` with `binding` as the single name in scope. Binding
    /// and field names are checked as far as possible at parse time; field
    /// existence is only known per record.
    pub fn parse(source: &str, binding: &'static str) -> Result<Self, EvalError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            binding,
        };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(EvalError::UnexpectedToken(parser.describe_current()));
        }
        Ok(Self { expr })
    }

    /// Evaluate against one record, represented by a field lookup.
    pub fn eval(&self, field: &dyn Fn(&str) -> Option<Value>) -> Result<bool, EvalError> {
        self.expr.eval(field)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(String),
    Num(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Expr {
    fn eval(&self, field: &dyn Fn(&str) -> Option<Value>) -> Result<bool, EvalError> {
        match self {
            Self::Or(a, b) => Ok(a.eval(field)? || b.eval(field)?),
            Self::And(a, b) => Ok(a.eval(field)? && b.eval(field)?),
            Self::Not(inner) => Ok(!inner.eval(field)?),
            Self::Cmp { lhs, op, rhs } => {
                let lhs = lhs.resolve(field)?;
                let rhs = rhs.resolve(field)?;
                compare(&lhs, *op, &rhs)
            }
        }
    }
}

impl Operand {
    fn resolve(&self, field: &dyn Fn(&str) -> Option<Value>) -> Result<Value, EvalError> {
        match self {
            Self::Field(name) => {
                field(name).ok_or_else(|| EvalError::UnknownField(name.clone()))
            }
            Self::Num(n) => Ok(Value::Num(*n)),
            Self::Str(s) => Ok(Value::Str(s.clone())),
        }
    }
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> Result<bool, EvalError> {
    match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => Ok(match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }),
        (Value::Str(a), Value::Str(b)) => Ok(match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }),
        _ => Err(EvalError::TypeMismatch),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Num(f64),
    Str(String),
    Op(CmpOp),
    LParen,
    RParen,
    Dot,
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '.' => tokens.push(Token::Dot),
            '=' => match chars.next() {
                Some((_, '=')) => tokens.push(Token::Op(CmpOp::Eq)),
                _ => return Err(EvalError::UnexpectedChar('=')),
            },
            '!' => match chars.next() {
                Some((_, '=')) => tokens.push(Token::Op(CmpOp::Ne)),
                _ => return Err(EvalError::UnexpectedChar('!')),
            },
            '<' => {
                if chars.next_if(|(_, c)| *c == '=').is_some() {
                    tokens.push(Token::Op(CmpOp::Le));
                } else {
                    tokens.push(Token::Op(CmpOp::Lt));
                }
            }
            '>' => {
                if chars.next_if(|(_, c)| *c == '=').is_some() {
                    tokens.push(Token::Op(CmpOp::Ge));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            '"' | '\'' => {
                let quote = c;
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some((_, c)) if c == quote => break,
                        Some((_, c)) => literal.push(c),
                        None => return Err(EvalError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_ascii_digit() => {
                let mut end = i + c.len_utf8();
                while let Some((j, c)) = chars.peek().copied() {
                    if c.is_ascii_digit() || c == '.' {
                        // A dot only belongs to the number when a digit
                        // follows; `1.` is not a literal we accept.
                        if c == '.' {
                            let mut ahead = chars.clone();
                            ahead.next();
                            if !matches!(ahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                                break;
                            }
                        }
                        end = j + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = source[i..end]
                    .parse()
                    .map_err(|_| EvalError::UnexpectedToken(source[i..end].to_string()))?;
                tokens.push(Token::Num(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i + c.len_utf8();
                while let Some((j, c)) = chars.peek().copied() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = j + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(source[i..end].to_string()));
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    binding: &'static str,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, EvalError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(EvalError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            Some(Token::Str(s)) => format!("{s:?}"),
            Some(Token::Num(n)) => n.to_string(),
            Some(Token::LParen) => "(".to_string(),
            Some(Token::RParen) => ")".to_string(),
            Some(Token::Dot) => ".".to_string(),
            Some(Token::Op(_)) => "comparison operator".to_string(),
            None => "end of expression".to_string(),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.parse_or()?;
            match self.next()? {
                Token::RParen => return Ok(inner),
                _ => return Err(EvalError::UnexpectedToken(self.describe_current())),
            }
        }

        let lhs = self.parse_operand()?;
        let op = match self.next()? {
            Token::Op(op) => op,
            other => {
                return Err(EvalError::UnexpectedToken(match other {
                    Token::Ident(name) => name,
                    _ => "expected comparison operator".to_string(),
                }))
            }
        };
        let rhs = self.parse_operand()?;
        Ok(Expr::Cmp { lhs, op, rhs })
    }

    fn parse_operand(&mut self) -> Result<Operand, EvalError> {
        match self.next()? {
            Token::Num(n) => Ok(Operand::Num(n)),
            Token::Str(s) => Ok(Operand::Str(s)),
            Token::Ident(root) => {
                if root != self.binding {
                    return Err(EvalError::UnknownBinding {
                        found: root,
                        expected: self.binding,
                    });
                }
                match (self.next()?, self.next()?) {
                    (Token::Dot, Token::Ident(field)) => Ok(Operand::Field(field)),
                    _ => Err(EvalError::UnexpectedToken(root)),
                }
            }
            Token::LParen => Err(EvalError::UnexpectedToken("(".to_string())),
            Token::RParen => Err(EvalError::UnexpectedToken(")".to_string())),
            Token::Dot => Err(EvalError::UnexpectedToken(".".to_string())),
            Token::Op(_) => Err(EvalError::UnexpectedToken("comparison operator".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record() -> HashMap<&'static str, Value> {
        HashMap::from([
            ("cpu", Value::Num(8.0)),
            ("mem_gb", Value::Num(32.0)),
            ("user", Value::Str("alice".to_string())),
            ("state", Value::Str("RUNNING".to_string())),
        ])
    }

    fn eval(source: &str) -> Result<bool, EvalError> {
        let record = record();
        let predicate = Predicate::parse(source, "queue")?;
        predicate.eval(&|name| record.get(name).cloned())
    }

    #[test]
    fn comparisons_on_numbers() {
        assert_eq!(eval("queue.cpu > 4"), Ok(true));
        assert_eq!(eval("queue.cpu >= 8"), Ok(true));
        assert_eq!(eval("queue.cpu < 8"), Ok(false));
        assert_eq!(eval("queue.cpu != 8"), Ok(false));
        assert_eq!(eval("4 < queue.cpu"), Ok(true));
    }

    #[test]
    fn comparisons_on_strings() {
        assert_eq!(eval("queue.user == \"alice\""), Ok(true));
        assert_eq!(eval("queue.user != 'bob'"), Ok(true));
    }

    #[test]
    fn boolean_connectives_and_parentheses() {
        assert_eq!(eval("queue.cpu > 4 and queue.user == 'alice'"), Ok(true));
        assert_eq!(eval("queue.cpu > 100 or queue.mem_gb >= 32"), Ok(true));
        assert_eq!(eval("not queue.cpu > 4"), Ok(false));
        assert_eq!(
            eval("(queue.cpu > 100 or queue.cpu < 10) and queue.state == 'RUNNING'"),
            Ok(true)
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // true or (false and false)
        assert_eq!(
            eval("queue.cpu == 8 or queue.cpu == 9 and queue.cpu == 10"),
            Ok(true)
        );
    }

    #[test]
    fn only_the_declared_binding_resolves() {
        let err = eval("capacity.cpu > 4").unwrap_err();
        assert_eq!(
            err,
            EvalError::UnknownBinding {
                found: "capacity".to_string(),
                expected: "queue",
            }
        );
    }

    #[test]
    fn unknown_fields_error_at_eval_time() {
        assert_eq!(
            eval("queue.nope == 1"),
            Err(EvalError::UnknownField("nope".to_string()))
        );
    }

    #[test]
    fn mixed_type_comparison_is_an_error() {
        assert_eq!(eval("queue.cpu == 'alice'"), Err(EvalError::TypeMismatch));
    }

    #[test]
    fn malformed_expressions_fail_to_parse() {
        assert!(Predicate::parse("queue.cpu >", "queue").is_err());
        assert!(Predicate::parse("queue.cpu = 4", "queue").is_err());
        assert!(Predicate::parse("(queue.cpu > 4", "queue").is_err());
        assert!(Predicate::parse("queue.cpu > 4 extra", "queue").is_err());
        assert!(Predicate::parse("queue.cpu > 'x", "queue").is_err());
    }

    #[test]
    fn float_literals_parse() {
        assert_eq!(eval("queue.cpu > 7.5"), Ok(true));
    }
}
