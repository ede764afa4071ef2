//! A minimal guard expression language for rewrite rules (§4.8): field
//! access into bound subtrees, equality/inequality, and boolean
//! combinators. No corpus dependency covers JSON-query evaluation, so this
//! is hand-rolled rather than borrowed — see the design notes (§9) for why
//! that's the right call here instead of reaching for a new crate.
//!
//! Grammar (informal):
//! ```text
//! expr    := or
//! or      := and ("||" and)*
//! and     := cmp ("&&" cmp)*
//! cmp     := unary (("==" | "!=") unary)?
//! unary   := "!" unary | primary
//! primary := literal | path | "(" expr ")"
//! path    := "$" ident ("." ident | "[" int "]")*
//! literal := number | "true" | "false" | "null" | '"' ... '"'
//! ```

use crate::ast::Node;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardError {
    Parse(String),
    UnboundName(String),
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardError::Parse(s) => write!(f, "could not parse guard expression: {s}"),
            GuardError::UnboundName(s) => write!(f, "guard references unbound name: {s}"),
        }
    }
}

impl std::error::Error for GuardError {}

/// Evaluates `expr` against `bindings` (placeholder name -> bound subtree),
/// returning its truthiness per the usual [`Node::truthy`] rule.
pub fn eval(expr: &str, bindings: &HashMap<String, Node>) -> Result<bool, GuardError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let ast = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(GuardError::Parse(format!("unexpected trailing input in '{expr}'")));
    }
    Ok(eval_node(&ast, bindings)?.truthy())
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Path(Vec<PathPart>),
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Bang,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum PathPart {
    Field(String),
    Index(usize),
}

fn tokenize(s: &str) -> Result<Vec<Tok>, GuardError> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                out.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                out.push(Tok::RParen);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Tok::NotEq);
                    i += 2;
                } else {
                    out.push(Tok::Bang);
                    i += 1;
                }
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                out.push(Tok::EqEq);
                i += 2;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                out.push(Tok::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                out.push(Tok::OrOr);
                i += 2;
            }
            '$' => {
                let start = i;
                i += 1;
                let mut parts = Vec::new();
                let ident_start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if i == ident_start {
                    return Err(GuardError::Parse(format!("expected identifier after '$' at {start}")));
                }
                parts.push(PathPart::Field(chars[ident_start..i].iter().collect()));
                loop {
                    if chars.get(i) == Some(&'.') {
                        i += 1;
                        let field_start = i;
                        while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                            i += 1;
                        }
                        if i == field_start {
                            return Err(GuardError::Parse("expected field name after '.'".into()));
                        }
                        parts.push(PathPart::Field(chars[field_start..i].iter().collect()));
                    } else if chars.get(i) == Some(&'[') {
                        i += 1;
                        let num_start = i;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                        if chars.get(i) != Some(&']') || i == num_start {
                            return Err(GuardError::Parse("expected '[<n>]' index".into()));
                        }
                        let n: usize = chars[num_start..i].iter().collect::<String>().parse().map_err(|_| GuardError::Parse("bad index".into()))?;
                        parts.push(PathPart::Index(n));
                        i += 1;
                    } else {
                        break;
                    }
                }
                out.push(Tok::Path(parts));
            }
            '"' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '"' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(GuardError::Parse("unterminated string literal".into()));
                }
                out.push(Tok::Str(chars[start..i].iter().collect()));
                i += 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.push(Tok::Number(text.parse().map_err(|_| GuardError::Parse(format!("bad number literal '{text}'")))?));
            }
            c if c.is_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" => out.push(Tok::Bool(true)),
                    "false" => out.push(Tok::Bool(false)),
                    "null" => out.push(Tok::Null),
                    other => return Err(GuardError::Parse(format!("unexpected keyword '{other}'"))),
                }
            }
            other => return Err(GuardError::Parse(format!("unexpected character '{other}'"))),
        }
    }
    Ok(out)
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Node),
    PathRef(Vec<PathPart>),
    Not(Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

struct Parser<'a> {
    tokens: &'a [Tok],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Tok> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn parse_expr(&mut self) -> Result<Expr, GuardError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, GuardError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::OrOr)) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, GuardError> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Tok::AndAnd)) {
            self.bump();
            let rhs = self.parse_cmp()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr, GuardError> {
        let lhs = self.parse_unary()?;
        match self.peek() {
            Some(Tok::EqEq) => {
                self.bump();
                let rhs = self.parse_unary()?;
                Ok(Expr::Eq(Box::new(lhs), Box::new(rhs)))
            }
            Some(Tok::NotEq) => {
                self.bump();
                let rhs = self.parse_unary()?;
                Ok(Expr::NotEq(Box::new(lhs), Box::new(rhs)))
            }
            _ => Ok(lhs),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, GuardError> {
        if matches!(self.peek(), Some(Tok::Bang)) {
            self.bump();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, GuardError> {
        match self.bump().cloned() {
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                if !matches!(self.bump(), Some(Tok::RParen)) {
                    return Err(GuardError::Parse("expected ')'".into()));
                }
                Ok(inner)
            }
            Some(Tok::Path(parts)) => Ok(Expr::PathRef(parts)),
            Some(Tok::Number(n)) => Ok(Expr::Literal(if n.fract() == 0.0 { Node::Int(n as i64) } else { Node::Float(n) })),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Node::Str(s))),
            Some(Tok::Bool(b)) => Ok(Expr::Literal(Node::Bool(b))),
            Some(Tok::Null) => Ok(Expr::Literal(Node::Null)),
            other => Err(GuardError::Parse(format!("unexpected token {other:?}"))),
        }
    }
}

fn eval_node(expr: &Expr, bindings: &HashMap<String, Node>) -> Result<Node, GuardError> {
    Ok(match expr {
        Expr::Literal(n) => n.clone(),
        Expr::PathRef(parts) => resolve_path(parts, bindings)?,
        Expr::Not(inner) => Node::Bool(!eval_node(inner, bindings)?.truthy()),
        Expr::Eq(a, b) => Node::Bool(eval_node(a, bindings)? == eval_node(b, bindings)?),
        Expr::NotEq(a, b) => Node::Bool(eval_node(a, bindings)? != eval_node(b, bindings)?),
        Expr::And(a, b) => Node::Bool(eval_node(a, bindings)?.truthy() && eval_node(b, bindings)?.truthy()),
        Expr::Or(a, b) => Node::Bool(eval_node(a, bindings)?.truthy() || eval_node(b, bindings)?.truthy()),
    })
}

fn resolve_path(parts: &[PathPart], bindings: &HashMap<String, Node>) -> Result<Node, GuardError> {
    let PathPart::Field(root) = &parts[0] else {
        return Err(GuardError::Parse("path must start with a name".into()));
    };
    let mut current = bindings.get(root).cloned().ok_or_else(|| GuardError::UnboundName(root.clone()))?;
    for part in &parts[1..] {
        current = match part {
            PathPart::Field(name) => current.field(name).cloned().unwrap_or(Node::Null),
            PathPart::Index(i) => current.as_list().and_then(|items| items.get(*i)).cloned().unwrap_or(Node::Null),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, Node> {
        pairs.iter().map(|(k, v)| (k.to_string(), Node::from_json(v))).collect()
    }

    #[test]
    fn equality_and_field_access() {
        let b = bindings(&[("x", json!({"name": "n", "value": 0}))]);
        assert!(eval("$x.value == 0", &b).unwrap());
        assert!(!eval("$x.value == 1", &b).unwrap());
    }

    #[test]
    fn boolean_combinators() {
        let b = bindings(&[("x", json!(0)), ("y", json!(5))]);
        assert!(eval("$x == 0 && $y == 5", &b).unwrap());
        assert!(eval("$x == 1 || $y == 5", &b).unwrap());
        assert!(eval("!($x == 1)", &b).unwrap());
    }

    #[test]
    fn list_index_access() {
        let b = bindings(&[("args", json!([1, 2, 3]))]);
        assert!(eval("$args[1] == 2", &b).unwrap());
    }

    #[test]
    fn unbound_name_errors() {
        let b = bindings(&[]);
        assert!(matches!(eval("$missing == 1", &b), Err(GuardError::UnboundName(_))));
    }
}
