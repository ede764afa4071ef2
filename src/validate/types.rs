//! The type inferencer (§4.5, optional pass): bottom-up inference over the
//! value-expression sublanguage. `Any` silently absorbs mismatches (an
//! escape hatch for dynamic interop); `Unknown` records a gap — `var` and
//! `call` results are always `Unknown` since cross-function inference is
//! out of scope, which keeps the inferencer from raising false positives
//! downstream of a call result.

use crate::ast::{Node, Path, Program};
use crate::diagnostic::Diagnostic;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Str,
    Bool,
    Null,
    List(Box<Type>),
    Function(usize),
    Any,
    Unknown,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Str => write!(f, "Str"),
            Type::Bool => write!(f, "Bool"),
            Type::Null => write!(f, "Null"),
            Type::List(t) => write!(f, "List<{t}>"),
            Type::Function(n) => write!(f, "Function({n})"),
            Type::Any => write!(f, "Any"),
            Type::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Type {
    fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Any | Type::Unknown)
    }

    fn is_string(&self) -> bool {
        matches!(self, Type::Str | Type::Any | Type::Unknown)
    }

    fn broad_class(&self) -> Option<&'static str> {
        match self {
            Type::Int | Type::Float => Some("numeric"),
            Type::Str => Some("string"),
            Type::List(_) => Some("list"),
            Type::Bool => Some("bool"),
            Type::Null | Type::Any | Type::Unknown => None,
        }
    }
}

fn join(types: &[Type]) -> Type {
    match types.split_first() {
        None => Type::Any,
        Some((first, rest)) => {
            if rest.iter().all(|t| t == first) {
                first.clone()
            } else {
                Type::Any
            }
        }
    }
}

pub fn check_types(program: &Program) -> Vec<Diagnostic> {
    let mut issues = Vec::new();
    for (i, stmt) in program.statements.iter().enumerate() {
        walk_statement(stmt, &Path::root().index(i), &mut issues);
    }
    issues
}

fn walk_statement(stmt: &Node, path: &Path, issues: &mut Vec<Diagnostic>) {
    let Some((key, payload)) = stmt.discriminator() else {
        return;
    };
    let payload_path = path.field(key);
    match key {
        "let" | "set" => {
            if let Some(value) = payload.field("value") {
                infer(value, &payload_path.field("value"), issues);
            }
        }
        "return" | "expr" => {
            infer(payload, &payload_path, issues);
        }
        "print" => {
            if let Some(items) = payload.as_list() {
                for (i, item) in items.iter().enumerate() {
                    infer(item, &payload_path.index(i), issues);
                }
            }
        }
        "if" => {
            if let Some(cond) = payload.field("cond") {
                infer(cond, &payload_path.field("cond"), issues);
            }
            for branch_key in ["then", "else"] {
                if let Some(items) = payload.field(branch_key).and_then(Node::as_list) {
                    let branch_path = payload_path.field(branch_key);
                    for (i, item) in items.iter().enumerate() {
                        walk_statement(item, &branch_path.index(i), issues);
                    }
                }
            }
        }
        "def" => {
            if let Some(items) = payload.field("body").and_then(Node::as_list) {
                let body_path = payload_path.field("body");
                for (i, item) in items.iter().enumerate() {
                    walk_statement(item, &body_path.index(i), issues);
                }
            }
        }
        _ => {}
    }
}

fn infer(node: &Node, path: &Path, issues: &mut Vec<Diagnostic>) -> Type {
    match node {
        Node::Int(_) => Type::Int,
        Node::Float(_) => Type::Float,
        Node::Bool(_) => Type::Bool,
        Node::Str(_) => Type::Str,
        Node::Null => Type::Null,
        Node::List(items) => {
            let elem_types: Vec<Type> = items.iter().enumerate().map(|(i, item)| infer(item, &path.index(i), issues)).collect();
            Type::List(Box::new(join(&elem_types)))
        }
        Node::Map(_) => {
            let Some((key, payload)) = node.discriminator() else {
                return Type::Unknown;
            };
            infer_structured(key, payload, path, issues)
        }
    }
}

fn infer_structured(key: &str, payload: &Node, path: &Path, issues: &mut Vec<Diagnostic>) -> Type {
    let payload_path = path.field(key);
    let operands = |issues: &mut Vec<Diagnostic>| -> Vec<Type> {
        payload
            .as_list()
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .map(|(i, item)| infer(item, &payload_path.index(i), issues))
            .collect()
    };

    match key {
        "var" | "call" => Type::Unknown,
        "add" => {
            let types = operands(issues);
            if types.iter().all(Type::is_string) && !types.is_empty() {
                return Type::Str;
            }
            arith(&types, path, issues);
            Type::Float.max_with_ints(&types)
        }
        "sub" | "mul" | "div" | "mod" | "pow" => {
            let types = operands(issues);
            arith(&types, path, issues);
            Type::Float.max_with_ints(&types)
        }
        "eq" | "ne" => {
            let types = operands(issues);
            if let [a, b] = &types[..] {
                let compatible = match (a.broad_class(), b.broad_class()) {
                    (Some(x), Some(y)) => x == y,
                    _ => true,
                };
                if !compatible {
                    issues.push(Diagnostic::warning(
                        "W_TYPE_SUSPICIOUS",
                        path.to_string(),
                        format!("comparing unrelated types {a} and {b}"),
                    ));
                }
            }
            Type::Bool
        }
        "lt" | "le" | "gt" | "ge" => {
            let types = operands(issues);
            if let [a, b] = &types[..] {
                let ok = (a.is_numeric() && b.is_numeric()) || (a.is_string() && b.is_string());
                if !ok {
                    issues.push(Diagnostic::warning(
                        "W_TYPE_SUSPICIOUS",
                        path.to_string(),
                        format!("'{key}' between {a} and {b} is not numeric-numeric or string-string"),
                    ));
                }
            }
            Type::Bool
        }
        "and" | "or" | "not" => {
            operands(issues);
            Type::Bool
        }
        "list" => {
            let types = operands(issues);
            Type::List(Box::new(join(&types)))
        }
        "len" => {
            let types = operands(issues);
            if let [t] = &types[..] {
                if !matches!(t, Type::List(_) | Type::Str | Type::Any | Type::Unknown) {
                    issues.push(Diagnostic::error("E_TYPE_MISMATCH", path.to_string(), format!("'len' requires List or Str, got {t}")));
                }
            }
            Type::Int
        }
        "get" => {
            let types = operands(issues);
            match &types[..] {
                [Type::List(elem), idx] if idx.is_numeric() => (**elem).clone(),
                [Type::Str, idx] if idx.is_numeric() => Type::Str,
                [a, b] if matches!(a, Type::Any | Type::Unknown) => {
                    let _ = b;
                    Type::Unknown
                }
                _ => Type::Unknown,
            }
        }
        "has" => {
            operands(issues);
            Type::Bool
        }
        "concat" => {
            let types = operands(issues);
            let all_lists = types.iter().all(|t| matches!(t, Type::List(_) | Type::Any | Type::Unknown));
            let all_strings = types.iter().all(Type::is_string);
            if !all_lists && !all_strings && !types.is_empty() {
                issues.push(Diagnostic::error("E_TYPE_MISMATCH", path.to_string(), "'concat' requires all lists or all strings"));
            }
            if all_strings {
                Type::Str
            } else {
                Type::List(Box::new(join(&types)))
            }
        }
        "range" => {
            operands(issues);
            Type::List(Box::new(Type::Int))
        }
        "int" => {
            operands(issues);
            Type::Int
        }
        "input" => {
            operands(issues);
            Type::Str
        }
        _ => {
            operands(issues);
            Type::Unknown
        }
    }
}

fn arith(types: &[Type], path: &Path, issues: &mut Vec<Diagnostic>) {
    if types.iter().all(Type::is_numeric) {
        return;
    }
    let offending: Vec<String> = types.iter().map(ToString::to_string).collect();
    issues.push(
        Diagnostic::error("E_TYPE_MISMATCH", path.to_string(), format!("expected all numeric operands, got [{}]", offending.join(", ")))
            .with_hint("Convert arguments to same type"),
    );
}

impl Type {
    /// `Int op Int -> Int`; any `Float`/`Any`/`Unknown` operand widens the
    /// result (mirrors the VM's own int-stays-int-unless-mixed rule).
    fn max_with_ints(self, types: &[Type]) -> Type {
        if types.iter().all(|t| *t == Type::Int) {
            Type::Int
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(v: serde_json::Value) -> Program {
        Program::parse(&Node::from_json(&v)).unwrap()
    }

    #[test]
    fn type_mismatch_on_mixed_add() {
        let p = program(json!([{"let": {"name": "x", "value": {"add": [1, "text"]}}}]));
        let issues = check_types(&p);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "E_TYPE_MISMATCH");
        assert_eq!(issues[0].path, "/$[0]/let/value");
        assert_eq!(issues[0].hint.as_deref(), Some("Convert arguments to same type"));
    }

    #[test]
    fn string_add_is_fine() {
        let p = program(json!([{"let": {"name": "x", "value": {"add": ["a", "b"]}}}]));
        assert!(check_types(&p).is_empty());
    }

    #[test]
    fn var_and_call_are_unknown_no_false_positive() {
        let p = program(json!([
            {"let": {"name": "x", "value": {"add": [{"var": "n"}, {"call": {"name": "f", "args": []}}]}}}
        ]));
        assert!(check_types(&p).is_empty());
    }

    #[test]
    fn suspicious_comparison_warns() {
        let p = program(json!([{"let": {"name": "x", "value": {"eq": [1, [1, 2]]}}}]));
        let issues = check_types(&p);
        assert!(issues.iter().any(|d| d.code == "W_TYPE_SUSPICIOUS"));
    }
}
