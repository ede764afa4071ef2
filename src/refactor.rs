//! Shared refactor primitives (§4.7), used by both the edit engine's
//! `rename_variable`/`extract_function` operations and anything else that
//! needs to reason about variable references or free variables.

use crate::ast::{Node, Path, Program};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Definition,
    Write,
    Read,
    Parameter,
}

#[derive(Debug, Clone)]
pub struct VarReference {
    pub path: Path,
    pub kind: RefKind,
    /// `None` for a reference at program scope; `Some(id-or-name)` when
    /// inside a specific function's body.
    pub scope_id: Option<String>,
}

/// `scope` is `"all"` (every function plus program scope) or a specific
/// function id/name — matching the edit engine's `rename_variable` field.
pub fn find_variable_references(program: &Program, name: &str, scope: &str) -> Vec<VarReference> {
    let mut out = Vec::new();
    for (i, stmt) in program.statements.iter().enumerate() {
        walk(stmt, &Path::root().index(i), name, scope, None, &mut out);
    }
    out
}

fn scope_matches(scope: &str, current: &Option<String>) -> bool {
    if scope == "all" {
        return true;
    }
    match current {
        Some(id) => id == scope,
        None => false,
    }
}

fn walk(stmt: &Node, path: &Path, name: &str, scope: &str, current_scope: Option<String>, out: &mut Vec<VarReference>) {
    let Some((key, payload)) = stmt.discriminator() else {
        return;
    };
    let payload_path = path.field(key);
    match key {
        "let" => {
            if let Some(value) = payload.field("value") {
                walk_expr(value, &payload_path.field("value"), name, scope, &current_scope, out);
            }
            if payload.field("name").and_then(Node::as_str) == Some(name) && scope_matches(scope, &current_scope) {
                out.push(VarReference { path: payload_path, kind: RefKind::Definition, scope_id: current_scope });
            }
        }
        "set" => {
            if let Some(value) = payload.field("value") {
                walk_expr(value, &payload_path.field("value"), name, scope, &current_scope, out);
            }
            if payload.field("name").and_then(Node::as_str) == Some(name) && scope_matches(scope, &current_scope) {
                out.push(VarReference { path: payload_path, kind: RefKind::Write, scope_id: current_scope });
            }
        }
        "def" => {
            let fn_scope = stmt.id().map(str::to_string).or_else(|| payload.field("name").and_then(Node::as_str).map(str::to_string));
            if let Some(params) = payload.field("params").and_then(Node::as_list) {
                let params_path = payload_path.field("params");
                for (i, p) in params.iter().enumerate() {
                    if p.as_str() == Some(name) && scope_matches(scope, &fn_scope) {
                        out.push(VarReference { path: params_path.index(i), kind: RefKind::Parameter, scope_id: fn_scope.clone() });
                    }
                }
            }
            if let Some(body) = payload.field("body").and_then(Node::as_list) {
                let body_path = payload_path.field("body");
                for (i, s) in body.iter().enumerate() {
                    walk(s, &body_path.index(i), name, scope, fn_scope.clone(), out);
                }
            }
        }
        "if" => {
            if let Some(cond) = payload.field("cond") {
                walk_expr(cond, &payload_path.field("cond"), name, scope, &current_scope, out);
            }
            for branch_key in ["then", "else"] {
                if let Some(items) = payload.field(branch_key).and_then(Node::as_list) {
                    let branch_path = payload_path.field(branch_key);
                    for (i, s) in items.iter().enumerate() {
                        walk(s, &branch_path.index(i), name, scope, current_scope.clone(), out);
                    }
                }
            }
        }
        "return" | "expr" => walk_expr(payload, &payload_path, name, scope, &current_scope, out),
        "print" => {
            if let Some(items) = payload.as_list() {
                for (i, item) in items.iter().enumerate() {
                    walk_expr(item, &payload_path.index(i), name, scope, &current_scope, out);
                }
            }
        }
        _ => {}
    }
}

fn walk_expr(node: &Node, path: &Path, name: &str, scope: &str, current_scope: &Option<String>, out: &mut Vec<VarReference>) {
    match node {
        Node::List(items) => {
            for (i, item) in items.iter().enumerate() {
                walk_expr(item, &path.index(i), name, scope, current_scope, out);
            }
        }
        Node::Map(_) => {
            let Some((key, payload)) = node.discriminator() else {
                return;
            };
            let payload_path = path.field(key);
            match key {
                "var" => {
                    if payload.as_str() == Some(name) && scope_matches(scope, current_scope) {
                        out.push(VarReference { path: path.clone(), kind: RefKind::Read, scope_id: current_scope.clone() });
                    }
                }
                "call" => {
                    if let Some(args) = payload.field("args").and_then(Node::as_list) {
                        let args_path = payload_path.field("args");
                        for (i, arg) in args.iter().enumerate() {
                            walk_expr(arg, &args_path.index(i), name, scope, current_scope, out);
                        }
                    }
                }
                "spread" => walk_expr(payload, &payload_path, name, scope, current_scope, out),
                _ => {
                    if let Some(items) = payload.as_list() {
                        for (i, item) in items.iter().enumerate() {
                            walk_expr(item, &payload_path.index(i), name, scope, current_scope, out);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

/// Names read or written within `statements` but not defined inside them.
/// Parameters of an enclosing `def` are free from the block's own
/// perspective (the block doesn't know it's inside a function).
pub fn analyze_free_variables(statements: &[Node]) -> HashSet<String> {
    let mut defined = HashSet::new();
    let mut used = HashSet::new();
    collect_free(statements, &mut defined, &mut used);
    used.difference(&defined).cloned().collect()
}

fn collect_free(statements: &[Node], defined: &mut HashSet<String>, used: &mut HashSet<String>) {
    for stmt in statements {
        let Some((key, payload)) = stmt.discriminator() else {
            continue;
        };
        match key {
            "let" => {
                if let Some(v) = payload.field("value") {
                    collect_free_expr(v, used);
                }
                if let Some(name) = payload.field("name").and_then(Node::as_str) {
                    defined.insert(name.to_string());
                }
            }
            "set" => {
                if let Some(v) = payload.field("value") {
                    collect_free_expr(v, used);
                }
                if let Some(name) = payload.field("name").and_then(Node::as_str) {
                    used.insert(name.to_string());
                }
            }
            "if" => {
                if let Some(c) = payload.field("cond") {
                    collect_free_expr(c, used);
                }
                for branch_key in ["then", "else"] {
                    if let Some(items) = payload.field(branch_key).and_then(Node::as_list) {
                        collect_free(items, defined, used);
                    }
                }
            }
            "def" => {
                if let Some(name) = payload.field("name").and_then(Node::as_str) {
                    defined.insert(name.to_string());
                }
            }
            "return" | "expr" => {
                collect_free_expr(payload, used);
            }
            "print" => {
                if let Some(items) = payload.as_list() {
                    for item in items {
                        collect_free_expr(item, used);
                    }
                }
            }
            _ => {}
        }
    }
}

fn collect_free_expr(node: &Node, used: &mut HashSet<String>) {
    match node {
        Node::List(items) => {
            for item in items {
                collect_free_expr(item, used);
            }
        }
        Node::Map(_) => {
            let Some((key, payload)) = node.discriminator() else {
                return;
            };
            match key {
                "var" => {
                    if let Some(name) = payload.as_str() {
                        used.insert(name.to_string());
                    }
                }
                "call" => {
                    if let Some(args) = payload.field("args").and_then(Node::as_list) {
                        for arg in args {
                            collect_free_expr(arg, used);
                        }
                    }
                }
                "spread" => collect_free_expr(payload, used),
                _ => {
                    if let Some(items) = payload.as_list() {
                        for item in items {
                            collect_free_expr(item, used);
                        }
                    }
                }
            }
        }
        _ => {}
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
    fn finds_all_reference_kinds() {
        let p = program(json!([
            {"let": {"name": "x", "value": 10}},
            {"let": {"name": "y", "value": {"mul": [{"var": "x"}, 2]}}},
            {"set": {"name": "x", "value": 5}},
            {"print": [{"var": "x"}]}
        ]));
        let refs = find_variable_references(&p, "x", "all");
        assert_eq!(refs.len(), 4); // definition, read, write, read
    }

    #[test]
    fn free_variables_exclude_locally_defined() {
        let body = Node::from_json(&json!([
            {"let": {"name": "local", "value": 1}},
            {"expr": {"add": [{"var": "local"}, {"var": "outer"}]}}
        ]));
        let stmts = body.as_list().unwrap();
        let free = analyze_free_variables(stmts);
        assert!(free.contains("outer"));
        assert!(!free.contains("local"));
    }
}
