//! The scope analyzer (§4.4, optional pass): walks the `global → function →
//! if-branch` scope chain, flagging shadowed bindings and undefined
//! references.

use crate::ast::{Node, Path, Program};
use crate::diagnostic::Diagnostic;
use std::collections::HashSet;

pub fn check_scopes(program: &Program) -> Vec<Diagnostic> {
    let mut issues = Vec::new();
    let global_names = collect_top_level_let_names(&program.statements);
    let mut scopes: Vec<HashSet<String>> = vec![HashSet::new()];
    process_block(&program.statements, &mut scopes, &global_names, &mut issues, &Path::root());
    issues
}

fn collect_top_level_let_names(statements: &[Node]) -> HashSet<String> {
    statements
        .iter()
        .filter_map(|stmt| {
            let ("let", payload) = stmt.discriminator()? else { return None };
            payload.field("name").and_then(Node::as_str).map(str::to_string)
        })
        .collect()
}

fn scope_contains(scopes: &[HashSet<String>], name: &str) -> bool {
    scopes.iter().rev().any(|s| s.contains(name))
}

fn process_block(stmts: &[Node], scopes: &mut Vec<HashSet<String>>, globals: &HashSet<String>, issues: &mut Vec<Diagnostic>, base: &Path) {
    for (i, stmt) in stmts.iter().enumerate() {
        process_stmt(stmt, scopes, globals, issues, &base.index(i));
    }
}

fn process_stmt(stmt: &Node, scopes: &mut Vec<HashSet<String>>, globals: &HashSet<String>, issues: &mut Vec<Diagnostic>, path: &Path) {
    let Some((key, payload)) = stmt.discriminator() else {
        return;
    };
    let payload_path = path.field(key);
    match key {
        "let" => {
            if let Some(value) = payload.field("value") {
                check_expr_refs(value, scopes, issues, &payload_path.field("value"));
            }
            if let Some(name) = payload.field("name").and_then(Node::as_str) {
                if scope_contains(&scopes[..scopes.len() - 1], name) {
                    issues.push(Diagnostic::warning(
                        "W_VARIABLE_SHADOW",
                        payload_path.to_string(),
                        format!("'{name}' shadows a binding from an enclosing scope"),
                    ));
                }
                scopes.last_mut().unwrap().insert(name.to_string());
            }
        }
        "set" => {
            if let Some(value) = payload.field("value") {
                check_expr_refs(value, scopes, issues, &payload_path.field("value"));
            }
            if let Some(name) = payload.field("name").and_then(Node::as_str) {
                if !scope_contains(scopes, name) {
                    issues.push(Diagnostic::error("E_UNDEFINED_VAR", payload_path.to_string(), format!("'{name}' is not in scope")));
                }
            }
        }
        "def" => {
            let params: HashSet<String> = payload
                .field("params")
                .and_then(Node::as_list)
                .map(|items| items.iter().filter_map(Node::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            // Function bodies do not inherit the caller's lexical scope
            // (§4.4) — only the program's globals plus the function's own
            // parameters are in scope.
            let mut body_scopes = vec![globals.clone(), params];
            if let Some(body) = payload.field("body").and_then(Node::as_list) {
                process_block(body, &mut body_scopes, globals, issues, &payload_path.field("body"));
            }
        }
        "if" => {
            if let Some(cond) = payload.field("cond") {
                check_expr_refs(cond, scopes, issues, &payload_path.field("cond"));
            }
            for branch_key in ["then", "else"] {
                if let Some(items) = payload.field(branch_key).and_then(Node::as_list) {
                    scopes.push(HashSet::new());
                    process_block(items, scopes, globals, issues, &payload_path.field(branch_key));
                    scopes.pop();
                }
            }
        }
        "return" | "expr" => check_expr_refs(payload, scopes, issues, &payload_path),
        "print" => {
            if let Some(items) = payload.as_list() {
                for (i, item) in items.iter().enumerate() {
                    check_expr_refs(item, scopes, issues, &payload_path.index(i));
                }
            }
        }
        _ => {}
    }
}

fn check_expr_refs(node: &Node, scopes: &[HashSet<String>], issues: &mut Vec<Diagnostic>, path: &Path) {
    match node {
        Node::List(items) => {
            for (i, item) in items.iter().enumerate() {
                check_expr_refs(item, scopes, issues, &path.index(i));
            }
        }
        Node::Map(_) => {
            let Some((key, payload)) = node.discriminator() else {
                return;
            };
            let payload_path = path.field(key);
            match key {
                "var" => {
                    if let Some(name) = payload.as_str() {
                        if !scope_contains(scopes, name) {
                            issues.push(
                                Diagnostic::error("E_UNDEFINED_VAR", path.to_string(), format!("'{name}' is not in scope"))
                                    .with_hint(format!("Add 'let {name}' before use or check for typos")),
                            );
                        }
                    }
                }
                "call" => {
                    if let Some(args) = payload.field("args").and_then(Node::as_list) {
                        let args_path = payload_path.field("args");
                        for (i, arg) in args.iter().enumerate() {
                            check_expr_refs(arg, scopes, issues, &args_path.index(i));
                        }
                    }
                }
                "spread" => check_expr_refs(payload, scopes, issues, &payload_path),
                _ => {
                    if let Some(items) = payload.as_list() {
                        for (i, item) in items.iter().enumerate() {
                            check_expr_refs(item, scopes, issues, &payload_path.index(i));
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
    fn undefined_variable_is_flagged() {
        let p = program(json!([{"let": {"name": "y", "value": {"var": "undefined"}}}]));
        let issues = check_scopes(&p);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "E_UNDEFINED_VAR");
        assert_eq!(issues[0].path, "/$[0]/let/value");
    }

    #[test]
    fn shadow_in_if_branch_warns() {
        let p = program(json!([
            {"let": {"name": "x", "value": 1}},
            {"if": {"cond": true, "then": [{"let": {"name": "x", "value": 2}}], "else": []}}
        ]));
        let issues = check_scopes(&p);
        assert!(issues.iter().any(|d| d.code == "W_VARIABLE_SHADOW"));
    }

    #[test]
    fn function_body_does_not_see_caller_locals() {
        let p = program(json!([
            {"let": {"name": "local_only", "value": 1}},
            {"def": {"name": "f", "params": [], "body": [{"return": {"var": "local_only"}}]}}
        ]));
        let issues = check_scopes(&p);
        assert!(issues.iter().any(|d| d.code == "E_UNDEFINED_VAR"));
    }

    #[test]
    fn function_body_sees_program_globals() {
        let p = program(json!([
            {"let": {"name": "g", "value": 1}},
            {"def": {"name": "f", "params": [], "body": [{"return": {"var": "g"}}]}}
        ]));
        let issues = check_scopes(&p);
        assert!(issues.is_empty(), "{:?}", issues);
    }
}
