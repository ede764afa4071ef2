//! The semantic validator (§4.3): structural, symbol-table, and
//! call/operator-arity checks. Unlike the VM, a validator pass never stops
//! at the first issue — it walks the whole program and accumulates
//! [`Diagnostic`]s.

pub mod scope;
pub mod types;

use crate::ast::{Node, Path, Program};
use crate::diagnostic::{Diagnostic, ValidationReport};
use crate::registry::registry;
use std::collections::{HashMap, HashSet};

pub use scope::check_scopes;
pub use types::check_types;

/// Runs the semantic validator alone. Callers that also want scope or type
/// diagnostics merge those passes' output in (§2: "independent passes
/// composed into one report").
pub fn validate(program: &Program) -> ValidationReport {
    let mut issues = Vec::new();
    check_symbols(program, &mut issues);
    for (i, stmt) in program.statements.iter().enumerate() {
        walk_statement(stmt, &Path::root().index(i), &mut issues);
    }
    ValidationReport::new(issues)
}

fn check_symbols(program: &Program, issues: &mut Vec<Diagnostic>) {
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    let mut seen_name_call = false;
    let mut seen_id_call = false;

    for func in program.functions() {
        *by_name.entry(func.name).or_insert(0) += 1;
        if let Some(id) = func.id {
            *by_id.entry(id).or_insert(0) += 1;
        }
    }
    for (name, count) in &by_name {
        if *count > 1 {
            issues.push(Diagnostic::warning("W_DUPLICATE_NAME", "/", format!("function name '{name}' is defined more than once")));
        }
    }
    for (id, count) in &by_id {
        if *count > 1 {
            issues.push(Diagnostic::error("E_DUPLICATE_ID", "/", format!("id '{id}' is used by more than one node")));
        }
    }

    let known_ids: HashSet<&str> = program.functions().iter().filter_map(|f| f.id).collect();
    let known_names: HashSet<&str> = program.functions().iter().map(|f| f.name).collect();

    for (i, stmt) in program.statements.iter().enumerate() {
        visit_calls(stmt, &Path::root().index(i), &known_ids, &known_names, issues, &mut seen_name_call, &mut seen_id_call);
    }
    if seen_name_call && seen_id_call {
        issues.push(Diagnostic::warning("W_MIXED_CALL_STYLE", "/", "program mixes id-based and name-based function calls"));
    }
}

fn visit_calls(
    node: &Node,
    path: &Path,
    known_ids: &HashSet<&str>,
    known_names: &HashSet<&str>,
    issues: &mut Vec<Diagnostic>,
    seen_name_call: &mut bool,
    seen_id_call: &mut bool,
) {
    let Some((key, payload)) = node.discriminator() else {
        return;
    };
    let payload_path = path.field(key);
    if key == "call" {
        let id = payload.field("id").and_then(Node::as_str);
        let name = payload.field("name").and_then(Node::as_str);
        match (id, name) {
            (Some(id), _) if known_ids.contains(id) => *seen_id_call = true,
            (Some(id), _) => {
                issues.push(Diagnostic::error("E_UNKNOWN_FUNC", payload_path.to_string(), format!("no function with id '{id}'")));
            }
            (None, Some(name)) if known_names.contains(name) => {
                *seen_name_call = true;
                issues.push(
                    Diagnostic::warning("W_PREFER_ID", payload_path.to_string(), format!("calling '{name}' by name; an id is available"))
                        .with_hint("Call by id instead for rename-safety"),
                );
            }
            (None, Some(name)) => {
                issues.push(Diagnostic::error("E_UNKNOWN_FUNC", payload_path.to_string(), format!("no function named '{name}'")));
            }
            (None, None) => {
                issues.push(Diagnostic::error("E_UNKNOWN_FUNC", payload_path.to_string(), "call has neither 'id' nor 'name'"));
            }
        }
        if let Some(args) = payload.field("args").and_then(Node::as_list) {
            let args_path = payload_path.field("args");
            for (i, arg) in args.iter().enumerate() {
                visit_calls(arg, &args_path.index(i), known_ids, known_names, issues, seen_name_call, seen_id_call);
            }
        }
        return;
    }
    for (child_path, child) in child_nodes(key, payload, &payload_path) {
        visit_calls(child, &child_path, known_ids, known_names, issues, seen_name_call, seen_id_call);
    }
}

/// Enumerates the child expression/statement positions the validator walks
/// (§4.3: "let.value, set.value, return, expr, if.cond/then/else, def.body,
/// call.args, and every operator's operand list").
fn child_nodes<'a>(key: &str, payload: &'a Node, payload_path: &Path) -> Vec<(Path, &'a Node)> {
    let mut out = Vec::new();
    match key {
        "let" | "set" => {
            if let Some(v) = payload.field("value") {
                out.push((payload_path.field("value"), v));
            }
        }
        "return" | "expr" | "spread" => out.push((payload_path.clone(), payload)),
        "if" => {
            if let Some(c) = payload.field("cond") {
                out.push((payload_path.field("cond"), c));
            }
            for branch_key in ["then", "else"] {
                if let Some(items) = payload.field(branch_key).and_then(Node::as_list) {
                    let branch_path = payload_path.field(branch_key);
                    for (i, item) in items.iter().enumerate() {
                        out.push((branch_path.index(i), item));
                    }
                }
            }
        }
        "def" => {
            if let Some(items) = payload.field("body").and_then(Node::as_list) {
                let body_path = payload_path.field("body");
                for (i, item) in items.iter().enumerate() {
                    out.push((body_path.index(i), item));
                }
            }
        }
        "print" => {
            if let Some(items) = payload.as_list() {
                for (i, item) in items.iter().enumerate() {
                    out.push((payload_path.index(i), item));
                }
            }
        }
        "var" | "call" => {}
        _ => {
            // Every other discriminator is an operator: its payload is the
            // operand list.
            if let Some(items) = payload.as_list() {
                for (i, item) in items.iter().enumerate() {
                    out.push((payload_path.index(i), item));
                }
            }
        }
    }
    out
}

fn walk_statement(stmt: &Node, path: &Path, issues: &mut Vec<Diagnostic>) {
    let Some((key, payload)) = stmt.discriminator() else {
        issues.push(Diagnostic::error("E_SHAPE", path.to_string(), "statement is not a single-discriminator node"));
        return;
    };
    if !crate::ast::STATEMENT_KEYS.contains(&key) {
        issues.push(Diagnostic::error("E_SHAPE", path.to_string(), format!("'{key}' is not a recognized statement form")));
        return;
    }
    let payload_path = path.field(key);
    match key {
        "if" => {
            for branch_key in ["then", "else"] {
                if let Some(items) = payload.field(branch_key).and_then(Node::as_list) {
                    let branch_path = payload_path.field(branch_key);
                    for (i, item) in items.iter().enumerate() {
                        walk_statement(item, &branch_path.index(i), issues);
                    }
                }
            }
            if let Some(cond) = payload.field("cond") {
                walk_operators(cond, &payload_path.field("cond"), issues);
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
        "let" | "set" => {
            if let Some(v) = payload.field("value") {
                walk_operators(v, &payload_path.field("value"), issues);
            }
        }
        "return" | "expr" => walk_operators(payload, &payload_path, issues),
        "print" => {
            if let Some(items) = payload.as_list() {
                for (i, item) in items.iter().enumerate() {
                    walk_operators(item, &payload_path.index(i), issues);
                }
            }
        }
        _ => {}
    }
}

/// Arity-checks every operator node reachable from `node` (excluding
/// `var`/`call`, which carry no operator arity).
fn walk_operators(node: &Node, path: &Path, issues: &mut Vec<Diagnostic>) {
    let Some((key, payload)) = node.discriminator() else {
        return;
    };
    let payload_path = path.field(key);
    if key == "var" {
        return;
    }
    if key == "call" {
        if let Some(args) = payload.field("args").and_then(Node::as_list) {
            let args_path = payload_path.field("args");
            for (i, arg) in args.iter().enumerate() {
                walk_operators(arg, &args_path.index(i), issues);
            }
        }
        return;
    }
    let operands = payload.as_list().map(<[Node]>::len).unwrap_or(if matches!(payload, Node::Map(_)) { 0 } else { 1 });
    match registry().lookup(key) {
        None => issues.push(Diagnostic::error("E_UNKNOWN_OP", path.to_string(), format!("unknown operator '{key}'"))),
        Some(spec) if !spec.arity.accepts(operands) => {
            issues.push(Diagnostic::error(
                "E_OP_ARITY",
                path.to_string(),
                format!("'{key}' expects {} argument(s), got {operands}", spec.arity.describe()),
            ));
        }
        Some(_) => {}
    }
    if let Some(items) = payload.as_list() {
        for (i, item) in items.iter().enumerate() {
            walk_operators(item, &payload_path.index(i), issues);
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
    fn flags_unknown_operator() {
        let p = program(json!([{"let": {"name": "x", "value": {"frobnicate": [1]}}}]));
        let report = validate(&p);
        assert!(!report.ok);
        assert!(report.issues.iter().any(|d| d.code == "E_UNKNOWN_OP"));
    }

    #[test]
    fn flags_op_arity_mismatch() {
        let p = program(json!([{"let": {"name": "x", "value": {"sub": [1, 2, 3]}}}]));
        let report = validate(&p);
        assert!(report.issues.iter().any(|d| d.code == "E_OP_ARITY"));
    }

    #[test]
    fn flags_duplicate_function_name() {
        let p = program(json!([
            {"def": {"name": "f", "params": [], "body": []}},
            {"def": {"name": "f", "params": [], "body": []}}
        ]));
        let report = validate(&p);
        assert!(report.issues.iter().any(|d| d.code == "W_DUPLICATE_NAME"));
    }

    #[test]
    fn prefers_id_warns_on_name_call() {
        let p = program(json!([
            {"id": "fn_f", "def": {"name": "f", "params": [], "body": []}},
            {"expr": {"call": {"name": "f", "args": []}}}
        ]));
        let report = validate(&p);
        assert!(report.issues.iter().any(|d| d.code == "W_PREFER_ID"));
    }

    #[test]
    fn valid_program_has_no_issues() {
        let p = program(json!([
            {"let": {"name": "x", "value": {"add": [1, 2]}}},
            {"print": [{"var": "x"}]}
        ]));
        let report = validate(&p);
        assert!(report.ok, "{:?}", report.issues);
    }
}
