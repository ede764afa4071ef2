//! Id-stamping and call-style migration (§6 `add-uid`, `migrate-calls`).
//!
//! Neither operation is one of the declarative edit operations in §4.6 —
//! they're whole-program, CLI-level transforms offered as convenience
//! tooling around the same `Node` tree, grounded in the same id/name
//! addressing rules as the edit and validator engines.

use crate::ast::{Node, Program};
use std::collections::HashSet;

/// Stamps a deterministic, collision-free id onto every top-level statement
/// that lacks one (`deep == false`), or onto every structured node in the
/// tree that lacks one (`deep == true`). Ids are generated as `n<counter>`,
/// skipping any value already present in the program so no existing id is
/// ever shadowed.
pub fn stamp_missing_ids(program: &Program, deep: bool) -> (Program, usize) {
    let existing = collect_ids(&program.statements);
    let mut counter = 0usize;
    let mut next_id = move |existing: &HashSet<String>| loop {
        let candidate = format!("n{counter}");
        counter += 1;
        if !existing.contains(&candidate) {
            return candidate;
        }
    };
    let mut stamped = 0usize;
    let statements = program
        .statements
        .iter()
        .map(|stmt| stamp_node(stmt, deep, &existing, &mut next_id, &mut stamped, true))
        .collect();
    (Program { version: program.version.clone(), statements }, stamped)
}

fn collect_ids(statements: &[Node]) -> HashSet<String> {
    fn walk(node: &Node, out: &mut HashSet<String>) {
        if let Some(id) = node.id() {
            out.insert(id.to_string());
        }
        match node {
            Node::List(items) => items.iter().for_each(|i| walk(i, out)),
            Node::Map(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut out = HashSet::new();
    statements.iter().for_each(|s| walk(s, &mut out));
    out
}

/// `top_level` is true only for the statements directly in `program.statements`
/// — in shallow mode, only those get stamped; in deep mode every structured
/// node does, regardless of nesting.
fn stamp_node(
    node: &Node,
    deep: bool,
    existing: &HashSet<String>,
    next_id: &mut impl FnMut(&HashSet<String>) -> String,
    stamped: &mut usize,
    top_level: bool,
) -> Node {
    match node {
        Node::Map(map) => {
            let is_structured = node.discriminator().is_some();
            let mut new_map = map.clone();
            if is_structured && (deep || top_level) && !new_map.contains_key("id") {
                new_map.insert("id".to_string(), Node::Str(next_id(existing)));
                *stamped += 1;
            }
            let new_map = new_map
                .into_iter()
                .map(|(k, v)| (k, stamp_node(&v, deep, existing, next_id, stamped, false)))
                .collect();
            Node::Map(new_map)
        }
        Node::List(items) => Node::List(
            items
                .iter()
                .map(|i| stamp_node(i, deep, existing, next_id, stamped, top_level))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    Id,
    Name,
}

/// Normalizes every `call` node to the requested style. Going `--to id`
/// requires the referenced function to carry an id (calls that can't be
/// resolved to an id-bearing function are left untouched); going `--to
/// name` requires the function to have a `name` (every Amorph function
/// does). Returns the rewritten program and the count of calls changed.
pub fn migrate_calls(program: &Program, to: CallStyle) -> (Program, usize) {
    let id_by_name: std::collections::HashMap<&str, &str> = program
        .functions()
        .into_iter()
        .filter_map(|f| f.id.map(|id| (f.name, id)))
        .collect();
    let name_by_id: std::collections::HashMap<&str, &str> =
        program.functions().into_iter().filter_map(|f| f.id.map(|id| (id, f.name))).collect();

    let mut count = 0usize;
    let statements = program
        .statements
        .iter()
        .map(|stmt| migrate_node(stmt, to, &id_by_name, &name_by_id, &mut count))
        .collect();
    (Program { version: program.version.clone(), statements }, count)
}

fn migrate_node(
    node: &Node,
    to: CallStyle,
    id_by_name: &std::collections::HashMap<&str, &str>,
    name_by_id: &std::collections::HashMap<&str, &str>,
    count: &mut usize,
) -> Node {
    match node {
        Node::Map(map) => {
            let mut new_map: std::collections::BTreeMap<String, Node> = map
                .iter()
                .map(|(k, v)| (k.clone(), migrate_node(v, to, id_by_name, name_by_id, count)))
                .collect();
            if node_is_call(&new_map) {
                if let Some(Node::Map(payload)) = new_map.get_mut("call") {
                    let id = payload.get("id").and_then(Node::as_str).map(str::to_string);
                    let name = payload.get("name").and_then(Node::as_str).map(str::to_string);
                    match to {
                        CallStyle::Id => {
                            if id.is_none() {
                                if let Some(resolved) = name.as_deref().and_then(|n| id_by_name.get(n)) {
                                    payload.insert("id".to_string(), Node::Str((*resolved).to_string()));
                                    payload.remove("name");
                                    *count += 1;
                                }
                            }
                        }
                        CallStyle::Name => {
                            if name.is_none() {
                                if let Some(resolved) = id.as_deref().and_then(|i| name_by_id.get(i)) {
                                    payload.insert("name".to_string(), Node::Str((*resolved).to_string()));
                                    payload.remove("id");
                                    *count += 1;
                                }
                            }
                        }
                    }
                }
            }
            Node::Map(new_map)
        }
        Node::List(items) => Node::List(items.iter().map(|i| migrate_node(i, to, id_by_name, name_by_id, count)).collect()),
        scalar => scalar.clone(),
    }
}

fn node_is_call(map: &std::collections::BTreeMap<String, Node>) -> bool {
    let mut non_id = map.iter().filter(|(k, _)| k.as_str() != "id");
    matches!((non_id.next(), non_id.next()), (Some((k, _)), None) if k == "call")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub code: &'static str,
    pub path: String,
    pub message: String,
}

/// Surfaces cheap, mechanical improvement opportunities (§6 `suggest`):
/// missing ids and the rename/call-style warnings the validator already
/// computes. This intentionally reuses [`crate::validate::validate`]'s
/// warnings rather than duplicating their detection logic.
pub fn suggest(program: &Program) -> Vec<Suggestion> {
    let mut out = Vec::new();
    for (i, stmt) in program.statements.iter().enumerate() {
        if stmt.discriminator().is_some() && stmt.id().is_none() {
            out.push(Suggestion {
                code: "S_MISSING_ID",
                path: format!("/$[{i}]"),
                message: "statement has no 'id'; add one for stable addressing".to_string(),
            });
        }
    }
    let report = crate::validate::validate(program);
    for issue in report.issues {
        if matches!(issue.code, "W_PREFER_ID" | "W_MIXED_CALL_STYLE" | "W_DUPLICATE_NAME") {
            out.push(Suggestion { code: issue.code, path: issue.path, message: issue.message });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(v: serde_json::Value) -> Program {
        Program::parse(&Node::from_json(&v)).unwrap()
    }

    #[test]
    fn stamps_only_top_level_when_shallow() {
        let p = program(json!([
            {"let": {"name": "x", "value": {"add": [1, 2]}}}
        ]));
        let (stamped, count) = stamp_missing_ids(&p, false);
        assert_eq!(count, 1);
        assert!(stamped.statements[0].id().is_some());
        // Nested 'add' node untouched in shallow mode.
        assert!(stamped.statements[0].field("let").unwrap().field("value").unwrap().id().is_none());
    }

    #[test]
    fn deep_stamps_nested_nodes_too() {
        let p = program(json!([
            {"let": {"name": "x", "value": {"add": [1, 2]}}}
        ]));
        let (stamped, count) = stamp_missing_ids(&p, true);
        assert!(count >= 2);
        assert!(stamped.statements[0].field("let").unwrap().field("value").unwrap().id().is_some());
    }

    #[test]
    fn migrate_to_id_uses_resolved_function_id() {
        let p = program(json!([
            {"id": "fn_f", "def": {"name": "f", "params": [], "body": []}},
            {"expr": {"call": {"name": "f", "args": []}}}
        ]));
        let (migrated, count) = migrate_calls(&p, CallStyle::Id);
        assert_eq!(count, 1);
        let call = migrated.statements[1].field("expr").unwrap().field("call").unwrap();
        assert_eq!(call.field("id").unwrap().as_str(), Some("fn_f"));
        assert!(call.field("name").is_none());
    }

    #[test]
    fn suggest_flags_missing_ids() {
        let p = program(json!([{"let": {"name": "x", "value": 1}}]));
        let suggestions = suggest(&p);
        assert!(suggestions.iter().any(|s| s.code == "S_MISSING_ID"));
    }
}
