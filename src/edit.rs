//! The structural edit engine (§4.6): declarative AST edit operations
//! addressed by stable id or canonical path. An edit batch is transactional
//! (§7/§8 "edit atomicity") — operations apply to a working copy of the
//! program; if any operation fails, the original program is returned
//! unchanged together with the first failure, via an apply-to-a-copy-then-
//! swap approach (§9).

use crate::ast::path::{navigate, navigate_mut, parent_sequence_and_index};
use crate::ast::{Node, Path, Program};
use crate::refactor::{self, RefKind};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum EditError {
    #[error("bad path: {0}")]
    BadPath(String),
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("target is ambiguous: {0}")]
    Ambiguous(String),
    #[error("target is not an element of a sequence: {0}")]
    NotInSequence(String),
    #[error("malformed edit operation: {0}")]
    BadSpec(String),
}

impl EditError {
    pub fn code(&self) -> &'static str {
        match self {
            EditError::BadPath(_) => "E_BAD_PATH",
            EditError::NotFound(_) | EditError::Ambiguous(_) | EditError::NotInSequence(_) | EditError::BadSpec(_) => "E_BAD_SPEC",
        }
    }
}

/// Either a stable id or an explicit canonical path — the two ways every
/// operation in §4.6's table addresses a node.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub target: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallMatch {
    pub name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CallSet {
    pub name: Option<String>,
    pub id: Option<String>,
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    AddFunction {
        name: String,
        params: Vec<String>,
        body: serde_json::Value,
        id: Option<String>,
    },
    RenameFunction {
        id: Option<String>,
        from: Option<String>,
        to: String,
    },
    InsertBefore {
        target: Option<String>,
        path: Option<String>,
        node: serde_json::Value,
    },
    InsertAfter {
        target: Option<String>,
        path: Option<String>,
        node: serde_json::Value,
    },
    ReplaceCall {
        #[serde(rename = "match")]
        match_: CallMatch,
        set: CallSet,
    },
    DeleteNode {
        target: Option<String>,
        path: Option<String>,
    },
    RenameVariable {
        old_name: String,
        new_name: String,
        scope: String,
        path: Option<String>,
    },
    ExtractFunction {
        statements: Vec<usize>,
        parameters: Vec<String>,
        function_name: String,
        function_id: Option<String>,
        insert_at: usize,
        replace_with_call: bool,
    },
}

/// A one-line summary of what an operation did, returned for dry-run
/// reporting and for callers that want to log what happened.
#[derive(Debug, Clone, PartialEq)]
pub struct OpReport {
    pub op: &'static str,
    pub detail: String,
}

pub struct EditOutcome {
    pub program: Program,
    pub reports: Vec<OpReport>,
}

/// Applies every operation in `ops`, in order, to `program`. On the first
/// failure the whole batch is rolled back: the returned error carries no
/// mutated tree, and the caller's original `program` is never touched
/// (we always operate on a clone).
pub fn apply_edits(program: &Program, ops: &[EditOp]) -> Result<EditOutcome, EditError> {
    let mut statements = program.statements.clone();
    let mut reports = Vec::with_capacity(ops.len());
    for op in ops {
        let report = apply_one(&mut statements, op)?;
        reports.push(report);
    }
    Ok(EditOutcome {
        program: Program { version: program.version.clone(), statements },
        reports,
    })
}

fn resolve_target(statements: &[Node], target: &Target) -> Result<Path, EditError> {
    if let Some(id) = &target.target {
        return find_path_by_id(statements, id).ok_or_else(|| EditError::NotFound(id.clone()));
    }
    if let Some(raw) = &target.path {
        return Path::parse(raw).map_err(|e| EditError::BadPath(e.0));
    }
    Err(EditError::BadSpec("operation requires 'target' or 'path'".into()))
}

/// Finds the path to the (possibly nested) node carrying `id`, searching
/// the whole tree rather than only the top level, so insert/delete can
/// target statements nested in a function body or `if` branch.
fn find_path_by_id(statements: &[Node], id: &str) -> Option<Path> {
    fn search(node: &Node, path: &Path, id: &str) -> Option<Path> {
        if node.id() == Some(id) {
            return Some(path.clone());
        }
        match node {
            Node::List(items) => items.iter().enumerate().find_map(|(i, item)| search(item, &path.index(i), id)),
            Node::Map(map) => map.iter().find_map(|(k, v)| search(v, &path.field(k), id)),
            _ => None,
        }
    }
    for (i, stmt) in statements.iter().enumerate() {
        if let Some(found) = search(stmt, &Path::root().index(i), id) {
            return Some(found);
        }
    }
    None
}

fn apply_one(statements: &mut Vec<Node>, op: &EditOp) -> Result<OpReport, EditError> {
    match op {
        EditOp::AddFunction { name, params, body, id } => {
            let body_node = Node::from_json(body);
            let body_list = body_node.as_list().map(<[Node]>::to_vec).unwrap_or_else(|| vec![body_node.clone()]);
            let mut payload = std::collections::BTreeMap::new();
            payload.insert("name".to_string(), Node::Str(name.clone()));
            payload.insert("params".to_string(), Node::List(params.iter().cloned().map(Node::Str).collect()));
            payload.insert("body".to_string(), Node::List(body_list));
            let mut def = std::collections::BTreeMap::new();
            if let Some(id) = id {
                def.insert("id".to_string(), Node::Str(id.clone()));
            }
            def.insert("def".to_string(), Node::Map(payload));
            statements.push(Node::Map(def));
            Ok(OpReport { op: "add_function", detail: format!("added function '{name}'") })
        }
        EditOp::RenameFunction { id, from, to } => {
            let target_idx = match id {
                Some(id) => statements.iter().position(|s| s.id() == Some(id.as_str())),
                None => {
                    let from = from.as_ref().ok_or_else(|| EditError::BadSpec("rename_function requires 'id' or 'from'".into()))?;
                    let mut matches = statements.iter().enumerate().filter(|(_, s)| {
                        s.discriminator()
                            .map(|(k, p)| k == "def" && p.field("name").and_then(Node::as_str) == Some(from.as_str()))
                            .unwrap_or(false)
                    });
                    let (i, _) = matches.next().ok_or_else(|| EditError::NotFound(from.clone()))?;
                    if matches.next().is_some() {
                        return Err(EditError::Ambiguous(format!("function name '{from}' is not unique")));
                    }
                    Some(i)
                }
            }
            .ok_or_else(|| EditError::NotFound(id.clone().or_else(|| from.clone()).unwrap_or_default()))?;

            let old_name = {
                let def_stmt = &mut statements[target_idx];
                let Node::Map(map) = def_stmt else {
                    return Err(EditError::BadSpec("rename_function target is not a 'def' node".into()));
                };
                let Some(Node::Map(payload)) = map.get_mut("def") else {
                    return Err(EditError::BadSpec("rename_function target is not a 'def' node".into()));
                };
                let old = payload.get("name").and_then(Node::as_str).map(str::to_string);
                payload.insert("name".to_string(), Node::Str(to.clone()));
                old
            };
            let old_name = old_name.ok_or_else(|| EditError::BadSpec("target 'def' has no 'name'".into()))?;

            let mut renamed = 0usize;
            for stmt in statements.iter_mut() {
                renamed += rename_calls_by_name(stmt, &old_name, to);
            }
            Ok(OpReport { op: "rename_function", detail: format!("renamed '{old_name}' to '{to}' ({renamed} call site(s) updated)") })
        }
        EditOp::InsertBefore { target, path: raw_path, node } => {
            let path = resolve_target(statements, &Target { target: target.clone(), path: raw_path.clone() })?;
            let mut root = Node::List(std::mem::take(statements));
            let (seq, idx) = parent_sequence_and_index(&mut root, &path).ok_or_else(|| EditError::NotInSequence(path.to_string()))?;
            seq.insert(idx, Node::from_json(node));
            *statements = match root {
                Node::List(items) => items,
                _ => unreachable!(),
            };
            Ok(OpReport { op: "insert_before", detail: format!("inserted node before {path}") })
        }
        EditOp::InsertAfter { target, path: raw_path, node } => {
            let path = resolve_target(statements, &Target { target: target.clone(), path: raw_path.clone() })?;
            let mut root = Node::List(std::mem::take(statements));
            let (seq, idx) = parent_sequence_and_index(&mut root, &path).ok_or_else(|| EditError::NotInSequence(path.to_string()))?;
            seq.insert(idx + 1, Node::from_json(node));
            *statements = match root {
                Node::List(items) => items,
                _ => unreachable!(),
            };
            Ok(OpReport { op: "insert_after", detail: format!("inserted node after {path}") })
        }
        EditOp::ReplaceCall { match_, set } => {
            let mut count = 0usize;
            for stmt in statements.iter_mut() {
                count += replace_calls(stmt, match_, set);
            }
            Ok(OpReport { op: "replace_call", detail: format!("updated {count} call site(s)") })
        }
        EditOp::DeleteNode { target, path: raw_path } => {
            let path = resolve_target(statements, &Target { target: target.clone(), path: raw_path.clone() })?;
            let mut root = Node::List(std::mem::take(statements));
            let (seq, idx) = parent_sequence_and_index(&mut root, &path).ok_or_else(|| EditError::NotInSequence(path.to_string()))?;
            if idx >= seq.len() {
                *statements = match root {
                    Node::List(items) => items,
                    _ => unreachable!(),
                };
                return Err(EditError::NotFound(path.to_string()));
            }
            seq.remove(idx);
            *statements = match root {
                Node::List(items) => items,
                _ => unreachable!(),
            };
            Ok(OpReport { op: "delete_node", detail: format!("deleted node at {path}") })
        }
        EditOp::RenameVariable { old_name, new_name, scope, path } => {
            let refs = match path {
                None => {
                    let program = Program { version: None, statements: statements.clone() };
                    refactor::find_variable_references(&program, old_name, scope)
                }
                Some(raw) => {
                    // Scoped rename: search only the subtree addressed by `path`,
                    // then translate each found path back into a full-tree path
                    // by substituting the synthetic single-statement prefix.
                    let p = Path::parse(raw).map_err(|e| EditError::BadPath(e.0))?;
                    let full = Node::List(statements.clone());
                    let found = navigate(&full, &p).ok_or_else(|| EditError::NotFound(raw.clone()))?.clone();
                    let sub_program = Program { version: None, statements: vec![found] };
                    refactor::find_variable_references(&sub_program, old_name, scope)
                        .into_iter()
                        .map(|r| {
                            let mut segments = p.0.clone();
                            segments.extend(r.path.0.into_iter().skip(1));
                            refactor::VarReference { path: Path(segments), ..r }
                        })
                        .collect()
                }
            };
            let count = refs.len();

            let mut root = Node::List(std::mem::take(statements));
            for r in &refs {
                let Some(target) = navigate_mut(&mut root, &r.path) else { continue };
                match r.kind {
                    RefKind::Parameter => *target = Node::Str(new_name.clone()),
                    RefKind::Read => {
                        if let Node::Map(map) = target {
                            map.insert("var".to_string(), Node::Str(new_name.clone()));
                        }
                    }
                    RefKind::Definition | RefKind::Write => {
                        if let Node::Map(map) = target {
                            map.insert("name".to_string(), Node::Str(new_name.clone()));
                        }
                    }
                }
            }
            *statements = match root {
                Node::List(items) => items,
                _ => unreachable!(),
            };
            Ok(OpReport { op: "rename_variable", detail: format!("{count} reference(s) renamed from '{old_name}' to '{new_name}'") })
        }
        EditOp::ExtractFunction { statements: indices, parameters, function_name, function_id, insert_at, replace_with_call } => {
            apply_extract_function(statements, indices, parameters, function_name, function_id.as_deref(), *insert_at, *replace_with_call)
        }
    }
}

/// True when `map`'s only non-`id` key is `disc` (i.e. it's a structured
/// node with that discriminator).
fn node_is(map: &std::collections::BTreeMap<String, Node>, disc: &str) -> bool {
    let mut non_id = map.iter().filter(|(k, _)| k.as_str() != "id");
    matches!((non_id.next(), non_id.next()), (Some((k, _)), None) if k == disc)
}

fn rename_calls_by_name(node: &mut Node, old_name: &str, new_name: &str) -> usize {
    let mut count = 0;
    match node {
        Node::Map(map) => {
            let is_call = node_is(map, "call");
            if is_call {
                if let Some(Node::Map(payload)) = map.get_mut("call") {
                    let matches = payload.get("id").is_none() && payload.get("name").and_then(Node::as_str) == Some(old_name);
                    if matches {
                        payload.insert("name".to_string(), Node::Str(new_name.to_string()));
                        count += 1;
                    }
                }
            }
            for v in map.values_mut() {
                count += rename_calls_by_name(v, old_name, new_name);
            }
        }
        Node::List(items) => {
            for item in items.iter_mut() {
                count += rename_calls_by_name(item, old_name, new_name);
            }
        }
        _ => {}
    }
    count
}

fn replace_calls(node: &mut Node, match_: &CallMatch, set: &CallSet) -> usize {
    let mut count = 0;
    match node {
        Node::Map(map) => {
            let is_call = node_is(map, "call");
            if is_call {
                if let Some(Node::Map(payload)) = map.get_mut("call") {
                    let name_ok = match_.name.as_deref().map(|n| payload.get("name").and_then(Node::as_str) == Some(n)).unwrap_or(true);
                    let id_ok = match_.id.as_deref().map(|i| payload.get("id").and_then(Node::as_str) == Some(i)).unwrap_or(true);
                    if name_ok && id_ok {
                        if let Some(name) = &set.name {
                            payload.insert("name".to_string(), Node::Str(name.clone()));
                        }
                        if let Some(id) = &set.id {
                            payload.insert("id".to_string(), Node::Str(id.clone()));
                        }
                        if let Some(args) = &set.args {
                            payload.insert("args".to_string(), Node::from_json(args));
                        }
                        count += 1;
                    }
                }
            }
            for v in map.values_mut() {
                count += replace_calls(v, match_, set);
            }
        }
        Node::List(items) => {
            for item in items.iter_mut() {
                count += replace_calls(item, match_, set);
            }
        }
        _ => {}
    }
    count
}

/// Replaces the consecutive top-level range named by `indices` with a
/// single `expr{call}` (when `replace_with_call`) and inserts a new `def`
/// whose body is the extracted block, at `insert_at` in the resulting
/// sequence. `indices` must be contiguous and ascending (Open Question,
/// §9: not specified further by the source spec; see DESIGN.md).
fn apply_extract_function(
    statements: &mut Vec<Node>,
    indices: &[usize],
    parameters: &[String],
    function_name: &str,
    function_id: Option<&str>,
    insert_at: usize,
    replace_with_call: bool,
) -> Result<OpReport, EditError> {
    if indices.is_empty() {
        return Err(EditError::BadSpec("extract_function requires a non-empty 'statements' list".into()));
    }
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    let contiguous = sorted.windows(2).all(|w| w[1] == w[0] + 1);
    if !contiguous {
        return Err(EditError::BadSpec("extract_function requires a contiguous index range".into()));
    }
    let (first, last) = (*sorted.first().unwrap(), *sorted.last().unwrap());
    if last >= statements.len() {
        return Err(EditError::NotFound(format!("statement index {last}")));
    }

    let body: Vec<Node> = statements[first..=last].to_vec();
    let used: HashSet<&str> = parameters.iter().map(String::as_str).collect();
    let free = refactor::analyze_free_variables(&body);
    for p in &free {
        if !used.contains(p.as_str()) {
            return Err(EditError::BadSpec(format!("free variable '{p}' is not covered by 'parameters'")));
        }
    }

    let mut def_payload = std::collections::BTreeMap::new();
    def_payload.insert("name".to_string(), Node::Str(function_name.to_string()));
    def_payload.insert("params".to_string(), Node::List(parameters.iter().cloned().map(Node::Str).collect()));
    def_payload.insert("body".to_string(), Node::List(body));
    let mut def_node = std::collections::BTreeMap::new();
    if let Some(id) = function_id {
        def_node.insert("id".to_string(), Node::Str(id.to_string()));
    }
    def_node.insert("def".to_string(), Node::Map(def_payload));
    let def_node = Node::Map(def_node);

    let mut replacement = Vec::new();
    if replace_with_call {
        let mut call_payload = std::collections::BTreeMap::new();
        match function_id {
            Some(id) => {
                call_payload.insert("id".to_string(), Node::Str(id.to_string()));
            }
            None => {
                call_payload.insert("name".to_string(), Node::Str(function_name.to_string()));
            }
        }
        call_payload.insert("args".to_string(), Node::List(parameters.iter().cloned().map(Node::Str).map(|n| {
            Node::map([("var".to_string(), n)])
        }).collect()));
        let call = Node::map([("call".to_string(), Node::Map(call_payload))]);
        replacement.push(Node::map([("expr".to_string(), call)]));
    }

    statements.splice(first..=last, replacement);
    let at = insert_at.min(statements.len());
    statements.insert(at, def_node);

    Ok(OpReport {
        op: "extract_function",
        detail: format!("extracted statements [{first}..={last}] into function '{function_name}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(v: serde_json::Value) -> Program {
        Program::parse(&Node::from_json(&v)).unwrap()
    }

    fn ops(v: serde_json::Value) -> Vec<EditOp> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn rename_variable_rewrites_all_references() {
        let p = program(json!([
            {"let": {"name": "x", "value": 10}},
            {"let": {"name": "y", "value": {"mul": [{"var": "x"}, 2]}}},
            {"print": [{"var": "x"}]}
        ]));
        let edits = ops(json!([{"op": "rename_variable", "old_name": "x", "new_name": "count", "scope": "all"}]));
        let outcome = apply_edits(&p, &edits).unwrap();
        assert_eq!(outcome.reports[0].detail, "3 reference(s) renamed from 'x' to 'count'");

        let again = ops(json!([{"op": "rename_variable", "old_name": "x", "new_name": "z", "scope": "all"}]));
        let outcome2 = apply_edits(&outcome.program, &again).unwrap();
        assert_eq!(outcome2.reports[0].detail, "0 reference(s) renamed from 'x' to 'z'");
    }

    #[test]
    fn batch_rolls_back_on_failure() {
        let p = program(json!([{"let": {"name": "x", "value": 1}}]));
        let edits = ops(json!([
            {"op": "delete_node", "path": "/$[0]"},
            {"op": "delete_node", "target": "missing-id"}
        ]));
        let err = apply_edits(&p, &edits).unwrap_err();
        assert_eq!(err.code(), "E_BAD_SPEC");
        // Original untouched: re-running just the first op on `p` still works.
        let just_first = apply_edits(&p, &edits[..1]).unwrap();
        assert!(just_first.program.statements.is_empty());
    }

    #[test]
    fn rewrite_pattern_replace_call_updates_args() {
        let p = program(json!([
            {"expr": {"call": {"name": "f", "args": [1]}}}
        ]));
        let edits = ops(json!([{"op": "replace_call", "match": {"name": "f"}, "set": {"args": [2, 3]}}]));
        let outcome = apply_edits(&p, &edits).unwrap();
        let call = outcome.program.statements[0].field("expr").unwrap().field("call").unwrap();
        assert_eq!(call.field("args").unwrap().as_list().unwrap().len(), 2);
    }

    #[test]
    fn extract_function_splices_call_and_def() {
        let p = program(json!([
            {"let": {"name": "a", "value": 1}},
            {"let": {"name": "b", "value": 2}},
            {"print": [{"var": "a"}, {"var": "b"}]}
        ]));
        let edits = ops(json!([{
            "op": "extract_function",
            "statements": [0, 1],
            "parameters": [],
            "function_name": "setup",
            "insert_at": 0,
            "replace_with_call": true
        }]));
        let outcome = apply_edits(&p, &edits).unwrap();
        assert_eq!(outcome.program.statements.len(), 3);
        assert_eq!(outcome.program.statements[0].discriminator().unwrap().0, "def");
        assert_eq!(outcome.program.statements[1].field("expr").unwrap().discriminator().unwrap().0, "call");
    }

    #[test]
    fn add_function_appends_at_top_level() {
        let p = program(json!([]));
        let edits = ops(json!([{
            "op": "add_function",
            "name": "double",
            "params": ["n"],
            "body": [{"return": {"mul": [{"var": "n"}, 2]}}],
            "id": "fn_double"
        }]));
        let outcome = apply_edits(&p, &edits).unwrap();
        assert_eq!(outcome.program.statements.len(), 1);
        assert_eq!(outcome.program.statements[0].id(), Some("fn_double"));
    }
}
