//! The pattern rewrite engine (§4.8): bottom-up match/replace rules with
//! `$name` subtree placeholders, `$*name` list wildcards, and an optional
//! guard expression, applied to a fixpoint or for at most `--limit` passes.

pub mod guard;

use crate::ast::{Node, Program};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(rename = "match")]
    pub pattern: serde_json::Value,
    pub replace: serde_json::Value,
    /// Restricts matching to nodes whose discriminator equals this key.
    #[serde(default)]
    pub select: Option<String>,
    /// A synonym for `select`, kept distinct in the schema for rules that
    /// read more naturally as "apply this rule to every `call` node".
    #[serde(default)]
    pub apply_to: Option<String>,
    /// Guard expression (§4.8), evaluated against the matched bindings;
    /// the match is discarded if it evaluates falsy.
    #[serde(rename = "where", default)]
    pub guard: Option<String>,
    /// Global precondition: at least one top-level statement must carry
    /// this discriminator for the rule to run at all during a pass.
    #[serde(default)]
    pub program_select: Option<String>,
    /// Guard expression evaluated once per pass against `$program` (bound
    /// to the whole program root), independent of any particular match.
    #[serde(rename = "program_where", default)]
    pub program_guard: Option<String>,
    /// Restricts which placeholder bindings are visible to `where`. All
    /// bindings are visible when omitted.
    #[serde(default)]
    pub where_placeholders: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RewriteError {
    #[error("rewrite rule {0} is malformed: more than one list wildcard")]
    MultipleWildcards(usize),
}

pub struct RewriteOutcome {
    pub program: Program,
    pub replacements: usize,
    pub passes: usize,
    /// One-time notices, e.g. a guard that referenced an unbound name.
    pub warnings: Vec<String>,
}

/// Bindings produced by a successful match: scalar/subtree placeholders
/// plus any list-wildcard captures (kept separate since they splice rather
/// than substitute one-for-one).
#[derive(Default, Clone)]
struct Bindings {
    nodes: HashMap<String, Node>,
    lists: HashMap<String, Vec<Node>>,
}

fn placeholder_name(s: &str) -> Option<&str> {
    if let Some(rest) = s.strip_prefix('$') {
        if !rest.starts_with('*') && !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Some(rest);
        }
    }
    None
}

fn wildcard_name(s: &str) -> Option<&str> {
    let rest = s.strip_prefix("$*")?;
    if !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(rest)
    } else {
        None
    }
}

fn try_match(pattern: &Node, node: &Node, bindings: &mut Bindings) -> bool {
    match pattern {
        Node::Str(s) => {
            // A bare "$*name" (not inside a list-pattern element position)
            // captures an entire list value, e.g. matching `"args": "$*rest"`
            // against `"args": [1, 2, 3]`.
            if let Some(name) = wildcard_name(s) {
                return match node {
                    Node::List(items) => match bindings.lists.get(name) {
                        Some(existing) => existing == items,
                        None => {
                            bindings.lists.insert(name.to_string(), items.clone());
                            true
                        }
                    },
                    _ => false,
                };
            }
            if let Some(name) = placeholder_name(s) {
                match bindings.nodes.get(name) {
                    Some(existing) => existing == node,
                    None => {
                        bindings.nodes.insert(name.to_string(), node.clone());
                        true
                    }
                }
            } else {
                node.as_str() == Some(s.as_str())
            }
        }
        Node::List(items) => match_list(items, pattern_is_list(node), bindings),
        Node::Map(map) => match node {
            Node::Map(target) => map.iter().all(|(k, v)| target.get(k).map(|tv| try_match(v, tv, bindings)).unwrap_or(false)),
            _ => false,
        },
        scalar => scalar == node,
    }
}

fn pattern_is_list(node: &Node) -> Option<&[Node]> {
    node.as_list()
}

fn match_list(pattern_items: &[Node], target: Option<&[Node]>, bindings: &mut Bindings) -> bool {
    let Some(target) = target else { return false };
    let wildcard_idx = pattern_items.iter().position(|p| p.as_str().map(wildcard_name).unwrap_or(None).is_some());
    match wildcard_idx {
        None => {
            if pattern_items.len() != target.len() {
                return false;
            }
            pattern_items.iter().zip(target.iter()).all(|(p, t)| try_match(p, t, bindings))
        }
        Some(idx) => {
            let before = &pattern_items[..idx];
            let after = &pattern_items[idx + 1..];
            if target.len() < before.len() + after.len() {
                return false;
            }
            let mid_end = target.len() - after.len();
            if !before.iter().zip(target[..before.len()].iter()).all(|(p, t)| try_match(p, t, bindings)) {
                return false;
            }
            if !after.iter().zip(target[mid_end..].iter()).all(|(p, t)| try_match(p, t, bindings)) {
                return false;
            }
            let name = wildcard_name(pattern_items[idx].as_str().unwrap()).unwrap();
            let captured = &target[before.len()..mid_end];
            match bindings.lists.get(name) {
                Some(existing) => existing.as_slice() == captured,
                None => {
                    bindings.lists.insert(name.to_string(), captured.to_vec());
                    true
                }
            }
        }
    }
}

fn instantiate(template: &Node, bindings: &Bindings) -> Node {
    match template {
        Node::Str(s) => {
            if let Some(name) = wildcard_name(s) {
                return Node::List(bindings.lists.get(name).cloned().unwrap_or_default());
            }
            if let Some(name) = placeholder_name(s) {
                bindings.nodes.get(name).cloned().unwrap_or_else(|| Node::Str(s.clone()))
            } else {
                Node::Str(s.clone())
            }
        }
        Node::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(name) = item.as_str().and_then(wildcard_name) {
                    out.extend(bindings.lists.get(name).cloned().unwrap_or_default());
                } else {
                    out.push(instantiate(item, bindings));
                }
            }
            Node::List(out)
        }
        Node::Map(map) => Node::Map(map.iter().map(|(k, v)| (k.clone(), instantiate(v, bindings))).collect()),
        scalar => scalar.clone(),
    }
}

fn guard_bindings(bindings: &Bindings, only: &Option<Vec<String>>) -> HashMap<String, Node> {
    let mut all: HashMap<String, Node> = bindings.nodes.clone();
    for (name, items) in &bindings.lists {
        all.insert(name.clone(), Node::List(items.clone()));
    }
    match only {
        None => all,
        Some(names) => all.into_iter().filter(|(k, _)| names.contains(k)).collect(),
    }
}

struct Compiled {
    pattern: Node,
    replace: Node,
    select: Option<String>,
    guard: Option<String>,
    where_placeholders: Option<Vec<String>>,
    program_select: Option<String>,
    program_guard: Option<String>,
}

fn compile(rule: &Rule) -> Compiled {
    Compiled {
        pattern: Node::from_json(&rule.pattern),
        replace: Node::from_json(&rule.replace),
        select: rule.select.clone().or_else(|| rule.apply_to.clone()),
        guard: rule.guard.clone(),
        where_placeholders: rule.where_placeholders.clone(),
        program_select: rule.program_select.clone(),
        program_guard: rule.program_guard.clone(),
    }
}

/// Applies `rules` to `program` until no rule matches anywhere, or `limit`
/// passes have run (when given).
pub fn rewrite_fixpoint(program: &Program, rules: &[Rule], limit: Option<usize>) -> Result<RewriteOutcome, RewriteError> {
    for (i, r) in rules.iter().enumerate() {
        let pattern = Node::from_json(&r.pattern);
        if count_wildcards(&pattern) > 1 {
            return Err(RewriteError::MultipleWildcards(i));
        }
    }
    let compiled: Vec<Compiled> = rules.iter().map(compile).collect();
    let mut statements = program.statements.clone();
    let mut total = 0usize;
    let mut passes = 0usize;
    let mut warnings = Vec::new();
    let mut warned_guard_errors: HashSet<usize> = HashSet::new();

    loop {
        if let Some(limit) = limit {
            if passes >= limit {
                break;
            }
        }
        let root = Node::List(statements.clone());
        let enabled: Vec<bool> = compiled
            .iter()
            .map(|c| program_enabled(c, &root, &mut warnings))
            .collect();
        let mut pass_count = 0usize;
        let mut new_statements = Vec::with_capacity(statements.len());
        for stmt in &statements {
            let (new_stmt, count) = rewrite_node(stmt, &compiled, &enabled, &mut warnings, &mut warned_guard_errors, limit.map(|l| l.saturating_sub(total)));
            new_statements.push(new_stmt);
            pass_count += count;
            if let Some(limit) = limit {
                if total + pass_count >= limit {
                    break;
                }
            }
        }
        // Any trailing statements this pass didn't reach (limit hit mid-pass)
        // pass through untouched.
        if new_statements.len() < statements.len() {
            new_statements.extend(statements[new_statements.len()..].iter().cloned());
        }
        statements = new_statements;
        total += pass_count;
        passes += 1;
        if pass_count == 0 {
            break;
        }
        if let Some(limit) = limit {
            if total >= limit {
                break;
            }
        }
    }

    Ok(RewriteOutcome {
        program: Program { version: program.version.clone(), statements },
        replacements: total,
        passes,
        warnings,
    })
}

fn count_wildcards(node: &Node) -> usize {
    match node {
        Node::List(items) => {
            let here = items.iter().filter(|i| i.as_str().and_then(wildcard_name).is_some()).count();
            here + items.iter().map(count_wildcards).sum::<usize>()
        }
        Node::Map(map) => map.values().map(count_wildcards).sum(),
        _ => 0,
    }
}

fn program_enabled(c: &Compiled, root: &Node, warnings: &mut Vec<String>) -> bool {
    if let Some(select) = &c.program_select {
        let has = root.as_list().map(|items| items.iter().any(|s| s.discriminator().map(|(k, _)| k) == Some(select.as_str()))).unwrap_or(false);
        if !has {
            return false;
        }
    }
    if let Some(guard) = &c.program_guard {
        let mut b = HashMap::new();
        b.insert("program".to_string(), root.clone());
        match guard::eval(guard, &b) {
            Ok(v) => {
                if !v {
                    return false;
                }
            }
            Err(e) => {
                warnings.push(format!("program_where guard error: {e}"));
                return false;
            }
        }
    }
    true
}

/// Applies the first matching enabled rule at each node, bottom-up
/// (children are rewritten before the node itself is attempted).
fn rewrite_node(
    node: &Node,
    rules: &[Compiled],
    enabled: &[bool],
    warnings: &mut Vec<String>,
    warned: &mut HashSet<usize>,
    remaining_budget: Option<usize>,
) -> (Node, usize) {
    if remaining_budget == Some(0) {
        return (node.clone(), 0);
    }
    let (node, mut count) = match node {
        Node::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            let mut sub_count = 0;
            for item in items {
                let budget = remaining_budget.map(|b| b.saturating_sub(sub_count));
                let (new_item, c) = rewrite_node(item, rules, enabled, warnings, warned, budget);
                out.push(new_item);
                sub_count += c;
            }
            (Node::List(out), sub_count)
        }
        Node::Map(map) => {
            let mut out = std::collections::BTreeMap::new();
            let mut sub_count = 0;
            for (k, v) in map {
                let budget = remaining_budget.map(|b| b.saturating_sub(sub_count));
                let (new_v, c) = rewrite_node(v, rules, enabled, warnings, warned, budget);
                out.insert(k.clone(), new_v);
                sub_count += c;
            }
            (Node::Map(out), sub_count)
        }
        scalar => (scalar.clone(), 0),
    };
    if remaining_budget.map(|b| count >= b).unwrap_or(false) {
        return (node, count);
    }
    for (i, rule) in rules.iter().enumerate() {
        if !enabled[i] {
            continue;
        }
        if let Some(select) = &rule.select {
            match node.discriminator() {
                Some((k, _)) if k == select => {}
                _ => continue,
            }
        }
        let mut bindings = Bindings::default();
        if !try_match(&rule.pattern, &node, &mut bindings) {
            continue;
        }
        if let Some(guard) = &rule.guard {
            let gb = guard_bindings(&bindings, &rule.where_placeholders);
            match guard::eval(guard, &gb) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    if warned.insert(i) {
                        warnings.push(format!("rule {i} 'where' guard error, skipping: {e}"));
                    }
                    continue;
                }
            }
        }
        let replaced = instantiate(&rule.replace, &bindings);
        return (replaced, count + 1);
    }
    (node, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program(v: serde_json::Value) -> Program {
        Program::parse(&Node::from_json(&v)).unwrap()
    }

    fn rule(v: serde_json::Value) -> Rule {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn rewrites_additive_identity() {
        let p = program(json!([
            {"expr": {"add": [{"var": "x"}, 0]}}
        ]));
        let rules = vec![rule(json!({"match": {"add": ["$x", 0]}, "replace": "$x"}))];
        let outcome = rewrite_fixpoint(&p, &rules, None).unwrap();
        assert_eq!(outcome.replacements, 1);
        assert_eq!(outcome.program.statements[0].field("expr").unwrap(), &Node::from_json(&json!({"var": "x"})));
    }

    #[test]
    fn fixpoint_applies_until_stable() {
        let p = program(json!([
            {"expr": {"add": [{"add": [{"var": "x"}, 0]}, 0]}}
        ]));
        let rules = vec![rule(json!({"match": {"add": ["$x", 0]}, "replace": "$x"}))];
        let outcome = rewrite_fixpoint(&p, &rules, None).unwrap();
        assert_eq!(outcome.program.statements[0].field("expr").unwrap(), &Node::from_json(&json!({"var": "x"})));
        assert!(outcome.passes >= 2);
    }

    #[test]
    fn limit_bounds_total_replacements() {
        let p = program(json!([
            {"expr": {"add": [{"add": [{"var": "x"}, 0]}, 0]}}
        ]));
        let rules = vec![rule(json!({"match": {"add": ["$x", 0]}, "replace": "$x"}))];
        let outcome = rewrite_fixpoint(&p, &rules, Some(1)).unwrap();
        assert_eq!(outcome.replacements, 1);
        assert_ne!(outcome.program.statements[0].field("expr").unwrap(), &Node::from_json(&json!({"var": "x"})));
    }

    #[test]
    fn list_wildcard_matches_call_args() {
        let p = program(json!([
            {"expr": {"call": {"name": "f", "args": [1, 2, 3]}}}
        ]));
        let rules = vec![rule(json!({
            "match": {"call": {"name": "f", "args": "$*rest"}},
            "replace": {"call": {"name": "g", "args": "$*rest"}}
        }))];
        let outcome = rewrite_fixpoint(&p, &rules, None).unwrap();
        let call = outcome.program.statements[0].field("expr").unwrap().field("call").unwrap();
        assert_eq!(call.field("name").unwrap().as_str(), Some("g"));
        assert_eq!(call.field("args").unwrap().as_list().unwrap().len(), 3);
    }

    #[test]
    fn guard_restricts_match() {
        let p = program(json!([
            {"expr": {"add": [1, 2]}},
            {"expr": {"add": [5, 2]}}
        ]));
        let rules = vec![rule(json!({
            "match": {"add": ["$x", "$y"]},
            "where": "$x == 1",
            "replace": "$y"
        }))];
        let outcome = rewrite_fixpoint(&p, &rules, None).unwrap();
        assert_eq!(outcome.replacements, 1);
        assert_eq!(outcome.program.statements[0].field("expr").unwrap(), &Node::Int(2));
        assert_eq!(outcome.program.statements[1].field("expr").unwrap().discriminator().unwrap().0, "add");
    }
}
