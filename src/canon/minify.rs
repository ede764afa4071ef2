//! Bijective minify/unminify (§4.9): a fixed long-key → short-token keymap
//! covers every statement discriminator, expression discriminator, and
//! common field name; any other key (program-specific metadata) passes
//! through unchanged.

use crate::ast::Node;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// `(long, short)` pairs. Order is part of the format (it assigns each key
/// a stable token) so this table must only grow, never reorder.
const KEYMAP: &[(&str, &str)] = &[
    ("let", "a"),
    ("set", "b"),
    ("def", "c"),
    ("if", "d"),
    ("return", "e"),
    ("print", "f"),
    ("expr", "g"),
    ("var", "h"),
    ("call", "i"),
    ("add", "j"),
    ("sub", "k"),
    ("mul", "l"),
    ("div", "m"),
    ("mod", "n"),
    ("pow", "o"),
    ("eq", "p"),
    ("ne", "q"),
    ("lt", "r"),
    ("le", "s"),
    ("gt", "t"),
    ("ge", "u"),
    ("and", "v"),
    ("or", "w"),
    ("not", "x"),
    ("list", "y"),
    ("len", "z"),
    ("get", "aa"),
    ("has", "ab"),
    ("concat", "ac"),
    ("range", "ad"),
    ("input", "ae"),
    ("int", "af"),
    ("spread", "ag"),
    ("id", "ah"),
    ("name", "ai"),
    ("value", "aj"),
    ("params", "ak"),
    ("body", "al"),
    ("cond", "am"),
    ("then", "an"),
    ("else", "ao"),
    ("args", "ap"),
];

static FORWARD: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| KEYMAP.iter().copied().collect());
static REVERSE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| KEYMAP.iter().map(|(l, s)| (*s, *l)).collect());

fn remap_keys(node: &Node, table: &HashMap<&'static str, &'static str>) -> Node {
    match node {
        Node::Map(map) => Node::Map(
            map.iter()
                .map(|(k, v)| {
                    let new_key = table.get(k.as_str()).map(|s| s.to_string()).unwrap_or_else(|| k.clone());
                    (new_key, remap_keys(v, table))
                })
                .collect(),
        ),
        Node::List(items) => Node::List(items.iter().map(|item| remap_keys(item, table)).collect()),
        scalar => scalar.clone(),
    }
}

pub fn minify(node: &Node) -> Node {
    remap_keys(node, &FORWARD)
}

pub fn unminify(node: &Node) -> Node {
    remap_keys(node, &REVERSE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keymap_is_bijective() {
        let mut shorts: Vec<&str> = KEYMAP.iter().map(|(_, s)| *s).collect();
        shorts.sort_unstable();
        let before = shorts.len();
        shorts.dedup();
        assert_eq!(before, shorts.len(), "duplicate short tokens in KEYMAP");
    }

    #[test]
    fn round_trips() {
        let node = Node::from_json(&json!([
            {"id": "s1", "let": {"name": "x", "value": {"add": [1, 2]}}},
            {"print": [{"var": "x"}]}
        ]));
        let minified = minify(&node);
        let restored = unminify(&minified);
        assert_eq!(node, restored);
    }

    #[test]
    fn unknown_keys_pass_through() {
        let node = Node::from_json(&json!({"custom_field": 1, "let": {"name": "x"}}));
        let minified = minify(&node);
        assert!(minified.field("custom_field").is_some());
    }
}
