//! The canonicalization layer (§4.9): a deterministic pretty-printer, a
//! bijective short-key minifier, and a binary pack codec, all operating on
//! the same [`Node`] tree the VM and validator walk.

pub mod minify;
pub mod pack;

use crate::ast::Node;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub use minify::{minify, unminify};
pub use pack::{pack, unpack};

/// Canonical key ordering within a structured node (§4.9): `id` first, then
/// the single discriminator, then any remaining metadata fields
/// lexicographically. Plain field-maps (no discriminator) sort all keys
/// lexicographically.
fn ordered_keys(map: &BTreeMap<String, Node>) -> Vec<&str> {
    if let Some((disc, _)) = discriminator_of(map) {
        let mut rest: Vec<&str> = map.keys().map(String::as_str).filter(|k| *k != "id" && *k != disc).collect();
        rest.sort_unstable();
        let mut keys = Vec::with_capacity(map.len());
        if map.contains_key("id") {
            keys.push("id");
        }
        keys.push(disc);
        keys.extend(rest);
        keys
    } else {
        map.keys().map(String::as_str).collect() // BTreeMap already lexicographic.
    }
}

fn discriminator_of(map: &BTreeMap<String, Node>) -> Option<(&str, &Node)> {
    let mut non_id = map.iter().filter(|(k, _)| k.as_str() != "id");
    let (key, payload) = non_id.next()?;
    if non_id.next().is_some() {
        return None;
    }
    Some((key.as_str(), payload))
}

/// Pretty-prints `node` in canonical form: two-space indent, LF line
/// endings, deterministic key order (§6 "Canonical serialization").
pub fn canonicalize(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, 0, &mut out);
    out.push('\n');
    out
}

fn write_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_node(node: &Node, depth: usize, out: &mut String) {
    match node {
        Node::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Node::Float(f) => {
            let _ = write!(out, "{f}");
        }
        Node::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Node::Null => out.push_str("null"),
        Node::Str(s) => {
            let _ = write!(out, "{}", serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()));
        }
        Node::List(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                write_indent(depth + 1, out);
                write_node(item, depth + 1, out);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            write_indent(depth, out);
            out.push(']');
        }
        Node::Map(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            let keys = ordered_keys(map);
            out.push_str("{\n");
            for (i, key) in keys.iter().enumerate() {
                write_indent(depth + 1, out);
                let _ = write!(out, "{}: ", serde_json::to_string(key).unwrap());
                write_node(&map[*key], depth + 1, out);
                if i + 1 < keys.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            write_indent(depth, out);
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_then_discriminator_then_metadata() {
        let node = Node::from_json(&json!({"meta": 1, "id": "s1", "let": {"name": "x"}}));
        let s = canonicalize(&node);
        let id_pos = s.find("\"id\"").unwrap();
        let let_pos = s.find("\"let\"").unwrap();
        let meta_pos = s.find("\"meta\"").unwrap();
        assert!(id_pos < let_pos && let_pos < meta_pos);
    }

    #[test]
    fn idempotent() {
        let node = Node::from_json(&json!([{"print": [1, 2]}]));
        let once = canonicalize(&node);
        let twice = canonicalize(&Node::from_json(&serde_json::from_str(&once).unwrap()));
        assert_eq!(once, twice);
    }
}
