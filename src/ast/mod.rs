//! The canonical AST model.
//!
//! An Amorph program is a JSON document, normalized on load into [`Node`] —
//! a closed recursive tree of scalars, list literals, and *structured
//! nodes* (a JSON object mapping a single string discriminator to its
//! payload, optionally carrying a sibling `"id"` field). The same `Node`
//! type is used end to end: the VM interprets it, the validator walks it,
//! the edit/rewrite engines splice it, and the canonicalizer serializes it.
//! Keeping one generic tree (rather than a typed `Stmt`/`Expr` split) is what
//! lets the edit and rewrite engines perform structural surgery without
//! caring whether a subtree is well-formed Amorph or not.

pub mod path;

use serde_json::Value as Json;
use std::collections::BTreeMap;

pub use path::{Path, PathSegment};

/// A single node of the canonical tree.
///
/// `Map` covers every non-literal shape in the tree: a structured
/// statement/expression node (`{"add": [...]}`, optionally with `"id"`),
/// and also the plain field-maps that live inside a payload (`{"name":
/// ..., "value": ...}`). There is no separate "payload" type — field
/// lookup by name is the same operation whether the name is a
/// discriminator or an ordinary field.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    List(Vec<Node>),
    Map(BTreeMap<String, Node>),
}

impl Node {
    pub fn map(fields: impl IntoIterator<Item = (String, Node)>) -> Node {
        Node::Map(fields.into_iter().collect())
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The node's `"id"` field, if present.
    pub fn id(&self) -> Option<&str> {
        self.as_map()?.get("id")?.as_str()
    }

    /// If this node is a structured node (a map with exactly one key besides
    /// `"id"`), returns `(discriminator, payload)`. Plain field-maps (more
    /// than one non-id key, e.g. `{"name": .., "value": ..}`) and scalars
    /// return `None`.
    pub fn discriminator(&self) -> Option<(&str, &Node)> {
        let m = self.as_map()?;
        let mut non_id = m.iter().filter(|(k, _)| k.as_str() != "id");
        let (key, payload) = non_id.next()?;
        if non_id.next().is_some() {
            return None;
        }
        Some((key.as_str(), payload))
    }

    /// Looks up a field by name. Works uniformly for a discriminator key or
    /// an ordinary payload field — both are just map entries.
    pub fn field(&self, name: &str) -> Option<&Node> {
        self.as_map()?.get(name)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Node::Null => false,
            Node::Bool(b) => *b,
            Node::Int(i) => *i != 0,
            Node::Float(f) => *f != 0.0,
            Node::Str(s) => !s.is_empty(),
            Node::List(l) => !l.is_empty(),
            Node::Map(m) => !m.is_empty(),
        }
    }

    pub fn from_json(v: &Json) -> Node {
        match v {
            Json::Null => Node::Null,
            Json::Bool(b) => Node::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Int(i)
                } else {
                    Node::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Node::Str(s.clone()),
            Json::Array(items) => Node::List(items.iter().map(Node::from_json).collect()),
            Json::Object(map) => {
                Node::Map(map.iter().map(|(k, v)| (k.clone(), Node::from_json(v))).collect())
            }
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Node::Int(i) => Json::from(*i),
            Node::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Node::Bool(b) => Json::Bool(*b),
            Node::Str(s) => Json::String(s.clone()),
            Node::Null => Json::Null,
            Node::List(items) => Json::Array(items.iter().map(Node::to_json).collect()),
            Node::Map(m) => {
                Json::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }
}

/// Discriminators that name a statement form (§3).
pub const STATEMENT_KEYS: &[&str] = &["let", "set", "def", "if", "return", "print", "expr"];

/// A normalized program: an ordered top-level sequence of statements.
///
/// Both accepted input shapes (§3) collapse to this one struct; the bare
/// sequence is the canonical form, so `version` is retained only so a
/// round-trip through [`Program::parse`]/[`Program::to_node`] with
/// `keep_wrapper` can reproduce the original wrapper shape for tooling that
/// cares (the canonicalizer itself always emits the bare sequence, per
/// §4.9/§8).
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub version: Option<Node>,
    pub statements: Vec<Node>,
}

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("program must be a sequence or an object with a 'program' sequence field")]
    NotASequence,
}

impl Program {
    pub fn parse(root: &Node) -> Result<Program, ShapeError> {
        match root {
            Node::List(items) => Ok(Program {
                version: None,
                statements: items.clone(),
            }),
            Node::Map(m) => {
                let program = m.get("program").ok_or(ShapeError::NotASequence)?;
                let items = program.as_list().ok_or(ShapeError::NotASequence)?;
                Ok(Program {
                    version: m.get("version").cloned(),
                    statements: items.to_vec(),
                })
            }
            _ => Err(ShapeError::NotASequence),
        }
    }

    /// The canonical node form: always the bare sequence (§3: "the sequence
    /// form is canonical").
    pub fn to_node(&self) -> Node {
        Node::List(self.statements.clone())
    }

    /// Reproduces the original wrapper shape, if this program was parsed
    /// from one. Used only by tooling that explicitly wants to preserve the
    /// input shape (e.g. `fmt` without `-i` operating in place on a wrapped
    /// file); `canonicalize` itself never calls this.
    pub fn to_node_preserving_shape(&self) -> Node {
        match &self.version {
            Some(v) => Node::map([
                ("version".to_string(), v.clone()),
                ("program".to_string(), self.to_node()),
            ]),
            None => self.to_node(),
        }
    }

    /// All top-level `def` statements, as `(id, name, payload)` triples.
    pub fn functions(&self) -> Vec<FunctionRef<'_>> {
        self.statements
            .iter()
            .filter_map(|stmt| {
                let (key, payload) = stmt.discriminator()?;
                if key != "def" {
                    return None;
                }
                let name = payload.field("name")?.as_str()?;
                let id = stmt.id();
                Some(FunctionRef { id, name, def: stmt, payload })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionRef<'a> {
    pub id: Option<&'a str>,
    pub name: &'a str,
    pub def: &'a Node,
    pub payload: &'a Node,
}

/// Resolves a `fn[<id-or-name>]` path segment against a program's top-level
/// function definitions, preferring id over name (§3).
pub fn resolve_fn<'a>(statements: &'a [Node], key: &str) -> Option<&'a Node> {
    if let Some(found) = statements.iter().find(|stmt| stmt.id() == Some(key)) {
        if found.discriminator().map(|(k, _)| k) == Some("def") {
            return Some(found);
        }
    }
    let mut by_name = statements.iter().filter(|stmt| {
        stmt.discriminator()
            .map(|(k, payload)| k == "def" && payload.field("name").and_then(Node::as_str) == Some(key))
            .unwrap_or(false)
    });
    let first = by_name.next()?;
    if by_name.next().is_some() {
        return None; // ambiguous: not unique
    }
    Some(first)
}

/// Finds the index of the top-level statement carrying the given `"id"`.
pub fn find_index_by_id(statements: &[Node], id: &str) -> Option<usize> {
    statements.iter().position(|n| n.id() == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(json: serde_json::Value) -> Node {
        Node::from_json(&json)
    }

    #[test]
    fn discriminator_ignores_id() {
        let node = n(serde_json::json!({"id": "s1", "let": {"name": "x"}}));
        let (disc, payload) = node.discriminator().unwrap();
        assert_eq!(disc, "let");
        assert_eq!(payload.field("name").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn plain_field_map_has_no_discriminator() {
        let node = n(serde_json::json!({"name": "x", "value": 1}));
        assert!(node.discriminator().is_none());
    }

    #[test]
    fn program_accepts_both_shapes() {
        let bare = n(serde_json::json!([{"print": [1]}]));
        let wrapped = n(serde_json::json!({"version": 1, "program": [{"print": [1]}]}));
        let p1 = Program::parse(&bare).unwrap();
        let p2 = Program::parse(&wrapped).unwrap();
        assert_eq!(p1.statements, p2.statements);
        assert_eq!(p1.to_node(), p2.to_node());
    }

    #[test]
    fn resolve_fn_prefers_id() {
        let stmts = vec![
            n(serde_json::json!({"id": "fn_a", "def": {"name": "double", "params": [], "body": []}})),
        ];
        assert!(resolve_fn(&stmts, "fn_a").is_some());
        assert!(resolve_fn(&stmts, "double").is_some());
        assert!(resolve_fn(&stmts, "missing").is_none());
    }
}
