//! Canonical paths (§3): deterministic strings addressing a node from the
//! program root. Computed on demand — per the design notes, a path is never
//! cached across a mutation, since edit/rewrite operations invalidate it.

use super::{resolve_fn, Node};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// `$[n]` — the n-th element of a sequence.
    Index(usize),
    /// `fn[<id-or-name>]` — a top-level function definition.
    FnRef(String),
    /// An alphanumeric (`_`/`-` allowed) field name.
    Field(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(n) => write!(f, "$[{n}]"),
            PathSegment::FnRef(key) => write!(f, "fn[{key}]"),
            PathSegment::Field(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path(pub Vec<PathSegment>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed path segment: {0:?}")]
pub struct BadPathError(pub String);

impl Path {
    pub fn root() -> Path {
        Path(Vec::new())
    }

    pub fn child(&self, segment: PathSegment) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment);
        Path(segments)
    }

    pub fn index(&self, i: usize) -> Path {
        self.child(PathSegment::Index(i))
    }

    pub fn field(&self, name: impl Into<String>) -> Path {
        self.child(PathSegment::Field(name.into()))
    }

    /// Parses `/$[1]/def/body/$[0]` into segments. An empty string or a bare
    /// `/` parses to the root path.
    pub fn parse(s: &str) -> Result<Path, BadPathError> {
        let trimmed = s.trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(Path::root());
        }
        let mut segments = Vec::new();
        for raw in trimmed.split('/') {
            segments.push(parse_segment(raw)?);
        }
        Ok(Path(segments))
    }
}

fn parse_segment(raw: &str) -> Result<PathSegment, BadPathError> {
    if let Some(inner) = raw.strip_prefix("$[").and_then(|s| s.strip_suffix(']')) {
        let n = inner
            .parse::<usize>()
            .map_err(|_| BadPathError(raw.to_string()))?;
        return Ok(PathSegment::Index(n));
    }
    if let Some(inner) = raw.strip_prefix("fn[").and_then(|s| s.strip_suffix(']')) {
        if inner.is_empty() {
            return Err(BadPathError(raw.to_string()));
        }
        return Ok(PathSegment::FnRef(inner.to_string()));
    }
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(BadPathError(raw.to_string()));
    }
    Ok(PathSegment::Field(raw.to_string()))
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for seg in &self.0 {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

/// Walks from `root` (the program's node form) following `path`.
pub fn navigate<'a>(root: &'a Node, path: &Path) -> Option<&'a Node> {
    let mut current = root;
    for seg in &path.0 {
        current = match (seg, current) {
            (PathSegment::Index(i), Node::List(items)) => items.get(*i)?,
            (PathSegment::Field(name), Node::Map(_)) => current.field(name)?,
            (PathSegment::FnRef(key), Node::List(items)) => resolve_fn(items, key)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Like [`navigate`], but returns a mutable reference.
pub fn navigate_mut<'a>(root: &'a mut Node, path: &Path) -> Option<&'a mut Node> {
    let mut current = root;
    for seg in &path.0 {
        current = match (seg, current) {
            (PathSegment::Index(i), Node::List(items)) => items.get_mut(*i)?,
            (PathSegment::Field(name), Node::Map(m)) => m.get_mut(name)?,
            (PathSegment::FnRef(key), Node::List(items)) => {
                let by_id = items
                    .iter()
                    .position(|s| s.id() == Some(key.as_str()) && s.discriminator().map(|(k, _)| k) == Some("def"));
                let idx = match by_id {
                    Some(i) => i,
                    None => {
                        let mut matches = items.iter().enumerate().filter(|(_, s)| {
                            s.discriminator()
                                .map(|(k, p)| {
                                    k == "def"
                                        && p.field("name").and_then(Node::as_str) == Some(key.as_str())
                                })
                                .unwrap_or(false)
                        });
                        let (i, _) = matches.next()?;
                        if matches.next().is_some() {
                            return None;
                        }
                        i
                    }
                };
                &mut items[idx]
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Finds the sequence (and index within it) that the *last* segment of
/// `path` addresses, so callers can splice adjacent elements (insert/delete).
/// Requires the last segment to be `$[n]`.
pub fn parent_sequence_and_index<'a>(
    root: &'a mut Node,
    path: &Path,
) -> Option<(&'a mut Vec<Node>, usize)> {
    let (last, prefix) = path.0.split_last()?;
    let PathSegment::Index(i) = last else {
        return None;
    };
    let parent_path = Path(prefix.to_vec());
    let parent = navigate_mut(root, &parent_path)?;
    match parent {
        Node::List(items) => Some((items, *i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let s = "/$[1]/def/body/$[0]";
        let path = Path::parse(s).unwrap();
        assert_eq!(path.to_string(), s);
    }

    #[test]
    fn rejects_bad_segment() {
        assert!(Path::parse("/$[abc]").is_err());
        assert!(Path::parse("/weird!key").is_err());
    }

    #[test]
    fn navigates_into_nested_fields() {
        let root = Node::from_json(&serde_json::json!([
            {"let": {"name": "x", "value": 1}},
            {"id": "fn_double", "def": {"name": "double", "params": ["n"], "body": [
                {"return": {"mul": [{"var": "n"}, 2]}}
            ]}}
        ]));
        let path = Path::parse("/$[1]/def/body/$[0]").unwrap();
        let found = navigate(&root, &path).unwrap();
        assert_eq!(found.discriminator().unwrap().0, "return");
    }

    #[test]
    fn navigates_via_fn_ref() {
        let root = Node::from_json(&serde_json::json!([
            {"id": "fn_double", "def": {"name": "double", "params": ["n"], "body": []}}
        ]));
        let path = Path::parse("/fn[double]/def/params").unwrap();
        let found = navigate(&root, &path).unwrap();
        assert_eq!(found.as_list().unwrap().len(), 1);
    }
}
