//! Binary pack/unpack (§4.9, §6 "Binary pack layout"): a CBOR-encoded
//! document `{v, s, p}` behind a `"ACIR"` magic header and version byte, with
//! a string-intern table so repeated keys and literals cost a small integer
//! rather than their full bytes.

use crate::ast::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;

const MAGIC: &[u8; 4] = b"ACIR";
const VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("not an Amorph pack: missing 'ACIR' magic header")]
    BadMagic,
    #[error("unsupported pack version {0}")]
    UnsupportedVersion(u8),
    #[error("pack is truncated or malformed")]
    Truncated,
    #[error("cbor encode error: {0}")]
    Encode(String),
    #[error("cbor decode error: {0}")]
    Decode(String),
    #[error("string table reference {0} out of range")]
    BadStringRef(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct PackDocument {
    v: u8,
    s: Vec<String>,
    p: PackValue,
}

#[derive(Debug, Serialize, Deserialize)]
enum PackValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(u32),
    List(Vec<PackValue>),
    Map(Vec<(u32, PackValue)>),
}

struct Interner {
    index_of: HashMap<String, u32>,
    strings: Vec<String>,
}

impl Interner {
    fn new() -> Self {
        Interner { index_of: HashMap::new(), strings: Vec::new() }
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&i) = self.index_of.get(s) {
            return i;
        }
        let i = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index_of.insert(s.to_string(), i);
        i
    }
}

fn to_pack(node: &Node, interner: &mut Interner) -> PackValue {
    match node {
        Node::Int(i) => PackValue::Int(*i),
        Node::Float(f) => PackValue::Float(*f),
        Node::Bool(b) => PackValue::Bool(*b),
        Node::Null => PackValue::Null,
        Node::Str(s) => PackValue::Str(interner.intern(s)),
        Node::List(items) => PackValue::List(items.iter().map(|i| to_pack(i, interner)).collect()),
        Node::Map(map) => PackValue::Map(map.iter().map(|(k, v)| (interner.intern(k), to_pack(v, interner))).collect()),
    }
}

fn from_pack(value: &PackValue, strings: &[String]) -> Result<Node, PackError> {
    let lookup = |i: u32| -> Result<String, PackError> {
        strings.get(i as usize).cloned().ok_or(PackError::BadStringRef(i))
    };
    Ok(match value {
        PackValue::Int(i) => Node::Int(*i),
        PackValue::Float(f) => Node::Float(*f),
        PackValue::Bool(b) => Node::Bool(*b),
        PackValue::Null => Node::Null,
        PackValue::Str(i) => Node::Str(lookup(*i)?),
        PackValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(from_pack(item, strings)?);
            }
            Node::List(out)
        }
        PackValue::Map(entries) => {
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                map.insert(lookup(*k)?, from_pack(v, strings)?);
            }
            Node::Map(map)
        }
    })
}

pub fn pack(node: &Node) -> Result<Vec<u8>, PackError> {
    let mut interner = Interner::new();
    let p = to_pack(node, &mut interner);
    let doc = PackDocument { v: VERSION, s: interner.strings, p };
    let mut body = Vec::new();
    ciborium::ser::into_writer(&doc, &mut body).map_err(|e| PackError::Encode(e.to_string()))?;
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + body.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn unpack(bytes: &[u8]) -> Result<Node, PackError> {
    if bytes.len() < MAGIC.len() + 1 {
        return Err(PackError::Truncated);
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(PackError::BadMagic);
    }
    let version = bytes[MAGIC.len()];
    if version != VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    let body = &bytes[MAGIC.len() + 1..];
    let doc: PackDocument = ciborium::de::from_reader(body).map_err(|e| PackError::Decode(e.to_string()))?;
    from_pack(&doc.p, &doc.s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_a_program() {
        let node = Node::from_json(&json!([
            {"id": "s1", "let": {"name": "x", "value": {"add": [1, 2]}}},
            {"print": [{"var": "x"}]}
        ]));
        let bytes = pack(&node).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        let restored = unpack(&bytes).unwrap();
        assert_eq!(node, restored);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = unpack(b"NOPE1234").unwrap_err();
        assert!(matches!(err, PackError::BadMagic));
    }

    #[test]
    fn repeated_strings_share_table_slots() {
        let node = Node::from_json(&json!([
            {"let": {"name": "a", "value": 1}},
            {"let": {"name": "a", "value": 2}}
        ]));
        let mut interner = Interner::new();
        let _ = to_pack(&node, &mut interner);
        let occurrences = interner.strings.iter().filter(|s| s.as_str() == "a").count();
        assert_eq!(occurrences, 1);
    }
}
