//! Runtime values (§3). There is no runtime object type — objects only
//! ever appear as AST nodes; the VM only ever produces the tagged union
//! below.

use std::fmt;

/// `Int` is a 64-bit signed integer with a deterministic overflow policy
/// (Open Question ii, §9: checked arithmetic raising `E_OVERFLOW` rather
/// than silently wrapping).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "Str",
            Value::Null => "Null",
            Value::List(_) => "List",
        }
    }

    /// Truthiness per §4.2: non-empty, non-zero, non-null, non-false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&crate::ast::Node> for Value {
    /// Lifts a literal AST node into a runtime value. Only called on nodes
    /// already known to be literals (numbers/strings/bools/null); lists of
    /// literals lift element-wise. Structured nodes have no runtime-value
    /// equivalent and are never passed here.
    fn from(node: &crate::ast::Node) -> Self {
        use crate::ast::Node;
        match node {
            Node::Int(i) => Value::Int(*i),
            Node::Float(f) => Value::Float(*f),
            Node::Bool(b) => Value::Bool(*b),
            Node::Str(s) => Value::Str(s.clone()),
            Node::Null => Value::Null,
            Node::List(items) => Value::List(items.iter().map(Value::from).collect()),
            Node::Map(_) => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::Int(1).truthy());
        assert!(Value::Str("x".into()).truthy());
    }
}
