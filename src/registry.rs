//! The operator registry (§4.1): identity, arity class, and evaluator for
//! every built-in operator. A `HashMap` built once by a `register_*` pass,
//! covering Amorph's arithmetic/compare/logic/collection operator
//! families.

use crate::runtime_error::{RuntimeError, RuntimeErrorKind};
use crate::value::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static REGISTRY: Lazy<OperatorRegistry> = Lazy::new(build_operator_registry);

/// The process-wide operator registry (§4.1), built once.
pub fn registry() -> &'static OperatorRegistry {
    &REGISTRY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Ranged(usize, usize),
    Variadic(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == *k,
            Arity::Ranged(lo, hi) => n >= *lo && n <= *hi,
            Arity::Variadic(min) => n >= *min,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Arity::Fixed(k) => format!("exactly {k}"),
            Arity::Ranged(lo, hi) => format!("between {lo} and {hi}"),
            Arity::Variadic(min) => format!("at least {min}"),
        }
    }
}

pub type PureEvaluator = fn(&[Value]) -> Result<Value, RuntimeError>;

/// `and`/`or` are the one exception noted in §4.1 and §9: they receive
/// unevaluated operand expressions plus a callback into the expression
/// evaluator so the VM can implement left-to-right short circuiting. The
/// registry only records that they *are* short-circuit forms; the VM
/// special-cases their evaluation (see [`crate::vm`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluator {
    Pure(PureEvaluator),
    ShortCircuit,
    /// `input` crosses the VM/backend capability boundary; its evaluator
    /// needs access to the I/O backend, not just argument values.
    Effectful,
}

#[derive(Clone, Copy)]
pub struct OperatorSpec {
    pub arity: Arity,
    pub eval: Evaluator,
}

pub struct OperatorRegistry {
    ops: HashMap<&'static str, OperatorSpec>,
}

impl OperatorRegistry {
    pub fn lookup(&self, name: &str) -> Option<&OperatorSpec> {
        // Namespaced operators (`ns.op`) normalize to their suffix (§4.1).
        let suffix = name.rsplit('.').next().unwrap_or(name);
        self.ops.get(suffix)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

fn numeric_binop(args: &[Value], op: &str, f: impl Fn(f64, f64) -> f64, int_f: impl Fn(i64, i64) -> Option<i64>) -> Result<Value, RuntimeError> {
    let (a, b) = (&args[0], &args[1]);
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if let Some(r) = int_f(*x, *y) {
            return Ok(Value::Int(r));
        }
        return Err(RuntimeError::new(RuntimeErrorKind::Overflow { operation: op.to_string() }));
    }
    let (x, y) = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
                message: format!("'{op}' requires numeric operands, got {} and {}", a.type_name(), b.type_name()),
            }))
        }
    };
    Ok(Value::Float(f(x, y)))
}

fn atom_add(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.iter().all(|v| matches!(v, Value::Str(_))) {
        let mut s = String::new();
        for v in args {
            if let Value::Str(part) = v {
                s.push_str(part);
            }
        }
        return Ok(Value::Str(s));
    }
    if !args.iter().all(Value::is_numeric) {
        return Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
            message: "'add' requires all strings or all numerics".into(),
        }));
    }
    if args.iter().all(|v| matches!(v, Value::Int(_))) {
        let mut sum: i64 = 0;
        for v in args {
            if let Value::Int(i) = v {
                sum = sum
                    .checked_add(*i)
                    .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Overflow { operation: "add".into() }))?;
            }
        }
        return Ok(Value::Int(sum));
    }
    let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
    Ok(Value::Float(sum))
}

fn atom_sub(args: &[Value]) -> Result<Value, RuntimeError> {
    numeric_binop(args, "sub", |a, b| a - b, |a, b| a.checked_sub(b))
}

fn atom_mul(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.iter().all(|v| matches!(v, Value::Int(_))) {
        let mut prod: i64 = 1;
        for v in args {
            if let Value::Int(i) = v {
                prod = prod
                    .checked_mul(*i)
                    .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Overflow { operation: "mul".into() }))?;
            }
        }
        return Ok(Value::Int(prod));
    }
    if !args.iter().all(Value::is_numeric) {
        return Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
            message: "'mul' requires numeric operands".into(),
        }));
    }
    let prod: f64 = args.iter().filter_map(Value::as_f64).product();
    Ok(Value::Float(prod))
}

fn atom_div(args: &[Value]) -> Result<Value, RuntimeError> {
    let (a, b) = (&args[0], &args[1]);
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if *y == 0 {
            return Err(RuntimeError::new(RuntimeErrorKind::DivZero));
        }
        if x % y == 0 {
            return Ok(Value::Int(x / y));
        }
        return Ok(Value::Float(*x as f64 / *y as f64));
    }
    let (x, y) = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
                message: "'div' requires numeric operands".into(),
            }))
        }
    };
    if y == 0.0 {
        return Err(RuntimeError::new(RuntimeErrorKind::DivZero));
    }
    Ok(Value::Float(x / y))
}

fn atom_mod(args: &[Value]) -> Result<Value, RuntimeError> {
    let (a, b) = (&args[0], &args[1]);
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if *y == 0 {
            return Err(RuntimeError::new(RuntimeErrorKind::DivZero));
        }
        return Ok(Value::Int(x % y)); // Rust `%` is truncated-toward-zero.
    }
    let (x, y) = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
                message: "'mod' requires numeric operands".into(),
            }))
        }
    };
    if y == 0.0 {
        return Err(RuntimeError::new(RuntimeErrorKind::DivZero));
    }
    Ok(Value::Float(x % y))
}

fn atom_pow(args: &[Value]) -> Result<Value, RuntimeError> {
    let (a, b) = (&args[0], &args[1]);
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if *y >= 0 {
            if let Ok(exp) = u32::try_from(*y) {
                if let Some(r) = x.checked_pow(exp) {
                    return Ok(Value::Int(r));
                }
                return Err(RuntimeError::new(RuntimeErrorKind::Overflow { operation: "pow".into() }));
            }
        }
        return Ok(Value::Float((*x as f64).powf(*y as f64)));
    }
    let (x, y) = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
                message: "'pow' requires numeric operands".into(),
            }))
        }
    };
    Ok(Value::Float(x.powf(y)))
}

fn structural_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| structural_eq(a, b))
        }
        _ => false,
    }
}

fn atom_eq(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(structural_eq(&args[0], &args[1])))
}

fn atom_ne(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(!structural_eq(&args[0], &args[1])))
}

fn compare(args: &[Value], op: &str, f: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, RuntimeError> {
    let (a, b) = (&args[0], &args[1]);
    let ord = match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        _ if a.is_numeric() && b.is_numeric() => a
            .as_f64()
            .unwrap()
            .partial_cmp(&b.as_f64().unwrap())
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::TypeRuntime { message: format!("'{op}' on NaN") }))?,
        _ => {
            return Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
                message: format!("'{op}' requires two numerics or two strings, got {} and {}", a.type_name(), b.type_name()),
            }))
        }
    };
    Ok(Value::Bool(f(ord)))
}

fn atom_not(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(!args[0].truthy()))
}

fn atom_list(args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::List(args.to_vec()))
}

fn atom_len(args: &[Value]) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
            message: format!("'len' requires a List or Str, got {}", other.type_name()),
        })),
    }
}

fn index_of(i: &Value) -> Result<i64, RuntimeError> {
    match i {
        Value::Int(n) => Ok(*n),
        other => Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
            message: format!("index must be an Int, got {}", other.type_name()),
        })),
    }
}

fn atom_get(args: &[Value]) -> Result<Value, RuntimeError> {
    let idx = index_of(&args[1])?;
    match &args[0] {
        Value::List(items) => {
            let i = usize::try_from(idx).map_err(|_| {
                RuntimeError::new(RuntimeErrorKind::Index { index: idx, len: items.len() })
            })?;
            items
                .get(i)
                .cloned()
                .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Index { index: idx, len: items.len() }))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = usize::try_from(idx).map_err(|_| {
                RuntimeError::new(RuntimeErrorKind::Index { index: idx, len: chars.len() })
            })?;
            chars
                .get(i)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Index { index: idx, len: chars.len() }))
        }
        other => Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
            message: format!("'get' requires a List or Str, got {}", other.type_name()),
        })),
    }
}

fn atom_has(args: &[Value]) -> Result<Value, RuntimeError> {
    match (&args[0], &args[1]) {
        (Value::List(items), needle) => Ok(Value::Bool(items.iter().any(|v| structural_eq(v, needle)))),
        (Value::Str(haystack), Value::Str(needle)) => Ok(Value::Bool(haystack.contains(needle.as_str()))),
        (other, _) => Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
            message: format!("'has' requires a List or Str, got {}", other.type_name()),
        })),
    }
}

fn atom_concat(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.iter().all(|v| matches!(v, Value::List(_))) {
        let mut out = Vec::new();
        for v in args {
            if let Value::List(items) = v {
                out.extend(items.clone());
            }
        }
        return Ok(Value::List(out));
    }
    if args.iter().all(|v| matches!(v, Value::Str(_))) {
        let mut s = String::new();
        for v in args {
            if let Value::Str(part) = v {
                s.push_str(part);
            }
        }
        return Ok(Value::Str(s));
    }
    Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
        message: "'concat' requires all lists or all strings".into(),
    }))
}

fn atom_range(args: &[Value]) -> Result<Value, RuntimeError> {
    let as_int = |v: &Value| -> Result<i64, RuntimeError> {
        match v {
            Value::Int(i) => Ok(*i),
            other => Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
                message: format!("'range' requires Int arguments, got {}", other.type_name()),
            })),
        }
    };
    let (start, end) = match args.len() {
        1 => (1, as_int(&args[0])?),
        2 => (as_int(&args[0])?, as_int(&args[1])?),
        _ => unreachable!("arity already checked"),
    };
    let items: Vec<Value> = if start <= end {
        (start..=end).map(Value::Int).collect()
    } else {
        (end..=start).rev().map(Value::Int).collect()
    };
    Ok(Value::List(items))
}

fn atom_int(args: &[Value]) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::new(RuntimeErrorKind::TypeRuntime { message: format!("cannot parse '{s}' as Int") })
        }),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        other => Err(RuntimeError::new(RuntimeErrorKind::TypeRuntime {
            message: format!("'int' cannot convert {}", other.type_name()),
        })),
    }
}

/// Builds the fully populated operator registry. `and`/`or` are present so
/// arity checks and `is_known` work uniformly, but their `Evaluator` is
/// `ShortCircuit`/marker only — the VM never calls through `Evaluator::Pure`
/// for them.
pub fn build_operator_registry() -> OperatorRegistry {
    let mut ops: HashMap<&'static str, OperatorSpec> = HashMap::new();
    let mut reg = |name: &'static str, arity: Arity, eval: Evaluator| {
        ops.insert(name, OperatorSpec { arity, eval });
    };

    reg("add", Arity::Variadic(2), Evaluator::Pure(atom_add));
    reg("mul", Arity::Variadic(2), Evaluator::Pure(atom_mul));
    reg("sub", Arity::Fixed(2), Evaluator::Pure(atom_sub));
    reg("div", Arity::Fixed(2), Evaluator::Pure(atom_div));
    reg("mod", Arity::Fixed(2), Evaluator::Pure(atom_mod));
    reg("pow", Arity::Fixed(2), Evaluator::Pure(atom_pow));

    reg("eq", Arity::Fixed(2), Evaluator::Pure(atom_eq));
    reg("ne", Arity::Fixed(2), Evaluator::Pure(atom_ne));
    reg("lt", Arity::Fixed(2), Evaluator::Pure(|a| compare(a, "lt", |o| o.is_lt())));
    reg("le", Arity::Fixed(2), Evaluator::Pure(|a| compare(a, "le", |o| o.is_le())));
    reg("gt", Arity::Fixed(2), Evaluator::Pure(|a| compare(a, "gt", |o| o.is_gt())));
    reg("ge", Arity::Fixed(2), Evaluator::Pure(|a| compare(a, "ge", |o| o.is_ge())));

    reg("and", Arity::Variadic(1), Evaluator::ShortCircuit);
    reg("or", Arity::Variadic(1), Evaluator::ShortCircuit);
    reg("not", Arity::Fixed(1), Evaluator::Pure(atom_not));

    reg("list", Arity::Variadic(0), Evaluator::Pure(atom_list));
    reg("len", Arity::Fixed(1), Evaluator::Pure(atom_len));
    reg("get", Arity::Fixed(2), Evaluator::Pure(atom_get));
    reg("has", Arity::Fixed(2), Evaluator::Pure(atom_has));
    reg("concat", Arity::Variadic(2), Evaluator::Pure(atom_concat));

    reg("range", Arity::Ranged(1, 2), Evaluator::Pure(atom_range));
    reg("input", Arity::Ranged(0, 1), Evaluator::Effectful);
    reg("int", Arity::Fixed(1), Evaluator::Pure(atom_int));

    OperatorRegistry { ops }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> OperatorRegistry {
        build_operator_registry()
    }

    #[test]
    fn namespaced_operator_normalizes_to_suffix() {
        let r = reg();
        assert!(r.lookup("math.add").is_some());
        assert!(r.lookup("add").is_some());
    }

    #[test]
    fn add_mixed_types_fails() {
        let err = atom_add(&[Value::Int(1), Value::Str("x".into())]).unwrap_err();
        assert_eq!(err.code(), "E_TYPE_RUNTIME");
    }

    #[test]
    fn add_all_strings_concatenates() {
        let v = atom_add(&[Value::Str("a".into()), Value::Str("b".into())]).unwrap();
        assert_eq!(v, Value::Str("ab".into()));
    }

    #[test]
    fn div_integer_exact_stays_int() {
        assert_eq!(atom_div(&[Value::Int(6), Value::Int(3)]).unwrap(), Value::Int(2));
        assert_eq!(atom_div(&[Value::Int(7), Value::Int(2)]).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn div_by_zero_errors() {
        let err = atom_div(&[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(err.code(), "E_DIV_ZERO");
    }

    #[test]
    fn mod_truncates_toward_zero() {
        assert_eq!(atom_mod(&[Value::Int(-7), Value::Int(2)]).unwrap(), Value::Int(-1));
    }

    #[test]
    fn range_descending() {
        let v = atom_range(&[Value::Int(3), Value::Int(1)]).unwrap();
        assert_eq!(v, Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)]));
    }

    #[test]
    fn get_out_of_range_errors() {
        let err = atom_get(&[Value::List(vec![Value::Int(1)]), Value::Int(5)]).unwrap_err();
        assert_eq!(err.code(), "E_INDEX");
    }
}
