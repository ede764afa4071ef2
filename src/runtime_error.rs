//! Runtime errors (§7): the taxonomy the VM raises during evaluation.
//!
//! Splits "what went wrong" from "how to help": [`RuntimeErrorKind`]
//! carries the bare fact, [`RuntimeError`] wraps
//! it with an optional [`RichContext`] (§4.2 "Rich error context") and
//! implements `miette::Diagnostic` so the CLI can render either a terse
//! one-liner or a full colorized report from the same value.

use crate::ast::Path;
use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("undefined variable '{name}'")]
    UndefinedVar { name: String },
    #[error("unknown function '{reference}'")]
    UnknownFunc { reference: String },
    #[error("expected {expected} argument(s), got {actual}")]
    ArgCount { expected: String, actual: usize },
    #[error("type error: {message}")]
    TypeRuntime { message: String },
    #[error("division by zero")]
    DivZero,
    #[error("index out of range: {index} (len {len})")]
    Index { index: i64, len: usize },
    #[error("capability denied: {capability}")]
    CapDenied { capability: &'static str },
    #[error("recursion limit exceeded (depth {depth})")]
    Recursion { depth: usize },
    #[error("'return' used outside a function")]
    ReturnOutsideFn,
    #[error("integer overflow in '{operation}'")]
    Overflow { operation: String },
}

impl RuntimeErrorKind {
    pub const fn code(&self) -> &'static str {
        match self {
            RuntimeErrorKind::UndefinedVar { .. } => "E_UNDEFINED_VAR",
            RuntimeErrorKind::UnknownFunc { .. } => "E_UNKNOWN_FUNC",
            RuntimeErrorKind::ArgCount { .. } => "E_ARG_COUNT",
            RuntimeErrorKind::TypeRuntime { .. } => "E_TYPE_RUNTIME",
            RuntimeErrorKind::DivZero => "E_DIV_ZERO",
            RuntimeErrorKind::Index { .. } => "E_INDEX",
            RuntimeErrorKind::CapDenied { .. } => "E_CAP_DENIED",
            RuntimeErrorKind::Recursion { .. } => "E_RECURSION",
            RuntimeErrorKind::ReturnOutsideFn => "E_RETURN_OUTSIDE_FN",
            RuntimeErrorKind::Overflow { .. } => "E_OVERFLOW",
        }
    }
}

/// Attached only when the VM's rich-error mode is enabled (§4.2); disabled
/// by default, in which case a [`RuntimeError`] carries just code + message.
#[derive(Debug, Clone, PartialEq)]
pub struct RichContext {
    pub path: Path,
    pub call_stack: Vec<String>,
    pub excerpt: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub context: Option<RichContext>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind) -> Self {
        RuntimeError { kind, context: None }
    }

    pub fn with_context(mut self, context: RichContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl MietteDiagnostic for RuntimeError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let ctx = self.context.as_ref()?;
        Some(Box::new(format!(
            "at {}\ncall stack: {}\n{}",
            ctx.path,
            if ctx.call_stack.is_empty() {
                "<top level>".to_string()
            } else {
                ctx.call_stack.join(" -> ")
            },
            ctx.excerpt
        )))
    }
}

/// Constructs the short textual excerpt of an offending subtree used by
/// [`RichContext`] — a single-line, depth-bounded rendering, not a full
/// pretty-print (which could be arbitrarily large).
pub fn excerpt(node: &crate::ast::Node) -> String {
    let json = node.to_json();
    let s = json.to_string();
    const MAX: usize = 120;
    if s.len() > MAX {
        let end = (0..=MAX).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &s[..end])
    } else {
        s
    }
}
