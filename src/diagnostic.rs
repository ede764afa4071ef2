//! Static diagnostics (§4.3–§4.5, §7): the output of the validator, scope
//! analyzer, and type inferencer. Unlike [`crate::runtime_error::RuntimeError`],
//! these are plain data — passes never abort on the first issue, they
//! accumulate a `Vec<Diagnostic>` and keep walking.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One diagnostic record. Every static pass (validator, scope analyzer,
/// type inferencer) produces these; they're composed by the validation
/// entry point (§2) into one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(code: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] at {}: {}", self.severity, self.code, self.path, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// The composed result of running the validator plus whichever optional
/// passes were requested (§6 `validate --json` shape: `{ok, issues}`).
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub issues: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new(issues: Vec<Diagnostic>) -> Self {
        let ok = !issues.iter().any(|d| d.severity == Severity::Error);
        ValidationReport { ok, issues }
    }

    pub fn merge(mut self, mut other: Vec<Diagnostic>) -> Self {
        self.issues.append(&mut other);
        self.ok = !self.issues.iter().any(|d| d.severity == Severity::Error);
        self
    }
}
