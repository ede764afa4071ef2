//! Unified diagnostic presentation layer for Amorph runtime errors.
//!
//! This module provides the `RuntimeDiagnostic` type, responsible for all
//! runtime-error presentation: colorization and, when the VM was run with
//! rich errors enabled, the attached path/call-stack/excerpt context (§4.2,
//! §7). There are no text spans in Amorph — a program is a structured tree,
//! not source text — so context is addressed by canonical path instead of
//! line/column.

use crate::runtime_error::RuntimeError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// A diagnostic wrapper presenting a [`RuntimeError`] the way §7 describes:
/// "colorized single-line summary, then indented context if rich-errors is
/// enabled".
pub struct RuntimeDiagnostic<'a> {
    error: &'a RuntimeError,
}

impl<'a> RuntimeDiagnostic<'a> {
    pub fn new(error: &'a RuntimeError) -> Self {
        RuntimeDiagnostic { error }
    }
}

impl<'a> Display for RuntimeDiagnostic<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "error [{}]: {}", self.error.code(), self.error.kind)?;
        if let Some(ctx) = &self.error.context {
            writeln!(f, "  at {}", ctx.path)?;
            let stack = if ctx.call_stack.is_empty() {
                "<top level>".to_string()
            } else {
                ctx.call_stack.join(" -> ")
            };
            writeln!(f, "  call stack: {stack}")?;
            writeln!(f, "  {}", ctx.excerpt)?;
        }
        Ok(())
    }
}

/// Prints a runtime error to stderr with colorization if the terminal
/// supports it, falling back to the plain `Display` rendering otherwise.
pub fn print_runtime_error_to_stderr(diagnostic: &RuntimeDiagnostic) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    if print_colored(&mut stderr, diagnostic).is_err() {
        eprintln!("{diagnostic}");
    }
}

fn print_colored(writer: &mut StandardStream, diagnostic: &RuntimeDiagnostic) -> std::io::Result<()> {
    writer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(writer, "error [{}]", diagnostic.error.code())?;
    writer.reset()?;
    writeln!(writer, ": {}", diagnostic.error.kind)?;
    if let Some(ctx) = &diagnostic.error.context {
        writeln!(writer, "  at {}", ctx.path)?;
        let stack = if ctx.call_stack.is_empty() {
            "<top level>".to_string()
        } else {
            ctx.call_stack.join(" -> ")
        };
        writeln!(writer, "  call stack: {stack}")?;
        writeln!(writer, "  {}", ctx.excerpt)?;
    }
    Ok(())
}
