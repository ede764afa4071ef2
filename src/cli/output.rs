//! Handles all user-facing output for the CLI.
//!
//! This module is responsible for colorizing output, formatting diagnostics
//! and trace events, and writing results to stdout/stderr, so every command
//! handler shares one consistent presentation (§6/§7).

use crate::diagnostic::{Diagnostic, Severity, ValidationReport};
use crate::vm::trace::{TraceEvent, TraceKind};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
    }
}

/// Prints one diagnostic as a colorized single line, matching the human-mode
/// shape described in §7 ("colorized single-line summary, then indented
/// context if rich-errors is enabled").
pub fn print_diagnostic(out: &mut StandardStream, diag: &Diagnostic) {
    let _ = out.set_color(ColorSpec::new().set_fg(Some(severity_color(diag.severity))).set_bold(true));
    let _ = write!(out, "{} [{}]", diag.severity, diag.code);
    let _ = out.reset();
    let _ = writeln!(out, " at {}: {}", diag.path, diag.message);
    if let Some(hint) = &diag.hint {
        let _ = writeln!(out, "    hint: {hint}");
    }
}

/// Prints a whole validation report in human mode: `OK` (green) or a list of
/// diagnostics under an `Invalid:` banner (§6).
pub fn print_report(out: &mut StandardStream, report: &ValidationReport) {
    if report.ok && report.issues.is_empty() {
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = writeln!(out, "OK");
        let _ = out.reset();
        return;
    }
    if report.ok {
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = writeln!(out, "OK (with warnings)");
        let _ = out.reset();
    } else {
        let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = writeln!(out, "Invalid:");
        let _ = out.reset();
    }
    for issue in &report.issues {
        print_diagnostic(out, issue);
    }
}

/// Formats one trace event as a single human-readable line (`--trace`,
/// as opposed to `--trace-json`'s NDJSON).
pub fn format_trace_event(event: &TraceEvent) -> String {
    let kind = match event.kind {
        TraceKind::Enter => "enter",
        TraceKind::Exit => "exit",
        TraceKind::Eval => "eval",
        TraceKind::Effect => "effect",
    };
    let mut line = format!("[{:>6}] {:<6} {}", event.ts, kind, event.path);
    if let Some(op) = &event.op {
        line.push_str(&format!(" {op}"));
    }
    if let Some(channel) = &event.channel {
        line.push_str(&format!(" ({channel})"));
    }
    line
}

use std::io::Write as _;

pub fn stdout_stream() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}

pub fn stderr_stream() -> StandardStream {
    StandardStream::stderr(ColorChoice::Auto)
}
