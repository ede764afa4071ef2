//! The Amorph command-line front-end (§6): a thin shell around the library's
//! documented entry points. Every handler reads its input file(s), calls
//! straight into `crate::{vm, validate, canon, edit, rewrite, stamp}`, and
//! renders the result either as colorized human output or as the `--json`
//! machine shape, per §7's human/machine split.

pub mod args;
pub mod diagnostics;
pub mod output;

use crate::ast::{Node, Program};
use crate::canon::{canonicalize, minify, pack, unminify, unpack};
use crate::edit::{apply_edits, EditOp};
use crate::rewrite::{rewrite_fixpoint, Rule};
use crate::stamp::{self, CallStyle};
use crate::validate::{check_scopes, check_types, validate};
use crate::vm::io::{Capabilities, IoBackend, QuietIo, StdIo};
use crate::vm::trace::{NdjsonTraceWriter, RecordingTraceSink, TraceSink};
use crate::vm::Vm;
use args::{AmorphArgs, CallStyleArg, Command, PackFormat};
use clap::Parser;
use diagnostics::{print_runtime_error_to_stderr, RuntimeDiagnostic};
use output::{format_trace_event, print_report, stderr_stream, stdout_stream};
use std::io::Write as _;
use std::path::Path as FsPath;

/// Every way a CLI invocation can fail before producing a result, with the
/// exit-code mapping from §7 baked in (`1` static/runtime error, `2`
/// usage/I/O error).
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Shape(#[from] crate::ast::ShapeError),
    #[error("{0}")]
    Edit(#[from] crate::edit::EditError),
    #[error("{0}")]
    Rewrite(#[from] crate::rewrite::RewriteError),
    #[error("{0}")]
    Pack(#[from] crate::canon::pack::PackError),
    #[error("program is invalid")]
    Invalid,
    #[error("program failed at runtime")]
    Runtime,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io(_) | CliError::Json(_) | CliError::Shape(_) | CliError::Pack(_) => 2,
            CliError::Edit(_) | CliError::Rewrite(_) | CliError::Invalid | CliError::Runtime => 1,
        }
    }
}

/// The main entry point for the CLI binary.
pub fn run() -> i32 {
    let args = AmorphArgs::parse();
    let result = match &args.command {
        Command::Run { file, trace, trace_json, quiet, deny_input, deny_print, rich_errors } => {
            handle_run(file, *trace, *trace_json, *quiet, *deny_input, *deny_print, *rich_errors)
        }
        Command::Validate { file, json, check_types: types, check_scopes: scopes } => {
            handle_validate(file, *json, *types, *scopes)
        }
        Command::Fmt { file, in_place } => handle_fmt(file, *in_place),
        Command::Minify { file, out } => handle_minify(file, out.as_deref()),
        Command::Unminify { file, out } => handle_unminify(file, out.as_deref()),
        Command::Pack { file, format, out } => handle_pack(file, *format, out.as_deref()),
        Command::Unpack { file, format, out } => handle_unpack(file, *format, out.as_deref()),
        Command::Edit { program, edits, dry_run } => handle_edit(program, edits, *dry_run),
        Command::Rewrite { program, rules, dry_run, limit } => handle_rewrite(program, rules, *dry_run, *limit),
        Command::AddUid { file, in_place, deep } => handle_add_uid(file, *in_place, *deep),
        Command::MigrateCalls { file, to, dry_run } => handle_migrate_calls(file, *to, *dry_run),
        Command::Suggest { file, json } => handle_suggest(file, *json),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

// ============================================================================
// LOADING HELPERS
// ============================================================================

fn read_node(path: &FsPath) -> Result<Node, CliError> {
    let text = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    Ok(Node::from_json(&json))
}

fn read_program(path: &FsPath) -> Result<Program, CliError> {
    let node = read_node(path)?;
    Ok(Program::parse(&node)?)
}

fn write_node_json(path: Option<&FsPath>, node: &Node) -> Result<(), CliError> {
    let text = canonicalize(node);
    match path {
        Some(p) => std::fs::write(p, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

/// Writes a node as compact (non-pretty-printed) JSON, the shape `minify`
/// and the `pack --format json` fallback actually want: `canonicalize`'s
/// two-space indentation would eat back a chunk of the savings the short
/// keymap buys.
fn write_node_compact(path: Option<&FsPath>, node: &Node) -> Result<(), CliError> {
    let text = serde_json::to_string(&node.to_json())?;
    match path {
        Some(p) => std::fs::write(p, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn write_bytes(path: Option<&FsPath>, bytes: &[u8]) -> Result<(), CliError> {
    use std::io::Write;
    match path {
        Some(p) => std::fs::write(p, bytes)?,
        None => std::io::stdout().write_all(bytes)?,
    }
    Ok(())
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn handle_run(
    file: &FsPath,
    trace: bool,
    trace_json: bool,
    quiet: bool,
    deny_input: bool,
    deny_print: bool,
    rich_errors: bool,
) -> Result<(), CliError> {
    let program = read_program(file)?;
    let caps = Capabilities { deny_input, deny_print };

    let mut quiet_io = QuietIo;
    let mut std_io = StdIo::default();
    let io: &mut dyn IoBackend = if quiet { &mut quiet_io } else { &mut std_io };

    let mut recording = RecordingTraceSink::default();
    let mut ndjson = NdjsonTraceWriter::new(std::io::stderr());
    let sink: Option<&mut dyn TraceSink> = if trace {
        Some(&mut recording)
    } else if trace_json {
        Some(&mut ndjson)
    } else {
        None
    };

    let mut vm = Vm::new(io, caps, sink).with_rich_errors(rich_errors);
    let result = vm.run(&program);
    drop(vm);

    if trace {
        let mut err = stderr_stream();
        for event in &recording.events {
            let _ = writeln!(err, "{}", format_trace_event(event));
        }
    }

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            print_runtime_error_to_stderr(&RuntimeDiagnostic::new(&e));
            Err(CliError::Runtime)
        }
    }
}

fn handle_validate(file: &FsPath, json: bool, check_types_flag: bool, check_scopes_flag: bool) -> Result<(), CliError> {
    let program = read_program(file)?;
    let mut report = validate(&program);
    if check_scopes_flag {
        report = report.merge(check_scopes(&program));
    }
    if check_types_flag {
        report = report.merge(check_types(&program));
    }

    if json {
        println!("{}", serde_json::to_string(&report).unwrap());
    } else {
        let mut out = stdout_stream();
        print_report(&mut out, &report);
    }

    if report.ok {
        Ok(())
    } else {
        Err(CliError::Invalid)
    }
}

fn handle_fmt(file: &FsPath, in_place: bool) -> Result<(), CliError> {
    let node = read_node(file)?;
    let text = canonicalize(&node);
    if in_place {
        std::fs::write(file, text)?;
    } else {
        print!("{text}");
    }
    Ok(())
}

fn handle_minify(file: &FsPath, out: Option<&FsPath>) -> Result<(), CliError> {
    let node = read_node(file)?;
    write_node_compact(out, &minify(&node))
}

fn handle_unminify(file: &FsPath, out: Option<&FsPath>) -> Result<(), CliError> {
    let node = read_node(file)?;
    write_node_json(out, &unminify(&node))
}

fn handle_pack(file: &FsPath, format: PackFormat, out: Option<&FsPath>) -> Result<(), CliError> {
    let node = read_node(file)?;
    match format {
        PackFormat::Cbor => write_bytes(out, &pack(&node)?),
        PackFormat::Json => write_node_compact(out, &minify(&node)),
    }
}

fn handle_unpack(file: &FsPath, format: PackFormat, out: Option<&FsPath>) -> Result<(), CliError> {
    let node = match format {
        PackFormat::Cbor => {
            let bytes = std::fs::read(file)?;
            unpack(&bytes)?
        }
        PackFormat::Json => unminify(&read_node(file)?),
    };
    write_node_json(out, &node)
}

fn handle_edit(program_path: &FsPath, edits_path: &FsPath, dry_run: bool) -> Result<(), CliError> {
    let program = read_program(program_path)?;
    let edits_json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(edits_path)?)?;
    let ops: Vec<EditOp> = serde_json::from_value(edits_json)?;

    let outcome = apply_edits(&program, &ops)?;
    for report in &outcome.reports {
        println!("{}: {}", report.op, report.detail);
    }
    if !dry_run {
        print!("{}", canonicalize(&outcome.program.to_node()));
    }
    Ok(())
}

fn handle_rewrite(program_path: &FsPath, rules_path: &FsPath, dry_run: bool, limit: Option<usize>) -> Result<(), CliError> {
    let program = read_program(program_path)?;
    let rules_json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(rules_path)?)?;
    let rules: Vec<Rule> = serde_json::from_value(rules_json)?;

    let outcome = rewrite_fixpoint(&program, &rules, limit)?;
    println!("{} replacement(s) over {} pass(es)", outcome.replacements, outcome.passes);
    for warning in &outcome.warnings {
        eprintln!("warning: {warning}");
    }
    if !dry_run {
        print!("{}", canonicalize(&outcome.program.to_node()));
    }
    Ok(())
}

fn handle_add_uid(file: &FsPath, in_place: bool, deep: bool) -> Result<(), CliError> {
    let program = read_program(file)?;
    let (stamped, count) = stamp::stamp_missing_ids(&program, deep);
    eprintln!("stamped {count} id(s)");
    if in_place {
        std::fs::write(file, canonicalize(&stamped.to_node()))?;
    } else {
        print!("{}", canonicalize(&stamped.to_node()));
    }
    Ok(())
}

fn handle_migrate_calls(file: &FsPath, to: CallStyleArg, dry_run: bool) -> Result<(), CliError> {
    let program = read_program(file)?;
    let style = match to {
        CallStyleArg::Id => CallStyle::Id,
        CallStyleArg::Name => CallStyle::Name,
    };
    let (migrated, count) = stamp::migrate_calls(&program, style);
    eprintln!("migrated {count} call(s)");
    if !dry_run {
        print!("{}", canonicalize(&migrated.to_node()));
    }
    Ok(())
}

fn handle_suggest(file: &FsPath, json: bool) -> Result<(), CliError> {
    let program = read_program(file)?;
    let suggestions = stamp::suggest(&program);

    if json {
        let items: Vec<_> = suggestions
            .iter()
            .map(|s| serde_json::json!({"code": s.code, "path": s.path, "message": s.message}))
            .collect();
        println!("{}", serde_json::to_string(&serde_json::json!({"suggestions": items})).unwrap());
        return Ok(());
    }

    if suggestions.is_empty() {
        println!("No suggestions.");
        return Ok(());
    }
    for s in &suggestions {
        println!("[{}] at {}: {}", s.code, s.path, s.message);
    }
    Ok(())
}
