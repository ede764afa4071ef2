//! Defines the command-line arguments and subcommands for the Amorph CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure (§6).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "amorph",
    version,
    about = "A canonical, structured-AST programming language for AI-authored code."
)]
pub struct AmorphArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PackFormat {
    Cbor,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CallStyleArg {
    Id,
    Name,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a program.
    Run {
        file: PathBuf,
        /// Emit a human-readable trace of VM events to stderr.
        #[arg(long)]
        trace: bool,
        /// Emit an NDJSON trace of VM events to stderr.
        #[arg(long)]
        trace_json: bool,
        /// Discard all stdout output.
        #[arg(long)]
        quiet: bool,
        /// Deny the `input` capability.
        #[arg(long)]
        deny_input: bool,
        /// Deny the `print` capability.
        #[arg(long)]
        deny_print: bool,
        /// Attach path/call-stack/excerpt context to runtime errors.
        #[arg(long)]
        rich_errors: bool,
    },
    /// Run the semantic validator, and optionally the scope and type passes.
    Validate {
        file: PathBuf,
        /// Emit `{ok, issues}` JSON instead of a human summary.
        #[arg(long)]
        json: bool,
        /// Also run the type inferencer.
        #[arg(long)]
        check_types: bool,
        /// Also run the scope analyzer.
        #[arg(long)]
        check_scopes: bool,
    },
    /// Canonicalize a program.
    Fmt {
        file: PathBuf,
        /// Write back to `file` instead of stdout.
        #[arg(short = 'i', long)]
        in_place: bool,
    },
    /// Convert a canonical program to its short-key minified form.
    Minify {
        file: PathBuf,
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Convert a minified program back to long keys.
    Unminify {
        file: PathBuf,
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Encode a program as a binary (or minified-JSON fallback) pack.
    Pack {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "cbor")]
        format: PackFormat,
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Decode a binary (or minified-JSON fallback) pack.
    Unpack {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "cbor")]
        format: PackFormat,
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Apply a declarative edit batch to a program.
    Edit {
        program: PathBuf,
        /// JSON array of edit operations (§4.6).
        edits: PathBuf,
        /// Report what would change without writing it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply pattern rewrite rules to a program.
    Rewrite {
        program: PathBuf,
        /// JSON array of rewrite rules (§4.8).
        rules: PathBuf,
        #[arg(long)]
        dry_run: bool,
        /// Cap the total number of replacements across all passes.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Stamp missing `"id"` fields.
    AddUid {
        file: PathBuf,
        #[arg(short = 'i', long)]
        in_place: bool,
        /// Stamp every structured node, not just top-level statements.
        #[arg(long)]
        deep: bool,
    },
    /// Normalize every `call` node to a single addressing style.
    MigrateCalls {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "id")]
        to: CallStyleArg,
        #[arg(long)]
        dry_run: bool,
    },
    /// Emit mechanical improvement suggestions.
    Suggest {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}
