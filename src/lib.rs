//! Amorph: an AI-first programming language whose programs are canonical,
//! structured ASTs rather than free text (§1).
//!
//! This crate is the core described in §2: the AST model, operator
//! registry, canonicalizer, VM, semantic validator, scope analyzer, type
//! inferencer, edit engine, refactor primitives, and rewrite engine. The
//! command-line front-end in [`cli`] is a thin shell over these entry
//! points, matching the external-collaborator boundary drawn in §1/§6.

pub mod ast;
pub mod canon;
pub mod cli;
pub mod diagnostic;
pub mod edit;
pub mod refactor;
pub mod registry;
pub mod rewrite;
pub mod runtime_error;
pub mod stamp;
pub mod validate;
pub mod value;
pub mod vm;
