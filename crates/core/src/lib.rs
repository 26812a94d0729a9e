//! thrd-core: analysis core for the THRD data language.
//!
//! Turns document text into positioned data and checks it against declared
//! structural types:
//!
//! text -> [`token::lex`] -> [`chunk::chunk`] -> [`parser::parse`] -> [`Data`]
//!
//! and, for the workspace, declaration files -> [`TypeIndex`] -> [`TypeSpec`].
//!
//! # Public API
//!
//! - [`analyze()`] -- one full pass over a document: diagnostics, fixes,
//!   completion and hover
//! - [`parse_document()`] -- the type-free half of the pipeline
//! - [`TypeIndex`] -- workspace registry of declared types
//! - [`check()`] -- structural comparison of data against a spec
//! - [`Settings`] -- `thrd.toml` / editor configuration

pub mod analysis;
pub mod bootstrap;
pub mod check;
pub mod chunk;
pub mod completion;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod grammar;
pub mod hover;
pub mod index;
pub mod lint;
pub mod parser;
pub mod position;
pub mod settings;
pub mod source;
pub mod token;
pub mod trace;
pub mod typespec;

// ── Convenience re-exports: key types ────────────────────────────────

pub use analysis::{Analysis, DocumentRole, ParsedDocument};
pub use completion::{CompletionCandidate, CompletionKind};
pub use data::{Data, Value};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticTracker, Severity, TextEdit};
pub use error::{Error, ResolutionIssue};
pub use hover::Hover;
pub use index::TypeIndex;
pub use position::{Position, Range};
pub use settings::Settings;
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};
pub use typespec::{BlockSpec, TypeResolver, TypeSpec};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use analysis::{analyze, apply_edits, fix_all, parse_document};
pub use check::check;
