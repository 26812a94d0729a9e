//! Whole-document analysis: parse, lint, resolve, check.
//!
//! Every entry point reprocesses the full text. Results are built fresh and
//! never patched, so a previous [`Analysis`] stays valid while a new one is
//! computed.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::check::check;
use crate::chunk::{chunk, ChunkTree};
use crate::completion::{complete, CompletionCandidate};
use crate::data::Data;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticTracker, TextEdit};
use crate::error::ResolutionIssue;
use crate::grammar::ThrdGrammar;
use crate::hover::{hover, Hover};
use crate::index::{TypeIndex, DATA_EXTENSION, DECLARATION_EXTENSION};
use crate::lint::lint;
use crate::parser::parse;
use crate::position::{byte_offset, Position, Range};
use crate::settings::Settings;
use crate::token::{lex, split_lines, Token, TokenData};
use crate::typespec::{TypeResolver, TypeSpec};

/// Lexed, chunked and parsed document, before any type is involved.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    pub tokens: Vec<Token>,
    pub chunks: ChunkTree,
    /// `None` when a fatal diagnostic stopped interpretation.
    pub data: Option<Data>,
    pub diagnostics: DiagnosticTracker,
}

impl ParsedDocument {
    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.text)
    }

    /// The token covering `pos`.
    pub fn token_at(&self, pos: Position) -> Option<&Token> {
        self.tokens.iter().find(|t| t.range.contains(pos))
    }
}

pub fn parse_document(text: &str) -> ParsedDocument {
    let tokens = lex(&ThrdGrammar, &split_lines(text));
    let mut diagnostics = DiagnosticTracker::new();
    let chunks = chunk(&tokens, &mut diagnostics);
    let data = parse(&chunks, &mut diagnostics);
    ParsedDocument {
        text: text.to_owned(),
        tokens,
        chunks,
        data,
        diagnostics,
    }
}

/// What a document is, judged by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentRole {
    /// Checked against the declared type its name binds to.
    Data,
    /// Checked against the declaration spec.
    Declaration,
    /// Parsed and linted only.
    Other,
}

impl DocumentRole {
    pub fn of(file_name: &str) -> DocumentRole {
        match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(DATA_EXTENSION) => DocumentRole::Data,
            Some(DECLARATION_EXTENSION) => DocumentRole::Declaration,
            _ => DocumentRole::Other,
        }
    }
}

/// One analysis pass over a document.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub file_name: String,
    pub role: DocumentRole,
    pub document: ParsedDocument,
    /// Type the document is checked against; `None` for [`DocumentRole::Other`].
    pub spec: Option<Result<TypeSpec, ResolutionIssue>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Final path segment, accepting both `/` and `\` separators.
fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

pub fn analyze(file_name: &str, text: &str, index: &TypeIndex, settings: &Settings) -> Analysis {
    let file_name = base_name(file_name);
    let role = DocumentRole::of(file_name);
    let document = parse_document(text);
    let mut diagnostics = document.diagnostics.clone();

    if let Some(data) = &document.data {
        if settings.lint.whitespace {
            lint(
                &document.lines(),
                &document.tokens,
                data,
                &settings.lint,
                &mut diagnostics,
            );
        }
    }

    let spec = match role {
        DocumentRole::Data => Some(index.type_for_data_file(file_name)),
        DocumentRole::Declaration => Some(Ok(index.declaration_spec().clone())),
        DocumentRole::Other => None,
    };
    match &spec {
        Some(Ok(spec)) => {
            if let Some(data) = &document.data {
                check(data, spec, resolver_for(role, index), &mut diagnostics);
            }
        }
        Some(Err(issue)) => diagnostics.add(Diagnostic::error(
            DiagnosticKind::TypeResolution,
            Range::at(Position::default()),
            format!("Type resolution failed: {issue}."),
        )),
        None => {}
    }

    let mut diagnostics = diagnostics.into_diagnostics();
    if diagnostics.len() > settings.max_number_of_problems {
        debug!(
            file = file_name,
            total = diagnostics.len(),
            kept = settings.max_number_of_problems,
            "truncating diagnostics"
        );
        diagnostics.truncate(settings.max_number_of_problems);
    }

    Analysis {
        file_name: file_name.to_owned(),
        role,
        document,
        spec,
        diagnostics,
    }
}

/// Declarations resolve names through the bootstrap, data through the index.
fn resolver_for(role: DocumentRole, index: &TypeIndex) -> &dyn TypeResolver {
    match role {
        DocumentRole::Declaration => index.bootstrap(),
        DocumentRole::Data | DocumentRole::Other => index,
    }
}

impl Analysis {
    pub fn validate(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn fix_all(&self) -> Vec<TextEdit> {
        fix_all(&self.diagnostics)
    }

    pub fn completions_at(&self, pos: Position, index: &TypeIndex) -> Vec<CompletionCandidate> {
        let Some(Ok(spec)) = &self.spec else {
            return Vec::new();
        };
        complete(
            self.document.data.as_ref(),
            spec,
            resolver_for(self.role, index),
            pos,
        )
    }

    pub fn hover_at(&self, pos: Position, index: &TypeIndex) -> Option<Hover> {
        let token = self.document.token_at(pos)?;
        if token.is_ignored() || token.data == TokenData::Newline {
            return None;
        }
        let (Some(Ok(spec)), Some(data)) = (&self.spec, &self.document.data) else {
            return None;
        };
        hover(data, spec, resolver_for(self.role, index), pos)
    }
}

// ──────────────────────────────────────────────
// Fixes
// ──────────────────────────────────────────────

/// Every auto-fix that can be applied together, in document order.
///
/// An edit overlapping an earlier kept edit is dropped, as is a second
/// insertion at the same point.
pub fn fix_all(diagnostics: &[Diagnostic]) -> Vec<TextEdit> {
    let mut edits: Vec<&TextEdit> = diagnostics
        .iter()
        .filter_map(|d| d.auto_fix.as_ref())
        .collect();
    edits.sort_by_key(|e| (e.range.start, e.range.end));

    let mut kept: Vec<TextEdit> = Vec::new();
    for edit in edits {
        if let Some(last) = kept.last() {
            let overlaps = edit.range.start < last.range.end;
            let same_point = edit.range.start == last.range.start
                && edit.range.start == edit.range.end
                && last.range.start == last.range.end;
            if overlaps || same_point {
                continue;
            }
        }
        kept.push(edit.clone());
    }
    kept
}

/// Apply non-overlapping edits to `text`.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let offset = |pos: Position| -> usize {
        let Some(&start) = line_starts.get(pos.line as usize) else {
            return text.len();
        };
        let end = line_starts
            .get(pos.line as usize + 1)
            .map_or(text.len(), |next| next - 1);
        let line = &text[start..end];
        let line = line.strip_suffix('\r').unwrap_or(line);
        start + byte_offset(line, pos.character)
    };

    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| (e.range.start, e.range.end));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in sorted {
        let start = offset(edit.range.start).max(cursor);
        let end = offset(edit.range.end).max(start);
        out.push_str(&text[cursor..start]);
        out.push_str(&edit.new_text);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}
