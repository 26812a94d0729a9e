//! Core analysis results to `lsp-types` values.

use std::collections::HashMap;

use lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, CompletionItem, CompletionItemKind,
    DiagnosticRelatedInformation, DiagnosticSeverity, HoverContents, InsertTextFormat, Location,
    MarkupContent, MarkupKind, NumberOrString, Uri, WorkspaceEdit,
};
use thrd_core::{CompletionCandidate, CompletionKind, Diagnostic, Hover, Position, Range};
use thrd_core::{Severity, TextEdit};

/// Diagnostic `source` shown by editors.
pub const SOURCE: &str = "thrd";

/// Kind of the fix-all code action, and its language-specific refinement.
pub const FIX_ALL_KIND: &str = "source.fixAll";
pub const FIX_ALL_THRD_KIND: &str = "source.fixAll.thrd";

pub fn position(pos: Position) -> lsp_types::Position {
    lsp_types::Position::new(pos.line, pos.character)
}

pub fn from_position(pos: lsp_types::Position) -> Position {
    Position::new(pos.line, pos.character)
}

pub fn range(range: Range) -> lsp_types::Range {
    lsp_types::Range::new(position(range.start), position(range.end))
}

fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

pub fn diagnostic(d: &Diagnostic, uri: &Uri) -> lsp_types::Diagnostic {
    let code = serde_json::to_value(d.kind)
        .ok()
        .and_then(|v| v.as_str().map(|s| NumberOrString::String(s.to_owned())));
    let related = d
        .related
        .iter()
        .map(|r| DiagnosticRelatedInformation {
            location: Location::new(uri.clone(), range(r.range)),
            message: r.message.clone(),
        })
        .collect::<Vec<_>>();
    lsp_types::Diagnostic {
        range: range(d.range),
        severity: Some(severity(d.severity)),
        code,
        source: Some(SOURCE.to_owned()),
        message: d.message.clone(),
        related_information: (!related.is_empty()).then_some(related),
        data: d.fatal.then(|| serde_json::json!({ "fatal": true })),
        ..Default::default()
    }
}

pub fn diagnostics(ds: &[Diagnostic], uri: &Uri) -> Vec<lsp_types::Diagnostic> {
    ds.iter().map(|d| diagnostic(d, uri)).collect()
}

pub fn text_edit(edit: &TextEdit) -> lsp_types::TextEdit {
    lsp_types::TextEdit::new(range(edit.range), edit.new_text.clone())
}

pub fn completion_item(candidate: &CompletionCandidate) -> CompletionItem {
    let kind = match candidate.kind {
        CompletionKind::Property => CompletionItemKind::PROPERTY,
        CompletionKind::Snippet => CompletionItemKind::SNIPPET,
        CompletionKind::Keyword => CompletionItemKind::KEYWORD,
        CompletionKind::EnumMember => CompletionItemKind::ENUM_MEMBER,
    };
    CompletionItem {
        label: candidate.label.clone(),
        kind: Some(kind),
        insert_text: candidate.insert_text.clone(),
        insert_text_format: Some(if candidate.snippet {
            InsertTextFormat::SNIPPET
        } else {
            InsertTextFormat::PLAIN_TEXT
        }),
        ..Default::default()
    }
}

pub fn hover(hover: &Hover) -> lsp_types::Hover {
    lsp_types::Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("```thrd\n{}\n```", hover.text),
        }),
        range: Some(range(hover.range)),
    }
}

/// Whether a client's `only` filter admits the fix-all action.
pub fn wants_fix_all(only: Option<&[CodeActionKind]>) -> bool {
    match only {
        None => true,
        Some(kinds) => kinds.iter().any(|k| {
            let k = k.as_str();
            k == "source" || k == FIX_ALL_KIND || k == FIX_ALL_THRD_KIND
        }),
    }
}

pub fn fix_all_action(uri: &Uri, edits: &[TextEdit]) -> CodeActionOrCommand {
    let mut changes = HashMap::new();
    changes.insert(uri.clone(), edits.iter().map(text_edit).collect());
    CodeActionOrCommand::CodeAction(CodeAction {
        title: "Fix all auto-fixable issues".to_owned(),
        kind: Some(CodeActionKind::SOURCE_FIX_ALL),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        ..Default::default()
    })
}
