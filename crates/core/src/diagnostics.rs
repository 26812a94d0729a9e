//! Reported problems and the per-pass accumulator.

use serde::Serialize;

use crate::position::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "info",
            Severity::Hint => "hint",
        }
    }
}

/// A replacement of `range` by `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

impl TextEdit {
    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        TextEdit {
            range: Range::at(at),
            new_text: text.into(),
        }
    }

    pub fn replace(range: Range, text: impl Into<String>) -> Self {
        TextEdit {
            range,
            new_text: text.into(),
        }
    }

    pub fn delete(range: Range) -> Self {
        TextEdit {
            range,
            new_text: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedInformation {
    pub range: Range,
    pub message: String,
}

/// Which rule produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    // lexical
    InvalidToken,
    // chunking
    BracketMismatch,
    UnexpectedEndOfInput,
    UnterminatedString,
    NumberOutOfRange,
    // parsing
    ExpectedSeparator,
    ExpectedKey,
    ExpectedValue,
    KeyInListLike,
    DuplicateKey,
    UnnecessaryComma,
    IllegalTopLevel,
    DataExpected,
    EndOfFileExpected,
    // type checking
    TypeMismatch,
    ExpectedEnum,
    UnknownEnumTag,
    UnitMismatch,
    MissingProperty,
    UnexpectedProperty,
    TooManyElements,
    TooFewElements,
    UnresolvedReference,
    // resolution
    TypeResolution,
    // whitespace lint
    TrailingWhitespace,
    Indentation,
    Padding,
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub range: Range,
    pub message: String,
    pub severity: Severity,
    /// Fatal diagnostics stop structural interpretation of the document.
    pub fatal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_fix: Option<TextEdit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedInformation>,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        severity: Severity,
        range: Range,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            kind,
            range,
            message: message.into(),
            severity,
            fatal: false,
            auto_fix: None,
            related: Vec::new(),
        }
    }

    pub fn error(kind: DiagnosticKind, range: Range, message: impl Into<String>) -> Self {
        Diagnostic::new(kind, Severity::Error, range, message)
    }

    pub fn warning(kind: DiagnosticKind, range: Range, message: impl Into<String>) -> Self {
        Diagnostic::new(kind, Severity::Warning, range, message)
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn with_fix(mut self, edit: Option<TextEdit>) -> Self {
        self.auto_fix = edit;
        self
    }

    pub fn with_related(mut self, range: Range, message: impl Into<String>) -> Self {
        self.related.push(RelatedInformation {
            range,
            message: message.into(),
        });
        self
    }
}

/// Append-only accumulator owned by one analysis pass.
#[derive(Debug, Clone)]
pub struct DiagnosticTracker {
    diagnostics: Vec<Diagnostic>,
    can_continue: bool,
}

impl Default for DiagnosticTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticTracker {
    pub fn new() -> Self {
        DiagnosticTracker {
            diagnostics: Vec::new(),
            can_continue: true,
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        if diagnostic.fatal {
            self.can_continue = false;
        }
        self.diagnostics.push(diagnostic);
    }

    /// False once any fatal diagnostic has been added.
    pub fn can_continue(&self) -> bool {
        self.can_continue
    }

    pub fn merge(&mut self, other: DiagnosticTracker) {
        self.can_continue &= other.can_continue;
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn auto_fixes(&self) -> Vec<TextEdit> {
        self.diagnostics
            .iter()
            .filter_map(|d| d.auto_fix.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_diagnostic_stops_continuation() {
        let mut tracker = DiagnosticTracker::new();
        tracker.add(Diagnostic::warning(
            DiagnosticKind::UnnecessaryComma,
            Range::default(),
            "Unnecessary comma",
        ));
        assert!(tracker.can_continue());
        tracker.add(
            Diagnostic::error(DiagnosticKind::DataExpected, Range::default(), "Data expected.")
                .fatal(),
        );
        assert!(!tracker.can_continue());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn merge_keeps_order_and_fatality() {
        let mut a = DiagnosticTracker::new();
        a.add(Diagnostic::error(DiagnosticKind::InvalidToken, Range::default(), "a"));
        let mut b = DiagnosticTracker::new();
        b.add(
            Diagnostic::error(DiagnosticKind::BracketMismatch, Range::default(), "b").fatal(),
        );
        a.merge(b);
        let messages: Vec<&str> = a.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
        assert!(!a.can_continue());
    }

    #[test]
    fn auto_fixes_skip_diagnostics_without_fix() {
        let mut tracker = DiagnosticTracker::new();
        let r = Range::on_line(0, 1, 2);
        tracker.add(
            Diagnostic::warning(DiagnosticKind::UnnecessaryComma, r, "Unnecessary comma")
                .with_fix(Some(TextEdit::delete(r))),
        );
        tracker.add(Diagnostic::error(DiagnosticKind::ExpectedKey, r, "Expected property key."));
        assert_eq!(tracker.auto_fixes(), vec![TextEdit::delete(r)]);
    }
}
