pub(crate) mod check;
pub(crate) mod fix;
pub(crate) mod inspect;

use thrd_core::{Diagnostic, DiagnosticKind, Range};

/// Kebab-case rule name, as shown in brackets after a message.
pub(crate) fn kind_name(kind: DiagnosticKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

/// `path:line:col: severity: message [kind]`, one-based like compiler output.
pub(crate) fn format_diagnostic(file: &str, d: &Diagnostic) -> String {
    format!(
        "{}:{}:{}: {}: {} [{}]",
        file,
        d.range.start.line + 1,
        d.range.start.character + 1,
        d.severity.label(),
        d.message,
        kind_name(d.kind)
    )
}

/// Zero-based editor coordinates, `line:col-line:col`.
pub(crate) fn format_range(range: Range) -> String {
    format!(
        "{}:{}-{}:{}",
        range.start.line, range.start.character, range.end.line, range.end.character
    )
}
