//! Whitespace style warnings, each with an auto-fix.

use crate::data::{BlockData, Data, DataKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticTracker, TextEdit};
use crate::position::{utf16_len, Position, Range};
use crate::settings::LintSettings;
use crate::token::{Side, Token, TokenData};

/// Run every whitespace rule over a document that parsed into `data`.
pub fn lint(
    lines: &[&str],
    tokens: &[Token],
    data: &Data,
    settings: &LintSettings,
    diagnostics: &mut DiagnosticTracker,
) {
    let linter = Linter {
        lines,
        tokens,
        data,
        indent_width: settings.indent_width,
        string_lines: StringLines::new(lines.len(), tokens),
    };
    linter.trailing_whitespace(diagnostics);
    linter.indentation(diagnostics);
    linter.padding(diagnostics);
    linter.line_breaks(data, diagnostics);
}

/// Lines that begin or end inside a multi-line string.
struct StringLines {
    starts_inside: Vec<bool>,
    ends_inside: Vec<bool>,
}

impl StringLines {
    fn new(line_count: usize, tokens: &[Token]) -> Self {
        let mut starts_inside = vec![false; line_count];
        let mut ends_inside = vec![false; line_count];
        let mut prev: Option<&Token> = None;
        for token in tokens {
            let line = token.range.start.line as usize;
            if token.data == TokenData::Newline {
                if let (Some(prev), Some(slot)) = (prev, ends_inside.get_mut(line)) {
                    *slot = prev.range.start.line as usize == line && in_string(prev, Side::Begin);
                }
            } else if prev.map_or(true, |p| p.data == TokenData::Newline) {
                if let Some(slot) = starts_inside.get_mut(line) {
                    *slot = in_string(token, Side::End);
                }
            }
            prev = Some(token);
        }
        StringLines {
            starts_inside,
            ends_inside,
        }
    }
}

/// String content, or the string boundary on the given side.
fn in_string(token: &Token, boundary: Side) -> bool {
    match token.data {
        TokenData::StringData { .. } => true,
        TokenData::StringBoundary { side } => side == boundary,
        _ => false,
    }
}

fn leading_whitespace(line: &str) -> &str {
    let end = line.len() - line.trim_start().len();
    &line[..end]
}

struct Linter<'a> {
    lines: &'a [&'a str],
    tokens: &'a [Token],
    data: &'a Data,
    indent_width: u32,
    string_lines: StringLines,
}

impl<'a> Linter<'a> {
    fn expected_indent_at(&self, pos: Position) -> u32 {
        self.indent_width * data_depth(self.data, pos)
    }

    fn trailing_whitespace(&self, diagnostics: &mut DiagnosticTracker) {
        for (i, line) in self.lines.iter().enumerate() {
            if self.string_lines.ends_inside[i] {
                continue;
            }
            let kept = line.trim_end();
            if kept.len() == line.len() {
                continue;
            }
            let range = Range::on_line(i as u32, utf16_len(kept), utf16_len(line));
            diagnostics.add(
                Diagnostic::warning(
                    DiagnosticKind::TrailingWhitespace,
                    range,
                    "Trailing whitespace not allowed.",
                )
                .with_fix(Some(TextEdit::delete(range))),
            );
        }
    }

    fn indentation(&self, diagnostics: &mut DiagnosticTracker) {
        for (i, line) in self.lines.iter().enumerate() {
            if line.trim().is_empty() || self.string_lines.starts_inside[i] {
                continue;
            }
            let indent = leading_whitespace(line);
            let received = utf16_len(indent);
            let expected = self.expected_indent_at(Position::new(i as u32, received));
            let non_space = indent.chars().any(|c| c != ' ');
            if !non_space && received == expected {
                continue;
            }
            let received_text = if non_space {
                "non-space whitespace.".to_owned()
            } else {
                format!("{received} spaces")
            };
            let range = Range::on_line(i as u32, 0, received);
            diagnostics.add(
                Diagnostic::warning(
                    DiagnosticKind::Indentation,
                    range,
                    format!("Expected indent of {expected} spaces, received {received_text}"),
                )
                .with_fix(Some(TextEdit::replace(range, " ".repeat(expected as usize)))),
            );
        }
    }

    /// No space before a separator and exactly one after it, on the same line.
    fn padding(&self, diagnostics: &mut DiagnosticTracker) {
        let visible: Vec<&Token> = self
            .tokens
            .iter()
            .filter(|t| t.data != TokenData::Newline && !t.is_whitespace())
            .collect();
        for window in visible.windows(3) {
            let [before, current, after] = window else {
                continue;
            };
            if !matches!(current.data, TokenData::Separator { .. }) {
                continue;
            }
            let line = current.range.start.line;

            if before.range.end.line == line && before.range.end != current.range.start {
                self.padding_issue(
                    diagnostics,
                    Range::new(before.range.end, current.range.start),
                    0,
                );
            }
            if after.range.start.line == line
                && after.range.start.character != current.range.end.character + 1
            {
                self.padding_issue(
                    diagnostics,
                    Range::new(current.range.end, after.range.start),
                    1,
                );
            }
        }
    }

    fn padding_issue(&self, diagnostics: &mut DiagnosticTracker, range: Range, expected: usize) {
        let gap = self.text_in(range);
        let received = if gap.chars().any(|c| c != ' ') {
            "non-space whitespace.".to_owned()
        } else {
            format!("{} spaces", range.end.character - range.start.character)
        };
        diagnostics.add(
            Diagnostic::warning(
                DiagnosticKind::Padding,
                range,
                format!("Expected {expected} spaces, received {received}"),
            )
            .with_fix(Some(TextEdit::replace(range, " ".repeat(expected)))),
        );
    }

    fn text_in(&self, range: Range) -> &str {
        let Some(line) = self.lines.get(range.start.line as usize) else {
            return "";
        };
        let start = crate::position::byte_offset(line, range.start.character);
        let end = crate::position::byte_offset(line, range.end.character);
        line.get(start..end.max(start)).unwrap_or("")
    }

    fn line_breaks(&self, data: &Data, diagnostics: &mut DiagnosticTracker) {
        match &data.kind {
            DataKind::Block(block) => self.block_line_breaks(block, diagnostics),
            DataKind::Enum(value) => {
                if let Some(payload) = &value.payload {
                    self.block_line_breaks(payload, diagnostics);
                }
            }
            DataKind::Primitive(_) => {}
        }
    }

    /// In a multi-line block the first and last items get lines of their own.
    fn block_line_breaks(&self, block: &BlockData, diagnostics: &mut DiagnosticTracker) {
        let range = block.range;
        let tokens = block.token_range;
        let skipped = |t: &Token| {
            t.data == TokenData::Newline
                || t.is_whitespace()
                || matches!(t.data, TokenData::Invalid { .. })
        };

        if range.is_multiline() && tokens.end >= tokens.start + 2 {
            let close = tokens.end - 1;
            let last = (tokens.start + 1..close)
                .rev()
                .find(|&i| !skipped(&self.tokens[i]))
                .unwrap_or(tokens.start);
            let last_token = &self.tokens[last];
            if last > tokens.start && last_token.range.end.line == range.end.line {
                let fix_range = Range::new(last_token.range.end, self.tokens[close].range.start);
                self.line_break(diagnostics, fix_range, self.expected_indent_at(range.end));
            }

            let mut anchor = tokens.start;
            let mut first = close;
            for i in tokens.start + 1..close {
                let token = &self.tokens[i];
                if skipped(token) {
                    continue;
                }
                // Comments may share the opening line.
                if token.is_ignored() {
                    anchor = i;
                    continue;
                }
                first = i;
                break;
            }
            let first_token = &self.tokens[first];
            if first < close && first_token.range.start.line == range.start.line {
                let fix_range = Range::new(self.tokens[anchor].range.end, first_token.range.start);
                self.line_break(
                    diagnostics,
                    fix_range,
                    self.expected_indent_at(first_token.range.start),
                );
            }
        }

        for child in block.contents.children() {
            self.line_breaks(child, diagnostics);
        }
    }

    fn line_break(&self, diagnostics: &mut DiagnosticTracker, range: Range, indent: u32) {
        diagnostics.add(
            Diagnostic::warning(DiagnosticKind::LineBreak, range, "Expected line break.").with_fix(
                Some(TextEdit::replace(
                    range,
                    format!("\n{}", " ".repeat(indent as usize)),
                )),
            ),
        );
    }
}

/// Number of blocks whose interior (inside the brackets) contains `pos`.
fn data_depth(data: &Data, pos: Position) -> u32 {
    match &data.kind {
        DataKind::Block(block) => block_depth(block, pos),
        DataKind::Enum(value) => value.payload.as_ref().map_or(0, |p| block_depth(p, pos)),
        DataKind::Primitive(_) => 0,
    }
}

fn block_depth(block: &BlockData, pos: Position) -> u32 {
    if !block.range.contract(1, 1).contains(pos) {
        return 0;
    }
    1 + block
        .contents
        .children()
        .map(|child| data_depth(child, pos))
        .max()
        .unwrap_or(0)
}
