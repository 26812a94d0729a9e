//! Chunk tree to positioned [`Data`].
//!
//! Containers are parsed by two small sequencing state machines, one for
//! lists (arrays and tuples) and one for dicts. Out-of-sequence chunks are
//! reported and parsing carries on as though the sequence had been right.

use indexmap::IndexMap;

use crate::chunk::{BlockChunk, Chunk, ChunkKind, ChunkTree};
use crate::data::{BlockContents, BlockData, Data, DataKind, EnumData};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticTracker, TextEdit};
use crate::position::{Position, Range};
use crate::token::BlockKind;

/// Parse the top-level chunks into a single value.
///
/// Returns `None` once a fatal diagnostic has been recorded, including any
/// raised earlier by the chunker.
pub fn parse(tree: &ChunkTree, diagnostics: &mut DiagnosticTracker) -> Option<Data> {
    for chunk in &tree.chunks {
        if matches!(
            chunk.kind,
            ChunkKind::Key { .. } | ChunkKind::Separator { weak: false }
        ) {
            diagnostics.add(
                Diagnostic::error(
                    DiagnosticKind::IllegalTopLevel,
                    chunk.range,
                    "Illegal top level chunk.",
                )
                .fatal(),
            );
        }
    }
    if !diagnostics.can_continue() {
        return None;
    }

    let values: Vec<&Chunk> = tree.chunks.iter().filter(|c| is_value(c)).collect();
    match values.as_slice() {
        [] => diagnostics.add(
            Diagnostic::error(
                DiagnosticKind::DataExpected,
                Range::at(Position::default()),
                "Data expected.",
            )
            .fatal(),
        ),
        [_] => {}
        [_, rest @ ..] => {
            let range = rest
                .iter()
                .map(|c| c.range)
                .reduce(Range::combine)
                .unwrap_or_default();
            diagnostics.add(
                Diagnostic::error(
                    DiagnosticKind::EndOfFileExpected,
                    range,
                    "End of file expected.",
                )
                .fatal(),
            );
        }
    }
    if !diagnostics.can_continue() {
        return None;
    }

    let mut parser = Parser { diagnostics };
    values.first().map(|chunk| parser.value(chunk))
}

fn is_value(chunk: &Chunk) -> bool {
    matches!(
        chunk.kind,
        ChunkKind::Block(_) | ChunkKind::Enum { .. } | ChunkKind::Value(_)
    )
}

// ──────────────────────────────────────────────
// Sequencing
// ──────────────────────────────────────────────

/// Where a chunk broke the expected sequence.
#[derive(Debug, Clone, Copy)]
enum Violation {
    ExpectedSeparator,
    ExpectedKey,
    ExpectedValue,
    KeyInListLike,
}

impl Violation {
    fn kind(self) -> DiagnosticKind {
        match self {
            Violation::ExpectedSeparator => DiagnosticKind::ExpectedSeparator,
            Violation::ExpectedKey => DiagnosticKind::ExpectedKey,
            Violation::ExpectedValue => DiagnosticKind::ExpectedValue,
            Violation::KeyInListLike => DiagnosticKind::KeyInListLike,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Violation::ExpectedSeparator => "Expected \",\".",
            Violation::ExpectedKey => "Expected property key.",
            Violation::ExpectedValue => "Expected value.",
            Violation::KeyInListLike => "Arrays and tuples do not accept property keys.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fix {
    None,
    AddCommaBefore,
    Delete,
}

/// Separator bookkeeping shared by the list and dict machines.
struct Separators {
    expecting: bool,
    just_had: bool,
    just_had_weak: bool,
}

enum SeparatorStep {
    /// Merged into the separator just before it.
    Collapsed,
    /// Nothing to separate yet.
    Unexpected,
    Accepted,
}

impl Separators {
    fn new() -> Self {
        Separators {
            expecting: false,
            just_had: true,
            just_had_weak: true,
        }
    }

    fn after_item(&mut self) {
        self.expecting = true;
        self.just_had = false;
    }

    fn step(
        &mut self,
        weak: bool,
        index: usize,
        chunks: &[Chunk],
        diagnostics: &mut DiagnosticTracker,
    ) -> SeparatorStep {
        if self.just_had_weak && self.just_had {
            check_unnecessary_comma(index, chunks, diagnostics);
            self.just_had_weak = weak;
            return SeparatorStep::Collapsed;
        }
        if self.just_had && weak {
            self.just_had_weak = weak;
            return SeparatorStep::Collapsed;
        }
        self.just_had_weak = weak;
        if !self.expecting {
            return SeparatorStep::Unexpected;
        }
        check_unnecessary_comma(index, chunks, diagnostics);
        self.expecting = false;
        self.just_had = true;
        SeparatorStep::Accepted
    }

    /// A key or value was left without its counterpart.
    fn dangling(&self) -> bool {
        !self.expecting && !self.just_had
    }
}

/// Warn about a comma when a newline already separates the items, or when
/// nothing precedes or follows it in the container.
fn check_unnecessary_comma(index: usize, chunks: &[Chunk], diagnostics: &mut DiagnosticTracker) {
    let chunk = &chunks[index];
    if !matches!(chunk.kind, ChunkKind::Separator { weak: false }) {
        return;
    }
    let after = reaches_edge_or_newline(chunks[index + 1..].iter());
    let before = reaches_edge_or_newline(chunks[..index].iter().rev());
    if after || before {
        diagnostics.add(
            Diagnostic::warning(DiagnosticKind::UnnecessaryComma, chunk.range, "Unnecessary comma")
                .with_fix(Some(TextEdit::delete(chunk.range))),
        );
    }
}

fn reaches_edge_or_newline<'a>(neighbours: impl Iterator<Item = &'a Chunk>) -> bool {
    for next in neighbours {
        match next.kind {
            ChunkKind::Separator { weak: true } => return true,
            ChunkKind::Separator { weak: false } => continue,
            _ => return false,
        }
    }
    true
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'d> {
    diagnostics: &'d mut DiagnosticTracker,
}

impl<'d> Parser<'d> {
    fn violation(&mut self, chunk: &Chunk, violation: Violation, prev: Option<&Chunk>, fix: Fix) {
        let edit = match fix {
            Fix::None => None,
            Fix::Delete => Some(TextEdit::delete(chunk.range)),
            Fix::AddCommaBefore => Some(match prev {
                Some(prev) if prev.range.end.line == chunk.range.start.line => {
                    TextEdit::replace(Range::new(prev.range.end, chunk.range.start), ", ")
                }
                Some(prev) => TextEdit::insert(prev.range.end, ","),
                None => TextEdit::insert(chunk.range.start, ","),
            }),
        };
        self.diagnostics.add(
            Diagnostic::error(violation.kind(), chunk.range, violation.message()).with_fix(edit),
        );
    }

    fn end_of_input(&mut self, chunks: &[Chunk]) {
        let at = chunks.last().map(|c| c.range.end).unwrap_or_default();
        self.diagnostics.add(Diagnostic::error(
            DiagnosticKind::UnexpectedEndOfInput,
            Range::at(at),
            "Unexpected end of input. Expected value.",
        ));
    }

    fn value(&mut self, chunk: &Chunk) -> Data {
        let kind = match &chunk.kind {
            ChunkKind::Value(scalar) => DataKind::Primitive(scalar.clone()),
            ChunkKind::Block(block) => DataKind::Block(self.block(block)),
            ChunkKind::Enum {
                tag,
                tag_range,
                block,
            } => DataKind::Enum(EnumData {
                tag: tag.clone(),
                tag_range: *tag_range,
                payload: block.as_ref().map(|b| self.block(b)),
            }),
            ChunkKind::Key { .. } | ChunkKind::Separator { .. } => {
                unreachable!("keys and separators are filtered before value parsing")
            }
        };
        Data {
            kind,
            range: chunk.range,
            token_range: chunk.token_range,
        }
    }

    fn block(&mut self, block: &BlockChunk) -> BlockData {
        let contents = match block.kind {
            BlockKind::Dict => self.dict_like(&block.children),
            BlockKind::Array => BlockContents::Array(self.list_like(&block.children)),
            BlockKind::Tuple => BlockContents::Tuple(self.list_like(&block.children)),
        };
        BlockData {
            contents,
            range: block.range,
            token_range: block.token_range,
        }
    }

    fn list_like(&mut self, chunks: &[Chunk]) -> Vec<Data> {
        let mut items = Vec::new();
        let mut separators = Separators::new();
        let mut expecting_value = true;

        for (i, chunk) in chunks.iter().enumerate() {
            let prev = i.checked_sub(1).map(|p| &chunks[p]);
            match &chunk.kind {
                ChunkKind::Key { .. } => {
                    self.violation(chunk, Violation::KeyInListLike, prev, Fix::Delete);
                }
                ChunkKind::Block(_) | ChunkKind::Enum { .. } | ChunkKind::Value(_) => {
                    if !expecting_value {
                        self.violation(chunk, Violation::ExpectedSeparator, prev, Fix::AddCommaBefore);
                    }
                    items.push(self.value(chunk));
                    expecting_value = false;
                    separators.after_item();
                }
                ChunkKind::Separator { weak } => {
                    match separators.step(*weak, i, chunks, self.diagnostics) {
                        SeparatorStep::Collapsed => {}
                        SeparatorStep::Unexpected => {
                            self.violation(chunk, Violation::ExpectedValue, prev, Fix::Delete)
                        }
                        SeparatorStep::Accepted => expecting_value = true,
                    }
                }
            }
        }
        if separators.dangling() {
            self.end_of_input(chunks);
        }
        items
    }

    fn dict_like(&mut self, chunks: &[Chunk]) -> BlockContents {
        let mut contents = IndexMap::new();
        let mut key_ranges: IndexMap<String, Range> = IndexMap::new();
        let mut separators = Separators::new();
        let mut expecting_key = true;
        let mut pending_key: Option<&str> = None;
        let mut pending_is_duplicate = false;

        for (i, chunk) in chunks.iter().enumerate() {
            let prev = i.checked_sub(1).map(|p| &chunks[p]);
            match &chunk.kind {
                ChunkKind::Key { name, name_range } => {
                    if !expecting_key {
                        if separators.expecting {
                            self.violation(chunk, Violation::ExpectedSeparator, prev, Fix::AddCommaBefore);
                        } else {
                            self.violation(chunk, Violation::ExpectedValue, prev, Fix::None);
                        }
                    }
                    pending_is_duplicate = key_ranges.contains_key(name);
                    if pending_is_duplicate {
                        self.diagnostics.add(Diagnostic::error(
                            DiagnosticKind::DuplicateKey,
                            chunk.range,
                            format!("Duplicate property key \"{name}\"."),
                        ));
                    } else {
                        key_ranges.insert(name.clone(), *name_range);
                    }
                    expecting_key = false;
                    pending_key = Some(name.as_str());
                    separators.expecting = false;
                    separators.just_had = false;
                }
                ChunkKind::Block(_) | ChunkKind::Enum { .. } | ChunkKind::Value(_) => {
                    let Some(key) = pending_key.take() else {
                        let violation = if expecting_key {
                            Violation::ExpectedKey
                        } else {
                            Violation::ExpectedSeparator
                        };
                        self.violation(chunk, violation, prev, Fix::None);
                        // Parsed for its own diagnostics only.
                        self.value(chunk);
                        continue;
                    };
                    let value = self.value(chunk);
                    if !pending_is_duplicate {
                        contents.insert(key.to_owned(), value);
                    }
                    expecting_key = false;
                    separators.after_item();
                }
                ChunkKind::Separator { weak } => {
                    let just_had = separators.just_had;
                    match separators.step(*weak, i, chunks, self.diagnostics) {
                        SeparatorStep::Collapsed => {}
                        SeparatorStep::Unexpected => {
                            let fix = if just_had { Fix::Delete } else { Fix::None };
                            self.violation(chunk, Violation::ExpectedValue, prev, fix);
                        }
                        SeparatorStep::Accepted => {
                            expecting_key = true;
                            pending_key = None;
                        }
                    }
                }
            }
        }
        if separators.dangling() {
            self.end_of_input(chunks);
        }
        BlockContents::Dict {
            contents,
            key_ranges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk;
    use crate::data::{Scalar, Value};
    use crate::grammar::ThrdGrammar;
    use crate::token::{lex, split_lines};

    fn parse_text(text: &str) -> (Option<Data>, DiagnosticTracker) {
        let tokens = lex(&ThrdGrammar, &split_lines(text));
        let mut diagnostics = DiagnosticTracker::new();
        let tree = chunk(&tokens, &mut diagnostics);
        let data = parse(&tree, &mut diagnostics);
        (data, diagnostics)
    }

    fn kinds(diags: &DiagnosticTracker) -> Vec<DiagnosticKind> {
        diags.diagnostics().iter().map(|d| d.kind).collect()
    }

    #[test]
    fn parses_nested_document() {
        let (data, diags) = parse_text("{\n    name: \"x\"\n    tags: [#A, #B(1)]\n}");
        assert!(diags.is_empty(), "{:?}", diags.diagnostics());
        let value = data.expect("data").strip();
        assert_eq!(value.to_source(), r#"{name: "x", tags: [#A, #B(1)]}"#);
    }

    #[test]
    fn newlines_separate_items() {
        let (data, diags) = parse_text("[\n    1\n    2\n]");
        assert!(diags.is_empty(), "{:?}", diags.diagnostics());
        assert_eq!(
            data.expect("data").strip(),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn comma_before_newline_is_unnecessary() {
        let (_, diags) = parse_text("[\n    1,\n    2\n]");
        assert_eq!(kinds(&diags), vec![DiagnosticKind::UnnecessaryComma]);
        let d = &diags.diagnostics()[0];
        assert_eq!(d.range, Range::on_line(1, 5, 6));
        assert_eq!(d.auto_fix, Some(TextEdit::delete(d.range)));
    }

    #[test]
    fn trailing_comma_is_unnecessary() {
        let (data, diags) = parse_text("[1, 2,]");
        assert_eq!(kinds(&diags), vec![DiagnosticKind::UnnecessaryComma]);
        assert_eq!(diags.diagnostics()[0].range, Range::on_line(0, 5, 6));
        assert!(data.is_some());
    }

    #[test]
    fn missing_comma_on_same_line_suggests_replacement() {
        let (data, diags) = parse_text("[1 2]");
        assert_eq!(kinds(&diags), vec![DiagnosticKind::ExpectedSeparator]);
        let d = &diags.diagnostics()[0];
        assert_eq!(d.message, "Expected \",\".");
        assert_eq!(
            d.auto_fix,
            Some(TextEdit::replace(Range::on_line(0, 2, 3), ", "))
        );
        assert_eq!(
            data.expect("data").strip(),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn keys_are_rejected_in_arrays() {
        let (_, diags) = parse_text("[a: 1]");
        assert_eq!(kinds(&diags), vec![DiagnosticKind::KeyInListLike]);
        assert_eq!(
            diags.diagnostics()[0].auto_fix,
            Some(TextEdit::delete(Range::on_line(0, 1, 3)))
        );
    }

    #[test]
    fn duplicate_key_keeps_first_value() {
        let (data, diags) = parse_text("{a: 1, a: 2}");
        assert_eq!(kinds(&diags), vec![DiagnosticKind::DuplicateKey]);
        assert_eq!(diags.diagnostics()[0].message, "Duplicate property key \"a\".");
        let Some(Data {
            kind: DataKind::Block(block),
            ..
        }) = data
        else {
            panic!("expected block");
        };
        let BlockContents::Dict {
            contents,
            key_ranges,
        } = block.contents
        else {
            panic!("expected dict");
        };
        assert_eq!(contents.len(), 1);
        assert_eq!(contents["a"].kind, DataKind::Primitive(Scalar::Int(1)));
        assert_eq!(key_ranges["a"], Range::on_line(0, 1, 2));
    }

    #[test]
    fn value_without_key_is_reported() {
        let (data, diags) = parse_text("{1}");
        assert_eq!(kinds(&diags), vec![DiagnosticKind::ExpectedKey]);
        assert_eq!(data.expect("data").strip(), Value::Dict(IndexMap::new()));
    }

    #[test]
    fn key_without_value_reports_end_of_input() {
        let (_, diags) = parse_text("{a: }");
        assert_eq!(kinds(&diags), vec![DiagnosticKind::UnexpectedEndOfInput]);
        assert_eq!(
            diags.diagnostics()[0].message,
            "Unexpected end of input. Expected value."
        );
        assert!(diags.can_continue());
    }

    #[test]
    fn empty_document_expects_data() {
        let (data, diags) = parse_text("// nothing here\n");
        assert!(data.is_none());
        assert_eq!(kinds(&diags), vec![DiagnosticKind::DataExpected]);
    }

    #[test]
    fn second_top_level_value_is_fatal() {
        let (data, diags) = parse_text("1\n2 3");
        assert!(data.is_none());
        assert_eq!(kinds(&diags), vec![DiagnosticKind::EndOfFileExpected]);
        assert_eq!(diags.diagnostics()[0].range, Range::on_line(1, 0, 3));
    }

    #[test]
    fn top_level_key_is_fatal() {
        let (data, diags) = parse_text("a: 1");
        assert!(data.is_none());
        assert_eq!(kinds(&diags), vec![DiagnosticKind::IllegalTopLevel]);
    }

    #[test]
    fn chunker_fatal_stops_parsing() {
        let (data, diags) = parse_text("[ (1, 2 ]");
        assert!(data.is_none());
        assert_eq!(kinds(&diags), vec![DiagnosticKind::BracketMismatch]);
    }
}
