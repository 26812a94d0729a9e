//! Scope classification: grammar spans to semantic tokens.

use serde::Serialize;
use tracing::warn;

use crate::grammar::{GrammarTokenizer, RawToken};
use crate::position::{utf16_len, Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Dict,
    Array,
    Tuple,
}

impl BlockKind {
    /// Name used inside grammar scopes (`meta.block.arr.thrd`).
    pub fn scope_name(self) -> &'static str {
        match self {
            BlockKind::Dict => "dict",
            BlockKind::Array => "arr",
            BlockKind::Tuple => "tuple",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Dict => "dict",
            BlockKind::Array => "array",
            BlockKind::Tuple => "tuple",
        }
    }

    pub fn open_char(self) -> char {
        match self {
            BlockKind::Dict => '{',
            BlockKind::Array => '[',
            BlockKind::Tuple => '(',
        }
    }

    pub fn close_char(self) -> char {
        match self {
            BlockKind::Dict => '}',
            BlockKind::Array => ']',
            BlockKind::Tuple => ')',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Begin,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SeparatorKind {
    List,
    KeyValue,
}

/// Literal kinds the grammar can tag directly. Strings are assembled by the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralKind {
    Int,
    Float,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TokenData {
    PropertyKey,
    EnumKey,
    PrimitiveData { literal: LiteralKind },
    StringData { escape: bool },
    StringBoundary { side: Side },
    BlockBoundary { kind: BlockKind, side: Side },
    Separator { separator: SeparatorKind },
    Ignored,
    /// `unknown` is set when no scope rule matched at all.
    Invalid { unknown: bool },
    Newline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub data: TokenData,
    pub range: Range,
    pub text: String,
    /// Number of enclosing `meta.block.` scopes.
    pub depth: usize,
}

impl Token {
    pub fn is_ignored(&self) -> bool {
        matches!(self.data, TokenData::Ignored)
    }

    /// Whitespace, as opposed to comments, among ignored tokens.
    pub fn is_whitespace(&self) -> bool {
        matches!(self.data, TokenData::Ignored) && self.text.trim().is_empty()
    }

    fn newline(line: u32, line_len: u32) -> Token {
        Token {
            data: TokenData::Newline,
            range: Range::new(Position::new(line, line_len), Position::new(line + 1, 0)),
            text: "\n".to_owned(),
            depth: 0,
        }
    }
}

// ──────────────────────────────────────────────
// Prefix matching
// ──────────────────────────────────────────────

/// Walks a scope name, consuming dotted prefixes.
struct ScopeCursor<'a> {
    rest: &'a str,
}

impl<'a> ScopeCursor<'a> {
    fn new(scope: &'a str) -> Self {
        ScopeCursor { rest: scope }
    }

    /// Consume the longest prefix from `table` matching the remaining scope.
    fn pick<T: Copy>(&mut self, table: &[(&str, T)]) -> Option<T> {
        let (prefix, value) = table
            .iter()
            .filter(|(prefix, _)| self.rest.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())?;
        self.rest = &self.rest[prefix.len()..];
        Some(*value)
    }

    fn eat(&mut self, prefix: &str) -> bool {
        match self.rest.strip_prefix(prefix) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }
}

#[derive(Clone, Copy)]
enum Head {
    EnumKey,
    PropertyKey,
    Separator,
    Block,
    StringBoundary,
    Constant,
    StringBody,
    Ignored,
    Invalid,
}

const HEADS: &[(&str, Head)] = &[
    ("support.class.enum.name.", Head::EnumKey),
    ("variable.name.", Head::PropertyKey),
    ("punctuation.separator.", Head::Separator),
    ("punctuation.block.", Head::Block),
    ("punctuation.string.", Head::StringBoundary),
    ("constant.", Head::Constant),
    ("string.", Head::StringBody),
    ("comment.", Head::Ignored),
    ("whitespace.", Head::Ignored),
    ("invalid.illegal.", Head::Invalid),
];

const SIDES: &[(&str, Side)] = &[("begin.", Side::Begin), ("end.", Side::End)];

const BLOCK_KINDS: &[(&str, BlockKind)] = &[
    ("arr.", BlockKind::Array),
    ("dict.", BlockKind::Dict),
    ("tuple.", BlockKind::Tuple),
];

const SEPARATORS: &[(&str, SeparatorKind)] = &[
    ("keyValue.", SeparatorKind::KeyValue),
    ("list.", SeparatorKind::List),
];

const LITERALS: &[(&str, LiteralKind)] = &[
    ("numeric.integer.", LiteralKind::Int),
    ("numeric.float.", LiteralKind::Float),
    ("language.boolean.", LiteralKind::Boolean),
];

fn classify_scope(scope: &str) -> Option<TokenData> {
    let mut cursor = ScopeCursor::new(scope);
    let data = match cursor.pick(HEADS)? {
        Head::EnumKey => TokenData::EnumKey,
        Head::PropertyKey => TokenData::PropertyKey,
        Head::Separator => TokenData::Separator {
            separator: cursor.pick(SEPARATORS)?,
        },
        Head::Block => {
            let side = cursor.pick(SIDES)?;
            let kind = cursor.pick(BLOCK_KINDS)?;
            TokenData::BlockBoundary { kind, side }
        }
        Head::StringBoundary => TokenData::StringBoundary {
            side: cursor.pick(SIDES)?,
        },
        Head::Constant => {
            if cursor.eat("character.escape.string.") {
                TokenData::StringData { escape: true }
            } else {
                TokenData::PrimitiveData {
                    literal: cursor.pick(LITERALS)?,
                }
            }
        }
        Head::StringBody => TokenData::StringData { escape: false },
        Head::Ignored => TokenData::Ignored,
        Head::Invalid => TokenData::Invalid { unknown: false },
    };
    Some(data)
}

/// Classify one grammar span by its innermost scope.
///
/// Never fails: unrecognised scopes degrade to `Ignored` for pure whitespace
/// and to `Invalid { unknown: true }` otherwise.
pub fn classify(scopes: &[String], text: &str) -> TokenData {
    if let Some(data) = scopes.last().and_then(|scope| classify_scope(scope)) {
        return data;
    }
    if text.trim().is_empty() {
        return TokenData::Ignored;
    }
    warn!(scope = ?scopes.last(), text, "unrecognised grammar scope");
    TokenData::Invalid { unknown: true }
}

fn block_depth(scopes: &[String]) -> usize {
    scopes.iter().filter(|s| s.starts_with("meta.block.")).count()
}

/// Split document text into lines, dropping `\r` before each `\n`.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Run the grammar over every line and classify the resulting spans.
///
/// A `Newline` token follows each line.
pub fn lex<G: GrammarTokenizer>(grammar: &G, lines: &[&str]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut state = G::State::default();

    for (line_no, line) in lines.iter().enumerate() {
        let line_no = line_no as u32;
        let (raw, next) = grammar.tokenize_line(line, &state);
        state = next;

        for RawToken { start, end, scopes } in raw {
            let (Some(before), Some(text)) = (line.get(..start), line.get(start..end)) else {
                warn!(line = line_no, start, end, "grammar span is not on a char boundary");
                continue;
            };
            let col = utf16_len(before);
            tokens.push(Token {
                data: classify(&scopes, text),
                range: Range::on_line(line_no, col, col + utf16_len(text)),
                text: text.to_owned(),
                depth: block_depth(&scopes),
            });
        }
        tokens.push(Token::newline(line_no, utf16_len(line)));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ThrdGrammar;

    fn scopes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classifies_nested_prefixes() {
        assert_eq!(
            classify(&scopes(&["source.thrd", "punctuation.block.begin.tuple.thrd"]), "("),
            TokenData::BlockBoundary {
                kind: BlockKind::Tuple,
                side: Side::Begin
            }
        );
        assert_eq!(
            classify(&scopes(&["punctuation.separator.keyValue.thrd"]), ":"),
            TokenData::Separator {
                separator: SeparatorKind::KeyValue
            }
        );
        assert_eq!(
            classify(&scopes(&["string.quoted.double.thrd", "constant.character.escape.string.thrd"]), "\\n"),
            TokenData::StringData { escape: true }
        );
        assert_eq!(
            classify(&scopes(&["constant.numeric.float.thrd"]), "1.5"),
            TokenData::PrimitiveData {
                literal: LiteralKind::Float
            }
        );
    }

    #[test]
    fn unknown_scopes_degrade() {
        assert_eq!(classify(&scopes(&["markup.bold"]), "  "), TokenData::Ignored);
        assert_eq!(
            classify(&scopes(&["markup.bold"]), "x"),
            TokenData::Invalid { unknown: true }
        );
        assert_eq!(
            classify(&scopes(&["punctuation.block.sideways.dict.thrd"]), "{"),
            TokenData::Invalid { unknown: true }
        );
        assert_eq!(
            classify(&scopes(&["invalid.illegal.thrd"]), "?"),
            TokenData::Invalid { unknown: false }
        );
    }

    #[test]
    fn lex_appends_newline_per_line() {
        let tokens = lex(&ThrdGrammar, &split_lines("[1,\r\n 2]"));
        let newlines: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.data == TokenData::Newline)
            .collect();
        assert_eq!(newlines.len(), 2);
        assert_eq!(newlines[0].range.start, Position::new(0, 3));
        assert_eq!(newlines[0].range.end, Position::new(1, 0));
    }

    #[test]
    fn lex_reports_utf16_columns_and_depth() {
        let tokens = lex(&ThrdGrammar, &split_lines("[\"\u{1F600}\", 1]"));
        let one = tokens
            .iter()
            .find(|t| t.text == "1")
            .expect("integer token");
        assert_eq!(one.range, Range::on_line(0, 7, 8));
        assert_eq!(one.depth, 1);
    }
}
