//! Line-oriented grammar service producing TextMate-style scope stacks.
//!
//! The analysis pipeline only depends on the [`GrammarTokenizer`] trait:
//! one line of text plus the state carried over from the previous line in,
//! scope-annotated spans plus the next state out. [`ThrdGrammar`] is the
//! built-in implementation for the THRD data language.

use crate::token::BlockKind;

/// One span of a tokenized line. Offsets are byte offsets into the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub start: usize,
    pub end: usize,
    /// Scope names, outermost first. The last entry is the innermost scope.
    pub scopes: Vec<String>,
}

/// A grammar engine that tokenizes text one line at a time.
pub trait GrammarTokenizer {
    /// Parser state carried from the end of one line to the start of the next.
    type State: Clone + Default;

    fn tokenize_line(&self, line: &str, state: &Self::State) -> (Vec<RawToken>, Self::State);
}

// ──────────────────────────────────────────────
// Built-in grammar
// ──────────────────────────────────────────────

const ROOT_SCOPE: &str = "source.thrd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Normal,
    InString,
    InBlockComment,
}

/// State carried between lines: open blocks and any unterminated string or comment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineState {
    blocks: Vec<BlockKind>,
    mode: Mode,
}

impl LineState {
    /// Number of blocks still open at the end of the line.
    pub fn depth(&self) -> usize {
        self.blocks.len()
    }
}

/// Hand-written grammar for THRD documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrdGrammar;

impl GrammarTokenizer for ThrdGrammar {
    type State = LineState;

    fn tokenize_line(&self, line: &str, state: &LineState) -> (Vec<RawToken>, LineState) {
        let mut scanner = LineScanner {
            line,
            pos: 0,
            blocks: state.blocks.clone(),
            tokens: Vec::new(),
            after_key: false,
        };
        let mut mode = state.mode;

        while scanner.pos < line.len() {
            mode = match mode {
                Mode::Normal => scanner.normal(),
                Mode::InString => scanner.string_body(),
                Mode::InBlockComment => scanner.block_comment_body(),
            };
        }

        (
            scanner.tokens,
            LineState {
                blocks: scanner.blocks,
                mode,
            },
        )
    }
}

struct LineScanner<'a> {
    line: &'a str,
    pos: usize,
    blocks: Vec<BlockKind>,
    tokens: Vec<RawToken>,
    after_key: bool,
}

impl<'a> LineScanner<'a> {
    fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn base_scopes(&self, blocks: &[BlockKind]) -> Vec<String> {
        let mut scopes = Vec::with_capacity(blocks.len() + 2);
        scopes.push(ROOT_SCOPE.to_owned());
        scopes.extend(
            blocks
                .iter()
                .map(|kind| format!("meta.block.{}.thrd", kind.scope_name())),
        );
        scopes
    }

    fn emit(&mut self, len: usize, scope: &str) {
        let mut scopes = self.base_scopes(&self.blocks);
        scopes.push(scope.to_owned());
        self.emit_scoped(len, scopes);
    }

    fn emit_in_string(&mut self, len: usize, scope: &str) {
        let mut scopes = self.base_scopes(&self.blocks);
        scopes.push("string.quoted.double.thrd".to_owned());
        if scope != "string.quoted.double.thrd" {
            scopes.push(scope.to_owned());
        }
        self.emit_scoped(len, scopes);
    }

    fn emit_scoped(&mut self, len: usize, scopes: Vec<String>) {
        let start = self.pos;
        self.pos += len;
        self.tokens.push(RawToken {
            start,
            end: self.pos,
            scopes,
        });
    }

    /// Scan one token in normal mode and return the mode to continue in.
    fn normal(&mut self) -> Mode {
        let rest = self.rest();
        let Some(c) = self.peek() else {
            return Mode::Normal;
        };

        if c.is_whitespace() {
            let len = rest
                .find(|ch: char| !ch.is_whitespace())
                .unwrap_or(rest.len());
            self.emit(len, "whitespace.thrd");
            return Mode::Normal;
        }
        let was_after_key = std::mem::take(&mut self.after_key);

        if rest.starts_with("//") {
            self.emit(rest.len(), "comment.line.double-slash.thrd");
            return Mode::Normal;
        }
        if rest.starts_with("/*") {
            return match rest[2..].find("*/") {
                Some(end) => {
                    self.emit(end + 4, "comment.block.thrd");
                    Mode::Normal
                }
                None => {
                    self.emit(rest.len(), "comment.block.thrd");
                    Mode::InBlockComment
                }
            };
        }

        match c {
            '"' => {
                self.emit_in_string(1, "punctuation.string.begin.thrd");
                Mode::InString
            }
            '{' | '[' | '(' => {
                let kind = match c {
                    '{' => BlockKind::Dict,
                    '[' => BlockKind::Array,
                    _ => BlockKind::Tuple,
                };
                self.blocks.push(kind);
                self.emit(1, &format!("punctuation.block.begin.{}.thrd", kind.scope_name()));
                Mode::Normal
            }
            '}' | ']' | ')' => {
                let kind = match c {
                    '}' => BlockKind::Dict,
                    ']' => BlockKind::Array,
                    _ => BlockKind::Tuple,
                };
                match self.blocks.iter().rposition(|open| *open == kind) {
                    Some(index) => {
                        // Closing an outer block implicitly ends every block opened inside it.
                        let mut scopes = self.base_scopes(&self.blocks[..=index]);
                        scopes.push(format!("punctuation.block.end.{}.thrd", kind.scope_name()));
                        self.blocks.truncate(index);
                        self.emit_scoped(1, scopes);
                    }
                    None => self.emit(1, "invalid.illegal.thrd"),
                }
                Mode::Normal
            }
            ',' => {
                self.emit(1, "punctuation.separator.list.thrd");
                Mode::Normal
            }
            ':' if was_after_key => {
                self.emit(1, "punctuation.separator.keyValue.thrd");
                Mode::Normal
            }
            '#' => {
                let len = 1 + ident_len(&rest[1..]);
                if len > 1 {
                    self.emit(len, "support.class.enum.name.thrd");
                } else {
                    self.emit(1, "invalid.illegal.thrd");
                }
                Mode::Normal
            }
            c if c.is_ascii_digit() || (c == '-' && starts_with_digit(&rest[1..])) => {
                let (len, is_float) = number_len(rest);
                if is_float {
                    self.emit(len, "constant.numeric.float.thrd");
                } else {
                    self.emit(len, "constant.numeric.integer.thrd");
                }
                Mode::Normal
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = ident_len(rest);
                let word = &rest[..len];
                if rest[len..].trim_start_matches([' ', '\t']).starts_with(':') {
                    self.emit(len, "variable.name.thrd");
                    self.after_key = true;
                } else if word == "true" || word == "false" {
                    self.emit(len, "constant.language.boolean.thrd");
                } else {
                    self.emit(len, "invalid.illegal.thrd");
                }
                Mode::Normal
            }
            other => {
                self.emit(other.len_utf8(), "invalid.illegal.thrd");
                Mode::Normal
            }
        }
    }

    /// Scan string content until the closing quote or the end of the line.
    fn string_body(&mut self) -> Mode {
        let rest = self.rest();
        match self.peek() {
            Some('"') => {
                self.emit_in_string(1, "punctuation.string.end.thrd");
                Mode::Normal
            }
            Some('\\') => {
                match escape_len(rest) {
                    Some(len) => self.emit_in_string(len, "constant.character.escape.string.thrd"),
                    None => {
                        let len = rest[1..].chars().next().map_or(1, |c| 1 + c.len_utf8());
                        self.emit_in_string(len, "invalid.illegal.escape.thrd");
                    }
                }
                Mode::InString
            }
            Some(_) => {
                let len = rest.find(['"', '\\']).unwrap_or(rest.len());
                self.emit_in_string(len, "string.quoted.double.thrd");
                Mode::InString
            }
            None => Mode::InString,
        }
    }

    fn block_comment_body(&mut self) -> Mode {
        let rest = self.rest();
        match rest.find("*/") {
            Some(end) => {
                self.emit(end + 2, "comment.block.thrd");
                Mode::Normal
            }
            None => {
                self.emit(rest.len(), "comment.block.thrd");
                Mode::InBlockComment
            }
        }
    }
}

fn ident_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len())
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn digits_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut len = 0;
    while len < bytes.len() {
        let b = bytes[len];
        if b.is_ascii_digit() || (b == b'_' && len + 1 < bytes.len() && bytes[len + 1].is_ascii_digit()) {
            len += 1;
        } else {
            break;
        }
    }
    len
}

/// Length of the numeric literal at the start of `s`, and whether it is a float.
fn number_len(s: &str) -> (usize, bool) {
    let mut len = usize::from(s.starts_with('-'));
    len += digits_len(&s[len..]);
    let mut is_float = false;

    if s[len..].starts_with('.') && starts_with_digit(&s[len + 1..]) {
        len += 1 + digits_len(&s[len + 1..]);
        is_float = true;
    }
    if s[len..].starts_with(['e', 'E']) {
        let mut exp = len + 1;
        if s[exp..].starts_with(['+', '-']) {
            exp += 1;
        }
        if starts_with_digit(&s[exp..]) {
            len = exp + digits_len(&s[exp..]);
            is_float = true;
        }
    }
    (len, is_float)
}

/// Length of a valid escape sequence at the start of `s`, which begins with `\`.
fn escape_len(s: &str) -> Option<usize> {
    let mut chars = s[1..].chars();
    match chars.next()? {
        'n' | 'r' | 't' | '\\' | '"' => Some(2),
        'x' => hex_run(&s[2..], 2).then_some(4),
        'u' => hex_run(&s[2..], 4).then_some(6),
        _ => None,
    }
}

fn hex_run(s: &str, n: usize) -> bool {
    s.len() >= n && s.as_bytes()[..n].iter().all(u8::is_ascii_hexdigit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn innermost(line: &str) -> Vec<(String, String)> {
        let (tokens, _) = ThrdGrammar.tokenize_line(line, &LineState::default());
        tokens
            .into_iter()
            .map(|t| {
                (
                    line[t.start..t.end].to_owned(),
                    t.scopes.last().cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    #[test]
    fn tokens_cover_the_whole_line() {
        let line = r#"{ key: [1, 2.5e3, "a\n"], tag: #Some(true) } // done"#;
        let (tokens, state) = ThrdGrammar.tokenize_line(line, &LineState::default());
        assert_eq!(tokens.first().map(|t| t.start), Some(0));
        assert_eq!(tokens.last().map(|t| t.end), Some(line.len()));
        for pair in tokens.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap between tokens");
        }
        assert_eq!(state, LineState::default());
    }

    #[test]
    fn key_requires_following_colon() {
        let toks = innermost("value: true");
        assert_eq!(toks[0], ("value".into(), "variable.name.thrd".into()));
        assert_eq!(toks[1], (":".into(), "punctuation.separator.keyValue.thrd".into()));
        assert_eq!(toks[3], ("true".into(), "constant.language.boolean.thrd".into()));

        let toks = innermost("value");
        assert_eq!(toks[0].1, "invalid.illegal.thrd");
    }

    #[test]
    fn numbers_distinguish_int_and_float() {
        let toks = innermost("-1_000 2.5 3e2 4.");
        let scopes: Vec<&str> = toks
            .iter()
            .filter(|(_, s)| !s.starts_with("whitespace"))
            .map(|(_, s)| s.as_str())
            .collect();
        assert_eq!(
            scopes,
            vec![
                "constant.numeric.integer.thrd",
                "constant.numeric.float.thrd",
                "constant.numeric.float.thrd",
                "constant.numeric.integer.thrd",
                "invalid.illegal.thrd",
            ]
        );
    }

    #[test]
    fn closer_matching_outer_block_closes_inner_ones() {
        let (tokens, state) = ThrdGrammar.tokenize_line("[ (1, 2 ]", &LineState::default());
        let depth = |t: &RawToken| t.scopes.iter().filter(|s| s.starts_with("meta.block.")).count();
        let open_tuple = &tokens[2];
        let close = tokens.last().expect("tokens");
        assert_eq!(depth(open_tuple), 2);
        assert_eq!(depth(close), 1);
        assert_eq!(
            close.scopes.last().map(String::as_str),
            Some("punctuation.block.end.arr.thrd")
        );
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn unmatched_closer_is_invalid() {
        let toks = innermost("1 }");
        assert_eq!(toks[2], ("}".into(), "invalid.illegal.thrd".into()));
    }

    #[test]
    fn strings_and_comments_span_lines() {
        let (first, state) = ThrdGrammar.tokenize_line(r#"["abc"#, &LineState::default());
        assert_eq!(
            first.last().and_then(|t| t.scopes.last()).map(String::as_str),
            Some("string.quoted.double.thrd")
        );
        let (second, state) = ThrdGrammar.tokenize_line(r#"def" /* x"#, &state);
        assert_eq!(
            second[1].scopes.last().map(String::as_str),
            Some("punctuation.string.end.thrd")
        );
        let (third, state) = ThrdGrammar.tokenize_line("y */]", &state);
        assert_eq!(third[0].scopes.last().map(String::as_str), Some("comment.block.thrd"));
        assert_eq!(state, LineState::default());
    }

    #[test]
    fn escapes_are_scoped_inside_strings() {
        let toks = innermost(r#""a\x41\q""#);
        let scopes: Vec<&str> = toks.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(
            scopes,
            vec![
                "punctuation.string.begin.thrd",
                "string.quoted.double.thrd",
                "constant.character.escape.string.thrd",
                "invalid.illegal.escape.thrd",
                "punctuation.string.end.thrd",
            ]
        );
    }
}
