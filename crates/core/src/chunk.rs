//! Bracket-aware grouping of tokens into a chunk tree.
//!
//! The chunker keeps an explicit stack of open block frames. Bracket
//! mismatches are recovered by popping every frame the closing bracket
//! skipped over; strings are assembled and unescaped here.

use std::fmt;

use crate::data::Scalar;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticTracker};
use crate::position::{Position, Range, TokenRange};
use crate::token::{BlockKind, LiteralKind, SeparatorKind, Side, Token, TokenData};

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub range: Range,
    pub token_range: TokenRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkKind {
    Block(BlockChunk),
    Enum {
        tag: String,
        tag_range: Range,
        block: Option<BlockChunk>,
    },
    /// A property key together with its `:`.
    Key { name: String, name_range: Range },
    Value(Scalar),
    /// A comma, or a newline standing in for one (`weak`).
    Separator { weak: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockChunk {
    pub kind: BlockKind,
    pub children: Vec<Chunk>,
    pub range: Range,
    pub token_range: TokenRange,
}

/// Output of [`chunk`]: the top-level chunk sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkTree {
    pub chunks: Vec<Chunk>,
}

impl ChunkTree {
    /// Every chunk in the tree, parents before children.
    pub fn all_chunks(&self) -> Vec<&Chunk> {
        fn walk<'a>(chunks: &'a [Chunk], out: &mut Vec<&'a Chunk>) {
            for chunk in chunks {
                out.push(chunk);
                match &chunk.kind {
                    ChunkKind::Block(block)
                    | ChunkKind::Enum {
                        block: Some(block), ..
                    } => walk(&block.children, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.chunks, &mut out);
        out
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Range { start, end } = self.range;
        write!(
            f,
            "{}:{}-{}:{} ",
            start.line, start.character, end.line, end.character
        )?;
        match &self.kind {
            ChunkKind::Block(block) => write!(
                f,
                "block [{}] - {} children",
                block.kind.name(),
                block.children.len()
            ),
            ChunkKind::Enum { tag, block, .. } => match block {
                Some(block) => write!(f, "enum {tag}<{}>", block.kind.name()),
                None => write!(f, "enum {tag}<unit>"),
            },
            ChunkKind::Key { name, .. } => write!(f, "key {name:?}"),
            ChunkKind::Value(scalar) => match scalar {
                Scalar::Int(v) => write!(f, "value (int) {v}"),
                Scalar::Float(v) => write!(f, "value (float) {v:?}"),
                Scalar::Boolean(v) => write!(f, "value (boolean) {v}"),
                Scalar::String(v) => write!(f, "value (string) {v:?}"),
            },
            ChunkKind::Separator { weak: true } => f.write_str("separator (weak)"),
            ChunkKind::Separator { weak: false } => f.write_str("separator"),
        }
    }
}

// ──────────────────────────────────────────────
// Chunker
// ──────────────────────────────────────────────

struct PendingTag {
    name: String,
    range: Range,
    index: usize,
}

struct Frame {
    /// `None` for the global frame.
    kind: Option<BlockKind>,
    open_index: usize,
    tag: Option<PendingTag>,
    children: Vec<Chunk>,
}

struct Chunker<'a> {
    tokens: &'a [Token],
    pos: usize,
    stack: Vec<Frame>,
    pending_tag: Option<PendingTag>,
    can_insert_weak: bool,
    diagnostics: &'a mut DiagnosticTracker,
}

/// Group `tokens` into chunks, reporting structural problems to `diagnostics`.
pub fn chunk(tokens: &[Token], diagnostics: &mut DiagnosticTracker) -> ChunkTree {
    let mut chunker = Chunker {
        tokens,
        pos: 0,
        stack: vec![Frame {
            kind: None,
            open_index: 0,
            tag: None,
            children: Vec::new(),
        }],
        pending_tag: None,
        can_insert_weak: false,
        diagnostics,
    };
    chunker.run();
    chunker.finish()
}

impl<'a> Chunker<'a> {
    fn next(&mut self) -> Option<usize> {
        if self.pos < self.tokens.len() {
            self.pos += 1;
            Some(self.pos - 1)
        } else {
            None
        }
    }

    fn push(&mut self, chunk: Chunk) {
        // The global frame is only popped in `finish`.
        if let Some(top) = self.stack.last_mut() {
            top.children.push(chunk);
        }
    }

    fn end_of_input(&self) -> Position {
        match self.tokens.last() {
            Some(t) if t.data == TokenData::Newline => t.range.start,
            Some(t) => t.range.end,
            None => Position::default(),
        }
    }

    fn invalid(&mut self, token: &Token) {
        let message = match token.data {
            TokenData::Invalid { unknown: true } => "Unrecognised token",
            _ => "Invalid token",
        };
        self.diagnostics.add(Diagnostic::error(
            DiagnosticKind::InvalidToken,
            token.range,
            message,
        ));
    }

    fn flush_unit_tag(&mut self) {
        if let Some(tag) = self.pending_tag.take() {
            self.push(Chunk {
                kind: ChunkKind::Enum {
                    tag: tag.name,
                    tag_range: tag.range,
                    block: None,
                },
                range: tag.range,
                token_range: TokenRange::single(tag.index),
            });
            self.can_insert_weak = true;
        }
    }

    fn run(&mut self) {
        let tokens = self.tokens;
        while let Some(i) = self.next() {
            let token = &tokens[i];

            if self.pending_tag.is_some() {
                let keeps_tag = matches!(
                    token.data,
                    TokenData::Ignored
                        | TokenData::Invalid { .. }
                        | TokenData::BlockBoundary {
                            side: Side::Begin,
                            ..
                        }
                );
                if !keeps_tag {
                    self.flush_unit_tag();
                }
            }

            match token.data {
                TokenData::Ignored => {}
                TokenData::Invalid { .. } => self.invalid(token),
                TokenData::Newline => {
                    if self.can_insert_weak {
                        self.push(Chunk {
                            kind: ChunkKind::Separator { weak: true },
                            range: token.range,
                            token_range: TokenRange::single(i),
                        });
                        self.can_insert_weak = false;
                    }
                }
                TokenData::Separator {
                    separator: SeparatorKind::List,
                } => {
                    self.push(Chunk {
                        kind: ChunkKind::Separator { weak: false },
                        range: token.range,
                        token_range: TokenRange::single(i),
                    });
                    self.can_insert_weak = true;
                }
                // A `:` is always absorbed by the preceding key.
                TokenData::Separator {
                    separator: SeparatorKind::KeyValue,
                } => self.invalid(token),
                TokenData::PrimitiveData { literal } => {
                    let scalar = self.literal(token, literal);
                    self.push(Chunk {
                        kind: ChunkKind::Value(scalar),
                        range: token.range,
                        token_range: TokenRange::single(i),
                    });
                    self.can_insert_weak = true;
                }
                TokenData::PropertyKey => self.key(i),
                TokenData::StringBoundary { side: Side::Begin } => self.string(i),
                TokenData::StringBoundary { side: Side::End } | TokenData::StringData { .. } => {
                    self.invalid(token)
                }
                TokenData::EnumKey => {
                    self.pending_tag = Some(PendingTag {
                        name: token.text.trim_start_matches('#').to_owned(),
                        range: token.range,
                        index: i,
                    });
                    self.can_insert_weak = false;
                }
                TokenData::BlockBoundary {
                    kind,
                    side: Side::Begin,
                } => {
                    let tag = self.pending_tag.take();
                    self.stack.push(Frame {
                        kind: Some(kind),
                        open_index: i,
                        tag,
                        children: Vec::new(),
                    });
                    self.can_insert_weak = false;
                }
                TokenData::BlockBoundary {
                    kind,
                    side: Side::End,
                } => self.close(i, kind),
            }
        }
    }

    fn literal(&mut self, token: &Token, literal: LiteralKind) -> Scalar {
        let digits: String = token.text.chars().filter(|c| *c != '_').collect();
        match literal {
            LiteralKind::Boolean => Scalar::Boolean(token.text == "true"),
            LiteralKind::Int => match digits.parse::<i64>() {
                Ok(v) => Scalar::Int(v),
                Err(_) => {
                    self.diagnostics.add(Diagnostic::error(
                        DiagnosticKind::NumberOutOfRange,
                        token.range,
                        "Integer literal out of range.",
                    ));
                    Scalar::Int(if digits.starts_with('-') {
                        i64::MIN
                    } else {
                        i64::MAX
                    })
                }
            },
            LiteralKind::Float => match digits.parse::<f64>() {
                Ok(v) if v.is_finite() => Scalar::Float(v),
                _ => {
                    self.diagnostics.add(Diagnostic::error(
                        DiagnosticKind::NumberOutOfRange,
                        token.range,
                        "Float literal out of range.",
                    ));
                    Scalar::Float(if digits.starts_with('-') {
                        f64::MIN
                    } else {
                        f64::MAX
                    })
                }
            },
        }
    }

    fn key(&mut self, i: usize) {
        let tokens = self.tokens;
        let token = &tokens[i];
        let mut range = token.range;
        let mut end = i;

        let separator = (i + 1..tokens.len())
            .find(|&j| !tokens[j].is_ignored())
            .filter(|&j| {
                tokens[j].data
                    == TokenData::Separator {
                        separator: SeparatorKind::KeyValue,
                    }
            });
        if let Some(j) = separator {
            range = range.combine(tokens[j].range);
            end = j;
            self.pos = j + 1;
        }

        self.push(Chunk {
            kind: ChunkKind::Key {
                name: token.text.clone(),
                name_range: token.range,
            },
            range,
            token_range: TokenRange::new(i, end + 1),
        });
        self.can_insert_weak = false;
    }

    fn string(&mut self, begin: usize) {
        let tokens = self.tokens;
        let mut text = String::new();
        let mut range = tokens[begin].range;
        let mut last = begin;

        loop {
            let Some(j) = self.next() else {
                self.diagnostics.add(
                    Diagnostic::error(
                        DiagnosticKind::UnexpectedEndOfInput,
                        Range::at(self.end_of_input()),
                        "Unexpected end of input",
                    )
                    .fatal(),
                );
                return;
            };
            let token = &tokens[j];
            match token.data {
                TokenData::StringData { escape: false } => text.push_str(&token.text),
                TokenData::StringData { escape: true } => match decode_escape(&token.text) {
                    Some(c) => text.push(c),
                    None => {
                        self.invalid(token);
                        text.push_str(&token.text);
                    }
                },
                TokenData::Newline => text.push('\n'),
                TokenData::Invalid { .. } => {
                    self.invalid(token);
                    text.push_str(&token.text);
                }
                TokenData::StringBoundary { side: Side::End } => {
                    range = range.combine(token.range);
                    last = j;
                    break;
                }
                _ => {
                    // Hand the unrelated token back to the main loop.
                    self.pos = j;
                    self.diagnostics.add(Diagnostic::error(
                        DiagnosticKind::UnterminatedString,
                        range,
                        "Unterminated string.",
                    ));
                    break;
                }
            }
            range = range.combine(token.range);
            last = j;
        }

        self.push(Chunk {
            kind: ChunkKind::Value(Scalar::String(text)),
            range,
            token_range: TokenRange::new(begin, last + 1),
        });
        self.can_insert_weak = true;
    }

    fn close(&mut self, i: usize, kind: BlockKind) {
        let tokens = self.tokens;
        let token = &tokens[i];
        let open_frames = self.stack.len() - 1;
        let Some(top) = self.stack.last() else {
            return;
        };
        let Some(top_kind) = top.kind else {
            // Nothing is open; the grammar should have marked this closer invalid.
            self.invalid(token);
            return;
        };

        let mut frames_to_pop = 1;
        if top_kind != kind {
            let open = &tokens[top.open_index];
            let skipped = open.depth.saturating_sub(token.depth);
            frames_to_pop = (1 + skipped).min(open_frames);

            let message = format!("Brackets mismatched! {} ... {}", open.text, token.text);
            self.diagnostics.add(
                Diagnostic::error(DiagnosticKind::BracketMismatch, token.range, message.clone())
                    .with_related(open.range, message)
                    .fatal(),
            );
        }

        for _ in 0..frames_to_pop {
            self.pop_frame(i);
        }
        self.can_insert_weak = true;
    }

    /// Close the top frame at token `close_index` and attach it to its parent.
    fn pop_frame(&mut self, close_index: usize) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let Some(kind) = frame.kind else {
            return;
        };
        let close_range = self.tokens[close_index].range;
        let block = BlockChunk {
            kind,
            children: frame.children,
            range: self.tokens[frame.open_index].range.combine(close_range),
            token_range: TokenRange::new(frame.open_index, close_index + 1),
        };
        let chunk = match frame.tag {
            Some(tag) => Chunk {
                range: tag.range.combine(block.range),
                token_range: TokenRange::new(tag.index, close_index + 1),
                kind: ChunkKind::Enum {
                    tag: tag.name,
                    tag_range: tag.range,
                    block: Some(block),
                },
            },
            None => Chunk {
                range: block.range,
                token_range: block.token_range,
                kind: ChunkKind::Block(block),
            },
        };
        self.push(chunk);
    }

    fn finish(mut self) -> ChunkTree {
        self.flush_unit_tag();
        if self.stack.len() > 1 {
            self.diagnostics.add(
                Diagnostic::error(
                    DiagnosticKind::UnexpectedEndOfInput,
                    Range::at(self.end_of_input()),
                    "Unexpected end of input",
                )
                .fatal(),
            );
            let last = self.tokens.len().saturating_sub(1);
            while self.stack.len() > 1 {
                self.pop_frame(last);
            }
        }
        let chunks = self
            .stack
            .pop()
            .map(|global| global.children)
            .unwrap_or_default();
        ChunkTree { chunks }
    }
}

/// Decode one escape sequence such as `\n`, `\x41` or `é`.
pub fn decode_escape(text: &str) -> Option<char> {
    let body = text.strip_prefix('\\')?;
    match body.chars().next()? {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        'x' => hex_char(body.get(1..3)?),
        'u' => hex_char(body.get(1..5)?),
        _ => None,
    }
}

fn hex_char(hex: &str) -> Option<char> {
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}
