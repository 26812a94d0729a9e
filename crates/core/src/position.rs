//! Editor coordinates: zero-based lines, UTF-16 code-unit columns.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

/// A half-open span `[start, end)` in editor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// Zero-width range at `pos`.
    pub const fn at(pos: Position) -> Self {
        Range {
            start: pos,
            end: pos,
        }
    }

    /// Single-line range from column `start` to column `end`.
    pub const fn on_line(line: u32, start: u32, end: u32) -> Self {
        Range {
            start: Position::new(line, start),
            end: Position::new(line, end),
        }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn combine(self, other: Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether `pos` lies in `[start, end)`.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Shrink the range by `start_by` columns at the front and `end_by` at the back.
    pub fn contract(self, start_by: u32, end_by: u32) -> Range {
        Range {
            start: Position::new(self.start.line, self.start.character + start_by),
            end: Position::new(
                self.end.line,
                self.end.character.saturating_sub(end_by),
            ),
        }
    }

    pub fn is_multiline(&self) -> bool {
        self.start.line != self.end.line
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Index span `[start, end)` into the flat token stream of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

impl TokenRange {
    pub const fn new(start: usize, end: usize) -> Self {
        TokenRange { start, end }
    }

    pub const fn single(index: usize) -> Self {
        TokenRange {
            start: index,
            end: index + 1,
        }
    }

    pub fn combine(self, other: TokenRange) -> TokenRange {
        TokenRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

/// Convert a UTF-16 column on `line` into a byte offset, clamped to the line.
pub fn byte_offset(line: &str, character: u32) -> usize {
    let mut units = 0u32;
    for (offset, c) in line.char_indices() {
        if units >= character {
            return offset;
        }
        units += c.len_utf16() as u32;
    }
    line.len()
}
