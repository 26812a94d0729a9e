//! Positioned data tree and its position-free `Value` form.

use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use serde::Serialize;

use crate::position::{Range, TokenRange};
use crate::token::BlockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Int,
    Float,
    Boolean,
    String,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::String => "string",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl Scalar {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Scalar::Int(_) => PrimitiveKind::Int,
            Scalar::Float(_) => PrimitiveKind::Float,
            Scalar::Boolean(_) => PrimitiveKind::Boolean,
            Scalar::String(_) => PrimitiveKind::String,
        }
    }
}

// ──────────────────────────────────────────────
// Positioned tree
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub kind: DataKind,
    pub range: Range,
    pub token_range: TokenRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataKind {
    Primitive(Scalar),
    Block(BlockData),
    Enum(EnumData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockData {
    pub contents: BlockContents,
    /// From the opening bracket through the closing one.
    pub range: Range,
    pub token_range: TokenRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockContents {
    Dict {
        contents: IndexMap<String, Data>,
        /// Every key written in the block, first occurrence wins. A superset of `contents`' keys.
        key_ranges: IndexMap<String, Range>,
    },
    Array(Vec<Data>),
    Tuple(Vec<Data>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumData {
    pub tag: String,
    pub tag_range: Range,
    pub payload: Option<BlockData>,
}

/// How a child is reached from its parent block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    ArrayElement(usize),
    TupleElement(usize),
    Tag(String),
}

impl BlockContents {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContents::Dict { .. } => BlockKind::Dict,
            BlockContents::Array(_) => BlockKind::Array,
            BlockContents::Tuple(_) => BlockKind::Tuple,
        }
    }

    pub fn children(&self) -> Box<dyn Iterator<Item = &Data> + '_> {
        match self {
            BlockContents::Dict { contents, .. } => Box::new(contents.values()),
            BlockContents::Array(items) | BlockContents::Tuple(items) => Box::new(items.iter()),
        }
    }

    pub fn children_with_steps(&self) -> Vec<(PathStep, &Data)> {
        match self {
            BlockContents::Dict { contents, .. } => contents
                .iter()
                .map(|(k, v)| (PathStep::Key(k.clone()), v))
                .collect(),
            BlockContents::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (PathStep::ArrayElement(i), v))
                .collect(),
            BlockContents::Tuple(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (PathStep::TupleElement(i), v))
                .collect(),
        }
    }
}

impl Data {
    /// Short description used in mismatch messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            DataKind::Primitive(s) => s.kind().name().to_owned(),
            DataKind::Block(b) => b.contents.kind().name().to_owned(),
            DataKind::Enum(e) => format!("enum value #{}", e.tag),
        }
    }

    /// Drop all position information.
    pub fn strip(&self) -> Value {
        match &self.kind {
            DataKind::Primitive(s) => match s {
                Scalar::Int(v) => Value::Int(*v),
                Scalar::Float(v) => Value::Float(*v),
                Scalar::Boolean(v) => Value::Boolean(*v),
                Scalar::String(v) => Value::String(v.clone()),
            },
            DataKind::Block(b) => b.strip(),
            DataKind::Enum(e) => Value::Enum {
                tag: e.tag.clone(),
                payload: e.payload.as_ref().map(|p| Box::new(p.strip())),
            },
        }
    }
}

impl BlockData {
    pub fn strip(&self) -> Value {
        match &self.contents {
            BlockContents::Dict { contents, .. } => Value::Dict(
                contents
                    .iter()
                    .map(|(k, v)| (k.clone(), v.strip()))
                    .collect(),
            ),
            BlockContents::Array(items) => Value::Array(items.iter().map(Data::strip).collect()),
            BlockContents::Tuple(items) => Value::Tuple(items.iter().map(Data::strip).collect()),
        }
    }
}

// ──────────────────────────────────────────────
// Position-free values
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Dict(IndexMap<String, Value>),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    Enum {
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Box<Value>>,
    },
}

impl Value {
    /// Canonical single-line source text that parses back to the same value.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    fn write_source(&self, out: &mut String) {
        match self {
            Value::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Value::Float(v) => out.push_str(&format_float(*v)),
            Value::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
            Value::String(s) => write_string(s, out),
            Value::Dict(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    value.write_source(out);
                }
                out.push('}');
            }
            Value::Array(items) => write_items('[', ']', items, out),
            Value::Tuple(items) => write_items('(', ')', items, out),
            Value::Enum { tag, payload } => {
                out.push('#');
                out.push_str(tag);
                if let Some(payload) = payload {
                    payload.write_source(out);
                }
            }
        }
    }
}

fn write_items(open: char, close: char, items: &[Value], out: &mut String) {
    out.push(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_source(out);
    }
    out.push(close);
}

/// Shortest round-tripping text that still lexes as a float.
fn format_float(v: f64) -> String {
    let text = format!("{v:?}");
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_source_for_nested_values() {
        let mut dict = IndexMap::new();
        dict.insert("a".to_owned(), Value::Int(-3));
        dict.insert(
            "b".to_owned(),
            Value::Array(vec![Value::Float(1.0), Value::Boolean(false)]),
        );
        dict.insert(
            "c".to_owned(),
            Value::Enum {
                tag: "Some".to_owned(),
                payload: Some(Box::new(Value::Tuple(vec![Value::String("x\"y".into())]))),
            },
        );
        dict.insert(
            "d".to_owned(),
            Value::Enum {
                tag: "None".to_owned(),
                payload: None,
            },
        );
        assert_eq!(
            Value::Dict(dict).to_source(),
            r#"{a: -3, b: [1.0, false], c: #Some("x\"y"), d: #None}"#
        );
    }

    #[test]
    fn floats_always_look_like_floats() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.25), "0.25");
        assert!(format_float(1e300).contains('e'));
    }

    #[test]
    fn control_characters_are_escaped() {
        let mut out = String::new();
        write_string("a\u{1}\tb", &mut out);
        assert_eq!(out, "\"a\\u0001\\tb\"");
    }

    #[test]
    fn value_serializes_as_tagged_json() {
        let v = Value::Enum {
            tag: "Leaf".into(),
            payload: Some(Box::new(Value::Array(vec![Value::Int(1)]))),
        };
        let json = serde_json::to_value(&v).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"enum": {"tag": "Leaf", "payload": {"array": [{"int": 1}]}}})
        );
    }
}
