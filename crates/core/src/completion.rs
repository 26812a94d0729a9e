//! Completion candidates directed by the expected type at the cursor.

use serde::Serialize;

use crate::data::{BlockContents, BlockData, Data, PrimitiveKind};
use crate::position::Position;
use crate::token::BlockKind;
use crate::trace::{block_trace, trace_inside_block, BlockTrace, InsideBlock};
use crate::typespec::{BlockSpec, TypeResolver, TypeSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionKind {
    Property,
    Snippet,
    Keyword,
    EnumMember,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCandidate {
    pub label: String,
    /// Text to insert when it differs from the label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
    /// `insert_text` uses `$1`/`$0` tab stops.
    pub snippet: bool,
    pub kind: CompletionKind,
}

impl CompletionCandidate {
    fn keyword(label: &str) -> Self {
        CompletionCandidate {
            label: label.to_owned(),
            insert_text: None,
            snippet: false,
            kind: CompletionKind::Keyword,
        }
    }

    fn snippet(label: impl Into<String>, insert: impl Into<String>, kind: CompletionKind) -> Self {
        CompletionCandidate {
            label: label.into(),
            insert_text: Some(insert.into()),
            snippet: true,
            kind,
        }
    }
}

fn block_snippet(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Dict => "{$1}$0",
        BlockKind::Array => "[$1]$0",
        BlockKind::Tuple => "($1)$0",
    }
}

fn block_label(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Dict => "{ ... }",
        BlockKind::Array => "[ ... ]",
        BlockKind::Tuple => "( ... )",
    }
}

/// Candidates at `pos` in a document of type `spec`.
///
/// `data` is `None` when the document did not parse; the top-level value
/// stubs are offered then.
pub fn complete(
    data: Option<&Data>,
    spec: &TypeSpec,
    resolver: &dyn TypeResolver,
    pos: Position,
) -> Vec<CompletionCandidate> {
    let Some(data) = data else {
        return value_candidates(spec, resolver);
    };
    match block_trace(data, spec, resolver, pos) {
        BlockTrace::Outside => value_candidates(spec, resolver),
        BlockTrace::TypeFailed => Vec::new(),
        BlockTrace::Found { block, spec } => {
            block_candidates(block, spec, &trace_inside_block(block, pos), resolver)
        }
    }
}

/// Stubs for a value of type `spec`.
pub fn value_candidates(spec: &TypeSpec, resolver: &dyn TypeResolver) -> Vec<CompletionCandidate> {
    let Ok(spec) = spec.resolve(resolver) else {
        return Vec::new();
    };
    match spec {
        TypeSpec::Block(block) => {
            let kind = block.data_kind();
            vec![CompletionCandidate::snippet(
                block_label(kind),
                block_snippet(kind),
                CompletionKind::Snippet,
            )]
        }
        TypeSpec::Primitive(PrimitiveKind::Boolean) => vec![
            CompletionCandidate::keyword("true"),
            CompletionCandidate::keyword("false"),
        ],
        TypeSpec::Primitive(PrimitiveKind::String) => vec![CompletionCandidate::snippet(
            "\" ... \"",
            "\"$0\"",
            CompletionKind::Snippet,
        )],
        TypeSpec::Primitive(PrimitiveKind::Int | PrimitiveKind::Float) => Vec::new(),
        TypeSpec::Enum(variants) => variants
            .iter()
            .map(|(tag, payload)| {
                let mut insert = format!("#{tag}");
                if let Some(payload) = payload {
                    insert.push_str(block_snippet(payload.data_kind()));
                }
                CompletionCandidate::snippet(format!("#{tag}"), insert, CompletionKind::EnumMember)
            })
            .collect(),
        TypeSpec::Ref(_) | TypeSpec::Missing => Vec::new(),
    }
}

fn key_candidate(key: &str, value: &TypeSpec, resolver: &dyn TypeResolver) -> CompletionCandidate {
    let mut insert = format!("{key}: ");
    if let Ok(TypeSpec::Block(block)) = value.resolve(resolver) {
        insert.push_str(block_snippet(block.data_kind()));
    }
    CompletionCandidate::snippet(key, insert, CompletionKind::Property)
}

fn block_candidates(
    block: &BlockData,
    spec: &BlockSpec,
    at: &InsideBlock,
    resolver: &dyn TypeResolver,
) -> Vec<CompletionCandidate> {
    match spec {
        BlockSpec::Dict(fields) => match &at.just_passed_key {
            Some(key) => fields
                .get(key)
                .map(|value| value_candidates(value, resolver))
                .unwrap_or_default(),
            None => {
                let BlockContents::Dict { key_ranges, .. } = &block.contents else {
                    return Vec::new();
                };
                fields
                    .iter()
                    .filter(|(key, _)| !key_ranges.contains_key(*key))
                    .map(|(key, value)| key_candidate(key, value, resolver))
                    .collect()
            }
        },
        BlockSpec::Record(value) => match at.just_passed_key {
            Some(_) => value_candidates(value, resolver),
            None => Vec::new(),
        },
        BlockSpec::Array(element) => value_candidates(element, resolver),
        BlockSpec::Tuple(elements) => elements
            .get(at.values_before)
            .map(|element| value_candidates(element, resolver))
            .unwrap_or_default(),
    }
}
