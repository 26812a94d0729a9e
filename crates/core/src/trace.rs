//! Walking data and type side by side to a cursor position.
//!
//! Completion asks which block the cursor sits in and what that block's
//! spec is. Hover asks for the path from the root to the node under the
//! cursor and then walks the type along that path.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::data::{BlockContents, BlockData, Data, DataKind, PathStep};
use crate::position::{Position, Range};
use crate::typespec::{BlockSpec, TypeResolver, TypeSpec};

// ──────────────────────────────────────────────
// Block tracing (completion)
// ──────────────────────────────────────────────

/// Where the cursor sits among a block's items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsideBlock {
    /// Complete values before the cursor.
    pub values_before: usize,
    /// Key written before the cursor whose value has not started yet.
    pub just_passed_key: Option<String>,
    /// Whether the cursor is inside an item rather than between items.
    pub is_inside: bool,
}

pub fn trace_inside_block(block: &BlockData, pos: Position) -> InsideBlock {
    let mut items: Vec<(Range, Option<&str>)> =
        block.contents.children().map(|d| (d.range, None)).collect();
    if let BlockContents::Dict { key_ranges, .. } = &block.contents {
        items.extend(key_ranges.iter().map(|(key, range)| (*range, Some(key.as_str()))));
    }
    items.sort_by_key(|(range, _)| range.start);

    let mut result = InsideBlock::default();
    for (range, key) in items {
        if pos < range.start {
            break;
        }
        let inside = range.contains(pos);
        match key {
            Some(key) => result.just_passed_key = Some(key.to_owned()),
            None if !inside => {
                result.just_passed_key = None;
                result.values_before += 1;
            }
            None => {}
        }
        if inside {
            result.is_inside = true;
            break;
        }
    }
    result
}

/// Innermost block containing a position, paired with its spec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockTrace<'a> {
    /// The position is not inside any block of the data.
    Outside,
    /// The data disagrees with its type on the way down.
    TypeFailed,
    Found {
        block: &'a BlockData,
        spec: &'a BlockSpec,
    },
}

/// Interior of a block: after the opening bracket, up to and including
/// the position of the closing one.
fn interior(block: &BlockData) -> Range {
    block.range.contract(1, 0)
}

pub fn block_trace<'a>(
    data: &'a Data,
    spec: &'a TypeSpec,
    resolver: &'a dyn TypeResolver,
    pos: Position,
) -> BlockTrace<'a> {
    let Ok(spec) = spec.resolve(resolver) else {
        return BlockTrace::TypeFailed;
    };
    if matches!(spec, TypeSpec::Missing) {
        return BlockTrace::TypeFailed;
    }
    match &data.kind {
        DataKind::Primitive(_) => BlockTrace::Outside,
        DataKind::Block(block) => {
            if !interior(block).contains(pos) {
                return BlockTrace::Outside;
            }
            match spec {
                TypeSpec::Block(block_spec) => trace_sub_block(block, block_spec, resolver, pos),
                _ => BlockTrace::TypeFailed,
            }
        }
        DataKind::Enum(value) => {
            let Some(payload) = value.payload.as_ref().filter(|p| interior(p).contains(pos)) else {
                return BlockTrace::Outside;
            };
            let TypeSpec::Enum(variants) = spec else {
                return BlockTrace::TypeFailed;
            };
            match variants.get(&value.tag) {
                Some(Some(block_spec)) => trace_sub_block(payload, block_spec, resolver, pos),
                _ => BlockTrace::TypeFailed,
            }
        }
    }
}

fn trace_sub_block<'a>(
    block: &'a BlockData,
    spec: &'a BlockSpec,
    resolver: &'a dyn TypeResolver,
    pos: Position,
) -> BlockTrace<'a> {
    let found = BlockTrace::Found { block, spec };
    let children: Vec<(&'a Data, Option<&'a TypeSpec>)> = match (&block.contents, spec) {
        (BlockContents::Dict { contents, .. }, BlockSpec::Dict(fields)) => {
            contents.iter().map(|(k, v)| (v, fields.get(k))).collect()
        }
        (BlockContents::Dict { contents, .. }, BlockSpec::Record(value)) => {
            contents.values().map(|v| (v, Some(&**value))).collect()
        }
        (BlockContents::Array(items), BlockSpec::Array(element)) => {
            items.iter().map(|v| (v, Some(&**element))).collect()
        }
        (BlockContents::Tuple(items), BlockSpec::Tuple(elements)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (v, elements.get(i)))
            .collect(),
        _ => return BlockTrace::TypeFailed,
    };

    for (child, child_spec) in children {
        let inner = match child_spec {
            Some(child_spec) => block_trace(child, child_spec, resolver, pos),
            // No spec for this child: only a failure if the cursor is in it.
            None if child.range.contains(pos) => BlockTrace::TypeFailed,
            None => BlockTrace::Outside,
        };
        if inner != BlockTrace::Outside {
            return inner;
        }
    }
    found
}

// ──────────────────────────────────────────────
// Data paths (hover)
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    pub step: PathStep,
    /// Range of whatever the step leads to.
    pub range: Range,
}

/// Path from the root of a document to the node under a position.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTrace {
    pub root: Range,
    pub steps: Vec<TraceStep>,
}

impl DataTrace {
    /// Range reached after following the first `n` steps.
    pub fn range_after(&self, n: usize) -> Range {
        if n == 0 {
            return self.root;
        }
        self.steps.get(n - 1).map_or(self.target(), |s| s.range)
    }

    /// Range of the node the trace ends at.
    pub fn target(&self) -> Range {
        self.steps.last().map_or(self.root, |s| s.range)
    }
}

pub fn trace_data_path(data: &Data, pos: Position) -> Option<DataTrace> {
    let mut steps = Vec::new();
    trace_node(data, pos, &mut steps)?;
    Some(DataTrace {
        root: data.range,
        steps,
    })
}

/// Push the steps leading from `data` down to `pos`.
fn trace_node(data: &Data, pos: Position, steps: &mut Vec<TraceStep>) -> Option<()> {
    if !data.range.contains(pos) {
        return None;
    }
    match &data.kind {
        DataKind::Primitive(_) => {}
        DataKind::Block(block) => {
            trace_children(block, pos, steps);
        }
        DataKind::Enum(value) => {
            // The tag step stands for the payload type, or for the unit.
            steps.push(TraceStep {
                step: PathStep::Tag(value.tag.clone()),
                range: data.range,
            });
            if let Some(payload) = &value.payload {
                trace_children(payload, pos, steps);
            }
        }
    }
    Some(())
}

fn trace_children(block: &BlockData, pos: Position, steps: &mut Vec<TraceStep>) {
    if let BlockContents::Dict { key_ranges, .. } = &block.contents {
        if let Some((key, range)) = key_ranges.iter().find(|(_, r)| r.contains(pos)) {
            steps.push(TraceStep {
                step: PathStep::Key(key.clone()),
                range: *range,
            });
            return;
        }
    }
    for (step, child) in block.contents.children_with_steps() {
        if child.range.contains(pos) {
            steps.push(TraceStep {
                step,
                range: child.range,
            });
            trace_node(child, pos, steps);
            return;
        }
    }
}

/// Type reached by walking a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpectedType<'a> {
    Spec(&'a TypeSpec),
    Block(&'a BlockSpec),
    Unit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeTrace<'a> {
    /// Steps that could be followed in the type.
    pub safe_steps: usize,
    pub failed: bool,
    pub expected: ExpectedType<'a>,
    /// The followed steps rendered as `.key`, `._`, `[]`, `[i]` and `#Tag`.
    pub path: String,
}

enum Container<'a> {
    Block(&'a BlockSpec),
    Variants(&'a IndexMap<String, Option<BlockSpec>>),
}

pub fn trace_expected_type<'a>(
    steps: &[TraceStep],
    root: &'a TypeSpec,
    resolver: &'a dyn TypeResolver,
) -> TypeTrace<'a> {
    let mut expected = ExpectedType::Spec(root);
    let mut path = String::new();
    let mut safe_steps = 0;

    for TraceStep { step, .. } in steps {
        let container = match expected {
            ExpectedType::Unit => None,
            ExpectedType::Block(block) => Some(Container::Block(block)),
            ExpectedType::Spec(spec) => match spec.resolve(resolver) {
                Ok(TypeSpec::Block(block)) => Some(Container::Block(block)),
                Ok(TypeSpec::Enum(variants)) => Some(Container::Variants(variants)),
                _ => None,
            },
        };

        let next = match (step, container) {
            (PathStep::Tag(tag), Some(Container::Variants(variants))) => match variants.get(tag) {
                Some(variant) => {
                    let _ = write!(path, "#{tag}");
                    variant.as_ref().map_or(ExpectedType::Unit, ExpectedType::Block)
                }
                None => break,
            },
            (PathStep::Key(key), Some(Container::Block(BlockSpec::Dict(fields)))) => {
                match fields.get(key) {
                    Some(field) => {
                        let _ = write!(path, ".{key}");
                        ExpectedType::Spec(field)
                    }
                    None => break,
                }
            }
            (PathStep::Key(_), Some(Container::Block(BlockSpec::Record(value)))) => {
                path.push_str("._");
                ExpectedType::Spec(value)
            }
            (PathStep::ArrayElement(_), Some(Container::Block(BlockSpec::Array(element)))) => {
                path.push_str("[]");
                ExpectedType::Spec(element)
            }
            (PathStep::TupleElement(i), Some(Container::Block(BlockSpec::Tuple(elements)))) => {
                match elements.get(*i) {
                    Some(element) => {
                        let _ = write!(path, "[{i}]");
                        ExpectedType::Spec(element)
                    }
                    None => break,
                }
            }
            _ => break,
        };
        expected = next;
        safe_steps += 1;
    }

    TypeTrace {
        safe_steps,
        failed: safe_steps < steps.len(),
        expected,
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parse_document;
    use crate::index::TypeIndex;

    const POINTS: &str = "#dict{\n    name: #string\n    pts: #array(#tuple[#int, #int])\n    tag: #enum{\n        On: #dict{ level: #int }\n        Off: #unit\n    }\n}";

    fn index() -> TypeIndex {
        TypeIndex::build([("P", POINTS)])
    }

    fn data(text: &str) -> Data {
        parse_document(text).data.expect("data")
    }

    #[test]
    fn inside_block_counts_values_and_keys() {
        let d = data("(1, 2, 3)");
        let DataKind::Block(block) = &d.kind else {
            panic!("block");
        };
        let at = trace_inside_block(block, Position::new(0, 5));
        assert_eq!(at.values_before, 2);
        assert!(!at.is_inside);

        let d = data("{a: 1, b: }");
        let DataKind::Block(block) = &d.kind else {
            panic!("block");
        };
        let at = trace_inside_block(block, Position::new(0, 10));
        assert_eq!(at.just_passed_key.as_deref(), Some("b"));
        assert_eq!(at.values_before, 1);
    }

    #[test]
    fn block_trace_finds_innermost_block() {
        let index = index();
        let spec = TypeSpec::Ref("P".into());
        let d = data("{\n    pts: [(1, 2), ()]\n}");

        match block_trace(&d, &spec, &index, Position::new(1, 19)) {
            BlockTrace::Found { block, spec } => {
                assert_eq!(block.contents.kind(), crate::token::BlockKind::Tuple);
                assert!(matches!(spec, BlockSpec::Tuple(items) if items.len() == 2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            block_trace(&d, &spec, &index, Position::new(2, 1)),
            BlockTrace::Outside
        );
    }

    #[test]
    fn block_trace_fails_on_disagreeing_data() {
        let index = index();
        let spec = TypeSpec::Ref("P".into());
        let d = data("{pts: {x: [1]}}");
        assert_eq!(
            block_trace(&d, &spec, &index, Position::new(0, 11)),
            BlockTrace::TypeFailed
        );
    }

    #[test]
    fn data_path_through_enum_payload() {
        let d = data("{tag: #On{level: 3}}");
        let trace = trace_data_path(&d, Position::new(0, 17)).expect("trace");
        let steps: Vec<PathStep> = trace.steps.iter().map(|s| s.step.clone()).collect();
        assert_eq!(
            steps,
            vec![
                PathStep::Key("tag".into()),
                PathStep::Tag("On".into()),
                PathStep::Key("level".into()),
            ]
        );
        assert_eq!(trace.target(), Range::on_line(0, 17, 18));

        let on_key = trace_data_path(&d, Position::new(0, 11)).expect("trace");
        assert_eq!(
            on_key.steps.last().map(|s| &s.step),
            Some(&PathStep::Key("level".into()))
        );
    }

    #[test]
    fn expected_type_along_path() {
        let index = index();
        let spec = TypeSpec::Ref("P".into());
        let d = data("{pts: [(1, 2)], tag: #Off}");

        let trace = trace_data_path(&d, Position::new(0, 11)).expect("trace");
        let walked = trace_expected_type(&trace.steps, &spec, &index);
        assert_eq!(walked.path, ".pts[][1]");
        assert!(!walked.failed);
        assert_eq!(
            walked.expected,
            ExpectedType::Spec(&TypeSpec::Primitive(crate::data::PrimitiveKind::Int))
        );

        let trace = trace_data_path(&d, Position::new(0, 22)).expect("trace");
        let walked = trace_expected_type(&trace.steps, &spec, &index);
        assert_eq!(walked.path, ".tag#Off");
        assert_eq!(walked.expected, ExpectedType::Unit);
    }

    #[test]
    fn expected_type_stops_at_mismatch() {
        let index = index();
        let spec = TypeSpec::Ref("P".into());
        let d = data("{name: [1]}");
        let trace = trace_data_path(&d, Position::new(0, 8)).expect("trace");
        let walked = trace_expected_type(&trace.steps, &spec, &index);
        assert!(walked.failed);
        assert_eq!(walked.safe_steps, 1);
        assert_eq!(walked.path, ".name");
        assert_eq!(trace.range_after(walked.safe_steps), Range::on_line(0, 7, 10));
    }
}
