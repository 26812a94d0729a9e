//! Structural comparison of data against a type spec.
//!
//! Checking is best-effort: a mismatch at one level is reported and the
//! checker still descends into every child it can pair with a spec, so one
//! pass reports every problem in the document.

use indexmap::IndexMap;

use crate::data::{BlockContents, BlockData, Data, DataKind, EnumData};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticTracker};
use crate::position::Range;
use crate::typespec::{BlockSpec, TypeResolver, TypeSpec};

/// Check `data` against `spec`, returning whether the whole subtree matched.
pub fn check(
    data: &Data,
    spec: &TypeSpec,
    resolver: &dyn TypeResolver,
    diagnostics: &mut DiagnosticTracker,
) -> bool {
    let resolved = match spec.resolve(resolver) {
        Ok(resolved) => resolved,
        Err(issue) => {
            diagnostics.add(Diagnostic::error(
                DiagnosticKind::UnresolvedReference,
                data.range,
                format!("Cannot check against {}: {issue}.", spec.describe()),
            ));
            return false;
        }
    };

    match (&data.kind, resolved) {
        (_, TypeSpec::Missing | TypeSpec::Ref(_)) => false,
        (DataKind::Primitive(scalar), TypeSpec::Primitive(kind)) if scalar.kind() == *kind => true,
        (DataKind::Block(block), TypeSpec::Block(block_spec)) => {
            check_block(block, block_spec, resolver, diagnostics)
        }
        (DataKind::Block(_), TypeSpec::Enum(_)) => {
            diagnostics.add(Diagnostic::error(
                DiagnosticKind::ExpectedEnum,
                data.range,
                format!("Expected enum value, found {}.", data.describe()),
            ));
            false
        }
        (DataKind::Enum(value), TypeSpec::Enum(variants)) => {
            check_enum(value, variants, resolver, diagnostics)
        }
        _ => {
            mismatch(diagnostics, data.range, &resolved.describe(), &data.describe());
            false
        }
    }
}

fn mismatch(diagnostics: &mut DiagnosticTracker, range: Range, expected: &str, found: &str) {
    diagnostics.add(Diagnostic::error(
        DiagnosticKind::TypeMismatch,
        range,
        format!("Expected {expected}, found {found}."),
    ));
}

fn check_enum(
    value: &EnumData,
    variants: &IndexMap<String, Option<BlockSpec>>,
    resolver: &dyn TypeResolver,
    diagnostics: &mut DiagnosticTracker,
) -> bool {
    let Some(variant) = variants.get(&value.tag) else {
        let allowed: Vec<String> = variants.keys().map(|tag| format!("#{tag}")).collect();
        let message = if allowed.is_empty() {
            format!("Unknown enum tag #{}. No tags are allowed here.", value.tag)
        } else {
            format!(
                "Unknown enum tag #{}. Expected one of {}.",
                value.tag,
                allowed.join(", ")
            )
        };
        diagnostics.add(Diagnostic::error(
            DiagnosticKind::UnknownEnumTag,
            value.tag_range,
            message,
        ));
        return false;
    };

    match (variant, &value.payload) {
        (None, None) => true,
        (Some(spec), Some(payload)) => check_block(payload, spec, resolver, diagnostics),
        (None, Some(payload)) => {
            diagnostics.add(Diagnostic::error(
                DiagnosticKind::UnitMismatch,
                payload.range,
                format!("Variant #{} is a unit and takes no payload.", value.tag),
            ));
            false
        }
        (Some(spec), None) => {
            diagnostics.add(Diagnostic::error(
                DiagnosticKind::UnitMismatch,
                value.tag_range,
                format!(
                    "Variant #{} expects a {} payload, found unit.",
                    value.tag,
                    spec.describe()
                ),
            ));
            false
        }
    }
}

fn check_block(
    block: &BlockData,
    spec: &BlockSpec,
    resolver: &dyn TypeResolver,
    diagnostics: &mut DiagnosticTracker,
) -> bool {
    if block.contents.kind() != spec.data_kind() {
        mismatch(
            diagnostics,
            block.range,
            spec.describe(),
            block.contents.kind().name(),
        );
        return false;
    }

    let mut ok = true;
    match (&block.contents, spec) {
        (
            BlockContents::Dict {
                contents,
                key_ranges,
            },
            BlockSpec::Dict(fields),
        ) => {
            for name in fields.keys().filter(|name| !key_ranges.contains_key(*name)) {
                diagnostics.add(Diagnostic::error(
                    DiagnosticKind::MissingProperty,
                    block.range,
                    format!("Missing property \"{name}\"."),
                ));
                ok = false;
            }
            for (name, range) in key_ranges.iter().filter(|(name, _)| !fields.contains_key(*name)) {
                diagnostics.add(Diagnostic::error(
                    DiagnosticKind::UnexpectedProperty,
                    *range,
                    format!("Unexpected property \"{name}\"."),
                ));
                ok = false;
            }
            for (name, value) in contents {
                if let Some(field) = fields.get(name) {
                    ok = check(value, field, resolver, diagnostics) && ok;
                }
            }
        }
        (BlockContents::Dict { contents, .. }, BlockSpec::Record(value_spec)) => {
            for value in contents.values() {
                ok = check(value, value_spec, resolver, diagnostics) && ok;
            }
        }
        (BlockContents::Array(items), BlockSpec::Array(element)) => {
            for item in items {
                ok = check(item, element, resolver, diagnostics) && ok;
            }
        }
        (BlockContents::Tuple(items), BlockSpec::Tuple(specs)) => {
            ok = check_arity(block, items, specs.len(), diagnostics);
            for (item, spec) in items.iter().zip(specs) {
                ok = check(item, spec, resolver, diagnostics) && ok;
            }
        }
        _ => unreachable!("block kinds were compared above"),
    }
    ok
}

fn check_arity(
    block: &BlockData,
    items: &[Data],
    expected: usize,
    diagnostics: &mut DiagnosticTracker,
) -> bool {
    let found = items.len();
    if found > expected {
        let range = items[expected..]
            .iter()
            .map(|item| item.range)
            .reduce(Range::combine)
            .unwrap_or(block.range);
        diagnostics.add(Diagnostic::error(
            DiagnosticKind::TooManyElements,
            range,
            format!("Too many elements: expected {expected}, found {found}."),
        ));
        false
    } else if found < expected {
        let inner = block.range.contract(1, 1);
        let start = items.last().map_or(inner.start, |item| item.range.end);
        diagnostics.add(Diagnostic::error(
            DiagnosticKind::TooFewElements,
            Range::new(start, inner.end.max(start)),
            format!("Too few elements: expected {expected}, found {found}."),
        ));
        false
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parse_document;
    use crate::data::PrimitiveKind;
    use crate::error::ResolutionIssue;
    use crate::position::Position;

    struct NoNames;

    impl TypeResolver for NoNames {
        fn resolve(&self, name: &str) -> Result<&TypeSpec, ResolutionIssue> {
            Err(ResolutionIssue::CouldNotFind(name.to_owned()))
        }
    }

    fn int() -> TypeSpec {
        TypeSpec::Primitive(PrimitiveKind::Int)
    }

    fn run(text: &str, spec: &TypeSpec) -> (bool, DiagnosticTracker) {
        let doc = parse_document(text);
        assert!(doc.diagnostics.can_continue(), "{:?}", doc.diagnostics.diagnostics());
        let data = doc.data.expect("document should parse");
        let mut diagnostics = DiagnosticTracker::new();
        let ok = check(&data, spec, &NoNames, &mut diagnostics);
        (ok, diagnostics)
    }

    fn kinds(diags: &DiagnosticTracker) -> Vec<DiagnosticKind> {
        diags.diagnostics().iter().map(|d| d.kind).collect()
    }

    fn dict(fields: &[(&str, TypeSpec)]) -> TypeSpec {
        TypeSpec::Block(BlockSpec::Dict(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ))
    }

    #[test]
    fn primitives_match_strictly() {
        let (ok, diags) = run("1", &TypeSpec::Primitive(PrimitiveKind::Float));
        assert!(!ok);
        assert_eq!(diags.diagnostics()[0].message, "Expected float, found int.");
        assert!(run("1.5", &TypeSpec::Primitive(PrimitiveKind::Float)).0);
    }

    #[test]
    fn dict_reports_symmetric_difference() {
        let spec = dict(&[("a", int()), ("b", int())]);
        let (ok, diags) = run("{a: 1, c: 3}", &spec);
        assert!(!ok);
        assert_eq!(
            kinds(&diags),
            vec![DiagnosticKind::MissingProperty, DiagnosticKind::UnexpectedProperty]
        );
        assert_eq!(diags.diagnostics()[0].message, "Missing property \"b\".");
        assert_eq!(diags.diagnostics()[0].range, Range::on_line(0, 0, 12));
        assert_eq!(diags.diagnostics()[1].range, Range::on_line(0, 7, 8));
    }

    #[test]
    fn mismatched_children_are_all_reported() {
        let spec = dict(&[("a", int()), ("b", int())]);
        let (_, diags) = run("{a: true, b: \"x\"}", &spec);
        assert_eq!(
            kinds(&diags),
            vec![DiagnosticKind::TypeMismatch, DiagnosticKind::TypeMismatch]
        );
    }

    #[test]
    fn tuple_arity_too_many() {
        let spec = TypeSpec::Block(BlockSpec::Tuple(vec![int(), int()]));
        let (ok, diags) = run("(1, 2, 3)", &spec);
        assert!(!ok);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::TooManyElements]);
        assert_eq!(diags.diagnostics()[0].range, Range::on_line(0, 7, 8));
    }

    #[test]
    fn tuple_arity_too_few() {
        let spec = TypeSpec::Block(BlockSpec::Tuple(vec![int(), int()]));
        let (_, diags) = run("(1  )", &spec);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::TooFewElements]);
        assert_eq!(diags.diagnostics()[0].range, Range::on_line(0, 2, 4));

        let (_, diags) = run("()", &spec);
        assert_eq!(diags.diagnostics()[0].range, Range::at(Position::new(0, 1)));
    }

    #[test]
    fn record_checks_every_value() {
        let spec = TypeSpec::Block(BlockSpec::Record(Box::new(int())));
        let (ok, diags) = run("{x: 1, y: 2.0, z: 3}", &spec);
        assert!(!ok);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::TypeMismatch]);
        assert_eq!(diags.diagnostics()[0].range, Range::on_line(0, 10, 13));
    }

    #[test]
    fn enum_unit_and_payload_mismatches() {
        let mut variants = IndexMap::new();
        variants.insert("Some".to_owned(), Some(BlockSpec::Tuple(vec![int()])));
        variants.insert("None".to_owned(), None);
        let spec = TypeSpec::Enum(variants);

        let (_, diags) = run("#None(1)", &spec);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::UnitMismatch]);
        assert!(diags.diagnostics()[0].message.contains("unit"));

        let (_, diags) = run("#Some", &spec);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::UnitMismatch]);
        assert!(diags.diagnostics()[0].message.contains("unit"));

        let (_, diags) = run("#Other", &spec);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::UnknownEnumTag]);
        assert_eq!(
            diags.diagnostics()[0].message,
            "Unknown enum tag #Other. Expected one of #Some, #None."
        );

        let (_, diags) = run("(1)", &spec);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::ExpectedEnum]);

        assert!(run("#Some(4)", &spec).0);
    }

    #[test]
    fn unresolved_reference_fails_without_panicking() {
        let (ok, diags) = run("1", &TypeSpec::Ref("Gone".to_owned()));
        assert!(!ok);
        assert_eq!(kinds(&diags), vec![DiagnosticKind::UnresolvedReference]);

        let (ok, diags) = run("1", &TypeSpec::Missing);
        assert!(!ok);
        assert!(diags.is_empty());
    }
}
