//! Structural type descriptions.
//!
//! Named types are referenced through [`TypeSpec::Ref`] and only looked up
//! when a consumer walks into them, so recursive declarations never need to
//! be materialized.

use indexmap::IndexMap;

use crate::data::{PrimitiveKind, Value};
use crate::error::ResolutionIssue;
use crate::token::BlockKind;

/// Longest chain of `Ref -> Ref -> ...` followed before giving up.
const MAX_REF_HOPS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Primitive(PrimitiveKind),
    Block(BlockSpec),
    /// Variant name to payload spec; `None` is the unit variant.
    Enum(IndexMap<String, Option<BlockSpec>>),
    /// A declared type, looked up by name at traversal time.
    Ref(String),
    /// Stands in for a type that could not be resolved.
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockSpec {
    /// Fixed key set.
    Dict(IndexMap<String, TypeSpec>),
    /// Any keys, one shared value type.
    Record(Box<TypeSpec>),
    Array(Box<TypeSpec>),
    Tuple(Vec<TypeSpec>),
}

/// Looks up declared type names.
pub trait TypeResolver {
    fn resolve(&self, name: &str) -> Result<&TypeSpec, ResolutionIssue>;
}

impl TypeSpec {
    /// Follow `Ref`s until a structural spec is reached.
    pub fn resolve<'a>(
        &'a self,
        resolver: &'a dyn TypeResolver,
    ) -> Result<&'a TypeSpec, ResolutionIssue> {
        let mut current = self;
        for _ in 0..MAX_REF_HOPS {
            match current {
                TypeSpec::Ref(name) => current = resolver.resolve(name)?,
                other => return Ok(other),
            }
        }
        match current {
            TypeSpec::Ref(name) => Err(ResolutionIssue::DefectiveDeclaration(name.clone())),
            other => Ok(other),
        }
    }

    /// Short name used in mismatch messages.
    pub fn describe(&self) -> String {
        match self {
            TypeSpec::Primitive(kind) => kind.name().to_owned(),
            TypeSpec::Block(block) => block.describe().to_owned(),
            TypeSpec::Enum(_) => "enum value".to_owned(),
            TypeSpec::Ref(name) => format!("@{name}"),
            TypeSpec::Missing => "missing type".to_owned(),
        }
    }

    /// Translate a checked type declaration into a spec.
    ///
    /// Returns `None` when the value does not have the shape of a declaration.
    pub fn from_value(value: &Value) -> Option<TypeSpec> {
        let Value::Enum { tag, payload } = value else {
            return None;
        };
        let spec = match (tag.as_str(), payload.as_deref()) {
            ("int", None) => TypeSpec::Primitive(PrimitiveKind::Int),
            ("float", None) => TypeSpec::Primitive(PrimitiveKind::Float),
            ("boolean", None) => TypeSpec::Primitive(PrimitiveKind::Boolean),
            ("string", None) => TypeSpec::Primitive(PrimitiveKind::String),
            ("enum", Some(Value::Dict(variants))) => {
                let mut spec = IndexMap::new();
                for (name, variant) in variants {
                    let payload = match variant {
                        Value::Enum { tag, payload: None } if tag == "unit" => None,
                        other => Some(BlockSpec::from_value(other)?),
                    };
                    spec.insert(name.clone(), payload);
                }
                TypeSpec::Enum(spec)
            }
            ("ref", Some(Value::Tuple(items))) => match items.as_slice() {
                [Value::Enum { tag, payload: None }] => TypeSpec::Ref(tag.clone()),
                _ => return None,
            },
            _ => TypeSpec::Block(BlockSpec::from_value(value)?),
        };
        Some(spec)
    }
}

impl BlockSpec {
    /// The data block kind this spec accepts.
    pub fn data_kind(&self) -> BlockKind {
        match self {
            BlockSpec::Dict(_) | BlockSpec::Record(_) => BlockKind::Dict,
            BlockSpec::Array(_) => BlockKind::Array,
            BlockSpec::Tuple(_) => BlockKind::Tuple,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            BlockSpec::Dict(_) => "dict",
            BlockSpec::Record(_) => "record",
            BlockSpec::Array(_) => "array",
            BlockSpec::Tuple(_) => "tuple",
        }
    }

    pub fn from_value(value: &Value) -> Option<BlockSpec> {
        let Value::Enum {
            tag,
            payload: Some(payload),
        } = value
        else {
            return None;
        };
        let spec = match (tag.as_str(), payload.as_ref()) {
            ("dict", Value::Dict(fields)) => BlockSpec::Dict(
                fields
                    .iter()
                    .map(|(k, v)| Some((k.clone(), TypeSpec::from_value(v)?)))
                    .collect::<Option<_>>()?,
            ),
            ("record", Value::Tuple(items)) => match items.as_slice() {
                [item] => BlockSpec::Record(Box::new(TypeSpec::from_value(item)?)),
                _ => return None,
            },
            ("array", Value::Tuple(items)) => match items.as_slice() {
                [item] => BlockSpec::Array(Box::new(TypeSpec::from_value(item)?)),
                _ => return None,
            },
            ("tuple", Value::Array(items)) => BlockSpec::Tuple(
                items
                    .iter()
                    .map(TypeSpec::from_value)
                    .collect::<Option<_>>()?,
            ),
            _ => return None,
        };
        Some(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(IndexMap<String, TypeSpec>);

    impl TypeResolver for Named {
        fn resolve(&self, name: &str) -> Result<&TypeSpec, ResolutionIssue> {
            self.0
                .get(name)
                .ok_or_else(|| ResolutionIssue::CouldNotFind(name.to_owned()))
        }
    }

    fn unit(tag: &str) -> Value {
        Value::Enum {
            tag: tag.to_owned(),
            payload: None,
        }
    }

    fn tagged(tag: &str, payload: Value) -> Value {
        Value::Enum {
            tag: tag.to_owned(),
            payload: Some(Box::new(payload)),
        }
    }

    #[test]
    fn resolve_follows_ref_chain() {
        let mut names = IndexMap::new();
        names.insert("A".to_owned(), TypeSpec::Ref("B".to_owned()));
        names.insert("B".to_owned(), TypeSpec::Primitive(PrimitiveKind::Int));
        let resolver = Named(names);
        let spec = TypeSpec::Ref("A".to_owned());
        assert_eq!(
            spec.resolve(&resolver),
            Ok(&TypeSpec::Primitive(PrimitiveKind::Int))
        );
    }

    #[test]
    fn resolve_reports_loops_and_unknown_names() {
        let mut names = IndexMap::new();
        names.insert("A".to_owned(), TypeSpec::Ref("B".to_owned()));
        names.insert("B".to_owned(), TypeSpec::Ref("A".to_owned()));
        let resolver = Named(names);
        assert!(matches!(
            TypeSpec::Ref("A".to_owned()).resolve(&resolver),
            Err(ResolutionIssue::DefectiveDeclaration(_))
        ));
        assert_eq!(
            TypeSpec::Ref("Z".to_owned()).resolve(&resolver),
            Err(ResolutionIssue::CouldNotFind("Z".to_owned()))
        );
    }

    #[test]
    fn translates_declaration_values() {
        let mut fields = IndexMap::new();
        fields.insert("value".to_owned(), unit("int"));
        let mut variants = IndexMap::new();
        variants.insert(
            "Some".to_owned(),
            tagged("tuple", Value::Array(vec![tagged("ref", Value::Tuple(vec![unit("Node")]))])),
        );
        variants.insert("None".to_owned(), unit("unit"));
        fields.insert("next".to_owned(), tagged("enum", Value::Dict(variants)));
        let value = tagged("dict", Value::Dict(fields));

        let Some(TypeSpec::Block(BlockSpec::Dict(spec))) = TypeSpec::from_value(&value) else {
            panic!("expected dict spec");
        };
        assert_eq!(spec["value"], TypeSpec::Primitive(PrimitiveKind::Int));
        let TypeSpec::Enum(next) = &spec["next"] else {
            panic!("expected enum spec");
        };
        assert_eq!(next["None"], None);
        assert_eq!(
            next["Some"],
            Some(BlockSpec::Tuple(vec![TypeSpec::Ref("Node".to_owned())]))
        );
    }

    #[test]
    fn rejects_malformed_declarations() {
        assert_eq!(TypeSpec::from_value(&unit("decimal")), None);
        assert_eq!(TypeSpec::from_value(&Value::Int(3)), None);
        assert_eq!(
            TypeSpec::from_value(&tagged("array", Value::Tuple(vec![]))),
            None
        );
    }

    #[test]
    fn record_accepts_dict_data() {
        let spec = BlockSpec::Record(Box::new(TypeSpec::Primitive(PrimitiveKind::Float)));
        assert_eq!(spec.data_kind(), BlockKind::Dict);
        assert_eq!(spec.describe(), "record");
    }
}
