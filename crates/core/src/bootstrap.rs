//! The spec that type declarations are themselves checked against.
//!
//! ```text
//! #int | #float | #boolean | #string
//! #dict{ key: Spec, ... }     #record(Spec)
//! #array(Spec)                #tuple[Spec, ...]
//! #enum{ Tag: #unit | #dict{...} | #record(...) | #array(...) | #tuple[...] }
//! #ref(#DeclaredName)
//! ```

use indexmap::IndexMap;

use crate::error::ResolutionIssue;
use crate::typespec::{BlockSpec, TypeResolver, TypeSpec};

/// Name under which the bootstrap spec refers to itself.
pub const BOOTSTRAP_NAME: &str = "Spec";

/// Declaration spec for one set of declared type names.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    spec: TypeSpec,
    root: TypeSpec,
}

impl Bootstrap {
    /// Build the spec with `#ref` accepting exactly `declared_names`.
    pub fn new<'a>(declared_names: impl IntoIterator<Item = &'a str>) -> Self {
        let names: IndexMap<String, Option<BlockSpec>> = declared_names
            .into_iter()
            .map(|name| (name.to_owned(), None))
            .collect();

        let mut variants: IndexMap<String, Option<BlockSpec>> = ["int", "float", "boolean", "string"]
            .into_iter()
            .map(|name| (name.to_owned(), None))
            .collect();
        variants.extend(block_variants());

        let mut payloads: IndexMap<String, Option<BlockSpec>> = IndexMap::new();
        payloads.insert("unit".to_owned(), None);
        payloads.extend(block_variants());
        variants.insert(
            "enum".to_owned(),
            Some(BlockSpec::Record(Box::new(TypeSpec::Enum(payloads)))),
        );
        variants.insert(
            "ref".to_owned(),
            Some(BlockSpec::Tuple(vec![TypeSpec::Enum(names)])),
        );

        Bootstrap {
            spec: TypeSpec::Enum(variants),
            root: self_ref(),
        }
    }

    /// The spec a declaration document must match.
    pub fn spec(&self) -> &TypeSpec {
        &self.root
    }
}

impl TypeResolver for Bootstrap {
    fn resolve(&self, name: &str) -> Result<&TypeSpec, ResolutionIssue> {
        if name == BOOTSTRAP_NAME {
            Ok(&self.spec)
        } else {
            Err(ResolutionIssue::CouldNotFind(name.to_owned()))
        }
    }
}

fn self_ref() -> TypeSpec {
    TypeSpec::Ref(BOOTSTRAP_NAME.to_owned())
}

fn block_variants() -> Vec<(String, Option<BlockSpec>)> {
    vec![
        ("dict".to_owned(), Some(BlockSpec::Record(Box::new(self_ref())))),
        ("record".to_owned(), Some(BlockSpec::Tuple(vec![self_ref()]))),
        ("array".to_owned(), Some(BlockSpec::Tuple(vec![self_ref()]))),
        ("tuple".to_owned(), Some(BlockSpec::Array(Box::new(self_ref())))),
    ]
}
