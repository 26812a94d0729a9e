//! Workspace registry of declared type names.
//!
//! Building the index is two-phase: every declared name is collected
//! before any declaration body is checked, because the declaration spec's
//! `#ref` variant only accepts names that are actually declared.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::analysis::parse_document;
use crate::bootstrap::Bootstrap;
use crate::check::check;
use crate::diagnostics::DiagnosticTracker;
use crate::error::{Error, ResolutionIssue};
use crate::source::SourceProvider;
use crate::typespec::{TypeResolver, TypeSpec};

/// Extension of data documents.
pub const DATA_EXTENSION: &str = "thrd";
/// Extension of type declaration documents.
pub const DECLARATION_EXTENSION: &str = "thrdtype";

static DATA_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:.+?\.)?(\w+)\.thrd$").expect("valid data file pattern"));

static DECLARATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+$").expect("valid declaration name pattern"));

/// Type name a data file is checked against: the segment just before `.thrd`.
///
/// `config.Server.thrd` and `Server.thrd` both name `Server`.
pub fn data_type_name(file_name: &str) -> Option<&str> {
    DATA_FILE_NAME
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Name declared by a `.thrdtype` file: its stem, which must be a word.
pub fn declaration_name(path: &Path) -> Option<&str> {
    if path.extension().and_then(|e| e.to_str()) != Some(DECLARATION_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|stem| DECLARATION_NAME.is_match(stem))
}

#[derive(Debug, Clone)]
pub struct TypeIndex {
    entries: IndexMap<String, Result<TypeSpec, ResolutionIssue>>,
    bootstrap: Bootstrap,
}

impl Default for TypeIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl TypeIndex {
    pub fn empty() -> Self {
        TypeIndex {
            entries: IndexMap::new(),
            bootstrap: Bootstrap::new(std::iter::empty()),
        }
    }

    /// Build from `(name, text)` pairs of declaration documents.
    pub fn build<'a>(declarations: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        // Phase 1: names only.
        let mut bodies: IndexMap<&str, &str> = IndexMap::new();
        let mut conflicting: HashSet<&str> = HashSet::new();
        for (name, text) in declarations {
            if bodies.contains_key(name) {
                conflicting.insert(name);
            } else {
                bodies.insert(name, text);
            }
        }

        // Phase 2: the declaration spec for this name set.
        let bootstrap = Bootstrap::new(bodies.keys().copied());

        // Phase 3: check and translate bodies.
        let mut entries = IndexMap::new();
        for (name, text) in &bodies {
            let entry = if conflicting.contains(name) {
                Err(ResolutionIssue::ConflictingDeclarations((*name).to_owned()))
            } else {
                translate_declaration(text, &bootstrap)
                    .ok_or_else(|| ResolutionIssue::DefectiveDeclaration((*name).to_owned()))
            };
            entries.insert((*name).to_owned(), entry);
        }

        let mut index = TypeIndex { entries, bootstrap };

        // Phase 4: declarations that are nothing but a loop of references.
        let looping: Vec<String> = index
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Ok(TypeSpec::Ref(_))))
            .filter(|(name, _)| {
                matches!(
                    TypeSpec::Ref((*name).clone()).resolve(&index),
                    Err(ResolutionIssue::DefectiveDeclaration(_))
                )
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in looping {
            let issue = ResolutionIssue::DefectiveDeclaration(name.clone());
            index.entries.insert(name, Err(issue));
        }

        debug!(
            declared = index.entries.len(),
            usable = index.entries.values().filter(|e| e.is_ok()).count(),
            "type index built"
        );
        index
    }

    /// Load and build from every declaration under `root`.
    pub fn from_provider(provider: &dyn SourceProvider, root: &Path) -> Result<Self, Error> {
        let paths = provider
            .list_sources(root)
            .map_err(|source| Error::Io {
                path: root.to_path_buf(),
                source,
            })?;
        let mut sources: Vec<(String, String)> = Vec::new();
        for path in paths {
            let Some(name) = declaration_name(&path) else {
                continue;
            };
            match provider.read_source(&path) {
                Ok(text) => sources.push((name.to_owned(), text)),
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable declaration"),
            }
        }
        Ok(Self::build(
            sources.iter().map(|(n, t)| (n.as_str(), t.as_str())),
        ))
    }

    /// Spec for a data document, identified by its file name.
    ///
    /// Returns a reference to the declared name so that consumers see which
    /// type the document is bound to.
    pub fn type_for_data_file(&self, file_name: &str) -> Result<TypeSpec, ResolutionIssue> {
        let name = data_type_name(file_name)
            .ok_or_else(|| ResolutionIssue::ReferenceInvalid(file_name.to_owned()))?;
        let spec = TypeSpec::Ref(name.to_owned());
        spec.resolve(self)?;
        Ok(spec)
    }

    /// Spec that declaration documents are checked against.
    pub fn declaration_spec(&self) -> &TypeSpec {
        self.bootstrap.spec()
    }

    pub fn bootstrap(&self) -> &Bootstrap {
        &self.bootstrap
    }

    pub fn get(&self, name: &str) -> Option<&Result<TypeSpec, ResolutionIssue>> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeResolver for TypeIndex {
    fn resolve(&self, name: &str) -> Result<&TypeSpec, ResolutionIssue> {
        match self.entries.get(name) {
            Some(Ok(spec)) => Ok(spec),
            Some(Err(issue)) => Err(issue.clone()),
            None => Err(ResolutionIssue::CouldNotFind(name.to_owned())),
        }
    }
}

fn translate_declaration(text: &str, bootstrap: &Bootstrap) -> Option<TypeSpec> {
    let doc = parse_document(text);
    let data = doc.data?;
    let mut scratch = DiagnosticTracker::new();
    if !check(&data, bootstrap.spec(), bootstrap, &mut scratch) {
        return None;
    }
    TypeSpec::from_value(&data.strip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PrimitiveKind;
    use crate::source::InMemoryProvider;
    use crate::typespec::BlockSpec;

    const NODE: &str = "#dict{\n    value: #int\n    next: #enum{\n        Some: #tuple[#ref(#Node)]\n        None: #unit\n    }\n}\n";

    #[test]
    fn data_file_names_bind_to_last_segment() {
        assert_eq!(data_type_name("Server.thrd"), Some("Server"));
        assert_eq!(data_type_name("prod.eu.Server.thrd"), Some("Server"));
        assert_eq!(data_type_name("Server.thrdtype"), None);
        assert_eq!(data_type_name(".thrd"), None);
    }

    #[test]
    fn declaration_names_must_be_words() {
        assert_eq!(declaration_name(Path::new("/t/Node.thrdtype")), Some("Node"));
        assert_eq!(declaration_name(Path::new("/t/my-type.thrdtype")), None);
        assert_eq!(declaration_name(Path::new("/t/Node.thrd")), None);
    }

    #[test]
    fn self_referential_declaration_builds() {
        let index = TypeIndex::build([("Node", NODE)]);
        let Some(Ok(TypeSpec::Block(BlockSpec::Dict(fields)))) = index.get("Node") else {
            panic!("Node should translate: {:?}", index.get("Node"));
        };
        assert_eq!(fields["value"], TypeSpec::Primitive(PrimitiveKind::Int));
        assert!(index.type_for_data_file("list.Node.thrd").is_ok());
    }

    #[test]
    fn duplicate_declarations_conflict() {
        let index = TypeIndex::build([("A", "#int"), ("A", "#float"), ("B", "#string")]);
        assert_eq!(
            index.resolve("A"),
            Err(ResolutionIssue::ConflictingDeclarations("A".to_owned()))
        );
        assert!(index.resolve("B").is_ok());
    }

    #[test]
    fn malformed_declarations_are_defective() {
        let index = TypeIndex::build([("A", "#decimal"), ("B", "#ref(#Nope)"), ("C", "{")]);
        for name in ["A", "B", "C"] {
            assert_eq!(
                index.resolve(name),
                Err(ResolutionIssue::DefectiveDeclaration(name.to_owned())),
                "{name}"
            );
        }
    }

    #[test]
    fn reference_loops_are_defective() {
        let index = TypeIndex::build([
            ("A", "#ref(#B)"),
            ("B", "#ref(#A)"),
            ("C", "#ref(#D)"),
            ("D", "#int"),
        ]);
        assert!(matches!(
            index.resolve("A"),
            Err(ResolutionIssue::DefectiveDeclaration(_))
        ));
        assert_eq!(
            TypeSpec::Ref("C".to_owned()).resolve(&index),
            Ok(&TypeSpec::Primitive(PrimitiveKind::Int))
        );
    }

    #[test]
    fn unknown_and_unnamed_data_files() {
        let index = TypeIndex::build([("Node", NODE)]);
        assert_eq!(
            index.type_for_data_file("x.Other.thrd"),
            Err(ResolutionIssue::CouldNotFind("Other".to_owned()))
        );
        assert_eq!(
            index.type_for_data_file("weird-.thrd"),
            Err(ResolutionIssue::ReferenceInvalid("weird-.thrd".to_owned()))
        );
    }

    #[test]
    fn from_provider_reads_declarations() {
        let provider = InMemoryProvider::new()
            .with_file("/ws/types/Point.thrdtype", "#tuple[#float, #float]")
            .with_file("/ws/origin.Point.thrd", "(0.0, 0.0)");
        let index = TypeIndex::from_provider(&provider, Path::new("/ws")).expect("index");
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["Point"]);
        assert!(index.type_for_data_file("origin.Point.thrd").is_ok());
    }
}
