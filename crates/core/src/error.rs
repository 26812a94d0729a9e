use std::path::PathBuf;

use serde::Serialize;

/// Why a type name could not be turned into a usable spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "issue", content = "name", rename_all = "kebab-case")]
pub enum ResolutionIssue {
    /// No declaration exists for the name.
    #[error("could not find a type declaration for \"{0}\"")]
    CouldNotFind(String),

    /// More than one declaration file declares the name.
    #[error("type \"{0}\" is declared more than once")]
    ConflictingDeclarations(String),

    /// The declaration exists but does not describe a valid type.
    #[error("the declaration of type \"{0}\" is defective")]
    DefectiveDeclaration(String),

    /// No type name can be derived from the document's file name.
    #[error("cannot derive a type name from \"{0}\"")]
    ReferenceInvalid(String),
}

/// Operational failures. Malformed documents are never reported this way.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
