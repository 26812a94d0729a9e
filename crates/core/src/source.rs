//! Source provider abstraction for loading workspace documents.
//!
//! The [`SourceProvider`] trait keeps file I/O out of the analysis core.
//! [`FileSystemProvider`] reads from disk; [`InMemoryProvider`] serves tests
//! and editors that hold document text themselves.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::index::{DATA_EXTENSION, DECLARATION_EXTENSION};

/// Whether `path` has one of the extensions the analyzer tracks.
pub fn is_tracked(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(DATA_EXTENSION | DECLARATION_EXTENSION)
    )
}

pub trait SourceProvider {
    /// Read the text of one source.
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error>;

    /// Every tracked source under `root`, in a stable order.
    fn list_sources(&self, root: &Path) -> Result<Vec<PathBuf>, std::io::Error>;
}

/// Reads sources from disk, skipping hidden directories and `target/`.
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error> {
        std::fs::read_to_string(path)
    }

    fn list_sources(&self, root: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut found = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if dir == root => return Err(e),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                    continue;
                }
            };
            for entry in entries {
                let path = entry?.path();
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if path.is_dir() {
                    if !name.starts_with('.') && name != "target" {
                        pending.push(path);
                    }
                } else if is_tracked(&path) {
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Maps paths to source text without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    files: BTreeMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files
            .insert(Self::normalize_path(path.as_ref()), text.into());
    }

    /// Resolve `.` and `..` components without touching the filesystem.
    fn normalize_path(path: &Path) -> PathBuf {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    components.pop();
                }
                other => components.push(other),
            }
        }
        components.iter().collect()
    }
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error> {
        let normalized = Self::normalize_path(path);
        self.files.get(&normalized).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found in memory: {}", normalized.display()),
            )
        })
    }

    fn list_sources(&self, root: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
        let root = Self::normalize_path(root);
        Ok(self
            .files
            .keys()
            .filter(|path| path.starts_with(&root) && is_tracked(path))
            .cloned()
            .collect())
    }
}
