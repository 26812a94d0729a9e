//! Workspace registry: documents, their text sources and latest results.
//!
//! A [`Workspace`] owns everything known about one root folder: the disk
//! text of every tracked source, editor text for open documents, the
//! [`TypeIndex`] built from the declarations, and the last [`Analysis`] of
//! each document. Editor text wins over disk text while a document is open.
//!
//! Changes never refresh the whole workspace directly. They go through the
//! workspace's [`RefreshScheduler`]; the host polls it and republishes what
//! [`Workspace::poll`] returns.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use thrd_core::index::declaration_name;
use thrd_core::{
    analyze, Analysis, CompletionCandidate, Diagnostic, Hover, Position, Settings,
    SourceProvider, TextEdit, TypeIndex,
};
use tracing::{debug, warn};

use crate::scheduler::RefreshScheduler;

/// Diagnostics for one document, ready to publish.
pub type Published = (PathBuf, Vec<Diagnostic>);

#[derive(Debug, Clone, Default)]
struct Source {
    disk: Option<String>,
    editor: Option<String>,
}

impl Source {
    fn text(&self) -> &str {
        self.editor
            .as_deref()
            .or(self.disk.as_deref())
            .unwrap_or_default()
    }
}

fn is_declaration(path: &Path) -> bool {
    declaration_name(path).is_some()
}

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    settings: Settings,
    sources: BTreeMap<PathBuf, Source>,
    index: TypeIndex,
    index_stale: bool,
    /// Bumped whenever every cached result becomes outdated at once.
    generation: u64,
    results: HashMap<PathBuf, (u64, Analysis)>,
    scheduler: RefreshScheduler,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, settings: Settings) -> Self {
        let scheduler = RefreshScheduler::from_settings(&settings.refresh);
        Workspace {
            root: root.into(),
            settings,
            sources: BTreeMap::new(),
            index: TypeIndex::empty(),
            index_stale: true,
            generation: 0,
            results: HashMap::new(),
            scheduler,
        }
    }

    /// Create a workspace holding every tracked source under `root`.
    ///
    /// Unreadable sources are skipped with a warning.
    pub fn load(
        root: impl Into<PathBuf>,
        provider: &dyn SourceProvider,
        settings: Settings,
    ) -> Result<Self, thrd_core::Error> {
        let mut workspace = Self::new(root, settings);
        let paths = provider
            .list_sources(&workspace.root)
            .map_err(|source| thrd_core::Error::Io {
                path: workspace.root.clone(),
                source,
            })?;
        for path in paths {
            match provider.read_source(&path) {
                Ok(text) => {
                    workspace.sources.insert(
                        path,
                        Source {
                            disk: Some(text),
                            editor: None,
                        },
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable source"),
            }
        }
        debug!(
            root = %workspace.root.display(),
            sources = workspace.sources.len(),
            "workspace loaded"
        );
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings; every document is reanalyzed on the next refresh.
    pub fn set_settings(&mut self, settings: Settings, now: Instant) {
        if settings.refresh != self.settings.refresh {
            self.scheduler = RefreshScheduler::from_settings(&settings.refresh);
        }
        self.settings = settings;
        self.generation += 1;
        self.scheduler.schedule(now);
    }

    pub fn documents(&self) -> impl Iterator<Item = &Path> {
        self.sources.keys().map(PathBuf::as_path)
    }

    /// Current text of a document: editor text while open, disk text otherwise.
    pub fn text(&self, path: &Path) -> Option<&str> {
        self.sources.get(path).map(Source::text)
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.sources.get(path).is_some_and(|s| s.editor.is_some())
    }

    fn touched(&mut self, path: &Path, now: Instant) {
        if is_declaration(path) {
            self.index_stale = true;
        }
        self.scheduler.schedule(now);
    }

    // ── Disk events ──────────────────────────────────────────────────

    /// A source appeared on disk. A known source is treated as changed.
    pub fn add_source(&mut self, path: &Path, text: String, now: Instant) {
        if self.sources.contains_key(path) {
            self.change_source(path, text, now);
            return;
        }
        debug!(path = %path.display(), "source added");
        self.sources.insert(
            path.to_path_buf(),
            Source {
                disk: Some(text),
                editor: None,
            },
        );
        self.touched(path, now);
    }

    /// A source disappeared from disk. Returns whether it was known.
    ///
    /// A document still open in the editor stays, backed by its editor text.
    pub fn remove_source(&mut self, path: &Path, now: Instant) -> bool {
        let Some(source) = self.sources.get_mut(path) else {
            return false;
        };
        debug!(path = %path.display(), "source removed");
        if source.editor.is_some() {
            source.disk = None;
        } else {
            self.sources.remove(path);
            self.results.remove(path);
        }
        self.touched(path, now);
        true
    }

    /// New disk text for a known source. Returns whether it was known.
    pub fn change_source(&mut self, path: &Path, text_from_disk: String, now: Instant) -> bool {
        let Some(source) = self.sources.get_mut(path) else {
            return false;
        };
        debug!(path = %path.display(), open = source.editor.is_some(), "source changed on disk");
        source.disk = Some(text_from_disk);
        self.touched(path, now);
        true
    }

    // ── Editor events ────────────────────────────────────────────────

    /// The editor opened a document; it is validated right away.
    pub fn open_in_editor(&mut self, path: &Path, text: String, now: Instant) -> Vec<Diagnostic> {
        debug!(path = %path.display(), "opened in editor");
        self.edit_in_editor(path, text, now)
    }

    /// The editor holds new text for a document; it is validated right away
    /// and the rest of the workspace is refreshed through the scheduler.
    pub fn edit_in_editor(&mut self, path: &Path, text: String, now: Instant) -> Vec<Diagnostic> {
        self.sources.entry(path.to_path_buf()).or_default().editor = Some(text);
        self.touched(path, now);
        self.validate(path).unwrap_or_default()
    }

    /// The editor closed a document; it reverts to its disk text.
    ///
    /// A document that never existed on disk is forgotten.
    pub fn close_in_editor(&mut self, path: &Path, now: Instant) {
        let Some(source) = self.sources.get_mut(path) else {
            return;
        };
        debug!(path = %path.display(), "closed in editor");
        source.editor = None;
        if source.disk.is_none() {
            self.sources.remove(path);
            self.results.remove(path);
        }
        self.touched(path, now);
    }

    // ── Index and results ────────────────────────────────────────────

    /// Rebuild the type index if the declaration set changed.
    ///
    /// Every read of results goes through this first.
    pub fn ensure_index(&mut self) -> &TypeIndex {
        if self.index_stale {
            let declarations: Vec<(&str, &str)> = self
                .sources
                .iter()
                .filter_map(|(path, source)| Some((declaration_name(path)?, source.text())))
                .collect();
            self.index = TypeIndex::build(declarations);
            self.index_stale = false;
            self.generation += 1;
            debug!(
                root = %self.root.display(),
                types = self.index.len(),
                "type index rebuilt"
            );
        }
        &self.index
    }

    /// Latest analysis of `path`, reanalyzing it when outdated.
    pub fn analysis(&mut self, path: &Path) -> Option<&Analysis> {
        self.ensure_index();
        let source = self.sources.get(path)?;
        let text = source.text();
        let fresh = matches!(
            self.results.get(path),
            Some((generation, analysis))
                if *generation == self.generation && analysis.document.text == text
        );
        if !fresh {
            let analysis = analyze(
                &path.to_string_lossy(),
                text,
                &self.index,
                &self.settings,
            );
            self.results
                .insert(path.to_path_buf(), (self.generation, analysis));
        }
        self.results.get(path).map(|(_, analysis)| analysis)
    }

    pub fn validate(&mut self, path: &Path) -> Option<Vec<Diagnostic>> {
        self.analysis(path).map(|a| a.validate().to_vec())
    }

    /// Diagnostics of every document, reusing results that are still current.
    pub fn validate_all(&mut self) -> Vec<Published> {
        let paths: Vec<PathBuf> = self.sources.keys().cloned().collect();
        paths
            .into_iter()
            .filter_map(|path| {
                let diagnostics = self.validate(&path)?;
                Some((path, diagnostics))
            })
            .collect()
    }

    /// Reanalyze every document from scratch.
    pub fn refresh(&mut self) -> Vec<Published> {
        debug!(root = %self.root.display(), "refreshing workspace");
        self.results.clear();
        self.validate_all()
    }

    pub fn fix_all(&mut self, path: &Path) -> Option<Vec<TextEdit>> {
        self.analysis(path).map(Analysis::fix_all)
    }

    pub fn completions_at(&mut self, path: &Path, pos: Position) -> Vec<CompletionCandidate> {
        if self.analysis(path).is_none() {
            return Vec::new();
        }
        match self.results.get(path) {
            Some((_, analysis)) => analysis.completions_at(pos, &self.index),
            None => Vec::new(),
        }
    }

    pub fn hover_at(&mut self, path: &Path, pos: Position) -> Option<Hover> {
        self.analysis(path)?;
        let (_, analysis) = self.results.get(path)?;
        analysis.hover_at(pos, &self.index)
    }

    // ── Scheduling ───────────────────────────────────────────────────

    /// Run a scheduled refresh if one is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<Published>> {
        if self.scheduler.poll(now) {
            Some(self.refresh())
        } else {
            None
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }
}

/// Every open workspace, keyed by root.
#[derive(Debug, Default)]
pub struct Workspaces {
    workspaces: Vec<Workspace>,
}

impl Workspaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workspace, replacing one with the same root.
    pub fn add(&mut self, workspace: Workspace) {
        self.remove(workspace.root());
        debug!(root = %workspace.root().display(), "workspace added");
        self.workspaces.push(workspace);
    }

    pub fn remove(&mut self, root: &Path) -> Option<Workspace> {
        let at = self.workspaces.iter().position(|w| w.root() == root)?;
        debug!(root = %root.display(), "workspace removed");
        Some(self.workspaces.remove(at))
    }

    /// The innermost workspace whose root contains `path`.
    pub fn containing(&mut self, path: &Path) -> Option<&mut Workspace> {
        self.workspaces
            .iter_mut()
            .filter(|w| w.contains(path))
            .max_by_key(|w| w.root().components().count())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workspace> {
        self.workspaces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Workspace> {
        self.workspaces.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    /// Earliest deadline over every workspace's scheduler.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.workspaces.iter().filter_map(Workspace::next_deadline).min()
    }

    /// Refreshes due at `now`, across workspaces.
    pub fn poll(&mut self, now: Instant) -> Vec<Published> {
        self.workspaces
            .iter_mut()
            .filter_map(|w| w.poll(now))
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use thrd_core::{DiagnosticKind, InMemoryProvider};

    const POINT: &str = "#dict{\n    x: #int\n    y: #int\n}\n";

    fn workspace() -> Workspace {
        let provider = InMemoryProvider::new()
            .with_file("/ws/Point.thrdtype", POINT)
            .with_file("/ws/origin.Point.thrd", "{\n    x: 0\n    y: 0\n}\n");
        Workspace::load("/ws", &provider, Settings::default()).expect("load")
    }

    fn path(p: &str) -> PathBuf {
        PathBuf::from(p)
    }

    #[test]
    fn loaded_workspace_validates_clean() {
        let mut ws = workspace();
        assert_eq!(ws.documents().count(), 2);
        let published = ws.validate_all();
        assert!(
            published.iter().all(|(_, d)| d.is_empty()),
            "{published:?}"
        );
    }

    #[test]
    fn editor_text_wins_until_close() {
        let mut ws = workspace();
        let origin = path("/ws/origin.Point.thrd");
        let now = Instant::now();

        let diagnostics = ws.edit_in_editor(&origin, "{\n    x: 0\n}\n".into(), now);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MissingProperty);
        assert!(ws.is_open(&origin));

        // Disk changes are recorded but do not replace the editor text.
        assert!(ws.change_source(&origin, "{\n    x: 1\n    y: 1\n}\n".into(), now));
        assert_eq!(ws.text(&origin), Some("{\n    x: 0\n}\n"));

        ws.close_in_editor(&origin, now);
        assert_eq!(ws.text(&origin), Some("{\n    x: 1\n    y: 1\n}\n"));
        assert_eq!(ws.validate(&origin), Some(Vec::new()));
    }

    #[test]
    fn declaration_edits_rebuild_the_index() {
        let mut ws = workspace();
        let origin = path("/ws/origin.Point.thrd");
        let now = Instant::now();
        assert_eq!(ws.validate(&origin), Some(Vec::new()));

        ws.edit_in_editor(
            &path("/ws/Point.thrdtype"),
            "#dict{\n    x: #int\n    y: #int\n    z: #int\n}\n".into(),
            now,
        );
        let diagnostics = ws.validate(&origin).expect("known document");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MissingProperty);
    }

    #[test]
    fn removed_declaration_fails_resolution() {
        let mut ws = workspace();
        let origin = path("/ws/origin.Point.thrd");
        assert!(ws.remove_source(&path("/ws/Point.thrdtype"), Instant::now()));
        let diagnostics = ws.validate(&origin).expect("known document");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::TypeResolution);
        assert!(!ws.remove_source(&path("/ws/Point.thrdtype"), Instant::now()));
    }

    #[test]
    fn unsaved_document_is_forgotten_on_close() {
        let mut ws = workspace();
        let scratch = path("/ws/scratch.Point.thrd");
        ws.open_in_editor(&scratch, "{x: 1, y: 2}".into(), Instant::now());
        assert_eq!(ws.documents().count(), 3);
        ws.close_in_editor(&scratch, Instant::now());
        assert_eq!(ws.documents().count(), 2);
        assert_eq!(ws.validate(&scratch), None);
    }

    #[test]
    fn changes_refresh_through_the_scheduler() {
        let mut ws = workspace();
        let t0 = Instant::now();
        assert!(ws.next_deadline().is_none());

        ws.add_source(&path("/ws/far.Point.thrd"), "{x: 1}".into(), t0);
        let deadline = ws.next_deadline().expect("armed");
        assert!(ws.poll(t0).is_none());

        let published = ws.poll(deadline).expect("refresh fires");
        assert_eq!(published.len(), 3);
        let far = published
            .iter()
            .find(|(p, _)| p == &path("/ws/far.Point.thrd"))
            .expect("new source published");
        assert_eq!(far.1[0].kind, DiagnosticKind::MissingProperty);
        assert!(ws.poll(deadline + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn fix_all_and_cursor_features() {
        let mut ws = workspace();
        let origin = path("/ws/origin.Point.thrd");
        ws.edit_in_editor(&origin, "{\n    x: 0   \n    \n}\n".into(), Instant::now());

        let edits = ws.fix_all(&origin).expect("known document");
        assert!(!edits.is_empty());

        let labels: Vec<String> = ws
            .completions_at(&origin, Position::new(2, 4))
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, vec!["y"]);

        let hover = ws.hover_at(&origin, Position::new(1, 7)).expect("hover");
        assert_eq!(hover.text, "TYPEOF(<~>.x): #int");
    }

    #[test]
    fn innermost_workspace_owns_a_path() {
        let mut all = Workspaces::new();
        all.add(Workspace::new("/ws", Settings::default()));
        all.add(Workspace::new("/ws/nested", Settings::default()));
        let owner = all
            .containing(Path::new("/ws/nested/a.X.thrd"))
            .expect("owned");
        assert_eq!(owner.root(), Path::new("/ws/nested"));
        assert!(all.containing(Path::new("/elsewhere/a.X.thrd")).is_none());
        assert!(all.remove(Path::new("/ws")).is_some());
        assert_eq!(all.iter().count(), 1);
    }
}
