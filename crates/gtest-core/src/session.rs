//! The session owns everything discovery and runs depend on: configuration,
//! the current manifest index and the tracked documents. All mutation goes
//! through its `&mut self` methods.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::debug::DebugLaunch;
use crate::discovery::{discover, DocumentTestTree, TestCase, TestItem};
use crate::document::{Document, DocumentEvent, DocumentState, TreeEffect};
use crate::manifest::{normalize_path, ManifestError, ManifestIndex};
use crate::process::CommandRunner;
use crate::run::{RootSelection, RunObserver, RunOrchestrator, RunReport, RunRequest, RunSettings};

/// Receives the test tree changes of tracked documents.
pub trait TestExplorer: Send {
    /// Insert or replace the subtree of `tree.file`.
    fn publish(&mut self, tree: &DocumentTestTree);

    /// Remove the subtree of a file.
    fn remove(&mut self, file: &Path);
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to read {}: {source}", path.display())]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No discovered test matches {0:?}")]
    UnknownItem(TestItem),

    #[error("No build target compiles {}", .0.display())]
    Uncovered(PathBuf),
}

pub struct Session {
    config: Config,
    workspace_root: PathBuf,
    index: Arc<ManifestIndex>,
    documents: BTreeMap<PathBuf, Document>,
    explorer: Box<dyn TestExplorer>,
}

impl Session {
    /// Creates a session with an empty index. Call
    /// [`manifest_changed`](Self::manifest_changed) to load the manifest.
    pub fn new(
        config: Config,
        workspace_root: impl Into<PathBuf>,
        explorer: Box<dyn TestExplorer>,
    ) -> Self {
        let workspace_root = normalize_path(&workspace_root.into());
        let index = ManifestIndex::empty(config.build.build_folder(&workspace_root));
        Self {
            config,
            workspace_root,
            index: Arc::new(index),
            documents: BTreeMap::new(),
            explorer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Snapshot of the current index.
    pub fn index(&self) -> Arc<ManifestIndex> {
        Arc::clone(&self.index)
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings::from_config(&self.config.build, &self.workspace_root)
    }

    /// Rebuild the index from the manifest and drop documents it no longer
    /// covers.
    ///
    /// An unreadable manifest installs an empty index; the error is returned
    /// after the session has been reconciled against it.
    pub fn manifest_changed(&mut self) -> Result<usize, ManifestError> {
        let build_folder = self.config.build.build_folder(&self.workspace_root);
        let manifest = self.config.build.manifest_path(&self.workspace_root);

        let loaded = ManifestIndex::load(&manifest, &build_folder);
        let result = match loaded {
            Ok(index) => {
                let count = index.len();
                self.index = Arc::new(index);
                Ok(count)
            }
            Err(e) => {
                warn!(manifest = %manifest.display(), error = %e, "manifest unavailable; using empty index");
                self.index = Arc::new(ManifestIndex::empty(build_folder));
                Err(e)
            }
        };

        self.reconcile();
        result
    }

    fn reconcile(&mut self) {
        let uncovered: Vec<PathBuf> = self
            .documents
            .keys()
            .filter(|path| !self.index.contains(path))
            .cloned()
            .collect();

        for path in uncovered {
            if let Some(document) = self.documents.remove(&path) {
                info!(file = %path.display(), "document no longer covered by the manifest");
                let effect = document.close();
                self.apply(vec![effect]);
            }
        }
    }

    /// Absolute, normalized form of a document path.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.workspace_root.join(path))
        }
    }

    /// A document became visible with the given text. Returns false if no
    /// target compiles it; such documents are not tracked.
    pub fn document_activated(&mut self, path: &Path, text: &str) -> bool {
        let path = self.resolve_path(path);
        if !self.index.contains(&path) {
            debug!(file = %path.display(), "document not covered by the manifest");
            return false;
        }

        let document = self
            .documents
            .entry(path.clone())
            .or_insert_with(|| Document::new(path));
        if !document.needs_parse() {
            return true;
        }
        let effects = document.handle(DocumentEvent::Parsed(discover(text)));
        self.apply(effects);
        true
    }

    /// A document was saved; it is parsed again from `text`.
    pub fn document_saved(&mut self, path: &Path, text: &str) -> bool {
        let resolved = self.resolve_path(path);
        if let Some(document) = self.documents.get_mut(&resolved) {
            let effects = document.handle(DocumentEvent::Saved);
            self.apply(effects);
        }
        self.document_activated(&resolved, text)
    }

    /// A document was closed; its subtree is removed.
    pub fn document_closed(&mut self, path: &Path) {
        let path = self.resolve_path(path);
        if let Some(document) = self.documents.remove(&path) {
            let effect = document.close();
            self.apply(vec![effect]);
        }
    }

    /// Read a document from disk and activate it.
    pub async fn open_document(&mut self, path: &Path) -> Result<bool, SessionError> {
        let path = self.resolve_path(path);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SessionError::ReadDocument {
                path: path.clone(),
                source,
            })?;
        Ok(self.document_activated(&path, &text))
    }

    /// Open every source the manifest covers. Unreadable sources are skipped.
    pub async fn discover_all(&mut self) -> usize {
        let sources: Vec<PathBuf> = self.index.iter().map(|(p, _)| p.to_path_buf()).collect();
        for source in &sources {
            if let Err(e) = self.open_document(source).await {
                warn!(file = %source.display(), error = %e, "skipping source");
            }
        }
        self.documents.values().filter(|d| d.tree().is_some()).count()
    }

    pub fn document(&self, path: &Path) -> Option<&Document> {
        self.documents.get(&self.resolve_path(path))
    }

    /// Published trees, ordered by file.
    pub fn trees(&self) -> impl Iterator<Item = &DocumentTestTree> {
        self.documents.values().filter_map(Document::tree)
    }

    fn apply(&mut self, effects: Vec<TreeEffect>) {
        for effect in effects {
            match effect {
                TreeEffect::Publish(tree) => self.explorer.publish(&tree),
                TreeEffect::Remove(file) => self.explorer.remove(&file),
            }
        }
    }

    /// Resolve a request to per-document selections.
    pub fn resolve_run(&self, request: &RunRequest) -> Result<Vec<RootSelection>, SessionError> {
        match request {
            RunRequest::All => Ok(self
                .trees()
                .map(|tree| RootSelection {
                    file: tree.file.clone(),
                    target: self.index.get(&tree.file).cloned(),
                    cases: tree.cases().cloned().collect(),
                    whole_file: true,
                })
                .collect()),
            RunRequest::Items(items) => {
                let mut by_file: BTreeMap<PathBuf, Vec<TestItem>> = BTreeMap::new();
                for item in items {
                    let file = self.resolve_path(item.file());
                    by_file.entry(file).or_default().push(item.clone());
                }

                by_file
                    .into_iter()
                    .filter_map(|(file, items)| self.select(file, &items).transpose())
                    .collect()
            }
        }
    }

    /// Selection for the items of one file. Uncovered files resolve to a
    /// selection without a target so the run reports them as errored;
    /// documents without tests are skipped.
    fn select(
        &self,
        file: PathBuf,
        items: &[TestItem],
    ) -> Result<Option<RootSelection>, SessionError> {
        let Some(target) = self.index.get(&file).cloned() else {
            warn!(file = %file.display(), "no build target compiles the requested file");
            return Ok(Some(RootSelection {
                file,
                target: None,
                cases: Vec::new(),
                whole_file: true,
            }));
        };

        let document = self
            .documents
            .get(&file)
            .ok_or_else(|| SessionError::UnknownItem(items[0].clone()))?;
        let tree = match document.state() {
            DocumentState::TestsPresent(tree) => tree,
            DocumentState::TestsAbsent => {
                info!(file = %file.display(), "requested document has no tests");
                return Ok(None);
            }
            DocumentState::Start => return Err(SessionError::UnknownItem(items[0].clone())),
        };

        let mut cases: Vec<TestCase> = Vec::new();
        for item in items {
            let item = with_file(item, &file);
            let leaves = tree.leaves(&item);
            if leaves.is_empty() {
                return Err(SessionError::UnknownItem(item));
            }
            for leaf in leaves {
                if !cases.iter().any(|c| c.canonical_id == leaf.canonical_id) {
                    cases.push(leaf.clone());
                }
            }
        }

        let whole_file = cases.len() == tree.len();
        Ok(Some(RootSelection {
            file,
            target: Some(target),
            cases,
            whole_file,
        }))
    }

    /// Run a request. Cases are reported to `observer` as they finish.
    pub async fn run(
        &self,
        request: &RunRequest,
        runner: Arc<dyn CommandRunner>,
        observer: &mut dyn RunObserver,
        cancel: CancellationToken,
    ) -> Result<RunReport, SessionError> {
        let selections = self.resolve_run(request)?;
        let orchestrator = RunOrchestrator::new(runner, self.run_settings());
        Ok(orchestrator.run(selections, observer, cancel).await)
    }

    /// Debugger launch for a single case.
    pub fn debug_launch(&self, item: &TestItem) -> Result<DebugLaunch, SessionError> {
        let TestItem::Case { file, canonical_id } = item else {
            return Err(SessionError::UnknownItem(item.clone()));
        };
        let file = self.resolve_path(file);
        let case = self
            .documents
            .get(&file)
            .and_then(Document::tree)
            .and_then(|tree| tree.find_case(canonical_id))
            .ok_or_else(|| SessionError::UnknownItem(item.clone()))?;
        let target = self
            .index
            .get(&file)
            .ok_or_else(|| SessionError::Uncovered(file.clone()))?;

        Ok(DebugLaunch::for_case(
            case,
            target,
            self.index.build_folder(),
            &self.config.debugger.backend,
        ))
    }
}

/// The same selection, addressed through a normalized file path.
fn with_file(item: &TestItem, file: &Path) -> TestItem {
    match item {
        TestItem::File(_) => TestItem::File(file.to_path_buf()),
        TestItem::Fixture { fixture, .. } => TestItem::Fixture {
            file: file.to_path_buf(),
            fixture: fixture.clone(),
        },
        TestItem::Case { canonical_id, .. } => TestItem::Case {
            file: file.to_path_buf(),
            canonical_id: canonical_id.clone(),
        },
    }
}
