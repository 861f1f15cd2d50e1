//! Project manager – the orchestrator for all graph operations.
//!
//! The [`ProjectManager`] owns the file graph, the store and the capability
//! implementations. It tracks the active project and active file, and routes
//! every mutation through the right component:
//!
//! ```text
//! activate_project → loader (rows → tree) → scanner (disk → tree + rows)
//! apply_edits      → edit engine → history backup → disk → rows
//! delete           → history manager (soft delete) → cleanup (tree)
//! ```
//!
//! All mutation happens on the caller's thread. Only directory enumeration
//! is handed to the rayon pool by the scanner.

use std::fs;
use std::path::{Path, PathBuf};

use pfg_db::{ChangeKind, FileFilter, FileStore, HistoryRow, ReviewStatus, SqliteStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffers::BufferCache;
use crate::config::GlobalConfig;
use crate::db_adapter::{entity_from_row, entity_to_row, IntoPfgResult};
use crate::edit::{apply_changes, EditOutcome, FileChange};
use crate::entity::{Entity, Identity, NodeId};
use crate::errors::PfgError;
use crate::graph::FileGraph;
use crate::history::{now_secs, HistoryManager, ReapReport, RemoveReport};
use crate::ignore_rules::{GitIgnoreRules, IgnoreRules};
use crate::loader::{load_project, LoadReport};
use crate::notify::GraphEvent;
use crate::scanner::{looks_like_text, modified_secs, ScanReport, ScanToken, Scanner};
use crate::syntax::{OutlineSyntax, SyntaxProvider};

// ============================================================================
// Reports
// ============================================================================

/// Result of activating a project.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationReport {
    pub path: PathBuf,
    pub load: LoadReport,
    pub scan: ScanReport,
}

/// One registered project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub path: PathBuf,
    pub id: i64,
    pub active: bool,
    /// Text files in the projection (zero until the project is loaded).
    pub files: usize,
    pub review: usize,
}

// ============================================================================
// ProjectManager
// ============================================================================

pub struct ProjectManager {
    config: GlobalConfig,
    store: Box<dyn FileStore>,
    ignore: Box<dyn IgnoreRules>,
    syntax: Box<dyn SyntaxProvider>,
    graph: FileGraph,
    token: ScanToken,
    buffers: BufferCache,
    history: HistoryManager,
    active_project: Option<NodeId>,
    active_file: Option<NodeId>,
}

impl std::fmt::Debug for ProjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectManager")
            .field("config", &self.config)
            .field("entities", &self.graph.len())
            .field("active_project", &self.active_project)
            .field("active_file", &self.active_file)
            .finish_non_exhaustive()
    }
}

impl ProjectManager {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a manager over the given store and capabilities.
    ///
    /// Registered projects are made resident (roots only); their trees load
    /// on activation.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the project rows
    /// cannot be read.
    pub fn open(
        config: GlobalConfig,
        store: Box<dyn FileStore>,
        ignore: Box<dyn IgnoreRules>,
        syntax: Box<dyn SyntaxProvider>,
    ) -> Result<Self, PfgError> {
        for warning in config.validate()? {
            warn!("{}", warning);
        }

        let history = HistoryManager::new(config.history_dir(), config.history.clone());
        let buffers = BufferCache::new(config.buffers.keep_recent);
        let mut manager = Self {
            config,
            store,
            ignore,
            syntax,
            graph: FileGraph::new(),
            token: ScanToken::new(),
            buffers,
            history,
            active_project: None,
            active_file: None,
        };

        let rows = manager
            .store
            .select_files(&FileFilter::live().projects())
            .into_pfg()?;
        for row in &rows {
            manager.graph.add_root(entity_from_row(row));
        }
        debug!("Opened with {} registered projects", rows.len());
        Ok(manager)
    }

    /// Open the SQLite store at the configured location with git ignore
    /// rules and the outline syntax provider.
    pub fn open_default(config: GlobalConfig) -> Result<Self, PfgError> {
        let store = SqliteStore::open(config.database_path()).into_pfg()?;
        Self::open(
            config,
            Box::new(store),
            Box::new(GitIgnoreRules::new()),
            Box::new(OutlineSyntax),
        )
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn graph(&self) -> &FileGraph {
        &self.graph
    }

    pub fn store(&self) -> &dyn FileStore {
        self.store.as_ref()
    }

    pub fn buffers(&self) -> &BufferCache {
        &self.buffers
    }

    pub fn active_project(&self) -> Option<&Entity> {
        self.active_project.and_then(|n| self.graph.get(n))
    }

    pub fn active_file(&self) -> Option<&Entity> {
        self.active_file.and_then(|n| self.graph.get(n))
    }

    /// Resident entity at `path` (aliases resolved through the index).
    pub fn lookup(&self, path: &Path) -> Option<&Entity> {
        self.graph.lookup(path).and_then(|n| self.graph.get(n))
    }

    /// Register a change listener.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&GraphEvent) + Send + 'static,
    {
        self.graph.events_mut().subscribe(listener);
    }

    // -------------------------------------------------------------------------
    // Projects
    // -------------------------------------------------------------------------

    /// Register `path` as a project.
    ///
    /// # Errors
    ///
    /// Returns [`PfgError::PathNotFound`] if the path does not exist, or
    /// [`PfgError::InvalidPath`] if it is not a directory.
    pub fn create_project(&mut self, path: &Path) -> Result<NodeId, PfgError> {
        let path = canonical(path)?;
        if !path.is_dir() {
            return Err(PfgError::InvalidPath(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        if let Some(node) = self.graph.lookup(&path) {
            let Some(entity) = self.graph.get_mut(node) else {
                return Err(PfgError::PathNotFound(path.display().to_string()));
            };
            if !entity.is_folder() {
                return Err(PfgError::InvalidPath(path.display().to_string()));
            }
            if !entity.is_project() {
                entity.set_project(true);
                if entity.identity.is_untracked() {
                    entity.identity = Identity::New;
                }
                self.persist(node);
                self.flush();
            }
            info!("Registered project {}", path.display());
            return Ok(node);
        }

        let key = path.to_string_lossy();
        let entity = match self.store.find_by_path(&key).into_pfg()? {
            Some(mut row) => {
                row.is_project = true;
                self.store.update_file(&row, true).into_pfg()?;
                entity_from_row(&row)
            }
            None => {
                let mut entity = Entity::folder(&path);
                entity.set_project(true);
                let id = self.store.insert_file(&entity_to_row(&entity), true).into_pfg()?;
                entity.identity = Identity::Tracked(id);
                entity
            }
        };
        let node = self.graph.add_root(entity);
        info!("Registered project {}", path.display());
        Ok(node)
    }

    /// Registered projects, sorted by path.
    pub fn list_projects(&self) -> Vec<ProjectSummary> {
        self.graph
            .projects()
            .into_iter()
            .filter_map(|node| self.graph.get(node))
            .map(|entity| {
                let view = entity.project_view();
                ProjectSummary {
                    path: entity.path.clone(),
                    id: entity.identity.db_id_or_zero(),
                    active: Some(entity.node) == self.active_project,
                    files: view.map(|v| v.files.len()).unwrap_or(0),
                    review: view.map(|v| v.review.len()).unwrap_or(0),
                }
            })
            .collect()
    }

    /// Deepest registered project containing `path`.
    pub fn project_for(&self, path: &Path) -> Option<PathBuf> {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.graph
            .projects()
            .into_iter()
            .filter_map(|n| self.graph.get(n))
            .filter(|p| p.contains_path(&path))
            .max_by_key(|p| p.path.components().count())
            .map(|p| p.path.clone())
    }

    /// Load the project's tree from storage, reconcile it with the disk and
    /// make it the active project.
    ///
    /// # Errors
    ///
    /// Returns [`PfgError::ProjectNotFound`] if `path` is not registered, or
    /// [`PfgError::ScanFailed`] if the project root cannot be read.
    pub fn activate_project(&mut self, path: &Path) -> Result<ActivationReport, PfgError> {
        let node = self.project_node(path)?;
        let load = load_project(&mut self.graph, self.store.as_ref(), node)?;
        let scan = self.scan(node, true)?;

        if self.active_project != Some(node) {
            if let Some(previous) = self.active_project.and_then(|n| self.graph.get_mut(n)) {
                previous.is_active = false;
            }
            if let Some(entity) = self.graph.get_mut(node) {
                entity.is_active = true;
            }
            self.active_project = Some(node);
            let path = self.graph.get(node).map(|e| e.path.clone());
            self.graph
                .events()
                .emit(GraphEvent::ActiveProjectChanged { path });
        }

        let path = self
            .graph
            .get(node)
            .map(|e| e.path.clone())
            .unwrap_or_default();
        info!(
            "Activated {} ({} loaded, {} scan mutations)",
            path.display(),
            load.loaded,
            scan.mutations()
        );
        Ok(ActivationReport { path, load, scan })
    }

    /// Rescan the active project.
    pub fn rescan(&mut self) -> Result<ScanReport, PfgError> {
        let project = self.active_project.ok_or(PfgError::NoActiveProject)?;
        self.scan(project, true)
    }

    /// Rescan one resident folder of the active project.
    pub fn rescan_folder(&mut self, path: &Path, recurse: bool) -> Result<ScanReport, PfgError> {
        self.active_project.ok_or(PfgError::NoActiveProject)?;
        let node = self
            .graph
            .lookup(path)
            .and_then(|n| self.graph.tree().resolve(n))
            .filter(|n| self.graph.get(*n).is_some_and(Entity::is_folder))
            .ok_or_else(|| PfgError::PathNotFound(path.display().to_string()))?;
        self.scan(node, recurse)
    }

    /// Clear the active project and file.
    pub fn deactivate(&mut self) {
        if let Some(previous) = self.active_project.take() {
            if let Some(entity) = self.graph.get_mut(previous) {
                entity.is_active = false;
            }
            self.graph
                .events()
                .emit(GraphEvent::ActiveProjectChanged { path: None });
        }
        self.set_active_file(None);
    }

    fn project_node(&self, path: &Path) -> Result<NodeId, PfgError> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.graph
            .lookup(&canonical)
            .filter(|n| self.graph.get(*n).is_some_and(Entity::is_project))
            .ok_or_else(|| PfgError::ProjectNotFound(path.display().to_string()))
    }

    fn scan(&mut self, folder: NodeId, recurse: bool) -> Result<ScanReport, PfgError> {
        let report = Scanner::new(
            &mut self.graph,
            self.store.as_mut(),
            self.ignore.as_ref(),
            &self.config.scan,
            &self.token,
        )
        .run(folder, recurse)?;
        self.restamp();
        Ok(report)
    }

    /// The tree now mirrors the store; record that so the next activation
    /// skips the reload.
    fn restamp(&mut self) {
        let stamp = match self.store.stamp() {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!("Failed to read store stamp: {}", e);
                return;
            }
        };
        for project in self.graph.projects() {
            if let Some(view) = self.graph.get_mut(project).and_then(Entity::project_view_mut) {
                if view.loaded_stamp.is_some() {
                    view.loaded_stamp = Some(stamp);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    /// Resident file entity for `path`, creating it when needed.
    ///
    /// Files under a loaded folder of a project are tracked and stored.
    /// Anything else becomes an untracked in-memory entity, promoted by the
    /// scanner once its folder is scanned as part of a project.
    pub fn open_file(&mut self, path: &Path) -> Result<NodeId, PfgError> {
        if let Some(node) = self.graph.lookup(path) {
            return self.resolve_file(node, path);
        }
        let path = canonical(path)?;
        if let Some(node) = self.graph.lookup(&path) {
            return self.resolve_file(node, &path);
        }

        let meta = fs::metadata(&path)?;
        if meta.is_dir() {
            return Err(PfgError::InvalidPath(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let mut entity = Entity::file(&path);
        entity.last_modified = modified_secs(&meta);
        entity.is_text = looks_like_text(&path);

        let tracked_parent = path
            .parent()
            .and_then(|p| self.graph.lookup(p))
            .filter(|p| {
                self.graph
                    .get(*p)
                    .is_some_and(|e| e.is_folder() && e.identity.db_id().is_some())
                    && self.graph.containing_project(*p).is_some()
            });

        let node = match tracked_parent {
            Some(parent) => {
                let node = self.graph.add_child(parent, entity);
                self.persist(node);
                self.flush();
                if let Some(project) = self.graph.containing_project(node) {
                    self.graph.refresh_projection(project);
                }
                node
            }
            None => {
                debug!("Opening {} untracked", path.display());
                entity.identity = Identity::Untracked;
                self.graph.add_root(entity)
            }
        };
        Ok(node)
    }

    fn resolve_file(&self, node: NodeId, path: &Path) -> Result<NodeId, PfgError> {
        let resolved = self.graph.tree().resolve(node).unwrap_or(node);
        match self.graph.get(resolved) {
            Some(e) if e.is_file() && !e.is_deleted() => Ok(resolved),
            Some(e) if e.is_deleted() => Err(PfgError::PathNotFound(path.display().to_string())),
            _ => Err(PfgError::InvalidPath(format!(
                "{} is not a file",
                path.display()
            ))),
        }
    }

    /// Make `path` the active file: update `last_viewed`, keep its buffer
    /// resident and release buffers outside the retention policy.
    pub fn activate_file(&mut self, path: &Path) -> Result<NodeId, PfgError> {
        let node = self.open_file(path)?;
        let now = now_secs();
        if let Some(entity) = self.graph.get_mut(node) {
            entity.last_viewed = now;
        }
        self.persist(node);
        self.flush();

        self.buffers.touch(node);
        self.buffers.open(node);
        if let Some(previous) = self.active_file.filter(|p| *p != node) {
            self.buffers.close(previous);
        }
        self.buffers.evict();
        self.set_active_file(Some(node));
        Ok(node)
    }

    fn set_active_file(&mut self, node: Option<NodeId>) {
        if self.active_file == node {
            return;
        }
        if let Some(previous) = self.active_file.and_then(|n| self.graph.get_mut(n)) {
            previous.is_active = false;
        }
        if let Some(entity) = node.and_then(|n| self.graph.get_mut(n)) {
            entity.is_active = true;
        }
        self.active_file = node;
        let path = node.and_then(|n| self.graph.get(n)).map(|e| e.path.clone());
        self.graph
            .events()
            .emit(GraphEvent::ActiveFileChanged { path });
    }

    /// Current text of `path` (the buffer copy when resident).
    pub fn file_content(&mut self, path: &Path) -> Result<String, PfgError> {
        let node = self.open_file(path)?;
        let real = self.entity_path(node)?;
        Ok(self.buffers.get(node, &real)?.content().to_string())
    }

    fn entity_path(&self, node: NodeId) -> Result<PathBuf, PfgError> {
        self.graph
            .get(node)
            .map(|e| e.path.clone())
            .ok_or_else(|| PfgError::PathNotFound(format!("{}", node)))
    }

    // -------------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------------

    /// Apply a batch of changes to one file.
    ///
    /// On success the previous content is backed up and recorded as a
    /// `modified` history entry, the new content is written, and the file's
    /// `last_modified`/`last_viewed` are refreshed. Per-change failures are
    /// reported on the changes themselves.
    ///
    /// # Errors
    ///
    /// Returns [`PfgError::EditOutOfRange`] or [`PfgError::EditFailed`] when
    /// the batch is rejected; the file is untouched in that case.
    pub fn apply_edits(
        &mut self,
        path: &Path,
        changes: &mut [FileChange],
    ) -> Result<EditOutcome, PfgError> {
        let node = self.open_file(path)?;
        let real = self.entity_path(node)?;
        let content = self.buffers.get(node, &real)?.content().to_string();

        let outcome = apply_changes(&real, &content, changes, self.syntax.as_ref())?;
        if !outcome.changed() {
            return Ok(outcome);
        }

        let now = now_secs();
        let filebase_id = self
            .graph
            .get(node)
            .map(|e| e.identity.db_id_or_zero())
            .unwrap_or(0);
        self.history.record(
            self.store.as_mut(),
            &real,
            filebase_id,
            now,
            ChangeKind::Modified,
        )?;

        fs::write(&real, &outcome.content).map_err(|e| PfgError::edit_failed(&real, e))?;
        let mtime = fs::metadata(&real).map(|m| modified_secs(&m)).unwrap_or(now);
        self.buffers
            .mark_saved(node, &real, outcome.content.clone(), mtime);

        if let Some(entity) = self.graph.get_mut(node) {
            entity.last_modified = mtime;
            entity.last_viewed = now;
            if let Some(meta) = entity.file_meta_mut() {
                meta.is_unsaved = false;
            }
        }
        self.persist(node);
        self.flush();

        info!(
            "Applied {} changes to {} ({} failed)",
            outcome.applied,
            real.display(),
            outcome.failed
        );
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Delete and history
    // -------------------------------------------------------------------------

    /// Soft-delete `path` (recursively for folders). The entities stay
    /// resident until [`ProjectManager::cleanup`].
    pub fn delete(&mut self, path: &Path) -> Result<RemoveReport, PfgError> {
        let node = self
            .graph
            .lookup(path)
            .or_else(|| fs::canonicalize(path).ok().and_then(|p| self.graph.lookup(&p)))
            .ok_or_else(|| PfgError::PathNotFound(path.display().to_string()))?;

        let mut affected = self.graph.tree().descendants_post_order(node);
        affected.push(node);

        let report = self
            .history
            .remove(&mut self.graph, self.store.as_mut(), node, now_secs())?;

        for gone in &affected {
            self.buffers.forget(*gone);
        }
        if self.active_file.is_some_and(|f| affected.contains(&f)) {
            self.set_active_file(None);
        }
        if self.active_project.is_some_and(|p| affected.contains(&p)) {
            self.deactivate();
        }
        Ok(report)
    }

    /// Evict deleted entities from memory. Returns how many were evicted.
    pub fn cleanup(&mut self) -> usize {
        self.history.cleanup(&mut self.graph)
    }

    /// Run the history reaper.
    pub fn reap(&mut self, force: bool) -> Result<ReapReport, PfgError> {
        self.history.reap(self.store.as_mut(), now_secs(), force)
    }

    /// Most recent history records first.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryRow>, PfgError> {
        self.store.list_history(limit).into_pfg()
    }

    /// Move a file or folder on disk and in the graph.
    pub fn move_entity(&mut self, from: &Path, to: &Path) -> Result<NodeId, PfgError> {
        let node = self
            .graph
            .lookup(from)
            .ok_or_else(|| PfgError::PathNotFound(from.display().to_string()))?;
        let old_path = self.entity_path(node)?;
        let to = match (to.parent(), to.file_name()) {
            (Some(dir), Some(name)) => canonical(dir)?.join(name),
            _ => return Err(PfgError::InvalidPath(to.display().to_string())),
        };
        if to.exists() {
            return Err(PfgError::InvalidPath(format!(
                "{} already exists",
                to.display()
            )));
        }

        fs::rename(&old_path, &to)?;
        self.graph.detach(node);
        self.graph.rename(node, &to);
        match to.parent().and_then(|p| self.graph.lookup(p)) {
            Some(parent) => self.graph.adopt(parent, node),
            None => {
                if let Some(entity) = self.graph.get_mut(node) {
                    entity.parent_id = 0;
                }
            }
        }

        let mut affected = self.graph.tree().descendants_post_order(node);
        affected.push(node);
        for current in affected {
            self.persist(current);
        }

        let now = now_secs();
        let id = self
            .graph
            .get(node)
            .map(|e| e.identity.db_id_or_zero())
            .unwrap_or(0);
        let mut moved_out = HistoryRow::new(old_path.to_string_lossy(), id, now, ChangeKind::Modified);
        moved_out.moved_to = to.to_string_lossy().into_owned();
        let mut moved_in = HistoryRow::new(to.to_string_lossy(), id, now, ChangeKind::Added);
        moved_in.moved_from = old_path.to_string_lossy().into_owned();
        for row in [moved_out, moved_in] {
            if let Err(e) = self.store.insert_history(&row, false) {
                warn!("Failed to record move of {}: {}", old_path.display(), e);
            }
        }
        self.flush();
        self.graph.refresh_all_projections();

        info!("Moved {} to {}", old_path.display(), to.display());
        Ok(node)
    }

    // -------------------------------------------------------------------------
    // Projections and review
    // -------------------------------------------------------------------------

    /// Text files of the active project.
    pub fn project_files(&self) -> Result<Vec<&Entity>, PfgError> {
        let view = self.active_view()?;
        Ok(view.files.iter().filter_map(|n| self.graph.get(*n)).collect())
    }

    /// Files of the active project awaiting review.
    pub fn review_files(&self) -> Result<Vec<&Entity>, PfgError> {
        let view = self.active_view()?;
        Ok(view.review.iter().filter_map(|n| self.graph.get(*n)).collect())
    }

    fn active_view(&self) -> Result<&crate::entity::ProjectView, PfgError> {
        self.active_project()
            .and_then(Entity::project_view)
            .ok_or(PfgError::NoActiveProject)
    }

    /// Flag or unflag a file as awaiting review.
    pub fn mark_needs_approval(&mut self, path: &Path, needs_approval: bool) -> Result<(), PfgError> {
        let node = self.open_file(path)?;
        self.set_needs_approval(node, needs_approval);
        Ok(())
    }

    fn set_needs_approval(&mut self, node: NodeId, needs_approval: bool) {
        let Some(entity) = self.graph.get_mut(node) else {
            return;
        };
        if entity.needs_approval == needs_approval {
            return;
        }
        entity.needs_approval = needs_approval;
        self.persist(node);
        self.flush();
        if let Some(project) = self.graph.containing_project(node) {
            self.graph.refresh_projection(project);
        }
    }

    /// Record a review decision. Approval clears the file's
    /// `needs_approval` flag.
    pub fn set_review_status(&mut self, history_id: i64, status: ReviewStatus) -> Result<(), PfgError> {
        let record = self
            .store
            .get_history(history_id)
            .into_pfg()?
            .ok_or(PfgError::HistoryNotFound(history_id))?;
        self.store
            .update_history_status(history_id, status)
            .into_pfg()?;

        if status == ReviewStatus::Approved {
            let node = self
                .graph
                .tree()
                .iter()
                .find(|e| record.filebase_id != 0 && e.identity == Identity::Tracked(record.filebase_id))
                .map(|e| e.node)
                .or_else(|| self.graph.lookup(Path::new(&record.path)));
            if let Some(node) = node {
                self.set_needs_approval(node, false);
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Storage helpers
    // -------------------------------------------------------------------------

    /// Write an entity's row. Failures are logged.
    fn persist(&mut self, node: NodeId) {
        let Some(entity) = self.graph.get(node) else {
            return;
        };
        let row = entity_to_row(entity);
        match entity.identity {
            Identity::Untracked => {}
            Identity::Tracked(_) => {
                if let Err(e) = self.store.update_file(&row, false) {
                    warn!("Failed to store {}: {}", row.path, e);
                }
            }
            Identity::New => match self.store.insert_file(&row, false) {
                Ok(id) => {
                    if let Some(entity) = self.graph.get_mut(node) {
                        entity.identity = Identity::Tracked(id);
                    }
                }
                Err(e) => warn!("Failed to store {}: {}", row.path, e),
            },
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.store.flush() {
            warn!("Failed to flush store: {}", e);
        }
    }
}

fn canonical(path: &Path) -> Result<PathBuf, PfgError> {
    fs::canonicalize(path).map_err(|_| PfgError::PathNotFound(path.display().to_string()))
}
