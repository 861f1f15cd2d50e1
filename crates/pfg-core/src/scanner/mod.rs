//! Directory scanner.
//!
//! Reconciles the in-memory graph (and its storage rows) with the live
//! filesystem, one folder at a time:
//!
//! 1. Skip folders already visited in this pass (cycle guard).
//! 2. Honour the generated-subtree marker; otherwise discover repositories.
//! 3. Enumerate entries, optionally on the rayon pool.
//! 4. Diff entries against the folder's children by name.
//! 5. Queue child folders (and folder aliases) for the same treatment.
//!
//! Enumeration is the only work done off the calling thread. Diffing, tree
//! mutation and storage writes all happen on the scanner's thread, and
//! descent is a FIFO continuation queue rather than parallel fan-out.

mod enumerate;

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pfg_db::FileStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::constants::is_always_ignored;
use crate::db_adapter::{entity_from_row, entity_to_row};
use crate::entity::{Entity, Identity, NodeId, RepoState};
use crate::errors::PfgError;
use crate::graph::FileGraph;
use crate::ignore_rules::IgnoreRules;

pub(crate) use enumerate::looks_like_text;
pub(crate) use enumerate::modified_secs;
use enumerate::{enumerate_dir, enumerate_offloaded, EntryKind, Listing, ScannedEntry};

// ============================================================================
// Scan pass tokens
// ============================================================================

/// Source of monotonically increasing scan pass tokens.
///
/// Starting a pass invalidates every earlier one; a running scan checks
/// between folders whether its token is still current and stops if not.
/// Clones share the counter, so another thread can cancel a running scan.
#[derive(Debug, Clone, Default)]
pub struct ScanToken {
    current: Arc<AtomicU64>,
}

impl ScanToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new pass and return its token.
    pub fn next_pass(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, pass: u64) -> bool {
        self.current.load(Ordering::SeqCst) == pass
    }

    /// Invalidate any running pass.
    pub fn cancel(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// ScanReport
// ============================================================================

/// Summary of one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub pass: u64,
    pub folders_scanned: usize,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// Folders whose enumeration failed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Symlinks skipped as dangling or outside the allowed root.
    pub rejected_links: Vec<PathBuf>,
    /// The pass was superseded before finishing.
    pub cancelled: bool,
}

impl ScanReport {
    /// Number of tree mutations performed.
    pub fn mutations(&self) -> usize {
        self.inserted + self.updated + self.removed
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// One scan pass over part of the graph.
pub struct Scanner<'a> {
    graph: &'a mut FileGraph,
    store: &'a mut dyn FileStore,
    ignore: &'a dyn IgnoreRules,
    config: &'a ScanConfig,
    token: ScanToken,
    pass: u64,
    allowed_root: Option<PathBuf>,
    report: ScanReport,
}

impl<'a> Scanner<'a> {
    /// Prepare a pass. A fresh token is drawn from `token`.
    pub fn new(
        graph: &'a mut FileGraph,
        store: &'a mut dyn FileStore,
        ignore: &'a dyn IgnoreRules,
        config: &'a ScanConfig,
        token: &ScanToken,
    ) -> Self {
        let allowed_root = config
            .effective_allowed_root()
            .map(|root| std::fs::canonicalize(&root).unwrap_or(root));
        let pass = token.next_pass();
        Self {
            graph,
            store,
            ignore,
            config,
            token: token.clone(),
            pass,
            allowed_root,
            report: ScanReport {
                pass,
                ..ScanReport::default()
            },
        }
    }

    /// Scan `root`, and with `recurse` everything reachable below it.
    ///
    /// # Errors
    ///
    /// Returns [`PfgError::ScanFailed`] when `root` itself cannot be
    /// enumerated. Failures of descendant folders are collected in
    /// [`ScanReport::failed`] and leave already-processed folders intact.
    pub fn run(mut self, root: NodeId, recurse: bool) -> Result<ScanReport, PfgError> {
        let mut queue = VecDeque::from([root]);

        while let Some(folder) = queue.pop_front() {
            if !self.token.is_current(self.pass) {
                info!("Scan pass {} superseded, stopping", self.pass);
                self.report.cancelled = true;
                break;
            }
            match self.scan_folder(folder) {
                Ok(subfolders) => {
                    if recurse {
                        queue.extend(subfolders);
                    }
                }
                Err(err) if folder == root => {
                    self.finish();
                    return Err(err);
                }
                Err(err) => {
                    let path = self
                        .graph
                        .get(folder)
                        .map(|e| e.path.clone())
                        .unwrap_or_default();
                    warn!("{}", err);
                    self.report.failed.push((path, err.to_string()));
                }
            }
        }

        self.finish();
        info!(
            "Scan pass {}: {} folders, {} inserted, {} updated, {} removed",
            self.pass,
            self.report.folders_scanned,
            self.report.inserted,
            self.report.updated,
            self.report.removed
        );
        Ok(self.report)
    }

    fn finish(&mut self) {
        self.graph.refresh_all_projections();
        if let Err(e) = self.store.flush() {
            warn!("Failed to flush scan writes: {}", e);
        }
    }

    /// Reconcile one folder. Returns the folders to descend into.
    fn scan_folder(&mut self, folder: NodeId) -> Result<Vec<NodeId>, PfgError> {
        let Some(entity) = self.graph.get_mut(folder) else {
            return Ok(Vec::new());
        };
        let folder_path = entity.path.clone();
        let Some(meta) = entity.folder_meta_mut() else {
            return Ok(Vec::new());
        };
        if meta.scan_pass == self.pass {
            debug!("Already scanned {} in pass {}", folder_path.display(), self.pass);
            return Ok(Vec::new());
        }
        meta.scan_pass = self.pass;

        let listing = self.enumerate(&folder_path)?;
        self.report.folders_scanned += 1;
        self.report
            .rejected_links
            .extend(listing.rejected.iter().cloned());

        let folder_ignored = self.refresh_folder_state(folder, &folder_path, &listing);
        let workdir = if folder_ignored {
            None
        } else {
            self.ignore.workdir_path(&folder_path)
        };

        let (parent_id, child_identity) = match self.graph.get(folder) {
            Some(e) if e.identity.is_untracked() => (0, Identity::Untracked),
            Some(e) => (e.identity.db_id_or_zero(), Identity::New),
            None => (0, Identity::New),
        };

        let mut previous: HashMap<String, NodeId> = self
            .graph
            .tree()
            .children(folder)
            .into_iter()
            .filter_map(|c| self.graph.get(c).map(|e| (e.name().to_string(), c)))
            .collect();

        let mut subfolders = Vec::new();
        for entry in &listing.entries {
            let mut fresh = self.fresh_entity(entry, folder_ignored, workdir.as_deref());
            fresh.parent_id = parent_id;
            fresh.identity = child_identity;

            let node = self.reconcile_entry(folder, previous.remove(&entry.name), fresh);

            let descend = match &entry.kind {
                EntryKind::Alias {
                    target,
                    target_is_dir,
                    target_modified,
                    target_is_text,
                } => {
                    let target = self.link_alias(node, target, *target_is_dir, *target_modified, *target_is_text);
                    match target {
                        Some(t) if *target_is_dir => Some(t),
                        _ => None,
                    }
                }
                EntryKind::Folder => Some(node),
                EntryKind::File { .. } => None,
            };
            if let Some(next) = descend {
                let ignored = self.graph.get(node).is_none_or(|e| e.is_ignored)
                    || self.graph.get(next).is_none_or(|e| e.is_ignored);
                if !ignored {
                    subfolders.push(next);
                }
            }
        }

        for (name, node) in previous {
            debug!("{} vanished from {}", name, folder_path.display());
            self.remove_subtree(node);
        }

        Ok(subfolders)
    }

    fn enumerate(&self, dir: &Path) -> Result<Listing, PfgError> {
        let marker = self.config.generated_marker.as_str();
        let root = self.allowed_root.as_deref();
        let result = if self.config.offload_enumeration {
            enumerate_offloaded(dir, root, marker)
        } else {
            enumerate_dir(dir, root, marker)
        };
        result.map_err(|e| PfgError::scan_failed(dir, e))
    }

    /// Apply the generated marker and repository discovery to the folder
    /// itself. Returns whether the folder is ignored.
    fn refresh_folder_state(&mut self, folder: NodeId, path: &Path, listing: &Listing) -> bool {
        let Some(entity) = self.graph.get(folder) else {
            return false;
        };
        // Child folders get the flag from their parent's listing; a root has
        // no parent pass, so its flag follows the marker alone.
        let mut ignored = if entity.parent.is_none() {
            false
        } else {
            entity.is_ignored
        };
        let mut repo = entity.repo;

        if listing.has_generated_marker {
            ignored = true;
        } else {
            let found = self.ignore.repository_exists(path);
            repo = if found { RepoState::Yes } else { RepoState::No };
            if found {
                self.ignore.refresh(path);
            }
        }

        let Some(entity) = self.graph.get_mut(folder) else {
            return ignored;
        };
        if entity.is_ignored != ignored || entity.repo != repo {
            entity.is_ignored = ignored;
            entity.repo = repo;
            debug!("Folder state changed for {}", path.display());
            self.persist(folder);
        }
        ignored
    }

    fn fresh_entity(&self, entry: &ScannedEntry, folder_ignored: bool, workdir: Option<&Path>) -> Entity {
        let mut fresh = match &entry.kind {
            EntryKind::File { is_text } => {
                let mut e = Entity::file(&entry.path);
                e.is_text = *is_text;
                e
            }
            EntryKind::Folder => {
                let mut e = Entity::folder(&entry.path);
                e.is_ignored = entry.path.join(&self.config.generated_marker).exists();
                e
            }
            EntryKind::Alias { target, .. } => Entity::alias(&entry.path, target),
        };
        fresh.last_modified = entry.modified;
        fresh.is_ignored = fresh.is_ignored
            || folder_ignored
            || is_always_ignored(&entry.name)
            || workdir.is_some_and(|w| {
                entry
                    .path
                    .strip_prefix(w)
                    .is_ok_and(|rel| self.ignore.path_is_ignored(w, rel, entry.is_dir()))
            });
        fresh
    }

    /// Merge `fresh` into the tree as a child of `folder`.
    fn reconcile_entry(&mut self, folder: NodeId, previous: Option<NodeId>, mut fresh: Entity) -> NodeId {
        if let Some(old_node) = previous {
            let Some(old) = self.graph.get(old_node).cloned() else {
                return self.insert_child(folder, fresh);
            };
            if !old.same_identity(&fresh) {
                debug!("{} changed kind, replacing", fresh.path.display());
                self.remove_subtree(old_node);
                return self.insert_child(folder, fresh);
            }
            let changed = fresh.absorb_stored(&old);
            let promote = old.identity.is_untracked() && !self.folder_is_untracked(folder);
            if promote {
                fresh.identity = Identity::New;
            }
            if let Some(slot) = self.graph.get_mut(old_node) {
                *slot = fresh;
            }
            if changed || promote {
                self.persist(old_node);
                self.report.updated += 1;
            }
            return old_node;
        }

        // A resident but unlinked entity at this path (an alias target seen
        // before its parent, or an untracked file) is adopted, not duplicated.
        if let Some(existing) = self.graph.index().get(&fresh.path) {
            let adoptable = self
                .graph
                .get(existing)
                .is_some_and(|e| e.parent.is_none() && e.same_identity(&fresh));
            if adoptable {
                if let Some(old) = self.graph.get(existing).cloned() {
                    fresh.absorb_stored(&old);
                    if old.identity.is_untracked() && !self.folder_is_untracked(folder) {
                        fresh.identity = Identity::New;
                    }
                    fresh.parent = None;
                    if let Some(slot) = self.graph.get_mut(existing) {
                        *slot = fresh;
                    }
                    self.graph.adopt(folder, existing);
                    self.persist(existing);
                    self.report.updated += 1;
                    return existing;
                }
            }
        }

        self.insert_child(folder, fresh)
    }

    fn folder_is_untracked(&self, folder: NodeId) -> bool {
        self.graph
            .get(folder)
            .is_some_and(|f| f.identity.is_untracked())
    }

    fn insert_child(&mut self, folder: NodeId, fresh: Entity) -> NodeId {
        debug!("New entry {}", fresh.path.display());
        let node = self.graph.add_child(folder, fresh);
        self.persist(node);
        self.report.inserted += 1;
        node
    }

    /// Resolve an alias to its (shared) target entity, creating the target
    /// when it is not resident yet.
    fn link_alias(
        &mut self,
        alias: NodeId,
        target_path: &Path,
        target_is_dir: bool,
        target_modified: i64,
        target_is_text: bool,
    ) -> Option<NodeId> {
        let target = match self.graph.index().get(target_path) {
            Some(existing) => existing,
            None => {
                let stored = match self.store.find_by_path(&target_path.to_string_lossy()) {
                    Ok(row) => row,
                    Err(e) => {
                        warn!("Failed to look up {}: {}", target_path.display(), e);
                        None
                    }
                };
                let untracked = self.graph.get(alias).is_some_and(|a| a.identity.is_untracked());
                match stored {
                    Some(row) if !untracked => self.graph.add_root(entity_from_row(&row)),
                    _ => {
                        let mut entity = if target_is_dir {
                            Entity::folder(target_path)
                        } else {
                            Entity::file(target_path)
                        };
                        entity.last_modified = target_modified;
                        entity.is_text = target_is_text;
                        if untracked {
                            entity.identity = Identity::Untracked;
                        }
                        let node = self.graph.add_root(entity);
                        self.persist(node);
                        self.report.inserted += 1;
                        node
                    }
                }
            }
        };

        self.refresh_detached_target(target, target_modified, target_is_text);

        let target_id = self
            .graph
            .get(target)
            .map(|t| t.identity.db_id_or_zero())
            .unwrap_or(0);
        let alias_path = self.graph.get(alias)?.path.clone();
        let relinked = {
            let meta = self.graph.get_mut(alias)?.alias_meta_mut()?;
            let relinked = meta.points_to_id != target_id;
            meta.points_to = Some(target);
            meta.points_to_id = target_id;
            relinked
        };
        self.graph.register_alias(&alias_path, target);
        if relinked {
            self.persist(alias);
        }
        Some(target)
    }

    /// Alias targets without a parent are never seen by a parent's diff, so
    /// their own metadata is refreshed here.
    fn refresh_detached_target(&mut self, target: NodeId, modified: i64, is_text: bool) {
        let Some(entity) = self.graph.get_mut(target) else {
            return;
        };
        if entity.parent.is_some() {
            return;
        }
        let is_text = is_text && entity.is_file();
        if entity.last_modified != modified || entity.is_text != is_text {
            entity.last_modified = modified;
            entity.is_text = is_text;
            self.persist(target);
            self.report.updated += 1;
        }
    }

    /// Hard-remove a subtree from the tree and from storage.
    fn remove_subtree(&mut self, node: NodeId) {
        let removed = self.graph.drop_subtree(node);
        for entity in &removed {
            if let Some(id) = entity.identity.db_id() {
                if let Err(e) = self.store.delete_file(id, false) {
                    warn!("Failed to delete row for {}: {}", entity.path.display(), e);
                }
            }
        }
        self.report.removed += removed.len();
    }

    /// Insert or update the row of `node`. Storage failures are logged.
    fn persist(&mut self, node: NodeId) {
        let Some(entity) = self.graph.get(node) else {
            return;
        };
        match entity.identity {
            Identity::Untracked => {}
            Identity::Tracked(_) => {
                if let Err(e) = self.store.update_file(&entity_to_row(entity), false) {
                    warn!("Failed to update {}: {}", entity.path.display(), e);
                }
            }
            Identity::New => {
                let row = entity_to_row(entity);
                match self.store.insert_file(&row, false) {
                    Ok(id) => {
                        if let Some(entity) = self.graph.get_mut(node) {
                            entity.identity = Identity::Tracked(id);
                        }
                    }
                    Err(e) => warn!("Failed to insert {}: {}", row.path, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore_rules::{GitIgnoreRules, NoIgnore};
    use pfg_db::{FileFilter, SqliteStore};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        root_path: PathBuf,
        graph: FileGraph,
        store: SqliteStore,
        config: ScanConfig,
        token: ScanToken,
        root: NodeId,
    }

    fn fixture(build: impl FnOnce(&Path)) -> Fixture {
        let temp = TempDir::new().unwrap();
        let root_path = fs::canonicalize(temp.path()).unwrap().join("proj");
        fs::create_dir(&root_path).unwrap();
        build(&root_path);

        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut graph = FileGraph::new();
        let mut root = Entity::folder(&root_path);
        root.set_project(true);
        let id = store.insert_file(&entity_to_row(&root), true).unwrap();
        root.identity = Identity::Tracked(id);
        let root = graph.add_root(root);

        let config = ScanConfig {
            allowed_root: Some(root_path.parent().unwrap().to_path_buf()),
            ..ScanConfig::default()
        };
        Fixture {
            _temp: temp,
            root_path,
            graph,
            store,
            config,
            token: ScanToken::new(),
            root,
        }
    }

    impl Fixture {
        fn scan_with(&mut self, ignore: &dyn IgnoreRules) -> ScanReport {
            Scanner::new(&mut self.graph, &mut self.store, ignore, &self.config, &self.token)
                .run(self.root, true)
                .unwrap()
        }

        fn scan(&mut self) -> ScanReport {
            self.scan_with(&NoIgnore)
        }

        fn node(&self, rel: &str) -> Option<NodeId> {
            self.graph.lookup(&self.root_path.join(rel))
        }
    }

    #[test]
    fn test_first_scan_inserts_everything() {
        let mut fx = fixture(|p| {
            fs::create_dir(p.join("src")).unwrap();
            fs::write(p.join("src/main.rs"), "fn main() {}\n").unwrap();
            fs::write(p.join("README.md"), "# hi\n").unwrap();
        });
        let report = fx.scan();
        assert_eq!(report.inserted, 3);
        assert_eq!(report.folders_scanned, 2);

        let rows = fx.store.select_files(&FileFilter::live()).unwrap();
        assert_eq!(rows.len(), 4);
        let main = fx.node("src/main.rs").unwrap();
        let src = fx.node("src").unwrap();
        assert_eq!(fx.graph.get(main).unwrap().parent, Some(src));
        let view = fx.graph.get(fx.root).unwrap().project_view().unwrap();
        assert_eq!(view.files.len(), 2);
    }

    #[test]
    fn test_rescan_detects_added_removed_and_modified() {
        let mut fx = fixture(|p| {
            fs::write(p.join("a.rs"), "a\n").unwrap();
            fs::write(p.join("b.rs"), "b\n").unwrap();
        });
        fx.scan();

        fs::remove_file(fx.root_path.join("a.rs")).unwrap();
        fs::write(fx.root_path.join("c.rs"), "c\n").unwrap();
        let report = fx.scan();
        assert_eq!((report.inserted, report.removed), (1, 1));
        assert!(fx.node("a.rs").is_none());
        assert!(fx.node("c.rs").is_some());
        assert!(fx.store.find_by_path(&fx.root_path.join("a.rs").to_string_lossy()).unwrap().is_none());
    }

    #[test]
    fn test_kind_change_replaces_entity() {
        let mut fx = fixture(|p| fs::write(p.join("thing"), "text\n").unwrap());
        fx.scan();
        let before = fx.node("thing").unwrap();

        fs::remove_file(fx.root_path.join("thing")).unwrap();
        fs::create_dir(fx.root_path.join("thing")).unwrap();
        let report = fx.scan();

        let after = fx.node("thing").unwrap();
        assert_ne!(before, after);
        assert!(fx.graph.get(after).unwrap().is_folder());
        assert_eq!((report.inserted, report.removed), (1, 1));
    }

    #[test]
    fn test_generated_marker_ignores_subtree() {
        let mut fx = fixture(|p| {
            fs::create_dir_all(p.join("gen/deep")).unwrap();
            fs::write(p.join("gen/.generated"), "").unwrap();
            fs::write(p.join("gen/out.rs"), "x\n").unwrap();
        });
        fx.scan();

        let gen = fx.node("gen").unwrap();
        assert!(fx.graph.get(gen).unwrap().is_ignored);
        // Ignored folders are not descended into.
        assert!(fx.graph.tree().children(gen).is_empty());
        assert!(fx.node("gen/out.rs").is_none());
        let view = fx.graph.get(fx.root).unwrap().project_view().unwrap();
        assert!(view.files.is_empty());

        let again = fx.scan();
        assert_eq!(again.mutations(), 0);
    }

    #[test]
    fn test_gitignore_and_repo_discovery() {
        let mut fx = fixture(|p| {
            fs::create_dir(p.join(".git")).unwrap();
            fs::write(p.join(".gitignore"), "target/\n").unwrap();
            fs::create_dir(p.join("target")).unwrap();
            fs::write(p.join("target/junk.rs"), "x\n").unwrap();
            fs::write(p.join("lib.rs"), "x\n").unwrap();
        });
        fx.scan_with(&GitIgnoreRules::new());

        assert_eq!(fx.graph.get(fx.root).unwrap().repo, RepoState::Yes);
        assert!(fx.graph.get(fx.node(".git").unwrap()).unwrap().is_ignored);
        assert!(fx.graph.get(fx.node("target").unwrap()).unwrap().is_ignored);
        assert!(fx.node("target/junk.rs").is_none());
        assert!(!fx.graph.get(fx.node("lib.rs").unwrap()).unwrap().is_ignored);
    }

    #[cfg(unix)]
    #[test]
    fn test_alias_outside_project_is_followed() {
        let mut fx = fixture(|p| {
            let shared = p.parent().unwrap().join("shared");
            fs::create_dir(&shared).unwrap();
            fs::write(shared.join("util.rs"), "x\n").unwrap();
            std::os::unix::fs::symlink(&shared, p.join("shared")).unwrap();
        });
        fx.scan();

        let alias = fx.node("shared").unwrap();
        let target = fx.graph.tree().resolve(alias).unwrap();
        let target_entity = fx.graph.get(target).unwrap();
        assert_eq!(target_entity.path, fx.root_path.parent().unwrap().join("shared"));
        assert!(fx.node("shared/util.rs").is_some());
        let view = fx.graph.get(fx.root).unwrap().project_view().unwrap();
        assert_eq!(view.files.len(), 1);
    }

    #[test]
    fn test_generated_project_root_is_flagged() {
        let mut fx = fixture(|p| {
            fs::write(p.join(".generated"), "").unwrap();
            fs::write(p.join("out.rs"), "x\n").unwrap();
        });
        fx.scan();
        assert!(fx.graph.get(fx.root).unwrap().is_ignored);
        assert!(fx.graph.get(fx.node("out.rs").unwrap()).unwrap().is_ignored);
        assert_eq!(fx.graph.get(fx.root).unwrap().repo, RepoState::Unchecked);
    }

    #[test]
    fn test_removing_marker_from_project_root_unignores_it() {
        let mut fx = fixture(|p| {
            fs::write(p.join(".generated"), "").unwrap();
            fs::write(p.join("a.rs"), "x\n").unwrap();
        });
        fx.scan();
        assert!(fx.graph.get(fx.root).unwrap().is_ignored);

        fs::remove_file(fx.root_path.join(".generated")).unwrap();
        fx.scan();

        assert!(!fx.graph.get(fx.root).unwrap().is_ignored);
        let a = fx.node("a.rs").unwrap();
        assert!(!fx.graph.get(a).unwrap().is_ignored);
        let view = fx.graph.get(fx.root).unwrap().project_view().unwrap();
        assert_eq!(view.files.len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let mut fx = fixture(|_| {});
        fs::remove_dir(&fx.root_path).unwrap();
        let err = Scanner::new(&mut fx.graph, &mut fx.store, &NoIgnore, &fx.config, &fx.token)
            .run(fx.root, true)
            .unwrap_err();
        assert!(matches!(err, PfgError::ScanFailed { .. }));
    }

    #[test]
    fn test_cancelled_pass_stops_between_folders() {
        let mut fx = fixture(|p| fs::create_dir(p.join("sub")).unwrap());
        let token = fx.token.clone();
        let scanner = Scanner::new(&mut fx.graph, &mut fx.store, &NoIgnore, &fx.config, &fx.token);
        token.cancel();
        let report = scanner.run(fx.root, true).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.folders_scanned, 0);
    }

    #[test]
    fn test_scan_token_is_monotonic() {
        let token = ScanToken::new();
        let first = token.next_pass();
        let second = token.next_pass();
        assert!(second > first);
        assert!(token.is_current(second));
        assert!(!token.is_current(first));
    }
}
