//! Soft delete, backups and the history reaper.
//!
//! ## Delete
//!
//! [`HistoryManager::remove`] walks a subtree bottom-up with one timestamp
//! for the whole operation. Files are copied to the history directory before
//! the filesystem delete is attempted. The delete is recorded (history row,
//! `delete_id` on the entity row) even when the filesystem call fails: the
//! stored state is what counts as deleted.
//!
//! Removed entities stay in the tree until [`HistoryManager::cleanup`], which
//! detaches them in one batch and publishes a single splice per affected
//! list.
//!
//! ## Reaper
//!
//! [`HistoryManager::reap`] purges history rows (and their backups) older
//! than the retention window, then soft-deleted entity rows whose history
//! record is gone. It runs at most once per `reap_interval_hours` and stops
//! when its time budget is spent.
//!
//! Backups live at `<history_dir>/<YYYYMMDD>/<HHMMSS>-<escaped path>`, with
//! `<HHMMSS>-<n>-<escaped path>` for later backups of the same path in the
//! same second.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::DateTime;
use pfg_db::{ChangeKind, FileStore, HistoryRow};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HistoryConfig;
use crate::constants::META_LAST_REAP;
use crate::db_adapter::{entity_to_row, IntoPfgResult};
use crate::entity::{Identity, NodeId};
use crate::errors::PfgError;
use crate::graph::FileGraph;

const SECS_PER_HOUR: i64 = 3600;
const SECS_PER_DAY: i64 = 86_400;

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveReport {
    /// Entities marked deleted.
    pub removed: usize,
    /// History records created, in removal order.
    pub history_ids: Vec<i64>,
    /// Filesystem deletes that failed and were logged.
    pub fs_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReapReport {
    /// The run was skipped by the rate limit.
    pub skipped: bool,
    pub history_purged: usize,
    pub backups_removed: usize,
    pub entities_purged: usize,
    /// The time budget ran out before the work was done.
    pub timed_out: bool,
}

// ============================================================================
// HistoryManager
// ============================================================================

#[derive(Debug)]
pub struct HistoryManager {
    history_dir: PathBuf,
    config: HistoryConfig,
    pending_cleanup: Vec<NodeId>,
}

impl HistoryManager {
    pub fn new(history_dir: impl Into<PathBuf>, config: HistoryConfig) -> Self {
        Self {
            history_dir: history_dir.into(),
            config,
            pending_cleanup: Vec::new(),
        }
    }

    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    /// Nodes removed but still attached in memory.
    pub fn pending_cleanup(&self) -> usize {
        self.pending_cleanup.len()
    }

    /// Where a backup of `path` taken at `timestamp` is written.
    ///
    /// This is the first candidate; [`HistoryManager::backup`] adds a
    /// sequence number when the name is already taken.
    pub fn backup_path(&self, path: &Path, timestamp: i64) -> PathBuf {
        self.backup_candidate(path, timestamp, 0)
    }

    fn backup_candidate(&self, path: &Path, timestamp: i64, seq: u32) -> PathBuf {
        let when = DateTime::from_timestamp(timestamp, 0).unwrap_or_default();
        let escaped: String = path
            .to_string_lossy()
            .trim_start_matches(['/', '\\'])
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '%' } else { c })
            .collect();
        let name = if seq == 0 {
            format!("{}-{}", when.format("%H%M%S"), escaped)
        } else {
            format!("{}-{}-{}", when.format("%H%M%S"), seq, escaped)
        };
        self.history_dir
            .join(when.format("%Y%m%d").to_string())
            .join(name)
    }

    /// Copy `path` into the history directory.
    ///
    /// Every call gets its own file, so two backups of one path taken in the
    /// same second never overwrite each other.
    pub fn backup(&self, path: &Path, timestamp: i64) -> Result<PathBuf, PfgError> {
        let failed = |e: io::Error| PfgError::BackupFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if !path.is_file() {
            return Err(failed(io::Error::new(
                io::ErrorKind::NotFound,
                "not a regular file",
            )));
        }
        if let Some(dir) = self.backup_path(path, timestamp).parent() {
            fs::create_dir_all(dir).map_err(failed)?;
        }

        let mut seq = 0;
        let dest = loop {
            let candidate = self.backup_candidate(path, timestamp, seq);
            // Reserve the name before copying into it.
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(_) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(failed(e)),
            }
        };
        if let Err(e) = fs::copy(path, &dest) {
            let _ = fs::remove_file(&dest);
            return Err(failed(e));
        }
        debug!("Backed up {} to {}", path.display(), dest.display());
        Ok(dest)
    }

    /// Back up `path` and append a history record of `kind` for it.
    ///
    /// A failed backup of a delete is logged and recorded with an empty
    /// backup path. Any other failed backup is returned and nothing is
    /// recorded, so an edit never overwrites a file it could not copy.
    pub fn record(
        &self,
        store: &mut dyn FileStore,
        path: &Path,
        filebase_id: i64,
        timestamp: i64,
        kind: ChangeKind,
    ) -> Result<i64, PfgError> {
        let backup = match kind {
            ChangeKind::Added => String::new(),
            ChangeKind::Deleted => match self.backup(path, timestamp) {
                Ok(dest) => dest.to_string_lossy().into_owned(),
                Err(e) => {
                    warn!("{}", e);
                    String::new()
                }
            },
            ChangeKind::Modified => self.backup(path, timestamp)?.to_string_lossy().into_owned(),
        };
        let row = HistoryRow::new(path.to_string_lossy(), filebase_id, timestamp, kind)
            .with_backup(backup);
        store.insert_history(&row, false).into_pfg()
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Soft-delete `node` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`PfgError::PathNotFound`] for an unknown node, or a storage
    /// error when a history record cannot be written.
    pub fn remove(
        &mut self,
        graph: &mut FileGraph,
        store: &mut dyn FileStore,
        node: NodeId,
        timestamp: i64,
    ) -> Result<RemoveReport, PfgError> {
        if graph.get(node).is_none() {
            return Err(PfgError::PathNotFound(format!("{}", node)));
        }
        let mut order = graph.tree().descendants_post_order(node);
        order.push(node);

        let mut report = RemoveReport::default();
        for current in order {
            let Some(entity) = graph.get(current).cloned() else {
                continue;
            };
            if entity.is_deleted() {
                continue;
            }

            let filebase_id = entity.identity.db_id_or_zero();
            let history_id = if entity.is_file() {
                self.record(store, &entity.path, filebase_id, timestamp, ChangeKind::Deleted)?
            } else {
                let row = HistoryRow::new(
                    entity.path.to_string_lossy(),
                    filebase_id,
                    timestamp,
                    ChangeKind::Deleted,
                );
                store.insert_history(&row, false).into_pfg()?
            };

            let deleted = if entity.is_folder() {
                fs::remove_dir(&entity.path)
            } else {
                // Aliases remove the link, never the target.
                fs::remove_file(&entity.path)
            };
            if let Err(e) = deleted {
                warn!("Failed to delete {} from disk: {}", entity.path.display(), e);
                report.fs_failures += 1;
            }

            if let Some(stored) = graph.get_mut(current) {
                stored.delete_id = history_id;
                stored.is_active = false;
                if let Identity::Tracked(_) = stored.identity {
                    if let Err(e) = store.update_file(&entity_to_row(stored), false) {
                        warn!("Failed to store delete of {}: {}", stored.path.display(), e);
                    }
                }
            }

            self.pending_cleanup.push(current);
            report.removed += 1;
            report.history_ids.push(history_id);
        }

        if let Err(e) = store.flush() {
            warn!("Failed to flush deletes: {}", e);
        }
        info!(
            "Removed {} entities ({} filesystem failures)",
            report.removed, report.fs_failures
        );
        Ok(report)
    }

    /// Evict removed entities from memory, one splice per affected list.
    /// Returns the number of entities evicted.
    pub fn cleanup(&mut self, graph: &mut FileGraph) -> usize {
        let pending: HashSet<NodeId> = self
            .pending_cleanup
            .drain(..)
            .filter(|n| graph.get(*n).is_some())
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let mut by_parent: BTreeMap<NodeId, HashSet<NodeId>> = BTreeMap::new();
        let mut tops: Vec<NodeId> = Vec::new();
        for node in &pending {
            let parent = graph.get(*node).and_then(|e| e.parent);
            if parent.is_some_and(|p| pending.contains(&p)) {
                continue;
            }
            if let Some(parent) = parent {
                by_parent.entry(parent).or_default().insert(*node);
            }
            tops.push(*node);
        }
        tops.sort();

        for (parent, nodes) in &by_parent {
            graph.detach_many(*parent, nodes);
        }
        let evicted: usize = tops
            .into_iter()
            .map(|top| graph.drop_subtree(top).len())
            .sum();
        graph.refresh_all_projections();

        debug!("Cleanup evicted {} entities", evicted);
        evicted
    }

    // ========================================================================
    // Reaper
    // ========================================================================

    /// Purge history older than the retention window.
    ///
    /// Without `force` the run is skipped when the previous completed run is
    /// more recent than `reap_interval_hours`.
    pub fn reap(
        &self,
        store: &mut dyn FileStore,
        now: i64,
        force: bool,
    ) -> Result<ReapReport, PfgError> {
        let mut report = ReapReport::default();

        if !force {
            let last = store
                .get_meta(META_LAST_REAP)
                .into_pfg()?
                .and_then(|v| v.parse::<i64>().ok());
            let interval = i64::from(self.config.reap_interval_hours) * SECS_PER_HOUR;
            if let Some(last) = last {
                if now - last < interval {
                    debug!("Reaper ran {}s ago, skipping", now - last);
                    report.skipped = true;
                    return Ok(report);
                }
            }
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.reap_time_budget_ms);
        let cutoff = now - i64::from(self.config.retention_days) * SECS_PER_DAY;

        for row in store.select_history_before(cutoff).into_pfg()? {
            if Instant::now() >= deadline {
                report.timed_out = true;
                break;
            }
            if !row.backup_path.is_empty() && self.remove_backup(Path::new(&row.backup_path)) {
                report.backups_removed += 1;
            }
            match store.delete_history(row.id, false) {
                Ok(_) => report.history_purged += 1,
                Err(e) => warn!("Failed to purge history {}: {}", row.id, e),
            }
        }

        if !report.timed_out {
            for row in store.select_orphaned_deleted().into_pfg()? {
                if Instant::now() >= deadline {
                    report.timed_out = true;
                    break;
                }
                match store.delete_file(row.id, false) {
                    Ok(_) => report.entities_purged += 1,
                    Err(e) => warn!("Failed to purge {}: {}", row.path, e),
                }
            }
        }

        if report.timed_out {
            warn!("Reaper stopped after {}ms", self.config.reap_time_budget_ms);
        } else {
            store.set_meta(META_LAST_REAP, &now.to_string()).into_pfg()?;
        }
        store.flush().into_pfg()?;

        info!(
            "Reaped {} history records, {} backups, {} entities",
            report.history_purged, report.backups_removed, report.entities_purged
        );
        Ok(report)
    }

    /// Delete a backup file and its day directory once empty.
    fn remove_backup(&self, backup: &Path) -> bool {
        match fs::remove_file(backup) {
            Ok(()) => {
                if let Some(dir) = backup.parent() {
                    if dir.starts_with(&self.history_dir) && dir != self.history_dir {
                        // Fails while other backups remain.
                        let _ = fs::remove_dir(dir);
                    }
                }
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove backup {}: {}", backup.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::entity::Entity;
    use crate::ignore_rules::NoIgnore;
    use crate::notify::{EventRecorder, ListKind};
    use crate::scanner::{ScanToken, Scanner};
    use pfg_db::{FileFilter, SqliteStore};
    use tempfile::TempDir;

    const T0: i64 = 1_700_000_000;

    struct Fixture {
        temp: TempDir,
        root_path: PathBuf,
        graph: FileGraph,
        store: SqliteStore,
        history: HistoryManager,
        root: NodeId,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let base = fs::canonicalize(temp.path()).unwrap();
        let root_path = base.join("proj");
        fs::create_dir_all(root_path.join("src")).unwrap();
        fs::write(root_path.join("src/a.rs"), "a\n").unwrap();
        fs::write(root_path.join("src/b.rs"), "b\n").unwrap();
        fs::write(root_path.join("top.rs"), "top\n").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut graph = FileGraph::new();
        let mut root = Entity::folder(&root_path);
        root.set_project(true);
        root.identity = Identity::Tracked(store.insert_file(&entity_to_row(&root), true).unwrap());
        let root = graph.add_root(root);

        let config = ScanConfig {
            allowed_root: Some(base.clone()),
            ..ScanConfig::default()
        };
        Scanner::new(&mut graph, &mut store, &NoIgnore, &config, &ScanToken::new())
            .run(root, true)
            .unwrap();

        Fixture {
            history: HistoryManager::new(base.join("history"), HistoryConfig::default()),
            temp,
            root_path,
            graph,
            store,
            root,
        }
    }

    impl Fixture {
        fn node(&self, rel: &str) -> NodeId {
            self.graph.lookup(&self.root_path.join(rel)).unwrap()
        }

        fn remove(&mut self, rel: &str, ts: i64) -> RemoveReport {
            let node = self.node(rel);
            self.history
                .remove(&mut self.graph, &mut self.store, node, ts)
                .unwrap()
        }
    }

    #[test]
    fn test_backup_path_layout() {
        let history = HistoryManager::new("/h", HistoryConfig::default());
        // 2023-11-14 22:13:20 UTC
        let path = history.backup_path(Path::new("/home/me/a.rs"), T0);
        assert_eq!(path, PathBuf::from("/h/20231114/221320-home%me%a.rs"));
    }

    #[test]
    fn test_backups_in_the_same_second_do_not_collide() {
        let fx = fixture();
        let file = fx.root_path.join("top.rs");
        let first = fx.history.backup(&file, T0).unwrap();
        fs::write(&file, "edited\n").unwrap();
        let second = fx.history.backup(&file, T0).unwrap();

        assert_eq!(first, fx.history.backup_path(&file, T0));
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "top\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "edited\n");
    }

    #[test]
    fn test_failed_backup_rejects_modified_record() {
        let mut fx = fixture();
        let missing = fx.root_path.join("missing.rs");
        let err = fx
            .history
            .record(&mut fx.store, &missing, 0, T0, ChangeKind::Modified)
            .unwrap_err();
        assert!(matches!(err, PfgError::BackupFailed { .. }));
        assert!(fx.store.select_history_before(T0 + 1).unwrap().is_empty());

        let id = fx
            .history
            .record(&mut fx.store, &missing, 0, T0, ChangeKind::Deleted)
            .unwrap();
        assert!(fx.store.get_history(id).unwrap().unwrap().backup_path.is_empty());
    }

    #[test]
    fn test_remove_file_backs_up_then_deletes() {
        let mut fx = fixture();
        let node = fx.node("top.rs");
        let report = fx.remove("top.rs", T0);

        assert_eq!(report.removed, 1);
        assert_eq!(report.fs_failures, 0);
        assert!(!fx.root_path.join("top.rs").exists());

        let entity = fx.graph.get(node).unwrap();
        assert_eq!(entity.delete_id, report.history_ids[0]);
        let record = fx.store.get_history(entity.delete_id).unwrap().unwrap();
        assert_eq!(record.change_type, ChangeKind::Deleted);
        assert_eq!(fs::read_to_string(&record.backup_path).unwrap(), "top\n");

        let row = fx
            .store
            .get_file(entity.identity.db_id().unwrap())
            .unwrap()
            .unwrap();
        assert!(row.is_deleted());
    }

    #[test]
    fn test_folder_is_removed_bottom_up_with_one_timestamp() {
        let mut fx = fixture();
        let report = fx.remove("src", T0);
        assert_eq!(report.removed, 3);
        assert_eq!(report.fs_failures, 0);
        assert!(!fx.root_path.join("src").exists());

        let records: Vec<_> = report
            .history_ids
            .iter()
            .map(|id| fx.store.get_history(*id).unwrap().unwrap())
            .collect();
        assert!(records.iter().all(|r| r.timestamp == T0));
        assert!(records.last().unwrap().path.ends_with("src"));
    }

    #[test]
    fn test_failed_fs_delete_still_counts_as_deleted() {
        let mut fx = fixture();
        let node = fx.node("top.rs");
        fs::remove_file(fx.root_path.join("top.rs")).unwrap();

        let report = fx.remove("top.rs", T0);
        assert_eq!(report.fs_failures, 1);
        assert_ne!(fx.graph.get(node).unwrap().delete_id, 0);

        assert_eq!(fx.history.cleanup(&mut fx.graph), 1);
        assert!(fx.graph.get(node).is_none());
        assert!(fx.graph.lookup(&fx.root_path.join("top.rs")).is_none());
    }

    #[test]
    fn test_cleanup_emits_one_splice_per_list() {
        let mut fx = fixture();
        let recorder = EventRecorder::new();
        fx.graph.events_mut().subscribe(recorder.listener());

        fx.remove("src/a.rs", T0);
        fx.remove("src/b.rs", T0);
        assert!(recorder.is_empty());
        assert_eq!(fx.history.pending_cleanup(), 2);

        let src = fx.node("src");
        assert_eq!(fx.history.cleanup(&mut fx.graph), 2);
        let changes = recorder.list_changes();
        let children: Vec<_> = changes
            .iter()
            .filter(|c| c.list == ListKind::Children(src))
            .collect();
        assert_eq!(children.len(), 1);
        assert_eq!((children[0].removed, children[0].added), (2, 0));
        let files: Vec<_> = changes
            .iter()
            .filter(|c| c.list == ListKind::ProjectFiles(fx.root))
            .collect();
        assert_eq!(files.len(), 1);
        assert!(fx.graph.get(src).unwrap().children().is_empty());
    }

    #[test]
    fn test_reaper_respects_retention() {
        let mut fx = fixture();
        let report = fx.remove("top.rs", T0);
        let record = fx.store.get_history(report.history_ids[0]).unwrap().unwrap();
        let retention = i64::from(fx.history.config.retention_days) * SECS_PER_DAY;

        // Exactly at the boundary nothing is old enough.
        let early = fx.history.reap(&mut fx.store, T0 + retention, true).unwrap();
        assert_eq!(early.history_purged, 0);
        assert!(Path::new(&record.backup_path).exists());

        let late = fx
            .history
            .reap(&mut fx.store, T0 + retention + 1, true)
            .unwrap();
        assert_eq!(late.history_purged, 1);
        assert_eq!(late.backups_removed, 1);
        assert_eq!(late.entities_purged, 1);
        assert!(!Path::new(&record.backup_path).exists());
        assert!(fx.store.get_history(record.id).unwrap().is_none());
        let all = fx.store.select_files(&FileFilter::all()).unwrap();
        assert!(all.iter().all(|r| !r.path.ends_with("top.rs")));
        assert!(fx.temp.path().exists());
    }

    #[test]
    fn test_reaper_is_rate_limited() {
        let mut fx = fixture();
        let first = fx.history.reap(&mut fx.store, T0, false).unwrap();
        assert!(!first.skipped);

        let soon = fx.history.reap(&mut fx.store, T0 + 60, false).unwrap();
        assert!(soon.skipped);

        let forced = fx.history.reap(&mut fx.store, T0 + 60, true).unwrap();
        assert!(!forced.skipped);

        let next_day = fx.history.reap(&mut fx.store, T0 + 60 + SECS_PER_DAY, false).unwrap();
        assert!(!next_day.skipped);
    }
}
