//! End-to-end properties of the project file graph.
//!
//! # Test Strategy
//!
//! - Each test builds a fresh project tree in a temporary directory
//! - Storage is an in-memory SQLite store, optionally wrapped to count writes
//! - Symlink tests only run on unix

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pfg_core::config::ScanConfig;
use pfg_core::db_adapter::{entity_from_row, entity_to_row};
use pfg_core::{
    load_project, ChangeKind, Entity, FileChange, FileGraph, FileStore, GlobalConfig,
    HistoryConfig, HistoryManager, HistoryRow, Identity, NoIgnore, OutlineSyntax, PfgError,
    ProjectManager, ReviewStatus, ScanToken, Scanner, SqliteStore,
};
use pfg_db::{DbResult, FileFilter, FileRow, StoreStamp};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

/// Store wrapper that counts row writes.
struct CountingStore {
    inner: SqliteStore,
    writes: Arc<AtomicUsize>,
}

impl CountingStore {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let writes = Arc::new(AtomicUsize::new(0));
        let store = Self {
            inner: SqliteStore::open_in_memory().expect("open store"),
            writes: Arc::clone(&writes),
        };
        (store, writes)
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl FileStore for CountingStore {
    fn insert_file(&mut self, row: &FileRow, sync: bool) -> DbResult<i64> {
        self.count();
        self.inner.insert_file(row, sync)
    }

    fn update_file(&mut self, row: &FileRow, sync: bool) -> DbResult<()> {
        self.count();
        self.inner.update_file(row, sync)
    }

    fn delete_file(&mut self, id: i64, sync: bool) -> DbResult<bool> {
        self.count();
        self.inner.delete_file(id, sync)
    }

    fn select_files(&self, filter: &FileFilter) -> DbResult<Vec<FileRow>> {
        self.inner.select_files(filter)
    }

    fn get_file(&self, id: i64) -> DbResult<Option<FileRow>> {
        self.inner.get_file(id)
    }

    fn find_by_path(&self, path: &str) -> DbResult<Option<FileRow>> {
        self.inner.find_by_path(path)
    }

    fn select_orphaned_deleted(&self) -> DbResult<Vec<FileRow>> {
        self.inner.select_orphaned_deleted()
    }

    fn stamp(&self) -> DbResult<StoreStamp> {
        self.inner.stamp()
    }

    fn insert_history(&mut self, row: &HistoryRow, sync: bool) -> DbResult<i64> {
        self.count();
        self.inner.insert_history(row, sync)
    }

    fn update_history_status(&mut self, id: i64, status: ReviewStatus) -> DbResult<()> {
        self.count();
        self.inner.update_history_status(id, status)
    }

    fn get_history(&self, id: i64) -> DbResult<Option<HistoryRow>> {
        self.inner.get_history(id)
    }

    fn list_history(&self, limit: usize) -> DbResult<Vec<HistoryRow>> {
        self.inner.list_history(limit)
    }

    fn select_history_before(&self, timestamp: i64) -> DbResult<Vec<HistoryRow>> {
        self.inner.select_history_before(timestamp)
    }

    fn delete_history(&mut self, id: i64, sync: bool) -> DbResult<bool> {
        self.count();
        self.inner.delete_history(id, sync)
    }

    fn get_meta(&self, key: &str) -> DbResult<Option<String>> {
        self.inner.get_meta(key)
    }

    fn set_meta(&mut self, key: &str, value: &str) -> DbResult<()> {
        self.inner.set_meta(key, value)
    }

    fn flush(&mut self) -> DbResult<()> {
        self.inner.flush()
    }
}

/// Canonical temp root plus a `proj` directory inside it.
fn project_dir() -> (TempDir, PathBuf, PathBuf) {
    let temp = TempDir::new().expect("create temp dir");
    let base = fs::canonicalize(temp.path()).expect("canonicalize temp dir");
    let project = base.join("proj");
    fs::create_dir_all(&project).expect("create project dir");
    (temp, base, project)
}

fn write(path: &Path, content: &str) {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).expect("create parent dir");
    }
    fs::write(path, content).expect("write file");
}

fn config_for(base: &Path) -> GlobalConfig {
    let mut config = GlobalConfig::rooted_at(&base.join(".pfg"));
    config.scan = ScanConfig {
        allowed_root: Some(base.to_path_buf()),
        ..ScanConfig::default()
    };
    config
}

fn manager_with(base: &Path, store: Box<dyn FileStore>) -> ProjectManager {
    ProjectManager::open(config_for(base), store, Box::new(NoIgnore), Box::new(OutlineSyntax))
        .expect("open manager")
}

/// Paths, parent edges and alias targets of everything resident.
fn snapshot(graph: &FileGraph) -> BTreeSet<(PathBuf, Option<PathBuf>, String, Option<PathBuf>)> {
    let path_of = |node| graph.get(node).map(|e: &Entity| e.path.clone());
    graph
        .tree()
        .iter()
        .map(|entity| {
            (
                entity.path.clone(),
                entity.parent.and_then(path_of),
                entity.base_type().as_str().to_string(),
                entity
                    .alias_meta()
                    .and_then(|m| m.points_to)
                    .and_then(path_of),
            )
        })
        .collect()
}

// ============================================================================
// Rescan idempotence
// ============================================================================

#[test]
fn test_rescan_of_unchanged_project_writes_nothing() {
    let (_temp, base, project) = project_dir();
    write(&project.join("src/main.rs"), "fn main() {}\n");
    write(&project.join("src/util/mod.rs"), "pub fn util() {}\n");
    write(&project.join("README.md"), "# readme\n");
    write(&project.join("logo.png"), "\u{0}png");

    let (store, writes) = CountingStore::new();
    let mut manager = manager_with(&base, Box::new(store));
    manager.create_project(&project).expect("create project");
    let first = manager.activate_project(&project).expect("activate");
    assert_eq!(first.scan.inserted, 6);
    assert!(writes.load(Ordering::SeqCst) > 0);

    for _ in 0..2 {
        writes.store(0, Ordering::SeqCst);
        let report = manager.rescan().expect("rescan");
        assert_eq!(report.mutations(), 0);
        assert_eq!(writes.load(Ordering::SeqCst), 0);
    }
}

// ============================================================================
// Symlink cycles
// ============================================================================

#[cfg(unix)]
#[test]
fn test_symlink_cycle_resolves_to_shared_entities() {
    use std::os::unix::fs::symlink;

    let (_temp, base, project) = project_dir();
    write(&project.join("A/a.rs"), "fn a() {}\n");
    write(&project.join("B/b.rs"), "fn b() {}\n");
    symlink(project.join("B"), project.join("A/to_b")).expect("link A -> B");
    symlink(project.join("A"), project.join("B/to_a")).expect("link B -> A");

    let mut manager = manager_with(&base, Box::new(SqliteStore::open_in_memory().expect("store")));
    manager.create_project(&project).expect("create project");
    manager.activate_project(&project).expect("activate");

    let graph = manager.graph();
    let a = graph.lookup(&project.join("A")).expect("A resident");
    let b = graph.lookup(&project.join("B")).expect("B resident");
    let to_b = graph.lookup(&project.join("A/to_b")).expect("to_b resident");
    let to_a = graph.lookup(&project.join("B/to_a")).expect("to_a resident");
    assert_eq!(graph.tree().resolve(to_b), Some(b));
    assert_eq!(graph.tree().resolve(to_a), Some(a));

    // Deep alias paths land on the same objects.
    let via_alias = graph
        .lookup(&project.join("A/to_b/b.rs"))
        .expect("b.rs through alias");
    assert_eq!(Some(via_alias), graph.lookup(&project.join("B/b.rs")));

    // One entry per real file in the projection.
    assert_eq!(manager.project_files().expect("files").len(), 2);
    assert_eq!(manager.rescan().expect("rescan").mutations(), 0);
}

// ============================================================================
// Persist / reload
// ============================================================================

#[test]
fn test_reload_from_storage_is_isomorphic() {
    let (_temp, base, project) = project_dir();
    write(&project.join("src/lib.rs"), "pub mod a;\n");
    write(&project.join("src/a.rs"), "pub fn a() {}\n");
    write(&project.join("docs/guide.md"), "guide\n");
    write(&base.join("shared/common.rs"), "pub fn common() {}\n");
    #[cfg(unix)]
    std::os::unix::fs::symlink(base.join("shared"), project.join("shared")).expect("link");

    let config = config_for(&base);
    let mut store = SqliteStore::open_in_memory().expect("store");
    let mut graph = FileGraph::new();
    let mut root = Entity::folder(&project);
    root.set_project(true);
    root.identity = Identity::Tracked(
        store
            .insert_file(&entity_to_row(&root), true)
            .expect("insert root"),
    );
    let root = graph.add_root(root);
    Scanner::new(&mut graph, &mut store, &NoIgnore, &config.scan, &ScanToken::new())
        .run(root, true)
        .expect("scan");
    let before = snapshot(&graph);
    let files_before = graph
        .get(root)
        .and_then(|e| e.project_view())
        .map(|v| v.files.len());

    let mut reloaded = FileGraph::new();
    let row = store
        .find_by_path(&project.to_string_lossy())
        .expect("query root")
        .expect("root row");
    let root = reloaded.add_root(entity_from_row(&row));
    let report = load_project(&mut reloaded, &store, root).expect("load");
    assert!(!report.cache_hit);

    assert_eq!(snapshot(&reloaded), before);
    let files_after = reloaded
        .get(root)
        .and_then(|e| e.project_view())
        .map(|v| v.files.len());
    assert_eq!(files_after, files_before);
}

// ============================================================================
// Edits
// ============================================================================

#[test]
fn test_edits_through_the_manager() {
    let (_temp, base, project) = project_dir();
    let file = project.join("abc.txt");
    write(&file, "a\nb\nc\n");

    let mut manager = manager_with(&base, Box::new(SqliteStore::open_in_memory().expect("store")));
    manager.create_project(&project).expect("create project");
    manager.activate_project(&project).expect("activate");

    let mut replace = [FileChange::replace(2, 3, "B\n")];
    manager.apply_edits(&file, &mut replace).expect("replace");
    assert_eq!(fs::read_to_string(&file).expect("read"), "a\nB\nc\n");

    let mut insert = [FileChange::insert(2, "X\n")];
    manager.apply_edits(&file, &mut insert).expect("insert");
    assert_eq!(fs::read_to_string(&file).expect("read"), "a\nX\nB\nc\n");

    // Both ranges refer to the content as it was before the batch.
    let mut batch = [
        FileChange::replace(1, 2, "first\nextra\n"),
        FileChange::replace(3, 4, "third\n"),
    ];
    manager.apply_edits(&file, &mut batch).expect("batch");
    assert_eq!(
        fs::read_to_string(&file).expect("read"),
        "first\nextra\nX\nthird\nc\n"
    );

    let history = manager.history(10).expect("history");
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|h| h.change_type == ChangeKind::Modified));
}

// ============================================================================
// Delete and cleanup
// ============================================================================

#[test]
fn test_delete_survives_failed_filesystem_removal() {
    let (_temp, base, project) = project_dir();
    let file = project.join("gone.rs");
    write(&file, "fn gone() {}\n");
    write(&project.join("kept.rs"), "fn kept() {}\n");

    let mut manager = manager_with(&base, Box::new(SqliteStore::open_in_memory().expect("store")));
    manager.create_project(&project).expect("create project");
    manager.activate_project(&project).expect("activate");

    // Removed behind the engine's back: the filesystem delete will fail.
    fs::remove_file(&file).expect("remove file");
    let report = manager.delete(&file).expect("delete");
    assert_eq!(report.fs_failures, 1);

    let entity = manager.lookup(&file).expect("still resident before cleanup");
    assert_ne!(entity.delete_id, 0);
    let id = entity.identity.db_id().expect("tracked");
    let row = manager.store().get_file(id).expect("query").expect("row");
    assert!(row.is_deleted());

    assert_eq!(manager.cleanup(), 1);
    assert!(manager.lookup(&file).is_none());
    let files = manager.project_files().expect("files");
    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("kept.rs"));
}

#[test]
fn test_delete_unknown_path() {
    let (_temp, base, project) = project_dir();
    let mut manager = manager_with(&base, Box::new(SqliteStore::open_in_memory().expect("store")));
    assert!(matches!(
        manager.delete(&project.join("nothing")),
        Err(PfgError::PathNotFound(_))
    ));
}

// ============================================================================
// Reaper
// ============================================================================

#[test]
fn test_reaper_purges_only_past_retention() {
    let (_temp, base, _project) = project_dir();
    let config = HistoryConfig::default();
    let retention = i64::from(config.retention_days) * 86_400;
    let history = HistoryManager::new(base.join("history"), config);
    let mut store = SqliteStore::open_in_memory().expect("store");
    let now = 1_800_000_000;

    let mut record = |path: &str, ts: i64| {
        let source = base.join(path);
        write(&source, path);
        let backup = history.backup(&source, ts).expect("backup");
        let row = HistoryRow::new(source.to_string_lossy(), 0, ts, ChangeKind::Deleted)
            .with_backup(backup.to_string_lossy());
        let id = store.insert_history(&row, true).expect("insert history");
        (id, backup)
    };
    let (old_id, old_backup) = record("old.txt", now - retention - 1);
    let (edge_id, edge_backup) = record("edge.txt", now - retention);
    let (new_id, new_backup) = record("new.txt", now - 60);

    let report = history.reap(&mut store, now, false).expect("reap");
    assert_eq!(report.history_purged, 1);
    assert_eq!(report.backups_removed, 1);

    assert!(store.get_history(old_id).expect("query").is_none());
    assert!(!old_backup.exists());
    for (id, backup) in [(edge_id, edge_backup), (new_id, new_backup)] {
        assert!(store.get_history(id).expect("query").is_some());
        assert!(backup.exists());
    }

    // Rate limited until the interval passes.
    assert!(history.reap(&mut store, now + 1, false).expect("reap").skipped);
}
