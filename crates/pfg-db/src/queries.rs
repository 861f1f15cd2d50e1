use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Row};
use tracing::debug;

use crate::error::DbResult;
use crate::rows::{BaseType, ChangeKind, FileRow, HistoryRow, ReviewStatus};
use crate::sqlite::SqliteStore;
use crate::traits::{FileFilter, FileStore, StoreStamp};

const FILE_COLUMNS: &str = "id, path, parent_id, base_type, points_to_id, target_path, \
     is_project, is_ignored, is_text, is_repo, last_viewed, last_modified, delete_id, \
     cursor_line, cursor_offset, scroll_position, needs_approval";

const HISTORY_COLUMNS: &str =
    "id, path, filebase_id, timestamp, change_type, backup_path, status, moved_to, moved_from";

// ── Column codecs ────────────────────────────────────────────────

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse::<$ty>()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum_sql!(BaseType);
text_enum_sql!(ChangeKind);
text_enum_sql!(ReviewStatus);

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        path: row.get(1)?,
        parent_id: row.get(2)?,
        base_type: row.get(3)?,
        points_to_id: row.get(4)?,
        target_path: row.get(5)?,
        is_project: row.get(6)?,
        is_ignored: row.get(7)?,
        is_text: row.get(8)?,
        is_repo: row.get(9)?,
        last_viewed: row.get(10)?,
        last_modified: row.get(11)?,
        delete_id: row.get(12)?,
        cursor_line: row.get(13)?,
        cursor_offset: row.get(14)?,
        scroll_position: row.get(15)?,
        needs_approval: row.get(16)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        path: row.get(1)?,
        filebase_id: row.get(2)?,
        timestamp: row.get(3)?,
        change_type: row.get(4)?,
        backup_path: row.get(5)?,
        status: row.get(6)?,
        moved_to: row.get(7)?,
        moved_from: row.get(8)?,
    })
}

/// Prefix used for strict-descendant matching of `path`.
fn descendant_prefix(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Build the WHERE clause and positional values for a filter.
///
/// Descendant matching uses `substr` rather than `LIKE` so that `%` and `_`
/// in file names are compared literally.
fn filter_clause(filter: &FileFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if filter.live_only {
        clauses.push("delete_id = 0".to_string());
    }
    if filter.projects_only {
        clauses.push("is_project = 1".to_string());
    }
    if !filter.under_any.is_empty() {
        let mut alternatives = Vec::with_capacity(filter.under_any.len());
        for path in &filter.under_any {
            let prefix = descendant_prefix(path);
            let n = values.len();
            alternatives.push(format!(
                "(path = ?{} OR substr(path, 1, ?{}) = ?{})",
                n + 1,
                n + 2,
                n + 3
            ));
            values.push(Value::Text(path.clone()));
            values.push(Value::Integer(prefix.chars().count() as i64));
            values.push(Value::Text(prefix));
        }
        clauses.push(format!("({})", alternatives.join(" OR ")));
    }
    if !filter.ids.is_empty() {
        let start = values.len();
        let placeholders: Vec<String> = (0..filter.ids.len())
            .map(|i| format!("?{}", start + i + 1))
            .collect();
        clauses.push(format!("id IN ({})", placeholders.join(", ")));
        values.extend(filter.ids.iter().map(|id| Value::Integer(*id)));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

impl FileStore for SqliteStore {
    // ── File rows ────────────────────────────────────────────────

    fn insert_file(&mut self, row: &FileRow, sync: bool) -> DbResult<i64> {
        self.begin_write(sync)?;
        self.connection().execute(
            "INSERT INTO files (path, parent_id, base_type, points_to_id, target_path, \
             is_project, is_ignored, is_text, is_repo, last_viewed, last_modified, delete_id, \
             cursor_line, cursor_offset, scroll_position, needs_approval) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                row.path,
                row.parent_id,
                row.base_type,
                row.points_to_id,
                row.target_path,
                row.is_project,
                row.is_ignored,
                row.is_text,
                row.is_repo,
                row.last_viewed,
                row.last_modified,
                row.delete_id,
                row.cursor_line,
                row.cursor_offset,
                row.scroll_position,
                row.needs_approval,
            ],
        )?;
        let id = self.connection().last_insert_rowid();
        self.end_write(sync)?;
        debug!("Inserted file row {} for {}", id, row.path);
        Ok(id)
    }

    fn update_file(&mut self, row: &FileRow, sync: bool) -> DbResult<()> {
        self.begin_write(sync)?;
        self.connection().execute(
            "UPDATE files SET path = ?1, parent_id = ?2, base_type = ?3, points_to_id = ?4, \
             target_path = ?5, is_project = ?6, is_ignored = ?7, is_text = ?8, is_repo = ?9, \
             last_viewed = ?10, last_modified = ?11, delete_id = ?12, cursor_line = ?13, \
             cursor_offset = ?14, scroll_position = ?15, needs_approval = ?16 WHERE id = ?17",
            params![
                row.path,
                row.parent_id,
                row.base_type,
                row.points_to_id,
                row.target_path,
                row.is_project,
                row.is_ignored,
                row.is_text,
                row.is_repo,
                row.last_viewed,
                row.last_modified,
                row.delete_id,
                row.cursor_line,
                row.cursor_offset,
                row.scroll_position,
                row.needs_approval,
                row.id,
            ],
        )?;
        self.end_write(sync)?;
        Ok(())
    }

    fn delete_file(&mut self, id: i64, sync: bool) -> DbResult<bool> {
        self.begin_write(sync)?;
        let n = self
            .connection()
            .execute("DELETE FROM files WHERE id = ?1", params![id])?;
        self.end_write(sync)?;
        Ok(n > 0)
    }

    fn select_files(&self, filter: &FileFilter) -> DbResult<Vec<FileRow>> {
        let (clause, values) = filter_clause(filter);
        let sql = format!("SELECT {} FROM files{} ORDER BY path, id", FILE_COLUMNS, clause);
        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_file(&self, id: i64) -> DbResult<Option<FileRow>> {
        match self.connection().query_row(
            &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
            params![id],
            file_from_row,
        ) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_path(&self, path: &str) -> DbResult<Option<FileRow>> {
        match self.connection().query_row(
            &format!(
                "SELECT {} FROM files WHERE path = ?1 AND delete_id = 0 ORDER BY id DESC LIMIT 1",
                FILE_COLUMNS
            ),
            params![path],
            file_from_row,
        ) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn select_orphaned_deleted(&self) -> DbResult<Vec<FileRow>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM files WHERE delete_id > 0 \
             AND delete_id NOT IN (SELECT id FROM history) ORDER BY path",
            FILE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn stamp(&self) -> DbResult<StoreStamp> {
        let (max_modified, live_rows): (i64, i64) = self.connection().query_row(
            "SELECT COALESCE(MAX(last_modified), 0), COUNT(*) FROM files WHERE delete_id = 0",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let max_id: i64 = self.connection().query_row(
            "SELECT COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'files'), 0)",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreStamp {
            max_modified,
            live_rows,
            max_id,
        })
    }

    // ── History rows ─────────────────────────────────────────────

    fn insert_history(&mut self, row: &HistoryRow, sync: bool) -> DbResult<i64> {
        self.begin_write(sync)?;
        self.connection().execute(
            "INSERT INTO history (path, filebase_id, timestamp, change_type, backup_path, \
             status, moved_to, moved_from) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.path,
                row.filebase_id,
                row.timestamp,
                row.change_type,
                row.backup_path,
                row.status,
                row.moved_to,
                row.moved_from,
            ],
        )?;
        let id = self.connection().last_insert_rowid();
        self.end_write(sync)?;
        Ok(id)
    }

    fn update_history_status(&mut self, id: i64, status: ReviewStatus) -> DbResult<()> {
        self.begin_write(true)?;
        let n = self.connection().execute(
            "UPDATE history SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        self.end_write(true)?;
        if n == 0 {
            return Err(crate::DbError::not_found("history", id));
        }
        Ok(())
    }

    fn get_history(&self, id: i64) -> DbResult<Option<HistoryRow>> {
        match self.connection().query_row(
            &format!("SELECT {} FROM history WHERE id = ?1", HISTORY_COLUMNS),
            params![id],
            history_from_row,
        ) {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_history(&self, limit: usize) -> DbResult<Vec<HistoryRow>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM history ORDER BY timestamp DESC, id DESC LIMIT ?1",
            HISTORY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], history_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn select_history_before(&self, timestamp: i64) -> DbResult<Vec<HistoryRow>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM history WHERE timestamp < ?1 ORDER BY timestamp, id",
            HISTORY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![timestamp], history_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn delete_history(&mut self, id: i64, sync: bool) -> DbResult<bool> {
        self.begin_write(sync)?;
        let n = self
            .connection()
            .execute("DELETE FROM history WHERE id = ?1", params![id])?;
        self.end_write(sync)?;
        Ok(n > 0)
    }

    // ── Metadata ─────────────────────────────────────────────────

    fn get_meta(&self, key: &str) -> DbResult<Option<String>> {
        match self.connection().query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_meta(&mut self, key: &str, value: &str) -> DbResult<()> {
        self.begin_write(true)?;
        self.connection().execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        self.end_write(true)?;
        Ok(())
    }

    fn flush(&mut self) -> DbResult<()> {
        self.commit_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(path: &str) -> FileRow {
        FileRow::new(path, BaseType::Folder)
    }

    fn file(path: &str, parent_id: i64) -> FileRow {
        let mut row = FileRow::new(path, BaseType::File);
        row.parent_id = parent_id;
        row.is_text = true;
        row
    }

    #[test]
    fn test_insert_update_get() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_file(&folder("/p"), true).unwrap();
        assert!(id > 0);

        let mut row = store.get_file(id).unwrap().unwrap();
        assert_eq!(row.base_type, BaseType::Folder);
        row.is_project = true;
        row.is_repo = 1;
        store.update_file(&row, true).unwrap();

        let loaded = store.get_file(id).unwrap().unwrap();
        assert!(loaded.is_project);
        assert_eq!(loaded.is_repo, 1);
        assert!(store.get_file(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_select_under_any_matches_exact_and_descendants_only() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let root = store.insert_file(&folder("/p"), true).unwrap();
        store.insert_file(&file("/p/a.rs", root), true).unwrap();
        store.insert_file(&file("/p/sub/b.rs", root), true).unwrap();
        store.insert_file(&file("/p2/c.rs", 0), true).unwrap();
        store.insert_file(&file("/q/d.rs", 0), true).unwrap();

        let rows = store.select_files(&FileFilter::live().under_any(["/p"])).unwrap();
        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/p", "/p/a.rs", "/p/sub/b.rs"]);

        let rows = store
            .select_files(&FileFilter::live().under_any(["/p/sub", "/q"]))
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_select_treats_like_wildcards_literally() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_file(&file("/p%/a.rs", 0), true).unwrap();
        store.insert_file(&file("/px/a.rs", 0), true).unwrap();

        let rows = store.select_files(&FileFilter::live().under_any(["/p%"])).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "/p%/a.rs");
    }

    #[test]
    fn test_live_filter_excludes_soft_deleted() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_file(&file("/p/a.rs", 0), true).unwrap();
        let mut row = store.get_file(id).unwrap().unwrap();
        row.delete_id = 9;
        store.update_file(&row, true).unwrap();

        assert!(store.select_files(&FileFilter::live()).unwrap().is_empty());
        assert_eq!(store.select_files(&FileFilter::all()).unwrap().len(), 1);
        assert!(store.find_by_path("/p/a.rs").unwrap().is_none());
    }

    #[test]
    fn test_projects_and_ids_filters() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut project = folder("/p");
        project.is_project = true;
        let pid = store.insert_file(&project, true).unwrap();
        let fid = store.insert_file(&file("/p/a.rs", pid), true).unwrap();

        let projects = store.select_files(&FileFilter::live().projects()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, pid);

        let by_id = store.select_files(&FileFilter::all().with_ids([fid])).unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].path, "/p/a.rs");
    }

    #[test]
    fn test_unsynced_writes_commit_on_flush() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_file(&file("/p/a.rs", 0), false).unwrap();
        store.insert_file(&file("/p/b.rs", 0), false).unwrap();
        assert!(store.has_pending_writes());
        store.flush().unwrap();
        assert!(!store.has_pending_writes());
        assert_eq!(store.select_files(&FileFilter::live()).unwrap().len(), 2);
    }

    #[test]
    fn test_synced_write_commits_earlier_batch() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_file(&file("/p/a.rs", 0), false).unwrap();
        store.insert_file(&file("/p/b.rs", 0), true).unwrap();
        assert!(!store.has_pending_writes());
    }

    #[test]
    fn test_stamp_tracks_changes() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let empty = store.stamp().unwrap();
        assert_eq!(empty, StoreStamp::default());

        let mut row = file("/p/a.rs", 0);
        row.last_modified = 500;
        let id = store.insert_file(&row, true).unwrap();
        let first = store.stamp().unwrap();
        assert_eq!(first.max_modified, 500);
        assert_eq!(first.live_rows, 1);
        assert_eq!(first.max_id, id);

        store.delete_file(id, true).unwrap();
        let second = store.stamp().unwrap();
        assert_eq!(second.live_rows, 0);
        assert_eq!(second.max_id, id);
        assert_ne!(first, second);
    }

    #[test]
    fn test_history_lifecycle() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let old = store
            .insert_history(&HistoryRow::new("/p/a.rs", 1, 100, ChangeKind::Modified), true)
            .unwrap();
        let new = store
            .insert_history(&HistoryRow::new("/p/b.rs", 2, 900, ChangeKind::Deleted), true)
            .unwrap();

        let before = store.select_history_before(500).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].id, old);

        store.update_history_status(new, ReviewStatus::Approved).unwrap();
        assert_eq!(
            store.get_history(new).unwrap().unwrap().status,
            ReviewStatus::Approved
        );
        assert!(store.update_history_status(999, ReviewStatus::Rejected).is_err());

        let listed = store.list_history(10).unwrap();
        assert_eq!(listed[0].id, new);

        assert!(store.delete_history(old, true).unwrap());
        assert!(store.get_history(old).unwrap().is_none());
    }

    #[test]
    fn test_orphaned_deleted_rows() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let hid = store
            .insert_history(&HistoryRow::new("/p/a.rs", 1, 100, ChangeKind::Deleted), true)
            .unwrap();
        let mut row = file("/p/a.rs", 0);
        row.delete_id = hid;
        store.insert_file(&row, true).unwrap();

        assert!(store.select_orphaned_deleted().unwrap().is_empty());
        store.delete_history(hid, true).unwrap();
        let orphans = store.select_orphaned_deleted().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].path, "/p/a.rs");
    }

    #[test]
    fn test_meta_upsert() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_meta("last_reap").unwrap().is_none());
        store.set_meta("last_reap", "10").unwrap();
        store.set_meta("last_reap", "20").unwrap();
        assert_eq!(store.get_meta("last_reap").unwrap().as_deref(), Some("20"));
    }
}
