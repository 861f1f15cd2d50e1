//! Storage traits and query predicates.
//!
//! This module defines the abstraction `pfg-core` uses to persist the file
//! graph. The trait is deliberately row-oriented: the core engine owns all
//! tree semantics and only asks storage for flat inserts, updates, predicate
//! selects and deletes.

use crate::error::DbResult;
use crate::rows::{FileRow, HistoryRow, ReviewStatus};

// ============================================================================
// FileFilter
// ============================================================================

/// Predicate for [`FileStore::select_files`].
///
/// All set conditions are combined with `AND`. `under_any` matches a row whose
/// path equals one of the prefixes or lies strictly below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    /// Exclude soft-deleted rows.
    pub live_only: bool,
    /// Only rows flagged as projects.
    pub projects_only: bool,
    /// Path prefixes (exact or descendant match).
    pub under_any: Vec<String>,
    /// Restrict to these ids.
    pub ids: Vec<i64>,
}

impl FileFilter {
    /// Match every row, deleted or not.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match rows that are not soft-deleted.
    pub fn live() -> Self {
        Self {
            live_only: true,
            ..Default::default()
        }
    }

    /// Restrict to project rows.
    pub fn projects(mut self) -> Self {
        self.projects_only = true;
        self
    }

    /// Restrict to rows at or below any of the given paths.
    pub fn under_any<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.under_any = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to the given ids.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }
}

// ============================================================================
// StoreStamp
// ============================================================================

/// Cheap fingerprint of the file table used to decide whether an in-memory
/// tree is still current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStamp {
    /// Highest `last_modified` among live rows.
    pub max_modified: i64,
    /// Number of live rows.
    pub live_rows: i64,
    /// Highest row id ever handed out.
    pub max_id: i64,
}

// ============================================================================
// FileStore Trait
// ============================================================================

/// Trait for relational storage backends.
///
/// ## Write batching
///
/// Mutating calls take a `sync` flag. With `sync == false` the backend may
/// defer durability until the next [`FileStore::flush`] (or the next write
/// with `sync == true`), letting a scan pass or a multi-file edit pay for a
/// single flush.
pub trait FileStore: Send {
    // ========================================================================
    // File rows
    // ========================================================================

    /// Insert a row and return its new id. `row.id` is ignored.
    fn insert_file(&mut self, row: &FileRow, sync: bool) -> DbResult<i64>;

    /// Update every column of the row addressed by `row.id`.
    fn update_file(&mut self, row: &FileRow, sync: bool) -> DbResult<()>;

    /// Delete a row by id. Returns whether a row was removed.
    fn delete_file(&mut self, id: i64, sync: bool) -> DbResult<bool>;

    /// Select rows matching the filter, ordered by path.
    fn select_files(&self, filter: &FileFilter) -> DbResult<Vec<FileRow>>;

    /// Fetch a single row by id.
    fn get_file(&self, id: i64) -> DbResult<Option<FileRow>>;

    /// Fetch the live row for an absolute path.
    fn find_by_path(&self, path: &str) -> DbResult<Option<FileRow>>;

    /// Soft-deleted rows whose history record no longer exists.
    fn select_orphaned_deleted(&self) -> DbResult<Vec<FileRow>>;

    /// Fingerprint of the file table.
    fn stamp(&self) -> DbResult<StoreStamp>;

    // ========================================================================
    // History rows
    // ========================================================================

    /// Append a history record and return its id.
    fn insert_history(&mut self, row: &HistoryRow, sync: bool) -> DbResult<i64>;

    /// Change the review status of a history record.
    fn update_history_status(&mut self, id: i64, status: ReviewStatus) -> DbResult<()>;

    /// Fetch a history record by id.
    fn get_history(&self, id: i64) -> DbResult<Option<HistoryRow>>;

    /// Most recent history records first.
    fn list_history(&self, limit: usize) -> DbResult<Vec<HistoryRow>>;

    /// History records strictly older than `timestamp`, oldest first.
    fn select_history_before(&self, timestamp: i64) -> DbResult<Vec<HistoryRow>>;

    /// Delete a history record by id.
    fn delete_history(&mut self, id: i64, sync: bool) -> DbResult<bool>;

    // ========================================================================
    // Metadata
    // ========================================================================

    fn get_meta(&self, key: &str) -> DbResult<Option<String>>;

    fn set_meta(&mut self, key: &str, value: &str) -> DbResult<()>;

    /// Commit any deferred writes to disk.
    fn flush(&mut self) -> DbResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder() {
        let filter = FileFilter::live().projects().under_any(["/a", "/b"]);
        assert!(filter.live_only);
        assert!(filter.projects_only);
        assert_eq!(filter.under_any, vec!["/a".to_string(), "/b".to_string()]);
        assert!(filter.ids.is_empty());
    }

    #[test]
    fn test_filter_all_is_unrestricted() {
        assert_eq!(FileFilter::all(), FileFilter::default());
        assert!(!FileFilter::all().live_only);
    }
}
