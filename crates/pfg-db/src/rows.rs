//! Flat storage rows for files and history.
//!
//! One [`FileRow`] exists per persisted entity (file, folder or alias) and one
//! append-only [`HistoryRow`] per recorded change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

// ============================================================================
// BaseType
// ============================================================================

/// Stored entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    File,
    Folder,
    Alias,
}

impl BaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Alias => "alias",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "folder" => Ok(Self::Folder),
            "alias" => Ok(Self::Alias),
            other => Err(DbError::decode("base_type", other)),
        }
    }
}

// ============================================================================
// ChangeKind / ReviewStatus
// ============================================================================

/// What happened to a file in a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(Self::Added),
            "modified" => Ok(Self::Modified),
            "deleted" => Ok(Self::Deleted),
            other => Err(DbError::decode("change_type", other)),
        }
    }
}

/// Review state of a history record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DbError::decode("status", other)),
        }
    }
}

// ============================================================================
// FileRow
// ============================================================================

/// One persisted file, folder or alias.
///
/// `parent_id` and `points_to_id` are `0` when absent. `is_repo` is stored as
/// `-1` (unchecked), `0` (no) or `1` (yes). A non-zero `delete_id` marks a
/// soft-deleted row and references the history record of the deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRow {
    pub id: i64,
    pub path: String,
    pub parent_id: i64,
    pub base_type: BaseType,
    pub points_to_id: i64,
    pub target_path: String,
    pub is_project: bool,
    pub is_ignored: bool,
    pub is_text: bool,
    pub is_repo: i64,
    pub last_viewed: i64,
    pub last_modified: i64,
    pub delete_id: i64,
    pub cursor_line: i64,
    pub cursor_offset: i64,
    pub scroll_position: i64,
    pub needs_approval: bool,
}

impl FileRow {
    /// Create a blank, not yet inserted row for `path`.
    pub fn new(path: impl Into<String>, base_type: BaseType) -> Self {
        Self {
            id: 0,
            path: path.into(),
            parent_id: 0,
            base_type,
            points_to_id: 0,
            target_path: String::new(),
            is_project: false,
            is_ignored: false,
            is_text: false,
            is_repo: -1,
            last_viewed: 0,
            last_modified: 0,
            delete_id: 0,
            cursor_line: 0,
            cursor_offset: 0,
            scroll_position: 0,
            needs_approval: false,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_id != 0
    }
}

// ============================================================================
// HistoryRow
// ============================================================================

/// An append-only record of a change to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub id: i64,
    pub path: String,
    pub filebase_id: i64,
    /// Unix seconds.
    pub timestamp: i64,
    pub change_type: ChangeKind,
    /// Empty when no backup was taken.
    pub backup_path: String,
    pub status: ReviewStatus,
    pub moved_to: String,
    pub moved_from: String,
}

impl HistoryRow {
    pub fn new(
        path: impl Into<String>,
        filebase_id: i64,
        timestamp: i64,
        change_type: ChangeKind,
    ) -> Self {
        Self {
            id: 0,
            path: path.into(),
            filebase_id,
            timestamp,
            change_type,
            backup_path: String::new(),
            status: ReviewStatus::Pending,
            moved_to: String::new(),
            moved_from: String::new(),
        }
    }

    pub fn with_backup(mut self, backup_path: impl Into<String>) -> Self {
        self.backup_path = backup_path.into();
        self
    }
}
