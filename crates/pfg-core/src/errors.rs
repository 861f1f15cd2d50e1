//! Error types for pfg-core.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-specific errors for file graph operations.
#[derive(Error, Debug)]
pub enum PfgError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Global configuration file is invalid.
    #[error("Global config invalid: {0}")]
    InvalidGlobalConfig(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    // =========================================================================
    // Path / Project Errors
    // =========================================================================
    /// A path or file was not found.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// An invalid path was provided (e.g., relative, disk root).
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A symlink resolved outside the allowed root.
    #[error("Symlink target `{target}` is outside the allowed root `{root}`")]
    OutsideAllowedRoot {
        /// The resolved symlink target.
        target: PathBuf,
        /// The configured security boundary.
        root: PathBuf,
    },

    /// No project is registered at the given path.
    #[error("No project registered at `{0}`. Run `pfg project add` first.")]
    ProjectNotFound(String),

    /// The path is tracked but is not a project root.
    #[error("`{0}` is not a project")]
    NotAProject(String),

    /// The operation needs an active project.
    #[error("No active project.")]
    NoActiveProject,

    // =========================================================================
    // Scan Errors
    // =========================================================================
    /// Enumerating a folder failed.
    #[error("Failed to scan `{path}`: {reason}")]
    ScanFailed {
        /// Folder whose enumeration failed.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    // =========================================================================
    // Edit Errors
    // =========================================================================
    /// A line range does not fit the file. Aborts the whole batch.
    #[error("Edit range {start}..{end} is out of bounds for `{path}` ({line_count} lines)")]
    EditOutOfRange {
        /// File being edited.
        path: PathBuf,
        /// Requested 1-based start line.
        start: usize,
        /// Requested 1-based exclusive end line.
        end: usize,
        /// Number of lines in the file.
        line_count: usize,
    },

    /// An edit batch could not be applied or written.
    #[error("Failed to edit `{path}`: {reason}")]
    EditFailed {
        /// File being edited.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A syntax-tree provider could not parse a file.
    #[error("Failed to parse `{path}`: {reason}")]
    ParseFailed {
        /// File being parsed.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    // =========================================================================
    // History Errors
    // =========================================================================
    /// Taking a backup copy before a destructive change failed.
    #[error("Failed to back up `{path}`: {reason}")]
    BackupFailed {
        /// File being backed up.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A history record does not exist.
    #[error("History record {0} not found")]
    HistoryNotFound(i64),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The relational store reported an error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PfgError {
    /// Create a scan failure for a folder.
    pub fn scan_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ScanFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an edit failure for a file.
    pub fn edit_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::EditFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
