//! Error types for pfg-db.

use thiserror::Error;

/// Result type alias for pfg-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in pfg-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Backend errors
    // ========================================================================
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be decoded into its domain type.
    #[error("Invalid {column} value '{value}' in storage")]
    Decode { column: String, value: String },

    /// A row addressed by id does not exist.
    #[error("{table} row {id} not found")]
    NotFound { table: String, id: i64 },

    // ========================================================================
    // General errors
    // ========================================================================
    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a decode error for an unexpected column value.
    pub fn decode(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(table: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            table: table.into(),
            id,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
