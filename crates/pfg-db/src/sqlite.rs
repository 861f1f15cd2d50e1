//! SQLite connection handling for the file graph store.

use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::DbResult;

/// Current schema version written by `schema.sql`.
const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed [`FileStore`](crate::FileStore).
///
/// Writes with `sync == false` are grouped into a deferred transaction that is
/// committed by [`SqliteStore::commit_pending`] (called from `flush()` and
/// from any subsequent `sync == true` write).
pub struct SqliteStore {
    conn: Connection,
    in_batch: bool,
}

impl SqliteStore {
    /// Open (or create) a database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            in_batch: false,
        };
        store.configure_pragmas()?;
        store.migrate_schema()?;
        debug!("Opened file store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            in_batch: false,
        };
        store.configure_pragmas()?;
        store.migrate_schema()?;
        Ok(store)
    }

    fn configure_pragmas(&self) -> DbResult<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, 16MB cache)");
        Ok(())
    }

    /// Check schema version and create tables if needed.
    fn migrate_schema(&self) -> DbResult<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < SCHEMA_VERSION {
            debug!("Schema version {} < {}, applying schema", version, SCHEMA_VERSION);
        }
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Whether a deferred transaction is currently open.
    pub fn has_pending_writes(&self) -> bool {
        self.in_batch
    }

    /// Prepare for a write: open a deferred transaction for unsynced writes.
    pub(crate) fn begin_write(&mut self, sync: bool) -> DbResult<()> {
        if !sync && !self.in_batch {
            self.conn.execute_batch("BEGIN DEFERRED")?;
            self.in_batch = true;
        }
        Ok(())
    }

    /// Finish a write: synced writes also commit anything deferred before them.
    pub(crate) fn end_write(&mut self, sync: bool) -> DbResult<()> {
        if sync {
            self.commit_pending()?;
        }
        Ok(())
    }

    /// Commit the deferred transaction, if any.
    pub fn commit_pending(&mut self) -> DbResult<()> {
        if self.in_batch {
            self.conn.execute_batch("COMMIT")?;
            self.in_batch = false;
            debug!("Committed deferred writes");
        }
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if self.in_batch {
            if let Err(e) = self.conn.execute_batch("COMMIT") {
                tracing::warn!("Failed to commit deferred writes on close: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_dirs_and_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/files.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());

        let version: i64 = store
            .connection()
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("files.db");
        drop(SqliteStore::open(&path).unwrap());
        assert!(SqliteStore::open(&path).is_ok());
    }

    #[test]
    fn test_batch_state_transitions() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.has_pending_writes());
        store.begin_write(false).unwrap();
        assert!(store.has_pending_writes());
        store.end_write(false).unwrap();
        assert!(store.has_pending_writes());
        store.commit_pending().unwrap();
        assert!(!store.has_pending_writes());
    }
}
