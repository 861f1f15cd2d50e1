//! # pfg-db
//!
//! Infrastructure layer for pfg - relational storage for the project file graph.
//!
//! This crate keeps the SQLite dependency out of `pfg-core`'s domain logic.
//! The core engine talks to storage only through the [`FileStore`] trait, so
//! tests and alternative backends can swap the implementation freely.
//!
//! ## Architecture
//!
//! ```text
//! pfg-cli → pfg-core → (FileStore trait)
//!              ↑
//!           pfg-db (SqliteStore implements FileStore)
//! ```
//!
//! ## Modules
//!
//! - `rows`: flat storage rows (`FileRow`, `HistoryRow`) and their enums
//! - `traits`: the `FileStore` trait and the `FileFilter` predicate builder
//! - `sqlite`: connection handling, schema migration and write batching
//! - `queries`: the `FileStore` implementation for `SqliteStore`
//!
//! ## Usage
//!
//! ```ignore
//! use pfg_db::{FileFilter, FileStore, SqliteStore};
//!
//! let mut store = SqliteStore::open("/path/to/files.db")?;
//! let projects = store.select_files(&FileFilter::live().projects())?;
//! ```

pub mod error;
mod queries;
pub mod rows;
pub mod sqlite;
pub mod traits;

pub use error::{DbError, DbResult};
pub use rows::{BaseType, ChangeKind, FileRow, HistoryRow, ReviewStatus};
pub use sqlite::SqliteStore;
pub use traits::{FileFilter, FileStore, StoreStamp};
