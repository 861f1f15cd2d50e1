//! # pfg-core
//!
//! **Project File Graph** – core engine library.
//!
//! This crate keeps a live, persistent model of a user's project files:
//! recursive scanning with symlink resolution, reconciliation against the
//! relational store, reconstruction of trees from stored rows, and
//! line-based or AST-addressed text edits with backup history.
//!
//! ## Main Types
//!
//! - [`ProjectManager`] – the main entry point for all graph operations
//! - [`FileGraph`] – arena tree, path index and change notifications
//! - [`Entity`] – a file, folder or symlink known to the engine
//! - [`PfgError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`entity`], [`tree`], [`path_index`], [`graph`] – the in-memory model
//! - [`scanner`] – filesystem reconciliation
//! - [`loader`] – tree reconstruction from storage
//! - [`edit`] – the edit engine
//! - [`history`] – soft delete, backups and the reaper
//! - [`buffers`] – in-memory text buffers
//! - [`ignore_rules`], [`syntax`] – capability traits and their defaults
//! - [`notify`] – change notifications
//!
//! ## Example
//!
//! ```ignore
//! use pfg_core::{GlobalConfig, ProjectManager};
//! use std::path::Path;
//!
//! let config = GlobalConfig::load_default()?;
//! let mut manager = ProjectManager::open_default(config)?;
//!
//! manager.create_project(Path::new("/home/me/app"))?;
//! let report = manager.activate_project(Path::new("/home/me/app"))?;
//! println!("{} changes on disk", report.scan.mutations());
//! ```

// Modules
pub mod buffers;
pub mod config;
pub mod constants;
pub mod db_adapter;
pub mod edit;
pub mod entity;
pub mod errors;
pub mod graph;
pub mod history;
pub mod ignore_rules;
pub mod loader;
pub mod notify;
pub mod path_index;
pub mod project;
pub mod scanner;
pub mod syntax;
pub mod tree;

// Re-exports for convenience
pub use buffers::{BufferCache, BufferState};
pub use config::{BufferConfig, GlobalConfig, HistoryConfig, ScanConfig};
pub use edit::{apply_changes, EditOutcome, FileChange, OperationType};
pub use entity::{Entity, EntityKind, Identity, NodeId, RepoState};
pub use errors::PfgError;
pub use graph::FileGraph;
pub use history::{HistoryManager, ReapReport, RemoveReport};
pub use ignore_rules::{GitIgnoreRules, IgnoreRules, NoIgnore};
pub use loader::{load_project, LoadReport};
pub use notify::{EventBus, EventRecorder, GraphEvent, ListChange, ListKind};
pub use path_index::PathIndex;
pub use project::{ActivationReport, ProjectManager, ProjectSummary};
pub use scanner::{ScanReport, ScanToken, Scanner};
pub use syntax::{OutlineSyntax, SyntaxNode, SyntaxProvider, SyntaxTree};

// Storage types that appear in the public API.
pub use pfg_db::{ChangeKind, FileStore, HistoryRow, ReviewStatus, SqliteStore};
