//! Entity model for the project file graph.
//!
//! Every file, folder and symlink the engine knows about is an [`Entity`]
//! living in the [`FileTree`](crate::tree::FileTree) arena. The variant data
//! is a closed sum type ([`EntityKind`]) so code handling entities matches
//! exhaustively on File / Folder / Alias.
//!
//! Links between entities (parent, alias target) are stored as [`NodeId`]s
//! and resolved through the arena at use time.

use std::fmt;
use std::path::{Path, PathBuf};

use pfg_db::{BaseType, StoreStamp};
use serde::{Deserialize, Serialize};

// ============================================================================
// NodeId / Identity
// ============================================================================

/// Stable key of an entity inside the in-memory arena.
///
/// Unrelated to the storage row id: untracked and not-yet-saved entities
/// still have a `NodeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage identity of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "lowercase")]
pub enum Identity {
    /// Not yet inserted; the next save inserts a row.
    #[default]
    New,
    /// Persisted under this row id.
    Tracked(i64),
    /// Outside any project; never written to storage.
    Untracked,
}

impl Identity {
    /// Map a storage row id to an identity (`0` means not yet inserted).
    pub fn from_db_id(id: i64) -> Self {
        if id > 0 {
            Identity::Tracked(id)
        } else {
            Identity::New
        }
    }

    /// Row id, when persisted.
    pub fn db_id(&self) -> Option<i64> {
        match self {
            Identity::Tracked(id) => Some(*id),
            _ => None,
        }
    }

    /// Row id as stored in foreign-key columns (`0` when absent).
    pub fn db_id_or_zero(&self) -> i64 {
        self.db_id().unwrap_or(0)
    }

    pub fn is_untracked(&self) -> bool {
        matches!(self, Identity::Untracked)
    }
}

/// Tri-state result of repository discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoState {
    #[default]
    Unchecked,
    No,
    Yes,
}

impl RepoState {
    pub fn from_db(value: i64) -> Self {
        match value {
            0 => RepoState::No,
            1 => RepoState::Yes,
            _ => RepoState::Unchecked,
        }
    }

    pub fn to_db(self) -> i64 {
        match self {
            RepoState::Unchecked => -1,
            RepoState::No => 0,
            RepoState::Yes => 1,
        }
    }
}

// ============================================================================
// Variant data
// ============================================================================

/// Editor metadata kept for files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMeta {
    pub cursor_line: i64,
    pub cursor_offset: i64,
    pub scroll_position: i64,
    /// The in-memory buffer holds edits not yet written to disk.
    pub is_unsaved: bool,
}

/// Flat views maintained for a project folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectView {
    /// Every non-ignored descendant text file, aliases resolved.
    pub files: Vec<NodeId>,
    /// Subset of `files` with `needs_approval` set.
    pub review: Vec<NodeId>,
    /// Store fingerprint at the last successful load.
    pub loaded_stamp: Option<StoreStamp>,
}

/// Folder data: owned children and scan bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMeta {
    /// Children sorted by name.
    pub children: Vec<NodeId>,
    /// Last scan pass token that visited this folder.
    pub scan_pass: u64,
    /// Present when the folder is a project root.
    pub project: Option<ProjectView>,
}

/// Symlink data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMeta {
    /// Resolved target entity, when resident.
    pub points_to: Option<NodeId>,
    /// Row id of the target (`0` when unknown).
    pub points_to_id: i64,
    /// Canonical path of the target.
    pub target_path: PathBuf,
}

/// Closed set of entity kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    File(FileMeta),
    Folder(FolderMeta),
    Alias(AliasMeta),
}

impl EntityKind {
    pub fn base_type(&self) -> BaseType {
        match self {
            EntityKind::File(_) => BaseType::File,
            EntityKind::Folder(_) => BaseType::Folder,
            EntityKind::Alias(_) => BaseType::Alias,
        }
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A file, folder or symlink known to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Arena key (assigned on insertion into the tree).
    pub node: NodeId,
    pub identity: Identity,
    /// Absolute path; unique in the path index while resident.
    pub path: PathBuf,
    /// Owning folder, if linked.
    pub parent: Option<NodeId>,
    /// Row id of the owning folder (`0` when none).
    pub parent_id: i64,
    pub is_active: bool,
    pub is_ignored: bool,
    pub is_text: bool,
    pub repo: RepoState,
    /// Unix seconds.
    pub last_viewed: i64,
    /// Unix seconds (filesystem mtime).
    pub last_modified: i64,
    /// Unix seconds of the last disk check (not persisted).
    pub last_check_time: i64,
    /// `0` while live; otherwise the history id of the deletion.
    pub delete_id: i64,
    pub needs_approval: bool,
    pub kind: EntityKind,
}

impl Entity {
    fn with_kind(path: impl Into<PathBuf>, kind: EntityKind) -> Self {
        Self {
            node: NodeId(0),
            identity: Identity::New,
            path: path.into(),
            parent: None,
            parent_id: 0,
            is_active: false,
            is_ignored: false,
            is_text: false,
            repo: RepoState::Unchecked,
            last_viewed: 0,
            last_modified: 0,
            last_check_time: 0,
            delete_id: 0,
            needs_approval: false,
            kind,
        }
    }

    /// A new file entity.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, EntityKind::File(FileMeta::default()))
    }

    /// A new folder entity.
    pub fn folder(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, EntityKind::Folder(FolderMeta::default()))
    }

    /// A new alias entity pointing at `target_path`.
    pub fn alias(path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        Self::with_kind(
            path,
            EntityKind::Alias(AliasMeta {
                target_path: target_path.into(),
                ..AliasMeta::default()
            }),
        )
    }

    pub fn base_type(&self) -> BaseType {
        self.kind.base_type()
    }

    /// Final path component.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, EntityKind::Folder(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntityKind::File(_))
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind, EntityKind::Alias(_))
    }

    pub fn is_project(&self) -> bool {
        matches!(
            &self.kind,
            EntityKind::Folder(FolderMeta {
                project: Some(_),
                ..
            })
        )
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_id != 0
    }

    /// Identity used when diffing a rescan: same path and same kind.
    pub fn same_identity(&self, other: &Entity) -> bool {
        self.path == other.path && self.base_type() == other.base_type()
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            EntityKind::Folder(meta) => &meta.children,
            _ => &[],
        }
    }

    pub fn folder_meta(&self) -> Option<&FolderMeta> {
        match &self.kind {
            EntityKind::Folder(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn folder_meta_mut(&mut self) -> Option<&mut FolderMeta> {
        match &mut self.kind {
            EntityKind::Folder(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn alias_meta(&self) -> Option<&AliasMeta> {
        match &self.kind {
            EntityKind::Alias(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn alias_meta_mut(&mut self) -> Option<&mut AliasMeta> {
        match &mut self.kind {
            EntityKind::Alias(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn file_meta(&self) -> Option<&FileMeta> {
        match &self.kind {
            EntityKind::File(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn file_meta_mut(&mut self) -> Option<&mut FileMeta> {
        match &mut self.kind {
            EntityKind::File(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn project_view(&self) -> Option<&ProjectView> {
        self.folder_meta().and_then(|m| m.project.as_ref())
    }

    pub fn project_view_mut(&mut self) -> Option<&mut ProjectView> {
        self.folder_meta_mut().and_then(|m| m.project.as_mut())
    }

    /// Flag or unflag this folder as a project root. No-op for non-folders.
    pub fn set_project(&mut self, is_project: bool) {
        if let Some(meta) = self.folder_meta_mut() {
            match (is_project, meta.project.is_some()) {
                (true, false) => meta.project = Some(ProjectView::default()),
                (false, true) => meta.project = None,
                _ => {}
            }
        }
    }

    /// Whether `path` is this entity's path or lies below it.
    pub fn contains_path(&self, path: &Path) -> bool {
        path.starts_with(&self.path)
    }

    /// Copy the storage-owned fields of `stored` onto this freshly scanned
    /// entity. Returns `true` when a filesystem-owned field differs, meaning
    /// the row needs an update.
    pub fn absorb_stored(&mut self, stored: &Entity) -> bool {
        let changed = self.last_modified != stored.last_modified
            || self.is_ignored != stored.is_ignored
            || self.is_text != stored.is_text
            || self.alias_meta().map(|m| &m.target_path)
                != stored.alias_meta().map(|m| &m.target_path);

        self.node = stored.node;
        self.identity = stored.identity;
        self.parent = stored.parent;
        self.parent_id = stored.parent_id;
        self.is_active = stored.is_active;
        self.repo = stored.repo;
        self.last_viewed = stored.last_viewed;
        self.delete_id = stored.delete_id;
        self.needs_approval = stored.needs_approval;

        match (&mut self.kind, &stored.kind) {
            (EntityKind::File(fresh), EntityKind::File(old)) => {
                fresh.cursor_line = old.cursor_line;
                fresh.cursor_offset = old.cursor_offset;
                fresh.scroll_position = old.scroll_position;
                fresh.is_unsaved = old.is_unsaved;
            }
            (EntityKind::Folder(fresh), EntityKind::Folder(old)) => {
                fresh.children = old.children.clone();
                fresh.scan_pass = old.scan_pass;
                fresh.project = old.project.clone();
            }
            (EntityKind::Alias(fresh), EntityKind::Alias(old)) => {
                if fresh.target_path == old.target_path {
                    fresh.points_to = old.points_to;
                    fresh.points_to_id = old.points_to_id;
                }
            }
            _ => {}
        }

        changed
    }
}
