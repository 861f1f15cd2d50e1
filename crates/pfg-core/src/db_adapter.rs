//! Adapter layer for pfg-db infrastructure.
//!
//! This module bridges pfg-db with pfg-core's domain types. It provides:
//!
//! - Error conversion from `DbError` to `PfgError`
//! - Conversion between in-memory [`Entity`] values and flat [`FileRow`]s
//!
//! ## Architecture
//!
//! ```text
//! pfg-core domain code (scanner, loader, history, project)
//!        ↓
//!   db_adapter (this module) - conversions
//!        ↓
//!     pfg-db (SqliteStore implements FileStore)
//! ```

use std::path::PathBuf;

use pfg_db::{BaseType, DbError, DbResult, FileRow};

use crate::entity::{
    AliasMeta, Entity, EntityKind, FileMeta, FolderMeta, Identity, NodeId, ProjectView, RepoState,
};
use crate::errors::PfgError;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a pfg-db error to a pfg-core error.
pub fn from_db_error(err: DbError) -> PfgError {
    match err {
        DbError::Io(io_err) => PfgError::Io(io_err),
        other => PfgError::Storage(other.to_string()),
    }
}

/// Extension trait for converting `DbResult` into pfg-core results.
pub trait IntoPfgResult<T> {
    fn into_pfg(self) -> Result<T, PfgError>;
}

impl<T> IntoPfgResult<T> for DbResult<T> {
    fn into_pfg(self) -> Result<T, PfgError> {
        self.map_err(from_db_error)
    }
}

// ============================================================================
// Row Conversion
// ============================================================================

/// Flatten an entity into a storage row.
///
/// `row.id` is `0` for entities that were never inserted.
pub fn entity_to_row(entity: &Entity) -> FileRow {
    let mut row = FileRow::new(entity.path.to_string_lossy(), entity.base_type());
    row.id = entity.identity.db_id_or_zero();
    row.parent_id = entity.parent_id;
    row.is_project = entity.is_project();
    row.is_ignored = entity.is_ignored;
    row.is_text = entity.is_text;
    row.is_repo = entity.repo.to_db();
    row.last_viewed = entity.last_viewed;
    row.last_modified = entity.last_modified;
    row.delete_id = entity.delete_id;
    row.needs_approval = entity.needs_approval;

    match &entity.kind {
        EntityKind::File(meta) => {
            row.cursor_line = meta.cursor_line;
            row.cursor_offset = meta.cursor_offset;
            row.scroll_position = meta.scroll_position;
        }
        EntityKind::Alias(meta) => {
            row.points_to_id = meta.points_to_id;
            row.target_path = meta.target_path.to_string_lossy().into_owned();
        }
        EntityKind::Folder(_) => {}
    }
    row
}

/// Rebuild an unlinked entity from a storage row.
///
/// Arena links (`node`, `parent`, `points_to`, `children`) are left empty;
/// the tree loader resolves them from `parent_id` / `points_to_id`.
pub fn entity_from_row(row: &FileRow) -> Entity {
    let kind = match row.base_type {
        BaseType::File => EntityKind::File(FileMeta {
            cursor_line: row.cursor_line,
            cursor_offset: row.cursor_offset,
            scroll_position: row.scroll_position,
            is_unsaved: false,
        }),
        BaseType::Folder => EntityKind::Folder(FolderMeta {
            project: row.is_project.then(ProjectView::default),
            ..FolderMeta::default()
        }),
        BaseType::Alias => EntityKind::Alias(AliasMeta {
            points_to: None,
            points_to_id: row.points_to_id,
            target_path: PathBuf::from(&row.target_path),
        }),
    };

    Entity {
        node: NodeId(0),
        identity: Identity::from_db_id(row.id),
        path: PathBuf::from(&row.path),
        parent: None,
        parent_id: row.parent_id,
        is_active: false,
        is_ignored: row.is_ignored,
        is_text: row.is_text,
        repo: RepoState::from_db(row.is_repo),
        last_viewed: row.last_viewed,
        last_modified: row.last_modified,
        last_check_time: 0,
        delete_id: row.delete_id,
        needs_approval: row.needs_approval,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_round_trip_keeps_editor_metadata() {
        let mut entity = Entity::file("/p/a.rs");
        entity.identity = Identity::Tracked(4);
        entity.parent_id = 2;
        entity.is_text = true;
        entity.last_modified = 99;
        entity.needs_approval = true;
        if let Some(meta) = entity.file_meta_mut() {
            meta.cursor_line = 12;
            meta.scroll_position = 40;
        }

        let row = entity_to_row(&entity);
        assert_eq!(row.id, 4);
        assert_eq!(row.base_type, BaseType::File);
        assert_eq!(row.cursor_line, 12);

        let back = entity_from_row(&row);
        assert_eq!(back.identity, Identity::Tracked(4));
        assert_eq!(back.parent_id, 2);
        assert!(back.needs_approval);
        assert_eq!(back.file_meta().unwrap().scroll_position, 40);
    }

    #[test]
    fn test_project_flag_and_alias_target() {
        let mut folder = Entity::folder("/p");
        folder.set_project(true);
        let row = entity_to_row(&folder);
        assert!(row.is_project);
        assert!(entity_from_row(&row).is_project());

        let mut alias = Entity::alias("/p/link", "/q/lib");
        alias.alias_meta_mut().unwrap().points_to_id = 7;
        let row = entity_to_row(&alias);
        assert_eq!(row.target_path, "/q/lib");
        assert_eq!(row.points_to_id, 7);
        let back = entity_from_row(&row);
        assert_eq!(back.alias_meta().unwrap().target_path, PathBuf::from("/q/lib"));
    }

    #[test]
    fn test_untracked_entities_flatten_with_zero_id() {
        let mut entity = Entity::file("/tmp/x");
        entity.identity = Identity::Untracked;
        assert_eq!(entity_to_row(&entity).id, 0);
    }

    #[test]
    fn test_db_error_mapping() {
        let err = from_db_error(DbError::internal("boom"));
        assert!(matches!(err, PfgError::Storage(msg) if msg.contains("boom")));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(from_db_error(DbError::Io(io)), PfgError::Io(_)));
    }
}
