//! Persistent tree loader.
//!
//! Rebuilds a project's subtree from flat storage rows without reading the
//! whole table:
//!
//! 1. Seed an id → node map with the project root.
//! 2. Select live rows at or below every path in the frontier.
//! 3. The next frontier is the alias targets among the new rows that are not
//!    loaded yet. Stop when a round yields nothing new.
//! 4. Link every loaded entity to its parent and alias target through the map.
//!
//! Linking happens after loading so rows can arrive in any order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use pfg_db::{FileFilter, FileStore};
use serde::Serialize;
use tracing::{debug, info};

use crate::db_adapter::{entity_from_row, IntoPfgResult};
use crate::entity::{Identity, NodeId};
use crate::errors::PfgError;
use crate::graph::FileGraph;

/// Summary of one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    /// Entities created in memory.
    pub loaded: usize,
    /// Frontier rounds executed.
    pub rounds: usize,
    /// The store was unchanged since the last load; nothing was read.
    pub cache_hit: bool,
}

/// Load the subtree of `project` (already resident and tracked) from storage.
///
/// # Errors
///
/// Returns [`PfgError::NotAProject`] when `project` is not a tracked project
/// folder, or a storage error from the store.
pub fn load_project(
    graph: &mut FileGraph,
    store: &dyn FileStore,
    project: NodeId,
) -> Result<LoadReport, PfgError> {
    let (root_id, root_path, loaded_stamp) = match graph.get(project) {
        Some(e) if e.is_project() => match e.identity.db_id() {
            Some(id) => (
                id,
                e.path.clone(),
                e.project_view().and_then(|v| v.loaded_stamp),
            ),
            None => return Err(PfgError::NotAProject(e.path.display().to_string())),
        },
        Some(e) => return Err(PfgError::NotAProject(e.path.display().to_string())),
        None => return Err(PfgError::NotAProject(format!("{}", project))),
    };

    let stamp = store.stamp().into_pfg()?;
    if loaded_stamp == Some(stamp) {
        debug!("Store unchanged since last load of {}", root_path.display());
        return Ok(LoadReport {
            cache_hit: true,
            ..LoadReport::default()
        });
    }

    let mut report = LoadReport::default();
    let mut by_id: HashMap<i64, NodeId> = HashMap::from([(root_id, project)]);
    let mut created: Vec<NodeId> = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::from([root_path.clone()]);
    let mut frontier: Vec<PathBuf> = vec![root_path.clone()];

    while !frontier.is_empty() {
        report.rounds += 1;
        let filter = FileFilter::live().under_any(
            frontier
                .iter()
                .map(|p| p.to_string_lossy().into_owned()),
        );
        let rows = store.select_files(&filter).into_pfg()?;

        let mut next = Vec::new();
        for row in rows {
            if by_id.contains_key(&row.id) {
                continue;
            }
            let resident = graph.index().get(PathBuf::from(&row.path).as_path());
            let node = match resident {
                Some(node) => {
                    if let Some(entity) = graph.get_mut(node) {
                        if matches!(entity.identity, Identity::New | Identity::Untracked) {
                            entity.identity = Identity::Tracked(row.id);
                        }
                    }
                    node
                }
                None => {
                    let node = graph.add_root(entity_from_row(&row));
                    created.push(node);
                    node
                }
            };
            by_id.insert(row.id, node);

            if !row.target_path.is_empty() {
                let target = PathBuf::from(&row.target_path);
                if graph.index().get(&target).is_none() && visited.insert(target.clone()) {
                    next.push(target);
                }
            }
        }
        frontier = next;
    }

    link(graph, &by_id, &created);
    report.loaded = created.len();

    graph.refresh_projection(project);
    if let Some(view) = graph.get_mut(project).and_then(|e| e.project_view_mut()) {
        view.loaded_stamp = Some(stamp);
    }

    info!(
        "Loaded {} entities for {} in {} rounds",
        report.loaded,
        root_path.display(),
        report.rounds
    );
    Ok(report)
}

/// Second pass: attach parents and resolve alias targets.
fn link(graph: &mut FileGraph, by_id: &HashMap<i64, NodeId>, created: &[NodeId]) {
    // BTreeMap keeps the attach order deterministic.
    let mut by_parent: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    let mut aliases: Vec<(NodeId, PathBuf, Option<NodeId>)> = Vec::new();

    for node in created {
        let Some(entity) = graph.get(*node) else {
            continue;
        };
        if entity.parent_id != 0 {
            if let Some(parent) = by_id.get(&entity.parent_id) {
                by_parent.entry(*parent).or_default().push(*node);
            }
        }
        if let Some(meta) = entity.alias_meta() {
            let target = by_id
                .get(&meta.points_to_id)
                .copied()
                .or_else(|| graph.index().get(&meta.target_path));
            aliases.push((*node, meta.target_path.clone(), target));
        }
    }

    for (parent, children) in by_parent {
        graph.attach_many(parent, &children);
    }

    for (alias, target_path, target) in aliases {
        let Some(target) = target else {
            debug!("Alias target {} not stored", target_path.display());
            continue;
        };
        let alias_path = match graph.get_mut(alias) {
            Some(entity) => {
                if let Some(meta) = entity.alias_meta_mut() {
                    meta.points_to = Some(target);
                }
                entity.path.clone()
            }
            None => continue,
        };
        graph.register_alias(&alias_path, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use pfg_db::{BaseType, FileRow, SqliteStore};
    use std::path::Path;

    fn insert(store: &mut SqliteStore, row: FileRow) -> i64 {
        store.insert_file(&row, true).unwrap()
    }

    fn row(path: &str, base: BaseType, parent_id: i64) -> FileRow {
        let mut r = FileRow::new(path, base);
        r.parent_id = parent_id;
        r.is_text = base == BaseType::File;
        r
    }

    fn seed_project(store: &mut SqliteStore, graph: &mut FileGraph) -> NodeId {
        let mut root = row("/p", BaseType::Folder, 0);
        root.is_project = true;
        let id = insert(store, root.clone());
        root.id = id;
        graph.add_root(entity_from_row(&root))
    }

    #[test]
    fn test_loads_nested_rows_and_links_parents() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut graph = FileGraph::new();
        let project = seed_project(&mut store, &mut graph);
        let root_id = graph.get(project).unwrap().identity.db_id().unwrap();

        let src = insert(&mut store, row("/p/src", BaseType::Folder, root_id));
        insert(&mut store, row("/p/src/main.rs", BaseType::File, src));
        insert(&mut store, row("/p/a.rs", BaseType::File, root_id));
        insert(&mut store, row("/other/x.rs", BaseType::File, 0));

        let report = load_project(&mut graph, &store, project).unwrap();
        assert_eq!(report.loaded, 3);
        assert_eq!(report.rounds, 1);

        let main = graph.lookup(Path::new("/p/src/main.rs")).unwrap();
        let src_node = graph.lookup(Path::new("/p/src")).unwrap();
        assert_eq!(graph.get(main).unwrap().parent, Some(src_node));
        assert!(graph.lookup(Path::new("/other/x.rs")).is_none());
        let view = graph.get(project).unwrap().project_view().unwrap();
        assert_eq!(view.files.len(), 2);
    }

    #[test]
    fn test_follows_alias_targets_iteratively() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut graph = FileGraph::new();
        let project = seed_project(&mut store, &mut graph);
        let root_id = graph.get(project).unwrap().identity.db_id().unwrap();

        // /p/lib -> /q/lib, and /q/lib/more -> /r
        let q_lib = insert(&mut store, row("/q/lib", BaseType::Folder, 0));
        insert(&mut store, row("/q/lib/util.rs", BaseType::File, q_lib));
        let r = insert(&mut store, row("/r", BaseType::Folder, 0));
        insert(&mut store, row("/r/deep.rs", BaseType::File, r));

        let mut alias = row("/p/lib", BaseType::Alias, root_id);
        alias.target_path = "/q/lib".into();
        alias.points_to_id = q_lib;
        insert(&mut store, alias);
        let mut alias2 = row("/q/lib/more", BaseType::Alias, q_lib);
        alias2.target_path = "/r".into();
        alias2.points_to_id = r;
        insert(&mut store, alias2);

        let report = load_project(&mut graph, &store, project).unwrap();
        assert_eq!(report.rounds, 3);
        assert_eq!(report.loaded, 6);

        let deep = graph.lookup(Path::new("/p/lib/more/deep.rs")).unwrap();
        assert_eq!(graph.get(deep).unwrap().path, PathBuf::from("/r/deep.rs"));
        let view = graph.get(project).unwrap().project_view().unwrap();
        assert_eq!(view.files.len(), 2);
    }

    #[test]
    fn test_unchanged_store_is_a_cache_hit() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut graph = FileGraph::new();
        let project = seed_project(&mut store, &mut graph);

        assert!(!load_project(&mut graph, &store, project).unwrap().cache_hit);
        assert!(load_project(&mut graph, &store, project).unwrap().cache_hit);

        let root_id = graph.get(project).unwrap().identity.db_id().unwrap();
        insert(&mut store, row("/p/new.rs", BaseType::File, root_id));
        let report = load_project(&mut graph, &store, project).unwrap();
        assert!(!report.cache_hit);
        assert_eq!(report.loaded, 1);
    }

    #[test]
    fn test_soft_deleted_rows_are_skipped() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut graph = FileGraph::new();
        let project = seed_project(&mut store, &mut graph);
        let root_id = graph.get(project).unwrap().identity.db_id().unwrap();

        let mut gone = row("/p/gone.rs", BaseType::File, root_id);
        gone.delete_id = 3;
        insert(&mut store, gone);

        let report = load_project(&mut graph, &store, project).unwrap();
        assert_eq!(report.loaded, 0);
    }

    #[test]
    fn test_rejects_non_project() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut graph = FileGraph::new();
        let mut plain = Entity::folder("/plain");
        plain.identity = Identity::Tracked(1);
        let node = graph.add_root(plain);
        assert!(matches!(
            load_project(&mut graph, &store, node),
            Err(PfgError::NotAProject(_))
        ));
    }
}
