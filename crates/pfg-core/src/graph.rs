//! The in-memory file graph.
//!
//! [`FileGraph`] bundles the entity arena, the path index and the event bus
//! so that every structural mutation keeps the three in step:
//!
//! - children stay sorted by name
//! - each resident path maps to one node
//! - each splice of an observable list is published exactly once
//!
//! The graph is single-writer. Callers hold `&mut FileGraph` for mutations.

use std::collections::HashSet;
use std::path::Path;

use crate::entity::{Entity, EntityKind, NodeId};
use crate::notify::{EventBus, ListChange, ListKind};
use crate::path_index::PathIndex;
use crate::tree::FileTree;

#[derive(Debug, Default)]
pub struct FileGraph {
    tree: FileTree,
    index: PathIndex,
    events: EventBus,
}

impl FileGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn get(&self, node: NodeId) -> Option<&Entity> {
        self.tree.get(node)
    }

    /// Mutable access to an entity's fields.
    ///
    /// Structural fields (`path`, `parent`, `children`) must be changed
    /// through the graph operations below, not through this handle.
    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Entity> {
        self.tree.get_mut(node)
    }

    /// Entity at `path`, following aliases.
    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        self.index.lookup(path)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Drop all resident state. Subscribers are kept.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.index.clear();
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Insert an unparented entity (a project root or an alias target
    /// outside any loaded folder). Returns the existing node when the path is
    /// already resident.
    pub fn add_root(&mut self, entity: Entity) -> NodeId {
        if let Some(existing) = self.index.get(&entity.path) {
            return existing;
        }
        let path = entity.path.clone();
        let node = self.tree.insert(entity);
        if let Some(stored) = self.tree.get(node) {
            self.index.add(&path, stored, false);
        }
        node
    }

    /// Insert `entity` as a new child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, entity: Entity) -> NodeId {
        let path = entity.path.clone();
        let node = self.tree.insert(entity);
        if let Some(stored) = self.tree.get(node) {
            self.index.add(&path, stored, false);
        }
        self.adopt(parent, node);
        node
    }

    /// Link an already resident node under `parent`, keeping children sorted.
    pub fn adopt(&mut self, parent: NodeId, node: NodeId) {
        if let Some(old_parent) = self.tree.get(node).and_then(|e| e.parent) {
            if old_parent == parent {
                return;
            }
            self.detach(node);
        }

        let parent_id = self
            .tree
            .get(parent)
            .map(|p| p.identity.db_id_or_zero())
            .unwrap_or(0);
        let name = match self.tree.get_mut(node) {
            Some(entity) => {
                entity.parent = Some(parent);
                if parent_id != 0 {
                    entity.parent_id = parent_id;
                }
                entity.name().to_string()
            }
            None => return,
        };

        let position = {
            let Some(children) = self.tree.get(parent).map(|p| p.children().to_vec()) else {
                return;
            };
            children.partition_point(|child| {
                self.tree
                    .get(*child)
                    .map(|c| c.name() < name.as_str())
                    .unwrap_or(true)
            })
        };
        if let Some(meta) = self.tree.get_mut(parent).and_then(Entity::folder_meta_mut) {
            meta.children.insert(position, node);
            self.events
                .list_changed(ListKind::Children(parent), position, 0, 1);
        }
    }

    /// Unlink `node` from its parent's children. The node stays resident.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.tree.get_mut(node).and_then(|e| e.parent.take()) else {
            return;
        };
        if let Some(meta) = self.tree.get_mut(parent).and_then(Entity::folder_meta_mut) {
            if let Some(position) = meta.children.iter().position(|c| *c == node) {
                meta.children.remove(position);
                self.events
                    .list_changed(ListKind::Children(parent), position, 1, 0);
            }
        }
    }

    /// Detach `node` and evict it and everything it owns from memory.
    ///
    /// Returns the evicted entities, children before parents.
    pub fn drop_subtree(&mut self, node: NodeId) -> Vec<Entity> {
        self.detach(node);
        let mut order = self.tree.descendants_post_order(node);
        order.push(node);

        let mut removed = Vec::with_capacity(order.len());
        for current in order {
            if let Some(entity) = self.tree.remove(current) {
                if self.index.get(&entity.path) == Some(current) {
                    self.index.remove(&entity.path);
                }
                removed.push(entity);
            }
        }
        removed
    }

    /// Remove several children of one folder and publish a single splice
    /// covering all of them. The nodes stay resident.
    pub fn detach_many(&mut self, parent: NodeId, nodes: &HashSet<NodeId>) {
        let Some(meta) = self.tree.get_mut(parent).and_then(Entity::folder_meta_mut) else {
            return;
        };
        let before = meta.children.clone();
        meta.children.retain(|c| !nodes.contains(c));
        let after = meta.children.clone();
        for node in nodes {
            if let Some(entity) = self.tree.get_mut(*node) {
                if entity.parent == Some(parent) {
                    entity.parent = None;
                }
            }
        }
        if let Some(change) = ListChange::between(ListKind::Children(parent), &before, &after) {
            self.events
                .list_changed(change.list, change.position, change.removed, change.added);
        }
    }

    /// Link several resident, unparented nodes under `parent` at once and
    /// publish a single splice for the merge.
    pub fn attach_many(&mut self, parent: NodeId, nodes: &[NodeId]) {
        let Some(before) = self.tree.get(parent).map(|p| p.children().to_vec()) else {
            return;
        };
        if !self.tree.get(parent).is_some_and(Entity::is_folder) {
            return;
        }
        let parent_id = self
            .tree
            .get(parent)
            .map(|p| p.identity.db_id_or_zero())
            .unwrap_or(0);

        let mut after = before.clone();
        for node in nodes {
            if let Some(entity) = self.tree.get_mut(*node) {
                if entity.parent.is_some() {
                    continue;
                }
                entity.parent = Some(parent);
                if parent_id != 0 {
                    entity.parent_id = parent_id;
                }
                after.push(*node);
            }
        }
        after.sort_by(|a, b| {
            let name = |n: &NodeId| self.tree.get(*n).map(|e| e.name().to_string());
            name(a).cmp(&name(b))
        });
        after.dedup();

        if let Some(meta) = self.tree.get_mut(parent).and_then(Entity::folder_meta_mut) {
            meta.children = after.clone();
        }
        if let Some(change) = ListChange::between(ListKind::Children(parent), &before, &after) {
            self.events
                .list_changed(change.list, change.position, change.removed, change.added);
        }
    }

    /// Record that the alias at `alias_path` resolves to `target`.
    pub fn register_alias(&mut self, alias_path: &Path, target: NodeId) {
        if let Some(entity) = self.tree.get(target) {
            self.index.add(alias_path, entity, true);
        }
    }

    // ========================================================================
    // Projections
    // ========================================================================

    /// Project roots currently resident.
    pub fn projects(&self) -> Vec<NodeId> {
        let mut projects: Vec<&Entity> = self.tree.iter().filter(|e| e.is_project()).collect();
        projects.sort_by(|a, b| a.path.cmp(&b.path));
        projects.into_iter().map(|e| e.node).collect()
    }

    /// Project owning `node`: the nearest project ancestor, or a project
    /// whose projection includes it (files reached through aliases).
    pub fn containing_project(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            let entity = self.tree.get(id)?;
            if entity.is_project() {
                return Some(id);
            }
            current = entity.parent;
        }
        let path = self.tree.get(node)?.path.clone();
        self.projects().into_iter().find(|project| {
            self.tree.get(*project).is_some_and(|p| {
                path.starts_with(&p.path)
                    || p.project_view().is_some_and(|v| v.files.contains(&node))
            })
        })
    }

    /// Every non-ignored, live text file reachable from `root`, aliases
    /// resolved and duplicates removed, in tree order.
    pub fn collect_text_files(&self, root: NodeId) -> Vec<NodeId> {
        let mut files = Vec::new();
        let mut seen = HashSet::from([root]);
        self.collect_into(root, &mut seen, &mut files);
        files
    }

    fn collect_into(&self, folder: NodeId, seen: &mut HashSet<NodeId>, files: &mut Vec<NodeId>) {
        for child in self.tree.children(folder) {
            let Some(entity) = self.tree.get(child) else {
                continue;
            };
            if entity.is_ignored || entity.is_deleted() {
                continue;
            }
            let Some(resolved) = self.tree.resolve(child) else {
                continue;
            };
            if !seen.insert(resolved) {
                continue;
            }
            let Some(target) = self.tree.get(resolved) else {
                continue;
            };
            if target.is_ignored || target.is_deleted() {
                continue;
            }
            match &target.kind {
                EntityKind::File(_) if target.is_text => files.push(resolved),
                EntityKind::Folder(_) => self.collect_into(resolved, seen, files),
                _ => {}
            }
        }
    }

    /// Recompute a project's flat file list and review view, publishing one
    /// splice per list that changed. Returns whether anything changed.
    pub fn refresh_projection(&mut self, project: NodeId) -> bool {
        let Some(old) = self.tree.get(project).and_then(|p| p.project_view()).cloned() else {
            return false;
        };

        let files = self.collect_text_files(project);
        let review: Vec<NodeId> = files
            .iter()
            .copied()
            .filter(|f| self.tree.get(*f).is_some_and(|e| e.needs_approval))
            .collect();

        let files_change = ListChange::between(ListKind::ProjectFiles(project), &old.files, &files);
        let review_change = ListChange::between(ListKind::ReviewFiles(project), &old.review, &review);
        if files_change.is_none() && review_change.is_none() {
            return false;
        }

        if let Some(view) = self.tree.get_mut(project).and_then(Entity::project_view_mut) {
            view.files = files;
            view.review = review;
        }
        for change in [files_change, review_change].into_iter().flatten() {
            self.events
                .list_changed(change.list, change.position, change.removed, change.added);
        }
        true
    }

    /// Refresh the projection of every resident project.
    pub fn refresh_all_projections(&mut self) {
        for project in self.projects() {
            self.refresh_projection(project);
        }
    }

    /// Move an entity to `new_path`, re-keying it and everything below it.
    pub fn rename(&mut self, node: NodeId, new_path: &Path) {
        let Some(old_path) = self.tree.get(node).map(|e| e.path.clone()) else {
            return;
        };
        let mut affected = self.tree.descendants_post_order(node);
        affected.push(node);

        for current in affected {
            let Some(entity) = self.tree.get_mut(current) else {
                continue;
            };
            let before = entity.path.clone();
            let Ok(rest) = before.strip_prefix(&old_path) else {
                continue;
            };
            entity.path = if rest.as_os_str().is_empty() {
                new_path.to_path_buf()
            } else {
                new_path.join(rest)
            };
            let is_alias = entity.is_alias();
            let snapshot = entity.clone();
            self.index.rename(&before, &snapshot, false);
            if is_alias {
                self.index.rename(&before, &snapshot, true);
            }
        }
    }
}
