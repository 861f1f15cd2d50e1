//! Arena holding every resident entity.
//!
//! Parent and alias links are [`NodeId`]s into this arena, so cyclic alias
//! graphs never form ownership cycles.

use std::collections::{HashMap, HashSet};

use crate::entity::{Entity, EntityKind, NodeId};

#[derive(Debug, Default)]
pub struct FileTree {
    nodes: HashMap<NodeId, Entity>,
    next_id: u64,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `entity` into the arena and return its freshly assigned key.
    pub fn insert(&mut self, mut entity: Entity) -> NodeId {
        self.next_id += 1;
        let node = NodeId(self.next_id);
        entity.node = node;
        self.nodes.insert(node, entity);
        node
    }

    /// Replace the entity stored at `entity.node`.
    pub fn replace(&mut self, entity: Entity) -> Option<Entity> {
        self.nodes.insert(entity.node, entity)
    }

    pub fn get(&self, node: NodeId) -> Option<&Entity> {
        self.nodes.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Entity> {
        self.nodes.get_mut(&node)
    }

    pub fn remove(&mut self, node: NodeId) -> Option<Entity> {
        self.nodes.remove(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.nodes.values()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Children of a folder (empty for files and aliases).
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get(node)
            .map(|e| e.children().to_vec())
            .unwrap_or_default()
    }

    /// Follow an alias chain to the first non-alias entity.
    ///
    /// Returns `None` for a dangling alias or a chain that loops.
    pub fn resolve(&self, node: NodeId) -> Option<NodeId> {
        let mut seen = HashSet::new();
        let mut current = node;
        loop {
            if !seen.insert(current) {
                return None;
            }
            match &self.get(current)?.kind {
                EntityKind::Alias(meta) => current = meta.points_to?,
                _ => return Some(current),
            }
        }
    }

    /// Every entity owned below `node`, children before their parents.
    /// Does not follow aliases.
    pub fn descendants_post_order(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(node, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                if current != node {
                    out.push(current);
                }
                continue;
            }
            stack.push((current, true));
            for child in self.children(current).into_iter().rev() {
                stack.push((child, false));
            }
        }
        out
    }
}
