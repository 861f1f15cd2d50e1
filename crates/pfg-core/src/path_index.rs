//! Path lookup for resident entities.
//!
//! Two maps are kept:
//! - `entries`: absolute path → arena node, one entity per path
//! - `aliases`: alias path → real (canonical) path of its target
//!
//! Removing a path also drops every alias whose value is that path so no
//! alias keeps pointing at a target that left memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::entity::{Entity, NodeId};

#[derive(Debug, Default, Clone)]
pub struct PathIndex {
    entries: HashMap<PathBuf, NodeId>,
    aliases: HashMap<PathBuf, PathBuf>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entity` under `path`.
    ///
    /// With `is_alias`, `path` is a symlink path and `entity` is its resolved
    /// target: the alias map records `path → entity.path` and the target
    /// itself is registered under its own path.
    pub fn add(&mut self, path: &Path, entity: &Entity, is_alias: bool) {
        if is_alias {
            self.aliases
                .insert(path.to_path_buf(), entity.path.clone());
            self.entries.insert(entity.path.clone(), entity.node);
        } else {
            self.entries.insert(path.to_path_buf(), entity.node);
        }
    }

    /// Forget `path`, including every alias that resolved to it.
    pub fn remove(&mut self, path: &Path) -> Option<NodeId> {
        let removed = self.entries.remove(path);
        self.aliases.remove(path);
        self.aliases.retain(|_, target| target.as_path() != path);
        removed
    }

    /// Move an entry from `old_path` to `new_entity.path`.
    ///
    /// For a real entity, aliases that resolved to `old_path` are repointed at
    /// the new path. For an alias, the alias key itself moves.
    pub fn rename(&mut self, old_path: &Path, new_entity: &Entity, is_alias: bool) {
        if is_alias {
            if let Some(target) = self.aliases.remove(old_path) {
                self.aliases.insert(new_entity.path.clone(), target);
            }
            if self.entries.get(old_path) == Some(&new_entity.node) {
                self.entries.remove(old_path);
                self.entries.insert(new_entity.path.clone(), new_entity.node);
            }
            return;
        }

        self.entries.remove(old_path);
        self.entries.insert(new_entity.path.clone(), new_entity.node);
        for target in self.aliases.values_mut() {
            if target.as_path() == old_path {
                *target = new_entity.path.clone();
            }
        }
    }

    /// Entity registered exactly at `path`.
    pub fn get(&self, path: &Path) -> Option<NodeId> {
        self.entries.get(path).copied()
    }

    /// Real path of the alias at `path`.
    pub fn alias_target(&self, path: &Path) -> Option<&Path> {
        self.aliases.get(path).map(PathBuf::as_path)
    }

    /// Translate a path that may traverse aliases into a real path.
    ///
    /// The deepest aliased ancestor wins; resolution repeats for chained
    /// aliases and stops after as many steps as there are aliases.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        let mut current = path.to_path_buf();
        for _ in 0..=self.aliases.len() {
            let hit = current.ancestors().find_map(|ancestor| {
                self.aliases
                    .get(ancestor)
                    .map(|target| (ancestor.to_path_buf(), target.clone()))
            });
            let Some((alias, target)) = hit else {
                break;
            };
            let rest = current
                .strip_prefix(&alias)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let next = if rest.as_os_str().is_empty() {
                target
            } else {
                target.join(rest)
            };
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Entity at `path`, following aliases when there is no direct entry.
    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        self.get(path)
            .or_else(|| self.get(&self.resolve_path(path)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.aliases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(path: &str, node: u64) -> Entity {
        let mut e = Entity::file(path);
        e.node = NodeId(node);
        e
    }

    #[test]
    fn test_add_and_lookup() {
        let mut index = PathIndex::new();
        index.add(Path::new("/p/a.rs"), &entity("/p/a.rs", 1), false);
        assert_eq!(index.get(Path::new("/p/a.rs")), Some(NodeId(1)));
        assert_eq!(index.get(Path::new("/p/b.rs")), None);
    }

    #[test]
    fn test_alias_lookup_follows_prefix() {
        let mut index = PathIndex::new();
        let mut target = Entity::folder("/q/lib");
        target.node = NodeId(2);
        index.add(Path::new("/p/link"), &target, true);
        index.add(Path::new("/q/lib/x.rs"), &entity("/q/lib/x.rs", 3), false);

        assert_eq!(index.alias_target(Path::new("/p/link")), Some(Path::new("/q/lib")));
        assert_eq!(index.lookup(Path::new("/p/link")), Some(NodeId(2)));
        assert_eq!(index.lookup(Path::new("/p/link/x.rs")), Some(NodeId(3)));
    }

    #[test]
    fn test_remove_drops_aliases_pointing_at_path() {
        let mut index = PathIndex::new();
        let target = entity("/q/t.rs", 5);
        index.add(Path::new("/p/l1"), &target, true);
        index.add(Path::new("/p/l2"), &target, true);
        index.add(Path::new("/p/other"), &entity("/q/u.rs", 6), true);
        assert_eq!(index.alias_count(), 3);

        assert_eq!(index.remove(Path::new("/q/t.rs")), Some(NodeId(5)));
        assert_eq!(index.alias_count(), 1);
        assert!(index.alias_target(Path::new("/p/l1")).is_none());
        assert!(index.alias_target(Path::new("/p/other")).is_some());
    }

    #[test]
    fn test_rename_repoints_aliases() {
        let mut index = PathIndex::new();
        let target = entity("/q/t.rs", 5);
        index.add(Path::new("/p/link"), &target, true);

        let moved = entity("/q/renamed.rs", 5);
        index.rename(Path::new("/q/t.rs"), &moved, false);

        assert_eq!(index.get(Path::new("/q/t.rs")), None);
        assert_eq!(index.get(Path::new("/q/renamed.rs")), Some(NodeId(5)));
        assert_eq!(
            index.alias_target(Path::new("/p/link")),
            Some(Path::new("/q/renamed.rs"))
        );
    }

    #[test]
    fn test_rename_alias_moves_key() {
        let mut index = PathIndex::new();
        index.add(Path::new("/p/link"), &entity("/q/t.rs", 5), true);
        let mut alias = Entity::alias("/p/link2", "/q/t.rs");
        alias.node = NodeId(9);
        index.rename(Path::new("/p/link"), &alias, true);

        assert!(index.alias_target(Path::new("/p/link")).is_none());
        assert_eq!(index.alias_target(Path::new("/p/link2")), Some(Path::new("/q/t.rs")));
    }

    #[test]
    fn test_resolve_path_survives_alias_cycle() {
        let mut index = PathIndex::new();
        index.add(Path::new("/p/a/to_b"), &Entity::folder("/p/b"), true);
        index.add(Path::new("/p/b/to_a"), &Entity::folder("/p/a"), true);

        // /p/a/to_b/to_a/to_b → /p/b/to_a/to_b → /p/a/to_b → /p/b
        let resolved = index.resolve_path(Path::new("/p/a/to_b/to_a/to_b"));
        assert_eq!(resolved, PathBuf::from("/p/b"));
    }
}
