//! In-memory text buffers.
//!
//! Buffers are loaded on first access and released by [`BufferCache::evict`].
//! Open files, files with unsaved edits, and the `keep_recent` most recently
//! viewed files stay resident.
//!
//! On access a clean buffer whose file is newer on disk is reloaded. A dirty
//! buffer in the same situation is flagged [`BufferState::Conflict`] and keeps
//! its in-memory text; the next save overwrites the disk copy.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::entity::NodeId;
use crate::errors::PfgError;
use crate::scanner::modified_secs;

/// Relationship between a buffer and its file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Matches the disk copy.
    Clean,
    /// Has unsaved edits.
    Dirty,
    /// Has unsaved edits and the file also changed on disk.
    Conflict,
}

#[derive(Debug, Clone)]
pub struct TextBuffer {
    pub path: PathBuf,
    content: String,
    loaded_mtime: i64,
    state: BufferState,
}

impl TextBuffer {
    fn load(path: &Path) -> Result<Self, PfgError> {
        let content = fs::read_to_string(path)?;
        let loaded_mtime = fs::metadata(path).map(|m| modified_secs(&m)).unwrap_or(0);
        Ok(Self {
            path: path.to_path_buf(),
            content,
            loaded_mtime,
            state: BufferState::Clean,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn is_unsaved(&self) -> bool {
        self.state != BufferState::Clean
    }

    pub fn loaded_mtime(&self) -> i64 {
        self.loaded_mtime
    }

    fn disk_mtime(&self) -> Option<i64> {
        fs::metadata(&self.path).ok().map(|m| modified_secs(&m))
    }
}

/// Lazily populated buffers keyed by node.
#[derive(Debug)]
pub struct BufferCache {
    buffers: HashMap<NodeId, TextBuffer>,
    open: HashSet<NodeId>,
    /// Most recently viewed first.
    recent: VecDeque<NodeId>,
    keep_recent: usize,
}

impl BufferCache {
    pub fn new(keep_recent: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            open: HashSet::new(),
            recent: VecDeque::new(),
            keep_recent,
        }
    }

    /// Buffer for `node`, loading or refreshing it from `path` as needed.
    pub fn get(&mut self, node: NodeId, path: &Path) -> Result<&TextBuffer, PfgError> {
        let stale = match self.buffers.get(&node) {
            None => true,
            Some(buffer) => buffer.path != path,
        };
        if stale {
            debug!("Loading buffer for {}", path.display());
            self.buffers.insert(node, TextBuffer::load(path)?);
        } else if let Some(buffer) = self.buffers.get_mut(&node) {
            Self::check_disk(buffer)?;
        }
        self.buffers
            .get(&node)
            .ok_or_else(|| PfgError::PathNotFound(path.display().to_string()))
    }

    fn check_disk(buffer: &mut TextBuffer) -> Result<(), PfgError> {
        let Some(mtime) = buffer.disk_mtime() else {
            return Ok(());
        };
        if mtime <= buffer.loaded_mtime {
            return Ok(());
        }
        match buffer.state {
            BufferState::Clean => {
                debug!("Reloading {} changed on disk", buffer.path.display());
                *buffer = TextBuffer::load(&buffer.path.clone())?;
            }
            BufferState::Dirty => {
                warn!(
                    "{} changed on disk while it has unsaved edits",
                    buffer.path.display()
                );
                buffer.state = BufferState::Conflict;
            }
            BufferState::Conflict => {}
        }
        Ok(())
    }

    /// Resident buffer without touching the disk.
    pub fn peek(&self, node: NodeId) -> Option<&TextBuffer> {
        self.buffers.get(&node)
    }

    /// Replace the text of a buffer, marking it unsaved.
    pub fn set_content(
        &mut self,
        node: NodeId,
        path: &Path,
        content: impl Into<String>,
    ) -> Result<(), PfgError> {
        self.get(node, path)?;
        if let Some(buffer) = self.buffers.get_mut(&node) {
            buffer.content = content.into();
            if buffer.state == BufferState::Clean {
                buffer.state = BufferState::Dirty;
            }
        }
        Ok(())
    }

    /// Record that `content` was written to disk with `mtime`.
    pub fn mark_saved(&mut self, node: NodeId, path: &Path, content: String, mtime: i64) {
        self.buffers.insert(
            node,
            TextBuffer {
                path: path.to_path_buf(),
                content,
                loaded_mtime: mtime,
                state: BufferState::Clean,
            },
        );
    }

    pub fn open(&mut self, node: NodeId) {
        self.open.insert(node);
    }

    pub fn close(&mut self, node: NodeId) {
        self.open.remove(&node);
    }

    pub fn is_open(&self, node: NodeId) -> bool {
        self.open.contains(&node)
    }

    /// Move `node` to the front of the recently viewed list.
    pub fn touch(&mut self, node: NodeId) {
        self.recent.retain(|n| *n != node);
        self.recent.push_front(node);
    }

    /// Release buffers that are not open, unsaved, or recently viewed.
    /// Returns the released nodes.
    pub fn evict(&mut self) -> Vec<NodeId> {
        self.recent.truncate(self.keep_recent.max(1) * 4);
        let keep: HashSet<NodeId> = self
            .recent
            .iter()
            .take(self.keep_recent)
            .chain(self.open.iter())
            .copied()
            .collect();

        let mut released: Vec<NodeId> = self
            .buffers
            .iter()
            .filter(|(node, buffer)| !keep.contains(node) && !buffer.is_unsaved())
            .map(|(node, _)| *node)
            .collect();
        released.sort();
        for node in &released {
            self.buffers.remove(node);
        }
        if !released.is_empty() {
            debug!("Released {} buffers", released.len());
        }
        released
    }

    /// Drop everything held for `node`.
    pub fn forget(&mut self, node: NodeId) {
        self.buffers.remove(&node);
        self.open.remove(&node);
        self.recent.retain(|n| *n != node);
    }

    pub fn is_resident(&self, node: NodeId) -> bool {
        self.buffers.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn bump_mtime(path: &Path) {
        let later = SystemTime::now() + Duration::from_secs(10);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(later)
            .unwrap();
    }

    #[test]
    fn test_lazy_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "one\n").unwrap();

        let mut cache = BufferCache::new(2);
        assert!(cache.is_empty());
        assert_eq!(cache.get(NodeId(1), &path).unwrap().content(), "one\n");
        assert!(cache.is_resident(NodeId(1)));
        assert!(cache.get(NodeId(2), &temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_clean_buffer_reloads_after_disk_change() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "one\n").unwrap();

        let mut cache = BufferCache::new(2);
        cache.get(NodeId(1), &path).unwrap();
        fs::write(&path, "two\n").unwrap();
        bump_mtime(&path);

        let buffer = cache.get(NodeId(1), &path).unwrap();
        assert_eq!(buffer.content(), "two\n");
        assert_eq!(buffer.state(), BufferState::Clean);
    }

    #[test]
    fn test_dirty_buffer_reports_conflict_and_keeps_memory_copy() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "one\n").unwrap();

        let mut cache = BufferCache::new(2);
        cache.set_content(NodeId(1), &path, "mine\n").unwrap();
        assert_eq!(cache.peek(NodeId(1)).unwrap().state(), BufferState::Dirty);

        fs::write(&path, "theirs\n").unwrap();
        bump_mtime(&path);

        let buffer = cache.get(NodeId(1), &path).unwrap();
        assert_eq!(buffer.state(), BufferState::Conflict);
        assert_eq!(buffer.content(), "mine\n");

        cache.mark_saved(NodeId(1), &path, "mine\n".to_string(), i64::MAX);
        assert_eq!(cache.peek(NodeId(1)).unwrap().state(), BufferState::Clean);
    }

    #[test]
    fn test_evict_keeps_open_recent_and_unsaved() {
        let temp = TempDir::new().unwrap();
        let mut cache = BufferCache::new(1);
        for i in 1..=4u64 {
            let path = temp.path().join(format!("{}.txt", i));
            fs::write(&path, "x").unwrap();
            cache.get(NodeId(i), &path).unwrap();
        }
        cache.open(NodeId(1));
        cache.touch(NodeId(2));
        cache.touch(NodeId(3));
        cache
            .set_content(NodeId(4), &temp.path().join("4.txt"), "edited")
            .unwrap();

        // 3 is the most recent; 2 falls outside keep_recent.
        assert_eq!(cache.evict(), vec![NodeId(2)]);
        assert!(cache.is_resident(NodeId(1)));
        assert!(cache.is_resident(NodeId(3)));
        assert!(cache.is_resident(NodeId(4)));

        cache.close(NodeId(1));
        cache.touch(NodeId(4));
        assert_eq!(cache.evict(), vec![NodeId(1), NodeId(3)]);
    }

    #[test]
    fn test_forget() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        let mut cache = BufferCache::new(3);
        cache.get(NodeId(7), &path).unwrap();
        cache.open(NodeId(7));
        cache.forget(NodeId(7));
        assert!(!cache.is_resident(NodeId(7)));
        assert!(!cache.is_open(NodeId(7)));
    }
}
