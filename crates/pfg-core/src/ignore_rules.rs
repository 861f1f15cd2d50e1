//! Ignore-rule providers.
//!
//! The scanner asks an [`IgnoreRules`] implementation three questions: is
//! there a repository at this folder, which work tree owns this folder, and
//! is this path ignored. Two providers ship with the crate:
//!
//! - [`NoIgnore`]: nothing is ignored, no repositories exist
//! - [`GitIgnoreRules`]: `.gitignore` files and `.git/info/exclude`,
//!   evaluated with the `ignore` crate

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;

/// Capability consumed by the directory scanner.
pub trait IgnoreRules: Send + Sync {
    /// Whether `folder` is the root of a repository work tree.
    fn repository_exists(&self, folder: &Path) -> bool;

    /// Whether `relative` (relative to `workdir`) is ignored.
    fn path_is_ignored(&self, workdir: &Path, relative: &Path, is_dir: bool) -> bool;

    /// Root of the work tree containing `folder`, if any.
    fn workdir_path(&self, folder: &Path) -> Option<PathBuf>;

    /// Drop cached rules below `workdir` so edits to ignore files are seen.
    fn refresh(&self, _workdir: &Path) {}
}

// ============================================================================
// NoIgnore
// ============================================================================

/// Provider under which nothing is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIgnore;

impl IgnoreRules for NoIgnore {
    fn repository_exists(&self, _folder: &Path) -> bool {
        false
    }

    fn path_is_ignored(&self, _workdir: &Path, _relative: &Path, _is_dir: bool) -> bool {
        false
    }

    fn workdir_path(&self, _folder: &Path) -> Option<PathBuf> {
        None
    }
}

// ============================================================================
// GitIgnoreRules
// ============================================================================

const GIT_DIR: &str = ".git";
const GITIGNORE_FILE: &str = ".gitignore";

/// Git-style ignore rules.
///
/// Each directory's `.gitignore` is compiled once and cached. A path is
/// checked against the matchers of its ancestors from the deepest directory
/// up to the work tree root; the first definitive answer (ignore or
/// whitelist) wins. `.git/info/exclude` is consulted last.
#[derive(Debug, Default)]
pub struct GitIgnoreRules {
    matchers: Mutex<HashMap<PathBuf, Arc<Gitignore>>>,
}

impl GitIgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    fn matcher_for(&self, dir: &Path) -> Arc<Gitignore> {
        if let Ok(cache) = self.matchers.lock() {
            if let Some(found) = cache.get(dir) {
                return Arc::clone(found);
            }
        }

        let matcher = Arc::new(build_matcher(dir, &dir.join(GITIGNORE_FILE)));
        if let Ok(mut cache) = self.matchers.lock() {
            cache.insert(dir.to_path_buf(), Arc::clone(&matcher));
        }
        matcher
    }

    fn exclude_matcher(&self, workdir: &Path) -> Arc<Gitignore> {
        let key = workdir.join(GIT_DIR).join("info");
        if let Ok(cache) = self.matchers.lock() {
            if let Some(found) = cache.get(&key) {
                return Arc::clone(found);
            }
        }

        let matcher = Arc::new(build_matcher(workdir, &key.join("exclude")));
        if let Ok(mut cache) = self.matchers.lock() {
            cache.insert(key, Arc::clone(&matcher));
        }
        matcher
    }
}

fn build_matcher(root: &Path, file: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    if file.is_file() {
        if let Some(err) = builder.add(file) {
            tracing::warn!("Ignoring malformed rules in {}: {}", file.display(), err);
        }
    }
    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to compile {}: {}", file.display(), err);
        Gitignore::empty()
    })
}

impl IgnoreRules for GitIgnoreRules {
    fn repository_exists(&self, folder: &Path) -> bool {
        folder.join(GIT_DIR).exists()
    }

    fn path_is_ignored(&self, workdir: &Path, relative: &Path, is_dir: bool) -> bool {
        if relative
            .components()
            .any(|c| c.as_os_str() == GIT_DIR)
        {
            return true;
        }

        let absolute = workdir.join(relative);
        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut current = absolute.parent();
        while let Some(dir) = current {
            if !dir.starts_with(workdir) {
                break;
            }
            dirs.push(dir.to_path_buf());
            current = dir.parent();
        }

        for dir in &dirs {
            match self
                .matcher_for(dir)
                .matched_path_or_any_parents(&absolute, is_dir)
            {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }

        self.exclude_matcher(workdir)
            .matched_path_or_any_parents(&absolute, is_dir)
            .is_ignore()
    }

    fn workdir_path(&self, folder: &Path) -> Option<PathBuf> {
        folder
            .ancestors()
            .find(|dir| dir.join(GIT_DIR).exists())
            .map(Path::to_path_buf)
    }

    fn refresh(&self, workdir: &Path) {
        if let Ok(mut cache) = self.matchers.lock() {
            let before = cache.len();
            cache.retain(|dir, _| !dir.starts_with(workdir));
            tracing::debug!(
                "Dropped {} cached ignore matchers under {}",
                before - cache.len(),
                workdir.display()
            );
        }
    }
}
