//! Directory enumeration.
//!
//! Pure filesystem I/O with no access to the graph, so it can run on the
//! rayon pool while the scanner thread stays the only writer of the tree.
//! Results come back over a channel.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::UNIX_EPOCH;

use crate::constants::is_binary_extension;

/// Bytes inspected when guessing whether an extensionless file is text.
const SNIFF_LEN: usize = 1024;

/// Classification of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File { is_text: bool },
    Folder,
    /// Symlink resolved to a canonical `target` inside the allowed root.
    Alias {
        target: PathBuf,
        target_is_dir: bool,
        target_modified: i64,
        target_is_text: bool,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ScannedEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Unix seconds of the entry itself (the link for aliases).
    pub modified: i64,
}

impl ScannedEntry {
    pub fn is_dir(&self) -> bool {
        match &self.kind {
            EntryKind::Folder => true,
            EntryKind::Alias { target_is_dir, .. } => *target_is_dir,
            EntryKind::File { .. } => false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Listing {
    /// Entries sorted by name.
    pub entries: Vec<ScannedEntry>,
    /// The folder contains the generated-subtree marker.
    pub has_generated_marker: bool,
    /// Symlinks skipped (dangling or outside the allowed root).
    pub rejected: Vec<PathBuf>,
}

pub(crate) fn modified_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Guess whether `path` holds text.
pub(crate) fn looks_like_text(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => !is_binary_extension(ext),
        None => sniff_text(path).unwrap_or(false),
    }
}

fn sniff_text(path: &Path) -> io::Result<bool> {
    let mut buf = [0u8; SNIFF_LEN];
    let mut file = File::open(path)?;
    let n = file.read(&mut buf)?;
    Ok(!buf[..n].contains(&0))
}

/// List `dir`, classifying entries and resolving symlinks.
///
/// # Errors
///
/// Returns the I/O error of reading the directory itself. Per-entry
/// failures skip the entry.
pub(crate) fn enumerate_dir(
    dir: &Path,
    allowed_root: Option<&Path>,
    generated_marker: &str,
) -> io::Result<Listing> {
    let mut listing = Listing::default();

    for dirent in fs::read_dir(dir)? {
        let dirent = match dirent {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let Ok(name) = dirent.file_name().into_string() else {
            tracing::warn!("Skipping non UTF-8 name in {}", dir.display());
            continue;
        };
        if name == generated_marker {
            listing.has_generated_marker = true;
        }

        let path = dir.join(&name);
        let meta = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let modified = modified_secs(&meta);
        let file_type = meta.file_type();

        let kind = if file_type.is_symlink() {
            match resolve_symlink(&path, allowed_root) {
                Some(kind) => kind,
                None => {
                    listing.rejected.push(path);
                    continue;
                }
            }
        } else if file_type.is_dir() {
            EntryKind::Folder
        } else {
            EntryKind::File {
                is_text: looks_like_text(&path),
            }
        };

        listing.entries.push(ScannedEntry {
            name,
            path,
            kind,
            modified,
        });
    }

    listing.entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}

fn resolve_symlink(path: &Path, allowed_root: Option<&Path>) -> Option<EntryKind> {
    let target = match fs::canonicalize(path) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Skipping dangling symlink {}: {}", path.display(), e);
            return None;
        }
    };
    if let Some(root) = allowed_root {
        if !target.starts_with(root) {
            tracing::warn!(
                "Rejecting symlink {}: target `{}` is outside the allowed root `{}`",
                path.display(),
                target.display(),
                root.display()
            );
            return None;
        }
    }
    let meta = match fs::metadata(&target) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("Skipping symlink {}: {}", path.display(), e);
            return None;
        }
    };
    let target_is_dir = meta.is_dir();
    Some(EntryKind::Alias {
        target_is_text: !target_is_dir && looks_like_text(&target),
        target_modified: modified_secs(&meta),
        target_is_dir,
        target,
    })
}

/// Run [`enumerate_dir`] on the rayon pool and wait for the result.
pub(crate) fn enumerate_offloaded(
    dir: &Path,
    allowed_root: Option<&Path>,
    generated_marker: &str,
) -> io::Result<Listing> {
    let (tx, rx) = mpsc::channel();
    let dir_owned = dir.to_path_buf();
    let root_owned = allowed_root.map(Path::to_path_buf);
    let marker_owned = generated_marker.to_string();

    rayon::spawn(move || {
        let result = enumerate_dir(&dir_owned, root_owned.as_deref(), &marker_owned);
        // The receiver only disappears if the scanner itself panicked.
        let _ = tx.send(result);
    });

    rx.recv().map_err(|_| {
        io::Error::other(format!(
            "enumeration worker for {} stopped",
            dir.display()
        ))
    })?
}
