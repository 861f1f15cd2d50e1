//! Common constants used throughout pfg-core.
//!
//! This module centralizes paths, file names, and tuning defaults to avoid
//! duplication and ensure consistency across the codebase.

// ============================================================================
// Directory / File Names
// ============================================================================

/// The name of the global pfg configuration directory.
///
/// Located at `~/.pfg/` on Unix-like systems.
pub const PFG_HOME_DIR: &str = ".pfg";

/// The name of the global configuration file.
pub const GLOBAL_CONFIG_FILENAME: &str = "config.yaml";

/// Default database file name inside [`PFG_HOME_DIR`].
pub const DATABASE_FILENAME: &str = "files.db";

/// Default history (backup) directory name inside [`PFG_HOME_DIR`].
pub const HISTORY_DIRNAME: &str = "history";

/// Sentinel file marking a folder (and its subtree) as generated output.
///
/// Generated folders are flagged ignored and skip repository discovery.
pub const GENERATED_MARKER: &str = ".generated";

/// Names that are ignored regardless of any ignore-rule provider.
pub const ALWAYS_IGNORED_NAMES: &[&str] = &[".git"];

/// Check if an entry name is always ignored.
#[inline]
pub fn is_always_ignored(name: &str) -> bool {
    ALWAYS_IGNORED_NAMES.contains(&name)
}

// ============================================================================
// Text Detection
// ============================================================================

/// File extensions that indicate binary (non-text) content.
///
/// Binary files are kept in the tree but never enter a project's flat
/// file projection.
pub const BINARY_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "tif",
    // Audio/Video
    "mp3", "mp4", "wav", "avi", "mov", "mkv", "flac", "ogg", "webm", // Archives
    "zip", "tar", "gz", "rar", "7z", "bz2", "xz", // Binaries/Executables
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "obj", // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", // Fonts
    "ttf", "otf", "woff", "woff2", "eot", // Database
    "db", "sqlite", "sqlite3", // Other binary/generated formats
    "pyc", "pyo", "class", "jar", "war",
];

/// Check if a file extension indicates binary content.
#[inline]
pub fn is_binary_extension(ext: &str) -> bool {
    BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

// ============================================================================
// History / Buffers
// ============================================================================

/// Days history rows and backups are kept before the reaper may purge them.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Minimum hours between two reaper runs.
pub const DEFAULT_REAP_INTERVAL_HOURS: u32 = 24;

/// Wall-clock budget for one reaper run.
pub const DEFAULT_REAP_TIME_BUDGET_MS: u64 = 2_000;

/// Number of most-recently-viewed buffers kept resident.
pub const DEFAULT_KEEP_RECENT_BUFFERS: usize = 10;

/// Metadata key storing the last reaper run (unix seconds).
pub const META_LAST_REAP: &str = "history.last_reap";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_always_ignored() {
        assert!(is_always_ignored(".git"));
        assert!(!is_always_ignored("src"));
        assert!(!is_always_ignored(".github"));
    }

    #[test]
    fn test_is_binary_extension() {
        assert!(is_binary_extension("png"));
        assert!(is_binary_extension("PNG"));
        assert!(is_binary_extension("sqlite"));
        assert!(!is_binary_extension("rs"));
        assert!(!is_binary_extension("vala"));
        assert!(!is_binary_extension("md"));
    }
}
