//! Configuration types for pfg.
//!
//! This module provides the configuration structures used by the engine:
//! - [`GlobalConfig`]: User-level configuration stored in `~/.pfg/config.yaml`
//! - [`ScanConfig`]: Directory scanner options (offload, symlink boundary)
//! - [`HistoryConfig`]: Retention window and reaper pacing
//! - [`BufferConfig`]: In-memory text buffer eviction policy

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DATABASE_FILENAME, DEFAULT_KEEP_RECENT_BUFFERS, DEFAULT_REAP_INTERVAL_HOURS,
    DEFAULT_REAP_TIME_BUDGET_MS, DEFAULT_RETENTION_DAYS, GENERATED_MARKER,
    GLOBAL_CONFIG_FILENAME, HISTORY_DIRNAME, PFG_HOME_DIR,
};
use crate::errors::PfgError;

// ============================================================================
// GlobalConfig
// ============================================================================

/// Global (user-level) configuration for pfg.
///
/// This is typically loaded from `~/.pfg/config.yaml`. Every section is
/// optional; missing values fall back to built-in defaults.
///
/// # Example YAML
///
/// ```yaml
/// database_path: ~/.pfg/files.db
/// history_dir: ~/.pfg/history
/// scan:
///   offload_enumeration: true
///   allowed_root: /home/me
/// history:
///   retention_days: 30
///   reap_interval_hours: 24
/// buffers:
///   keep_recent: 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// SQLite database file. Default: `~/.pfg/files.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Directory receiving pre-change backups. Default: `~/.pfg/history`.
    #[serde(default)]
    pub history_dir: Option<PathBuf>,

    /// Directory scanner options.
    #[serde(default)]
    pub scan: ScanConfig,

    /// History retention options.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Text buffer options.
    #[serde(default)]
    pub buffers: BufferConfig,
}

impl GlobalConfig {
    /// Load the global configuration from the default location (`~/.pfg/config.yaml`).
    ///
    /// If the file does not exist, returns a default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PfgError::InvalidGlobalConfig`] if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self, PfgError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the global configuration from a specific path.
    ///
    /// If the file does not exist, returns a default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PfgError::InvalidGlobalConfig`] if the file exists but cannot be parsed.
    /// Returns [`PfgError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, PfgError> {
        if !path.exists() {
            tracing::debug!(
                "Global config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PfgError::InvalidGlobalConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            PfgError::InvalidGlobalConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Get the default global config directory (`~/.pfg`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(PFG_HOME_DIR))
    }

    /// Get the default global config file path (`~/.pfg/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(GLOBAL_CONFIG_FILENAME))
    }

    /// A configuration whose database, history and symlink boundary all live
    /// under `dir`. Used by tests and sandboxed runs.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            database_path: Some(dir.join(DATABASE_FILENAME)),
            history_dir: Some(dir.join(HISTORY_DIRNAME)),
            scan: ScanConfig {
                allowed_root: Some(dir.to_path_buf()),
                ..ScanConfig::default()
            },
            ..Self::default()
        }
    }

    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(p) => expand_home(p),
            None => Self::default_dir()
                .unwrap_or_else(|| PathBuf::from(PFG_HOME_DIR))
                .join(DATABASE_FILENAME),
        }
    }

    /// Resolved history directory.
    pub fn history_dir(&self) -> PathBuf {
        match &self.history_dir {
            Some(p) => expand_home(p),
            None => Self::default_dir()
                .unwrap_or_else(|| PathBuf::from(PFG_HOME_DIR))
                .join(HISTORY_DIRNAME),
        }
    }

    /// Validate the configuration.
    ///
    /// Returns a list of warnings for questionable values, or an error for
    /// values the engine cannot work with.
    pub fn validate(&self) -> Result<Vec<String>, PfgError> {
        let mut warnings = self.history.validate()?;
        if self.buffers.keep_recent == 0 {
            warnings.push(
                "buffers.keep_recent is 0; only open files keep their text in memory".to_string(),
            );
        }
        if let Some(root) = &self.scan.allowed_root {
            if !expand_home(root).is_absolute() {
                return Err(PfgError::InvalidConfiguration {
                    message: format!("scan.allowed_root `{}` is not absolute", root.display()),
                    hint: "Use an absolute path such as /home/you".to_string(),
                });
            }
        }
        Ok(warnings)
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ============================================================================
// ScanConfig
// ============================================================================

/// Directory scanner options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Enumerate directories on the worker pool instead of the caller's thread.
    #[serde(default = "default_offload_enumeration")]
    pub offload_enumeration: bool,

    /// Symlinks resolving outside this root are rejected. Default: home directory.
    #[serde(default)]
    pub allowed_root: Option<PathBuf>,

    /// Sentinel file name marking a generated subtree.
    #[serde(default = "default_generated_marker")]
    pub generated_marker: String,
}

fn default_offload_enumeration() -> bool {
    true
}

fn default_generated_marker() -> String {
    GENERATED_MARKER.to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            offload_enumeration: default_offload_enumeration(),
            allowed_root: None,
            generated_marker: default_generated_marker(),
        }
    }
}

impl ScanConfig {
    /// The effective symlink security boundary.
    pub fn effective_allowed_root(&self) -> Option<PathBuf> {
        match &self.allowed_root {
            Some(root) => Some(expand_home(root)),
            None => dirs::home_dir(),
        }
    }
}

// ============================================================================
// HistoryConfig
// ============================================================================

/// Retention window and reaper pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// History rows and backups older than this many days may be purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Minimum hours between reaper runs.
    #[serde(default = "default_reap_interval_hours")]
    pub reap_interval_hours: u32,

    /// Time budget for one reaper run, in milliseconds.
    #[serde(default = "default_reap_time_budget_ms")]
    pub reap_time_budget_ms: u64,
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}
fn default_reap_interval_hours() -> u32 {
    DEFAULT_REAP_INTERVAL_HOURS
}
fn default_reap_time_budget_ms() -> u64 {
    DEFAULT_REAP_TIME_BUDGET_MS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            reap_interval_hours: default_reap_interval_hours(),
            reap_time_budget_ms: default_reap_time_budget_ms(),
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<Vec<String>, PfgError> {
        let mut warnings = Vec::new();

        if self.retention_days == 0 {
            return Err(PfgError::InvalidConfiguration {
                message: "history.retention_days must be greater than 0".to_string(),
                hint: format!("Set it to a positive value (default: {})", DEFAULT_RETENTION_DAYS),
            });
        }
        if self.reap_interval_hours == 0 {
            return Err(PfgError::InvalidConfiguration {
                message: "history.reap_interval_hours must be greater than 0".to_string(),
                hint: format!(
                    "Set it to a positive value (default: {})",
                    DEFAULT_REAP_INTERVAL_HOURS
                ),
            });
        }
        if self.reap_time_budget_ms < 100 {
            warnings.push(format!(
                "history.reap_time_budget_ms={} is very small; purges may take many runs",
                self.reap_time_budget_ms
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// BufferConfig
// ============================================================================

/// In-memory text buffer policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Number of most-recently-viewed files whose buffers stay resident.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_keep_recent() -> usize {
    DEFAULT_KEEP_RECENT_BUFFERS
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            keep_recent: default_keep_recent(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
