//! CLI definition and command dispatch for pfg.
//!
//! This module defines the command-line interface using `clap` and provides
//! the `run()` function that dispatches commands to the [`ProjectManager`].
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--verbose`, `--color`)
//! 2. Environment variables (`PFG_CONFIG`, `PFG_VERBOSE`, `PFG_COLOR`)
//! 3. Config file (`~/.pfg/config.yaml` or the path from `--config`)
//! 4. Built-in defaults
//!
//! Each invocation opens the store, loads the project that contains the
//! target path and reconciles it with the disk before acting on it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::ui::table::{self, FileListRow};
use crate::ui::{format, ColorMode, MessageType, Style};

use pfg_core::{
    ActivationReport, ChangeKind, FileChange, FileStore, GlobalConfig, NodeId, PfgError,
    ProjectManager, ReviewStatus,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Project file graph: tracked project trees, edits and change history
#[derive(Parser, Debug)]
#[command(name = "pfg")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "PFG_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.pfg/config.yaml)
    #[arg(long, global = true, env = "PFG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode
    #[arg(long, global = true, env = "PFG_COLOR", value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register or list projects
    #[command(after_help = r#"EXAMPLES:
    # Register the current directory as a project
    pfg project add .

    # List registered projects
    pfg project list
"#)]
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Load a project and reconcile it with the disk
    #[command(after_help = r#"EXAMPLES:
    # Scan the project containing the current directory
    pfg scan

    # Scan a specific project and print the report as JSON
    pfg scan ~/src/app --json
"#)]
    Scan {
        /// A path inside the project (default: current directory)
        path: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the tree of a project or folder
    #[command(after_help = r#"EXAMPLES:
    # Whole project
    pfg tree

    # One folder, two levels deep
    pfg tree src --depth 2
"#)]
    Tree {
        /// Folder to print (default: current directory)
        path: Option<PathBuf>,

        /// Maximum depth below the folder
        #[arg(long)]
        depth: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List the text files of a project
    #[command(after_help = r#"EXAMPLES:
    # All text files of the current project
    pfg files

    # Only files awaiting review
    pfg files --review
"#)]
    Files {
        /// A path inside the project (default: current directory)
        #[arg(long)]
        project: Option<PathBuf>,

        /// Only files awaiting review
        #[arg(long)]
        review: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Apply a batch of line or syntax-tree edits to a file
    #[command(after_help = r#"EXAMPLES:
    # changes.json holds an array of changes, lines are 1-based and `end` is exclusive:
    #   [{"start": 2, "end": 3, "replacement": "X\n"},
    #    {"start": 4, "end": 4, "replacement": "inserted\n"},
    #    {"astPath": "Server-run", "operationType": "before", "replacement": "// hot path\n"}]
    pfg apply src/lib.rs --changes changes.json
"#)]
    Apply {
        /// File to edit
        file: PathBuf,

        /// JSON file holding the changes
        #[arg(long)]
        changes: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Move or rename a file or folder
    Mv {
        from: PathBuf,
        to: PathBuf,
    },

    /// Delete a file or folder, keeping a backup in the history
    #[command(after_help = r#"EXAMPLES:
    pfg rm src/old.rs
    pfg rm build/
"#)]
    Rm {
        path: PathBuf,
    },

    /// Flag a file as awaiting review, or clear the flag
    Flag {
        path: PathBuf,

        /// Clear the flag instead of setting it
        #[arg(long)]
        clear: bool,
    },

    /// Record a review decision on a history entry
    #[command(after_help = r#"EXAMPLES:
    # Approving clears the file's review flag
    pfg review 12 approved
"#)]
    Review {
        /// History entry id (see `pfg history`)
        id: i64,

        /// pending, approved or rejected
        #[arg(value_parser = parse_review_status)]
        status: ReviewStatus,
    },

    /// Show recent history entries
    #[command(after_help = r#"EXAMPLES:
    pfg history
    pfg history --limit 5 --json
"#)]
    History {
        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Purge history and backups past the retention period
    Reap {
        /// Ignore the rate limit
        #[arg(long)]
        force: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// Register a folder as a project
    Add {
        path: PathBuf,
    },
    /// List registered projects
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn parse_review_status(value: &str) -> Result<ReviewStatus, String> {
    value.parse::<ReviewStatus>().map_err(|e| e.to_string())
}

// ============================================================================
// Entry point
// ============================================================================

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always; debug only with --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!("pfg_core={},pfg_db={},pfg_cli={}", log_level, log_level, log_level);
    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let style = Style::new(cli.color);

    let config = match &cli.config {
        Some(path) => GlobalConfig::from_path(path),
        None => GlobalConfig::load_default(),
    };
    let manager = config.and_then(ProjectManager::open_default);
    let mut manager = match manager {
        Ok(manager) => manager,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your global config at ~/.pfg/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context("Failed to open the file graph", Some(&e.to_string()), Some(&hint))
            );
            return ExitCode::FAILURE;
        }
    };

    if cli.verbose {
        manager.subscribe(|event| debug!("event: {:?}", event));
    }

    let result = match cli.command {
        Command::Project { action } => match action {
            ProjectAction::Add { path } => handle_project_add(&style, &mut manager, &path),
            ProjectAction::List { json } => handle_project_list(&style, &manager, json),
        },
        Command::Scan { path, json } => handle_scan(&style, &mut manager, path, json),
        Command::Tree { path, depth, json } => handle_tree(&style, &mut manager, path, depth, json),
        Command::Files {
            project,
            review,
            json,
        } => handle_files(&style, &mut manager, project, review, json),
        Command::Apply {
            file,
            changes,
            json,
        } => handle_apply(&style, &mut manager, &file, &changes, json),
        Command::Mv { from, to } => handle_mv(&style, &mut manager, &from, &to),
        Command::Rm { path } => handle_rm(&style, &mut manager, &path),
        Command::Flag { path, clear } => handle_flag(&style, &mut manager, &path, !clear),
        Command::Review { id, status } => handle_review(&style, &mut manager, id, status),
        Command::History { limit, json } => handle_history(&style, &manager, limit, json),
        Command::Reap { force, json } => handle_reap(&style, &mut manager, force, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style.error_with_context(&e.to_string(), None, hint_for(&e)));
            ExitCode::FAILURE
        }
    }
}

fn hint_for(error: &PfgError) -> Option<&'static str> {
    match error {
        PfgError::ProjectNotFound(_) => Some("Register the folder with `pfg project add <path>`"),
        PfgError::NoActiveProject => Some("Run inside a registered project or pass a path"),
        PfgError::EditOutOfRange { .. } => {
            Some("Lines are 1-based, `end` is exclusive and may be one past the last line")
        }
        PfgError::Json(_) => Some("The changes file must hold a JSON array of changes"),
        PfgError::OutsideAllowedRoot { .. } => Some("Adjust scan.allowed_root in the config"),
        _ => None,
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn target_or_cwd(path: Option<PathBuf>) -> Result<PathBuf, PfgError> {
    let path = match path {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    Ok(fs::canonicalize(&path).unwrap_or(path))
}

/// Load and reconcile the project containing `path`.
fn activate_containing(manager: &mut ProjectManager, path: &Path) -> Result<ActivationReport, PfgError> {
    let project = manager
        .project_for(path)
        .ok_or_else(|| PfgError::ProjectNotFound(path.display().to_string()))?;
    debug!("Activating {} for {}", project.display(), path.display());
    manager.activate_project(&project)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), PfgError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command handlers
// ============================================================================

fn handle_project_add(style: &Style, manager: &mut ProjectManager, path: &Path) -> Result<(), PfgError> {
    manager.create_project(path)?;
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("Registered project {}", style.file_path(&canonical.display().to_string()))
        )
    );
    println!("{}", style.message(MessageType::Hint, "Run `pfg scan` inside it to load its files"));
    Ok(())
}

fn handle_project_list(style: &Style, manager: &ProjectManager, json: bool) -> Result<(), PfgError> {
    let projects = manager.list_projects();
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("{}", style.message(MessageType::Info, "No projects registered."));
        return Ok(());
    }
    println!("{}", style.section("PROJECTS"));
    println!();
    println!("{}", table::render_projects_table(&projects));
    Ok(())
}

fn handle_scan(
    style: &Style,
    manager: &mut ProjectManager,
    path: Option<PathBuf>,
    json: bool,
) -> Result<(), PfgError> {
    let target = target_or_cwd(path)?;
    let report = activate_containing(manager, &target)?;
    let files = manager.project_files()?.len();

    if json {
        return print_json(&json!({
            "path": report.path,
            "files": files,
            "load": report.load,
            "scan": report.scan,
        }));
    }

    let scan = &report.scan;
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("Scanned {}", style.file_path(&report.path.display().to_string()))
        )
    );
    let loaded = if report.load.cache_hit {
        "unchanged since last load".to_string()
    } else {
        format::plural(report.load.loaded, "entity", "entities")
    };
    println!("{}", style.message_detail("Loaded", &loaded));
    println!("{}", style.message_detail("Folders", &format::format_thousands(scan.folders_scanned as u64)));
    println!(
        "{}",
        style.message_detail(
            "Changes",
            &format!("{} inserted, {} updated, {} removed", scan.inserted, scan.updated, scan.removed)
        )
    );
    println!("{}", style.message_detail("Files", &format::plural(files, "text file", "text files")));

    if !scan.failed.is_empty() {
        let count = format::plural(scan.failed.len(), "folder", "folders");
        println!("{}", style.message(MessageType::Warn, &format!("{} could not be read", count)));
        for (folder, reason) in &scan.failed {
            println!("{}", style.list_item("-", &format!("{}: {}", folder.display(), reason)));
        }
    }
    if !scan.rejected_links.is_empty() {
        let count = format::plural(scan.rejected_links.len(), "symlink", "symlinks");
        println!("{}", style.message(MessageType::Skip, &format!("{} not followed", count)));
        for link in &scan.rejected_links {
            println!("{}", style.list_item("-", &link.display().to_string()));
        }
    }
    if scan.cancelled {
        println!("{}", style.message(MessageType::Warn, "Scan was superseded before finishing"));
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeNode {
    name: String,
    path: PathBuf,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

fn tree_node(manager: &ProjectManager, node: NodeId, depth: Option<usize>) -> Option<TreeNode> {
    let entity = manager.graph().get(node)?;
    if entity.is_deleted() {
        return None;
    }
    let children = match depth {
        Some(0) => Vec::new(),
        _ => entity
            .children()
            .iter()
            .filter_map(|child| tree_node(manager, *child, depth.map(|d| d - 1)))
            .collect(),
    };
    Some(TreeNode {
        name: entity.name().to_string(),
        path: entity.path.clone(),
        kind: entity.base_type().as_str(),
        target: entity.alias_meta().map(|m| m.target_path.clone()),
        children,
    })
}

fn print_tree(style: &Style, manager: &ProjectManager, node: &TreeNode, indent: usize) {
    let label = match (node.kind, &node.target) {
        ("folder", _) => style.folder(&node.name),
        (_, Some(target)) => style.alias(&node.name, &target.display().to_string()),
        _ => node.name.clone(),
    };
    let flagged = manager
        .lookup(&node.path)
        .is_some_and(|e| e.needs_approval);
    let marker = if flagged { "  (review)" } else { "" };
    println!("{}{}{}", "  ".repeat(indent), label, marker);
    for child in &node.children {
        print_tree(style, manager, child, indent + 1);
    }
}

fn handle_tree(
    style: &Style,
    manager: &mut ProjectManager,
    path: Option<PathBuf>,
    depth: Option<usize>,
    json: bool,
) -> Result<(), PfgError> {
    let target = target_or_cwd(path)?;
    activate_containing(manager, &target)?;
    let node = match manager.lookup(&target) {
        Some(entity) if entity.is_folder() => entity.node,
        Some(_) => return Err(PfgError::InvalidPath(format!("{} is not a folder", target.display()))),
        None => return Err(PfgError::PathNotFound(target.display().to_string())),
    };
    let tree = tree_node(manager, node, depth)
        .ok_or_else(|| PfgError::PathNotFound(target.display().to_string()))?;

    if json {
        return print_json(&tree);
    }
    println!("{}", style.file_path(&tree.path.display().to_string()));
    for child in &tree.children {
        print_tree(style, manager, child, 1);
    }
    Ok(())
}

fn handle_files(
    style: &Style,
    manager: &mut ProjectManager,
    project: Option<PathBuf>,
    review: bool,
    json: bool,
) -> Result<(), PfgError> {
    let target = target_or_cwd(project)?;
    activate_containing(manager, &target)?;
    let entities = if review {
        manager.review_files()?
    } else {
        manager.project_files()?
    };
    let rows: Vec<FileListRow> = entities
        .iter()
        .map(|e| FileListRow {
            path: e.path.display().to_string(),
            last_modified: e.last_modified,
            needs_approval: e.needs_approval,
        })
        .collect();

    if json {
        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        return print_json(&paths);
    }
    if rows.is_empty() {
        let what = if review { "No files awaiting review." } else { "No text files." };
        println!("{}", style.message(MessageType::Info, what));
        return Ok(());
    }
    println!("{}", table::render_files_table(&rows));
    println!();
    println!("{}", style.message(MessageType::Info, &format::plural(rows.len(), "file", "files")));
    Ok(())
}

fn handle_apply(
    style: &Style,
    manager: &mut ProjectManager,
    file: &Path,
    changes_path: &Path,
    json: bool,
) -> Result<(), PfgError> {
    let mut changes: Vec<FileChange> = serde_json::from_str(&fs::read_to_string(changes_path)?)?;
    let file = fs::canonicalize(file).map_err(|_| PfgError::PathNotFound(file.display().to_string()))?;
    if manager.project_for(&file).is_some() {
        activate_containing(manager, &file)?;
    }

    let outcome = manager.apply_edits(&file, &mut changes)?;

    if json {
        return print_json(&json!({
            "path": file,
            "applied": outcome.applied,
            "failed": outcome.failed,
            "changes": changes,
        }));
    }

    if outcome.changed() {
        println!(
            "{}",
            style.message(
                MessageType::Ok,
                &format!(
                    "Applied {} to {}",
                    format::plural(outcome.applied, "change", "changes"),
                    style.file_path(&file.display().to_string())
                )
            )
        );
    } else {
        println!("{}", style.message(MessageType::Skip, "Nothing changed"));
    }
    for (i, change) in changes.iter().enumerate().filter(|(_, c)| c.has_error) {
        let reason = change.result.as_deref().unwrap_or("failed");
        println!(
            "{}",
            style.message(MessageType::Warn, &format!("change {}: {}", i + 1, reason))
        );
    }
    Ok(())
}

fn handle_mv(style: &Style, manager: &mut ProjectManager, from: &Path, to: &Path) -> Result<(), PfgError> {
    let from = fs::canonicalize(from).map_err(|_| PfgError::PathNotFound(from.display().to_string()))?;
    activate_containing(manager, &from)?;
    let to = match (to.parent(), to.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            fs::canonicalize(parent).map(|p| p.join(name)).unwrap_or_else(|_| to.to_path_buf())
        }
        _ => std::env::current_dir()?.join(to),
    };
    manager.move_entity(&from, &to)?;
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("Moved {} -> {}", from.display(), style.file_path(&to.display().to_string()))
        )
    );
    Ok(())
}

fn handle_rm(style: &Style, manager: &mut ProjectManager, path: &Path) -> Result<(), PfgError> {
    let path = fs::canonicalize(path).map_err(|_| PfgError::PathNotFound(path.display().to_string()))?;
    activate_containing(manager, &path)?;

    let report = manager.delete(&path)?;
    let evicted = manager.cleanup();
    debug!("Evicted {} entities", evicted);

    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!(
                "Removed {} ({})",
                style.file_path(&path.display().to_string()),
                format::plural(report.removed, "entity", "entities")
            )
        )
    );
    if let Some(id) = report.history_ids.last() {
        println!("{}", style.message_detail("History", &format!("#{} {}", id, style.change_kind(ChangeKind::Deleted))));
    }
    if report.fs_failures > 0 {
        println!(
            "{}",
            style.message(
                MessageType::Warn,
                &format!("{} could not be removed from disk", format::plural(report.fs_failures, "path", "paths"))
            )
        );
    }
    Ok(())
}

fn handle_flag(
    style: &Style,
    manager: &mut ProjectManager,
    path: &Path,
    needs_approval: bool,
) -> Result<(), PfgError> {
    let path = fs::canonicalize(path).map_err(|_| PfgError::PathNotFound(path.display().to_string()))?;
    activate_containing(manager, &path)?;
    manager.mark_needs_approval(&path, needs_approval)?;
    let verb = if needs_approval { "Flagged" } else { "Cleared" };
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("{} {}", verb, style.file_path(&path.display().to_string()))
        )
    );
    Ok(())
}

fn handle_review(
    style: &Style,
    manager: &mut ProjectManager,
    id: i64,
    status: ReviewStatus,
) -> Result<(), PfgError> {
    // Load the owning project so an approval can clear the file's flag.
    let record_path = FileStore::get_history(manager.store(), id)
        .map_err(|e| PfgError::Storage(e.to_string()))?
        .map(|r| PathBuf::from(r.path))
        .ok_or(PfgError::HistoryNotFound(id))?;
    if manager.project_for(&record_path).is_some() {
        activate_containing(manager, &record_path)?;
    }

    manager.set_review_status(id, status)?;
    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!("History #{} marked {}", id, style.review_status(status))
        )
    );
    Ok(())
}

fn handle_history(style: &Style, manager: &ProjectManager, limit: usize, json: bool) -> Result<(), PfgError> {
    let records = manager.history(limit)?;
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("{}", style.message(MessageType::Info, "No history entries."));
        return Ok(());
    }
    println!("{}", style.section("HISTORY"));
    println!();
    println!("{}", table::render_history_table(&records));
    Ok(())
}

fn handle_reap(style: &Style, manager: &mut ProjectManager, force: bool, json: bool) -> Result<(), PfgError> {
    let report = manager.reap(force)?;
    if json {
        return print_json(&report);
    }
    if report.skipped {
        println!(
            "{}",
            style.message(MessageType::Skip, "Reaper ran recently; use --force to run it now")
        );
        return Ok(());
    }
    println!("{}", style.message(MessageType::Ok, "History reaped"));
    println!("{}", style.message_detail("Entries", &report.history_purged.to_string()));
    println!("{}", style.message_detail("Backups", &report.backups_removed.to_string()));
    println!("{}", style.message_detail("Entities", &report.entities_purged.to_string()));
    if report.timed_out {
        println!(
            "{}",
            style.message(MessageType::Warn, "Time budget ran out; the rest is purged on the next run")
        );
    }
    Ok(())
}
