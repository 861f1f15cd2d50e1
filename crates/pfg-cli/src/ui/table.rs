//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `pfg project list` | `render_projects_table()` |
//! | `pfg files` | `render_files_table()` |
//! | `pfg history` | `render_history_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use pfg_core::{HistoryRow, ProjectSummary};

use super::color::terminal_width;
use super::format::{format_relative_time, format_thousands, truncate_left};

/// Display view of one file for `pfg files`.
#[derive(Debug, Clone)]
pub struct FileListRow {
    pub path: String,
    /// Unix seconds.
    pub last_modified: i64,
    pub needs_approval: bool,
}

/// Width left for a path column after `other` columns of fixed width.
fn path_budget(other: usize) -> usize {
    terminal_width().saturating_sub(other).max(24)
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table
}

/// Render registered projects.
///
/// ```text
/// PATH                     ID   FILES   REVIEW   ACTIVE
/// /home/me/app              1     142        3   *
/// ```
pub fn render_projects_table(projects: &[ProjectSummary]) -> String {
    if projects.is_empty() {
        return String::new();
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("PATH"),
        Cell::new("ID").set_alignment(CellAlignment::Right),
        Cell::new("FILES").set_alignment(CellAlignment::Right),
        Cell::new("REVIEW").set_alignment(CellAlignment::Right),
        Cell::new("ACTIVE"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(4)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
    ]);

    let budget = path_budget(36);
    for project in projects {
        table.add_row(vec![
            Cell::new(truncate_left(&project.path.display().to_string(), budget)),
            Cell::new(project.id).set_alignment(CellAlignment::Right),
            Cell::new(format_thousands(project.files as u64)).set_alignment(CellAlignment::Right),
            Cell::new(project.review).set_alignment(CellAlignment::Right),
            Cell::new(if project.active { "*" } else { "" }),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render a project's file listing.
///
/// ```text
/// PATH                  MODIFIED     REVIEW
/// src/lib.rs            2h ago       yes
/// ```
pub fn render_files_table(files: &[FileListRow]) -> String {
    if files.is_empty() {
        return String::new();
    }

    let mut table = new_table();
    table.set_header(vec![Cell::new("PATH"), Cell::new("MODIFIED"), Cell::new("REVIEW")]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
    ]);

    let budget = path_budget(26);
    for file in files {
        table.add_row(vec![
            Cell::new(truncate_left(&file.path, budget)),
            Cell::new(format_relative_time(file.last_modified)),
            Cell::new(if file.needs_approval { "yes" } else { "" }),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render history records, newest first as given.
///
/// ```text
/// ID   WHEN       CHANGE     STATUS    PATH
/// 12   5 mins ago modified   pending   /home/me/app/src/lib.rs
/// ```
pub fn render_history_table(records: &[HistoryRow]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("ID").set_alignment(CellAlignment::Right),
        Cell::new("WHEN"),
        Cell::new("CHANGE"),
        Cell::new("STATUS"),
        Cell::new("PATH"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(4)),
        ColumnConstraint::LowerBoundary(Width::Fixed(10)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
    ]);

    let budget = path_budget(40);
    for record in records {
        let path = if record.moved_to.is_empty() {
            record.path.clone()
        } else {
            format!("{} -> {}", record.path, record.moved_to)
        };
        table.add_row(vec![
            Cell::new(record.id).set_alignment(CellAlignment::Right),
            Cell::new(format_relative_time(record.timestamp)),
            Cell::new(record.change_type.as_str()),
            Cell::new(record.status.as_str()),
            Cell::new(truncate_left(&path, budget)),
        ]);
    }

    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pfg_core::ChangeKind;
    use std::path::PathBuf;

    #[test]
    fn test_projects_table() {
        let projects = vec![
            ProjectSummary {
                path: PathBuf::from("/home/me/app"),
                id: 1,
                active: true,
                files: 1420,
                review: 3,
            },
            ProjectSummary {
                path: PathBuf::from("/home/me/lib"),
                id: 7,
                active: false,
                files: 0,
                review: 0,
            },
        ];

        let output = render_projects_table(&projects);
        assert!(output.contains("PATH"));
        assert!(output.contains("REVIEW"));
        assert!(output.contains("/home/me/app"));
        assert!(output.contains("1,420"));
        assert!(output.contains('*'));
    }

    #[test]
    fn test_files_table() {
        let files = vec![FileListRow {
            path: "/home/me/app/src/lib.rs".to_string(),
            last_modified: Utc::now().timestamp(),
            needs_approval: true,
        }];

        let output = render_files_table(&files);
        assert!(output.contains("MODIFIED"));
        assert!(output.contains("src/lib.rs"));
        assert!(output.contains("just now"));
        assert!(output.contains("yes"));
    }

    #[test]
    fn test_history_table_shows_moves() {
        let mut moved = HistoryRow::new("/a/old.rs", 4, Utc::now().timestamp(), ChangeKind::Modified);
        moved.id = 12;
        moved.moved_to = "/a/new.rs".to_string();
        let mut deleted = HistoryRow::new("/a/gone.rs", 5, Utc::now().timestamp(), ChangeKind::Deleted);
        deleted.id = 13;

        let output = render_history_table(&[moved, deleted]);
        assert!(output.contains("CHANGE"));
        assert!(output.contains("/a/old.rs -> /a/new.rs"));
        assert!(output.contains("deleted"));
        assert!(output.contains("pending"));
    }

    #[test]
    fn test_empty_tables() {
        assert_eq!(render_projects_table(&[]), "");
        assert_eq!(render_files_table(&[]), "");
        assert_eq!(render_history_table(&[]), "");
    }
}
