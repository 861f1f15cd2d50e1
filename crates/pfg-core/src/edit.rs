//! Line-based and AST-addressed text edits.
//!
//! A batch of [`FileChange`]s for one file is applied in three steps:
//!
//! 1. **Resolve**: AST paths become line ranges (one parse per batch), then
//!    the operation type adjusts the range (`Before`, `After`, `Delete`).
//! 2. **Validate**: every range must fit the file. One bad range aborts the
//!    whole batch with [`PfgError::EditOutOfRange`].
//! 3. **Splice**: changes are applied from the highest `start` down, so the
//!    line numbers of lower ranges stay valid while higher ones change.
//!
//! Failures to resolve an AST path are recorded on that change only
//! (`has_error`) and do not block the rest of the batch.
//!
//! Line numbers are 1-based and `end` is exclusive: `start == end` inserts
//! before line `start`, and `start == line_count + 1` appends.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PfgError;
use crate::syntax::{SyntaxProvider, SyntaxTree};

// ============================================================================
// Types
// ============================================================================

/// How a change relates to its target range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Replace the range.
    #[default]
    Replace,
    /// Insert before the range.
    Before,
    /// Insert after the range.
    After,
    /// Remove the range.
    Delete,
}

/// One edit request and, after application, its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileChange {
    /// 1-based first line.
    pub start: usize,
    /// 1-based line after the last one.
    pub end: usize,
    pub replacement: String,
    /// Structural address resolved through the syntax provider.
    pub ast_path: Option<String>,
    pub operation_type: OperationType,
    /// Outcome message.
    pub result: Option<String>,
    pub completed: bool,
    pub has_error: bool,
}

impl FileChange {
    pub fn replace(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
            ..Self::default()
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            operation_type: OperationType::Delete,
            ..Self::default()
        }
    }

    /// A change addressed by AST path.
    pub fn at_ast(
        ast_path: impl Into<String>,
        operation_type: OperationType,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            ast_path: Some(ast_path.into()),
            operation_type,
            replacement: replacement.into(),
            ..Self::default()
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.has_error = true;
        self.completed = false;
        self.result = Some(message.into());
    }
}

/// Result of a successful batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub content: String,
    pub applied: usize,
    pub failed: usize,
}

impl EditOutcome {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

// ============================================================================
// Application
// ============================================================================

/// Apply `changes` to `content` (the text of `path`).
///
/// Each change is updated in place with its outcome.
///
/// # Errors
///
/// - [`PfgError::EditOutOfRange`] when any resolved range does not fit.
/// - [`PfgError::EditFailed`] when two ranges overlap.
///
/// In both cases `content` is left untouched by the batch.
pub fn apply_changes(
    path: &Path,
    content: &str,
    changes: &mut [FileChange],
    syntax: &dyn SyntaxProvider,
) -> Result<EditOutcome, PfgError> {
    let mut lines = split_lines(content);
    let line_count = lines.len();

    // (change index, indent anchor line)
    let mut ready: Vec<(usize, usize)> = Vec::new();
    let mut tree: Option<Result<SyntaxTree, String>> = None;

    for (index, change) in changes.iter_mut().enumerate() {
        change.completed = false;
        change.has_error = false;
        change.result = None;

        if let Some(ast_path) = change.ast_path.clone() {
            let parsed = tree.get_or_insert_with(|| {
                syntax.parse(path, content).map_err(|e| e.to_string())
            });
            let located = match parsed {
                Ok(tree) => syntax.lookup(tree, &ast_path),
                Err(reason) => {
                    change.fail(format!("parse failed: {}", reason));
                    continue;
                }
            };
            match located {
                Some((start, end)) => {
                    change.start = start;
                    change.end = end;
                }
                None => {
                    change.fail(format!("AST path not found: {}", ast_path));
                    continue;
                }
            }
        }

        let anchor = change.start;
        match change.operation_type {
            OperationType::Replace => {}
            OperationType::Before => change.end = change.start,
            OperationType::After => change.start = change.end,
            OperationType::Delete => change.replacement.clear(),
        }

        if change.start < 1 || change.start > change.end || change.end > line_count + 1 {
            return Err(PfgError::EditOutOfRange {
                path: path.to_path_buf(),
                start: change.start,
                end: change.end,
                line_count,
            });
        }
        ready.push((index, anchor));
    }

    // Highest start first; at equal starts the wider range goes first so an
    // insertion lands in front of a replacement of the same line.
    ready.sort_by(|a, b| {
        let (x, y) = (&changes[a.0], &changes[b.0]);
        y.start
            .cmp(&x.start)
            .then(y.end.cmp(&x.end))
            .then(b.0.cmp(&a.0))
    });
    check_overlaps(path, changes, &ready)?;

    let file_eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    for (index, anchor) in &ready {
        let change = &changes[*index];
        let target = lines.get(anchor.saturating_sub(1));
        let indent = target
            .map(|l| leading_whitespace(l).to_string())
            .unwrap_or_default();
        let eol = target.and_then(|l| line_ending(l)).unwrap_or(file_eol);
        let text = normalize_indent(&change.replacement, &indent, eol);
        splice(&mut lines, change.start, change.end, &text, eol);
    }

    for (index, _) in &ready {
        let change = &mut changes[*index];
        change.completed = true;
        change.result = Some("applied".to_string());
    }

    let failed = changes.iter().filter(|c| c.has_error).count();
    debug!(
        "Applied {} changes to {} ({} failed)",
        ready.len(),
        path.display(),
        failed
    );
    Ok(EditOutcome {
        content: lines.concat(),
        applied: ready.len(),
        failed,
    })
}

/// `ready` is sorted by descending start.
fn check_overlaps(
    path: &Path,
    changes: &[FileChange],
    ready: &[(usize, usize)],
) -> Result<(), PfgError> {
    for pair in ready.windows(2) {
        let upper = &changes[pair[0].0];
        let lower = &changes[pair[1].0];
        // An insertion exactly at another range's start is fine.
        if lower.end > upper.start {
            return Err(PfgError::edit_failed(
                path,
                format!(
                    "changes {}..{} and {}..{} overlap",
                    lower.start, lower.end, upper.start, upper.end
                ),
            ));
        }
    }
    Ok(())
}

/// Split into lines, each keeping its terminator.
fn split_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

/// Terminator of `line`, if it has one.
fn line_ending(line: &str) -> Option<&'static str> {
    if line.ends_with("\r\n") {
        Some("\r\n")
    } else if line.ends_with('\n') {
        Some("\n")
    } else {
        None
    }
}

/// Replace lines `start..end` (1-based, exclusive) with `text`.
fn splice(lines: &mut Vec<String>, start: usize, end: usize, text: &str, eol: &str) {
    if start > lines.len() {
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                last.push_str(eol);
            }
        }
    }
    let replacement = split_lines(text);
    lines.splice(start - 1..end - 1, replacement);
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

/// Strip the common indentation of `text` and re-indent with `indent`.
/// Every line is terminated with `eol`, so non-empty results always end
/// with one.
fn normalize_indent(text: &str, indent: &str, eol: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let common = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).len())
        .min()
        .unwrap_or(0);

    let mut out = String::with_capacity(text.len() + indent.len() * 4);
    for line in text.lines() {
        if line.trim().is_empty() {
            out.push_str(eol);
            continue;
        }
        out.push_str(indent);
        out.push_str(&line[common..]);
        out.push_str(eol);
    }
    out
}
