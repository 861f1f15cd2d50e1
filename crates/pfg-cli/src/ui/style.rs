//! Message styling for CLI output.
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning | Yellow |
//! | `[info]` | Information | Blue |
//! | `[hint]` | Suggestion | Cyan |
//! | `[skip]` | Skipped | Dim |

use owo_colors::OwoColorize;

use pfg_core::{ChangeKind, ReviewStatus};

use super::color::ColorMode;

/// Message severity/type for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ok,
    Err,
    Warn,
    Info,
    Hint,
    Skip,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
            Self::Skip => "[skip]",
        }
    }
}

/// Main styling interface for CLI output.
///
/// # Example
///
/// ```ignore
/// let style = Style::new(ColorMode::Never);
/// println!("{}", style.message(MessageType::Ok, "Project registered"));
/// ```
#[derive(Debug, Clone)]
pub struct Style {
    colors: bool,
}

impl Style {
    /// Resolve `color_mode` once against the current environment.
    pub fn new(color_mode: ColorMode) -> Self {
        Self {
            colors: color_mode.is_enabled(),
        }
    }

    /// Format a simple message with a type prefix, e.g. `[ok] Done`.
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if !self.colors {
            return format!("{} {}", prefix, text);
        }
        let colored_prefix = match msg_type {
            MessageType::Ok => prefix.green().to_string(),
            MessageType::Err => prefix.red().to_string(),
            MessageType::Warn => prefix.yellow().to_string(),
            MessageType::Info => prefix.blue().to_string(),
            MessageType::Hint => prefix.cyan().to_string(),
            MessageType::Skip => prefix.dimmed().to_string(),
        };
        format!("{} {}", colored_prefix, text)
    }

    /// Detail line under a message, indented by five spaces.
    pub fn message_detail(&self, label: &str, value: &str) -> String {
        format!("     {}: {}", label, value)
    }

    pub fn section(&self, title: &str) -> String {
        if self.colors {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Error message followed by optional `Cause:` and `Hint:` lines.
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);
        if let Some(cause_text) = cause {
            output.push_str(&format!("\n      Cause: {}", cause_text));
        }
        if let Some(hint_text) = hint {
            output.push_str(&format!("\n      Hint: {}", hint_text));
        }
        output
    }

    /// List item with a marker; `+` is green and `-` is red.
    pub fn list_item(&self, marker: &str, text: &str) -> String {
        let styled = match (self.colors, marker) {
            (true, "+") => marker.green().to_string(),
            (true, "-") => marker.red().to_string(),
            _ => marker.to_string(),
        };
        format!("  {} {}", styled, text)
    }

    pub fn file_path(&self, path: &str) -> String {
        if self.colors {
            path.cyan().to_string()
        } else {
            path.to_string()
        }
    }

    /// Folder names are bold in tree output.
    pub fn folder(&self, name: &str) -> String {
        if self.colors {
            format!("{}/", name.bold())
        } else {
            format!("{}/", name)
        }
    }

    /// Alias entries show their target: `name -> target`.
    pub fn alias(&self, name: &str, target: &str) -> String {
        if self.colors {
            format!("{} -> {}", name.magenta(), target.dimmed())
        } else {
            format!("{} -> {}", name, target)
        }
    }

    pub fn change_kind(&self, kind: ChangeKind) -> String {
        let text = kind.as_str();
        if !self.colors {
            return text.to_string();
        }
        match kind {
            ChangeKind::Added => text.green().to_string(),
            ChangeKind::Modified => text.yellow().to_string(),
            ChangeKind::Deleted => text.red().to_string(),
        }
    }

    pub fn review_status(&self, status: ReviewStatus) -> String {
        let text = status.as_str();
        if !self.colors {
            return text.to_string();
        }
        match status {
            ReviewStatus::Pending => text.dimmed().to_string(),
            ReviewStatus::Approved => text.green().to_string(),
            ReviewStatus::Rejected => text.red().to_string(),
        }
    }
}
