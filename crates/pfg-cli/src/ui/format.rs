//! Formatting utilities for CLI output.

use chrono::{DateTime, Utc};

/// Truncate a string to `max_len` characters, keeping the END and marking
/// the cut with a leading `...`. Paths read best from the right.
///
/// ```ignore
/// assert_eq!(truncate_left("/home/me/app/src/lib.rs", 12), ".../src/lib.rs");
/// ```
pub fn truncate_left(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }
    let keep = max_len - 3;
    let tail: String = s.chars().skip(count - keep).collect();
    format!("...{}", tail)
}

/// Format a unix timestamp relative to now ("5 mins ago", "3h ago", "2d ago"),
/// falling back to the date for anything older than a week.
pub fn format_relative_time(timestamp: i64) -> String {
    let Some(then) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
        return "-".to_string();
    };
    if timestamp <= 0 {
        return "-".to_string();
    }
    let duration = Utc::now().signed_duration_since(then);

    if duration.num_seconds() < 0 {
        then.format("%Y-%m-%d").to_string()
    } else if duration.num_minutes() < 1 {
        "just now".to_string()
    } else if duration.num_hours() < 1 {
        format!("{} mins ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

/// Format a number with thousands separators.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let len = digits.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// `1 file` / `3 files`.
pub fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", format_thousands(n as u64), many)
    }
}
