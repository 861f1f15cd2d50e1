//! # CLI UI Module
//!
//! Styling and formatting layer for pfg output. Everything here works
//! without colors (`NO_COLOR`, non-TTY) and every listing command also has
//! a `--json` form for scripts.
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection and terminal capability checks
//! - `style`: Message types, prefixes, and styling functions
//! - `format`: Utility formatters (time, counts, truncation)
//! - `table`: Table rendering with comfy-table

pub mod color;
pub mod format;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use style::{MessageType, Style};
