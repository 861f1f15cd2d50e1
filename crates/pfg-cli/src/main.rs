//! # pfg CLI
//!
//! Command-line interface for the project file graph.
//!
//! This binary provides human-friendly access to `pfg-core` functionality.
//! Run `pfg --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
