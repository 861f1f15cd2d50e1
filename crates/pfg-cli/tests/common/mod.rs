//! Shared test utilities for pfg-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Get a Command for the pfg binary.
///
/// # Panics
///
/// Panics if the pfg binary cannot be found. This should not happen
/// in a properly configured test environment.
#[allow(deprecated)]
pub fn pfg_cmd() -> Command {
    Command::cargo_bin("pfg").expect("pfg binary should exist")
}

/// A temporary home holding a config, the store, the history directory and
/// one project folder (`app/`) with a couple of files.
pub struct Sandbox {
    _temp: TempDir,
    pub base: PathBuf,
    pub config: PathBuf,
    pub project: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let base = fs::canonicalize(temp.path()).expect("canonical temp dir");
        let state = base.join("state");
        fs::create_dir_all(&state).expect("create state dir");

        let config = state.join("config.yaml");
        fs::write(
            &config,
            format!(
                "database_path: {db}\nhistory_dir: {history}\nscan:\n  allowed_root: {root}\n",
                db = state.join("files.db").display(),
                history = state.join("history").display(),
                root = base.display(),
            ),
        )
        .expect("write config");

        let project = base.join("app");
        fs::create_dir_all(project.join("src")).expect("create project");
        fs::write(project.join("src/lib.rs"), "a\nb\nc\n").expect("write lib.rs");
        fs::write(project.join("README.md"), "# app\n").expect("write README");

        Self {
            _temp: temp,
            base,
            config,
            project,
        }
    }

    /// `pfg` bound to this sandbox's config, colors off, run inside the project.
    pub fn cmd(&self) -> Command {
        let mut cmd = pfg_cmd();
        cmd.env("PFG_CONFIG", &self.config)
            .env("PFG_COLOR", "never")
            .env("HOME", &self.base)
            .env_remove("PFG_VERBOSE")
            .current_dir(&self.project);
        cmd
    }

    /// Sandbox with `app/` registered and scanned once.
    pub fn registered() -> Self {
        let sandbox = Self::new();
        sandbox
            .cmd()
            .args(["project", "add", "."])
            .assert()
            .success();
        sandbox.cmd().arg("scan").assert().success();
        sandbox
    }

    pub fn write_state(&self, name: &str, content: &str) -> PathBuf {
        let path = self.base.join("state").join(name);
        fs::write(&path, content).expect("write state file");
        path
    }

    pub fn project_path(&self, relative: &str) -> PathBuf {
        self.project.join(relative)
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).expect("read file")
    }
}
