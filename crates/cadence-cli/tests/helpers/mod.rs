#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Runs the `cadence` binary against a throwaway workbook.
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("workbook.db");

        Self { temp_dir, db_path }
    }

    /// A harness whose workbook has already been initialized.
    pub fn initialized() -> Self {
        let harness = Self::new();
        harness.run_success(&["init"]);
        harness
    }

    /// A `cadence` command configured for testing: isolated workbook, no
    /// settle window, and a working directory without a config file.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");
        cmd.current_dir(self.temp_dir.path())
            .env("CADENCE_DATABASE_PATH", &self.db_path)
            .env("CADENCE_DEBOUNCE_MS", "0")
            .env("CADENCE_DEBUG_LOG", "true")
            .env("RUST_LOG", "cadence=warn");
        cmd
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }
}

pub struct TestFixtures;

impl TestFixtures {
    /// A fixed-offset chore that is due immediately.
    pub fn watering_args() -> Vec<&'static str> {
        vec!["recurring", "add", "Water plants", "--key", "water", "--days", "3"]
    }

    /// A completion-linked chore that is due immediately.
    pub fn laundry_args() -> Vec<&'static str> {
        vec![
            "recurring",
            "add",
            "Laundry",
            "--key",
            "laundry",
            "--days",
            "7",
            "--from-completion",
            "--owner",
            "Alice",
        ]
    }
}

pub mod assertions {
    use predicates::prelude::*;

    pub fn created_successfully() -> impl Predicate<str> {
        predicate::str::contains("✓").and(predicate::str::contains("Added"))
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
