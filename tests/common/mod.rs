//! Shared integration-test harness for running the `trialkit` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};

/// Runs the `trialkit` binary with `args` and waits for it to exit.
#[allow(clippy::missing_panics_doc)]
pub fn spawn_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_trialkit"))
        .args(args)
        .env_remove("TRIALKIT_LOG_LEVEL")
        .env_remove("TRIALKIT_CONFIG")
        .output()
        .expect("failed to spawn trialkit")
}

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Absolute path of a fixture as a `String`, for use in argument lists.
pub fn fixture(name: &str) -> String {
    fixture_path(name).display().to_string()
}

/// Parses every stdout line as JSON.
#[allow(clippy::missing_panics_doc)]
pub fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("stdout line should be JSON"))
        .collect()
}
