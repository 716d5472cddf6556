//! Shared helpers for integration tests.
//!
//! Integration tests under `tests/` compile as independent crates. This module
//! is included via `mod common;` in individual test files to share fixtures and
//! helpers while keeping test modules small and avoiding duplication.

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Copy `tests/data/<name>` into a fresh temporary directory.
///
/// Returns the guard and the path of the copied tree.
pub fn copy_fixture(name: &str) -> Result<(TempDir, PathBuf)> {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name);
    let temp = tempfile::tempdir().context("create temp dir for fixture")?;
    let root = temp.path().join(name);
    for entry in WalkDir::new(&source) {
        let entry = entry.with_context(|| format!("walk {}", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(&source)
            .context("fixture entry outside fixture")?;
        let target = root.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok((temp, root))
}

/// The `kumihimo` binary running in `dir`.
pub fn kumihimo(dir: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kumihimo");
    cmd.current_dir(dir);
    cmd
}

/// Run `kumihimo` in `dir` and parse its standard output as JSON.
pub fn json_output(dir: &Path, args: &[&str]) -> Result<serde_json::Value> {
    let output = kumihimo(dir)
        .args(args)
        .output()
        .with_context(|| format!("run kumihimo {args:?}"))?;
    anyhow::ensure!(
        output.status.success(),
        "kumihimo {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).context("parse JSON output")
}
