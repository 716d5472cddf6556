//! Integration tests verifying that log output is written to stderr.
//!
//! These tests exercise the production logging path by invoking the compiled
//! binary and asserting log messages appear on stderr rather than stdout.

use predicates::prelude::*;
use tempfile::tempdir;

/// Verifies that runner errors are logged to stderr.
///
/// The test runs `setup` in an empty temporary directory, which fails
/// because no directory holds a `meson.build`. The error log should appear
/// on stderr, not stdout.
#[test]
fn main_logs_errors_to_stderr() {
    let temp = tempdir().expect("create temp dir");
    assert_cmd::cargo::cargo_bin_cmd!("kumihimo")
        .current_dir(temp.path())
        .args(["setup", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Neither directory contains a build file"))
        .stdout(predicate::str::is_empty());
}

/// Verifies that `--verbose` enables debug output.
#[test]
fn verbose_enables_debug_logging() {
    let temp = tempdir().expect("create temp dir");
    std::fs::write(temp.path().join("meson.build"), "x = 1\n").expect("write build file");
    assert_cmd::cargo::cargo_bin_cmd!("kumihimo")
        .current_dir(temp.path())
        .args(["--verbose", "format", "--inplace"])
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"));
}
