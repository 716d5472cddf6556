//! End-to-end tests for the `wrap` command.

mod common;

use anyhow::{Result, ensure};
use common::{copy_fixture, json_output, kumihimo};
use predicates::prelude::*;
use std::fs;

#[test]
fn list_prints_wrap_names() -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    kumihimo(&root)
        .args(["wrap", "list"])
        .assert()
        .success()
        .stdout("mathlib\n");
    Ok(())
}

#[test]
fn info_prints_the_parsed_wrap() -> Result<()> {
    let (temp, _root) = copy_fixture("calc")?;
    let info = json_output(temp.path(), &["wrap", "--sourcedir", "calc", "info", "mathlib"])?;
    ensure!(info["kind"] == "file", "{info}");
    ensure!(info["directory"] == "mathlib-1.0", "{info}");
    ensure!(info["values"]["source_filename"] == "mathlib-1.0.tar.gz", "{info}");
    Ok(())
}

#[test]
fn verify_checks_cached_archives() -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    kumihimo(&root)
        .args(["wrap", "verify", "mathlib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("source hash OK"));

    fs::write(
        root.join("subprojects/packagecache/mathlib-1.0.tar.gz"),
        "tampered\n",
    )?;
    kumihimo(&root)
        .args(["wrap", "verify", "mathlib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Incorrect hash for source"));
    Ok(())
}

#[test]
fn unknown_wraps_are_reported() -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    kumihimo(&root)
        .args(["wrap", "info", "nothere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Wrap nothere not found"));
    Ok(())
}
