//! End-to-end tests for the `format` command.

mod common;

use anyhow::{Result, ensure};
use common::{copy_fixture, kumihimo};
use predicates::prelude::*;
use std::fs;

#[test]
fn format_prints_to_stdout_by_default() -> Result<()> {
    let (_temp, root) = copy_fixture("unformatted")?;
    kumihimo(&root)
        .arg("format")
        .assert()
        .success()
        .stdout("project('fmt', 'c')\nsubdir('sub')\nx = [1, 2]\n");
    let untouched = fs::read_to_string(root.join("meson.build"))?;
    ensure!(untouched.starts_with("project('fmt','c')"), "{untouched}");
    Ok(())
}

#[test]
fn check_only_exits_with_status_one() -> Result<()> {
    let (_temp, root) = copy_fixture("unformatted")?;
    kumihimo(&root)
        .args(["format", "--check-only", "meson.build"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("would be reformatted"));

    kumihimo(&root)
        .args(["format", "-i", "meson.build"])
        .assert()
        .success();
    kumihimo(&root)
        .args(["format", "-q", "meson.build"])
        .assert()
        .success();
    Ok(())
}

#[test]
fn recursive_inplace_follows_subdirs() -> Result<()> {
    let (_temp, root) = copy_fixture("unformatted")?;
    kumihimo(&root)
        .args(["format", "-r", "-i"])
        .assert()
        .success();
    let sub = fs::read_to_string(root.join("sub/meson.build"))?;
    ensure!(sub == "if true\n    message('hi')\nendif\n", "got {sub:?}");
    Ok(())
}

#[test]
fn output_writes_a_single_file() -> Result<()> {
    let (_temp, root) = copy_fixture("unformatted")?;
    kumihimo(&root)
        .args(["format", "sub", "-o", "formatted.build"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    let written = fs::read_to_string(root.join("formatted.build"))?;
    ensure!(written == "if true\n    message('hi')\nendif\n", "got {written:?}");

    kumihimo(&root)
        .args(["format", "-r", "-o", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("single input file"));
    Ok(())
}

#[test]
fn configuration_files_change_the_layout() -> Result<()> {
    let (_temp, root) = copy_fixture("unformatted")?;
    fs::write(root.join("meson.format"), "indent_by = '\t'\n")?;
    kumihimo(&root)
        .args(["format", "sub/meson.build"])
        .assert()
        .success()
        .stdout("if true\n\tmessage('hi')\nendif\n");

    fs::write(root.join("custom.ini"), "max_line_length = 'many'\n")?;
    kumihimo(&root)
        .args(["format", "-c", "custom.ini", "sub/meson.build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_line_length"));
    Ok(())
}

#[test]
fn editorconfig_is_honoured_on_request() -> Result<()> {
    let (_temp, root) = copy_fixture("unformatted")?;
    fs::write(
        root.join(".editorconfig"),
        "root = true\n\n[meson.build]\nindent_style = space\nindent_size = 2\n",
    )?;
    kumihimo(&root)
        .args(["format", "-e", "sub/meson.build"])
        .assert()
        .success()
        .stdout("if true\n  message('hi')\nendif\n");
    Ok(())
}

#[test]
fn syntax_errors_fail() -> Result<()> {
    let (_temp, root) = copy_fixture("unformatted")?;
    fs::write(root.join("meson.build"), "x = [1,\n")?;
    kumihimo(&root)
        .arg("format")
        .assert()
        .failure()
        .stderr(predicate::str::contains("meson.build"));
    Ok(())
}
