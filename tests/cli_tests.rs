//! End-to-end tests for `setup`, `configure` and `introspect`.
//!
//! Each test copies the `calc` project from `tests/data` into a temporary
//! directory and drives the compiled binary against it.

mod common;

use anyhow::{Context, Result, ensure};
use common::{copy_fixture, json_output, kumihimo};
use predicates::prelude::*;
use rstest::rstest;
use serde_json::Value;

fn configured() -> Result<(tempfile::TempDir, std::path::PathBuf)> {
    let (temp, root) = copy_fixture("calc")?;
    kumihimo(&root).args(["setup", "build"]).assert().success();
    Ok((temp, root))
}

fn names(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|i| i["name"].as_str()).collect())
        .unwrap_or_default()
}

#[test]
fn setup_writes_coredata_and_introspection_files() -> Result<()> {
    let (_temp, root) = configured()?;
    let build = root.join("build");
    ensure!(build.join("meson-private/coredata.json").is_file(), "coredata missing");
    for name in ["projectinfo", "targets", "buildoptions", "installed"] {
        let file = build.join("meson-info").join(format!("intro-{name}.json"));
        ensure!(file.is_file(), "{} missing", file.display());
    }
    let index = std::fs::read_to_string(build.join("meson-info/meson-info.json"))?;
    let index: Value = serde_json::from_str(&index)?;
    ensure!(index["introspection"]["version"]["full"] == "1.0.0", "{index}");
    Ok(())
}

#[test]
fn setup_logs_targets_and_the_project_summary_to_stderr() -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    kumihimo(&root)
        .args(["setup", "build"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(
            predicate::str::contains("Build targets in project: 2")
                .and(predicate::str::contains("calc 0.3.1"))
                .and(predicate::str::contains("  Configuration\n"))
                .and(predicate::str::contains("    Tests : YES\n"))
                .and(predicate::str::contains("    Engine: fast\n")),
        );
    Ok(())
}

#[test]
fn setup_refuses_configured_directories() -> Result<()> {
    let (_temp, root) = configured()?;
    kumihimo(&root)
        .args(["setup", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already configured"));
    kumihimo(&root)
        .args(["setup", "build", "--reconfigure", "-Dengine=small"])
        .assert()
        .success();
    let options = json_output(&root, &["introspect", "build", "--buildoptions"])?;
    let engine = options
        .as_array()
        .and_then(|records| records.iter().find(|r| r["name"] == "engine"))
        .map(|record| record["value"].clone());
    ensure!(engine == Some(Value::from("small")), "{options}");
    Ok(())
}

#[test]
fn setup_honours_the_directory_flag() -> Result<()> {
    let (temp, root) = copy_fixture("calc")?;
    kumihimo(temp.path())
        .arg("-C")
        .arg(&root)
        .args(["setup", "out"])
        .assert()
        .success();
    ensure!(root.join("out/meson-info/meson-info.json").is_file());
    Ok(())
}

#[test]
fn syntax_errors_point_at_the_file() -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    std::fs::write(root.join("src/meson.build"), "calc = executable('calc',\n")?;
    kumihimo(&root)
        .args(["setup", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("meson.build"));
    ensure!(!root.join("build/meson-private").exists(), "failed setup left state");
    Ok(())
}

#[test]
fn introspect_lists_targets_tests_and_installed_files() -> Result<()> {
    let (_temp, root) = configured()?;
    let targets = json_output(&root, &["introspect", "build", "--targets"])?;
    ensure!(names(&targets) == ["calccore", "calc"], "{targets}");

    let tests = json_output(&root, &["introspect", "build", "--tests"])?;
    ensure!(names(&tests) == ["basic"], "{tests}");

    let installed = json_output(&root, &["introspect", "build", "--installed"])?;
    let destinations: Vec<&str> = installed
        .as_object()
        .context("installed is an object")?
        .values()
        .filter_map(Value::as_str)
        .collect();
    ensure!(
        destinations.contains(&"/usr/local/bin/calc"),
        "{installed}"
    );
    ensure!(
        destinations.contains(&"/usr/local/include/calc.h"),
        "{installed}"
    );
    Ok(())
}

#[rstest]
#[case::projectinfo("--projectinfo", "version")]
#[case::buildoptions("--buildoptions", "")]
#[case::machines("--machines", "host")]
#[case::buildsystem_files("--buildsystem-files", "")]
fn introspect_single_documents_print_bare(
    #[case] flag: &str,
    #[case] key: &str,
) -> Result<()> {
    let (_temp, root) = configured()?;
    let value = json_output(&root, &["introspect", "build", flag])?;
    if key.is_empty() {
        ensure!(value.is_array(), "{flag}: {value}");
    } else {
        ensure!(value.get(key).is_some(), "{flag}: {value}");
    }
    Ok(())
}

#[test]
fn introspect_all_orders_documents() -> Result<()> {
    let (_temp, root) = configured()?;
    let value = json_output(&root, &["introspect", "build", "--all", "--indent"])?;
    let keys: Vec<&str> = value
        .as_object()
        .context("combined output is an object")?
        .keys()
        .map(String::as_str)
        .collect();
    ensure!(
        keys == [
            "projectinfo",
            "targets",
            "buildoptions",
            "tests",
            "benchmarks",
            "dependencies",
            "installed",
            "buildsystem_files",
            "machines",
        ],
        "{keys:?}"
    );
    Ok(())
}

#[test]
fn introspect_evaluates_source_trees() -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    let info = json_output(&root, &["introspect", "meson.build", "--projectinfo"])?;
    ensure!(info["descriptive_name"] == "calc", "{info}");
    ensure!(info["version"] == "0.3.1", "{info}");
    ensure!(!root.join("build").exists(), "source introspection wrote a build dir");

    let ast = json_output(&root, &["introspect", "--ast", "src/meson.build"])?;
    ensure!(ast.is_object(), "{ast}");
    Ok(())
}

#[test]
fn introspect_without_a_selection_fails() -> Result<()> {
    let (_temp, root) = configured()?;
    kumihimo(&root)
        .args(["introspect", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No introspection command given"));
    Ok(())
}

#[test]
fn configure_prints_and_changes_options() -> Result<()> {
    let (_temp, root) = configured()?;
    kumihimo(&root)
        .args(["configure", "build"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Project options:")
                .and(predicate::str::contains("with_tests"))
                .and(predicate::str::contains("[fast, small]")),
        );

    kumihimo(&root)
        .args(["configure", "build", "-Dwith_tests=false"])
        .assert()
        .success();
    let tests = json_output(&root, &["introspect", "build", "--tests"])?;
    ensure!(tests == serde_json::json!([]), "{tests}");
    Ok(())
}

#[test]
fn configure_rejects_unknown_options() -> Result<()> {
    let (_temp, root) = configured()?;
    kumihimo(&root)
        .args(["configure", "build", "-Dnot_an_option=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not_an_option"));
    let tests = json_output(&root, &["introspect", "build", "--tests"])?;
    ensure!(names(&tests) == ["basic"], "{tests}");
    Ok(())
}

#[test]
fn configure_needs_a_configured_directory() -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    kumihimo(&root)
        .args(["configure", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not seem to be a build directory"));
    Ok(())
}

#[rstest]
#[case(&["setup", "build", "-Dnovalue"])]
#[case(&["frobnicate"])]
fn invalid_arguments_are_rejected_by_the_parser(#[case] args: &[&str]) -> Result<()> {
    let (_temp, root) = copy_fixture("calc")?;
    kumihimo(&root).args(args).assert().failure().code(2);
    Ok(())
}
