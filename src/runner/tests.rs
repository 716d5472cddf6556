//! Unit tests for command dispatch, directory rules and option tables.

use super::setup::{CoreData, PRIVATE_DIR, options_table, summary_text};
use crate::model::{BuildDescription, SubprojectInfo, SummaryEntry};
use super::*;
use anyhow::{Result as AnyResult, ensure};
use clap::Parser;
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;

/// Scratch workspace holding a source tree at `src/`.
struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn write(&self, rel: &str, contents: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, contents).expect("write file");
    }

    fn cli(&self, args: &[&str]) -> Cli {
        let mut argv = vec!["kumihimo", "-C", self.root.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse arguments")
    }

    fn run(&self, args: &[&str]) -> AnyResult<(Outcome, String)> {
        let mut out = Vec::new();
        let outcome = run_with(&self.cli(args), &mut out)?;
        Ok((outcome, String::from_utf8(out)?))
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize().expect("canonical tempdir"))
        .expect("utf-8 tempdir");
    let ws = Workspace { _dir: dir, root };
    ws.write(
        "src/meson.build",
        "project('demo', 'c', version: '1.2')\nexecutable('app', 'main.c', install: true)\n",
    );
    ws.write("src/main.c", "int main(void) { return 0; }\n");
    ws.write(
        "src/meson.options",
        "option('feature', type: 'boolean', value: true, description: 'Toggle')\n",
    );
    ws
}

fn runner_error(err: &anyhow::Error) -> Option<&RunnerError> {
    err.downcast_ref::<RunnerError>()
}

#[rstest]
#[case::build_then_source(&["build", "src"])]
#[case::source_then_build(&["src", "build"])]
fn setup_accepts_either_directory_order(workspace: Workspace, #[case] dirs: &[&str]) -> AnyResult<()> {
    let mut args = vec!["setup"];
    args.extend_from_slice(dirs);
    workspace.run(&args)?;
    let build = workspace.root.join("build");
    let core = CoreData::load(&build)?;
    ensure!(core.source_dir == workspace.root.join("src"), "source {}", core.source_dir);
    ensure!(introspect::is_build_dir(&build), "introspection files missing");
    Ok(())
}

#[rstest]
fn setup_rejects_ambiguous_directories(workspace: Workspace) {
    workspace.write("other/meson.build", "project('other')\n");
    let err = workspace.run(&["setup", "src", "other"]).expect_err("both have build files");
    assert!(
        matches!(runner_error(&err), Some(RunnerError::BothHaveBuildFiles { .. })),
        "{err:?}"
    );

    let err = workspace.run(&["setup", "a", "b"]).expect_err("neither has a build file");
    assert!(
        matches!(runner_error(&err), Some(RunnerError::NoBuildFile { .. })),
        "{err:?}"
    );

    let err = workspace.run(&["setup", "src", "src"]).expect_err("same directory");
    assert!(
        matches!(runner_error(&err), Some(RunnerError::SameDirectories(_))),
        "{err:?}"
    );
}

#[rstest]
fn setup_requires_reconfigure_for_configured_directories(workspace: Workspace) -> AnyResult<()> {
    workspace.run(&["setup", "build", "src", "-Dfeature=false"])?;
    let err = workspace.run(&["setup", "build", "src"]).expect_err("already configured");
    ensure!(
        matches!(runner_error(&err), Some(RunnerError::AlreadyConfigured(_))),
        "{err:?}"
    );

    workspace.run(&["setup", "build", "src", "--reconfigure", "--buildtype", "release"])?;
    let core = CoreData::load(&workspace.root.join("build"))?;
    ensure!(core.options.get("feature").map(String::as_str) == Some("false"), "{core:?}");
    ensure!(core.options.get("buildtype").map(String::as_str) == Some("release"), "{core:?}");
    Ok(())
}

#[rstest]
fn setup_records_machine_files_relative_to_the_working_directory(
    workspace: Workspace,
) -> AnyResult<()> {
    workspace.write("native.ini", "[binaries]\n");
    workspace.run(&["setup", "build", "src", "--native-file", "native.ini"])?;
    let core = CoreData::load(&workspace.root.join("build"))?;
    ensure!(
        core.native_files == [workspace.root.join("native.ini")],
        "{:?}",
        core.native_files
    );

    let err = workspace
        .run(&["setup", "other", "src", "--cross-file", "missing.ini"])
        .expect_err("no such cross file");
    ensure!(format!("{err:#}").contains("cross file"), "{err:#}");
    Ok(())
}

#[rstest]
fn wipe_clears_the_build_directory(workspace: Workspace) -> AnyResult<()> {
    workspace.run(&["setup", "build", "src"])?;
    workspace.write("build/stale.txt", "old");
    workspace.run(&["setup", "build", "src", "--wipe"])?;
    ensure!(!workspace.root.join("build/stale.txt").exists(), "stale file survived");
    ensure!(CoreData::path(&workspace.root.join("build")).is_file(), "coredata missing");
    Ok(())
}

#[rstest]
fn failed_setup_writes_nothing(workspace: Workspace) {
    workspace.write("src/meson.build", "project('demo')\nerror('broken')\n");
    workspace.run(&["setup", "build", "src"]).expect_err("evaluation fails");
    assert!(!workspace.root.join("build").join(PRIVATE_DIR).exists());
}

#[rstest]
fn failed_setup_leaves_configured_files_unwritten(workspace: Workspace) {
    workspace.write("src/config.h.in", "#define VERSION \"@VERSION@\"\n");
    workspace.write(
        "src/meson.build",
        concat!(
            "project('demo', 'c', version: '1.2')\n",
            "conf = configuration_data({'VERSION': meson.project_version()})\n",
            "configure_file(input: 'config.h.in', output: 'config.h', configuration: conf)\n",
            "configure_file(output: 'gen.h', configuration: conf)\n",
            "error('boom')\n",
        ),
    );
    workspace.run(&["setup", "build", "src"]).expect_err("evaluation fails");
    let build = workspace.root.join("build");
    assert!(!build.join("config.h").exists(), "config.h written");
    assert!(!build.join("gen.h").exists(), "gen.h written");
}

#[rstest]
fn successful_setup_writes_configured_files(workspace: Workspace) -> AnyResult<()> {
    workspace.write("src/config.h.in", "#define VERSION \"@VERSION@\"\n");
    workspace.write(
        "src/meson.build",
        concat!(
            "project('demo', 'c', version: '1.2')\n",
            "conf = configuration_data({'VERSION': meson.project_version()})\n",
            "configure_file(input: 'config.h.in', output: 'config.h', configuration: conf)\n",
            "configure_file(input: 'config.h.in', output: 'again.h', copy: true)\n",
        ),
    );
    workspace.run(&["setup", "build", "src"])?;
    let written = std::fs::read_to_string(workspace.root.join("build/config.h"))?;
    ensure!(written == "#define VERSION \"1.2\"\n", "config.h was {written:?}");
    ensure!(workspace.root.join("build/again.h").is_file(), "copy missing");
    Ok(())
}

#[test]
fn summary_aligns_keys_per_project() {
    let entry = |key: &str, values: &[&str], list_sep: Option<&str>| SummaryEntry {
        key: key.to_owned(),
        values: values.iter().map(|v| (*v).to_owned()).collect(),
        list_sep: list_sep.map(str::to_owned),
    };
    let mut description = BuildDescription::default();
    description.project.name = "demo".to_owned();
    description.project.version = "1.0".to_owned();
    description.subprojects.push(SubprojectInfo {
        name: "sub".to_owned(),
        version: "2.0".to_owned(),
        descriptive_name: "Sub Project".to_owned(),
    });
    description.summary.insert(
        "demo".to_owned(),
        [
            (
                "Configuration".to_owned(),
                vec![
                    entry("Some boolean", &["false"], None),
                    entry("A list", &["string", "1"], None),
                    entry("empty", &[], None),
                ],
            ),
            ("Stuff".to_owned(), vec![entry("comma list", &["a", "b", "c"], Some(", "))]),
        ]
        .into_iter()
        .collect(),
    );
    description.summary.insert(
        "Sub Project".to_owned(),
        [(String::new(), vec![entry("string", &["bar"], None)])]
            .into_iter()
            .collect(),
    );
    insta::assert_snapshot!(summary_text(&description), @r###"
    Sub Project 2.0

        string: bar

    demo 1.0

      Configuration
        Some boolean: false
        A list      : string
                      1
        empty       :

      Stuff
        comma list  : a, b, c
    "###);
}

#[rstest]
fn configure_rejects_bad_values_and_keeps_configuration(workspace: Workspace) -> AnyResult<()> {
    workspace.run(&["setup", "build", "src"])?;
    let before = CoreData::load(&workspace.root.join("build"))?;
    workspace
        .run(&["configure", "build", "-Dfeature=maybe"])
        .expect_err("not a boolean");
    let after = CoreData::load(&workspace.root.join("build"))?;
    ensure!(before == after, "configuration changed: {after:?}");

    workspace.run(&["configure", "build", "-Dfeature=false"])?;
    let options = introspect::read(&workspace.root.join("build"), Document::BuildOptions)?;
    let feature = options
        .as_array()
        .and_then(|records| records.iter().find(|r| r["name"] == "feature"))
        .cloned();
    ensure!(
        feature.is_some_and(|record| record["value"] == json!(false)),
        "feature not updated in {options}"
    );
    Ok(())
}

#[rstest]
fn configure_prints_the_options_table(workspace: Workspace) -> AnyResult<()> {
    workspace.run(&["setup", "build", "src"])?;
    let (_, table) = workspace.run(&["configure", "build"])?;
    ensure!(table.contains("Project options:"), "{table}");
    ensure!(table.contains("feature"), "{table}");
    Ok(())
}

#[rstest]
fn configure_needs_a_build_directory(workspace: Workspace) {
    let err = workspace.run(&["configure", "src"]).expect_err("not configured");
    assert!(
        matches!(runner_error(&err), Some(RunnerError::NotConfigured(_))),
        "{err:?}"
    );
}

#[test]
fn options_table_groups_and_aligns_sections() {
    let options = json!([
        {"name": "prefix", "value": "/usr/local", "section": "directory", "description": "Installation prefix"},
        {"name": "feature", "value": true, "section": "user", "choices": [true, false], "description": "Toggle"},
        {"name": "jobs", "value": 4, "section": "user", "min": 1, "max": null, "description": ""},
    ]);
    insta::assert_snapshot!(options_table(&options), @r###"
    Directories:

      Option  Current Value  Possible Values  Description
      ------  -------------  ---------------  -----------
      prefix  /usr/local                      Installation prefix

    Project options:

      Option   Current Value  Possible Values  Description
      ------   -------------  ---------------  -----------
      feature  true           [true, false]    Toggle
      jobs     4              1-
    "###);
}

#[rstest]
fn introspect_reads_build_directories_and_source_trees(workspace: Workspace) -> AnyResult<()> {
    let (_, from_source) = workspace.run(&["introspect", "src/meson.build", "--projectinfo"])?;
    let info: Json = serde_json::from_str(&from_source)?;
    ensure!(info["version"] == "1.2", "{info}");

    workspace.run(&["setup", "build", "src"])?;
    let (_, combined) = workspace.run(&["introspect", "build", "--targets", "--projectinfo"])?;
    let combined: Json = serde_json::from_str(&combined)?;
    let keys: Vec<&String> = combined.as_object().map(|o| o.keys().collect()).unwrap_or_default();
    ensure!(keys == ["projectinfo", "targets"], "keys {keys:?}");
    ensure!(combined["targets"][0]["name"] == "app", "{combined}");
    Ok(())
}

#[rstest]
fn introspect_needs_a_selection(workspace: Workspace) {
    let err = workspace.run(&["introspect", "src"]).expect_err("nothing selected");
    assert!(
        matches!(runner_error(&err), Some(RunnerError::NothingSelected)),
        "{err:?}"
    );
    let err = workspace
        .run(&["introspect", "nowhere", "--targets"])
        .expect_err("not introspectable");
    assert!(
        matches!(runner_error(&err), Some(RunnerError::NotIntrospectable(_))),
        "{err:?}"
    );
}

#[rstest]
fn introspect_dumps_the_syntax_tree(workspace: Workspace) -> AnyResult<()> {
    let (_, out) = workspace.run(&["introspect", "src/meson.build", "--ast"])?;
    let tree: Json = serde_json::from_str(&out)?;
    ensure!(tree.is_object(), "unexpected tree {tree}");
    Ok(())
}

#[rstest]
fn format_check_only_reports_changes(workspace: Workspace) -> AnyResult<()> {
    workspace.write("fmt/meson.build", "x=[1,2]\n");
    let (outcome, out) = workspace.run(&["format", "--check-only", "fmt"])?;
    ensure!(outcome == Outcome::WouldChange, "outcome {outcome:?}");
    ensure!(out.is_empty(), "check-only printed {out:?}");

    workspace.run(&["format", "-i", "fmt/meson.build"])?;
    let rewritten = std::fs::read_to_string(workspace.root.join("fmt/meson.build"))?;
    ensure!(rewritten == "x = [1, 2]\n", "got {rewritten:?}");
    let (outcome, _) = workspace.run(&["format", "-q", "fmt"])?;
    ensure!(outcome == Outcome::Success, "outcome {outcome:?}");
    Ok(())
}

#[rstest]
fn format_output_needs_a_single_file(workspace: Workspace) {
    workspace.write("a/meson.build", "a = 1\n");
    workspace.write("b/meson.build", "b = 2\n");
    let err = workspace
        .run(&["format", "a", "b", "-o", "out.build"])
        .expect_err("two inputs");
    assert!(
        matches!(runner_error(&err), Some(RunnerError::OutputNeedsSingleFile)),
        "{err:?}"
    );
}

#[rstest]
fn wrap_commands_read_local_wraps(workspace: Workspace) -> AnyResult<()> {
    workspace.write(
        "src/subprojects/zlib.wrap",
        "[wrap-file]\ndirectory = zlib-1.3\nsource_filename = zlib.tar.gz\nsource_hash = 3f\n",
    );
    workspace.write("src/subprojects/local/meson.build", "project('local')\n");
    let (_, listing) = workspace.run(&["wrap", "--sourcedir", "src", "list"])?;
    ensure!(listing == "zlib\n", "listing {listing:?}");

    let (_, info) = workspace.run(&["wrap", "--sourcedir", "src", "info", "zlib"])?;
    let info: Json = serde_json::from_str(&info)?;
    ensure!(info["directory"] == "zlib-1.3", "{info}");

    let (_, verified) = workspace.run(&["wrap", "--sourcedir", "src", "verify", "zlib"])?;
    ensure!(verified.is_empty(), "nothing cached, got {verified:?}");

    let err = workspace
        .run(&["wrap", "--sourcedir", "src", "info", "local"])
        .expect_err("directory without wrap");
    ensure!(
        matches!(runner_error(&err), Some(RunnerError::UnknownWrap(_))),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn outcomes_map_to_exit_codes() {
    assert_eq!(ExitCode::from(Outcome::Success), ExitCode::SUCCESS);
    assert_eq!(ExitCode::from(Outcome::WouldChange), ExitCode::from(1_u8));
}
