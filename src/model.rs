//! Build description recorded while evaluating a project.
//!
//! The interpreter fills a [`BuildDescription`]; introspection serialises it.
//! Nothing here orders or schedules work: targets and tests are records of
//! what the project declared.

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Names that may not be used for targets.
pub const RESERVED_TARGET_NAMES: [&str; 20] = [
    "clean",
    "clean-ctlist",
    "clean-gcno",
    "clean-gcda",
    "coverage",
    "coverage-text",
    "coverage-xml",
    "coverage-html",
    "phony",
    "PHONY",
    "all",
    "test",
    "benchmark",
    "install",
    "uninstall",
    "build.ninja",
    "scan-build",
    "reconfigure",
    "dist",
    "distcheck",
];

/// Metadata from a `project()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name.
    pub name: String,
    /// Project version or `undefined`.
    pub version: String,
    /// Licence identifiers.
    pub license: Vec<String>,
    /// Languages named in `project()`.
    pub languages: Vec<String>,
    /// Subproject directory relative to the project root.
    pub subproject_dir: String,
    /// `default_options` as given.
    pub default_options: IndexMap<String, String>,
    /// Required interpreter version constraint, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meson_version: Option<String>,
}

/// Summary of a subproject for `intro-projectinfo.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubprojectInfo {
    /// Subproject name.
    pub name: String,
    /// Version from its `project()` call.
    pub version: String,
    /// Name from its `project()` call.
    pub descriptive_name: String,
}

/// Kind of a build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    /// `executable()`
    #[serde(rename = "executable")]
    Executable,
    /// `static_library()`
    #[serde(rename = "static library")]
    StaticLibrary,
    /// `shared_library()`
    #[serde(rename = "shared library")]
    SharedLibrary,
    /// `shared_module()`
    #[serde(rename = "shared module")]
    SharedModule,
    /// `custom_target()`
    #[serde(rename = "custom")]
    Custom,
    /// `run_target()`
    #[serde(rename = "run")]
    Run,
    /// `alias_target()`
    #[serde(rename = "alias")]
    Alias,
}

impl TargetKind {
    /// Suffix used in target ids.
    #[must_use]
    pub const fn id_suffix(self) -> &'static str {
        match self {
            Self::Executable => "exe",
            Self::StaticLibrary => "sta",
            Self::SharedLibrary | Self::SharedModule => "sha",
            Self::Custom => "cus",
            Self::Run | Self::Alias => "run",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::StaticLibrary => "static library",
            Self::SharedLibrary => "shared library",
            Self::SharedModule => "shared module",
            Self::Custom => "custom",
            Self::Run => "run",
            Self::Alias => "alias",
        }
    }

    /// Whether the target compiles sources.
    #[must_use]
    pub const fn is_build_target(self) -> bool {
        matches!(
            self,
            Self::Executable | Self::StaticLibrary | Self::SharedLibrary | Self::SharedModule
        )
    }

    /// Whether other targets may link against it.
    #[must_use]
    pub const fn is_library(self) -> bool {
        matches!(
            self,
            Self::StaticLibrary | Self::SharedLibrary | Self::SharedModule
        )
    }
}

/// A declared target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Name given in the build file.
    pub name: String,
    /// Unique id built from subdir, name and kind.
    pub id: String,
    /// Target kind.
    #[serde(rename = "type")]
    pub kind: TargetKind,
    /// `meson.build` that declared the target.
    pub defined_in: Utf8PathBuf,
    /// Directory relative to the source root.
    pub subdir: Utf8PathBuf,
    /// Owning subproject, `None` for the main project.
    pub subproject: Option<String>,
    /// Absolute paths of the outputs in the build tree.
    pub filename: Vec<Utf8PathBuf>,
    /// Source files (absolute paths).
    pub sources: Vec<Utf8PathBuf>,
    /// Whether `ninja` without arguments would build it.
    pub build_by_default: bool,
    /// Whether it is installed.
    pub installed: bool,
    /// Install locations of the outputs.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub install_filename: Vec<Utf8PathBuf>,
    /// Ids of targets linked in.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub link_with: Vec<String>,
    /// Names of dependencies used.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dependencies: Vec<String>,
    /// Ids of targets that must be built first.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub depends: Vec<String>,
    /// Command of custom and run targets.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub command: Vec<String>,
    /// Extra per-language arguments given as `<lang>_args`.
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub args: IndexMap<String, Vec<String>>,
}

/// A `test()` or `benchmark()` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDef {
    /// Test name.
    pub name: String,
    /// Suites, each prefixed with the project name.
    pub suite: Vec<String>,
    /// Executable followed by its arguments.
    pub cmd: Vec<String>,
    /// Environment overrides.
    pub env: IndexMap<String, String>,
    /// Timeout in seconds.
    pub timeout: i64,
    /// Working directory.
    pub workdir: Option<String>,
    /// Whether it may run alongside other tests.
    pub is_parallel: bool,
    /// Scheduling priority.
    pub priority: i64,
    /// `exitcode`, `tap`, `gtest` or `rust`.
    pub protocol: String,
    /// Whether a failure is the expected result.
    pub should_fail: bool,
    /// Ids of targets needed before running.
    pub depends: Vec<String>,
}

/// Result of a `dependency()` lookup or a `declare_dependency()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Dependency name; empty for anonymous declared dependencies.
    pub name: String,
    /// `internal` or `not-found`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Version or `unknown`.
    pub version: String,
    /// Whether the lookup succeeded.
    pub found: bool,
    /// Whether the lookup was required.
    pub required: bool,
    /// Subproject that provided it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Compile arguments.
    pub compile_args: Vec<String>,
    /// Link arguments.
    pub link_args: Vec<String>,
    /// Include directories (absolute paths).
    pub include_directories: Vec<Utf8PathBuf>,
}

/// A file or directory installed by the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallEntry {
    /// What installed it: `target`, `headers`, `data`, `subdir`, `man`,
    /// `symlink` or `configure`.
    pub kind: String,
    /// File in the source or build tree, or the symlink target.
    pub source: Utf8PathBuf,
    /// Absolute install location.
    pub destination: Utf8PathBuf,
    /// Install tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// One line of a `summary()` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Key.
    pub key: String,
    /// Rendered values.
    pub values: Vec<String>,
    /// Separator used to join `values` on one line, if any.
    pub list_sep: Option<String>,
}

/// `add_test_setup()` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSetup {
    /// Setup name, prefixed with the project name.
    pub name: String,
    /// Wrapper command.
    pub exe_wrapper: Vec<String>,
    /// Environment overrides.
    pub env: IndexMap<String, String>,
    /// Timeout multiplier.
    pub timeout_multiplier: i64,
    /// Whether the setup is the default.
    pub is_default: bool,
}

/// Arguments added with `add_*_arguments()`, keyed by language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentTables {
    /// `add_global_arguments`
    pub global: IndexMap<String, Vec<String>>,
    /// `add_global_link_arguments`
    pub global_link: IndexMap<String, Vec<String>>,
    /// `add_project_arguments`, per subproject (empty key for the main
    /// project).
    pub project: IndexMap<String, IndexMap<String, Vec<String>>>,
    /// `add_project_link_arguments`, per subproject.
    pub project_link: IndexMap<String, IndexMap<String, Vec<String>>>,
}

/// Everything recorded while evaluating a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescription {
    /// Main project.
    pub project: ProjectInfo,
    /// Evaluated subprojects.
    pub subprojects: Vec<SubprojectInfo>,
    /// Targets in declaration order.
    pub targets: Vec<Target>,
    /// Tests in declaration order.
    pub tests: Vec<TestDef>,
    /// Benchmarks in declaration order.
    pub benchmarks: Vec<TestDef>,
    /// Dependency lookups and declarations.
    pub dependencies: Vec<DependencyRecord>,
    /// Installed files.
    pub install: Vec<InstallEntry>,
    /// Summary sections per project name.
    pub summary: IndexMap<String, IndexMap<String, Vec<SummaryEntry>>>,
    /// Language arguments.
    pub arguments: ArgumentTables,
    /// Test setups.
    pub test_setups: Vec<TestSetup>,
    /// Build files read, absolute paths.
    pub build_files: Vec<Utf8PathBuf>,
}

impl BuildDescription {
    /// Look up a target by id.
    #[must_use]
    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Record a build file once.
    pub fn add_build_file(&mut self, path: Utf8PathBuf) {
        if !self.build_files.contains(&path) {
            self.build_files.push(path);
        }
    }
}
