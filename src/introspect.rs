//! Introspection documents written to and read from a build directory.
//!
//! `setup` stores one JSON file per [`Document`] under
//! `<builddir>/meson-info/` together with an index, `meson-info.json`.
//! `introspect` reads them back, or evaluates a source tree directly when
//! no build directory is given.

use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value as Json, json};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::interpreter::{COMPAT_VERSION, Evaluation};
use crate::parser::{ParseError, parse_str};

/// Directory below the build directory holding introspection files.
pub const INFO_DIR: &str = "meson-info";

/// Index file inside [`INFO_DIR`].
pub const INFO_FILE: &str = "meson-info.json";

/// Version of the introspection format.
const FORMAT_VERSION: (u32, u32, u32) = (1, 0, 0);

/// Errors raised while writing or reading introspection data.
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// A document could not be written.
    #[error("failed to write {path}")]
    Write {
        /// Target file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A document could not be read.
    #[error("failed to read {path}")]
    Read {
        /// Source file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A stored document is not valid JSON.
    #[error("{path} does not contain valid JSON")]
    Json {
        /// Source file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The directory was never configured.
    #[error("{0} is not a configured build directory (no {INFO_DIR}/{INFO_FILE})")]
    NotBuildDir(Utf8PathBuf),
}

/// One introspection document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    /// Project name, version and subprojects.
    ProjectInfo,
    /// Declared targets.
    Targets,
    /// Option values and constraints.
    BuildOptions,
    /// `test()` declarations.
    Tests,
    /// `benchmark()` declarations.
    Benchmarks,
    /// Dependency lookups and declarations.
    Dependencies,
    /// Installed files mapped to their destinations.
    Installed,
    /// Build files read while evaluating.
    BuildsystemFiles,
    /// Build, host and target machines.
    Machines,
}

impl Document {
    /// Every document, in the order they are written.
    pub const ALL: [Self; 9] = [
        Self::ProjectInfo,
        Self::Targets,
        Self::BuildOptions,
        Self::Tests,
        Self::Benchmarks,
        Self::Dependencies,
        Self::Installed,
        Self::BuildsystemFiles,
        Self::Machines,
    ];

    /// Key used in file names and combined output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ProjectInfo => "projectinfo",
            Self::Targets => "targets",
            Self::BuildOptions => "buildoptions",
            Self::Tests => "tests",
            Self::Benchmarks => "benchmarks",
            Self::Dependencies => "dependencies",
            Self::Installed => "installed",
            Self::BuildsystemFiles => "buildsystem_files",
            Self::Machines => "machines",
        }
    }

    /// File name below [`INFO_DIR`].
    #[must_use]
    pub fn file_name(self) -> String {
        format!("intro-{}.json", self.name())
    }

    /// Render the document from an evaluation.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures.
    pub fn render(self, evaluation: &Evaluation) -> serde_json::Result<Json> {
        let description = &evaluation.description;
        match self {
            Self::ProjectInfo => {
                let project = &description.project;
                Ok(json!({
                    "version": project.version,
                    "descriptive_name": project.name,
                    "license": project.license,
                    "subproject_dir": project.subproject_dir,
                    "subprojects": description.subprojects,
                }))
            }
            Self::Targets => serde_json::to_value(&description.targets),
            Self::BuildOptions => Ok(evaluation.options.to_json()),
            Self::Tests => serde_json::to_value(&description.tests),
            Self::Benchmarks => serde_json::to_value(&description.benchmarks),
            Self::Dependencies => serde_json::to_value(&description.dependencies),
            Self::Installed => {
                let installed: IndexMap<&str, &str> = description
                    .install
                    .iter()
                    .map(|entry| (entry.source.as_str(), entry.destination.as_str()))
                    .collect();
                serde_json::to_value(installed)
            }
            Self::BuildsystemFiles => serde_json::to_value(&description.build_files),
            Self::Machines => {
                let machines = &evaluation.machines;
                Ok(json!({
                    "build": machines.build,
                    "host": machines.host,
                    "target": machines.target,
                }))
            }
        }
    }
}

/// Write every document and the index into `build_dir`.
///
/// # Errors
///
/// Returns [`IntrospectError::Write`] when a file cannot be written.
pub fn write_all(
    evaluation: &Evaluation,
    source_dir: &Utf8Path,
    build_dir: &Utf8Path,
) -> Result<(), IntrospectError> {
    let info_dir = build_dir.join(INFO_DIR);
    let mut information = serde_json::Map::new();
    for document in Document::ALL {
        let path = info_dir.join(document.file_name());
        let value = document
            .render(evaluation)
            .map_err(|err| IntrospectError::Write {
                path: path.clone(),
                source: err.into(),
            })?;
        write_json(&path, &value).map_err(|source| IntrospectError::Write {
            path: path.clone(),
            source,
        })?;
        information.insert(
            document.name().to_owned(),
            json!({ "file": document.file_name(), "updated": true }),
        );
    }
    let index = json!({
        "meson_version": version_record(COMPAT_VERSION),
        "directories": {
            "source": source_dir,
            "build": build_dir,
            "info": info_dir,
        },
        "introspection": {
            "version": {
                "full": format!("{}.{}.{}", FORMAT_VERSION.0, FORMAT_VERSION.1, FORMAT_VERSION.2),
                "major": FORMAT_VERSION.0,
                "minor": FORMAT_VERSION.1,
                "patch": FORMAT_VERSION.2,
            },
            "information": information,
        },
        "build_files_updated": true,
        "error": false,
    });
    let path = info_dir.join(INFO_FILE);
    write_json(&path, &index).map_err(|source| IntrospectError::Write { path, source })?;
    debug!(dir = %info_dir, "wrote introspection files");
    Ok(())
}

fn version_record(full: &str) -> Json {
    let mut parts = full.split('.').map(|p| p.parse::<u32>().unwrap_or_default());
    json!({
        "full": full,
        "major": parts.next().unwrap_or_default(),
        "minor": parts.next().unwrap_or_default(),
        "patch": parts.next().unwrap_or_default(),
    })
}

/// Whether `dir` holds introspection data.
#[must_use]
pub fn is_build_dir(dir: &Utf8Path) -> bool {
    dir.join(INFO_DIR).join(INFO_FILE).is_file()
}

/// Read one stored document.
///
/// # Errors
///
/// Returns [`IntrospectError::NotBuildDir`] for unconfigured directories and
/// read or JSON errors for damaged files.
pub fn read(build_dir: &Utf8Path, document: Document) -> Result<Json, IntrospectError> {
    if !is_build_dir(build_dir) {
        return Err(IntrospectError::NotBuildDir(build_dir.to_path_buf()));
    }
    read_json(&build_dir.join(INFO_DIR).join(document.file_name()))
}

/// Read and parse a JSON file.
///
/// # Errors
///
/// Returns [`IntrospectError::Read`] or [`IntrospectError::Json`].
pub fn read_json(path: &Utf8Path) -> Result<Json, IntrospectError> {
    let text = fs::read_to_string(path).map_err(|source| IntrospectError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| IntrospectError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Syntax tree of a build file as JSON.
///
/// # Errors
///
/// Returns the [`ParseError`] when the file does not parse.
pub fn ast(src: &str, name: &str) -> Result<Json, ParseError> {
    let block = parse_str(src, name)?;
    Ok(serde_json::to_value(&block).unwrap_or(Json::Null))
}

/// Replace `path` with the JSON rendering of `value`.
///
/// The document is written to a temporary file in the same directory and
/// renamed over the destination so readers never observe partial output.
///
/// # Errors
///
/// Returns any I/O or serialisation error.
pub fn write_json(path: &Utf8Path, value: &impl Serialize) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Interpreter, Setup};
    use anyhow::{Context, Result as AnyResult, ensure};
    use rstest::rstest;

    fn evaluate(root: &Utf8Path) -> AnyResult<Evaluation> {
        fs::write(
            root.join("meson.build"),
            concat!(
                "project('intro', 'c', version : '0.3', license : 'MIT')\n",
                "install_data('README', install_dir : 'share/doc')\n",
                "test('noop', files('run.sh')[0], suite : 'quick')\n",
            ),
        )?;
        fs::write(root.join("README"), "read me\n")?;
        fs::write(root.join("run.sh"), "#!/bin/sh\n")?;
        let setup = Setup::new(root.to_path_buf(), root.join("build"));
        Ok(Interpreter::new(setup)?.run()?)
    }

    #[rstest]
    fn projectinfo_lists_name_and_version() -> AnyResult<()> {
        let dir = tempfile::tempdir()?;
        let root = Utf8Path::from_path(dir.path()).context("utf-8 tempdir")?;
        let evaluation = evaluate(root)?;
        let info = Document::ProjectInfo.render(&evaluation)?;
        insta::assert_json_snapshot!(info, @r#"
        {
          "version": "0.3",
          "descriptive_name": "intro",
          "license": [
            "MIT"
          ],
          "subproject_dir": "subprojects",
          "subprojects": []
        }
        "#);
        Ok(())
    }

    #[rstest]
    fn write_all_round_trips_through_the_build_dir() -> AnyResult<()> {
        let dir = tempfile::tempdir()?;
        let root = Utf8Path::from_path(dir.path()).context("utf-8 tempdir")?;
        let evaluation = evaluate(root)?;
        let build = root.join("build");
        ensure!(!is_build_dir(&build));
        write_all(&evaluation, root, &build)?;
        ensure!(is_build_dir(&build));
        for document in Document::ALL {
            ensure!(
                build.join(INFO_DIR).join(document.file_name()).is_file(),
                "missing {}",
                document.name()
            );
        }
        let installed = read(&build, Document::Installed)?;
        let readme = root.join("README");
        ensure!(
            installed[readme.as_str()] == json!("/usr/local/share/doc/README"),
            "{installed}"
        );
        let index = read_json(&build.join(INFO_DIR).join(INFO_FILE))?;
        ensure!(index["meson_version"]["full"] == json!(COMPAT_VERSION));
        ensure!(index["introspection"]["information"]["tests"]["file"] == json!("intro-tests.json"));
        let tests = read(&build, Document::Tests)?;
        ensure!(tests[0]["suite"] == json!(["intro:quick"]), "{tests}");
        Ok(())
    }

    #[rstest]
    fn reading_an_unconfigured_directory_fails() -> AnyResult<()> {
        let dir = tempfile::tempdir()?;
        let root = Utf8Path::from_path(dir.path()).context("utf-8 tempdir")?;
        let err = read(root, Document::Targets).err().context("should fail")?;
        ensure!(matches!(err, IntrospectError::NotBuildDir(_)));
        Ok(())
    }

    #[test]
    fn ast_dump_contains_the_call() -> AnyResult<()> {
        let json = ast("project('x')\n", "meson.build")?;
        let text = json.to_string();
        ensure!(text.contains("\"project\""), "{text}");
        Ok(())
    }
}
