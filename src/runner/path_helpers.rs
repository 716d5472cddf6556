//! Path resolution helpers for the runner module.
//!
//! Centralises `-C` handling and the source/build directory rules of
//! `setup` so the main runner module stays focused on command dispatch.

use crate::cli::Cli;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::path::{Path, PathBuf};

use super::RunnerError;

/// File that marks a source directory.
pub(super) const BUILD_FILE: &str = "meson.build";

/// Resolve a command-line path against the `-C` directory.
///
/// The `-C/--directory` option behaves like a working directory change for
/// any filesystem path supplied on the command line. The result is
/// absolute but not canonical, since it may not exist yet.
///
/// # Errors
///
/// Returns an error when the current directory cannot be determined or the
/// path is not valid UTF-8.
pub(super) fn resolve_path(cli: &Cli, path: &Path) -> Result<Utf8PathBuf> {
    let joined = match &cli.directory {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    };
    let absolute = std::path::absolute(&joined)
        .with_context(|| format!("resolving {}", joined.display()))?;
    to_utf8(absolute)
}

/// The `-C` directory, or the current directory.
///
/// # Errors
///
/// Same as [`resolve_path`].
pub(super) fn working_dir(cli: &Cli) -> Result<Utf8PathBuf> {
    resolve_path(cli, Path::new("."))
}

/// Canonical form of an existing path.
pub(super) fn canonical(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("resolving {path}"))?;
    to_utf8(canonical)
}

fn normalise(path: Utf8PathBuf) -> Result<Utf8PathBuf> {
    if path.exists() {
        canonical(&path)
    } else {
        Ok(path)
    }
}

fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| RunnerError::NonUtf8Path(path).into())
}

fn has_build_file(dir: &Utf8Path) -> bool {
    dir.join(BUILD_FILE).is_file()
}

/// Decide which of the two `setup` directories is the source tree.
///
/// Either argument may be omitted and either order is accepted: the
/// directory holding `meson.build` is the source directory and the other
/// one is the build directory. Without arguments the current directory is
/// the build directory when its parent holds the project.
///
/// Returns `(source_dir, build_dir)`; existing directories are canonical.
///
/// # Errors
///
/// Fails when neither or both directories hold a `meson.build`, or when
/// they are the same directory.
pub(super) fn resolve_setup_dirs(
    cli: &Cli,
    first: Option<&Path>,
    second: Option<&Path>,
) -> Result<(Utf8PathBuf, Utf8PathBuf)> {
    let cwd = working_dir(cli)?;
    let (first, second) = match (first, second) {
        (Some(first), Some(second)) => (resolve_path(cli, first)?, resolve_path(cli, second)?),
        (Some(first), None) => (resolve_path(cli, first)?, cwd),
        (None, Some(second)) => (cwd, resolve_path(cli, second)?),
        (None, None) => {
            let parent = cwd.join("..");
            if has_build_file(&cwd) || !has_build_file(&parent) {
                return Err(RunnerError::MissingDirectory.into());
            }
            (cwd, parent)
        }
    };
    let (first, second) = (normalise(first)?, normalise(second)?);
    if first == second {
        return Err(RunnerError::SameDirectories(first).into());
    }
    let (source, build) = match (has_build_file(&first), has_build_file(&second)) {
        (true, true) => {
            return Err(RunnerError::BothHaveBuildFiles { first, second }.into());
        }
        (true, false) => (first, second),
        (false, true) => (second, first),
        (false, false) => return Err(RunnerError::NoBuildFile { first, second }.into()),
    };
    Ok((source, build))
}
