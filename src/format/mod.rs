//! Canonical re-emission of build definition files.
//!
//! [`format_source`] parses a file and prints it back with uniform layout,
//! keeping comments and single blank lines between statements. Settings
//! come from [`FormatConfig`]; the runner resolves them per file through
//! [`Settings`] and decides whether to print, rewrite or only check.

mod config;
mod printer;

pub use config::{CONFIG_FILE, EndOfLine, FormatConfig, Settings};

use std::collections::HashSet;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ast::{CodeBlock, ExprKind, StatementKind};
use crate::ini::IniError;
use crate::parser::{ParseError, parse_str};
use printer::Printer;

/// Build file looked up in directories and `subdir()` targets.
const BUILD_FILE: &str = "meson.build";

/// Errors raised while formatting.
#[derive(Debug, Error, Diagnostic)]
pub enum FormatError {
    /// A file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// File involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The input is not valid build-definition syntax.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    /// A configuration file is not valid INI.
    #[error("{path}: {source}")]
    Ini {
        /// Configuration file.
        path: Utf8PathBuf,
        /// Parser error.
        source: IniError,
    },
    /// A configuration entry is unknown or has a bad value.
    #[error("{path}:{line}: {message}")]
    #[diagnostic(code(kumihimo::format::config))]
    Config {
        /// Configuration file.
        path: Utf8PathBuf,
        /// One-based line of the entry.
        line: usize,
        /// Description of the problem.
        message: String,
    },
}

/// Result of formatting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    /// File that was formatted.
    pub path: Utf8PathBuf,
    /// Contents as read.
    pub original: String,
    /// Contents after formatting.
    pub formatted: String,
}

impl Formatted {
    /// Whether formatting changed anything.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.original != self.formatted
    }
}

/// Format `src` with `config`; `name` labels syntax errors.
///
/// # Errors
///
/// Returns [`FormatError::Parse`] when `src` does not parse.
///
/// # Examples
///
/// ```rust
/// use kumihimo::format::{EndOfLine, FormatConfig, format_source};
///
/// let config = FormatConfig {
///     end_of_line: EndOfLine::Lf,
///     ..FormatConfig::default()
/// };
/// let out = format_source("x=[1,2]\n", "meson.build", &config).expect("format");
/// assert_eq!(out, "x = [1, 2]\n");
/// ```
pub fn format_source(src: &str, name: &str, config: &FormatConfig) -> Result<String, FormatError> {
    let block = parse_str(src, name)?;
    Ok(Printer::new(src, config).print(&block))
}

/// Read and format the file at `path`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or when its
/// formatter settings are invalid.
pub fn format_file(path: &Utf8Path, settings: &Settings) -> Result<Formatted, FormatError> {
    let original = read(path)?;
    let config = settings.config_for(path)?;
    let formatted = format_source(&original, path.as_str(), &config)?;
    debug!(path = %path, changed = original != formatted, "formatted");
    Ok(Formatted {
        path: path.to_owned(),
        original,
        formatted,
    })
}

/// Expand the command-line inputs into the list of files to format.
///
/// Directories stand for their `meson.build`. With `recursive`, every
/// literal `subdir()` call is followed as well; missing subdirectory files
/// are reported and skipped.
///
/// # Errors
///
/// Returns an error when a file that must be scanned for `subdir()` calls
/// cannot be read or parsed.
pub fn collect_files(
    inputs: &[Utf8PathBuf],
    recursive: bool,
) -> Result<Vec<Utf8PathBuf>, FormatError> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for input in inputs {
        let file = if input.is_dir() {
            input.join(BUILD_FILE)
        } else {
            input.clone()
        };
        if seen.insert(identity(&file)) {
            files.push(file);
        }
    }
    if !recursive {
        return Ok(files);
    }
    let mut next = 0;
    while let Some(file) = files.get(next).cloned() {
        next += 1;
        if file.file_name() != Some(BUILD_FILE) {
            continue;
        }
        let src = read(&file)?;
        let block = parse_str(&src, file.as_str())?;
        let dir = file.parent().unwrap_or_else(|| Utf8Path::new(""));
        for sub in subdirs(&block) {
            let candidate = dir.join(&sub).join(BUILD_FILE);
            if !candidate.is_file() {
                warn!(path = %candidate, "subdir() target has no build file");
            } else if seen.insert(identity(&candidate)) {
                files.push(candidate);
            }
        }
    }
    Ok(files)
}

/// Canonical form used to visit each file once.
fn identity(path: &Utf8Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.as_std_path().to_owned())
}

/// Literal arguments of every `subdir()` call in `block`, in source order.
fn subdirs(block: &CodeBlock) -> Vec<String> {
    let mut found = Vec::new();
    collect_subdirs(block, &mut found);
    found
}

fn collect_subdirs(block: &CodeBlock, found: &mut Vec<String>) {
    for stmt in &block.statements {
        match &stmt.kind {
            StatementKind::Expression { expr } => {
                let ExprKind::Call { function, args } = &expr.kind else {
                    continue;
                };
                if function.name != "subdir" {
                    continue;
                }
                if let Some(ExprKind::String { value, style }) =
                    args.positional.first().map(|e| &e.value.kind)
                {
                    if !style.is_format() {
                        found.push(value.clone());
                    }
                }
            }
            StatementKind::If(clause) => {
                for branch in &clause.branches {
                    collect_subdirs(&branch.block, found);
                }
                if let Some(block) = &clause.else_block {
                    collect_subdirs(block, found);
                }
            }
            StatementKind::Foreach(clause) => collect_subdirs(&clause.block, found),
            _ => {}
        }
    }
}

fn read(path: &Utf8Path) -> Result<String, FormatError> {
    std::fs::read_to_string(path).map_err(|source| FormatError::Read {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests;
