//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands. It is
//! also compiled by the build script to render the manual page, so it must
//! not depend on the rest of the crate.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Reject `-D` arguments that are not `key=value` pairs.
fn parse_define(s: &str) -> Result<String, String> {
    match s.split_once('=') {
        Some((key, _)) if !key.trim().is_empty() => Ok(s.to_owned()),
        _ => Err(format!("{s:?} is not of the form key=value")),
    }
}

/// Evaluate, format and introspect Meson build definitions.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments accepted by the `setup` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct SetupArgs {
    /// Build directory; created when missing.
    #[arg(value_name = "BUILDDIR")]
    pub builddir: Option<PathBuf>,

    /// Source directory holding the top-level `meson.build`.
    #[arg(value_name = "SOURCEDIR")]
    pub sourcedir: Option<PathBuf>,

    /// Set an option, for example `-Dbuildtype=release`.
    #[arg(short = 'D', value_name = "OPTION=VALUE", value_parser = parse_define)]
    pub defines: Vec<String>,

    /// Installation prefix.
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Build type such as `debug` or `release`.
    #[arg(long, value_name = "TYPE")]
    pub buildtype: Option<String>,

    /// Native machine file; may be repeated.
    #[arg(long = "native-file", value_name = "FILE")]
    pub native_file: Vec<PathBuf>,

    /// Cross machine file; may be repeated.
    #[arg(long = "cross-file", value_name = "FILE")]
    pub cross_file: Vec<PathBuf>,

    /// Discard the previous configuration and start from scratch.
    #[arg(long)]
    pub wipe: bool,

    /// Re-run setup on an already configured build directory.
    #[arg(long)]
    pub reconfigure: bool,
}

/// Arguments accepted by the `configure` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct ConfigureArgs {
    /// Configured build directory.
    #[arg(value_name = "BUILDDIR")]
    pub builddir: Option<PathBuf>,

    /// Change an option, for example `-Dwarning_level=3`.
    #[arg(short = 'D', value_name = "OPTION=VALUE", value_parser = parse_define)]
    pub defines: Vec<String>,

    /// Forget cached lookups before reconfiguring.
    #[arg(long)]
    pub clearcache: bool,
}

/// Arguments accepted by the `introspect` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct IntrospectArgs {
    /// Build directory, or a `meson.build` file or source directory.
    #[arg(value_name = "BUILDDIR")]
    pub target: Option<PathBuf>,

    /// Dump the syntax tree of a `meson.build`.
    #[arg(long)]
    pub ast: bool,

    /// List top-level targets.
    #[arg(long)]
    pub targets: bool,

    /// List option values and constraints.
    #[arg(long)]
    pub buildoptions: bool,

    /// Show project name, version and subprojects.
    #[arg(long)]
    pub projectinfo: bool,

    /// List unit tests.
    #[arg(long)]
    pub tests: bool,

    /// List benchmarks.
    #[arg(long)]
    pub benchmarks: bool,

    /// List dependencies found or declared by the project.
    #[arg(long)]
    pub dependencies: bool,

    /// List installed files and their destinations.
    #[arg(long)]
    pub installed: bool,

    /// List the files that make up the build definition.
    #[arg(long = "buildsystem-files")]
    pub buildsystem_files: bool,

    /// Show the build, host and target machines.
    #[arg(long)]
    pub machines: bool,

    /// Print every document.
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Pretty-print the JSON output.
    #[arg(short = 'i', long)]
    pub indent: bool,
}

/// Arguments accepted by the `format` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct FormatArgs {
    /// Files or directories to format; defaults to `meson.build`.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Rewrite the files in place.
    #[arg(short = 'i', long)]
    pub inplace: bool,

    /// Exit with status 1 when any file would change.
    #[arg(short = 'q', long = "check-only")]
    pub check_only: bool,

    /// Also format the files reached through `subdir()`.
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Formatter settings file instead of the nearest `meson.format`.
    #[arg(short = 'c', long = "configuration", value_name = "FILE")]
    pub configuration: Option<PathBuf>,

    /// Honour `.editorconfig` files.
    #[arg(short = 'e', long)]
    pub editorconfig: bool,

    /// Write the result to this file, or `-` for standard output.
    #[arg(short = 'o', long, value_name = "FILE", conflicts_with = "inplace")]
    pub output: Option<PathBuf>,
}

/// Arguments accepted by the `wrap` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct WrapArgs {
    /// Source directory whose `subprojects/` holds the wraps.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub sourcedir: PathBuf,

    /// Wrap operation.
    #[command(subcommand)]
    pub command: WrapCommand,
}

/// Operations on local wrap files.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum WrapCommand {
    /// List the wraps found in `subprojects/`.
    List,

    /// Show the parsed contents of one wrap.
    Info {
        /// Wrap name without the `.wrap` suffix.
        name: String,
    },

    /// Check cached archives against the hashes recorded in a wrap.
    Verify {
        /// Wrap name without the `.wrap` suffix.
        name: String,
    },
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Configure a build directory from a source tree.
    Setup(SetupArgs),

    /// Show or change the options of a configured build directory.
    Configure(ConfigureArgs),

    /// Print information about a configured project or a build file.
    Introspect(IntrospectArgs),

    /// Reformat build files in the canonical style.
    Format(FormatArgs),

    /// Inspect and verify wrap files.
    Wrap(WrapArgs),
}
