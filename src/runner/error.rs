//! Error types for the runner module.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// `setup` was run without directories outside a build directory.
    #[error("Must specify at least one directory name.")]
    #[diagnostic(
        code(kumihimo::runner::missing_directory),
        help("run `kumihimo setup <builddir>` from the source directory")
    )]
    MissingDirectory,

    /// Source and build directory resolve to the same place.
    #[error(
        "Source and build directories must not be the same ({0}). Create a pristine build directory."
    )]
    #[diagnostic(code(kumihimo::runner::same_directories))]
    SameDirectories(Utf8PathBuf),

    /// Both `setup` directories hold a `meson.build`.
    #[error("Both directories contain a build file meson.build: {first} and {second}.")]
    #[diagnostic(code(kumihimo::runner::ambiguous_source))]
    BothHaveBuildFiles {
        /// First directory argument.
        first: Utf8PathBuf,
        /// Second directory argument.
        second: Utf8PathBuf,
    },

    /// Neither `setup` directory holds a `meson.build`.
    #[error("Neither directory contains a build file meson.build: {first} and {second}.")]
    #[diagnostic(code(kumihimo::runner::no_build_file))]
    NoBuildFile {
        /// First directory argument.
        first: Utf8PathBuf,
        /// Second directory argument.
        second: Utf8PathBuf,
    },

    /// `setup` found an existing configuration.
    #[error("Directory {0} is already configured.")]
    #[diagnostic(
        code(kumihimo::runner::already_configured),
        help("pass --reconfigure to apply new options or --wipe to start over")
    )]
    AlreadyConfigured(Utf8PathBuf),

    /// A command needs a configured build directory.
    #[error("Directory {0} does not seem to be a build directory.")]
    #[diagnostic(
        code(kumihimo::runner::not_configured),
        help("configure it first with `kumihimo setup`")
    )]
    NotConfigured(Utf8PathBuf),

    /// The stored configuration was written by another version.
    #[error("Build directory {path} was configured by version {found}; this is {expected}.")]
    #[diagnostic(
        code(kumihimo::runner::version_mismatch),
        help("run `kumihimo setup --wipe` to regenerate it")
    )]
    VersionMismatch {
        /// Build directory.
        path: Utf8PathBuf,
        /// Version recorded in the build directory.
        found: String,
        /// Version of this program.
        expected: String,
    },

    /// `introspect` was given nothing to print.
    #[error("No introspection command given.")]
    #[diagnostic(
        code(kumihimo::runner::nothing_selected),
        help("pass one of --targets, --buildoptions, --projectinfo, ... or --all")
    )]
    NothingSelected,

    /// `introspect` could not find anything to read.
    #[error("{0} is neither a build directory nor a source tree.")]
    #[diagnostic(code(kumihimo::runner::not_introspectable))]
    NotIntrospectable(Utf8PathBuf),

    /// `format --output` was combined with several inputs.
    #[error("--output can only be used with a single input file")]
    #[diagnostic(code(kumihimo::runner::output_needs_single_file))]
    OutputNeedsSingleFile,

    /// A wrap name did not match any local wrap.
    #[error("Wrap {0} not found in the subprojects directory.")]
    #[diagnostic(
        code(kumihimo::runner::unknown_wrap),
        help("list the available wraps with `kumihimo wrap list`")
    )]
    UnknownWrap(String),

    /// A path given on the command line is not valid UTF-8.
    #[error("path {} is not valid UTF-8", .0.display())]
    #[diagnostic(code(kumihimo::runner::non_utf8_path))]
    NonUtf8Path(PathBuf),
}
