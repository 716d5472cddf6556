//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! handles command execution. `setup` and `configure` live in [`setup`];
//! introspection, formatting and wrap inspection are handled here.

mod error;
mod output;
mod path_helpers;
mod setup;

pub use error::RunnerError;

use crate::cli::{Cli, Commands, FormatArgs, IntrospectArgs, WrapArgs, WrapCommand};
use crate::format::{self, Formatted, Settings};
use crate::interpreter::{Interpreter, Setup};
use crate::introspect::{self, Document};
use crate::wrap::Resolver;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value as Json;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{debug, info};

use path_helpers::{BUILD_FILE, canonical, resolve_path, working_dir};

/// Directory scanned for wraps below a source directory.
const SUBPROJECT_DIR: &str = "subprojects";

/// How a successful command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    /// Nothing to report.
    Success,
    /// `format --check-only` found a file that is not formatted.
    WouldChange,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::SUCCESS,
            Outcome::WouldChange => Self::from(1_u8),
        }
    }
}

/// Execute the parsed [`Cli`] command, printing results to standard output.
///
/// # Errors
///
/// Returns an error if the command fails; see [`RunnerError`] for the
/// command-line problems reported directly.
pub fn run(cli: &Cli) -> Result<Outcome> {
    let mut stdout = io::stdout().lock();
    run_with(cli, &mut stdout)
}

/// Execute the parsed [`Cli`] command, printing results to `out`.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with(cli: &Cli, out: &mut dyn Write) -> Result<Outcome> {
    match &cli.command {
        Commands::Setup(args) => setup::setup(cli, args)?,
        Commands::Configure(args) => setup::configure(cli, args, out)?,
        Commands::Introspect(args) => handle_introspect(cli, args, out)?,
        Commands::Format(args) => return handle_format(cli, args, out),
        Commands::Wrap(args) => handle_wrap(cli, args, out)?,
    }
    Ok(Outcome::Success)
}

/// Documents requested by the `introspect` flags, in canonical order.
fn selected_documents(args: &IntrospectArgs) -> Vec<Document> {
    if args.all {
        return Document::ALL.to_vec();
    }
    let flags = [
        (args.projectinfo, Document::ProjectInfo),
        (args.targets, Document::Targets),
        (args.buildoptions, Document::BuildOptions),
        (args.tests, Document::Tests),
        (args.benchmarks, Document::Benchmarks),
        (args.dependencies, Document::Dependencies),
        (args.installed, Document::Installed),
        (args.buildsystem_files, Document::BuildsystemFiles),
        (args.machines, Document::Machines),
    ];
    flags
        .into_iter()
        .filter_map(|(selected, document)| selected.then_some(document))
        .collect()
}

/// Print introspection documents of a build directory or a source tree.
///
/// Build directories are read back from their stored documents. Source
/// trees are evaluated with default options into a scratch build
/// directory that is discarded afterwards.
fn handle_introspect(cli: &Cli, args: &IntrospectArgs, out: &mut dyn Write) -> Result<()> {
    let target = match &args.target {
        Some(path) => resolve_path(cli, path)?,
        None => working_dir(cli)?,
    };
    if args.ast {
        let file = build_file_of(&target);
        let src = std::fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;
        let tree = introspect::ast(&src, file.as_str())?;
        return output::emit_json(out, &tree, args.indent);
    }
    let documents = selected_documents(args);
    if documents.is_empty() {
        return Err(RunnerError::NothingSelected.into());
    }
    let rendered = if introspect::is_build_dir(&target) {
        debug!(build = %target, "reading stored introspection data");
        documents
            .iter()
            .map(|&document| -> Result<(Document, Json)> {
                Ok((document, introspect::read(&target, document)?))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        evaluate_documents(&target, &documents)?
    };
    let value = match rendered.as_slice() {
        [(_, single)] => single.clone(),
        _ => Json::Object(
            rendered
                .into_iter()
                .map(|(document, value)| (document.name().to_owned(), value))
                .collect(),
        ),
    };
    output::emit_json(out, &value, args.indent)
}

/// The build file a path refers to: itself, or `meson.build` inside it.
fn build_file_of(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_dir() {
        path.join(BUILD_FILE)
    } else {
        path.to_owned()
    }
}

fn evaluate_documents(target: &Utf8Path, documents: &[Document]) -> Result<Vec<(Document, Json)>> {
    let file = build_file_of(target);
    let source_dir = match file.parent() {
        Some(dir) if file.file_name() == Some(BUILD_FILE) && file.is_file() => canonical(dir)?,
        _ => return Err(RunnerError::NotIntrospectable(target.to_owned()).into()),
    };
    let scratch = tempfile::tempdir().context("creating scratch build directory")?;
    let build_dir = Utf8PathBuf::from_path_buf(scratch.path().to_path_buf())
        .map_err(RunnerError::NonUtf8Path)?;
    debug!(source = %source_dir, "evaluating source tree for introspection");
    let evaluation = Interpreter::new(Setup::new(source_dir, build_dir))?.run()?;
    documents
        .iter()
        .map(|&document| -> Result<(Document, Json)> {
            let value = document
                .render(&evaluation)
                .with_context(|| format!("rendering {}", document.name()))?;
            Ok((document, value))
        })
        .collect()
}

/// Format the requested files and deliver the results.
fn handle_format(cli: &Cli, args: &FormatArgs, out: &mut dyn Write) -> Result<Outcome> {
    let inputs = if args.files.is_empty() {
        vec![working_dir(cli)?]
    } else {
        args.files
            .iter()
            .map(|file| resolve_path(cli, file))
            .collect::<Result<Vec<_>>>()?
    };
    let files = format::collect_files(&inputs, args.recursive)?;
    if args.output.is_some() && files.len() != 1 {
        return Err(RunnerError::OutputNeedsSingleFile.into());
    }
    let configuration = args
        .configuration
        .as_deref()
        .map(|path| resolve_path(cli, path))
        .transpose()?;
    let settings = Settings::load(configuration.as_deref(), args.editorconfig)?;
    let mut outcome = Outcome::Success;
    for file in &files {
        let formatted = format::format_file(file, &settings)?;
        outcome = outcome.max(deliver(cli, args, &formatted, out)?);
    }
    Ok(outcome)
}

fn deliver(
    cli: &Cli,
    args: &FormatArgs,
    result: &Formatted,
    out: &mut dyn Write,
) -> Result<Outcome> {
    if args.check_only {
        if result.changed() {
            info!("File {} would be reformatted", result.path);
            return Ok(Outcome::WouldChange);
        }
        return Ok(Outcome::Success);
    }
    match &args.output {
        Some(path) if output::is_stdout_path(path) => output::emit(out, &result.formatted)?,
        Some(path) => output::write_file(&resolve_path(cli, path)?, &result.formatted)?,
        None if args.inplace => {
            if result.changed() {
                output::write_file(&result.path, &result.formatted)?;
            } else {
                debug!(path = %result.path, "already formatted");
            }
        }
        None => output::emit(out, &result.formatted)?,
    }
    Ok(Outcome::Success)
}

/// Inspect the wraps below `--sourcedir`.
fn handle_wrap(cli: &Cli, args: &WrapArgs, out: &mut dyn Write) -> Result<()> {
    let source_dir = resolve_path(cli, &args.sourcedir)?;
    let resolver = Resolver::load(&source_dir, SUBPROJECT_DIR)
        .with_context(|| format!("reading wraps in {source_dir}/{SUBPROJECT_DIR}"))?;
    match &args.command {
        WrapCommand::List => {
            let mut listing = String::new();
            for package in resolver.packages().filter(|p| p.filename.is_some()) {
                listing.push_str(&package.name);
                listing.push('\n');
            }
            output::emit(out, &listing)
        }
        WrapCommand::Info { name } => {
            let package = known_wrap(&resolver, name)?;
            let value = serde_json::to_value(package).context("serialising wrap")?;
            output::emit_json(out, &value, true)
        }
        WrapCommand::Verify { name } => {
            known_wrap(&resolver, name)?;
            let checked = resolver.verify(name)?;
            if checked.is_empty() {
                info!("No cached files to verify for {name}");
            }
            let mut report = String::new();
            for check in &checked {
                report.push_str(&format!("{} hash OK: {}\n", check.what, check.file));
            }
            output::emit(out, &report)
        }
    }
}

fn known_wrap<'a>(
    resolver: &'a Resolver,
    name: &str,
) -> Result<&'a crate::wrap::PackageDefinition> {
    resolver
        .get(name)
        .filter(|package| package.filename.is_some())
        .ok_or_else(|| RunnerError::UnknownWrap(name.to_owned()).into())
}

#[cfg(test)]
mod tests;
