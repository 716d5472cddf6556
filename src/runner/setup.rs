//! `setup` and `configure`: the persisted configuration of a build
//! directory.
//!
//! A configured build directory holds `meson-private/coredata.json`, which
//! records the directories, option assignments and machine files it was
//! configured with, and the introspection documents of the last successful
//! evaluation. Nothing is written when evaluation fails.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, info};

use super::{RunnerError, output};
use super::path_helpers::{resolve_path, resolve_setup_dirs, working_dir};
use crate::cli::{Cli, ConfigureArgs, SetupArgs};
use crate::interpreter::{Evaluation, Interpreter, Setup};
use crate::introspect::{self, Document};
use crate::machine_file::{self, MachineFiles};
use crate::model::BuildDescription;
use crate::options::split_assignment;

/// Directory below the build directory holding private state.
pub(super) const PRIVATE_DIR: &str = "meson-private";

const COREDATA_FILE: &str = "coredata.json";

/// Version stamped into stored configurations.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Option sections in display order with their headings.
const SECTIONS: [(&str, &str); 5] = [
    ("core", "Core options"),
    ("directory", "Directories"),
    ("base", "Base options"),
    ("compiler", "Compiler options"),
    ("user", "Project options"),
];

/// Stored configuration of one build directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct CoreData {
    /// Program version that wrote the file.
    pub version: String,
    /// Canonical source directory.
    pub source_dir: Utf8PathBuf,
    /// Build directory.
    pub build_dir: Utf8PathBuf,
    /// `-D` assignments in the order they were first given.
    pub options: IndexMap<String, String>,
    /// Native machine files.
    pub native_files: Vec<Utf8PathBuf>,
    /// Cross machine files.
    pub cross_files: Vec<Utf8PathBuf>,
}

impl CoreData {
    fn new(source_dir: Utf8PathBuf, build_dir: Utf8PathBuf) -> Self {
        Self {
            version: VERSION.to_owned(),
            source_dir,
            build_dir,
            options: IndexMap::new(),
            native_files: Vec::new(),
            cross_files: Vec::new(),
        }
    }

    pub(super) fn path(build_dir: &Utf8Path) -> Utf8PathBuf {
        build_dir.join(PRIVATE_DIR).join(COREDATA_FILE)
    }

    /// Read the configuration stored in `build_dir`.
    pub(super) fn load(build_dir: &Utf8Path) -> Result<Self> {
        let core = Self::read(build_dir)?;
        if core.version != VERSION {
            return Err(RunnerError::VersionMismatch {
                path: build_dir.to_owned(),
                found: core.version,
                expected: VERSION.to_owned(),
            }
            .into());
        }
        Ok(core)
    }

    fn read(build_dir: &Utf8Path) -> Result<Self> {
        let path = Self::path(build_dir);
        if !path.is_file() {
            return Err(RunnerError::NotConfigured(build_dir.to_owned()).into());
        }
        let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {path}"))
    }

    fn store(&self) -> Result<()> {
        let path = Self::path(&self.build_dir);
        introspect::write_json(&path, self).with_context(|| format!("writing {path}"))
    }

    /// Record a `key=value` assignment, replacing an earlier value.
    fn define(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = split_assignment(assignment)?;
        self.options.insert(key, value);
        Ok(())
    }
}

/// Configure a new build directory, or reconfigure an existing one.
///
/// # Errors
///
/// Returns an error when the directories are unusable, an option is
/// malformed, or evaluating the project fails.
pub(super) fn setup(cli: &Cli, args: &SetupArgs) -> Result<()> {
    let (source_dir, build_dir) =
        resolve_setup_dirs(cli, args.builddir.as_deref(), args.sourcedir.as_deref())?;
    let previous = if CoreData::path(&build_dir).is_file() {
        if !args.reconfigure && !args.wipe {
            return Err(RunnerError::AlreadyConfigured(build_dir).into());
        }
        // A wipe starts over anyway, so an unreadable configuration only
        // loses the remembered options.
        if args.wipe {
            CoreData::read(&build_dir).ok()
        } else {
            Some(CoreData::load(&build_dir)?)
        }
    } else {
        None
    };
    if args.wipe && build_dir.is_dir() {
        wipe(&build_dir)?;
    }
    let mut core =
        previous.unwrap_or_else(|| CoreData::new(source_dir.clone(), build_dir.clone()));
    core.version = VERSION.to_owned();
    core.source_dir = source_dir;
    core.build_dir = build_dir;
    if !args.native_file.is_empty() {
        core.native_files = resolve_machine_files(cli, &args.native_file, "native")?;
    }
    if !args.cross_file.is_empty() {
        core.cross_files = resolve_machine_files(cli, &args.cross_file, "cross")?;
    }
    for define in &args.defines {
        core.define(define)?;
    }
    if let Some(prefix) = &args.prefix {
        core.options.insert("prefix".to_owned(), prefix.clone());
    }
    if let Some(buildtype) = &args.buildtype {
        core.options.insert("buildtype".to_owned(), buildtype.clone());
    }
    configure_project(&core)?;
    Ok(())
}

/// Print the options of a build directory, or change them and re-run
/// the configuration.
///
/// # Errors
///
/// Returns an error when the directory is not configured or the new
/// configuration fails; the stored configuration is left untouched then.
pub(super) fn configure(cli: &Cli, args: &ConfigureArgs, out: &mut dyn Write) -> Result<()> {
    let build_dir = match &args.builddir {
        Some(dir) => resolve_path(cli, dir)?,
        None => working_dir(cli)?,
    };
    let mut core = CoreData::load(&build_dir)?;
    if args.defines.is_empty() && !args.clearcache {
        let options = introspect::read(&core.build_dir, Document::BuildOptions)?;
        return output::emit(out, &options_table(&options));
    }
    if args.clearcache {
        debug!(build = %core.build_dir, "no lookup cache is kept; reconfiguring");
    }
    for define in &args.defines {
        core.define(define)?;
    }
    configure_project(&core)?;
    Ok(())
}

/// Evaluate the project described by `core` and persist the result.
pub(super) fn configure_project(core: &CoreData) -> Result<Evaluation> {
    let native = MachineFiles::load(&core.native_files).context("loading native files")?;
    let cross = MachineFiles::load(&core.cross_files).context("loading cross files")?;
    let mut options = IndexMap::new();
    for files in [&native, &cross] {
        options.extend(files.builtin_options.clone());
        options.extend(files.project_options.clone());
    }
    options.extend(core.options.clone());

    let mut setup = Setup::new(core.source_dir.clone(), core.build_dir.clone());
    setup.options = options;
    setup.native = native;
    setup.cross = cross;
    info!("Source dir: {}", core.source_dir);
    info!("Build dir: {}", core.build_dir);
    let evaluation = Interpreter::new(setup)?.run()?;

    evaluation
        .write_generated()
        .context("writing configured files")?;
    fs::create_dir_all(core.build_dir.join(PRIVATE_DIR))
        .with_context(|| format!("creating {}", core.build_dir))?;
    introspect::write_all(&evaluation, &core.source_dir, &core.build_dir)
        .context("writing introspection data")?;
    core.store()?;

    let description = &evaluation.description;
    info!("Build targets in project: {}", description.targets.len());
    let summary = summary_text(description);
    if !summary.is_empty() {
        info!("{}", summary.trim_end());
    }
    info!(
        "Project {} configured in {}",
        description.project.name, core.build_dir
    );
    Ok(evaluation)
}

/// Render the `summary()` sections of every project, subprojects first.
///
/// Keys are aligned per project; list values without a separator continue
/// on following lines under the first value.
pub(super) fn summary_text(description: &BuildDescription) -> String {
    let main = &description.project;
    let projects = description
        .subprojects
        .iter()
        .map(|sub| (sub.descriptive_name.as_str(), sub.version.as_str()))
        .chain([(main.name.as_str(), main.version.as_str())]);
    let mut out = String::new();
    for (name, version) in projects {
        let Some(sections) = description.summary.get(name) else {
            continue;
        };
        let width = sections
            .values()
            .flatten()
            .map(|entry| entry.key.chars().count())
            .max()
            .unwrap_or_default();
        let continuation = format!("\n{}", " ".repeat(width + 6));
        out.push_str(&format!("{name} {version}\n"));
        for (section, entries) in sections {
            out.push('\n');
            if !section.is_empty() {
                out.push_str(&format!("  {section}\n"));
            }
            for entry in entries {
                out.push_str(&format!("    {:<width$}:", entry.key));
                let value = entry
                    .values
                    .join(entry.list_sep.as_deref().unwrap_or(&continuation));
                if !value.is_empty() {
                    out.push(' ');
                    out.push_str(&value);
                }
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

/// Locate machine files relative to the working directory, falling back
/// to the XDG data directories.
fn resolve_machine_files(
    cli: &Cli,
    paths: &[PathBuf],
    kind: &'static str,
) -> Result<Vec<Utf8PathBuf>> {
    let cwd = working_dir(cli)?;
    paths
        .iter()
        .map(|path| -> Result<Utf8PathBuf> {
            let name = path
                .to_str()
                .ok_or_else(|| RunnerError::NonUtf8Path(path.clone()))?;
            Ok(machine_file::resolve(name, kind, &cwd)?)
        })
        .collect()
}

/// Remove everything inside `dir`, keeping the directory itself.
fn wipe(dir: &Utf8Path) -> Result<()> {
    debug!(%dir, "wiping build directory");
    for entry in fs::read_dir(dir).with_context(|| format!("reading {dir}"))? {
        let path = entry.with_context(|| format!("reading {dir}"))?.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("removing {}", path.display()))?;
    }
    Ok(())
}

/// Render `intro-buildoptions.json` records as aligned tables, one per
/// section.
pub(super) fn options_table(options: &Json) -> String {
    let records = options.as_array().map(Vec::as_slice).unwrap_or_default();
    let mut out = String::new();
    for (section, title) in SECTIONS {
        let rows: Vec<[String; 4]> = records
            .iter()
            .filter(|record| record.get("section").is_some_and(|s| s == section))
            .map(|record| {
                let text = |key: &str| {
                    record.get(key).and_then(Json::as_str).unwrap_or_default().to_owned()
                };
                [
                    text("name"),
                    display_value(record.get("value").unwrap_or(&Json::Null)),
                    possible_values(record),
                    text("description"),
                ]
            })
            .collect();
        if rows.is_empty() {
            continue;
        }
        let header = ["Option", "Current Value", "Possible Values", "Description"];
        let rule = header.map(|h| "-".repeat(h.len()));
        let mut widths = header.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        out.push_str(title);
        out.push_str(":\n\n");
        let header = header.map(str::to_owned);
        for row in [&header, &rule].into_iter().chain(&rows) {
            let line = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .join("  ");
            out.push_str("  ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

fn display_value(value: &Json) -> String {
    match value {
        Json::String(text) => text.clone(),
        Json::Array(items) => format!("[{}]", items.iter().map(display_value).join(", ")),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn possible_values(record: &Json) -> String {
    if let Some(choices) = record.get("choices") {
        return display_value(choices);
    }
    match (record.get("min"), record.get("max")) {
        (Some(min), Some(max)) if !min.is_null() || !max.is_null() => {
            let bound = |v: &Json| if v.is_null() { String::new() } else { v.to_string() };
            format!("{}-{}", bound(min), bound(max))
        }
        _ => String::new(),
    }
}
