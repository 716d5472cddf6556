//! Target, test and install declarations.

use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::{debug, warn};

use super::args::Args;
use super::dependencies::dependency_names;
use super::error::{InterpreterError, fail};
use super::functions::env_from;
use super::value::{FileRef, Value};
use super::{Interpreter, Result};
use crate::hasher::target_id;
use crate::model::{InstallEntry, RESERVED_TARGET_NAMES, Target, TargetKind, TestDef};

/// Languages whose `<lang>_args` keywords are recorded on targets.
const LANGUAGES: [&str; 15] = [
    "c", "cpp", "objc", "objcpp", "fortran", "d", "rust", "vala", "cs", "java", "cuda", "nasm",
    "masm", "cython", "swift",
];

/// Keywords of build targets that do not affect the recorded description.
const IGNORED_TARGET_KWARGS: [&str; 30] = [
    "link_args",
    "link_depends",
    "extra_files",
    "override_options",
    "gnu_symbol_visibility",
    "pic",
    "pie",
    "implicit_include_directories",
    "install_rpath",
    "build_rpath",
    "install_mode",
    "win_subsystem",
    "native",
    "objects",
    "vs_module_defs",
    "export_dynamic",
    "darwin_versions",
    "rust_crate_type",
    "rust_dependency_map",
    "d_import_dirs",
    "d_module_versions",
    "d_debug",
    "d_unittest",
    "vala_header",
    "vala_vapi",
    "vala_gir",
    "main_class",
    "java_resources",
    "gui_app",
    "prelink",
];

const TEST_PROTOCOLS: [&str; 4] = ["exitcode", "tap", "gtest", "rust"];

/// Which targets a build-target call creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Single(TargetKind),
    Both,
}

impl Interpreter {
    fn flavour(&self, args: &mut Args) -> Result<Flavour> {
        let library = |default_library: &str| match default_library {
            "static" => Flavour::Single(TargetKind::StaticLibrary),
            "both" => Flavour::Both,
            _ => Flavour::Single(TargetKind::SharedLibrary),
        };
        Ok(match args.name.as_str() {
            "executable" => Flavour::Single(TargetKind::Executable),
            "static_library" => Flavour::Single(TargetKind::StaticLibrary),
            "shared_library" => Flavour::Single(TargetKind::SharedLibrary),
            "shared_module" => Flavour::Single(TargetKind::SharedModule),
            "both_libraries" => Flavour::Both,
            "library" => library(&self.option_string("default_library")),
            _ => {
                let Some(kind) = args.str("target_type")? else {
                    return fail("build_target missing required keyword argument \"target_type\"");
                };
                match kind.as_str() {
                    "executable" => Flavour::Single(TargetKind::Executable),
                    "static_library" => Flavour::Single(TargetKind::StaticLibrary),
                    "shared_library" => Flavour::Single(TargetKind::SharedLibrary),
                    "shared_module" => Flavour::Single(TargetKind::SharedModule),
                    "both_libraries" => Flavour::Both,
                    "library" => library(&self.option_string("default_library")),
                    other => {
                        return fail(format!("Unknown target_type {other:?}"));
                    }
                }
            }
        })
    }

    pub(super) fn func_build_target(&mut self, mut args: Args) -> Result<Value> {
        let flavour = self.flavour(&mut args)?;
        args.flatten();
        args.expect_count(1, usize::MAX)?;
        let name = args.str_at(0)?;
        let mut source_values: Vec<Value> = args.positional.iter().skip(1).cloned().collect();
        source_values.extend(args.list("sources"));
        let sources = self.target_sources(source_values)?;
        let install = args.bool("install", false)?;
        let install_dir = args.str_list("install_dir")?.into_iter().next();
        let build_by_default = args.bool("build_by_default", true)?;
        let mut link_with = Vec::new();
        for value in args
            .list("link_with")
            .into_iter()
            .chain(args.list("link_whole"))
        {
            link_with.push(Self::link_target_id(&value)?);
        }
        let dependencies = dependency_names(args.list("dependencies"))?;
        let include_dirs = args.list("include_directories");
        for value in &include_dirs {
            if !matches!(value, Value::IncludeDirs(_) | Value::Str(_)) {
                return fail(format!(
                    "include_directories must be strings or include_directories objects, not {}",
                    value.type_name()
                ));
            }
        }
        let version = args.str("version")?;
        let soversion = match args.take("soversion") {
            None => None,
            Some(Value::Str(s)) => Some(s),
            Some(Value::Int(i)) => Some(i.to_string()),
            Some(other) => {
                return fail(format!(
                    "{} keyword argument \"soversion\" was of type {} but should have been str | int",
                    args.name,
                    other.type_name()
                ));
            }
        };
        let name_prefix = args.str("name_prefix")?;
        let name_suffix = args.str("name_suffix")?;
        let install_tag = args.str("install_tag")?;
        let mut lang_args = IndexMap::new();
        for lang in LANGUAGES {
            let values = args.str_list(&format!("{lang}_args"))?;
            if !values.is_empty() {
                lang_args.insert(lang.to_owned(), values);
            }
        }
        args.ignore(&IGNORED_TARGET_KWARGS);
        args.finish()?;

        let naming = Naming {
            version: version.as_deref(),
            soversion: soversion.as_deref(),
            prefix: name_prefix.as_deref(),
            suffix: name_suffix.as_deref(),
        };
        let mut make = |kind: TargetKind| -> Result<Rc<Target>> {
            let output = self.output_name(&name, kind, &naming);
            let mut target = self.new_target(&name, kind, vec![output]);
            target.sources.clone_from(&sources);
            target.build_by_default = build_by_default;
            target.link_with.clone_from(&link_with);
            target.dependencies.clone_from(&dependencies);
            target.args.clone_from(&lang_args);
            if install {
                let dir = install_dir.clone().unwrap_or_else(|| {
                    let key = if kind == TargetKind::Executable { "bindir" } else { "libdir" };
                    self.option_string(key)
                });
                self.install_outputs(&mut target, &[dir], install_tag.as_deref());
            }
            self.add_target(target)
        };
        match flavour {
            Flavour::Single(kind) => make(kind).map(Value::Target),
            Flavour::Both => {
                let static_lib = make(TargetKind::StaticLibrary)?;
                let shared = make(TargetKind::SharedLibrary)?;
                Ok(Value::BothLibraries { shared, static_lib })
            }
        }
    }

    fn target_sources(&self, values: Vec<Value>) -> Result<Vec<Utf8PathBuf>> {
        let mut sources = Vec::new();
        for value in Value::flatten(values) {
            match value {
                Value::Target(target) if !target.kind.is_build_target() => {
                    sources.extend(target.filename.iter().cloned());
                }
                Value::Str(_) | Value::File(_) => {
                    let file = self.source_file(value, "sources")?;
                    sources.push(file.absolute(&self.source_root, &self.build_root));
                }
                other => {
                    return fail(format!(
                        "sources must be strings, files or custom targets, not {}",
                        other.type_name()
                    ));
                }
            }
        }
        Ok(sources)
    }

    /// File name of a build target's output on the host machine.
    fn output_name(&self, name: &str, kind: TargetKind, naming: &Naming<'_>) -> String {
        let host = &self.machines.host;
        let base = Utf8Path::new(name)
            .file_name()
            .unwrap_or(name)
            .to_owned();
        let (prefix, suffix) = match kind {
            TargetKind::Executable => {
                let suffix = if host.is_windows() || host.is_cygwin() { "exe" } else { "" };
                ("", suffix.to_owned())
            }
            TargetKind::StaticLibrary => ("lib", "a".to_owned()),
            TargetKind::SharedLibrary | TargetKind::SharedModule => {
                if host.is_windows() {
                    ("", "dll".to_owned())
                } else if host.is_cygwin() {
                    ("cyg", "dll".to_owned())
                } else if host.is_darwin() && kind == TargetKind::SharedLibrary {
                    ("lib", "dylib".to_owned())
                } else {
                    ("lib", "so".to_owned())
                }
            }
            TargetKind::Custom | TargetKind::Run | TargetKind::Alias => ("", String::new()),
        };
        let prefix = naming.prefix.unwrap_or(prefix);
        let suffix = naming.suffix.map_or(suffix, str::to_owned);
        let mut out = format!("{prefix}{base}");
        if !suffix.is_empty() {
            out.push('.');
            out.push_str(&suffix);
        }
        let versioned = kind == TargetKind::SharedLibrary
            && naming.suffix.is_none()
            && !host.is_windows()
            && !host.is_cygwin()
            && !host.is_darwin();
        if versioned {
            if let Some(v) = naming.version.or(naming.soversion) {
                out.push('.');
                out.push_str(v);
            }
        }
        out
    }

    /// A target in the current directory with outputs in the build tree.
    fn new_target(&self, name: &str, kind: TargetKind, outputs: Vec<String>) -> Target {
        let subdir = self.subdir().to_path_buf();
        let build_dir = self.current_build_dir();
        Target {
            name: name.to_owned(),
            id: target_id(subdir.as_str(), &name.replace('/', "@"), kind.id_suffix()),
            kind,
            defined_in: self.current_source_dir().join("meson.build"),
            subproject: self.is_subproject().then(|| self.frame.subproject.clone()),
            filename: outputs.iter().map(|o| build_dir.join(o)).collect(),
            subdir,
            sources: Vec::new(),
            build_by_default: true,
            installed: false,
            install_filename: Vec::new(),
            link_with: Vec::new(),
            dependencies: Vec::new(),
            depends: Vec::new(),
            command: Vec::new(),
            args: IndexMap::new(),
        }
    }

    /// Mark a target's outputs as installed under `dirs`.
    fn install_outputs(&mut self, target: &mut Target, dirs: &[String], tag: Option<&str>) {
        target.installed = true;
        for (idx, output) in target.filename.iter().enumerate() {
            let Some(dir) = dirs.get(idx).or_else(|| dirs.first()) else {
                continue;
            };
            let Some(file_name) = output.file_name() else {
                continue;
            };
            let destination = self.install_path(dir).join(file_name);
            target.install_filename.push(destination.clone());
            self.description.install.push(InstallEntry {
                kind: "target".to_owned(),
                source: output.clone(),
                destination,
                tag: tag.map(str::to_owned),
            });
        }
    }

    fn add_target(&mut self, target: Target) -> Result<Rc<Target>> {
        if target.name.is_empty() {
            return fail("Target name must not be empty");
        }
        if RESERVED_TARGET_NAMES.contains(&target.name.as_str())
            || target.name.starts_with("meson-")
        {
            return fail(format!(
                "Target name '{}' is reserved for Meson's internal use. Please rename.",
                target.name
            ));
        }
        if self.description.target(&target.id).is_some() {
            return fail(format!(
                "Tried to create target \"{}\", but a target of that name already exists.",
                target.name
            ));
        }
        debug!(id = %target.id, kind = target.kind.type_name(), "declared target");
        let target = Rc::new(target);
        self.description.targets.push((*target).clone());
        Ok(target)
    }

    pub(super) fn func_custom_target(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(0, 1)?;
        let explicit_name = args.opt_str_at(0)?;
        let inputs = self.target_inputs(args.list("input"))?;
        let outputs = args.str_list("output")?;
        if outputs.is_empty() {
            return fail("custom_target missing required keyword argument \"output\"");
        }
        let command = args.list("command");
        if command.is_empty() {
            return fail("custom_target missing required keyword argument \"command\"");
        }
        let capture = args.bool("capture", false)?;
        let feed = args.bool("feed", false)?;
        let install = args.bool("install", false)?;
        let install_dir = args.str_list("install_dir")?;
        let install_tag = args.str("install_tag")?;
        let build_by_default = args.bool("build_by_default", install)?;
        let depends = self.target_ids(args.list("depends"))?;
        let depfile = args.str("depfile")?;
        args.ignore(&[
            "depend_files",
            "env",
            "build_always_stale",
            "build_always",
            "console",
            "install_mode",
        ]);
        args.finish()?;

        if install && install_dir.is_empty() {
            return fail("custom_target: \"install_dir\" keyword argument must be set when \"install\" is true.");
        }
        if feed && inputs.len() != 1 {
            return fail("custom_target: \"feed\" keyword argument can only be used with a single input");
        }
        let outputs = outputs
            .into_iter()
            .map(|o| expand_output(&o, &inputs))
            .collect::<Result<Vec<_>>>()?;
        for output in &outputs {
            if output.contains(['/', '\\']) {
                return fail(format!("Output {output:?} must not contain a path segment."));
            }
        }
        if capture && outputs.len() != 1 {
            return fail("custom_target: \"capture\" keyword argument can only be used with a single output");
        }
        let Some(name) = explicit_name.or_else(|| outputs.first().cloned()) else {
            return fail("custom_target: no name given and no outputs to derive one from");
        };
        let mut target = self.new_target(&name, TargetKind::Custom, outputs);
        let mut words = Vec::new();
        for value in &command {
            words.extend(self.command_words(value)?);
        }
        let subs = Substitutions {
            inputs: inputs.iter().map(|p| p.to_string()).collect(),
            outputs: target.filename.iter().map(|p| p.to_string()).collect(),
            fixed: self.fixed_substitutions(&target, &inputs, depfile.as_deref()),
        };
        target.command = substitute_command(words, &subs)?;
        target.sources = inputs;
        target.build_by_default = build_by_default;
        target.depends = depends;
        if install {
            self.install_outputs(&mut target, &install_dir, install_tag.as_deref());
        }
        self.add_target(target).map(Value::Target)
    }

    fn target_inputs(&self, values: Vec<Value>) -> Result<Vec<Utf8PathBuf>> {
        let mut inputs = Vec::new();
        for value in values {
            match value {
                Value::Target(target) => inputs.extend(target.filename.iter().cloned()),
                Value::BothLibraries { shared, .. } => {
                    inputs.extend(shared.filename.iter().cloned());
                }
                Value::Str(_) | Value::File(_) => {
                    let file = self.source_file(value, "input")?;
                    inputs.push(file.absolute(&self.source_root, &self.build_root));
                }
                other => {
                    return fail(format!(
                        "input must contain strings, files or targets, not {}",
                        other.type_name()
                    ));
                }
            }
        }
        Ok(inputs)
    }

    fn target_ids(&self, values: Vec<Value>) -> Result<Vec<String>> {
        values
            .into_iter()
            .map(|value| match value {
                Value::Target(target) => Ok(target.id.clone()),
                Value::BothLibraries { shared, .. } => Ok(shared.id.clone()),
                other => fail(format!(
                    "depends must contain targets, not {}",
                    other.type_name()
                )),
            })
            .collect()
    }

    /// Command words contributed by one element of a `command:` list.
    pub(super) fn command_words(&self, value: &Value) -> Result<Vec<String>> {
        match value {
            Value::Program(program) if program.found() => Ok(program.command.clone()),
            other => self.command_word(other).map(|w| vec![w]),
        }
    }

    fn fixed_substitutions(
        &self,
        target: &Target,
        inputs: &[Utf8PathBuf],
        depfile: Option<&str>,
    ) -> Vec<(String, String)> {
        let outdir = self.current_build_dir();
        let mut fixed = vec![
            ("@OUTDIR@".to_owned(), outdir.to_string()),
            ("@SOURCE_ROOT@".to_owned(), self.source_root.to_string()),
            ("@BUILD_ROOT@".to_owned(), self.build_root.to_string()),
            (
                "@CURRENT_SOURCE_DIR@".to_owned(),
                self.current_source_dir().to_string(),
            ),
            (
                "@PRIVATE_DIR@".to_owned(),
                outdir.join(format!("{}.p", target.id)).to_string(),
            ),
        ];
        if let Some(depfile) = depfile {
            fixed.push(("@DEPFILE@".to_owned(), outdir.join(depfile).to_string()));
        }
        if let [only] = inputs {
            if let Some(name) = only.file_name() {
                fixed.push(("@PLAINNAME@".to_owned(), name.to_owned()));
            }
            if let Some(stem) = only.file_stem() {
                fixed.push(("@BASENAME@".to_owned(), stem.to_owned()));
            }
        }
        fixed
    }

    pub(super) fn func_run_target(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        let command = args.list("command");
        if command.is_empty() {
            return fail("run_target missing required keyword argument \"command\"");
        }
        let depends = self.target_ids(args.list("depends"))?;
        args.ignore(&["env"]);
        args.finish()?;
        let mut words = Vec::new();
        for value in &command {
            words.extend(self.command_words(value)?);
        }
        let mut target = self.new_target(&name, TargetKind::Run, Vec::new());
        target.command = words;
        target.depends = depends;
        target.build_by_default = false;
        self.add_target(target).map(Value::Target)
    }

    pub(super) fn func_alias_target(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        args.expect_count(2, usize::MAX)?;
        let name = args.str_at(0)?;
        args.finish()?;
        let depends = self.target_ids(args.positional.split_off(1))?;
        let mut target = self.new_target(&name, TargetKind::Alias, Vec::new());
        target.depends = depends;
        target.build_by_default = false;
        self.add_target(target).map(Value::Target)
    }

    pub(super) fn func_test(&mut self, mut args: Args) -> Result<Value> {
        let is_benchmark = args.name == "benchmark";
        args.expect_count(2, 2)?;
        let mut name = args.str_at(0)?;
        if name.contains(':') {
            warn!("test name {name:?} contains a ':' character, replaced with '_'");
            name = name.replace(':', "_");
        }
        let exe = args.at(1)?.clone();
        let mut depends = Vec::new();
        let mut cmd = match &exe {
            Value::Target(target) if target.kind == TargetKind::Executable || !target.kind.is_build_target() => {
                depends.push(target.id.clone());
                target.filename.iter().take(1).map(|p| p.to_string()).collect()
            }
            Value::Program(_) | Value::File(_) | Value::Str(_) => self.command_words(&exe)?,
            other => {
                return fail(format!(
                    "{} argument 2 was of type \"{}\" but should have been \"exe | file | external_program | custom_tgt\"",
                    args.name,
                    other.type_name()
                ));
            }
        };
        for value in args.list("args") {
            cmd.push(self.command_word(&value)?);
        }
        let env = env_from(args.take("env"))?;
        let should_fail = args.bool("should_fail", false)?;
        let timeout = args.int("timeout", 30)?;
        let workdir = args.str("workdir")?;
        if workdir.as_deref().is_some_and(|w| !Utf8Path::new(w).is_absolute()) {
            return fail("workdir keyword argument must be an absolute path");
        }
        let suites = args.str_list("suite")?;
        let priority = args.int("priority", 0)?;
        let is_parallel = args.bool("is_parallel", !is_benchmark)?;
        let protocol = args.str("protocol")?.unwrap_or_else(|| "exitcode".to_owned());
        if !TEST_PROTOCOLS.contains(&protocol.as_str()) {
            return fail(format!(
                "{} keyword argument \"protocol\" must be one of {}, not {protocol}",
                args.name,
                TEST_PROTOCOLS.join(", ")
            ));
        }
        depends.extend(self.target_ids(args.list("depends"))?);
        args.ignore(&["verbose"]);
        args.finish()?;

        let prj = if self.is_subproject() {
            self.frame.subproject.clone()
        } else {
            self.project()?.name.clone()
        };
        let suite = if suites.is_empty() {
            vec![prj]
        } else {
            suites.iter().map(|s| format!("{prj}:{s}")).collect()
        };
        let def = TestDef {
            name,
            suite,
            cmd,
            env,
            timeout,
            workdir,
            is_parallel,
            priority,
            protocol,
            should_fail,
            depends,
        };
        if is_benchmark {
            self.description.benchmarks.push(def);
        } else {
            self.description.tests.push(def);
        }
        Ok(Value::Void)
    }

    fn install_files(&mut self, kind: &str, files: Vec<FileRef>, dest: &Utf8Path, tag: Option<String>) {
        for file in files {
            let source = file.absolute(&self.source_root, &self.build_root);
            let name = Utf8Path::new(&file.name)
                .file_name()
                .unwrap_or(&file.name)
                .to_owned();
            self.description.install.push(InstallEntry {
                kind: kind.to_owned(),
                source,
                destination: dest.join(name),
                tag: tag.clone(),
            });
        }
    }

    fn file_args(&self, values: Vec<Value>, fname: &str) -> Result<Vec<FileRef>> {
        Value::flatten(values)
            .into_iter()
            .map(|v| self.source_file(v, fname))
            .collect()
    }

    pub(super) fn func_install_headers(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        let files = self.file_args(std::mem::take(&mut args.positional), "install_headers")?;
        let subdir = args.str("subdir")?;
        let install_dir = args.str("install_dir")?;
        let preserve_path = args.bool("preserve_path", false)?;
        args.ignore(&["install_mode", "follow_symlinks"]);
        args.finish()?;
        if subdir.is_some() && install_dir.is_some() {
            return fail("install_headers: cannot specify both \"install_dir\" and \"subdir\". Use only \"install_dir\".");
        }
        let base = install_dir.unwrap_or_else(|| {
            let include = self.option_string("includedir");
            subdir.map_or_else(|| include.clone(), |s| format!("{include}/{s}"))
        });
        let dest = self.install_path(&base);
        if preserve_path {
            for file in files {
                let parent = Utf8Path::new(&file.name)
                    .parent()
                    .unwrap_or(Utf8Path::new(""))
                    .to_path_buf();
                self.install_files("headers", vec![file], &dest.join(parent), None);
            }
        } else {
            self.install_files("headers", files, &dest, None);
        }
        Ok(Value::Void)
    }

    pub(super) fn func_install_data(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        let mut values = std::mem::take(&mut args.positional);
        values.extend(args.list("sources"));
        let files = self.file_args(values, "install_data")?;
        let install_dir = args.str("install_dir")?;
        let rename = args.str_list("rename")?;
        let tag = args.str("install_tag")?;
        args.ignore(&["install_mode", "preserve_path", "follow_symlinks"]);
        args.finish()?;
        let base = match install_dir {
            Some(dir) => dir,
            None => format!("{}/{}", self.option_string("datadir"), self.project()?.name),
        };
        let dest = self.install_path(&base);
        if rename.is_empty() {
            self.install_files("data", files, &dest, tag);
            return Ok(Value::Void);
        }
        if rename.len() != files.len() {
            return fail(format!(
                "\"rename\" and \"sources\" argument lists must be the same length if \"rename\" is given. Rename has {} elements and sources has {}.",
                rename.len(),
                files.len()
            ));
        }
        for (file, new_name) in files.into_iter().zip(rename) {
            self.description.install.push(InstallEntry {
                kind: "data".to_owned(),
                source: file.absolute(&self.source_root, &self.build_root),
                destination: dest.join(new_name),
                tag: tag.clone(),
            });
        }
        Ok(Value::Void)
    }

    pub(super) fn func_install_subdir(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let dir = args.str_at(0)?;
        let Some(install_dir) = args.str("install_dir")? else {
            return fail("install_subdir missing required keyword argument \"install_dir\"");
        };
        let strip_directory = args.bool("strip_directory", false)?;
        let tag = args.str("install_tag")?;
        args.ignore(&["exclude_files", "exclude_directories", "install_mode", "follow_symlinks"]);
        args.finish()?;
        let source = self.current_source_dir().join(&dir);
        if !source.is_dir() {
            warn!("install_subdir: directory {source} does not exist");
        }
        let base = self.install_path(&install_dir);
        let destination = if strip_directory {
            base
        } else {
            let last = Utf8Path::new(&dir).file_name().unwrap_or(&dir).to_owned();
            base.join(last)
        };
        self.description.install.push(InstallEntry {
            kind: "subdir".to_owned(),
            source,
            destination,
            tag,
        });
        Ok(Value::Void)
    }

    pub(super) fn func_install_man(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        let files = self.file_args(std::mem::take(&mut args.positional), "install_man")?;
        let locale = args.str("locale")?;
        let install_dir = args.str("install_dir")?;
        args.ignore(&["install_mode"]);
        args.finish()?;
        let mandir = install_dir.unwrap_or_else(|| self.option_string("mandir"));
        for file in files {
            let section = Utf8Path::new(&file.name)
                .extension()
                .and_then(|ext| ext.parse::<u8>().ok())
                .filter(|n| (1..=9).contains(n))
                .ok_or_else(|| {
                    InterpreterError::msg(format!(
                        "Man file must have a file extension of a number between 1 and 9: {}",
                        file.name
                    ))
                })?;
            let mut dest = self.install_path(&mandir);
            if let Some(locale) = &locale {
                dest = dest.join(locale);
            }
            let dest = dest.join(format!("man{section}"));
            self.install_files("man", vec![file], &dest, None);
        }
        Ok(Value::Void)
    }

    pub(super) fn func_install_symlink(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        let Some(pointing_to) = args.str("pointing_to")? else {
            return fail("install_symlink missing required keyword argument \"pointing_to\"");
        };
        let Some(install_dir) = args.str("install_dir")? else {
            return fail("install_symlink missing required keyword argument \"install_dir\"");
        };
        let tag = args.str("install_tag")?;
        args.finish()?;
        if name.contains('/') {
            return fail(format!("Link name is \"{name}\", but link names cannot contain path separators. The dir part should be in install_dir."));
        }
        self.description.install.push(InstallEntry {
            kind: "symlink".to_owned(),
            source: Utf8PathBuf::from(pointing_to),
            destination: self.install_path(&install_dir).join(name),
            tag,
        });
        Ok(Value::Void)
    }
}

/// Overrides for output file naming.
struct Naming<'a> {
    version: Option<&'a str>,
    soversion: Option<&'a str>,
    prefix: Option<&'a str>,
    suffix: Option<&'a str>,
}

struct Substitutions {
    inputs: Vec<String>,
    outputs: Vec<String>,
    fixed: Vec<(String, String)>,
}

/// Apply `@PLAINNAME@` and `@BASENAME@` to an output name.
fn expand_output(output: &str, inputs: &[Utf8PathBuf]) -> Result<String> {
    if !output.contains("@PLAINNAME@") && !output.contains("@BASENAME@") {
        return Ok(output.to_owned());
    }
    let [only] = inputs else {
        return fail(
            "Output cannot contain @PLAINNAME@ or @BASENAME@ when there is more than one input (we can't know which to use)",
        );
    };
    let plain = only.file_name().unwrap_or_default();
    let base = only.file_stem().unwrap_or_default();
    Ok(output
        .replace("@PLAINNAME@", plain)
        .replace("@BASENAME@", base))
}

/// Expand `@INPUT@`, `@OUTPUT@` and related placeholders in a command.
fn substitute_command(words: Vec<String>, subs: &Substitutions) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(words.len());
    for word in words {
        match word.as_str() {
            "@INPUT@" => {
                out.extend(subs.inputs.iter().cloned());
                continue;
            }
            "@OUTPUT@" => {
                out.extend(subs.outputs.iter().cloned());
                continue;
            }
            _ => {}
        }
        let mut word = word;
        for (placeholder, values, what) in [
            ("@INPUT@", &subs.inputs, "input"),
            ("@OUTPUT@", &subs.outputs, "output"),
        ] {
            if word.contains(placeholder) {
                let [only] = values.as_slice() else {
                    return fail(format!(
                        "Command has '{placeholder}' as part of a string and more than one {what} file"
                    ));
                };
                word = word.replace(placeholder, only);
            }
        }
        for (idx, value) in subs.inputs.iter().enumerate() {
            word = word.replace(&format!("@INPUT{idx}@"), value);
        }
        for (idx, value) in subs.outputs.iter().enumerate() {
            word = word.replace(&format!("@OUTPUT{idx}@"), value);
        }
        for (placeholder, value) in &subs.fixed {
            word = word.replace(placeholder, value);
        }
        for (prefix, values) in [("@INPUT", &subs.inputs), ("@OUTPUT", &subs.outputs)] {
            if let Some((_, rest)) = word.split_once(prefix) {
                if rest.starts_with(|c: char| c.is_ascii_digit()) {
                    return fail(format!(
                        "Command cannot have '{prefix}N@', since there are only {} {} files",
                        values.len(),
                        prefix.trim_start_matches('@').to_lowercase()
                    ));
                }
            }
        }
        out.push(word);
    }
    Ok(out)
}
