//! Built-in functions that do not declare targets or dependencies.

use std::cell::RefCell;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::args::Args;
use super::error::{InterpreterError, fail};
use super::value::{
    EnvAction, EnvOp, Environment, FeatureOption, FileRef, IncludeDirs, Module, Range, Value,
};
use super::{COMPAT_VERSION, Interpreter, Result};
use crate::literal::join_path;
use crate::model::{ProjectInfo, SubprojectInfo, SummaryEntry, TestSetup};
use crate::options::{FeatureState, OptionValue, split_assignment};
use crate::version::version_compare;
use crate::wrap::Resolver;

/// Outcome of a `required:` keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Requirement {
    Required,
    Optional,
    /// Disabled through the named feature option.
    Disabled(String),
}

impl Requirement {
    pub(super) fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

impl Interpreter {
    pub(super) fn dispatch(&mut self, args: Args) -> Result<Value> {
        match args.name.as_str() {
            "project" => self.func_project(args),
            "message" => self.func_message(args),
            "warning" => self.func_warning(args),
            "error" => self.func_error(args),
            "debug" => self.func_debug(args),
            "assert" => func_assert(args),
            "summary" => self.func_summary(args),
            "get_option" => self.func_get_option(args),
            "set_variable" => self.func_set_variable(args),
            "get_variable" => self.func_get_variable(args),
            "is_variable" => self.func_is_variable(args),
            "unset_variable" => self.func_unset_variable(args),
            "files" => self.func_files(args),
            "join_paths" => func_join_paths(args),
            "include_directories" => self.func_include_directories(args),
            "environment" => func_environment(args),
            "range" => func_range(args),
            "disabler" => {
                args.no_positional()?;
                args.finish()?;
                Ok(Value::Disabler)
            }
            "is_disabler" => {
                args.expect_count(1, 1)?;
                let result = args.at(0)?.is_disabler();
                args.finish()?;
                Ok(Value::Bool(result))
            }
            "subdir" => self.func_subdir(args),
            "subproject" => self.func_subproject(args),
            "add_project_arguments" | "add_global_arguments" | "add_project_link_arguments"
            | "add_global_link_arguments" => self.func_add_arguments(args),
            "add_test_setup" => self.func_add_test_setup(args),
            "import" => self.func_import(args),
            "configuration_data" => self.func_configuration_data(args),
            "configure_file" => self.func_configure_file(args),
            "declare_dependency" => self.func_declare_dependency(args),
            "dependency" => self.func_dependency(args),
            "find_program" => self.func_find_program(args),
            "executable" | "library" | "static_library" | "shared_library" | "shared_module"
            | "both_libraries" | "build_target" => self.func_build_target(args),
            "custom_target" => self.func_custom_target(args),
            "run_target" => self.func_run_target(args),
            "alias_target" => self.func_alias_target(args),
            "test" | "benchmark" => self.func_test(args),
            "install_headers" => self.func_install_headers(args),
            "install_data" => self.func_install_data(args),
            "install_subdir" => self.func_install_subdir(args),
            "install_man" => self.func_install_man(args),
            "install_symlink" => self.func_install_symlink(args),
            "subdir_done" => fail("subdir_done() may only be used as a statement."),
            other => fail(format!("Unknown function \"{other}\".")),
        }
    }

    /// Interpret a `required:` value, defaulting to required.
    pub(super) fn requirement(args: &mut Args) -> Result<Requirement> {
        match args.take("required") {
            None | Some(Value::Bool(true)) => Ok(Requirement::Required),
            Some(Value::Bool(false)) => Ok(Requirement::Optional),
            Some(Value::Feature(feature)) => Ok(match feature.state {
                FeatureState::Enabled => Requirement::Required,
                FeatureState::Auto => Requirement::Optional,
                FeatureState::Disabled => Requirement::Disabled(feature.name),
            }),
            Some(other) => fail(format!(
                "{} keyword argument \"required\" was of type {} but should have been bool | feature",
                args.name,
                other.type_name()
            )),
        }
    }

    fn func_project(&mut self, mut args: Args) -> Result<Value> {
        if self.frame.project.is_some() {
            return fail("Second call to project().");
        }
        args.flatten();
        args.expect_count(1, usize::MAX)?;
        let name = args.str_at(0)?;
        let languages = args.strs_from(1)?;
        let version = match args.take("version") {
            None => "undefined".to_owned(),
            Some(Value::Str(v)) => v,
            Some(Value::File(file)) => self.read_version_file(&file)?,
            Some(other) => {
                return fail(format!(
                    "project keyword argument \"version\" was of type {} but should have been str | file",
                    other.type_name()
                ));
            }
        };
        let license = args.str_list("license")?;
        let meson_version = args.str("meson_version")?;
        let raw_defaults = args.take("default_options");
        let default_options = option_assignments(&args.name, raw_defaults)?;
        let subproject_dir = args
            .str("subproject_dir")?
            .unwrap_or_else(|| "subprojects".to_owned());
        args.ignore(&["license_files"]);
        args.finish()?;

        if let Some(constraint) = &meson_version {
            if !version_compare(COMPAT_VERSION, constraint) {
                return fail(format!(
                    "Meson version is {COMPAT_VERSION} but project requires {constraint}"
                ));
            }
        }
        if subproject_dir.contains(['/', '\\']) || subproject_dir == ".." {
            return fail("Subproject_dir must not contain a path segment.");
        }

        let info = ProjectInfo {
            name: name.clone(),
            version: version.clone(),
            license,
            languages,
            subproject_dir: subproject_dir.clone(),
            default_options: default_options.clone(),
            meson_version,
        };
        info!("Project name: {name}");
        info!("Project version: {version}");
        let wraps = Resolver::load(&self.source_root.join(&self.frame.root), &subproject_dir)?;
        if self.is_subproject() {
            self.description.subprojects.push(SubprojectInfo {
                name: self.frame.subproject.clone(),
                version,
                descriptive_name: name,
            });
            self.wraps.merge(&wraps);
        } else {
            self.description.project = info.clone();
            self.wraps = wraps;
        }
        self.frame.project = Some(info);
        self.load_option_file()?;
        self.apply_project_options(&default_options)?;
        Ok(Value::Void)
    }

    fn read_version_file(&self, file: &FileRef) -> Result<String> {
        let path = file.absolute(&self.source_root, &self.build_root);
        let text = std::fs::read_to_string(&path).map_err(|source| InterpreterError::Io {
            path: path.clone(),
            source,
        })?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        match (lines.next(), lines.next()) {
            (Some(line), None) => Ok(line.trim().to_owned()),
            _ => fail(format!(
                "Version file {path} must contain exactly one line of text."
            )),
        }
    }

    fn joined_message(args: &Args) -> Result<String> {
        let parts = args
            .positional
            .iter()
            .map(|v| {
                v.stringify(true).ok_or_else(|| {
                    InterpreterError::msg(
                        "Value other than strings, integers, bools, options, dictionaries and lists thereof.",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(" "))
    }

    fn func_message(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, usize::MAX)?;
        let text = Self::joined_message(&args)?;
        args.ignore(&["once"]);
        args.finish()?;
        info!("Message: {text}");
        Ok(Value::Void)
    }

    fn func_warning(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, usize::MAX)?;
        let text = Self::joined_message(&args)?;
        args.ignore(&["once"]);
        args.finish()?;
        warn!("{}: {text}", self.subdir().join("meson.build"));
        Ok(Value::Void)
    }

    fn func_error(&mut self, args: Args) -> Result<Value> {
        args.expect_count(1, usize::MAX)?;
        let text = Self::joined_message(&args)?;
        args.finish()?;
        fail(format!("Problem encountered: {text}"))
    }

    fn func_debug(&mut self, args: Args) -> Result<Value> {
        args.expect_count(1, usize::MAX)?;
        let text = Self::joined_message(&args)?;
        args.finish()?;
        debug!("{text}");
        Ok(Value::Void)
    }

    fn func_summary(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 2)?;
        let section = args.str("section")?.unwrap_or_default();
        let bool_yn = args.bool("bool_yn", false)?;
        let list_sep = args.str("list_sep")?;
        let entries: Vec<(String, Value)> = match args.positional.as_slice() {
            [Value::Dict(map)] => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            [Value::Str(key), value] => vec![(key.clone(), value.clone())],
            [_] => return fail("Summary first argument must be dictionary."),
            _ => return fail("Summary first argument must be a string."),
        };
        args.finish()?;
        let project = self.project()?.name.clone();
        let sections = self.description.summary.entry(project).or_default();
        let lines = sections.entry(section.clone()).or_default();
        for (key, value) in entries {
            if lines.iter().any(|l| l.key == key) {
                return fail(format!(
                    "Summary section '{section}' already have key '{key}'"
                ));
            }
            let values = summary_values(&value, bool_yn)?;
            lines.push(SummaryEntry {
                key,
                values,
                list_sep: list_sep.clone(),
            });
        }
        Ok(Value::Void)
    }

    fn func_get_option(&mut self, args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        args.finish()?;
        if name.contains(':') {
            return fail(format!(
                "Having a colon in option name is forbidden, projects are not allowed to directly access options of other subprojects: {name}"
            ));
        }
        let option = self
            .options
            .lookup(&self.frame.subproject, &name)
            .ok_or_else(|| InterpreterError::msg(format!("Tried to access unknown option \"{name}\".")))?;
        Ok(match &option.value {
            OptionValue::Boolean(b) => Value::Bool(*b),
            OptionValue::Integer(i) => Value::Int(*i),
            OptionValue::String(s) => Value::Str(s.clone()),
            OptionValue::Array(items) => {
                Value::Array(items.iter().cloned().map(Value::Str).collect())
            }
            OptionValue::Feature(state) => {
                let state = match state {
                    FeatureState::Auto => self.auto_features(),
                    other => *other,
                };
                Value::Feature(FeatureOption { name, state })
            }
        })
    }

    fn auto_features(&self) -> FeatureState {
        match self.options.get("auto_features").map(|o| &o.value) {
            Some(OptionValue::Feature(state)) => *state,
            _ => FeatureState::Auto,
        }
    }

    /// String value of a built-in option.
    pub(super) fn option_string(&self, key: &str) -> String {
        self.options
            .lookup(&self.frame.subproject, key)
            .map(|o| o.value.to_cli_string())
            .unwrap_or_default()
    }

    fn func_set_variable(&mut self, args: Args) -> Result<Value> {
        args.expect_count(2, 2)?;
        let name = args.str_at(0)?;
        args.finish()?;
        self.assign(&name, args.at(1)?)?;
        Ok(Value::Void)
    }

    fn func_get_variable(&mut self, args: Args) -> Result<Value> {
        args.expect_count(1, 2)?;
        if args.at(0)?.is_disabler() {
            return Ok(Value::Disabler);
        }
        let name = args.str_at(0)?;
        args.finish()?;
        match (self.lookup_variable(&name), args.positional.get(1)) {
            (Some(value), _) => Ok(value),
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => fail(format!("Tried to get unknown variable \"{name}\".")),
        }
    }

    fn func_is_variable(&mut self, args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        args.finish()?;
        Ok(Value::Bool(self.lookup_variable(&name).is_some()))
    }

    fn func_unset_variable(&mut self, args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        args.finish()?;
        if self.frame.variables.shift_remove(&name).is_none() {
            return fail(format!("Tried to unset unknown variable \"{name}\"."));
        }
        Ok(Value::Void)
    }

    /// Turn a string or file argument into a source file.
    pub(super) fn source_file(&self, value: Value, fname: &str) -> Result<FileRef> {
        match value {
            Value::File(file) => Ok(file),
            Value::Str(name) => {
                let file = FileRef {
                    subdir: self.subdir().to_path_buf(),
                    name,
                    built: false,
                };
                let path = file.absolute(&self.source_root, &self.build_root);
                if !path.is_file() {
                    return fail(format!("File {} does not exist.", file.name));
                }
                Ok(file)
            }
            other => fail(format!(
                "{fname} argument was of type \"{}\" but should have been \"str | file\"",
                other.type_name()
            )),
        }
    }

    fn func_files(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        args.finish()?;
        let files = args
            .positional
            .into_iter()
            .map(|v| self.source_file(v, "files").map(Value::File))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(files))
    }

    fn func_include_directories(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        let is_system = args.bool("is_system", false)?;
        args.finish()?;
        let mut dirs = Vec::new();
        for dir in args.strs_from(0)? {
            let rel = self.subdir().join(&dir);
            if !self.source_root.join(&rel).is_dir() {
                return fail(format!(
                    "Include dir {dir} does not exist."
                ));
            }
            dirs.push(rel);
        }
        Ok(Value::IncludeDirs(Rc::new(IncludeDirs { dirs, is_system })))
    }

    fn func_subdir(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        let if_found = args.list("if_found");
        args.finish()?;
        for value in &if_found {
            match found(value) {
                Some(true) => {}
                Some(false) => return Ok(Value::Void),
                None => {
                    return fail(format!(
                        "Object of type {} used in if_found does not have a found method.",
                        value.type_name()
                    ));
                }
            }
        }
        self.enter_subdir(&name)?;
        Ok(Value::Void)
    }

    fn func_subproject(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        let requirement = Self::requirement(&mut args)?;
        let raw_defaults = args.take("default_options");
        let defaults = option_assignments(&args.name, raw_defaults)?;
        let version = args.str_list("version")?;
        args.finish()?;
        self.subproject_value(&name, &requirement, defaults, &version)
    }

    /// Configure a subproject and check its version.
    pub(super) fn subproject_value(
        &mut self,
        name: &str,
        requirement: &Requirement,
        defaults: IndexMap<String, String>,
        version: &[String],
    ) -> Result<Value> {
        if let Requirement::Disabled(feature) = requirement {
            info!("Subproject {name} skipped: feature {feature} disabled");
            return Ok(Value::Subproject(self.missing_subproject(name)));
        }
        let required = requirement.is_required();
        let sub = self.enter_subproject(name, required, defaults)?;
        if sub.found && !version.is_empty() {
            let found_version = self
                .description
                .subprojects
                .iter()
                .find(|s| s.name == name)
                .map_or_else(|| "undefined".to_owned(), |s| s.version.clone());
            if !version.iter().all(|c| version_compare(&found_version, c)) {
                let wanted = version.join(", ");
                if required {
                    return fail(format!(
                        "Subproject {name} version is {found_version} but {wanted} required."
                    ));
                }
                warn!("Subproject {name} version is {found_version} but {wanted} required.");
                return Ok(Value::Subproject(self.missing_subproject(name)));
            }
        }
        Ok(Value::Subproject(sub))
    }

    fn func_add_arguments(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        let languages = args.str_list("language")?;
        args.ignore(&["native"]);
        args.finish()?;
        let fname = args.name.clone();
        if languages.is_empty() {
            return fail(format!("{fname}() missing keyword argument \"language\""));
        }
        let values = args.strs_from(0)?;
        let global = fname.starts_with("add_global");
        let link = fname.ends_with("link_arguments");
        if global && self.is_subproject() {
            return fail(format!(
                "Function '{fname}' cannot be used in subprojects because there is no way to make that reliable."
            ));
        }
        let subproject = self.frame.subproject.clone();
        let has_targets = self
            .description
            .targets
            .iter()
            .any(|t| global || t.subproject.as_deref().unwrap_or_default() == subproject);
        if has_targets {
            return fail(format!(
                "Tried to use '{fname}' after a build target has been declared."
            ));
        }
        let tables = &mut self.description.arguments;
        let table = match (global, link) {
            (true, false) => &mut tables.global,
            (true, true) => &mut tables.global_link,
            (false, false) => tables.project.entry(subproject).or_default(),
            (false, true) => tables.project_link.entry(subproject).or_default(),
        };
        for lang in languages {
            table
                .entry(lang.to_lowercase())
                .or_default()
                .extend(values.iter().cloned());
        }
        Ok(Value::Void)
    }

    fn func_add_test_setup(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        if name.contains(':') {
            return fail("Setup name may not contain a \":\"");
        }
        let exe_wrapper = args
            .list("exe_wrapper")
            .iter()
            .map(|v| self.command_word(v))
            .collect::<Result<Vec<_>>>()?;
        let env = env_from(args.take("env"))?;
        let timeout_multiplier = args.int("timeout_multiplier", 1)?;
        let is_default = args.bool("is_default", false)?;
        args.ignore(&["gdb", "exclude_suites"]);
        args.finish()?;
        let full = format!("{}:{name}", self.project()?.name);
        if is_default {
            if let Some(existing) = self.description.test_setups.iter().find(|s| s.is_default) {
                return fail(format!("{} is already set as default", existing.name));
            }
        }
        self.description.test_setups.retain(|s| s.name != full);
        self.description.test_setups.push(TestSetup {
            name: full,
            exe_wrapper,
            env,
            timeout_multiplier,
            is_default,
        });
        Ok(Value::Void)
    }

    fn func_import(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 1)?;
        let name = args.str_at(0)?;
        let requirement = Self::requirement(&mut args)?;
        args.ignore(&["disabler"]);
        args.finish()?;
        if let Requirement::Disabled(_) = requirement {
            return Ok(Value::Disabler);
        }
        match name.as_str() {
            "fs" => Ok(Value::Module(Module::Fs)),
            _ if requirement.is_required() => fail(format!("Module \"{name}\" does not exist")),
            _ => {
                debug!(module = %name, "module not available");
                Ok(Value::Disabler)
            }
        }
    }

    /// Render a program, file, target or string as a command word.
    pub(super) fn command_word(&self, value: &Value) -> Result<String> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::File(file) => Ok(file
                .absolute(&self.source_root, &self.build_root)
                .into_string()),
            Value::Program(program) => program.command.first().cloned().ok_or_else(|| {
                InterpreterError::msg(format!(
                    "Tried to use not-found external program {} in a command.",
                    program.name
                ))
            }),
            Value::Target(target) => target
                .filename
                .first()
                .map(|p| p.to_string())
                .ok_or_else(|| InterpreterError::msg(format!("Target {} has no outputs.", target.name))),
            Value::BothLibraries { shared, .. } => shared
                .filename
                .first()
                .map(|p| p.to_string())
                .ok_or_else(|| InterpreterError::msg(format!("Target {} has no outputs.", shared.name))),
            other => fail(format!(
                "Invalid object of type {} in command.",
                other.type_name()
            )),
        }
    }

    /// Absolute install location for `dir`, relative to the prefix.
    pub(super) fn install_path(&self, dir: &str) -> Utf8PathBuf {
        let prefix = Utf8PathBuf::from(self.options.prefix());
        if Utf8Path::new(dir).is_absolute() {
            Utf8PathBuf::from(dir)
        } else {
            prefix.join(dir)
        }
    }
}

fn func_assert(args: Args) -> Result<Value> {
    args.expect_count(1, 2)?;
    let condition = args.bool_at(0)?;
    let message = match args.positional.get(1) {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => other.stringify(true).unwrap_or_default(),
        None => String::new(),
    };
    args.finish()?;
    if condition {
        Ok(Value::Void)
    } else {
        fail(format!("Assert failed: {message}"))
    }
}

fn func_join_paths(mut args: Args) -> Result<Value> {
    args.flatten();
    args.expect_count(1, usize::MAX)?;
    let parts = args.strs_from(0)?;
    args.finish()?;
    let joined = parts
        .iter()
        .fold(String::new(), |acc, part| join_path(&acc, part));
    Ok(Value::Str(joined))
}

fn func_environment(mut args: Args) -> Result<Value> {
    args.expect_count(0, 1)?;
    let method = args.str("method")?.unwrap_or_else(|| "set".to_owned());
    let separator = args.str("separator")?.unwrap_or_else(|| ":".to_owned());
    args.finish()?;
    let action = match method.as_str() {
        "set" => EnvAction::Set,
        "append" => EnvAction::Append,
        "prepend" => EnvAction::Prepend,
        other => {
            return fail(format!(
                "environment keyword argument \"method\" must be one of set, append, prepend, not {other}"
            ));
        }
    };
    let mut env = Environment::default();
    if let Some(initial) = args.positional.into_iter().next() {
        for (name, values) in env_entries(initial)? {
            env.ops.push(EnvOp {
                action,
                name,
                values,
                separator: separator.clone(),
            });
        }
    }
    Ok(Value::Environment(Rc::new(RefCell::new(env))))
}

fn func_range(args: Args) -> Result<Value> {
    args.expect_count(1, 3)?;
    let (start, stop, step) = match args.positional.len() {
        1 => (0, args.int_at(0)?, 1),
        2 => (args.int_at(0)?, args.int_at(1)?, 1),
        _ => (args.int_at(0)?, args.int_at(1)?, args.int_at(2)?),
    };
    args.finish()?;
    if start < 0 {
        return fail("start cannot be negative");
    }
    if stop < start {
        return fail("stop cannot be less than start");
    }
    if step < 1 {
        return fail("step must be >=1");
    }
    Ok(Value::Range(Range { start, stop, step }))
}

/// Entries of an `environment()` initialiser or `env:` keyword.
pub(super) fn env_entries(value: Value) -> Result<Vec<(String, Vec<String>)>> {
    let items: Vec<(String, Value)> = match value {
        Value::Dict(map) => map.into_iter().collect(),
        Value::Str(s) => vec![split_env(&s)?],
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::Str(s) => split_env(&s),
                other => fail(format!(
                    "Environment entries must be strings, not {}",
                    other.type_name()
                )),
            })
            .collect::<Result<_>>()?,
        other => {
            return fail(format!(
                "Environment must be a dict, a list or an environment object, not {}",
                other.type_name()
            ));
        }
    };
    items
        .into_iter()
        .map(|(k, v)| {
            let values = match v {
                Value::Str(s) => vec![s],
                Value::Array(items) => items
                    .into_iter()
                    .map(|i| match i {
                        Value::Str(s) => Ok(s),
                        other => fail(format!(
                            "Environment values must be strings, not {}",
                            other.type_name()
                        )),
                    })
                    .collect::<Result<_>>()?,
                other => {
                    return fail(format!(
                        "Environment values must be strings, not {}",
                        other.type_name()
                    ));
                }
            };
            Ok((k, values))
        })
        .collect()
}

fn split_env(text: &str) -> Result<(String, Value)> {
    text.split_once('=')
        .map(|(k, v)| (k.to_owned(), Value::Str(v.to_owned())))
        .ok_or_else(|| {
            InterpreterError::msg(format!(
                "Environment entry {text:?} must be of the form \"name=value\""
            ))
        })
}

/// Resolve an `env:` keyword to final values.
pub(super) fn env_from(value: Option<Value>) -> Result<IndexMap<String, String>> {
    match value {
        None => Ok(IndexMap::new()),
        Some(Value::Environment(env)) => Ok(env.borrow().resolve()),
        Some(other) => {
            let mut env = Environment::default();
            for (name, values) in env_entries(other)? {
                env.ops.push(EnvOp {
                    action: EnvAction::Set,
                    name,
                    values,
                    separator: ":".to_owned(),
                });
            }
            Ok(env.resolve())
        }
    }
}

/// Parse a `default_options` keyword given as a list or a dict.
pub(super) fn option_assignments(
    fname: &str,
    value: Option<Value>,
) -> Result<IndexMap<String, String>> {
    let mut out = IndexMap::new();
    match value {
        None => {}
        Some(Value::Dict(map)) => {
            for (key, value) in map {
                out.insert(key, option_text(&value)?);
            }
        }
        Some(Value::Str(s)) => {
            let (k, v) = split_assignment(&s)?;
            out.insert(k, v);
        }
        Some(Value::Array(items)) => {
            for item in Value::flatten(items) {
                let Value::Str(s) = item else {
                    return fail(format!(
                        "{fname} keyword argument \"default_options\" must contain only strings"
                    ));
                };
                let (k, v) = split_assignment(&s)?;
                out.insert(k, v);
            }
        }
        Some(other) => {
            return fail(format!(
                "{fname} keyword argument \"default_options\" was of type {} but should have been array[str] | dict[str | bool | int | array[str]]",
                other.type_name()
            ));
        }
    }
    Ok(out)
}

fn option_text(value: &Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Array(items) => items
            .iter()
            .map(option_text)
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(",")),
        other => fail(format!(
            "Option values must be strings, booleans, integers or arrays, not {}",
            other.type_name()
        )),
    }
}

/// Result of calling `found()` on `value`, if it has that method.
pub(super) fn found(value: &Value) -> Option<bool> {
    match value {
        Value::Dependency(dep) => Some(dep.found()),
        Value::Program(program) => Some(program.found()),
        Value::Subproject(sub) => Some(sub.found),
        Value::Disabler => Some(false),
        Value::Target(_) | Value::BothLibraries { .. } => Some(true),
        Value::Feature(feature) => Some(feature.state != FeatureState::Disabled),
        _ => None,
    }
}

fn summary_values(value: &Value, bool_yn: bool) -> Result<Vec<String>> {
    let single = match value {
        Value::Bool(b) if bool_yn => if *b { "YES" } else { "NO" }.to_owned(),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(summary_values(item, bool_yn)?);
            }
            return Ok(out);
        }
        Value::Dependency(dep) => {
            if dep.found() {
                format!("YES {}", dep.version)
            } else {
                "NO".to_owned()
            }
        }
        Value::Program(program) => {
            if program.found() {
                format!("YES {}", program.command.join(" "))
            } else {
                "NO".to_owned()
            }
        }
        Value::Target(target) => target.name.clone(),
        Value::Subproject(sub) => if sub.found { "YES" } else { "NO" }.to_owned(),
        other => other.stringify(true).ok_or_else(|| {
            InterpreterError::msg(format!(
                "Summary value of type {} is not supported.",
                other.type_name()
            ))
        })?,
    };
    Ok(vec![single])
}
