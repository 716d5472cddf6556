//! `dependency()`, `declare_dependency()` and `find_program()`.
//!
//! Dependencies are never searched for on the system. A lookup is satisfied by an
//! override, by a subproject named in `fallback:` or providing the
//! dependency through its wrap file, or not at all. Programs are located on
//! disk but never executed, so their versions are unknown unless they come
//! from an override.

use std::env;
use std::fs;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::{debug, info};

use super::args::Args;
use super::error::{InterpreterError, fail};
use super::functions::{Requirement, option_assignments};
use super::value::{Dependency, DependencyKind, ExternalProgram, Value};
use super::{Interpreter, Result};
use crate::model::DependencyRecord;
use crate::version::version_compare;

const IGNORED_DEPENDENCY_KWARGS: [&str; 14] = [
    "native",
    "method",
    "modules",
    "optional_modules",
    "static",
    "include_type",
    "language",
    "main",
    "components",
    "private_headers",
    "cmake_args",
    "cmake_module_path",
    "cmake_package_version",
    "embed",
];

impl Interpreter {
    pub(super) fn func_declare_dependency(&mut self, mut args: Args) -> Result<Value> {
        args.no_positional()?;
        let compile_args = args.str_list("compile_args")?;
        let link_args = args.str_list("link_args")?;
        let include_directories = self.include_dirs_kwarg(&mut args)?;
        let mut link_with = Vec::new();
        for value in args
            .list("link_with")
            .into_iter()
            .chain(args.list("link_whole"))
        {
            link_with.push(Self::link_target_id(&value)?);
        }
        let sources = args
            .list("sources")
            .into_iter()
            .map(|v| {
                self.source_file(v, "declare_dependency")
                    .map(|f| f.absolute(&self.source_root, &self.build_root))
            })
            .collect::<Result<Vec<_>>>()?;
        let dependencies = dependency_names(args.list("dependencies"))?;
        let version = match args.str("version")? {
            Some(v) => v,
            None => self.project()?.version.clone(),
        };
        let variables = self.variables_kwarg(&mut args)?;
        args.ignore(&["d_module_versions", "d_import_dirs", "extra_files", "objects"]);
        args.finish()?;
        let dep = Dependency {
            name: String::new(),
            kind: DependencyKind::Internal,
            version,
            compile_args,
            link_args,
            include_directories,
            link_with,
            sources,
            dependencies,
            variables,
        };
        Ok(Value::Dependency(Rc::new(dep)))
    }

    fn include_dirs_kwarg(&self, args: &mut Args) -> Result<Vec<Utf8PathBuf>> {
        let mut dirs = Vec::new();
        for value in args.list("include_directories") {
            match value {
                Value::IncludeDirs(inc) => {
                    dirs.extend(inc.dirs.iter().map(|d| self.source_root.join(d)));
                }
                Value::Str(dir) => {
                    let rel = self.subdir().join(&dir);
                    if !self.source_root.join(&rel).is_dir() {
                        return fail(format!("Include dir {dir} does not exist."));
                    }
                    dirs.push(self.source_root.join(rel));
                }
                other => {
                    return fail(format!(
                        "include_directories must be strings or include_directories objects, not {}",
                        other.type_name()
                    ));
                }
            }
        }
        Ok(dirs)
    }

    fn variables_kwarg(&self, args: &mut Args) -> Result<IndexMap<String, String>> {
        match args.take("variables") {
            None => Ok(IndexMap::new()),
            Some(Value::Dict(map)) => map
                .into_iter()
                .map(|(k, v)| match v {
                    Value::Str(s) => Ok((k, s)),
                    other => fail(format!(
                        "variables value for {k:?} must be a string, not {}",
                        other.type_name()
                    )),
                })
                .collect(),
            Some(value) => {
                let mut out = IndexMap::new();
                for item in Value::flatten(vec![value]) {
                    let Value::Str(s) = item else {
                        return fail("variables must be a dict or a list of \"key=value\" strings");
                    };
                    let Some((k, v)) = s.split_once('=') else {
                        return fail(format!(
                            "Variable {s:?} must have a value separated by equals sign."
                        ));
                    };
                    out.insert(k.trim().to_owned(), v.trim().to_owned());
                }
                Ok(out)
            }
        }
    }

    pub(super) fn func_dependency(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        args.expect_count(1, usize::MAX)?;
        let names = args.strs_from(0)?;
        let requirement = Self::requirement(&mut args)?;
        let constraints = args.str_list("version")?;
        let fallback = fallback_kwarg(args.take("fallback"))?;
        let allow_fallback = match args.take("allow_fallback") {
            None => None,
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Feature(f)) => Some(f.state != crate::options::FeatureState::Disabled),
            Some(other) => {
                return fail(format!(
                    "dependency keyword argument \"allow_fallback\" was of type {} but should have been bool | feature",
                    other.type_name()
                ));
            }
        };
        let raw_defaults = args.take("default_options");
        let defaults = option_assignments(&args.name, raw_defaults)?;
        let disabler = args.bool("disabler", false)?;
        let not_found_message = args.str("not_found_message")?;
        args.ignore(&IGNORED_DEPENDENCY_KWARGS);
        args.finish()?;

        let shown = names.first().cloned().unwrap_or_default();
        let required = requirement.is_required();
        let candidates: Vec<&String> = names.iter().filter(|n| !n.is_empty()).collect();
        if candidates.is_empty() {
            if required {
                return fail("Dependency is both required and not-found");
            }
            return Ok(Value::Dependency(Rc::new(Dependency::not_found(""))));
        }

        let outcome = if let Requirement::Disabled(feature) = &requirement {
            info!("Dependency {shown} skipped: feature {feature} disabled");
            None
        } else {
            self.lookup_dependency(
                &candidates,
                &requirement,
                &constraints,
                fallback,
                allow_fallback,
                defaults,
            )?
        };

        match outcome {
            Some((dep, provider)) => {
                info!(
                    "Dependency {shown} found: YES {}{}",
                    dep.version,
                    provider
                        .as_deref()
                        .map(|p| format!(" (from subproject {p})"))
                        .unwrap_or_default()
                );
                self.record_dependency(&shown, &dep, required, provider);
                Ok(Value::Dependency(dep))
            }
            None => {
                if let Some(message) = not_found_message {
                    info!("{message}");
                }
                let dep = Rc::new(Dependency::not_found(&shown));
                self.record_dependency(&shown, &dep, required, None);
                if required {
                    return fail(format!("Dependency \"{shown}\" not found"));
                }
                info!("Dependency {shown} found: NO");
                if disabler {
                    return Ok(Value::Disabler);
                }
                Ok(Value::Dependency(dep))
            }
        }
    }

    fn lookup_dependency(
        &mut self,
        candidates: &[&String],
        requirement: &Requirement,
        constraints: &[String],
        fallback: Option<(String, Option<String>)>,
        allow_fallback: Option<bool>,
        defaults: IndexMap<String, String>,
    ) -> Result<Option<(Rc<Dependency>, Option<String>)>> {
        for name in candidates {
            if let Some(dep) = self.dependency_overrides.get(name.as_str()).cloned() {
                return self.check_version(name, dep, constraints, requirement, None);
            }
        }
        let provider = match fallback {
            Some(pair) => Some(pair),
            None if allow_fallback != Some(false) => candidates.iter().find_map(|name| {
                self.wraps
                    .find_dep_provider(name)
                    .map(|(sub, var)| (sub.to_owned(), var.map(str::to_owned)))
            }),
            None => None,
        };
        let Some((subproject, variable)) = provider else {
            debug!(names = ?candidates, "no provider for dependency");
            return Ok(None);
        };
        let sub_requirement = if requirement.is_required() {
            Requirement::Required
        } else {
            Requirement::Optional
        };
        let Value::Subproject(sub) =
            self.subproject_value(&subproject, &sub_requirement, defaults, &[])?
        else {
            return Ok(None);
        };
        if !sub.found {
            return Ok(None);
        }
        for name in candidates {
            if let Some(dep) = self.dependency_overrides.get(name.as_str()).cloned() {
                return self.check_version(name, dep, constraints, requirement, Some(subproject));
            }
        }
        let Some(name) = candidates.first() else {
            return Ok(None);
        };
        let Some(variable) = variable else {
            return fail(format!(
                "Subproject {subproject} did not override {name} dependency and no variable name specified"
            ));
        };
        match sub.variables.get(&variable) {
            Some(Value::Dependency(dep)) => {
                self.check_version(name, Rc::clone(dep), constraints, requirement, Some(subproject))
            }
            Some(other) => fail(format!(
                "Variable {variable:?} in the subproject {subproject:?} is not a dependency object, it is {}.",
                other.type_name()
            )),
            None => fail(format!(
                "Variable {variable:?} does not exist in the subproject {subproject:?}."
            )),
        }
    }

    fn check_version(
        &self,
        name: &str,
        dep: Rc<Dependency>,
        constraints: &[String],
        requirement: &Requirement,
        provider: Option<String>,
    ) -> Result<Option<(Rc<Dependency>, Option<String>)>> {
        if !dep.found() {
            return Ok(None);
        }
        if constraints.iter().all(|c| version_compare(&dep.version, c)) {
            return Ok(Some((dep, provider)));
        }
        let message = format!(
            "Dependency \"{name}\" not found, found {} but need: '{}'",
            dep.version,
            constraints.join("', '")
        );
        if requirement.is_required() {
            return fail(message);
        }
        info!("{message}");
        Ok(None)
    }

    fn record_dependency(
        &mut self,
        name: &str,
        dep: &Dependency,
        required: bool,
        provider: Option<String>,
    ) {
        self.description.dependencies.push(DependencyRecord {
            name: name.to_owned(),
            kind: dep.kind.as_str().to_owned(),
            version: dep.version.clone(),
            found: dep.found(),
            required,
            provider,
            compile_args: dep.compile_args.clone(),
            link_args: dep.link_args.clone(),
            include_directories: dep.include_directories.clone(),
        });
    }

    /// Register `meson.override_dependency()`.
    pub(super) fn override_dependency(&mut self, name: &str, dep: Rc<Dependency>) -> Result<()> {
        if self.dependency_overrides.contains_key(name) {
            return fail(format!(
                "Tried to override dependency {name:?} which has already been resolved or overridden"
            ));
        }
        let mut dep = (*dep).clone();
        if dep.name.is_empty() {
            dep.name = name.to_owned();
        }
        self.dependency_overrides
            .insert(name.to_owned(), Rc::new(dep));
        Ok(())
    }

    /// Register `meson.override_find_program()`.
    pub(super) fn override_program(&mut self, name: &str, program: Rc<ExternalProgram>) -> Result<()> {
        if self.program_overrides.contains_key(name) {
            return fail(format!(
                "Tried to override finding of executable {name:?} which has already been found."
            ));
        }
        self.program_overrides.insert(name.to_owned(), program);
        Ok(())
    }

    pub(super) fn func_find_program(&mut self, mut args: Args) -> Result<Value> {
        args.flatten();
        args.expect_count(1, usize::MAX)?;
        let names = args.strs_from(0)?;
        let requirement = Self::requirement(&mut args)?;
        let native = args.bool("native", false)?;
        let dirs = args.str_list("dirs")?;
        let constraints = args.str_list("version")?;
        let disabler = args.bool("disabler", false)?;
        args.ignore(&["version_argument"]);
        args.finish()?;

        let shown = names.join(", ");
        if let Requirement::Disabled(feature) = &requirement {
            info!("Program {shown} skipped: feature {feature} disabled");
            return Ok(not_found_program(&shown, disabler));
        }
        let program = match self.locate_program(&names, native, &dirs, &requirement)? {
            Some(program) if !constraints.is_empty() => {
                let ok = program
                    .version
                    .as_deref()
                    .is_some_and(|v| constraints.iter().all(|c| version_compare(v, c)));
                if ok {
                    Some(program)
                } else {
                    let message = format!(
                        "Program {shown} found but its version {} does not satisfy {}",
                        program.version.as_deref().unwrap_or("unknown"),
                        constraints.join(", ")
                    );
                    if requirement.is_required() {
                        return fail(message);
                    }
                    info!("{message}");
                    None
                }
            }
            other => other,
        };
        match program {
            Some(program) => {
                info!("Program {shown} found: YES ({})", program.command.join(" "));
                Ok(Value::Program(program))
            }
            None if requirement.is_required() => {
                fail(format!("Program '{shown}' not found or not executable"))
            }
            None => {
                info!("Program {shown} found: NO");
                Ok(not_found_program(&shown, disabler))
            }
        }
    }

    fn locate_program(
        &mut self,
        names: &[String],
        native: bool,
        dirs: &[String],
        requirement: &Requirement,
    ) -> Result<Option<Rc<ExternalProgram>>> {
        if let Some(found) = self.program_override(names) {
            return Ok(Some(found));
        }
        let files = if self.machines.is_cross && !native {
            &self.cross
        } else {
            &self.native
        };
        for name in names {
            if let Some(command) = files.binaries.get(name) {
                debug!(program = %name, "using machine file binary");
                return Ok(Some(Rc::new(ExternalProgram {
                    name: name.clone(),
                    command: command.clone(),
                    version: None,
                })));
            }
        }
        if let Some(sub) = self.wraps.find_program_provider(names).map(str::to_owned) {
            let sub_requirement = if requirement.is_required() {
                Requirement::Required
            } else {
                Requirement::Optional
            };
            self.subproject_value(&sub, &sub_requirement, IndexMap::new(), &[])?;
            if let Some(found) = self.program_override(names) {
                return Ok(Some(found));
            }
        }
        let source_dir = self.current_source_dir();
        for name in names {
            let mut candidates = vec![source_dir.join(name)];
            candidates.extend(dirs.iter().map(|d| {
                let dir = Utf8Path::new(d);
                let dir = if dir.is_absolute() {
                    dir.to_path_buf()
                } else {
                    source_dir.join(dir)
                };
                dir.join(name)
            }));
            if let Some(path) = candidates.into_iter().find(|p| is_executable(p)) {
                return Ok(Some(program_at(name, path)));
            }
            if !name.contains('/') {
                if let Some(path) = search_path(name) {
                    return Ok(Some(program_at(name, path)));
                }
            }
        }
        Ok(None)
    }

    fn program_override(&self, names: &[String]) -> Option<Rc<ExternalProgram>> {
        names
            .iter()
            .find_map(|n| self.program_overrides.get(n))
            .cloned()
    }

    /// Id of a target passed to `link_with:`.
    pub(super) fn link_target_id(value: &Value) -> Result<String> {
        match value {
            Value::Target(target) if target.kind.is_library() => Ok(target.id.clone()),
            Value::BothLibraries { shared, .. } => Ok(shared.id.clone()),
            Value::Target(target) => fail(format!(
                "Link target {} is not library.",
                target.name
            )),
            other => fail(format!(
                "link_with must contain library targets, not {}",
                other.type_name()
            )),
        }
    }
}

/// Names of dependency objects passed to `dependencies:`.
pub(super) fn dependency_names(values: Vec<Value>) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for value in values {
        match value {
            Value::Dependency(dep) => {
                if dep.found() {
                    names.push(if dep.name.is_empty() {
                        "<internal>".to_owned()
                    } else {
                        dep.name.clone()
                    });
                }
            }
            other => {
                return fail(format!(
                    "dependencies must be dependency objects, not {}",
                    other.type_name()
                ));
            }
        }
    }
    Ok(names)
}

fn fallback_kwarg(value: Option<Value>) -> Result<Option<(String, Option<String>)>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let items: Vec<String> = match value {
        Value::Str(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::Str(s) => Ok(s),
                other => fail(format!(
                    "fallback must contain strings, not {}",
                    other.type_name()
                )),
            })
            .collect::<Result<_>>()?,
        other => {
            return fail(format!(
                "dependency keyword argument \"fallback\" was of type {} but should have been str | array[str]",
                other.type_name()
            ));
        }
    };
    match items.as_slice() {
        [] => Ok(None),
        [sub] => Ok(Some((sub.clone(), None))),
        [sub, var] => Ok(Some((sub.clone(), Some(var.clone())))),
        _ => Err(InterpreterError::msg(
            "Fallback info must have one or two items.",
        )),
    }
}

fn not_found_program(name: &str, disabler: bool) -> Value {
    if disabler {
        Value::Disabler
    } else {
        Value::Program(Rc::new(ExternalProgram::not_found(name)))
    }
}

fn program_at(name: &str, path: Utf8PathBuf) -> Rc<ExternalProgram> {
    Rc::new(ExternalProgram {
        name: name.to_owned(),
        command: vec![path.into_string()],
        version: None,
    })
}

/// First executable called `name` on `PATH`.
fn search_path(name: &str) -> Option<Utf8PathBuf> {
    let raw = env::var_os("PATH")?;
    env::split_paths(&raw)
        .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .filter(|dir| !dir.as_str().is_empty())
        .flat_map(|dir| candidate_paths(&dir, name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidate_paths(dir: &Utf8Path, name: &str) -> Vec<Utf8PathBuf> {
    if Utf8Path::new(name).extension().is_some() {
        return vec![dir.join(name)];
    }
    let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_owned());
    pathext
        .split(';')
        .filter(|ext| !ext.is_empty())
        .map(|ext| dir.join(format!("{name}{}", ext.to_ascii_lowercase())))
        .collect()
}

#[cfg(not(windows))]
fn candidate_paths(dir: &Utf8Path, name: &str) -> Vec<Utf8PathBuf> {
    vec![dir.join(name)]
}

fn is_executable(path: &Utf8Path) -> bool {
    fs::metadata(path.as_std_path())
        .is_ok_and(|metadata| metadata.is_file() && has_execute_permission(&metadata))
}

#[cfg(unix)]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_permission(metadata: &fs::Metadata) -> bool {
    metadata.is_file()
}
