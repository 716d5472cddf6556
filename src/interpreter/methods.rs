//! Methods of built-in objects and of the `fs` module.

use std::fs;
use std::rc::Rc;

use camino::Utf8PathBuf;
use itertools::Itertools;

use super::args::Args;
use super::error::{InterpreterError, fail};
use super::value::{
    Dependency, EnvAction, EnvOp, Environment, ExternalProgram, FeatureOption, FileRef,
    MachineChoice, Module, Value,
};
use super::{COMPAT_VERSION, Interpreter, Result, resolve_index};
use crate::literal::Literal;
use crate::machine_file::MachineInfo;
use crate::model::Target;
use crate::options::FeatureState;
use crate::version::version_compare;

impl Interpreter {
    pub(super) fn call_method(&mut self, object: Value, args: Args) -> Result<Value> {
        match object {
            Value::Str(s) => str_method(&s, args),
            Value::Int(i) => int_method(i, args),
            Value::Bool(b) => bool_method(b, args),
            Value::Array(items) => array_method(&items, args),
            Value::Dict(map) => dict_method(&map, args),
            Value::Feature(feature) => feature_method(feature, args),
            Value::Target(target) => target_method(&target, args),
            Value::BothLibraries { shared, static_lib } => match args.name.as_str() {
                "get_shared_lib" => no_args(&args).map(|()| Value::Target(shared)),
                "get_static_lib" => no_args(&args).map(|()| Value::Target(static_lib)),
                _ => target_method(&shared, args),
            },
            Value::Dependency(dep) => dependency_method(&dep, args),
            Value::ConfData(data) => Self::cfg_data_method(&data, args),
            Value::Machine(which) => {
                let info = match which {
                    MachineChoice::Build => &self.machines.build,
                    MachineChoice::Host => &self.machines.host,
                    MachineChoice::Target => &self.machines.target,
                };
                machine_method(info, &args)
            }
            Value::Meson => self.meson_method(args),
            Value::Environment(env) => {
                let mut env = env.borrow_mut();
                env_method(&mut env, args)
            }
            Value::Program(program) => program_method(&program, args),
            Value::Subproject(sub) => match args.name.as_str() {
                "found" => no_args(&args).map(|()| Value::Bool(sub.found)),
                "get_variable" => {
                    args.expect_count(1, 2)?;
                    let name = args.str_at(0)?;
                    args.finish()?;
                    if !sub.found {
                        return fail(format!(
                            "Subproject \"{}\" disabled can't get_variable on it.",
                            sub.name
                        ));
                    }
                    match (sub.variables.get(&name), args.positional.get(1)) {
                        (Some(value), _) => Ok(value.clone()),
                        (None, Some(fallback)) => Ok(fallback.clone()),
                        (None, None) => fail(format!(
                            "Requested variable \"{name}\" not found."
                        )),
                    }
                }
                other => unknown(other, "subproject"),
            },
            Value::File(file) => match args.name.as_str() {
                "full_path" => no_args(&args).map(|()| {
                    Value::Str(file.absolute(&self.source_root, &self.build_root).into_string())
                }),
                other => unknown(other, "file"),
            },
            Value::Module(Module::Fs) => self.fs_method(args),
            other => unknown(&args.name, other.type_name()),
        }
    }

    fn meson_method(&mut self, mut args: Args) -> Result<Value> {
        let name = args.name.clone();
        match name.as_str() {
            "version" => no_args(&args).map(|()| Value::Str(COMPAT_VERSION.to_owned())),
            "project_name" => {
                no_args(&args)?;
                Ok(Value::Str(self.project()?.name.clone()))
            }
            "project_version" => {
                no_args(&args)?;
                Ok(Value::Str(self.project()?.version.clone()))
            }
            "project_license" => {
                no_args(&args)?;
                let license = self.project()?.license.clone();
                Ok(Value::Array(license.into_iter().map(Value::Str).collect()))
            }
            "source_root" | "global_source_root" => {
                no_args(&args)?;
                Ok(Value::Str(self.source_root.to_string()))
            }
            "build_root" | "global_build_root" => {
                no_args(&args)?;
                Ok(Value::Str(self.build_root.to_string()))
            }
            "project_source_root" => {
                no_args(&args)?;
                Ok(Value::Str(self.source_root.join(&self.frame.root).to_string()))
            }
            "project_build_root" => {
                no_args(&args)?;
                Ok(Value::Str(self.build_root.join(&self.frame.root).to_string()))
            }
            "current_source_dir" => {
                no_args(&args)?;
                Ok(Value::Str(self.current_source_dir().to_string()))
            }
            "current_build_dir" => {
                no_args(&args)?;
                Ok(Value::Str(self.current_build_dir().to_string()))
            }
            "is_subproject" => no_args(&args).map(|()| Value::Bool(self.is_subproject())),
            "is_cross_build" => no_args(&args).map(|()| Value::Bool(self.machines.is_cross)),
            "can_run_host_binaries" => {
                no_args(&args).map(|()| Value::Bool(!self.machines.is_cross))
            }
            "backend" => no_args(&args).map(|()| Value::Str(self.option_string("backend"))),
            "get_cross_property" => {
                args.expect_count(1, 2)?;
                let key = args.str_at(0)?;
                args.finish()?;
                let found = self
                    .machines
                    .is_cross
                    .then(|| self.cross.properties.get(&key))
                    .flatten()
                    .map(literal_value);
                property_or_fallback(found, &args, &key)
            }
            "get_external_property" => {
                args.expect_count(1, 2)?;
                let key = args.str_at(0)?;
                let native = args.bool("native", false)?;
                args.finish()?;
                let files = if self.machines.is_cross && !native {
                    &self.cross
                } else {
                    &self.native
                };
                let found = files.properties.get(&key).map(literal_value);
                property_or_fallback(found, &args, &key)
            }
            "override_dependency" => {
                args.expect_count(2, 2)?;
                let dep_name = args.str_at(0)?;
                args.ignore(&["native", "static"]);
                args.finish()?;
                let Value::Dependency(dep) = args.at(1)? else {
                    return fail(format!(
                        "override_dependency argument 2 was of type \"{}\" but should have been \"dep\"",
                        args.at(1)?.type_name()
                    ));
                };
                self.override_dependency(&dep_name, Rc::clone(dep))?;
                Ok(Value::Void)
            }
            "override_find_program" => {
                args.expect_count(2, 2)?;
                let program_name = args.str_at(0)?;
                args.finish()?;
                let program = match args.at(1)? {
                    Value::Program(program) => Rc::clone(program),
                    value @ (Value::File(_) | Value::Target(_)) => Rc::new(ExternalProgram {
                        name: program_name.clone(),
                        command: vec![self.command_word(value)?],
                        version: Some(self.project()?.version.clone()),
                    }),
                    other => {
                        return fail(format!(
                            "override_find_program argument 2 was of type \"{}\" but should have been \"exe | file | external_program\"",
                            other.type_name()
                        ));
                    }
                };
                self.override_program(&program_name, program)?;
                Ok(Value::Void)
            }
            "add_install_script" | "add_postconf_script" | "add_dist_script" => {
                args.expect_count(1, usize::MAX)?;
                args.ignore(&["skip_if_destdir", "install_tag", "dry_run"]);
                args.finish()?;
                tracing::debug!(method = %name, "script recorded but never run");
                Ok(Value::Void)
            }
            other => unknown(other, "meson"),
        }
    }

    fn fs_method(&mut self, mut args: Args) -> Result<Value> {
        args.expect_count(1, 2)?;
        let path = match args.at(0)? {
            Value::Str(s) => Utf8PathBuf::from(s),
            Value::File(file) => file.absolute(&self.source_root, &self.build_root),
            other => {
                return fail(format!(
                    "fs.{} argument 1 was of type \"{}\" but should have been \"str | file\"",
                    args.name,
                    other.type_name()
                ));
            }
        };
        let absolute = if path.is_absolute() {
            path.clone()
        } else {
            self.current_source_dir().join(&path)
        };
        let name = args.name.clone();
        let result = match name.as_str() {
            "exists" => Value::Bool(absolute.exists()),
            "is_dir" => Value::Bool(absolute.is_dir()),
            "is_file" => Value::Bool(absolute.is_file()),
            "is_symlink" => Value::Bool(absolute.is_symlink()),
            "is_absolute" => Value::Bool(path.is_absolute()),
            "name" => Value::Str(path.file_name().unwrap_or_default().to_owned()),
            "stem" => Value::Str(path.file_stem().unwrap_or_default().to_owned()),
            "suffix" => Value::Str(
                path.extension()
                    .map(|ext| format!(".{ext}"))
                    .unwrap_or_default(),
            ),
            "parent" => Value::Str(match path.parent() {
                Some(parent) if !parent.as_str().is_empty() => parent.to_string(),
                _ => ".".to_owned(),
            }),
            "replace_suffix" => {
                args.expect_count(2, 2)?;
                let suffix = args.str_at(1)?;
                if !suffix.is_empty() && !suffix.starts_with('.') {
                    return fail(format!("Invalid suffix {suffix:?}"));
                }
                let stem = path.file_stem().unwrap_or_default();
                let file = format!("{stem}{suffix}");
                Value::Str(match path.parent() {
                    Some(parent) if !parent.as_str().is_empty() => parent.join(file).to_string(),
                    _ => file,
                })
            }
            "read" => {
                args.ignore(&["encoding"]);
                if absolute.is_dir() {
                    return fail(format!("read_file: {path} is not a file"));
                }
                let text = fs::read_to_string(&absolute).map_err(|source| InterpreterError::Io {
                    path: absolute.clone(),
                    source,
                })?;
                self.description.add_build_file(absolute);
                Value::Str(text)
            }
            other => return unknown(other, "fs module"),
        };
        if name != "replace_suffix" {
            args.expect_count(1, 1)?;
        }
        args.finish()?;
        Ok(result)
    }
}

fn unknown<T>(method: &str, object: &str) -> Result<T> {
    fail(format!("Unknown method \"{method}\" in object {object}."))
}

fn no_args(args: &Args) -> Result<()> {
    args.no_positional()?;
    args.finish()
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Array(items) => Value::Array(items.iter().map(literal_value).collect()),
    }
}

fn property_or_fallback(found: Option<Value>, args: &Args, key: &str) -> Result<Value> {
    match (found, args.positional.get(1)) {
        (Some(value), _) => Ok(value),
        (None, Some(fallback)) => Ok(fallback.clone()),
        (None, None) => fail(format!("Unknown property for host machine: {key}")),
    }
}

fn str_method(s: &str, mut args: Args) -> Result<Value> {
    let name = args.name.clone();
    let value = match name.as_str() {
        "strip" => {
            args.expect_count(0, 1)?;
            Value::Str(match args.opt_str_at(0)? {
                Some(chars) => s.trim_matches(|c| chars.contains(c)).to_owned(),
                None => s.trim().to_owned(),
            })
        }
        "format" => {
            let mut out = String::new();
            let mut rest = s;
            while let Some((head, after)) = rest.split_once('@') {
                out.push_str(head);
                let digits = after.bytes().take_while(u8::is_ascii_digit).count();
                let (number, tail) = after.split_at_checked(digits).unwrap_or((after, ""));
                if let Some(remaining) = tail.strip_prefix('@')
                    && !number.is_empty()
                {
                    let idx: usize = number.parse().unwrap_or(usize::MAX);
                    let value = args.positional.get(idx).ok_or_else(|| {
                        InterpreterError::msg(format!("Format placeholder @{idx}@ out of range."))
                    })?;
                    let text = value.stringify(true).ok_or_else(|| {
                        InterpreterError::msg(format!(
                            "Format argument of type {} cannot be formatted.",
                            value.type_name()
                        ))
                    })?;
                    out.push_str(&text);
                    rest = remaining;
                } else {
                    out.push('@');
                    rest = after;
                }
            }
            out.push_str(rest);
            Value::Str(out)
        }
        "to_upper" => Value::Str(s.to_uppercase()),
        "to_lower" => Value::Str(s.to_lowercase()),
        "underscorify" => Value::Str(
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect(),
        ),
        "split" => {
            args.expect_count(0, 1)?;
            let parts: Vec<Value> = match args.opt_str_at(0)? {
                Some(sep) if sep.is_empty() => return fail("empty separator"),
                Some(sep) => s.split(sep.as_str()).map(|p| Value::Str(p.to_owned())).collect(),
                None => s.split_whitespace().map(|p| Value::Str(p.to_owned())).collect(),
            };
            Value::Array(parts)
        }
        "splitlines" => Value::Array(s.lines().map(|l| Value::Str(l.to_owned())).collect()),
        "startswith" => Value::Bool(s.starts_with(args.str_at(0)?.as_str())),
        "endswith" => Value::Bool(s.ends_with(args.str_at(0)?.as_str())),
        "contains" => Value::Bool(s.contains(args.str_at(0)?.as_str())),
        "to_int" => Value::Int(parse_int(s).ok_or_else(|| {
            InterpreterError::msg(format!("String '{s}' cannot be converted to int"))
        })?),
        "join" => {
            args.flatten();
            Value::Str(args.strs_from(0)?.join(s))
        }
        "version_compare" => {
            args.expect_count(1, 1)?;
            Value::Bool(version_compare(s, &args.str_at(0)?))
        }
        "substring" => {
            args.expect_count(0, 2)?;
            let chars: Vec<char> = s.chars().collect();
            let len = i64::try_from(chars.len()).unwrap_or(i64::MAX);
            let start = if args.positional.is_empty() { 0 } else { args.int_at(0)? };
            let end = if args.positional.len() > 1 { args.int_at(1)? } else { len };
            let clamp = |i: i64| {
                let i = if i < 0 { (len + i).max(0) } else { i.min(len) };
                usize::try_from(i).unwrap_or_default()
            };
            let (start, end) = (clamp(start), clamp(end));
            Value::Str(chars.get(start..end).map(|slice| slice.iter().collect()).unwrap_or_default())
        }
        "replace" => {
            args.expect_count(2, 2)?;
            Value::Str(s.replace(args.str_at(0)?.as_str(), &args.str_at(1)?))
        }
        other => return unknown(other, "str"),
    };
    if matches!(
        name.as_str(),
        "to_upper" | "to_lower" | "underscorify" | "splitlines" | "to_int"
    ) {
        args.no_positional()?;
    }
    if matches!(name.as_str(), "startswith" | "endswith" | "contains") {
        args.expect_count(1, 1)?;
    }
    args.finish()?;
    Ok(value)
}

/// Integer parsing with the rules of `str.to_int()`.
fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let digits = t.strip_prefix(['+', '-']).unwrap_or(t);
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '_')
    {
        return None;
    }
    t.replace('_', "").parse().ok()
}

fn int_method(i: i64, mut args: Args) -> Result<Value> {
    let value = match args.name.as_str() {
        "is_even" => Value::Bool(i % 2 == 0),
        "is_odd" => Value::Bool(i % 2 != 0),
        "to_string" => {
            let fill = usize::try_from(args.int("fill", 0)?).unwrap_or_default();
            let digits = i.unsigned_abs().to_string();
            let sign = if i < 0 { "-" } else { "" };
            let width = fill.saturating_sub(sign.len());
            Value::Str(format!("{sign}{digits:0>width$}"))
        }
        other => return unknown(other, "int"),
    };
    no_args(&args)?;
    Ok(value)
}

fn bool_method(b: bool, args: Args) -> Result<Value> {
    match args.name.as_str() {
        "to_int" => no_args(&args).map(|()| Value::Int(i64::from(b))),
        "to_string" => {
            args.finish()?;
            let (yes, no) = match args.positional.len() {
                0 => ("true".to_owned(), "false".to_owned()),
                2 => (args.str_at(0)?, args.str_at(1)?),
                _ => {
                    return fail(
                        "bool.to_string() must have either no arguments or exactly two string arguments that signify what values to return for true and false.",
                    );
                }
            };
            Ok(Value::Str(if b { yes } else { no }))
        }
        other => unknown(other, "bool"),
    }
}

fn array_method(items: &[Value], args: Args) -> Result<Value> {
    args.finish()?;
    match args.name.as_str() {
        "length" => {
            args.no_positional()?;
            Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX)))
        }
        "contains" => {
            args.expect_count(1, 1)?;
            Ok(Value::Bool(array_contains(items, args.at(0)?)))
        }
        "get" => {
            args.expect_count(1, 2)?;
            let idx = args.int_at(0)?;
            let item = resolve_index(idx, items.len()).and_then(|i| items.get(i));
            match (item, args.positional.get(1)) {
                (Some(item), _) => Ok(item.clone()),
                (None, Some(fallback)) => Ok(fallback.clone()),
                (None, None) => fail(format!(
                    "Array index {idx} is out of bounds for array of size {}.",
                    items.len()
                )),
            }
        }
        other => unknown(other, "array"),
    }
}

fn array_contains(items: &[Value], needle: &Value) -> bool {
    items.iter().any(|item| match item {
        Value::Array(inner) if !matches!(needle, Value::Array(_)) => array_contains(inner, needle),
        other => other.loose_eq(needle),
    })
}

fn dict_method(map: &indexmap::IndexMap<String, Value>, args: Args) -> Result<Value> {
    args.finish()?;
    match args.name.as_str() {
        "has_key" => {
            args.expect_count(1, 1)?;
            Ok(Value::Bool(map.contains_key(&args.str_at(0)?)))
        }
        "get" => {
            args.expect_count(1, 2)?;
            let key = args.str_at(0)?;
            match (map.get(&key), args.positional.get(1)) {
                (Some(value), _) => Ok(value.clone()),
                (None, Some(fallback)) => Ok(fallback.clone()),
                (None, None) => fail(format!("Key '{key}' is not in the dictionary.")),
            }
        }
        "keys" => {
            args.no_positional()?;
            Ok(Value::Array(
                map.keys().sorted().cloned().map(Value::Str).collect(),
            ))
        }
        "values" => {
            args.no_positional()?;
            Ok(Value::Array(
                map.iter()
                    .sorted_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, v)| v.clone())
                    .collect(),
            ))
        }
        other => unknown(other, "dict"),
    }
}

fn feature_method(feature: FeatureOption, mut args: Args) -> Result<Value> {
    let state = feature.state;
    let name = args.name.clone();
    let with_state = |state: FeatureState| {
        Value::Feature(FeatureOption {
            name: feature.name.clone(),
            state,
        })
    };
    let value = match name.as_str() {
        "enabled" => Value::Bool(state == FeatureState::Enabled),
        "disabled" => Value::Bool(state == FeatureState::Disabled),
        "auto" => Value::Bool(state == FeatureState::Auto),
        "allowed" => Value::Bool(state != FeatureState::Disabled),
        "require" | "disable_if" | "enable_if" | "disable_auto_if" | "enable_auto_if" => {
            args.expect_count(1, 1)?;
            let condition = args.bool_at(0)?;
            let message = args.str("error_message")?.unwrap_or_default();
            let hit = if name == "require" { !condition } else { condition };
            let suffix = if message.is_empty() {
                String::new()
            } else {
                format!(": {message}")
            };
            match name.as_str() {
                "require" | "disable_if" if hit => {
                    if state == FeatureState::Enabled {
                        return fail(format!(
                            "Feature {} cannot be enabled{suffix}",
                            feature.name
                        ));
                    }
                    with_state(FeatureState::Disabled)
                }
                "enable_if" if hit => {
                    if state == FeatureState::Disabled {
                        return fail(format!(
                            "Feature {} cannot be disabled{suffix}",
                            feature.name
                        ));
                    }
                    with_state(FeatureState::Enabled)
                }
                "disable_auto_if" if hit && state == FeatureState::Auto => {
                    with_state(FeatureState::Disabled)
                }
                "enable_auto_if" if hit && state == FeatureState::Auto => {
                    with_state(FeatureState::Enabled)
                }
                _ => with_state(state),
            }
        }
        other => return unknown(other, "feature"),
    };
    if !matches!(
        name.as_str(),
        "require" | "disable_if" | "enable_if" | "disable_auto_if" | "enable_auto_if"
    ) {
        args.no_positional()?;
    }
    args.finish()?;
    Ok(value)
}

fn target_method(target: &Rc<Target>, args: Args) -> Result<Value> {
    no_args(&args)?;
    match args.name.as_str() {
        "name" => Ok(Value::Str(target.name.clone())),
        "found" => Ok(Value::Bool(true)),
        "full_path" | "path" => {
            let [only] = target.filename.as_slice() else {
                return fail(format!(
                    "full_path() can only be called on targets with exactly one output, {} has {}",
                    target.name,
                    target.filename.len()
                ));
            };
            Ok(Value::Str(only.to_string()))
        }
        "to_list" if !target.kind.is_build_target() => Ok(Value::Array(
            target
                .filename
                .iter()
                .filter_map(|p| p.file_name())
                .map(|name| {
                    Value::File(FileRef {
                        subdir: target.subdir.clone(),
                        name: name.to_owned(),
                        built: true,
                    })
                })
                .collect(),
        )),
        other => unknown(other, if target.kind.is_build_target() { "build_tgt" } else { "custom_tgt" }),
    }
}

fn dependency_method(dep: &Rc<Dependency>, mut args: Args) -> Result<Value> {
    match args.name.as_str() {
        "found" => no_args(&args).map(|()| Value::Bool(dep.found())),
        "name" => no_args(&args).map(|()| Value::Str(dep.name.clone())),
        "version" => no_args(&args).map(|()| Value::Str(dep.version.clone())),
        "type_name" => no_args(&args).map(|()| Value::Str(dep.kind.as_str().to_owned())),
        "include_type" => no_args(&args).map(|()| Value::Str("preserve".to_owned())),
        "get_variable" => {
            args.expect_count(0, 1)?;
            let positional = args.opt_str_at(0)?;
            let internal = args.str("internal")?;
            let default = args.str("default_value")?;
            args.ignore(&["pkgconfig", "cmake", "configtool", "pkgconfig_define"]);
            args.finish()?;
            let key = internal.or(positional);
            let found = key.as_deref().and_then(|k| dep.variables.get(k)).cloned();
            match found {
                Some(value) => Ok(Value::Str(value)),
                None => default.map(Value::Str).ok_or_else(|| {
                    InterpreterError::msg(format!(
                        "Could not get variable {} for dependency {}",
                        key.unwrap_or_default(),
                        dep.name
                    ))
                }),
            }
        }
        "partial_dependency" => {
            args.no_positional()?;
            let compile_args = args.bool("compile_args", false)?;
            let link_args = args.bool("link_args", false)?;
            let links = args.bool("links", false)?;
            let includes = args.bool("includes", false)?;
            let sources = args.bool("sources", false)?;
            args.finish()?;
            let mut partial = (**dep).clone();
            if !compile_args {
                partial.compile_args.clear();
            }
            if !link_args {
                partial.link_args.clear();
            }
            if !links {
                partial.link_with.clear();
            }
            if !includes {
                partial.include_directories.clear();
            }
            if !sources {
                partial.sources.clear();
            }
            Ok(Value::Dependency(Rc::new(partial)))
        }
        "as_system" | "as_link_whole" => {
            args.expect_count(0, 1)?;
            args.finish()?;
            Ok(Value::Dependency(Rc::clone(dep)))
        }
        other => unknown(other, "dep"),
    }
}

fn machine_method(info: &MachineInfo, args: &Args) -> Result<Value> {
    no_args(args)?;
    let value = match args.name.as_str() {
        "system" => &info.system,
        "cpu_family" => &info.cpu_family,
        "cpu" => &info.cpu,
        "endian" => &info.endian,
        other => return unknown(other, "machine"),
    };
    Ok(Value::Str(value.clone()))
}

fn env_method(env: &mut Environment, mut args: Args) -> Result<Value> {
    let action = match args.name.as_str() {
        "set" => EnvAction::Set,
        "append" => EnvAction::Append,
        "prepend" => EnvAction::Prepend,
        "unset" => EnvAction::Unset,
        other => return unknown(other, "env"),
    };
    args.flatten();
    let separator = args.str("separator")?.unwrap_or_else(|| ":".to_owned());
    args.finish()?;
    let (name, values) = if action == EnvAction::Unset {
        args.expect_count(1, 1)?;
        (args.str_at(0)?, Vec::new())
    } else {
        args.expect_count(2, usize::MAX)?;
        (args.str_at(0)?, args.strs_from(1)?)
    };
    env.ops.push(EnvOp {
        action,
        name,
        values,
        separator,
    });
    Ok(Value::Void)
}

fn program_method(program: &Rc<ExternalProgram>, args: Args) -> Result<Value> {
    no_args(&args)?;
    match args.name.as_str() {
        "found" => Ok(Value::Bool(program.found())),
        "full_path" | "path" => {
            if !program.found() {
                return fail("Unable to get the path of a not-found external program");
            }
            Ok(Value::Str(program.command.join(" ")))
        }
        "version" => program.version.clone().map(Value::Str).ok_or_else(|| {
            InterpreterError::msg(format!(
                "Version of program {} is unknown because programs are never run",
                program.name
            ))
        }),
        other => unknown(other, "external_program"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use rstest::rstest;

    fn call_str(s: &str, method: &str, positional: Vec<Value>) -> Result<Value> {
        str_method(s, Args::new(method, positional, IndexMap::new()))
    }

    fn text(value: Result<Value>) -> String {
        match value {
            Ok(Value::Str(s)) => s,
            other => panic!("expected a string, got {other:?}"),
        }
    }

    #[rstest]
    #[case("  padded \n", "strip", vec![], "padded")]
    #[case("xxhixx", "strip", vec![Value::Str("x".to_owned())], "hi")]
    #[case("a-b.c", "underscorify", vec![], "a_b_c")]
    #[case("Hello", "to_upper", vec![], "HELLO")]
    #[case("@0@-@1@@", "format", vec![Value::Str("a".to_owned()), Value::Int(2)], "a-2@")]
    #[case("hello", "substring", vec![Value::Int(1), Value::Int(-1)], "ell")]
    #[case("hello", "substring", vec![Value::Int(-3)], "llo")]
    #[case("hello", "substring", vec![Value::Int(4), Value::Int(2)], "")]
    #[case("a.b.a", "replace", vec![Value::Str("a".to_owned()), Value::Str("x".to_owned())], "x.b.x")]
    #[case(", ", "join", vec![Value::Array(vec![Value::Str("a".to_owned()), Value::Str("b".to_owned())])], "a, b")]
    fn string_methods(
        #[case] receiver: &str,
        #[case] method: &str,
        #[case] positional: Vec<Value>,
        #[case] expected: &str,
    ) {
        assert_eq!(text(call_str(receiver, method, positional)), expected);
    }

    #[rstest]
    #[case(" 42 ", Some(42))]
    #[case("-1_000", Some(-1000))]
    #[case("1__0", None)]
    #[case("0x10", None)]
    #[case("", None)]
    fn to_int_follows_integer_literal_rules(#[case] input: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_int(input), expected);
    }

    #[test]
    fn format_placeholder_out_of_range() {
        let err = call_str("@1@", "format", vec![Value::Int(0)])
            .err()
            .map(|e| e.message())
            .unwrap_or_default();
        assert_eq!(err, "Format placeholder @1@ out of range.");
    }

    #[test]
    fn split_without_separator_collapses_whitespace() {
        let parts = call_str(" a  b\tc ", "split", vec![]);
        let Ok(Value::Array(items)) = parts else {
            panic!("expected array");
        };
        let words: Vec<_> = items.iter().filter_map(|v| v.stringify(true)).collect();
        assert_eq!(words, ["a", "b", "c"]);
    }

    #[rstest]
    #[case(7, 3, "007")]
    #[case(-7, 3, "-07")]
    #[case(1234, 2, "1234")]
    fn int_to_string_fill(#[case] value: i64, #[case] fill: i64, #[case] expected: &str) {
        let mut kwargs = IndexMap::new();
        kwargs.insert("fill".to_owned(), Value::Int(fill));
        let result = int_method(value, Args::new("to_string", vec![], kwargs));
        assert_eq!(text(result), expected);
    }

    #[test]
    fn array_get_supports_negative_indices_and_fallback() {
        let items = vec![Value::Int(1), Value::Int(2)];
        let last = array_method(&items, Args::new("get", vec![Value::Int(-1)], IndexMap::new()));
        assert!(matches!(last, Ok(Value::Int(2))));
        let fallback = array_method(
            &items,
            Args::new("get", vec![Value::Int(5), Value::Str("x".to_owned())], IndexMap::new()),
        );
        assert_eq!(text(fallback), "x");
        let err = array_method(&items, Args::new("get", vec![Value::Int(2)], IndexMap::new()))
            .err()
            .map(|e| e.message())
            .unwrap_or_default();
        assert_eq!(err, "Array index 2 is out of bounds for array of size 2.");
    }

    #[rstest]
    #[case(FeatureState::Auto, "require", false, Some(FeatureState::Disabled))]
    #[case(FeatureState::Enabled, "require", false, None)]
    #[case(FeatureState::Auto, "enable_auto_if", true, Some(FeatureState::Enabled))]
    #[case(FeatureState::Disabled, "enable_auto_if", true, Some(FeatureState::Disabled))]
    #[case(FeatureState::Disabled, "enable_if", true, None)]
    fn feature_transitions(
        #[case] state: FeatureState,
        #[case] method: &str,
        #[case] condition: bool,
        #[case] expected: Option<FeatureState>,
    ) {
        let feature = FeatureOption {
            name: "opt".to_owned(),
            state,
        };
        let result = feature_method(
            feature,
            Args::new(method, vec![Value::Bool(condition)], IndexMap::new()),
        );
        match (result, expected) {
            (Ok(Value::Feature(f)), Some(want)) => assert_eq!(f.state, want),
            (Err(_), None) => {}
            (other, _) => panic!("unexpected {other:?}"),
        }
    }
}
