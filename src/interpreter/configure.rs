//! Configuration data objects and `configure_file()`.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use camino::Utf8Path;
use tracing::{debug, warn};

use super::args::Args;
use super::error::{InterpreterError, fail};
use super::value::{ConfData, ConfEntry, ConfValue, FileRef, Value};
use super::{Evaluation, Interpreter, Result};
use crate::model::InstallEntry;

const C_PRELUDE: &str =
    "/*\n * Autogenerated by the Meson build system.\n * Do not edit, your changes will be lost.\n */\n\n";
const NASM_PRELUDE: &str =
    "; Autogenerated by the Meson build system.\n; Do not edit, your changes will be lost.\n\n";

/// Placeholder syntax recognised in `configure_file()` inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Syntax {
    /// `@VAR@` and `#mesondefine`.
    Meson,
    /// `${VAR}`, `@VAR@` and `#cmakedefine`.
    Cmake,
    /// `@VAR@` and `#cmakedefine`.
    CmakeAt,
}

impl Syntax {
    fn parse(text: &str) -> Result<Self> {
        match text {
            "meson" => Ok(Self::Meson),
            "cmake" => Ok(Self::Cmake),
            "cmake@" => Ok(Self::CmakeAt),
            other => fail(format!(
                "configure_file keyword argument \"format\" must be one of meson, cmake, cmake@, not {other}"
            )),
        }
    }

    const fn define_token(self) -> &'static str {
        match self {
            Self::Meson => "#mesondefine",
            Self::Cmake | Self::CmakeAt => "#cmakedefine",
        }
    }
}

/// Result of substituting a template.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Substituted {
    /// Template with every reference replaced.
    pub text: String,
    /// Variables referenced but not defined, in order of first use.
    pub missing: Vec<String>,
}

impl Interpreter {
    pub(super) fn func_configuration_data(&mut self, args: Args) -> Result<Value> {
        args.expect_count(0, 1)?;
        args.finish()?;
        let mut data = ConfData::default();
        if let Some(initial) = args.positional.first() {
            let Value::Dict(map) = initial else {
                return fail(format!(
                    "configuration_data argument 1 was of type \"{}\" but should have been \"dict\"",
                    initial.type_name()
                ));
            };
            for (key, value) in map {
                let value = conf_value(value, "configuration_data")?;
                data.values.insert(key.clone(), ConfEntry { value, description: None });
            }
        }
        Ok(Value::ConfData(Rc::new(RefCell::new(data))))
    }

    pub(super) fn func_configure_file(&mut self, mut args: Args) -> Result<Value> {
        args.no_positional()?;
        let inputs: Vec<FileRef> = args
            .list("input")
            .into_iter()
            .map(|v| self.source_file(v, "configure_file"))
            .collect::<Result<_>>()?;
        let Some(output) = args.str("output")? else {
            return fail("configure_file missing required keyword argument \"output\"");
        };
        let configuration = args.take("configuration");
        let copy = args.bool("copy", false)?;
        let has_command = args.has("command");
        let install = args.bool("install", false)?;
        let install_dir = args.str("install_dir")?;
        let install_tag = args.str("install_tag")?;
        let syntax = Syntax::parse(&args.str("format")?.unwrap_or_else(|| "meson".to_owned()))?;
        let output_format = args.str("output_format")?.unwrap_or_else(|| "c".to_owned());
        let macro_name = args.str("macro_name")?;
        args.ignore(&["command", "capture", "depfile", "encoding", "install_mode"]);
        args.finish()?;

        let actions = usize::from(configuration.is_some()) + usize::from(copy) + usize::from(has_command);
        if actions == 0 {
            return fail("Must specify an action with one of these keyword arguments: 'configuration', 'command', or 'copy'.");
        }
        if actions > 1 {
            return fail("Must not specify more than one of 'configuration', 'command' and 'copy'.");
        }
        if has_command {
            return fail("configure_file(command : ...) is not supported: commands are never run.");
        }
        if inputs.len() > 1 {
            return fail("configure_file takes at most one input file when not using 'command'.");
        }
        if !matches!(output_format.as_str(), "c" | "nasm") {
            return fail(format!(
                "configure_file keyword argument \"output_format\" must be one of c, nasm, not {output_format}"
            ));
        }
        let input = inputs
            .first()
            .map(|f| f.absolute(&self.source_root, &self.build_root));
        let output = match &input {
            Some(path) => output
                .replace("@PLAINNAME@", path.file_name().unwrap_or_default())
                .replace("@BASENAME@", path.file_stem().unwrap_or_default()),
            None => output,
        };
        if output.is_empty() || output.contains(['/', '\\']) {
            return fail("Output file name must not contain a subdirectory.");
        }
        let out_path = self.current_build_dir().join(&output);
        if let Some(path) = &input {
            self.description.add_build_file(path.clone());
        }

        let text = if copy {
            let Some(path) = &input else {
                return fail("configure_file: \"copy\" requires an \"input\" file.");
            };
            self.read_input(path)?
        } else {
            let data = match configuration {
                Some(Value::ConfData(data)) => {
                    data.borrow_mut().used = true;
                    data.borrow().clone()
                }
                Some(Value::Dict(map)) => {
                    let mut data = ConfData::default();
                    for (key, value) in &map {
                        let value = conf_value(value, "configure_file")?;
                        data.values.insert(key.clone(), ConfEntry { value, description: None });
                    }
                    data
                }
                Some(other) => {
                    return fail(format!(
                        "configure_file keyword argument \"configuration\" was of type {} but should have been cfg_data | dict",
                        other.type_name()
                    ));
                }
                None => ConfData::default(),
            };
            match &input {
                Some(path) => {
                    let template = self.read_input(path)?;
                    let result = substitute_template(&template, &data, syntax)?;
                    if !result.missing.is_empty() {
                        warn!(
                            "The variable(s) {} in the input file '{}' are not present in the given configuration data.",
                            result.missing.iter().map(|m| format!("'{m}'")).collect::<Vec<_>>().join(", "),
                            self.subdir().join(inputs.first().map_or("", |f| f.name.as_str()))
                        );
                    }
                    result.text
                }
                None => {
                    if data.values.is_empty() {
                        warn!("Configuration data for {output} is empty.");
                    }
                    dump_header(&data, &output_format, macro_name.as_deref())?
                }
            }
        };
        debug!(path = %out_path, "configured file pending");
        self.generated.insert(out_path.clone(), text);

        if install {
            let Some(dir) = install_dir else {
                return fail("\"install_dir\" must be specified when \"install\" in a configure_file is true");
            };
            let destination = self.install_path(&dir).join(&output);
            self.description.install.push(InstallEntry {
                kind: "configure".to_owned(),
                source: out_path,
                destination,
                tag: install_tag,
            });
        }
        Ok(Value::File(FileRef {
            subdir: self.subdir().to_path_buf(),
            name: output,
            built: true,
        }))
    }

    pub(super) fn cfg_data_method(data: &Rc<RefCell<ConfData>>, mut args: Args) -> Result<Value> {
        match args.name.as_str() {
            "set" | "set10" | "set_quoted" => {
                args.expect_count(2, 2)?;
                let key = args.str_at(0)?;
                let description = args.str("description")?;
                args.finish()?;
                let value = match args.name.as_str() {
                    "set" => conf_value(args.at(1)?, "set")?,
                    "set10" => match args.at(1)? {
                        Value::Bool(b) => ConfValue::Int(i64::from(*b)),
                        Value::Int(i) => ConfValue::Int(i64::from(*i != 0)),
                        other => {
                            return fail(format!(
                                "set10 argument 2 was of type \"{}\" but should have been \"bool\"",
                                other.type_name()
                            ));
                        }
                    },
                    _ => {
                        let raw = args.str_at(1)?;
                        ConfValue::Str(format!("\"{}\"", raw.split('"').collect::<Vec<_>>().join("\\\"")))
                    }
                };
                let mut data = data.borrow_mut();
                if data.used {
                    return fail("Can not set values on configuration object that has been used.");
                }
                data.values.insert(key, ConfEntry { value, description });
                Ok(Value::Void)
            }
            "get" | "get_unquoted" => {
                args.expect_count(1, 2)?;
                let key = args.str_at(0)?;
                args.finish()?;
                let found = data.borrow().values.get(&key).map(|e| e.value.clone());
                match (found, args.positional.get(1)) {
                    (Some(ConfValue::Str(s)), _) if args.name == "get_unquoted" => {
                        let unquoted = s
                            .strip_prefix('"')
                            .and_then(|rest| rest.strip_suffix('"'))
                            .map_or_else(|| s.clone(), str::to_owned);
                        Ok(Value::Str(unquoted))
                    }
                    (Some(value), _) => Ok(value.to_value()),
                    (None, Some(fallback)) => Ok(fallback.clone()),
                    (None, None) => fail(format!("Entry {key} not in configuration data.")),
                }
            }
            "get_description" => {
                args.expect_count(1, 1)?;
                let key = args.str_at(0)?;
                args.finish()?;
                let data = data.borrow();
                let entry = data
                    .values
                    .get(&key)
                    .ok_or_else(|| InterpreterError::msg(format!("Entry {key} not in configuration data.")))?;
                Ok(Value::Str(entry.description.clone().unwrap_or_default()))
            }
            "has" => {
                args.expect_count(1, 1)?;
                let key = args.str_at(0)?;
                args.finish()?;
                Ok(Value::Bool(data.borrow().values.contains_key(&key)))
            }
            "keys" => {
                args.no_positional()?;
                args.finish()?;
                let mut keys: Vec<_> = data.borrow().values.keys().cloned().collect();
                keys.sort();
                Ok(Value::Array(keys.into_iter().map(Value::Str).collect()))
            }
            "merge_from" => {
                args.expect_count(1, 1)?;
                args.finish()?;
                let Value::ConfData(other) = args.at(0)? else {
                    return fail(format!(
                        "merge_from argument 1 was of type \"{}\" but should have been \"cfg_data\"",
                        args.at(0)?.type_name()
                    ));
                };
                if Rc::ptr_eq(data, other) {
                    return Ok(Value::Void);
                }
                let entries = other.borrow().values.clone();
                let mut data = data.borrow_mut();
                if data.used {
                    return fail("Can not set values on configuration object that has been used.");
                }
                data.values.extend(entries);
                Ok(Value::Void)
            }
            other => fail(format!("Unknown method \"{other}\" in object cfg_data.")),
        }
    }
}

fn conf_value(value: &Value, fname: &str) -> Result<ConfValue> {
    match value {
        Value::Bool(b) => Ok(ConfValue::Bool(*b)),
        Value::Int(i) => Ok(ConfValue::Int(*i)),
        Value::Str(s) => Ok(ConfValue::Str(s.clone())),
        other => fail(format!(
            "{fname}: configuration values must be strings, integers or booleans, not {}",
            other.type_name()
        )),
    }
}

impl Interpreter {
    /// Contents of a `configure_file()` input, which may itself be the
    /// output of an earlier call that has not been written yet.
    fn read_input(&self, path: &Utf8Path) -> Result<String> {
        if let Some(text) = self.generated.get(path) {
            return Ok(text.clone());
        }
        fs::read_to_string(path).map_err(|source| InterpreterError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Evaluation {
    /// Write the files produced by `configure_file()`.
    ///
    /// Files that already hold the generated text are left untouched so
    /// their timestamps survive a reconfigure.
    ///
    /// # Errors
    ///
    /// Returns [`InterpreterError::Io`] when a file cannot be written.
    pub fn write_generated(&self) -> Result<()> {
        for (path, text) in &self.generated {
            write_if_changed(path, text)?;
        }
        Ok(())
    }
}

/// Write `text` unless the file already holds it.
fn write_if_changed(path: &Utf8Path, text: &str) -> Result<()> {
    if fs::read_to_string(path).is_ok_and(|old| old == text) {
        debug!(%path, "configured file unchanged");
        return Ok(());
    }
    let io_err = |source| InterpreterError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, text).map_err(io_err)
}

/// Substitute a `configure_file()` input.
///
/// # Errors
///
/// Fails for malformed define lines and for booleans used as `@VAR@`.
pub(crate) fn substitute_template(
    template: &str,
    data: &ConfData,
    syntax: Syntax,
) -> Result<Substituted> {
    let mut result = Substituted::default();
    for line in template.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(syntax.define_token()) {
            let (body, newline) = split_newline(line);
            let defined = match syntax {
                Syntax::Meson => mesondefine(body, data)?,
                Syntax::Cmake | Syntax::CmakeAt => cmakedefine(body, data, syntax, &mut result.missing)?,
            };
            result.text.push_str(&defined);
            result.text.push_str(newline);
        } else {
            let substituted = substitute_line(line, data, syntax, &mut result.missing)?;
            result.text.push_str(&substituted);
        }
    }
    Ok(result)
}

fn split_newline(line: &str) -> (&str, &str) {
    match line.strip_suffix("\r\n") {
        Some(body) => (body, "\r\n"),
        None => match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        },
    }
}

fn mesondefine(line: &str, data: &ConfData) -> Result<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [_, name] = tokens.as_slice() else {
        return fail(format!(
            "#mesondefine does not contain exactly two tokens: {}",
            line.trim()
        ));
    };
    Ok(match data.values.get(*name).map(|e| &e.value) {
        None => format!("/* #undef {name} */"),
        Some(ConfValue::Bool(true)) => format!("#define {name}"),
        Some(ConfValue::Bool(false)) => format!("#undef {name}"),
        Some(ConfValue::Int(i)) => format!("#define {name} {i}"),
        Some(ConfValue::Str(s)) => format!("#define {name} {s}"),
    })
}

fn cmakedefine(
    line: &str,
    data: &ConfData,
    syntax: Syntax,
    missing: &mut Vec<String>,
) -> Result<String> {
    let trimmed = line.trim_start();
    let is_01 = trimmed.starts_with("#cmakedefine01");
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if is_01 && tokens.len() != 2 {
        return fail(format!(
            "#cmakedefine01 does not contain exactly two tokens: {}",
            line.trim()
        ));
    }
    let Some(name) = tokens.get(1) else {
        return fail(format!(
            "#cmakedefine does not contain a variable name: {}",
            line.trim()
        ));
    };
    let value = data.values.get(*name).map(|e| &e.value);
    let truthy = match value {
        None | Some(ConfValue::Bool(false) | ConfValue::Int(0)) => false,
        Some(ConfValue::Str(s)) => !matches!(
            s.to_uppercase().as_str(),
            "" | "0" | "OFF" | "NO" | "FALSE" | "N" | "IGNORE" | "NOTFOUND"
        ),
        Some(_) => true,
    };
    if is_01 {
        return Ok(format!("#define {name} {}", u8::from(truthy)));
    }
    if !truthy {
        return Ok(format!("/* #undef {name} */"));
    }
    let rest = trimmed
        .split_once(*name)
        .map_or("", |(_, rest)| rest)
        .trim();
    if rest.is_empty() {
        return Ok(format!("#define {name}"));
    }
    let rest = substitute_line(rest, data, syntax, missing)?;
    Ok(format!("#define {name} {rest}"))
}

/// Replace placeholders in one line.
fn substitute_line(
    line: &str,
    data: &ConfData,
    syntax: Syntax,
    missing: &mut Vec<String>,
) -> Result<String> {
    let dollar = syntax == Syntax::Cmake;
    let escapes = syntax != Syntax::CmakeAt;
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while !rest.is_empty() {
        if escapes && rest.starts_with('\\') {
            let after = rest.trim_start_matches('\\');
            let run = rest.len() - after.len();
            let escapes_at = after.starts_with('@') || (dollar && after.starts_with("${"));
            if escapes_at {
                out.push_str(&"\\".repeat(run.div_euclid(2)));
                rest = after;
                if !run.is_multiple_of(2) {
                    let literal = if after.starts_with('@') { "@" } else { "${" };
                    out.push_str(literal);
                    rest = after.get(literal.len()..).unwrap_or_default();
                }
            } else {
                out.push_str(&"\\".repeat(run));
                rest = after;
            }
            continue;
        }
        if let Some(tail) = rest.strip_prefix('@')
            && let Some((name, after)) = placeholder(tail, '@')
        {
            out.push_str(&lookup(data, name, missing)?);
            rest = after;
            continue;
        }
        if dollar
            && let Some(tail) = rest.strip_prefix("${")
            && let Some((name, after)) = placeholder(tail, '}')
        {
            out.push_str(&lookup(data, name, missing)?);
            rest = after;
            continue;
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            out.push(ch);
        }
        rest = chars.as_str();
    }
    Ok(out)
}

/// Variable name at the start of `text` terminated by `end`.
/// Split a placeholder name off `text`, returning it and the text after `end`.
fn placeholder(text: &str, end: char) -> Option<(&str, &str)> {
    let len = text
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'))
        .count();
    let (name, tail) = text.split_at_checked(len)?;
    let after = tail.strip_prefix(end)?;
    (!name.is_empty()).then_some((name, after))
}

fn lookup(data: &ConfData, name: &str, missing: &mut Vec<String>) -> Result<String> {
    match data.values.get(name).map(|e| &e.value) {
        Some(ConfValue::Str(s)) => Ok(s.clone()),
        Some(ConfValue::Int(i)) => Ok(i.to_string()),
        Some(ConfValue::Bool(b)) => fail(format!(
            "Tried to replace variable '{name}' value with something other than a string or int: {}",
            if *b { "True" } else { "False" }
        )),
        None => {
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_owned());
            }
            Ok(String::new())
        }
    }
}

/// Generate a header from configuration data alone.
pub(crate) fn dump_header(data: &ConfData, format: &str, macro_name: Option<&str>) -> Result<String> {
    let (mut out, prefix) = if format == "nasm" {
        (NASM_PRELUDE.to_owned(), '%')
    } else {
        let mut prelude = C_PRELUDE.to_owned();
        match macro_name {
            Some(guard) => prelude.push_str(&format!("#ifndef {guard}\n#define {guard}\n\n")),
            None => prelude.push_str("#pragma once\n\n"),
        }
        (prelude, '#')
    };
    let mut keys: Vec<&String> = data.values.keys().collect();
    keys.sort();
    for key in keys {
        let Some(entry) = data.values.get(key) else {
            continue;
        };
        if let Some(description) = &entry.description {
            if format == "nasm" {
                for line in description.lines() {
                    out.push_str(&format!("; {line}\n"));
                }
            } else {
                out.push_str(&format!("/* {description} */\n"));
            }
        }
        match &entry.value {
            ConfValue::Bool(true) => out.push_str(&format!("{prefix}define {key}\n\n")),
            ConfValue::Bool(false) => out.push_str(&format!("{prefix}undef {key}\n\n")),
            ConfValue::Int(i) => out.push_str(&format!("{prefix}define {key} {i}\n\n")),
            ConfValue::Str(s) => out.push_str(&format!("{prefix}define {key} {s}\n\n")),
        }
    }
    if format != "nasm" && macro_name.is_some() {
        out.push_str("#endif\n");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result as AnyResult, ensure};
    use rstest::{fixture, rstest};

    #[fixture]
    fn data() -> ConfData {
        let mut data = ConfData::default();
        for (key, value) in [
            ("NAME", ConfValue::Str("demo".to_owned())),
            ("COUNT", ConfValue::Int(3)),
            ("HAVE_X", ConfValue::Bool(true)),
            ("HAVE_Y", ConfValue::Bool(false)),
        ] {
            data.values.insert(key.to_owned(), ConfEntry { value, description: None });
        }
        data
    }

    #[rstest]
    #[case("name=@NAME@ n=@COUNT@\n", "name=demo n=3\n")]
    #[case("mail@example.com\n", "mail@example.com\n")]
    #[case("\\@NAME@\n", "@NAME@\n")]
    #[case("\\\\@NAME@\n", "\\demo\n")]
    #[case("\\\\\\@NAME@\n", "\\@NAME@\n")]
    #[case("path\\to @NAME@\n", "path\\to demo\n")]
    #[case("é=@NAME@ @\n", "é=demo @\n")]
    #[case("#mesondefine HAVE_X\n", "#define HAVE_X\n")]
    #[case("#mesondefine HAVE_Y\n", "#undef HAVE_Y\n")]
    #[case("#mesondefine COUNT\n", "#define COUNT 3\n")]
    #[case("#mesondefine MISSING\n", "/* #undef MISSING */\n")]
    fn meson_substitution(data: ConfData, #[case] input: &str, #[case] expected: &str) -> AnyResult<()> {
        let result = substitute_template(input, &data, Syntax::Meson)?;
        ensure!(result.text == expected, "got {:?}", result.text);
        ensure!(result.missing.is_empty());
        Ok(())
    }

    #[rstest]
    fn missing_variables_are_blanked(data: ConfData) -> AnyResult<()> {
        let result = substitute_template("a=@A@ b=@B@ a=@A@\n", &data, Syntax::Meson)?;
        ensure!(result.text == "a= b= a=\n");
        ensure!(result.missing == ["A", "B"]);
        Ok(())
    }

    #[rstest]
    #[case("@HAVE_X@", "something other than a string or int")]
    #[case("#mesondefine A B", "does not contain exactly two tokens")]
    fn substitution_errors(data: ConfData, #[case] input: &str, #[case] fragment: &str) {
        let err = substitute_template(input, &data, Syntax::Meson)
            .err()
            .map(|e| e.message())
            .unwrap_or_default();
        assert!(err.contains(fragment), "{err}");
    }

    #[rstest]
    #[case("v=${NAME} @COUNT@\n", Syntax::Cmake, "v=demo 3\n")]
    #[case("v=${NAME}\n", Syntax::CmakeAt, "v=${NAME}\n")]
    #[case("v=\\${NAME}\n", Syntax::Cmake, "v=${NAME}\n")]
    #[case("#cmakedefine HAVE_X\n", Syntax::Cmake, "#define HAVE_X\n")]
    #[case("#cmakedefine HAVE_Y\n", Syntax::Cmake, "/* #undef HAVE_Y */\n")]
    #[case("#cmakedefine NAME \"@NAME@\"\n", Syntax::Cmake, "#define NAME \"demo\"\n")]
    #[case("#cmakedefine01 HAVE_Y\n", Syntax::Cmake, "#define HAVE_Y 0\n")]
    fn cmake_substitution(
        data: ConfData,
        #[case] input: &str,
        #[case] syntax: Syntax,
        #[case] expected: &str,
    ) -> AnyResult<()> {
        let result = substitute_template(input, &data, syntax)?;
        ensure!(result.text == expected, "got {:?}", result.text);
        Ok(())
    }

    #[rstest]
    fn header_is_sorted_with_descriptions(mut data: ConfData) -> AnyResult<()> {
        if let Some(entry) = data.values.get_mut("COUNT") {
            entry.description = Some("How many".to_owned());
        }
        let header = dump_header(&data, "c", None)?;
        insta::assert_snapshot!(header, @r###"
        /*
         * Autogenerated by the Meson build system.
         * Do not edit, your changes will be lost.
         */

        #pragma once

        /* How many */
        #define COUNT 3

        #define HAVE_X

        #undef HAVE_Y

        #define NAME demo

        "###);
        Ok(())
    }

    #[rstest]
    fn header_guard_and_nasm(data: ConfData) -> AnyResult<()> {
        let guarded = dump_header(&data, "c", Some("CONFIG_H"))?;
        ensure!(guarded.contains("#ifndef CONFIG_H\n#define CONFIG_H\n\n"));
        ensure!(guarded.ends_with("#endif\n"));
        let nasm = dump_header(&data, "nasm", None)?;
        ensure!(nasm.starts_with("; Autogenerated"));
        ensure!(nasm.contains("%define COUNT 3\n"));
        ensure!(nasm.contains("%undef HAVE_Y\n"));
        Ok(())
    }
}
