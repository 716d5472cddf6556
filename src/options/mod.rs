//! Build options: kinds, values, the built-in table and the layered store.
//!
//! Option values are set, lowest precedence first, from the option default,
//! the project's `default_options`, machine-file `[built-in options]` and
//! `[project options]` sections, and `-Dkey=value` on the command line.
//! Callers merge those layers into one ordered map and hand it to
//! [`OptionStore::apply`].

mod file;

pub use file::{OPTION_FILE_NAMES, OptionFileError, parse_option_file};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;
use serde_json::{Value as Json, json};
use thiserror::Error;
use tracing::debug;

use crate::literal::{Literal, eval_constant};
use crate::parser::parse_expression;

/// Errors raised when declaring or assigning options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    /// The key names no known option.
    #[error("Unknown option: \"{0}\"")]
    Unknown(String),
    /// Several `-D` keys named no known option.
    #[error("Unknown options: {0}")]
    UnknownMany(String),
    /// A `-D` argument without `=`.
    #[error("Option {0:?} must have a value separated by equals sign.")]
    MissingValue(String),
    /// Boolean parse failure.
    #[error("Value {value} is not boolean (true or false).")]
    NotBoolean {
        /// Offending text.
        value: String,
    },
    /// Integer parse failure.
    #[error("Value string \"{value}\" for option \"{name}\" is not convertible to an integer.")]
    NotInteger {
        /// Option key.
        name: String,
        /// Offending text.
        value: String,
    },
    /// Integer below its minimum.
    #[error("New value {value} is less than minimum value {min}.")]
    BelowMinimum {
        /// Rejected value.
        value: i64,
        /// Declared minimum.
        min: i64,
    },
    /// Integer above its maximum.
    #[error("New value {value} is more than maximum value {max}.")]
    AboveMaximum {
        /// Rejected value.
        value: i64,
        /// Declared maximum.
        max: i64,
    },
    /// Combo value outside its choices.
    #[error(
        "Value \"{value}\" for combo option \"{name}\" is not one of the choices. Possible choices are: {choices}."
    )]
    NotAChoice {
        /// Option key.
        name: String,
        /// Rejected value.
        value: String,
        /// Quoted, comma-separated choices.
        choices: String,
    },
    /// Array elements outside the declared choices.
    #[error("Options \"{bad}\" are not in allowed choices: \"{choices}\"")]
    ArrayChoices {
        /// Rejected elements.
        bad: String,
        /// Permitted elements.
        choices: String,
    },
    /// A value that is not a string array.
    #[error("\"{0}\" should be a string array, but it is not")]
    NotArray(String),
    /// Feature value outside enabled/disabled/auto.
    #[error("Value \"{value}\" for feature option \"{name}\" must be one of enabled, disabled or auto.")]
    NotFeature {
        /// Option key.
        name: String,
        /// Rejected value.
        value: String,
    },
    /// Typed value of the wrong kind, for example a bool for a string.
    #[error("Value {value} for option \"{name}\" is not of type {expected}.")]
    WrongType {
        /// Option key.
        name: String,
        /// Rejected value.
        value: String,
        /// Expected option kind.
        expected: &'static str,
    },
    /// `prefix` must be absolute.
    #[error("prefix value {0:?} must be an absolute path")]
    RelativePrefix(String),
    /// Absolute directory option outside the prefix.
    #[error(
        "The value of the {option:?} option is {value:?} which must be a subdir of the prefix {prefix:?}.\nNote that if you pass a relative path, it is assumed to be a subdir of prefix."
    )]
    OutsidePrefix {
        /// Option key.
        option: String,
        /// Rejected value.
        value: String,
        /// Current prefix.
        prefix: String,
    },
    /// A project option with a name that may not be declared.
    #[error("Option name {0} is reserved.")]
    Reserved(String),
    /// Illegal characters in an option name.
    #[error("Option names can only contain letters, numbers or dashes: {0:?}")]
    InvalidName(String),
    /// The same option declared twice.
    #[error("Option \"{0}\" already exists.")]
    Duplicate(String),
}

/// Prefixes reserved for compiler and base options.
pub const RESERVED_PREFIXES: [&str; 11] = [
    "c_", "cpp_", "d_", "rust_", "fortran_", "objc_", "objcpp_", "vala_", "csharp_", "swift_",
    "b_",
];

/// Language prefixes that may be set without being declared.
const LANGUAGE_PREFIXES: [&str; 10] = [
    "c_", "cpp_", "d_", "rust_", "fortran_", "objc_", "objcpp_", "vala_", "csharp_", "swift_",
];

/// Directory options whose default moves outside the prefix for some
/// common prefixes.
const NOPREFIX_DEFAULTS: [(&str, &str, &str); 5] = [
    ("sysconfdir", "/usr", "/etc"),
    ("localstatedir", "/usr", "/var"),
    ("localstatedir", "/usr/local", "/var/local"),
    ("sharedstatedir", "/usr", "/var/lib"),
    ("sharedstatedir", "/usr/local", "/var/local/lib"),
];

const DEFAULT_PREFIX: &str = "/usr/local";

/// `(buildtype, debug, optimization)`
const BUILDTYPES: [(&str, bool, &str); 5] = [
    ("plain", false, "plain"),
    ("debug", true, "0"),
    ("debugoptimized", true, "2"),
    ("release", false, "3"),
    ("minsize", false, "s"),
];

/// State of a feature option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureState {
    /// Explicitly requested.
    Enabled,
    /// Explicitly refused.
    Disabled,
    /// Decided by `auto_features` or the project.
    Auto,
}

impl FeatureState {
    /// Parse `enabled`, `disabled` or `auto`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Lowercase spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Auto => "auto",
        }
    }
}

/// Kind of an option together with its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionKind {
    /// Free-form string.
    String,
    /// `true` or `false`.
    Boolean,
    /// One of a fixed set of strings.
    Combo {
        /// Permitted values.
        choices: Vec<String>,
    },
    /// Integer with optional bounds.
    Integer {
        /// Smallest permitted value.
        min: Option<i64>,
        /// Largest permitted value.
        max: Option<i64>,
    },
    /// List of strings, optionally drawn from fixed choices.
    Array {
        /// Permitted elements; empty means unrestricted.
        choices: Vec<String>,
    },
    /// Enabled, disabled or auto.
    Feature,
}

impl OptionKind {
    /// Name used in `option(type : ...)` and introspection.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Combo { .. } => "combo",
            Self::Integer { .. } => "integer",
            Self::Array { .. } => "array",
            Self::Feature => "feature",
        }
    }
}

/// Current value of an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean option value.
    Boolean(bool),
    /// Integer option value.
    Integer(i64),
    /// String or combo option value.
    String(String),
    /// Array option value.
    Array(Vec<String>),
    /// Feature option value.
    Feature(FeatureState),
}

impl OptionValue {
    /// Render the value the way `-D` would spell it.
    #[must_use]
    pub fn to_cli_string(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::String(s) => s.clone(),
            Self::Array(items) => items.join(","),
            Self::Feature(state) => state.as_str().to_owned(),
        }
    }
}

/// Grouping shown by `configure` and `introspect --buildoptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSection {
    /// Core built-in options.
    Core,
    /// Installation directories.
    Directory,
    /// Base options shared by all compilers.
    Base,
    /// Language options accepted without a compiler.
    Compiler,
    /// Options declared in `meson.options`.
    User,
}

/// A declared option and its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserOption {
    /// Option name without subproject qualifier.
    pub name: String,
    /// Owning subproject; empty for the main project and built-ins.
    pub subproject: String,
    /// Help text.
    pub description: String,
    /// Kind and constraints.
    pub kind: OptionKind,
    /// Current value.
    pub value: OptionValue,
    /// Grouping.
    pub section: OptionSection,
    /// Whether a subproject option takes the parent's value of the same
    /// name and kind.
    pub yielding: bool,
    /// Whether the option is deprecated.
    pub deprecated: bool,
}

impl UserOption {
    /// Build an option and validate its default.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] when `value` does not fit `kind`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: OptionKind,
        value: OptionValue,
        section: OptionSection,
    ) -> Result<Self, OptionError> {
        let mut option = Self {
            name: name.into(),
            subproject: String::new(),
            description: description.into(),
            value: OptionValue::Boolean(false),
            kind,
            section,
            yielding: false,
            deprecated: false,
        };
        option.value = option.validate(value)?;
        Ok(option)
    }

    /// Key used by `-D` and the store: `sub:name` or `name`.
    #[must_use]
    pub fn key(&self) -> String {
        if self.subproject.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.subproject, self.name)
        }
    }

    /// Check a typed value against the option's kind.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] describing the mismatch.
    pub fn validate(&self, value: OptionValue) -> Result<OptionValue, OptionError> {
        let name = self.key();
        let wrong = |value: &OptionValue| OptionError::WrongType {
            name: name.clone(),
            value: value.to_cli_string(),
            expected: self.kind.name(),
        };
        match (&self.kind, value) {
            (OptionKind::String, OptionValue::String(s)) => Ok(OptionValue::String(s)),
            (OptionKind::Boolean, OptionValue::Boolean(b)) => Ok(OptionValue::Boolean(b)),
            (OptionKind::Boolean, OptionValue::String(s)) => self.parse_value(&s),
            (OptionKind::Combo { choices }, OptionValue::String(s)) => {
                if choices.contains(&s) {
                    Ok(OptionValue::String(s))
                } else {
                    Err(OptionError::NotAChoice {
                        name,
                        value: s,
                        choices: choices.iter().map(|c| format!("\"{c}\"")).join(", "),
                    })
                }
            }
            (OptionKind::Integer { min, max }, OptionValue::Integer(i)) => {
                if let Some(min) = *min {
                    if i < min {
                        return Err(OptionError::BelowMinimum { value: i, min });
                    }
                }
                if let Some(max) = *max {
                    if i > max {
                        return Err(OptionError::AboveMaximum { value: i, max });
                    }
                }
                Ok(OptionValue::Integer(i))
            }
            (OptionKind::Integer { .. }, OptionValue::String(s)) => self.parse_value(&s),
            (OptionKind::Array { choices }, OptionValue::Array(items)) => {
                if !choices.is_empty() {
                    let bad: Vec<_> = items.iter().filter(|i| !choices.contains(i)).collect();
                    if !bad.is_empty() {
                        return Err(OptionError::ArrayChoices {
                            bad: bad.iter().join(", "),
                            choices: choices.join(", "),
                        });
                    }
                }
                Ok(OptionValue::Array(items))
            }
            (OptionKind::Array { .. }, OptionValue::String(s)) => self.parse_value(&s),
            (OptionKind::Feature, OptionValue::Feature(state)) => Ok(OptionValue::Feature(state)),
            (OptionKind::Feature, OptionValue::String(s)) => self.parse_value(&s),
            (_, other) => Err(wrong(&other)),
        }
    }

    /// Parse the textual form used by `-D` and machine files.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] when `text` is not a valid value.
    pub fn parse_value(&self, text: &str) -> Result<OptionValue, OptionError> {
        match &self.kind {
            OptionKind::String | OptionKind::Combo { .. } => {
                self.validate(OptionValue::String(text.to_owned()))
            }
            OptionKind::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(OptionValue::Boolean(true)),
                "false" => Ok(OptionValue::Boolean(false)),
                _ => Err(OptionError::NotBoolean {
                    value: text.to_owned(),
                }),
            },
            OptionKind::Integer { .. } => {
                let value = text.trim().parse::<i64>().map_err(|_| OptionError::NotInteger {
                    name: self.key(),
                    value: text.to_owned(),
                })?;
                self.validate(OptionValue::Integer(value))
            }
            OptionKind::Array { .. } => self.validate(OptionValue::Array(parse_array(text)?)),
            OptionKind::Feature => FeatureState::parse(text)
                .map(OptionValue::Feature)
                .ok_or_else(|| OptionError::NotFeature {
                    name: self.key(),
                    value: text.to_owned(),
                }),
        }
    }

    /// Convert a constant from an option file or machine file into a value.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] when the constant does not fit the kind.
    pub fn value_from_literal(&self, literal: &Literal) -> Result<OptionValue, OptionError> {
        let value = match literal {
            Literal::Bool(b) => OptionValue::Boolean(*b),
            Literal::Int(i) => OptionValue::Integer(*i),
            Literal::Str(s) => OptionValue::String(s.clone()),
            Literal::Array(_) => OptionValue::Array(
                literal
                    .to_string_list()
                    .ok_or_else(|| OptionError::NotArray(literal.to_string()))?,
            ),
        };
        self.validate(value)
    }

    /// Introspection record for `intro-buildoptions.json`.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let extras = match &self.kind {
            OptionKind::Combo { choices } => vec![("choices", json!(choices))],
            OptionKind::Array { choices } if !choices.is_empty() => {
                vec![("choices", json!(choices))]
            }
            OptionKind::Boolean => vec![("choices", json!([true, false]))],
            OptionKind::Feature => vec![("choices", json!(["enabled", "disabled", "auto"]))],
            OptionKind::Integer { min, max } => vec![("min", json!(min)), ("max", json!(max))],
            _ => Vec::new(),
        };
        let fields = [
            ("name", json!(self.key())),
            ("value", json!(self.value)),
            ("section", json!(self.section)),
            ("machine", json!("any")),
            ("type", json!(self.kind.name())),
            ("description", json!(self.description)),
        ];
        Json::Object(
            fields
                .into_iter()
                .chain(extras)
                .map(|(key, value)| (key.to_owned(), value))
                .collect(),
        )
    }
}

/// Parse an array option from `a,b,c` or a `['a', 'b']` literal.
///
/// # Errors
///
/// Returns [`OptionError::NotArray`] when a literal is not an array of
/// strings.
pub fn parse_array(text: &str) -> Result<Vec<String>, OptionError> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        let not_array = || OptionError::NotArray(text.to_owned());
        let expr = parse_expression(trimmed, "option value").map_err(|_| not_array())?;
        let literal = eval_constant(&expr, &|_| None).map_err(|_| not_array())?;
        return match literal {
            Literal::Array(_) => literal.to_string_list().ok_or_else(not_array),
            _ => Err(not_array()),
        };
    }
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(trimmed.split(',').map(|s| s.trim().to_owned()).collect())
}

/// Validate a project option name.
///
/// # Errors
///
/// Returns [`OptionError::InvalidName`] for illegal characters and
/// [`OptionError::Reserved`] for built-in names or reserved prefixes.
pub fn check_option_name(name: &str) -> Result<(), OptionError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(OptionError::InvalidName(name.to_owned()));
    }
    let reserved_prefix = name
        .split_once('_')
        .is_some_and(|(head, _)| RESERVED_PREFIXES.contains(&format!("{head}_").as_str()));
    if reserved_prefix || builtin_options().iter().any(|o| o.name == name) {
        return Err(OptionError::Reserved(name.to_owned()));
    }
    Ok(())
}

fn string_opt(name: &str, description: &str, value: &str, section: OptionSection) -> UserOption {
    UserOption {
        name: name.to_owned(),
        subproject: String::new(),
        description: description.to_owned(),
        kind: OptionKind::String,
        value: OptionValue::String(value.to_owned()),
        section,
        yielding: false,
        deprecated: false,
    }
}

fn bool_opt(name: &str, description: &str, value: bool, section: OptionSection) -> UserOption {
    UserOption {
        kind: OptionKind::Boolean,
        value: OptionValue::Boolean(value),
        ..string_opt(name, description, "", section)
    }
}

fn combo_opt(
    name: &str,
    description: &str,
    choices: &[&str],
    value: &str,
    section: OptionSection,
) -> UserOption {
    UserOption {
        kind: OptionKind::Combo {
            choices: choices.iter().map(|&c| c.to_owned()).collect(),
        },
        ..string_opt(name, description, value, section)
    }
}

/// The built-in option table with default values.
#[must_use]
pub fn builtin_options() -> Vec<UserOption> {
    use OptionSection::{Base, Core, Directory};
    vec![
        string_opt("prefix", "Installation prefix", DEFAULT_PREFIX, Directory),
        string_opt("bindir", "Executable directory", "bin", Directory),
        string_opt("datadir", "Data file directory", "share", Directory),
        string_opt("includedir", "Header file directory", "include", Directory),
        string_opt("infodir", "Info page directory", "share/info", Directory),
        string_opt("libdir", "Library directory", "lib", Directory),
        string_opt("libexecdir", "Library executable directory", "libexec", Directory),
        string_opt("localedir", "Locale data directory", "share/locale", Directory),
        string_opt("localstatedir", "Localstate data directory", "var", Directory),
        string_opt("mandir", "Manual page directory", "share/man", Directory),
        string_opt("sbindir", "System executable directory", "sbin", Directory),
        string_opt("sharedstatedir", "Architecture-independent data directory", "com", Directory),
        string_opt("sysconfdir", "Sysconf data directory", "etc", Directory),
        combo_opt(
            "buildtype",
            "Build type to use",
            &["plain", "debug", "debugoptimized", "release", "minsize", "custom"],
            "debug",
            Core,
        ),
        bool_opt("debug", "Enable debug symbols and other information", true, Core),
        combo_opt(
            "optimization",
            "Optimization level",
            &["plain", "0", "g", "1", "2", "3", "s"],
            "0",
            Core,
        ),
        combo_opt(
            "warning_level",
            "Compiler warning level to use",
            &["0", "1", "2", "3", "everything"],
            "1",
            Core,
        ),
        bool_opt("werror", "Treat warnings as errors", false, Core),
        combo_opt(
            "default_library",
            "Default library type",
            &["shared", "static", "both"],
            "shared",
            Core,
        ),
        combo_opt(
            "backend",
            "Backend to use",
            &["ninja", "vs", "vs2010", "vs2015", "vs2017", "vs2019", "vs2022", "xcode", "none"],
            "ninja",
            Core,
        ),
        bool_opt("strip", "Strip targets on install", false, Core),
        combo_opt("unity", "Unity build", &["on", "off", "subprojects"], "off", Core),
        combo_opt("layout", "Build directory layout", &["mirror", "flat"], "mirror", Core),
        combo_opt(
            "wrap_mode",
            "Wrap mode",
            &["default", "nofallback", "nodownload", "forcefallback", "nopromote"],
            "default",
            Core,
        ),
        UserOption {
            kind: OptionKind::Feature,
            value: OptionValue::Feature(FeatureState::Auto),
            ..string_opt("auto_features", "Override value of all 'auto' features", "", Core)
        },
        bool_opt("stdsplit", "Split stdout and stderr in test logs", true, Core),
        bool_opt("errorlogs", "Whether to print the logs from failing tests", true, Core),
        combo_opt(
            "b_ndebug",
            "Disable asserts",
            &["true", "false", "if-release"],
            "false",
            Base,
        ),
        bool_opt("b_lto", "Use link time optimization", false, Base),
        bool_opt("b_staticpic", "Build static libraries as position independent", true, Base),
        bool_opt("b_pie", "Build executables as position independent", false, Base),
        bool_opt("b_coverage", "Enable coverage tracking.", false, Base),
        combo_opt(
            "b_sanitize",
            "Code sanitizer to use",
            &["none", "address", "thread", "undefined", "memory", "leak", "address,undefined"],
            "none",
            Base,
        ),
    ]
}

/// All options known to a configured project, keyed by `-D` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionStore {
    options: IndexMap<String, UserOption>,
}

impl Default for OptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionStore {
    /// A store holding the built-in options at their defaults.
    #[must_use]
    pub fn new() -> Self {
        let mut options: IndexMap<String, UserOption> = builtin_options()
            .into_iter()
            .map(|o| (o.key(), o))
            .collect();
        for (option, when, value) in NOPREFIX_DEFAULTS {
            if when == DEFAULT_PREFIX {
                if let Some(opt) = options.get_mut(option) {
                    opt.value = OptionValue::String(value.to_owned());
                }
            }
        }
        Self { options }
    }

    /// Look up an option by `-D` key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&UserOption> {
        self.options.get(key)
    }

    /// Whether `key` names a known option.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Resolve `get_option(name)` as seen from `subproject`.
    ///
    /// Project options shadow built-ins. A yielding subproject option
    /// returns the parent option of the same name and kind when one exists.
    #[must_use]
    pub fn lookup(&self, subproject: &str, name: &str) -> Option<&UserOption> {
        if subproject.is_empty() {
            return self.options.get(name);
        }
        match self.options.get(&format!("{subproject}:{name}")) {
            Some(option) if option.yielding => match self.options.get(name) {
                Some(parent) if parent.kind.name() == option.kind.name() => Some(parent),
                _ => Some(option),
            },
            Some(option) => Some(option),
            None => self
                .options
                .get(name)
                .filter(|o| o.section != OptionSection::User),
        }
    }

    /// All options in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &UserOption> {
        self.options.values()
    }

    /// Declare a project option.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::Duplicate`] when the key already exists.
    pub fn declare(&mut self, option: UserOption) -> Result<(), OptionError> {
        let key = option.key();
        if self.options.contains_key(&key) {
            return Err(OptionError::Duplicate(key));
        }
        debug!(option = %key, "declared option");
        self.options.insert(key, option);
        Ok(())
    }

    /// Current prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self.options.get("prefix").map(|o| &o.value) {
            Some(OptionValue::String(prefix)) => prefix,
            _ => DEFAULT_PREFIX,
        }
    }

    /// Apply merged `key -> text` assignments.
    ///
    /// `prefix` is applied first so that directory defaults and relative
    /// conversions see the final prefix. Keys naming options that are not
    /// declared are returned so the caller can retry them later (for
    /// subprojects) or report them.
    ///
    /// # Errors
    ///
    /// Returns the first [`OptionError`] raised by a known option.
    pub fn apply(
        &mut self,
        assignments: &IndexMap<String, String>,
    ) -> Result<Vec<String>, OptionError> {
        if let Some(prefix) = assignments.get("prefix") {
            self.set_prefix(prefix)?;
        }
        let mut unknown = Vec::new();
        for (key, text) in assignments {
            if key == "prefix" {
                continue;
            }
            if !self.set(key, text)? {
                unknown.push(key.clone());
            }
        }
        Ok(unknown)
    }

    /// Assign one option from its textual form.
    ///
    /// Returns `false` when `key` is unknown. Undeclared options with a
    /// language prefix such as `c_std` are created as string options.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionError`] when the value is invalid.
    pub fn set(&mut self, key: &str, text: &str) -> Result<bool, OptionError> {
        if key == "prefix" {
            self.set_prefix(text)?;
            return Ok(true);
        }
        if !self.options.contains_key(key) {
            if LANGUAGE_PREFIXES.iter().any(|p| key.starts_with(p)) {
                let option = string_opt(key, "Language option", text, OptionSection::Compiler);
                self.options.insert(key.to_owned(), option);
                return Ok(true);
            }
            return Ok(false);
        }
        let prefix = self.prefix().to_owned();
        let Some(option) = self.options.get_mut(key) else {
            return Ok(false);
        };
        let text = if option.section == OptionSection::Directory {
            relative_to_prefix(&prefix, key, text)?
        } else {
            text.to_owned()
        };
        option.value = option.parse_value(&text)?;
        match key {
            "buildtype" => self.sync_from_buildtype(),
            "debug" | "optimization" => self.sync_to_buildtype(),
            _ => {}
        }
        Ok(true)
    }

    fn set_prefix(&mut self, text: &str) -> Result<(), OptionError> {
        let prefix = sanitize_prefix(text)?;
        let old = self.prefix().to_owned();
        for option in ["sysconfdir", "localstatedir", "sharedstatedir"] {
            let Some(opt) = self.options.get_mut(option) else {
                continue;
            };
            if opt.value.to_cli_string() == dir_default(option, &old) {
                opt.value = OptionValue::String(dir_default(option, &prefix));
            }
        }
        if let Some(opt) = self.options.get_mut("prefix") {
            opt.value = OptionValue::String(prefix);
        }
        Ok(())
    }

    fn sync_from_buildtype(&mut self) {
        let buildtype = self
            .options
            .get("buildtype")
            .map(|o| o.value.to_cli_string())
            .unwrap_or_default();
        let Some((_, debug, opt)) = BUILDTYPES.iter().find(|(b, _, _)| *b == buildtype) else {
            return;
        };
        if let Some(o) = self.options.get_mut("debug") {
            o.value = OptionValue::Boolean(*debug);
        }
        if let Some(o) = self.options.get_mut("optimization") {
            o.value = OptionValue::String((*opt).to_owned());
        }
    }

    fn sync_to_buildtype(&mut self) {
        let debug = matches!(
            self.options.get("debug").map(|o| &o.value),
            Some(OptionValue::Boolean(true))
        );
        let opt = self
            .options
            .get("optimization")
            .map(|o| o.value.to_cli_string())
            .unwrap_or_default();
        let buildtype = BUILDTYPES
            .iter()
            .find(|(_, d, o)| *d == debug && *o == opt)
            .map_or("custom", |(b, _, _)| *b);
        if let Some(o) = self.options.get_mut("buildtype") {
            o.value = OptionValue::String(buildtype.to_owned());
        }
    }

    /// Records for `intro-buildoptions.json`.
    #[must_use]
    pub fn to_json(&self) -> Json {
        Json::Array(self.iter().map(UserOption::to_json).collect())
    }
}

/// Default of a directory option for `prefix`.
fn dir_default(option: &str, prefix: &str) -> String {
    NOPREFIX_DEFAULTS
        .iter()
        .find(|(o, when, _)| *o == option && *when == prefix)
        .map(|(_, _, value)| (*value).to_owned())
        .or_else(|| {
            builtin_options()
                .into_iter()
                .find(|o| o.name == option)
                .map(|o| o.value.to_cli_string())
        })
        .unwrap_or_default()
}

/// Strip a trailing separator from an absolute prefix.
///
/// # Errors
///
/// Returns [`OptionError::RelativePrefix`] for relative paths.
pub fn sanitize_prefix(prefix: &str) -> Result<String, OptionError> {
    let is_windows_abs = matches!(prefix.as_bytes(), [_, b':', b'/' | b'\\', ..]);
    if !prefix.starts_with('/') && !is_windows_abs {
        return Err(OptionError::RelativePrefix(prefix.to_owned()));
    }
    if prefix.len() > 1 && !(is_windows_abs && prefix.len() == 3) {
        if let Some(stripped) = prefix.strip_suffix(['/', '\\']) {
            return Ok(stripped.to_owned());
        }
    }
    Ok(prefix.to_owned())
}

fn relative_to_prefix(prefix: &str, option: &str, value: &str) -> Result<String, OptionError> {
    let keeps_absolute = NOPREFIX_DEFAULTS.iter().any(|(o, _, _)| *o == option);
    if !value.starts_with('/') || keeps_absolute {
        return Ok(value.to_owned());
    }
    if value == prefix {
        return Ok(String::new());
    }
    let inner = if prefix == "/" {
        value.strip_prefix('/')
    } else {
        value
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
    };
    inner.map(str::to_owned).ok_or_else(|| OptionError::OutsidePrefix {
        option: option.to_owned(),
        value: value.to_owned(),
        prefix: prefix.to_owned(),
    })
}

/// Split `key=value` as given to `-D`.
///
/// # Errors
///
/// Returns [`OptionError::MissingValue`] when there is no `=`.
pub fn split_assignment(arg: &str) -> Result<(String, String), OptionError> {
    arg.split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.to_owned()))
        .ok_or_else(|| OptionError::MissingValue(arg.to_owned()))
}

#[cfg(test)]
mod tests;
