//! Runtime values of the build-definition language.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use crate::model::Target;
use crate::options::FeatureState;

/// A value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    /// Result of functions that return nothing.
    Void,
    /// `true` / `false`
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// String.
    Str(String),
    /// Array.
    Array(Vec<Value>),
    /// Insertion-ordered dict with string keys.
    Dict(IndexMap<String, Value>),
    /// Object that disables everything it touches.
    Disabler,
    /// Result of `files()` or `configure_file()`.
    File(FileRef),
    /// Build, custom, run or alias target.
    Target(Rc<Target>),
    /// Result of `both_libraries()`.
    BothLibraries {
        /// Shared half.
        shared: Rc<Target>,
        /// Static half.
        static_lib: Rc<Target>,
    },
    /// Dependency object.
    Dependency(Rc<Dependency>),
    /// Result of `include_directories()`.
    IncludeDirs(Rc<IncludeDirs>),
    /// Mutable configuration data.
    ConfData(Rc<RefCell<ConfData>>),
    /// Feature option.
    Feature(FeatureOption),
    /// Result of `find_program()`.
    Program(Rc<ExternalProgram>),
    /// Mutable environment object.
    Environment(Rc<RefCell<Environment>>),
    /// `build_machine`, `host_machine` or `target_machine`.
    Machine(MachineChoice),
    /// The `meson` object.
    Meson,
    /// Result of `range()`.
    Range(Range),
    /// Result of `subproject()`.
    Subproject(Rc<Subproject>),
    /// Result of `import()`.
    Module(Module),
}

impl Value {
    /// Object name used in messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "str",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Disabler => "disabler",
            Self::File(_) => "file",
            Self::Target(t) => {
                if t.kind.is_build_target() {
                    "build_tgt"
                } else {
                    "custom_tgt"
                }
            }
            Self::BothLibraries { .. } => "both_libs",
            Self::Dependency(_) => "dep",
            Self::IncludeDirs(_) => "inc",
            Self::ConfData(_) => "cfg_data",
            Self::Feature(_) => "feature",
            Self::Program(_) => "external_program",
            Self::Environment(_) => "env",
            Self::Machine(_) => "machine",
            Self::Meson => "meson",
            Self::Range(_) => "range",
            Self::Subproject(_) => "subproject",
            Self::Module(_) => "module",
        }
    }

    /// Whether the value is a disabler.
    #[must_use]
    pub const fn is_disabler(&self) -> bool {
        matches!(self, Self::Disabler)
    }

    /// Whether this value or any nested array element is a disabler.
    #[must_use]
    pub fn contains_disabler(&self) -> bool {
        match self {
            Self::Disabler => true,
            Self::Array(items) => items.iter().any(Self::contains_disabler),
            _ => false,
        }
    }

    /// Copy for assignment: mutable objects are duplicated.
    #[must_use]
    pub fn copied(&self) -> Self {
        match self {
            Self::ConfData(data) => Self::ConfData(Rc::new(RefCell::new(data.borrow().clone()))),
            Self::Environment(env) => {
                Self::Environment(Rc::new(RefCell::new(env.borrow().clone())))
            }
            other => other.clone(),
        }
    }

    /// Flatten nested arrays into a list of scalar values.
    #[must_use]
    pub fn flatten(values: Vec<Self>) -> Vec<Self> {
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Self::Array(items) => out.extend(Self::flatten(items)),
                other => out.push(other),
            }
        }
        out
    }

    /// Compare two values for `==`.
    ///
    /// Returns `None` when the types differ.
    #[must_use]
    pub fn equals(&self, other: &Self) -> Option<bool> {
        if mem::discriminant(self) != mem::discriminant(other) {
            return None;
        }
        Some(self.loose_eq(other))
    }

    /// Structural equality that treats differently-typed values as unequal.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void)
            | (Self::Disabler, Self::Disabler)
            | (Self::Meson, Self::Meson) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Self::Dict(a), Self::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            (Self::File(a), Self::File(b)) => a == b,
            (Self::Target(a), Self::Target(b)) => a.id == b.id,
            (
                Self::BothLibraries { shared: a, .. },
                Self::BothLibraries { shared: b, .. },
            ) => a.id == b.id,
            (Self::Dependency(a), Self::Dependency(b)) => Rc::ptr_eq(a, b),
            (Self::IncludeDirs(a), Self::IncludeDirs(b)) => a == b,
            (Self::ConfData(a), Self::ConfData(b)) => Rc::ptr_eq(a, b),
            (Self::Feature(a), Self::Feature(b)) => a == b,
            (Self::Program(a), Self::Program(b)) => a == b,
            (Self::Environment(a), Self::Environment(b)) => Rc::ptr_eq(a, b),
            (Self::Machine(a), Self::Machine(b)) => a == b,
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Subproject(a), Self::Subproject(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => a == b,
            _ => false,
        }
    }

    /// Render the value as `message()` shows it.
    ///
    /// Top-level strings are printed bare; strings nested in arrays and
    /// dicts are quoted. Returns `None` for objects that have no textual
    /// form.
    #[must_use]
    pub fn stringify(&self, top_level: bool) -> Option<String> {
        Some(match self {
            Self::Str(s) if top_level => s.clone(),
            Self::Str(s) => format!("'{s}'"),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Array(items) => {
                let parts: Option<Vec<_>> = items.iter().map(|v| v.stringify(false)).collect();
                format!("[{}]", parts?.join(", "))
            }
            Self::Dict(map) => {
                let parts: Option<Vec<_>> = map
                    .iter()
                    .map(|(k, v)| v.stringify(false).map(|v| format!("'{k}' : {v}")))
                    .collect();
                format!("{{{}}}", parts?.join(", "))
            }
            Self::File(file) => file.name.clone(),
            Self::Feature(f) => f.state.as_str().to_owned(),
            _ => return None,
        })
    }
}

/// A source or generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Directory relative to the source or build root.
    pub subdir: Utf8PathBuf,
    /// File name, possibly with directory components.
    pub name: String,
    /// Whether it lives in the build tree.
    pub built: bool,
}

impl FileRef {
    /// Absolute path given both roots.
    #[must_use]
    pub fn absolute(&self, source_root: &Utf8Path, build_root: &Utf8Path) -> Utf8PathBuf {
        let root = if self.built { build_root } else { source_root };
        root.join(&self.subdir).join(&self.name)
    }
}

/// Kind of a dependency object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Declared by `declare_dependency()`.
    Internal,
    /// Lookup failed.
    NotFound,
}

impl DependencyKind {
    /// Name returned by `type_name()`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::NotFound => "not-found",
        }
    }
}

/// Dependency object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name the dependency was looked up or declared as.
    pub name: String,
    /// Kind.
    pub kind: DependencyKind,
    /// Version or `unknown`.
    pub version: String,
    /// Compile arguments.
    pub compile_args: Vec<String>,
    /// Link arguments.
    pub link_args: Vec<String>,
    /// Include directories (absolute).
    pub include_directories: Vec<Utf8PathBuf>,
    /// Ids of linked targets.
    pub link_with: Vec<String>,
    /// Extra sources (absolute).
    pub sources: Vec<Utf8PathBuf>,
    /// Names of nested dependencies.
    pub dependencies: Vec<String>,
    /// `variables:` entries.
    pub variables: IndexMap<String, String>,
}

impl Dependency {
    /// A dependency that was not found.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: DependencyKind::NotFound,
            version: "unknown".to_owned(),
            compile_args: Vec::new(),
            link_args: Vec::new(),
            include_directories: Vec::new(),
            link_with: Vec::new(),
            sources: Vec::new(),
            dependencies: Vec::new(),
            variables: IndexMap::new(),
        }
    }

    /// Whether the dependency is usable.
    #[must_use]
    pub fn found(&self) -> bool {
        self.kind != DependencyKind::NotFound
    }
}

/// Result of `include_directories()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirs {
    /// Directories relative to the source root.
    pub dirs: Vec<Utf8PathBuf>,
    /// Whether they are system include directories.
    pub is_system: bool,
}

/// A value stored in configuration data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfValue {
    /// Boolean, rendered as `#define` / `#undef`.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// String, inserted verbatim.
    Str(String),
}

impl ConfValue {
    /// Convert back into a language value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// One configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfEntry {
    /// Value.
    pub value: ConfValue,
    /// Comment emitted above the define.
    pub description: Option<String>,
}

/// Result of `configuration_data()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfData {
    /// Entries in insertion order.
    pub values: IndexMap<String, ConfEntry>,
    /// Set once the data has been consumed by `configure_file()`.
    pub used: bool,
}

/// A feature option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureOption {
    /// Option name.
    pub name: String,
    /// Current state.
    pub state: FeatureState,
}

/// Result of `find_program()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProgram {
    /// Name searched for.
    pub name: String,
    /// Command line; empty when not found.
    pub command: Vec<String>,
    /// Version when known from an override.
    pub version: Option<String>,
}

impl ExternalProgram {
    /// A program that was not found.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            command: Vec::new(),
            version: None,
        }
    }

    /// Whether a command was found.
    #[must_use]
    pub fn found(&self) -> bool {
        !self.command.is_empty()
    }
}

/// Operation recorded on an environment object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvAction {
    /// Replace the value.
    Set,
    /// Add after the current value.
    Append,
    /// Add before the current value.
    Prepend,
    /// Remove the variable.
    Unset,
}

/// One recorded environment operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOp {
    /// Operation.
    pub action: EnvAction,
    /// Variable name.
    pub name: String,
    /// Values joined with `separator`.
    pub values: Vec<String>,
    /// Separator.
    pub separator: String,
}

/// Result of `environment()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Operations in order.
    pub ops: Vec<EnvOp>,
}

impl Environment {
    /// Apply the operations to an empty environment.
    #[must_use]
    pub fn resolve(&self) -> IndexMap<String, String> {
        let mut env: IndexMap<String, String> = IndexMap::new();
        for op in &self.ops {
            let joined = op.values.join(&op.separator);
            match op.action {
                EnvAction::Set => {
                    env.insert(op.name.clone(), joined);
                }
                EnvAction::Append => {
                    let entry = env.entry(op.name.clone()).or_default();
                    if !entry.is_empty() {
                        entry.push_str(&op.separator);
                    }
                    entry.push_str(&joined);
                }
                EnvAction::Prepend => {
                    let entry = env.entry(op.name.clone()).or_default();
                    *entry = if entry.is_empty() {
                        joined
                    } else {
                        format!("{joined}{}{entry}", op.separator)
                    };
                }
                EnvAction::Unset => {
                    env.shift_remove(&op.name);
                }
            }
        }
        env
    }
}

/// Which machine a machine object describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineChoice {
    /// `build_machine`
    Build,
    /// `host_machine`
    Host,
    /// `target_machine`
    Target,
}

/// Result of `range()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// First value.
    pub start: i64,
    /// Exclusive end.
    pub stop: i64,
    /// Increment, always positive.
    pub step: i64,
}

impl Range {
    /// Iterate over the values.
    pub fn iter(self) -> impl Iterator<Item = i64> {
        let step = usize::try_from(self.step).unwrap_or(1);
        (self.start..self.stop).step_by(step)
    }
}

/// Result of `subproject()`.
#[derive(Debug, Clone)]
pub struct Subproject {
    /// Subproject name.
    pub name: String,
    /// Whether it was configured.
    pub found: bool,
    /// Variables it defined.
    pub variables: IndexMap<String, Value>,
}

/// Modules available through `import()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    /// Filesystem helpers.
    Fs,
}
