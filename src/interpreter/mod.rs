//! Evaluation of `meson.build` files.
//!
//! [`Interpreter::run`] walks the syntax tree of a project, following
//! `subdir()` and `subproject()` calls, and records everything the project
//! declares in a [`BuildDescription`]. Nothing is compiled and no external
//! tool is run: dependencies come from overrides and subprojects only, and
//! programs are located on disk without executing them.
//!
//! ```rust,no_run
//! use camino::Utf8PathBuf;
//! use kumihimo::interpreter::{Interpreter, Setup};
//!
//! let setup = Setup::new(Utf8PathBuf::from("."), Utf8PathBuf::from("build"));
//! let evaluation = Interpreter::new(setup)?.run()?;
//! println!("{}", evaluation.description.project.name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod args;
mod configure;
mod dependencies;
mod error;
mod functions;
mod methods;
mod targets;
mod value;

use std::collections::HashSet;
use std::fs;
use std::mem;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::ast::{
    ArithOp, Arguments, CodeBlock, CompareOp, Expr, ExprKind, ForeachClause, IfClause, LogicalOp,
    Statement, StatementKind, UnaryOp,
};
use crate::literal::join_path;
use crate::machine_file::{MachineFiles, Machines};
use crate::model::{BuildDescription, ProjectInfo};
use crate::options::{OptionError, OptionStore};
use crate::parser::parse_str;
use crate::wrap::Resolver;

use args::Args;
pub use error::InterpreterError;
use error::fail;
pub use value::{
    ConfData, ConfEntry, ConfValue, Dependency, DependencyKind, EnvAction, EnvOp, Environment,
    ExternalProgram, FeatureOption, FileRef, IncludeDirs, MachineChoice, Module, Range, Subproject,
    Value,
};

/// Language version reported by `meson.version()` and checked against
/// `project(meson_version : ...)`.
pub const COMPAT_VERSION: &str = "1.4.0";

/// Variables that always exist and cannot be reassigned.
const BUILTIN_VARIABLES: [&str; 4] = ["meson", "build_machine", "host_machine", "target_machine"];

type Result<T> = std::result::Result<T, InterpreterError>;

/// Inputs to an evaluation.
#[derive(Debug, Clone)]
pub struct Setup {
    /// Absolute source directory.
    pub source_dir: Utf8PathBuf,
    /// Absolute build directory.
    pub build_dir: Utf8PathBuf,
    /// User option assignments, machine-file options already merged below
    /// command-line ones.
    pub options: IndexMap<String, String>,
    /// Native files.
    pub native: MachineFiles,
    /// Cross files.
    pub cross: MachineFiles,
}

impl Setup {
    /// Setup without options or machine files.
    #[must_use]
    pub fn new(source_dir: Utf8PathBuf, build_dir: Utf8PathBuf) -> Self {
        Self {
            source_dir,
            build_dir,
            options: IndexMap::new(),
            native: MachineFiles::default(),
            cross: MachineFiles::default(),
        }
    }
}

/// Result of a successful evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Everything the project declared.
    pub description: BuildDescription,
    /// Final option values.
    pub options: OptionStore,
    /// Machines taking part in the build.
    pub machines: Machines,
    /// Contents produced by `configure_file()`, keyed by absolute output
    /// path. Nothing is written until [`Evaluation::write_generated`].
    pub generated: IndexMap<Utf8PathBuf, String>,
}

/// How a block finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Continue,
    Break,
    SubdirDone,
}

/// State of the project currently being evaluated.
#[derive(Debug, Default)]
struct Frame {
    /// Subproject name; empty for the main project.
    subproject: String,
    /// Project root relative to the source root.
    root: Utf8PathBuf,
    /// Directory of the file being evaluated, relative to the source root.
    subdir: Utf8PathBuf,
    variables: IndexMap<String, Value>,
    visited: HashSet<Utf8PathBuf>,
    project: Option<ProjectInfo>,
    /// `default_options` passed by the parent's `subproject()` call.
    call_defaults: IndexMap<String, String>,
    loop_depth: usize,
    /// Contents of the file being evaluated.
    source: Rc<str>,
}

/// Tree-walking evaluator for one configuration.
#[derive(Debug)]
pub struct Interpreter {
    source_root: Utf8PathBuf,
    build_root: Utf8PathBuf,
    options: OptionStore,
    user_options: IndexMap<String, String>,
    deferred_options: IndexMap<String, String>,
    native: MachineFiles,
    cross: MachineFiles,
    machines: Machines,
    description: BuildDescription,
    frame: Frame,
    wraps: Resolver,
    subprojects: IndexMap<String, Rc<Subproject>>,
    subproject_stack: Vec<String>,
    dependency_overrides: IndexMap<String, Rc<Dependency>>,
    program_overrides: IndexMap<String, Rc<ExternalProgram>>,
    generated: IndexMap<Utf8PathBuf, String>,
}

impl Interpreter {
    /// Prepare an evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error when the machine sections of the given files are
    /// incomplete.
    pub fn new(setup: Setup) -> Result<Self> {
        let machines = Machines::from_files(&setup.native, &setup.cross)
            .map_err(|err| InterpreterError::msg(err.to_string()))?;
        Ok(Self {
            source_root: setup.source_dir,
            build_root: setup.build_dir,
            options: OptionStore::new(),
            user_options: setup.options,
            deferred_options: IndexMap::new(),
            native: setup.native,
            cross: setup.cross,
            machines,
            description: BuildDescription::default(),
            frame: Frame::default(),
            wraps: Resolver::default(),
            subprojects: IndexMap::new(),
            subproject_stack: Vec::new(),
            dependency_overrides: IndexMap::new(),
            program_overrides: IndexMap::new(),
            generated: IndexMap::new(),
        })
    }

    /// Evaluate the project.
    ///
    /// # Errors
    ///
    /// Returns the first parse or evaluation error, located in the build
    /// file that raised it.
    pub fn run(mut self) -> Result<Evaluation> {
        self.run_project()?;
        for key in self.deferred_options.keys() {
            warn!(option = %key, "Option belongs to a subproject that was not configured");
        }
        Ok(Evaluation {
            description: self.description,
            options: self.options,
            machines: self.machines,
            generated: self.generated,
        })
    }

    fn run_project(&mut self) -> Result<()> {
        let file = self.frame.root.join("meson.build");
        self.exec_file(&file, true)?;
        Ok(())
    }

    fn exec_file(&mut self, rel: &Utf8Path, is_project_root: bool) -> Result<Flow> {
        let abs = self.source_root.join(rel);
        let src = fs::read_to_string(&abs).map_err(|source| InterpreterError::Io {
            path: abs.clone(),
            source,
        })?;
        let block = parse_str(&src, rel.as_str())?;
        debug!(file = %rel, "evaluating");
        self.description.add_build_file(abs);
        let previous = mem::replace(&mut self.frame.source, Rc::from(src.as_str()));
        let result = if is_project_root {
            check_first_statement(&block).and_then(|()| self.exec_block(&block))
        } else {
            self.exec_block(&block)
        };
        self.frame.source = previous;
        result.map_err(|err| err.locate(rel.as_str(), &src))
    }

    fn exec_block(&mut self, block: &CodeBlock) -> Result<Flow> {
        for statement in &block.statements {
            let flow = self
                .exec_statement(statement)
                .map_err(|err| err.at(statement.span))?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(&mut self, statement: &Statement) -> Result<Flow> {
        match &statement.kind {
            StatementKind::Expression { expr } => {
                if let ExprKind::Call { function, args } = &expr.kind {
                    if function.name == "subdir_done" {
                        if !args.is_empty() {
                            return fail("subdir_done() takes no arguments.");
                        }
                        return Ok(Flow::SubdirDone);
                    }
                }
                self.eval(expr)?;
            }
            StatementKind::Assignment { target, value } => {
                let value = self.eval(value)?;
                self.assign(&target.name, &value)?;
            }
            StatementKind::PlusAssignment { target, value } => {
                let addition = self.eval(value)?;
                let old = self.get_variable(&target.name)?;
                let new = plus_assign(old, addition)?;
                self.set_variable(&target.name, new)?;
            }
            StatementKind::If(clause) => return self.exec_if(clause),
            StatementKind::Foreach(clause) => return self.exec_foreach(clause),
            StatementKind::Continue => {
                if self.frame.loop_depth == 0 {
                    return fail("Found continue outside of a loop.");
                }
                return Ok(Flow::Continue);
            }
            StatementKind::Break => {
                if self.frame.loop_depth == 0 {
                    return fail("Found break outside of a loop.");
                }
                return Ok(Flow::Break);
            }
            StatementKind::Comment { .. } => {}
        }
        Ok(Flow::Normal)
    }

    fn exec_if(&mut self, clause: &IfClause) -> Result<Flow> {
        for branch in &clause.branches {
            match self.eval(&branch.condition)? {
                Value::Disabler => return Ok(Flow::Normal),
                Value::Bool(true) => return self.exec_block(&branch.block),
                Value::Bool(false) => {}
                other => {
                    return Err(InterpreterError::msg(format!(
                        "If clause of type {} does not evaluate to true or false.",
                        other.type_name()
                    ))
                    .at(branch.condition.span));
                }
            }
        }
        match &clause.else_block {
            Some(block) => self.exec_block(block),
            None => Ok(Flow::Normal),
        }
    }

    fn exec_foreach(&mut self, clause: &ForeachClause) -> Result<Flow> {
        let items = self.eval(&clause.items)?;
        let rows: Vec<Vec<Value>> = match items {
            Value::Array(items) => {
                if clause.variables.len() != 1 {
                    return fail("Foreach on array does not unpack");
                }
                items.into_iter().map(|v| vec![v]).collect()
            }
            Value::Range(range) => {
                if clause.variables.len() != 1 {
                    return fail("Foreach on range does not unpack");
                }
                range.iter().map(|i| vec![Value::Int(i)]).collect()
            }
            Value::Dict(map) => {
                if clause.variables.len() != 2 {
                    return fail("Foreach on dict unpacks key and value");
                }
                let mut entries: Vec<_> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
                    .into_iter()
                    .map(|(k, v)| vec![Value::Str(k), v])
                    .collect()
            }
            _ => {
                return Err(InterpreterError::msg(
                    "Items of foreach loop must be an array or a dict",
                )
                .at(clause.items.span));
            }
        };
        self.frame.loop_depth += 1;
        let result = self.run_loop(clause, rows);
        self.frame.loop_depth -= 1;
        result
    }

    fn run_loop(&mut self, clause: &ForeachClause, rows: Vec<Vec<Value>>) -> Result<Flow> {
        for row in rows {
            for (var, value) in clause.variables.iter().zip(row) {
                self.set_variable(&var.name, value)?;
            }
            match self.exec_block(&clause.block)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => break,
                Flow::SubdirDone => return Ok(Flow::SubdirDone),
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, name: &str, value: &Value) -> Result<()> {
        if matches!(value, Value::Void) {
            return fail("Can not assign void to variable.");
        }
        self.set_variable(name, value.copied())
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        if BUILTIN_VARIABLES.contains(&name) {
            return fail(format!("Tried to overwrite internal variable \"{name}\""));
        }
        if !is_identifier(name) {
            return fail(format!("Invalid variable name: {name}"));
        }
        self.frame.variables.insert(name.to_owned(), value);
        Ok(())
    }

    fn lookup_variable(&self, name: &str) -> Option<Value> {
        match name {
            "meson" => Some(Value::Meson),
            "build_machine" => Some(Value::Machine(MachineChoice::Build)),
            "host_machine" => Some(Value::Machine(MachineChoice::Host)),
            "target_machine" => Some(Value::Machine(MachineChoice::Target)),
            _ => self.frame.variables.get(name).cloned(),
        }
    }

    fn get_variable(&self, name: &str) -> Result<Value> {
        self.lookup_variable(name)
            .ok_or_else(|| InterpreterError::msg(format!("Unknown variable \"{name}\".")))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        self.eval_kind(expr).map_err(|err| err.at(expr.span))
    }

    fn eval_kind(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Bool { value } => Ok(Value::Bool(*value)),
            ExprKind::Int { value } => Ok(Value::Int(*value)),
            ExprKind::String { value, style } => {
                if style.is_format() {
                    self.format_string(value).map(Value::Str)
                } else {
                    Ok(Value::Str(value.clone()))
                }
            }
            ExprKind::Identifier { name } => self.get_variable(name),
            ExprKind::Array(args) => {
                if !args.keywords.is_empty() {
                    return fail("Keyword arguments are invalid in array construction.");
                }
                let items = args
                    .positional
                    .iter()
                    .map(|el| self.eval(&el.value))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            ExprKind::Dict(entries) => {
                let mut map = IndexMap::new();
                for entry in &entries.entries {
                    let key = match self.eval(&entry.key)? {
                        Value::Str(key) => key,
                        _ => {
                            return Err(
                                InterpreterError::msg("Key must be a string").at(entry.key.span)
                            );
                        }
                    };
                    let value = self.eval(&entry.value)?;
                    if map.insert(key.clone(), value).is_some() {
                        return fail(format!("Duplicate dictionary key: {key}"));
                    }
                }
                Ok(Value::Dict(map))
            }
            ExprKind::Call { function, args } => self.call_function(&function.name, args),
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                let object = self.eval(receiver)?;
                let (positional, kwargs) = self.eval_args(args)?;
                let args = Args::new(method.name.clone(), positional, kwargs);
                if let Value::Disabler = object {
                    return Ok(if method.name == "found" {
                        Value::Bool(false)
                    } else {
                        Value::Disabler
                    });
                }
                if args.has_disabler() {
                    return Ok(Value::Disabler);
                }
                self.call_method(object, args)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                if object.is_disabler() {
                    return Ok(Value::Disabler);
                }
                let index = self.eval(index)?;
                self.index(object, &index)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (_, Value::Disabler) => Ok(Value::Disabler),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Not, _) => fail("Argument to \"not\" is not a boolean."),
                    (UnaryOp::Negate, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| InterpreterError::msg("Integer overflow in negation.")),
                    (UnaryOp::Negate, _) => fail("Argument to negation is not an integer."),
                }
            }
            ExprKind::Arithmetic { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                if l.is_disabler() {
                    return Ok(Value::Disabler);
                }
                let r = self.eval(rhs)?;
                if r.is_disabler() {
                    return Ok(Value::Disabler);
                }
                arithmetic(*op, l, r)
            }
            ExprKind::Comparison { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                if l.is_disabler() {
                    return Ok(Value::Disabler);
                }
                let r = self.eval(rhs)?;
                if r.is_disabler() {
                    return Ok(Value::Disabler);
                }
                compare(*op, &l, &r).map(Value::Bool)
            }
            ExprKind::Logical { op, lhs, rhs } => self.logical(*op, lhs, rhs),
            ExprKind::Ternary {
                condition,
                if_true,
                if_false,
            } => match self.eval(condition)? {
                Value::Disabler => Ok(Value::Disabler),
                Value::Bool(true) => self.eval(if_true),
                Value::Bool(false) => self.eval(if_false),
                _ => fail("Ternary condition is not boolean."),
            },
            ExprKind::Paren { inner } => self.eval(inner),
        }
    }

    fn logical(&mut self, op: LogicalOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let name = op.symbol();
        let l = match self.eval(lhs)? {
            Value::Disabler => return Ok(Value::Disabler),
            Value::Bool(b) => b,
            _ => return fail(format!("First argument to \"{name}\" is not a boolean.")),
        };
        match (op, l) {
            (LogicalOp::And, false) => return Ok(Value::Bool(false)),
            (LogicalOp::Or, true) => return Ok(Value::Bool(true)),
            _ => {}
        }
        match self.eval(rhs)? {
            Value::Disabler => Ok(Value::Disabler),
            Value::Bool(b) => Ok(Value::Bool(b)),
            _ => fail(format!("Second argument to \"{name}\" is not a boolean.")),
        }
    }

    fn index(&self, object: Value, index: &Value) -> Result<Value> {
        match (object, index) {
            (Value::Array(items), Value::Int(i)) => {
                let len = items.len();
                resolve_index(*i, len)
                    .and_then(|idx| items.into_iter().nth(idx))
                    .ok_or_else(|| {
                        InterpreterError::msg(format!(
                            "Index {i} out of bounds of array of size {len}."
                        ))
                    })
            }
            (Value::Array(_), _) => fail("Index value is not an integer."),
            (Value::Dict(mut map), Value::Str(key)) => map
                .shift_remove(key)
                .ok_or_else(|| InterpreterError::msg(format!("Key {key} is not in the dictionary."))),
            (Value::Dict(_), _) => fail("Key is not a string"),
            (Value::Target(target), Value::Int(i)) if !target.kind.is_build_target() => {
                let len = target.filename.len();
                let output = resolve_index(*i, len)
                    .and_then(|idx| target.filename.get(idx))
                    .ok_or_else(|| {
                        InterpreterError::msg(format!(
                            "Index {i} out of bounds of custom target with {len} outputs."
                        ))
                    })?;
                let name = output
                    .file_name()
                    .unwrap_or_default()
                    .to_owned();
                Ok(Value::File(FileRef {
                    subdir: target.subdir.clone(),
                    name,
                    built: true,
                }))
            }
            _ => fail("Tried to index an object that doesn't support indexing."),
        }
    }

    fn eval_args(&mut self, args: &Arguments) -> Result<(Vec<Value>, IndexMap<String, Value>)> {
        let positional = args
            .positional
            .iter()
            .map(|el| self.eval(&el.value))
            .collect::<Result<Vec<_>>>()?;
        let mut kwargs = IndexMap::new();
        for kw in &args.keywords {
            let value = self.eval(&kw.value)?;
            kwargs.insert(kw.name.name.clone(), value);
        }
        if let Some(expand) = kwargs.shift_remove("kwargs") {
            let Value::Dict(extra) = expand else {
                return fail("Value of \"kwargs\" must be dictionary.");
            };
            if extra.contains_key("kwargs") {
                return fail("Kwargs argument must not contain a \"kwargs\" entry.");
            }
            for (key, value) in extra {
                if kwargs.contains_key(&key) {
                    return fail(format!(
                        "Entry \"{key}\" defined both as a keyword argument and in a \"kwarg\" entry."
                    ));
                }
                kwargs.insert(key, value);
            }
        }
        Ok((positional, kwargs))
    }

    fn call_function(&mut self, name: &str, ast: &Arguments) -> Result<Value> {
        let (mut positional, kwargs) = self.eval_args(ast)?;
        if name == "assert"
            && positional.len() == 1
            && let Some(arg) = ast.positional.first()
        {
            let span = arg.value.span;
            let text = self.frame.source.get(span.start..span.end).unwrap_or_default();
            positional.push(Value::Str(text.to_owned()));
        }
        let args = Args::new(name, positional, kwargs);
        if args.has_disabler() && !matches!(name, "get_variable" | "set_variable" | "is_disabler") {
            return Ok(Value::Disabler);
        }
        if name != "project" && self.frame.project.is_none() {
            return fail("First statement must be a call to project()");
        }
        self.dispatch(args)
    }

    fn format_string(&self, template: &str) -> Result<String> {
        substitute_placeholders(template, |var| {
            let Some(value) = self.lookup_variable(var) else {
                return fail(format!("Identifier \"{var}\" does not name a variable."));
            };
            match value {
                Value::Str(s) => Ok(s),
                Value::Int(i) => Ok(i.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                _ => fail(format!(
                    "Identifier \"{var}\" does not name a formattable variable (has to be an integer, a string, a floating point number or a boolean)."
                )),
            }
        })
    }

    /// Directory of the current build file, relative to the source root.
    fn subdir(&self) -> &Utf8Path {
        &self.frame.subdir
    }

    fn current_source_dir(&self) -> Utf8PathBuf {
        self.source_root.join(&self.frame.subdir)
    }

    fn current_build_dir(&self) -> Utf8PathBuf {
        self.build_root.join(&self.frame.subdir)
    }

    fn project(&self) -> Result<&ProjectInfo> {
        self.frame
            .project
            .as_ref()
            .ok_or_else(|| InterpreterError::msg("First statement must be a call to project()"))
    }

    fn is_subproject(&self) -> bool {
        !self.frame.subproject.is_empty()
    }

    /// Read `meson.options` (or `meson_options.txt`) of the current project.
    fn load_option_file(&mut self) -> Result<()> {
        for name in crate::options::OPTION_FILE_NAMES {
            let rel = self.frame.root.join(name);
            let abs = self.source_root.join(&rel);
            if !abs.is_file() {
                continue;
            }
            let src = fs::read_to_string(&abs).map_err(|source| InterpreterError::Io {
                path: abs.clone(),
                source,
            })?;
            let declared = crate::options::parse_option_file(&src, rel.as_str(), &self.frame.subproject)?;
            for option in declared {
                self.options.declare(option)?;
            }
            self.description.add_build_file(abs);
            break;
        }
        Ok(())
    }

    /// Layer project defaults, `subproject()` defaults and user values.
    fn apply_project_options(&mut self, defaults: &IndexMap<String, String>) -> Result<()> {
        let sub = self.frame.subproject.clone();
        let qualify = |key: &str| {
            if sub.is_empty() || key.contains(':') {
                key.to_owned()
            } else {
                format!("{sub}:{key}")
            }
        };
        let mut layered: IndexMap<String, String> = IndexMap::new();
        let call_defaults = mem::take(&mut self.frame.call_defaults);
        for (key, value) in defaults.iter().chain(&call_defaults) {
            let key = qualify(key);
            if sub.is_empty() || self.options.contains(&key) {
                layered.insert(key, value.clone());
            } else {
                debug!(option = %key, "ignoring built-in default for subproject");
            }
        }
        layered.retain(|key, _| !self.user_options.contains_key(key));
        for key in self.options.apply(&layered)? {
            warn!(option = %key, "Unknown option in default_options");
        }

        let user: IndexMap<String, String> = if sub.is_empty() {
            self.user_options.clone()
        } else {
            let prefix = format!("{sub}:");
            let mine: IndexMap<_, _> = self
                .deferred_options
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.deferred_options.retain(|k, _| !k.starts_with(&prefix));
            mine
        };
        let mut unknown = Vec::new();
        for key in self.options.apply(&user)? {
            if sub.is_empty() && key.contains(':') {
                if let Some(value) = user.get(&key) {
                    self.deferred_options.insert(key, value.clone());
                }
            } else {
                unknown.push(key);
            }
        }
        if !unknown.is_empty() {
            return Err(OptionError::UnknownMany(format!("\"{}\"", unknown.join(", "))).into());
        }
        Ok(())
    }

    /// Evaluate `subdir(name)`.
    fn enter_subdir(&mut self, name: &str) -> Result<()> {
        if Utf8Path::new(name)
            .components()
            .any(|c| c.as_str() == "..")
        {
            return fail("Subdir contains ..");
        }
        let subproject_dir = self
            .project()?
            .subproject_dir
            .clone();
        if self.frame.subdir == self.frame.root && name == subproject_dir {
            return fail("Must not go into subprojects dir with subdir(), use subproject() instead.");
        }
        let next = self.frame.subdir.join(name);
        if !self.frame.visited.insert(next.clone()) {
            return fail(format!(
                "Tried to enter directory \"{next}\", which has already been visited."
            ));
        }
        let file = next.join("meson.build");
        if !self.source_root.join(&file).is_file() {
            return fail(format!("Nonexistent build file '{file}'"));
        }
        let previous = mem::replace(&mut self.frame.subdir, next);
        let result = self.exec_file(&file, false);
        self.frame.subdir = previous;
        result.map(|_| ())
    }

    /// Evaluate a subproject once and cache the result.
    fn enter_subproject(
        &mut self,
        name: &str,
        required: bool,
        defaults: IndexMap<String, String>,
    ) -> Result<Rc<Subproject>> {
        if let Some(existing) = self.subprojects.get(name) {
            if required && !existing.found {
                return fail(format!("Subproject \"{name}\" was not found earlier."));
            }
            return Ok(Rc::clone(existing));
        }
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return fail(format!(
                "Subproject name {name:?} must be a plain directory name."
            ));
        }
        if self.subproject_stack.iter().any(|s| s == name) {
            let chain = self.subproject_stack.join(" => ");
            return fail(format!("Recursive include of subprojects: {chain} => {name}."));
        }
        let dir = match self.wraps.resolve(name) {
            Ok(dir) => dir,
            Err(err) if required => return Err(err.into()),
            Err(err) => {
                info!("Subproject {name} is buildable: NO ({err})");
                return Ok(self.missing_subproject(name));
            }
        };
        let root = dir
            .strip_prefix(&self.source_root)
            .map(Utf8Path::to_path_buf)
            .unwrap_or(dir);
        info!("Executing subproject {name}");
        let frame = Frame {
            subproject: name.to_owned(),
            subdir: root.clone(),
            root,
            call_defaults: defaults,
            ..Frame::default()
        };
        let saved = mem::replace(&mut self.frame, frame);
        self.subproject_stack.push(name.to_owned());
        let result = self.run_project();
        self.subproject_stack.pop();
        let finished = mem::replace(&mut self.frame, saved);
        match result {
            Ok(()) => {
                info!("Subproject {name} finished.");
                let sub = Rc::new(Subproject {
                    name: name.to_owned(),
                    found: true,
                    variables: finished.variables,
                });
                self.subprojects.insert(name.to_owned(), Rc::clone(&sub));
                Ok(sub)
            }
            Err(err) if required => Err(err),
            Err(err) => {
                warn!("Subproject {name} is buildable: NO ({err})");
                Ok(self.missing_subproject(name))
            }
        }
    }

    fn missing_subproject(&mut self, name: &str) -> Rc<Subproject> {
        let sub = Rc::new(Subproject {
            name: name.to_owned(),
            found: false,
            variables: IndexMap::new(),
        });
        self.subprojects.insert(name.to_owned(), Rc::clone(&sub));
        sub
    }
}

/// Reject files whose first statement is not `project()`.
fn check_first_statement(block: &CodeBlock) -> Result<()> {
    let first = block
        .statements
        .iter()
        .find(|s| !matches!(s.kind, StatementKind::Comment { .. }));
    let is_project = first.is_some_and(|s| {
        matches!(&s.kind, StatementKind::Expression { expr }
            if matches!(&expr.kind, ExprKind::Call { function, .. } if function.name == "project"))
    });
    if is_project {
        Ok(())
    } else {
        let err = InterpreterError::msg("First statement must be a call to project()");
        Err(match first {
            Some(statement) => err.at(statement.span),
            None => err,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Position of `index` in a sequence of `len` elements; negative values
/// count from the end.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len_i = i64::try_from(len).ok()?;
    let idx = if index < 0 { index + len_i } else { index };
    if (0..len_i).contains(&idx) {
        usize::try_from(idx).ok()
    } else {
        None
    }
}

/// Replace `@name@` placeholders whose name is an identifier.
fn substitute_placeholders(
    template: &str,
    mut resolve: impl FnMut(&str) -> Result<String>,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((head, after)) = rest.split_once('@') {
        out.push_str(head);
        match after.split_once('@') {
            Some((name, tail)) if is_identifier(name) => {
                out.push_str(&resolve(name)?);
                rest = tail;
            }
            _ => {
                out.push('@');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn plus_assign(old: Value, addition: Value) -> Result<Value> {
    match (old, addition) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Value::Str(_), _) => fail(
            "The += operator requires a string on the right hand side if the variable on the left is a string",
        ),
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(b)
            .map(Value::Int)
            .ok_or_else(|| InterpreterError::msg("Integer overflow in addition.")),
        (Value::Int(_), _) => fail(
            "The += operator requires an int on the right hand side if the variable on the left is an int",
        ),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (Value::Array(mut a), item) => {
            a.push(item);
            Ok(Value::Array(a))
        }
        (Value::Dict(mut a), Value::Dict(b)) => {
            a.extend(b);
            Ok(Value::Dict(a))
        }
        (Value::Dict(_), _) => fail(
            "The += operator requires a dict on the right hand side if the variable on the left is a dict",
        ),
        _ => fail("The += operator currently only works with arrays, dicts, strings or ints"),
    }
}

fn arithmetic(op: ArithOp, l: Value, r: Value) -> Result<Value> {
    let overflow = || InterpreterError::msg(format!("Integer overflow in {} operation.", op.symbol()));
    match (op, l, r) {
        (ArithOp::Add, Value::Int(a), Value::Int(b)) => {
            a.checked_add(b).map(Value::Int).ok_or_else(overflow)
        }
        (ArithOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (ArithOp::Add, Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (ArithOp::Add, Value::Array(mut a), item) => {
            a.push(item);
            Ok(Value::Array(a))
        }
        (ArithOp::Add, Value::Dict(mut a), Value::Dict(b)) => {
            a.extend(b);
            Ok(Value::Dict(a))
        }
        (ArithOp::Add, l, r) => fail(format!(
            "Invalid use of addition: cannot add {} to {}",
            r.type_name(),
            l.type_name()
        )),
        (ArithOp::Sub, Value::Int(a), Value::Int(b)) => {
            a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
        }
        (ArithOp::Sub, _, _) => fail("Subtraction works only with integers."),
        (ArithOp::Mul, Value::Int(a), Value::Int(b)) => {
            a.checked_mul(b).map(Value::Int).ok_or_else(overflow)
        }
        (ArithOp::Mul, _, _) => fail("Multiplication works only with integers."),
        (ArithOp::Div, Value::Str(a), Value::Str(b)) => Ok(Value::Str(join_path(&a, &b))),
        (ArithOp::Div, Value::Str(_), _) => fail("The division operator can only append a string."),
        (ArithOp::Div, _, Value::Str(_)) => {
            fail("The division operator can only append to a string.")
        }
        (ArithOp::Div, Value::Int(_), Value::Int(0)) => fail("Division by zero."),
        (ArithOp::Div, Value::Int(a), Value::Int(b)) => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            let floor = if r != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q };
            Ok(Value::Int(floor))
        }
        (ArithOp::Div, _, _) => fail("Division works only with strings or integers."),
        (ArithOp::Mod, Value::Int(_), Value::Int(0)) => fail("Modulo by zero."),
        (ArithOp::Mod, Value::Int(a), Value::Int(b)) => {
            let m = a.checked_rem(b).ok_or_else(overflow)?;
            let floor = if m != 0 && ((m < 0) != (b < 0)) { m + b } else { m };
            Ok(Value::Int(floor))
        }
        (ArithOp::Mod, _, _) => fail("Modulo works only with integers."),
    }
}

fn compare(op: CompareOp, l: &Value, r: &Value) -> Result<bool> {
    match op {
        CompareOp::In | CompareOp::NotIn => {
            let found = contains(l, r)?;
            Ok(if op == CompareOp::In { found } else { !found })
        }
        CompareOp::Eq | CompareOp::Ne => {
            let equal = l.equals(r).ok_or_else(|| {
                InterpreterError::msg(format!(
                    "Trying to compare values of different types ({}, {}) using {}.",
                    l.type_name(),
                    r.type_name(),
                    op.symbol()
                ))
            })?;
            Ok(if op == CompareOp::Eq { equal } else { !equal })
        }
        _ => {
            let ordering = match (l, r) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ if l.type_name() != r.type_name() => {
                    return fail(format!(
                        "Values of different types ({}, {}) cannot be compared using {}.",
                        l.type_name(),
                        r.type_name(),
                        op.symbol()
                    ));
                }
                _ => {
                    return fail(format!(
                        "{} can only be compared for equality.",
                        l.type_name()
                    ));
                }
            };
            Ok(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

fn contains(needle: &Value, haystack: &Value) -> Result<bool> {
    if matches!(needle, Value::Array(_) | Value::Dict(_) | Value::Void) {
        return fail("lvalue of \"in\" operator must be a string, integer, or object");
    }
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| item.loose_eq(needle))),
        Value::Dict(map) => match needle {
            Value::Str(key) => Ok(map.contains_key(key)),
            _ => fail("Key of \"in\" operator on a dict must be a string"),
        },
        Value::Str(text) => match needle {
            Value::Str(part) => Ok(text.contains(part.as_str())),
            _ => fail("lvalue of \"in\" operator on a string must be a string"),
        },
        _ => fail("rvalue of \"in\" operator must be an array, a dict or a string"),
    }
}

#[cfg(test)]
mod tests;
