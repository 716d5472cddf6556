//! Cross and native machine files.
//!
//! Machine files are INI documents whose values are constant expressions.
//! Several files may be given; they are merged left to right and later
//! files see the `[constants]` of earlier ones.
//!
//! ```rust
//! use kumihimo::machine_file::MachineFiles;
//!
//! let mut files = MachineFiles::default();
//! files
//!     .parse_str(
//!         "[constants]\nroot = '/opt/arm'\n\n[binaries]\nc = root / 'bin/gcc'\n\n\
//!          [host_machine]\nsystem = 'linux'\ncpu_family = 'arm'\ncpu = 'armv7'\nendian = 'little'\n",
//!         "arm.ini",
//!     )
//!     .expect("parse");
//! assert_eq!(files.binaries["c"], ["/opt/arm/bin/gcc"]);
//! assert_eq!(files.host_machine().expect("host").map(|m| m.cpu), Some("armv7".into()));
//! ```

use std::env;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ini::{self, IniError};
use crate::literal::{Literal, eval_constant};
use crate::parser::{ParseError, parse_expression};

/// CPU families recognised without a warning.
pub const KNOWN_CPU_FAMILIES: [&str; 19] = [
    "aarch64", "arc", "arm", "e2k", "ia64", "mips", "mips64", "parisc", "ppc", "ppc64",
    "riscv32", "riscv64", "rl78", "rx", "s390x", "sparc", "sparc64", "x86", "x86_64",
];

const MACHINE_SECTIONS: [&str; 3] = ["host_machine", "build_machine", "target_machine"];
const MACHINE_FIELDS: [&str; 4] = ["system", "cpu_family", "cpu", "endian"];

/// Errors raised while reading machine files.
#[derive(Debug, Error, Diagnostic)]
pub enum MachineFileError {
    /// The file could not be read.
    #[error("failed to read machine file {path}")]
    Io {
        /// File path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A relative file name not found in any search directory.
    #[error("Cannot find specified {kind} file: {name}")]
    NotFound {
        /// `cross` or `native`.
        kind: &'static str,
        /// Name as given on the command line.
        name: String,
    },
    /// The INI structure is malformed.
    #[error("{file}: {source}")]
    Ini {
        /// File name.
        file: String,
        /// Underlying error.
        #[source]
        source: IniError,
    },
    /// A value is not a valid expression.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    /// A value is syntactically fine but not acceptable.
    #[error("{file}:{line}: Malformed value in machine file variable {key}: {message}")]
    Value {
        /// File name.
        file: String,
        /// One-based line.
        line: usize,
        /// Entry key.
        key: String,
        /// Description of the problem.
        message: String,
    },
    /// A machine section lacks a required field.
    #[error("Machine section [{section}] is missing {field}.")]
    MissingField {
        /// Section name.
        section: String,
        /// Missing field.
        field: &'static str,
    },
}

/// Description of a machine taking part in the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// Operating system, e.g. `linux`, `windows`, `darwin`.
    pub system: String,
    /// CPU family, e.g. `x86_64`, `arm`.
    pub cpu_family: String,
    /// Specific CPU.
    pub cpu: String,
    /// `little` or `big`.
    pub endian: String,
}

impl MachineInfo {
    /// Describe the machine this process runs on.
    #[must_use]
    pub fn detect() -> Self {
        let system = match env::consts::OS {
            "macos" | "ios" => "darwin",
            other => other,
        };
        let cpu_family = match env::consts::ARCH {
            "powerpc" => "ppc",
            "powerpc64" => "ppc64",
            "loongarch64" => "loongarch64",
            other => other,
        };
        Self {
            system: system.to_owned(),
            cpu_family: cpu_family.to_owned(),
            cpu: env::consts::ARCH.to_owned(),
            endian: if cfg!(target_endian = "big") { "big" } else { "little" }.to_owned(),
        }
    }

    /// Whether the machine runs Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        matches!(self.system.as_str(), "windows" | "mingw")
    }

    /// Whether the machine runs macOS or iOS.
    #[must_use]
    pub fn is_darwin(&self) -> bool {
        self.system == "darwin"
    }

    /// Whether the machine uses Cygwin.
    #[must_use]
    pub fn is_cygwin(&self) -> bool {
        self.system == "cygwin"
    }
}

/// Merged contents of one or more machine files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MachineFiles {
    /// `[constants]`
    pub constants: IndexMap<String, Literal>,
    /// `[binaries]`, each a command line.
    pub binaries: IndexMap<String, Vec<String>>,
    /// `[properties]`
    pub properties: IndexMap<String, Literal>,
    /// `[built-in options]` in `-D` text form.
    pub builtin_options: IndexMap<String, String>,
    /// `[project options]` and `[sub:project options]` in `-D` text form.
    pub project_options: IndexMap<String, String>,
    machines: IndexMap<String, IndexMap<String, String>>,
    /// Files read, in order.
    pub files: Vec<Utf8PathBuf>,
}

impl MachineFiles {
    /// Load and merge `paths` in order.
    ///
    /// # Errors
    ///
    /// Returns a [`MachineFileError`] for unreadable or malformed files.
    pub fn load(paths: &[Utf8PathBuf]) -> Result<Self, MachineFileError> {
        let mut files = Self::default();
        for path in paths {
            let src = fs::read_to_string(path).map_err(|source| MachineFileError::Io {
                path: path.clone(),
                source,
            })?;
            files.parse_str(&src, path.as_str())?;
            files.files.push(path.clone());
        }
        Ok(files)
    }

    /// Merge one machine file's contents.
    ///
    /// # Errors
    ///
    /// Returns a [`MachineFileError`] for malformed sections or values.
    pub fn parse_str(&mut self, src: &str, name: &str) -> Result<(), MachineFileError> {
        let doc = ini::parse(src).map_err(|source| MachineFileError::Ini {
            file: name.to_owned(),
            source,
        })?;
        if let Some(constants) = doc.section("constants") {
            for (key, raw) in &constants.entries {
                let value = self.eval(name, key, raw)?;
                self.constants.insert(key.clone(), value);
            }
        }
        for section in &doc.sections {
            let title = section.name.as_str();
            for (key, raw) in &section.entries {
                check_key(name, key, raw.line)?;
                match title {
                    "constants" => {}
                    "binaries" => {
                        let value = self.eval(name, key, raw)?;
                        let command = value.to_string_list().ok_or_else(|| {
                            bad_value(name, key, raw.line, "binaries must be strings or arrays of strings")
                        })?;
                        self.binaries.insert(key.clone(), command);
                    }
                    "properties" => {
                        let value = self.eval(name, key, raw)?;
                        self.properties.insert(key.clone(), value);
                    }
                    "built-in options" => {
                        let value = self.eval(name, key, raw)?;
                        self.builtin_options.insert(key.clone(), option_text(&value));
                    }
                    "project options" => {
                        let value = self.eval(name, key, raw)?;
                        self.project_options.insert(key.clone(), option_text(&value));
                    }
                    t if MACHINE_SECTIONS.contains(&t) => {
                        let value = self.eval(name, key, raw)?;
                        let Literal::Str(text) = value else {
                            return Err(bad_value(name, key, raw.line, "machine entries must be strings"));
                        };
                        if key == "endian" && text != "little" && text != "big" {
                            return Err(bad_value(
                                name,
                                key,
                                raw.line,
                                &format!("Unknown endian {text}"),
                            ));
                        }
                        self.machines
                            .entry(t.to_owned())
                            .or_default()
                            .insert(key.clone(), text);
                    }
                    t => {
                        if let Some(sub) = t.strip_suffix(":project options") {
                            let value = self.eval(name, key, raw)?;
                            self.project_options
                                .insert(format!("{sub}:{key}"), option_text(&value));
                        } else {
                            debug!(file = name, section = t, "ignoring machine file section");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn eval(
        &self,
        file: &str,
        key: &str,
        raw: &ini::IniValue,
    ) -> Result<Literal, MachineFileError> {
        let expr = parse_expression(&raw.text, &format!("{file}:{key}"))?;
        eval_constant(&expr, &|name| self.constants.get(name).cloned())
            .map_err(|err| bad_value(file, key, raw.line, &err.message))
    }

    /// `[host_machine]`, if present and complete.
    ///
    /// # Errors
    ///
    /// Returns [`MachineFileError::MissingField`] for incomplete sections.
    pub fn host_machine(&self) -> Result<Option<MachineInfo>, MachineFileError> {
        self.machine("host_machine")
    }

    /// `[build_machine]`, if present and complete.
    ///
    /// # Errors
    ///
    /// Returns [`MachineFileError::MissingField`] for incomplete sections.
    pub fn build_machine(&self) -> Result<Option<MachineInfo>, MachineFileError> {
        self.machine("build_machine")
    }

    /// `[target_machine]`, if present and complete.
    ///
    /// # Errors
    ///
    /// Returns [`MachineFileError::MissingField`] for incomplete sections.
    pub fn target_machine(&self) -> Result<Option<MachineInfo>, MachineFileError> {
        self.machine("target_machine")
    }

    fn machine(&self, section: &str) -> Result<Option<MachineInfo>, MachineFileError> {
        let Some(fields) = self.machines.get(section) else {
            return Ok(None);
        };
        let get = |field: &'static str| {
            fields
                .get(field)
                .cloned()
                .ok_or_else(|| MachineFileError::MissingField {
                    section: section.to_owned(),
                    field,
                })
        };
        let [system, cpu_family, cpu, endian] = MACHINE_FIELDS;
        let info = MachineInfo {
            system: get(system)?,
            cpu_family: get(cpu_family)?,
            cpu: get(cpu)?,
            endian: get(endian)?,
        };
        if !KNOWN_CPU_FAMILIES.contains(&info.cpu_family.as_str()) {
            warn!(cpu_family = %info.cpu_family, "Unknown CPU family");
        }
        Ok(Some(info))
    }
}

fn check_key(file: &str, key: &str, line: usize) -> Result<(), MachineFileError> {
    if key.contains([' ', '\t', '\'', '"']) {
        return Err(bad_value(file, key, line, "malformed variable name"));
    }
    Ok(())
}

fn bad_value(file: &str, key: &str, line: usize, message: &str) -> MachineFileError {
    MachineFileError::Value {
        file: file.to_owned(),
        line,
        key: key.to_owned(),
        message: message.to_owned(),
    }
}

/// Render a constant the way `-D` would accept it.
fn option_text(value: &Literal) -> String {
    match value {
        Literal::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read-only environment access used when searching for machine files.
pub trait EnvProvider {
    /// Fetch the environment variable value for `key`.
    fn var(&self, key: &str) -> Option<String>;
}

/// Environment provider backed by the process environment.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemEnv;

impl EnvProvider for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// Locate a machine file given on the command line.
///
/// Existing paths (absolute or relative to `cwd`) are used as they are.
/// Otherwise `$XDG_DATA_HOME/meson/<kind>` and each entry of
/// `$XDG_DATA_DIRS` followed by `meson/<kind>` are searched, where `kind` is
/// `cross` or `native`.
///
/// # Errors
///
/// Returns [`MachineFileError::NotFound`] when no candidate exists.
pub fn resolve(
    name: &str,
    kind: &'static str,
    cwd: &Utf8Path,
) -> Result<Utf8PathBuf, MachineFileError> {
    resolve_with_env(name, kind, cwd, &SystemEnv)
}

/// [`resolve`] with an explicit environment.
///
/// # Errors
///
/// Returns [`MachineFileError::NotFound`] when no candidate exists.
pub fn resolve_with_env(
    name: &str,
    kind: &'static str,
    cwd: &Utf8Path,
    env: &impl EnvProvider,
) -> Result<Utf8PathBuf, MachineFileError> {
    let given = Utf8Path::new(name);
    let direct = if given.is_absolute() {
        given.to_path_buf()
    } else {
        cwd.join(given)
    };
    if direct.is_file() {
        return Ok(direct);
    }
    if !given.is_absolute() {
        let data_home = env
            .var("XDG_DATA_HOME")
            .or_else(|| env.var("HOME").map(|home| format!("{home}/.local/share")));
        let data_dirs = env
            .var("XDG_DATA_DIRS")
            .unwrap_or_else(|| "/usr/local/share:/usr/share".to_owned());
        let candidates = data_home
            .into_iter()
            .chain(data_dirs.split(':').map(str::to_owned))
            .filter(|dir| !dir.is_empty())
            .map(|dir| Utf8PathBuf::from(dir).join("meson").join(kind).join(given));
        for candidate in candidates {
            if candidate.is_file() {
                debug!(path = %candidate, "found {kind} file");
                return Ok(candidate);
            }
        }
    }
    Err(MachineFileError::NotFound {
        kind,
        name: name.to_owned(),
    })
}

/// Build, host and target machines of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machines {
    /// Machine running the build.
    pub build: MachineInfo,
    /// Machine the outputs run on.
    pub host: MachineInfo,
    /// Machine a compiler being built will generate code for.
    pub target: MachineInfo,
    /// Whether a cross file was given.
    pub is_cross: bool,
}

impl Machines {
    /// Derive the machines from native and cross files.
    ///
    /// Without a cross file every machine is the build machine. The build
    /// machine comes from `[build_machine]` in either file, otherwise from
    /// the running process.
    ///
    /// # Errors
    ///
    /// Returns [`MachineFileError::MissingField`] for incomplete machine
    /// sections.
    pub fn from_files(native: &MachineFiles, cross: &MachineFiles) -> Result<Self, MachineFileError> {
        let build = match native.build_machine()? {
            Some(info) => info,
            None => cross.build_machine()?.unwrap_or_else(MachineInfo::detect),
        };
        let is_cross = !cross.files.is_empty();
        let host = if is_cross {
            cross.host_machine()?.unwrap_or_else(|| build.clone())
        } else {
            build.clone()
        };
        let target = cross.target_machine()?.unwrap_or_else(|| host.clone());
        Ok(Self {
            build,
            host,
            target,
            is_cross,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result as AnyResult, ensure};
    use rstest::rstest;

    const CROSS: &str = "\
[constants]
toolchain = '/opt/tc'
arch = 'aarch64-linux-gnu'

[binaries]
c = toolchain / 'bin' / arch + '-gcc'
ar = [toolchain / 'bin/ar', '--plugin']

[properties]
needs_exe_wrapper = true
sizeof_int = 4

[built-in options]
c_args = ['-O2', '-g']
prefix = '/usr'

[project options]
docs = false

[sub:project options]
level = 3

[host_machine]
system = 'linux'
cpu_family = 'aarch64'
cpu = 'cortex-a53'
endian = 'little'
";

    #[test]
    fn parses_a_cross_file() -> AnyResult<()> {
        let mut files = MachineFiles::default();
        files.parse_str(CROSS, "cross.ini")?;
        ensure!(files.binaries["c"] == ["/opt/tc/bin/aarch64-linux-gnu-gcc"]);
        ensure!(files.binaries["ar"] == ["/opt/tc/bin/ar", "--plugin"]);
        ensure!(files.properties["needs_exe_wrapper"] == Literal::Bool(true));
        ensure!(files.builtin_options["c_args"] == "['-O2', '-g']");
        ensure!(files.builtin_options["prefix"] == "/usr");
        ensure!(files.project_options["docs"] == "false");
        ensure!(files.project_options["sub:level"] == "3");
        let host = files.host_machine()?.expect("host section");
        ensure!(host.cpu_family == "aarch64");
        ensure!(files.build_machine()?.is_none());
        Ok(())
    }

    #[test]
    fn later_files_see_earlier_constants() -> AnyResult<()> {
        let mut files = MachineFiles::default();
        files.parse_str("[constants]\nroot = '/x'\n", "a.ini")?;
        files.parse_str("[binaries]\npython = root / 'python3'\n", "b.ini")?;
        ensure!(files.binaries["python"] == ["/x/python3"]);
        Ok(())
    }

    #[test]
    fn later_files_override_entries() -> AnyResult<()> {
        let mut files = MachineFiles::default();
        files.parse_str("[binaries]\nc = 'gcc'\n", "a.ini")?;
        files.parse_str("[binaries]\nc = 'clang'\n", "b.ini")?;
        ensure!(files.binaries["c"] == ["clang"]);
        Ok(())
    }

    #[rstest]
    #[case("[binaries]\nc = undefined_thing\n", "Undefined constant")]
    #[case("[binaries]\nc = 1\n", "binaries must be strings")]
    #[case(
        "[host_machine]\nsystem = 'linux'\ncpu_family = 'x86'\ncpu = 'i686'\nendian = 'middle'\n",
        "Unknown endian middle"
    )]
    #[case("[properties]\nx = f()\n", "Only strings")]
    fn rejects_bad_values(#[case] src: &str, #[case] needle: &str) {
        let mut files = MachineFiles::default();
        let err = files.parse_str(src, "bad.ini").expect_err("invalid");
        assert!(err.to_string().contains(needle), "{err}");
    }

    #[test]
    fn incomplete_machine_section() -> AnyResult<()> {
        let mut files = MachineFiles::default();
        files.parse_str("[host_machine]\nsystem = 'linux'\n", "m.ini")?;
        let err = files.host_machine().expect_err("incomplete");
        ensure!(err.to_string().contains("missing cpu_family"), "{err}");
        Ok(())
    }

    #[test]
    fn resolves_existing_and_missing_files() -> AnyResult<()> {
        let dir = tempfile::tempdir()?;
        let cwd = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|p| anyhow::anyhow!("non-UTF-8 temp dir {}", p.display()))?;
        fs::write(cwd.join("native.ini"), "[binaries]\n")?;
        ensure!(resolve("native.ini", "native", &cwd)? == cwd.join("native.ini"));
        let err = resolve("definitely-missing-kumihimo.ini", "cross", &cwd)
            .expect_err("missing");
        ensure!(err.to_string().contains("Cannot find specified cross file"));
        Ok(())
    }

    struct StubEnv(Vec<(&'static str, String)>);

    impl EnvProvider for StubEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
        }
    }

    #[rstest]
    #[case::data_home("XDG_DATA_HOME", "home")]
    #[case::data_dirs("XDG_DATA_DIRS", "first:shared")]
    fn searches_xdg_data_directories(
        #[case] variable: &'static str,
        #[case] dirs: &str,
    ) -> AnyResult<()> {
        let dir = tempfile::tempdir()?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|p| anyhow::anyhow!("non-UTF-8 temp dir {}", p.display()))?;
        let data_dir = dirs.rsplit(':').next().unwrap_or(dirs);
        let expected = root.join(data_dir).join("meson/cross/x.ini");
        fs::create_dir_all(root.join(data_dir).join("meson/cross"))?;
        fs::write(&expected, "[host_machine]\n")?;
        let value = dirs
            .split(':')
            .map(|d| root.join(d).into_string())
            .collect::<Vec<_>>()
            .join(":");
        let env = StubEnv(vec![(variable, value)]);
        let cwd = root.join("elsewhere");
        ensure!(resolve_with_env("x.ini", "cross", &cwd, &env)? == expected);
        let err = resolve_with_env("x.ini", "native", &cwd, &env).expect_err("wrong kind");
        ensure!(err.to_string().contains("native"), "{err}");
        Ok(())
    }
}
