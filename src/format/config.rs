//! Formatter settings from `meson.format` and `.editorconfig`.
//!
//! Settings are layered: built-in defaults, then matching `.editorconfig`
//! sections when enabled, then the entries of `meson.format`.

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use tracing::debug;

use super::FormatError;
use crate::ini::{self, IniSection};

/// Name of the formatter configuration file.
pub const CONFIG_FILE: &str = "meson.format";

const EDITORCONFIG: &str = ".editorconfig";

/// Line terminator written by the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfLine {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// `\r`
    Cr,
    /// Whatever the host platform uses.
    Native,
}

impl EndOfLine {
    fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "lf" => Some(Self::Lf),
            "crlf" => Some(Self::CrLf),
            "cr" => Some(Self::Cr),
            "native" => Some(Self::Native),
            _ => None,
        }
    }

    /// Terminator text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
            Self::Native => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
        }
    }
}

/// Effective layout settings for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    /// Column limit before argument lists are split.
    pub max_line_length: usize,
    /// Text of one indentation level.
    pub indent_by: String,
    /// Width of a tab when measuring lines.
    pub tab_width: usize,
    /// Pad array brackets with spaces: `[ 'a' ]`.
    pub space_array: bool,
    /// Split every call that has keyword arguments.
    pub kwargs_force_multiline: bool,
    /// Write `key : value` instead of `key: value`.
    pub wide_colon: bool,
    /// Omit the trailing comma of a split call with a single argument.
    pub no_single_comma_function: bool,
    /// Separator between code and a trailing comment.
    pub indent_before_comments: String,
    /// Rewrite `'''x'''` and `f'x'` as `'x'` when nothing is lost.
    pub simplify_string_literals: bool,
    /// Line terminator.
    pub end_of_line: EndOfLine,
    /// End the output with a line terminator.
    pub insert_final_newline: bool,
    /// Sort the string arguments of `files()`.
    pub sort_files: bool,
    /// Read `.editorconfig` files.
    pub use_editor_config: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            max_line_length: 80,
            indent_by: "    ".to_owned(),
            tab_width: 4,
            space_array: false,
            kwargs_force_multiline: false,
            wide_colon: false,
            no_single_comma_function: false,
            indent_before_comments: " ".to_owned(),
            simplify_string_literals: true,
            end_of_line: EndOfLine::Native,
            insert_final_newline: true,
            sort_files: true,
            use_editor_config: false,
        }
    }
}

impl FormatConfig {
    /// Apply the entries of a `meson.format` section.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Config`] for unknown keys and invalid values.
    pub fn apply(&mut self, section: &IniSection, origin: &Utf8Path) -> Result<(), FormatError> {
        for (key, value) in &section.entries {
            let text = unquote(&value.text);
            let bad = |expected: &str| FormatError::Config {
                path: origin.to_owned(),
                line: value.line,
                message: format!("{key}: expected {expected}, found {:?}", value.text),
            };
            match key.as_str() {
                "max_line_length" => {
                    self.max_line_length = text.parse().map_err(|_| bad("an integer"))?;
                }
                "tab_width" => self.tab_width = text.parse().map_err(|_| bad("an integer"))?,
                "indent_by" => self.indent_by = text.to_owned(),
                "indent_before_comments" => self.indent_before_comments = text.to_owned(),
                "end_of_line" => {
                    self.end_of_line =
                        EndOfLine::parse(text).ok_or_else(|| bad("cr, lf, crlf or native"))?;
                }
                flag => {
                    let slot = match flag {
                        "space_array" => &mut self.space_array,
                        "kwargs_force_multiline" => &mut self.kwargs_force_multiline,
                        "wide_colon" => &mut self.wide_colon,
                        "no_single_comma_function" => &mut self.no_single_comma_function,
                        "simplify_string_literals" => &mut self.simplify_string_literals,
                        "insert_final_newline" => &mut self.insert_final_newline,
                        "sort_files" => &mut self.sort_files,
                        "use_editor_config" => &mut self.use_editor_config,
                        other => {
                            return Err(FormatError::Config {
                                path: origin.to_owned(),
                                line: value.line,
                                message: format!("unknown option {other:?}"),
                            });
                        }
                    };
                    *slot = parse_bool(text).ok_or_else(|| bad("true or false"))?;
                }
            }
        }
        Ok(())
    }

    /// Apply the `.editorconfig` properties that match `file`.
    ///
    /// Files are read from the directory of `file` upwards until one
    /// declares `root = true`; nearer files take precedence.
    ///
    /// # Errors
    ///
    /// Returns an error when an `.editorconfig` cannot be read or parsed.
    pub fn apply_editorconfig(&mut self, file: &Utf8Path) -> Result<(), FormatError> {
        let name = file.file_name().unwrap_or_default();
        let mut layers = Vec::new();
        for dir in file.parent().into_iter().flat_map(Utf8Path::ancestors) {
            let path = dir.join(EDITORCONFIG);
            if !path.is_file() {
                continue;
            }
            let text = read(&path)?;
            let doc = ini::parse_sectionless(&text, "").map_err(|source| FormatError::Ini {
                path: path.clone(),
                source,
            })?;
            let root = doc
                .section("")
                .and_then(|s| s.get("root"))
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
            layers.push(doc);
            if root {
                break;
            }
        }
        for doc in layers.iter().rev() {
            for section in doc.sections.iter().filter(|s| glob_matches(&s.name, name)) {
                self.apply_editor_section(section);
            }
        }
        Ok(())
    }

    fn apply_editor_section(&mut self, section: &IniSection) {
        let tabs = section
            .get("indent_style")
            .map(|style| style.eq_ignore_ascii_case("tab"));
        if let Some(width) = section.get("tab_width").and_then(|w| w.parse().ok()) {
            self.tab_width = width;
        }
        match (tabs, section.get("indent_size")) {
            (Some(true), _) | (_, Some("tab")) => self.indent_by = "\t".to_owned(),
            (_, Some(size)) => {
                if let Ok(size) = size.parse::<usize>() {
                    self.indent_by = " ".repeat(size);
                }
            }
            (Some(false), None) if self.indent_by.contains('\t') => {
                self.indent_by = " ".repeat(self.tab_width);
            }
            _ => {}
        }
        if let Some(length) = section.get("max_line_length").and_then(|l| l.parse().ok()) {
            self.max_line_length = length;
        }
        if let Some(eol) = section.get("end_of_line").and_then(EndOfLine::parse) {
            self.end_of_line = eol;
        }
        if let Some(flag) = section.get("insert_final_newline").and_then(parse_bool) {
            self.insert_final_newline = flag;
        }
    }
}

/// Where formatter settings come from.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    explicit: Option<(Utf8PathBuf, IniSection)>,
    editorconfig: bool,
}

impl Settings {
    /// Use `config` for every file, or discover `meson.format` per file
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when `config` cannot be read or parsed.
    pub fn load(config: Option<&Utf8Path>, editorconfig: bool) -> Result<Self, FormatError> {
        let explicit = config.map(load_section).transpose()?;
        Ok(Self {
            explicit,
            editorconfig,
        })
    }

    /// Resolve the settings that apply to `file`.
    ///
    /// # Errors
    ///
    /// Returns an error when a discovered configuration file is invalid.
    pub fn config_for(&self, file: &Utf8Path) -> Result<FormatConfig, FormatError> {
        let discovered;
        let layer = match &self.explicit {
            Some(found) => Some(found),
            None => {
                discovered = discover(file)?;
                discovered.as_ref()
            }
        };
        let mut config = FormatConfig::default();
        let wants_editorconfig = self.editorconfig
            || layer
                .and_then(|(_, section)| section.get("use_editor_config"))
                .and_then(|v| parse_bool(unquote(v)))
                .unwrap_or(false);
        if wants_editorconfig {
            config.apply_editorconfig(file)?;
        }
        if let Some((origin, section)) = layer {
            config.apply(section, origin)?;
        }
        Ok(config)
    }
}

fn discover(file: &Utf8Path) -> Result<Option<(Utf8PathBuf, IniSection)>, FormatError> {
    for dir in file.parent().into_iter().flat_map(Utf8Path::ancestors) {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            debug!(path = %candidate, "using formatter configuration");
            return load_section(&candidate).map(Some);
        }
    }
    Ok(None)
}

fn load_section(path: &Utf8Path) -> Result<(Utf8PathBuf, IniSection), FormatError> {
    let text = read(path)?;
    let doc = ini::parse_sectionless(&text, CONFIG_FILE).map_err(|source| FormatError::Ini {
        path: path.to_owned(),
        source,
    })?;
    let mut merged = IniSection::default();
    for section in doc.sections {
        merged.entries.extend(section.entries);
    }
    Ok((path.to_owned(), merged))
}

fn read(path: &Utf8Path) -> Result<String, FormatError> {
    std::fs::read_to_string(path).map_err(|source| FormatError::Read {
        path: path.to_owned(),
        source,
    })
}

fn unquote(text: &str) -> &str {
    ['\'', '"']
        .iter()
        .find_map(|q| text.strip_prefix(*q).and_then(|t| t.strip_suffix(*q)))
        .unwrap_or(text)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Match an editorconfig section glob against a bare file name.
///
/// `{a,b}` alternatives are expanded before each candidate is handed to
/// [`glob::Pattern`]; a leading `**/` or `/` is ignored since only the file
/// name is compared.
fn glob_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern
        .strip_prefix("**/")
        .or_else(|| pattern.strip_prefix('/'))
        .unwrap_or(pattern);
    if pattern.is_empty() || pattern.contains('/') {
        return false;
    }
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    expand_braces(pattern)
        .iter()
        .any(|candidate| match Pattern::new(candidate) {
            Ok(glob) => glob.matches_with(name, options),
            Err(err) => {
                debug!(pattern = %candidate, error = %err, "ignoring invalid section glob");
                false
            }
        })
}

fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((head, rest)) = pattern.split_once('{') else {
        return vec![pattern.to_owned()];
    };
    let Some((alternatives, tail)) = rest.split_once('}') else {
        return vec![pattern.to_owned()];
    };
    alternatives
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{head}{alt}{tail}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn section(src: &str) -> IniSection {
        ini::parse_sectionless(src, CONFIG_FILE)
            .expect("parse")
            .sections
            .remove(0)
    }

    #[test]
    fn applies_format_file_entries() {
        let mut config = FormatConfig::default();
        let entries = section(
            "indent_by = '  '\nmax_line_length = 60\nwide_colon = true\nend_of_line = crlf\n",
        );
        config
            .apply(&entries, Utf8Path::new("meson.format"))
            .expect("apply");
        assert_eq!(config.indent_by, "  ");
        assert_eq!(config.max_line_length, 60);
        assert!(config.wide_colon);
        assert_eq!(config.end_of_line, EndOfLine::CrLf);
    }

    #[rstest]
    #[case("max_line_length = wide\n", "max_line_length: expected an integer")]
    #[case("sort_files = maybe\n", "sort_files: expected true or false")]
    #[case("colour = blue\n", "unknown option \"colour\"")]
    fn rejects_bad_entries(#[case] src: &str, #[case] expected: &str) {
        let err = FormatConfig::default()
            .apply(&section(src), Utf8Path::new("meson.format"))
            .expect_err("invalid entry");
        assert!(err.to_string().contains(expected), "{err}");
        assert!(err.to_string().starts_with("meson.format:1:"), "{err}");
    }

    #[rstest]
    #[case("*", "meson.build", true)]
    #[case("*.build", "meson.build", true)]
    #[case("meson.{build,options}", "meson.options", true)]
    #[case("**/meson.build", "meson.build", true)]
    #[case("*.py", "meson.build", false)]
    #[case("src/*.build", "meson.build", false)]
    #[case("meson.?uild", "meson.build", true)]
    #[case("meson.buil[d]", "meson.build", true)]
    #[case("[!m]*.build", "meson.build", false)]
    #[case("?.build", "é.build", true)]
    #[case("{meson,other}.{build,txt}", "other.txt", true)]
    fn matches_editorconfig_globs(#[case] pattern: &str, #[case] name: &str, #[case] hit: bool) {
        assert_eq!(glob_matches(pattern, name), hit);
    }

    #[test]
    fn editorconfig_layers_stop_at_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = Utf8Path::from_path(dir.path()).expect("utf8");
        std::fs::write(root.join(EDITORCONFIG), "[*]\nindent_size = 8\n").expect("outer");
        let project = root.join("project");
        std::fs::create_dir_all(project.join("sub")).expect("mkdir");
        std::fs::write(
            project.join(EDITORCONFIG),
            "root = true\n[*]\nindent_style = space\nindent_size = 2\n",
        )
        .expect("root");
        std::fs::write(
            project.join("sub").join(EDITORCONFIG),
            "[*.build]\nindent_style = tab\n",
        )
        .expect("nested");

        let mut top = FormatConfig::default();
        top.apply_editorconfig(&project.join("meson.build"))
            .expect("top");
        assert_eq!(top.indent_by, "  ");

        let mut nested = FormatConfig::default();
        nested
            .apply_editorconfig(&project.join("sub").join("meson.build"))
            .expect("nested");
        assert_eq!(nested.indent_by, "\t");
    }

    #[test]
    fn format_file_wins_over_editorconfig() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = Utf8Path::from_path(dir.path()).expect("utf8");
        std::fs::write(root.join(EDITORCONFIG), "root = true\n[*]\nindent_size = 2\nmax_line_length = 100\n")
            .expect("editorconfig");
        std::fs::write(root.join(CONFIG_FILE), "use_editor_config = true\nindent_by = '   '\n")
            .expect("format file");
        let config = Settings::load(None, false)
            .expect("settings")
            .config_for(&root.join("meson.build"))
            .expect("config");
        assert_eq!(config.indent_by, "   ");
        assert_eq!(config.max_line_length, 100);
    }
}
