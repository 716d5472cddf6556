//! Minimal INI reader shared by machine files, wrap files and
//! `meson.format`.
//!
//! Supports `[section]` headers, `key = value` and `key: value` entries,
//! full-line `#` and `;` comments, and indented continuation lines which
//! are joined to the previous value with a newline. Keys keep their case.

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised while reading an INI document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IniError {
    /// An entry appeared before any section header.
    #[error("line {line}: entry outside of a section")]
    NoSection {
        /// One-based line number.
        line: usize,
    },
    /// A line that is neither a header, a comment nor an entry.
    #[error("line {line}: expected \"key = value\", found {text:?}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// The offending text.
        text: String,
    },
    /// The same section was declared twice.
    #[error("line {line}: section [{name}] already defined")]
    DuplicateSection {
        /// One-based line number.
        line: usize,
        /// Section name.
        name: String,
    },
    /// The same key appeared twice within one section.
    #[error("line {line}: key {key:?} already set in section [{section}]")]
    DuplicateKey {
        /// One-based line number.
        line: usize,
        /// Section name.
        section: String,
        /// Repeated key.
        key: String,
    },
}

/// A value and the line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniValue {
    /// Trimmed value text.
    pub text: String,
    /// One-based line number of the key.
    pub line: usize,
}

/// One `[section]` and its entries in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IniSection {
    /// Section name without brackets.
    pub name: String,
    /// One-based line number of the header.
    pub line: usize,
    /// Entries in file order.
    pub entries: IndexMap<String, IniValue>,
}

impl IniSection {
    /// Text of `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.text.as_str())
    }
}

/// Parsed INI document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IniDocument {
    /// Sections in file order.
    pub sections: Vec<IniSection>,
}

impl IniDocument {
    /// Look up a section by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// Parse INI text.
///
/// # Errors
///
/// Returns an [`IniError`] for entries outside sections, malformed lines
/// and duplicated sections or keys.
///
/// # Examples
///
/// ```rust
/// use kumihimo::ini::parse;
///
/// let doc = parse("[binaries]\nc = 'gcc'\n").expect("parse");
/// assert_eq!(doc.section("binaries").and_then(|s| s.get("c")), Some("'gcc'"));
/// ```
pub fn parse(src: &str) -> Result<IniDocument, IniError> {
    parse_into(src, IniDocument::default())
}

/// Parse INI text whose leading entries belong to an implicit section.
///
/// `meson.format` has no headers at all and `.editorconfig` keeps `root`
/// above its first glob section; both are read with this entry point so
/// that line numbers stay true to the file.
///
/// # Errors
///
/// Returns an [`IniError`] for malformed lines and duplicated sections or
/// keys.
///
/// ```rust
/// use kumihimo::ini::parse_sectionless;
///
/// let doc = parse_sectionless("indent_by = '  '\n", "format").expect("parse");
/// assert_eq!(doc.section("format").and_then(|s| s.get("indent_by")), Some("'  '"));
/// ```
pub fn parse_sectionless(src: &str, name: &str) -> Result<IniDocument, IniError> {
    let doc = IniDocument {
        sections: vec![IniSection {
            name: name.to_owned(),
            line: 0,
            entries: IndexMap::new(),
        }],
    };
    parse_into(src, doc)
}

fn parse_into(src: &str, mut doc: IniDocument) -> Result<IniDocument, IniError> {
    let mut last_key: Option<String> = None;
    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            last_key = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        let indented = raw.starts_with(char::is_whitespace);
        if indented {
            if let (Some(key), Some(section)) = (&last_key, doc.sections.last_mut()) {
                if let Some(value) = section.entries.get_mut(key) {
                    if !value.text.is_empty() {
                        value.text.push('\n');
                    }
                    value.text.push_str(trimmed);
                    continue;
                }
            }
        }
        if let Some(name) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let name = name.trim().to_owned();
            if doc.section(&name).is_some() {
                return Err(IniError::DuplicateSection { line, name });
            }
            doc.sections.push(IniSection {
                name,
                line,
                entries: IndexMap::new(),
            });
            last_key = None;
            continue;
        }
        let Some((raw_key, raw_value)) = trimmed.split_once(['=', ':']) else {
            return Err(IniError::Malformed {
                line,
                text: trimmed.to_owned(),
            });
        };
        let key = raw_key.trim();
        if key.is_empty() {
            return Err(IniError::Malformed {
                line,
                text: trimmed.to_owned(),
            });
        }
        let text = raw_value.trim().to_owned();
        let Some(section) = doc.sections.last_mut() else {
            return Err(IniError::NoSection { line });
        };
        if section.entries.contains_key(key) {
            return Err(IniError::DuplicateKey {
                line,
                section: section.name.clone(),
                key: key.to_owned(),
            });
        }
        section
            .entries
            .insert(key.to_owned(), IniValue { text, line });
        last_key = Some(key.to_owned());
    }
    Ok(doc)
}
