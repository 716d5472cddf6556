//! Wrap files describing subprojects.
//!
//! A `subprojects/<name>.wrap` file names a subproject, how its sources are
//! obtained and which dependencies and programs it provides. Directories in
//! `subprojects/` without a wrap file are treated as local subprojects.
//! Nothing is fetched over the network: a subproject is usable once its
//! directory exists.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::hasher::file_sha256;
use crate::ini::{self, IniDocument, IniError};

/// Directories under `subprojects/` that never hold a subproject.
const RESERVED_DIRS: [&str; 2] = ["packagecache", "packagefiles"];

/// Errors raised while reading or resolving wraps.
#[derive(Debug, Error)]
pub enum WrapError {
    /// The file could not be read.
    #[error("failed to read {path}")]
    Io {
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Malformed INI structure.
    #[error("Failed to parse {file}: {source}")]
    Ini {
        /// Wrap file name.
        file: String,
        /// Underlying error.
        #[source]
        source: IniError,
    },
    /// Any semantic problem with a wrap file.
    #[error("{0}")]
    Invalid(String),
    /// Neither a wrap file nor a directory exists.
    #[error("Neither a subproject directory nor a {0}.wrap file was found.")]
    NotFound(String),
    /// The wrap exists but its sources are not present locally.
    #[error("Subproject {name} is not available: {reason}")]
    Unavailable {
        /// Wrap name.
        name: String,
        /// Why it cannot be used.
        reason: String,
    },
    /// A checksum did not match.
    #[error("Incorrect hash for {what}:\n {expected} expected\n {actual} actual.")]
    HashMismatch {
        /// `source` or `patch`.
        what: String,
        /// Hash from the wrap file.
        expected: String,
        /// Hash of the cached file.
        actual: String,
    },
}

/// How the sources of a wrap are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapKind {
    /// Archive download.
    File,
    /// Git checkout.
    Git,
    /// Mercurial checkout.
    Hg,
    /// Subversion checkout.
    Svn,
}

impl WrapKind {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "file" => Some(Self::File),
            "git" => Some(Self::Git),
            "hg" => Some(Self::Hg),
            "svn" => Some(Self::Svn),
            _ => None,
        }
    }
}

/// A parsed wrap file or a bare subproject directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDefinition {
    /// Subproject name: the wrap file stem or the directory name.
    pub name: String,
    /// Wrap file read last (after following a redirect), if any.
    pub filename: Option<Utf8PathBuf>,
    /// Source kind; `None` for a bare directory.
    pub kind: Option<WrapKind>,
    /// Entries of the `[wrap-*]` section.
    pub values: IndexMap<String, String>,
    /// Dependency name to the variable holding it, if one was given.
    pub provided_deps: IndexMap<String, Option<String>>,
    /// Programs provided by the subproject.
    pub provided_programs: Vec<String>,
    /// Directory under `subprojects/` holding the sources.
    pub directory: String,
    /// Whether a `[wrap-redirect]` was followed.
    pub redirected: bool,
}

impl PackageDefinition {
    /// Describe a subproject directory that has no wrap file.
    #[must_use]
    pub fn from_directory(name: &str) -> Self {
        let mut provided_deps = IndexMap::new();
        provided_deps.insert(name.to_owned(), None);
        Self {
            name: name.to_owned(),
            filename: None,
            kind: None,
            values: IndexMap::new(),
            provided_deps,
            provided_programs: Vec::new(),
            directory: name.to_owned(),
            redirected: false,
        }
    }

    /// Read and validate a `.wrap` file, following redirects.
    ///
    /// # Errors
    ///
    /// Returns a [`WrapError`] for unreadable files, a missing or wrong
    /// `[wrap-*]` section, bad redirects, an invalid `directory` or empty
    /// `[provide]` variables.
    pub fn from_file(path: &Utf8Path) -> Result<Self, WrapError> {
        let name = path.file_stem().unwrap_or_default().to_owned();
        let mut def = Self::from_directory(&name);
        let (doc, kind, values) = read_wrap(path)?;
        if kind == "redirect" {
            let target = redirect_target(path, &values)?;
            let (doc, kind, values) = read_wrap(&target)?;
            def.apply(&doc, &kind, values, &target)?;
            def.redirected = true;
        } else {
            def.apply(&doc, &kind, values, path)?;
        }
        Ok(def)
    }

    fn apply(
        &mut self,
        doc: &IniDocument,
        kind: &str,
        values: IndexMap<String, String>,
        path: &Utf8Path,
    ) -> Result<(), WrapError> {
        let basename = path.file_name().unwrap_or_default();
        self.kind = Some(
            WrapKind::parse(kind)
                .ok_or_else(|| WrapError::Invalid(format!("Unknown wrap type {kind:?}")))?,
        );
        self.filename = Some(path.to_path_buf());
        self.directory = values
            .get("directory")
            .cloned()
            .unwrap_or_else(|| self.name.clone());
        if self.directory.contains(['/', '\\']) {
            return Err(WrapError::Invalid(
                "Directory key must be a name and not a path".to_owned(),
            ));
        }
        self.values = values;
        if let Some(provide) = doc.section("provide") {
            for (key, value) in &provide.entries {
                let key = key.to_lowercase();
                match key.as_str() {
                    "dependency_names" => {
                        for dep in split_names(&value.text) {
                            self.provided_deps.insert(dep.to_lowercase(), None);
                        }
                    }
                    "program_names" => self.provided_programs.extend(split_names(&value.text)),
                    _ if value.text.is_empty() => {
                        return Err(WrapError::Invalid(format!(
                            "Empty dependency variable name for {key:?} in {basename}. If the subproject uses meson.override_dependency() it can be added in the \"dependency_names\" special key."
                        )));
                    }
                    _ => {
                        self.provided_deps.insert(key, Some(value.text.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Value of a `[wrap-*]` key.
    ///
    /// # Errors
    ///
    /// Returns [`WrapError::Invalid`] when the key is absent.
    pub fn get(&self, key: &str) -> Result<&str, WrapError> {
        self.values.get(key).map(String::as_str).ok_or_else(|| {
            WrapError::Invalid(format!("Missing key {key:?} in {}.wrap", self.name))
        })
    }
}

fn split_names(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .collect()
}

fn read_wrap(
    path: &Utf8Path,
) -> Result<(IniDocument, String, IndexMap<String, String>), WrapError> {
    let basename = path.file_name().unwrap_or_default().to_owned();
    let src = fs::read_to_string(path).map_err(|source| WrapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = ini::parse(&src).map_err(|source| WrapError::Ini {
        file: basename.clone(),
        source,
    })?;
    let Some(first) = doc.sections.first() else {
        return Err(WrapError::Invalid(format!("Missing sections in {basename}")));
    };
    let Some(kind) = first.name.strip_prefix("wrap-") else {
        return Err(WrapError::Invalid(format!(
            "{:?} is not a valid first section in {basename}",
            first.name
        )));
    };
    let kind = kind.to_owned();
    let values = first
        .entries
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.text.clone()))
        .collect();
    Ok((doc, kind, values))
}

fn redirect_target(
    path: &Utf8Path,
    values: &IndexMap<String, String>,
) -> Result<Utf8PathBuf, WrapError> {
    let Some(filename) = values.get("filename") else {
        return Err(WrapError::Invalid(
            "wrap-redirect is missing the filename key".to_owned(),
        ));
    };
    let relative = Utf8Path::new(filename);
    for (idx, part) in relative.components().enumerate() {
        let part = part.as_str();
        if idx.is_multiple_of(2) {
            if part == ".." {
                return Err(WrapError::Invalid(
                    "wrap-redirect filename cannot contain \"..\"".to_owned(),
                ));
            }
        } else if part != "subprojects" {
            return Err(WrapError::Invalid(
                "wrap-redirect filename must be in the form foo/subprojects/bar.wrap".to_owned(),
            ));
        }
    }
    if relative.extension() != Some("wrap") {
        return Err(WrapError::Invalid(
            "wrap-redirect filename must be a .wrap file".to_owned(),
        ));
    }
    let target = path.parent().unwrap_or(Utf8Path::new("")).join(relative);
    if !target.is_file() {
        return Err(WrapError::Invalid(format!(
            "wrap-redirect {target} filename does not exist"
        )));
    }
    Ok(target)
}

/// Result of checking one hash of a wrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashCheck {
    /// `source` or `patch`.
    pub what: String,
    /// Cached file that was hashed.
    pub file: Utf8PathBuf,
    /// Hash from the wrap file.
    pub expected: String,
}

/// All wraps and subproject directories of one `subprojects/` directory.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    subdir_root: Utf8PathBuf,
    wraps: IndexMap<String, PackageDefinition>,
    provided_deps: IndexMap<String, String>,
    provided_programs: IndexMap<String, String>,
}

impl Resolver {
    /// Scan `<source_dir>/<subproject_dir>`.
    ///
    /// A missing directory yields an empty resolver.
    ///
    /// # Errors
    ///
    /// Returns a [`WrapError`] for malformed wrap files or when two wraps
    /// provide the same dependency or program.
    pub fn load(source_dir: &Utf8Path, subproject_dir: &str) -> Result<Self, WrapError> {
        let subdir_root = source_dir.join(subproject_dir);
        let mut resolver = Self {
            subdir_root: subdir_root.clone(),
            ..Self::default()
        };
        if !subdir_root.is_dir() {
            return Ok(resolver);
        }
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in WalkDir::new(&subdir_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| WrapError::Io {
                path: subdir_root.clone(),
                source: err.into(),
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if entry.file_type().is_dir() {
                dirs.push(name);
            } else if name.ends_with(".wrap") {
                files.push(name);
            }
        }
        for file in files {
            let def = PackageDefinition::from_file(&subdir_root.join(&file))?;
            dirs.retain(|d| *d != def.directory);
            resolver.wraps.insert(def.name.clone(), def);
        }
        for dir in dirs {
            if RESERVED_DIRS.contains(&dir.as_str()) || resolver.wraps.contains_key(&dir) {
                continue;
            }
            resolver
                .wraps
                .insert(dir.clone(), PackageDefinition::from_directory(&dir));
        }
        for def in resolver.wraps.values() {
            for dep in def.provided_deps.keys() {
                if let Some(prev) = resolver.provided_deps.get(dep) {
                    return Err(WrapError::Invalid(format!(
                        "Multiple wrap files provide {dep:?} dependency: {} and {prev}",
                        def.name
                    )));
                }
                resolver.provided_deps.insert(dep.clone(), def.name.clone());
            }
            for program in &def.provided_programs {
                if let Some(prev) = resolver.provided_programs.get(program) {
                    return Err(WrapError::Invalid(format!(
                        "Multiple wrap files provide {program:?} program: {} and {prev}",
                        def.name
                    )));
                }
                resolver
                    .provided_programs
                    .insert(program.clone(), def.name.clone());
            }
        }
        debug!(root = %resolver.subdir_root, count = resolver.wraps.len(), "loaded wraps");
        Ok(resolver)
    }

    /// All known packages, sorted by name.
    pub fn packages(&self) -> impl Iterator<Item = &PackageDefinition> {
        let mut defs: Vec<_> = self.wraps.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs.into_iter()
    }

    /// Look up a package by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackageDefinition> {
        self.wraps.get(name)
    }

    /// Add packages of another resolver without replacing existing ones.
    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.wraps {
            self.wraps.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &other.provided_deps {
            self.provided_deps
                .entry(k.clone())
                .or_insert_with(|| v.clone());
        }
        for (k, v) in &other.provided_programs {
            self.provided_programs
                .entry(k.clone())
                .or_insert_with(|| v.clone());
        }
    }

    /// Subproject providing dependency `name` and the variable holding it.
    #[must_use]
    pub fn find_dep_provider(&self, name: &str) -> Option<(&str, Option<&str>)> {
        let name = name.to_lowercase();
        let wrap = self.wraps.get(self.provided_deps.get(&name)?)?;
        let var = wrap.provided_deps.get(&name)?.as_deref();
        Some((wrap.name.as_str(), var))
    }

    /// Subproject providing any of `names`.
    #[must_use]
    pub fn find_program_provider(&self, names: &[String]) -> Option<&str> {
        names
            .iter()
            .find_map(|n| self.provided_programs.get(n))
            .map(String::as_str)
    }

    /// Directory of subproject `name` relative to the source root.
    ///
    /// # Errors
    ///
    /// Returns [`WrapError::NotFound`] for unknown names and
    /// [`WrapError::Unavailable`] when the directory or its `meson.build`
    /// is missing.
    pub fn resolve(&self, name: &str) -> Result<Utf8PathBuf, WrapError> {
        let def = self
            .wraps
            .get(name)
            .ok_or_else(|| WrapError::NotFound(name.to_owned()))?;
        let dir = self.subdir_root.join(&def.directory);
        if !dir.is_dir() {
            return Err(WrapError::Unavailable {
                name: name.to_owned(),
                reason: format!(
                    "directory {} does not exist and downloading is not supported",
                    dir
                ),
            });
        }
        if !dir.join("meson.build").is_file() {
            return Err(WrapError::Unavailable {
                name: name.to_owned(),
                reason: format!("{dir} has no meson.build"),
            });
        }
        Ok(dir)
    }

    /// Verify `source_hash` and `patch_hash` of cached archives.
    ///
    /// Hashes whose `*_filename` is not in `packagecache` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`WrapError::HashMismatch`] for the first wrong checksum.
    pub fn verify(&self, name: &str) -> Result<Vec<HashCheck>, WrapError> {
        let def = self
            .wraps
            .get(name)
            .ok_or_else(|| WrapError::NotFound(name.to_owned()))?;
        let cache = self.subdir_root.join("packagecache");
        let mut checked = Vec::new();
        for what in ["source", "patch"] {
            let (Some(filename), Some(expected)) = (
                def.values.get(&format!("{what}_filename")),
                def.values.get(&format!("{what}_hash")),
            ) else {
                continue;
            };
            let file = cache.join(filename);
            if !file.is_file() {
                debug!(%file, "skipping hash check for missing cache file");
                continue;
            }
            let actual = file_sha256(&file).map_err(|source| WrapError::Io {
                path: file.clone(),
                source,
            })?;
            let expected = expected.to_lowercase();
            if actual != expected {
                return Err(WrapError::HashMismatch {
                    what: what.to_owned(),
                    expected,
                    actual,
                });
            }
            checked.push(HashCheck {
                what: what.to_owned(),
                file,
                expected,
            });
        }
        Ok(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::sha256_hex;
    use anyhow::{Result as AnyResult, ensure};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Tree {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Tree {
        fn subprojects(&self) -> Utf8PathBuf {
            self.root.join("subprojects")
        }

        fn write(&self, rel: &str, contents: &str) {
            let path = self.root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(path, contents).expect("write file");
        }
    }

    #[fixture]
    fn tree() -> Tree {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        fs::create_dir_all(root.join("subprojects")).expect("subprojects dir");
        Tree { _dir: dir, root }
    }

    const ZLIB: &str = "\
[wrap-file]
directory = zlib-1.3
source_filename = zlib-1.3.tar.gz
source_hash = HASH

[provide]
zlib = zlib_dep
dependency_names = z, libz
program_names = minigzip
";

    #[rstest]
    fn parses_provides(tree: Tree) -> AnyResult<()> {
        tree.write("subprojects/zlib.wrap", ZLIB);
        let def = PackageDefinition::from_file(&tree.subprojects().join("zlib.wrap"))?;
        ensure!(def.name == "zlib");
        ensure!(def.kind == Some(WrapKind::File));
        ensure!(def.directory == "zlib-1.3");
        ensure!(def.provided_deps.get("zlib") == Some(&Some("zlib_dep".to_owned())));
        ensure!(def.provided_deps.get("libz") == Some(&None));
        ensure!(def.provided_programs == ["minigzip"]);
        Ok(())
    }

    #[rstest]
    #[case("[provide]\nx = 1\n", "is not a valid first section")]
    #[case("", "Missing sections")]
    #[case("[wrap-ftp]\n", "Unknown wrap type")]
    #[case("[wrap-file]\ndirectory = a/b\n", "Directory key must be a name")]
    #[case("[wrap-git]\n\n[provide]\nfoo =\n", "Empty dependency variable name")]
    #[case("[wrap-redirect]\nfilename = ../x/subprojects/y.wrap\n", "cannot contain")]
    #[case("[wrap-redirect]\nfilename = x/deps/y.wrap\n", "in the form foo/subprojects/bar.wrap")]
    #[case("[wrap-redirect]\nfilename = x/subprojects/y.txt\n", "must be a .wrap file")]
    #[case("[wrap-redirect]\nfilename = x/subprojects/y.wrap\n", "does not exist")]
    fn invalid_wraps(tree: Tree, #[case] contents: &str, #[case] needle: &str) {
        tree.write("subprojects/bad.wrap", contents);
        let err = PackageDefinition::from_file(&tree.subprojects().join("bad.wrap"))
            .expect_err("invalid");
        assert!(err.to_string().contains(needle), "{err}");
    }

    #[rstest]
    fn follows_redirects(tree: Tree) -> AnyResult<()> {
        tree.write("subprojects/foo/subprojects/bar.wrap", "[wrap-git]\nurl = x\n");
        tree.write(
            "subprojects/bar.wrap",
            "[wrap-redirect]\nfilename = foo/subprojects/bar.wrap\n",
        );
        let def = PackageDefinition::from_file(&tree.subprojects().join("bar.wrap"))?;
        ensure!(def.redirected);
        ensure!(def.kind == Some(WrapKind::Git));
        ensure!(def.get("url")? == "x");
        Ok(())
    }

    #[rstest]
    fn resolver_finds_wraps_and_directories(tree: Tree) -> AnyResult<()> {
        tree.write("subprojects/zlib.wrap", ZLIB);
        tree.write("subprojects/zlib-1.3/meson.build", "project('zlib')\n");
        tree.write("subprojects/local/meson.build", "project('local')\n");
        fs::create_dir_all(tree.subprojects().join("packagecache"))?;
        let resolver = Resolver::load(&tree.root, "subprojects")?;
        let names: Vec<_> = resolver.packages().map(|p| p.name.as_str()).collect();
        ensure!(names == ["local", "zlib"], "{names:?}");
        ensure!(resolver.find_dep_provider("ZLIB") == Some(("zlib", Some("zlib_dep"))));
        ensure!(resolver.find_dep_provider("local") == Some(("local", None)));
        ensure!(resolver.find_program_provider(&["minigzip".into()]) == Some("zlib"));
        ensure!(resolver.resolve("zlib")? == tree.subprojects().join("zlib-1.3"));
        Ok(())
    }

    #[rstest]
    fn unavailable_sources_are_reported(tree: Tree) -> AnyResult<()> {
        tree.write("subprojects/zlib.wrap", ZLIB);
        let resolver = Resolver::load(&tree.root, "subprojects")?;
        let err = resolver.resolve("zlib").expect_err("not downloaded");
        ensure!(matches!(err, WrapError::Unavailable { .. }));
        let err = resolver.resolve("nothing").expect_err("unknown");
        ensure!(err.to_string().contains("nothing.wrap file was found"));
        Ok(())
    }

    #[rstest]
    fn duplicate_providers_are_rejected(tree: Tree) {
        tree.write("subprojects/a.wrap", "[wrap-git]\n\n[provide]\ndependency_names = x\n");
        tree.write("subprojects/b.wrap", "[wrap-git]\n\n[provide]\ndependency_names = x\n");
        let err = Resolver::load(&tree.root, "subprojects").expect_err("duplicate");
        assert!(err.to_string().contains("Multiple wrap files provide \"x\""), "{err}");
    }

    #[rstest]
    fn verifies_cached_archives(tree: Tree) -> AnyResult<()> {
        let good = sha256_hex(b"archive");
        tree.write("subprojects/packagecache/zlib-1.3.tar.gz", "archive");
        tree.write("subprojects/zlib.wrap", &ZLIB.replace("HASH", &good.to_uppercase()));
        let resolver = Resolver::load(&tree.root, "subprojects")?;
        let checks = resolver.verify("zlib")?;
        ensure!(checks.len() == 1 && checks[0].what == "source");

        tree.write("subprojects/packagecache/zlib-1.3.tar.gz", "tampered");
        let err = resolver.verify("zlib").expect_err("mismatch");
        ensure!(matches!(err, WrapError::HashMismatch { .. }));
        Ok(())
    }
}
