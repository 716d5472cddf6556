//! Tests for option parsing, layering and option files.

use super::*;
use anyhow::{Result as AnyResult, ensure};
use rstest::{fixture, rstest};

#[fixture]
fn store() -> OptionStore {
    OptionStore::new()
}

fn assignments(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn value(store: &OptionStore, key: &str) -> String {
    store
        .get(key)
        .map(|o| o.value.to_cli_string())
        .unwrap_or_default()
}

#[rstest]
fn builtin_defaults(store: OptionStore) {
    assert_eq!(value(&store, "prefix"), "/usr/local");
    assert_eq!(value(&store, "buildtype"), "debug");
    assert_eq!(value(&store, "debug"), "true");
    assert_eq!(value(&store, "optimization"), "0");
    assert_eq!(value(&store, "localstatedir"), "/var/local");
}

#[rstest]
#[case("/usr", "/etc", "/var", "/var/lib")]
#[case("/opt/app", "etc", "var", "com")]
#[case("/usr/local/", "etc", "/var/local", "/var/local/lib")]
fn prefix_moves_noprefix_defaults(
    mut store: OptionStore,
    #[case] prefix: &str,
    #[case] sysconf: &str,
    #[case] localstate: &str,
    #[case] sharedstate: &str,
) -> AnyResult<()> {
    store.apply(&assignments(&[("prefix", prefix)]))?;
    ensure!(value(&store, "sysconfdir") == sysconf);
    ensure!(value(&store, "localstatedir") == localstate);
    ensure!(value(&store, "sharedstatedir") == sharedstate);
    Ok(())
}

#[rstest]
fn explicit_directory_survives_prefix_change(mut store: OptionStore) -> AnyResult<()> {
    store.apply(&assignments(&[("sysconfdir", "/srv/etc"), ("prefix", "/usr")]))?;
    ensure!(value(&store, "sysconfdir") == "/srv/etc");
    Ok(())
}

#[rstest]
fn absolute_directories_become_relative(mut store: OptionStore) -> AnyResult<()> {
    store.apply(&assignments(&[("prefix", "/opt/x"), ("libdir", "/opt/x/lib64")]))?;
    ensure!(value(&store, "libdir") == "lib64");
    let err = store
        .set("bindir", "/elsewhere/bin")
        .expect_err("outside prefix");
    ensure!(matches!(err, OptionError::OutsidePrefix { .. }));
    Ok(())
}

#[rstest]
fn relative_prefix_is_rejected(mut store: OptionStore) {
    assert_eq!(
        store.set("prefix", "usr"),
        Err(OptionError::RelativePrefix("usr".into()))
    );
}

#[rstest]
#[case("/usr/", "/usr")]
#[case("/", "/")]
#[case("C:/", "C:/")]
#[case("C:\\tools\\", "C:\\tools")]
fn prefixes_lose_trailing_separators(#[case] raw: &str, #[case] expected: &str) -> AnyResult<()> {
    ensure!(sanitize_prefix(raw)? == expected);
    Ok(())
}

#[rstest]
#[case("release", "false", "3")]
#[case("debugoptimized", "true", "2")]
#[case("minsize", "false", "s")]
#[case("plain", "false", "plain")]
fn buildtype_sets_debug_and_optimization(
    mut store: OptionStore,
    #[case] buildtype: &str,
    #[case] debug: &str,
    #[case] optimization: &str,
) -> AnyResult<()> {
    store.set("buildtype", buildtype)?;
    ensure!(value(&store, "debug") == debug);
    ensure!(value(&store, "optimization") == optimization);
    Ok(())
}

#[rstest]
fn debug_and_optimization_derive_buildtype(mut store: OptionStore) -> AnyResult<()> {
    store.set("optimization", "2")?;
    ensure!(value(&store, "buildtype") == "debugoptimized");
    store.set("optimization", "g")?;
    ensure!(value(&store, "buildtype") == "custom");
    Ok(())
}

#[rstest]
fn unknown_keys_are_returned(mut store: OptionStore) -> AnyResult<()> {
    let unknown = store.apply(&assignments(&[("nope", "1"), ("werror", "true")]))?;
    ensure!(unknown == ["nope"]);
    ensure!(value(&store, "werror") == "true");
    Ok(())
}

#[rstest]
fn language_options_are_accepted(mut store: OptionStore) -> AnyResult<()> {
    ensure!(store.set("c_std", "c11")?);
    let option = store.get("c_std").expect("created");
    ensure!(option.section == OptionSection::Compiler);
    Ok(())
}

#[rstest]
#[case("werror", "maybe", "not boolean")]
#[case("buildtype", "fast", "not one of the choices")]
#[case("auto_features", "on", "must be one of enabled, disabled or auto")]
fn invalid_builtin_values(
    mut store: OptionStore,
    #[case] key: &str,
    #[case] text: &str,
    #[case] needle: &str,
) {
    let err = store.set(key, text).expect_err("invalid");
    assert!(err.to_string().contains(needle), "{err}");
}

#[rstest]
#[case("a,b, c", &["a", "b", "c"])]
#[case("['x', 'y']", &["x", "y"])]
#[case("", &[])]
fn array_values_from_text(#[case] text: &str, #[case] expected: &[&str]) {
    assert_eq!(parse_array(text).expect("parse"), expected);
}

#[test]
fn array_literal_must_hold_strings() {
    assert!(matches!(parse_array("[1, 2]"), Err(OptionError::NotArray(_))));
}

#[rstest]
#[case("foo", true)]
#[case("with-dash_2", true)]
#[case("c_thing", false)]
#[case("b_lto", false)]
#[case("prefix", false)]
#[case("bad name", false)]
fn option_names(#[case] name: &str, #[case] ok: bool) {
    assert_eq!(check_option_name(name).is_ok(), ok);
}

const OPTION_FILE: &str = "\
# Build options
option('docs', type : 'boolean', value : false, description : 'Build docs')
option('level', type : 'integer', min : 0, max : 5, value : 2)
option('flavour', type : 'combo', choices : ['mild', 'hot'])
option('langs', type : 'array', choices : ['en', 'fr', 'de'], value : ['en'])
option('gtk', type : 'feature', yield : true)
option('name', type : 'string')
";

#[test]
fn parses_every_option_kind() -> AnyResult<()> {
    let opts = parse_option_file(OPTION_FILE, "meson.options", "")?;
    let values: Vec<_> = opts.iter().map(|o| o.value.to_cli_string()).collect();
    ensure!(values == ["false", "2", "mild", "en", "auto", ""], "{values:?}");
    ensure!(opts[0].description == "Build docs");
    ensure!(opts[5].description == "name");
    ensure!(opts[4].yielding);
    Ok(())
}

#[test]
fn subproject_options_are_qualified() -> AnyResult<()> {
    let opts = parse_option_file(OPTION_FILE, "meson.options", "sub")?;
    ensure!(opts[0].key() == "sub:docs");
    let mut store = OptionStore::new();
    for opt in opts {
        store.declare(opt)?;
    }
    ensure!(store.lookup("sub", "docs").is_some());
    ensure!(store.lookup("", "docs").is_none());
    Ok(())
}

#[test]
fn yielding_option_takes_parent_value() -> AnyResult<()> {
    let mut store = OptionStore::new();
    for opt in parse_option_file(OPTION_FILE, "meson.options", "")? {
        store.declare(opt)?;
    }
    for opt in parse_option_file(OPTION_FILE, "meson.options", "sub")? {
        store.declare(opt)?;
    }
    store.set("gtk", "enabled")?;
    let seen = store.lookup("sub", "gtk").map(|o| o.value.clone());
    ensure!(seen == Some(OptionValue::Feature(FeatureState::Enabled)));
    Ok(())
}

#[rstest]
#[case("x = 1\n", "may only contain option definitions")]
#[case("message('a')\n", "Only calls to option() are allowed")]
#[case("option('a')\n", "missing mandatory \"type\"")]
#[case("option('a', type : 'weird')\n", "Unknown type weird.")]
#[case("option('a', 'b', type : 'string')\n", "one (and only one) positional")]
#[case("option('c_x', type : 'string')\n", "reserved")]
#[case("option('a', type : 'combo')\n", "missing \"choices\"")]
#[case("option('a', type : 'integer', min : 3, value : 1)\n", "less than minimum")]
#[case("option('a', type : 'boolean', colour : 1)\n", "unknown keyword arguments")]
#[case("option('a', type : 'string')\noption('a', type : 'string')\n", "already exists")]
fn invalid_option_files(#[case] src: &str, #[case] needle: &str) {
    let err = parse_option_file(src, "meson.options", "").expect_err("invalid");
    assert!(err.to_string().contains(needle), "{err}");
}
