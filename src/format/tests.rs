//! Tests for the formatter.

use super::*;
use anyhow::{Context, Result as AnyResult, ensure};
use rstest::{fixture, rstest};

#[fixture]
fn config() -> FormatConfig {
    FormatConfig {
        end_of_line: EndOfLine::Lf,
        ..FormatConfig::default()
    }
}

fn format(src: &str, config: &FormatConfig) -> String {
    format_source(src, "meson.build", config).expect("format")
}

#[rstest]
#[case::spacing("x=[1,2]\n", "x = [1, 2]\n")]
#[case::keywords(
    "executable('a','a.c',install:true)\n",
    "executable('a', 'a.c', install: true)\n"
)]
#[case::dict("d = {'a':1,'b':[2]}\n", "d = {'a': 1, 'b': [2]}\n")]
#[case::operators("x = (a+b)*2\ny = c ? 1 : 2\nz = a!=b and not c\n", "x = (a + b) * 2\ny = c ? 1 : 2\nz = a != b and not c\n")]
#[case::methods(
    "v = meson.get_compiler('c').get_id()[0]\n",
    "v = meson.get_compiler('c').get_id()[0]\n"
)]
#[case::blank_lines("a = 1\n\n\n\nb = 2\n", "a = 1\n\nb = 2\n")]
#[case::comments("# top\na = 1   # trailing\n", "# top\na = 1 # trailing\n")]
#[case::escapes("x = 'it\\'s'\n", "x = 'it\\'s'\n")]
#[case::hex("mode = 0o755\n", "mode = 0o755\n")]
#[case::simplified_strings(
    "x = '''plain'''\ny = f'no placeholders'\nz = f'@v@'\n",
    "x = 'plain'\ny = 'no placeholders'\nz = f'@v@'\n"
)]
#[case::multiline_string_kept("message('''a\nb''')\n", "message('''a\nb''')\n")]
#[case::empty("", "")]
#[case::final_newline_added("a = 1", "a = 1\n")]
fn formats_statements(config: FormatConfig, #[case] src: &str, #[case] expected: &str) {
    assert_eq!(format(src, &config), expected);
}

#[rstest]
fn indents_blocks(config: FormatConfig) {
    let src = "if a==b\nmessage('x')\nelif not c\nforeach k,v:d\nx+=k\nendforeach\nelse\nsubdir_done()\nendif\n";
    insta::assert_snapshot!(format(src, &config), @r###"
    if a == b
        message('x')
    elif not c
        foreach k, v : d
            x += k
        endforeach
    else
        subdir_done()
    endif
    "###);
}

#[rstest]
fn splits_long_calls(config: FormatConfig) {
    let src = "executable('program', 'first_source_file.c', 'second_source_file.c', install: true)\n";
    insta::assert_snapshot!(format(src, &config), @r###"
    executable(
        'program',
        'first_source_file.c',
        'second_source_file.c',
        install: true,
    )
    "###);
}

#[rstest]
fn keeps_source_line_breaks_and_sorts_files(config: FormatConfig) {
    let src = "project('demo', 'c',\n  default_options: ['warning_level=3', 'werror=true'])\nsources = files('b.c',\n  'a.c')\n";
    insta::assert_snapshot!(format(src, &config), @r###"
    project(
        'demo',
        'c',
        default_options: ['warning_level=3', 'werror=true'],
    )
    sources = files(
        'a.c',
        'b.c',
    )
    "###);
}

#[rstest]
fn keeps_comments_inside_lists(config: FormatConfig) {
    let src = "x = [\n  # first\n  'a', # inline\n  'b',\n  # trailing\n]\n";
    assert_eq!(
        format(src, &config),
        "x = [\n    # first\n    'a', # inline\n    'b',\n    # trailing\n]\n"
    );
}

#[rstest]
fn trailing_comments_stay_on_their_line(config: FormatConfig) {
    let src = "project('f', 'c')  # the project\nif true # cond\n  x = 1\nelse # no\n  x = 2\nendif # end\nforeach i : [1] # each\nendforeach\n";
    insta::assert_snapshot!(format(src, &config), @r###"
    project('f', 'c') # the project
    if true # cond
        x = 1
    else # no
        x = 2
    endif # end
    foreach i : [1] # each
    endforeach
    "###);
}

#[rstest]
fn honours_layout_options(mut config: FormatConfig) {
    config.indent_by = "  ".to_owned();
    config.kwargs_force_multiline = true;
    config.wide_colon = true;
    config.space_array = true;
    let src = "dep = dependency('zlib', required: false)\narr = ['x']\n";
    assert_eq!(
        format(src, &config),
        "dep = dependency(\n  'zlib',\n  required : false,\n)\narr = [ 'x' ]\n"
    );
}

#[rstest]
fn single_argument_calls_can_drop_the_comma(mut config: FormatConfig) {
    config.no_single_comma_function = true;
    assert_eq!(
        format("run_command(\n'true')\n", &config),
        "run_command(\n    'true'\n)\n"
    );
}

#[rstest]
#[case(EndOfLine::CrLf, true, "a = 1\r\nb = 2\r\n")]
#[case(EndOfLine::Cr, true, "a = 1\rb = 2\r")]
#[case(EndOfLine::Lf, false, "a = 1\nb = 2")]
fn applies_line_endings(
    mut config: FormatConfig,
    #[case] eol: EndOfLine,
    #[case] final_newline: bool,
    #[case] expected: &str,
) {
    config.end_of_line = eol;
    config.insert_final_newline = final_newline;
    assert_eq!(format("a = 1\nb = 2\n", &config), expected);
}

#[rstest]
fn formatting_is_idempotent(config: FormatConfig) -> AnyResult<()> {
    let src = concat!(
        "project('demo','c',version:'1.0',meson_version:'>=1.0',default_options:['c_std=c11','warning_level=3'])\n",
        "inc = include_directories('include')\n",
        "lib = static_library('demo', files('src/b.c','src/a.c'), include_directories: inc, install: true)\n",
        "conf = {'with_feature': get_option('feature').enabled(), 'name': meson.project_name()} # settings\n",
        "\n",
        "foreach name : ['one', 'two']\n",
        "  if name == 'one'\n",
        "    test(name, executable(name, name + '.c', link_with: lib), suite: ['fast', 'unit'], timeout: 30)\n",
        "  endif\n",
        "endforeach\n",
    );
    let once = format_source(src, "meson.build", &config)?;
    let twice = format_source(&once, "meson.build", &config)?;
    ensure!(once == twice, "second pass changed output:\n{once}\n---\n{twice}");
    ensure!(
        once.lines().all(|line| line.len() <= config.max_line_length),
        "line too long in:\n{once}"
    );
    Ok(())
}

#[rstest]
fn reports_syntax_errors(config: FormatConfig) {
    let err = format_source("x = (\n", "meson.build", &config).expect_err("unbalanced");
    assert!(matches!(err, FormatError::Parse(_)), "{err:?}");
}

#[test]
fn escapes_plain_string_bodies() {
    assert_eq!(printer::escape("a'b\\c\nd\te\x07"), "a\\'b\\\\c\\nd\\te\\x07");
}

#[test]
fn collects_subdirectories_recursively() -> AnyResult<()> {
    let dir = tempfile::tempdir()?;
    let root = Utf8Path::from_path(dir.path()).context("utf8 tempdir")?;
    std::fs::write(
        root.join(BUILD_FILE),
        "project('p')\nsubdir('src')\nif false\nsubdir('missing')\nendif\n",
    )?;
    std::fs::create_dir(root.join("src"))?;
    std::fs::write(root.join("src").join(BUILD_FILE), "subdir('..')\n")?;

    let flat = collect_files(&[root.to_owned()], false)?;
    ensure!(flat == [root.join(BUILD_FILE)], "unexpected {flat:?}");

    let files = collect_files(&[root.to_owned()], true)?;
    let expected = [root.join(BUILD_FILE), root.join("src").join(BUILD_FILE)];
    ensure!(files == expected, "unexpected {files:?}");
    Ok(())
}

#[test]
fn format_file_uses_discovered_configuration() -> AnyResult<()> {
    let dir = tempfile::tempdir()?;
    let root = Utf8Path::from_path(dir.path()).context("utf8 tempdir")?;
    std::fs::write(
        root.join(CONFIG_FILE),
        "indent_by = '  '\nend_of_line = lf\n",
    )?;
    let path = root.join(BUILD_FILE);
    std::fs::write(&path, "if true\nmessage('hi')\nendif\n")?;

    let result = format_file(&path, &Settings::load(None, false)?)?;
    ensure!(result.changed(), "expected a change");
    ensure!(
        result.formatted == "if true\n  message('hi')\nendif\n",
        "got {:?}",
        result.formatted
    );
    Ok(())
}
