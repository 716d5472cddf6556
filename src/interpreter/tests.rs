//! End-to-end evaluation of small projects written to a temporary directory.

use super::*;
use crate::model::TargetKind;
use anyhow::{Context, Result as AnyResult, ensure};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Project {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    fn write(&self, rel: &str, contents: &str) -> AnyResult<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {path}"))
    }

    fn evaluate(&self, options: &[(&str, &str)]) -> std::result::Result<Evaluation, InterpreterError> {
        let mut setup = Setup::new(self.root.clone(), self.root.join("build"));
        setup.options = options
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Interpreter::new(setup)?.run()
    }

    /// Evaluate `body` after a `project()` call.
    fn run(&self, body: &str) -> std::result::Result<Evaluation, InterpreterError> {
        self.write("meson.build", &format!("project('demo', 'c', version : '1.2.3')\n{body}"))
            .map_err(|err| InterpreterError::msg(err.to_string()))?;
        self.evaluate(&[])
    }
}

#[fixture]
fn project() -> Project {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    Project { _dir: dir, root }
}

fn error_message(result: std::result::Result<Evaluation, InterpreterError>) -> String {
    match result {
        Ok(_) => panic!("evaluation should fail"),
        Err(err) => err.message(),
    }
}

#[rstest]
#[case("assert(1 + 2 * 3 == 7)")]
#[case("assert(-7 / 2 == -4 and -7 % 3 == 2)")]
#[case("assert('a' + 'b' == 'ab')")]
#[case("assert([1] + 2 == [1, 2])")]
#[case("assert({'a': 1} + {'b': 2} == {'a': 1, 'b': 2})")]
#[case("assert('b' in ['a', 'b'] and 'c' not in ['a'])")]
#[case("assert('ell' in 'hello')")]
#[case("assert((true ? 1 : 2) == 1)")]
#[case("x = 'v'\nassert(f'@x@-@x@' == 'v-v')")]
#[case("assert('1.10.0'.version_compare('>1.9'))")]
#[case("assert('a b c'.split() == ['a', 'b', 'c'])")]
#[case("assert(meson.project_version() == '1.2.3')")]
#[case("assert(not is_disabler(1))")]
#[case("ten = 10\nassert(ten.to_string(fill : 4) == '0010')")]
#[case("assert(['x', ['y']].contains('y'))")]
#[case("assert(get_variable('missing', 3) == 3)")]
#[case("assert('@0@-@1@@'.format('a', 'b') == 'a-b@')")]
#[case("assert('hello'.substring(1, -1) == 'ell' and 'hello'.substring(3, 1) == '')")]
#[case("assert(['a', 'b'].get(-1) == 'b' and ['a'].get(5, 'z') == 'z')")]
fn expressions_evaluate(project: Project, #[case] body: &str) {
    project.run(body).expect("evaluate");
}

#[rstest]
#[case("x = 1 + 'a'", "Invalid use of addition")]
#[case("x = 1 / 0", "Division by zero.")]
#[case("x = [1][3]", "Index 3 out of bounds of array of size 1.")]
#[case("x = {'a': 1}['b']", "Key b is not in the dictionary.")]
#[case("x = y", "Unknown variable \"y\".")]
#[case("if 1\nendif", "If clause of type int does not evaluate to true or false.")]
#[case("break", "Found break outside of a loop.")]
#[case("assert(false, 'nope')", "Assert failed: nope")]
#[case("assert(1 == 2)", "Assert failed: 1 == 2")]
#[case("error('bad', 1)", "Problem encountered: bad 1")]
#[case("meson = 1", "Tried to overwrite internal variable \"meson\"")]
#[case("nonsense()", "Unknown function \"nonsense\".")]
#[case("'s'.frobnicate()", "Unknown method \"frobnicate\" in object str.")]
#[case("x = message('hi')", "Can not assign void to variable.")]
#[case("x = '@0@ @1@'.format('a')", "Format placeholder @1@ out of range.")]
#[case("x = ['a'].get(3)", "Array index 3 is out of bounds for array of size 1.")]
fn evaluation_errors(project: Project, #[case] body: &str, #[case] expected: &str) {
    let message = error_message(project.run(body));
    assert!(message.contains(expected), "{message}");
}

#[rstest]
fn errors_are_located_in_the_failing_file(project: Project) -> AnyResult<()> {
    project.write("sub/meson.build", "x = 1\ny = x + 'a'\n")?;
    let err = project
        .run("subdir('sub')")
        .err()
        .context("evaluation should fail")?;
    let text = err.to_string();
    ensure!(
        text.starts_with("sub/meson.build:2:"),
        "unexpected location: {text}"
    );
    Ok(())
}

#[rstest]
fn first_statement_must_be_project(project: Project) -> AnyResult<()> {
    project.write("meson.build", "x = 1\nproject('late')\n")?;
    let message = error_message(project.evaluate(&[]));
    ensure!(message == "First statement must be a call to project()", "{message}");
    Ok(())
}

#[rstest]
fn foreach_visits_dicts_in_key_order(project: Project) {
    project
        .run(concat!(
            "keys = []\n",
            "foreach k, v : {'b': 2, 'a': 1, 'c': 3}\n",
            "  if k == 'c'\n    break\n  endif\n",
            "  keys += k\n",
            "endforeach\n",
            "assert(keys == ['a', 'b'])\n",
            "total = 0\n",
            "foreach i : range(5)\n",
            "  if i.is_odd()\n    continue\n  endif\n",
            "  total += i\n",
            "endforeach\n",
            "assert(total == 6)\n",
        ))
        .expect("evaluate");
}

#[rstest]
fn assignment_copies_mutable_objects(project: Project) {
    project
        .run(concat!(
            "a = configuration_data()\n",
            "b = a\n",
            "b.set('X', 1)\n",
            "assert(not a.has('X') and b.has('X'))\n",
        ))
        .expect("evaluate");
}

#[rstest]
fn disablers_propagate_and_skip_branches(project: Project) -> AnyResult<()> {
    let evaluation = project.run(concat!(
        "d = disabler()\n",
        "x = d.anything()\n",
        "assert(is_disabler(x) and is_disabler(d + 1))\n",
        "assert(not d.found())\n",
        "if d\n  error('unreachable')\nendif\n",
        "executable('skipped', 'main.c', dependencies : d)\n",
        "dep = dependency('nothing', required : false, disabler : true)\n",
        "assert(is_disabler(dep))\n",
    ));
    let evaluation = evaluation.context("evaluate")?;
    ensure!(evaluation.description.targets.is_empty());
    Ok(())
}

#[rstest]
fn subdir_records_targets_with_hashed_ids(project: Project) -> AnyResult<()> {
    project.write("main.c", "int main(void) { return 0; }\n")?;
    project.write("lib/meson.build", "mylib = static_library('util', 'util.c')\n")?;
    project.write("lib/util.c", "int util(void) { return 1; }\n")?;
    let evaluation = project.run(concat!(
        "subdir('lib')\n",
        "exe = executable('app', 'main.c', link_with : mylib, install : true)\n",
        "test('runs', exe)\n",
    ))?;
    let description = &evaluation.description;
    let app = description.target("app@exe").context("app target")?;
    ensure!(app.kind == TargetKind::Executable);
    ensure!(app.installed);
    ensure!(app.link_with.len() == 1);
    let lib = description
        .targets
        .iter()
        .find(|t| t.name == "util")
        .context("util target")?;
    ensure!(lib.id.ends_with("@@util@sta"), "unexpected id {}", lib.id);
    ensure!(app.link_with[0] == lib.id);
    ensure!(description.tests.len() == 1);
    ensure!(description.tests[0].suite == ["demo"]);
    ensure!(
        description
            .build_files
            .iter()
            .any(|f| f.ends_with("lib/meson.build"))
    );
    Ok(())
}

#[rstest]
fn duplicate_targets_are_rejected(project: Project) -> AnyResult<()> {
    project.write("a.c", "")?;
    let message = error_message(project.run("executable('a', 'a.c')\nexecutable('a', 'a.c')\n"));
    ensure!(message.contains("already exists"), "{message}");
    Ok(())
}

#[rstest]
fn subdir_cannot_revisit_or_escape(project: Project) -> AnyResult<()> {
    project.write("sub/meson.build", "")?;
    let message = error_message(project.run("subdir('sub')\nsubdir('sub')\n"));
    ensure!(message.contains("already been visited"), "{message}");
    let message = error_message(project.run("subdir('../x')\n"));
    ensure!(message == "Subdir contains ..", "{message}");
    Ok(())
}

#[rstest]
fn subdir_done_stops_the_current_file(project: Project) -> AnyResult<()> {
    project.write("sub/meson.build", "seen = 1\nsubdir_done()\nseen = 2\n")?;
    project.run("subdir('sub')\nassert(seen == 1)\n")?;
    Ok(())
}

#[rstest]
fn project_options_follow_defaults_and_overrides(project: Project) -> AnyResult<()> {
    project.write(
        "meson.options",
        concat!(
            "option('with_x', type : 'boolean', value : true)\n",
            "option('name', type : 'string', value : 'n')\n",
            "option('feat', type : 'feature', value : 'auto')\n",
        ),
    )?;
    project.write(
        "meson.build",
        concat!(
            "project('demo', 'c', default_options : ['name=from-default'])\n",
            "assert(get_option('with_x') == false)\n",
            "assert(get_option('name') == 'from-default')\n",
            "assert(get_option('feat').disabled())\n",
            "assert(get_option('prefix') == '/opt')\n",
        ),
    )?;
    let evaluation = project.evaluate(&[
        ("with_x", "false"),
        ("auto_features", "disabled"),
        ("prefix", "/opt"),
    ])?;
    ensure!(evaluation.options.contains("with_x"));
    Ok(())
}

#[rstest]
fn unknown_user_options_fail(project: Project) -> AnyResult<()> {
    project.write("meson.build", "project('demo')\n")?;
    let message = error_message(project.evaluate(&[("nosuch", "1")]));
    ensure!(message.contains("nosuch"), "{message}");
    Ok(())
}

#[rstest]
fn subprojects_share_variables_and_provide_dependencies(project: Project) -> AnyResult<()> {
    project.write(
        "subprojects/zlib.wrap",
        "[wrap-file]\ndirectory = zlib-1.3\n\n[provide]\nzlib = zlib_dep\n",
    )?;
    project.write(
        "subprojects/zlib-1.3/meson.build",
        concat!(
            "project('zlib', 'c', version : '1.3')\n",
            "greeting = 'hello from ' + meson.project_name()\n",
            "zlib_dep = declare_dependency(compile_args : ['-DZ'])\n",
            "assert(meson.is_subproject())\n",
        ),
    )?;
    project.run(concat!(
        "sp = subproject('zlib')\n",
        "assert(sp.found())\n",
        "assert(sp.get_variable('greeting') == 'hello from zlib')\n",
        "dep = dependency('zlib', version : '>=1.2')\n",
        "assert(dep.found() and dep.version() == '1.3')\n",
        "missing = subproject('nothere', required : false)\n",
        "assert(not missing.found())\n",
    ))?;
    Ok(())
}

#[rstest]
fn overridden_dependencies_win(project: Project) -> AnyResult<()> {
    project.run(concat!(
        "d = declare_dependency(version : '2.0')\n",
        "meson.override_dependency('foo', d)\n",
        "assert(dependency('foo').version() == '2.0')\n",
        "assert(not dependency('bar', required : false).found())\n",
    ))?;
    let message = error_message(project.run("dependency('bar')\n"));
    ensure!(message == "Dependency \"bar\" not found", "{message}");
    Ok(())
}

#[rstest]
fn configure_file_output_is_written_after_evaluation(project: Project) -> AnyResult<()> {
    project.write("config.h.in", "#define VERSION \"@VERSION@\"\n#mesondefine HAVE_X\n")?;
    let evaluation = project.run(concat!(
        "conf = configuration_data()\n",
        "conf.set('VERSION', meson.project_version())\n",
        "conf.set('HAVE_X', true)\n",
        "header = configure_file(input : 'config.h.in', output : 'config.h', configuration : conf)\n",
        "configure_file(input : header, output : 'copy.h', copy : true)\n",
    ))?;
    ensure!(!project.root.join("build/config.h").exists(), "written during evaluation");
    evaluation.write_generated()?;
    let copied = fs::read_to_string(project.root.join("build/copy.h"))?;
    let written = fs::read_to_string(project.root.join("build/config.h"))?;
    ensure!(
        written == "#define VERSION \"1.2.3\"\n#define HAVE_X\n",
        "unexpected output: {written:?}"
    );
    ensure!(copied == written, "copy differs: {copied:?}");
    Ok(())
}

#[rstest]
fn custom_targets_substitute_placeholders(project: Project) -> AnyResult<()> {
    project.write("gen.py", "")?;
    project.write("in.txt", "")?;
    let evaluation = project.run(concat!(
        "gen = custom_target('gen', input : 'in.txt', output : '@BASENAME@.c',\n",
        "  command : ['python3', files('gen.py'), '@INPUT@', '@OUTPUT@'])\n",
        "assert(gen.full_path().endswith('in.c'))\n",
    ))?;
    let target = evaluation
        .description
        .target("gen@cus")
        .context("custom target")?;
    ensure!(target.command.len() == 4, "{:?}", target.command);
    ensure!(target.command[2].ends_with("in.txt"));
    ensure!(target.command[3].ends_with("in.c"));
    Ok(())
}

#[rstest]
fn summary_sections_are_recorded(project: Project) -> AnyResult<()> {
    let evaluation = project.run(concat!(
        "summary({'Docs': false, 'Prefix': get_option('prefix')}, section : 'Dirs')\n",
        "summary('Threads', true)\n",
    ))?;
    let sections = evaluation
        .description
        .summary
        .get("demo")
        .context("summary for demo")?;
    ensure!(sections.get("Dirs").is_some_and(|e| e.len() == 2));
    ensure!(sections.get("").is_some_and(|e| e.len() == 1));
    Ok(())
}

#[rstest]
fn fs_module_inspects_the_source_tree(project: Project) -> AnyResult<()> {
    project.write("data/info.txt", "payload\n")?;
    project.run(concat!(
        "fs = import('fs')\n",
        "assert(fs.is_file('data/info.txt') and fs.is_dir('data'))\n",
        "assert(fs.read('data/info.txt').strip() == 'payload')\n",
        "assert(fs.stem('a/b.tar') == 'b' and fs.suffix('b.tar') == '.tar')\n",
        "assert(fs.replace_suffix('a/b.c', '.o') == 'a/b.o')\n",
        "assert(not fs.exists('nope'))\n",
    ))?;
    Ok(())
}
