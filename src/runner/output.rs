//! Output helpers for the runner.
//! Handles standard output and atomic rewrites of build files.

use anyhow::{Context, Result as AnyResult};
use camino::Utf8Path;
use std::io::{self, Write};
use std::path::Path;
use tempfile::Builder;
use tracing::info;

/// Return `true` when `path` is the CLI sentinel indicating "write to stdout".
#[must_use]
pub(super) fn is_stdout_path(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn is_broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

fn write_all_ignoring_broken_pipe(writer: &mut dyn Write, buf: &[u8]) -> io::Result<()> {
    match writer.write_all(buf) {
        Ok(()) => Ok(()),
        Err(err) if is_broken_pipe(&err) => Ok(()),
        Err(err) => Err(err),
    }
}

fn flush_ignoring_broken_pipe(writer: &mut dyn Write) -> io::Result<()> {
    match writer.flush() {
        Ok(()) => Ok(()),
        Err(err) if is_broken_pipe(&err) => Ok(()),
        Err(err) => Err(err),
    }
}

/// Write `text` to `out`, treating a closed pipe as success.
pub(super) fn emit(out: &mut dyn Write, text: &str) -> AnyResult<()> {
    write_all_ignoring_broken_pipe(out, text.as_bytes()).context("writing to standard output")?;
    flush_ignoring_broken_pipe(out).context("flushing standard output")?;
    Ok(())
}

/// Serialise `value` as JSON, pretty-printed when `indent` is set.
pub(super) fn emit_json(
    out: &mut dyn Write,
    value: &serde_json::Value,
    indent: bool,
) -> AnyResult<()> {
    let mut text = if indent {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("serialising JSON output")?;
    text.push('\n');
    emit(out, &text)
}

/// Replace `path` with `content` through a temporary file in the same
/// directory.
pub(super) fn write_file(path: &Utf8Path, content: &str) -> AnyResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let mut tmp = Builder::new()
        .prefix(".kumihimo.")
        .tempfile_in(dir)
        .with_context(|| format!("creating temporary file in {dir}"))?;
    {
        let handle = tmp.as_file_mut();
        handle
            .write_all(content.as_bytes())
            .with_context(|| format!("writing {path}"))?;
        handle.flush().with_context(|| format!("flushing {path}"))?;
        handle.sync_all().with_context(|| format!("syncing {path}"))?;
    }
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replacing {path}"))?;
    info!("Wrote {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result, ensure};
    use rstest::rstest;

    #[rstest]
    #[case("-", true)]
    #[case("meson.build", false)]
    #[case("./-", false)]
    fn is_stdout_path_detects_dash(#[case] candidate: &str, #[case] expected: bool) {
        let path = Path::new(candidate);
        assert_eq!(
            is_stdout_path(path),
            expected,
            "unexpected result for {candidate}"
        );
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn emit_ignores_closed_pipes() -> Result<()> {
        emit(&mut ClosedPipe, "ignored")?;
        Ok(())
    }

    #[test]
    fn emit_json_indents_on_request() -> Result<()> {
        let value = serde_json::json!({ "a": [1] });
        let mut flat = Vec::new();
        emit_json(&mut flat, &value, false)?;
        ensure!(flat == b"{\"a\":[1]}\n", "got {flat:?}");
        let mut pretty = Vec::new();
        emit_json(&mut pretty, &value, true)?;
        let pretty = String::from_utf8(pretty)?;
        ensure!(pretty == "{\n  \"a\": [\n    1\n  ]\n}\n", "got {pretty:?}");
        Ok(())
    }

    #[test]
    fn write_file_replaces_contents() -> Result<()> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let path = camino::Utf8PathBuf::from_path_buf(temp.path().join("meson.build"))
            .map_err(|p| anyhow::anyhow!("non-UTF-8 temp path {}", p.display()))?;
        std::fs::write(&path, "old")?;
        write_file(&path, "new\n")?;
        let written = std::fs::read_to_string(&path).context("read file")?;
        ensure!(written == "new\n", "contents were {written:?}");
        let leftovers = std::fs::read_dir(temp.path())?.count();
        ensure!(leftovers == 1, "temporary file left behind");
        Ok(())
    }
}
