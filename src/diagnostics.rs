//! Diagnostics utilities.
//!
//! Errors travel through the runner as [`anyhow::Error`]. When the chain
//! holds one of the crate's [`miette`] diagnostics, [`render`] draws it with
//! its source snippet, labels and help text; otherwise the plain error chain
//! is printed.
//!
//! # Examples
//! ```rust
//! use anyhow::Context;
//! use kumihimo::diagnostics::render;
//! use kumihimo::parser::parse_str;
//!
//! let err = parse_str("x = (\n", "meson.build")
//!     .context("evaluating project")
//!     .expect_err("unbalanced parenthesis");
//! let report = render(&err);
//! assert!(report.starts_with("evaluating project"));
//! assert!(report.contains("meson.build"));
//! ```

use std::error::Error as StdError;

use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};

use crate::format::FormatError;
use crate::interpreter::InterpreterError;
use crate::machine_file::MachineFileError;
use crate::options::OptionFileError;
use crate::parser::ParseError;
use crate::runner::RunnerError;

/// View `err` as a diagnostic when it is one of the crate's report types.
fn as_diagnostic<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a dyn Diagnostic> {
    if let Some(diag) = err.downcast_ref::<InterpreterError>() {
        return Some(diag);
    }
    if let Some(diag) = err.downcast_ref::<ParseError>() {
        return Some(diag);
    }
    if let Some(diag) = err.downcast_ref::<FormatError>() {
        return Some(diag);
    }
    if let Some(diag) = err.downcast_ref::<MachineFileError>() {
        return Some(diag);
    }
    if let Some(diag) = err.downcast_ref::<OptionFileError>() {
        return Some(diag);
    }
    err.downcast_ref::<RunnerError>()
        .map(|diag| diag as &dyn Diagnostic)
}

/// Render `err` for the terminal.
///
/// Context messages added above the first diagnostic in the chain are
/// printed first, one per line, followed by the graphical report.
#[must_use]
pub fn render(err: &anyhow::Error) -> String {
    let mut context = Vec::new();
    for cause in err.chain() {
        let Some(diag) = as_diagnostic(cause) else {
            context.push(cause.to_string());
            continue;
        };
        let mut out = String::new();
        for line in &context {
            out.push_str(line);
            out.push('\n');
        }
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        if handler.render_report(&mut out, diag).is_ok() {
            return out;
        }
        break;
    }
    format!("{err:#}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn plain_errors_render_their_chain() {
        let err = Err::<(), _>(anyhow!("inner")).context("outer").expect_err("error");
        assert_eq!(render(&err), "outer: inner");
    }

    #[test]
    fn diagnostics_include_codes_and_help() {
        let err = anyhow::Error::new(RunnerError::NothingSelected);
        let report = render(&err);
        assert!(report.contains("kumihimo::runner::nothing_selected"), "{report}");
        assert!(report.contains("--all"), "{report}");
    }
}
