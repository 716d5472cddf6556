//! Errors raised while evaluating build files.

use camino::Utf8PathBuf;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::ast::Span;
use crate::options::{OptionError, OptionFileError};
use crate::parser::ParseError;

/// Evaluation failure.
///
/// Problems found while running a statement are first raised as
/// [`InterpreterError::Unlocated`] and become [`InterpreterError::Located`]
/// once they leave the file they were raised in.
#[derive(Debug, Error, Diagnostic)]
pub enum InterpreterError {
    /// A build file failed to parse.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    /// An option file is invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    OptionFile(#[from] OptionFileError),
    /// Error attributed to a position in a build file.
    #[error("{file}:{line}:{column}: ERROR: {message}")]
    #[diagnostic(code(kumihimo::interpreter))]
    Located {
        /// Description of the problem.
        message: String,
        /// Build file, relative to the source root.
        file: String,
        /// One-based line.
        line: usize,
        /// One-based column.
        column: usize,
        /// File contents.
        #[source_code]
        src: NamedSource<String>,
        /// Offending region.
        #[label("here")]
        span: SourceSpan,
    },
    /// Error not yet attributed to a file.
    #[error("ERROR: {message}")]
    Unlocated {
        /// Description of the problem.
        message: String,
        /// Expression that raised it, once known.
        span: Option<Span>,
    },
    /// A file could not be read or written.
    #[error("failed to access {path}")]
    Io {
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl InterpreterError {
    /// Raise `message` at the current expression.
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Unlocated {
            message: message.into(),
            span: None,
        }
    }

    /// Attach `span` unless a narrower one is already known.
    #[must_use]
    pub(crate) fn at(self, at: Span) -> Self {
        match self {
            Self::Unlocated {
                message,
                span: None,
            } => Self::Unlocated {
                message,
                span: Some(at),
            },
            other => other,
        }
    }

    /// Convert to [`InterpreterError::Located`] within `file`.
    #[must_use]
    pub(crate) fn locate(self, file: &str, src: &str) -> Self {
        match self {
            Self::Unlocated { message, span } => {
                let span = span.unwrap_or_default();
                let (line, column) = span.line_col(src);
                Self::Located {
                    message,
                    file: file.to_owned(),
                    line,
                    column,
                    src: NamedSource::new(file, src.to_owned()),
                    span: span.into(),
                }
            }
            other => other,
        }
    }

    /// Message without location prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Located { message, .. } | Self::Unlocated { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<OptionError> for InterpreterError {
    fn from(err: OptionError) -> Self {
        Self::msg(err.to_string())
    }
}

impl From<crate::wrap::WrapError> for InterpreterError {
    fn from(err: crate::wrap::WrapError) -> Self {
        Self::msg(err.to_string())
    }
}

/// Shorthand for raising an unlocated error.
pub(crate) fn fail<T>(message: impl Into<String>) -> Result<T, InterpreterError> {
    Err(InterpreterError::msg(message))
}
