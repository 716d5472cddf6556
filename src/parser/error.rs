//! Syntax error types.
//!
//! The lexer and parser report a bare [`SyntaxError`] carrying a span. At the
//! public boundary it is paired with the file name and contents to form a
//! [`ParseError`], which renders as a labelled [`miette`] diagnostic.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::ast::Span;

/// Location-only syntax error raised while tokenising or parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Human-readable description.
    pub message: String,
    /// Offending region.
    pub span: Span,
    /// Label attached to the span.
    pub label: String,
    /// Optional remediation hint.
    pub help: Option<String>,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            label: "here".to_owned(),
            help: None,
        }
    }

    pub(crate) fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub(crate) fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attach the file name and source text.
    #[must_use]
    pub fn into_parse_error(self, name: &str, src: &str) -> ParseError {
        let (line, column) = self.span.line_col(src);
        ParseError {
            message: self.message,
            file: name.to_owned(),
            line,
            column,
            src: NamedSource::new(name, src.to_owned()),
            span: self.span.into(),
            label: self.label,
            help: self.help,
        }
    }
}

/// A syntax error in a named source file.
///
/// # Examples
/// ```rust
/// use kumihimo::parser::parse_str;
///
/// let err = parse_str("x = \"nope\"\n", "meson.build").expect_err("double quotes");
/// assert_eq!((err.line, err.column), (1, 5));
/// assert!(err.to_string().contains("meson.build:1:5"));
/// ```
#[derive(Debug, Error, Diagnostic)]
#[error("{file}:{line}:{column}: {message}")]
#[diagnostic(code(kumihimo::parse))]
pub struct ParseError {
    /// Description of the problem.
    pub message: String,
    /// File the error was found in.
    pub file: String,
    /// One-based line of the error.
    pub line: usize,
    /// One-based column of the error.
    pub column: usize,
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    label: String,
    #[help]
    help: Option<String>,
}
