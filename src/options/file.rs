//! Reader for `meson.options` / `meson_options.txt`.
//!
//! The file is parsed with the regular parser but only `option()` calls
//! with constant arguments are accepted.

use indexmap::IndexMap;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use super::{
    FeatureState, OptionError, OptionKind, OptionSection, OptionValue, UserOption,
    check_option_name,
};
use crate::ast::{Span, StatementKind};
use crate::literal::{Literal, eval_constant};
use crate::parser::{ParseError, parse_str};

/// Option file names in lookup order.
pub const OPTION_FILE_NAMES: [&str; 2] = ["meson.options", "meson_options.txt"];

const KNOWN_KWARGS: [&str; 8] = [
    "type",
    "description",
    "value",
    "choices",
    "min",
    "max",
    "yield",
    "deprecated",
];

/// Failure while reading an option file.
#[derive(Debug, Error, Diagnostic)]
pub enum OptionFileError {
    /// The file is not valid syntax.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    /// The file is valid syntax but not a valid option declaration.
    #[error("{file}:{line}:{column}: {message}")]
    #[diagnostic(code(kumihimo::options))]
    Invalid {
        /// Description of the problem.
        message: String,
        /// Option file name.
        file: String,
        /// One-based line.
        line: usize,
        /// One-based column.
        column: usize,
        /// File contents.
        #[source_code]
        src: NamedSource<String>,
        /// Offending region.
        #[label("in this declaration")]
        span: SourceSpan,
    },
}

struct Context<'a> {
    name: &'a str,
    src: &'a str,
}

impl Context<'_> {
    fn invalid(&self, message: impl Into<String>, span: Span) -> OptionFileError {
        let (line, column) = span.line_col(self.src);
        OptionFileError::Invalid {
            message: message.into(),
            file: self.name.to_owned(),
            line,
            column,
            src: NamedSource::new(self.name, self.src.to_owned()),
            span: span.into(),
        }
    }
}

/// Parse option declarations for `subproject` (empty for the main project).
///
/// # Errors
///
/// Returns an [`OptionFileError`] for syntax errors, statements other than
/// `option()` calls, invalid names and invalid defaults.
///
/// # Examples
///
/// ```rust
/// use kumihimo::options::{parse_option_file, OptionValue};
///
/// let src = "option('docs', type : 'boolean', value : false)\n";
/// let opts = parse_option_file(src, "meson.options", "").expect("parse");
/// assert_eq!(opts[0].value, OptionValue::Boolean(false));
/// ```
pub fn parse_option_file(
    src: &str,
    name: &str,
    subproject: &str,
) -> Result<Vec<UserOption>, OptionFileError> {
    let cx = Context { name, src };
    let block = parse_str(src, name)?;
    let mut options = Vec::new();
    for stmt in &block.statements {
        let expr = match &stmt.kind {
            StatementKind::Comment { .. } => continue,
            StatementKind::Expression { expr } => expr,
            _ => {
                return Err(cx.invalid(
                    "Option file may only contain option definitions",
                    stmt.span,
                ));
            }
        };
        let crate::ast::ExprKind::Call { function, args } = &expr.kind else {
            return Err(cx.invalid(
                "Option file may only contain option definitions",
                expr.span,
            ));
        };
        if function.name != "option" {
            return Err(cx.invalid(
                "Only calls to option() are allowed in option files.",
                function.span,
            ));
        }
        let reduce = |e: &crate::ast::Expr| {
            eval_constant(e, &|_| None).map_err(|err| cx.invalid(err.message, err.span))
        };
        let mut kwargs = IndexMap::new();
        for kw in &args.keywords {
            if !KNOWN_KWARGS.contains(&kw.name.name.as_str()) {
                return Err(cx.invalid(
                    format!("option got unknown keyword arguments \"{}\"", kw.name.name),
                    kw.name.span,
                ));
            }
            kwargs.insert(kw.name.name.as_str(), reduce(&kw.value)?);
        }
        let [positional] = args.positional.as_slice() else {
            return Err(cx.invalid(
                "Option() must have one (and only one) positional argument",
                args.span,
            ));
        };
        let Literal::Str(opt_name) = reduce(&positional.value)? else {
            return Err(cx.invalid(
                "Positional argument must be a string.",
                positional.value.span,
            ));
        };
        check_option_name(&opt_name).map_err(|err| cx.invalid(err.to_string(), expr.span))?;
        let mut option = declare(&opt_name, &kwargs)
            .map_err(|message| cx.invalid(message, expr.span))?;
        option.subproject = subproject.to_owned();
        if options.iter().any(|o: &UserOption| o.name == option.name) {
            return Err(cx.invalid(
                OptionError::Duplicate(option.key()).to_string(),
                expr.span,
            ));
        }
        options.push(option);
    }
    Ok(options)
}

fn string_list(value: &Literal, what: &str) -> Result<Vec<String>, String> {
    match value {
        Literal::Array(_) => value
            .to_string_list()
            .ok_or_else(|| format!("{what} elements must be strings.")),
        _ => Err(format!("{what} must be an array.")),
    }
}

fn int_kwarg(kwargs: &IndexMap<&str, Literal>, key: &str) -> Result<Option<i64>, String> {
    match kwargs.get(key) {
        None => Ok(None),
        Some(Literal::Int(i)) => Ok(Some(*i)),
        Some(other) => Err(format!(
            "\"{key}\" must be an integer, not {}",
            other.type_name()
        )),
    }
}

fn declare(name: &str, kwargs: &IndexMap<&str, Literal>) -> Result<UserOption, String> {
    let Some(kind) = kwargs.get("type") else {
        return Err("Option call missing mandatory \"type\" keyword argument".to_owned());
    };
    let Some(kind) = kind.as_str() else {
        return Err("Option type must be a string.".to_owned());
    };
    let choices = kwargs
        .get("choices")
        .map(|c| string_list(c, "Choices"))
        .transpose()?;
    let (kind, default) = match kind {
        "string" => (OptionKind::String, OptionValue::String(String::new())),
        "boolean" => (OptionKind::Boolean, OptionValue::Boolean(true)),
        "combo" => {
            let choices = choices.ok_or("Combo option missing \"choices\" keyword.")?;
            let first = choices
                .first()
                .cloned()
                .ok_or("Combo choices must not be empty.")?;
            (OptionKind::Combo { choices }, OptionValue::String(first))
        }
        "integer" => {
            let kind = OptionKind::Integer {
                min: int_kwarg(kwargs, "min")?,
                max: int_kwarg(kwargs, "max")?,
            };
            let Some(Literal::Int(value)) = kwargs.get("value") else {
                return Err("Integer option must have an integer \"value\" keyword.".to_owned());
            };
            (kind, OptionValue::Integer(*value))
        }
        "array" => {
            let choices = choices.unwrap_or_default();
            let default = OptionValue::Array(choices.clone());
            (OptionKind::Array { choices }, default)
        }
        "feature" => (OptionKind::Feature, OptionValue::Feature(FeatureState::Auto)),
        other => return Err(format!("Unknown type {other}.")),
    };
    let description = match kwargs.get("description") {
        Some(Literal::Str(d)) if !d.is_empty() => d.clone(),
        Some(Literal::Str(_)) | None => name.to_owned(),
        Some(other) => {
            return Err(format!(
                "Option description must be a string, not {}",
                other.type_name()
            ));
        }
    };
    let mut option = UserOption::new(name, description, kind, default, OptionSection::User)
        .map_err(|err| err.to_string())?;
    if let Some(value) = kwargs.get("value") {
        option.value = option
            .value_from_literal(value)
            .map_err(|err| err.to_string())?;
    }
    option.yielding = match kwargs.get("yield") {
        Some(Literal::Bool(b)) => *b,
        None => false,
        Some(_) => return Err("\"yield\" must be a boolean.".to_owned()),
    };
    option.deprecated = match kwargs.get("deprecated") {
        Some(Literal::Bool(b)) => *b,
        Some(_) => true,
        None => false,
    };
    Ok(option)
}
