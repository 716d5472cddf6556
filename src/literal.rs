//! Constant expressions evaluated outside the interpreter.
//!
//! Option files and machine files accept a restricted expression language:
//! strings, integers, booleans, arrays of those, `+`, `/` on strings, unary
//! minus and, for machine files, references to previously defined
//! constants.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{ArithOp, Expr, ExprKind, Span, UnaryOp};

/// A constant value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// `true` / `false`
    Bool(bool),
    /// Integer.
    Int(i64),
    /// String.
    Str(String),
    /// Array of constants.
    Array(Vec<Literal>),
}

impl Literal {
    /// Name of the value's type as shown in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "str",
            Self::Array(_) => "array",
        }
    }

    /// Borrow the string contents when the value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a string or an array of strings into a list.
    #[must_use]
    pub fn to_string_list(&self) -> Option<Vec<String>> {
        match self {
            Self::Str(s) => Some(vec![s.clone()]),
            Self::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_owned))
                .collect(),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Failure to reduce an expression to a constant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConstError {
    /// Description of the problem.
    pub message: String,
    /// Offending expression.
    pub span: Span,
}

impl ConstError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Reduce `expr` to a [`Literal`].
///
/// Identifiers are resolved through `lookup`; return `None` from it to
/// reject the name.
///
/// # Errors
///
/// Returns a [`ConstError`] for unsupported syntax, unknown identifiers and
/// operand type mismatches.
///
/// # Examples
///
/// ```rust
/// use kumihimo::literal::{eval_constant, Literal};
/// use kumihimo::parser::parse_expression;
///
/// let expr = parse_expression("'/opt' / 'tools' + '/bin'", "x").expect("parse");
/// let value = eval_constant(&expr, &|_| None).expect("eval");
/// assert_eq!(value, Literal::Str("/opt/tools/bin".into()));
/// ```
pub fn eval_constant(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<Literal>,
) -> Result<Literal, ConstError> {
    match &expr.kind {
        ExprKind::Bool { value } => Ok(Literal::Bool(*value)),
        ExprKind::Int { value } => Ok(Literal::Int(*value)),
        ExprKind::String { value, style } if !style.is_format() => {
            Ok(Literal::Str(value.clone()))
        }
        ExprKind::Identifier { name } => lookup(name).ok_or_else(|| {
            ConstError::new(format!("Undefined constant {name:?}"), expr.span)
        }),
        ExprKind::Paren { inner } => eval_constant(inner, lookup),
        ExprKind::Array(args) => {
            if !args.keywords.is_empty() {
                return Err(ConstError::new(
                    "Keyword arguments are not allowed in arrays.",
                    args.span,
                ));
            }
            args.positional
                .iter()
                .map(|e| eval_constant(&e.value, lookup))
                .collect::<Result<Vec<_>, _>>()
                .map(Literal::Array)
        }
        ExprKind::Unary {
            op: UnaryOp::Negate,
            operand,
        } => match eval_constant(operand, lookup)? {
            Literal::Int(i) => Ok(Literal::Int(-i)),
            other => Err(ConstError::new(
                format!("Cannot negate a value of type {}", other.type_name()),
                expr.span,
            )),
        },
        ExprKind::Arithmetic { op, lhs, rhs } => {
            let l = eval_constant(lhs, lookup)?;
            let r = eval_constant(rhs, lookup)?;
            binary(*op, l, r).ok_or_else(|| {
                ConstError::new(
                    format!("Unsupported operator {} in constant expression", op.symbol()),
                    expr.span,
                )
            })
        }
        _ => Err(ConstError::new(
            "Only strings, integers, booleans and arrays of them are allowed here.",
            expr.span,
        )),
    }
}

fn binary(op: ArithOp, lhs: Literal, rhs: Literal) -> Option<Literal> {
    Some(match (op, lhs, rhs) {
        (ArithOp::Add, Literal::Str(a), Literal::Str(b)) => Literal::Str(a + &b),
        (ArithOp::Add, Literal::Int(a), Literal::Int(b)) => Literal::Int(a.checked_add(b)?),
        (ArithOp::Add, Literal::Array(mut a), Literal::Array(b)) => {
            a.extend(b);
            Literal::Array(a)
        }
        (ArithOp::Add, Literal::Array(mut a), other) => {
            a.push(other);
            Literal::Array(a)
        }
        (ArithOp::Div, Literal::Str(a), Literal::Str(b)) => Literal::Str(join_path(&a, &b)),
        _ => return None,
    })
}

/// Join two path fragments; an absolute right-hand side wins.
#[must_use]
pub fn join_path(lhs: &str, rhs: &str) -> String {
    if rhs.starts_with('/') || lhs.is_empty() {
        return rhs.to_owned();
    }
    if rhs.is_empty() {
        return lhs.to_owned();
    }
    if lhs.ends_with('/') {
        format!("{lhs}{rhs}")
    } else {
        format!("{lhs}/{rhs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use rstest::rstest;

    fn eval(src: &str) -> Result<Literal, ConstError> {
        let expr = parse_expression(src, "test").expect("parse");
        eval_constant(&expr, &|name| {
            (name == "root").then(|| Literal::Str("/opt".into()))
        })
    }

    #[rstest]
    #[case("'a' + 'b'", Literal::Str("ab".into()))]
    #[case("root / 'bin'", Literal::Str("/opt/bin".into()))]
    #[case("'x' / '/abs'", Literal::Str("/abs".into()))]
    #[case("-3 + 5", Literal::Int(2))]
    #[case("['a'] + 'b'", Literal::Array(vec![Literal::Str("a".into()), Literal::Str("b".into())]))]
    #[case("(true)", Literal::Bool(true))]
    fn evaluates_constants(#[case] src: &str, #[case] expected: Literal) {
        assert_eq!(eval(src), Ok(expected));
    }

    #[rstest]
    #[case("missing", "Undefined constant")]
    #[case("1 / 2", "Unsupported operator /")]
    #[case("f()", "Only strings")]
    #[case("-'a'", "Cannot negate")]
    fn rejects_non_constants(#[case] src: &str, #[case] needle: &str) {
        let err = eval(src).expect_err("should fail");
        assert!(err.message.contains(needle), "{}", err.message);
    }
}
