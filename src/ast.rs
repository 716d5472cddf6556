//! Abstract syntax tree for Meson build definitions.
//!
//! The parser in [`crate::parser`] produces these structures from
//! `meson.build`, `meson.options` and machine-file expressions. Every node
//! records the byte [`Span`] it was parsed from so the interpreter and the
//! formatter can point back at the original source. The tree serialises to
//! JSON for `introspect --ast`.
//!
//! ```rust
//! use kumihimo::ast::{ExprKind, StatementKind};
//! use kumihimo::parser::parse_str;
//!
//! let block = parse_str("x = 1 + 2\n", "meson.build").expect("parse");
//! let StatementKind::Assignment { target, value } = &block.statements[0].kind else {
//!     panic!("expected assignment");
//! };
//! assert_eq!(target.name, "x");
//! assert!(matches!(value.kind, ExprKind::Arithmetic { .. }));
//! ```

use serde::Serialize;

/// Half-open byte range `[start, end)` into the parsed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset one past the last byte.
    pub end: usize,
}

impl Span {
    /// Construct a span from explicit offsets.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn to(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Number of bytes covered.
    #[must_use]
    pub const fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no bytes.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// One-based line and column of the span start within `src`.
    #[must_use]
    pub fn line_col(self, src: &str) -> (usize, usize) {
        let prefix = src.get(..self.start).unwrap_or(src);
        let line = prefix.matches('\n').count() + 1;
        let column = prefix
            .rsplit_once('\n')
            .map_or(prefix, |(_, tail)| tail)
            .chars()
            .count()
            + 1;
        (line, column)
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.len()).into()
    }
}

/// A sequence of statements, such as a file or the body of a loop.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CodeBlock {
    /// Statements in source order.
    pub statements: Vec<Statement>,
    /// Region covered by the block.
    pub span: Span,
}

/// One line-level construct plus its formatting trivia.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    /// What the statement does.
    pub kind: StatementKind,
    /// Source region of the statement without trailing comment.
    pub span: Span,
    /// Comment following the statement on the same line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Whether one or more empty lines separated this statement from the
    /// previous one.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub blank_line_before: bool,
}

/// Statement variants of the build-definition language.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum StatementKind {
    /// An expression evaluated for its effect, usually a call.
    Expression {
        /// The expression.
        expr: Expr,
    },
    /// `name = value`
    Assignment {
        /// Variable being bound.
        target: Ident,
        /// Bound value.
        value: Expr,
    },
    /// `name += value`
    PlusAssignment {
        /// Variable being extended.
        target: Ident,
        /// Appended value.
        value: Expr,
    },
    /// `if` / `elif` / `else` / `endif`
    If(IfClause),
    /// `foreach` / `endforeach`
    Foreach(ForeachClause),
    /// `continue`
    Continue,
    /// `break`
    Break,
    /// A comment on a line of its own.
    Comment {
        /// Comment text including the leading `#`.
        text: String,
    },
}

/// A full conditional with all of its branches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfClause {
    /// `if` followed by every `elif` in order.
    pub branches: Vec<IfBranch>,
    /// Body of the `else` branch, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub else_block: Option<CodeBlock>,
    /// Comment on the `else` line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub else_comment: Option<String>,
}

/// One guarded branch of an [`IfClause`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfBranch {
    /// Branch condition.
    pub condition: Expr,
    /// Comment on the header line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Statements run when the condition holds.
    pub block: CodeBlock,
}

/// `foreach a[, b] : items`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeachClause {
    /// Loop variables; one for arrays and ranges, two for dicts.
    pub variables: Vec<Ident>,
    /// The iterated expression.
    pub items: Expr,
    /// Comment on the header line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Loop body.
    pub block: CodeBlock,
}

/// An identifier with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    /// Identifier text.
    pub name: String,
    /// Location of the identifier.
    pub span: Span,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    /// Expression variant.
    pub kind: ExprKind,
    /// Location of the whole expression.
    pub span: Span,
}

impl Expr {
    /// Wrap `kind` with `span`.
    #[must_use]
    pub const fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Return the identifier name when the expression is a bare identifier.
    #[must_use]
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier { name } => Some(name),
            _ => None,
        }
    }
}

/// Quoting style of a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StringKind {
    /// `'text'`, escapes processed.
    Plain,
    /// `'''text'''`, taken verbatim.
    Multiline,
    /// `f'@var@'`
    Format,
    /// `f'''@var@'''`
    FormatMultiline,
}

impl StringKind {
    /// Whether `@name@` placeholders are substituted at evaluation time.
    #[must_use]
    pub const fn is_format(self) -> bool {
        matches!(self, Self::Format | Self::FormatMultiline)
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum ExprKind {
    /// `true` or `false`
    Bool {
        /// Literal value.
        value: bool,
    },
    /// Integer literal in any radix.
    Int {
        /// Literal value.
        value: i64,
    },
    /// String literal of any [`StringKind`].
    String {
        /// Decoded contents.
        value: String,
        /// Quoting style.
        style: StringKind,
    },
    /// Bare identifier.
    #[serde(rename = "id")]
    Identifier {
        /// Identifier text.
        name: String,
    },
    /// `[a, b]`
    Array(Arguments),
    /// `{'k': v}`
    Dict(DictEntries),
    /// `name(args)`
    Call {
        /// Function name.
        function: Ident,
        /// Call arguments.
        args: Arguments,
    },
    /// `receiver.name(args)`
    Method {
        /// Object the method is invoked on.
        receiver: Box<Expr>,
        /// Method name.
        method: Ident,
        /// Call arguments.
        args: Arguments,
    },
    /// `object[index]`
    Index {
        /// Indexed value.
        object: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// `not x` or `-x`
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `+ - * / %`
    Arithmetic {
        /// Operator.
        op: ArithOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `== != < <= > >= in` and `not in`
    Comparison {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `and` / `or`
    Logical {
        /// Operator.
        op: LogicalOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `condition ? if_true : if_false`
    Ternary {
        /// Selector.
        condition: Box<Expr>,
        /// Value when the condition holds.
        if_true: Box<Expr>,
        /// Value otherwise.
        if_false: Box<Expr>,
    },
    /// `( expr )`, kept so the formatter can reproduce grouping.
    Paren {
        /// Inner expression.
        inner: Box<Expr>,
    },
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Integer negation.
    Negate,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    /// `+`: integer sum, string/array/dict concatenation.
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`: integer division or path join on strings.
    Div,
    /// `%`
    Mod,
}

impl ArithOp {
    /// Source spelling of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

impl CompareOp {
    /// Source spelling of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Short-circuiting boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    /// `and`
    And,
    /// `or`
    Or,
}

impl LogicalOp {
    /// Source spelling of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Arguments of a call or the elements of an array literal.
///
/// Array literals reuse this type; keyword arguments inside an array are
/// rejected when the array is evaluated.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Arguments {
    /// Positional arguments in order.
    pub positional: Vec<Element>,
    /// Keyword arguments in order.
    pub keywords: Vec<KeywordArg>,
    /// Comments found after the last argument and before the closing
    /// delimiter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailing_comments: Vec<String>,
    /// Whether the source spread the arguments over several lines.
    #[serde(skip)]
    pub multiline: bool,
    /// Region from the opening to the closing delimiter.
    pub span: Span,
}

impl Arguments {
    /// Whether there are no arguments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Look up a keyword argument by name.
    #[must_use]
    pub fn keyword(&self, name: &str) -> Option<&Expr> {
        self.keywords
            .iter()
            .find(|kw| kw.name.name == name)
            .map(|kw| &kw.value)
    }
}

/// A positional argument or array element with attached comments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    /// The value.
    pub value: Expr,
    /// Comments on the lines directly above the element.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leading_comments: Vec<String>,
    /// Comment after the element on the same line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// `name : value` inside an argument list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordArg {
    /// Keyword.
    pub name: Ident,
    /// Value.
    pub value: Expr,
    /// Comments on the lines directly above the argument.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leading_comments: Vec<String>,
    /// Comment after the argument on the same line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Entries of a dict literal.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DictEntries {
    /// Key/value pairs in source order.
    pub entries: Vec<DictEntry>,
    /// Comments before the closing brace.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailing_comments: Vec<String>,
    /// Whether the source spread the entries over several lines.
    #[serde(skip)]
    pub multiline: bool,
}

/// One `key : value` pair in a dict literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictEntry {
    /// Key expression; must evaluate to a string.
    pub key: Expr,
    /// Value expression.
    pub value: Expr,
    /// Comments on the lines directly above the entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leading_comments: Vec<String>,
    /// Comment after the entry on the same line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
