//! Layout engine that turns a parsed [`CodeBlock`] back into source text.
//!
//! Every expression is first rendered on one line. When that line would
//! pass `max_line_length`, or a list carries comments or was already split
//! in the source, the list is broken with one element per line and a
//! trailing comma, and its elements go through the same decision one
//! level deeper.

use super::config::FormatConfig;
use crate::ast::{
    Arguments, CodeBlock, DictEntries, Element, Expr, ExprKind, ForeachClause, IfClause, Span,
    Statement, StatementKind, StringKind, UnaryOp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Array,
    Call { sort: bool },
}

pub(super) struct Printer<'a> {
    src: &'a str,
    config: &'a FormatConfig,
    out: String,
}

impl<'a> Printer<'a> {
    pub(super) const fn new(src: &'a str, config: &'a FormatConfig) -> Self {
        Self {
            src,
            config,
            out: String::new(),
        }
    }

    pub(super) fn print(mut self, block: &CodeBlock) -> String {
        self.block(block, 0);
        let mut text = self.out;
        while text.ends_with('\n') {
            text.pop();
        }
        if text.is_empty() {
            return text;
        }
        if self.config.insert_final_newline {
            text.push('\n');
        }
        let eol = self.config.end_of_line.as_str();
        if eol == "\n" {
            text
        } else {
            text.replace('\n', eol)
        }
    }

    fn block(&mut self, block: &CodeBlock, level: usize) {
        for (idx, stmt) in block.statements.iter().enumerate() {
            if stmt.blank_line_before && idx > 0 {
                self.out.push('\n');
            }
            self.statement(stmt, level);
        }
    }

    fn statement(&mut self, stmt: &Statement, level: usize) {
        let indent = self.indent(level);
        let taken = self.width(&indent);
        let text = match &stmt.kind {
            StatementKind::Expression { expr } => self.expr(expr, level, taken),
            StatementKind::Assignment { target, value } => {
                let head = format!("{} = ", target.name);
                let value = self.expr(value, level, taken + self.width(&head));
                head + &value
            }
            StatementKind::PlusAssignment { target, value } => {
                let head = format!("{} += ", target.name);
                let value = self.expr(value, level, taken + self.width(&head));
                head + &value
            }
            StatementKind::If(clause) => self.if_clause(clause, level, &indent),
            StatementKind::Foreach(clause) => self.foreach_clause(clause, level, &indent),
            StatementKind::Continue => "continue".to_owned(),
            StatementKind::Break => "break".to_owned(),
            StatementKind::Comment { text } => text.trim_end().to_owned(),
        };
        self.line(&indent, &text, stmt.comment.as_deref());
    }

    fn if_clause(&mut self, clause: &IfClause, level: usize, indent: &str) -> String {
        let taken = self.width(indent);
        for (idx, branch) in clause.branches.iter().enumerate() {
            let keyword = if idx == 0 { "if " } else { "elif " };
            let condition = self.expr(&branch.condition, level, taken + keyword.len());
            self.line(
                indent,
                &format!("{keyword}{condition}"),
                branch.comment.as_deref(),
            );
            self.block(&branch.block, level + 1);
        }
        if let Some(block) = &clause.else_block {
            self.line(indent, "else", clause.else_comment.as_deref());
            self.block(block, level + 1);
        }
        "endif".to_owned()
    }

    fn foreach_clause(&mut self, clause: &ForeachClause, level: usize, indent: &str) -> String {
        let names: Vec<_> = clause.variables.iter().map(|v| v.name.as_str()).collect();
        let head = format!("foreach {} : ", names.join(", "));
        let items = self.expr(&clause.items, level, self.width(indent) + self.width(&head));
        self.line(indent, &format!("{head}{items}"), clause.comment.as_deref());
        self.block(&clause.block, level + 1);
        "endforeach".to_owned()
    }

    fn line(&mut self, indent: &str, text: &str, comment: Option<&str>) {
        self.out.push_str(indent);
        self.out.push_str(text);
        if let Some(comment) = comment {
            self.out.push_str(&self.config.indent_before_comments);
            self.out.push_str(comment.trim_end());
        }
        self.out.push('\n');
    }

    fn expr(&self, expr: &Expr, level: usize, taken: usize) -> String {
        if let Some(flat) = self.flat(expr) {
            let first = flat.lines().next().unwrap_or_default();
            if taken + self.width(first) <= self.config.max_line_length {
                return flat;
            }
        }
        self.broken(expr, level, taken)
    }

    /// Single-line rendering, or `None` when some list must be split.
    fn flat(&self, expr: &Expr) -> Option<String> {
        let text = match &expr.kind {
            ExprKind::Array(args) => {
                if self.forced(args, ListKind::Array) {
                    return None;
                }
                let inner = self.flat_args(args, ListKind::Array)?;
                if self.config.space_array && !inner.is_empty() {
                    format!("[ {inner} ]")
                } else {
                    format!("[{inner}]")
                }
            }
            ExprKind::Dict(dict) => {
                if self.dict_forced(dict, expr.span) {
                    return None;
                }
                let entries = dict
                    .entries
                    .iter()
                    .map(|entry| {
                        Some(format!(
                            "{}{}{}",
                            self.flat(&entry.key)?,
                            self.colon(),
                            self.flat(&entry.value)?
                        ))
                    })
                    .collect::<Option<Vec<_>>>()?;
                format!("{{{}}}", entries.join(", "))
            }
            ExprKind::Call { function, args } => {
                let kind = call_kind(&function.name);
                if self.forced(args, kind) {
                    return None;
                }
                format!("{}({})", function.name, self.flat_args(args, kind)?)
            }
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                let kind = ListKind::Call { sort: false };
                if self.forced(args, kind) {
                    return None;
                }
                format!(
                    "{}.{}({})",
                    self.flat(receiver)?,
                    method.name,
                    self.flat_args(args, kind)?
                )
            }
            ExprKind::Index { object, index } => {
                format!("{}[{}]", self.flat(object)?, self.flat(index)?)
            }
            ExprKind::Unary { op, operand } => format!("{}{}", unary(*op), self.flat(operand)?),
            ExprKind::Arithmetic { op, lhs, rhs } => {
                format!("{} {} {}", self.flat(lhs)?, op.symbol(), self.flat(rhs)?)
            }
            ExprKind::Comparison { op, lhs, rhs } => {
                format!("{} {} {}", self.flat(lhs)?, op.symbol(), self.flat(rhs)?)
            }
            ExprKind::Logical { op, lhs, rhs } => {
                format!("{} {} {}", self.flat(lhs)?, op.symbol(), self.flat(rhs)?)
            }
            ExprKind::Ternary {
                condition,
                if_true,
                if_false,
            } => format!(
                "{} ? {} : {}",
                self.flat(condition)?,
                self.flat(if_true)?,
                self.flat(if_false)?
            ),
            ExprKind::Paren { inner } => format!("({})", self.flat(inner)?),
            ExprKind::Bool { .. }
            | ExprKind::Int { .. }
            | ExprKind::String { .. }
            | ExprKind::Identifier { .. } => return self.atom(expr),
        };
        Some(text)
    }

    fn broken(&self, expr: &Expr, level: usize, taken: usize) -> String {
        match &expr.kind {
            ExprKind::Array(args) => format!("[{}]", self.list(args, ListKind::Array, level)),
            ExprKind::Dict(dict) => format!("{{{}}}", self.dict(dict, level)),
            ExprKind::Call { function, args } => {
                let head = self.width(&function.name) + 1;
                let args = self.call_args(args, call_kind(&function.name), level, taken + head);
                format!("{}({args})", function.name)
            }
            ExprKind::Method {
                receiver,
                method,
                args,
            } => {
                let receiver = self.expr(receiver, level, taken);
                let head = self.after(&receiver, taken) + self.width(&method.name) + 2;
                let args = self.call_args(args, ListKind::Call { sort: false }, level, head);
                format!("{receiver}.{}({args})", method.name)
            }
            ExprKind::Index { object, index } => {
                let object = self.expr(object, level, taken);
                let index = self.expr(index, level, self.after(&object, taken) + 1);
                format!("{object}[{index}]")
            }
            ExprKind::Unary { op, operand } => {
                let prefix = unary(*op);
                format!("{prefix}{}", self.expr(operand, level, taken + prefix.len()))
            }
            ExprKind::Arithmetic { op, lhs, rhs } => {
                self.binary(lhs, op.symbol(), rhs, level, taken)
            }
            ExprKind::Comparison { op, lhs, rhs } => {
                self.binary(lhs, op.symbol(), rhs, level, taken)
            }
            ExprKind::Logical { op, lhs, rhs } => self.binary(lhs, op.symbol(), rhs, level, taken),
            ExprKind::Ternary {
                condition,
                if_true,
                if_false,
            } => {
                let condition = self.expr(condition, level, taken);
                let at = self.after(&condition, taken) + 3;
                let if_true = self.expr(if_true, level, at);
                let at = self.after(&if_true, at) + 3;
                let if_false = self.expr(if_false, level, at);
                format!("{condition} ? {if_true} : {if_false}")
            }
            ExprKind::Paren { inner } => format!("({})", self.expr(inner, level, taken + 1)),
            ExprKind::Bool { .. }
            | ExprKind::Int { .. }
            | ExprKind::String { .. }
            | ExprKind::Identifier { .. } => self.atom(expr).unwrap_or_default(),
        }
    }

    fn binary(&self, lhs: &Expr, symbol: &str, rhs: &Expr, level: usize, taken: usize) -> String {
        let lhs = self.expr(lhs, level, taken);
        let at = self.after(&lhs, taken) + symbol.len() + 2;
        let rhs = self.expr(rhs, level, at);
        format!("{lhs} {symbol} {rhs}")
    }

    /// Literals and identifiers, which never break.
    fn atom(&self, expr: &Expr) -> Option<String> {
        match &expr.kind {
            ExprKind::Bool { value } => Some(value.to_string()),
            ExprKind::Int { value } => Some(
                self.source(expr.span)
                    .map_or_else(|| value.to_string(), str::to_owned),
            ),
            ExprKind::String { value, style } => Some(self.string(expr.span, value, *style)),
            ExprKind::Identifier { name } => Some(name.clone()),
            _ => None,
        }
    }

    fn string(&self, span: Span, value: &str, style: StringKind) -> String {
        let simplify = self.config.simplify_string_literals;
        match style {
            StringKind::Format if simplify && !value.contains('@') => {
                if let Some(plain) = self.source(span).and_then(|s| s.strip_prefix('f')) {
                    return plain.to_owned();
                }
                format!("'{}'", escape(value))
            }
            StringKind::Multiline | StringKind::FormatMultiline
                if simplify && !value.contains('\n') && !value.contains('@') =>
            {
                format!("'{}'", escape(value))
            }
            _ => self.source(span).map_or_else(
                || match style {
                    StringKind::Plain => format!("'{}'", escape(value)),
                    StringKind::Format => format!("f'{}'", escape(value)),
                    StringKind::Multiline => format!("'''{value}'''"),
                    StringKind::FormatMultiline => format!("f'''{value}'''"),
                },
                str::to_owned,
            ),
        }
    }

    fn call_args(&self, args: &Arguments, kind: ListKind, level: usize, taken: usize) -> String {
        if !self.forced(args, kind) {
            if let Some(flat) = self.flat_args(args, kind) {
                if taken + self.width(&flat) + 1 <= self.config.max_line_length {
                    return flat;
                }
            }
        }
        self.list(args, kind, level)
    }

    fn flat_args(&self, args: &Arguments, kind: ListKind) -> Option<String> {
        let mut parts = Vec::with_capacity(args.positional.len() + args.keywords.len());
        for element in self.positional(args, kind) {
            parts.push(self.flat(&element.value)?);
        }
        for keyword in &args.keywords {
            parts.push(format!(
                "{}{}{}",
                keyword.name.name,
                self.colon(),
                self.flat(&keyword.value)?
            ));
        }
        Some(parts.join(", "))
    }

    /// One element per line, each followed by a comma.
    fn list(&self, args: &Arguments, kind: ListKind, level: usize) -> String {
        let positional = self.positional(args, kind);
        let count = positional.len() + args.keywords.len();
        if count == 0 && args.trailing_comments.is_empty() {
            return String::new();
        }
        let comma = if matches!(kind, ListKind::Call { .. })
            && count == 1
            && self.config.no_single_comma_function
        {
            ""
        } else {
            ","
        };
        let indent = self.indent(level + 1);
        let taken = self.width(&indent);
        let mut out = String::from("\n");
        for element in positional {
            let value = self.expr(&element.value, level + 1, taken + comma.len());
            push_item(
                &mut out,
                &indent,
                &element.leading_comments,
                &format!("{value}{comma}"),
                self.trailing(element.comment.as_deref()),
            );
        }
        for keyword in &args.keywords {
            let key = format!("{}{}", keyword.name.name, self.colon());
            let value = self.expr(
                &keyword.value,
                level + 1,
                taken + self.width(&key) + comma.len(),
            );
            push_item(
                &mut out,
                &indent,
                &keyword.leading_comments,
                &format!("{key}{value}{comma}"),
                self.trailing(keyword.comment.as_deref()),
            );
        }
        for comment in &args.trailing_comments {
            out.push_str(&indent);
            out.push_str(comment.trim_end());
            out.push('\n');
        }
        out.push_str(&self.indent(level));
        out
    }

    fn dict(&self, dict: &DictEntries, level: usize) -> String {
        if dict.entries.is_empty() && dict.trailing_comments.is_empty() {
            return String::new();
        }
        let indent = self.indent(level + 1);
        let taken = self.width(&indent);
        let mut out = String::from("\n");
        for entry in &dict.entries {
            let key = self.expr(&entry.key, level + 1, taken);
            let at = self.after(&key, taken) + self.colon().len();
            let value = self.expr(&entry.value, level + 1, at + 1);
            push_item(
                &mut out,
                &indent,
                &entry.leading_comments,
                &format!("{key}{}{value},", self.colon()),
                self.trailing(entry.comment.as_deref()),
            );
        }
        for comment in &dict.trailing_comments {
            out.push_str(&indent);
            out.push_str(comment.trim_end());
            out.push('\n');
        }
        out.push_str(&self.indent(level));
        out
    }

    fn positional<'b>(&self, args: &'b Arguments, kind: ListKind) -> Vec<&'b Element> {
        let mut items: Vec<_> = args.positional.iter().collect();
        let sortable = self.config.sort_files
            && kind == (ListKind::Call { sort: true })
            && items
                .iter()
                .all(|e| matches!(e.value.kind, ExprKind::String { style, .. } if !style.is_format()));
        if sortable {
            items.sort_by_cached_key(|e| match &e.value.kind {
                ExprKind::String { value, .. } => (value.to_lowercase(), value.clone()),
                _ => (String::new(), String::new()),
            });
        }
        items
    }

    fn forced(&self, args: &Arguments, kind: ListKind) -> bool {
        let commented = !args.trailing_comments.is_empty()
            || args
                .positional
                .iter()
                .any(|e| e.comment.is_some() || !e.leading_comments.is_empty())
            || args
                .keywords
                .iter()
                .any(|k| k.comment.is_some() || !k.leading_comments.is_empty());
        if commented {
            return true;
        }
        if self.config.kwargs_force_multiline
            && matches!(kind, ListKind::Call { .. })
            && !args.keywords.is_empty()
        {
            return true;
        }
        let spans = args
            .positional
            .iter()
            .map(|e| e.value.span)
            .chain(args.keywords.iter().map(|k| k.name.span.to(k.value.span)));
        args.multiline && !args.is_empty() && self.split_in_source(args.span, spans)
    }

    fn dict_forced(&self, dict: &DictEntries, span: Span) -> bool {
        let commented = !dict.trailing_comments.is_empty()
            || dict
                .entries
                .iter()
                .any(|e| e.comment.is_some() || !e.leading_comments.is_empty());
        commented
            || (dict.multiline
                && !dict.entries.is_empty()
                && self.split_in_source(
                    span,
                    dict.entries.iter().map(|e| e.key.span.to(e.value.span)),
                ))
    }

    /// Whether a line break separated the delimiters of `outer` from the
    /// items, or two items from each other.
    fn split_in_source(&self, outer: Span, items: impl Iterator<Item = Span>) -> bool {
        let mut cursor = outer.start;
        for item in items {
            if self.gap_breaks(cursor, item.start) {
                return true;
            }
            cursor = item.end;
        }
        self.gap_breaks(cursor, outer.end)
    }

    fn gap_breaks(&self, from: usize, to: usize) -> bool {
        self.src.get(from..to).is_some_and(|gap| gap.contains('\n'))
    }

    fn source(&self, span: Span) -> Option<&'a str> {
        self.src.get(span.start..span.end)
    }

    fn trailing<'c>(&self, comment: Option<&'c str>) -> Option<(&str, &'c str)> {
        comment.map(|c| (self.config.indent_before_comments.as_str(), c))
    }

    fn colon(&self) -> &'static str {
        if self.config.wide_colon { " : " } else { ": " }
    }

    fn indent(&self, level: usize) -> String {
        self.config.indent_by.repeat(level)
    }

    fn width(&self, text: &str) -> usize {
        text.chars()
            .map(|c| if c == '\t' { self.config.tab_width } else { 1 })
            .sum()
    }

    /// Column reached after writing `text` starting at column `taken`.
    fn after(&self, text: &str, taken: usize) -> usize {
        match text.rsplit_once('\n') {
            Some((_, last)) => self.width(last),
            None => taken + self.width(text),
        }
    }
}

fn call_kind(name: &str) -> ListKind {
    ListKind::Call {
        sort: name == "files",
    }
}

const fn unary(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "not ",
        UnaryOp::Negate => "-",
    }
}

fn push_item(
    out: &mut String,
    indent: &str,
    leading: &[String],
    text: &str,
    comment: Option<(&str, &str)>,
) {
    for line in leading {
        out.push_str(indent);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.push_str(indent);
    out.push_str(text);
    if let Some((gap, comment)) = comment {
        out.push_str(gap);
        out.push_str(comment.trim_end());
    }
    out.push('\n');
}

/// Quote `value` as the body of a single-quoted literal.
pub(super) fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out
}
