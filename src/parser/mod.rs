//! Recursive-descent parser for Meson build definitions.
//!
//! Precedence, lowest first: assignment, ternary, `or`, `and`, comparison,
//! additive, multiplicative, unary, postfix (calls, methods, indexing) and
//! primary expressions. Arithmetic operators are left associative and
//! comparisons do not chain.
//!
//! Comments never reach the interpreter as tokens. Statement-level comments
//! become [`StatementKind::Comment`] nodes, comments inside argument lists
//! attach to the neighbouring element, and anything else is re-emitted as a
//! standalone comment after the statement it appeared in.

mod error;
mod lexer;

pub use error::{ParseError, SyntaxError};
pub use lexer::{Token, TokenKind, tokenize};

use std::mem::discriminant;

use crate::ast::{
    ArithOp, Arguments, CodeBlock, CompareOp, DictEntries, DictEntry, Element, Expr, ExprKind,
    ForeachClause, Ident, IfBranch, IfClause, KeywordArg, LogicalOp, Span, Statement,
    StatementKind, UnaryOp,
};

/// Parse a complete build-definition file.
///
/// `name` is only used to label diagnostics.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first lexical or syntax error.
pub fn parse_str(src: &str, name: &str) -> Result<CodeBlock, ParseError> {
    parse_block(src).map_err(|err| err.into_parse_error(name, src))
}

/// Parse a single expression, as used for machine-file values.
///
/// # Errors
///
/// Returns a [`ParseError`] when `src` is not exactly one expression.
pub fn parse_expression(src: &str, name: &str) -> Result<Expr, ParseError> {
    let run = || -> Result<Expr, SyntaxError> {
        let mut parser = Parser::new(src, tokenize(src)?);
        parser.skip_newlines();
        let expr = parser.expression()?;
        parser.skip_newlines();
        parser.expect(&TokenKind::Eof, "end of expression")?;
        Ok(expr)
    };
    run().map_err(|err| err.into_parse_error(name, src))
}

fn parse_block(src: &str) -> Result<CodeBlock, SyntaxError> {
    let mut parser = Parser::new(src, tokenize(src)?);
    let block = parser.block()?;
    let tok = parser.raw().clone();
    if tok.kind != TokenKind::Eof {
        return Err(SyntaxError::new(
            format!("Unexpected {}", tok.kind.describe()),
            tok.span,
        ));
    }
    Ok(block)
}

struct Parser<'src> {
    src: &'src str,
    tokens: Vec<Token>,
    /// Returned once `pos` runs past the stream.
    eof: Token,
    pos: usize,
    prev_end: usize,
    /// Skipped comments with their token index.
    pending: Vec<(usize, String)>,
    in_ternary: bool,
}

impl<'src> Parser<'src> {
    fn new(src: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            src,
            tokens,
            eof: Token {
                kind: TokenKind::Eof,
                span: Span::new(src.len(), src.len()),
            },
            pos: 0,
            prev_end: 0,
            pending: Vec::new(),
            in_ternary: false,
        }
    }

    fn raw(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn skip_comments(&mut self) {
        while let TokenKind::Comment { text, .. } = &self.raw().kind {
            self.pending.push((self.pos, text.clone()));
            self.pos += 1;
        }
    }

    fn skip_newlines(&mut self) {
        loop {
            self.skip_comments();
            if self.raw().kind == TokenKind::Newline {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> &TokenKind {
        self.skip_comments();
        &self.raw().kind
    }

    fn at(&mut self, kind: &TokenKind) -> bool {
        discriminant(self.peek()) == discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        self.skip_comments();
        let tok = self.raw().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
            self.prev_end = tok.span.end;
        }
        tok
    }

    fn accept(&mut self, kind: &TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.advance())
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, SyntaxError> {
        if let Some(tok) = self.accept(kind) {
            return Ok(tok);
        }
        let found = self.raw().clone();
        Err(SyntaxError::new(
            format!("Expecting {what} got {}", found.kind.describe()),
            found.span,
        ))
    }

    fn is_inline_comment(&self, idx: usize) -> bool {
        matches!(
            self.tokens.get(idx).map(|tok| &tok.kind),
            Some(TokenKind::Comment {
                own_line: false,
                ..
            })
        )
    }

    /// Take a comment that ends the current line, whether it is the next
    /// token or was just skipped while looking past an expression.
    fn take_inline_comment(&mut self) -> Option<String> {
        if self.is_inline_comment(self.pos) {
            let text = match &self.raw().kind {
                TokenKind::Comment { text, .. } => text.clone(),
                _ => return None,
            };
            self.pos += 1;
            return Some(text);
        }
        let &(idx, _) = self.pending.last()?;
        if idx + 1 == self.pos && self.is_inline_comment(idx) {
            return self.pending.pop().map(|(_, text)| text);
        }
        None
    }

    fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    }

    fn take_leading_comments(&mut self) -> Vec<String> {
        self.skip_comments();
        self.take_pending()
    }

    fn block(&mut self) -> Result<CodeBlock, SyntaxError> {
        let start = self.raw().span.start;
        let mut statements = Vec::new();
        let mut blank = false;
        let mut at_line_start = true;
        loop {
            let tok = self.raw().clone();
            match tok.kind {
                TokenKind::Newline => {
                    self.pos += 1;
                    if at_line_start && !statements.is_empty() {
                        blank = true;
                    }
                    at_line_start = true;
                }
                TokenKind::Comment { text, .. } => {
                    self.pos += 1;
                    statements.push(Statement {
                        kind: StatementKind::Comment { text },
                        span: tok.span,
                        comment: None,
                        blank_line_before: std::mem::take(&mut blank),
                    });
                    at_line_start = false;
                }
                TokenKind::Eof
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::Endif
                | TokenKind::Endforeach => break,
                _ => {
                    let mut stmt = self.statement()?;
                    stmt.blank_line_before = std::mem::take(&mut blank);
                    stmt.comment = self.take_inline_comment();
                    statements.push(stmt);
                    for text in self.take_pending() {
                        statements.push(Statement {
                            kind: StatementKind::Comment { text },
                            span: Span::new(self.prev_end, self.prev_end),
                            comment: None,
                            blank_line_before: false,
                        });
                    }
                    self.end_of_line()?;
                    at_line_start = true;
                }
            }
        }
        Ok(CodeBlock {
            statements,
            span: Span::new(start, self.raw().span.start.max(start)),
        })
    }

    fn end_of_line(&mut self) -> Result<(), SyntaxError> {
        let tok = self.raw().clone();
        match tok.kind {
            TokenKind::Newline => {
                self.pos += 1;
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            other => Err(SyntaxError::new(
                format!("Expecting end of line got {}", other.describe()),
                tok.span,
            )),
        }
    }

    /// After an `if`, `elif`, `else` or `foreach` header the line must end;
    /// a trailing comment is left for [`Self::block`] to pick up.
    fn end_of_header(&mut self) -> Result<(), SyntaxError> {
        let tok = self.raw().clone();
        match tok.kind {
            TokenKind::Newline | TokenKind::Comment { .. } => Ok(()),
            other => Err(SyntaxError::new(
                format!("Expecting end of line got {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn statement(&mut self) -> Result<Statement, SyntaxError> {
        let start = self.raw().span.start;
        let kind = match self.peek() {
            TokenKind::If => StatementKind::If(self.if_clause()?),
            TokenKind::Foreach => StatementKind::Foreach(self.foreach_clause()?),
            TokenKind::Continue => {
                self.advance();
                StatementKind::Continue
            }
            TokenKind::Break => {
                self.advance();
                StatementKind::Break
            }
            _ => self.expression_statement()?,
        };
        Ok(Statement {
            kind,
            span: Span::new(start, self.prev_end),
            comment: None,
            blank_line_before: false,
        })
    }

    fn expression_statement(&mut self) -> Result<StatementKind, SyntaxError> {
        let expr = self.expression()?;
        let plus = match self.peek() {
            TokenKind::Assign => false,
            TokenKind::PlusAssign => true,
            _ => return Ok(StatementKind::Expression { expr }),
        };
        let op = self.advance();
        let Some(name) = expr.as_ident() else {
            let what = if plus { "Plusassignment" } else { "Assignment" };
            return Err(SyntaxError::new(
                format!("{what} target must be an id."),
                expr.span,
            )
            .with_label(format!("cannot assign with \"{}\"", self.src.get(op.span.start..op.span.end).unwrap_or_default())));
        };
        let target = Ident {
            name: name.to_owned(),
            span: expr.span,
        };
        let value = self.expression()?;
        Ok(if plus {
            StatementKind::PlusAssignment { target, value }
        } else {
            StatementKind::Assignment { target, value }
        })
    }

    fn if_clause(&mut self) -> Result<IfClause, SyntaxError> {
        let if_tok = self.advance();
        let mut branches = Vec::new();
        let condition = self.expression()?;
        let comment = self.take_inline_comment();
        self.end_of_header()?;
        let block = self.block()?;
        branches.push(IfBranch {
            condition,
            comment,
            block,
        });
        let mut else_block = None;
        let mut else_comment = None;
        loop {
            let tok = self.raw().clone();
            match tok.kind {
                TokenKind::Elif if else_block.is_none() => {
                    self.advance();
                    let condition = self.expression()?;
                    let comment = self.take_inline_comment();
                    self.end_of_header()?;
                    let block = self.block()?;
                    branches.push(IfBranch {
                        condition,
                        comment,
                        block,
                    });
                }
                TokenKind::Else if else_block.is_none() => {
                    self.advance();
                    else_comment = self.take_inline_comment();
                    self.end_of_header()?;
                    else_block = Some(self.block()?);
                }
                TokenKind::Endif => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(SyntaxError::new(
                        format!("Expecting endif got {}", other.describe()),
                        tok.span,
                    )
                    .with_help(format!(
                        "the if statement starting at line {} is not closed",
                        if_tok.span.line_col(self.src).0
                    )));
                }
            }
        }
        Ok(IfClause {
            branches,
            else_block,
            else_comment,
        })
    }

    fn foreach_clause(&mut self) -> Result<ForeachClause, SyntaxError> {
        let foreach_tok = self.advance();
        let mut variables = vec![self.ident("loop variable")?];
        if self.accept(&TokenKind::Comma).is_some() {
            variables.push(self.ident("second loop variable")?);
        }
        self.expect(&TokenKind::Colon, "\":\"")?;
        let items = self.expression()?;
        let comment = self.take_inline_comment();
        self.end_of_header()?;
        let block = self.block()?;
        let tok = self.raw().clone();
        if tok.kind != TokenKind::Endforeach {
            return Err(SyntaxError::new(
                format!("Expecting endforeach got {}", tok.kind.describe()),
                tok.span,
            )
            .with_help(format!(
                "the foreach loop starting at line {} is not closed",
                foreach_tok.span.line_col(self.src).0
            )));
        }
        self.advance();
        Ok(ForeachClause {
            variables,
            items,
            comment,
            block,
        })
    }

    fn ident(&mut self, what: &str) -> Result<Ident, SyntaxError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Ident(name) => Ok(Ident {
                name,
                span: tok.span,
            }),
            other => Err(SyntaxError::new(
                format!("Expecting {what} got {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        let condition = self.or_expr()?;
        if self.accept(&TokenKind::Question).is_none() {
            return Ok(condition);
        }
        if self.in_ternary {
            return Err(SyntaxError::new(
                "Nested ternary operators are not allowed.",
                condition.span,
            ));
        }
        self.in_ternary = true;
        let branches = (|| {
            let if_true = self.expression()?;
            self.expect(&TokenKind::Colon, "\":\"")?;
            let if_false = self.expression()?;
            Ok::<_, SyntaxError>((if_true, if_false))
        })();
        self.in_ternary = false;
        let (if_true, if_false) = branches?;
        let span = condition.span.to(if_false.span);
        Ok(Expr::new(
            ExprKind::Ternary {
                condition: Box::new(condition),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            },
            span,
        ))
    }

    fn or_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.and_expr()?;
        while self.accept(&TokenKind::Or).is_some() {
            let rhs = self.and_expr()?;
            lhs = logical(LogicalOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.comparison()?;
        while self.accept(&TokenKind::And).is_some() {
            let rhs = self.comparison()?;
            lhs = logical(LogicalOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::In => CompareOp::In,
            TokenKind::Not => CompareOp::NotIn,
            _ => return Ok(lhs),
        };
        self.advance();
        if op == CompareOp::NotIn {
            self.expect(&TokenKind::In, "\"in\" after \"not\"")?;
        }
        let rhs = self.additive()?;
        let span = lhs.span.to(rhs.span);
        Ok(Expr::new(
            ExprKind::Comparison {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        ))
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = arithmetic(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => ArithOp::Mul,
                TokenKind::Slash => ArithOp::Div,
                TokenKind::Percent => ArithOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = arithmetic(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.postfix(),
        };
        let tok = self.advance();
        let operand = self.unary()?;
        let span = tok.span.to(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        if self.at(&TokenKind::LParen) {
            let Some(name) = expr.as_ident() else {
                return Err(SyntaxError::new(
                    "Function call must be applied to plain id",
                    expr.span,
                ));
            };
            let function = Ident {
                name: name.to_owned(),
                span: expr.span,
            };
            let open = self.advance();
            let args = self.arguments(&TokenKind::RParen, "\")\"", open.span)?;
            let span = function.span.to(args.span);
            expr = Expr::new(ExprKind::Call { function, args }, span);
        }
        loop {
            if self.accept(&TokenKind::Dot).is_some() {
                let method = self.ident("method name")?;
                let open = self.expect(&TokenKind::LParen, "\"(\"")?;
                let args = self.arguments(&TokenKind::RParen, "\")\"", open.span)?;
                let span = expr.span.to(args.span);
                expr = Expr::new(
                    ExprKind::Method {
                        receiver: Box::new(expr),
                        method,
                        args,
                    },
                    span,
                );
            } else if self.accept(&TokenKind::LBracket).is_some() {
                let index = self.expression()?;
                let close = self.expect(&TokenKind::RBracket, "\"]\"")?;
                let span = expr.span.to(close.span);
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let tok = self.advance();
        let kind = match tok.kind {
            TokenKind::True => ExprKind::Bool { value: true },
            TokenKind::False => ExprKind::Bool { value: false },
            TokenKind::Int(value) => ExprKind::Int { value },
            TokenKind::Str { value, style } => ExprKind::String { value, style },
            TokenKind::Ident(name) => ExprKind::Identifier { name },
            TokenKind::LParen => {
                let saved = std::mem::replace(&mut self.in_ternary, false);
                let inner = self.expression();
                self.in_ternary = saved;
                let inner = inner?;
                let close = self.expect(&TokenKind::RParen, "\")\"")?;
                return Ok(Expr::new(
                    ExprKind::Paren {
                        inner: Box::new(inner),
                    },
                    tok.span.to(close.span),
                ));
            }
            TokenKind::LBracket => {
                let args = self.arguments(&TokenKind::RBracket, "\"]\"", tok.span)?;
                let span = args.span;
                return Ok(Expr::new(ExprKind::Array(args), span));
            }
            TokenKind::LBrace => return self.dict(tok.span),
            other => {
                return Err(SyntaxError::new(
                    format!("Unexpected {}", other.describe()),
                    tok.span,
                )
                .with_label("expected an expression"));
            }
        };
        Ok(Expr::new(kind, tok.span))
    }

    fn is_multiline(&self, span: Span) -> bool {
        self.src
            .get(span.start..span.end)
            .is_some_and(|text| text.contains('\n'))
    }

    fn arguments(
        &mut self,
        close: &TokenKind,
        close_desc: &str,
        open: Span,
    ) -> Result<Arguments, SyntaxError> {
        let mut args = Arguments::default();
        loop {
            let leading_comments = self.take_leading_comments();
            if self.at(close) {
                args.trailing_comments = leading_comments;
                break;
            }
            let value = self.expression()?;
            if self.at(&TokenKind::Assign) {
                return Err(SyntaxError::new(
                    "Tried to assign values inside an argument list.",
                    value.span,
                )
                .with_help("to specify a keyword argument, use : instead of ="));
            }
            let keyword = if self.accept(&TokenKind::Colon).is_some() {
                let Some(name) = value.as_ident() else {
                    return Err(SyntaxError::new(
                        "Keyword argument must be a plain identifier.",
                        value.span,
                    ));
                };
                if args.keywords.iter().any(|kw| kw.name.name == name) {
                    return Err(SyntaxError::new(
                        format!("Duplicate keyword argument \"{name}\""),
                        value.span,
                    ));
                }
                let name = Ident {
                    name: name.to_owned(),
                    span: value.span,
                };
                Some((name, self.expression()?))
            } else {
                if !args.keywords.is_empty() {
                    return Err(SyntaxError::new(
                        "All keyword arguments must be after positional arguments.",
                        value.span,
                    ));
                }
                None
            };
            let mut comment = self.take_inline_comment();
            let had_comma = self.accept(&TokenKind::Comma).is_some();
            if comment.is_none() {
                comment = self.take_inline_comment();
            }
            match keyword {
                Some((name, value)) => args.keywords.push(KeywordArg {
                    name,
                    value,
                    leading_comments,
                    comment,
                }),
                None => args.positional.push(Element {
                    value,
                    leading_comments,
                    comment,
                }),
            }
            if !had_comma {
                let rest = self.take_leading_comments();
                if !self.at(close) {
                    let tok = self.raw().clone();
                    return Err(SyntaxError::new(
                        format!(
                            "Expecting \",\" or {close_desc} got {}",
                            tok.kind.describe()
                        ),
                        tok.span,
                    ));
                }
                args.trailing_comments = rest;
                break;
            }
        }
        let close_tok = self.expect(close, close_desc)?;
        args.span = open.to(close_tok.span);
        args.multiline = self.is_multiline(args.span);
        Ok(args)
    }

    fn dict(&mut self, open: Span) -> Result<Expr, SyntaxError> {
        let mut dict = DictEntries::default();
        loop {
            let leading_comments = self.take_leading_comments();
            if self.at(&TokenKind::RBrace) {
                dict.trailing_comments = leading_comments;
                break;
            }
            let key = self.expression()?;
            if self.accept(&TokenKind::Colon).is_none() {
                return Err(SyntaxError::new(
                    "Only key:value pairs are valid in dict construction.",
                    key.span,
                ));
            }
            let value = self.expression()?;
            let mut comment = self.take_inline_comment();
            let had_comma = self.accept(&TokenKind::Comma).is_some();
            if comment.is_none() {
                comment = self.take_inline_comment();
            }
            dict.entries.push(DictEntry {
                key,
                value,
                leading_comments,
                comment,
            });
            if !had_comma {
                dict.trailing_comments = self.take_leading_comments();
                break;
            }
        }
        let close = self.expect(&TokenKind::RBrace, "\"}\"")?;
        let span = open.to(close.span);
        dict.multiline = self.is_multiline(span);
        Ok(Expr::new(ExprKind::Dict(dict), span))
    }
}

fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(
        ExprKind::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn arithmetic(op: ArithOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(
        ExprKind::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

#[cfg(test)]
mod tests;
