//! Tests for statement and expression parsing.

use super::*;
use rstest::rstest;

fn parse(src: &str) -> CodeBlock {
    parse_str(src, "meson.build").expect("parse")
}

fn single_expr(src: &str) -> Expr {
    parse_expression(src, "expr").expect("expression")
}

fn render(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Bool { value } => value.to_string(),
        ExprKind::Int { value } => value.to_string(),
        ExprKind::String { value, .. } => format!("'{value}'"),
        ExprKind::Identifier { name } => name.clone(),
        ExprKind::Array(args) => format!(
            "[{}]",
            args.positional
                .iter()
                .map(|e| render(&e.value))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ExprKind::Dict(dict) => format!("{{{} entries}}", dict.entries.len()),
        ExprKind::Call { function, args } => {
            format!("{}/{}", function.name, args.positional.len() + args.keywords.len())
        }
        ExprKind::Method {
            receiver, method, ..
        } => format!("{}.{}()", render(receiver), method.name),
        ExprKind::Index { object, index } => format!("{}[{}]", render(object), render(index)),
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::Not => format!("(not {})", render(operand)),
            UnaryOp::Negate => format!("(-{})", render(operand)),
        },
        ExprKind::Arithmetic { op, lhs, rhs } => {
            format!("({} {} {})", render(lhs), op.symbol(), render(rhs))
        }
        ExprKind::Comparison { op, lhs, rhs } => {
            format!("({} {} {})", render(lhs), op.symbol(), render(rhs))
        }
        ExprKind::Logical { op, lhs, rhs } => {
            format!("({} {} {})", render(lhs), op.symbol(), render(rhs))
        }
        ExprKind::Ternary {
            condition,
            if_true,
            if_false,
        } => format!(
            "({} ? {} : {})",
            render(condition),
            render(if_true),
            render(if_false)
        ),
        ExprKind::Paren { inner } => render(inner),
    }
}

#[rstest]
#[case("1 + 2 * 3", "(1 + (2 * 3))")]
#[case("1 - 2 - 3", "((1 - 2) - 3)")]
#[case("a or b and c", "(a or (b and c))")]
#[case("not a == b", "((not a) == b)")]
#[case("x not in y", "(x not in y)")]
#[case("-a % 3", "((-a) % 3)")]
#[case("a ? b : c", "(a ? b : c)")]
#[case("(1 + 2) * 3", "((1 + 2) * 3)")]
#[case("x.y()[0].z()", "x.y()[0].z()")]
#[case("'a' / 'b'", "('a' / 'b')")]
fn precedence_and_associativity(#[case] src: &str, #[case] expected: &str) {
    assert_eq!(render(&single_expr(src)), expected);
}

#[test]
fn assignment_and_plus_assignment() {
    let block = parse("a = 1\na += [2]\n");
    assert!(matches!(
        &block.statements[0].kind,
        StatementKind::Assignment { target, .. } if target.name == "a"
    ));
    assert!(matches!(
        &block.statements[1].kind,
        StatementKind::PlusAssignment { target, .. } if target.name == "a"
    ));
}

#[test]
fn call_with_positional_and_keyword_arguments() {
    let block = parse("executable('app', 'main.c', install : true)\n");
    let StatementKind::Expression { expr } = &block.statements[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Call { function, args } = &expr.kind else {
        panic!("expected call");
    };
    assert_eq!(function.name, "executable");
    assert_eq!(args.positional.len(), 2);
    assert!(args.keyword("install").is_some());
    assert!(!args.multiline);
}

#[test]
fn if_elif_else_blocks() {
    let block = parse("if a\n x = 1\nelif b\n x = 2\nelse\n x = 3\nendif\n");
    let StatementKind::If(clause) = &block.statements[0].kind else {
        panic!("expected if");
    };
    assert_eq!(clause.branches.len(), 2);
    assert_eq!(
        clause.else_block.as_ref().map(|b| b.statements.len()),
        Some(1)
    );
}

#[test]
fn header_comments_stay_with_their_clause() {
    let block = parse(
        "if a # first\n  x = 1\nelse # other\n  x = 2\nendif # done\nforeach i : [] # loop\nendforeach\n",
    );
    let StatementKind::If(clause) = &block.statements[0].kind else {
        panic!("expected if");
    };
    assert_eq!(clause.branches[0].comment.as_deref(), Some("# first"));
    assert_eq!(clause.else_comment.as_deref(), Some("# other"));
    assert_eq!(block.statements[0].comment.as_deref(), Some("# done"));
    let StatementKind::Foreach(clause) = &block.statements[1].kind else {
        panic!("expected foreach");
    };
    assert_eq!(clause.comment.as_deref(), Some("# loop"));
    assert!(clause.block.statements.is_empty());
}

#[test]
fn foreach_with_two_variables() {
    let block = parse("foreach k, v : {'a': 1}\n  message(k)\nendforeach\n");
    let StatementKind::Foreach(clause) = &block.statements[0].kind else {
        panic!("expected foreach");
    };
    let names: Vec<_> = clause.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["k", "v"]);
    assert_eq!(clause.block.statements.len(), 1);
}

#[test]
fn comments_and_blank_lines_are_recorded() {
    let src = "# header\nproject('p')\n\nx = [\n  # lead\n  'a', # first\n  'b',\n  # tail\n]\n";
    let block = parse(src);
    assert!(matches!(
        &block.statements[0].kind,
        StatementKind::Comment { text } if text == "# header"
    ));
    assert!(!block.statements[1].blank_line_before);
    assert!(block.statements[2].blank_line_before);
    let StatementKind::Assignment { value, .. } = &block.statements[2].kind else {
        panic!("expected assignment");
    };
    let ExprKind::Array(args) = &value.kind else {
        panic!("expected array");
    };
    assert!(args.multiline);
    assert_eq!(args.positional[0].leading_comments, ["# lead"]);
    assert_eq!(args.positional[0].comment.as_deref(), Some("# first"));
    assert_eq!(args.trailing_comments, ["# tail"]);
}

#[test]
fn statement_trailing_comment() {
    let block = parse("x = 1 # one\n");
    assert_eq!(block.statements[0].comment.as_deref(), Some("# one"));
    assert_eq!(block.statements.len(), 1);

    let block = parse("f(a) # call\ny = x[0] # indexed\n");
    assert_eq!(block.statements[0].comment.as_deref(), Some("# call"));
    assert_eq!(block.statements[1].comment.as_deref(), Some("# indexed"));
    assert_eq!(block.statements.len(), 2);
}

#[rstest]
#[case("f(a : 1, 2)\n", "All keyword arguments must be after positional arguments.")]
#[case("f('a' : 1)\n", "Keyword argument must be a plain identifier.")]
#[case("f(a = 1)\n", "Tried to assign values inside an argument list.")]
#[case("f(a : 1, a : 2)\n", "Duplicate keyword argument")]
#[case("'x'(1)\n", "Function call must be applied to plain id")]
#[case("1 = 2\n", "Assignment target must be an id.")]
#[case("a ? b ? c : d : e\n", "Nested ternary operators are not allowed.")]
#[case("if true\nx = 1\n", "Expecting endif got end of file")]
#[case("foreach x : y\n", "Expecting endforeach")]
#[case("endif\n", "Unexpected \"endif\"")]
#[case("x = 1 2\n", "Expecting end of line")]
#[case("{'a' 1}\n", "Only key:value pairs are valid in dict construction.")]
fn syntax_errors(#[case] src: &str, #[case] needle: &str) {
    let err = parse_str(src, "meson.build").expect_err("should fail");
    assert!(err.message.contains(needle), "{}", err.message);
}

#[test]
fn errors_carry_line_and_column() {
    let err = parse_str("project('p')\nx = f(a = 1)\n", "meson.build").expect_err("fail");
    assert_eq!((err.line, err.column), (2, 7));
    assert_eq!(err.file, "meson.build");
}

#[test]
fn ternary_inside_parentheses_is_allowed() {
    let expr = single_expr("a ? (b ? c : d) : e");
    assert_eq!(render(&expr), "(a ? (b ? c : d) : e)");
}
