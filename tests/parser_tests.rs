// tests/parser_tests.rs

use charter::ast::{BinOp, Expr, UnOp};
use charter::lexer::Lexer;
use charter::parser::Parser;
use pretty_assertions::assert_eq;

fn parse(input: &str) -> Expr {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer).unwrap();
    parser.parse().unwrap()
}

fn parse_err(input: &str) -> String {
    let lexer = Lexer::new(input);
    match Parser::new(lexer) {
        Ok(mut parser) => parser.parse().unwrap_err().to_string(),
        Err(e) => e.to_string(),
    }
}

fn binop(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    assert_eq!(
        parse("3 + 4 * 2"),
        binop(
            BinOp::Add,
            Expr::Integer(3),
            binop(BinOp::Multiply, Expr::Integer(4), Expr::Integer(2)),
        )
    );
}

#[test]
fn test_parentheses_override_precedence() {
    assert_eq!(
        parse("(3 + 4) * 2"),
        binop(
            BinOp::Multiply,
            binop(BinOp::Add, Expr::Integer(3), Expr::Integer(4)),
            Expr::Integer(2),
        )
    );
}

#[test]
fn test_comparison_below_arithmetic() {
    assert_eq!(
        parse("1 + 2 < 4"),
        binop(
            BinOp::LessThan,
            binop(BinOp::Add, Expr::Integer(1), Expr::Integer(2)),
            Expr::Integer(4),
        )
    );
}

#[test]
fn test_logical_below_comparison() {
    assert_eq!(
        parse("1 < 2 && 3 == 3"),
        binop(
            BinOp::And,
            binop(BinOp::LessThan, Expr::Integer(1), Expr::Integer(2)),
            binop(BinOp::Equal, Expr::Integer(3), Expr::Integer(3)),
        )
    );
}

#[test]
fn test_left_associativity() {
    assert_eq!(
        parse("10 - 3 - 2"),
        binop(
            BinOp::Subtract,
            binop(BinOp::Subtract, Expr::Integer(10), Expr::Integer(3)),
            Expr::Integer(2),
        )
    );
}

#[test]
fn test_unary_right_associative() {
    assert_eq!(
        parse("--5"),
        Expr::UnaryOp {
            op: UnOp::Negate,
            operand: Box::new(Expr::UnaryOp {
                op: UnOp::Negate,
                operand: Box::new(Expr::Integer(5)),
            }),
        }
    );
}

// ============================================================================
// Ternary
// ============================================================================

#[test]
fn test_ternary_is_lowest_precedence() {
    let expr = parse("1 < 2 ? \"yes\" : \"no\"");
    match expr {
        Expr::Ternary { condition, .. } => {
            assert_eq!(
                *condition,
                binop(BinOp::LessThan, Expr::Integer(1), Expr::Integer(2))
            );
        }
        other => panic!("expected ternary, got {:?}", other),
    }
}

#[test]
fn test_nested_ternary_right_associative() {
    let expr = parse("true ? 1 : false ? 2 : 3");
    match expr {
        Expr::Ternary { else_branch, .. } => {
            assert!(matches!(*else_branch, Expr::Ternary { .. }));
        }
        other => panic!("expected ternary, got {:?}", other),
    }
}

// ============================================================================
// Calls and Chains
// ============================================================================

#[test]
fn test_method_chain() {
    assert_eq!(
        parse("@targetBody.Parent().Radius()"),
        Expr::MethodCall {
            object: Box::new(Expr::MethodCall {
                object: Box::new(Expr::Special("targetBody".to_string())),
                method: "Parent".to_string(),
                args: vec![],
            }),
            method: "Radius".to_string(),
            args: vec![],
        }
    );
}

#[test]
fn test_property_style_access_is_zero_arg_call() {
    assert_eq!(
        parse("@targetBody.Radius"),
        Expr::MethodCall {
            object: Box::new(Expr::Special("targetBody".to_string())),
            method: "Radius".to_string(),
            args: vec![],
        }
    );
}

#[test]
fn test_function_call_vs_identifier() {
    assert_eq!(
        parse("HomeWorld()"),
        Expr::FunctionCall {
            name: "HomeWorld".to_string(),
            args: vec![],
        }
    );
    assert_eq!(parse("Kerbin"), Expr::Identifier("Kerbin".to_string()));
}

#[test]
fn test_filter_lambda_argument() {
    let expr = parse("AllBodies().Where(b => b.HasAtmosphere())");
    match expr {
        Expr::MethodCall { method, args, .. } => {
            assert_eq!(method, "Where");
            match &args[0] {
                Expr::Lambda { var, body } => {
                    assert_eq!(var, "b");
                    assert!(matches!(**body, Expr::MethodCall { .. }));
                }
                other => panic!("expected lambda argument, got {:?}", other),
            }
        }
        other => panic!("expected method call, got {:?}", other),
    }
}

#[test]
fn test_multiple_arguments() {
    let expr = parse("Max(1, 2 + 3)");
    match expr {
        Expr::FunctionCall { name, args } => {
            assert_eq!(name, "Max");
            assert_eq!(args.len(), 2);
            assert_eq!(args[1], binop(BinOp::Add, Expr::Integer(2), Expr::Integer(3)));
        }
        other => panic!("expected function call, got {:?}", other),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_trailing_input_rejected() {
    let err = parse_err("1 + 2 3");
    assert!(err.contains("trailing"), "got: {}", err);
}

#[test]
fn test_missing_close_paren() {
    assert!(parse_err("(1 + 2").contains("expected"));
}

#[test]
fn test_lambda_var_must_be_identifier() {
    let err = parse_err("list.Where(1 => true)");
    assert!(err.contains("identifier"), "got: {}", err);
}

#[test]
fn test_missing_ternary_else() {
    assert!(parse_err("true ? 1").contains("expected"));
}
