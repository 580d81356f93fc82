// Copyright (c) 2025 - Cowboy AI, LLC.

use cim_flow_composition::{
    ApplicationId, CompositionError, CompositionOperator, CompositionTree, ParseError,
    PolicyParser,
};
use test_case::test_case;

#[test_case("(1+2)", "(1+2)" ; "parenthesised parallel")]
#[test_case("1>2/3", "(1>(2/3))" ; "override binds tighter than sequential")]
#[test_case("(1+2)/3", "((1+2)/3)" ; "parentheses beat precedence")]
#[test_case("1+2>3", "(1+(2>3))" ; "sequential binds tighter than parallel")]
#[test_case("1/2+3", "((1/2)+3)" ; "override binds tighter than parallel")]
#[test_case("1+2+3", "((1+2)+3)" ; "parallel is left associative")]
#[test_case("1/2/3", "((1/2)/3)" ; "override is left associative")]
#[test_case(" 31 + 32 ", "(31+32)" ; "whitespace is ignored")]
#[test_case("((7))", "7" ; "redundant parentheses")]
fn policy_renders_with_precedence(expression: &str, rendered: &str) {
    let tree = PolicyParser::parse(expression).unwrap();
    assert_eq!(tree.to_string(), rendered);
}

#[test]
fn parallel_policy_structure() {
    let tree = PolicyParser::parse("(1+2)").unwrap();
    assert_eq!(tree.operator(), Some(CompositionOperator::Parallel));
    assert_eq!(tree.left().unwrap().leaf_app(), Some(ApplicationId::new(1)));
    assert_eq!(tree.right().unwrap().leaf_app(), Some(ApplicationId::new(2)));
}

#[test]
fn sequential_over_override_structure() {
    let tree = PolicyParser::parse("1>2/3").unwrap();
    assert_eq!(tree.operator(), Some(CompositionOperator::Sequential));
    assert!(tree.left().unwrap().is_leaf());

    let right = tree.right().unwrap();
    assert_eq!(right.operator(), Some(CompositionOperator::Override));
    assert_eq!(right.left().unwrap().leaf_app(), Some(ApplicationId::new(2)));
    assert_eq!(right.right().unwrap().leaf_app(), Some(ApplicationId::new(3)));
}

#[test]
fn rendered_policy_parses_back() {
    let tree: CompositionTree = "(1+2)>3/4".parse().unwrap();
    let again = PolicyParser::parse(&tree.to_string()).unwrap();
    assert_eq!(again.to_string(), tree.to_string());
}

#[test_case("" ; "empty")]
#[test_case("   " ; "blank")]
fn empty_expression_rejected(expression: &str) {
    assert_eq!(PolicyParser::parse(expression).unwrap_err(), ParseError::Empty);
}

#[test]
fn unknown_token_reports_position() {
    let err = PolicyParser::parse("1*2").unwrap_err();
    assert_eq!(
        err,
        ParseError::UnknownToken {
            token: "*".to_string(),
            position: 1
        }
    );
}

#[test_case("(1+2" ; "unclosed")]
#[test_case("1+2)" ; "unopened")]
#[test_case("((1)" ; "nested unclosed")]
fn unbalanced_parentheses_rejected(expression: &str) {
    let err = PolicyParser::parse(expression).unwrap_err();
    assert!(matches!(err, ParseError::UnbalancedParentheses { .. }));
}

#[test_case("+1" ; "leading operator")]
#[test_case("1+" ; "trailing operator")]
#[test_case("1+/2" ; "doubled operator")]
#[test_case("(1+)" ; "operator before close")]
fn dangling_operator_rejected(expression: &str) {
    let err = PolicyParser::parse(expression).unwrap_err();
    assert!(matches!(err, ParseError::MissingOperand { .. }));
}

#[test]
fn parse_error_converts_to_composition_error() {
    let err: CompositionError = PolicyParser::parse("1 2").unwrap_err().into();
    assert!(err.is_parse_error());
}
