//! Policy expression parser
//!
//! ```text
//! EXPR := LEAF | EXPR OP EXPR | '(' EXPR ')'
//! LEAF := digits                      application id
//! OP   := '/' | '>' | '+'             override, sequential, parallel
//! ```
//!
//! Operators are left-associative; `/` binds tighter than `>`, which binds
//! tighter than `+`. Whitespace is ignored.

use std::str::FromStr;
use tracing::debug;

use super::tree::{CompositionOperator, CompositionTree};
use crate::errors::ParseError;
use crate::identifiers::ApplicationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Leaf(ApplicationId),
    Operator(CompositionOperator, usize),
    Open(usize),
    Close(usize),
}

/// Compiles policy expressions into [`CompositionTree`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyParser;

impl PolicyParser {
    /// Parse `expression` into a tree with default priorities
    pub fn parse(expression: &str) -> Result<CompositionTree, ParseError> {
        let tokens = tokenize(expression)?;
        check_shape(&tokens)?;
        let postfix = to_postfix(tokens)?;
        let tree = build(postfix)?;
        debug!(policy = %tree, "parsed composition policy");
        Ok(tree)
    }
}

impl FromStr for CompositionTree {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyParser::parse(s)
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '0'..='9' => {
                let mut end = position + c.len_utf8();
                while let Some(&(next, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = next + d.len_utf8();
                    chars.next();
                }
                let digits = &expression[position..end];
                let id = digits
                    .parse::<u16>()
                    .map_err(|_| ParseError::InvalidApplicationId(digits.to_string()))?;
                tokens.push(Token::Leaf(ApplicationId::new(id)));
            }
            '(' => tokens.push(Token::Open(position)),
            ')' => tokens.push(Token::Close(position)),
            c => match CompositionOperator::from_symbol(c) {
                Some(operator) => tokens.push(Token::Operator(operator, position)),
                None => {
                    return Err(ParseError::UnknownToken {
                        token: c.to_string(),
                        position,
                    })
                }
            },
        }
    }

    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(tokens)
}

/// Reject adjacent operands and dangling operators before conversion
fn check_shape(tokens: &[Token]) -> Result<(), ParseError> {
    let mut expect_operand = true;
    let mut previous: Option<Token> = None;

    for &token in tokens {
        match token {
            Token::Leaf(_) | Token::Open(_) => {
                if !expect_operand {
                    return Err(ParseError::MissingOperator);
                }
                expect_operand = matches!(token, Token::Open(_));
            }
            Token::Operator(operator, position) => {
                if expect_operand {
                    return Err(ParseError::MissingOperand {
                        operator: operator.symbol(),
                        position,
                    });
                }
                expect_operand = true;
            }
            Token::Close(_) => {
                if matches!(previous, Some(Token::Open(_))) {
                    return Err(ParseError::Empty);
                }
                if expect_operand {
                    return Err(dangling(previous));
                }
            }
        }
        previous = Some(token);
    }

    if expect_operand {
        return Err(dangling(previous));
    }
    Ok(())
}

fn dangling(previous: Option<Token>) -> ParseError {
    match previous {
        Some(Token::Operator(operator, position)) => ParseError::MissingOperand {
            operator: operator.symbol(),
            position,
        },
        Some(Token::Open(position)) => ParseError::UnbalancedParentheses { position },
        _ => ParseError::Empty,
    }
}

fn to_postfix(tokens: Vec<Token>) -> Result<Vec<Token>, ParseError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Leaf(_) => output.push(token),
            Token::Operator(operator, _) => {
                while let Some(&Token::Operator(top, _)) = stack.last() {
                    if top.precedence() < operator.precedence() {
                        break;
                    }
                    output.extend(stack.pop());
                }
                stack.push(token);
            }
            Token::Open(_) => stack.push(token),
            Token::Close(position) => loop {
                match stack.pop() {
                    Some(Token::Open(_)) => break,
                    Some(op) => output.push(op),
                    None => return Err(ParseError::UnbalancedParentheses { position }),
                }
            },
        }
    }

    while let Some(token) = stack.pop() {
        if let Token::Open(position) = token {
            return Err(ParseError::UnbalancedParentheses { position });
        }
        output.push(token);
    }
    Ok(output)
}

fn build(postfix: Vec<Token>) -> Result<CompositionTree, ParseError> {
    let mut operands: Vec<CompositionTree> = Vec::new();

    for token in postfix {
        match token {
            Token::Leaf(app_id) => operands.push(CompositionTree::leaf(app_id)),
            Token::Operator(operator, position) => {
                let missing = || ParseError::MissingOperand {
                    operator: operator.symbol(),
                    position,
                };
                let right = operands.pop().ok_or_else(missing)?;
                let left = operands.pop().ok_or_else(missing)?;
                operands.push(CompositionTree::node(operator, left, right));
            }
            Token::Open(position) | Token::Close(position) => {
                return Err(ParseError::UnbalancedParentheses { position })
            }
        }
    }

    let root = operands.pop().ok_or(ParseError::Empty)?;
    if !operands.is_empty() {
        return Err(ParseError::MissingOperator);
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_leaf() {
        let tree = PolicyParser::parse(" 42 ").unwrap();
        assert_eq!(tree.leaf_app(), Some(ApplicationId::new(42)));
    }

    #[test]
    fn test_from_str() {
        let tree: CompositionTree = "1+2".parse().unwrap();
        assert_eq!(tree.operator(), Some(CompositionOperator::Parallel));
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(PolicyParser::parse("1>2>3").unwrap().to_string(), "((1>2)>3)");
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(PolicyParser::parse("1 2").unwrap_err(), ParseError::MissingOperator);
        assert_eq!(
            PolicyParser::parse("1+").unwrap_err(),
            ParseError::MissingOperand {
                operator: '+',
                position: 1
            }
        );
        assert_eq!(
            PolicyParser::parse("(1+2").unwrap_err(),
            ParseError::UnbalancedParentheses { position: 0 }
        );
        assert_eq!(
            PolicyParser::parse("1+2)").unwrap_err(),
            ParseError::UnbalancedParentheses { position: 3 }
        );
        assert_eq!(PolicyParser::parse("()").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_application_id_overflow() {
        assert_eq!(
            PolicyParser::parse("70000").unwrap_err(),
            ParseError::InvalidApplicationId("70000".to_string())
        );
    }
}
