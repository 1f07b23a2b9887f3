// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pratt parser for formula expressions
//!
//! Binary operators are parsed by precedence climbing using the levels
//! defined on [`BinaryOperator::precedence`]; all of them are left
//! associative. The ternary conditional sits below every binary operator and
//! its branches are full expressions, so `a ? b : c ? d : e` nests to the right.

use smallvec::SmallVec;

use super::error::{ParseError, ParseResult, SyntaxErrors};
use super::span::Spanned;
use super::tokenizer::{Token, tokenize};
use crate::ast::{BinaryOperator, ExpressionNode, UnaryOperator, ValueExpression};

/// Lowest binary precedence level
const LOWEST_PRECEDENCE: u8 = 1;

/// Deepest allowed nesting of sub-expressions and unary operators
pub const MAX_NESTING_DEPTH: usize = 128;

/// Map a token to the binary operator it spells, if any
#[inline]
fn binary_operator(token: &Token) -> Option<BinaryOperator> {
    Some(match token {
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Subtract,
        Token::Star => BinaryOperator::Multiply,
        Token::Slash => BinaryOperator::Divide,
        Token::Percent => BinaryOperator::Modulo,
        Token::Equal => BinaryOperator::Equal,
        Token::NotEqual => BinaryOperator::NotEqual,
        Token::Less => BinaryOperator::LessThan,
        Token::LessEqual => BinaryOperator::LessThanOrEqual,
        Token::Greater => BinaryOperator::GreaterThan,
        Token::GreaterEqual => BinaryOperator::GreaterThanOrEqual,
        Token::AndAnd => BinaryOperator::And,
        Token::OrOr => BinaryOperator::Or,
        Token::Ampersand => BinaryOperator::BitwiseAnd,
        Token::Pipe => BinaryOperator::BitwiseOr,
        Token::Caret => BinaryOperator::BitwiseXor,
        Token::ShiftLeft => BinaryOperator::LeftShift,
        Token::ShiftRight => BinaryOperator::RightShift,
        _ => return None,
    })
}

#[inline]
fn unary_operator(token: &Token) -> Option<UnaryOperator> {
    match token {
        Token::Bang => Some(UnaryOperator::Not),
        Token::Minus => Some(UnaryOperator::Negate),
        Token::Tilde => Some(UnaryOperator::BitwiseNot),
        _ => None,
    }
}

/// Parser over a pre-scanned token stream
pub struct PrattParser {
    tokens: Vec<Spanned<Token>>,
    index: usize,
    input_len: usize,
    depth: usize,
}

impl PrattParser {
    /// Create a parser over tokens produced from an input of `input_len` bytes
    pub fn new(tokens: Vec<Spanned<Token>>, input_len: usize) -> Self {
        Self {
            tokens,
            index: 0,
            input_len,
            depth: 0,
        }
    }

    #[inline]
    fn current(&self) -> Option<&Spanned<Token>> {
        self.tokens.get(self.index)
    }

    #[inline]
    fn current_token(&self) -> Option<&Token> {
        self.current().map(|t| &t.value)
    }

    #[inline]
    fn advance(&mut self) -> Option<Spanned<Token>> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.current_token() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, label: &'static str) -> ParseResult<()> {
        match self.current() {
            Some(token) if token.value == expected => {
                self.index += 1;
                Ok(())
            }
            Some(token) => Err(ParseError::ExpectedToken {
                expected: label,
                position: token.start,
            }),
            None => Err(ParseError::UnexpectedEndOfInput {
                position: self.input_len,
            }),
        }
    }

    fn position(&self) -> usize {
        self.current().map_or(self.input_len, |token| token.start)
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                position: self.position(),
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Parse a full expression, including a trailing ternary
    pub fn parse_expression(&mut self) -> ParseResult<ExpressionNode> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> ParseResult<ExpressionNode> {
        let condition = self.parse_binary(LOWEST_PRECEDENCE)?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }

        let then_branch = self.parse_expression()?;
        self.expect(Token::Colon, "':'")?;
        let else_branch = self.parse_expression()?;
        Ok(ExpressionNode::ternary(condition, then_branch, else_branch))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<ExpressionNode> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.current_token().and_then(binary_operator) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.index += 1;
            let right = self.parse_binary(precedence + 1)?;
            left = ExpressionNode::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<ExpressionNode> {
        match self.current_token().and_then(unary_operator) {
            Some(op) => {
                self.index += 1;
                let operand = self.nested(Self::parse_unary)?;
                Ok(ExpressionNode::unary(op, operand))
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<ExpressionNode> {
        let Some(Spanned { value, start, .. }) = self.advance() else {
            return Err(ParseError::UnexpectedEndOfInput {
                position: self.input_len,
            });
        };

        match value {
            Token::Integer(i) => Ok(ValueExpression::integer(i).into()),
            Token::Float(f) => Ok(ValueExpression::float(f).into()),
            Token::String(s) => Ok(ValueExpression::string(s).into()),
            Token::Boolean(b) => Ok(ValueExpression::boolean(b).into()),
            Token::Moment(m) => Ok(ValueExpression::moment(m).into()),
            Token::Identifier(name) => {
                if self.eat(&Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Ok(ExpressionNode::identifier(name))
                }
            }
            Token::LeftParen => {
                let inner = self.parse_expression()?;
                self.expect(Token::RightParen, "')'")?;
                Ok(inner)
            }
            other => Err(ParseError::UnexpectedToken {
                token: other.to_string(),
                position: start,
            }),
        }
    }

    /// Parse call arguments after the opening parenthesis
    fn parse_function_call(&mut self, name: String) -> ParseResult<ExpressionNode> {
        let mut arguments: SmallVec<[ExpressionNode; 4]> = SmallVec::new();

        if !self.eat(&Token::RightParen) {
            loop {
                arguments.push(self.parse_expression()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(Token::RightParen, "',' or ')'")?;
                break;
            }
        }

        Ok(ExpressionNode::function(name, arguments))
    }

    /// Parse complete input
    pub fn parse(&mut self) -> ParseResult<ExpressionNode> {
        let expr = self.parse_expression()?;

        // Ensure we consumed all input
        if let Some(token) = self.current() {
            return Err(ParseError::UnexpectedToken {
                token: token.value.to_string(),
                position: token.start,
            });
        }

        Ok(expr)
    }
}

/// Parse a formula into an AST
///
/// Lexical errors are all reported together; otherwise the first grammar
/// error is reported.
pub fn parse_expression_pratt(input: &str) -> Result<ExpressionNode, SyntaxErrors> {
    let tokens = tokenize(input)?;
    PrattParser::new(tokens, input.len())
        .parse()
        .map_err(SyntaxErrors::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryExpression;
    use pretty_assertions::assert_eq;

    fn int(i: i64) -> ExpressionNode {
        ValueExpression::integer(i).into()
    }

    fn binary(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> ExpressionNode {
        ExpressionNode::binary(op, left, right)
    }

    #[test]
    fn test_basic_expressions() {
        assert_eq!(
            parse_expression_pratt("2 + 3 * 4").unwrap(),
            binary(
                BinaryOperator::Add,
                int(2),
                binary(BinaryOperator::Multiply, int(3), int(4))
            )
        );
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(
            parse_expression_pratt("10 - 4 - 3").unwrap(),
            binary(
                BinaryOperator::Subtract,
                binary(BinaryOperator::Subtract, int(10), int(4)),
                int(3)
            )
        );
    }

    #[test]
    fn test_logical_and_bitwise_precedence() {
        let ast = parse_expression_pratt("a || b && c | d").unwrap();
        let ExpressionNode::Binary(or) = ast else {
            panic!("expected binary");
        };
        assert_eq!(or.op, BinaryOperator::Or);
        assert!(matches!(
            &or.right,
            ExpressionNode::Binary(b) if matches!(**b, BinaryExpression { op: BinaryOperator::And, .. })
        ));
    }

    #[test]
    fn test_ternary_nests_to_the_right() {
        let ast = parse_expression_pratt("a ? 1 : b ? 2 : 3").unwrap();
        let ExpressionNode::Ternary(outer) = ast else {
            panic!("expected ternary");
        };
        assert_eq!(outer.condition, ExpressionNode::identifier("a"));
        assert!(matches!(outer.else_branch, ExpressionNode::Ternary(_)));
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(
            parse_expression_pratt("Max(1, [x y])").unwrap(),
            ExpressionNode::function("Max", vec![int(1), ExpressionNode::identifier("x y")])
        );
        assert_eq!(
            parse_expression_pratt("Now()").unwrap(),
            ExpressionNode::function("Now", Vec::<ExpressionNode>::new())
        );
    }

    #[test]
    fn test_unary_binds_tighter_than_binary() {
        assert_eq!(
            parse_expression_pratt("-2 * 3").unwrap(),
            binary(
                BinaryOperator::Multiply,
                ExpressionNode::unary(UnaryOperator::Negate, int(2)),
                int(3)
            )
        );
        assert_eq!(
            parse_expression_pratt("not true").unwrap(),
            ExpressionNode::unary(UnaryOperator::Not, ValueExpression::boolean(true).into())
        );
    }

    #[test]
    fn test_grammar_errors() {
        let err = parse_expression_pratt("1 +").unwrap_err();
        assert_eq!(
            err.errors(),
            &[ParseError::UnexpectedEndOfInput { position: 3 }]
        );

        let err = parse_expression_pratt("(1 + 2").unwrap_err();
        assert!(matches!(err.errors()[0], ParseError::UnexpectedEndOfInput { .. }));

        let err = parse_expression_pratt("1 2").unwrap_err();
        assert_eq!(
            err.errors(),
            &[ParseError::UnexpectedToken {
                token: "2".to_string(),
                position: 2
            }]
        );

        let err = parse_expression_pratt("a ? 1 2").unwrap_err();
        assert_eq!(
            err.errors(),
            &[ParseError::ExpectedToken {
                expected: "':'",
                position: 6
            }]
        );
    }

    #[test]
    fn test_nesting_limit() {
        let within = format!(
            "{}1{}",
            "(".repeat(MAX_NESTING_DEPTH - 1),
            ")".repeat(MAX_NESTING_DEPTH - 1)
        );
        assert_eq!(parse_expression_pratt(&within).unwrap(), int(1));

        let depth = 20_000;
        let parenthesized = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let errors = parse_expression_pratt(&parenthesized).unwrap_err();
        assert!(matches!(
            errors.errors()[0],
            ParseError::NestingTooDeep { limit: MAX_NESTING_DEPTH, position } if position == MAX_NESTING_DEPTH
        ));

        let negations = format!("{}1", "-".repeat(depth));
        assert!(matches!(
            parse_expression_pratt(&negations).unwrap_err().errors()[0],
            ParseError::NestingTooDeep { .. }
        ));
    }
}
