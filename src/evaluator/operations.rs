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

//! Operator semantics
//!
//! Numeric operands are promoted pairwise: `Float` if either side is a
//! float, else `Decimal` if either side is a decimal, else `Integer`.
//! Integer and decimal arithmetic is checked.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use super::error::{EvaluationError, EvaluationResult};
use crate::ast::{BinaryOperator, UnaryOperator};
use crate::model::Value;

/// A pair of numeric operands after promotion
#[derive(Debug, Clone, Copy, PartialEq)]
enum NumericPair {
    Integer(i64, i64),
    Decimal(Decimal, Decimal),
    Float(f64, f64),
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

fn promote(left: &Value, right: &Value) -> Option<NumericPair> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(NumericPair::Integer(*a, *b)),
        (Value::Float(_), _) | (_, Value::Float(_)) => {
            Some(NumericPair::Float(left.to_f64()?, right.to_f64()?))
        }
        _ => Some(NumericPair::Decimal(as_decimal(left)?, as_decimal(right)?)),
    }
}

fn numeric_operands(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> EvaluationResult<NumericPair> {
    promote(left, right).ok_or_else(|| {
        let offender = if left.is_numeric() { right } else { left };
        EvaluationError::type_error(format!("numeric operands for '{op}'"), offender.type_name())
    })
}

fn overflow(op: BinaryOperator) -> EvaluationError {
    EvaluationError::Overflow(format!("'{op}'"))
}

/// Interpret a value as a condition
pub fn truthy(value: &Value) -> EvaluationResult<bool> {
    value
        .to_boolean()
        .ok_or_else(|| EvaluationError::type_error("Boolean", value.type_name()))
}

/// Arithmetic operators: `+ - * / %`
pub struct ArithmeticEvaluator;

impl ArithmeticEvaluator {
    /// `+`, concatenating when either side is a string
    pub fn add(left: &Value, right: &Value) -> EvaluationResult<Value> {
        if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
            return Ok(Value::String(format!("{left}{right}")));
        }
        let op = BinaryOperator::Add;
        match numeric_operands(op, left, right)? {
            NumericPair::Integer(a, b) => a.checked_add(b).map(Value::Integer).ok_or_else(|| overflow(op)),
            NumericPair::Decimal(a, b) => a.checked_add(b).map(Value::Decimal).ok_or_else(|| overflow(op)),
            NumericPair::Float(a, b) => Ok(Value::Float(a + b)),
        }
    }

    /// `-`
    pub fn subtract(left: &Value, right: &Value) -> EvaluationResult<Value> {
        let op = BinaryOperator::Subtract;
        match numeric_operands(op, left, right)? {
            NumericPair::Integer(a, b) => a.checked_sub(b).map(Value::Integer).ok_or_else(|| overflow(op)),
            NumericPair::Decimal(a, b) => a.checked_sub(b).map(Value::Decimal).ok_or_else(|| overflow(op)),
            NumericPair::Float(a, b) => Ok(Value::Float(a - b)),
        }
    }

    /// `*`
    pub fn multiply(left: &Value, right: &Value) -> EvaluationResult<Value> {
        let op = BinaryOperator::Multiply;
        match numeric_operands(op, left, right)? {
            NumericPair::Integer(a, b) => a.checked_mul(b).map(Value::Integer).ok_or_else(|| overflow(op)),
            NumericPair::Decimal(a, b) => a.checked_mul(b).map(Value::Decimal).ok_or_else(|| overflow(op)),
            NumericPair::Float(a, b) => Ok(Value::Float(a * b)),
        }
    }

    /// `/`, always floating for two integers
    pub fn divide(left: &Value, right: &Value) -> EvaluationResult<Value> {
        let op = BinaryOperator::Divide;
        match numeric_operands(op, left, right)? {
            NumericPair::Integer(_, 0) => Err(EvaluationError::DivisionByZero),
            NumericPair::Integer(a, b) => Ok(Value::Float(a as f64 / b as f64)),
            NumericPair::Decimal(_, b) if b.is_zero() => Err(EvaluationError::DivisionByZero),
            NumericPair::Decimal(a, b) => a.checked_div(b).map(Value::Decimal).ok_or_else(|| overflow(op)),
            NumericPair::Float(a, b) => Ok(Value::Float(a / b)),
        }
    }

    /// `%`
    pub fn modulo(left: &Value, right: &Value) -> EvaluationResult<Value> {
        let op = BinaryOperator::Modulo;
        match numeric_operands(op, left, right)? {
            NumericPair::Integer(_, 0) => Err(EvaluationError::DivisionByZero),
            NumericPair::Integer(a, b) => a.checked_rem(b).map(Value::Integer).ok_or_else(|| overflow(op)),
            NumericPair::Decimal(_, b) if b.is_zero() => Err(EvaluationError::DivisionByZero),
            NumericPair::Decimal(a, b) => a.checked_rem(b).map(Value::Decimal).ok_or_else(|| overflow(op)),
            NumericPair::Float(a, b) => Ok(Value::Float(a % b)),
        }
    }
}

/// Equality and ordering
pub struct ComparisonEvaluator;

impl ComparisonEvaluator {
    /// Equality; values of unrelated kinds are never equal
    pub fn equals(left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Self::equals(x, y))
            }
            _ if left.is_numeric() && right.is_numeric() => match promote(left, right) {
                Some(NumericPair::Integer(a, b)) => a == b,
                Some(NumericPair::Decimal(a, b)) => a == b,
                Some(NumericPair::Float(a, b)) => a == b,
                None => false,
            },
            _ => left == right,
        }
    }

    /// Ordering; `None` when the values are unordered (NaN)
    pub fn compare(left: &Value, right: &Value) -> EvaluationResult<Option<Ordering>> {
        match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
            (Value::Moment(a), Value::Moment(b)) => Ok(Some(a.cmp(b))),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Some(a.cmp(b))),
            _ if left.is_numeric() && right.is_numeric() => Ok(match promote(left, right) {
                Some(NumericPair::Integer(a, b)) => Some(a.cmp(&b)),
                Some(NumericPair::Decimal(a, b)) => Some(a.cmp(&b)),
                Some(NumericPair::Float(a, b)) => a.partial_cmp(&b),
                None => None,
            }),
            _ => Err(EvaluationError::type_error(
                format!("value comparable with {}", left.type_name()),
                right.type_name(),
            )),
        }
    }

    fn ordered(
        left: &Value,
        right: &Value,
        accept: impl Fn(Ordering) -> bool,
    ) -> EvaluationResult<Value> {
        Ok(Value::Boolean(Self::compare(left, right)?.is_some_and(accept)))
    }
}

/// Bitwise and shift operators, defined on integers only
pub struct BitwiseEvaluator;

impl BitwiseEvaluator {
    fn integers(op: BinaryOperator, left: &Value, right: &Value) -> EvaluationResult<(i64, i64)> {
        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => Ok((*a, *b)),
            (Value::Integer(_), other) | (other, _) => Err(EvaluationError::type_error(
                format!("Integer operands for '{op}'"),
                other.type_name(),
            )),
        }
    }

    /// Apply `& | ^ << >>`
    pub fn apply(op: BinaryOperator, left: &Value, right: &Value) -> EvaluationResult<Value> {
        let (a, b) = Self::integers(op, left, right)?;
        let shift = || u32::try_from(b).ok().filter(|s| *s < i64::BITS);
        let result = match op {
            BinaryOperator::BitwiseAnd => Some(a & b),
            BinaryOperator::BitwiseOr => Some(a | b),
            BinaryOperator::BitwiseXor => Some(a ^ b),
            BinaryOperator::LeftShift => shift().and_then(|s| a.checked_shl(s)),
            BinaryOperator::RightShift => shift().and_then(|s| a.checked_shr(s)),
            _ => None,
        };
        result.map(Value::Integer).ok_or_else(|| overflow(op))
    }
}

/// Apply a binary operator to two evaluated operands
///
/// `&&` and `||` are accepted here with both sides already evaluated; the
/// evaluation visitor short-circuits them before reaching this point.
pub fn apply_binary(op: BinaryOperator, left: &Value, right: &Value) -> EvaluationResult<Value> {
    match op {
        BinaryOperator::Add => ArithmeticEvaluator::add(left, right),
        BinaryOperator::Subtract => ArithmeticEvaluator::subtract(left, right),
        BinaryOperator::Multiply => ArithmeticEvaluator::multiply(left, right),
        BinaryOperator::Divide => ArithmeticEvaluator::divide(left, right),
        BinaryOperator::Modulo => ArithmeticEvaluator::modulo(left, right),
        BinaryOperator::Equal => Ok(Value::Boolean(ComparisonEvaluator::equals(left, right))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!ComparisonEvaluator::equals(left, right))),
        BinaryOperator::LessThan => ComparisonEvaluator::ordered(left, right, Ordering::is_lt),
        BinaryOperator::LessThanOrEqual => ComparisonEvaluator::ordered(left, right, Ordering::is_le),
        BinaryOperator::GreaterThan => ComparisonEvaluator::ordered(left, right, Ordering::is_gt),
        BinaryOperator::GreaterThanOrEqual => {
            ComparisonEvaluator::ordered(left, right, Ordering::is_ge)
        }
        BinaryOperator::And => Ok(Value::Boolean(truthy(left)? && truthy(right)?)),
        BinaryOperator::Or => Ok(Value::Boolean(truthy(left)? || truthy(right)?)),
        BinaryOperator::BitwiseAnd
        | BinaryOperator::BitwiseOr
        | BinaryOperator::BitwiseXor
        | BinaryOperator::LeftShift
        | BinaryOperator::RightShift => BitwiseEvaluator::apply(op, left, right),
    }
}

/// Apply a unary operator to an evaluated operand
pub fn apply_unary(op: UnaryOperator, operand: &Value) -> EvaluationResult<Value> {
    match (op, operand) {
        (UnaryOperator::Not, value) => Ok(Value::Boolean(!truthy(value)?)),
        (UnaryOperator::Negate, Value::Integer(i)) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| EvaluationError::Overflow("unary '-'".to_string())),
        (UnaryOperator::Negate, Value::Decimal(d)) => Ok(Value::Decimal(-*d)),
        (UnaryOperator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::BitwiseNot, Value::Integer(i)) => Ok(Value::Integer(!i)),
        (UnaryOperator::Negate, value) => {
            Err(EvaluationError::type_error("numeric operand for '-'", value.type_name()))
        }
        (UnaryOperator::BitwiseNot, value) => {
            Err(EvaluationError::type_error("Integer operand for '~'", value.type_name()))
        }
    }
}

/// Convert a numeric value to `f64` or fail with a type error
pub fn expect_f64(value: &Value) -> EvaluationResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| EvaluationError::type_error("numeric value", value.type_name()))
}
