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

//! Built-in functions
//!
//! Names are matched exactly, or ASCII case-insensitively under
//! [`EvaluateOptions::IGNORE_CASE`]. Host function hooks take precedence
//! over every entry here.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};

use super::error::{EvaluationError, EvaluationResult};
use super::operations::{ComparisonEvaluator, expect_f64, truthy};
use super::options::EvaluateOptions;
use crate::model::Value;

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// Between the two bounds, inclusive
    Range(usize, usize),
    /// At least this many arguments
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };
        match *self {
            Arity::Exact(n) => write!(f, "exactly {n} {}", plural(n)),
            Arity::Range(min, max) => write!(f, "{min} or {max} arguments"),
            Arity::AtLeast(n) => write!(f, "at least {n} {}", plural(n)),
        }
    }
}

/// Functions available without any host hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    /// `Abs(x)`: absolute value
    Abs,
    /// `Acos(x)`: arc cosine, radians
    Acos,
    /// `Asin(x)`: arc sine, radians
    Asin,
    /// `Atan(x)`: arc tangent, radians
    Atan,
    /// `Ceiling(x)`: smallest integral value not below `x`
    Ceiling,
    /// `Cos(x)`: cosine
    Cos,
    /// `Exp(x)`: e raised to `x`
    Exp,
    /// `Floor(x)`: largest integral value not above `x`
    Floor,
    /// `IEEERemainder(x, y)`: IEEE 754 remainder
    IeeeRemainder,
    /// `Log(x, base)`: logarithm in the given base
    Log,
    /// `Log10(x)`: base-10 logarithm
    Log10,
    /// `Pow(x, y)`: `x` raised to `y`
    Pow,
    /// `Round(x[, digits])`: midpoint rounding per options
    Round,
    /// `Sign(x)`: -1, 0 or 1
    Sign,
    /// `Sin(x)`: sine
    Sin,
    /// `Sqrt(x)`: square root
    Sqrt,
    /// `Tan(x)`: tangent
    Tan,
    /// `Truncate(x)`: integral part
    Truncate,
    /// `Max(a, b)`: larger operand
    Max,
    /// `Min(a, b)`: smaller operand
    Min,
    /// `if(condition, then, else)`: evaluates one branch only
    If,
    /// `in(x, candidates...)`: membership test
    In,
}

const BUILTINS: [(&str, BuiltinFunction); 22] = [
    ("Abs", BuiltinFunction::Abs),
    ("Acos", BuiltinFunction::Acos),
    ("Asin", BuiltinFunction::Asin),
    ("Atan", BuiltinFunction::Atan),
    ("Ceiling", BuiltinFunction::Ceiling),
    ("Cos", BuiltinFunction::Cos),
    ("Exp", BuiltinFunction::Exp),
    ("Floor", BuiltinFunction::Floor),
    ("IEEERemainder", BuiltinFunction::IeeeRemainder),
    ("Log", BuiltinFunction::Log),
    ("Log10", BuiltinFunction::Log10),
    ("Pow", BuiltinFunction::Pow),
    ("Round", BuiltinFunction::Round),
    ("Sign", BuiltinFunction::Sign),
    ("Sin", BuiltinFunction::Sin),
    ("Sqrt", BuiltinFunction::Sqrt),
    ("Tan", BuiltinFunction::Tan),
    ("Truncate", BuiltinFunction::Truncate),
    ("Max", BuiltinFunction::Max),
    ("Min", BuiltinFunction::Min),
    ("if", BuiltinFunction::If),
    ("in", BuiltinFunction::In),
];

impl BuiltinFunction {
    /// Find a built-in by name
    pub fn lookup(name: &str, ignore_case: bool) -> Option<Self> {
        BUILTINS
            .iter()
            .find(|(candidate, _)| {
                if ignore_case {
                    candidate.eq_ignore_ascii_case(name)
                } else {
                    *candidate == name
                }
            })
            .map(|(_, function)| *function)
    }

    /// Canonical spelling
    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, function)| *function == self)
            .map_or("?", |(name, _)| *name)
    }

    /// Accepted argument counts
    pub fn arity(self) -> Arity {
        match self {
            Self::IeeeRemainder | Self::Log | Self::Pow | Self::Max | Self::Min => Arity::Exact(2),
            Self::Round => Arity::Range(1, 2),
            Self::If => Arity::Exact(3),
            Self::In => Arity::AtLeast(2),
            _ => Arity::Exact(1),
        }
    }

    /// Fail with an evaluation error when `count` arguments are not accepted
    pub fn check_arity(self, count: usize) -> EvaluationResult<()> {
        let arity = self.arity();
        if arity.accepts(count) {
            Ok(())
        } else {
            Err(EvaluationError::evaluation(format!(
                "{}() takes {arity}",
                self.name()
            )))
        }
    }

    /// Whether arguments must be evaluated on demand rather than up front
    pub fn is_lazy(self) -> bool {
        matches!(self, Self::If)
    }

    /// Call the function with already evaluated arguments
    pub fn call(self, args: &[Value], options: EvaluateOptions) -> EvaluationResult<Value> {
        self.check_arity(args.len())?;

        match self {
            Self::Abs => abs(&args[0]),
            Self::Ceiling => integral(&args[0], Decimal::ceil, f64::ceil),
            Self::Floor => integral(&args[0], Decimal::floor, f64::floor),
            Self::Truncate => integral(&args[0], Decimal::trunc, f64::trunc),
            Self::Sign => sign(&args[0]),
            Self::Acos => unary_float(&args[0], f64::acos),
            Self::Asin => unary_float(&args[0], f64::asin),
            Self::Atan => unary_float(&args[0], f64::atan),
            Self::Cos => unary_float(&args[0], f64::cos),
            Self::Sin => unary_float(&args[0], f64::sin),
            Self::Tan => unary_float(&args[0], f64::tan),
            Self::Exp => unary_float(&args[0], f64::exp),
            Self::Log10 => unary_float(&args[0], f64::log10),
            Self::Sqrt => unary_float(&args[0], f64::sqrt),
            Self::Log => binary_float(&args[0], &args[1], f64::log),
            Self::Pow => binary_float(&args[0], &args[1], f64::powf),
            Self::IeeeRemainder => {
                binary_float(&args[0], &args[1], |x, y| x - y * (x / y).round_ties_even())
            }
            Self::Round => round(&args[0], args.get(1), options),
            Self::Max => extremum(&args[0], &args[1], |ordering| ordering.is_ge()),
            Self::Min => extremum(&args[0], &args[1], |ordering| ordering.is_le()),
            Self::If => Ok(if truthy(&args[0])? {
                args[1].clone()
            } else {
                args[2].clone()
            }),
            Self::In => Ok(Value::Boolean(
                args[1..]
                    .iter()
                    .any(|candidate| ComparisonEvaluator::equals(&args[0], candidate)),
            )),
        }
    }
}

impl fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn abs(value: &Value) -> EvaluationResult<Value> {
    match value {
        Value::Integer(i) => i
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| EvaluationError::Overflow("Abs()".to_string())),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        other => Ok(Value::Float(expect_f64(other)?.abs())),
    }
}

fn integral(
    value: &Value,
    decimal: fn(&Decimal) -> Decimal,
    float: fn(f64) -> f64,
) -> EvaluationResult<Value> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(*i)),
        Value::Decimal(d) => Ok(Value::Decimal(decimal(d))),
        other => Ok(Value::Float(float(expect_f64(other)?))),
    }
}

fn sign(value: &Value) -> EvaluationResult<Value> {
    let sign = match value {
        Value::Integer(i) => i.signum(),
        Value::Decimal(d) if d.is_zero() => 0,
        Value::Decimal(d) => {
            if d.is_sign_negative() {
                -1
            } else {
                1
            }
        }
        other => {
            let f = expect_f64(other)?;
            if f.is_nan() {
                return Err(EvaluationError::evaluation("Sign() is undefined for NaN"));
            }
            if f > 0.0 {
                1
            } else if f < 0.0 {
                -1
            } else {
                0
            }
        }
    };
    Ok(Value::Integer(sign))
}

fn unary_float(value: &Value, f: fn(f64) -> f64) -> EvaluationResult<Value> {
    Ok(Value::Float(f(expect_f64(value)?)))
}

fn binary_float(left: &Value, right: &Value, f: fn(f64, f64) -> f64) -> EvaluationResult<Value> {
    Ok(Value::Float(f(expect_f64(left)?, expect_f64(right)?)))
}

fn round(value: &Value, digits: Option<&Value>, options: EvaluateOptions) -> EvaluationResult<Value> {
    let digits = match digits {
        None => 0,
        Some(Value::Integer(d)) => u32::try_from(*d)
            .map_err(|_| EvaluationError::evaluation("Round() digits must be between 0 and 28"))?,
        Some(other) => return Err(EvaluationError::type_error("Integer", other.type_name())),
    };
    let away_from_zero = options.contains(EvaluateOptions::ROUND_AWAY_FROM_ZERO);

    match value {
        Value::Integer(i) => Ok(Value::Integer(*i)),
        Value::Decimal(d) => {
            let strategy = if away_from_zero {
                RoundingStrategy::MidpointAwayFromZero
            } else {
                RoundingStrategy::MidpointNearestEven
            };
            Ok(Value::Decimal(d.round_dp_with_strategy(digits, strategy)))
        }
        other => {
            let x = expect_f64(other)?;
            // Past f64 precision there is nothing left to round.
            if digits > f64::DIGITS {
                return Ok(Value::Float(x));
            }
            let scale = 10f64.powi(digits as i32);
            let scaled = x * scale;
            if !scaled.is_finite() {
                return Ok(Value::Float(x));
            }
            let rounded = if away_from_zero {
                scaled.round()
            } else {
                scaled.round_ties_even()
            };
            Ok(Value::Float(rounded / scale))
        }
    }
}

fn extremum(
    left: &Value,
    right: &Value,
    keep_left: impl Fn(std::cmp::Ordering) -> bool,
) -> EvaluationResult<Value> {
    match ComparisonEvaluator::compare(left, right)? {
        Some(ordering) if keep_left(ordering) => Ok(left.clone()),
        Some(_) => Ok(right.clone()),
        None => Ok(Value::Float(f64::NAN)),
    }
}
