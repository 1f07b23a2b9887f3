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

//! Semantic classification of literal values

use serde::Serialize;
use std::fmt;

use super::value::Value;
use crate::evaluator::{EvaluationError, EvaluationResult};

/// The five semantic kinds a literal can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ValueKind {
    /// Integer family (every native integer width)
    Integer = 0,
    /// Floating-point family (`f32`, `f64`, decimal)
    Float = 1,
    /// Character string
    String = 2,
    /// Boolean
    Boolean = 3,
    /// Point in time
    Moment = 4,
}

type Classifier = fn(&Value) -> bool;

fn is_boolean(value: &Value) -> bool {
    matches!(value, Value::Boolean(_))
}

fn is_moment(value: &Value) -> bool {
    matches!(value, Value::Moment(_))
}

fn is_floating(value: &Value) -> bool {
    matches!(value, Value::Float(_) | Value::Decimal(_))
}

fn is_integer(value: &Value) -> bool {
    matches!(value, Value::Integer(_))
}

fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

/// Ordered dispatch table; the first matching entry wins.
const CLASSIFIERS: [(Classifier, ValueKind); 5] = [
    (is_boolean, ValueKind::Boolean),
    (is_moment, ValueKind::Moment),
    (is_floating, ValueKind::Float),
    (is_integer, ValueKind::Integer),
    (is_string, ValueKind::String),
];

impl ValueKind {
    /// Classify a literal value
    ///
    /// Values outside the five literal shapes (`Null`, `List`) are rejected
    /// with [`EvaluationError::UnsupportedLiteral`].
    pub fn classify(value: &Value) -> EvaluationResult<Self> {
        CLASSIFIERS
            .iter()
            .find(|(matches, _)| matches(value))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| EvaluationError::UnsupportedLiteral(value.type_name().to_string()))
    }

    /// Human readable name of the kind
    pub fn name(self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::Moment => "Moment",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a literal value, see [`ValueKind::classify`]
pub fn classify(value: &Value) -> EvaluationResult<ValueKind> {
    ValueKind::classify(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case(Value::from(true), ValueKind::Boolean)]
    #[case(Value::from(NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()), ValueKind::Moment)]
    #[case(Value::from(1.5f32), ValueKind::Float)]
    #[case(Value::from(1.5f64), ValueKind::Float)]
    #[case(Value::from(Decimal::new(15, 1)), ValueKind::Float)]
    #[case(Value::from(3u8), ValueKind::Integer)]
    #[case(Value::from(-3i64), ValueKind::Integer)]
    #[case(Value::try_from(42u64).unwrap(), ValueKind::Integer)]
    #[case(Value::try_from(7usize).unwrap(), ValueKind::Integer)]
    #[case(Value::from("text"), ValueKind::String)]
    fn test_classify_documented_kinds(#[case] value: Value, #[case] expected: ValueKind) {
        assert_eq!(classify(&value).unwrap(), expected);
        // Classification is a pure function of the value
        assert_eq!(classify(&value).unwrap(), expected);
    }

    #[test]
    fn test_unrecognized_shapes_fail_fast() {
        assert!(matches!(
            classify(&Value::Null),
            Err(EvaluationError::UnsupportedLiteral(name)) if name == "Null"
        ));
        assert!(classify(&Value::list([1, 2])).is_err());
    }

    #[test]
    fn test_unsigned_overflow_never_becomes_float() {
        assert!(matches!(
            Value::try_from(u64::MAX),
            Err(EvaluationError::Overflow(_))
        ));
        let widest = Value::try_from(i64::MAX as u64).unwrap();
        assert_eq!(classify(&widest).unwrap(), ValueKind::Integer);
    }
}
