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

//! Core runtime value type for formula evaluation

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::evaluator::{EvaluationError, EvaluationResult};

/// Runtime value produced by literals, parameters, hooks and operators
///
/// Native Rust numbers are folded into two families on conversion: every
/// integer width becomes [`Value::Integer`], while `f32`/`f64` become
/// [`Value::Float`] and [`Decimal`] keeps its exact representation.
/// `u64` and `usize` convert through `TryFrom` and fail with
/// [`EvaluationError::Overflow`] above `i64::MAX`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    #[default]
    Null,

    /// Boolean value
    Boolean(bool),

    /// Integer value (64-bit signed)
    Integer(i64),

    /// Exact decimal value
    Decimal(Decimal),

    /// Binary floating-point value
    Float(f64),

    /// String value
    String(String),

    /// Point in time without timezone
    Moment(NaiveDateTime),

    /// Sequence of values, iterated element-wise by broadcast evaluation
    List(Vec<Value>),
}

impl Value {
    /// Create a list value
    pub fn list(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if the value is one of the numeric variants
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Decimal(_) | Self::Float(_))
    }

    /// Get the items of a list value
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the string slice of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer of an integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert any numeric value to `f64`
    pub fn to_f64(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;

        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => d.to_f64(),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Interpret the value as a condition
    ///
    /// Booleans are taken as-is and numbers are true when non-zero.
    pub fn to_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            Self::Decimal(d) => Some(!d.is_zero()),
            Self::Float(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    /// Get the type name for this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::Moment(_) => "Moment",
            Self::List(_) => "List",
        }
    }

    /// Build a value from JSON
    ///
    /// Numbers that fit `i64` become integers, other numbers floats, arrays
    /// become lists. Objects have no counterpart and are rejected.
    pub fn from_json(json: serde_json::Value) -> EvaluationResult<Self> {
        use serde_json::Value as Json;

        Ok(match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<EvaluationResult<Vec<_>>>()?,
            ),
            Json::Object(_) => {
                return Err(EvaluationError::TypeError {
                    expected: "scalar or array".to_string(),
                    actual: "object".to_string(),
                });
            }
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Moment(m) => write!(f, "{}", m.format("%Y-%m-%d %H:%M:%S")),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Integer(i64::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

// Unsigned widths that can exceed `i64` stay in the integer family or fail.
impl TryFrom<u64> for Value {
    type Error = EvaluationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self::Integer)
            .map_err(|_| EvaluationError::Overflow(format!("{value} does not fit a 64-bit integer")))
    }
}

impl TryFrom<usize> for Value {
    type Error = EvaluationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self::Integer)
            .map_err(|_| EvaluationError::Overflow(format!("{value} does not fit a 64-bit integer")))
    }
}

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Moment(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Moment(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_integer_family_conversions() {
        assert_eq!(Value::from(7u8), Value::Integer(7));
        assert_eq!(Value::from(-7i16), Value::Integer(-7));
        assert_eq!(Value::from(7u32), Value::Integer(7));
    }

    #[rstest]
    #[case(0, Some(0))]
    #[case(i64::MAX as u64, Some(i64::MAX))]
    #[case(i64::MAX as u64 + 1, None)]
    #[case(u64::MAX, None)]
    fn test_wide_unsigned_conversions(#[case] input: u64, #[case] expected: Option<i64>) {
        match (Value::try_from(input), expected) {
            (Ok(value), Some(i)) => assert_eq!(value, Value::Integer(i)),
            (Err(EvaluationError::Overflow(_)), None) => {}
            (other, _) => panic!("unexpected conversion of {input}: {other:?}"),
        }
        assert_eq!(
            Value::try_from(input as usize).ok(),
            usize::try_from(input)
                .ok()
                .and_then(|_| i64::try_from(input).ok())
                .map(Value::Integer)
        );
    }

    #[test]
    fn test_float_family_conversions() {
        assert_eq!(Value::from(0.5f32), Value::Float(0.5));
        assert_eq!(
            Value::from(Decimal::new(15, 1)),
            Value::Decimal(Decimal::new(15, 1))
        );
    }

    #[test]
    fn test_from_json() {
        let value = Value::from_json(json!([1, 2.5, "x", true, null])).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::String("x".to_string()),
                Value::Boolean(true),
                Value::Null,
            ])
        );

        assert!(Value::from_json(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(Value::Integer(0).to_boolean(), Some(false));
        assert_eq!(Value::Float(0.1).to_boolean(), Some(true));
        assert_eq!(Value::from("true").to_boolean(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::list([1, 2]).to_string(), "[1, 2]");
        let moment = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(Value::from(moment).to_string(), "2024-01-31 00:00:00");
    }
}
