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

//! Integration tests for formula evaluation through the public API

use octofhir_formula::{
    EvaluateOptions, EvaluationError, Expression, ExpressionNode, Value, ValueKind, classify,
    parse,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("1 + 2 * 3", Value::Integer(7))]
#[case("(1 + 2) * 3", Value::Integer(9))]
#[case("7 / 2", Value::Float(3.5))]
#[case("7 % 3", Value::Integer(1))]
#[case("'a' + 'b' + 1", Value::from("ab1"))]
#[case("2 > 1 and 3 <= 3", Value::Boolean(true))]
#[case("1 == 1.0", Value::Boolean(true))]
#[case("1 <> 2", Value::Boolean(true))]
#[case("not (1 = 2)", Value::Boolean(true))]
#[case("1 << 3 | 1", Value::Integer(9))]
#[case("~0", Value::Integer(-1))]
#[case("true ? 'yes' : 'no'", Value::from("yes"))]
#[case("Abs(-5) + Max(2, 3)", Value::Integer(8))]
#[case("Round(2.5) + Round(3.5)", Value::Float(6.0))]
#[case("in(3, 1, 2, 3)", Value::Boolean(true))]
#[case("#2024/01/31# < #2024-02-01 08:00#", Value::Boolean(true))]
#[tokio::test]
async fn test_sync_and_async_agree(#[case] text: &str, #[case] expected: Value) {
    let mut sync_expression = Expression::new(text).unwrap();
    let mut async_expression = Expression::new(text).unwrap();

    let sync_result = sync_expression.evaluate().unwrap();
    let async_result = async_expression.evaluate_async().await.unwrap();

    assert_eq!(sync_result, expected);
    assert_eq!(async_result, sync_result);
}

#[test]
fn test_parameters_and_reuse() {
    let mut expression = Expression::new("price * quantity").unwrap();
    expression.set_parameter("price", 2.5);
    expression.set_parameter("quantity", 4);
    assert_eq!(expression.evaluate().unwrap(), Value::Float(10.0));

    expression.set_parameter("quantity", 2);
    assert_eq!(expression.evaluate().unwrap(), Value::Float(5.0));
}

#[test]
fn test_ignore_case_applies_to_parameters_and_builtins() {
    let mut expression = Expression::with_options("abs(VALUE)", EvaluateOptions::IGNORE_CASE)
        .unwrap()
        .with_parameter("value", -3);
    assert_eq!(expression.evaluate().unwrap(), Value::Integer(3));

    let mut strict = Expression::new("abs(value)").unwrap().with_parameter("value", -3);
    assert_eq!(
        strict.evaluate(),
        Err(EvaluationError::UndefinedFunction { name: "abs".into() })
    );
}

#[test]
fn test_round_away_from_zero_option() {
    let mut expression =
        Expression::with_options("Round(2.5)", EvaluateOptions::ROUND_AWAY_FROM_ZERO).unwrap();
    assert_eq!(expression.evaluate().unwrap(), Value::Float(3.0));
}

#[test]
fn test_no_cache_still_evaluates() {
    let mut expression = Expression::with_options("40 + 2", EvaluateOptions::NO_CACHE).unwrap();
    assert_eq!(expression.evaluate().unwrap(), Value::Integer(42));
}

#[test]
fn test_errors_propagate_unchanged() {
    let mut expression = Expression::new("1 / 0").unwrap();
    assert_eq!(expression.evaluate(), Err(EvaluationError::DivisionByZero));

    let mut expression = Expression::new("Abs(1, 2)").unwrap();
    assert_eq!(
        expression.evaluate(),
        Err(EvaluationError::evaluation("Abs() takes exactly 1 argument"))
    );

    let mut expression = Expression::new("1 < 'a'").unwrap();
    assert!(matches!(
        expression.evaluate(),
        Err(EvaluationError::TypeError { .. })
    ));
}

#[test]
fn test_malformed_source() {
    let mut expression = Expression::new("1 + ").unwrap();
    assert!(expression.has_errors());
    let message = expression.error().unwrap_or_default().to_string();
    assert!(!message.is_empty());

    match expression.evaluate() {
        Err(EvaluationError::Evaluation { message: reported }) => assert_eq!(reported, message),
        other => panic!("expected evaluation error, got {other:?}"),
    }
}

#[test]
fn test_deeply_nested_source_is_rejected() {
    let text = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
    let mut expression = Expression::new(text).unwrap();
    assert!(expression.has_errors());
    assert!(expression.error().unwrap_or_default().contains("nested deeper"));
}

#[test]
fn test_referenced_parameters() {
    let mut expression = Expression::new("if(a > b, a, Max(c, 1))").unwrap();
    assert_eq!(expression.referenced_parameters().unwrap(), vec!["a", "b", "c"]);
}

#[rstest]
#[case("1 + 2 * 3")]
#[case("(1 + 2) * 3")]
#[case("a - (b - c)")]
#[case("-x ^ ~y & z")]
#[case("!(a || b) && c")]
#[case("a ? b ? 1 : 2 : c ? 3 : 4")]
#[case("(a ? 1 : 2) + 1")]
#[case("Max([first name], 'it\\'s', 1.5, .5, 1e3)")]
#[case("#2024/01/31# == #2024-01-31 10:30:15#")]
#[case("f() + g(1, h(2))")]
#[case("[and] or [Or]")]
fn test_display_round_trips_through_parser(#[case] text: &str) {
    let ast = parse(text).unwrap();
    let rendered = ast.to_string();
    let reparsed: ExpressionNode = parse(&rendered).unwrap();
    assert_eq!(reparsed, ast, "rendered as {rendered}");
}

#[rstest]
#[case(Value::from(1u8), ValueKind::Integer)]
#[case(Value::from(-7i64), ValueKind::Integer)]
#[case(Value::from(1.5f32), ValueKind::Float)]
#[case(Value::Decimal(rust_decimal::Decimal::new(15, 1)), ValueKind::Float)]
#[case(Value::from("text"), ValueKind::String)]
#[case(Value::from(true), ValueKind::Boolean)]
#[case(Value::from(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), ValueKind::Moment)]
fn test_classification_is_repeatable(#[case] value: Value, #[case] expected: ValueKind) {
    assert_eq!(classify(&value).unwrap(), expected);
    assert_eq!(classify(&value).unwrap(), expected);
}

#[test]
fn test_unsupported_literals_fail_fast() {
    assert!(matches!(
        classify(&Value::Null),
        Err(EvaluationError::UnsupportedLiteral(_))
    ));
    assert!(matches!(
        classify(&Value::list([1])),
        Err(EvaluationError::UnsupportedLiteral(_))
    ));
}
