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

//! Integration tests for broadcast evaluation over list parameters

use async_trait::async_trait;
use octofhir_formula::{
    EvaluateOptions, EvaluationError, EvaluationResult, Expression, FunctionArgs, Resolver, Value,
};
use pretty_assertions::assert_eq;

fn broadcast(text: &str) -> Expression {
    Expression::with_options(text, EvaluateOptions::ITERATE_PARAMETERS).unwrap()
}

#[test]
fn test_scalar_parameters_are_reused_per_position() {
    let mut expression = broadcast("a * b")
        .with_parameter("a", vec![1, 2, 3])
        .with_parameter("b", 10);

    assert_eq!(expression.evaluate().unwrap(), Value::list([10, 20, 30]));
}

#[tokio::test]
async fn test_lists_advance_in_lockstep() {
    let mut expression = broadcast("x + ':' + y")
        .with_parameter("x", vec!["a", "b"])
        .with_parameter("y", vec![1, 2]);

    assert_eq!(
        expression.evaluate_async().await.unwrap(),
        Value::list(["a:1", "b:2"])
    );
}

#[test]
fn test_mismatched_lengths_fail_before_any_pass() {
    let mut expression = broadcast("a + b")
        .with_parameter("a", vec![1, 2])
        .with_parameter("b", vec![1, 2, 3]);

    match expression.evaluate() {
        Err(EvaluationError::Evaluation { message }) => {
            assert!(message.contains("same number of items"), "{message}")
        }
        other => panic!("expected evaluation error, got {other:?}"),
    }
}

struct FirstArgument;

#[async_trait]
impl Resolver<FunctionArgs> for FirstArgument {
    async fn resolve(&self, name: &str, args: &mut FunctionArgs) -> EvaluationResult<()> {
        if name == "Identity" {
            let mut values = args.evaluate_arguments().await?;
            if !values.is_empty() {
                args.set_result(values.swap_remove(0));
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_function_arguments_see_the_current_element() {
    let mut expression = broadcast("Identity(a) + b")
        .with_parameter("a", vec![1, 2, 3])
        .with_parameter("b", 100)
        .with_function_resolver(FirstArgument);

    assert_eq!(
        expression.evaluate_async().await.unwrap(),
        Value::list([101, 102, 103])
    );
}

#[test]
fn test_sync_function_handler_arguments_see_the_current_element() {
    let mut expression = broadcast("Twice(a)")
        .with_parameter("a", vec![1, 2, 3])
        .on_evaluate_function(|name, args: &mut FunctionArgs| {
            if name == "Twice" {
                if let Ok(values) = args.evaluate_arguments_blocking() {
                    let value = values[0].as_integer().unwrap_or_default();
                    args.set_result(value * 2);
                }
            }
        });

    assert_eq!(expression.evaluate().unwrap(), Value::list([2, 4, 6]));
}

#[test]
fn test_no_list_parameters_yields_empty_list() {
    let mut expression = broadcast("a + 1").with_parameter("a", 1);
    assert_eq!(expression.evaluate().unwrap(), Value::List(Vec::new()));
}

#[test]
fn test_parameters_are_restored_after_success_and_failure() {
    let mut expression = broadcast("10 / a").with_parameter("a", vec![1, 2]);
    assert_eq!(expression.evaluate().unwrap(), Value::list([10.0, 5.0]));
    assert_eq!(expression.parameters().get("a"), Some(&Value::list([1, 2])));

    expression.set_parameter("a", vec![5, 0, 2]);
    assert_eq!(expression.evaluate(), Err(EvaluationError::DivisionByZero));
    assert_eq!(
        expression.parameters().get("a"),
        Some(&Value::list([5, 0, 2]))
    );
}

#[test]
fn test_repeated_broadcasts_are_independent() {
    let mut expression = broadcast("n * n").with_parameter("n", vec![1, 2, 3]);
    let first = expression.evaluate().unwrap();
    let second = expression.evaluate().unwrap();
    assert_eq!(first, second);
    assert_eq!(first, Value::list([1, 4, 9]));
}
