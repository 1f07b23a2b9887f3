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

//! Integration tests for parameter and function hooks

use std::sync::Arc;

use async_trait::async_trait;
use octofhir_formula::evaluator::resolver_fn;
use octofhir_formula::{
    EvaluationError, EvaluationResult, Expression, FunctionArgs, ParameterArgs, Resolver, Value,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

type Log = Arc<Mutex<Vec<String>>>;

struct RecordingParameters {
    log: Log,
    value: i64,
}

#[async_trait]
impl Resolver<ParameterArgs> for RecordingParameters {
    async fn resolve(&self, name: &str, args: &mut ParameterArgs) -> EvaluationResult<()> {
        self.log.lock().push(format!("async:{name}"));
        tokio::task::yield_now().await;
        args.set_result(self.value);
        Ok(())
    }
}

struct Summing;

#[async_trait]
impl Resolver<FunctionArgs> for Summing {
    async fn resolve(&self, name: &str, args: &mut FunctionArgs) -> EvaluationResult<()> {
        if name != "Sum" {
            return Ok(());
        }
        let mut total = 0;
        for value in args.evaluate_arguments().await? {
            total += value.as_integer().unwrap_or_default();
        }
        args.set_result(total);
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl Resolver<ParameterArgs> for Failing {
    async fn resolve(&self, name: &str, _args: &mut ParameterArgs) -> EvaluationResult<()> {
        Err(EvaluationError::Resolver(format!("lookup of {name} failed")))
    }
}

fn recording_handler(
    log: &Log,
    value: i64,
) -> impl Fn(&str, &mut ParameterArgs) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |name: &str, args: &mut ParameterArgs| {
        log.lock().push(format!("sync:{name}"));
        args.set_result(value);
    }
}

#[test]
fn test_sync_evaluate_runs_handler_then_resolver_once_each() {
    let log = Log::default();
    let mut expression = Expression::new("x + 1")
        .unwrap()
        .on_evaluate_parameter(recording_handler(&log, 1))
        .with_parameter_resolver(RecordingParameters {
            log: Arc::clone(&log),
            value: 41,
        });

    // Both run; the resolver writes last.
    assert_eq!(expression.evaluate().unwrap(), Value::Integer(42));
    assert_eq!(*log.lock(), vec!["sync:x".to_string(), "async:x".to_string()]);
}

#[tokio::test]
async fn test_async_evaluation_skips_sync_handler() {
    let log = Log::default();
    let mut expression = Expression::new("x * 2")
        .unwrap()
        .on_evaluate_parameter(recording_handler(&log, 100))
        .with_parameter_resolver(RecordingParameters {
            log: Arc::clone(&log),
            value: 4,
        });

    assert_eq!(expression.evaluate_async().await.unwrap(), Value::Integer(8));
    assert_eq!(*log.lock(), vec!["async:x".to_string()]);
}

#[tokio::test]
async fn test_per_call_resolver_overrides_registered_one() {
    let log = Log::default();
    let mut expression = Expression::new("x")
        .unwrap()
        .with_parameter_resolver(RecordingParameters {
            log: Arc::clone(&log),
            value: 1,
        });

    let replacement = resolver_fn(|name: &str, args: &mut ParameterArgs| {
        let length = name.len() as i64;
        Box::pin(async move {
            args.set_result(length * 10);
            Ok::<(), EvaluationError>(())
        })
    });

    assert_eq!(
        expression
            .evaluate_async_with(Some(replacement), None)
            .await
            .unwrap(),
        Value::Integer(10)
    );
    assert!(log.lock().is_empty());

    // Without an override the registered resolver is back in play.
    assert_eq!(expression.evaluate_async().await.unwrap(), Value::Integer(1));
}

#[tokio::test]
async fn test_function_resolver_evaluates_arguments_lazily() {
    let mut expression = Expression::new("Sum(a, 2, a * 3)")
        .unwrap()
        .with_parameter("a", 5)
        .with_function_resolver(Summing);

    assert_eq!(expression.evaluate_async().await.unwrap(), Value::Integer(22));
}

#[tokio::test]
async fn test_unhandled_function_falls_back_to_builtins() {
    let mut expression = Expression::new("Max(1, 7)")
        .unwrap()
        .with_function_resolver(Summing);

    assert_eq!(expression.evaluate_async().await.unwrap(), Value::Integer(7));
}

#[test]
fn test_sync_function_handler_can_evaluate_arguments() {
    let mut expression = Expression::new("Twice(n + 1)")
        .unwrap()
        .with_parameter("n", 20)
        .on_evaluate_function(|name, args: &mut FunctionArgs| {
            if name == "Twice" {
                if let Ok(values) = args.evaluate_arguments_blocking() {
                    let value = values[0].as_integer().unwrap_or_default();
                    args.set_result(value * 2);
                }
            }
        });

    assert_eq!(expression.evaluate().unwrap(), Value::Integer(42));
}

#[test]
fn test_resolver_error_propagates_unchanged() {
    let mut expression = Expression::new("missing + 1")
        .unwrap()
        .with_parameter_resolver(Failing);

    assert_eq!(
        expression.evaluate(),
        Err(EvaluationError::Resolver("lookup of missing failed".to_string()))
    );
}

#[tokio::test]
async fn test_hooks_are_not_consulted_for_known_parameters() {
    let log = Log::default();
    let mut expression = Expression::new("x")
        .unwrap()
        .with_parameter("x", "known")
        .with_parameter_resolver(RecordingParameters {
            log: Arc::clone(&log),
            value: 0,
        });

    assert_eq!(expression.evaluate_async().await.unwrap(), Value::from("known"));
    assert!(log.lock().is_empty());
}

#[test]
fn test_unresolved_parameter_is_reported() {
    let mut expression = Expression::new("y")
        .unwrap()
        .on_evaluate_parameter(|_, _| {});

    assert_eq!(
        expression.evaluate(),
        Err(EvaluationError::UndefinedParameter {
            name: "y".to_string()
        })
    );
}
