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

//! Expression orchestrator - the main entry point for formula evaluation

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::ast::ExpressionNode;
use crate::cache::{ExpressionCache, SharedAst};
use crate::evaluator::{
    EvaluateOptions, EvaluationError, EvaluationResult, EvaluationVisitor, FunctionArgs,
    FunctionResolver, Hook, ParameterArgs, ParameterResolver, Parameters, Resolver,
};
use crate::model::Value;

/// A formula together with its parameters, options and hooks
///
/// Built from source text (parsed lazily, through the shared cache unless
/// [`EvaluateOptions::NO_CACHE`] is set) or from a ready-made AST. One
/// instance can be evaluated repeatedly, changing parameters in between.
#[derive(Debug, Clone)]
pub struct Expression {
    source: Option<String>,
    ast: Option<SharedAst>,
    error: Option<String>,
    options: EvaluateOptions,
    parameters: Parameters,
    parameter_hook: Hook<ParameterArgs>,
    function_hook: Hook<FunctionArgs>,
}

impl Expression {
    /// Create an expression from source text with default options
    pub fn new(text: impl Into<String>) -> EvaluationResult<Self> {
        Self::with_options(text, EvaluateOptions::default())
    }

    /// Create an expression from source text
    ///
    /// Fails with [`EvaluationError::InvalidArgument`] when the text is empty.
    /// Syntax errors, including blank text, are reported later by
    /// [`Self::has_errors`] or at evaluation.
    pub fn with_options(text: impl Into<String>, options: EvaluateOptions) -> EvaluationResult<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(EvaluationError::InvalidArgument(
                "expression text cannot be empty".to_string(),
            ));
        }
        Ok(Self::build(Some(text), None, options))
    }

    /// Create an expression from an already parsed tree
    pub fn from_ast(ast: impl Into<SharedAst>, options: EvaluateOptions) -> Self {
        Self::build(None, Some(ast.into()), options)
    }

    fn build(source: Option<String>, ast: Option<SharedAst>, options: EvaluateOptions) -> Self {
        let mut parameters = Parameters::new();
        parameters.set_case_insensitive(options.ignore_case());
        Self {
            source,
            ast,
            error: None,
            options,
            parameters,
            parameter_hook: Hook::default(),
            function_hook: Hook::default(),
        }
    }

    /// Lazily evaluated call argument sharing its caller's state
    pub(crate) fn for_argument(
        ast: SharedAst,
        options: EvaluateOptions,
        parameters: Parameters,
        parameter_hook: Hook<ParameterArgs>,
        function_hook: Hook<FunctionArgs>,
    ) -> Self {
        Self {
            source: None,
            ast: Some(ast),
            error: None,
            options,
            parameters,
            parameter_hook,
            function_hook,
        }
    }

    /// Set a parameter value
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Register an async resolver for parameters missing from the map
    pub fn with_parameter_resolver(
        mut self,
        resolver: impl Resolver<ParameterArgs> + 'static,
    ) -> Self {
        self.parameter_hook.set_resolver(Arc::new(resolver));
        self
    }

    /// Register an async resolver for function calls
    pub fn with_function_resolver(mut self, resolver: impl Resolver<FunctionArgs> + 'static) -> Self {
        self.function_hook.set_resolver(Arc::new(resolver));
        self
    }

    /// Register a sync handler for parameters missing from the map
    ///
    /// Sync handlers only run under [`Self::evaluate`].
    pub fn on_evaluate_parameter(
        mut self,
        handler: impl Fn(&str, &mut ParameterArgs) + Send + Sync + 'static,
    ) -> Self {
        self.parameter_hook.set_handler(Arc::new(handler));
        self
    }

    /// Register a sync handler for function calls
    ///
    /// Sync handlers only run under [`Self::evaluate`].
    pub fn on_evaluate_function(
        mut self,
        handler: impl Fn(&str, &mut FunctionArgs) + Send + Sync + 'static,
    ) -> Self {
        self.function_hook.set_handler(Arc::new(handler));
        self
    }

    /// Source text, when built from text
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Options in effect
    pub fn options(&self) -> EvaluateOptions {
        self.options
    }

    /// Replace the options, updating parameter case sensitivity to match
    pub fn set_options(&mut self, options: EvaluateOptions) {
        self.options = options;
        self.parameters.set_case_insensitive(options.ignore_case());
    }

    /// The parameter map
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Mutable access to the parameter map
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Set a parameter value, returning the previous one
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.parameters.insert(name, value)
    }

    /// Whether the source text failed to parse
    ///
    /// Parses on first call; the outcome is kept for the life of the instance.
    pub fn has_errors(&mut self) -> bool {
        if self.ast.is_some() {
            return false;
        }
        if self.error.is_some() {
            return true;
        }
        let Some(source) = self.source.as_deref() else {
            return false;
        };

        match ExpressionCache::global().compile(source, self.options.no_cache()) {
            Ok(ast) => {
                self.ast = Some(ast);
                false
            }
            Err(e) => {
                log::debug!("Failed to parse '{source}': {e}");
                self.error = Some(e.to_string());
                true
            }
        }
    }

    /// Parse error message, once [`Self::has_errors`] has reported one
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The parsed tree, or `None` when parsing failed
    pub fn parsed_expression(&mut self) -> Option<SharedAst> {
        if self.has_errors() {
            return None;
        }
        self.ast.clone()
    }

    /// Distinct parameter names the formula refers to
    pub fn referenced_parameters(&mut self) -> EvaluationResult<Vec<String>> {
        Ok(self.resolve_ast()?.parameter_names())
    }

    fn resolve_ast(&mut self) -> EvaluationResult<SharedAst> {
        if self.has_errors() {
            return Err(EvaluationError::evaluation(
                self.error.clone().unwrap_or_default(),
            ));
        }
        self.ast
            .clone()
            .ok_or_else(|| EvaluationError::evaluation("expression has no parsed tree"))
    }

    /// Evaluate synchronously
    ///
    /// Runs both sync handlers and async resolvers, blocking the calling
    /// thread until the evaluation completes. Inside a Tokio runtime the work
    /// moves to a separate thread with its own runtime.
    pub fn evaluate(&mut self) -> EvaluationResult<Value> {
        let parameter_hook = self.parameter_hook.clone();
        let function_hook = self.function_hook.clone();
        block_on_isolated(self.run(parameter_hook, function_hook))
    }

    /// Evaluate asynchronously using the registered async resolvers
    ///
    /// Sync handlers are not consulted.
    pub async fn evaluate_async(&mut self) -> EvaluationResult<Value> {
        self.evaluate_async_with(None, None).await
    }

    /// Evaluate asynchronously, overriding the registered resolvers for this call
    pub async fn evaluate_async_with(
        &mut self,
        parameter_resolver: Option<ParameterResolver>,
        function_resolver: Option<FunctionResolver>,
    ) -> EvaluationResult<Value> {
        let parameter_hook = self
            .parameter_hook
            .resolver_only()
            .overridden(parameter_resolver);
        let function_hook = self
            .function_hook
            .resolver_only()
            .overridden(function_resolver);
        self.run(parameter_hook, function_hook).await
    }

    /// Evaluate with the hooks stored on this instance, as they are
    pub(crate) async fn evaluate_with_installed_hooks(&mut self) -> EvaluationResult<Value> {
        let parameter_hook = self.parameter_hook.clone();
        let function_hook = self.function_hook.clone();
        self.run(parameter_hook, function_hook).await
    }

    pub(crate) fn evaluate_with_installed_hooks_blocking(&mut self) -> EvaluationResult<Value> {
        block_on_isolated(self.evaluate_with_installed_hooks())
    }

    async fn run(
        &mut self,
        parameter_hook: Hook<ParameterArgs>,
        function_hook: Hook<FunctionArgs>,
    ) -> EvaluationResult<Value> {
        let ast = self.resolve_ast()?;

        if self.options.iterate_parameters() {
            return self.run_broadcast(&ast, parameter_hook, function_hook).await;
        }

        log::trace!("Evaluating '{ast}'");
        let mut visitor = EvaluationVisitor::new(
            self.options,
            &mut self.parameters,
            parameter_hook,
            function_hook,
        );
        visitor.evaluate(&ast).await
    }

    /// One pass per position across the list-valued parameters
    ///
    /// Parameters are restored to their original values afterwards, whether
    /// the batch succeeded or not.
    async fn run_broadcast(
        &mut self,
        ast: &ExpressionNode,
        parameter_hook: Hook<ParameterArgs>,
        function_hook: Hook<FunctionArgs>,
    ) -> EvaluationResult<Value> {
        let sequences: Vec<(String, std::vec::IntoIter<Value>)> = self
            .parameters
            .iter()
            .filter_map(|(name, value)| match value {
                Value::List(items) => Some((name.to_string(), items.clone().into_iter())),
                _ => None,
            })
            .collect();

        let Some(positions) = sequences.first().map(|(_, items)| items.len()) else {
            return Ok(Value::List(Vec::new()));
        };
        if sequences.iter().any(|(_, items)| items.len() != positions) {
            return Err(EvaluationError::evaluation(
                "When ITERATE_PARAMETERS is used, all list parameters must have the same number of items",
            ));
        }
        log::debug!(
            "Broadcasting over {positions} position(s) of {} list parameter(s)",
            sequences.len()
        );

        let backup = self.parameters.clone();
        let mut visitor = EvaluationVisitor::new(
            self.options,
            &mut self.parameters,
            parameter_hook,
            function_hook,
        );
        let outcome = broadcast_passes(&mut visitor, ast, sequences, positions).await;
        drop(visitor);
        self.parameters = backup;

        outcome.map(Value::List)
    }
}

async fn broadcast_passes(
    visitor: &mut EvaluationVisitor<'_>,
    ast: &ExpressionNode,
    mut sequences: Vec<(String, std::vec::IntoIter<Value>)>,
    positions: usize,
) -> EvaluationResult<Vec<Value>> {
    let mut results = Vec::with_capacity(positions);
    for position in 0..positions {
        for (name, items) in &mut sequences {
            if let Some(item) = items.next() {
                visitor.parameters_mut().insert(name.as_str(), item);
            }
        }
        log::trace!("Broadcast pass {position}");
        results.push(visitor.evaluate(ast).await?);
    }
    Ok(results)
}

/// Drive a future to completion on a private current-thread runtime
///
/// When the caller is already inside a Tokio runtime, the private runtime
/// runs on a scoped thread so the caller's runtime is never blocked in place.
fn block_on_isolated<T, F>(future: F) -> EvaluationResult<T>
where
    T: Send,
    F: Future<Output = EvaluationResult<T>> + Send,
{
    let run = move || -> EvaluationResult<T> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EvaluationError::Runtime(e.to_string()))?;
        runtime.block_on(future)
    };

    if tokio::runtime::Handle::try_current().is_err() {
        return run();
    }

    std::thread::scope(|scope| match scope.spawn(run).join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    })
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, &self.ast) {
            (Some(source), _) => f.write_str(source),
            (None, Some(ast)) => write!(f, "{ast}"),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(matches!(
            Expression::new(""),
            Err(EvaluationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_blank_text_is_a_syntax_error() {
        let mut expression = Expression::new("   ").unwrap();
        assert!(expression.has_errors());
        assert!(expression.error().is_some_and(|message| !message.is_empty()));
        assert!(matches!(
            expression.evaluate(),
            Err(EvaluationError::Evaluation { .. })
        ));
    }

    #[test]
    fn test_has_errors_is_idempotent() {
        let mut expression = Expression::new("1 + ").unwrap();
        assert!(expression.has_errors());
        let message = expression.error().map(str::to_string);
        assert!(message.as_deref().is_some_and(|m| !m.is_empty()));
        assert!(expression.has_errors());
        assert_eq!(expression.error().map(str::to_string), message);

        let mut expression = Expression::new("1 + 2").unwrap();
        assert!(!expression.has_errors());
        assert!(expression.error().is_none());
    }

    #[test]
    fn test_evaluate_surfaces_parse_failure_as_evaluation_error() {
        let mut expression = Expression::new("(1").unwrap();
        assert!(matches!(
            expression.evaluate(),
            Err(EvaluationError::Evaluation { .. })
        ));
    }

    #[test]
    fn test_from_ast_never_has_errors() {
        let ast = crate::parser::parse("a + 1").unwrap();
        let mut expression = Expression::from_ast(ast, EvaluateOptions::empty()).with_parameter("a", 1);
        assert!(!expression.has_errors());
        assert_eq!(expression.evaluate().unwrap(), Value::Integer(2));
        assert_eq!(expression.to_string(), "a + 1");
    }

    #[test]
    fn test_set_options_switches_parameter_case() {
        let mut expression = Expression::new("X").unwrap().with_parameter("x", 5);
        assert!(expression.evaluate().is_err());
        expression.set_options(EvaluateOptions::IGNORE_CASE);
        assert_eq!(expression.evaluate().unwrap(), Value::Integer(5));
    }
}
