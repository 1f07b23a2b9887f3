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

//! Evaluation visitor
//!
//! Walks an expression tree depth-first, left to right, evaluating each node
//! against a parameter map and the hooks registered for this pass.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::{EvaluationError, EvaluationResult};
use super::functions::BuiltinFunction;
use super::hooks::{FunctionArgs, Hook, ParameterArgs};
use super::operations::{apply_binary, apply_unary, truthy};
use super::options::EvaluateOptions;
use super::parameters::Parameters;
use crate::ast::{
    AsyncExpressionVisitor, BinaryExpression, BinaryOperator, ExpressionNode, Function,
    Identifier, TernaryExpression, UnaryExpression, ValueExpression,
};
use crate::engine::Expression;
use crate::model::Value;

/// Async visitor computing the value of an expression tree
pub struct EvaluationVisitor<'a> {
    options: EvaluateOptions,
    parameters: &'a mut Parameters,
    parameter_hook: Hook<ParameterArgs>,
    function_hook: Hook<FunctionArgs>,
}

impl<'a> EvaluationVisitor<'a> {
    /// Create a visitor bound to a parameter map and the hooks for this pass
    pub fn new(
        options: EvaluateOptions,
        parameters: &'a mut Parameters,
        parameter_hook: Hook<ParameterArgs>,
        function_hook: Hook<FunctionArgs>,
    ) -> Self {
        Self {
            options,
            parameters,
            parameter_hook,
            function_hook,
        }
    }

    /// Options in effect for this visitor
    pub fn options(&self) -> EvaluateOptions {
        self.options
    }

    /// The bound parameter map
    pub fn parameters(&self) -> &Parameters {
        &*self.parameters
    }

    /// Mutable access to the bound parameter map, used between passes
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut *self.parameters
    }

    /// Evaluate a whole tree
    pub async fn evaluate(&mut self, root: &ExpressionNode) -> EvaluationResult<Value> {
        root.accept_async(self).await
    }

    /// A lazily evaluated argument sharing this pass's state
    ///
    /// Arguments are single-pass: under broadcast the list parameters already
    /// hold this position's element.
    fn argument_expression(&self, argument: &ExpressionNode) -> Expression {
        Expression::for_argument(
            Arc::new(argument.clone()),
            self.options.difference(EvaluateOptions::ITERATE_PARAMETERS),
            self.parameters.clone(),
            self.parameter_hook.clone(),
            self.function_hook.clone(),
        )
    }

    async fn call_builtin(
        &mut self,
        builtin: BuiltinFunction,
        node: &Function,
    ) -> EvaluationResult<Value> {
        builtin.check_arity(node.arguments.len())?;

        if builtin.is_lazy() {
            let condition = node.arguments[0].accept_async(self).await?;
            let branch = if truthy(&condition)? {
                &node.arguments[1]
            } else {
                &node.arguments[2]
            };
            return branch.accept_async(self).await;
        }

        let mut values = Vec::with_capacity(node.arguments.len());
        for argument in &node.arguments {
            values.push(argument.accept_async(self).await?);
        }
        builtin.call(&values, self.options)
    }
}

#[async_trait]
impl AsyncExpressionVisitor for EvaluationVisitor<'_> {
    type Output = EvaluationResult<Value>;

    async fn visit_value(&mut self, node: &ValueExpression) -> Self::Output {
        Ok(node.value().clone())
    }

    async fn visit_identifier(&mut self, node: &Identifier) -> Self::Output {
        if let Some(value) = self.parameters.get(&node.name) {
            return Ok(value.clone());
        }

        if !self.parameter_hook.is_empty() {
            let mut args = ParameterArgs::new();
            self.parameter_hook.invoke(&node.name, &mut args).await?;
            if let Some(value) = args.into_result() {
                return Ok(value);
            }
        }

        Err(EvaluationError::UndefinedParameter {
            name: node.name.clone(),
        })
    }

    async fn visit_function(&mut self, node: &Function) -> Self::Output {
        let name = node.identifier.name.as_str();
        log::trace!("Evaluating function {name} with {} argument(s)", node.arguments.len());

        if !self.function_hook.is_empty() {
            let arguments = node
                .arguments
                .iter()
                .map(|argument| self.argument_expression(argument))
                .collect();
            let mut args = FunctionArgs::new(arguments);
            self.function_hook.invoke(name, &mut args).await?;
            if let Some(value) = args.into_result() {
                return Ok(value);
            }
        }

        match BuiltinFunction::lookup(name, self.options.ignore_case()) {
            Some(builtin) => self.call_builtin(builtin, node).await,
            None => Err(EvaluationError::UndefinedFunction {
                name: name.to_string(),
            }),
        }
    }

    async fn visit_unary(&mut self, node: &UnaryExpression) -> Self::Output {
        let operand = node.operand.accept_async(self).await?;
        apply_unary(node.op, &operand)
    }

    async fn visit_binary(&mut self, node: &BinaryExpression) -> Self::Output {
        let left = node.left.accept_async(self).await?;

        match node.op {
            BinaryOperator::And if !truthy(&left)? => Ok(Value::Boolean(false)),
            BinaryOperator::Or if truthy(&left)? => Ok(Value::Boolean(true)),
            BinaryOperator::And | BinaryOperator::Or => {
                let right = node.right.accept_async(self).await?;
                Ok(Value::Boolean(truthy(&right)?))
            }
            op => {
                let right = node.right.accept_async(self).await?;
                apply_binary(op, &left, &right)
            }
        }
    }

    async fn visit_ternary(&mut self, node: &TernaryExpression) -> Self::Output {
        let condition = node.condition.accept_async(self).await?;
        if truthy(&condition)? {
            node.then_branch.accept_async(self).await
        } else {
            node.else_branch.accept_async(self).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    async fn eval(text: &str, parameters: &mut Parameters) -> EvaluationResult<Value> {
        let ast = parse(text)?;
        EvaluationVisitor::new(
            EvaluateOptions::empty(),
            parameters,
            Hook::default(),
            Hook::default(),
        )
        .evaluate(&ast)
        .await
    }

    #[tokio::test]
    async fn test_arithmetic_and_parameters() {
        let mut params: Parameters = [("x", 4)].into_iter().collect();
        assert_eq!(eval("x * 2 + 1", &mut params).await.unwrap(), Value::Integer(9));
        assert_eq!(eval("x / 8", &mut params).await.unwrap(), Value::Float(0.5));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_undefined_operand() {
        let mut params = Parameters::new();
        assert_eq!(
            eval("false && missing", &mut params).await.unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            eval("true || missing", &mut params).await.unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval("true ? 1 : missing", &mut params).await.unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            eval("if(1 > 2, missing, 'no')", &mut params).await.unwrap(),
            Value::from("no")
        );
    }

    #[tokio::test]
    async fn test_undefined_names() {
        let mut params = Parameters::new();
        assert_eq!(
            eval("y + 1", &mut params).await,
            Err(EvaluationError::UndefinedParameter { name: "y".into() })
        );
        assert_eq!(
            eval("Foo(1)", &mut params).await,
            Err(EvaluationError::UndefinedFunction { name: "Foo".into() })
        );
    }
}
