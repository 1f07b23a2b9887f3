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

//! Visitor protocols over the expression AST
//!
//! Two parallel protocols are provided: [`ExpressionVisitor`] for purely
//! synchronous passes (serialization, analysis) and [`AsyncExpressionVisitor`]
//! for passes that may suspend, such as evaluation with async resolvers.
//! Both expose one entry point per node variant and an associated `Output`.

use async_trait::async_trait;

use super::expression::{
    BinaryExpression, ExpressionNode, Function, Identifier, TernaryExpression, UnaryExpression,
    ValueExpression,
};

/// Synchronous visitor over expression nodes
pub trait ExpressionVisitor {
    /// Result type of a visit
    type Output;

    /// Visit a literal
    fn visit_value(&mut self, node: &ValueExpression) -> Self::Output;

    /// Visit a parameter reference
    fn visit_identifier(&mut self, node: &Identifier) -> Self::Output;

    /// Visit a function call
    fn visit_function(&mut self, node: &Function) -> Self::Output;

    /// Visit a unary operation
    fn visit_unary(&mut self, node: &UnaryExpression) -> Self::Output;

    /// Visit a binary operation
    fn visit_binary(&mut self, node: &BinaryExpression) -> Self::Output;

    /// Visit a ternary conditional
    fn visit_ternary(&mut self, node: &TernaryExpression) -> Self::Output;

    /// Visit any node by dispatching on its variant
    fn visit(&mut self, node: &ExpressionNode) -> Self::Output {
        node.accept(self)
    }
}

/// Asynchronous visitor over expression nodes
///
/// Every entry point completes when the visit of that node completes.
/// Dropping a pending visit cancels it.
#[async_trait]
pub trait AsyncExpressionVisitor: Send {
    /// Result type of a visit
    type Output: Send;

    /// Visit a literal
    async fn visit_value(&mut self, node: &ValueExpression) -> Self::Output;

    /// Visit a parameter reference
    async fn visit_identifier(&mut self, node: &Identifier) -> Self::Output;

    /// Visit a function call
    async fn visit_function(&mut self, node: &Function) -> Self::Output;

    /// Visit a unary operation
    async fn visit_unary(&mut self, node: &UnaryExpression) -> Self::Output;

    /// Visit a binary operation
    async fn visit_binary(&mut self, node: &BinaryExpression) -> Self::Output;

    /// Visit a ternary conditional
    async fn visit_ternary(&mut self, node: &TernaryExpression) -> Self::Output;
}
