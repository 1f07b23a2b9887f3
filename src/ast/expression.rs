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

//! Expression AST node definitions

use chrono::NaiveDateTime;
use smallvec::SmallVec;

use super::operator::{BinaryOperator, UnaryOperator};
use super::visitor::{AsyncExpressionVisitor, ExpressionVisitor};
use crate::evaluator::EvaluationResult;
use crate::model::{Value, ValueKind};

/// AST representation of formulas
///
/// Nodes are immutable once built and are shared as `Arc<ExpressionNode>`
/// between the cache and every expression instance using them. Operator
/// variants are boxed to keep the enum small.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// Literal value
    Value(ValueExpression),

    /// Parameter reference
    Identifier(Identifier),

    /// Function call (boxed for size optimization)
    Function(Box<Function>),

    /// Unary operation (boxed for size optimization)
    Unary(Box<UnaryExpression>),

    /// Binary operation (boxed for size optimization)
    Binary(Box<BinaryExpression>),

    /// Ternary conditional `condition ? then : else` (boxed for size optimization)
    Ternary(Box<TernaryExpression>),
}

/// Literal value together with its semantic kind
///
/// The kind is computed once, when the node is built, and never re-derived.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueExpression {
    value: Value,
    kind: ValueKind,
}

/// Parameter reference, resolved at evaluation time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    /// Parameter name as written in the source
    pub name: String,
}

/// Function call data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Callee
    pub identifier: Identifier,
    /// Arguments in source order (SmallVec for the common case of 1-4 args)
    pub arguments: SmallVec<[ExpressionNode; 4]>,
}

/// Unary operation data
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    /// The operator
    pub op: UnaryOperator,
    /// The operand
    pub operand: ExpressionNode,
}

/// Binary operation data
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    /// The operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExpressionNode,
    /// Right operand
    pub right: ExpressionNode,
}

/// Ternary conditional data
#[derive(Debug, Clone, PartialEq)]
pub struct TernaryExpression {
    /// Condition
    pub condition: ExpressionNode,
    /// Branch taken when the condition holds
    pub then_branch: ExpressionNode,
    /// Branch taken otherwise
    pub else_branch: ExpressionNode,
}

impl ValueExpression {
    /// Create a literal from any value, classifying it
    ///
    /// Fails for values that have no literal kind (null, lists).
    pub fn new(value: impl Into<Value>) -> EvaluationResult<Self> {
        let value = value.into();
        let kind = ValueKind::classify(&value)?;
        Ok(Self { value, kind })
    }

    /// Create an integer literal
    pub fn integer(value: i64) -> Self {
        Self {
            value: Value::Integer(value),
            kind: ValueKind::Integer,
        }
    }

    /// Create a floating-point literal
    pub fn float(value: f64) -> Self {
        Self {
            value: Value::Float(value),
            kind: ValueKind::Float,
        }
    }

    /// Create a string literal
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: Value::String(value.into()),
            kind: ValueKind::String,
        }
    }

    /// Create a boolean literal
    pub fn boolean(value: bool) -> Self {
        Self {
            value: Value::Boolean(value),
            kind: ValueKind::Boolean,
        }
    }

    /// Create a moment literal
    pub fn moment(value: NaiveDateTime) -> Self {
        Self {
            value: Value::Moment(value),
            kind: ValueKind::Moment,
        }
    }

    /// The literal value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The kind computed at construction
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl Identifier {
    /// Create an identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ExpressionNode {
    /// Create a literal expression
    pub fn literal(value: ValueExpression) -> Self {
        Self::Value(value)
    }

    /// Create a parameter reference
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(Identifier::new(name))
    }

    /// Create a function call expression
    pub fn function(
        name: impl Into<String>,
        arguments: impl Into<SmallVec<[ExpressionNode; 4]>>,
    ) -> Self {
        Self::Function(Box::new(Function {
            identifier: Identifier::new(name),
            arguments: arguments.into(),
        }))
    }

    /// Create a unary operation expression
    pub fn unary(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::Unary(Box::new(UnaryExpression { op, operand }))
    }

    /// Create a binary operation expression
    pub fn binary(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::Binary(Box::new(BinaryExpression { op, left, right }))
    }

    /// Create a ternary conditional expression
    pub fn ternary(
        condition: ExpressionNode,
        then_branch: ExpressionNode,
        else_branch: ExpressionNode,
    ) -> Self {
        Self::Ternary(Box::new(TernaryExpression {
            condition,
            then_branch,
            else_branch,
        }))
    }

    /// Dispatch to the matching entry point of a sync visitor
    pub fn accept<V: ExpressionVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            Self::Value(node) => visitor.visit_value(node),
            Self::Identifier(node) => visitor.visit_identifier(node),
            Self::Function(node) => visitor.visit_function(node),
            Self::Unary(node) => visitor.visit_unary(node),
            Self::Binary(node) => visitor.visit_binary(node),
            Self::Ternary(node) => visitor.visit_ternary(node),
        }
    }

    /// Dispatch to the matching entry point of an async visitor
    ///
    /// Completes when the visitor's visit of this node completes.
    pub async fn accept_async<V: AsyncExpressionVisitor + ?Sized>(
        &self,
        visitor: &mut V,
    ) -> V::Output {
        match self {
            Self::Value(node) => visitor.visit_value(node).await,
            Self::Identifier(node) => visitor.visit_identifier(node).await,
            Self::Function(node) => visitor.visit_function(node).await,
            Self::Unary(node) => visitor.visit_unary(node).await,
            Self::Binary(node) => visitor.visit_binary(node).await,
            Self::Ternary(node) => visitor.visit_ternary(node).await,
        }
    }

    /// Check if this expression is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Get the literal if this is a literal expression
    pub fn as_literal(&self) -> Option<&ValueExpression> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Get the parameter name if this is an identifier expression
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(identifier) => Some(&identifier.name),
            _ => None,
        }
    }
}

impl From<ValueExpression> for ExpressionNode {
    fn from(value: ValueExpression) -> Self {
        Self::Value(value)
    }
}

impl From<Identifier> for ExpressionNode {
    fn from(identifier: Identifier) -> Self {
        Self::Identifier(identifier)
    }
}
