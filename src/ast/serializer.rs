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

//! Sync visitors that render and inspect expression trees

use std::fmt;

use super::expression::{
    BinaryExpression, ExpressionNode, Function, Identifier, TernaryExpression, UnaryExpression,
    ValueExpression,
};
use super::visitor::ExpressionVisitor;
use crate::model::Value;

const MOMENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders an expression tree back to parseable source text
///
/// Operator children that are themselves binary or ternary operations are
/// always parenthesized, so the output never depends on precedence rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerializationVisitor;

impl SerializationVisitor {
    /// Create a new serializer
    pub fn new() -> Self {
        Self
    }

    fn operand(&mut self, node: &ExpressionNode) -> String {
        let text = node.accept(self);
        match node {
            ExpressionNode::Binary(_) | ExpressionNode::Ternary(_) => format!("({text})"),
            _ => text,
        }
    }
}

impl ExpressionVisitor for SerializationVisitor {
    type Output = String;

    fn visit_value(&mut self, node: &ValueExpression) -> String {
        render_value(node.value())
    }

    fn visit_identifier(&mut self, node: &Identifier) -> String {
        if is_plain_identifier(&node.name) {
            node.name.clone()
        } else {
            format!("[{}]", node.name)
        }
    }

    fn visit_function(&mut self, node: &Function) -> String {
        let arguments: Vec<String> = node.arguments.iter().map(|arg| arg.accept(self)).collect();
        format!("{}({})", node.identifier.name, arguments.join(", "))
    }

    fn visit_unary(&mut self, node: &UnaryExpression) -> String {
        format!("{}{}", node.op, self.operand(&node.operand))
    }

    fn visit_binary(&mut self, node: &BinaryExpression) -> String {
        format!(
            "{} {} {}",
            self.operand(&node.left),
            node.op,
            self.operand(&node.right)
        )
    }

    fn visit_ternary(&mut self, node: &TernaryExpression) -> String {
        format!(
            "{} ? {} : {}",
            self.operand(&node.condition),
            self.operand(&node.then_branch),
            self.operand(&node.else_branch)
        )
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::String(s) => quote(s),
        Value::Moment(m) => format!("#{}#", m.format(MOMENT_FORMAT)),
        other => other.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !crate::parser::is_keyword(name)
}

/// Collects the distinct parameter names referenced by a tree
///
/// Names are reported in first-visit order; function callee names are not
/// parameters and are skipped.
#[derive(Debug, Default, Clone)]
pub struct ParameterCollector {
    names: Vec<String>,
}

impl ParameterCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the collector, returning the names seen so far
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

impl ExpressionVisitor for ParameterCollector {
    type Output = ();

    fn visit_value(&mut self, _node: &ValueExpression) {}

    fn visit_identifier(&mut self, node: &Identifier) {
        if !self.names.iter().any(|n| n == &node.name) {
            self.names.push(node.name.clone());
        }
    }

    fn visit_function(&mut self, node: &Function) {
        for argument in &node.arguments {
            argument.accept(self);
        }
    }

    fn visit_unary(&mut self, node: &UnaryExpression) {
        node.operand.accept(self);
    }

    fn visit_binary(&mut self, node: &BinaryExpression) {
        node.left.accept(self);
        node.right.accept(self);
    }

    fn visit_ternary(&mut self, node: &TernaryExpression) {
        node.condition.accept(self);
        node.then_branch.accept(self);
        node.else_branch.accept(self);
    }
}

impl ExpressionNode {
    /// Distinct parameter names referenced by this tree, in first-visit order
    pub fn parameter_names(&self) -> Vec<String> {
        let mut collector = ParameterCollector::new();
        self.accept(&mut collector);
        collector.into_names()
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.accept(&mut SerializationVisitor::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, UnaryOperator};
    use chrono::NaiveDate;

    fn int(i: i64) -> ExpressionNode {
        ExpressionNode::literal(ValueExpression::integer(i))
    }

    #[test]
    fn test_render_nested_binary() {
        let node = ExpressionNode::binary(
            BinaryOperator::Multiply,
            ExpressionNode::binary(BinaryOperator::Add, int(1), int(2)),
            ExpressionNode::identifier("x"),
        );
        assert_eq!(node.to_string(), "(1 + 2) * x");
    }

    #[test]
    fn test_render_literals() {
        assert_eq!(
            ExpressionNode::literal(ValueExpression::string("it's")).to_string(),
            "'it\\'s'"
        );
        assert_eq!(
            ExpressionNode::literal(ValueExpression::float(2.0)).to_string(),
            "2.0"
        );
        let moment = NaiveDate::from_ymd_opt(2024, 1, 31)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .unwrap();
        assert_eq!(
            ExpressionNode::literal(ValueExpression::moment(moment)).to_string(),
            "#2024-01-31 10:30:00#"
        );
    }

    #[test]
    fn test_render_identifiers_and_calls() {
        let node = ExpressionNode::function(
            "Max",
            vec![
                ExpressionNode::identifier("first name"),
                ExpressionNode::unary(UnaryOperator::Negate, ExpressionNode::identifier("b")),
            ],
        );
        assert_eq!(node.to_string(), "Max([first name], -b)");
    }

    #[test]
    fn test_parameter_names_are_distinct_and_ordered() {
        let node = ExpressionNode::ternary(
            ExpressionNode::identifier("b"),
            ExpressionNode::function("f", vec![ExpressionNode::identifier("a")]),
            ExpressionNode::binary(
                BinaryOperator::Add,
                ExpressionNode::identifier("b"),
                ExpressionNode::identifier("c"),
            ),
        );
        assert_eq!(node.parameter_names(), vec!["b", "a", "c"]);
    }
}
