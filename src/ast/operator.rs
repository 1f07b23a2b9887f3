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

//! Operator definitions for formulas

use std::fmt;

/// Binary operators
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Logical operators
    /// Logical AND (`&&`, `and`)
    And,
    /// Logical OR (`||`, `or`)
    Or,

    // Bitwise operators
    /// Bitwise OR (`|`)
    BitwiseOr,
    /// Bitwise XOR (`^`)
    BitwiseXor,
    /// Bitwise AND (`&`)
    BitwiseAnd,

    // Comparison operators
    /// Equality (`==`, `=`)
    Equal,
    /// Inequality (`!=`, `<>`)
    NotEqual,
    /// Less than (`<`)
    LessThan,
    /// Less than or equal (`<=`)
    LessThanOrEqual,
    /// Greater than (`>`)
    GreaterThan,
    /// Greater than or equal (`>=`)
    GreaterThanOrEqual,

    // Shift operators
    /// Left shift (`<<`)
    LeftShift,
    /// Right shift (`>>`)
    RightShift,

    // Arithmetic operators
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Remainder (`%`)
    Modulo,
}

/// Unary operators
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Logical negation (`!`, `not`)
    Not,
    /// Arithmetic negation (`-`)
    Negate,
    /// Bitwise complement (`~`)
    BitwiseNot,
}

impl BinaryOperator {
    /// Get the precedence of this operator (higher number = higher precedence)
    ///
    /// The ternary conditional sits below every binary operator at level 0.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::BitwiseOr => 3,
            Self::BitwiseXor => 4,
            Self::BitwiseAnd => 5,
            Self::Equal | Self::NotEqual => 6,
            Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual => 7,
            Self::LeftShift | Self::RightShift => 8,
            Self::Add | Self::Subtract => 9,
            Self::Multiply | Self::Divide | Self::Modulo => 10,
        }
    }

    /// Check if the right operand is only evaluated depending on the left one
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Get the canonical source representation of this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::BitwiseOr => "|",
            Self::BitwiseXor => "^",
            Self::BitwiseAnd => "&",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        }
    }
}

impl UnaryOperator {
    /// Precedence shared by every unary operator
    pub const PRECEDENCE: u8 = 11;

    /// Get the canonical source representation of this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Negate => "-",
            Self::BitwiseNot => "~",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
