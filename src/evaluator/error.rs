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

// Error types for formula evaluation

use thiserror::Error;

use crate::parser::SyntaxErrors;

/// Result type for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors that can occur while compiling or evaluating a formula
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Invalid construction input, such as an empty formula
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Source text failed to parse
    #[error(transparent)]
    Syntax(#[from] SyntaxErrors),

    /// General evaluation failure
    #[error("{message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// A literal whose value has no literal kind
    #[error("Unsupported literal value of type {0}")]
    UnsupportedLiteral(String),

    /// Parameter not found in the map and not resolved by a hook
    #[error("Parameter '{name}' was not defined")]
    UndefinedParameter {
        /// Parameter name
        name: String,
    },

    /// Function not resolved by a hook and not built in
    #[error("Function '{name}' is not defined")]
    UndefinedFunction {
        /// Function name
        name: String,
    },

    /// Type error during evaluation
    #[error("Type error: expected {expected}, got {actual}")]
    TypeError {
        /// Expected type
        expected: String,
        /// Actual type found
        actual: String,
    },

    /// Integer or decimal division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow in {0}")]
    Overflow(String),

    /// Failure raised by a host resolver
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// The blocking evaluation runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl EvaluationError {
    /// Create a general evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create a type error from an expected description and the offending value's type
    pub fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
