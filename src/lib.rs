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

//! Embeddable formula engine
//!
//! Parses textual formulas into a shared AST and evaluates them against named
//! parameters, synchronously or asynchronously, with host hooks for unknown
//! parameters and functions.
//!
//! ```no_run
//! use octofhir_formula::{EvaluateOptions, Expression, Value};
//!
//! let mut expression = Expression::new("Round(price * (1 + rate), 2)")?
//!     .with_parameter("price", 19.99)
//!     .with_parameter("rate", 0.2);
//! assert_eq!(expression.evaluate()?, Value::Float(23.99));
//!
//! let mut batch = Expression::with_options("a + b", EvaluateOptions::ITERATE_PARAMETERS)?
//!     .with_parameter("a", vec![1, 2, 3])
//!     .with_parameter("b", 10);
//! assert_eq!(batch.evaluate()?, Value::list([11, 12, 13]));
//! # Ok::<(), octofhir_formula::EvaluationError>(())
//! ```

pub mod ast;
pub mod cache;
pub mod engine;
pub mod evaluator;
pub mod model;
pub mod parser;

pub use ast::{ExpressionNode, ValueExpression};
pub use cache::{CacheStats, ExpressionCache, is_cache_enabled, set_cache_enabled};
pub use engine::Expression;
pub use evaluator::{
    EvaluateOptions, EvaluationError, EvaluationResult, FunctionArgs, ParameterArgs, Parameters,
    Resolver,
};
pub use model::{Value, ValueKind, classify};
pub use parser::{ParseError, SyntaxErrors, parse};
