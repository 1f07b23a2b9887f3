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

//! Formula evaluation
//!
//! The [`EvaluationVisitor`] walks a parsed tree asynchronously, resolving
//! identifiers from a [`Parameters`] map or a parameter [`Hook`], and calls
//! from a function hook or the [`BuiltinFunction`] set.

#![warn(missing_docs)]

mod error;
mod functions;
mod hooks;
mod operations;
mod options;
mod parameters;
mod visitor;

pub use error::{EvaluationError, EvaluationResult};
pub use functions::{Arity, BuiltinFunction};
pub use hooks::{
    FunctionArgs, FunctionHandler, FunctionResolver, Handler, Hook, HookPolicy, ParameterArgs,
    ParameterHandler, ParameterResolver, Resolver, resolver_fn,
};
pub use operations::{
    ArithmeticEvaluator, BitwiseEvaluator, ComparisonEvaluator, apply_binary, apply_unary, truthy,
};
pub use options::EvaluateOptions;
pub use parameters::Parameters;
pub use visitor::EvaluationVisitor;
