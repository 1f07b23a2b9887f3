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

//! Formula expression parser
//!
//! Converts source text into an [`ExpressionNode`] tree. The tokenizer
//! reports every lexical error in the input; the Pratt parser then reports
//! the first grammar error.

#![warn(missing_docs)]

pub mod error;
pub mod pratt;
pub mod span;
pub mod tokenizer;

pub use error::{ParseError, ParseResult, SyntaxErrors};
pub use pratt::parse_expression_pratt;
pub use span::Spanned;
pub use tokenizer::{Token, Tokenizer, tokenize};

use crate::ast::ExpressionNode;

/// Parse a formula into an AST
pub fn parse(input: &str) -> Result<ExpressionNode, SyntaxErrors> {
    parse_expression_pratt(input)
}

/// Whether `word` is a reserved keyword (case-insensitive)
///
/// Keywords can still be used as parameter names when bracketed: `[and]`.
pub fn is_keyword(word: &str) -> bool {
    tokenizer::keyword(word).is_some()
}
