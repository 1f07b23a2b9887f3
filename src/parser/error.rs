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

//! Parser error types

use std::fmt;

use thiserror::Error;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error with location information
///
/// Positions are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Unexpected token
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token that was found
        token: String,
        /// Position where the token was found
        position: usize,
    },

    /// Expected token
    #[error("Expected {expected} at position {position}")]
    ExpectedToken {
        /// The expected token description
        expected: &'static str,
        /// Position where the token was expected
        position: usize,
    },

    /// Unexpected end of input at specific position
    #[error("Unexpected end of input at position {position}")]
    UnexpectedEndOfInput {
        /// Position where more input was expected
        position: usize,
    },

    /// Character that cannot start any token
    #[error("Invalid character '{character}' at position {position}")]
    InvalidCharacter {
        /// The offending character
        character: char,
        /// Position of the character
        position: usize,
    },

    /// Invalid literal value
    #[error("Invalid {literal_type} literal at position {position}: {value}")]
    InvalidLiteral {
        /// Type of literal that failed to parse
        literal_type: &'static str,
        /// The invalid value that was encountered
        value: String,
        /// Position where the invalid literal was found
        position: usize,
    },

    /// Invalid escape sequence
    #[error("Invalid escape sequence at position {position}: {sequence}")]
    InvalidEscape {
        /// The invalid escape sequence
        sequence: String,
        /// Position where the escape sequence was found
        position: usize,
    },

    /// Unclosed string literal
    #[error("Unclosed string literal starting at position {position}")]
    UnclosedString {
        /// Position of the opening quote
        position: usize,
    },

    /// Unclosed delimited token (`[name]` or `#moment#`)
    #[error("Missing closing '{delimiter}' for token starting at position {position}")]
    UnclosedDelimiter {
        /// The delimiter that was expected
        delimiter: char,
        /// Position of the opening delimiter
        position: usize,
    },

    /// Parentheses, calls, ternaries or unary operators nested too deeply
    #[error("Expression nested deeper than {limit} levels at position {position}")]
    NestingTooDeep {
        /// Maximum nesting depth
        limit: usize,
        /// Position where the limit was exceeded
        position: usize,
    },
}

impl ParseError {
    /// Byte offset the error refers to
    pub fn position(&self) -> usize {
        match self {
            Self::UnexpectedToken { position, .. }
            | Self::ExpectedToken { position, .. }
            | Self::UnexpectedEndOfInput { position }
            | Self::InvalidCharacter { position, .. }
            | Self::InvalidLiteral { position, .. }
            | Self::InvalidEscape { position, .. }
            | Self::UnclosedString { position }
            | Self::UnclosedDelimiter { position, .. }
            | Self::NestingTooDeep { position, .. } => *position,
        }
    }
}

/// Every syntax error found while parsing one source text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SyntaxErrors(Vec<ParseError>);

impl SyntaxErrors {
    /// Wrap a non-empty list of errors
    pub fn new(errors: Vec<ParseError>) -> Self {
        Self(errors)
    }

    /// The individual errors, in source order
    pub fn errors(&self) -> &[ParseError] {
        &self.0
    }

    /// Number of errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no error was recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ParseError> for SyntaxErrors {
    fn from(error: ParseError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for SyntaxErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
