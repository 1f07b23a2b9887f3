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

//! Tokenizer for formula expressions
//!
//! Scans the complete input up front. Lexical errors do not stop the scan:
//! the tokenizer skips past the offending text and keeps going so that
//! every problem in the source is reported at once.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use super::error::{ParseError, ParseResult, SyntaxErrors};
use super::span::Spanned;

/// Lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Floating-point literal (e.g., 3.14, .5, 1e3)
    Float(f64),
    /// String literal with escapes already applied
    String(String),
    /// Moment literal (e.g., #2024/01/31#)
    Moment(NaiveDateTime),
    /// Boolean literal (`true` / `false`)
    Boolean(bool),
    /// Identifier, either plain or written as `[any name]`
    Identifier(String),

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `!` or `not`
    Bang,
    /// `&&` or `and`
    AndAnd,
    /// `||` or `or`
    OrOr,
    /// `=` or `==`
    Equal,
    /// `!=` or `<>`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
}

/// Shared keyword table, keyed by lowercase spelling
static KEYWORD_TABLE: Lazy<FxHashMap<&'static str, Token>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("true", Token::Boolean(true));
    map.insert("false", Token::Boolean(false));
    map.insert("and", Token::AndAnd);
    map.insert("or", Token::OrOr);
    map.insert("not", Token::Bang);
    map
});

const MOMENT_TIME_FORMATS: [&str; 5] = [
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
];

const MOMENT_DATE_FORMATS: [&str; 3] = ["%Y/%m/%d", "%Y-%m-%d", "%m/%d/%Y"];

/// Look up a keyword, ignoring case
pub fn keyword(word: &str) -> Option<Token> {
    KEYWORD_TABLE.get(word.to_ascii_lowercase().as_str()).cloned()
}

/// Parse the body of a `#...#` literal
pub fn parse_moment(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    MOMENT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            MOMENT_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Byte-oriented tokenizer over a source string
#[derive(Debug, Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer positioned at the start of `input`
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    #[inline]
    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    #[inline]
    fn emit(&mut self, token: Token, len: usize) -> Token {
        self.pos += len;
        token
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn eat_digits(&mut self) {
        while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    /// Scan the next token
    ///
    /// On error the tokenizer has already moved past the offending text, so
    /// calling again resumes scanning.
    pub fn next_token(&mut self) -> ParseResult<Option<Spanned<Token>>> {
        self.skip_whitespace();

        let start = self.pos;
        let Some(byte) = self.peek(0) else {
            return Ok(None);
        };

        let token = match byte {
            b'(' => self.emit(Token::LeftParen, 1),
            b')' => self.emit(Token::RightParen, 1),
            b',' => self.emit(Token::Comma, 1),
            b'+' => self.emit(Token::Plus, 1),
            b'-' => self.emit(Token::Minus, 1),
            b'*' => self.emit(Token::Star, 1),
            b'/' => self.emit(Token::Slash, 1),
            b'%' => self.emit(Token::Percent, 1),
            b'^' => self.emit(Token::Caret, 1),
            b'~' => self.emit(Token::Tilde, 1),
            b'?' => self.emit(Token::Question, 1),
            b':' => self.emit(Token::Colon, 1),
            b'&' => match self.peek(1) {
                Some(b'&') => self.emit(Token::AndAnd, 2),
                _ => self.emit(Token::Ampersand, 1),
            },
            b'|' => match self.peek(1) {
                Some(b'|') => self.emit(Token::OrOr, 2),
                _ => self.emit(Token::Pipe, 1),
            },
            b'=' => match self.peek(1) {
                Some(b'=') => self.emit(Token::Equal, 2),
                _ => self.emit(Token::Equal, 1),
            },
            b'!' => match self.peek(1) {
                Some(b'=') => self.emit(Token::NotEqual, 2),
                _ => self.emit(Token::Bang, 1),
            },
            b'<' => match self.peek(1) {
                Some(b'=') => self.emit(Token::LessEqual, 2),
                Some(b'>') => self.emit(Token::NotEqual, 2),
                Some(b'<') => self.emit(Token::ShiftLeft, 2),
                _ => self.emit(Token::Less, 1),
            },
            b'>' => match self.peek(1) {
                Some(b'=') => self.emit(Token::GreaterEqual, 2),
                Some(b'>') => self.emit(Token::ShiftRight, 2),
                _ => self.emit(Token::Greater, 1),
            },
            b'\'' => self.scan_string()?,
            b'#' => self.scan_moment()?,
            b'[' => self.scan_bracketed_identifier()?,
            b'0'..=b'9' => self.scan_number()?,
            b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => self.scan_number()?,
            _ => match self.current_char() {
                Some(c) if c.is_alphabetic() || c == '_' => self.scan_identifier(),
                Some(c) => {
                    self.pos += c.len_utf8();
                    return Err(ParseError::InvalidCharacter {
                        character: c,
                        position: start,
                    });
                }
                None => return Ok(None),
            },
        };

        Ok(Some(Spanned::new(token, start, self.pos)))
    }

    fn scan_number(&mut self) -> ParseResult<Token> {
        let start = self.pos;
        let mut is_float = false;

        self.eat_digits();
        if self.peek(0) == Some(b'.') && self.peek(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            self.eat_digits();
            is_float = true;
        }
        if matches!(self.peek(0), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek(1), Some(b'+' | b'-')));
            if self.peek(1 + sign).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.eat_digits();
                is_float = true;
            }
        }

        let text = &self.input[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ParseError::InvalidLiteral {
                    literal_type: "float",
                    value: text.to_string(),
                    position: start,
                })
        } else {
            text.parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| ParseError::InvalidLiteral {
                    literal_type: "integer",
                    value: text.to_string(),
                    position: start,
                })
        }
    }

    fn scan_string(&mut self) -> ParseResult<Token> {
        let start = self.pos;
        self.pos += 1;

        let mut value = String::new();
        let mut first_error = None;
        loop {
            let Some(c) = self.current_char() else {
                return Err(ParseError::UnclosedString { position: start });
            };
            self.pos += c.len_utf8();
            match c {
                '\'' => break,
                '\\' => match self.scan_escape(self.pos - 1) {
                    Ok(Some(unescaped)) => value.push(unescaped),
                    Ok(None) => return Err(ParseError::UnclosedString { position: start }),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                },
                c => value.push(c),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(Token::String(value)),
        }
    }

    /// Decode the escape after a backslash; `None` at end of input
    fn scan_escape(&mut self, escape_start: usize) -> ParseResult<Option<char>> {
        let Some(c) = self.current_char() else {
            return Ok(None);
        };
        self.pos += c.len_utf8();

        let unescaped = match c {
            '\'' => '\'',
            '"' => '"',
            '\\' => '\\',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => {
                let hex = self
                    .input
                    .get(self.pos..self.pos + 4)
                    .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()));
                let decoded = hex
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        self.pos += 4;
                        ch
                    }
                    None => {
                        return Err(ParseError::InvalidEscape {
                            sequence: format!("\\u{}", hex.unwrap_or("")),
                            position: escape_start,
                        });
                    }
                }
            }
            other => {
                return Err(ParseError::InvalidEscape {
                    sequence: format!("\\{other}"),
                    position: escape_start,
                });
            }
        };
        Ok(Some(unescaped))
    }

    fn scan_delimited(&mut self, delimiter: char) -> ParseResult<&'input str> {
        let start = self.pos;
        let body_start = start + 1;
        match self.input[body_start..].find(delimiter) {
            Some(offset) => {
                self.pos = body_start + offset + delimiter.len_utf8();
                Ok(&self.input[body_start..body_start + offset])
            }
            None => {
                self.pos = self.bytes.len();
                Err(ParseError::UnclosedDelimiter {
                    delimiter,
                    position: start,
                })
            }
        }
    }

    fn scan_moment(&mut self) -> ParseResult<Token> {
        let start = self.pos;
        let body = self.scan_delimited('#')?;
        parse_moment(body)
            .map(Token::Moment)
            .ok_or_else(|| ParseError::InvalidLiteral {
                literal_type: "date",
                value: body.to_string(),
                position: start,
            })
    }

    fn scan_bracketed_identifier(&mut self) -> ParseResult<Token> {
        let start = self.pos;
        let name = self.scan_delimited(']')?;
        if name.is_empty() {
            return Err(ParseError::InvalidLiteral {
                literal_type: "identifier",
                value: "[]".to_string(),
                position: start,
            });
        }
        Ok(Token::Identifier(name.to_string()))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.pos += c.len_utf8();
        }
        let word = &self.input[start..self.pos];
        keyword(word).unwrap_or_else(|| Token::Identifier(word.to_string()))
    }
}

/// Tokenize the whole input, collecting every lexical error
pub fn tokenize(input: &str) -> Result<Vec<Spanned<Token>>, SyntaxErrors> {
    let mut tokenizer = Tokenizer::new(input);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    loop {
        match tokenizer.next_token() {
            Ok(Some(token)) => tokens.push(token),
            Ok(None) => break,
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(SyntaxErrors::new(errors))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x:?}"),
            Token::String(s) => write!(f, "'{s}'"),
            Token::Moment(m) => write!(f, "#{m}#"),
            Token::Boolean(b) => write!(f, "{b}"),
            Token::Identifier(name) => f.write_str(name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Ampersand => f.write_str("&"),
            Token::Pipe => f.write_str("|"),
            Token::Caret => f.write_str("^"),
            Token::Tilde => f.write_str("~"),
            Token::Bang => f.write_str("!"),
            Token::AndAnd => f.write_str("&&"),
            Token::OrOr => f.write_str("||"),
            Token::Equal => f.write_str("=="),
            Token::NotEqual => f.write_str("!="),
            Token::Less => f.write_str("<"),
            Token::LessEqual => f.write_str("<="),
            Token::Greater => f.write_str(">"),
            Token::GreaterEqual => f.write_str(">="),
            Token::ShiftLeft => f.write_str("<<"),
            Token::ShiftRight => f.write_str(">>"),
            Token::Question => f.write_str("?"),
            Token::Colon => f.write_str(":"),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
        }
    }
}
