// Copyright 2023 Datafuse Labs.
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

use std::fmt::Display;
use std::fmt::Formatter;
use std::io;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

/// Grammar level failures reported by the tokenizer and the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorCode {
    InvalidEOF,
    InvalidNumberValue,
    InvalidStringValue,
    ExpectedSomeIdent,
    ExpectedSomeValue,
    ExpectedColon,
    ExpectedArrayCommaOrEnd,
    ExpectedObjectCommaOrEnd,
    UnexpectedTrailingCharacters,
    KeyMustBeAString,
    ControlCharacterWhileParsingString,
    InvalidEscaped(u8),
    InvalidHex(u8),
    InvalidLoneLeadingSurrogateInHexEscape(u16),
    InvalidSurrogateInHexEscape(u16),
    UnexpectedEndOfHexEscape,
    NumberOutOfRange,
    ExpectedInteger,
    DepthLimitExceeded(usize),
    UnreadUnderflow,
}

impl Display for ParseErrorCode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            ParseErrorCode::InvalidEOF => f.write_str("EOF while parsing a value"),
            ParseErrorCode::InvalidNumberValue => f.write_str("invalid number"),
            ParseErrorCode::InvalidStringValue => f.write_str("invalid string"),
            ParseErrorCode::ExpectedSomeIdent => f.write_str("expected ident"),
            ParseErrorCode::ExpectedSomeValue => f.write_str("expected value"),
            ParseErrorCode::ExpectedColon => f.write_str("expected `:`"),
            ParseErrorCode::ExpectedArrayCommaOrEnd => f.write_str("expected `,` or `]`"),
            ParseErrorCode::ExpectedObjectCommaOrEnd => f.write_str("expected `,` or `}`"),
            ParseErrorCode::UnexpectedTrailingCharacters => f.write_str("trailing characters"),
            ParseErrorCode::KeyMustBeAString => f.write_str("key must be a string"),
            ParseErrorCode::ControlCharacterWhileParsingString => {
                f.write_str("control character (\\u0000-\\u001F) found while parsing a string")
            }
            ParseErrorCode::InvalidEscaped(n) => write!(f, "invalid escaped '{:X}'", n),
            ParseErrorCode::InvalidHex(n) => write!(f, "invalid hex '{:X}'", n),
            ParseErrorCode::InvalidLoneLeadingSurrogateInHexEscape(n) => {
                write!(f, "lone leading surrogate in hex escape '{:X}'", n)
            }
            ParseErrorCode::InvalidSurrogateInHexEscape(n) => {
                write!(f, "invalid surrogate in hex escape '{:X}'", n)
            }
            ParseErrorCode::UnexpectedEndOfHexEscape => f.write_str("unexpected end of hex escape"),
            ParseErrorCode::NumberOutOfRange => f.write_str("number out of range"),
            ParseErrorCode::ExpectedInteger => f.write_str("expected integer"),
            ParseErrorCode::DepthLimitExceeded(n) => write!(f, "exceeded max depth {}", n),
            ParseErrorCode::UnreadUnderflow => f.write_str("unread with nothing to unread"),
        }
    }
}

/// Errors produced while decoding or encoding.
///
/// Grammar errors carry the byte offset where they were detected.
/// Errors raised inside a struct field are wrapped in [`Error::Field`]
/// so the path to the failing value can be traced.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("{0}, pos {1}")]
    Syntax(ParseErrorCode, usize),

    #[error("io error: {0}")]
    Io(Arc<io::Error>),

    #[error("short write")]
    ShortWrite,

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("{owner}.{field}: {source}")]
    Field {
        owner: &'static str,
        field: String,
        source: Box<Error>,
    },

    #[error("error calling marshal_json for {type_name}: {message}")]
    Marshal {
        type_name: &'static str,
        message: String,
    },

    #[error("error calling unmarshal_json for {type_name}: {message}")]
    Unmarshal {
        type_name: &'static str,
        message: String,
    },

    #[error("invalid map key `{0}`")]
    InvalidMapKey(String),

    #[error("invalid key path")]
    InvalidKeyPath,

    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Wraps an error raised while handling `field` of `owner`.
    pub fn in_field(self, owner: &'static str, field: impl Into<String>) -> Error {
        Error::Field {
            owner,
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping field wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error means the input ended before a value was complete.
    pub fn is_eof(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::Syntax(ParseErrorCode::InvalidEOF, _)
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(_: std::fmt::Error) -> Self {
        Error::Message("formatter error".to_string())
    }
}
