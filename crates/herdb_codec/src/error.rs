//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The leading tag byte is not a known value type.
    #[error("unknown type tag {tag:#04x}")]
    UnknownTag {
        /// The tag byte that was read.
        tag: u8,
    },

    /// Bytes remained after a complete value.
    #[error("{remaining} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },

    /// Text payload is not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A boolean payload byte was neither 0 nor 1.
    #[error("invalid boolean byte {byte:#04x}")]
    InvalidBool {
        /// The byte that was read.
        byte: u8,
    },

    /// The decoded value has a different type than requested.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The requested type name.
        expected: &'static str,
        /// The type name that was decoded.
        found: &'static str,
    },

    /// A value is too large to encode.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }
}
