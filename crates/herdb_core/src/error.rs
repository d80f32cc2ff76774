//! Error types for herdb core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in herdb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] herdb_storage::StorageError),

    /// Typed value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] herdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The overflow pool of an index is exhausted.
    ///
    /// Handled inside the segment by resizing; only escapes if it is
    /// returned from a table that can no longer grow.
    #[error("index full: all {capacity} overflow slots are in use")]
    IndexFull {
        /// Number of primary buckets in the full index.
        capacity: u32,
    },

    /// Doubling the index would exceed the configured maximum.
    #[error("index capacity {requested} exceeds maximum {max}")]
    CapacityExceeded {
        /// The capacity a resize would need.
        requested: u64,
        /// The configured maximum.
        max: u32,
    },

    /// A record in a data log is truncated or inconsistent.
    #[error("malformed record at offset {offset}: {message}")]
    MalformedRecord {
        /// Offset of the record's length prefix.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// A record start would not fit in a 5-byte offset.
    #[error("data log offset {offset} exceeds the 40-bit limit")]
    OffsetOverflow {
        /// The offending offset.
        offset: u64,
    },

    /// A key/value pair is larger than the configured limit.
    #[error("record of {size} bytes exceeds maximum {max}")]
    RecordTooLarge {
        /// Encoded record size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Keys must contain at least one byte.
    #[error("key must not be empty")]
    EmptyKey,

    /// The segment has been committed and no longer accepts operations.
    #[error("segment {name} is closed")]
    SegmentClosed {
        /// File stem of the segment.
        name: String,
    },

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// Persisted files do not have the expected layout.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Store configuration could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates a malformed record error.
    pub fn malformed(offset: u64, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a segment closed error.
    pub fn segment_closed(name: impl Into<String>) -> Self {
        Self::SegmentClosed { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::malformed(40, "truncated key");
        assert_eq!(
            err.to_string(),
            "malformed record at offset 40: truncated key"
        );

        let err = CoreError::CapacityExceeded {
            requested: 16,
            max: 8,
        };
        assert!(err.to_string().contains("exceeds maximum 8"));
    }

    #[test]
    fn storage_error_converts() {
        let err: CoreError = herdb_storage::StorageError::not_found("segment0.data").into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
