//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a stream.
    #[error("read beyond end of stream: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current stream size.
        size: u64,
    },

    /// A named stream does not exist in the directory.
    #[error("stream not found: {name}")]
    NotFound {
        /// Name of the missing stream.
        name: String,
    },

    /// The stream contents are corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The stream is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}
