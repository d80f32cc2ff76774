//! Error types for the herdb server and client.

use herdb_core::CoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server or client.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed request or response body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A frame exceeded the configured limit.
    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Declared frame size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The token was rejected, or a command was sent before authenticating.
    #[error("not authorized")]
    Unauthorized,

    /// The server answered with an error message.
    #[error("server error: {0}")]
    Remote(String),

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns true if the error was caused by what the client sent.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::FrameTooLarge { .. }
                | ServerError::Unauthorized
        )
    }
}
