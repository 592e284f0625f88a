//! Client error types.

use hermodr_protocol::{PayloadError, ProtocolError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid response payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    /// The server answered with an error frame.
    #[error("server error: {message}")]
    ServerError { message: String },

    #[error("unexpected response op {actual} (expected {expected})")]
    UnexpectedOp { expected: i32, actual: i32 },
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout | ClientError::ConnectionClosed
        )
    }
}
