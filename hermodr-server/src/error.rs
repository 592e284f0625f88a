//! Server error types.

use crate::collaborator::CollaboratorError;
use hermodr_protocol::PayloadError;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that stop the server as a whole.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`Listener::accept`](crate::Listener::accept).
#[derive(Debug, Error)]
pub enum AcceptError {
    /// The listener was stopped; no further connections will be accepted.
    #[error("listener stopped")]
    Stopped,

    /// A single accept failed. The listener stays usable.
    #[error("accept failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Request-level failures. Each one becomes an error response and the
/// connection keeps serving.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("bad request payload: {0}")]
    BadRequest(#[source] PayloadError),

    #[error("failed to encode response: {0}")]
    Encode(#[source] PayloadError),

    /// The handler task panicked or was cancelled.
    #[error("request aborted: {0}")]
    Aborted(String),
}

impl HandlerError {
    /// Short classification used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Collaborator(CollaboratorError::Unavailable(_)) => "unavailable",
            HandlerError::Collaborator(CollaboratorError::Rejected(_)) => "rejected",
            HandlerError::BadRequest(_) => "bad_request",
            HandlerError::Encode(_) => "encode",
            HandlerError::Aborted(_) => "aborted",
        }
    }
}
