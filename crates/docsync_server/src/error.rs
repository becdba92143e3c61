//! Error types for the document server.

use docsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the document server.
///
/// A state conflict is not an error: it is reported in the response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The delta does not fit the session text.
    #[error("{0}")]
    InvalidDelta(String),

    /// No document with this id.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// No endpoint with this path.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The document exceeds the configured limit.
    #[error("document too large: {len} bytes, limit {max}")]
    DocumentTooLarge {
        /// Document length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Internal(_))
    }

    /// HTTP status for the error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::UnknownResource(_) | ServerError::UnknownService(_) => 404,
            ServerError::DocumentTooLarge { .. } => 413,
            ServerError::Internal(_) => 500,
            ServerError::InvalidRequest(_) | ServerError::InvalidDelta(_) => 400,
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidDelta { .. } => ServerError::InvalidDelta(err.to_string()),
            other => ServerError::InvalidRequest(other.to_string()),
        }
    }
}
