//! Error types for the sync engine.

use docsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced to callers of the document services.
///
/// A caller receiving any of these must treat the operation as not having
/// happened: no server-state change is implied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network or HTTP-level failure. Never retried by the engine.
    #[error("transport error{}: {message}", status_suffix(.code))]
    Transport {
        /// HTTP status, if the failure came from a response.
        code: Option<u16>,
        /// Error message.
        message: String,
    },

    /// The response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server kept reporting a state conflict after every allowed retry.
    #[error("server state conflict persisted after {attempts} attempts")]
    ConflictRetriesExhausted {
        /// Number of requests sent for the attempt.
        attempts: u32,
    },

    /// The operation was abandoned before it produced a result.
    #[error("operation cancelled")]
    Cancelled,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Creates a transport error carrying an HTTP status.
    pub fn http(code: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Creates a transport error without a status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            code: None,
            message: message.into(),
        }
    }

    /// Returns true for network-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport { .. } | SyncError::NotConnected)
    }

    /// Returns true if conflict recovery gave up.
    pub fn is_conflict_exhausted(&self) -> bool {
        matches!(self, SyncError::ConflictRetriesExhausted { .. })
    }
}

fn status_suffix(code: &Option<u16>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Protocol(err.to_string())
    }
}
