//! CLI command implementations.

pub mod assist;
pub mod load;
mod loopback;

use docsync_engine::{ResultHandle, SyncError};
use thiserror::Error;

/// Errors reported by the commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading the document failed.
    #[error("cannot read document: {0}")]
    Io(#[from] std::io::Error),

    /// A request failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Output encoding failed.
    #[error("cannot encode output: {0}")]
    Json(#[from] serde_json::Error),

    /// The offset does not point into the document.
    #[error("offset {offset} is not a character position in a document of {len} bytes")]
    InvalidOffset {
        /// Requested offset.
        offset: usize,
        /// Document length.
        len: usize,
    },

    /// A request did not complete.
    #[error("request did not complete")]
    Pending,
}

/// Result type for the commands.
pub type CliResult<T> = Result<T, CliError>;

/// Takes the result of a request issued over the in-process transport,
/// which completes before returning.
fn finish<T>(mut handle: ResultHandle<T>) -> CliResult<T> {
    Ok(handle.try_result().ok_or(CliError::Pending)??)
}
