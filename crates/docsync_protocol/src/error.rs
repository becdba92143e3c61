//! Error types for protocol encoding and delta application.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding payloads or applying deltas.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A delta does not fit the text it is applied to.
    #[error("invalid delta: offset {offset} + replace length {replace_length} exceeds text length {text_len} or splits a character")]
    InvalidDelta {
        /// Delta offset.
        offset: usize,
        /// Number of replaced bytes.
        replace_length: usize,
        /// Length of the text the delta was applied to.
        text_len: usize,
    },

    /// A required parameter is missing.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A parameter is present but cannot be interpreted.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Parameter name.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// A request carries both full text and a delta.
    #[error("request carries both fullText and deltaText")]
    AmbiguousBody,
}
