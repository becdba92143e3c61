//! # docsync protocol
//!
//! Wire types for the docsync editor-to-server synchronization protocol.
//!
//! This crate provides:
//! - `StateId`, the opaque token naming a server-side document version
//! - `Payload`, the flat parameter map every request is encoded as
//! - Request descriptors (`AssistRequest`, `UpdateRequest`, `LoadRequest`)
//!   and the `SyncBody` that carries exactly one of full text, delta, or
//!   a bare state check
//! - Response types for the load, update and content-assist services
//! - `TextDelta` and the `DeltaComputer` trait
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod delta;
mod error;
mod messages;
mod payload;

pub use delta::{DeltaComputer, PrefixSuffixDelta, TextDelta};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    AssistEntry, AssistRequest, AssistResponse, EditPosition, LoadRequest, LoadResponse,
    Selection, SyncBody, TextReplacement, UpdateRequest, UpdateResponse,
};
pub use payload::{keys, HttpMethod, Payload, Scalar, ServiceKind, StateId};
