//! # docsync Engine
//!
//! Client side of the docsync editor/server protocol.
//!
//! This crate provides:
//! - Server-state tracking per document (last confirmed text + state id)
//! - Delta synchronization with full-text fallback
//! - Conflict recovery with a bounded number of full-text resends
//! - An update coordinator keeping one update round-trip in flight
//! - Load, update and content-assist services
//! - HTTP transport abstraction
//!
//! ## Architecture
//!
//! Every service composes a [`ServiceClient`] (transport + config). Requests
//! that depend on the server holding the current text go through the
//! [`UpdateCoordinator`]: while an update is on the wire, later callers
//! park a continuation and rebuild their request once it completes, against
//! the then-current server state.
//!
//! ## Key Invariants
//!
//! - A request carries a full text or a delta, never both
//! - A delta is only sent with the state id it applies to
//! - Server text and state id change together
//! - Server-state listeners run before parked continuations
//! - Transport failures are never retried

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod content_assist;
mod context;
mod error;
mod handle;
mod http;
mod load;
mod service;
mod session;
mod transport;
mod update;

pub use config::{DeltaFallback, SyncConfig};
pub use content_assist::{AssistParams, ContentAssistService, Proposal};
pub use context::{EditorContext, MemoryEditorContext, ServerState, ServerStateTracker};
pub use error::{SyncError, SyncResult};
pub use handle::{result_channel, ResultHandle, Resolver};
pub use http::{
    HttpClient, HttpRequest, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer,
    FORM_CONTENT_TYPE,
};
pub use load::LoadResourceService;
pub use service::{DocumentService, RecursionGuard, ServiceClient};
pub use session::DocumentSession;
pub use transport::{Callback, Exchange, QueuedTransport, ServiceRequest, Transport};
pub use update::{Lane, UpdateCoordinator, UpdateService};
