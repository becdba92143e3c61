//! # docsync Server
//!
//! Reference document server for the docsync protocol.
//!
//! This crate provides:
//! - Load, update and content-assist endpoints
//! - One working session per resource, identified by a state id
//! - Delta application with state checks (conflicts instead of guesses)
//! - Keyword and identifier proposals
//!
//! # Architecture
//!
//! Persisted documents live in a [`ResourceStore`]. Loading a resource
//! copies it into a session with a fresh state id; every accepted change
//! replaces the session text and issues a new id. Requests naming a state
//! id the session no longer holds get a conflict response, which tells the
//! client to resend its full text.
//!
//! # Protocol
//!
//! - `GET load?resource=..` returns `fullText`, `dirty` and `stateId`
//! - `POST update?resource=..` with `fullText`, or `requiredStateId` plus
//!   `deltaText`/`deltaOffset`/`deltaReplaceLength`, returns `stateId`
//! - `GET|POST assist?resource=..&caretOffset=..` synchronizes the same way
//!   and returns `stateId` and `entries`

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::{ServerConfig, DEFAULT_KEYWORDS};
pub use error::{ServerError, ServerResult};
pub use handler::{DocumentSession, HandlerContext, RequestHandler, Synced};
pub use server::{DocumentServer, HttpReply};
pub use store::{ResourceStore, StoredResource};
