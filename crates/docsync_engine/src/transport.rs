//! Transport adapter abstraction.

use crate::error::{SyncError, SyncResult};
use docsync_protocol::{HttpMethod, Payload, ServiceKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A deferred piece of work.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

type ResponseHandler = Box<dyn FnOnce(SyncResult<Value>) + Send + 'static>;

/// A request addressed to one service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    /// Target endpoint.
    pub service: ServiceKind,
    /// Method.
    pub method: HttpMethod,
    /// Document the request is about.
    pub resource_id: String,
    /// Parameters, excluding the resource id.
    pub params: Payload,
}

/// One request/response round-trip handed to a transport.
///
/// The transport must eventually call [`Exchange::complete`] exactly once,
/// which runs the response handler with the success body or the error,
/// followed by the finally hook.
/// Dropping an exchange without completing it drops its handlers; the
/// services treat that as cancellation.
pub struct Exchange {
    request: ServiceRequest,
    on_response: ResponseHandler,
    on_finally: Option<Callback>,
}

impl Exchange {
    /// Creates an exchange.
    pub fn new(
        request: ServiceRequest,
        on_response: impl FnOnce(SyncResult<Value>) + Send + 'static,
    ) -> Self {
        Self {
            request,
            on_response: Box::new(on_response),
            on_finally: None,
        }
    }

    /// Sets the hook run after the response handler, whatever the outcome.
    pub fn with_finally(mut self, on_finally: impl FnOnce() + Send + 'static) -> Self {
        self.on_finally = Some(Box::new(on_finally));
        self
    }

    /// The request to send.
    pub fn request(&self) -> &ServiceRequest {
        &self.request
    }

    /// Delivers the outcome of the round-trip.
    pub fn complete(self, outcome: SyncResult<Value>) {
        let Exchange {
            on_response,
            on_finally,
            ..
        } = self;
        on_response(outcome);
        if let Some(on_finally) = on_finally {
            on_finally();
        }
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("request", &self.request)
            .field("has_finally", &self.on_finally.is_some())
            .finish_non_exhaustive()
    }
}

/// A transport carries exchanges to the server.
///
/// Implementations may complete an exchange before `send` returns or at any
/// later point.
pub trait Transport: Send + Sync {
    /// Issues the request.
    fn send(&self, exchange: Exchange);

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport.
    fn close(&self);
}

/// A transport that holds exchanges until the test completes them.
///
/// Lets tests interleave round-trips deterministically.
#[derive(Debug)]
pub struct QueuedTransport {
    connected: AtomicBool,
    pending: Mutex<VecDeque<Exchange>>,
    sent: Mutex<Vec<ServiceRequest>>,
}

impl QueuedTransport {
    /// Creates a connected transport with nothing pending.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            pending: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Number of exchanges waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Every request sent so far, in order.
    pub fn sent_requests(&self) -> Vec<ServiceRequest> {
        self.sent.lock().clone()
    }

    /// The most recently sent request.
    pub fn last_request(&self) -> Option<ServiceRequest> {
        self.sent.lock().last().cloned()
    }

    /// Completes the oldest pending exchange with a response body.
    ///
    /// Returns the request that was answered.
    pub fn respond(&self, body: Value) -> Option<ServiceRequest> {
        self.complete_next(Ok(body))
    }

    /// Fails the oldest pending exchange.
    pub fn fail(&self, code: u16, message: &str) -> Option<ServiceRequest> {
        self.complete_next(Err(SyncError::http(code, message)))
    }

    /// Drops the oldest pending exchange without completing it.
    pub fn discard(&self) -> Option<ServiceRequest> {
        let exchange = self.pending.lock().pop_front()?;
        Some(exchange.request().clone())
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn complete_next(&self, outcome: SyncResult<Value>) -> Option<ServiceRequest> {
        let exchange = self.pending.lock().pop_front()?;
        let request = exchange.request().clone();
        exchange.complete(outcome);
        Some(request)
    }
}

impl Default for QueuedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for QueuedTransport {
    fn send(&self, exchange: Exchange) {
        if !self.is_connected() {
            exchange.complete(Err(SyncError::NotConnected));
            return;
        }
        self.sent.lock().push(exchange.request().clone());
        self.pending.lock().push_back(exchange);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
