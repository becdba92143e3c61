//! Shared plumbing for the document services.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::transport::{Exchange, ServiceRequest, Transport};
use docsync_protocol::{HttpMethod, Payload, ServiceKind};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::trace;

/// Transport helper shared by every service of one document.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    config: Arc<SyncConfig>,
}

impl ServiceClient {
    /// Creates a client.
    pub fn new(transport: Arc<dyn Transport>, config: SyncConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Sends a request and decodes the response body as `R`.
    ///
    /// `on_response` runs exactly once if the transport completes the
    /// exchange, followed by `on_finally`.
    pub fn send<R, F>(
        &self,
        service: ServiceKind,
        method: HttpMethod,
        params: Payload,
        on_response: F,
        on_finally: impl FnOnce() + Send + 'static,
    ) where
        R: DeserializeOwned,
        F: FnOnce(SyncResult<R>) + Send + 'static,
    {
        let request = ServiceRequest {
            service,
            method,
            resource_id: self.config.resource_id.clone(),
            params,
        };
        trace!(%service, %method, params = request.params.len(), "sending request");

        let exchange = Exchange::new(request, move |outcome| {
            on_response(outcome.and_then(|body| Ok(serde_json::from_value(body)?)))
        })
        .with_finally(on_finally);
        self.transport.send(exchange);
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("config", &self.config)
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}

/// A document service: one endpoint, one domain operation.
///
/// Services are distinct types composed around a shared [`ServiceClient`].
pub trait DocumentService {
    /// The endpoint this service talks to.
    fn kind(&self) -> ServiceKind;

    /// The shared transport helper.
    fn client(&self) -> &ServiceClient;

    /// Sends a request to this service's endpoint.
    fn send_request<R, F>(
        &self,
        method: HttpMethod,
        params: Payload,
        on_response: F,
        on_finally: impl FnOnce() + Send + 'static,
    ) where
        Self: Sized,
        R: DeserializeOwned,
        F: FnOnce(SyncResult<R>) + Send + 'static,
    {
        self.client()
            .send(self.kind(), method, params, on_response, on_finally);
    }
}

/// Bounds conflict-triggered retries of one logical attempt.
///
/// Created when a top-level attempt starts and carried through its
/// retries; it dies with the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionGuard {
    retries: u32,
    bound: u32,
}

impl RecursionGuard {
    /// A guard allowing `bound` retries.
    pub fn new(bound: u32) -> Self {
        Self { retries: 0, bound }
    }

    /// Counts one more retry. Returns false once the bound is reached.
    pub fn try_retry(&mut self) -> bool {
        if self.retries >= self.bound {
            return false;
        }
        self.retries += 1;
        true
    }

    /// Requests sent so far, including the first.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::transport::QueuedTransport;
    use docsync_protocol::{keys, LoadResponse};
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn guard_allows_bound_retries() {
        let mut guard = RecursionGuard::new(2);
        assert_eq!(guard.attempts(), 1);
        assert!(guard.try_retry());
        assert!(guard.try_retry());
        assert!(!guard.try_retry());
        assert_eq!(guard.attempts(), 3);

        let mut none = RecursionGuard::new(0);
        assert!(!none.try_retry());
        assert_eq!(none.attempts(), 1);
    }

    #[test]
    fn send_tags_resource_and_decodes() {
        let transport = Arc::new(QueuedTransport::new());
        let client = ServiceClient::new(
            transport.clone(),
            SyncConfig::new("http://localhost", "doc.sm"),
        );
        let received = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&received);

        let mut params = Payload::new();
        params.insert(keys::CONTENT_TYPE, "sm");
        client.send(
            ServiceKind::Load,
            HttpMethod::Get,
            params,
            move |result: SyncResult<LoadResponse>| *sink.lock() = Some(result),
            || {},
        );

        let request = transport.last_request().unwrap();
        assert_eq!(request.resource_id, "doc.sm");
        assert_eq!(request.service, ServiceKind::Load);

        transport.respond(json!({"fullText": "x", "stateId": "s0"}));
        let result = received.lock().take().unwrap().unwrap();
        assert_eq!(result.full_text, "x");
    }

    #[test]
    fn undecodable_body_is_protocol_error() {
        let transport = Arc::new(QueuedTransport::new());
        let client = ServiceClient::new(transport.clone(), SyncConfig::default());
        let received = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&received);

        client.send(
            ServiceKind::Load,
            HttpMethod::Get,
            Payload::new(),
            move |result: SyncResult<LoadResponse>| *sink.lock() = Some(result),
            || {},
        );
        transport.respond(json!({"dirty": "maybe"}));

        assert!(matches!(
            received.lock().take(),
            Some(Err(SyncError::Protocol(_)))
        ));
    }
}
