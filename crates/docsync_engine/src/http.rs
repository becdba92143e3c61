//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so any library (or an
//! in-process server) can carry the requests.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{Exchange, ServiceRequest, Transport};
use docsync_protocol::{keys, HttpMethod, Payload};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Content type of POST bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A fully built HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL including the query string.
    pub url: String,
    /// Form-encoded body, for POST.
    pub body: Option<String>,
    /// Time the client may spend on the request.
    pub timeout: Duration,
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Executes a request. `Err` means no response was received.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based transport.
///
/// GET requests carry their parameters in the query string, POST requests
/// as a form body. The resource id always travels in the query string.
/// Requests complete before [`Transport::send`] returns.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the service endpoints.
    base_url: String,
    timeout: Duration,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport for the server in `config`.
    pub fn new(config: &SyncConfig, client: C) -> Self {
        Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Builds the HTTP request for a service request.
    pub fn build_request(&self, request: &ServiceRequest) -> HttpRequest {
        let mut query = Payload::new();
        query.insert(keys::RESOURCE, request.resource_id.as_str());
        let body = match request.method {
            HttpMethod::Get => {
                for (key, value) in request.params.iter() {
                    query.insert(key, value.clone());
                }
                None
            }
            HttpMethod::Post => Some(request.params.to_form()),
        };
        HttpRequest {
            method: request.method,
            url: format!(
                "{}/{}?{}",
                self.base_url,
                request.service.path(),
                query.to_form()
            ),
            body,
            timeout: self.timeout,
        }
    }

    fn round_trip(&self, request: &ServiceRequest) -> SyncResult<Value> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let http = self.build_request(request);
        debug!(method = %http.method, url = %http.url, "http request");
        let response = self.client.execute(&http).map_err(|e| {
            warn!(error = %e, "http request failed");
            *self.last_error.write() = Some(e.clone());
            SyncError::transport(e)
        })?;
        *self.last_error.write() = None;

        if !response.is_success() {
            return Err(SyncError::http(response.status, response.body));
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn send(&self, exchange: Exchange) {
        let outcome = self.round_trip(exchange.request());
        exchange.complete(outcome);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles one request. `path` is the endpoint segment, `query` the raw
    /// query string.
    fn handle_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &str,
        body: Option<&str>,
    ) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// The server requests are routed to.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let (location, query) = request
            .url
            .split_once('?')
            .unwrap_or((request.url.as_str(), ""));
        let path = location.rsplit('/').next().unwrap_or(location);
        Ok(self
            .server
            .handle_request(request.method, path, query, request.body.as_deref()))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::ServiceKind;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    struct TestClient {
        response: Mutex<Option<Result<HttpResponse, String>>>,
        seen: Mutex<Vec<HttpRequest>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: Mutex::new(None),
                seen: Mutex::new(Vec::new()),
                healthy: AtomicBool::new(true),
            }
        }

        fn set_response(&self, response: Result<HttpResponse, String>) {
            *self.response.lock() = Some(response);
        }
    }

    impl HttpClient for &TestClient {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
            self.seen.lock().push(request.clone());
            self.response
                .lock()
                .clone()
                .unwrap_or_else(|| Err("no response set".into()))
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn config() -> SyncConfig {
        SyncConfig::new("http://localhost:8080/docsync/", "my doc.sm")
    }

    fn request(method: HttpMethod) -> ServiceRequest {
        let mut params = Payload::new();
        params.insert(keys::CARET_OFFSET, 3usize);
        ServiceRequest {
            service: ServiceKind::Assist,
            method,
            resource_id: "my doc.sm".into(),
            params,
        }
    }

    fn send(transport: &impl Transport, request: ServiceRequest) -> SyncResult<Value> {
        let outcome = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&outcome);
        transport.send(Exchange::new(request, move |o| *sink.lock() = Some(o)));
        let result = outcome.lock().take();
        result.unwrap_or(Err(SyncError::Cancelled))
    }

    #[test]
    fn get_puts_params_in_query() {
        let client = TestClient::new();
        let transport = HttpTransport::new(&config(), &client);
        let http = transport.build_request(&request(HttpMethod::Get));

        assert_eq!(transport.base_url(), "http://localhost:8080/docsync");
        assert_eq!(
            http.url,
            "http://localhost:8080/docsync/assist?caretOffset=3&resource=my+doc.sm"
        );
        assert_eq!(http.body, None);
        assert_eq!(http.timeout, Duration::from_secs(30));
    }

    #[test]
    fn post_puts_params_in_body() {
        let client = TestClient::new();
        let transport = HttpTransport::new(&config(), &client);
        let http = transport.build_request(&request(HttpMethod::Post));

        assert_eq!(
            http.url,
            "http://localhost:8080/docsync/assist?resource=my+doc.sm"
        );
        assert_eq!(http.body.as_deref(), Some("caretOffset=3"));
    }

    #[test]
    fn decodes_success_body() {
        let client = TestClient::new();
        client.set_response(Ok(HttpResponse::new(200, r#"{"stateId":"s1"}"#)));
        let transport = HttpTransport::new(&config(), &client);

        let body = send(&transport, request(HttpMethod::Get)).unwrap();
        assert_eq!(body, json!({"stateId": "s1"}));
        assert_eq!(client.seen.lock().len(), 1);
    }

    #[test]
    fn error_status_is_transport_error() {
        let client = TestClient::new();
        client.set_response(Ok(HttpResponse::new(400, "missing caretOffset")));
        let transport = HttpTransport::new(&config(), &client);

        assert_eq!(
            send(&transport, request(HttpMethod::Get)),
            Err(SyncError::http(400, "missing caretOffset"))
        );
        // a response arrived, so the connection is still good
        assert!(transport.is_connected());
    }

    #[test]
    fn client_failure_fails_only_that_request() {
        let client = TestClient::new();
        client.set_response(Err("connection reset".into()));
        let transport = HttpTransport::new(&config(), &client);

        assert_eq!(
            send(&transport, request(HttpMethod::Post)),
            Err(SyncError::transport("connection reset"))
        );
        assert_eq!(transport.last_error().as_deref(), Some("connection reset"));
        assert!(transport.is_connected());

        client.set_response(Ok(HttpResponse::new(200, r#"{"stateId":"s2"}"#)));
        assert_eq!(
            send(&transport, request(HttpMethod::Post)),
            Ok(json!({"stateId": "s2"}))
        );
        assert_eq!(transport.last_error(), None);
        assert_eq!(client.seen.lock().len(), 2);
    }

    #[test]
    fn closed_transport_sends_nothing() {
        let client = TestClient::new();
        let transport = HttpTransport::new(&config(), &client);
        transport.close();

        assert_eq!(
            send(&transport, request(HttpMethod::Get)),
            Err(SyncError::NotConnected)
        );
        assert!(client.seen.lock().is_empty());
    }

    #[test]
    fn malformed_body_is_protocol_error() {
        let client = TestClient::new();
        client.set_response(Ok(HttpResponse::new(200, "<html>")));
        let transport = HttpTransport::new(&config(), &client);

        assert!(matches!(
            send(&transport, request(HttpMethod::Get)),
            Err(SyncError::Protocol(_))
        ));
    }

    #[test]
    fn unhealthy_client() {
        let client = TestClient::new();
        client.healthy.store(false, Ordering::SeqCst);
        let transport = HttpTransport::new(&config(), &client);
        assert!(!transport.is_connected());

        let healthy = TestClient::new();
        let transport = HttpTransport::new(&config(), &healthy);
        transport.close();
        assert!(!transport.is_connected());
    }

    #[test]
    fn loopback_splits_url() {
        struct Echo;
        impl LoopbackServer for Echo {
            fn handle_request(
                &self,
                method: HttpMethod,
                path: &str,
                query: &str,
                body: Option<&str>,
            ) -> HttpResponse {
                HttpResponse::new(
                    200,
                    json!({"method": method.as_str(), "path": path, "query": query, "body": body})
                        .to_string(),
                )
            }
        }

        let transport = HttpTransport::new(&config(), LoopbackClient::new(Echo));
        let body = send(&transport, request(HttpMethod::Post)).unwrap();
        assert_eq!(
            body,
            json!({
                "method": "POST",
                "path": "assist",
                "query": "resource=my+doc.sm",
                "body": "caretOffset=3"
            })
        );
    }
}
