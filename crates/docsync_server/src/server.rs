//! Main document server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{DocumentSession, HandlerContext, RequestHandler};
use crate::store::ResourceStore;
use docsync_protocol::{keys, HttpMethod, Payload, ServiceKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// A response in HTTP terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// JSON body on success, error message otherwise.
    pub body: String,
}

/// The document server.
///
/// Holds one working session per resource and answers load, update and
/// content-assist requests against it.
///
/// # Example
///
/// ```
/// use docsync_server::{DocumentServer, ServerConfig};
///
/// let server = DocumentServer::new(ServerConfig::default())
///     .with_resource("machine.sm", "state idle end");
///
/// // In a real application, you would expose HTTP endpoints
/// // that call server.handle_http()
/// let reply = server.handle_http("GET", "load", "resource=machine.sm", None);
/// assert_eq!(reply.status, 200);
/// ```
pub struct DocumentServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl DocumentServer {
    /// Creates a server with an empty store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(ResourceStore::new()))
    }

    /// Creates a server over an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<ResourceStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Adds a document to the store.
    pub fn with_resource(self, resource: impl Into<String>, text: impl Into<String>) -> Self {
        self.context.store.insert(resource, text);
        self
    }

    /// The persisted documents.
    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.context.store
    }

    /// Handles a decoded request.
    pub fn handle(
        &self,
        service: ServiceKind,
        method: HttpMethod,
        resource: &str,
        params: &Payload,
    ) -> ServerResult<Value> {
        self.handler.handle(service, method, resource, params)
    }

    /// Handles a raw request: `path` names the endpoint, parameters come
    /// from the query string and, for POST, the form body.
    pub fn handle_http(
        &self,
        method: &str,
        path: &str,
        query: &str,
        body: Option<&str>,
    ) -> HttpReply {
        match self.dispatch(method, path, query, body) {
            Ok(value) => HttpReply {
                status: 200,
                body: value.to_string(),
            },
            Err(err) => {
                warn!(path, error = %err, "request failed");
                HttpReply {
                    status: err.status_code(),
                    body: err.to_string(),
                }
            }
        }
    }

    fn dispatch(
        &self,
        method: &str,
        path: &str,
        query: &str,
        body: Option<&str>,
    ) -> ServerResult<Value> {
        let method = match method.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            other => {
                return Err(ServerError::InvalidRequest(format!(
                    "unsupported method: {other}"
                )))
            }
        };
        let service = ServiceKind::from_path(path)
            .ok_or_else(|| ServerError::UnknownService(path.to_string()))?;

        let mut params = Payload::from_form(query);
        if let Some(body) = body {
            for (key, value) in Payload::from_form(body).iter() {
                params.insert(key, value.clone());
            }
        }
        let resource = params
            .text(keys::RESOURCE)
            .ok_or_else(|| ServerError::InvalidRequest("missing field: resource".into()))?;

        self.handle(service, method, &resource, &params)
    }

    /// Returns a copy of the session of `resource`.
    pub fn session(&self, resource: &str) -> Option<DocumentSession> {
        self.context.session(resource)
    }

    /// Drops every session, as a server restart would.
    pub fn evict_sessions(&self) -> usize {
        self.context.evict_sessions()
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.context.session_count()
    }
}
