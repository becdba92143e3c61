//! In-process server wiring shared by the commands.

use super::CliResult;
use docsync_engine::{
    DocumentSession, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer,
    MemoryEditorContext, SyncConfig,
};
use docsync_protocol::HttpMethod;
use docsync_server::{DocumentServer, ServerConfig};
use std::path::Path;
use std::sync::Arc;

struct InProcess {
    server: Arc<DocumentServer>,
}

impl LoopbackServer for InProcess {
    fn handle_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &str,
        body: Option<&str>,
    ) -> HttpResponse {
        let reply = self.server.handle_http(method.as_str(), path, query, body);
        HttpResponse::new(reply.status, reply.body)
    }
}

/// A document served by an in-process server.
pub struct Workspace {
    /// Resource id the document is served under.
    pub resource: String,
    /// The editor side.
    pub ctx: Arc<MemoryEditorContext>,
    /// Services bound to the document.
    pub session: DocumentSession,
}

/// Serves the file at `path` and opens a session on it.
pub fn open(path: &Path, server_config: ServerConfig, full_text: bool) -> CliResult<Workspace> {
    let text = std::fs::read_to_string(path)?;
    let resource = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let server = Arc::new(DocumentServer::new(server_config).with_resource(&resource, text));
    let config = SyncConfig::new("loopback://docsync", &resource).with_full_text(full_text);
    let transport = Arc::new(HttpTransport::new(
        &config,
        LoopbackClient::new(InProcess { server }),
    ));
    let ctx = Arc::new(MemoryEditorContext::default());
    let session = DocumentSession::new(transport, config, ctx.clone());

    Ok(Workspace {
        resource,
        ctx,
        session,
    })
}
