//! Loading a document from the server into the editor.

use crate::context::EditorContext;
use crate::error::SyncResult;
use crate::handle::{result_channel, ResultHandle};
use crate::service::{DocumentService, ServiceClient};
use docsync_protocol::{HttpMethod, LoadRequest, LoadResponse, ServiceKind};
use std::sync::Arc;
use tracing::debug;

/// Fetches a document and installs it as the editor's text.
#[derive(Clone, Debug)]
pub struct LoadResourceService {
    client: ServiceClient,
}

impl LoadResourceService {
    /// Creates the service.
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// Loads the configured resource.
    ///
    /// On success the editor text is replaced, undo history cleared, the
    /// clean flag set from the server's dirty flag, and the server state
    /// recorded before pending listeners run. Failures leave the editor
    /// untouched.
    pub fn load_resource(
        &self,
        ctx: Arc<dyn EditorContext>,
        content_type: Option<String>,
    ) -> ResultHandle<LoadResponse> {
        let (resolver, handle) = result_channel();
        let request = LoadRequest { content_type };
        let resource = self.client.config().resource_id.clone();

        self.send_request(
            HttpMethod::Get,
            request.to_payload(),
            move |result: SyncResult<LoadResponse>| match result {
                Ok(response) => {
                    debug!(%resource, dirty = response.dirty, "document loaded");
                    ctx.set_text(&response.full_text);
                    ctx.clear_undo_stack();
                    ctx.mark_clean(!response.dirty);
                    let listeners = ctx
                        .update_server_state(response.full_text.clone(), response.state_id.clone());
                    for listener in listeners {
                        listener();
                    }
                    resolver.resolve(Ok(response));
                }
                Err(err) => resolver.resolve(Err(err)),
            },
            || {},
        );
        handle
    }
}

impl DocumentService for LoadResourceService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Load
    }

    fn client(&self) -> &ServiceClient {
        &self.client
    }
}
