//! All services of one document, wired to a shared coordinator.

use crate::config::SyncConfig;
use crate::content_assist::{AssistParams, ContentAssistService, Proposal};
use crate::context::EditorContext;
use crate::handle::ResultHandle;
use crate::load::LoadResourceService;
use crate::service::ServiceClient;
use crate::transport::Transport;
use crate::update::{UpdateCoordinator, UpdateService};
use docsync_protocol::{LoadResponse, StateId};
use std::sync::Arc;

/// The services an editor uses for one document.
#[derive(Clone)]
pub struct DocumentSession {
    ctx: Arc<dyn EditorContext>,
    coordinator: Arc<UpdateCoordinator>,
    load: LoadResourceService,
    update: UpdateService,
    assist: ContentAssistService,
}

impl DocumentSession {
    /// Creates the services for the document in `ctx`.
    pub fn new(transport: Arc<dyn Transport>, config: SyncConfig, ctx: Arc<dyn EditorContext>) -> Self {
        Self::with_coordinator(transport, config, ctx, Arc::new(UpdateCoordinator::new()))
    }

    /// Creates the services around an existing coordinator.
    pub fn with_coordinator(
        transport: Arc<dyn Transport>,
        config: SyncConfig,
        ctx: Arc<dyn EditorContext>,
        coordinator: Arc<UpdateCoordinator>,
    ) -> Self {
        let client = ServiceClient::new(transport, config);
        Self {
            ctx,
            load: LoadResourceService::new(client.clone()),
            update: UpdateService::new(client.clone(), Arc::clone(&coordinator)),
            assist: ContentAssistService::with_coordinator(client, Arc::clone(&coordinator)),
            coordinator,
        }
    }

    /// The editor context.
    pub fn context(&self) -> &Arc<dyn EditorContext> {
        &self.ctx
    }

    /// The shared coordinator.
    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    /// See [`LoadResourceService::load_resource`].
    pub fn load(&self, content_type: Option<String>) -> ResultHandle<LoadResponse> {
        self.load.load_resource(Arc::clone(&self.ctx), content_type)
    }

    /// See [`UpdateService::update`].
    pub fn update(&self) -> ResultHandle<Option<StateId>> {
        self.update.update(Arc::clone(&self.ctx))
    }

    /// See [`ContentAssistService::compute_content_assist`].
    pub fn content_assist(&self, params: AssistParams) -> ResultHandle<Vec<Proposal>> {
        self.assist
            .compute_content_assist(Arc::clone(&self.ctx), params)
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("server_state", &self.ctx.server_state())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
