//! Content assist: the synchronization-dependent service.
//!
//! Each call is one logical attempt. Building a request picks, in order:
//!
//! 1. full text, when the caller or a previous conflict forces it;
//! 2. deferral, when the server text is known but an update is in flight;
//! 3. a delta against the known server state;
//! 4. a bare state check (or the configured fallback when the text changed
//!    and no delta is available).
//!
//! A conflict response resends the full text, bounded by a
//! [`RecursionGuard`]. The retry keeps the lane of the attempt that hit the
//! conflict. The caller only ever sees proposals or an error.
//!
//! A caller-forced full-text request (from [`AssistParams::send_full_text`]
//! or the configuration) neither reserves nor waits for the coordinator
//! lane. Several such requests may be in flight together. Each carries the
//! whole text, so none depends on another's resulting state.

use crate::config::DeltaFallback;
use crate::context::EditorContext;
use crate::error::{SyncError, SyncResult};
use crate::handle::{result_channel, ResultHandle, Resolver};
use crate::service::{DocumentService, RecursionGuard, ServiceClient};
use crate::update::{notify_listeners, release, Lane, LaneSlot, UpdateCoordinator};
use docsync_protocol::{
    AssistEntry, AssistRequest, AssistResponse, EditPosition, Selection, ServiceKind, StateId,
    SyncBody, TextReplacement,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Parameters of one content-assist invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistParams {
    /// Content type of the document.
    pub content_type: Option<String>,
    /// Caret offset.
    pub offset: usize,
    /// Current selection.
    pub selection: Option<Selection>,
    /// Send the full text instead of synchronizing incrementally.
    pub send_full_text: bool,
}

impl AssistParams {
    /// Parameters for a caret at `offset` with no selection.
    pub fn at(offset: usize) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }
}

/// A proposal in the shape editor UIs consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Text to insert.
    pub proposal: String,
    /// Text before the caret the proposal replaces.
    pub prefix: String,
    /// Whether the prefix is overwritten.
    pub overwrite: bool,
    /// Display name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Styling hint.
    pub style: Option<String>,
    /// Further edits applied with the proposal.
    pub additional_edits: Vec<TextReplacement>,
    /// Linked positions.
    pub positions: Vec<EditPosition>,
}

impl From<AssistEntry> for Proposal {
    fn from(entry: AssistEntry) -> Self {
        Self {
            proposal: entry.proposal,
            prefix: entry.prefix,
            overwrite: true,
            name: entry.name,
            description: entry.description,
            style: entry.style,
            additional_edits: entry.text_replacements,
            positions: entry.edit_positions,
        }
    }
}

struct AssistAttempt {
    ctx: Arc<dyn EditorContext>,
    params: AssistParams,
    guard: RecursionGuard,
    lane: Option<Lane>,
    resolver: Resolver<Vec<Proposal>>,
}

/// Computes content-assist proposals against the server's view of the
/// document.
#[derive(Clone, Debug)]
pub struct ContentAssistService {
    client: ServiceClient,
    coordinator: Option<Arc<UpdateCoordinator>>,
}

impl ContentAssistService {
    /// Creates a service without update coordination. It never sends deltas.
    pub fn new(client: ServiceClient) -> Self {
        Self {
            client,
            coordinator: None,
        }
    }

    /// Creates a service that sends deltas and serializes through
    /// `coordinator`.
    pub fn with_coordinator(client: ServiceClient, coordinator: Arc<UpdateCoordinator>) -> Self {
        Self {
            client,
            coordinator: Some(coordinator),
        }
    }

    /// Requests proposals for the caret described by `params`.
    pub fn compute_content_assist(
        &self,
        ctx: Arc<dyn EditorContext>,
        params: AssistParams,
    ) -> ResultHandle<Vec<Proposal>> {
        let (resolver, handle) = result_channel();
        self.run(AssistAttempt {
            ctx,
            params,
            guard: RecursionGuard::new(self.client.config().max_conflict_retries),
            lane: None,
            resolver,
        });
        handle
    }

    fn run(&self, mut attempt: AssistAttempt) {
        let current = attempt.ctx.text();
        let mut lane = attempt.lane.take();

        let body = if attempt.params.send_full_text || self.client.config().send_full_text {
            SyncBody::FullText(current.clone())
        } else {
            let known = attempt.ctx.server_state();
            let required = known.state_id;
            match (&self.coordinator, known.text) {
                (Some(coordinator), Some(known_text)) => {
                    if lane.is_none() {
                        match coordinator.reserve() {
                            Some(reserved) => lane = Some(reserved),
                            None => {
                                debug!(
                                    resource = %self.client.config().resource_id,
                                    "content assist deferred until running update completes"
                                );
                                let this = self.clone();
                                coordinator.add_completion_callback(move || this.run(attempt));
                                return;
                            }
                        }
                    }
                    match (coordinator.compute_delta(&known_text, &current), required) {
                        (Some(delta), Some(required_state_id)) => SyncBody::Delta {
                            required_state_id,
                            delta,
                        },
                        (_, required) if known_text == current => SyncBody::Query {
                            required_state_id: required,
                        },
                        (_, required) => self.fallback(required, &current),
                    }
                }
                (None, Some(known_text)) if known_text != current => {
                    self.fallback(required, &current)
                }
                _ => SyncBody::Query {
                    required_state_id: required,
                },
            }
        };

        let updates_state = body.carries_text();
        let request = AssistRequest {
            content_type: attempt.params.content_type.clone(),
            caret_offset: attempt.params.offset,
            selection: attempt.params.selection,
            body,
        };
        debug!(
            method = %request.method(),
            full_text = matches!(request.body, SyncBody::FullText(_)),
            delta = matches!(request.body, SyncBody::Delta { .. }),
            "sending content assist request"
        );

        let slot: LaneSlot = Arc::new(Mutex::new(lane));
        let response_slot = Arc::clone(&slot);
        let this = self.clone();
        let AssistAttempt {
            ctx,
            mut params,
            mut guard,
            resolver,
            ..
        } = attempt;

        self.send_request(
            request.method(),
            request.to_payload(),
            move |result: SyncResult<AssistResponse>| match result {
                Ok(response) if response.conflict => {
                    if guard.try_retry() {
                        warn!(
                            attempt = guard.attempts(),
                            "server lost the document state, resending full text"
                        );
                        params.send_full_text = true;
                        let lane = response_slot.lock().take();
                        this.run(AssistAttempt {
                            ctx,
                            params,
                            guard,
                            lane,
                            resolver,
                        });
                    } else {
                        warn!(attempts = guard.attempts(), "content assist conflict retries exhausted");
                        resolver.resolve(Err(SyncError::ConflictRetriesExhausted {
                            attempts: guard.attempts(),
                        }));
                    }
                }
                Ok(response) => {
                    if updates_state {
                        record_state(&ctx, &response_slot, current, response.state_id.as_ref());
                    }
                    let proposals = response.entries.into_iter().map(Proposal::from).collect();
                    resolver.resolve(Ok(proposals));
                }
                Err(err) => resolver.resolve(Err(err)),
            },
            move || release(&slot),
        );
    }

    fn fallback(&self, required: Option<StateId>, current: &str) -> SyncBody {
        match self.client.config().delta_fallback {
            DeltaFallback::FullText => SyncBody::FullText(current.to_string()),
            DeltaFallback::StateIdOnly => SyncBody::Query {
                required_state_id: required,
            },
        }
    }
}

/// Records the state the server reached by accepting `sent_text`.
fn record_state(
    ctx: &Arc<dyn EditorContext>,
    slot: &LaneSlot,
    sent_text: String,
    state_id: Option<&StateId>,
) {
    let Some(state_id) = state_id else {
        return;
    };
    if ctx.server_state().state_id.as_ref() == Some(state_id) {
        return;
    }
    let listeners = ctx.update_server_state(sent_text, Some(state_id.clone()));
    notify_listeners(slot, listeners);
}

impl DocumentService for ContentAssistService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Assist
    }

    fn client(&self) -> &ServiceClient {
        &self.client
    }
}
