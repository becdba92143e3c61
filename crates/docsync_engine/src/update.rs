//! Update coordination and the update service.
//!
//! At most one update-bearing round-trip per document is in flight. Callers
//! arriving while it runs park a continuation with the
//! [`UpdateCoordinator`] and are replayed, in arrival order, once it
//! completes.

use crate::context::EditorContext;
use crate::error::SyncError;
use crate::handle::{result_channel, ResultHandle, Resolver};
use crate::service::{DocumentService, RecursionGuard, ServiceClient};
use crate::transport::Callback;
use docsync_protocol::{
    DeltaComputer, PrefixSuffixDelta, ServiceKind, StateId, SyncBody, TextDelta, UpdateRequest,
    UpdateResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
struct LaneState {
    busy: bool,
    listeners: Vec<Callback>,
    queued: VecDeque<Callback>,
}

/// Serializes update round-trips for one document.
pub struct UpdateCoordinator {
    state: Mutex<LaneState>,
    delta: Box<dyn DeltaComputer>,
}

impl UpdateCoordinator {
    /// Creates an idle coordinator using [`PrefixSuffixDelta`].
    pub fn new() -> Self {
        Self::with_delta_computer(PrefixSuffixDelta)
    }

    /// Creates an idle coordinator with a custom delta computer.
    pub fn with_delta_computer(delta: impl DeltaComputer + 'static) -> Self {
        Self {
            state: Mutex::new(LaneState::default()),
            delta: Box::new(delta),
        }
    }

    /// Reports whether an update is in flight. If not and `mark_busy` is
    /// set, the caller now owns the lane and must call
    /// [`on_complete`](Self::on_complete) when its round-trip finishes.
    pub fn check_running_update(&self, mark_busy: bool) -> bool {
        let mut state = self.state.lock();
        if state.busy {
            return true;
        }
        if mark_busy {
            state.busy = true;
        }
        false
    }

    /// Returns true if an update is in flight.
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Parks a continuation until the running update completes.
    pub fn add_completion_callback(&self, callback: impl FnOnce() + Send + 'static) {
        self.state.lock().queued.push_back(Box::new(callback));
    }

    /// Number of parked continuations.
    pub fn queued_count(&self) -> usize {
        self.state.lock().queued.len()
    }

    /// Frees the lane and runs server-state listeners, then parked
    /// continuations, in the order they were added.
    pub fn on_complete(&self) {
        let (listeners, queued) = {
            let mut state = self.state.lock();
            state.busy = false;
            (
                std::mem::take(&mut state.listeners),
                std::mem::take(&mut state.queued),
            )
        };
        for callback in listeners.into_iter().chain(queued) {
            callback();
        }
    }

    /// Computes a delta with the configured computer.
    pub fn compute_delta(&self, old: &str, new: &str) -> Option<TextDelta> {
        self.delta.compute(old, new)
    }

    /// Takes the lane if it is free.
    pub fn reserve(self: &Arc<Self>) -> Option<Lane> {
        if self.check_running_update(true) {
            None
        } else {
            Some(Lane {
                coordinator: Arc::clone(self),
            })
        }
    }
}

impl Default for UpdateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("UpdateCoordinator")
            .field("busy", &state.busy)
            .field("listeners", &state.listeners.len())
            .field("queued", &state.queued.len())
            .finish()
    }
}

/// Ownership of the update lane.
///
/// Dropping it completes the round-trip: the lane is freed and waiting
/// callbacks run. It can move from a conflicting attempt to its retry, so
/// the whole logical attempt holds the lane once.
pub struct Lane {
    coordinator: Arc<UpdateCoordinator>,
}

impl Lane {
    /// Queues server-state listeners to run ahead of parked continuations.
    pub fn add_listeners(&self, listeners: Vec<Callback>) {
        self.coordinator.state.lock().listeners.extend(listeners);
    }
}

impl Drop for Lane {
    fn drop(&mut self) {
        self.coordinator.on_complete();
    }
}

impl std::fmt::Debug for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Lane")
    }
}

/// Slot the lane sits in while a request is on the wire. The finally hook
/// empties it; a conflict retry takes the lane out first.
pub(crate) type LaneSlot = Arc<Mutex<Option<Lane>>>;

/// Hands listeners to the lane if the request holds one, or runs them now.
pub(crate) fn notify_listeners(slot: &LaneSlot, listeners: Vec<Callback>) {
    let pending = match slot.lock().as_ref() {
        Some(lane) => {
            lane.add_listeners(listeners);
            Vec::new()
        }
        None => listeners,
    };
    for listener in pending {
        listener();
    }
}

pub(crate) fn release(slot: &LaneSlot) {
    let lane = slot.lock().take();
    drop(lane);
}

struct UpdateAttempt {
    ctx: Arc<dyn EditorContext>,
    guard: RecursionGuard,
    full_text: bool,
    lane: Option<Lane>,
    resolver: Resolver<Option<StateId>>,
}

/// Pushes the editor text to the server without computing anything.
#[derive(Clone, Debug)]
pub struct UpdateService {
    client: ServiceClient,
    coordinator: Arc<UpdateCoordinator>,
}

impl UpdateService {
    /// Creates the service.
    pub fn new(client: ServiceClient, coordinator: Arc<UpdateCoordinator>) -> Self {
        Self {
            client,
            coordinator,
        }
    }

    /// The coordinator this service serializes through.
    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    /// Brings the server up to date with the editor text.
    ///
    /// Resolves with the resulting state id. Nothing is sent if the server
    /// already holds the current text.
    pub fn update(&self, ctx: Arc<dyn EditorContext>) -> ResultHandle<Option<StateId>> {
        let (resolver, handle) = result_channel();
        self.run(UpdateAttempt {
            ctx,
            guard: RecursionGuard::new(self.client.config().max_conflict_retries),
            full_text: self.client.config().send_full_text,
            lane: None,
            resolver,
        });
        handle
    }

    fn run(&self, mut attempt: UpdateAttempt) {
        let lane = match attempt.lane.take() {
            Some(lane) => lane,
            None => match self.coordinator.reserve() {
                Some(lane) => lane,
                None => {
                    debug!(resource = %self.client.config().resource_id, "update deferred");
                    let this = self.clone();
                    self.coordinator
                        .add_completion_callback(move || this.run(attempt));
                    return;
                }
            },
        };

        let current = attempt.ctx.text();
        let known = attempt.ctx.server_state();
        let body = match (attempt.full_text, known.text, known.state_id) {
            (false, Some(text), Some(state_id)) => {
                match self.coordinator.compute_delta(&text, &current) {
                    Some(delta) => SyncBody::Delta {
                        required_state_id: state_id,
                        delta,
                    },
                    None if text == current => {
                        attempt.resolver.resolve(Ok(Some(state_id)));
                        drop(lane);
                        return;
                    }
                    None => SyncBody::FullText(current.clone()),
                }
            }
            _ => SyncBody::FullText(current.clone()),
        };

        let request = UpdateRequest { body };
        let slot: LaneSlot = Arc::new(Mutex::new(Some(lane)));
        let response_slot = Arc::clone(&slot);
        let this = self.clone();
        let UpdateAttempt {
            ctx,
            mut guard,
            resolver,
            ..
        } = attempt;

        self.send_request(
            request.body.method(),
            request.to_payload(),
            move |result: Result<UpdateResponse, SyncError>| match result {
                Ok(response) if response.conflict => {
                    if guard.try_retry() {
                        warn!(attempt = guard.attempts(), "update conflict, resending full text");
                        let lane = response_slot.lock().take();
                        this.run(UpdateAttempt {
                            ctx,
                            guard,
                            full_text: true,
                            lane,
                            resolver,
                        });
                    } else {
                        warn!(attempts = guard.attempts(), "update conflict retries exhausted");
                        resolver.resolve(Err(SyncError::ConflictRetriesExhausted {
                            attempts: guard.attempts(),
                        }));
                    }
                }
                Ok(UpdateResponse {
                    state_id: Some(state_id),
                    ..
                }) => {
                    let listeners = ctx.update_server_state(current, Some(state_id.clone()));
                    notify_listeners(&response_slot, listeners);
                    resolver.resolve(Ok(Some(state_id)));
                }
                Ok(_) => {
                    warn!("update accepted without a state id");
                    resolver.resolve(Err(SyncError::Protocol(
                        "update response carries no stateId".into(),
                    )));
                }
                Err(err) => resolver.resolve(Err(err)),
            },
            move || release(&slot),
        );
    }
}

impl DocumentService for UpdateService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Update
    }

    fn client(&self) -> &ServiceClient {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::context::{MemoryEditorContext, ServerState};
    use crate::transport::QueuedTransport;
    use docsync_protocol::{keys, HttpMethod};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl FnOnce() + Send {
        let log = Arc::clone(log);
        move || log.lock().push(tag)
    }

    #[test]
    fn check_running_update_reserves_once() {
        let coordinator = UpdateCoordinator::new();
        assert!(!coordinator.check_running_update(false));
        assert!(!coordinator.is_busy());

        assert!(!coordinator.check_running_update(true));
        assert!(coordinator.is_busy());
        assert!(coordinator.check_running_update(true));

        coordinator.on_complete();
        assert!(!coordinator.is_busy());
    }

    #[test]
    fn completion_runs_callbacks_in_fifo_order() {
        let coordinator = UpdateCoordinator::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        coordinator.check_running_update(true);
        coordinator.add_completion_callback(recorder(&log, "first"));
        coordinator.add_completion_callback(recorder(&log, "second"));
        coordinator.add_completion_callback(recorder(&log, "third"));
        assert_eq!(coordinator.queued_count(), 3);

        coordinator.on_complete();
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert_eq!(coordinator.queued_count(), 0);

        coordinator.on_complete();
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn lane_listeners_run_before_queued_continuations() {
        let coordinator = Arc::new(UpdateCoordinator::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let lane = coordinator.reserve().unwrap();
        assert!(coordinator.reserve().is_none());

        coordinator.add_completion_callback(recorder(&log, "continuation"));
        let listener: Callback = Box::new(recorder(&log, "listener"));
        lane.add_listeners(vec![listener]);
        drop(lane);

        assert_eq!(*log.lock(), vec!["listener", "continuation"]);
        assert!(!coordinator.is_busy());
    }

    #[test]
    fn continuation_can_take_the_lane_again() {
        let coordinator = Arc::new(UpdateCoordinator::new());
        let held = Arc::new(Mutex::new(None));
        let second_ran = Arc::new(AtomicUsize::new(0));
        let lane = coordinator.reserve().unwrap();

        let (first_coordinator, first_held) = (Arc::clone(&coordinator), Arc::clone(&held));
        coordinator.add_completion_callback(move || {
            *first_held.lock() = first_coordinator.reserve();
        });
        let (second_coordinator, second_counter) =
            (Arc::clone(&coordinator), Arc::clone(&second_ran));
        coordinator.add_completion_callback(move || {
            // the first continuation already took the lane again
            assert!(second_coordinator.check_running_update(false));
            second_counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(lane);
        assert_eq!(second_ran.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_busy());

        let relocked = held.lock().take();
        assert!(relocked.is_some());
        drop(relocked);
        assert!(!coordinator.is_busy());
    }

    fn service(transport: &Arc<QueuedTransport>) -> UpdateService {
        let client = ServiceClient::new(transport.clone(), SyncConfig::new("http://localhost", "doc"));
        UpdateService::new(client, Arc::new(UpdateCoordinator::new()))
    }

    #[test]
    fn first_update_sends_full_text() {
        let transport = Arc::new(QueuedTransport::new());
        let service = service(&transport);
        let ctx = Arc::new(MemoryEditorContext::new("hello"));

        let mut handle = service.update(ctx.clone());
        let request = transport.last_request().unwrap();
        assert_eq!(request.service, ServiceKind::Update);
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.params.text(keys::FULL_TEXT).as_deref(), Some("hello"));
        assert!(service.coordinator().is_busy());

        transport.respond(json!({"stateId": "s0"}));
        assert_eq!(handle.try_result(), Some(Ok(Some(StateId::new("s0")))));
        assert_eq!(ctx.server_state().text.as_deref(), Some("hello"));
        assert!(!service.coordinator().is_busy());
    }

    #[test]
    fn update_sends_delta_against_known_state() {
        let transport = Arc::new(QueuedTransport::new());
        let service = service(&transport);
        let ctx = Arc::new(MemoryEditorContext::new("hello world"));
        ctx.update_server_state("hello".into(), Some(StateId::new("s0")));

        let _handle = service.update(ctx.clone());
        let params = transport.last_request().unwrap().params;
        assert_eq!(params.text(keys::REQUIRED_STATE_ID).as_deref(), Some("s0"));
        assert_eq!(params.text(keys::DELTA_TEXT).as_deref(), Some(" world"));
        assert!(!params.contains(keys::FULL_TEXT));
    }

    #[test]
    fn unchanged_text_sends_nothing() {
        let transport = Arc::new(QueuedTransport::new());
        let service = service(&transport);
        let ctx = Arc::new(MemoryEditorContext::new("hello"));
        ctx.update_server_state("hello".into(), Some(StateId::new("s0")));

        let mut handle = service.update(ctx);
        assert_eq!(handle.try_result(), Some(Ok(Some(StateId::new("s0")))));
        assert!(transport.sent_requests().is_empty());
        assert!(!service.coordinator().is_busy());
    }

    #[test]
    fn concurrent_update_is_deferred() {
        let transport = Arc::new(QueuedTransport::new());
        let service = service(&transport);
        let ctx = Arc::new(MemoryEditorContext::new("a"));

        let _first = service.update(ctx.clone());
        ctx.edit("ab");
        let mut second = service.update(ctx.clone());
        assert_eq!(transport.pending_count(), 1);
        assert_eq!(service.coordinator().queued_count(), 1);

        transport.respond(json!({"stateId": "s0"}));
        // the deferred update now runs against the confirmed state
        let params = transport.last_request().unwrap().params;
        assert_eq!(params.text(keys::REQUIRED_STATE_ID).as_deref(), Some("s0"));
        assert_eq!(params.text(keys::DELTA_TEXT).as_deref(), Some("b"));

        transport.respond(json!({"stateId": "s1"}));
        assert_eq!(second.try_result(), Some(Ok(Some(StateId::new("s1")))));
        assert_eq!(ctx.server_state().text.as_deref(), Some("ab"));
    }

    #[test]
    fn conflict_resends_full_text_holding_the_lane() {
        let transport = Arc::new(QueuedTransport::new());
        let service = service(&transport);
        let ctx = Arc::new(MemoryEditorContext::new("hello world"));
        ctx.update_server_state("hello".into(), Some(StateId::new("s0")));

        let mut handle = service.update(ctx.clone());
        transport.respond(json!({"conflict": true}));

        assert!(service.coordinator().is_busy());
        let params = transport.last_request().unwrap().params;
        assert_eq!(params.text(keys::FULL_TEXT).as_deref(), Some("hello world"));
        assert!(!params.contains(keys::REQUIRED_STATE_ID));

        transport.respond(json!({"stateId": "s7"}));
        assert_eq!(handle.try_result(), Some(Ok(Some(StateId::new("s7")))));
        assert!(!service.coordinator().is_busy());
    }

    #[test]
    fn success_without_state_id_keeps_known_state() {
        let transport = Arc::new(QueuedTransport::new());
        let service = service(&transport);
        let ctx = Arc::new(MemoryEditorContext::new("hello"));
        ctx.update_server_state("hello".into(), Some(StateId::new("s0")));
        ctx.edit("hello world");

        let mut handle = service.update(ctx.clone());
        transport.respond(json!({}));

        assert!(matches!(handle.try_result(), Some(Err(SyncError::Protocol(_)))));
        assert_eq!(
            ctx.server_state(),
            ServerState {
                text: Some("hello".into()),
                state_id: Some(StateId::new("s0")),
            }
        );
        assert!(!service.coordinator().is_busy());
    }

    #[test]
    fn transport_failure_leaves_state_untouched() {
        let transport = Arc::new(QueuedTransport::new());
        let service = service(&transport);
        let ctx = Arc::new(MemoryEditorContext::new("hello"));

        let mut handle = service.update(ctx.clone());
        transport.fail(503, "unavailable");

        assert_eq!(
            handle.try_result(),
            Some(Err(SyncError::http(503, "unavailable")))
        );
        assert_eq!(ctx.server_state(), ServerState::default());
        assert!(!service.coordinator().is_busy());
    }
}
