//! Request handlers for the document endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::ResourceStore;
use docsync_protocol::{
    AssistEntry, AssistRequest, AssistResponse, HttpMethod, LoadRequest, LoadResponse, Payload,
    ServiceKind, StateId, SyncBody, UpdateRequest, UpdateResponse,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The server's working copy of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSession {
    /// Current text.
    pub text: String,
    /// Token identifying `text`.
    pub state_id: StateId,
    /// Whether the text differs from the persisted one.
    pub dirty: bool,
}

/// Outcome of bringing a session in line with a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synced {
    /// The session the request operates on.
    Session(DocumentSession),
    /// The session does not hold the required state.
    Conflict,
}

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Persisted documents.
    pub store: Arc<ResourceStore>,
    /// Working copies (resource -> session).
    sessions: RwLock<HashMap<String, DocumentSession>>,
    next_state: AtomicU64,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<ResourceStore>) -> Self {
        Self {
            config,
            store,
            sessions: RwLock::new(HashMap::new()),
            next_state: AtomicU64::new(0),
        }
    }

    fn next_state_id(&self) -> StateId {
        let n = self.next_state.fetch_add(1, Ordering::SeqCst);
        StateId::new(format!("{}{n}", self.config.state_id_prefix))
    }

    fn check_len(&self, text: &str) -> ServerResult<()> {
        if text.len() > self.config.max_document_len {
            return Err(ServerError::DocumentTooLarge {
                len: text.len(),
                max: self.config.max_document_len,
            });
        }
        Ok(())
    }

    /// Returns a copy of a session.
    pub fn session(&self, resource: &str) -> Option<DocumentSession> {
        self.sessions.read().get(resource).cloned()
    }

    /// Starts a session from the persisted document.
    pub fn open(&self, resource: &str) -> ServerResult<DocumentSession> {
        let stored = self
            .store
            .get(resource)
            .ok_or_else(|| ServerError::UnknownResource(resource.to_string()))?;
        let session = DocumentSession {
            text: stored.text,
            state_id: self.next_state_id(),
            dirty: stored.dirty,
        };
        self.sessions
            .write()
            .insert(resource.to_string(), session.clone());
        Ok(session)
    }

    /// Applies a request body to the session of `resource`.
    ///
    /// Check and replacement happen under one lock, so concurrent requests
    /// against the same state id cannot both succeed with a delta.
    pub fn synchronize(&self, resource: &str, body: SyncBody) -> ServerResult<Synced> {
        let mut sessions = self.sessions.write();
        let text = match body {
            SyncBody::FullText(text) => text,
            SyncBody::Delta {
                required_state_id,
                delta,
            } => match sessions.get(resource) {
                Some(session) if session.state_id == required_state_id => {
                    delta.apply(&session.text)?
                }
                _ => return Ok(Synced::Conflict),
            },
            SyncBody::Query { required_state_id } => {
                let current = sessions.get(resource).cloned();
                drop(sessions);
                return match (current, required_state_id) {
                    (Some(session), None) => Ok(Synced::Session(session)),
                    (Some(session), Some(required)) if session.state_id == required => {
                        Ok(Synced::Session(session))
                    }
                    (None, None) => self.open(resource).map(Synced::Session),
                    _ => Ok(Synced::Conflict),
                };
            }
        };

        self.check_len(&text)?;
        let session = DocumentSession {
            text,
            state_id: self.next_state_id(),
            dirty: true,
        };
        sessions.insert(resource.to_string(), session.clone());
        Ok(Synced::Session(session))
    }

    /// Drops every session. Returns how many were dropped.
    pub fn evict_sessions(&self) -> usize {
        let mut sessions = self.sessions.write();
        let count = sessions.len();
        sessions.clear();
        info!(count, "evicted sessions");
        count
    }

    /// Drops the session of one resource.
    pub fn evict(&self, resource: &str) -> bool {
        self.sessions.write().remove(resource).is_some()
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

/// Handler for document requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Dispatches a request and encodes the response as JSON.
    pub fn handle(
        &self,
        service: ServiceKind,
        method: HttpMethod,
        resource: &str,
        params: &Payload,
    ) -> ServerResult<Value> {
        let value = match service {
            ServiceKind::Load => {
                let request = LoadRequest {
                    content_type: params.text(docsync_protocol::keys::CONTENT_TYPE),
                };
                serde_json::to_value(self.handle_load(resource, &request)?)
            }
            ServiceKind::Update => {
                let request = UpdateRequest::from_payload(params)?;
                check_method(method, &request.body)?;
                serde_json::to_value(self.handle_update(resource, request)?)
            }
            ServiceKind::Assist => {
                let request = AssistRequest::from_payload(params)?;
                check_method(method, &request.body)?;
                serde_json::to_value(self.handle_assist(resource, request)?)
            }
        };
        value.map_err(|e| ServerError::Internal(e.to_string()))
    }

    /// Handles a load request.
    pub fn handle_load(&self, resource: &str, request: &LoadRequest) -> ServerResult<LoadResponse> {
        let session = self.context.open(resource)?;
        info!(
            resource,
            content_type = request.content_type.as_deref().unwrap_or("-"),
            state = %session.state_id,
            "loaded resource"
        );
        Ok(LoadResponse {
            full_text: session.text,
            dirty: session.dirty,
            state_id: Some(session.state_id),
        })
    }

    /// Handles an update request.
    pub fn handle_update(
        &self,
        resource: &str,
        request: UpdateRequest,
    ) -> ServerResult<UpdateResponse> {
        let required = request.body.required_state_id().cloned();
        match self.context.synchronize(resource, request.body)? {
            Synced::Conflict => {
                debug!(resource, required = ?required, "update conflict");
                Ok(UpdateResponse::conflict())
            }
            Synced::Session(session) => Ok(UpdateResponse {
                conflict: false,
                state_id: Some(session.state_id),
            }),
        }
    }

    /// Handles a content-assist request.
    pub fn handle_assist(
        &self,
        resource: &str,
        request: AssistRequest,
    ) -> ServerResult<AssistResponse> {
        let required = request.body.required_state_id().cloned();
        let session = match self.context.synchronize(resource, request.body)? {
            Synced::Conflict => {
                debug!(resource, required = ?required, "content assist conflict");
                return Ok(AssistResponse::conflict());
            }
            Synced::Session(session) => session,
        };
        let entries = self.propose(&session.text, request.caret_offset)?;
        debug!(resource, proposals = entries.len(), "content assist");
        Ok(AssistResponse {
            conflict: false,
            state_id: Some(session.state_id),
            entries,
        })
    }

    /// Keywords, then identifiers from the document, that extend the word
    /// before the caret.
    fn propose(&self, text: &str, caret: usize) -> ServerResult<Vec<AssistEntry>> {
        if caret > text.len() || !text.is_char_boundary(caret) {
            return Err(ServerError::InvalidRequest(format!(
                "caret offset {caret} outside document of length {}",
                text.len()
            )));
        }

        let prefix_start = text[..caret]
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_identifier_char(*c))
            .last()
            .map_or(caret, |(i, _)| i);
        let prefix = &text[prefix_start..caret];

        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        for keyword in &self.context.config.keywords {
            if keyword.starts_with(prefix) && keyword != prefix && seen.insert(keyword.as_str()) {
                entries.push(entry(keyword, prefix, "keyword"));
            }
        }

        let identifiers: BTreeSet<&str> = identifiers(text)
            .into_iter()
            .filter(|(start, _)| *start != prefix_start)
            .map(|(_, word)| word)
            .collect();
        for word in identifiers {
            if word.starts_with(prefix) && word != prefix && seen.insert(word) {
                entries.push(entry(word, prefix, "identifier"));
            }
        }

        entries.truncate(self.context.config.max_proposals);
        Ok(entries)
    }
}

fn check_method(method: HttpMethod, body: &SyncBody) -> ServerResult<()> {
    if method == HttpMethod::Get && body.carries_text() {
        return Err(ServerError::InvalidRequest(
            "text changes must be sent with POST".into(),
        ));
    }
    Ok(())
}

fn entry(proposal: &str, prefix: &str, kind: &str) -> AssistEntry {
    AssistEntry {
        proposal: proposal.to_string(),
        prefix: prefix.to_string(),
        name: Some(proposal.to_string()),
        description: Some(kind.to_string()),
        style: Some(kind.to_string()),
        ..AssistEntry::default()
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Words of identifier characters not starting with a digit, with their
/// byte offsets.
fn identifiers(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if is_identifier_char(c) {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            words.push((s, &text[s..i]));
        }
    }
    if let Some(s) = start {
        words.push((s, &text[s..]));
    }
    words.retain(|(_, w)| !w.starts_with(|c: char| c.is_ascii_digit()));
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::TextDelta;
    use proptest::prelude::*;

    fn create_handler() -> (Arc<HandlerContext>, RequestHandler) {
        let store = Arc::new(ResourceStore::new());
        store.insert("machine.sm", "state idle\nend\nstate running\nend\n");
        let context = Arc::new(HandlerContext::new(ServerConfig::default(), store));
        (Arc::clone(&context), RequestHandler::new(context))
    }

    fn assist(body: SyncBody, caret_offset: usize) -> AssistRequest {
        AssistRequest {
            content_type: None,
            caret_offset,
            selection: None,
            body,
        }
    }

    #[test]
    fn load_opens_session() {
        let (context, handler) = create_handler();
        let response = handler
            .handle_load("machine.sm", &LoadRequest::default())
            .unwrap();

        assert!(response.full_text.starts_with("state idle"));
        assert!(!response.dirty);
        assert_eq!(response.state_id, Some(StateId::new("s0")));
        assert_eq!(context.session_count(), 1);
    }

    #[test]
    fn load_unknown_resource() {
        let (_, handler) = create_handler();
        let err = handler
            .handle_load("missing.sm", &LoadRequest::default())
            .unwrap_err();
        assert_eq!(err, ServerError::UnknownResource("missing.sm".into()));
    }

    #[test]
    fn delta_against_current_state_is_applied() {
        let (context, handler) = create_handler();
        context.store.insert("doc", "hello");
        let loaded = handler.handle_load("doc", &LoadRequest::default()).unwrap();

        let response = handler
            .handle_update(
                "doc",
                UpdateRequest {
                    body: SyncBody::Delta {
                        required_state_id: loaded.state_id.unwrap(),
                        delta: TextDelta::compute("hello", "hello world").unwrap(),
                    },
                },
            )
            .unwrap();

        assert!(!response.conflict);
        let session = context.session("doc").unwrap();
        assert_eq!(session.text, "hello world");
        assert_eq!(Some(session.state_id), response.state_id);
        assert!(session.dirty);
    }

    #[test]
    fn stale_state_is_a_conflict() {
        let (context, handler) = create_handler();
        context.store.insert("doc", "hello");
        handler.handle_load("doc", &LoadRequest::default()).unwrap();

        let response = handler
            .handle_update(
                "doc",
                UpdateRequest {
                    body: SyncBody::Delta {
                        required_state_id: StateId::new("stale"),
                        delta: TextDelta::compute("hello", "help").unwrap(),
                    },
                },
            )
            .unwrap();
        assert_eq!(response, UpdateResponse::conflict());
        assert_eq!(context.session("doc").unwrap().text, "hello");
    }

    #[test]
    fn missing_session_is_a_conflict() {
        let (_, handler) = create_handler();
        let response = handler
            .handle_assist(
                "machine.sm",
                assist(
                    SyncBody::Query {
                        required_state_id: Some(StateId::new("s7")),
                    },
                    0,
                ),
            )
            .unwrap();
        assert!(response.conflict);
        assert!(response.entries.is_empty());
    }

    #[test]
    fn out_of_range_delta_is_rejected() {
        let (context, handler) = create_handler();
        context.store.insert("doc", "abc");
        let loaded = handler.handle_load("doc", &LoadRequest::default()).unwrap();

        let err = handler
            .handle_update(
                "doc",
                UpdateRequest {
                    body: SyncBody::Delta {
                        required_state_id: loaded.state_id.unwrap(),
                        delta: TextDelta {
                            offset: 10,
                            replace_length: 1,
                            text: "x".into(),
                        },
                    },
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidDelta(_)));
    }

    #[test]
    fn full_text_replaces_session() {
        let (context, handler) = create_handler();
        let response = handler
            .handle_assist("scratch", assist(SyncBody::FullText("st".into()), 2))
            .unwrap();

        assert!(!response.conflict);
        assert_eq!(context.session("scratch").unwrap().text, "st");
        assert_eq!(response.entries[0].proposal, "state");
        assert_eq!(response.entries[0].prefix, "st");
    }

    #[test]
    fn query_without_session_loads_from_store() {
        let (context, handler) = create_handler();
        let response = handler
            .handle_assist(
                "machine.sm",
                assist(
                    SyncBody::Query {
                        required_state_id: None,
                    },
                    0,
                ),
            )
            .unwrap();
        assert!(!response.conflict);
        assert!(context.session("machine.sm").is_some());
    }

    #[test]
    fn proposals_from_keywords_and_identifiers() {
        let (context, handler) = create_handler();
        let text = "state idle\nstate running\ngoto r";
        let response = handler
            .handle_assist("doc", assist(SyncBody::FullText(text.into()), text.len()))
            .unwrap();

        let proposals: Vec<_> = response.entries.iter().map(|e| e.proposal.as_str()).collect();
        assert_eq!(proposals, vec!["running"]);
        assert_eq!(response.entries[0].description.as_deref(), Some("identifier"));
        assert_eq!(context.session("doc").unwrap().text, text);

        let text = "state idle\ne";
        let response = handler
            .handle_assist("doc", assist(SyncBody::FullText(text.into()), text.len()))
            .unwrap();
        let proposals: Vec<_> = response.entries.iter().map(|e| e.proposal.as_str()).collect();
        assert_eq!(proposals, vec!["event", "end"]);
    }

    #[test]
    fn proposals_are_capped() {
        let store = Arc::new(ResourceStore::new());
        let config = ServerConfig::new().with_max_proposals(2);
        let handler = RequestHandler::new(Arc::new(HandlerContext::new(config, store)));

        let response = handler
            .handle_assist("doc", assist(SyncBody::FullText(String::new()), 0))
            .unwrap();
        assert_eq!(response.entries.len(), 2);
    }

    #[test]
    fn caret_outside_document() {
        let (_, handler) = create_handler();
        let err = handler
            .handle_assist("doc", assist(SyncBody::FullText("ab".into()), 3))
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn document_size_limit() {
        let store = Arc::new(ResourceStore::new());
        let config = ServerConfig::new().with_max_document_len(4);
        let handler = RequestHandler::new(Arc::new(HandlerContext::new(config, store)));

        let err = handler
            .handle_update(
                "doc",
                UpdateRequest {
                    body: SyncBody::FullText("too long".into()),
                },
            )
            .unwrap_err();
        assert_eq!(err, ServerError::DocumentTooLarge { len: 8, max: 4 });
    }

    #[test]
    fn text_over_get_is_rejected() {
        let (_, handler) = create_handler();
        let mut params = Payload::new();
        params.insert(docsync_protocol::keys::FULL_TEXT, "x");
        let err = handler
            .handle(ServiceKind::Update, HttpMethod::Get, "doc", &params)
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[test]
    fn eviction_forgets_sessions() {
        let (context, handler) = create_handler();
        handler
            .handle_load("machine.sm", &LoadRequest::default())
            .unwrap();
        assert_eq!(context.evict_sessions(), 1);
        assert_eq!(context.session_count(), 0);
        assert!(!context.evict("machine.sm"));
    }

    #[test]
    fn identifier_scan() {
        assert_eq!(
            identifiers("state s1 2x _y\nend"),
            vec![(0, "state"), (6, "s1"), (12, "_y"), (15, "end")]
        );
    }

    proptest! {
        #[test]
        fn proposals_extend_the_typed_prefix(text in "[a-e_ \n]{0,40}", caret in 0usize..41) {
            let caret = caret.min(text.len());
            let (_, handler) = create_handler();
            let response = handler
                .handle_assist("doc", assist(SyncBody::FullText(text), caret))
                .unwrap();

            let mut seen = BTreeSet::new();
            for entry in &response.entries {
                prop_assert!(entry.proposal.starts_with(&entry.prefix));
                prop_assert!(entry.proposal.len() > entry.prefix.len());
                prop_assert!(seen.insert(entry.proposal.clone()));
            }
            prop_assert!(response.entries.len() <= ServerConfig::default().max_proposals);
        }
    }
}
