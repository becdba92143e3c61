//! Editor context and the client's view of the server state.

use crate::transport::Callback;
use docsync_protocol::StateId;
use parking_lot::Mutex;

/// What the client believes the server holds for a document.
///
/// `text` and `state_id` only ever change together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
    /// Last text confirmed by the server.
    pub text: Option<String>,
    /// Token of that text on the server.
    pub state_id: Option<StateId>,
}

#[derive(Default)]
struct TrackerInner {
    state: ServerState,
    listeners: Vec<Callback>,
}

/// Holds the [`ServerState`] of one document.
///
/// Reads and updates are atomic with respect to each other. Listeners
/// registered with [`add_listener`](Self::add_listener) wait for the next
/// update; [`update`](Self::update) hands them back instead of running
/// them, so the caller decides when they fire.
#[derive(Default)]
pub struct ServerStateTracker {
    inner: Mutex<TrackerInner>,
}

impl ServerStateTracker {
    /// Creates a tracker with nothing known.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current state.
    pub fn read(&self) -> ServerState {
        self.inner.lock().state.clone()
    }

    /// Replaces text and state id together and returns the listeners that
    /// were waiting for it.
    pub fn update(&self, text: String, state_id: Option<StateId>) -> Vec<Callback> {
        let mut inner = self.inner.lock();
        inner.state = ServerState {
            text: Some(text),
            state_id,
        };
        std::mem::take(&mut inner.listeners)
    }

    /// Registers a one-shot listener for the next update.
    pub fn add_listener(&self, listener: impl FnOnce() + Send + 'static) {
        self.inner.lock().listeners.push(Box::new(listener));
    }

    /// Number of listeners waiting.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl std::fmt::Debug for ServerStateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ServerStateTracker")
            .field("state", &inner.state)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

/// The editor a set of document services works for.
///
/// The server-state accessors are the authoritative tracker for the
/// document.
pub trait EditorContext: Send + Sync {
    /// Current editor text.
    fn text(&self) -> String;

    /// Replaces the editor text.
    fn set_text(&self, text: &str);

    /// Snapshot of the server state.
    fn server_state(&self) -> ServerState;

    /// Atomically records a new server state and returns the listeners to
    /// notify.
    fn update_server_state(&self, text: String, state_id: Option<StateId>) -> Vec<Callback>;

    /// Forgets undo history.
    fn clear_undo_stack(&self);

    /// Marks the document clean or dirty.
    fn mark_clean(&self, clean: bool);
}

#[derive(Debug)]
struct Buffer {
    text: String,
    undo: Vec<String>,
    clean: bool,
}

/// An in-memory editor context.
#[derive(Debug)]
pub struct MemoryEditorContext {
    buffer: Mutex<Buffer>,
    tracker: ServerStateTracker,
}

impl MemoryEditorContext {
    /// Creates a context holding `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            buffer: Mutex::new(Buffer {
                text: text.into(),
                undo: Vec::new(),
                clean: true,
            }),
            tracker: ServerStateTracker::new(),
        }
    }

    /// Simulates typing: replaces the text and marks the document dirty.
    pub fn edit(&self, text: &str) {
        self.set_text(text);
        self.mark_clean(false);
    }

    /// Number of undoable edits.
    pub fn undo_depth(&self) -> usize {
        self.buffer.lock().undo.len()
    }

    /// Returns true if the document is clean.
    pub fn is_clean(&self) -> bool {
        self.buffer.lock().clean
    }

    /// Registers a one-shot listener for the next server-state change.
    pub fn add_server_state_listener(&self, listener: impl FnOnce() + Send + 'static) {
        self.tracker.add_listener(listener);
    }
}

impl Default for MemoryEditorContext {
    fn default() -> Self {
        Self::new("")
    }
}

impl EditorContext for MemoryEditorContext {
    fn text(&self) -> String {
        self.buffer.lock().text.clone()
    }

    fn set_text(&self, text: &str) {
        let mut buffer = self.buffer.lock();
        let previous = std::mem::replace(&mut buffer.text, text.to_string());
        buffer.undo.push(previous);
    }

    fn server_state(&self) -> ServerState {
        self.tracker.read()
    }

    fn update_server_state(&self, text: String, state_id: Option<StateId>) -> Vec<Callback> {
        self.tracker.update(text, state_id)
    }

    fn clear_undo_stack(&self) {
        self.buffer.lock().undo.clear();
    }

    fn mark_clean(&self, clean: bool) {
        self.buffer.lock().clean = clean;
    }
}
