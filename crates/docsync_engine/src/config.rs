//! Configuration for the document services.

use std::time::Duration;

/// What to send when the text changed but no delta is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaFallback {
    /// Send the complete text.
    FullText,
    /// Send only the required state id and let the server use what it has.
    StateIdOnly,
}

/// Configuration shared by the services of one document.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server URL.
    pub server_url: String,
    /// Resource (document) identifier sent with every request.
    pub resource_id: String,
    /// How many times a conflict may trigger a full-text resend before the
    /// attempt fails.
    pub max_conflict_retries: u32,
    /// Fallback when the delta computer produces nothing for changed text.
    pub delta_fallback: DeltaFallback,
    /// Always send the full text instead of deltas.
    pub send_full_text: bool,
    /// Request timeout.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a new configuration.
    pub fn new(server_url: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            resource_id: resource_id.into(),
            max_conflict_retries: 1,
            delta_fallback: DeltaFallback::FullText,
            send_full_text: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the conflict retry bound.
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Sets the no-delta fallback.
    pub fn with_delta_fallback(mut self, fallback: DeltaFallback) -> Self {
        self.delta_fallback = fallback;
        self
    }

    /// Forces full-text requests.
    pub fn with_full_text(mut self, send_full_text: bool) -> Self {
        self.send_full_text = send_full_text;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}
