//! Server configuration.

/// Keywords proposed when no configuration overrides them.
pub const DEFAULT_KEYWORDS: &[&str] = &["state", "event", "end", "input", "output", "if", "goto"];

/// Configuration for the document server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Keywords offered by content assist.
    pub keywords: Vec<String>,
    /// Maximum document length in bytes.
    pub max_document_len: usize,
    /// Maximum number of proposals per response.
    pub max_proposals: usize,
    /// Prefix of generated state ids.
    pub state_id_prefix: String,
}

impl ServerConfig {
    /// Creates a configuration with the default keywords.
    pub fn new() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_document_len: 1024 * 1024,
            max_proposals: 100,
            state_id_prefix: "s".to_string(),
        }
    }

    /// Replaces the keyword list.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the maximum document length.
    pub fn with_max_document_len(mut self, max: usize) -> Self {
        self.max_document_len = max;
        self
    }

    /// Sets the maximum number of proposals.
    pub fn with_max_proposals(mut self, max: usize) -> Self {
        self.max_proposals = max;
        self
    }

    /// Sets the state id prefix.
    pub fn with_state_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.state_id_prefix = prefix.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
