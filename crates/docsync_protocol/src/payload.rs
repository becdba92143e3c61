//! Request parameters, state ids and service routing.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter names used on the wire.
pub mod keys {
    /// Resource (document) identifier.
    pub const RESOURCE: &str = "resource";
    /// Content type of the document.
    pub const CONTENT_TYPE: &str = "contentType";
    /// Caret position.
    pub const CARET_OFFSET: &str = "caretOffset";
    /// Selection start, sent only when it differs from the caret.
    pub const SELECTION_START: &str = "selectionStart";
    /// Selection end, sent only when it differs from the caret.
    pub const SELECTION_END: &str = "selectionEnd";
    /// Complete document text.
    pub const FULL_TEXT: &str = "fullText";
    /// State id the server must currently hold.
    pub const REQUIRED_STATE_ID: &str = "requiredStateId";
    /// Inserted text of a delta.
    pub const DELTA_TEXT: &str = "deltaText";
    /// Start offset of a delta.
    pub const DELTA_OFFSET: &str = "deltaOffset";
    /// Number of bytes replaced by a delta.
    pub const DELTA_REPLACE_LENGTH: &str = "deltaReplaceLength";
}

/// Opaque token naming one version of a document as known to the server.
///
/// Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    /// Wraps a raw token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// HTTP method a request is issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Parameters in the query string.
    Get,
    /// Parameters in a form body.
    Post,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Load a document and open a session.
    Load,
    /// Push the current text without computing anything.
    Update,
    /// Compute content-assist proposals.
    Assist,
}

impl ServiceKind {
    /// Returns the path segment of the endpoint.
    pub fn path(&self) -> &'static str {
        match self {
            ServiceKind::Load => "load",
            ServiceKind::Update => "update",
            ServiceKind::Assist => "assist",
        }
    }

    /// Parses a path segment.
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_matches('/') {
            "load" => Some(ServiceKind::Load),
            "update" => Some(ServiceKind::Update),
            "assist" => Some(ServiceKind::Assist),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean flag.
    Bool(bool),
    /// Integer (offsets, lengths).
    Int(i64),
    /// Text.
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<usize> for Scalar {
    fn from(n: usize) -> Self {
        Scalar::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&StateId> for Scalar {
    fn from(id: &StateId) -> Self {
        Scalar::Text(id.as_str().to_string())
    }
}

/// Flat parameter map a request is encoded as.
///
/// Keys are ordered so encoded query strings are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, Scalar>);

impl Payload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any previous value.
    pub fn insert(&mut self, key: &str, value: impl Into<Scalar>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Returns true if the parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns a raw parameter.
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    /// Returns a parameter rendered as text.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// Returns a non-negative integer parameter.
    ///
    /// Text values are parsed, since form-decoded payloads carry every value
    /// as text.
    pub fn offset(&self, key: &'static str) -> ProtocolResult<Option<usize>> {
        match self.get(key) {
            None => Ok(None),
            Some(Scalar::Int(i)) => usize::try_from(*i)
                .map(Some)
                .map_err(|_| ProtocolError::InvalidValue {
                    field: key,
                    value: i.to_string(),
                }),
            Some(Scalar::Text(s)) => {
                s.parse::<usize>()
                    .map(Some)
                    .map_err(|_| ProtocolError::InvalidValue {
                        field: key,
                        value: s.clone(),
                    })
            }
            Some(Scalar::Bool(b)) => Err(ProtocolError::InvalidValue {
                field: key,
                value: b.to_string(),
            }),
        }
    }

    /// Returns the state id parameter, if any.
    pub fn state_id(&self, key: &str) -> Option<StateId> {
        self.text(key).map(StateId::new)
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes as `application/x-www-form-urlencoded`.
    pub fn to_form(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.0 {
            serializer.append_pair(key, &value.to_string());
        }
        serializer.finish()
    }

    /// Decodes `application/x-www-form-urlencoded` text.
    ///
    /// Every value comes back as [`Scalar::Text`].
    pub fn from_form(encoded: &str) -> Self {
        let map = url::form_urlencoded::parse(encoded.as_bytes())
            .map(|(k, v)| (k.into_owned(), Scalar::Text(v.into_owned())))
            .collect();
        Self(map)
    }
}
