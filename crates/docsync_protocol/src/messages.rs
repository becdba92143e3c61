//! Protocol messages for the load, update and content-assist services.

use crate::delta::TextDelta;
use crate::error::{ProtocolError, ProtocolResult};
use crate::payload::{keys, HttpMethod, Payload, StateId};
use serde::{Deserialize, Serialize};

/// How a synchronization-dependent request tells the server about the text.
///
/// Exactly one form is sent per request: a full text and a delta never
/// travel together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncBody {
    /// The authoritative complete text.
    FullText(String),
    /// A delta against the state the server is required to hold.
    Delta {
        /// State the delta applies to.
        required_state_id: StateId,
        /// The change.
        delta: TextDelta,
    },
    /// No text at all; the server uses what it already has.
    Query {
        /// State the server is required to hold, if one is known.
        required_state_id: Option<StateId>,
    },
}

impl SyncBody {
    /// Method the body must be sent with.
    pub fn method(&self) -> HttpMethod {
        match self {
            SyncBody::FullText(_) | SyncBody::Delta { .. } => HttpMethod::Post,
            SyncBody::Query { .. } => HttpMethod::Get,
        }
    }

    /// Returns true if a successful response moves the server to a new state.
    pub fn carries_text(&self) -> bool {
        !matches!(self, SyncBody::Query { .. })
    }

    /// Returns the required state id, if any.
    pub fn required_state_id(&self) -> Option<&StateId> {
        match self {
            SyncBody::FullText(_) => None,
            SyncBody::Delta {
                required_state_id, ..
            } => Some(required_state_id),
            SyncBody::Query { required_state_id } => required_state_id.as_ref(),
        }
    }

    /// Writes the body's parameters.
    pub fn write_to(&self, payload: &mut Payload) {
        match self {
            SyncBody::FullText(text) => payload.insert(keys::FULL_TEXT, text.as_str()),
            SyncBody::Delta {
                required_state_id,
                delta,
            } => {
                payload.insert(keys::REQUIRED_STATE_ID, required_state_id);
                delta.write_to(payload);
            }
            SyncBody::Query { required_state_id } => {
                if let Some(id) = required_state_id {
                    payload.insert(keys::REQUIRED_STATE_ID, id);
                }
            }
        }
    }

    /// Reads the body back from request parameters.
    pub fn read_from(payload: &Payload) -> ProtocolResult<Self> {
        let delta = TextDelta::read_from(payload)?;
        let required_state_id = payload.state_id(keys::REQUIRED_STATE_ID);
        match (payload.text(keys::FULL_TEXT), delta) {
            (Some(_), Some(_)) => Err(ProtocolError::AmbiguousBody),
            (Some(text), None) => Ok(SyncBody::FullText(text)),
            (None, Some(delta)) => Ok(SyncBody::Delta {
                required_state_id: required_state_id
                    .ok_or(ProtocolError::MissingField(keys::REQUIRED_STATE_ID))?,
                delta,
            }),
            (None, None) => Ok(SyncBody::Query { required_state_id }),
        }
    }
}

/// Selected range in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Selection start.
    pub start: usize,
    /// Selection end.
    pub end: usize,
}

/// A content-assist request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistRequest {
    /// Content type of the document.
    pub content_type: Option<String>,
    /// Caret position.
    pub caret_offset: usize,
    /// Selection, sent only when it differs from the caret.
    pub selection: Option<Selection>,
    /// Text synchronization part.
    pub body: SyncBody,
}

impl AssistRequest {
    /// Method the request is sent with.
    pub fn method(&self) -> HttpMethod {
        self.body.method()
    }

    /// Encodes the request parameters.
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        if let Some(ref content_type) = self.content_type {
            payload.insert(keys::CONTENT_TYPE, content_type.as_str());
        }
        payload.insert(keys::CARET_OFFSET, self.caret_offset);
        if let Some(selection) = self.selection {
            if selection.start != self.caret_offset || selection.end != self.caret_offset {
                payload.insert(keys::SELECTION_START, selection.start);
                payload.insert(keys::SELECTION_END, selection.end);
            }
        }
        self.body.write_to(&mut payload);
        payload
    }

    /// Decodes request parameters.
    pub fn from_payload(payload: &Payload) -> ProtocolResult<Self> {
        let caret_offset = payload.offset(keys::CARET_OFFSET)?.unwrap_or(0);
        let selection = match (
            payload.offset(keys::SELECTION_START)?,
            payload.offset(keys::SELECTION_END)?,
        ) {
            (Some(start), Some(end)) => Some(Selection { start, end }),
            _ => None,
        };
        Ok(Self {
            content_type: payload.text(keys::CONTENT_TYPE),
            caret_offset,
            selection,
            body: SyncBody::read_from(payload)?,
        })
    }
}

/// A request that only pushes text to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Text synchronization part.
    pub body: SyncBody,
}

impl UpdateRequest {
    /// Encodes the request parameters.
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        self.body.write_to(&mut payload);
        payload
    }

    /// Decodes request parameters.
    pub fn from_payload(payload: &Payload) -> ProtocolResult<Self> {
        Ok(Self {
            body: SyncBody::read_from(payload)?,
        })
    }
}

/// A request to load a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadRequest {
    /// Content type of the document.
    pub content_type: Option<String>,
}

impl LoadRequest {
    /// Encodes the request parameters.
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        if let Some(ref content_type) = self.content_type {
            payload.insert(keys::CONTENT_TYPE, content_type.as_str());
        }
        payload
    }
}

/// Response of the load service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    /// The document text.
    pub full_text: String,
    /// Whether the server holds unsaved changes.
    #[serde(default)]
    pub dirty: bool,
    /// State of the freshly loaded document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<StateId>,
}

/// Response of the update service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    /// The server does not hold the required state.
    #[serde(default, skip_serializing_if = "is_false")]
    pub conflict: bool,
    /// New state after the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<StateId>,
}

impl UpdateResponse {
    /// A conflict response.
    pub fn conflict() -> Self {
        Self {
            conflict: true,
            state_id: None,
        }
    }
}

/// Response of the content-assist service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistResponse {
    /// The server does not hold the required state.
    #[serde(default, skip_serializing_if = "is_false")]
    pub conflict: bool,
    /// State the proposals were computed against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<StateId>,
    /// Proposals.
    #[serde(default)]
    pub entries: Vec<AssistEntry>,
}

impl AssistResponse {
    /// A conflict response.
    pub fn conflict() -> Self {
        Self {
            conflict: true,
            ..Self::default()
        }
    }
}

/// One proposal as sent by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistEntry {
    /// Text to insert.
    pub proposal: String,
    /// Text before the caret the proposal replaces.
    #[serde(default)]
    pub prefix: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description shown next to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Styling hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Further edits applied together with the proposal.
    #[serde(default)]
    pub text_replacements: Vec<TextReplacement>,
    /// Positions the editor should let the user jump between.
    #[serde(default)]
    pub edit_positions: Vec<EditPosition>,
}

/// An additional edit attached to a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextReplacement {
    /// Start offset.
    pub offset: usize,
    /// Replaced length.
    pub length: usize,
    /// Replacement text.
    pub text: String,
}

/// A linked edit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPosition {
    /// Start offset.
    pub offset: usize,
    /// Length.
    pub length: usize,
}

fn is_false(value: &bool) -> bool {
    !*value
}
