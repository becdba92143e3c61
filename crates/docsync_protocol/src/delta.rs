//! Incremental text deltas.

use crate::error::{ProtocolError, ProtocolResult};
use crate::payload::{keys, Payload};
use serde::{Deserialize, Serialize};

/// A single replacement that turns one text into another.
///
/// Offsets are UTF-8 byte offsets and always fall on `char` boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDelta {
    /// Start of the replaced span in the old text.
    pub offset: usize,
    /// Length of the replaced span in the old text.
    pub replace_length: usize,
    /// Text inserted in place of the span.
    pub text: String,
}

impl TextDelta {
    /// Computes the smallest single replacement from `old` to `new`.
    ///
    /// Returns `None` when the texts are identical, or when both are
    /// non-empty and share neither a prefix nor a suffix: such a delta would
    /// carry the whole new text anyway.
    pub fn compute(old: &str, new: &str) -> Option<Self> {
        if old == new {
            return None;
        }

        let (old_bytes, new_bytes) = (old.as_bytes(), new.as_bytes());

        let mut start = old_bytes
            .iter()
            .zip(new_bytes)
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(start) {
            start -= 1;
        }

        if start == old.len() {
            return Some(Self {
                offset: start,
                replace_length: 0,
                text: new[start..].to_string(),
            });
        }
        if start == new.len() {
            return Some(Self {
                offset: start,
                replace_length: old.len() - start,
                text: String::new(),
            });
        }

        let max_end = (old.len() - start).min(new.len() - start);
        let mut end = old_bytes
            .iter()
            .rev()
            .zip(new_bytes.iter().rev())
            .take(max_end)
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(old.len() - end) {
            end -= 1;
        }

        if start == 0 && end == 0 {
            return None;
        }

        Some(Self {
            offset: start,
            replace_length: old.len() - start - end,
            text: new[start..new.len() - end].to_string(),
        })
    }

    /// Applies the delta to `old`.
    pub fn apply(&self, old: &str) -> ProtocolResult<String> {
        let end = self
            .offset
            .checked_add(self.replace_length)
            .filter(|end| *end <= old.len())
            .filter(|end| old.is_char_boundary(self.offset) && old.is_char_boundary(*end))
            .ok_or(ProtocolError::InvalidDelta {
                offset: self.offset,
                replace_length: self.replace_length,
                text_len: old.len(),
            })?;

        let mut result = String::with_capacity(old.len() - self.replace_length + self.text.len());
        result.push_str(&old[..self.offset]);
        result.push_str(&self.text);
        result.push_str(&old[end..]);
        Ok(result)
    }

    /// Writes `deltaText`, `deltaOffset` and `deltaReplaceLength`.
    pub fn write_to(&self, payload: &mut Payload) {
        payload.insert(keys::DELTA_TEXT, self.text.as_str());
        payload.insert(keys::DELTA_OFFSET, self.offset);
        payload.insert(keys::DELTA_REPLACE_LENGTH, self.replace_length);
    }

    /// Reads a delta back from a payload, if `deltaText` is present.
    pub fn read_from(payload: &Payload) -> ProtocolResult<Option<Self>> {
        let Some(text) = payload.text(keys::DELTA_TEXT) else {
            return Ok(None);
        };
        let offset = payload
            .offset(keys::DELTA_OFFSET)?
            .ok_or(ProtocolError::MissingField(keys::DELTA_OFFSET))?;
        let replace_length = payload
            .offset(keys::DELTA_REPLACE_LENGTH)?
            .ok_or(ProtocolError::MissingField(keys::DELTA_REPLACE_LENGTH))?;
        Ok(Some(Self {
            offset,
            replace_length,
            text,
        }))
    }
}

/// Produces incremental descriptions of text changes.
///
/// Implementations are pure: the result depends only on the two texts.
/// Returning `None` means no incremental representation is available and
/// the caller must fall back to a state check or a full-text request.
pub trait DeltaComputer: Send + Sync {
    /// Computes a delta from `old` to `new`.
    fn compute(&self, old: &str, new: &str) -> Option<TextDelta>;
}

/// The default computer: strips the common prefix and suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSuffixDelta;

impl DeltaComputer for PrefixSuffixDelta {
    fn compute(&self, old: &str, new: &str) -> Option<TextDelta> {
        TextDelta::compute(old, new)
    }
}
