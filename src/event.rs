//! The abstract event: a type tag, a JSON-shaped payload, optional
//! metadata, and, once persisted, a global [`SequenceNumber`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A 64-bit, strictly increasing identifier assigned by the store at
/// insertion time. It is the sole definition of "before"/"after" between
/// events; gaps are allowed, duplicates are not.
pub type SequenceNumber = i64;

/// The shape a caller supplies when appending: everything about an event
/// except what only the store can assign (its sequence number and
/// timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Short textual tag identifying the event's kind, e.g.
    /// `"BankAccountOpened"`. Must not be empty.
    pub event_type: String,

    /// Structured JSON payload. Opaque to the store except for subset
    /// containment matching against a [`crate::Filter`].
    pub payload: Value,

    /// Structured JSON metadata. Never examined by the store's matching
    /// logic; defaults to an empty object.
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

impl NewEvent {
    /// Builds a new event with empty metadata.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            metadata: empty_object(),
        }
    }

    /// Returns a copy of this event with the given metadata attached.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// An event is well-formed iff its type tag is non-empty. This is the
    /// only validation the store itself performs; payload schemas are the
    /// caller's concern.
    pub(crate) fn is_valid(&self) -> bool {
        !self.event_type.trim().is_empty()
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// The shape the store returns to callers: a [`NewEvent`] plus the
/// sequence number and timestamp the store assigned at insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Global, strictly increasing position of this event in the log.
    pub sequence_number: SequenceNumber,

    /// Server-assigned timestamp with timezone, set at insertion.
    /// Informational; never used for ordering or consistency.
    pub occurred_at: DateTime<Utc>,

    /// See [`NewEvent::event_type`].
    pub event_type: String,

    /// See [`NewEvent::payload`].
    pub payload: Value,

    /// See [`NewEvent::metadata`].
    pub metadata: Value,
}
