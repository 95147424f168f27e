//! History entries, value references, and value records.

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;
use crate::value_id::ValueId;

/// Where the value of a history entry lives.
///
/// Small values are carried inline in the entry; larger ones are stored once
/// in the value store and referenced by content hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueRef {
    /// The value itself, stored inside the entry.
    Inline(String),
    /// Content hash of a [`ValueRecord`] in the value store.
    Stored(ValueId),
}

impl ValueRef {
    /// Returns `true` if the value is carried inline.
    pub fn is_inline(&self) -> bool {
        matches!(self, ValueRef::Inline(_))
    }

    /// The referenced value id, if any.
    pub fn value_id(&self) -> Option<&ValueId> {
        match self {
            ValueRef::Inline(_) => None,
            ValueRef::Stored(id) => Some(id),
        }
    }
}

/// One version of a key.
///
/// Entries are immutable. At most one entry exists per `(key, timestamp)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The key this version belongs to.
    pub key: String,
    /// Instant at which this version became current.
    pub timestamp: Timestamp,
    /// The value, inline or by reference.
    pub value: ValueRef,
}

impl HistoryEntry {
    pub fn new(key: impl Into<String>, timestamp: Timestamp, value: ValueRef) -> Self {
        Self {
            key: key.into(),
            timestamp,
            value,
        }
    }
}

/// A deduplicated payload in the value store.
///
/// `id` is always the content hash of `payload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub id: ValueId,
    pub payload: String,
}

impl ValueRecord {
    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
