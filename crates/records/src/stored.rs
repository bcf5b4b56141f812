//! Envelope for records that have been accepted by a store.

use serde::{Deserialize, Serialize};

/// Identifier assigned by the persistence backend
pub type RecordId = u64;

/// A record as returned by the persistence backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    pub id: RecordId,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at_ms: u64,
    pub record: T,
}

impl<T> StoredRecord<T> {
    pub fn new(id: RecordId, created_at_ms: u64, record: T) -> Self {
        Self {
            id,
            created_at_ms,
            record,
        }
    }
}
