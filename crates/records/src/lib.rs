//! Record and event protocol for meshmark
//!
//! Defines the values the annotation engine hands to its collaborators:
//! measurement, annotation and saved-selection records for persistence, the
//! stored-record envelope they come back in, and the events pushed to the UI.

mod error;
mod events;
mod stored;
pub mod types;

pub use error::RecordError;
pub use events::{InteractionModeKind, RecordKind, ViewerEvent};
pub use stored::{RecordId, StoredRecord};
pub use types::*;

/// Identifier of a 3-D model owned by the external patient/record system
pub type ModelId = u64;
