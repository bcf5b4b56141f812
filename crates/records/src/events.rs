//! Events pushed from the engine to the UI.

use serde::{Deserialize, Serialize};

use crate::{Coordinates, RecordError, RecordId};

/// Which interaction mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InteractionModeKind {
    #[default]
    Idle,
    Select,
    Measure,
    Annotate,
}

/// Kind of persisted record an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Measurement,
    Annotation,
    Selection,
}

/// Messages from the engine to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ViewerEvent {
    /// Live selection changed (toggle, batch add, clear, undo, redo)
    SelectionChanged {
        face_count: usize,
        can_undo: bool,
        can_redo: bool,
    },

    /// A group select stopped at its face budget
    GroupTruncated { face_budget: usize },

    /// First point of a measurement was placed
    MeasurementPointPlaced { point: Coordinates },

    /// Both points placed; the measurement is queued for saving
    MeasurementCompleted {
        point_a: Coordinates,
        point_b: Coordinates,
        distance: f32,
    },

    /// Surface point picked for an annotation; text is still needed
    AnnotationPending { point: Coordinates },

    /// Active interaction mode changed
    ModeChanged { mode: InteractionModeKind },

    /// A record reached the store
    RecordSaved { kind: RecordKind, id: RecordId },

    /// A record could not be saved; local state is kept for retry
    RecordSaveFailed { kind: RecordKind, reason: String },

    /// A record was removed from the store
    RecordDeleted { kind: RecordKind, id: RecordId },
}

impl ViewerEvent {
    /// Encode as the JSON envelope understood by the UI
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }
}
