//! Named face selections saved against a model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Rgb, non_blank};
use crate::{ModelId, RecordError};

/// What a saved selection describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionCategory {
    /// A single tooth, usually labelled with its FDI number
    Tooth,
    /// A named region (posterior, anterior, ...)
    Region,
    /// An unlabelled set of faces
    #[default]
    Face,
}

/// A selection frozen at save time.
///
/// Independent of the live selection state: later edits to the live
/// selection never reach a saved one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SavedSelectionFields")]
pub struct SavedSelection {
    model_id: ModelId,
    category: SelectionCategory,
    label: Option<String>,
    faces: Vec<u32>,
    color: Rgb,
    note: Option<String>,
}

#[derive(Deserialize)]
struct SavedSelectionFields {
    model_id: ModelId,
    #[serde(default)]
    category: SelectionCategory,
    #[serde(default)]
    label: Option<String>,
    faces: Vec<u32>,
    #[serde(default)]
    color: Rgb,
    #[serde(default)]
    note: Option<String>,
}

impl TryFrom<SavedSelectionFields> for SavedSelection {
    type Error = RecordError;

    fn try_from(f: SavedSelectionFields) -> Result<Self, Self::Error> {
        Self::new(f.model_id, f.category, f.label, f.faces, f.color, f.note)
    }
}

impl SavedSelection {
    /// Build a saved selection. Duplicate faces are dropped keeping the first
    /// occurrence; an empty face list is rejected.
    pub fn new(
        model_id: ModelId,
        category: SelectionCategory,
        label: Option<String>,
        faces: impl IntoIterator<Item = u32>,
        color: Rgb,
        note: Option<String>,
    ) -> Result<Self, RecordError> {
        let faces = dedup_faces(faces);
        if faces.is_empty() {
            return Err(RecordError::EmptySelection);
        }
        Ok(Self {
            model_id,
            category,
            label: non_blank(label),
            faces,
            color,
            note: non_blank(note),
        })
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn category(&self) -> SelectionCategory {
        self.category
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Apply a partial edit. Fails without modifying `self` if the update
    /// would leave the selection empty.
    pub fn apply(&mut self, update: SelectionUpdate) -> Result<(), RecordError> {
        let faces = match update.faces {
            Some(faces) => {
                let faces = dedup_faces(faces);
                if faces.is_empty() {
                    return Err(RecordError::EmptySelection);
                }
                Some(faces)
            }
            None => None,
        };

        if let Some(faces) = faces {
            self.faces = faces;
        }
        if let Some(label) = update.label {
            self.label = non_blank(Some(label));
        }
        if let Some(color) = update.color {
            self.color = color;
        }
        if let Some(note) = update.note {
            self.note = non_blank(Some(note));
        }
        Ok(())
    }
}

/// Partial edit of a saved selection; `None` leaves a field untouched and a
/// blank string clears an optional text field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionUpdate {
    pub label: Option<String>,
    pub faces: Option<Vec<u32>>,
    pub color: Option<Rgb>,
    pub note: Option<String>,
}

fn dedup_faces(faces: impl IntoIterator<Item = u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    faces.into_iter().filter(|f| seen.insert(*f)).collect()
}
