//! Free-text annotations anchored to a surface point.

use serde::{Deserialize, Serialize};

use super::Coordinates;
use crate::{ModelId, RecordError};

/// A text note pinned to a 3-D position on a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnnotationFields")]
pub struct Annotation {
    model_id: ModelId,
    position: Coordinates,
    text: String,
}

#[derive(Deserialize)]
struct AnnotationFields {
    model_id: ModelId,
    position: Coordinates,
    text: String,
}

impl TryFrom<AnnotationFields> for Annotation {
    type Error = RecordError;

    fn try_from(fields: AnnotationFields) -> Result<Self, Self::Error> {
        Self::new(fields.model_id, fields.position, fields.text)
    }
}

impl Annotation {
    /// Build an annotation; surrounding whitespace is trimmed and the
    /// remaining text must be non-empty.
    pub fn new(
        model_id: ModelId,
        position: Coordinates,
        text: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(RecordError::EmptyText);
        }
        Ok(Self {
            model_id,
            position,
            text,
        })
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn position(&self) -> Coordinates {
        self.position
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Apply a partial edit. Fails without modifying `self` if the new text
    /// is blank.
    pub fn apply(&mut self, update: AnnotationUpdate) -> Result<(), RecordError> {
        let text = match update.text {
            Some(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(RecordError::EmptyText);
                }
                Some(text)
            }
            None => None,
        };

        if let Some(text) = text {
            self.text = text;
        }
        if let Some(position) = update.position {
            self.position = position;
        }
        Ok(())
    }
}

/// Partial edit of an annotation; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationUpdate {
    pub text: Option<String>,
    pub position: Option<Coordinates>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_trimmed() {
        let a = Annotation::new(3, Coordinates::default(), "  caries on 36 \n").unwrap();
        assert_eq!(a.text(), "caries on 36");
    }

    #[test]
    fn test_blank_text_rejected() {
        let err = Annotation::new(3, Coordinates::default(), " \t ").unwrap_err();
        assert!(matches!(err, RecordError::EmptyText));
    }

    #[test]
    fn test_update_moves_and_retexts() {
        let mut a = Annotation::new(3, Coordinates::default(), "old").unwrap();
        a.apply(AnnotationUpdate {
            text: Some(" new note ".to_string()),
            position: Some(Coordinates::new(1.0, 2.0, 3.0)),
        })
        .unwrap();
        assert_eq!(a.text(), "new note");
        assert_eq!(a.position(), Coordinates::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_update_rejects_blank_text() {
        let mut a = Annotation::new(3, Coordinates::default(), "keep").unwrap();
        let err = a
            .apply(AnnotationUpdate {
                text: Some("  ".to_string()),
                position: Some(Coordinates::new(5.0, 5.0, 5.0)),
            })
            .unwrap_err();
        assert!(matches!(err, RecordError::EmptyText));
        assert_eq!(a.text(), "keep");
        assert_eq!(a.position(), Coordinates::default());
    }

    #[test]
    fn test_deserialize_validates_text() {
        let json = r#"{ "model_id": 1, "position": { "x": 0.0, "y": 0.0, "z": 0.0 }, "text": "" }"#;
        assert!(serde_json::from_str::<Annotation>(json).is_err());
    }
}
