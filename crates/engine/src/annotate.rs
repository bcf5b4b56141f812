//! Mapping a picked surface point to an annotation record.

use glam::Vec3;
use meshmark_records::{Annotation, ModelId, RecordError};

/// Annotation at `point` with user-supplied `text`.
///
/// Text is trimmed; blank text is rejected with [`RecordError::EmptyText`].
pub fn place_annotation(
    model_id: ModelId,
    point: Vec3,
    text: impl Into<String>,
) -> Result<Annotation, RecordError> {
    Annotation::new(model_id, point.to_array().into(), text)
}
