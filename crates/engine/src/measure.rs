//! Point-to-point distance.
//!
//! Inputs are not validated; NaN or infinite coordinates propagate to the
//! result.

use glam::Vec3;
use meshmark_records::{Measurement, ModelId};

/// Euclidean distance `sqrt(dx² + dy² + dz²)` between two points
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    let d = b - a;
    (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
}

/// Measurement record for a completed two-point gesture
pub fn measurement_between(
    model_id: ModelId,
    point_a: Vec3,
    point_b: Vec3,
    note: Option<String>,
) -> Measurement {
    Measurement::new(model_id, point_a.to_array().into(), point_b.to_array().into(), note)
}
