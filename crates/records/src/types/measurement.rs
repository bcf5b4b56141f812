//! Point-to-point distance measurements.

use serde::{Deserialize, Serialize};

use super::{Coordinates, non_blank};
use crate::ModelId;

/// A straight-line measurement between two picked surface points.
///
/// The distance is always derived from the two points; deserialization
/// recomputes it rather than trusting the stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MeasurementFields")]
pub struct Measurement {
    model_id: ModelId,
    point_a: Coordinates,
    point_b: Coordinates,
    distance: f32,
    note: Option<String>,
}

#[derive(Deserialize)]
struct MeasurementFields {
    model_id: ModelId,
    point_a: Coordinates,
    point_b: Coordinates,
    #[serde(default)]
    note: Option<String>,
}

impl From<MeasurementFields> for Measurement {
    fn from(fields: MeasurementFields) -> Self {
        Self::new(fields.model_id, fields.point_a, fields.point_b, fields.note)
    }
}

impl Measurement {
    pub fn new(
        model_id: ModelId,
        point_a: Coordinates,
        point_b: Coordinates,
        note: Option<String>,
    ) -> Self {
        let dx = point_b.x - point_a.x;
        let dy = point_b.y - point_a.y;
        let dz = point_b.z - point_a.z;
        Self {
            model_id,
            point_a,
            point_b,
            distance: (dx * dx + dy * dy + dz * dz).sqrt(),
            note: non_blank(note),
        }
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn point_a(&self) -> Coordinates {
        self.point_a
    }

    pub fn point_b(&self) -> Coordinates {
        self.point_b
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Distance as shown in the measurement list, e.g. `5.00 mm`
    pub fn display_millimeters(&self) -> String {
        format!("{:.2} mm", self.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_derived() {
        let m = Measurement::new(
            7,
            Coordinates::new(0.0, 0.0, 0.0),
            Coordinates::new(3.0, 4.0, 0.0),
            None,
        );
        assert_eq!(m.distance(), 5.0);
        assert_eq!(m.display_millimeters(), "5.00 mm");
    }

    #[test]
    fn test_deserialize_recomputes_distance() {
        let json = r#"{
            "model_id": 1,
            "point_a": { "x": 1.0, "y": 0.0, "z": 0.0 },
            "point_b": { "x": 1.0, "y": 0.0, "z": 4.0 },
            "distance": 99.0,
            "note": "  "
        }"#;
        let m: Measurement = serde_json::from_str(json).unwrap();
        assert_eq!(m.distance(), 4.0);
        assert_eq!(m.note(), None);
    }
}
