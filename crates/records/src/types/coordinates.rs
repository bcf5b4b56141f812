//! World-space coordinates as stored in records.

use serde::{Deserialize, Serialize};

/// A point in model space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Coordinates {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn from_array([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }

    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Coordinates {
    fn from(value: [f32; 3]) -> Self {
        Self::from_array(value)
    }
}

impl From<Coordinates> for [f32; 3] {
    fn from(value: Coordinates) -> Self {
        value.to_array()
    }
}
