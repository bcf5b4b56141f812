//! Shared configuration for meshmark
//!
//! This crate provides the single source of truth for the tunables of the
//! annotation engine: undo history depth, flood-fill budgets, and the colors
//! used when rendering selected and unselected geometry.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[cfg(feature = "bevy")]
use bevy::prelude::Resource;

/// Default number of selection snapshots kept for undo/redo
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Default face budget for connected-region expansion
pub const DEFAULT_GROUP_FACE_BUDGET: usize = 50_000;

/// Default cap on faces added by a single "select nearby" click
pub const DEFAULT_NEARBY_FACE_LIMIT: usize = 100;

/// Default ring count for "select nearby"
pub const DEFAULT_NEARBY_RINGS: usize = 1;

/// Default highlight color for selected faces
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFD700";

/// Default color for unselected faces
pub const DEFAULT_BASE_COLOR: &str = "#E0E0E0";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "bevy", derive(Resource))]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum selection snapshots retained; oldest are dropped first
    pub history_limit: usize,
    /// Face budget for region expansion and adjacency grouping
    pub group_face_budget: usize,
    /// Maximum faces added by one "select nearby" click
    pub nearby_face_limit: usize,
    /// Topological rings walked by "select nearby"
    pub nearby_rings: usize,
    /// Hex color (`#RRGGBB`) for selected faces
    pub highlight_color: String,
    /// Hex color (`#RRGGBB`) for unselected faces
    pub base_color: String,
    /// Clear the live selection once it has been saved
    pub clear_after_save: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            group_face_budget: DEFAULT_GROUP_FACE_BUDGET,
            nearby_face_limit: DEFAULT_NEARBY_FACE_LIMIT,
            nearby_rings: DEFAULT_NEARBY_RINGS,
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            base_color: DEFAULT_BASE_COLOR.to_string(),
            clear_after_save: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check that every value is usable by the engine
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: "must keep at least one snapshot".to_string(),
            });
        }
        if self.group_face_budget == 0 {
            return Err(ConfigError::Invalid {
                field: "group_face_budget",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.nearby_face_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "nearby_face_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        for (field, value) in [
            ("highlight_color", &self.highlight_color),
            ("base_color", &self.base_color),
        ] {
            if !is_hex_color(value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected #RRGGBB, got {:?}", value),
                });
            }
        }
        Ok(())
    }
}

/// `#RRGGBB`, case-insensitive
fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.group_face_budget, DEFAULT_GROUP_FACE_BUDGET);
        assert_eq!(config.highlight_color, "#FFD700");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r##"{ "history_limit": 8 }"##).unwrap();
        assert_eq!(config.history_limit, 8);
        assert_eq!(config.nearby_rings, DEFAULT_NEARBY_RINGS);
        assert!(config.clear_after_save);
    }

    #[test]
    fn test_rejects_zero_history() {
        let err = EngineConfig::from_json_str(r##"{ "history_limit": 0 }"##).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "history_limit",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_bad_color() {
        let err =
            EngineConfig::from_json_str(r##"{ "highlight_color": "gold" }"##).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "highlight_color",
                ..
            }
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r##"{{ "base_color": "#101010", "nearby_rings": 3 }}"##).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.base_color, "#101010");
        assert_eq!(config.nearby_rings, 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::load("/nonexistent/meshmark.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
