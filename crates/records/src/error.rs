//! Error types for record construction and encoding.

/// Errors that can occur while building or encoding records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Annotation text must not be empty")]
    EmptyText,

    #[error("A saved selection needs at least one face")]
    EmptySelection,

    #[error("Invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}
