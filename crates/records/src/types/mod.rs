//! Type definitions for persisted records.

mod annotation;
mod color;
mod coordinates;
mod measurement;
mod selection;

pub use annotation::*;
pub use color::*;
pub use coordinates::*;
pub use measurement::*;
pub use selection::*;

/// Trim free text; blank strings become `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
