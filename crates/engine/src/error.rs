//! Error types for mesh construction and mesh loading.

/// A mesh that violates the indexed-triangle-mesh invariants.
///
/// Fatal for the viewing session: no engine state is built from a
/// malformed mesh.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("Face {face} references vertex {vertex}, but the mesh has {vertex_count} vertices")]
    IndexOutOfBounds {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },
    #[error("Index count {0} is not divisible by 3")]
    IndexCountNotMultipleOfThree(usize),
    #[error("Mesh has {normals} normals for {positions} positions")]
    NormalCountMismatch { normals: usize, positions: usize },
    #[error("Mesh has no {0} attribute")]
    MissingAttribute(&'static str),
}

/// Errors surfaced by a [`MeshLoader`](crate::loader::MeshLoader).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Mesh unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed mesh: {0}")]
    Malformed(#[from] MeshError),
    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid STL: {0}")]
    InvalidStl(String),
}

/// Errors returned by [`ViewingSession`](crate::session::ViewingSession)
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Invalid engine config: {0}")]
    Config(#[from] meshmark_config::ConfigError),

    #[error(transparent)]
    Record(#[from] meshmark_records::RecordError),

    #[error(transparent)]
    Persistence(#[from] crate::persistence::PersistenceError),

    #[error("No annotation point has been picked")]
    NoPendingAnnotation,

    #[error("No local record with id {0}")]
    UnknownRecord(u64),
}
