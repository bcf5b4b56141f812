//! meshmark engine - interactive face selection, measurement and annotation
//! over indexed triangle meshes
//!
//! This crate provides:
//! - [`mesh`] - Immutable mesh with identity, bounds and normals
//! - [`mesh_index`] - Edge-sharing face adjacency
//! - [`selection`] - Live selection with snapshot undo/redo
//! - [`grouping`] - Connected-region flood fills with face budgets
//! - [`raycast`] - Ray construction and nearest-hit picking
//! - [`router`] - Interaction modes and click dispatch
//! - [`partition`] - Selected/unselected geometry for rendering
//! - [`measure`] and [`annotate`] - Record builders for user gestures
//! - [`persistence`] and [`loader`] - Storage and mesh loading seams
//! - [`session`] - One open model tying the above together

pub mod annotate;
#[cfg(feature = "bevy")]
pub mod bevy_mesh;
pub mod error;
pub mod grouping;
pub mod loader;
pub mod measure;
pub mod mesh;
pub mod mesh_index;
pub mod partition;
pub mod persistence;
pub mod raycast;
pub mod router;
pub mod selection;
pub mod session;
pub mod stl;

pub use error::{LoadError, MeshError, SessionError};
pub use grouping::{Expansion, Grouping, expand_region, faces_within_rings, group_adjacent};
pub use loader::{FileMeshLoader, MeshLoader, MeshSource, StaticMeshLoader};
pub use mesh::{Aabb, MeshId, TriangleMesh};
pub use mesh_index::FaceAdjacency;
pub use partition::{GpuVertex, MeshPartition, OwnedSubmesh, PartitionCache, Submesh, partition};
pub use persistence::{JsonFileStore, MemoryStore, PersistenceClient, PersistenceError};
pub use raycast::{PickHit, Ray, pick_normalized, pick_transformed, ray_from_ndc, raycast_mesh};
pub use router::{ClickOutcome, InteractionMode, InteractionRouter, MeasureStep, SelectBehavior};
pub use selection::{SelectionSnapshot, SelectionState, SnapshotId};
pub use session::{LocalId, LocalRecord, RenderView, SyncStatus, ViewingSession};

pub use meshmark_config as config;
pub use meshmark_records as records;
