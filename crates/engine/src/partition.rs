//! Splitting a mesh into selected and unselected geometry for rendering.
//!
//! [`partition`] routes every triangle into one of two [`Submesh`]es that
//! reference the source vertex buffer by index. Backends that need
//! independent buffers call [`Submesh::to_owned_submesh`], which copies only
//! the vertices a bucket uses.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use glam::Vec3;
use tracing::debug;

use crate::mesh::{MeshId, TriangleMesh};
use crate::selection::{SelectionSnapshot, SnapshotId};

/// Triangles of one bucket, indexing the source mesh's vertices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submesh {
    /// Flat triangle list into the source positions
    indices: Vec<u32>,
    /// Source face index of each triangle, ascending
    face_ids: Vec<u32>,
}

impl Submesh {
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn face_ids(&self) -> &[u32] {
        &self.face_ids
    }

    pub fn face_count(&self) -> usize {
        self.face_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.face_ids.is_empty()
    }

    fn push(&mut self, face: u32, triangle: [u32; 3]) {
        self.face_ids.push(face);
        self.indices.extend_from_slice(&triangle);
    }

    /// Copy the referenced vertices into a compact, self-contained buffer.
    pub fn to_owned_submesh(&self, mesh: &TriangleMesh) -> OwnedSubmesh {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::with_capacity(self.indices.len());

        for &source in &self.indices {
            let local = *remap.entry(source).or_insert_with(|| {
                positions.push(mesh.positions()[source as usize]);
                normals.push(mesh.normals()[source as usize]);
                (positions.len() - 1) as u32
            });
            indices.push(local);
        }

        OwnedSubmesh {
            positions,
            normals,
            indices,
            face_ids: self.face_ids.clone(),
        }
    }
}

/// Selected and unselected halves of a mesh for one selection snapshot
#[derive(Debug, Clone)]
pub struct MeshPartition {
    pub mesh_id: MeshId,
    pub snapshot_id: SnapshotId,
    pub selected: Submesh,
    pub unselected: Submesh,
}

/// Route each triangle by membership in `selected`.
///
/// Every face lands in exactly one bucket. Selected indices that are not
/// faces of `mesh` are ignored.
pub fn partition(mesh: &TriangleMesh, selected: &BTreeSet<u32>) -> (Submesh, Submesh) {
    let mut picked = Submesh::default();
    let mut rest = Submesh::default();

    for (face, &triangle) in mesh.triangles().iter().enumerate() {
        let face = face as u32;
        if selected.contains(&face) {
            picked.push(face, triangle);
        } else {
            rest.push(face, triangle);
        }
    }

    (picked, rest)
}

/// Vertex layout for GPU upload
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Submesh with its own vertex buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnedSubmesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Flat triangle list into `positions`
    pub indices: Vec<u32>,
    pub face_ids: Vec<u32>,
}

impl OwnedSubmesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Interleaved vertices ready for upload
    pub fn gpu_vertices(&self) -> Vec<GpuVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .map(|(p, n)| GpuVertex {
                position: p.to_array(),
                normal: n.to_array(),
            })
            .collect()
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Memoizes the last partition on `(MeshId, SnapshotId)`.
///
/// Rendering asks for a partition every frame; the split is only recomputed
/// when the mesh or the selection snapshot changes.
#[derive(Debug, Default)]
pub struct PartitionCache {
    cached: Option<Arc<MeshPartition>>,
    recomputes: usize,
}

impl PartitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition for `snapshot`, reusing the cached one when it matches
    pub fn get_or_compute(
        &mut self,
        mesh: &TriangleMesh,
        snapshot: &SelectionSnapshot,
    ) -> Arc<MeshPartition> {
        if let Some(cached) = &self.cached {
            if cached.mesh_id == mesh.id() && cached.snapshot_id == snapshot.id() {
                return Arc::clone(cached);
            }
        }

        let (selected, unselected) = partition(mesh, snapshot.faces());
        debug!(
            "Partitioned mesh {:?}: {} selected, {} unselected",
            mesh.id(),
            selected.face_count(),
            unselected.face_count()
        );
        let computed = Arc::new(MeshPartition {
            mesh_id: mesh.id(),
            snapshot_id: snapshot.id(),
            selected,
            unselected,
        });
        self.recomputes += 1;
        self.cached = Some(Arc::clone(&computed));
        computed
    }

    /// Drop the cached partition
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Number of partitions computed so far
    pub fn recomputes(&self) -> usize {
        self.recomputes
    }
}
