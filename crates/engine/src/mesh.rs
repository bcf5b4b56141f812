//! Immutable indexed triangle mesh consumed by the engine.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec3};
use tracing::debug;

use crate::error::MeshError;

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a loaded mesh.
///
/// Derived data (adjacency, partitions) is keyed on this id and is only
/// invalidated when a different mesh is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }
}

/// Indexed triangle mesh: vertex positions, one index triple per face, and
/// per-vertex normals.
///
/// Every index is checked against the position count on construction, so all
/// face lookups on a built mesh are in range. The bounding box and the
/// unit-size normalization scale are computed once here rather than per frame.
#[derive(Debug)]
pub struct TriangleMesh {
    id: MeshId,
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    bounds: Aabb,
    normalization_scale: f32,
}

impl TriangleMesh {
    /// Build a mesh from positions and triangle index triples.
    ///
    /// Normals are computed (area-weighted) when not supplied.
    pub fn new(
        positions: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
        normals: Option<Vec<Vec3>>,
    ) -> Result<Self, MeshError> {
        let vertex_count = positions.len();
        for (face, tri) in triangles.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfBounds {
                    face,
                    vertex,
                    vertex_count,
                });
            }
        }

        let normals = match normals {
            Some(normals) if normals.len() != vertex_count => {
                return Err(MeshError::NormalCountMismatch {
                    normals: normals.len(),
                    positions: vertex_count,
                });
            }
            Some(normals) => normals,
            None => compute_vertex_normals(&positions, &triangles),
        };

        let mut bounds = Aabb::empty();
        for &p in &positions {
            bounds.include_point(p);
        }
        let max_dim = bounds.size().max_element();
        let normalization_scale = if max_dim > 0.0 && max_dim.is_finite() {
            1.0 / max_dim
        } else {
            1.0
        };

        let id = MeshId::next();
        debug!(
            "TriangleMesh {:?}: {} vertices, {} faces, scale {}",
            id,
            vertex_count,
            triangles.len(),
            normalization_scale
        );

        Ok(Self {
            id,
            positions,
            triangles,
            normals,
            bounds,
            normalization_scale,
        })
    }

    /// Build a mesh from a flat index buffer (3 indices per face).
    pub fn from_flat_indices(
        positions: Vec<Vec3>,
        indices: &[u32],
        normals: Option<Vec<Vec3>>,
    ) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexCountNotMultipleOfThree(indices.len()));
        }
        let triangles = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self::new(positions, triangles, normals)
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex indices of a face
    pub fn triangle(&self, face: u32) -> Option<[u32; 3]> {
        self.triangles.get(face as usize).copied()
    }

    /// Vertex positions of a face
    pub fn triangle_positions(&self, face: u32) -> Option<[Vec3; 3]> {
        let [a, b, c] = self.triangle(face)?;
        Some([
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ])
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Uniform scale that fits the mesh's largest dimension to 1.0
    pub fn normalization_scale(&self) -> f32 {
        self.normalization_scale
    }

    /// Model matrix that centers the mesh on the origin and scales it to
    /// unit size
    pub fn normalization_transform(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.normalization_scale))
            * Mat4::from_translation(-self.bounds.center())
    }
}

/// Area-weighted vertex normals
fn compute_vertex_normals(positions: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for &[a, b, c] in triangles {
        let (pa, pb, pc) = (
            positions[a as usize],
            positions[b as usize],
            positions[c as usize],
        );
        // Unnormalized cross product weights by twice the triangle area
        let n = (pb - pa).cross(pc - pa);
        normals[a as usize] += n;
        normals[b as usize] += n;
        normals[c as usize] += n;
    }
    normals.iter().map(|n| n.normalize_or_zero()).collect()
}
