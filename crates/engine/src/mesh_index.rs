//! Edge-sharing face adjacency over an indexed triangle mesh.
//!
//! Two faces are adjacent when they share at least two vertex indices (an
//! edge). A single shared vertex is not enough.

use std::collections::HashMap;

use tracing::debug;

use crate::mesh::{MeshId, TriangleMesh};

/// Read-only adjacency view, built once per mesh.
///
/// Holds the [`MeshId`] of the mesh it was built from rather than a
/// reference to it, so it can live next to the mesh in the session.
#[derive(Debug, Clone)]
pub struct FaceAdjacency {
    mesh_id: MeshId,
    /// For each vertex, the faces using it
    vertex_faces: Vec<Vec<u32>>,
    /// For each face, the sorted faces sharing an edge with it
    neighbors: Vec<Vec<u32>>,
}

impl FaceAdjacency {
    /// Build the adjacency for `mesh`.
    ///
    /// Uses a vertex -> faces map so each face only inspects the faces
    /// touching its own three vertices.
    pub fn build(mesh: &TriangleMesh) -> Self {
        let mut vertex_faces: Vec<Vec<u32>> = vec![Vec::new(); mesh.vertex_count()];
        for (face, tri) in mesh.triangles().iter().enumerate() {
            for v in distinct_vertices(tri) {
                vertex_faces[v as usize].push(face as u32);
            }
        }

        let mut neighbors = Vec::with_capacity(mesh.face_count());
        let mut shared_counts: HashMap<u32, u8> = HashMap::new();
        for (face, tri) in mesh.triangles().iter().enumerate() {
            shared_counts.clear();
            for v in distinct_vertices(tri) {
                for &other in &vertex_faces[v as usize] {
                    if other as usize != face {
                        *shared_counts.entry(other).or_insert(0) += 1;
                    }
                }
            }

            let mut adjacent: Vec<u32> = shared_counts
                .iter()
                .filter(|&(_, &count)| count >= 2)
                .map(|(&other, _)| other)
                .collect();
            adjacent.sort_unstable();
            neighbors.push(adjacent);
        }

        debug!(
            "FaceAdjacency for {:?}: {} faces, {} adjacent pairs",
            mesh.id(),
            neighbors.len(),
            neighbors.iter().map(Vec::len).sum::<usize>() / 2
        );

        Self {
            mesh_id: mesh.id(),
            vertex_faces,
            neighbors,
        }
    }

    /// Mesh this adjacency was built from
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn face_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Faces sharing an edge with `face`, in ascending order. Never contains
    /// `face` itself; empty for an unknown face.
    pub fn faces_sharing_edge(&self, face: u32) -> &[u32] {
        self.neighbors
            .get(face as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn are_adjacent(&self, a: u32, b: u32) -> bool {
        self.faces_sharing_edge(a).binary_search(&b).is_ok()
    }

    /// Faces that use vertex `vertex`, in ascending order
    pub fn vertex_faces(&self, vertex: u32) -> &[u32] {
        self.vertex_faces
            .get(vertex as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// The distinct vertices of a triangle; degenerate triangles repeat indices
fn distinct_vertices(tri: &[u32; 3]) -> impl Iterator<Item = u32> + '_ {
    tri.iter()
        .enumerate()
        .filter(|&(i, v)| !tri[..i].contains(v))
        .map(|(_, &v)| v)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use glam::Vec3;

    /// Mesh with `vertex_count` vertices on a line; positions are irrelevant
    /// to adjacency.
    pub(crate) fn mesh_from_triangles(vertex_count: usize, triangles: Vec<[u32; 3]>) -> TriangleMesh {
        let positions = (0..vertex_count)
            .map(|i| Vec3::new(i as f32, (i % 2) as f32, 0.0))
            .collect();
        TriangleMesh::new(positions, triangles, None).unwrap()
    }

    /// 3x3 vertex grid split into 8 triangles (faces 0..8)
    pub(crate) fn grid_mesh() -> TriangleMesh {
        // 6 7 8
        // 3 4 5
        // 0 1 2
        let mut triangles = Vec::new();
        for row in 0..2u32 {
            for col in 0..2u32 {
                let bl = row * 3 + col;
                let br = bl + 1;
                let tl = bl + 3;
                let tr = tl + 1;
                triangles.push([bl, br, tr]);
                triangles.push([bl, tr, tl]);
            }
        }
        mesh_from_triangles(9, triangles)
    }

    #[test]
    fn test_shared_edge_required() {
        // Faces 0 and 1 share edge 1-2; face 2 only touches face 1 at vertex 3
        let mesh = mesh_from_triangles(6, vec![[0, 1, 2], [1, 2, 3], [3, 4, 5]]);
        let adjacency = FaceAdjacency::build(&mesh);

        assert_eq!(adjacency.faces_sharing_edge(0), &[1]);
        assert_eq!(adjacency.faces_sharing_edge(1), &[0]);
        assert!(adjacency.faces_sharing_edge(2).is_empty());
        assert!(!adjacency.are_adjacent(1, 2));
    }

    #[test]
    fn test_adjacency_is_symmetric_and_irreflexive() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);

        for f in 0..adjacency.face_count() as u32 {
            let neighbors = adjacency.faces_sharing_edge(f);
            assert!(!neighbors.contains(&f));
            for &g in neighbors {
                assert!(adjacency.faces_sharing_edge(g).contains(&f), "{} -> {}", f, g);
            }
        }
    }

    #[test]
    fn test_grid_neighbors() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);
        // Face 1 = [0, 4, 3]: 0-3 lies on the grid border
        assert_eq!(adjacency.faces_sharing_edge(1), &[0, 4]);
        // Face 3 = [1, 5, 4]: neighbors across 1-5, 5-4 and 4-1
        assert_eq!(adjacency.faces_sharing_edge(3), &[0, 2, 6]);
    }

    #[test]
    fn test_degenerate_triangle_counts_distinct_vertices() {
        // Face 0 collapses to the segment 1-2; it still shares that edge with face 1
        let mesh = mesh_from_triangles(4, vec![[1, 1, 2], [1, 2, 3], [0, 1, 3]]);
        let adjacency = FaceAdjacency::build(&mesh);
        assert_eq!(adjacency.faces_sharing_edge(0), &[1]);
        assert_eq!(adjacency.faces_sharing_edge(1), &[0, 2]);
    }

    #[test]
    fn test_vertex_faces() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);
        assert_eq!(adjacency.vertex_faces(4), &[0, 1, 3, 4, 6, 7]);
        assert!(adjacency.vertex_faces(99).is_empty());
        assert!(adjacency.faces_sharing_edge(99).is_empty());
    }
}
