//! Conversions between bevy meshes and engine meshes.

use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::Mesh;
use glam::Vec3;

use crate::error::MeshError;
use crate::mesh::TriangleMesh;
use crate::partition::OwnedSubmesh;

impl TriangleMesh {
    /// Build an engine mesh from an indexed bevy triangle list.
    ///
    /// Normals are taken from the mesh when present and computed otherwise.
    pub fn from_bevy_mesh(mesh: &Mesh) -> Result<Self, MeshError> {
        let positions: Vec<Vec3> = mesh
            .attribute(Mesh::ATTRIBUTE_POSITION)
            .and_then(|attr| attr.as_float3())
            .ok_or(MeshError::MissingAttribute("position"))?
            .iter()
            .map(|&p| Vec3::from_array(p))
            .collect();

        let normals: Option<Vec<Vec3>> = mesh
            .attribute(Mesh::ATTRIBUTE_NORMAL)
            .and_then(|attr| attr.as_float3())
            .map(|n| n.iter().map(|&v| Vec3::from_array(v)).collect());

        let indices: Vec<u32> = match mesh.indices() {
            Some(Indices::U16(idx)) => idx.iter().map(|&i| i as u32).collect(),
            Some(Indices::U32(idx)) => idx.to_vec(),
            None => return Err(MeshError::MissingAttribute("indices")),
        };

        Self::from_flat_indices(positions, &indices, normals)
    }
}

impl OwnedSubmesh {
    /// Standalone bevy mesh for one partition bucket
    pub fn to_bevy_mesh(&self) -> Mesh {
        let positions: Vec<[f32; 3]> = self.positions.iter().map(|p| p.to_array()).collect();
        let normals: Vec<[f32; 3]> = self.normals.iter().map(|n| n.to_array()).collect();

        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        );
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        mesh.insert_indices(Indices::U32(self.indices.clone()));
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::partition::partition;

    fn quad() -> Mesh {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        );
        mesh.insert_attribute(
            Mesh::ATTRIBUTE_POSITION,
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
        );
        mesh.insert_indices(Indices::U16(vec![0, 1, 2, 0, 2, 3]));
        mesh
    }

    #[test]
    fn test_from_bevy_mesh() {
        let mesh = TriangleMesh::from_bevy_mesh(&quad()).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.triangles()[1], [0, 2, 3]);
        assert!((mesh.normals()[0] - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_missing_indices() {
        let mut mesh = quad();
        mesh.remove_indices();
        let err = TriangleMesh::from_bevy_mesh(&mesh).unwrap_err();
        assert!(matches!(err, MeshError::MissingAttribute("indices")));
    }

    #[test]
    fn test_submesh_to_bevy_mesh() {
        let mesh = TriangleMesh::from_bevy_mesh(&quad()).unwrap();
        let (selected, _) = partition(&mesh, &BTreeSet::from([1]));
        let bevy_mesh = selected.to_owned_submesh(&mesh).to_bevy_mesh();

        assert_eq!(bevy_mesh.count_vertices(), 3);
        assert_eq!(bevy_mesh.indices().map(|i| i.len()), Some(3));
    }
}
