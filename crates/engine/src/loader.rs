//! Mesh loading seam.
//!
//! A [`MeshLoader`] turns a model reference into a validated
//! [`TriangleMesh`]. Any error is fatal to the viewing session that asked
//! for the mesh.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use glam::Vec3;
use tracing::info;

use crate::error::{LoadError, MeshError};
use crate::mesh::TriangleMesh;
use crate::stl::parse_stl;

/// Supplies meshes by reference (file name, URL, asset key)
#[allow(async_fn_in_trait)]
pub trait MeshLoader {
    async fn load(&self, reference: &str) -> Result<TriangleMesh, LoadError>;
}

/// Raw mesh data; every load builds a fresh [`TriangleMesh`] with its own id
#[derive(Debug, Clone, Default)]
pub struct MeshSource {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub normals: Option<Vec<Vec3>>,
}

impl MeshSource {
    pub fn build(&self) -> Result<TriangleMesh, MeshError> {
        TriangleMesh::new(
            self.positions.clone(),
            self.triangles.clone(),
            self.normals.clone(),
        )
    }
}

/// Serves meshes registered up front
#[derive(Debug, Clone, Default)]
pub struct StaticMeshLoader {
    meshes: HashMap<String, MeshSource>,
}

impl StaticMeshLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, source: MeshSource) {
        self.meshes.insert(reference.into(), source);
    }

    pub fn with_mesh(mut self, reference: impl Into<String>, source: MeshSource) -> Self {
        self.insert(reference, source);
        self
    }
}

impl MeshLoader for StaticMeshLoader {
    async fn load(&self, reference: &str) -> Result<TriangleMesh, LoadError> {
        let source = self
            .meshes
            .get(reference)
            .ok_or_else(|| LoadError::Unavailable(format!("no mesh registered as {:?}", reference)))?;
        Ok(source.build()?)
    }
}

/// Loads model files relative to a root directory.
///
/// Only STL is decoded; other extensions fail with
/// [`LoadError::UnsupportedFormat`]. References must stay inside the root:
/// absolute paths and `..` components are refused as unavailable.
#[derive(Debug, Clone)]
pub struct FileMeshLoader {
    root: PathBuf,
}

impl FileMeshLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MeshLoader for FileMeshLoader {
    async fn load(&self, reference: &str) -> Result<TriangleMesh, LoadError> {
        let relative = Path::new(reference);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(LoadError::Unavailable(format!(
                "{:?} is outside the model directory",
                reference
            )));
        }

        let path = self.root.join(relative);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if extension.as_deref() != Some("stl") {
            return Err(LoadError::UnsupportedFormat(reference.to_string()));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| LoadError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let mesh = parse_stl(&bytes)?;
        info!(
            "Loaded {} ({} faces, {} vertices)",
            path.display(),
            mesh.face_count(),
            mesh.vertex_count()
        );
        Ok(mesh)
    }
}
