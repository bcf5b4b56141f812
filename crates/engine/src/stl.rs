//! STL decoding into an indexed [`TriangleMesh`].
//!
//! STL stores every triangle with its own three corners, so adjacency would
//! be empty if the corners were kept apart. Corners with bit-identical
//! coordinates are welded into one vertex.
//!
//! Binary layout:
//!
//! ```text
//! UINT8[80]    header (ignored)
//! UINT32       triangle count
//! foreach triangle
//!     REAL32[3] normal (ignored, recomputed)
//!     REAL32[3] vertex 1
//!     REAL32[3] vertex 2
//!     REAL32[3] vertex 3
//!     UINT16    attribute byte count
//! ```

use std::collections::HashMap;

use glam::Vec3;
use tracing::debug;

use crate::error::LoadError;
use crate::mesh::TriangleMesh;

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

/// Decode binary or ASCII STL bytes.
pub fn parse_stl(bytes: &[u8]) -> Result<TriangleMesh, LoadError> {
    let corners = if is_binary(bytes) {
        read_binary(bytes)?
    } else if bytes.trim_ascii_start().starts_with(b"solid") {
        read_ascii(bytes)?
    } else {
        return Err(LoadError::InvalidStl("neither binary nor ASCII STL".to_string()));
    };

    let (positions, triangles) = weld(&corners);
    debug!(
        "Decoded STL: {} corners welded into {} vertices",
        corners.len(),
        positions.len()
    );
    Ok(TriangleMesh::new(positions, triangles, None)?)
}

/// A binary file's size is fully determined by its triangle count. ASCII
/// files may also start with "solid", so the size check decides.
fn is_binary(bytes: &[u8]) -> bool {
    match triangle_count(bytes) {
        Some(count) => bytes.len() == HEADER_SIZE + 4 + count * TRIANGLE_SIZE,
        None => false,
    }
}

fn triangle_count(bytes: &[u8]) -> Option<usize> {
    let raw: [u8; 4] = bytes.get(HEADER_SIZE..HEADER_SIZE + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw) as usize)
}

fn read_binary(bytes: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    let count = triangle_count(bytes)
        .ok_or_else(|| LoadError::InvalidStl("truncated header".to_string()))?;
    let mut corners = Vec::with_capacity(count * 3);

    for record in bytes[HEADER_SIZE + 4..].chunks_exact(TRIANGLE_SIZE) {
        // Skip the 12-byte normal
        for offset in [12, 24, 36] {
            corners.push(read_vec3(&record[offset..offset + 12]));
        }
    }
    Ok(corners)
}

fn read_vec3(buf: &[u8]) -> Vec3 {
    let f = |i: usize| f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
    Vec3::new(f(0), f(4), f(8))
}

fn read_ascii(bytes: &[u8]) -> Result<Vec<Vec3>, LoadError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| LoadError::InvalidStl(format!("ASCII STL is not UTF-8: {}", e)))?;

    let mut corners = Vec::new();
    let mut facet: Vec<Vec3> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some("outer") => facet.clear(),
            Some("vertex") => {
                let mut coord = || -> Result<f32, LoadError> {
                    parts
                        .next()
                        .and_then(|p| p.parse().ok())
                        .ok_or_else(|| {
                            LoadError::InvalidStl(format!("bad vertex on line {}", line_no + 1))
                        })
                };
                let (x, y, z) = (coord()?, coord()?, coord()?);
                facet.push(Vec3::new(x, y, z));
            }
            Some("endfacet") => {
                if facet.len() != 3 {
                    return Err(LoadError::InvalidStl(format!(
                        "facet ending on line {} has {} vertices",
                        line_no + 1,
                        facet.len()
                    )));
                }
                corners.append(&mut facet);
            }
            Some("endsolid") => break,
            _ => {}
        }
    }
    Ok(corners)
}

/// Merge corners with identical coordinates; `-0.0` and `0.0` are the same.
fn weld(corners: &[Vec3]) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let mut lookup: HashMap<[u32; 3], u32> = HashMap::new();
    let mut positions = Vec::new();
    let mut indices = Vec::with_capacity(corners.len());

    for &corner in corners {
        let key = (corner + Vec3::ZERO).to_array().map(f32::to_bits);
        let index = *lookup.entry(key).or_insert_with(|| {
            positions.push(corner);
            (positions.len() - 1) as u32
        });
        indices.push(index);
    }

    let triangles = indices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    (positions, triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_index::FaceAdjacency;

    fn binary_stl(triangles: &[[Vec3; 3]]) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for triangle in triangles {
            bytes.extend_from_slice(&[0u8; 12]);
            for corner in triangle {
                for c in corner.to_array() {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&0u16.to_le_bytes());
        }
        bytes
    }

    fn quad() -> [[Vec3; 3]; 2] {
        [
            [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)],
            [Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
        ]
    }

    #[test]
    fn test_binary_stl_is_welded() {
        let mesh = parse_stl(&binary_stl(&quad())).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);

        let adjacency = FaceAdjacency::build(&mesh);
        assert!(adjacency.are_adjacent(0, 1));
    }

    #[test]
    fn test_binary_header_starting_with_solid() {
        let mut bytes = binary_stl(&quad());
        bytes[..5].copy_from_slice(b"solid");
        let mesh = parse_stl(&bytes).unwrap();
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn test_ascii_stl() {
        let text = "solid quad
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid quad
";
        let mesh = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangles()[1], [0, 2, 3]);
    }

    #[test]
    fn test_ascii_bad_vertex() {
        let text = "solid x\nfacet\nouter loop\nvertex 0 zero 0\n";
        let err = parse_stl(text.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidStl(_)));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = parse_stl(b"PLY format").unwrap_err();
        assert!(matches!(err, LoadError::InvalidStl(_)));
    }

    #[test]
    fn test_negative_zero_welds() {
        let (positions, triangles) = weld(&[
            Vec3::new(-0.0, 0.0, 0.0),
            Vec3::X,
            Vec3::Y,
            Vec3::ZERO,
            Vec3::Y,
            Vec3::Z,
        ]);
        assert_eq!(positions.len(), 4);
        assert_eq!(triangles, vec![[0, 1, 2], [0, 2, 3]]);
    }
}
