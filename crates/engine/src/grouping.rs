//! Flood fills over [`FaceAdjacency`]: connected-component grouping of a
//! candidate face list, region expansion from a seed face, and k-ring
//! neighborhoods.
//!
//! Every fill takes a face budget. Hitting the budget stops the fill early and
//! sets `truncated`; the result is then partial, never wrong about the faces
//! it does contain.

use std::collections::{HashSet, VecDeque};

use tracing::warn;

use crate::mesh_index::FaceAdjacency;

/// Connected groups of a candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    /// Groups in first-discovery order; faces in discovery order
    pub groups: Vec<Vec<u32>>,
    /// Whether any group stopped at the face budget
    pub truncated: bool,
}

/// Faces reached by a fill from a single seed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Faces in discovery order, starting with the seed
    pub faces: Vec<u32>,
    pub truncated: bool,
}

/// Partition `candidates` into groups connected through shared edges, only
/// walking edges whose target is also a candidate.
///
/// Each input face lands in exactly one group. A group that reaches
/// `face_budget` faces stops growing; its unvisited neighbors start groups of
/// their own later, so the output is still a partition.
pub fn group_adjacent(
    adjacency: &FaceAdjacency,
    candidates: &[u32],
    face_budget: usize,
) -> Grouping {
    let candidate_set: HashSet<u32> = candidates.iter().copied().collect();
    let mut assigned: HashSet<u32> = HashSet::with_capacity(candidate_set.len());
    let mut grouping = Grouping::default();

    for &seed in candidates {
        if assigned.contains(&seed) {
            continue;
        }
        let expansion = flood_fill(adjacency, seed, face_budget, &mut assigned, |face| {
            candidate_set.contains(&face)
        });
        grouping.truncated |= expansion.truncated;
        grouping.groups.push(expansion.faces);
    }

    if grouping.truncated {
        warn!(
            "group_adjacent: face budget {} reached, {} faces split into {} groups",
            face_budget,
            candidate_set.len(),
            grouping.groups.len()
        );
    }
    grouping
}

/// Connected region containing `seed` (e.g. one tooth), up to `face_budget`
/// faces. Empty if `seed` is not a face of the mesh.
pub fn expand_region(adjacency: &FaceAdjacency, seed: u32, face_budget: usize) -> Expansion {
    if seed as usize >= adjacency.face_count() {
        return Expansion::default();
    }
    let mut visited = HashSet::new();
    let expansion = flood_fill(adjacency, seed, face_budget, &mut visited, |_| true);
    if expansion.truncated {
        warn!(
            "expand_region: stopped at {} faces from seed {}",
            expansion.faces.len(),
            seed
        );
    }
    expansion
}

/// Faces within `rings` edge-steps of `seed`, capped at `limit` faces.
///
/// Replaces an index-distance heuristic (`|i - j| <= radius`) that treated
/// faces with nearby indices as neighbors regardless of where they sit on
/// the surface.
pub fn faces_within_rings(
    adjacency: &FaceAdjacency,
    seed: u32,
    rings: usize,
    limit: usize,
) -> Expansion {
    if seed as usize >= adjacency.face_count() {
        return Expansion::default();
    }
    let limit = limit.max(1);

    let mut seen = HashSet::from([seed]);
    let mut faces = vec![seed];
    let mut frontier = vec![seed];

    for _ in 0..rings {
        let mut next = Vec::new();
        for &face in &frontier {
            for &neighbor in adjacency.faces_sharing_edge(face) {
                if !seen.insert(neighbor) {
                    continue;
                }
                if faces.len() == limit {
                    return Expansion {
                        faces,
                        truncated: true,
                    };
                }
                faces.push(neighbor);
                next.push(neighbor);
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    Expansion {
        faces,
        truncated: false,
    }
}

/// Breadth-first fill from `seed` through faces accepted by `admit`.
///
/// Faces are marked in `assigned` only once they join the result, so faces
/// left in the queue by a budget cutoff stay available to later fills.
fn flood_fill(
    adjacency: &FaceAdjacency,
    seed: u32,
    face_budget: usize,
    assigned: &mut HashSet<u32>,
    admit: impl Fn(u32) -> bool,
) -> Expansion {
    let face_budget = face_budget.max(1);
    let mut faces = Vec::new();
    let mut queued = HashSet::from([seed]);
    let mut queue = VecDeque::from([seed]);
    let mut truncated = false;

    while let Some(face) = queue.pop_front() {
        if faces.len() == face_budget {
            truncated = true;
            break;
        }
        assigned.insert(face);
        faces.push(face);

        for &neighbor in adjacency.faces_sharing_edge(face) {
            if admit(neighbor) && !assigned.contains(&neighbor) && queued.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    Expansion { faces, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_index::tests::{grid_mesh, mesh_from_triangles};

    fn assert_partition(grouping: &Grouping, candidates: &[u32]) {
        let mut seen: Vec<u32> = grouping.groups.iter().flatten().copied().collect();
        seen.sort_unstable();
        let mut expected: Vec<u32> = candidates.to_vec();
        expected.sort_unstable();
        expected.dedup();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_groups_follow_shared_edges() {
        let mesh = mesh_from_triangles(8, vec![[0, 1, 2], [1, 2, 3], [5, 6, 7]]);
        let adjacency = FaceAdjacency::build(&mesh);

        let grouping = group_adjacent(&adjacency, &[0, 1, 2], 100);
        assert_eq!(grouping.groups, vec![vec![0, 1], vec![2]]);
        assert!(!grouping.truncated);
    }

    #[test]
    fn test_group_order_is_discovery_order() {
        let mesh = mesh_from_triangles(8, vec![[0, 1, 2], [1, 2, 3], [5, 6, 7]]);
        let adjacency = FaceAdjacency::build(&mesh);

        let grouping = group_adjacent(&adjacency, &[2, 1, 0], 100);
        assert_eq!(grouping.groups, vec![vec![2], vec![1, 0]]);
    }

    #[test]
    fn test_edges_outside_candidates_are_not_followed() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);

        // Faces 0 and 6 are not adjacent; face 3 bridges them
        let grouping = group_adjacent(&adjacency, &[0, 6], 100);
        assert_eq!(grouping.groups, vec![vec![0], vec![6]]);

        let grouping = group_adjacent(&adjacency, &[0, 6, 3], 100);
        assert_eq!(grouping.groups, vec![vec![0, 3, 6]]);
    }

    #[test]
    fn test_duplicates_and_unknown_faces_still_partition() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);

        let candidates = [5, 5, 42, 4, 1];
        let grouping = group_adjacent(&adjacency, &candidates, 100);
        assert_partition(&grouping, &candidates);
        assert_eq!(grouping.groups, vec![vec![5, 4, 1], vec![42]]);
    }

    #[test]
    fn test_budget_truncates_but_keeps_partition() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);

        let candidates: Vec<u32> = (0..8).collect();
        let grouping = group_adjacent(&adjacency, &candidates, 3);
        assert!(grouping.truncated);
        assert!(grouping.groups.iter().all(|g| g.len() <= 3));
        assert_partition(&grouping, &candidates);
    }

    #[test]
    fn test_expand_region_covers_component() {
        let mesh = mesh_from_triangles(8, vec![[0, 1, 2], [1, 2, 3], [2, 3, 4], [5, 6, 7]]);
        let adjacency = FaceAdjacency::build(&mesh);

        let region = expand_region(&adjacency, 2, 100);
        assert_eq!(region.faces, vec![2, 1, 0]);
        assert!(!region.truncated);

        assert_eq!(expand_region(&adjacency, 3, 100).faces, vec![3]);
        assert!(expand_region(&adjacency, 9, 100).faces.is_empty());
    }

    #[test]
    fn test_expand_region_budget() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);

        let region = expand_region(&adjacency, 0, 4);
        assert_eq!(region.faces.len(), 4);
        assert_eq!(region.faces[0], 0);
        assert!(region.truncated);

        let region = expand_region(&adjacency, 0, 8);
        assert_eq!(region.faces.len(), 8);
        assert!(!region.truncated);
    }

    #[test]
    fn test_rings_use_topology_not_index_distance() {
        // Face 1 has the next index but sits far away from face 0
        let mesh = mesh_from_triangles(9, vec![[0, 1, 2], [6, 7, 8], [1, 2, 3]]);
        let adjacency = FaceAdjacency::build(&mesh);

        let nearby = faces_within_rings(&adjacency, 0, 1, 100);
        assert_eq!(nearby.faces, vec![0, 2]);
    }

    #[test]
    fn test_rings_grow_and_respect_limit() {
        let mesh = grid_mesh();
        let adjacency = FaceAdjacency::build(&mesh);

        assert_eq!(faces_within_rings(&adjacency, 1, 0, 100).faces, vec![1]);
        assert_eq!(faces_within_rings(&adjacency, 1, 1, 100).faces, vec![1, 0, 4]);

        let capped = faces_within_rings(&adjacency, 1, 3, 2);
        assert_eq!(capped.faces, vec![1, 0]);
        assert!(capped.truncated);
    }
}
