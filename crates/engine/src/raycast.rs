//! Ray-mesh picking.
//!
//! Ray-triangle intersection uses the Moller-Trumbore algorithm. The router
//! only consumes the nearest [`PickHit`]; this module is the default way of
//! producing one from a pointer position.

use glam::{Mat4, Vec2, Vec3};

use crate::mesh::TriangleMesh;

/// Epsilon for floating point comparisons in ray intersection
const EPSILON: f32 = 1e-6;

/// A ray with a normalized direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray; `direction` is normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Moller-Trumbore test against one triangle.
    ///
    /// Returns the hit in front of the origin, if any. Both windings are
    /// accepted; triangles edge-on to the ray never hit.
    pub fn hit_triangle(&self, [a, b, c]: [Vec3; 3]) -> Option<TriangleHit> {
        let ab = b - a;
        let ac = c - a;

        let p = self.direction.cross(ac);
        let det = ab.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = det.recip();

        // Barycentric weight of `b`
        let to_origin = self.origin - a;
        let u = to_origin.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        // Barycentric weight of `c`
        let q = to_origin.cross(ab);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = ac.dot(q) * inv_det;
        (t >= EPSILON).then_some(TriangleHit { t, u, v })
    }
}

/// Result of a ray-triangle intersection test
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Distance along the ray to the intersection point
    pub t: f32,
    /// Barycentric coordinate u (weight for vertex 1)
    pub u: f32,
    /// Barycentric coordinate v (weight for vertex 2)
    pub v: f32,
}

impl TriangleHit {
    /// Blend a per-corner attribute at the hit
    pub fn blend(&self, [a, b, c]: [Vec3; 3]) -> Vec3 {
        a * (1.0 - self.u - self.v) + b * self.u + c * self.v
    }
}

/// Nearest intersection of a ray with a mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// Index of the face that was hit
    pub face: u32,
    /// Hit position in mesh space
    pub point: Vec3,
    /// Distance along the ray, in mesh units
    pub distance: f32,
    /// Interpolated vertex normal at the hit
    pub normal: Vec3,
}

/// Cast a ray in mesh space and return the closest hit, or `None` on a miss.
pub fn raycast_mesh(ray: &Ray, mesh: &TriangleMesh) -> Option<PickHit> {
    let corners = |values: &[Vec3], [a, b, c]: [u32; 3]| {
        [values[a as usize], values[b as usize], values[c as usize]]
    };

    // Brute force over all faces
    let (face, hit) = mesh
        .triangles()
        .iter()
        .enumerate()
        .filter_map(|(face, &tri)| {
            ray.hit_triangle(corners(mesh.positions(), tri))
                .map(|hit| (face, hit))
        })
        .min_by(|(_, x), (_, y)| x.t.total_cmp(&y.t))?;

    let triangle = mesh.triangles()[face];
    Some(PickHit {
        face: face as u32,
        point: ray.at(hit.t),
        distance: hit.t,
        normal: hit.blend(corners(mesh.normals(), triangle)).normalize_or_zero(),
    })
}

/// Cast a world-space ray against a mesh drawn with the `model` matrix.
///
/// The returned point, normal and distance are in mesh space, so
/// measurements and annotations keep the model's own units.
pub fn pick_transformed(ray: &Ray, mesh: &TriangleMesh, model: Mat4) -> Option<PickHit> {
    if model.determinant() == 0.0 {
        return None;
    }
    let inverse = model.inverse();
    if !inverse.is_finite() {
        return None;
    }
    let local = Ray::new(
        inverse.transform_point3(ray.origin),
        inverse.transform_vector3(ray.direction),
    );
    raycast_mesh(&local, mesh)
}

/// Pick against a mesh drawn with its [`TriangleMesh::normalization_transform`]
pub fn pick_normalized(ray: &Ray, mesh: &TriangleMesh) -> Option<PickHit> {
    pick_transformed(ray, mesh, mesh.normalization_transform())
}

/// Build a world-space ray from a normalized device coordinate
/// (x and y in -1..1, y up) using the inverse of `projection * view`.
///
/// Assumes a 0..1 depth range. Returns `None` if the matrix does not produce a
/// usable direction.
pub fn ray_from_ndc(ndc: Vec2, inverse_view_projection: Mat4) -> Option<Ray> {
    let near = inverse_view_projection.project_point3(ndc.extend(0.0));
    let far = inverse_view_projection.project_point3(ndc.extend(1.0));
    let direction = far - near;
    if !direction.is_finite() || direction.length_squared() < EPSILON * EPSILON {
        return None;
    }
    Some(Ray::new(near, direction))
}

/// Convert a pointer position in pixels (origin top-left) to NDC.
pub fn pointer_to_ndc(pointer: Vec2, viewport_size: Vec2) -> Vec2 {
    Vec2::new(
        (pointer.x / viewport_size.x) * 2.0 - 1.0,
        1.0 - (pointer.y / viewport_size.y) * 2.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer_mesh() -> TriangleMesh {
        // Unit triangle at z=0 and a copy at z=-1
        TriangleMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(0.0, 1.0, -1.0),
            ],
            vec![[3, 4, 5], [0, 1, 2]],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_ray_triangle_hit() {
        let v0 = Vec3::new(0.0, 0.0, 0.0);
        let v1 = Vec3::new(1.0, 0.0, 0.0);
        let v2 = Vec3::new(0.0, 1.0, 0.0);

        let origin = Vec3::new(0.25, 0.25, 1.0);
        let dir = Vec3::new(0.0, 0.0, -1.0);

        let hit = Ray::new(origin, dir).hit_triangle([v0, v1, v2]).unwrap();
        assert!((hit.t - 1.0).abs() < EPSILON);
        assert!((hit.u - 0.25).abs() < EPSILON);
        assert!((hit.v - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_ray_triangle_miss_and_behind() {
        let v0 = Vec3::new(0.0, 0.0, 0.0);
        let v1 = Vec3::new(1.0, 0.0, 0.0);
        let v2 = Vec3::new(0.0, 1.0, 0.0);

        let miss = Vec3::new(2.0, 2.0, 1.0);
        assert!(Ray::new(miss, Vec3::NEG_Z).hit_triangle([v0, v1, v2]).is_none());

        let origin = Vec3::new(0.25, 0.25, 1.0);
        assert!(Ray::new(origin, Vec3::Z).hit_triangle([v0, v1, v2]).is_none());
        // Reversed winding still hits
        assert!(Ray::new(origin, Vec3::NEG_Z).hit_triangle([v0, v2, v1]).is_some());
    }

    #[test]
    fn test_raycast_returns_nearest_face() {
        let mesh = two_layer_mesh();
        let ray = Ray::new(Vec3::new(0.2, 0.2, 5.0), Vec3::NEG_Z);

        let hit = raycast_mesh(&ray, &mesh).unwrap();
        assert_eq!(hit.face, 1);
        assert!((hit.point - Vec3::new(0.2, 0.2, 0.0)).length() < 1e-5);
        assert!((hit.distance - 5.0).abs() < 1e-5);
        assert!((hit.normal - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_raycast_miss() {
        let mesh = two_layer_mesh();
        let ray = Ray::new(Vec3::new(3.0, 3.0, 5.0), Vec3::NEG_Z);
        assert!(raycast_mesh(&ray, &mesh).is_none());
    }

    #[test]
    fn test_transformed_pick_reports_mesh_space() {
        let mesh = two_layer_mesh();
        // Drawn at half size: mesh point (0.4, 0.4, 0) appears at (0.2, 0.2, 0)
        let model = Mat4::from_scale(Vec3::splat(0.5));
        let ray = Ray::new(Vec3::new(0.2, 0.2, 5.0), Vec3::NEG_Z);
        let hit = pick_transformed(&ray, &mesh, model).unwrap();
        assert!((hit.point - Vec3::new(0.4, 0.4, 0.0)).length() < 1e-5);
        assert!((hit.distance - 10.0).abs() < 1e-4);

        assert!(pick_transformed(&ray, &mesh, Mat4::ZERO).is_none());
    }

    #[test]
    fn test_pick_normalized() {
        let mesh = two_layer_mesh();
        // Bounds (0,0,-1)..(1,1,0): centered at (0.5,0.5,-0.5), scale 1
        let ray = Ray::new(Vec3::new(-0.3, -0.3, 5.0), Vec3::NEG_Z);
        let hit = pick_normalized(&ray, &mesh).unwrap();
        assert_eq!(hit.face, 1);
        assert!((hit.point - Vec3::new(0.2, 0.2, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_ray_from_ndc_center() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 100.0);
        let inverse = (projection * view).inverse();

        let ray = ray_from_ndc(Vec2::ZERO, inverse).unwrap();
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((ray.origin - Vec3::new(0.0, 0.0, 4.9)).length() < 1e-3);
    }

    #[test]
    fn test_pointer_to_ndc() {
        let size = Vec2::new(800.0, 600.0);
        assert_eq!(pointer_to_ndc(Vec2::new(400.0, 300.0), size), Vec2::ZERO);
        assert_eq!(pointer_to_ndc(Vec2::ZERO, size), Vec2::new(-1.0, 1.0));
    }
}
