//! Bounding volumes and frustum culling
//!
//! Plane extraction follows Gribb-Hartmann for a zero-to-one depth range:
//! the near plane is the third row of the clip matrix on its own.

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl BoundingBox {
    /// Create a new box from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box centered at a point with given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Unit cube spanning `[-0.5, 0.5]` on every axis
    pub fn unit() -> Self {
        Self::from_center_extents(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5))
    }

    /// The eight corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing this box after an affine transform
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for corner in self.corners() {
            let p = matrix.transform_point(&corner.into()).coords;
            min = min.inf(&p);
            max = max.sup(&p);
        }
        Self { min, max }
    }
}

/// Sphere used to cull lights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// 2D rectangle from a position and a size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Bottom-left corner
    pub position: Vec2,
    /// Width and height
    pub size: Vec2,
}

impl Rect {
    /// Create a rectangle
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self { position, size }
    }

    /// Flat box lying in the z = 0 plane
    pub fn to_bounding_box(&self) -> BoundingBox {
        let max = self.position + self.size;
        BoundingBox::new(
            Vec3::new(self.position.x, self.position.y, 0.0),
            Vec3::new(max.x, max.y, 0.0),
        )
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Build a normalized plane from `ax + by + cz + d`
    pub fn from_vec4(v: Vec4) -> Self {
        let normal = Vec3::new(v.x, v.y, v.z);
        let length = normal.magnitude();
        if length <= f32::EPSILON {
            return Self { normal: Vec3::zeros(), distance: 0.0 };
        }
        Self { normal: normal / length, distance: v.w / length }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes (left, right, bottom, top, near, far), normals pointing inward
    pub planes: [Plane; 6],
}

impl Default for Frustum {
    fn default() -> Self {
        Self::from_matrix(&Mat4::identity())
    }
}

impl Frustum {
    /// Extract frustum planes from a projection-view matrix
    pub fn from_matrix(m: &Mat4) -> Self {
        let row = |i: usize| Vec4::new(m[(i, 0)], m[(i, 1)], m[(i, 2)], m[(i, 3)]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_vec4(r3 + r0),
                Plane::from_vec4(r3 - r0),
                Plane::from_vec4(r3 + r1),
                Plane::from_vec4(r3 - r1),
                Plane::from_vec4(r2),
                Plane::from_vec4(r3 - r2),
            ],
        }
    }

    /// Check if a box is inside or intersects the frustum
    pub fn intersects_box(&self, bounds: &BoundingBox) -> bool {
        for plane in &self.planes {
            // Positive vertex: the corner furthest along the plane normal
            let mut p = bounds.min;
            if plane.normal.x >= 0.0 { p.x = bounds.max.x; }
            if plane.normal.y >= 0.0 { p.y = bounds.max.y; }
            if plane.normal.z >= 0.0 { p.z = bounds.max.z; }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }

    /// Check if a sphere is inside or intersects the frustum
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{look_at, orthographic_zo, perspective_zo};
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn camera_frustum() -> Frustum {
        let proj = perspective_zo(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        Frustum::from_matrix(&(proj * view))
    }

    #[test]
    fn test_box_in_front_of_camera_is_visible() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_box(&BoundingBox::unit()));
    }

    #[test]
    fn test_box_behind_camera_is_culled() {
        let frustum = camera_frustum();
        let behind = BoundingBox::from_center_extents(Vec3::new(0.0, 0.0, 20.0), Vec3::repeat(0.5));
        assert!(!frustum.intersects_box(&behind));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let frustum = camera_frustum();
        let far = BoundingBox::from_center_extents(Vec3::new(0.0, 0.0, -200.0), Vec3::repeat(0.5));
        assert!(!frustum.intersects_box(&far));
    }

    #[test]
    fn test_orthographic_frustum_near_plane_at_zero_depth() {
        let frustum = Frustum::from_matrix(&orthographic_zo(-1.0, 1.0, -1.0, 1.0, 1.0, 10.0));
        let near = frustum.planes[4];
        assert_relative_eq!(near.distance_to_point(Vec3::new(0.0, 0.0, -1.0)), 0.0, epsilon = EPSILON);
        assert!(near.distance_to_point(Vec3::new(0.0, 0.0, -5.0)) > 0.0);
    }

    #[test]
    fn test_sphere_culling() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 6.0)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0)));
    }

    #[test]
    fn test_transformed_box_encloses_rotated_corners() {
        let rotation = Mat4::from_euler_angles(0.0, std::f32::consts::FRAC_PI_4, 0.0);
        let moved = Mat4::new_translation(&Vec3::new(3.0, 0.0, 0.0)) * rotation;
        let bounds = BoundingBox::unit().transformed(&moved);

        let half_diag = 0.5 * std::f32::consts::SQRT_2;
        assert_relative_eq!(bounds.min.x, 3.0 - half_diag, epsilon = EPSILON);
        assert_relative_eq!(bounds.max.x, 3.0 + half_diag, epsilon = EPSILON);
        assert_relative_eq!(bounds.max.y, 0.5, epsilon = EPSILON);
    }

    #[test]
    fn test_rect_bounding_box() {
        let rect = Rect::new(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0));
        let bounds = rect.to_bounding_box();
        assert_eq!(bounds.min, Vec3::new(1.0, 2.0, 0.0));
        assert_relative_eq!(bounds.max.x, 4.0, epsilon = EPSILON);
        assert_relative_eq!(bounds.max.y, 6.0, epsilon = EPSILON);
        assert_relative_eq!(bounds.max.z, 0.0, epsilon = EPSILON);
    }
}
