//! Math utilities and types
//!
//! Fundamental math types for the render graph. All projections follow a
//! right-handed view space and produce clip-space depth in `[0, 1]`.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Builder-style scale override
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Local forward axis (+Z) rotated into world space
    pub fn forward(&self) -> Vec3 {
        (self.rotation * Vec3::z()).normalize()
    }
}

/// Translation column of an affine matrix
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Perspective projection, right-handed, depth mapped to `[0, 1]`.
///
/// `fov_y` is in radians.
pub fn perspective_zo(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let tan_half = (fov_y * 0.5).tan();
    let mut m = Mat4::zeros();
    m[(0, 0)] = 1.0 / (aspect * tan_half);
    m[(1, 1)] = 1.0 / tan_half;
    m[(2, 2)] = far / (near - far);
    m[(3, 2)] = -1.0;
    m[(2, 3)] = -(far * near) / (far - near);
    m
}

/// Orthographic projection, right-handed, depth mapped to `[0, 1]`.
pub fn orthographic_zo(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let mut m = Mat4::identity();
    m[(0, 0)] = 2.0 / (right - left);
    m[(1, 1)] = 2.0 / (top - bottom);
    m[(2, 2)] = -1.0 / (far - near);
    m[(0, 3)] = -(right + left) / (right - left);
    m[(1, 3)] = -(top + bottom) / (top - bottom);
    m[(2, 3)] = -near / (far - near);
    m
}

/// Right-handed view matrix looking from `eye` toward `target`
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
}

/// Math constants
pub mod constants {
    /// Depth bias matrix mapping clip XY from `[-1, 1]` to texture space `[0, 1]`
    pub const BIAS_MATRIX: [f32; 16] = [
        0.5, 0.0, 0.0, 0.0,
        0.0, 0.5, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.5, 0.5, 0.0, 1.0,
    ];
}

/// Utility functions
pub mod utils {
    use super::Mat4;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Column-major bias matrix
    pub fn bias_matrix() -> Mat4 {
        Mat4::from_column_slice(&super::constants::BIAS_MATRIX)
    }
}
