//! Math utilities and types
//!
//! Provides the vector types used by the collision core. Two coordinate
//! flavours coexist:
//! - `Vec3` (`f32`) for collision meshes, rays and bounding volumes
//! - `Vec3i` (`i32`) for sector-grid queries, which work in whole world units
//!
//! The vertical axis is `y` and grows downward, so a floor has a larger `y`
//! than the ceiling above it.

pub use nalgebra::{
    Vector2, Vector3,
    Matrix3,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3D integer vector type used for world-unit positions
pub type Vec3i = Vector3<i32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// World units per sector edge
pub const BLOCK_SIZE: i32 = 1024;

/// Half a sector edge, the distance from a sector center to its edges
pub const HALF_BLOCK: i32 = BLOCK_SIZE / 2;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 4
    pub const QUARTER_PI: f32 = PI * 0.25;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Tolerance used by the geometric tests
    pub const EPSILON: f32 = 1.0e-6;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3, Vec3i};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Convert an integer world position to a float vector
    pub fn to_vec3(v: Vec3i) -> Vec3 {
        Vec3::new(v.x as f32, v.y as f32, v.z as f32)
    }

    /// Round a float vector to the nearest world unit
    pub fn to_vec3i(v: Vec3) -> Vec3i {
        Vec3i::new(v.x.round() as i32, v.y.round() as i32, v.z.round() as i32)
    }

    /// Bit pattern of a vector, used where values must compare bit-exactly
    pub fn bit_key(v: &Vec3) -> [u32; 3] {
        [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
    }

    /// Rotate a horizontal offset by a yaw angle around the vertical axis
    pub fn rotate_xz(x: f32, z: f32, yaw: f32) -> (f32, f32) {
        let (sin, cos) = yaw.sin_cos();
        (x * cos + z * sin, -x * sin + z * cos)
    }
}
