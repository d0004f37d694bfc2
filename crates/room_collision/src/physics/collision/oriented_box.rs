//! Oriented bounding boxes
//!
//! Moveables, statics and bridges are bounded by a local box placed in the
//! world by a yaw rotation, which gives an OBB.

use crate::foundation::math::{constants::EPSILON, Quat, Vec3, Vector3};
use crate::spatial::AABB;

use super::primitives::Ray;

/// Box with arbitrary orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    /// World-space center
    pub center: Vec3,
    /// Half size along each local axis
    pub half_extents: Vec3,
    /// Local-to-world rotation
    pub rotation: Quat,
}

impl OrientedBox {
    /// Create a box from center, half extents and rotation
    pub fn new(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        Self { center, half_extents, rotation }
    }

    /// Place a local box (`local_min..local_max`) at `position`, rotated by `yaw` around y
    pub fn from_local_bounds(position: Vec3, yaw: f32, local_min: Vec3, local_max: Vec3) -> Self {
        let rotation = Quat::from_axis_angle(&Vector3::y_axis(), yaw);
        let local_center = (local_min + local_max) * 0.5;
        Self {
            center: position + rotation * local_center,
            half_extents: (local_max - local_min) * 0.5,
            rotation,
        }
    }

    /// Axis-aligned box as an OBB
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self::new(aabb.center(), aabb.extents(), Quat::identity())
    }

    /// World-space local axes
    pub fn axes(&self) -> [Vec3; 3] {
        [
            self.rotation * Vec3::x(),
            self.rotation * Vec3::y(),
            self.rotation * Vec3::z(),
        ]
    }

    /// The eight world-space corners
    pub fn corners(&self) -> [Vec3; 8] {
        let [ax, ay, az] = self.axes();
        let h = self.half_extents;
        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
            let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
            let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
            *corner = self.center + ax * (h.x * sx) + ay * (h.y * sy) + az * (h.z * sz);
        }
        corners
    }

    /// Tight world-space AABB
    pub fn aabb(&self) -> AABB {
        let [ax, ay, az] = self.axes();
        let h = self.half_extents;
        let extent = ax.abs() * h.x + ay.abs() * h.y + az.abs() * h.z;
        AABB::from_center_extents(self.center, extent)
    }

    /// Ray distance to the box surface, 0 when the ray starts inside
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let local_origin = self.rotation.inverse_transform_vector(&(ray.origin - self.center));
        let local_dir = self.rotation.inverse_transform_vector(&ray.direction);
        AABB::from_center_extents(Vec3::zeros(), self.half_extents)
            .intersect_ray(local_origin, local_dir)
    }

    /// Separating axis test against another oriented box
    pub fn intersects(&self, other: &OrientedBox) -> bool {
        let a_axes = self.axes();
        let b_axes = other.axes();
        let offset = other.center - self.center;

        let separated = |axis: Vec3| -> bool {
            let length_sq = axis.magnitude_squared();
            if length_sq < EPSILON {
                return false; // Degenerate axis from parallel edges
            }
            let ra = project_radius(&a_axes, &self.half_extents, &axis);
            let rb = project_radius(&b_axes, &other.half_extents, &axis);
            offset.dot(&axis).abs() > ra + rb
        };

        for axis in a_axes.iter().chain(b_axes.iter()) {
            if separated(*axis) {
                return false;
            }
        }
        for a in &a_axes {
            for b in &b_axes {
                if separated(a.cross(b)) {
                    return false;
                }
            }
        }
        true
    }

    /// Separating axis test against an axis-aligned box
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        self.intersects(&OrientedBox::from_aabb(aabb))
    }
}

fn project_radius(axes: &[Vec3; 3], half_extents: &Vec3, axis: &Vec3) -> f32 {
    half_extents.x * axes[0].dot(axis).abs()
        + half_extents.y * axes[1].dot(axis).abs()
        + half_extents.z * axes[2].dot(axis).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::QUARTER_PI;
    use approx::assert_relative_eq;

    #[test]
    fn test_rotated_box_aabb_grows() {
        let obb = OrientedBox::from_local_bounds(
            Vec3::zeros(),
            QUARTER_PI,
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let aabb = obb.aabb();
        assert_relative_eq!(aabb.max.x, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(aabb.max.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_obb_ray_hit_distance() {
        let obb = OrientedBox::from_local_bounds(
            Vec3::new(10.0, 0.0, 0.0),
            0.3,
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let ray = Ray::try_new(Vec3::new(10.0, -10.0, 0.0), Vec3::new(0.0, 1.0, 0.0)).unwrap();
        assert_relative_eq!(obb.intersect_ray(&ray).unwrap(), 9.0, epsilon = 1e-4);
    }

    #[test]
    fn test_diamond_misses_box_in_corner_gap() {
        // A 45 degree box whose tip points at an AABB corner without touching it
        let diamond = OrientedBox::from_local_bounds(
            Vec3::new(0.0, 0.0, 0.0),
            QUARTER_PI,
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let corner_box = AABB::new(Vec3::new(1.1, -1.0, 1.1), Vec3::new(3.0, 1.0, 3.0));
        // The AABBs overlap but the shapes do not
        assert!(diamond.aabb().intersects(&corner_box));
        assert!(!diamond.intersects_aabb(&corner_box));

        let touching = AABB::new(Vec3::new(0.5, -1.0, -0.2), Vec3::new(3.0, 1.0, 0.2));
        assert!(diamond.intersects_aabb(&touching));
    }
}
