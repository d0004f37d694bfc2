//! Objects registered in room bounding trees
//!
//! Moveables are dynamic items (creatures, pushables, platforms). Statics are
//! immovable meshes placed by the level loader. Both are broad-phased through
//! the object tree of the room they are in.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Vec3, Vec3i};
use crate::physics::collision::{BoundingSphere, OrientedBox};
use crate::spatial::AABB;

use super::bridge::BridgeKind;
use super::{ItemNumber, RoomNumber, StaticNumber};

/// Key of an object in a room's object tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    /// A moveable item
    Moveable(ItemNumber),
    /// A static object
    Static(StaticNumber),
}

/// World position and heading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position in world units
    pub position: Vec3i,
    /// Rotation around the vertical axis, radians
    pub yaw: f32,
}

impl Pose {
    /// Create a pose
    pub fn new(position: Vec3i, yaw: f32) -> Self {
        Self { position, yaw }
    }

    /// Offset from the pose origin expressed in the object's local frame
    pub fn to_local_xz(&self, x: i32, z: i32) -> (f32, f32) {
        let dx = (i64::from(x) - i64::from(self.position.x)) as f32;
        let dz = (i64::from(z) - i64::from(self.position.z)) as f32;
        utils::rotate_xz(dx, dz, -self.yaw)
    }
}

/// Dynamic item
#[derive(Debug, Clone, PartialEq)]
pub struct Moveable {
    /// Item number
    pub number: ItemNumber,
    /// Room the item is in
    pub room: RoomNumber,
    /// Position and heading
    pub pose: Pose,
    /// Collision bounds in the item's local frame
    pub bounds: AABB,
    /// Body-part spheres in world space, for precise ray targeting
    pub hit_spheres: Vec<BoundingSphere>,
    /// Whether rays and point queries consider the item
    pub collidable: bool,
    /// Height override behavior, if the item is a bridge
    pub bridge: Option<BridgeKind>,
    /// Killed items keep their slot but stop affecting collision
    pub killed: bool,
}

impl Moveable {
    /// Collidable item with no bridge behavior
    pub fn new(number: ItemNumber, room: RoomNumber, pose: Pose, bounds: AABB) -> Self {
        Self {
            number,
            room,
            pose,
            bounds,
            hit_spheres: Vec::new(),
            collidable: true,
            bridge: None,
            killed: false,
        }
    }

    /// Make the item a bridge
    pub fn with_bridge(mut self, kind: BridgeKind) -> Self {
        self.bridge = Some(kind);
        self
    }

    /// Set the hit spheres
    pub fn with_hit_spheres(mut self, spheres: Vec<BoundingSphere>) -> Self {
        self.hit_spheres = spheres;
        self
    }

    /// World-space bounds
    pub fn obb(&self) -> OrientedBox {
        object_obb(&self.pose, &self.bounds)
    }

    /// True if the item currently overrides sector heights
    pub fn is_active_bridge(&self) -> bool {
        self.bridge.is_some() && !self.killed
    }
}

/// Static mesh placed in a room
#[derive(Debug, Clone, PartialEq)]
pub struct StaticObject {
    /// Static number
    pub number: StaticNumber,
    /// Room the static is in
    pub room: RoomNumber,
    /// Position and heading
    pub pose: Pose,
    /// Collision bounds in the static's local frame
    pub bounds: AABB,
    /// Whether rays consider the static
    pub collidable: bool,
}

impl StaticObject {
    /// Collidable static
    pub fn new(number: StaticNumber, room: RoomNumber, pose: Pose, bounds: AABB) -> Self {
        Self {
            number,
            room,
            pose,
            bounds,
            collidable: true,
        }
    }

    /// World-space bounds
    pub fn obb(&self) -> OrientedBox {
        object_obb(&self.pose, &self.bounds)
    }
}

fn object_obb(pose: &Pose, bounds: &AABB) -> OrientedBox {
    OrientedBox::from_local_bounds(utils::to_vec3(pose.position), pose.yaw, bounds.min, bounds.max)
}

/// Local bounds helper for tests and tools: `width` by `depth` centered on x/z,
/// spanning `top..bottom` vertically
pub fn block_bounds(width: f32, depth: f32, top: f32, bottom: f32) -> AABB {
    AABB::new(
        Vec3::new(-width * 0.5, top, -depth * 0.5),
        Vec3::new(width * 0.5, bottom, depth * 0.5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_local_offsets_follow_yaw() {
        let pose = Pose::new(Vec3i::new(1000, 0, 2000), FRAC_PI_2);
        // Local +x points to world -z after a quarter turn
        let (lx, lz) = pose.to_local_xz(1000, 1900);
        assert_relative_eq!(lx, 100.0, epsilon = 1e-3);
        assert_relative_eq!(lz, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_local_offsets_far_from_pose() {
        let pose = Pose::new(Vec3i::new(-1000, 0, 1000), 0.0);
        let (lx, lz) = pose.to_local_xz(i32::MAX, i32::MIN);
        assert!(lx > 2.0e9);
        assert!(lz < -2.0e9);
    }

    #[test]
    fn test_obb_matches_pose() {
        let item = Moveable::new(
            3,
            0,
            Pose::new(Vec3i::new(500, -100, 500), 0.0),
            block_bounds(200.0, 100.0, -50.0, 0.0),
        );
        let aabb = item.obb().aabb();
        assert_relative_eq!(aabb.min, Vec3::new(400.0, -150.0, 450.0), epsilon = 1e-3);
        assert_relative_eq!(aabb.max, Vec3::new(600.0, -100.0, 550.0), epsilon = 1e-3);
    }
}
