//! Broad-phase query shapes
//!
//! A bounding tree answers "which leaves could touch this shape". Each shape
//! knows how to test itself against a node box; exact tests against the real
//! geometry are left to the caller (narrow phase).

use crate::physics::collision::{BoundingSphere, OrientedBox, Ray};

use super::AABB;

/// Shape used to query a [`super::BoundingTree`]
#[derive(Debug, Clone, Copy)]
pub enum QueryShape {
    /// Ray limited to a maximum distance
    Ray {
        /// The ray
        ray: Ray,
        /// Distance along the ray beyond which nodes are ignored
        max_distance: f32,
    },
    /// Axis-aligned box
    Aabb(AABB),
    /// Oriented box
    Obb(OrientedBox),
    /// Sphere
    Sphere(BoundingSphere),
}

impl QueryShape {
    /// Ray shape helper
    pub fn ray(ray: Ray, max_distance: f32) -> Self {
        Self::Ray { ray, max_distance }
    }

    /// Check if a node box may contain a hit for this shape
    pub fn overlaps(&self, aabb: &AABB) -> bool {
        match self {
            Self::Ray { ray, max_distance } => {
                aabb.intersects_ray_segment(ray.origin, ray.direction, *max_distance)
            }
            Self::Aabb(query) => query.intersects(aabb),
            Self::Obb(obb) => obb.intersects_aabb(aabb),
            Self::Sphere(sphere) => aabb.intersects_sphere(sphere.center, sphere.radius),
        }
    }
}

impl From<AABB> for QueryShape {
    fn from(aabb: AABB) -> Self {
        Self::Aabb(aabb)
    }
}

impl From<BoundingSphere> for QueryShape {
    fn from(sphere: BoundingSphere) -> Self {
        Self::Sphere(sphere)
    }
}

impl From<OrientedBox> for QueryShape {
    fn from(obb: OrientedBox) -> Self {
        Self::Obb(obb)
    }
}
