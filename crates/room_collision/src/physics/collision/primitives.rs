//! Primitive collision shapes and intersection algorithms
//!
//! Provides basic geometric primitives (rays, spheres, triangles) with
//! efficient intersection testing algorithms.

use log::warn;

use crate::foundation::math::{constants::EPSILON, Vec3};

/// A ray for ray casting and line of sight
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (always normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction.
    ///
    /// Returns `None` (and logs a warning) when the direction has zero length,
    /// since normalizing it would produce NaNs.
    pub fn try_new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let length_sq = direction.magnitude_squared();
        if !(length_sq > EPSILON * EPSILON) || !length_sq.is_finite() {
            warn!("Rejected ray with degenerate direction {direction:?} at {origin:?}");
            return None;
        }
        Some(Self {
            origin,
            direction: direction / length_sq.sqrt(),
        })
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A bounding sphere for collision detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// The center position of the sphere in world space
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if this sphere intersects with another
    pub fn intersects(&self, other: &BoundingSphere) -> bool {
        let distance_squared = (self.center - other.center).magnitude_squared();
        let radius_sum = self.radius + other.radius;
        distance_squared <= radius_sum * radius_sum
    }

    /// Test ray intersection with this sphere
    /// Returns the distance along the ray if hit, None otherwise.
    /// A ray starting inside the sphere hits at distance 0.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        // Vector from ray origin to sphere center
        let oc = ray.origin - self.center;

        // Direction is normalized, so a == 1
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;

        if c <= 0.0 {
            return Some(0.0);
        }

        let discriminant = b * b - c;
        if discriminant < 0.0 || b > 0.0 {
            return None; // No intersection, or pointing away
        }

        let t = -b - discriminant.sqrt();
        (t >= 0.0).then_some(t)
    }
}

/// A triangle for collision detection
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// Triangle vertices in world space
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Twice the triangle area
    pub fn double_area(&self) -> f32 {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0)).magnitude()
    }

    /// True when the vertices are (nearly) collinear
    pub fn is_degenerate(&self) -> bool {
        !(self.double_area() > EPSILON)
    }

    /// Calculates the normal of the triangle (right-hand rule)
    pub fn normal(&self) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).normalize()
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Möller-Trumbore ray-triangle intersection algorithm
    /// Returns the distance along the ray if hit, None otherwise
    ///
    /// See: "Fast, Minimum Storage Ray/Triangle Intersection" by Möller & Trumbore
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        // Calculate edges from v0
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        // Calculate determinant
        let h = ray.direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle?
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);

        // Hit outside triangle on u axis?
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);

        // Hit outside triangle on v axis?
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        // Calculate t (distance along ray)
        let t = f * edge2.dot(&q);
        (t >= 0.0).then_some(t)
    }

    /// Get the closest point on the triangle to a given point
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let v0_to_point = point - self.v0;

        let d1 = edge1.dot(&v0_to_point);
        let d2 = edge2.dot(&v0_to_point);

        // Check if point is in vertex region outside v0
        if d1 <= 0.0 && d2 <= 0.0 {
            return self.v0;
        }

        // Check if point is in vertex region outside v1
        let v1_to_point = point - self.v1;
        let d3 = edge1.dot(&v1_to_point);
        let d4 = edge2.dot(&v1_to_point);
        if d3 >= 0.0 && d4 <= d3 {
            return self.v1;
        }

        // Check if point is in edge region of v0-v1
        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v_val = d1 / (d1 - d3);
            return self.v0 + edge1 * v_val;
        }

        // Check if point is in vertex region outside v2
        let v2_to_point = point - self.v2;
        let d5 = edge1.dot(&v2_to_point);
        let d6 = edge2.dot(&v2_to_point);
        if d6 >= 0.0 && d5 <= d6 {
            return self.v2;
        }

        // Check if point is in edge region of v0-v2
        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return self.v0 + edge2 * w;
        }

        // Check if point is in edge region of v1-v2
        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return self.v1 + (self.v2 - self.v1) * w;
        }

        // Point is inside triangle
        let denom = 1.0 / (va + vb + vc);
        let v_val = vb * denom;
        let w = vc * denom;
        self.v0 + edge1 * v_val + edge2 * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn floor_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
        )
    }

    #[test]
    fn test_zero_direction_ray_is_rejected() {
        assert!(Ray::try_new(Vec3::zeros(), Vec3::zeros()).is_none());
    }

    #[test]
    fn test_ray_direction_is_normalized() {
        let ray = Ray::try_new(Vec3::zeros(), Vec3::new(0.0, 3.0, 4.0)).unwrap();
        assert_relative_eq!(ray.direction.magnitude(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ray_hits_triangle_at_plane_distance() {
        let ray = Ray::try_new(Vec3::new(2.0, -5.0, 2.0), Vec3::new(0.0, 1.0, 0.0)).unwrap();
        let t = floor_triangle().intersect_ray(&ray).unwrap();
        assert_relative_eq!(t, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_misses_outside_triangle() {
        let ray = Ray::try_new(Vec3::new(8.0, -5.0, 8.0), Vec3::new(0.0, 1.0, 0.0)).unwrap();
        assert!(floor_triangle().intersect_ray(&ray).is_none());
    }

    #[test]
    fn test_parallel_ray_misses() {
        let ray = Ray::try_new(Vec3::new(-1.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(floor_triangle().intersect_ray(&ray).is_none());
    }

    #[test]
    fn test_degenerate_triangle() {
        let tri = Triangle::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 2.0, 2.0));
        assert!(tri.is_degenerate());
        assert!(!floor_triangle().is_degenerate());
    }

    #[test]
    fn test_closest_point_regions() {
        let tri = floor_triangle();
        // Above the interior projects straight down
        let p = tri.closest_point(Vec3::new(2.0, -3.0, 2.0));
        assert_relative_eq!(p, Vec3::new(2.0, 0.0, 2.0), epsilon = 1e-5);
        // Beyond v1 clamps to the vertex
        let p = tri.closest_point(Vec3::new(20.0, 0.0, -5.0));
        assert_relative_eq!(p, Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_ray() {
        let sphere = BoundingSphere::new(Vec3::new(10.0, 0.0, 0.0), 2.0);
        let ray = Ray::try_new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(sphere.intersect_ray(&ray).unwrap(), 8.0, epsilon = 1e-5);

        let away = Ray::try_new(Vec3::zeros(), Vec3::new(-1.0, 0.0, 0.0)).unwrap();
        assert!(sphere.intersect_ray(&away).is_none());

        let inside = Ray::try_new(Vec3::new(10.5, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)).unwrap();
        assert_eq!(sphere.intersect_ray(&inside), Some(0.0));
    }
}
