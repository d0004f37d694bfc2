//! Static collision meshes
//!
//! A room's solid surfaces and portals are stored as a triangle soup with
//! shared vertex and normal pools. Vertices and normals are deduplicated by
//! their exact bit pattern, so triangles that share an edge share storage.
//! Triangles are indexed by a [`BoundingTree`] which is bulk-built once all
//! triangles are known.

use std::collections::HashMap;

use log::debug;

use crate::foundation::math::{constants::EPSILON, utils::bit_key, Vec3};
use crate::level::RoomNumber;
use crate::spatial::{BoundingTree, QueryShape, AABB};

use super::primitives::{BoundingSphere, Ray, Triangle};

/// Triangle as stored in the mesh: indices into the shared pools
#[derive(Debug, Clone, Copy)]
struct CollisionTriangle {
    vertex_ids: [usize; 3],
    normal_id: usize,
    aabb: AABB,
    portal_room: Option<RoomNumber>,
}

/// Resolved triangle returned by queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionTriangleData {
    /// Vertex positions
    pub vertices: [Vec3; 3],
    /// Unit normal
    pub normal: Vec3,
    /// Room a ray continues into when it passes this triangle, `None` for solid triangles
    pub portal_room: Option<RoomNumber>,
}

impl CollisionTriangleData {
    /// True if the triangle is a traversable portal
    pub fn is_portal(&self) -> bool {
        self.portal_room.is_some()
    }

    /// Geometric triangle
    pub fn triangle(&self) -> Triangle {
        Triangle::new(self.vertices[0], self.vertices[1], self.vertices[2])
    }
}

/// Closest ray hit on a mesh
#[derive(Debug, Clone, Copy)]
pub struct MeshRayHit {
    /// Triangle that was hit
    pub triangle: CollisionTriangleData,
    /// Index of the triangle in insertion order
    pub triangle_id: usize,
    /// Hit position
    pub position: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
}

/// Triangle overlapped by a sphere
#[derive(Debug, Clone, Copy)]
pub struct MeshSphereHit {
    /// Triangle that overlaps the sphere
    pub triangle: CollisionTriangleData,
    /// Index of the triangle in insertion order
    pub triangle_id: usize,
    /// Closest point on the triangle to the sphere center
    pub closest_point: Vec3,
    /// Offset that moves the sphere center just clear of the triangle
    pub tangent: Vec3,
}

/// Static triangle mesh with ray and sphere queries
#[derive(Debug, Clone, Default)]
pub struct CollisionMesh {
    vertices: Vec<Vec3>,
    vertex_ids: HashMap<[u32; 3], usize>,
    normals: Vec<Vec3>,
    normal_ids: HashMap<[u32; 3], usize>,
    triangles: Vec<CollisionTriangle>,
    tree: BoundingTree<usize>,
    margin: f32,
    initialized: bool,
}

impl CollisionMesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh whose tree leaves are fattened by `margin`
    pub fn with_margin(margin: f32) -> Self {
        Self {
            margin,
            ..Self::default()
        }
    }

    /// Number of stored triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of distinct vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of distinct normals
    pub fn normal_count(&self) -> usize {
        self.normals.len()
    }

    /// True if no triangle was inserted
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// True once [`Self::initialize`] ran
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Insert a triangle.
    ///
    /// A zero `normal` is replaced by the winding normal. Degenerate
    /// triangles are dropped and `false` is returned. Triangles inserted
    /// after [`Self::initialize`] go into the tree immediately.
    pub fn insert_triangle(
        &mut self,
        v0: Vec3,
        v1: Vec3,
        v2: Vec3,
        normal: Vec3,
        portal_room: Option<RoomNumber>,
    ) -> bool {
        let triangle = Triangle::new(v0, v1, v2);
        if triangle.is_degenerate() {
            debug!("Dropping degenerate collision triangle {v0:?} {v1:?} {v2:?}");
            return false;
        }

        let normal = if normal.magnitude_squared() > EPSILON {
            normal.normalize()
        } else {
            triangle.normal()
        };

        let vertex_ids = [
            Self::intern(&mut self.vertices, &mut self.vertex_ids, v0),
            Self::intern(&mut self.vertices, &mut self.vertex_ids, v1),
            Self::intern(&mut self.vertices, &mut self.vertex_ids, v2),
        ];
        let normal_id = Self::intern(&mut self.normals, &mut self.normal_ids, normal);

        let aabb = AABB::new(v0.inf(&v1).inf(&v2), v0.sup(&v1).sup(&v2));
        let id = self.triangles.len();
        self.triangles.push(CollisionTriangle {
            vertex_ids,
            normal_id,
            aabb,
            portal_room,
        });

        if self.initialized {
            self.tree.insert(id, aabb, self.margin);
        }
        true
    }

    /// Bulk-build the bounding tree over every inserted triangle
    pub fn initialize(&mut self) {
        let items = self.triangles.iter().enumerate().map(|(id, tri)| (id, tri.aabb));
        self.tree.rebuild(items, self.margin);
        self.initialized = true;
        debug!(
            "Collision mesh built: {} triangles, {} vertices, {} normals, tree depth {}",
            self.triangles.len(),
            self.vertices.len(),
            self.normals.len(),
            self.tree.depth()
        );
    }

    /// Remove every triangle
    pub fn clear(&mut self) {
        let margin = self.margin;
        *self = Self::with_margin(margin);
    }

    /// Resolved data of one triangle
    pub fn triangle(&self, id: usize) -> Option<CollisionTriangleData> {
        self.triangles.get(id).map(|tri| self.resolve(tri))
    }

    /// Iterate over every triangle in insertion order
    pub fn triangles(&self) -> impl Iterator<Item = CollisionTriangleData> + '_ {
        self.triangles.iter().map(|tri| self.resolve(tri))
    }

    /// Closest triangle hit by a ray within `max_distance`.
    ///
    /// Solid triangles are two-sided. Portal triangles only block rays that
    /// enter through their front face, so a ray leaving a room through the
    /// portal it came in by passes straight through it.
    pub fn get_collision(&self, ray: &Ray, max_distance: f32) -> Option<MeshRayHit> {
        let candidates = self.tree.get_bounded_object_ids(&QueryShape::ray(*ray, max_distance));

        let mut closest: Option<MeshRayHit> = None;
        for id in candidates {
            let data = self.resolve(&self.triangles[id]);
            if data.is_portal() && ray.direction.dot(&data.normal) >= 0.0 {
                continue;
            }

            let Some(distance) = data.triangle().intersect_ray(ray) else {
                continue;
            };
            if distance > max_distance {
                continue;
            }

            let closer = match &closest {
                Some(best) => distance < best.distance || (distance == best.distance && id < best.triangle_id),
                None => true,
            };
            if closer {
                closest = Some(MeshRayHit {
                    triangle: data,
                    triangle_id: id,
                    position: ray.point_at(distance),
                    distance,
                });
            }
        }
        closest
    }

    /// Every triangle overlapped by a sphere, in insertion order, each with a
    /// push-out tangent
    pub fn get_sphere_collision(&self, sphere: &BoundingSphere) -> Vec<MeshSphereHit> {
        let mut ids = self.tree.get_bounded_object_ids(&QueryShape::Sphere(*sphere));
        ids.sort_unstable();

        let mut hits = Vec::new();
        for id in ids {
            let data = self.resolve(&self.triangles[id]);
            let closest_point = data.triangle().closest_point(sphere.center);
            let offset = sphere.center - closest_point;
            let distance = offset.magnitude();
            if distance >= sphere.radius {
                continue;
            }

            let tangent = if distance > EPSILON {
                offset * ((sphere.radius - distance) / distance)
            } else {
                // Center lies on the triangle, push along its normal
                data.normal * sphere.radius
            };

            hits.push(MeshSphereHit {
                triangle: data,
                triangle_id: id,
                closest_point,
                tangent,
            });
        }
        hits
    }

    fn intern(pool: &mut Vec<Vec3>, ids: &mut HashMap<[u32; 3], usize>, value: Vec3) -> usize {
        *ids.entry(bit_key(&value)).or_insert_with(|| {
            pool.push(value);
            pool.len() - 1
        })
    }

    fn resolve(&self, tri: &CollisionTriangle) -> CollisionTriangleData {
        CollisionTriangleData {
            vertices: tri.vertex_ids.map(|id| self.vertices[id]),
            normal: self.normals[tri.normal_id],
            portal_room: tri.portal_room,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn floor_quad(mesh: &mut CollisionMesh, y: f32, portal_room: Option<RoomNumber>) {
        let up = Vec3::new(0.0, -1.0, 0.0);
        let a = Vec3::new(0.0, y, 0.0);
        let b = Vec3::new(1024.0, y, 0.0);
        let c = Vec3::new(1024.0, y, 1024.0);
        let d = Vec3::new(0.0, y, 1024.0);
        mesh.insert_triangle(a, b, c, up, portal_room);
        mesh.insert_triangle(a, c, d, up, portal_room);
    }

    fn down(origin: Vec3) -> Ray {
        Ray::try_new(origin, Vec3::new(0.0, 1.0, 0.0)).unwrap()
    }

    #[test]
    fn test_shared_vertices_are_deduplicated() {
        let mut mesh = CollisionMesh::new();
        floor_quad(&mut mesh, 0.0, None);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.normal_count(), 1);
    }

    #[test]
    fn test_degenerate_triangle_is_rejected() {
        let mut mesh = CollisionMesh::new();
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(!mesh.insert_triangle(p, p, Vec3::new(4.0, 5.0, 6.0), Vec3::zeros(), None));
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_zero_normal_uses_winding() {
        let mut mesh = CollisionMesh::new();
        mesh.insert_triangle(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::zeros(),
            None,
        );
        assert_relative_eq!(mesh.triangle(0).unwrap().normal, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_ray_hits_triangle_at_plane_distance() {
        let mut mesh = CollisionMesh::new();
        floor_quad(&mut mesh, 300.0, None);
        mesh.initialize();

        let hit = mesh.get_collision(&down(Vec3::new(200.0, -100.0, 700.0)), 10_000.0).unwrap();
        assert_relative_eq!(hit.distance, 400.0, epsilon = 1e-3);
        assert_relative_eq!(hit.position, Vec3::new(200.0, 300.0, 700.0), epsilon = 1e-3);
        assert!(!hit.triangle.is_portal());
    }

    #[test]
    fn test_oblique_ray_matches_plane_intersection() {
        let mut mesh = CollisionMesh::new();
        floor_quad(&mut mesh, 0.0, None);
        mesh.initialize();

        let ray = Ray::try_new(Vec3::new(100.0, -300.0, 100.0), Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let hit = mesh.get_collision(&ray, 10_000.0).unwrap();
        // Plane y = 0 is reached after 300 units on each axis
        assert_relative_eq!(hit.distance, 300.0 * 3.0f32.sqrt(), epsilon = 1e-2);
    }

    #[test]
    fn test_ray_miss_and_range() {
        let mut mesh = CollisionMesh::new();
        floor_quad(&mut mesh, 0.0, None);
        mesh.initialize();

        assert!(mesh.get_collision(&down(Vec3::new(2000.0, -10.0, 0.0)), 1000.0).is_none());
        assert!(mesh.get_collision(&down(Vec3::new(500.0, -100.0, 500.0)), 50.0).is_none());
    }

    #[test]
    fn test_closest_of_several_hits() {
        let mut mesh = CollisionMesh::new();
        floor_quad(&mut mesh, 800.0, None);
        floor_quad(&mut mesh, 200.0, None);
        mesh.initialize();

        let hit = mesh.get_collision(&down(Vec3::new(512.0, 0.0, 300.0)), 5000.0).unwrap();
        assert_relative_eq!(hit.distance, 200.0, epsilon = 1e-3);
    }

    #[test]
    fn test_portal_triangles_are_one_sided() {
        let mut mesh = CollisionMesh::new();
        // Floor portal with normal pointing up, entered from above
        floor_quad(&mut mesh, 0.0, Some(7));
        mesh.initialize();

        let hit = mesh.get_collision(&down(Vec3::new(512.0, -50.0, 512.0)), 100.0).unwrap();
        assert_eq!(hit.triangle.portal_room, Some(7));

        let up = Ray::try_new(Vec3::new(512.0, 50.0, 512.0), Vec3::new(0.0, -1.0, 0.0)).unwrap();
        assert!(mesh.get_collision(&up, 100.0).is_none());
    }

    #[test]
    fn test_insert_after_initialize_is_queryable() {
        let mut mesh = CollisionMesh::new();
        floor_quad(&mut mesh, 0.0, None);
        mesh.initialize();
        floor_quad(&mut mesh, -500.0, None);

        let hit = mesh.get_collision(&down(Vec3::new(512.0, -900.0, 512.0)), 5000.0).unwrap();
        assert_relative_eq!(hit.distance, 400.0, epsilon = 1e-3);
    }

    #[test]
    fn test_sphere_on_centroid_pushes_along_normal() {
        let mut mesh = CollisionMesh::new();
        let (a, b, c) = (
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 30.0),
        );
        mesh.insert_triangle(a, b, c, Vec3::new(0.0, -1.0, 0.0), None);
        mesh.initialize();

        let centroid = (a + b + c) / 3.0;
        let hits = mesh.get_sphere_collision(&BoundingSphere::new(centroid, 40.0));
        assert_eq!(hits.len(), 1);

        let tangent = hits[0].tangent;
        assert_relative_eq!(tangent.x, 0.0);
        assert_relative_eq!(tangent.z, 0.0);
        assert!(tangent.y < 0.0);
        assert_relative_eq!(tangent.magnitude(), 40.0, epsilon = 1e-4);
    }

    #[test]
    fn test_sphere_above_triangle_pushes_out_of_contact() {
        let mut mesh = CollisionMesh::new();
        floor_quad(&mut mesh, 0.0, None);
        mesh.initialize();

        let sphere = BoundingSphere::new(Vec3::new(500.0, -30.0, 200.0), 50.0);
        let hits = mesh.get_sphere_collision(&sphere);
        assert!(!hits.is_empty());
        for hit in &hits {
            assert_relative_eq!(hit.tangent, Vec3::new(0.0, -20.0, 0.0), epsilon = 1e-3);
        }

        let clear = BoundingSphere::new(Vec3::new(500.0, -80.0, 200.0), 50.0);
        assert!(mesh.get_sphere_collision(&clear).is_empty());
    }
}
