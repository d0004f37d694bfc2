//! Collision geometry and narrow-phase tests
//!
//! # Module Organization
//!
//! - [`primitives`] - Basic geometric primitives (rays, spheres, triangles)
//! - [`oriented_box`] - Oriented bounding boxes for objects and bridges
//! - [`mesh`] - Static per-room triangle meshes with a bounding tree broad phase
//!
//! # Key Types
//!
//! - [`CollisionMesh`] - Deduplicated triangle soup answering ray and sphere queries
//! - [`Ray`], [`BoundingSphere`], [`Triangle`], [`OrientedBox`] - Primitive geometric types

pub mod primitives;
pub mod oriented_box;
pub mod mesh;

// Re-export commonly used types
pub use primitives::{Ray, BoundingSphere, Triangle};
pub use oriented_box::OrientedBox;
pub use mesh::{CollisionMesh, CollisionTriangleData, MeshRayHit, MeshSphereHit};
