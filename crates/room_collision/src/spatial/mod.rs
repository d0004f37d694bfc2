//! Spatial partitioning data structures
//!
//! Provides the dynamic bounding volume tree used as the broad phase for
//! room triangles and for the moveable/static objects of every room.

pub mod aabb;
pub mod bounding_tree;
pub mod spatial_query;

pub use aabb::AABB;
pub use bounding_tree::BoundingTree;
pub use spatial_query::QueryShape;
