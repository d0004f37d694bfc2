//! Physics queries
//!
//! Narrow-phase collision geometry and the multi-room line-of-sight service.

pub mod collision;
pub mod los;

pub use collision::{BoundingSphere, CollisionMesh, OrientedBox, Ray, Triangle};
pub use los::{LosCollision, LosOptions, LosSummary, RoomLosCollision};
