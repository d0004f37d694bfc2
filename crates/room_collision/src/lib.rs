//! # Room Collision
//!
//! Collision core for levels built from rooms of square sectors.
//!
//! ## Features
//!
//! - **Dynamic AABB trees**: incremental broad phase for room triangles and objects
//! - **Room collision meshes**: triangle soups synthesized from sector floors, ceilings and walls
//! - **Portal graph**: side, floor and ceiling portals resolved into real floor and ceiling heights
//! - **Bridges**: moveable platforms overriding sector heights
//! - **Line of sight**: rays marched across rooms through portal triangles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use room_collision::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut room = RoomDescriptor::filled(0, 0, 3, 3, &Sector::wall());
//!     if let Some(sector) = room.sector_mut(1, 1) {
//!         *sector = Sector::open(0, -1024);
//!     }
//!
//!     let world = World::new(vec![room], Vec::new(), CollisionConfig::default())?;
//!     let floor = world.floor_height(RoomVector::new(0, -512), 1536, 1536);
//!     assert_eq!(floor, Some(0));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Shared settings
pub mod core;
pub mod config;

// Building blocks
pub mod foundation;
pub mod spatial;
pub mod physics;

// Level representation and queries
pub mod level;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        core::config::{CollisionConfig, Config, ConfigError},
        foundation::math::{Vec2, Vec3, Vec3i, BLOCK_SIZE},
        level::{
            BlockFlags, BridgeKind, LevelError, Moveable, ObjectKey, PointCollision, Pose, RoomDescriptor,
            RoomNumber, RoomVector, Sector, SectorFlags, SectorRef, SectorSurface, SplitDirection, StaticObject,
            SurfaceHit, World,
        },
        physics::{
            los::{LosHitKind, ObjectLosHit, SphereLosHit},
            BoundingSphere, CollisionMesh, LosCollision, LosOptions, LosSummary, OrientedBox, Ray,
            RoomLosCollision,
        },
        spatial::{BoundingTree, QueryShape, AABB},
    };
}
