//! Room-based level representation
//!
//! A level is a set of rooms. Each room is a rectangular grid of sectors
//! holding floor and ceiling planes and portal links to neighboring rooms.
//! The [`World`] owns every room and object and answers point queries.
//!
//! # Module Organization
//!
//! - [`sector`] - Sector planes, split diagonals and flags
//! - [`room`] - Room grids, descriptors and per-room indices
//! - [`objects`] - Moveable and static objects registered in room trees
//! - [`bridge`] - Bridge kinds and the bridge height overlay
//! - [`room_graph`] - Vertical portal walks and point collision
//! - [`mesh_builder`] - Collision mesh synthesis from sector data
//! - [`world`] - The level context owning everything above

pub mod sector;
pub mod room;
pub mod objects;
pub mod bridge;
pub mod room_graph;
pub mod mesh_builder;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests;

pub use bridge::BridgeKind;
pub use objects::{Moveable, ObjectKey, Pose, StaticObject};
pub use room::{Room, RoomDescriptor};
pub use room_graph::{BlockFlags, PointCollision, SurfaceHit};
pub use sector::{Sector, SectorFlags, SectorSurface, SplitDirection, SurfacePlane};
pub use world::World;

/// Index of a room in the level
pub type RoomNumber = usize;

/// Number of a moveable item
pub type ItemNumber = usize;

/// Number of a static object
pub type StaticNumber = usize;

/// Stable reference to one sector of one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorRef {
    /// Room owning the sector
    pub room: RoomNumber,
    /// Index in the room's sector grid
    pub index: usize,
}

impl SectorRef {
    /// Create a sector reference
    pub fn new(room: RoomNumber, index: usize) -> Self {
        Self { room, index }
    }
}

/// A room together with a vertical position inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomVector {
    /// Room number
    pub room: RoomNumber,
    /// Height in world units (y grows downward)
    pub y: i32,
}

impl RoomVector {
    /// Create a room vector
    pub fn new(room: RoomNumber, y: i32) -> Self {
        Self { room, y }
    }
}

/// Errors raised while building or mutating a level
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LevelError {
    /// A room with no sectors
    #[error("Room {room} has an empty sector grid")]
    EmptyRoom { room: RoomNumber },

    /// Sector list length does not match the grid size
    #[error("Room {room} declares {expected} sectors but provides {actual}")]
    SectorCountMismatch {
        room: RoomNumber,
        expected: usize,
        actual: usize,
    },

    /// A portal, door or flip link names a missing room
    #[error("Room {room} links to unknown room {target}")]
    UnknownRoom { room: RoomNumber, target: RoomNumber },

    /// A portal leads back into its own room
    #[error("Room {room} has a portal to itself in sector {sector}")]
    SelfPortal { room: RoomNumber, sector: usize },

    /// Following portals from a sector revisits a room
    #[error("Portal chain starting in room {room}, sector {sector} loops back on itself")]
    PortalCycle { room: RoomNumber, sector: usize },

    /// Flip-map partners with different grids
    #[error("Room {room} and its flipped room {flipped} differ in size")]
    FlipSizeMismatch { room: RoomNumber, flipped: RoomNumber },

    /// Flip requested on a room without a partner
    #[error("Room {room} has no flipped counterpart")]
    NoFlipRoom { room: RoomNumber },

    /// Room number out of range
    #[error("Room {0} does not exist")]
    InvalidRoom(RoomNumber),

    /// Item number not registered
    #[error("Unknown item {0}")]
    UnknownItem(ItemNumber),

    /// Item number registered twice
    #[error("Item {0} already exists")]
    DuplicateItem(ItemNumber),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
