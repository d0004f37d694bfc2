//! Rooms
//!
//! A room is a rectangular grid of sectors placed in world space, plus the
//! per-room indices built from it: the static collision mesh and the
//! bounding tree of objects currently inside the room.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Vec3, BLOCK_SIZE, HALF_BLOCK};
use crate::physics::collision::CollisionMesh;
use crate::spatial::{BoundingTree, AABB};

use super::objects::ObjectKey;
use super::sector::Sector;
use super::RoomNumber;

/// Room data handed over by the level loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    /// World x of the grid's minimum corner
    pub x: i32,
    /// World z of the grid's minimum corner
    pub z: i32,
    /// Sectors along x
    pub size_x: usize,
    /// Sectors along z
    pub size_z: usize,
    /// Sectors, x-major (`ix * size_z + iz`)
    pub sectors: Vec<Sector>,
    /// Rooms visible through door portals
    #[serde(default)]
    pub doors: Vec<RoomNumber>,
    /// Alternate version of this room swapped in by [`super::World::flip_room`]
    #[serde(default)]
    pub flipped_room: Option<RoomNumber>,
}

impl RoomDescriptor {
    /// Descriptor with every sector set to `fill`
    pub fn filled(x: i32, z: i32, size_x: usize, size_z: usize, fill: &Sector) -> Self {
        Self {
            x,
            z,
            size_x,
            size_z,
            sectors: vec![fill.clone(); size_x * size_z],
            doors: Vec::new(),
            flipped_room: None,
        }
    }

    /// Mutable access to the sector at grid coordinates
    pub fn sector_mut(&mut self, ix: usize, iz: usize) -> Option<&mut Sector> {
        if ix >= self.size_x || iz >= self.size_z {
            return None;
        }
        self.sectors.get_mut(ix * self.size_z + iz)
    }
}

/// A room of the live level
#[derive(Debug, Clone)]
pub struct Room {
    /// Index of the room in the level
    pub number: RoomNumber,
    /// World x of the grid's minimum corner
    pub x: i32,
    /// World z of the grid's minimum corner
    pub z: i32,
    /// Sectors along x
    pub size_x: usize,
    /// Sectors along z
    pub size_z: usize,
    pub(crate) sectors: Vec<Sector>,
    /// Rooms visible through door portals
    pub doors: Vec<RoomNumber>,
    /// Alternate room swapped in by flip maps
    pub flipped_room: Option<RoomNumber>,
    /// True while the flipped geometry is active
    pub flipped: bool,
    /// Rooms within the configured portal distance, including this room
    pub neighbors: Vec<RoomNumber>,
    /// Static geometry synthesized from the sectors
    pub collision_mesh: CollisionMesh,
    /// Moveables and statics inside the room
    pub objects: BoundingTree<ObjectKey>,
}

impl Room {
    /// Live room from a descriptor. Indices start empty.
    pub fn from_descriptor(number: RoomNumber, descriptor: RoomDescriptor, oversize_factor: f32) -> Self {
        Self {
            number,
            x: descriptor.x,
            z: descriptor.z,
            size_x: descriptor.size_x,
            size_z: descriptor.size_z,
            sectors: descriptor.sectors,
            doors: descriptor.doors,
            flipped_room: descriptor.flipped_room,
            flipped: false,
            neighbors: vec![number],
            collision_mesh: CollisionMesh::new(),
            objects: BoundingTree::with_oversize_factor(oversize_factor),
        }
    }

    /// All sectors, x-major
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Sector by grid index
    pub fn sector(&self, index: usize) -> Option<&Sector> {
        self.sectors.get(index)
    }

    /// Grid index of grid coordinates
    pub fn sector_index(&self, ix: usize, iz: usize) -> Option<usize> {
        (ix < self.size_x && iz < self.size_z).then_some(ix * self.size_z + iz)
    }

    /// Grid coordinates of a grid index
    pub fn sector_coords(&self, index: usize) -> (usize, usize) {
        (index / self.size_z, index % self.size_z)
    }

    /// Grid index of the sector under a world position, clamped to the grid
    pub fn sector_index_at(&self, x: i32, z: i32) -> usize {
        let clamp = |world: i32, origin: i32, size: usize| {
            let cell = (i64::from(world) - i64::from(origin)).div_euclid(i64::from(BLOCK_SIZE));
            cell.clamp(0, size.saturating_sub(1) as i64) as usize
        };
        let ix = clamp(x, self.x, self.size_x);
        let iz = clamp(z, self.z, self.size_z);
        ix * self.size_z + iz
    }

    /// Sector under a world position, clamped to the grid
    pub fn sector_at(&self, x: i32, z: i32) -> &Sector {
        &self.sectors[self.sector_index_at(x, z)]
    }

    /// World center of a sector
    pub fn sector_center(&self, index: usize) -> (i32, i32) {
        let (ix, iz) = self.sector_coords(index);
        (
            self.x + ix as i32 * BLOCK_SIZE + HALF_BLOCK,
            self.z + iz as i32 * BLOCK_SIZE + HALF_BLOCK,
        )
    }

    /// Offset of a world position from a sector's center
    pub fn local_offset(&self, index: usize, x: f32, z: f32) -> (f32, f32) {
        let (cx, cz) = self.sector_center(index);
        (x - cx as f32, z - cz as f32)
    }

    /// Horizontal square of a sector as `(min_x, min_z, max_x, max_z)`
    pub fn sector_square(&self, index: usize) -> (i32, i32, i32, i32) {
        let (cx, cz) = self.sector_center(index);
        (cx - HALF_BLOCK, cz - HALF_BLOCK, cx + HALF_BLOCK, cz + HALF_BLOCK)
    }

    /// Sector square as a box spanning `[min_y, max_y]` vertically
    pub fn sector_aabb(&self, index: usize, min_y: f32, max_y: f32) -> AABB {
        let (x0, z0, x1, z1) = self.sector_square(index);
        AABB::new(
            Vec3::new(x0 as f32, min_y, z0 as f32),
            Vec3::new(x1 as f32, max_y, z1 as f32),
        )
    }

    /// True if a world position lies over the grid
    pub fn contains_xz(&self, x: i32, z: i32) -> bool {
        let max_x = self.x + self.size_x as i32 * BLOCK_SIZE;
        let max_z = self.z + self.size_z as i32 * BLOCK_SIZE;
        (self.x..max_x).contains(&x) && (self.z..max_z).contains(&z)
    }

    /// Every room linked from any sector, door or flip map
    pub fn linked_rooms(&self) -> impl Iterator<Item = RoomNumber> + '_ {
        self.sectors
            .iter()
            .flat_map(Sector::linked_rooms)
            .chain(self.doors.iter().copied())
            .chain(self.flipped_room)
    }
}
