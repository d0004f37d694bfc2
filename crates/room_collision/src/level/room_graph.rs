//! Room graph traversal
//!
//! Rooms are stacked and chained through portals: side portals hand a
//! sector's column to another room, floor and ceiling portals continue the
//! column below or above. The queries here walk those links to find the
//! real floor or ceiling under a point, honoring bridges on the way.
//!
//! A floor or ceiling query runs through these stages:
//!
//! 1. Wall resolution: a start sector that is solid at the point is
//!    replaced by the nearest open sector in its column (above first for
//!    floors, below first for ceilings).
//! 2. Height clamp: the query height is clamped between the sector's
//!    bridge-aware ceiling and floor.
//! 3. Bridge check: a point inside a bridge restarts from the bridge's top
//!    (or continues from its underside).
//! 4. Portal walk: floor portals are followed down (ceiling portals up)
//!    until a solid surface is reached.
//!
//! Every walk is bounded by `room_graph.max_portal_hops`.

use bitflags::bitflags;
use log::warn;

use crate::foundation::math::{utils::deg_to_rad, Vec2, Vec3i};

use super::room::Room;
use super::sector::SectorFlags;
use super::world::World;
use super::{ItemNumber, RoomNumber, RoomVector, SectorRef};

bitflags! {
    /// Classification of a queried point
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BlockFlags: u16 {
        /// The point is inside solid sector geometry
        const WALL = 1 << 0;
        /// No floor or no ceiling could be resolved
        const VOID = 1 << 1;
        /// The floor is steeper than the configured limit
        const STEEP_FLOOR = 1 << 2;
        /// The ceiling is steeper than the configured limit
        const STEEP_CEILING = 1 << 3;
        /// Sector flag: deadly floor
        const DEATH = 1 << 4;
        /// Sector flag: monkey-swing ceiling
        const MONKEYSWING = 1 << 5;
        /// Sector flag: climbable walls
        const CLIMBABLE = 1 << 6;
        /// Sector flag: blocked for pathing
        const BLOCKED = 1 << 7;
    }
}

impl From<SectorFlags> for BlockFlags {
    fn from(flags: SectorFlags) -> Self {
        let mut block = Self::empty();
        block.set(Self::DEATH, flags.contains(SectorFlags::DEATH));
        block.set(Self::MONKEYSWING, flags.contains(SectorFlags::MONKEYSWING));
        block.set(Self::CLIMBABLE, flags.contains(SectorFlags::CLIMBABLE));
        block.set(Self::BLOCKED, flags.contains(SectorFlags::BLOCKED));
        block
    }
}

/// A resolved floor or ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHit {
    /// Surface height
    pub height: i32,
    /// Room owning the surface
    pub room: RoomNumber,
    /// Sector owning the surface
    pub sector: SectorRef,
    /// Bridge supplying the surface, if any
    pub bridge: Option<ItemNumber>,
}

/// Everything known about one point of the level
#[derive(Debug, Clone, PartialEq)]
pub struct PointCollision {
    /// Queried position
    pub position: Vec3i,
    /// Room containing the position
    pub room: RoomNumber,
    /// Sector providing the floor (the start sector if there is none)
    pub sector: SectorRef,
    /// Floor height, `None` over a void
    pub floor_height: Option<i32>,
    /// Ceiling height, `None` under a void
    pub ceiling_height: Option<i32>,
    /// Floor gradient `(dy/dx, dy/dz)`
    pub floor_slope: Vec2,
    /// Ceiling gradient `(dy/dx, dy/dz)`
    pub ceiling_slope: Vec2,
    /// Bridge supplying the floor
    pub floor_bridge: Option<ItemNumber>,
    /// Point classification
    pub flags: BlockFlags,
}

/// Follow side portals from the sector under `(x, z)` in `room` to the
/// sector that really owns the column
pub(crate) fn chase_side_sector(rooms: &[Room], room: RoomNumber, x: i32, z: i32, max_hops: u32) -> Option<SectorRef> {
    let mut current = room;
    for _ in 0..=max_hops {
        let data = rooms.get(current)?;
        let index = data.sector_index_at(x, z);
        match data.sectors[index].side_room {
            Some(next) => current = next,
            None => return Some(SectorRef::new(current, index)),
        }
    }
    warn!("Side portal chase from room {room} exceeded {max_hops} hops");
    None
}

impl World {
    fn max_hops(&self) -> u32 {
        self.config.room_graph.max_portal_hops
    }

    /// Sector owning the column at `(x, z)`, starting from `room`
    pub fn side_sector(&self, room: RoomNumber, x: i32, z: i32) -> Option<SectorRef> {
        chase_side_sector(&self.rooms, room, x, z, self.max_hops())
    }

    fn is_wall_at(&self, sector: SectorRef, x: i32, z: i32) -> bool {
        self.sector_parts(sector).map_or(true, |(room, data)| {
            let (dx, dz) = room.local_offset(sector.index, x as f32, z as f32);
            data.is_wall_at(dx, dz)
        })
    }

    fn static_height(&self, sector: SectorRef, x: i32, z: i32, floor: bool) -> Option<i32> {
        let (room, data) = self.sector_parts(sector)?;
        let (dx, dz) = room.local_offset(sector.index, x as f32, z as f32);
        Some(data.surface_height(dx, dz, floor))
    }

    fn static_gradient(&self, sector: SectorRef, x: i32, z: i32, floor: bool) -> Vec2 {
        self.sector_parts(sector).map_or_else(Vec2::zeros, |(room, data)| {
            let (dx, dz) = room.local_offset(sector.index, x as f32, z as f32);
            data.surface(floor).triangle_at(dx, dz).plane.gradient()
        })
    }

    fn raw_portal(&self, sector: SectorRef, x: i32, z: i32, below: bool) -> Option<RoomNumber> {
        let (room, data) = self.sector_parts(sector)?;
        let (dx, dz) = room.local_offset(sector.index, x as f32, z as f32);
        data.portal_room(dx, dz, below)
    }

    /// Room below (`below`) or above `pos`, unless a bridge closes the portal
    pub fn next_room_number(&self, sector: SectorRef, pos: Vec3i, below: bool) -> Option<RoomNumber> {
        let next = self.raw_portal(sector, pos.x, pos.z, below)?;
        self.inside_bridge(sector, pos, below, !below).is_none().then_some(next)
    }

    /// Last sector of the column reached through static portals
    fn column_end(&self, sector: SectorRef, x: i32, z: i32, below: bool) -> Option<SectorRef> {
        let mut sector = sector;
        for _ in 0..=self.max_hops() {
            match self.raw_portal(sector, x, z, below) {
                Some(next) => sector = self.side_sector(next, x, z)?,
                None => return Some(sector),
            }
        }
        warn!("Portal column at ({x}, {z}) exceeded the hop limit");
        None
    }

    /// Top of the bridge stack enclosing `pos`, climbing through ceiling
    /// portals when the top lies above the sector's ceiling
    pub fn top_height(&self, sector: SectorRef, pos: Vec3i) -> Option<(RoomVector, SectorRef)> {
        self.bridge_stack_end(sector, pos, false)
    }

    /// Underside of the bridge stack enclosing `pos`, descending through
    /// floor portals when it lies below the sector's floor
    pub fn bottom_height(&self, sector: SectorRef, pos: Vec3i) -> Option<(RoomVector, SectorRef)> {
        self.bridge_stack_end(sector, pos, true)
    }

    fn bridge_stack_end(&self, sector: SectorRef, pos: Vec3i, below: bool) -> Option<(RoomVector, SectorRef)> {
        let (x, z) = (pos.x, pos.z);
        let mut sector = sector;
        let mut y = pos.y;

        for _ in 0..=self.max_hops() {
            y = self.enclosing_bridge_surface(sector, Vec3i::new(x, y, z), !below);

            let mut hops = 0;
            loop {
                let boundary = self.static_height(sector, x, z, below)?;
                let beyond = if below { y >= boundary } else { y <= boundary };
                if !(beyond || self.is_wall_at(sector, x, z)) {
                    break;
                }
                let next = self.raw_portal(sector, x, z, below)?;
                sector = self.side_sector(next, x, z)?;
                hops += 1;
                if hops > self.max_hops() {
                    warn!("Bridge stack walk at ({x}, {z}) exceeded the hop limit");
                    return None;
                }
            }

            let pos = Vec3i::new(x, y, z);
            if self.inside_bridge(sector, pos, below, !below).is_none() {
                return Some((RoomVector::new(sector.room, y), sector));
            }
        }

        warn!("Bridge stack at ({x}, {z}) exceeded the hop limit");
        None
    }

    /// Floor under a point, with the room, sector and bridge providing it
    pub fn floor_surface(&self, location: RoomVector, x: i32, z: i32) -> Option<SurfaceHit> {
        self.resolve_surface(location, x, z, true, 0)
    }

    /// Ceiling above a point, with the room, sector and bridge providing it
    pub fn ceiling_surface(&self, location: RoomVector, x: i32, z: i32) -> Option<SurfaceHit> {
        self.resolve_surface(location, x, z, false, 0)
    }

    /// Floor height under a point, `None` over a void
    pub fn floor_height(&self, location: RoomVector, x: i32, z: i32) -> Option<i32> {
        self.floor_surface(location, x, z).map(|hit| hit.height)
    }

    /// Ceiling height above a point, `None` under a void
    pub fn ceiling_height(&self, location: RoomVector, x: i32, z: i32) -> Option<i32> {
        self.ceiling_surface(location, x, z).map(|hit| hit.height)
    }

    fn resolve_surface(&self, location: RoomVector, x: i32, z: i32, floor: bool, restarts: u32) -> Option<SurfaceHit> {
        if restarts > self.max_hops() {
            warn!("Surface query at ({x}, {z}) restarted too often");
            return None;
        }

        let mut sector = self.side_sector(location.room, x, z)?;
        let mut y = location.y;
        // Direction the wall resolution moved in: -1 up, 1 down
        let mut polarity = 0i8;

        if self.is_wall_at(sector, x, z) {
            let order = if floor { [false, true] } else { [true, false] };
            let resolved = order.into_iter().find_map(|below| {
                let candidate = self.column_end(sector, x, z, below)?;
                if self.is_wall_at(candidate, x, z) {
                    return None;
                }
                // Landing above puts the point on that sector's floor, below on its ceiling
                let height = self.static_height(candidate, x, z, !below)?;
                Some((candidate, height, if below { 1 } else { -1 }))
            });
            let (candidate, height, direction) = resolved?;
            sector = candidate;
            y = height;
            polarity = direction;
        }

        let (floor_height, _) = self.surface_height(sector, Vec3i::new(x, y, z), true)?;
        let (ceiling_height, _) = self.surface_height(sector, Vec3i::new(x, y, z), false)?;
        y = y.clamp(floor_height.min(ceiling_height), floor_height.max(ceiling_height));
        let mut pos = Vec3i::new(x, y, z);

        let test_floor_border = y == ceiling_height;
        let test_ceiling_border = y == floor_height;
        if self.inside_bridge(sector, pos, test_floor_border, test_ceiling_border).is_some() {
            // Restart from the end of the bridge stack facing the query, or
            // continue from the opposite end
            let (restart_polarity, continue_polarity) = if floor { (-1, 1) } else { (1, -1) };
            if polarity == 0 || polarity == restart_polarity {
                if let Some((end, _)) = self.bridge_stack_end(sector, pos, !floor) {
                    return self.resolve_surface(end, x, z, floor, restarts + 1);
                }
            }
            if polarity == 0 || polarity == continue_polarity {
                let (end, end_sector) = self.bridge_stack_end(sector, pos, floor)?;
                pos.y = end.y;
                sector = end_sector;
            }
        }

        let mut hops = 0;
        while let Some(next) = self.next_room_number(sector, pos, floor) {
            sector = self.side_sector(next, x, z)?;
            hops += 1;
            if hops > self.max_hops() {
                warn!("Portal walk at ({x}, {z}) exceeded the hop limit");
                return None;
            }
        }

        if self.is_wall_at(sector, x, z) {
            return None;
        }
        let (height, bridge) = self.surface_height(sector, pos, floor)?;
        Some(SurfaceHit {
            height,
            room: sector.room,
            sector,
            bridge,
        })
    }

    /// Room reached by descending from `location` towards `pos`.
    ///
    /// Stops in the room whose floor lies at or below `pos`, or at the first
    /// floor (static or bridge) that cannot be passed, returning its height.
    pub fn bottom_room(&self, location: RoomVector, pos: Vec3i) -> RoomVector {
        self.vertical_room(location, pos, true)
    }

    /// Room reached by climbing from `location` towards `pos`
    pub fn top_room(&self, location: RoomVector, pos: Vec3i) -> RoomVector {
        self.vertical_room(location, pos, false)
    }

    fn vertical_room(&self, location: RoomVector, pos: Vec3i, below: bool) -> RoomVector {
        let (x, z) = (pos.x, pos.z);
        let Some(mut sector) = self.side_sector(location.room, x, z) else {
            return location;
        };
        let mut y = location.y;

        if self.is_wall_at(sector, x, z) {
            let open = self
                .column_end(sector, x, z, below)
                .filter(|&candidate| !self.is_wall_at(candidate, x, z));
            let Some(candidate) = open else {
                return location;
            };
            let Some(height) = self.static_height(candidate, x, z, !below) else {
                return location;
            };
            sector = candidate;
            y = height;
        }

        for _ in 0..=self.max_hops() {
            let Some((boundary, _)) = self.surface_height(sector, Vec3i::new(x, y, z), below) else {
                return RoomVector::new(sector.room, y);
            };
            let reached = if below { pos.y <= boundary } else { pos.y >= boundary };
            if reached {
                return RoomVector::new(sector.room, pos.y);
            }

            let at_boundary = Vec3i::new(x, boundary, z);
            let is_static = self.static_height(sector, x, z, below) == Some(boundary);
            let next = self.next_room_number(sector, at_boundary, below).filter(|_| is_static);
            let Some(next_sector) = next.and_then(|room| self.side_sector(room, x, z)) else {
                return RoomVector::new(sector.room, boundary);
            };
            sector = next_sector;
            y = boundary;
        }

        warn!("Vertical room walk at ({x}, {z}) exceeded the hop limit");
        RoomVector::new(sector.room, y)
    }

    /// Room that actually contains `pos`, starting the search in `room`
    pub fn locate(&self, pos: Vec3i, room: RoomNumber) -> Option<RoomNumber> {
        let start = self.side_sector(room, pos.x, pos.z)?;
        let floor = self.static_height(start, pos.x, pos.z, true)?;
        let ceiling = self.static_height(start, pos.x, pos.z, false)?;
        let y = pos.y.clamp(ceiling.min(floor), ceiling.max(floor));
        let location = RoomVector::new(start.room, y);

        let resolved = if pos.y >= y {
            self.bottom_room(location, pos)
        } else {
            self.top_room(location, pos)
        };
        Some(resolved.room)
    }

    /// Floor, ceiling, slopes and classification of a point
    pub fn get_collision(&self, pos: Vec3i, room: RoomNumber) -> Option<PointCollision> {
        let room = self.locate(pos, room)?;
        let start = self.side_sector(room, pos.x, pos.z)?;
        let location = RoomVector::new(room, pos.y);

        let floor = self.floor_surface(location, pos.x, pos.z);
        let ceiling = self.ceiling_surface(location, pos.x, pos.z);

        let mut flags = BlockFlags::empty();
        if self.is_wall_at(start, pos.x, pos.z) {
            flags |= BlockFlags::WALL;
        }
        if floor.is_none() || ceiling.is_none() {
            flags |= BlockFlags::VOID;
        }

        let floor_slope = match floor {
            Some(SurfaceHit { bridge: Some(item), .. }) => self
                .moveables
                .get(&item)
                .and_then(|m| m.bridge.map(|kind| kind.floor_gradient(m)))
                .unwrap_or_else(Vec2::zeros),
            Some(hit) => self.static_gradient(hit.sector, pos.x, pos.z, true),
            None => Vec2::zeros(),
        };
        let ceiling_slope = ceiling.map_or_else(Vec2::zeros, |hit| {
            if hit.bridge.is_some() {
                Vec2::zeros()
            } else {
                self.static_gradient(hit.sector, pos.x, pos.z, false)
            }
        });

        let steep_limit = deg_to_rad(self.config.point_collision.steep_slope_degrees).tan();
        if floor_slope.norm() > steep_limit {
            flags |= BlockFlags::STEEP_FLOOR;
        }
        if ceiling_slope.norm() > steep_limit {
            flags |= BlockFlags::STEEP_CEILING;
        }

        let sector = floor.map_or(start, |hit| hit.sector);
        if let Some(data) = self.sector(sector) {
            flags |= BlockFlags::from(data.flags);
        }

        Some(PointCollision {
            position: pos,
            room,
            sector,
            floor_height: floor.map(|hit| hit.height),
            ceiling_height: ceiling.map(|hit| hit.height),
            floor_slope,
            ceiling_slope,
            floor_bridge: floor.and_then(|hit| hit.bridge),
            flags,
        })
    }
}
