//! Level fixtures shared by unit and scenario tests

use crate::foundation::math::BLOCK_SIZE;

use super::room::RoomDescriptor;
use super::sector::{Sector, SectorSurface};

/// Room of `size_x` by `size_z` sectors with a solid border and an open
/// interior at the given floor and ceiling
pub(crate) fn boxed_room(x: i32, z: i32, size_x: usize, size_z: usize, floor: i32, ceiling: i32) -> RoomDescriptor {
    let mut descriptor = RoomDescriptor::filled(x, z, size_x, size_z, &Sector::wall());
    for ix in 1..size_x.saturating_sub(1) {
        for iz in 1..size_z.saturating_sub(1) {
            if let Some(sector) = descriptor.sector_mut(ix, iz) {
                *sector = Sector::open(floor, ceiling);
            }
        }
    }
    descriptor
}

/// Two 3x3 rooms sharing a column at sector (1, 1).
///
/// Room 0 spans `[-1024, 0]` and drops through its floor into room 1,
/// whose floor lies at `lower_floor`. With `wall_below` the receiving sector
/// of room 1 is solid instead.
pub(crate) fn stacked_rooms(lower_floor: i32, wall_below: bool) -> Vec<RoomDescriptor> {
    let mut upper = boxed_room(0, 0, 3, 3, 0, -1024);
    if let Some(sector) = upper.sector_mut(1, 1) {
        sector.floor = sector.floor.with_portal(1);
    }

    let mut lower = boxed_room(0, 0, 3, 3, lower_floor, 0);
    if let Some(sector) = lower.sector_mut(1, 1) {
        *sector = if wall_below {
            Sector::wall()
        } else {
            Sector::new(SectorSurface::flat(lower_floor), SectorSurface::flat(0).with_portal(0))
        };
    }
    vec![upper, lower]
}

/// `count` 3x3 rooms in a row along x, each offset by one block.
///
/// Only the middle sector of each room is open (floor 0, ceiling -1024).
/// The middle sectors of the west and east borders hand their column to the
/// previous and next room.
pub(crate) fn corridor(count: usize) -> Vec<RoomDescriptor> {
    (0..count)
        .map(|k| {
            let mut descriptor = boxed_room(k as i32 * BLOCK_SIZE, 0, 3, 3, 0, -1024);
            if k > 0 {
                if let Some(sector) = descriptor.sector_mut(0, 1) {
                    *sector = Sector::side_portal(k - 1);
                }
            }
            if k + 1 < count {
                if let Some(sector) = descriptor.sector_mut(2, 1) {
                    *sector = Sector::side_portal(k + 1);
                }
            }
            descriptor
        })
        .collect()
}

/// Single 5x3 room: sector (1, 1) open at floor 0, sector (2, 1) solid,
/// sector (3, 1) open at floor 512, both with ceiling -1024
pub(crate) fn split_room() -> RoomDescriptor {
    let mut descriptor = RoomDescriptor::filled(0, 0, 5, 3, &Sector::wall());
    if let Some(sector) = descriptor.sector_mut(1, 1) {
        *sector = Sector::open(0, -1024);
    }
    if let Some(sector) = descriptor.sector_mut(3, 1) {
        *sector = Sector::open(512, -1024);
    }
    descriptor
}
