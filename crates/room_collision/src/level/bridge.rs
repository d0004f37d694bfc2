//! Bridges
//!
//! A bridge is a moveable that overrides floor and ceiling heights of the
//! sectors under it: moving platforms, tilting planks, pushable blocks,
//! trapdoors. Each bridge keeps a membership entry in every sector its
//! footprint overlaps; height queries consult those entries before falling
//! back to the static sector planes.

use std::collections::BTreeSet;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Vec2, Vec3i, BLOCK_SIZE};

use super::objects::Moveable;
use super::world::World;
use super::{ItemNumber, SectorRef};

/// Height change per world unit for one tilt step (a quarter block per block)
const TILT_STEP_GRADIENT: f32 = (BLOCK_SIZE / 4) as f32 / BLOCK_SIZE as f32;

/// Height override behavior of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeKind {
    /// Horizontal slab spanning the item's vertical bounds
    Flat,
    /// Slab sloping along the item's local x axis, `steps` quarter blocks per block
    Tilt {
        /// Signed steepness
        steps: i32,
    },
    /// Block whose top lies `height` above its origin
    Pushable {
        /// Height of the block
        height: i32,
    },
    /// Flat slab that disappears while open
    Trapdoor {
        /// True while the trapdoor lets things fall through
        open: bool,
    },
}

impl BridgeKind {
    /// Top surface of the bridge at a position, `None` outside the footprint
    pub fn floor_height(&self, item: &Moveable, pos: Vec3i) -> Option<i32> {
        let (local_x, _) = footprint_offset(item, pos)?;
        let y = item.pose.position.y;
        let top = y + item.bounds.min.y.round() as i32;

        match *self {
            Self::Flat | Self::Trapdoor { open: false } => Some(top),
            Self::Tilt { steps } => {
                Some(top + (steps as f32 * TILT_STEP_GRADIENT * local_x).round() as i32)
            }
            Self::Pushable { height } => Some(y - height),
            Self::Trapdoor { open: true } => None,
        }
    }

    /// Underside of the bridge at a position, `None` outside the footprint
    pub fn ceiling_height(&self, item: &Moveable, pos: Vec3i) -> Option<i32> {
        let y = item.pose.position.y;
        match *self {
            Self::Flat | Self::Trapdoor { open: false } => {
                footprint_offset(item, pos)?;
                Some(y + item.bounds.max.y.round() as i32)
            }
            Self::Tilt { .. } => {
                let thickness = (item.bounds.max.y - item.bounds.min.y).round() as i32;
                Some(self.floor_height(item, pos)? + thickness)
            }
            Self::Pushable { .. } => {
                footprint_offset(item, pos)?;
                Some(y)
            }
            Self::Trapdoor { open: true } => None,
        }
    }

    /// World gradient `(dy/dx, dy/dz)` of the top surface
    pub fn floor_gradient(&self, item: &Moveable) -> Vec2 {
        match *self {
            Self::Tilt { steps } => {
                let (x, z) = utils::rotate_xz(steps as f32 * TILT_STEP_GRADIENT, 0.0, item.pose.yaw);
                Vec2::new(x, z)
            }
            _ => Vec2::zeros(),
        }
    }
}

/// Local horizontal offset of a position inside the item's footprint
fn footprint_offset(item: &Moveable, pos: Vec3i) -> Option<(f32, f32)> {
    let (x, z) = item.pose.to_local_xz(pos.x, pos.z);
    let inside = (item.bounds.min.x..=item.bounds.max.x).contains(&x)
        && (item.bounds.min.z..=item.bounds.max.z).contains(&z);
    inside.then_some((x, z))
}

impl World {
    /// Floor and ceiling of a live bridge at a position
    pub fn bridge_heights(&self, item: ItemNumber, pos: Vec3i) -> Option<(i32, i32)> {
        let moveable = self.moveables.get(&item)?;
        if !moveable.is_active_bridge() {
            return None;
        }
        let kind = moveable.bridge?;
        Some((kind.floor_height(moveable, pos)?, kind.ceiling_height(moveable, pos)?))
    }

    /// Sectors a bridge is currently registered in
    pub fn bridge_sectors(&self, item: ItemNumber) -> Option<&BTreeSet<SectorRef>> {
        self.bridge_sectors.get(&item)
    }

    /// Bridge-aware floor or ceiling height at `pos`, with the bridge that
    /// supplies it.
    ///
    /// Floors select the highest bridge top that is at or below `pos` and
    /// above the static floor; ceilings mirror this.
    pub fn surface_height(&self, sector: SectorRef, pos: Vec3i, floor: bool) -> Option<(i32, Option<ItemNumber>)> {
        let (room, data) = self.sector_parts(sector)?;
        let (dx, dz) = room.local_offset(sector.index, pos.x as f32, pos.z as f32);
        let mut height = data.surface_height(dx, dz, floor);
        let mut source = None;

        for &item in &data.bridges {
            let Some((bridge_floor, bridge_ceiling)) = self.bridge_heights(item, pos) else {
                continue;
            };

            if floor {
                if bridge_floor >= pos.y && bridge_floor < height && bridge_ceiling >= pos.y {
                    height = bridge_floor;
                    source = Some(item);
                }
            } else if bridge_ceiling <= pos.y && bridge_ceiling > height && bridge_floor <= pos.y {
                height = bridge_ceiling;
                source = Some(item);
            }
        }
        Some((height, source))
    }

    /// Bridge whose span contains `pos`, with optional inclusive borders
    pub fn inside_bridge(
        &self,
        sector: SectorRef,
        pos: Vec3i,
        test_floor_border: bool,
        test_ceiling_border: bool,
    ) -> Option<ItemNumber> {
        let (_, data) = self.sector_parts(sector)?;
        data.bridges.iter().copied().find(|&item| {
            self.bridge_heights(item, pos).is_some_and(|(floor, ceiling)| {
                (pos.y > floor && pos.y < ceiling)
                    || (test_floor_border && pos.y == floor)
                    || (test_ceiling_border && pos.y == ceiling)
            })
        })
    }

    /// Height of the bridge surface enclosing `pos`: the top when `floor`,
    /// else the underside. Returns `pos.y` if no bridge encloses it.
    pub(crate) fn enclosing_bridge_surface(&self, sector: SectorRef, pos: Vec3i, floor: bool) -> i32 {
        let Some((_, data)) = self.sector_parts(sector) else {
            return pos.y;
        };

        for &item in &data.bridges {
            let Some((bridge_floor, bridge_ceiling)) = self.bridge_heights(item, pos) else {
                continue;
            };
            if floor {
                if pos.y > bridge_floor && pos.y <= bridge_ceiling {
                    return bridge_floor;
                }
            } else if pos.y >= bridge_floor && pos.y < bridge_ceiling {
                return bridge_ceiling;
            }
        }
        pos.y
    }

    /// Recompute the sector membership of a bridge.
    ///
    /// Membership is cleared from every sector of every room near the
    /// bridge and from every sector it was registered in before, then
    /// re-added only where the sector square overlaps the bridge's oriented
    /// footprint. `force_removal` (or a killed item) only clears.
    /// Unknown items are ignored.
    pub fn update_bridge_item(&mut self, item: ItemNumber, force_removal: bool) {
        let previous = self.bridge_sectors.remove(&item).unwrap_or_default();
        for sector in &previous {
            if let Some(data) = self.rooms.get_mut(sector.room).and_then(|r| r.sectors.get_mut(sector.index)) {
                data.bridges.remove(&item);
            }
        }

        let Some(moveable) = self.moveables.get(&item) else {
            return;
        };
        let register = !force_removal && moveable.is_active_bridge();
        let obb = moveable.obb();
        let footprint = obb.aabb();
        let Some(closure) = self.rooms.get(moveable.room).map(|r| r.neighbors.clone()) else {
            return;
        };

        let mut registered = BTreeSet::new();
        for room_number in closure {
            let Some(room) = self.rooms.get_mut(room_number) else {
                continue;
            };

            for index in 0..room.sectors.len() {
                room.sectors[index].bridges.remove(&item);
                if !register {
                    continue;
                }

                let (min_x, min_z, max_x, max_z) = room.sector_square(index);
                let outside_range = (max_x as f32) < footprint.min.x
                    || (min_x as f32) > footprint.max.x
                    || (max_z as f32) < footprint.min.z
                    || (min_z as f32) > footprint.max.z;
                if outside_range {
                    continue;
                }

                // Span the bridge vertically so only the horizontal overlap counts
                let square = room.sector_aabb(index, footprint.min.y, footprint.max.y);
                if obb.intersects_aabb(&square) {
                    room.sectors[index].bridges.insert(item);
                    registered.insert(SectorRef::new(room_number, index));
                }
            }
        }

        if registered.is_empty() {
            trace!("Bridge {item} registered in no sector");
        } else {
            debug!("Bridge {item} registered in {} sectors", registered.len());
            self.bridge_sectors.insert(item, registered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::objects::{block_bounds, Pose};
    use std::f32::consts::FRAC_PI_2;

    fn item(kind: BridgeKind, yaw: f32) -> Moveable {
        Moveable::new(1, 0, Pose::new(Vec3i::new(1536, -256, 1536), yaw), block_bounds(1024.0, 512.0, -128.0, 0.0))
            .with_bridge(kind)
    }

    #[test]
    fn test_flat_heights_inside_footprint_only() {
        let bridge = item(BridgeKind::Flat, 0.0);
        let inside = Vec3i::new(1700, 0, 1600);
        assert_eq!(BridgeKind::Flat.floor_height(&bridge, inside), Some(-384));
        assert_eq!(BridgeKind::Flat.ceiling_height(&bridge, inside), Some(-256));

        let outside = Vec3i::new(1536, 0, 1900);
        assert_eq!(BridgeKind::Flat.floor_height(&bridge, outside), None);
        assert_eq!(BridgeKind::Flat.ceiling_height(&bridge, outside), None);
    }

    #[test]
    fn test_footprint_follows_yaw() {
        let bridge = item(BridgeKind::Flat, FRAC_PI_2);
        // Rotated a quarter turn, the long side runs along z
        assert!(BridgeKind::Flat.floor_height(&bridge, Vec3i::new(1536, 0, 1900)).is_some());
        assert!(BridgeKind::Flat.floor_height(&bridge, Vec3i::new(1900, 0, 1536)).is_none());
    }

    #[test]
    fn test_tilt_slopes_along_local_x() {
        let kind = BridgeKind::Tilt { steps: 2 };
        let bridge = item(kind, 0.0);
        let centre = kind.floor_height(&bridge, Vec3i::new(1536, 0, 1536)).unwrap();
        let east = kind.floor_height(&bridge, Vec3i::new(1536 + 400, 0, 1536)).unwrap();
        assert_eq!(centre, -384);
        assert_eq!(east - centre, 200);
        assert_eq!(kind.ceiling_height(&bridge, Vec3i::new(1936, 0, 1536)), Some(east + 128));
        assert_eq!(kind.floor_gradient(&bridge), Vec2::new(0.5, 0.0));
    }

    #[test]
    fn test_pushable_and_trapdoor() {
        let pushable = BridgeKind::Pushable { height: 1024 };
        let block = item(pushable, 0.0);
        let pos = Vec3i::new(1536, 0, 1536);
        assert_eq!(pushable.floor_height(&block, pos), Some(-1280));
        assert_eq!(pushable.ceiling_height(&block, pos), Some(-256));

        let closed = BridgeKind::Trapdoor { open: false };
        let open = BridgeKind::Trapdoor { open: true };
        assert_eq!(closed.floor_height(&item(closed, 0.0), pos), Some(-384));
        assert_eq!(open.floor_height(&item(open, 0.0), pos), None);
        assert_eq!(open.ceiling_height(&item(open, 0.0), pos), None);
    }
}
