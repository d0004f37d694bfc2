//! Sector surfaces
//!
//! A sector is one `BLOCK_SIZE` square cell of a room grid. Its floor and
//! ceiling are each made of two planar triangles split along one of the two
//! diagonals. All plane math here works in offsets from the sector center.
//!
//! Corner numbering, in offsets from the center:
//!
//! ```text
//!   c0 (-512, -512) ---- c1 (+512, -512)
//!        |                     |
//!   c3 (-512, +512) ---- c2 (+512, +512)
//! ```

use std::collections::BTreeSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::foundation::math::{Vec2, HALF_BLOCK};

use super::{ItemNumber, RoomNumber};

/// Height used for both surfaces of solid wall sectors
pub const WALL_HEIGHT: i32 = -32512;

/// Sector corner offsets from the center, in the order c0..c3
pub const CORNERS: [(f32, f32); 4] = [
    (-(HALF_BLOCK as f32), -(HALF_BLOCK as f32)),
    (HALF_BLOCK as f32, -(HALF_BLOCK as f32)),
    (HALF_BLOCK as f32, HALF_BLOCK as f32),
    (-(HALF_BLOCK as f32), HALF_BLOCK as f32),
];

bitflags! {
    /// Gameplay flags attached to a sector by the level loader
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SectorFlags: u8 {
        /// Touching the floor kills
        const DEATH = 1 << 0;
        /// Ceiling can be hung from
        const MONKEYSWING = 1 << 1;
        /// Walls can be climbed
        const CLIMBABLE = 1 << 2;
        /// Creature pathing treats the sector as blocked
        const BLOCKED = 1 << 3;
    }
}

/// Diagonal along which a sector surface is split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitDirection {
    /// Split through c0 and c2 (45 degrees)
    #[default]
    Diagonal02,
    /// Split through c1 and c3 (135 degrees)
    Diagonal13,
}

impl SplitDirection {
    /// Split angle in radians
    pub fn angle(self) -> f32 {
        match self {
            Self::Diagonal02 => std::f32::consts::FRAC_PI_4,
            Self::Diagonal13 => 3.0 * std::f32::consts::FRAC_PI_4,
        }
    }

    /// Corners on the split diagonal
    pub fn diagonal(self) -> [usize; 2] {
        match self {
            Self::Diagonal02 => [0, 2],
            Self::Diagonal13 => [1, 3],
        }
    }

    /// Corners of one half, diagonal corners first
    pub fn half_corners(self, half: usize) -> [usize; 3] {
        match (self, half) {
            (Self::Diagonal02, 0) => [0, 2, 3],
            (Self::Diagonal02, _) => [0, 2, 1],
            (Self::Diagonal13, 0) => [1, 3, 2],
            (Self::Diagonal13, _) => [1, 3, 0],
        }
    }

    /// Half containing an offset from the sector center.
    ///
    /// Rotating the offset by the split angle gives `rx = dx*cos(a) - dz*sin(a)`;
    /// the half is 0 when `rx < 0`. Both split angles reduce to exact sums.
    pub fn triangle_index(self, dx: f32, dz: f32) -> usize {
        let rx = match self {
            Self::Diagonal02 => dx - dz,
            Self::Diagonal13 => -dx - dz,
        };
        usize::from(rx >= 0.0)
    }

    /// Centroid of one half, used as a representative sample point
    pub fn half_centroid(self, half: usize) -> (f32, f32) {
        let corners = self.half_corners(half).map(|c| CORNERS[c]);
        (
            (corners[0].0 + corners[1].0 + corners[2].0) / 3.0,
            (corners[0].1 + corners[1].1 + corners[2].1) / 3.0,
        )
    }
}

/// Plane `height = x_slope * dx + z_slope * dz + offset`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfacePlane {
    /// Height change per unit along x
    pub x_slope: f32,
    /// Height change per unit along z
    pub z_slope: f32,
    /// Height at the sector center
    pub offset: f32,
}

impl SurfacePlane {
    /// Horizontal plane
    pub fn flat(height: i32) -> Self {
        Self {
            x_slope: 0.0,
            z_slope: 0.0,
            offset: height as f32,
        }
    }

    /// Plane through three `(dx, dz, height)` points
    pub fn through(points: [(f32, f32, f32); 3]) -> Self {
        let [(x0, z0, h0), (x1, z1, h1), (x2, z2, h2)] = points;
        let (ax, az, ah) = (x1 - x0, z1 - z0, h1 - h0);
        let (bx, bz, bh) = (x2 - x0, z2 - z0, h2 - h0);

        let det = ax * bz - az * bx;
        let x_slope = (ah * bz - az * bh) / det;
        let z_slope = (ax * bh - ah * bx) / det;
        Self {
            x_slope,
            z_slope,
            offset: h0 - x_slope * x0 - z_slope * z0,
        }
    }

    /// Exact height at an offset
    pub fn height_at(&self, dx: f32, dz: f32) -> f32 {
        self.x_slope * dx + self.z_slope * dz + self.offset
    }

    /// Height gradient `(dy/dx, dy/dz)`
    pub fn gradient(&self) -> Vec2 {
        Vec2::new(self.x_slope, self.z_slope)
    }
}

/// One half of a sector surface
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceTriangle {
    /// Plane of this half
    pub plane: SurfacePlane,
    /// Room reached through this half (below a floor, above a ceiling)
    pub portal_room: Option<RoomNumber>,
}

/// Floor or ceiling of a sector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SectorSurface {
    /// Diagonal splitting the two halves
    pub split: SplitDirection,
    /// Both halves, indexed by [`SplitDirection::triangle_index`]
    pub triangles: [SurfaceTriangle; 2],
}

impl SectorSurface {
    /// Horizontal surface
    pub fn flat(height: i32) -> Self {
        let triangle = SurfaceTriangle {
            plane: SurfacePlane::flat(height),
            portal_room: None,
        };
        Self {
            split: SplitDirection::default(),
            triangles: [triangle; 2],
        }
    }

    /// Surface through four corner heights.
    ///
    /// Each half is the plane through its three corners, so both halves
    /// meet exactly along the split diagonal.
    pub fn from_corner_heights(heights: [i32; 4], split: SplitDirection) -> Self {
        let plane = |half: usize| {
            let points = split
                .half_corners(half)
                .map(|c| (CORNERS[c].0, CORNERS[c].1, heights[c] as f32));
            SurfaceTriangle {
                plane: SurfacePlane::through(points),
                portal_room: None,
            }
        };
        Self {
            split,
            triangles: [plane(0), plane(1)],
        }
    }

    /// Mark both halves as a portal into `room`
    pub fn with_portal(mut self, room: RoomNumber) -> Self {
        for triangle in &mut self.triangles {
            triangle.portal_room = Some(room);
        }
        self
    }

    /// Mark one half as a portal into `room`
    pub fn with_half_portal(mut self, half: usize, room: RoomNumber) -> Self {
        if let Some(triangle) = self.triangles.get_mut(half) {
            triangle.portal_room = Some(room);
        }
        self
    }

    /// Half containing an offset
    pub fn triangle_index(&self, dx: f32, dz: f32) -> usize {
        self.split.triangle_index(dx, dz)
    }

    /// Half containing an offset
    pub fn triangle_at(&self, dx: f32, dz: f32) -> &SurfaceTriangle {
        &self.triangles[self.triangle_index(dx, dz)]
    }

    /// Exact height at an offset
    pub fn exact_height_at(&self, dx: f32, dz: f32) -> f32 {
        self.triangle_at(dx, dz).plane.height_at(dx, dz)
    }

    /// Height at an offset, rounded to world units
    pub fn height_at(&self, dx: f32, dz: f32) -> i32 {
        self.exact_height_at(dx, dz).round() as i32
    }

    /// Portal room of the half containing an offset
    pub fn portal_room_at(&self, dx: f32, dz: f32) -> Option<RoomNumber> {
        self.triangle_at(dx, dz).portal_room
    }

    /// Every room this surface links to
    pub fn portal_rooms(&self) -> impl Iterator<Item = RoomNumber> + '_ {
        self.triangles.iter().filter_map(|t| t.portal_room)
    }
}

/// One cell of a room grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    /// Floor surface
    pub floor: SectorSurface,
    /// Ceiling surface
    pub ceiling: SectorSurface,
    /// The column of this sector belongs to another room
    pub side_room: Option<RoomNumber>,
    /// Gameplay flags
    #[serde(default)]
    pub flags: SectorFlags,
    /// Bridges currently overlapping the sector
    #[serde(skip)]
    pub bridges: BTreeSet<ItemNumber>,
}

impl Default for Sector {
    fn default() -> Self {
        Self::wall()
    }
}

impl Sector {
    /// Solid sector
    pub fn wall() -> Self {
        Self::new(SectorSurface::flat(WALL_HEIGHT), SectorSurface::flat(WALL_HEIGHT))
    }

    /// Open sector with flat floor and ceiling
    pub fn open(floor: i32, ceiling: i32) -> Self {
        Self::new(SectorSurface::flat(floor), SectorSurface::flat(ceiling))
    }

    /// Sector from its two surfaces
    pub fn new(floor: SectorSurface, ceiling: SectorSurface) -> Self {
        Self {
            floor,
            ceiling,
            side_room: None,
            flags: SectorFlags::empty(),
            bridges: BTreeSet::new(),
        }
    }

    /// Wall sector whose column belongs to `room`
    pub fn side_portal(room: RoomNumber) -> Self {
        Self {
            side_room: Some(room),
            ..Self::wall()
        }
    }

    /// Set the gameplay flags
    pub fn with_flags(mut self, flags: SectorFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Surface selected by `floor`
    pub fn surface(&self, floor: bool) -> &SectorSurface {
        if floor {
            &self.floor
        } else {
            &self.ceiling
        }
    }

    /// True if the half has no passable height
    pub fn is_wall(&self, half: usize) -> bool {
        self.floor.split == self.ceiling.split
            && half < 2
            && self.floor.triangles[half].plane == self.ceiling.triangles[half].plane
    }

    /// True if the half containing an offset has no passable height
    pub fn is_wall_at(&self, dx: f32, dz: f32) -> bool {
        self.is_wall(self.floor.triangle_index(dx, dz))
    }

    /// True if both halves are walls
    pub fn is_solid(&self) -> bool {
        self.is_wall(0) && self.is_wall(1)
    }

    /// Static floor or ceiling height at an offset
    pub fn surface_height(&self, dx: f32, dz: f32, floor: bool) -> i32 {
        self.surface(floor).height_at(dx, dz)
    }

    /// Room below (`below`) or above the half containing an offset
    pub fn portal_room(&self, dx: f32, dz: f32, below: bool) -> Option<RoomNumber> {
        self.surface(below).portal_room_at(dx, dz)
    }

    /// Every room this sector links to
    pub fn linked_rooms(&self) -> impl Iterator<Item = RoomNumber> + '_ {
        self.floor
            .portal_rooms()
            .chain(self.ceiling.portal_rooms())
            .chain(self.side_room)
    }
}
