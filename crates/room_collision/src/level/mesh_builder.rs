//! Room collision mesh synthesis
//!
//! Turns a room's sector grid into a [`CollisionMesh`]:
//!
//! - floor and ceiling triangles of every open sector half, tagged with the
//!   room below or above when they are portals
//! - a wall along the diagonal of sectors that are solid on one half only
//! - step faces along the diagonal where the two halves disagree in height
//! - per edge, from the sector's own side: a full wall towards solid
//!   neighbors, floor and ceiling steps towards open ones, and a portal
//!   face over the common opening when the neighbor belongs to another room
//!
//! Every face is emitted by the sector that sees it, facing into that
//! sector, so no face is generated twice. Faces whose height difference
//! changes sign along an edge are cut where it crosses zero and only the
//! visible part is kept; floor and ceiling are treated alike.

use log::debug;

use crate::foundation::math::{utils::lerp, Vec3};
use crate::physics::collision::CollisionMesh;

use super::room::Room;
use super::room_graph::chase_side_sector;
use super::sector::{Sector, CORNERS};
use super::RoomNumber;

/// Axis-aligned sector edge, seen from inside the sector
struct EdgeDef {
    corners: [usize; 2],
    step: (isize, isize),
    inward: (f32, f32),
}

/// North, east, south and west edges
const EDGES: [EdgeDef; 4] = [
    EdgeDef { corners: [0, 1], step: (0, -1), inward: (0.0, 1.0) },
    EdgeDef { corners: [1, 2], step: (1, 0), inward: (-1.0, 0.0) },
    EdgeDef { corners: [2, 3], step: (0, 1), inward: (0.0, -1.0) },
    EdgeDef { corners: [3, 0], step: (-1, 0), inward: (1.0, 0.0) },
];

impl EdgeDef {
    /// Point halfway between the sector center and the edge midpoint.
    /// Every axis-aligned edge lies entirely in one half, and this point
    /// selects that half.
    fn sample(&self) -> (f32, f32) {
        let [a, b] = self.corners.map(|c| CORNERS[c]);
        ((a.0 + b.0) * 0.25, (a.1 + b.1) * 0.25)
    }
}

/// A sector together with its world center
#[derive(Clone, Copy)]
struct SectorView<'a> {
    sector: &'a Sector,
    center: (f32, f32),
}

impl<'a> SectorView<'a> {
    fn new(room: &'a Room, index: usize) -> Option<Self> {
        let (cx, cz) = room.sector_center(index);
        Some(Self {
            sector: room.sector(index)?,
            center: (cx as f32, cz as f32),
        })
    }

    fn world(&self, corner: usize) -> (f32, f32) {
        (self.center.0 + CORNERS[corner].0, self.center.1 + CORNERS[corner].1)
    }

    /// Height at a world point of the surface half containing the local
    /// offset `from`
    fn height(&self, floor: bool, from: (f32, f32), at: (f32, f32)) -> f32 {
        let surface = self.sector.surface(floor);
        let triangle = &surface.triangles[surface.triangle_index(from.0, from.1)];
        triangle.plane.height_at(at.0 - self.center.0, at.1 - self.center.1)
    }
}

/// What lies across a sector edge
enum Neighbor<'a> {
    Solid,
    Open {
        view: SectorView<'a>,
        from: (f32, f32),
        portal: Option<RoomNumber>,
    },
}

/// Build the collision mesh of one room
pub fn build_room_mesh(rooms: &[Room], number: RoomNumber, margin: f32, max_hops: u32) -> CollisionMesh {
    let mut mesh = CollisionMesh::with_margin(margin);
    let Some(room) = rooms.get(number) else {
        return mesh;
    };

    for index in 0..room.sectors().len() {
        let Some(view) = SectorView::new(room, index) else {
            continue;
        };
        if view.sector.side_room.is_some() || view.sector.is_solid() {
            continue;
        }

        emit_surfaces(&mut mesh, &view);
        emit_diagonal(&mut mesh, &view);

        let (ix, iz) = room.sector_coords(index);
        for (edge_index, edge) in EDGES.iter().enumerate() {
            emit_edge(&mut mesh, rooms, room, &view, (ix, iz), edge_index, edge, max_hops);
        }
    }

    mesh.initialize();
    debug!("Room {number}: {} collision triangles", mesh.triangle_count());
    mesh
}

fn vertex(xz: (f32, f32), y: f32) -> Vec3 {
    Vec3::new(xz.0, y, xz.1)
}

fn emit_surfaces(mesh: &mut CollisionMesh, view: &SectorView) {
    for floor in [true, false] {
        let surface = view.sector.surface(floor);
        for half in 0..2 {
            if view.sector.is_wall(half) {
                continue;
            }
            let triangle = &surface.triangles[half];
            let plane = triangle.plane;
            let corners = surface.split.half_corners(half);
            let [a, b, c] = corners.map(|corner| {
                let (dx, dz) = CORNERS[corner];
                vertex(view.world(corner), plane.height_at(dx, dz))
            });

            // Floors face up (-y), ceilings face down
            let up = Vec3::new(plane.x_slope, -1.0, plane.z_slope).normalize();
            let normal = if floor { up } else { -up };
            mesh.insert_triangle(a, b, c, normal, triangle.portal_room);
        }
    }
}

/// Horizontal unit normal of the diagonal facing the given half
fn diagonal_normal(diagonal: [usize; 2], third: usize) -> Vec3 {
    let (a, b) = (CORNERS[diagonal[0]], CORNERS[diagonal[1]]);
    let (tx, tz) = CORNERS[third];
    let (dx, dz) = (b.0 - a.0, b.1 - a.1);
    let mut normal = (-dz, dx);
    if normal.0 * (tx - a.0) + normal.1 * (tz - a.1) < 0.0 {
        normal = (dz, -dx);
    }
    Vec3::new(normal.0, 0.0, normal.1).normalize()
}

fn emit_diagonal(mesh: &mut CollisionMesh, view: &SectorView) {
    let sector = view.sector;
    let walls = [sector.is_wall(0), sector.is_wall(1)];

    if walls[0] != walls[1] {
        let open = usize::from(walls[0]);
        let split = sector.floor.split;
        let diagonal = split.diagonal();
        let from = split.half_centroid(open);
        let ends = diagonal.map(|c| view.world(c));
        let top = ends.map(|p| view.height(false, from, p));
        let bottom = ends.map(|p| view.height(true, from, p));
        let normal = diagonal_normal(diagonal, split.half_corners(open)[2]);
        emit_strip(mesh, ends, top, bottom, normal, None);
        return;
    }

    for floor in [true, false] {
        let split = sector.surface(floor).split;
        let diagonal = split.diagonal();
        let ends = diagonal.map(|c| view.world(c));

        for own in 0..2 {
            let from_own = split.half_centroid(own);
            let from_other = split.half_centroid(1 - own);
            let own_floor = ends.map(|p| view.height(true, from_own, p));
            let own_ceiling = ends.map(|p| view.height(false, from_own, p));
            let normal = diagonal_normal(diagonal, split.half_corners(own)[2]);

            let (top, bottom) = if floor {
                let other = ends.map(|p| view.height(true, from_other, p));
                ([other[0].max(own_ceiling[0]), other[1].max(own_ceiling[1])], own_floor)
            } else {
                let other = ends.map(|p| view.height(false, from_other, p));
                (own_ceiling, [other[0].min(own_floor[0]), other[1].min(own_floor[1])])
            };
            emit_strip(mesh, ends, top, bottom, normal, None);
        }
    }
}

fn emit_edge(
    mesh: &mut CollisionMesh,
    rooms: &[Room],
    room: &Room,
    view: &SectorView,
    (ix, iz): (usize, usize),
    edge_index: usize,
    edge: &EdgeDef,
    max_hops: u32,
) {
    let from = edge.sample();
    if view.sector.is_wall_at(from.0, from.1) {
        return;
    }

    let ends = edge.corners.map(|c| view.world(c));
    let own_floor = ends.map(|p| view.height(true, from, p));
    let own_ceiling = ends.map(|p| view.height(false, from, p));
    let inward = Vec3::new(edge.inward.0, 0.0, edge.inward.1);

    match neighbor(rooms, room, (ix, iz), edge_index, edge, max_hops) {
        Neighbor::Solid => {
            emit_strip(mesh, ends, own_ceiling, own_floor, inward, None);
        }
        Neighbor::Open { view: other, from: other_from, portal } => {
            let other_floor = ends.map(|p| other.height(true, other_from, p));
            let other_ceiling = ends.map(|p| other.height(false, other_from, p));

            // Floor step where the neighbor's floor is higher
            let step_top = [other_floor[0].max(own_ceiling[0]), other_floor[1].max(own_ceiling[1])];
            emit_strip(mesh, ends, step_top, own_floor, inward, None);

            // Ceiling step where the neighbor's ceiling is lower
            let step_bottom = [other_ceiling[0].min(own_floor[0]), other_ceiling[1].min(own_floor[1])];
            emit_strip(mesh, ends, own_ceiling, step_bottom, inward, None);

            // The opening starts where both steps end, so it shares an edge
            // with them and never covers the same area
            if let Some(target) = portal {
                let top = [own_ceiling[0].max(other_ceiling[0]), own_ceiling[1].max(other_ceiling[1])];
                let bottom = [own_floor[0].min(other_floor[0]), own_floor[1].min(other_floor[1])];
                emit_strip(mesh, ends, top, bottom, inward, Some(target));
            }
        }
    }
}

fn neighbor<'a>(
    rooms: &'a [Room],
    room: &'a Room,
    (ix, iz): (usize, usize),
    edge_index: usize,
    edge: &EdgeDef,
    max_hops: u32,
) -> Neighbor<'a> {
    let (Some(nx), Some(nz)) = (ix.checked_add_signed(edge.step.0), iz.checked_add_signed(edge.step.1)) else {
        return Neighbor::Solid;
    };
    let Some(index) = room.sector_index(nx, nz) else {
        return Neighbor::Solid;
    };
    let Some(mut view) = SectorView::new(room, index) else {
        return Neighbor::Solid;
    };

    let mut portal = None;
    if view.sector.side_room.is_some() {
        let (cx, cz) = room.sector_center(index);
        let Some(target) = chase_side_sector(rooms, room.number, cx, cz, max_hops) else {
            return Neighbor::Solid;
        };
        let Some(target_view) = rooms.get(target.room).and_then(|r| SectorView::new(r, target.index)) else {
            return Neighbor::Solid;
        };
        view = target_view;
        portal = Some(target.room);
    }

    let from = EDGES[(edge_index + 2) % 4].sample();
    if view.sector.is_wall_at(from.0, from.1) {
        return Neighbor::Solid;
    }
    Neighbor::Open { view, from, portal }
}

/// Emit the vertical face between `top` and `bottom` along `ends`, keeping
/// only the part where `bottom` lies below `top`
fn emit_strip(
    mesh: &mut CollisionMesh,
    ends: [(f32, f32); 2],
    top: [f32; 2],
    bottom: [f32; 2],
    normal: Vec3,
    portal: Option<RoomNumber>,
) {
    let h0 = bottom[0] - top[0];
    let h1 = bottom[1] - top[1];
    if h0 <= 0.0 && h1 <= 0.0 {
        return;
    }

    let [p0, p1] = ends;
    if h0 >= 0.0 && h1 >= 0.0 {
        let a = vertex(p0, top[0]);
        let b = vertex(p1, top[1]);
        let c = vertex(p1, bottom[1]);
        let d = vertex(p0, bottom[0]);
        mesh.insert_triangle(a, b, c, normal, portal);
        mesh.insert_triangle(a, c, d, normal, portal);
        return;
    }

    // Criss-cross: cut where the face height crosses zero
    let t = h0 / (h0 - h1);
    let cut_xz = (lerp(p0.0, p1.0, t), lerp(p0.1, p1.1, t));
    let cut = vertex(cut_xz, lerp(top[0], top[1], t));
    let (end, end_top, end_bottom) = if h0 > 0.0 {
        (p0, top[0], bottom[0])
    } else {
        (p1, top[1], bottom[1])
    };
    mesh.insert_triangle(vertex(end, end_top), vertex(end, end_bottom), cut, normal, portal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CollisionConfig;
    use crate::level::sector::{SectorSurface, SplitDirection};
    use crate::level::test_support::{boxed_room, corridor};
    use crate::level::World;
    use crate::physics::collision::Ray;
    use approx::assert_relative_eq;

    fn world(rooms: Vec<crate::level::RoomDescriptor>) -> World {
        World::new(rooms, Vec::new(), CollisionConfig::default()).unwrap()
    }

    fn ray(origin: Vec3, direction: Vec3) -> Ray {
        Ray::try_new(origin, direction).unwrap()
    }

    #[test]
    fn test_single_open_sector_is_a_closed_box() {
        let world = world(vec![boxed_room(0, 0, 3, 3, 0, -1024)]);
        let mesh = &world.room(0).unwrap().collision_mesh;
        // Floor, ceiling and four walls, two triangles each
        assert_eq!(mesh.triangle_count(), 12);

        let centre = Vec3::new(1536.0, -512.0, 1536.0);
        for (direction, distance) in [
            (Vec3::new(1.0, 0.0, 0.0), 512.0),
            (Vec3::new(0.0, 0.0, -1.0), 512.0),
            (Vec3::new(0.0, 1.0, 0.0), 512.0),
            (Vec3::new(0.0, -1.0, 0.0), 512.0),
        ] {
            let hit = mesh.get_collision(&ray(centre, direction), 10_000.0).unwrap();
            assert_relative_eq!(hit.distance, distance, epsilon = 1e-2);
            assert!(!hit.triangle.is_portal());
            // Every face looks back into the sector
            assert!(hit.triangle.normal.dot(&direction) < 0.0);
        }
    }

    #[test]
    fn test_floor_step_between_sectors() {
        let mut descriptor = boxed_room(0, 0, 4, 3, 0, -1024);
        if let Some(sector) = descriptor.sector_mut(2, 1) {
            *sector = Sector::open(-256, -1024);
        }
        let world = world(vec![descriptor]);
        let mesh = &world.room(0).unwrap().collision_mesh;

        // Below the raised floor a horizontal ray hits the riser at x = 2048
        let low = mesh.get_collision(&ray(Vec3::new(1536.0, -100.0, 1536.0), Vec3::x()), 10_000.0).unwrap();
        assert_relative_eq!(low.distance, 512.0, epsilon = 1e-2);
        assert_relative_eq!(low.triangle.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);

        // Above it the ray crosses into the raised sector and hits the far wall
        let high = mesh.get_collision(&ray(Vec3::new(1536.0, -500.0, 1536.0), Vec3::x()), 10_000.0).unwrap();
        assert_relative_eq!(high.distance, 1536.0, epsilon = 1e-2);
    }

    #[test]
    fn test_half_wall_sector_gets_diagonal_wall() {
        let mut descriptor = boxed_room(0, 0, 3, 3, 0, -1024);
        if let Some(sector) = descriptor.sector_mut(1, 1) {
            let floor = SectorSurface::flat(0);
            let mut ceiling = SectorSurface::flat(-1024);
            // Half 1 (holding c1) becomes solid
            ceiling.triangles[1] = floor.triangles[1];
            *sector = Sector::new(floor, ceiling);
        }
        let world = world(vec![descriptor]);
        let mesh = &world.room(0).unwrap().collision_mesh;

        // From the c3 side, a ray towards c1 hits the diagonal at the center
        let origin = Vec3::new(1536.0 - 256.0, -300.0, 1536.0 + 256.0);
        let direction = Vec3::new(1.0, 0.0, -1.0);
        let hit = mesh.get_collision(&ray(origin, direction), 10_000.0).unwrap();
        assert_relative_eq!(hit.distance, 256.0 * 2.0f32.sqrt(), epsilon = 1e-2);
        assert!(hit.triangle.normal.dot(&direction) < 0.0);
    }

    #[test]
    fn test_side_portal_faces_are_tagged() {
        let world = world(corridor(2));
        let mesh = &world.room(0).unwrap().collision_mesh;
        let portals: Vec<_> = mesh.triangles().filter(|t| t.is_portal()).collect();
        assert_eq!(portals.len(), 2);
        for triangle in portals {
            assert_eq!(triangle.portal_room, Some(1));
            assert_relative_eq!(triangle.normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
            for v in triangle.vertices {
                assert_relative_eq!(v.x, 2048.0);
            }
        }
    }

    #[test]
    fn test_portal_opening_stops_at_raised_neighbor_floor() {
        let mut rooms = corridor(2);
        if let Some(sector) = rooms[1].sector_mut(1, 1) {
            *sector = Sector::open(-256, -1024);
        }
        let world = world(rooms);
        let mesh = &world.room(0).unwrap().collision_mesh;

        let edge: Vec<_> = mesh
            .triangles()
            .filter(|t| t.vertices.iter().all(|v| (v.x - 2048.0).abs() < 1e-3))
            .collect();
        assert!(edge.iter().any(|t| !t.is_portal()));
        for triangle in &edge {
            let (top, bottom) = if triangle.is_portal() { (-1024.0, -256.0) } else { (-256.0, 0.0) };
            for v in triangle.vertices {
                assert!(v.y >= top - 1e-3 && v.y <= bottom + 1e-3, "{triangle:?}");
            }
        }

        let riser = mesh.get_collision(&ray(Vec3::new(1536.0, -100.0, 1536.0), Vec3::x()), 10_000.0).unwrap();
        assert!(!riser.triangle.is_portal());
        assert_relative_eq!(riser.distance, 512.0, epsilon = 1e-2);

        let opening = mesh.get_collision(&ray(Vec3::new(1536.0, -500.0, 1536.0), Vec3::x()), 10_000.0).unwrap();
        assert_eq!(opening.triangle.portal_room, Some(1));
        assert_relative_eq!(opening.distance, 512.0, epsilon = 1e-2);
    }

    #[test]
    fn test_criss_cross_edge_keeps_visible_part_only() {
        let mut descriptor = boxed_room(0, 0, 4, 3, 0, -1024);
        if let Some(sector) = descriptor.sector_mut(1, 1) {
            // East edge runs from c1 (-200) to c2 (+200) against a flat neighbor at 0
            let floor = SectorSurface::from_corner_heights([0, -200, 200, 0], SplitDirection::Diagonal02);
            *sector = Sector::new(floor, SectorSurface::flat(-1024));
        }
        let world = world(vec![descriptor]);
        let mesh = &world.room(0).unwrap().collision_mesh;

        let east: Vec<_> = mesh
            .triangles()
            .filter(|t| t.vertices.iter().all(|v| (v.x - 2048.0).abs() < 1e-3) && t.normal.x < -0.5)
            .collect();
        // Only the half below the neighbor's floor is visible from this sector
        assert_eq!(east.len(), 1);
        let triangle = east[0];
        assert!(triangle.vertices.iter().any(|v| (v.z - 1536.0).abs() < 1e-2 && v.y.abs() < 1e-2));
        assert!(triangle.vertices.iter().all(|v| v.z >= 1536.0 - 1e-2));
    }
}
