//! Collision probe
//!
//! Builds a small synthetic level in memory and runs point, bridge and line
//! of sight queries against it, logging every answer.
//!
//! Usage: `collision_probe [config.toml|config.ron]`

use rand::Rng;
use room_collision::foundation::logging;
use room_collision::level::objects::block_bounds;
use room_collision::prelude::*;

/// Rays cast from random points of the first room
const RANDOM_RAYS: usize = 16;

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Level error: {0}")]
    Level(#[from] LevelError),
}

/// Three rooms: a hall, a corridor leading east through a side portal, and
/// a cellar under the hall reached through a floor portal
fn build_level() -> Vec<RoomDescriptor> {
    let mut hall = RoomDescriptor::filled(0, 0, 5, 5, &Sector::wall());
    for ix in 1..4 {
        for iz in 1..4 {
            if let Some(sector) = hall.sector_mut(ix, iz) {
                *sector = Sector::open(0, -2048);
            }
        }
    }
    if let Some(sector) = hall.sector_mut(2, 2) {
        sector.floor = sector.floor.with_portal(2);
    }
    if let Some(sector) = hall.sector_mut(3, 3) {
        *sector = Sector::new(
            SectorSurface::from_corner_heights([0, -256, -256, 0], SplitDirection::Diagonal02),
            SectorSurface::flat(-2048),
        )
        .with_flags(SectorFlags::CLIMBABLE);
    }
    if let Some(sector) = hall.sector_mut(4, 2) {
        *sector = Sector::side_portal(1);
    }

    let mut corridor = RoomDescriptor::filled(3 * BLOCK_SIZE, 0, 5, 5, &Sector::wall());
    for ix in 1..4 {
        if let Some(sector) = corridor.sector_mut(ix, 2) {
            *sector = Sector::open(0, -1024);
        }
    }
    if let Some(sector) = corridor.sector_mut(0, 2) {
        *sector = Sector::side_portal(0);
    }

    let mut cellar = RoomDescriptor::filled(0, 0, 5, 5, &Sector::wall());
    if let Some(sector) = cellar.sector_mut(2, 2) {
        *sector = Sector::new(SectorSurface::flat(3072), SectorSurface::flat(0).with_portal(0));
    }

    vec![hall, corridor, cellar]
}

fn probe_points(world: &World) {
    let points = [
        ("hall", Vec3i::new(1536, -512, 1536)),
        ("slope", Vec3i::new(3584, -512, 3584)),
        ("portal", Vec3i::new(2560, -512, 2560)),
        ("cellar", Vec3i::new(2560, 2048, 2560)),
        ("corridor", Vec3i::new(6656, -512, 2560)),
        ("wall", Vec3i::new(100, -512, 100)),
    ];

    for (name, position) in points {
        match world.get_collision(position, 0) {
            Some(collision) => log::info!(
                "{name}: room {} floor {:?} ceiling {:?} slope ({:.2}, {:.2}) flags {:?}",
                collision.room,
                collision.floor_height,
                collision.ceiling_height,
                collision.floor_slope.x,
                collision.floor_slope.y,
                collision.flags
            ),
            None => log::warn!("{name}: no collision data at {position:?}"),
        }
    }
}

fn probe_bridge(world: &mut World) -> Result<(), ProbeError> {
    let platform = Moveable::new(
        100,
        0,
        Pose::new(Vec3i::new(1536, -768, 2560), 0.0),
        block_bounds(1024.0, 1024.0, -128.0, 0.0),
    )
    .with_bridge(BridgeKind::Flat);
    world.add_moveable(platform)?;

    let location = RoomVector::new(0, -1500);
    log::info!("Floor above platform: {:?}", world.floor_surface(location, 1536, 2560));

    world.update_moveable(100, Pose::new(Vec3i::new(2560, -768, 1536), 0.0), 0)?;
    log::info!("Floor after moving it away: {:?}", world.floor_height(location, 1536, 2560));
    log::info!("Floor at its new spot: {:?}", world.floor_height(location, 2560, 1536));
    Ok(())
}

fn probe_rays(world: &World) {
    let origin = Vec3i::new(1536, -512, 2560);
    for target in [Vec3i::new(6656, -512, 2560), Vec3i::new(1536, -512, 10000)] {
        let summary = world.los_detailed(0, origin, target, LosOptions::default().with_spheres(true));
        log::info!(
            "LOS {origin:?} -> {target:?}: clear {} nearest {:?} at {:.1}",
            world.los(0, origin, target),
            summary.nearest,
            summary.distance
        );
    }

    let mut rng = rand::thread_rng();
    for _ in 0..RANDOM_RAYS {
        let start = Vec3::new(
            rng.gen_range(1100.0..3900.0),
            rng.gen_range(-1900.0..-100.0),
            rng.gen_range(1100.0..3900.0),
        );
        let direction = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        let hit = world.get_room_los_collision(start, 0, direction, 16384.0);
        log::debug!(
            "Ray from {:?}: hit {} after {:.1} in rooms {:?}",
            start,
            hit.is_intersected,
            hit.distance,
            hit.room_numbers
        );
    }
}

fn run() -> Result<(), ProbeError> {
    let config = match std::env::args().nth(1) {
        Some(path) => CollisionConfig::load_validated(&path)?,
        None => CollisionConfig::default(),
    };
    logging::init_with_level(&config.logging.level);
    log::info!("Starting collision probe");

    let mut world = World::new(build_level(), Vec::new(), config)?;
    for room in world.rooms() {
        log::info!(
            "Room {}: {} triangles, neighbors {:?}",
            room.number,
            room.collision_mesh.triangle_count(),
            room.neighbors
        );
    }

    probe_points(&world);
    probe_bridge(&mut world)?;
    probe_rays(&world);
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        logging::init_with_level("error");
        log::error!("{err}");
        std::process::exit(1);
    }
}
