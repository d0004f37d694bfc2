use approx::assert_relative_eq;

use crate::core::config::CollisionConfig;
use crate::foundation::math::Vec3;
use crate::level::test_support::boxed_room;
use crate::level::{LevelError, RoomVector, World};

fn world() -> World {
    let mut normal = boxed_room(0, 0, 3, 3, 0, -1024);
    normal.flipped_room = Some(1);
    let alternate = boxed_room(0, 0, 3, 3, 512, -1024);
    World::new(vec![normal, alternate], Vec::new(), CollisionConfig::default()).unwrap()
}

#[test]
fn test_flip_swaps_heights_and_meshes() {
    let mut world = world();
    assert_eq!(world.floor_height(RoomVector::new(0, -100), 1536, 1536), Some(0));

    world.flip_room(0).unwrap();
    assert!(world.room(0).unwrap().flipped);
    assert_eq!(world.floor_height(RoomVector::new(0, -100), 1536, 1536), Some(512));
    assert_eq!(world.floor_height(RoomVector::new(1, -100), 1536, 1536), Some(0));

    let origin = Vec3::new(1600.0, -100.0, 1700.0);
    let hit = world.get_room_los_collision(origin, 0, Vec3::new(0.0, 1.0, 0.0), 4096.0);
    assert_relative_eq!(hit.distance, 612.0, epsilon = 1e-2);

    world.flip_room(0).unwrap();
    assert!(!world.room(0).unwrap().flipped);
    assert_eq!(world.floor_height(RoomVector::new(0, -100), 1536, 1536), Some(0));
}

#[test]
fn test_flip_without_alternate_fails() {
    let mut world = world();
    assert_eq!(world.flip_room(1), Err(LevelError::NoFlipRoom { room: 1 }));
    assert_eq!(world.flip_room(9), Err(LevelError::InvalidRoom(9)));
}

#[test]
fn test_flip_link_counts_as_neighbor() {
    let world = world();
    assert_eq!(world.room(0).unwrap().neighbors, vec![0, 1]);
}
