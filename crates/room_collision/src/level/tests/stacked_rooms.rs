use approx::assert_relative_eq;

use crate::core::config::CollisionConfig;
use crate::foundation::math::{Vec3, Vec3i};
use crate::level::test_support::stacked_rooms;
use crate::level::{RoomVector, World};

fn world(wall_below: bool) -> World {
    World::new(stacked_rooms(2048, wall_below), Vec::new(), CollisionConfig::default()).unwrap()
}

#[test]
fn test_floor_resolves_through_the_portal() {
    let world = world(false);
    assert_eq!(world.floor_height(RoomVector::new(0, -512), 1636, 1836), Some(2048));

    let collision = world.get_collision(Vec3i::new(1636, -512, 1836), 0).unwrap();
    assert_eq!(collision.room, 0);
    assert_eq!(collision.floor_height, Some(2048));
    assert_eq!(collision.sector.room, 1);
    assert_eq!(collision.ceiling_height, Some(-1024));
}

#[test]
fn test_solid_sector_below_portal_is_void() {
    let world = world(true);
    assert_eq!(world.floor_height(RoomVector::new(0, -512), 1636, 1836), None);
}

#[test]
fn test_position_below_the_portal_belongs_to_the_lower_room() {
    let world = world(false);
    let collision = world.get_collision(Vec3i::new(1636, 1024, 1836), 0).unwrap();
    assert_eq!(collision.room, 1);
    assert_eq!(collision.floor_height, Some(2048));
}

#[test]
fn test_vertical_ray_crosses_the_floor_portal() {
    let world = world(false);
    let origin = Vec3::new(1636.0, -512.0, 1836.0);
    let hit = world.get_room_los_collision(origin, 0, Vec3::new(0.0, 1.0, 0.0), 8192.0);
    assert!(hit.is_intersected);
    assert_eq!(hit.room_numbers, vec![0, 1]);
    assert_relative_eq!(hit.distance, 2560.0, epsilon = 1e-2);
    assert_relative_eq!(hit.position.y, 2048.0, epsilon = 1e-2);
}
