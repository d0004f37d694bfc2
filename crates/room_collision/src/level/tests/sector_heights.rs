use approx::assert_relative_eq;

use crate::core::config::CollisionConfig;
use crate::foundation::math::{Vec3, Vec3i};
use crate::level::test_support::split_room;
use crate::level::{BlockFlags, RoomVector, World};

fn world() -> World {
    World::new(vec![split_room()], Vec::new(), CollisionConfig::default()).unwrap()
}

#[test]
fn test_floor_on_each_side_of_a_wall() {
    let world = world();
    assert_eq!(world.floor_height(RoomVector::new(0, -100), 1536, 1536), Some(0));
    assert_eq!(world.floor_height(RoomVector::new(0, -100), 3584, 1536), Some(512));
    assert_eq!(world.ceiling_height(RoomVector::new(0, -100), 3584, 1536), Some(-1024));
}

#[test]
fn test_ray_stops_on_the_shared_wall() {
    let world = world();
    let origin = Vec3::new(1536.0, -512.0, 1536.0);
    let hit = world.get_room_los_collision(origin, 0, Vec3::new(1.0, 0.0, 0.0), 4096.0);

    assert!(hit.is_intersected);
    assert_relative_eq!(hit.distance, 512.0, epsilon = 1e-3);
    assert_eq!(hit.room_numbers, vec![0]);
    // Nothing past the wall is reported
    assert!(hit.position.x <= 2048.0 + 1e-3);
}

#[test]
fn test_point_collision_inside_the_wall() {
    let world = world();
    let collision = world.get_collision(Vec3i::new(2560, -100, 1536), 0).unwrap();
    assert!(collision.flags.contains(BlockFlags::WALL));
    assert_eq!(collision.floor_height, None);

    let open = world.get_collision(Vec3i::new(3584, -100, 1536), 0).unwrap();
    assert_eq!(open.floor_height, Some(512));
    assert!(open.flags.is_empty());
}

#[test]
fn test_mesh_wall_faces_face_the_open_sectors() {
    let world = world();
    let mesh = &world.room(0).unwrap().collision_mesh;
    let facing_west = mesh
        .triangles()
        .filter(|t| t.vertices.iter().all(|v| (v.x - 2048.0).abs() < 1e-3))
        .count();
    assert_eq!(facing_west, 2);
    assert!(mesh.triangles().all(|t| !t.is_portal()));
}
