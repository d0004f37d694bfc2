//! Line of sight
//!
//! A line-of-sight ray starts in one room and is marched through that room's
//! collision mesh. Hitting a portal triangle moves the ray into the portal's
//! room and continues with the remaining distance; the first solid triangle
//! ends the march. Object tests (moveable boxes, static boxes, hit spheres)
//! are layered on top using the object trees of every room near the rooms
//! the ray crossed.

use std::collections::BTreeSet;

use log::{trace, warn};

use crate::foundation::math::{utils, Vec3, Vec3i};
use crate::level::{ItemNumber, ObjectKey, RoomNumber, StaticNumber, World};
use crate::spatial::QueryShape;

use super::collision::{CollisionTriangleData, Ray};

/// Result of marching a ray through room geometry
#[derive(Debug, Clone, PartialEq)]
pub struct RoomLosCollision {
    /// True if the ray stopped on a solid triangle before its maximum distance
    pub is_intersected: bool,
    /// Hit point, or the end of the ray when nothing was hit
    pub position: Vec3,
    /// Room the ray ended in
    pub room: RoomNumber,
    /// Triangle that stopped the ray
    pub triangle: Option<CollisionTriangleData>,
    /// Straight-line distance from the ray origin to `position`
    pub distance: f32,
    /// Rooms crossed, in order, starting with the origin room
    pub room_numbers: Vec<RoomNumber>,
}

/// A moveable or static struck by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectLosHit {
    /// Item or static number
    pub number: usize,
    /// Entry point on the object's box
    pub position: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
}

/// A hit sphere struck by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereLosHit {
    /// Item owning the sphere
    pub item: ItemNumber,
    /// Index in the item's hit spheres
    pub sphere: usize,
    /// Entry point on the sphere
    pub position: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
}

/// Full line-of-sight result. Each object category is sorted by distance;
/// callers decide which category wins.
#[derive(Debug, Clone, PartialEq)]
pub struct LosCollision {
    /// Room geometry result
    pub room: RoomLosCollision,
    /// Moveable boxes hit before the room geometry
    pub moveables: Vec<ObjectLosHit>,
    /// Static boxes hit before the room geometry
    pub statics: Vec<ObjectLosHit>,
    /// Hit spheres hit before the room geometry
    pub spheres: Vec<SphereLosHit>,
}

/// Object categories tested by [`World::get_los_collision`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LosOptions {
    /// Test moveable boxes
    pub moveables: bool,
    /// Test static boxes
    pub statics: bool,
    /// Test moveable hit spheres
    pub spheres: bool,
    /// Moveable to ignore, usually the one casting the ray
    pub ignore_item: Option<ItemNumber>,
}

impl LosOptions {
    /// Room geometry only
    pub fn room_only() -> Self {
        Self {
            moveables: false,
            statics: false,
            spheres: false,
            ignore_item: None,
        }
    }

    /// Enable or disable hit sphere tests
    pub fn with_spheres(mut self, spheres: bool) -> Self {
        self.spheres = spheres;
        self
    }

    /// Ignore one moveable
    pub fn ignoring(mut self, item: ItemNumber) -> Self {
        self.ignore_item = Some(item);
        self
    }
}

impl Default for LosOptions {
    fn default() -> Self {
        Self {
            moveables: true,
            statics: true,
            spheres: false,
            ignore_item: None,
        }
    }
}

/// What stopped a ray first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LosHitKind {
    /// Room geometry
    Room(RoomNumber),
    /// A moveable box
    Moveable(ItemNumber),
    /// A static box
    Static(StaticNumber),
    /// A moveable hit sphere
    Sphere {
        /// Item owning the sphere
        item: ItemNumber,
        /// Sphere index
        sphere: usize,
    },
}

/// Nearest hit of a line-of-sight query between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LosSummary {
    /// Nearest hit, `None` when the target is visible
    pub nearest: Option<LosHitKind>,
    /// Distance to the nearest hit, or to the target
    pub distance: f32,
    /// Nearest hit point, or the target
    pub position: Vec3,
}

impl LosSummary {
    /// True if nothing blocks the target
    pub fn is_clear(&self) -> bool {
        self.nearest.is_none()
    }
}

fn sort_hits<T>(hits: &mut [T], key: impl Fn(&T) -> (f32, usize, usize)) {
    hits.sort_by(|a, b| {
        let (da, ia, sa) = key(a);
        let (db, ib, sb) = key(b);
        da.total_cmp(&db).then(ia.cmp(&ib)).then(sa.cmp(&sb))
    });
}

impl World {
    /// March a ray through room geometry, following portal triangles into
    /// neighboring rooms.
    ///
    /// The reported distance is measured from `origin` to the final point,
    /// not summed per room.
    pub fn get_room_los_collision(
        &self,
        origin: Vec3,
        room: RoomNumber,
        direction: Vec3,
        max_distance: f32,
    ) -> RoomLosCollision {
        let mut result = RoomLosCollision {
            is_intersected: false,
            position: origin,
            room,
            triangle: None,
            distance: 0.0,
            room_numbers: vec![room],
        };

        let Some(ray) = Ray::try_new(origin, direction) else {
            return result;
        };
        if !(max_distance > 0.0) {
            return result;
        }

        let mut segment = ray;
        let mut remaining = max_distance;
        let mut hops = 0u32;

        loop {
            let Some(current) = self.room(result.room) else {
                warn!("LOS ray entered unknown room {}", result.room);
                return result;
            };

            let Some(hit) = current.collision_mesh.get_collision(&segment, remaining) else {
                result.position = ray.point_at(max_distance);
                result.distance = max_distance;
                return result;
            };

            match hit.triangle.portal_room {
                Some(next) if next != result.room => {
                    hops += 1;
                    if hops > self.config.los.max_portal_hops {
                        warn!("LOS ray from {origin:?} exceeded {} portal hops", self.config.los.max_portal_hops);
                    } else {
                        trace!("LOS ray crossed from room {} to room {next}", result.room);
                        remaining = (remaining - hit.distance).max(0.0);
                        segment = Ray {
                            origin: hit.position,
                            ..ray
                        };
                        result.room = next;
                        result.room_numbers.push(next);
                        continue;
                    }
                }
                Some(next) => warn!("LOS ray hit a portal of room {next} leading to itself"),
                None => {}
            }

            result.is_intersected = true;
            result.position = hit.position;
            result.distance = (hit.position - origin).norm();
            result.triangle = Some(hit.triangle);
            return result;
        }
    }

    /// Room geometry march plus object tests selected by `options`.
    ///
    /// Objects are gathered from the neighbor closure of every room the ray
    /// crossed; hits farther than the room geometry hit are dropped.
    pub fn get_los_collision(
        &self,
        origin: Vec3,
        room: RoomNumber,
        direction: Vec3,
        max_distance: f32,
        options: LosOptions,
    ) -> LosCollision {
        let room_hit = self.get_room_los_collision(origin, room, direction, max_distance);
        let mut result = LosCollision {
            room: room_hit,
            moveables: Vec::new(),
            statics: Vec::new(),
            spheres: Vec::new(),
        };

        let wants_objects = options.moveables || options.statics || options.spheres;
        let Some(ray) = Ray::try_new(origin, direction).filter(|_| wants_objects) else {
            return result;
        };
        let limit = result.room.distance;

        let nearby: BTreeSet<RoomNumber> = result
            .room
            .room_numbers
            .iter()
            .filter_map(|&number| self.room(number))
            .flat_map(|visited| visited.neighbors.iter().copied())
            .collect();
        let shape = QueryShape::ray(ray, limit);
        let keys: BTreeSet<ObjectKey> = nearby
            .iter()
            .filter_map(|&number| self.room(number))
            .flat_map(|candidate| candidate.objects.get_bounded_object_ids(&shape))
            .collect();

        for key in keys {
            match key {
                ObjectKey::Moveable(number) => {
                    if options.ignore_item == Some(number) {
                        continue;
                    }
                    let Some(moveable) = self.moveables.get(&number) else {
                        continue;
                    };
                    if !moveable.collidable || moveable.killed {
                        continue;
                    }

                    if options.moveables {
                        if let Some(distance) = moveable.obb().intersect_ray(&ray).filter(|&t| t <= limit) {
                            result.moveables.push(ObjectLosHit {
                                number,
                                position: ray.point_at(distance),
                                distance,
                            });
                        }
                    }
                    if options.spheres {
                        for (index, sphere) in moveable.hit_spheres.iter().enumerate() {
                            if let Some(distance) = sphere.intersect_ray(&ray).filter(|&t| t <= limit) {
                                result.spheres.push(SphereLosHit {
                                    item: number,
                                    sphere: index,
                                    position: ray.point_at(distance),
                                    distance,
                                });
                            }
                        }
                    }
                }
                ObjectKey::Static(number) => {
                    if !options.statics {
                        continue;
                    }
                    let Some(object) = self.statics.get(&number).filter(|s| s.collidable) else {
                        continue;
                    };
                    if let Some(distance) = object.obb().intersect_ray(&ray).filter(|&t| t <= limit) {
                        result.statics.push(ObjectLosHit {
                            number,
                            position: ray.point_at(distance),
                            distance,
                        });
                    }
                }
            }
        }

        sort_hits(&mut result.moveables, |h| (h.distance, h.number, 0));
        sort_hits(&mut result.statics, |h| (h.distance, h.number, 0));
        sort_hits(&mut result.spheres, |h| (h.distance, h.item, h.sphere));
        result
    }

    /// True if room geometry leaves a clear line from `origin` to `target`
    pub fn los(&self, room: RoomNumber, origin: Vec3i, target: Vec3i) -> bool {
        let from = utils::to_vec3(origin);
        let delta = utils::to_vec3(target) - from;
        let distance = delta.norm();
        if distance == 0.0 {
            return true;
        }
        !self.get_room_los_collision(from, room, delta, distance).is_intersected
    }

    /// Nearest obstruction between `origin` and `target`.
    ///
    /// On equal distances an object wins over room geometry, and spheres win
    /// over boxes.
    pub fn los_detailed(&self, room: RoomNumber, origin: Vec3i, target: Vec3i, options: LosOptions) -> LosSummary {
        let from = utils::to_vec3(origin);
        let to = utils::to_vec3(target);
        let delta = to - from;
        let distance = delta.norm();

        let mut summary = LosSummary {
            nearest: None,
            distance,
            position: to,
        };
        if distance == 0.0 {
            return summary;
        }

        let collision = self.get_los_collision(from, room, delta, distance, options);
        let mut candidates = Vec::new();
        if let Some(hit) = collision.spheres.first() {
            candidates.push((LosHitKind::Sphere { item: hit.item, sphere: hit.sphere }, hit.distance, hit.position));
        }
        if let Some(hit) = collision.moveables.first() {
            candidates.push((LosHitKind::Moveable(hit.number), hit.distance, hit.position));
        }
        if let Some(hit) = collision.statics.first() {
            candidates.push((LosHitKind::Static(hit.number), hit.distance, hit.position));
        }
        if collision.room.is_intersected {
            let room_hit = &collision.room;
            candidates.push((LosHitKind::Room(room_hit.room), room_hit.distance, room_hit.position));
        }

        for (kind, hit_distance, position) in candidates {
            if summary.nearest.is_none() || hit_distance < summary.distance {
                summary = LosSummary {
                    nearest: Some(kind),
                    distance: hit_distance,
                    position,
                };
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CollisionConfig;
    use crate::level::objects::block_bounds;
    use crate::level::test_support::{corridor, split_room};
    use crate::level::{Moveable, Pose, StaticObject};
    use crate::physics::collision::BoundingSphere;
    use approx::assert_relative_eq;

    fn corridor_world(statics: Vec<StaticObject>) -> World {
        World::new(corridor(2), statics, CollisionConfig::default()).unwrap()
    }

    fn origin() -> Vec3 {
        Vec3::new(1536.0, -512.0, 1536.0)
    }

    #[test]
    fn test_wall_hit_stays_in_room() {
        let world = World::new(vec![split_room()], Vec::new(), CollisionConfig::default()).unwrap();
        let hit = world.get_room_los_collision(origin(), 0, Vec3::x(), 4096.0);
        assert!(hit.is_intersected);
        assert_relative_eq!(hit.distance, 512.0, epsilon = 1e-3);
        assert_relative_eq!(hit.position.x, 2048.0, epsilon = 1e-3);
        assert_eq!(hit.room_numbers, vec![0]);
        assert!(hit.triangle.is_some_and(|t| !t.is_portal()));
    }

    #[test]
    fn test_portal_hop_reports_euclidean_distance() {
        let world = corridor_world(Vec::new());
        let direction = Vec3::new(1.0, 0.0, 0.1);
        let hit = world.get_room_los_collision(origin(), 0, direction, 8192.0);
        assert!(hit.is_intersected);
        assert_eq!(hit.room_numbers, vec![0, 1]);
        assert_eq!(hit.room, 1);
        assert_relative_eq!(hit.position.x, 3072.0, epsilon = 1e-2);
        assert_relative_eq!(hit.distance, (hit.position - origin()).norm(), epsilon = 1e-3);
        assert_relative_eq!(hit.distance, 1536.0 * (1.0f32 + 0.01).sqrt(), epsilon = 1e-1);
    }

    #[test]
    fn test_short_ray_is_not_intersected() {
        let world = corridor_world(Vec::new());
        let hit = world.get_room_los_collision(origin(), 0, Vec3::x() * 3.0, 300.0);
        assert!(!hit.is_intersected);
        assert_relative_eq!(hit.distance, 300.0);
        assert_relative_eq!(hit.position, origin() + Vec3::new(300.0, 0.0, 0.0), epsilon = 1e-3);
        assert!(hit.triangle.is_none());
    }

    #[test]
    fn test_degenerate_ray() {
        let world = corridor_world(Vec::new());
        let hit = world.get_room_los_collision(origin(), 0, Vec3::zeros(), 100.0);
        assert!(!hit.is_intersected);
        assert_eq!(hit.distance, 0.0);
        assert_eq!(hit.position, origin());
    }

    #[test]
    fn test_portal_into_same_room_stops_the_ray() {
        let mut world = World::new(vec![split_room()], Vec::new(), CollisionConfig::default()).unwrap();
        let mut mesh = crate::physics::CollisionMesh::new();
        mesh.insert_triangle(
            Vec3::new(2048.0, -3000.0, -1000.0),
            Vec3::new(2048.0, -3000.0, 5000.0),
            Vec3::new(2048.0, 2000.0, 1536.0),
            -Vec3::x(),
            Some(0),
        );
        mesh.initialize();
        world.rooms[0].collision_mesh = mesh;

        let hit = world.get_room_los_collision(origin(), 0, Vec3::x(), 4096.0);
        assert!(hit.is_intersected);
        assert_relative_eq!(hit.distance, 512.0, epsilon = 1e-3);
        assert_eq!(hit.room_numbers, vec![0]);
        assert!(hit.triangle.is_some_and(|t| t.portal_room == Some(0)));
    }

    #[test]
    fn test_portal_hop_limit_stops_the_ray() {
        let unlimited = World::new(corridor(3), Vec::new(), CollisionConfig::default()).unwrap();
        let hit = unlimited.get_room_los_collision(origin(), 0, Vec3::x(), 8192.0);
        assert_eq!(hit.room_numbers, vec![0, 1, 2]);
        assert_relative_eq!(hit.position.x, 4096.0, epsilon = 1e-2);

        let mut config = CollisionConfig::default();
        config.los.max_portal_hops = 1;
        let limited = World::new(corridor(3), Vec::new(), config).unwrap();
        let hit = limited.get_room_los_collision(origin(), 0, Vec3::x(), 8192.0);
        assert!(hit.is_intersected);
        assert_eq!(hit.room_numbers, vec![0, 1]);
        assert_relative_eq!(hit.position.x, 3072.0, epsilon = 1e-2);
        assert_relative_eq!(hit.distance, 1536.0, epsilon = 1e-2);
        assert!(hit.triangle.is_some_and(|t| t.portal_room == Some(2)));
    }

    #[test]
    fn test_objects_across_rooms_sorted_per_category() {
        let bounds = block_bounds(100.0, 100.0, -800.0, 0.0);
        let statics = vec![StaticObject::new(4, 0, Pose::new(Vec3i::new(1900, 0, 1536), 0.0), bounds)];
        let mut world = corridor_world(statics);

        let near = Moveable::new(1, 1, Pose::new(Vec3i::new(2560, 0, 1536), 0.0), block_bounds(200.0, 200.0, -800.0, 0.0));
        let far = Moveable::new(2, 1, Pose::new(Vec3i::new(2800, 0, 1536), 0.0), block_bounds(200.0, 200.0, -800.0, 0.0));
        world.add_moveable(far).unwrap();
        world.add_moveable(near).unwrap();
        world
            .set_hit_spheres(1, vec![BoundingSphere::new(Vec3::new(2560.0, -512.0, 1536.0), 100.0)])
            .unwrap();

        let options = LosOptions::default().with_spheres(true);
        let result = world.get_los_collision(origin(), 0, Vec3::x(), 8192.0, options);

        let moveables: Vec<_> = result.moveables.iter().map(|h| h.number).collect();
        assert_eq!(moveables, vec![1, 2]);
        assert_relative_eq!(result.moveables[0].distance, 924.0, epsilon = 1e-2);
        assert_eq!(result.statics.len(), 1);
        assert_relative_eq!(result.statics[0].distance, 314.0, epsilon = 1e-2);
        assert_eq!(result.spheres.len(), 1);
        assert_relative_eq!(result.spheres[0].distance, 924.0, epsilon = 1e-2);

        let summary = world.los_detailed(0, Vec3i::new(1536, -512, 1536), Vec3i::new(3500, -512, 1536), options);
        assert_eq!(summary.nearest, Some(LosHitKind::Static(4)));
        assert_relative_eq!(summary.distance, 314.0, epsilon = 1e-2);
    }

    #[test]
    fn test_ignored_and_killed_items_are_skipped() {
        let mut world = corridor_world(Vec::new());
        let bounds = block_bounds(200.0, 200.0, -800.0, 0.0);
        world.add_moveable(Moveable::new(1, 1, Pose::new(Vec3i::new(2560, 0, 1536), 0.0), bounds)).unwrap();
        world.add_moveable(Moveable::new(2, 1, Pose::new(Vec3i::new(2800, 0, 1536), 0.0), bounds)).unwrap();

        let ignoring = world.get_los_collision(origin(), 0, Vec3::x(), 8192.0, LosOptions::default().ignoring(1));
        assert_eq!(ignoring.moveables.iter().map(|h| h.number).collect::<Vec<_>>(), vec![2]);

        world.kill_moveable(2).unwrap();
        let killed = world.get_los_collision(origin(), 0, Vec3::x(), 8192.0, LosOptions::default().ignoring(1));
        assert!(killed.moveables.is_empty());

        let room_only = world.get_los_collision(origin(), 0, Vec3::x(), 8192.0, LosOptions::room_only());
        assert!(room_only.moveables.is_empty());
        assert!(room_only.room.is_intersected);
    }

    #[test]
    fn test_boolean_los() {
        let world = corridor_world(Vec::new());
        let from = Vec3i::new(1536, -512, 1536);
        assert!(world.los(0, from, Vec3i::new(2560, -512, 1536)));
        assert!(!world.los(0, from, Vec3i::new(3500, -512, 1536)));
        assert!(world.los(0, from, from));

        let summary = world.los_detailed(0, from, Vec3i::new(2560, -512, 1536), LosOptions::default());
        assert!(summary.is_clear());
        assert_relative_eq!(summary.distance, 1024.0, epsilon = 1e-3);
    }
}
