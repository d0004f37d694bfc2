//! Level context
//!
//! [`World`] owns every room, object and bridge registration of the active
//! level. It is built once from loader data, validated, and then passed by
//! reference into every query.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::{debug, info, warn};

use crate::core::config::CollisionConfig;
use crate::physics::collision::BoundingSphere;

use super::mesh_builder;
use super::objects::{Moveable, ObjectKey, Pose, StaticObject};
use super::room::{Room, RoomDescriptor};
use super::sector::{Sector, SplitDirection};
use super::{ItemNumber, LevelError, RoomNumber, SectorRef, StaticNumber};

/// The active level
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) rooms: Vec<Room>,
    pub(crate) moveables: BTreeMap<ItemNumber, Moveable>,
    pub(crate) statics: BTreeMap<StaticNumber, StaticObject>,
    pub(crate) bridge_sectors: BTreeMap<ItemNumber, BTreeSet<SectorRef>>,
    pub(crate) config: CollisionConfig,
}

impl World {
    /// Build and validate a level.
    ///
    /// Computes neighbor closures, synthesizes every room's collision mesh
    /// and registers the static objects.
    pub fn new(
        descriptors: Vec<RoomDescriptor>,
        statics: Vec<StaticObject>,
        config: CollisionConfig,
    ) -> Result<Self, LevelError> {
        config.validate().map_err(LevelError::InvalidConfig)?;

        let oversize_factor = config.tree.oversize_factor;
        let rooms: Vec<Room> = descriptors
            .into_iter()
            .enumerate()
            .map(|(number, descriptor)| Room::from_descriptor(number, descriptor, oversize_factor))
            .collect();

        let mut world = Self {
            rooms,
            moveables: BTreeMap::new(),
            statics: BTreeMap::new(),
            bridge_sectors: BTreeMap::new(),
            config,
        };
        world.validate()?;
        world.compute_neighbors();

        for number in 0..world.rooms.len() {
            world.regenerate_collision_mesh(number);
        }
        for object in statics {
            world.add_static(object)?;
        }

        info!(
            "Level ready: {} rooms, {} statics",
            world.rooms.len(),
            world.statics.len()
        );
        Ok(world)
    }

    /// Active configuration
    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// All rooms
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Room by number
    pub fn room(&self, number: RoomNumber) -> Option<&Room> {
        self.rooms.get(number)
    }

    /// Moveable by number
    pub fn moveable(&self, number: ItemNumber) -> Option<&Moveable> {
        self.moveables.get(&number)
    }

    /// Static object by number
    pub fn static_object(&self, number: StaticNumber) -> Option<&StaticObject> {
        self.statics.get(&number)
    }

    /// Sector data by reference
    pub fn sector(&self, sector: SectorRef) -> Option<&Sector> {
        self.sector_parts(sector).map(|(_, data)| data)
    }

    pub(crate) fn sector_parts(&self, sector: SectorRef) -> Option<(&Room, &Sector)> {
        let room = self.rooms.get(sector.room)?;
        Some((room, room.sectors.get(sector.index)?))
    }

    /// Add a moveable to its room's object tree, registering bridge membership
    pub fn add_moveable(&mut self, moveable: Moveable) -> Result<(), LevelError> {
        let number = moveable.number;
        if self.moveables.contains_key(&number) {
            return Err(LevelError::DuplicateItem(number));
        }
        let margin = self.config.tree.object_margin;
        let room = self
            .rooms
            .get_mut(moveable.room)
            .ok_or(LevelError::InvalidRoom(moveable.room))?;

        room.objects.insert(ObjectKey::Moveable(number), moveable.obb().aabb(), margin);
        let is_bridge = moveable.bridge.is_some();
        self.moveables.insert(number, moveable);

        if is_bridge {
            self.update_bridge_item(number, false);
        }
        debug!("Added moveable {number}");
        Ok(())
    }

    /// Move a moveable, transferring it between room trees when its room
    /// changes and refreshing bridge membership
    pub fn update_moveable(&mut self, number: ItemNumber, pose: Pose, room: RoomNumber) -> Result<(), LevelError> {
        if room >= self.rooms.len() {
            return Err(LevelError::InvalidRoom(room));
        }
        let margin = self.config.tree.object_margin;
        let moveable = self.moveables.get_mut(&number).ok_or(LevelError::UnknownItem(number))?;

        let key = ObjectKey::Moveable(number);
        let old_room = moveable.room;
        moveable.pose = pose;
        moveable.room = room;
        let aabb = moveable.obb().aabb();
        let is_bridge = moveable.bridge.is_some();

        if old_room == room {
            self.rooms[room].objects.move_object(key, aabb, margin);
        } else {
            self.rooms[old_room].objects.remove(key);
            self.rooms[room].objects.insert(key, aabb, margin);
        }

        if is_bridge {
            self.update_bridge_item(number, false);
        }
        Ok(())
    }

    /// Replace a moveable's body-part spheres
    pub fn set_hit_spheres(&mut self, number: ItemNumber, spheres: Vec<BoundingSphere>) -> Result<(), LevelError> {
        let moveable = self.moveables.get_mut(&number).ok_or(LevelError::UnknownItem(number))?;
        moveable.hit_spheres = spheres;
        Ok(())
    }

    /// Change a bridge's behavior (opening a trapdoor, retilting a plank)
    pub fn set_bridge_kind(&mut self, number: ItemNumber, kind: Option<super::BridgeKind>) -> Result<(), LevelError> {
        let moveable = self.moveables.get_mut(&number).ok_or(LevelError::UnknownItem(number))?;
        moveable.bridge = kind;
        self.update_bridge_item(number, false);
        Ok(())
    }

    /// Mark a moveable as killed. It stays addressable but no longer blocks
    /// rays or supports anything.
    pub fn kill_moveable(&mut self, number: ItemNumber) -> Result<(), LevelError> {
        let moveable = self.moveables.get_mut(&number).ok_or(LevelError::UnknownItem(number))?;
        moveable.killed = true;
        moveable.collidable = false;
        self.update_bridge_item(number, true);
        Ok(())
    }

    /// Remove a moveable entirely
    pub fn remove_moveable(&mut self, number: ItemNumber) -> Option<Moveable> {
        self.update_bridge_item(number, true);
        let moveable = self.moveables.remove(&number)?;
        if let Some(room) = self.rooms.get_mut(moveable.room) {
            room.objects.remove(ObjectKey::Moveable(number));
        }
        Some(moveable)
    }

    fn add_static(&mut self, object: StaticObject) -> Result<(), LevelError> {
        let margin = self.config.tree.object_margin;
        let room = self
            .rooms
            .get_mut(object.room)
            .ok_or(LevelError::InvalidRoom(object.room))?;
        room.objects.insert(ObjectKey::Static(object.number), object.obb().aabb(), margin);
        self.statics.insert(object.number, object);
        Ok(())
    }

    /// Rebuild one room's collision mesh from its sectors
    pub fn regenerate_collision_mesh(&mut self, number: RoomNumber) {
        if number >= self.rooms.len() {
            return;
        }
        let mesh = mesh_builder::build_room_mesh(
            &self.rooms,
            number,
            self.config.tree.triangle_margin,
            self.config.room_graph.max_portal_hops,
        );
        self.rooms[number].collision_mesh = mesh;
    }

    /// Swap a room's sector geometry with its flipped counterpart.
    ///
    /// Bridge membership stays with the sector slots. Collision meshes of
    /// both rooms and everything near them are regenerated. A swap that
    /// would create a portal loop is undone and reported.
    pub fn flip_room(&mut self, number: RoomNumber) -> Result<(), LevelError> {
        let flipped = self
            .rooms
            .get(number)
            .ok_or(LevelError::InvalidRoom(number))?
            .flipped_room
            .ok_or(LevelError::NoFlipRoom { room: number })?;

        self.swap_geometry(number, flipped);
        if let Err(err) = self.validate_portal_chains(number).and_then(|()| self.validate_portal_chains(flipped)) {
            self.swap_geometry(number, flipped);
            warn!("Flip of room {number} rejected: {err}");
            return Err(err);
        }

        self.rooms[number].flipped = !self.rooms[number].flipped;
        self.rooms[flipped].flipped = !self.rooms[flipped].flipped;
        self.compute_neighbors();

        let mut affected = BTreeSet::new();
        for room in [number, flipped] {
            affected.extend(self.rooms[room].neighbors.iter().copied());
        }
        for room in affected {
            self.regenerate_collision_mesh(room);
        }

        let bridges: Vec<ItemNumber> = self.bridge_sectors.keys().copied().collect();
        for item in bridges {
            self.update_bridge_item(item, false);
        }
        info!("Flipped room {number} with room {flipped}");
        Ok(())
    }

    fn swap_geometry(&mut self, a: RoomNumber, b: RoomNumber) {
        if a == b {
            return;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.rooms.split_at_mut(second);
        let (room_a, room_b) = (&mut head[first], &mut tail[0]);

        for (sa, sb) in room_a.sectors.iter_mut().zip(room_b.sectors.iter_mut()) {
            std::mem::swap(&mut sa.floor, &mut sb.floor);
            std::mem::swap(&mut sa.ceiling, &mut sb.ceiling);
            std::mem::swap(&mut sa.side_room, &mut sb.side_room);
            std::mem::swap(&mut sa.flags, &mut sb.flags);
        }
    }

    /// Breadth-first closure over portal, door and flip links
    fn compute_neighbors(&mut self) {
        let depth = self.config.room_graph.neighbor_search_depth;
        let links: Vec<BTreeSet<RoomNumber>> = self
            .rooms
            .iter()
            .map(|room| room.linked_rooms().filter(|&r| r < self.rooms.len()).collect())
            .collect();

        for (number, room) in self.rooms.iter_mut().enumerate() {
            let mut found = BTreeSet::from([number]);
            let mut queue = VecDeque::from([(number, 0u32)]);
            while let Some((current, distance)) = queue.pop_front() {
                if distance >= depth {
                    continue;
                }
                for &next in &links[current] {
                    if found.insert(next) {
                        queue.push_back((next, distance + 1));
                    }
                }
            }
            room.neighbors = found.into_iter().collect();
        }
    }

    fn validate(&self) -> Result<(), LevelError> {
        let count = self.rooms.len();
        for room in &self.rooms {
            let number = room.number;
            if room.size_x == 0 || room.size_z == 0 {
                return Err(LevelError::EmptyRoom { room: number });
            }
            let expected = room.size_x * room.size_z;
            if room.sectors.len() != expected {
                return Err(LevelError::SectorCountMismatch {
                    room: number,
                    expected,
                    actual: room.sectors.len(),
                });
            }

            for (index, sector) in room.sectors.iter().enumerate() {
                for target in sector.linked_rooms() {
                    if target >= count {
                        return Err(LevelError::UnknownRoom { room: number, target });
                    }
                    if target == number {
                        return Err(LevelError::SelfPortal { room: number, sector: index });
                    }
                }
            }
            for target in room.doors.iter().copied().chain(room.flipped_room) {
                if target >= count {
                    return Err(LevelError::UnknownRoom { room: number, target });
                }
                if target == number {
                    return Err(LevelError::SelfPortal { room: number, sector: 0 });
                }
            }
            if let Some(flipped) = room.flipped_room {
                let other = &self.rooms[flipped];
                if other.size_x != room.size_x || other.size_z != room.size_z {
                    return Err(LevelError::FlipSizeMismatch { room: number, flipped });
                }
            }
        }

        for number in 0..count {
            self.validate_portal_chains(number)?;
        }
        Ok(())
    }

    /// Follow side, floor and ceiling portal chains from sample points of
    /// both halves of every sector, failing if a chain revisits a room
    fn validate_portal_chains(&self, number: RoomNumber) -> Result<(), LevelError> {
        let room = &self.rooms[number];
        let samples: Vec<(f32, f32)> = [SplitDirection::Diagonal02, SplitDirection::Diagonal13]
            .iter()
            .flat_map(|split| [split.half_centroid(0), split.half_centroid(1)])
            .collect();

        for index in 0..room.sectors.len() {
            let (cx, cz) = room.sector_center(index);
            for &(dx, dz) in &samples {
                let x = cx + dx.round() as i32;
                let z = cz + dz.round() as i32;
                for below in [true, false] {
                    if !self.portal_chain_terminates(number, x, z, below) {
                        return Err(LevelError::PortalCycle { room: number, sector: index });
                    }
                }
            }
        }
        Ok(())
    }

    fn portal_chain_terminates(&self, start: RoomNumber, x: i32, z: i32, below: bool) -> bool {
        let mut visited = BTreeSet::from([start]);
        let mut current = start;
        loop {
            let room = &self.rooms[current];
            let index = room.sector_index_at(x, z);
            let sector = &room.sectors[index];
            let next = match sector.side_room {
                Some(side) => Some(side),
                None => {
                    let (dx, dz) = room.local_offset(index, x as f32, z as f32);
                    sector.portal_room(dx, dz, below)
                }
            };
            let Some(next) = next else {
                return true;
            };
            if !visited.insert(next) {
                return false;
            }
            current = next;
        }
    }
}
