//! The world store: one authoritative registry of rooms, areas, prototypes,
//! ships, live entities and connected clients.
//!
//! The whole store sits behind a single mutex (`WorldHandle`). Every reader
//! and writer, whether the command executor, the pump, scheduler callbacks
//! or the connection layer, takes that lock for the duration of its pass.

pub mod room;
pub mod area;
pub mod combat;
pub mod space;

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info};
use rand::Rng;
use tokio::sync::mpsc;

use mud_shared::{
    AreaData, CharData, HelpData, ItemData, RoomData, ShipData, StarSystemData,
};

use crate::commands::CommandTable;
use crate::economy::Lottery;
use crate::entities::{Entity, EntityId};
use crate::error::{MudError, MudResult};
use crate::network::Outbound;

/// Connection id
pub type ClientId = u64;

/// Shared ownership handle to the world store
pub type WorldHandle = Arc<Mutex<World>>;

/// Wrap a world in a handle.
pub fn new_handle(world: World) -> WorldHandle {
    Arc::new(Mutex::new(world))
}

/// Take the world lock. A panic in another holder does not take the world
/// down with it; the data is used as-is.
pub fn lock_world(handle: &WorldHandle) -> MutexGuard<'_, World> {
    handle.lock().unwrap_or_else(|poisoned| {
        error!("World lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Room ids are only unique within a namespace: planetside (`ship == 0`) or
/// the interior of one ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey {
    pub room: u64,
    pub ship: u64,
}

impl RoomKey {
    pub const fn new(room: u64, ship: u64) -> Self {
        Self { room, ship }
    }

    pub const fn planet(room: u64) -> Self {
        Self { room, ship: 0 }
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ship == 0 {
            write!(f, "{}", self.room)
        } else {
            write!(f, "{}@ship{}", self.room, self.ship)
        }
    }
}

/// A connected client as seen by the world
#[derive(Debug)]
pub struct ClientRecord {
    pub id: ClientId,
    pub addr: Option<SocketAddr>,
    /// Seconds since the last line was received
    pub idle: u32,
    /// Bound entity once logged in
    pub entity: Option<EntityId>,
    /// True while the line editor owns the connection
    pub editing: bool,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ClientRecord {
    pub fn new(id: ClientId, addr: Option<SocketAddr>, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            addr,
            idle: 0,
            entity: None,
            editing: false,
            tx,
        }
    }

    pub fn send(&self, out: Outbound) -> bool {
        self.tx.send(out).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Outbound> {
        self.tx.clone()
    }
}

/// The world store
#[derive(Default)]
pub struct World {
    rooms: HashMap<RoomKey, RoomData>,
    /// Planet room id -> index into `areas`
    room_area: HashMap<u64, usize>,
    /// Area metadata and spawn tables; rooms live in the room index
    pub areas: Vec<AreaData>,
    entities: Vec<Entity>,
    pub item_protos: BTreeMap<u64, ItemData>,
    pub mob_protos: BTreeMap<u64, CharData>,
    pub ships: Vec<ShipData>,
    pub starsystems: Vec<StarSystemData>,
    pub helps: Vec<HelpData>,
    pub commands: CommandTable,
    clients: Vec<ClientRecord>,
    pub lottery: Lottery,
    /// Pending auto-close or relock per door side
    door_timers: HashMap<(RoomKey, String), room::DoorTimer>,
    next_door_timer: u64,
}

impl World {
    pub fn new(commands: CommandTable) -> Self {
        Self {
            commands,
            ..Default::default()
        }
    }

    // =========================================================================
    // Rooms and areas
    // =========================================================================

    /// Register an area, moving its rooms into the room index.
    pub fn add_area(&mut self, mut area: AreaData) {
        let index = self.areas.len();
        for room in area.rooms.drain(..) {
            let key = RoomKey::planet(room.id);
            if self.rooms.insert(key, room).is_some() {
                error!("Room {} defined twice, area '{}' wins", key, area.name);
            }
            self.room_area.insert(key.room, index);
        }
        info!("Area '{}' loaded", area.name);
        self.areas.push(area);
    }

    /// Area file snapshot with its rooms put back, for saving.
    pub fn area_snapshot(&self, index: usize) -> Option<AreaData> {
        let mut area = self.areas.get(index)?.clone();
        let mut rooms: Vec<RoomData> = self
            .room_area
            .iter()
            .filter(|(_, i)| **i == index)
            .filter_map(|(id, _)| self.rooms.get(&RoomKey::planet(*id)))
            .map(|r| RoomData { items: Vec::new(), ..r.clone() })
            .collect();
        rooms.sort_by_key(|r| r.id);
        area.rooms = rooms;
        Some(area)
    }

    pub fn area_index(&self, name: &str) -> Option<usize> {
        self.areas.iter().position(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Index of the area owning a room. Ship rooms have none.
    pub fn area_of(&self, key: RoomKey) -> Option<usize> {
        if key.ship != 0 {
            return None;
        }
        self.room_area.get(&key.room).copied()
    }

    /// Look up a room. A miss means the world data references a room that
    /// does not exist.
    pub fn get_room(&self, key: RoomKey) -> MudResult<&RoomData> {
        self.rooms.get(&key).ok_or_else(|| MudError::not_found("room", key))
    }

    pub fn get_room_mut(&mut self, key: RoomKey) -> MudResult<&mut RoomData> {
        self.rooms.get_mut(&key).ok_or_else(|| MudError::not_found("room", key))
    }

    pub fn has_room(&self, key: RoomKey) -> bool {
        self.rooms.contains_key(&key)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Snapshot of every live entity id, in roster order
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.id()).collect()
    }

    /// Append to the roster. An entity whose id is already present is
    /// handed back unchanged.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, Entity> {
        let id = entity.id();
        if self.entity(id).is_some() {
            return Err(entity);
        }
        self.entities.push(entity);
        Ok(id)
    }

    /// Remove from the roster. No-op if absent.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let idx = self.entities.iter().position(|e| e.id() == id)?;
        let entity = self.entities.remove(idx);
        for other in self.entities.iter_mut() {
            if other.attacker == Some(id) {
                other.stop_fighting();
            }
        }
        Some(entity)
    }

    /// Clone a mob prototype into the roster with a fresh instance id. The
    /// caller places it in a room.
    pub fn spawn_entity<R: Rng>(&mut self, prototype: u64, rng: &mut R) -> MudResult<EntityId> {
        let proto = self
            .mob_protos
            .get(&prototype)
            .ok_or_else(|| MudError::not_found("mob", prototype))?;
        let mut entity = Entity::spawn_from(proto, rng);
        while self.entity(entity.id()).is_some() {
            entity.char.id = crate::entities::item::new_npc_id(rng);
        }
        let id = entity.id();
        debug!("Spawned '{}' [{}] from prototype {}", entity.name(), id, prototype);
        self.entities.push(entity);
        Ok(id)
    }

    /// Ids of entities physically present in a room, in roster order.
    pub fn entities_in_room(&self, key: RoomKey) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.location() == key)
            .map(|e| e.id())
            .collect()
    }

    /// First other entity in the room matching `query`.
    pub fn find_in_room(&self, key: RoomKey, query: &str, except: EntityId) -> Option<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.location() == key && e.id() != except)
            .find(|e| e.char.matches(query))
            .map(|e| e.id())
    }

    /// A player by exact (case-insensitive) name.
    pub fn find_player(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|e| e.is_player() && e.name().eq_ignore_ascii_case(name))
            .map(|e| e.id())
    }

    /// Any entity by name prefix, players first.
    pub fn find_entity(&self, query: &str) -> Option<EntityId> {
        self.find_player(query).or_else(|| {
            self.entities
                .iter()
                .find(|e| e.char.matches(query))
                .map(|e| e.id())
        })
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Send to everyone in a room except the listed entities.
    pub fn send_to_room(&self, key: RoomKey, msg: &str, except: &[EntityId]) {
        for e in self.entities.iter().filter(|e| e.location() == key) {
            if !except.contains(&e.id()) {
                e.send(msg);
            }
        }
    }

    /// Send to every player in the game.
    pub fn broadcast(&self, msg: &str) {
        for e in self.entities.iter().filter(|e| e.is_player()) {
            e.send(msg);
        }
    }

    /// Show an entity its prompt.
    pub fn prompt(&self, id: EntityId) {
        if let Some(e) = self.entity(id) {
            if e.is_player() && !self.is_editing(id) {
                e.send(e.prompt());
            }
        }
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Register a connection. No-op if the id is already present.
    pub fn add_client(&mut self, client: ClientRecord) {
        if self.client(client.id).is_none() {
            self.clients.push(client);
        }
    }

    /// Deregister a connection. No-op if absent.
    pub fn remove_client(&mut self, id: ClientId) -> Option<ClientRecord> {
        let idx = self.clients.iter().position(|c| c.id == id)?;
        Some(self.clients.remove(idx))
    }

    pub fn client(&self, id: ClientId) -> Option<&ClientRecord> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut ClientRecord> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    pub fn clients(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.iter()
    }

    pub fn clients_mut(&mut self) -> impl Iterator<Item = &mut ClientRecord> {
        self.clients.iter_mut()
    }

    /// Client currently bound to an entity
    pub fn client_for(&self, entity: EntityId) -> Option<&ClientRecord> {
        self.clients.iter().find(|c| c.entity == Some(entity))
    }

    pub fn is_editing(&self, entity: EntityId) -> bool {
        self.client_for(entity).map(|c| c.editing).unwrap_or(false)
    }

    /// Reset a client's idle counter.
    pub fn touch_client(&mut self, id: ClientId) {
        if let Some(c) = self.client_mut(id) {
            c.idle = 0;
        }
    }

    // =========================================================================
    // Prototypes, ships and systems
    // =========================================================================

    /// Spawn a fresh instance of an item prototype.
    pub fn clone_item<R: Rng>(&self, prototype: u64, rng: &mut R) -> MudResult<ItemData> {
        let proto = self
            .item_protos
            .get(&prototype)
            .ok_or_else(|| MudError::not_found("item", prototype))?;
        Ok(proto.instantiate(&mut || crate::entities::item::new_item_id(&mut *rng)))
    }

    /// Register a ship, moving its interior rooms into the room index.
    pub fn add_ship(&mut self, mut ship: ShipData) {
        for room in ship.rooms.drain(..) {
            self.rooms.insert(RoomKey::new(room.id, ship.id), room);
        }
        info!("Ship '{}' [{}] docked at {}", ship.name, ship.id, ship.location_id);
        self.ships.push(ship);
    }

    pub fn ship(&self, id: u64) -> Option<&ShipData> {
        self.ships.iter().find(|s| s.id == id)
    }

    pub fn ship_mut(&mut self, id: u64) -> Option<&mut ShipData> {
        self.ships.iter_mut().find(|s| s.id == id)
    }

    /// Ships docked at a planet room
    pub fn ships_docked_at(&self, room: u64) -> Vec<&ShipData> {
        self.ships
            .iter()
            .filter(|s| s.is_docked() && s.location_id == room)
            .collect()
    }

    pub fn starsystem(&self, name: &str) -> Option<&StarSystemData> {
        let lower = name.to_lowercase();
        self.starsystems
            .iter()
            .find(|s| s.name.to_lowercase().starts_with(&lower))
    }

    /// Help entries visible at `level` whose name or keywords start with `topic`.
    pub fn helps_for(&self, topic: &str, level: u32) -> Vec<&HelpData> {
        let topic = topic.to_lowercase();
        self.helps
            .iter()
            .filter(|h| h.level <= level)
            .filter(|h| {
                h.name.to_lowercase().starts_with(&topic)
                    || h.keywords.iter().any(|k| k.to_lowercase().starts_with(&topic))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::{EntityKind, MobData, PlayerData, Session};
    use mud_shared::{ExitFlag, MobSpawn};

    /// Three rooms in a row: 100 -north-> 101 -north-> 102, with a door
    /// between 101 and 102.
    pub fn test_world() -> World {
        let mut r100 = RoomData::new(100, "Docking Bay");
        r100.exits.insert("north".into(), 101);
        let mut r101 = RoomData::new(101, "Corridor");
        r101.exits.insert("south".into(), 100);
        r101.exits.insert("north".into(), 102);
        r101.exit_flags.insert("north".into(), ExitFlag { closed: true, locked: false, key: 0 });
        let mut r102 = RoomData::new(102, "Cantina");
        r102.exits.insert("south".into(), 101);
        r102.exit_flags.insert("south".into(), ExitFlag { closed: true, locked: false, key: 0 });

        let mut proto = CharData::new("a jawa");
        proto.id = 1;
        proto.keywords = vec!["jawa".into()];

        let mut world = World::new(CommandTable::builtin());
        world.mob_protos.insert(1, proto);
        world.item_protos.insert(
            10,
            ItemData { id: 10, name: "a glow rod".into(), keywords: vec!["rod".into()], ..Default::default() },
        );
        world.add_area(AreaData {
            name: "Mos Eisley".into(),
            reset: 300,
            reset_msg: "Sand blows in from the desert.".into(),
            rooms: vec![r100, r101, r102],
            mobs: vec![MobSpawn { mob: 1, room: 101 }],
            ..Default::default()
        });
        world
    }

    /// Add a connected player and return its id plus the outbound receiver.
    pub fn add_player(
        world: &mut World,
        name: &str,
        room: u64,
    ) -> (EntityId, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut ch = CharData::new(name);
        ch.id = 900_000_000 + world.entities.len() as u64 + 1;
        ch.room = room;
        let client_id = ch.id;
        let mut data = PlayerData::new(1);
        data.session = Some(Session::new(client_id, tx.clone()));
        let entity = Entity { char: ch, kind: EntityKind::Player(data), attacker: None };
        let id = world.add_entity(entity).ok().unwrap();
        let mut client = ClientRecord::new(client_id, None, tx);
        client.entity = Some(id);
        world.add_client(client);
        (id, rx)
    }

    /// Add an NPC in a room.
    pub fn add_npc(world: &mut World, name: &str, room: u64) -> EntityId {
        let mut ch = CharData::new(name);
        ch.id = 100_000_000 + world.entities.len() as u64 + 1;
        ch.room = room;
        let entity = Entity { char: ch, kind: EntityKind::NonPlayer(MobData { prototype: 0 }), attacker: None };
        world.add_entity(entity).ok().unwrap()
    }

    /// Drain all text waiting on a receiver, decolorized and joined.
    pub fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> String {
        let mut out = String::new();
        while let Ok(msg) = rx.try_recv() {
            if let Outbound::Text(text) = msg {
                out.push_str(&mud_shared::ansi::decolorize(&text));
            }
        }
        out
    }

    #[test]
    fn test_get_room_not_found() {
        let world = test_world();
        assert!(world.get_room(RoomKey::planet(100)).is_ok());
        let err = world.get_room(RoomKey::planet(999)).unwrap_err();
        assert!(matches!(err, MudError::NotFound { kind: "room", .. }));
        assert!(world.get_room(RoomKey::new(100, 5)).is_err());
    }

    #[test]
    fn test_entities_in_room_snapshot() {
        let mut world = test_world();
        let (a, _rx) = add_player(&mut world, "Han", 100);
        let b = add_npc(&mut world, "Greedo", 100);
        add_npc(&mut world, "Jabba", 101);
        assert_eq!(world.entities_in_room(RoomKey::planet(100)), vec![a, b]);
    }

    #[test]
    fn test_remove_entity_idempotent() {
        let mut world = test_world();
        let id = add_npc(&mut world, "Greedo", 100);
        assert!(world.remove_entity(id).is_some());
        assert!(world.remove_entity(id).is_none());
    }

    #[test]
    fn test_remove_entity_clears_attackers() {
        let mut world = test_world();
        let a = add_npc(&mut world, "Greedo", 100);
        let b = add_npc(&mut world, "Han", 100);
        world.entity_mut(a).unwrap().begin_fighting(b);
        world.remove_entity(b);
        assert!(!world.entity(a).unwrap().is_fighting());
    }

    #[test]
    fn test_add_entity_rejects_duplicate_id() {
        let mut world = test_world();
        let id = add_npc(&mut world, "Greedo", 100);
        let copy = Entity {
            char: world.entity(id).unwrap().char.clone(),
            kind: EntityKind::NonPlayer(MobData { prototype: 0 }),
            attacker: None,
        };
        assert!(world.add_entity(copy).is_err());
    }

    #[test]
    fn test_client_registry_idempotent() {
        let mut world = test_world();
        let (tx, _rx) = mpsc::unbounded_channel();
        world.add_client(ClientRecord::new(7, None, tx.clone()));
        world.add_client(ClientRecord::new(7, None, tx));
        assert_eq!(world.clients().count(), 1);
        assert!(world.remove_client(7).is_some());
        assert!(world.remove_client(7).is_none());
    }

    #[test]
    fn test_spawn_entity_leaves_room_unset() {
        let mut world = test_world();
        let id = world.spawn_entity(1, &mut rand::thread_rng()).unwrap();
        let mob = world.entity(id).unwrap();
        assert_ne!(id, 1);
        assert_eq!(mob.char.room, 0);
        assert!(world.spawn_entity(99, &mut rand::thread_rng()).is_err());
    }

    #[test]
    fn test_spawn_then_remove_restores_store() {
        let mut world = test_world();
        let (_han, _rx) = add_player(&mut world, "Han", 101);
        let proto_before = world.mob_protos.get(&1).cloned().unwrap();
        let roster_before = world.entities_in_room(RoomKey::planet(101));
        let total_before = world.entities().count();

        let id = world.spawn_entity(1, &mut rand::thread_rng()).unwrap();
        {
            let mob = world.entity_mut(id).unwrap();
            mob.char.room = 101;
            mob.char.skills.insert("blaster".into(), 99);
            mob.char.stats[0] = 1;
            mob.char.keywords.push("scavenger".into());
        }
        assert_eq!(world.entities_in_room(RoomKey::planet(101)).len(), roster_before.len() + 1);

        let removed = world.remove_entity(id).unwrap();
        assert_eq!(removed.id(), id);
        assert_eq!(world.mob_protos.get(&1), Some(&proto_before));
        assert_eq!(world.entities_in_room(RoomKey::planet(101)), roster_before);
        assert_eq!(world.entities().count(), total_before);
        assert!(world.entity(id).is_none());
    }

    #[test]
    fn test_area_snapshot_puts_rooms_back() {
        let world = test_world();
        let area = world.area_snapshot(0).unwrap();
        let ids: Vec<u64> = area.rooms.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![100, 101, 102]);
        assert_eq!(world.area_of(RoomKey::planet(101)), Some(0));
    }

    #[test]
    fn test_send_to_room_skips_excluded() {
        let mut world = test_world();
        let (a, mut rx_a) = add_player(&mut world, "Han", 100);
        let (_b, mut rx_b) = add_player(&mut world, "Leia", 100);
        world.send_to_room(RoomKey::planet(100), "hello", &[a]);
        assert_eq!(drain(&mut rx_a), "");
        assert_eq!(drain(&mut rx_b), "hello");
    }
}
