//! Area resets.
//!
//! A reset walks an area's spawn tables and tops up whatever is missing:
//! a mob spawn is skipped while a live instance of that prototype is still
//! in its room, an item spawn while an instance of that item still lies
//! there. Corpses are swept away and trash bins emptied. Running a reset
//! twice in a row changes nothing the second time.

use std::collections::HashMap;

use log::{error, info};
use rand::Rng;

use mud_shared::ItemType;

use super::{lock_world, RoomKey, World};
use crate::entities::EntityId;
use crate::error::{MudError, MudResult};
use crate::hooks::{self, HookContext, HookEvent};
use crate::services::Services;

impl World {
    /// Reset one area. Returns the ids of newly spawned mobs so the caller
    /// can fire their spawn hooks.
    pub fn reset_area<R: Rng>(&mut self, index: usize, rng: &mut R) -> MudResult<Vec<EntityId>> {
        let area = self
            .areas
            .get(index)
            .cloned()
            .ok_or_else(|| MudError::not_found("area", index))?;

        let room_ids: Vec<u64> = self
            .room_area
            .iter()
            .filter(|(_, i)| **i == index)
            .map(|(id, _)| *id)
            .collect();

        for id in &room_ids {
            if let Ok(room) = self.get_room_mut(RoomKey::planet(*id)) {
                room.items.retain(|i| i.item_type != ItemType::Corpse);
                for bin in room.items.iter_mut().filter(|i| i.item_type == ItemType::Bin) {
                    bin.contents.clear();
                }
            }
        }

        let mut spawned = Vec::new();

        let mut wanted: HashMap<(u64, u64), usize> = HashMap::new();
        for spawn in &area.mobs {
            *wanted.entry((spawn.mob, spawn.room)).or_default() += 1;
        }
        for ((mob, room), count) in wanted {
            let key = RoomKey::planet(room);
            if !self.has_room(key) {
                error!("Area '{}' spawns mob {} into missing room {}", area.name, mob, room);
                continue;
            }
            let present = self
                .entities()
                .filter(|e| e.location() == key && e.prototype() == Some(mob) && !e.is_dead())
                .count();
            for _ in present..count {
                match self.spawn_entity(mob, rng) {
                    Ok(id) => {
                        if let Some(e) = self.entity_mut(id) {
                            e.char.room = room;
                            e.char.ship = 0;
                        }
                        spawned.push(id);
                    }
                    Err(e) => error!("Area '{}' reset: {}", area.name, e),
                }
            }
        }

        let mut wanted: HashMap<(u64, u64), usize> = HashMap::new();
        for spawn in &area.items {
            *wanted.entry((spawn.item, spawn.room)).or_default() += 1;
        }
        for ((item, room), count) in wanted {
            let key = RoomKey::planet(room);
            let present = match self.get_room(key) {
                Ok(r) => r.items.iter().filter(|i| i.oid == item).count(),
                Err(e) => {
                    error!("Area '{}' spawns item {}: {}", area.name, item, e);
                    continue;
                }
            };
            for _ in present..count {
                match self.clone_item(item, rng) {
                    Ok(instance) => {
                        if let Ok(r) = self.get_room_mut(key) {
                            r.items.push(instance);
                        }
                    }
                    Err(e) => error!("Area '{}' reset: {}", area.name, e),
                }
            }
        }

        if !area.reset_msg.is_empty() {
            let msg = format!("\r\n&c{}&d\r\n", area.reset_msg);
            for e in self.entities().filter(|e| e.is_player() && e.char.ship == 0) {
                if room_ids.contains(&e.char.room) {
                    e.send(msg.as_str());
                }
            }
        }

        info!("Area '{}' reset, {} mobs spawned", area.name, spawned.len());
        Ok(spawned)
    }
}

/// Reset an area and fire spawn hooks for whatever appeared.
pub fn reset_and_announce(world: &mut World, services: &Services, index: usize) -> MudResult<usize> {
    let spawned = world.reset_area(index, &mut rand::thread_rng())?;
    for id in &spawned {
        hooks::fire_entity(world, services, *id, HookEvent::Spawn, &HookContext::default());
    }
    Ok(spawned.len())
}

/// Register the periodic reset of every area with a reset interval.
pub fn schedule_resets(services: &Services) {
    let world = lock_world(&services.world);
    for (index, area) in world.areas.iter().enumerate() {
        if area.reset == 0 {
            continue;
        }
        let svc = services.clone();
        let seconds = area.reset.min(u32::MAX as u64) as u32;
        services.scheduler.every(seconds, move || {
            let mut world = lock_world(&svc.world);
            if let Err(e) = reset_and_announce(&mut world, &svc, index) {
                error!("Scheduled area reset failed: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{add_player, drain, test_world};
    use mud_shared::{ItemData, ItemSpawn};

    fn live_spawns(world: &World) -> (Vec<(u64, u64)>, Vec<(u64, u64)>) {
        let mut mobs: Vec<(u64, u64)> = world
            .entities()
            .filter_map(|e| e.prototype().map(|p| (p, e.char.room)))
            .collect();
        mobs.sort();
        let mut items = Vec::new();
        for id in [100, 101, 102] {
            for i in &world.get_room(RoomKey::planet(id)).unwrap().items {
                items.push((i.oid, id));
            }
        }
        items.sort();
        (mobs, items)
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut world = test_world();
        world.areas[0].items.push(ItemSpawn { item: 10, room: 100 });
        let mut rng = rand::thread_rng();
        let first = world.reset_area(0, &mut rng).unwrap();
        assert_eq!(first.len(), 1);
        let after_first = live_spawns(&world);
        let second = world.reset_area(0, &mut rng).unwrap();
        assert!(second.is_empty());
        assert_eq!(live_spawns(&world), after_first);
        assert_eq!(after_first.0, vec![(1, 101)]);
        assert_eq!(after_first.1, vec![(10, 100)]);
    }

    #[test]
    fn test_reset_replaces_killed_mob() {
        let mut world = test_world();
        let mut rng = rand::thread_rng();
        let first = world.reset_area(0, &mut rng).unwrap();
        world.remove_entity(first[0]);
        let second = world.reset_area(0, &mut rng).unwrap();
        assert_eq!(second.len(), 1);
        assert_ne!(second[0], first[0]);
    }

    #[test]
    fn test_reset_sweeps_corpses_and_bins() {
        let mut world = test_world();
        let room = world.get_room_mut(RoomKey::planet(100)).unwrap();
        room.items.push(ItemData { id: 1, name: "a corpse".into(), item_type: ItemType::Corpse, ..Default::default() });
        room.items.push(ItemData {
            id: 2,
            name: "a trash bin".into(),
            item_type: ItemType::Bin,
            contents: vec![ItemData { id: 3, name: "rubbish".into(), ..Default::default() }],
            ..Default::default()
        });
        world.reset_area(0, &mut rand::thread_rng()).unwrap();
        let room = world.get_room(RoomKey::planet(100)).unwrap();
        assert_eq!(room.items.len(), 1);
        assert!(room.items[0].contents.is_empty());
    }

    #[test]
    fn test_reset_message_reaches_players_in_area() {
        let mut world = test_world();
        let (_id, mut rx) = add_player(&mut world, "Han", 102);
        world.reset_area(0, &mut rand::thread_rng()).unwrap();
        assert!(drain(&mut rx).contains("Sand blows in from the desert."));
    }
}
