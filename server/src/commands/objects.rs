//! Picking up, dropping, handing over and wearing items.
//!
//! Every move takes the item out of its source before putting it into the
//! destination. If the destination already holds that instance id the item
//! goes back where it came from.

use mud_shared::ItemData;

use super::send;
use crate::entities::{item, EntityId};
use crate::hooks::{self, HookContext, HookEvent};
use crate::services::Services;
use crate::world::World;

fn busy(world: &World, id: EntityId) -> bool {
    match world.entity(id) {
        Some(e) if e.is_unspeakable() => {
            e.send("\r\nYou are in no condition to do that.\r\n");
            true
        }
        Some(_) => false,
        None => true,
    }
}

fn room_item_to_entity(world: &mut World, id: EntityId, query: &str) -> Result<String, String> {
    let key = world.entity(id).map(|e| e.location()).ok_or_else(String::new)?;
    let room = world.get_room_mut(key).map_err(|e| e.to_string())?;
    let item = item::take_matching(&mut room.items, query).ok_or("You don't see that here.")?;
    let name = item.name.clone();
    let rejected = match world.entity_mut(id) {
        Some(e) => e.give_item(item).err(),
        None => Some(item),
    };
    if let Some(item) = rejected {
        if let Ok(room) = world.get_room_mut(key) {
            let _ = item::add_unique(&mut room.items, item);
        }
        return Err("You already have that.".into());
    }
    Ok(name)
}

fn container_item_to_entity(world: &mut World, id: EntityId, query: &str, container: &str) -> Result<(String, String), String> {
    let Some(e) = world.entity_mut(id) else { return Err(String::new()) };
    let key = e.location();
    let owned = item::find_matching(&e.char.inventory, container).is_some();

    let (found, bag_name) = if owned {
        let bag = e
            .char
            .inventory
            .iter_mut()
            .find(|i| i.matches(container))
            .ok_or("You don't have that.")?;
        if !bag.is_container() {
            return Err(format!("{} is not a container.", bag.name));
        }
        (item::take_matching(&mut bag.contents, query), bag.name.clone())
    } else {
        let room = world.get_room_mut(key).map_err(|e| e.to_string())?;
        let bag = room
            .items
            .iter_mut()
            .find(|i| i.matches(container))
            .ok_or("You don't see that here.")?;
        if !bag.is_container() {
            return Err(format!("{} is not a container.", bag.name));
        }
        (item::take_matching(&mut bag.contents, query), bag.name.clone())
    };
    let found = found.ok_or_else(|| format!("There is nothing like that in {}.", bag_name))?;
    let name = found.name.clone();

    let rejected = match world.entity_mut(id) {
        Some(e) => e.give_item(found).err(),
        None => Some(found),
    };
    if let Some(found) = rejected {
        put_back(world, id, owned, container, found);
        return Err("You already have that.".into());
    }
    Ok((name, bag_name))
}

fn put_back(world: &mut World, id: EntityId, owned: bool, container: &str, found: ItemData) {
    let bag = if owned {
        world
            .entity_mut(id)
            .and_then(|e| e.char.inventory.iter_mut().find(|i| i.matches(container)))
    } else {
        let key = world.entity(id).map(|e| e.location());
        match key {
            Some(key) => world
                .get_room_mut(key)
                .ok()
                .and_then(|r| r.items.iter_mut().find(|i| i.matches(container))),
            None => None,
        }
    };
    if let Some(bag) = bag {
        let _ = item::add_unique(&mut bag.contents, found);
    }
}

pub fn do_get(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if busy(world, id) {
        return;
    }
    let Some(query) = args.first() else {
        send(world, id, "\r\nGet what?\r\n");
        return;
    };
    let Some(e) = world.entity(id) else { return };
    let name = e.name().to_string();
    let room = e.location();

    let container = match args.get(1).map(String::as_str) {
        Some("from") => args.get(2),
        Some(_) => args.get(1),
        None => None,
    };
    match container {
        Some(container) => match container_item_to_entity(world, id, query, container) {
            Ok((item, bag)) => {
                send(world, id, &format!("\r\nYou get {} from {}.\r\n", item, bag));
                world.send_to_room(room, &format!("\r\n{} gets {} from {}.\r\n", name, item, bag), &[id]);
            }
            Err(msg) => send(world, id, &format!("\r\n{}\r\n", msg)),
        },
        None => match room_item_to_entity(world, id, query) {
            Ok(item) => {
                send(world, id, &format!("\r\nYou get {}.\r\n", item));
                world.send_to_room(room, &format!("\r\n{} gets {}.\r\n", name, item), &[id]);
            }
            Err(msg) => send(world, id, &format!("\r\n{}\r\n", msg)),
        },
    }
}

pub fn do_put(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if busy(world, id) {
        return;
    }
    let container = match args.get(1).map(String::as_str) {
        Some("in") | Some("into") => args.get(2),
        _ => args.get(1),
    };
    let (Some(query), Some(container)) = (args.first(), container) else {
        send(world, id, "\r\nPut what in what?\r\n");
        return;
    };
    let Some(e) = world.entity_mut(id) else { return };
    let Some(thing) = e.take_item(query) else {
        e.send("\r\nYou don't have that.\r\n");
        return;
    };
    let key = e.location();
    let name = e.name().to_string();
    let thing_name = thing.name.clone();

    // the bag may be carried or lying in the room
    let carried = e.char.inventory.iter().position(|i| i.matches(container));
    let bag = match carried {
        Some(idx) => world.entity_mut(id).map(|e| &mut e.char.inventory[idx]),
        None => world
            .get_room_mut(key)
            .ok()
            .and_then(|r| r.items.iter_mut().find(|i| i.matches(container))),
    };
    let outcome = match bag {
        None => Err((thing, "You don't see that here.".to_string())),
        Some(bag) if !bag.is_container() => {
            let msg = format!("{} is not a container.", bag.name);
            Err((thing, msg))
        }
        Some(bag) => {
            let bag_name = bag.name.clone();
            item::add_unique(&mut bag.contents, thing)
                .map(|_| bag_name)
                .map_err(|t| (t, "It is already in there.".to_string()))
        }
    };
    match outcome {
        Ok(bag_name) => {
            send(world, id, &format!("\r\nYou put {} in {}.\r\n", thing_name, bag_name));
            world.send_to_room(key, &format!("\r\n{} puts {} in {}.\r\n", name, thing_name, bag_name), &[id]);
        }
        Err((thing, msg)) => {
            if let Some(e) = world.entity_mut(id) {
                let _ = e.give_item(thing);
                e.send(format!("\r\n{}\r\n", msg));
            }
        }
    }
}

pub fn do_drop(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    if busy(world, id) {
        return;
    }
    let Some(query) = args.first() else {
        send(world, id, "\r\nDrop what?\r\n");
        return;
    };
    let Some(e) = world.entity_mut(id) else { return };
    let Some(thing) = e.take_item(query) else {
        e.send("\r\nYou don't have that.\r\n");
        return;
    };
    let key = e.location();
    let name = e.name().to_string();
    let thing_name = thing.name.clone();

    let rejected = match world.get_room_mut(key) {
        Ok(room) => item::add_unique(&mut room.items, thing).err(),
        Err(_) => Some(thing),
    };
    if let Some(thing) = rejected {
        if let Some(e) = world.entity_mut(id) {
            let _ = e.give_item(thing);
            e.send("\r\nYou can't drop that here.\r\n");
        }
        return;
    }
    send(world, id, &format!("\r\nYou drop {}.\r\n", thing_name));
    world.send_to_room(key, &format!("\r\n{} drops {}.\r\n", name, thing_name), &[id]);

    let ctx = HookContext {
        actor: Some(name),
        item: Some(thing_name),
        ..Default::default()
    };
    hooks::fire_room(world, services, key, HookEvent::Drop, &ctx);
    hooks::fire_npcs_in_room(world, services, key, id, HookEvent::Drop, &ctx);
}

pub fn do_give(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    if busy(world, id) {
        return;
    }
    let target = match args.get(1).map(String::as_str) {
        Some("to") => args.get(2),
        _ => args.get(1),
    };
    let (Some(query), Some(target)) = (args.first(), target) else {
        send(world, id, "\r\nGive what to whom?\r\n");
        return;
    };
    let Some(e) = world.entity(id) else { return };
    let key = e.location();
    let name = e.name().to_string();
    let Some(to) = world.find_in_room(key, target, id) else {
        send(world, id, "\r\nThey aren't here.\r\n");
        return;
    };
    let Some(thing) = world.entity_mut(id).and_then(|e| e.take_item(query)) else {
        send(world, id, "\r\nYou don't have that.\r\n");
        return;
    };
    let thing_name = thing.name.clone();

    let rejected = match world.entity_mut(to) {
        Some(receiver) => receiver.give_item(thing).err(),
        None => Some(thing),
    };
    if let Some(thing) = rejected {
        if let Some(e) = world.entity_mut(id) {
            let _ = e.give_item(thing);
            e.send("\r\nThey already have that.\r\n");
        }
        return;
    }
    let to_name = world.entity(to).map(|e| e.name().to_string()).unwrap_or_default();
    send(world, id, &format!("\r\nYou give {} to {}.\r\n", thing_name, to_name));
    send(world, to, &format!("\r\n{} gives you {}.\r\n", name, thing_name));
    world.send_to_room(key, &format!("\r\n{} gives {} to {}.\r\n", name, thing_name, to_name), &[id, to]);

    let ctx = HookContext {
        actor: Some(name),
        item: Some(thing_name),
        ..Default::default()
    };
    hooks::fire_entity(world, services, to, HookEvent::Give, &ctx);
}

/// Slot an item goes to. Weapons without an explicit slot go in the hand.
fn wear_slot(thing: &ItemData) -> Option<String> {
    match (&thing.wear_loc, thing.is_weapon()) {
        (Some(slot), _) => Some(slot.clone()),
        (None, true) => Some("weapon".into()),
        (None, false) => None,
    }
}

pub fn do_wear(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if busy(world, id) {
        return;
    }
    let Some(query) = args.first() else {
        send(world, id, "\r\nWear what?\r\n");
        return;
    };
    let Some(e) = world.entity_mut(id) else { return };
    let Some(idx) = item::find_matching(&e.char.inventory, query) else {
        e.send("\r\nYou don't have that.\r\n");
        return;
    };
    let Some(slot) = wear_slot(&e.char.inventory[idx]) else {
        e.send("\r\nYou can't wear that.\r\n");
        return;
    };
    if let Some(current) = e.char.equipment.get(&slot) {
        e.send(format!("\r\nYou are already using {} there.\r\n", current.name));
        return;
    }
    let thing = e.char.inventory.remove(idx);
    let thing_name = thing.name.clone();
    let key = e.location();
    let name = e.name().to_string();
    e.char.equipment.insert(slot, thing);
    e.send(format!("\r\nYou start using {}.\r\n", thing_name));
    world.send_to_room(key, &format!("\r\n{} starts using {}.\r\n", name, thing_name), &[id]);
}

pub fn do_remove(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if busy(world, id) {
        return;
    }
    let Some(query) = args.first() else {
        send(world, id, "\r\nRemove what?\r\n");
        return;
    };
    let Some(e) = world.entity_mut(id) else { return };
    let Some(slot) = e
        .char
        .equipment
        .iter()
        .find(|(slot, i)| i.matches(query) || slot.as_str() == query.as_str())
        .map(|(slot, _)| slot.clone())
    else {
        e.send("\r\nYou aren't using that.\r\n");
        return;
    };
    let Some(thing) = e.char.equipment.remove(&slot) else { return };
    let thing_name = thing.name.clone();
    if let Err(thing) = e.give_item(thing) {
        e.char.equipment.insert(slot, thing);
        e.send("\r\nYou can't remove that.\r\n");
        return;
    }
    let key = e.location();
    let name = e.name().to_string();
    e.send(format!("\r\nYou stop using {}.\r\n", thing_name));
    world.send_to_room(key, &format!("\r\n{} stops using {}.\r\n", name, thing_name), &[id]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{add_npc, add_player, drain, test_world};
    use crate::world::RoomKey;
    use mud_shared::ItemType;

    fn rod(id: u64) -> ItemData {
        ItemData { id, name: "a glow rod".into(), keywords: vec!["rod".into()], ..Default::default() }
    }

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_get_and_drop_move_the_item() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        world.get_room_mut(RoomKey::planet(100)).unwrap().items.push(rod(7));

        do_get(&mut world, &services, han, &args(&["rod"]));
        assert!(drain(&mut rx).contains("You get a glow rod."));
        assert!(world.get_room(RoomKey::planet(100)).unwrap().items.is_empty());
        assert_eq!(world.entity(han).unwrap().char.inventory.len(), 1);

        do_drop(&mut world, &services, han, &args(&["rod"]));
        assert!(world.entity(han).unwrap().char.inventory.is_empty());
        assert_eq!(world.get_room(RoomKey::planet(100)).unwrap().items[0].id, 7);
    }

    #[test]
    fn test_get_duplicate_id_stays_in_room() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        world.entity_mut(han).unwrap().char.inventory.push(rod(7));
        world.get_room_mut(RoomKey::planet(100)).unwrap().items.push(rod(7));

        do_get(&mut world, &services, han, &args(&["rod"]));
        assert!(drain(&mut rx).contains("You already have that."));
        assert_eq!(world.entity(han).unwrap().char.inventory.len(), 1);
        assert_eq!(world.get_room(RoomKey::planet(100)).unwrap().items.len(), 1);
    }

    #[test]
    fn test_put_and_get_from_container() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let bag = ItemData { id: 1, name: "a satchel".into(), item_type: ItemType::Container, ..Default::default() };
        world.entity_mut(han).unwrap().char.inventory.extend([bag, rod(7)]);

        do_put(&mut world, &services, han, &args(&["rod", "in", "satchel"]));
        let inv = &world.entity(han).unwrap().char.inventory;
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].contents[0].id, 7);

        do_get(&mut world, &services, han, &args(&["rod", "from", "satchel"]));
        let inv = &world.entity(han).unwrap().char.inventory;
        assert_eq!(inv.len(), 2);
        assert!(inv[0].contents.is_empty());
    }

    #[test]
    fn test_put_into_non_container_is_refused() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        let mut other = rod(8);
        other.name = "a hydrospanner".into();
        other.keywords = vec!["spanner".into()];
        world.entity_mut(han).unwrap().char.inventory.extend([other, rod(7)]);

        do_put(&mut world, &services, han, &args(&["rod", "spanner"]));
        assert!(drain(&mut rx).contains("is not a container"));
        assert_eq!(world.entity(han).unwrap().char.inventory.len(), 2);
    }

    #[test]
    fn test_give_fires_hook() {
        let mut world = test_world();
        let (services, mut queue) = Services::detached(World::default());
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let jawa = add_npc(&mut world, "a jawa", 100);
        world.entity_mut(jawa).unwrap().char.keywords = vec!["jawa".into()];
        world.entity_mut(jawa).unwrap().char.progs.insert("give".into(), "say Utinni, $i!".into());
        world.entity_mut(han).unwrap().char.inventory.push(rod(7));

        do_give(&mut world, &services, han, &args(&["rod", "jawa"]));
        assert_eq!(world.entity(jawa).unwrap().char.inventory[0].id, 7);
        assert!(queue.try_recv().is_ok());
    }

    #[test]
    fn test_wear_rejects_occupied_slot() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        let helmet = |id| ItemData {
            id,
            name: "a helmet".into(),
            item_type: ItemType::Armor,
            wear_loc: Some("head".into()),
            ..Default::default()
        };
        world.entity_mut(han).unwrap().char.inventory.extend([helmet(1), helmet(2)]);

        do_wear(&mut world, &services, han, &args(&["helmet"]));
        do_wear(&mut world, &services, han, &args(&["helmet"]));
        assert!(drain(&mut rx).contains("already using a helmet"));
        let e = world.entity(han).unwrap();
        assert_eq!(e.char.equipment.len(), 1);
        assert_eq!(e.char.inventory.len(), 1);

        do_remove(&mut world, &services, han, &args(&["head"]));
        let e = world.entity(han).unwrap();
        assert!(e.char.equipment.is_empty());
        assert_eq!(e.char.inventory.len(), 2);
    }
}
