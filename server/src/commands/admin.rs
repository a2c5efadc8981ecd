//! Immortal commands: advancing, moving people around, resets, global
//! echo and light room editing.

use log::info;

use super::{info as look, open_editor, rest, send};
use crate::entities::{xp_for_level, EntityId};
use crate::network::EditTarget;
use crate::services::Services;
use crate::world::area::reset_and_announce;
use crate::world::{RoomKey, World};

/// Highest level `advance` will set
pub const MAX_LEVEL: u32 = 100;

pub fn do_advance(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    let (Some(who), Some(level)) = (args.first(), args.get(1)) else {
        send(world, id, "\r\nSyntax: advance <player> <level>\r\n");
        return;
    };
    let Some(level) = level.parse::<u32>().ok().filter(|l| (1..=MAX_LEVEL).contains(l)) else {
        send(world, id, &format!("\r\nLevel must be between 1 and {}.\r\n", MAX_LEVEL));
        return;
    };
    let Some(target) = world.find_player(who) else {
        send(world, id, "\r\nThey aren't playing.\r\n");
        return;
    };
    let Some(e) = world.entity_mut(target) else { return };
    let from = e.char.level;
    if level >= from {
        while e.char.level < level {
            e.advance_level();
        }
    } else {
        let ch = &mut e.char;
        let dropped = (from - level) as u16;
        ch.level = level;
        ch.hp.max = ch.hp.max.saturating_sub(dropped.saturating_mul(10)).max(10);
        ch.mp.max = ch.mp.max.saturating_sub(dropped.saturating_mul(5)).max(10);
        ch.mv.max = ch.mv.max.saturating_sub(dropped.saturating_mul(5)).max(10);
        ch.hp.current = ch.hp.current.min(ch.hp.max);
        ch.mp.current = ch.mp.current.min(ch.mp.max);
        ch.mv.current = ch.mv.current.min(ch.mv.max);
    }
    e.char.xp = xp_for_level(level - 1);
    e.send(format!("\r\n&YYou are now level &W{}&Y.&d\r\n", level));
    let name = e.name().to_string();
    info!("{} set to level {} (was {})", name, level, from);
    send(world, id, &format!("\r\n&YOk. {} is now level {}.&d\r\n", name, level));
}

/// Move an entity to another room, telling both rooms.
fn relocate(world: &mut World, services: &Services, target: EntityId, to: RoomKey, leave: &str, arrive: &str) {
    let Some(e) = world.entity(target) else { return };
    let from = e.location();
    let name = e.name().to_string();
    world.send_to_room(from, &format!("\r\n&C{}&d {}\r\n", name, leave), &[target]);
    if let Some(e) = world.entity_mut(target) {
        e.stop_fighting();
        e.char.room = to.room;
        e.char.ship = to.ship;
    }
    world.send_to_room(to, &format!("\r\n&C{}&d {}\r\n", name, arrive), &[target]);
    look::do_look(world, services, target, &[]);
}

pub fn do_transfer(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    let (Some(who), Some(room)) = (args.first(), args.get(1)) else {
        send(world, id, "\r\n&RTransfer who, where?&d\r\nSyntax: transfer <name> <room id>\r\n");
        return;
    };
    let Some(target) = world.find_entity(who) else {
        send(world, id, "\r\n&RCouldn't find anyone by that name.&d\r\n");
        return;
    };
    let Ok(room) = room.parse::<u64>() else {
        send(world, id, "\r\n&RThat is not a room id.&d\r\n");
        return;
    };
    let to = RoomKey::planet(room);
    if !world.has_room(to) {
        send(world, id, "\r\n&RNo such room.&d\r\n");
        return;
    }
    relocate(world, services, target, to, "has left.", "has appeared.");
    send(world, id, "\r\n&YOk.&d\r\n");
}

pub fn do_goto(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    let Some(dest) = args.first() else {
        send(world, id, "\r\nGoto where?\r\n");
        return;
    };
    let to = match dest.parse::<u64>() {
        Ok(room) => RoomKey::planet(room),
        Err(_) => match world.find_entity(dest).and_then(|t| world.entity(t)) {
            Some(t) => t.location(),
            None => {
                send(world, id, "\r\nNo such location.\r\n");
                return;
            }
        },
    };
    if !world.has_room(to) {
        send(world, id, "\r\nNo such room.\r\n");
        return;
    }
    relocate(world, services, id, to, "disappears in a puff of smoke.", "appears in a puff of smoke.");
}

pub fn do_areset(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    let index = if args.is_empty() {
        world.entity(id).and_then(|e| world.area_of(e.location()))
    } else {
        world.area_index(&rest(args))
    };
    let Some(index) = index else {
        send(world, id, "\r\nNo such area.\r\n");
        return;
    };
    match reset_and_announce(world, services, index) {
        Ok(spawned) => send(world, id, &format!("\r\n&YArea reset, {} spawned.&d\r\n", spawned)),
        Err(e) => send(world, id, &format!("\r\n&RReset failed: {}&d\r\n", e)),
    }
}

pub fn do_echo(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if args.is_empty() {
        send(world, id, "\r\nEcho what?\r\n");
        return;
    }
    world.broadcast(&format!("\r\n&W{}&d\r\n", rest(args)));
}

pub fn do_redit(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    let Some(key) = world.entity(id).map(|e| e.location()) else { return };
    if !world.has_room(key) {
        send(world, id, "\r\nThis room doesn't exist.\r\n");
        return;
    }
    let Ok(room) = world.get_room_mut(key) else { return };
    match args.first().map(String::as_str) {
        Some("name") if args.len() > 1 => {
            room.name = rest(&args[1..]);
            send(world, id, "\r\n&YRoom name set.&d\r\n");
        }
        Some("desc") => {
            let initial = room.desc.clone();
            open_editor(world, id, EditTarget::RoomDesc(key), initial);
        }
        _ => send(world, id, "\r\nSyntax: redit name <text>\r\n        redit desc\r\n"),
    }
}

/// Store an edited room description.
pub fn apply_room_desc(world: &mut World, _services: &Services, id: EntityId, key: RoomKey, text: String) {
    match world.get_room_mut(key) {
        Ok(room) => {
            room.desc = text;
            info!("Room {} description edited", key);
            send(world, id, "\r\n&YRoom description set.&d\r\n");
        }
        Err(e) => send(world, id, &format!("\r\n&R{}&d\r\n", e)),
    }
}

pub fn do_asave(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    let index = if args.is_empty() {
        world.entity(id).and_then(|e| world.area_of(e.location()))
    } else {
        world.area_index(&rest(args))
    };
    let Some(area) = index.and_then(|i| world.area_snapshot(i)) else {
        send(world, id, "\r\nNo such area.\r\n");
        return;
    };
    let name = area.name.clone();
    let saved = services.persistence.as_ref().map(|p| p.save_area(area)).unwrap_or(false);
    if saved {
        send(world, id, &format!("\r\n&YArea '{}' queued for saving.&d\r\n", name));
    } else {
        send(world, id, "\r\n&RSaving is not available.&d\r\n");
    }
}
