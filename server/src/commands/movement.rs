//! Walking, doors and posture.

use log::error;

use mud_shared::{expand_direction, EntityState};

use super::{info, send};
use crate::entities::EntityId;
use crate::hooks::{self, HookContext, HookEvent};
use crate::services::Services;
use crate::world::room::{clear_door_timer, schedule_auto_close, schedule_relock, DoorAction};
use crate::world::World;

/// Move an entity through an exit. Returns true if it moved.
///
/// Nothing is spent when the move fails. On success the old room sees the
/// departure, the new room the arrival, room scripts get their leave and
/// enter events, NPCs their move and greet events, and the mover looks
/// around.
pub fn move_entity(world: &mut World, services: &Services, id: EntityId, dir: &str) -> bool {
    let Some(e) = world.entity(id) else { return false };
    if let Err(msg) = e.can_move() {
        e.send(format!("\r\n{}\r\n", msg));
        return false;
    }
    let from = e.location();
    let name = e.name().to_string();

    let to = match world.exit_target(from, dir) {
        Ok(to) => to,
        Err(msg) => {
            send(world, id, &format!("\r\n{}\r\n", msg));
            return false;
        }
    };
    let blocked = world.get_room(from).map(|r| r.is_exit_blocked(dir)).unwrap_or(true);
    if blocked {
        send(world, id, "\r\nThe door is closed.\r\n");
        return false;
    }
    if !world.has_room(to) {
        error!("Exit {} of room {} leads to missing room {}", dir, from, to);
        send(world, id, "\r\nThat way leads nowhere.\r\n");
        return false;
    }

    let ctx = HookContext {
        actor: Some(name.clone()),
        ..Default::default()
    };
    world.send_to_room(from, &format!("\r\n{} leaves {}.\r\n", name, dir), &[id]);
    hooks::fire_npcs_in_room(world, services, from, id, HookEvent::Move, &ctx);

    if let Some(e) = world.entity_mut(id) {
        e.char.mv.lose(1);
        e.char.room = to.room;
        e.char.ship = to.ship;
    }
    world.send_to_room(to, &format!("\r\n{} has arrived.\r\n", name), &[id]);

    hooks::fire_room(world, services, from, HookEvent::Leave, &ctx);
    hooks::fire_room(world, services, to, HookEvent::Enter, &ctx);
    hooks::fire_npcs_in_room(world, services, to, id, HookEvent::Greet, &ctx);
    info::do_look(world, services, id, &[]);
    true
}

pub fn do_north(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "north");
}

pub fn do_east(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "east");
}

pub fn do_south(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "south");
}

pub fn do_west(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "west");
}

pub fn do_northeast(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "northeast");
}

pub fn do_northwest(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "northwest");
}

pub fn do_southeast(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "southeast");
}

pub fn do_southwest(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "southwest");
}

pub fn do_up(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "up");
}

pub fn do_down(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    move_entity(world, services, id, "down");
}

fn door_command(world: &mut World, services: &Services, id: EntityId, args: &[String], action: DoorAction) {
    let Some(dir) = args.first().and_then(|a| expand_direction(a)) else {
        send(world, id, &format!("\r\nSyntax: {} <direction>\r\n", action.verb()));
        return;
    };
    let Some(e) = world.entity(id) else { return };
    if e.is_unspeakable() || e.is_dead() {
        e.send("\r\nYou can't do that right now.\r\n");
        return;
    }
    let key = e.location();
    let name = e.name().to_string();

    if matches!(action, DoorAction::Lock | DoorAction::Unlock) {
        let needed = world.door_key(key, dir);
        if needed == 0 {
            send(world, id, "\r\nThere is no keyhole.\r\n");
            return;
        }
        if !world.entity(id).map(|e| e.has_key(needed)).unwrap_or(false) {
            send(world, id, "\r\nYou don't have the key.\r\n");
            return;
        }
    }

    if let Err(msg) = world.operate_door(key, dir, action) {
        send(world, id, &format!("\r\n{}\r\n", msg));
        return;
    }
    send(world, id, &format!("\r\nYou {} the door to the {}.\r\n", action.verb(), dir));
    world.send_to_room(key, &format!("\r\n{} {}s the door to the {}.\r\n", name, action.verb(), dir), &[id]);

    match action {
        DoorAction::Open => schedule_auto_close(world, services, key, dir),
        DoorAction::Close if world.door_key(key, dir) != 0 => schedule_relock(world, services, key, dir),
        _ => clear_door_timer(world, services, key, dir),
    }
}

pub fn do_open(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    door_command(world, services, id, args, DoorAction::Open);
}

pub fn do_close(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    door_command(world, services, id, args, DoorAction::Close);
}

pub fn do_lock(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    door_command(world, services, id, args, DoorAction::Lock);
}

pub fn do_unlock(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    door_command(world, services, id, args, DoorAction::Unlock);
}

pub fn do_sit(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity_mut(id) else { return };
    let msg = match e.state() {
        EntityState::Normal => {
            e.char.state = EntityState::Sitting;
            "You sit down."
        }
        EntityState::Sitting => "You are already sitting.",
        EntityState::Sleeping => "You are asleep.",
        EntityState::Fighting => "You can't sit down in the middle of a fight!",
        _ => "You can't do that right now.",
    };
    e.send(format!("\r\n{}\r\n", msg));
    if e.state() == EntityState::Sitting && msg == "You sit down." {
        let room = e.location();
        let notice = format!("\r\n{} sits down.\r\n", e.name());
        world.send_to_room(room, &notice, &[id]);
    }
}

pub fn do_stand(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity_mut(id) else { return };
    let msg = match e.state() {
        EntityState::Sitting | EntityState::Sleeping => {
            e.char.state = EntityState::Normal;
            "You stand up."
        }
        EntityState::Normal | EntityState::Fighting => "You are already standing.",
        EntityState::Dead => "You are dead.",
        EntityState::Unconscious => "You are unconscious.",
        _ => "You can't do that right now.",
    };
    e.send(format!("\r\n{}\r\n", msg));
    if msg == "You stand up." {
        let room = e.location();
        let notice = format!("\r\n{} stands up.\r\n", e.name());
        world.send_to_room(room, &notice, &[id]);
    }
}

pub fn do_sleep(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity_mut(id) else { return };
    let msg = match e.state() {
        EntityState::Normal | EntityState::Sitting => {
            e.char.state = EntityState::Sleeping;
            "You lie down and go to sleep."
        }
        EntityState::Sleeping => "You are already asleep.",
        EntityState::Fighting => "Not while you're fighting!",
        _ => "You can't do that right now.",
    };
    e.send(format!("\r\n{}\r\n", msg));
}
