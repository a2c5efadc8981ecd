//! Starting and running away from fights.

use rand::seq::SliceRandom;

use mud_shared::{EntityState, DIRECTIONS};

use super::movement::move_entity;
use super::send;
use crate::entities::EntityId;
use crate::services::Services;
use crate::world::combat::fight_round;
use crate::world::World;

fn refuse_fight(state: EntityState) -> Option<&'static str> {
    match state {
        EntityState::Fighting => Some("&RYou are already fighting!&d"),
        EntityState::Crafting => Some("&RYou can't fight while working!&d"),
        EntityState::Dead => Some("&RYou are dead!&d"),
        EntityState::Gunning => Some("&RYou can't gun and fight at the same time!&d"),
        EntityState::Piloting => Some("&RYou can't fly and fight at the same time!&d"),
        EntityState::Sedated => Some("You feel too relaxed!"),
        EntityState::Sleeping => Some("You are asleep!"),
        EntityState::Unconscious => Some("&RYou are unconscious!&d"),
        EntityState::Editing => Some("You are busy."),
        _ => None,
    }
}

pub fn do_kill(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    let Some(query) = args.first() else {
        send(world, id, "\r\n&RFight who?&d\r\n");
        return;
    };
    let Some(e) = world.entity(id) else { return };
    if let Some(msg) = refuse_fight(e.state()) {
        e.send(format!("\r\n{}\r\n", msg));
        return;
    }
    let Some(target) = world.find_in_room(e.location(), query, id) else {
        e.send("\r\nThey aren't here.\r\n");
        return;
    };
    let Some(victim) = world.entity_mut(target) else { return };
    if victim.is_dead() {
        send(world, id, "\r\nThey are already dead.\r\n");
        return;
    }
    if !victim.is_unspeakable() && victim.attacker.is_none() {
        victim.begin_fighting(id);
    }
    let victim_name = victim.name().to_string();
    if let Some(e) = world.entity_mut(id) {
        e.begin_fighting(target);
        e.send(format!("\r\n&RYou begin fighting &W{}&R!!&d\r\n", victim_name));
    }
    fight_round(world, services, id, target);
}

pub fn do_flee(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity(id) else { return };
    if !e.is_fighting() {
        e.send("\r\nYou aren't fighting anyone.\r\n");
        return;
    }
    if e.char.mv.current == 0 {
        e.send("\r\n&RYou are too exhausted to flee!&d\r\n");
        return;
    }
    let key = e.location();
    let name = e.name().to_string();
    let foe = e.attacker;

    let open: Vec<&str> = match world.get_room(key) {
        Ok(room) => DIRECTIONS
            .iter()
            .copied()
            .filter(|d| room.exits.contains_key(*d) && !room.is_exit_blocked(d))
            .filter(|d| world.exit_target(key, d).map(|t| world.has_room(t)).unwrap_or(false))
            .collect(),
        Err(_) => Vec::new(),
    };
    let Some(dir) = open.choose(&mut rand::thread_rng()).copied() else {
        send(world, id, "\r\n&RThere is nowhere to run!&d\r\n");
        return;
    };

    if let Some(e) = world.entity_mut(id) {
        e.stop_fighting();
    }
    if let Some(foe) = foe.and_then(|f| world.entity_mut(f)) {
        if foe.attacker == Some(id) {
            foe.stop_fighting();
        }
    }
    world.send_to_room(key, &format!("\r\n&Y{} panics and flees {}!&d\r\n", name, dir), &[id]);
    send(world, id, "\r\n&YYou flee head over heels!&d\r\n");
    move_entity(world, services, id, dir);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{add_npc, add_player, drain, test_world};
    use crate::world::RoomKey;

    #[test]
    fn test_kill_sets_both_attackers() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        let greedo = add_npc(&mut world, "Greedo", 100);
        world.entity_mut(greedo).unwrap().char.hp.max = 200;
        world.entity_mut(greedo).unwrap().char.hp.current = 200;

        do_kill(&mut world, &services, han, &["greedo".to_string()]);
        assert!(drain(&mut rx).contains("You begin fighting Greedo!!"));
        assert_eq!(world.entity(han).unwrap().attacker, Some(greedo));
        assert_eq!(world.entity(greedo).unwrap().attacker, Some(han));
        assert!(world.entity(greedo).unwrap().is_fighting());
    }

    #[test]
    fn test_kill_missing_target() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        do_kill(&mut world, &services, han, &["vader".to_string()]);
        assert!(drain(&mut rx).contains("They aren't here."));
        assert!(!world.entity(han).unwrap().is_fighting());
    }

    #[test]
    fn test_flee_leaves_room_and_ends_fight() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let greedo = add_npc(&mut world, "Greedo", 100);
        world.entity_mut(han).unwrap().begin_fighting(greedo);
        world.entity_mut(greedo).unwrap().begin_fighting(han);

        do_flee(&mut world, &services, han, &[]);
        let e = world.entity(han).unwrap();
        assert_eq!(e.location(), RoomKey::planet(101));
        assert!(!e.is_fighting());
        assert!(!world.entity(greedo).unwrap().is_fighting());
    }
}
