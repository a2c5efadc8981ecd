//! Ships: boarding, leaving, charts and hyperspace.

use super::{info, rest, send};
use crate::entities::EntityId;
use crate::services::Services;
use crate::world::World;

pub fn do_board(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    if args.is_empty() {
        send(world, id, "\r\nBoard which ship?\r\n");
        return;
    }
    match world.board_ship(id, &rest(args)) {
        Ok(_) => info::do_look(world, services, id, &[]),
        Err(msg) => send(world, id, &format!("\r\n{}\r\n", msg)),
    }
}

pub fn do_leave(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    match world.leave_ship(id) {
        Ok(_) => info::do_look(world, services, id, &[]),
        Err(msg) => send(world, id, &format!("\r\n{}\r\n", msg)),
    }
}

pub fn do_starsystems(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let chart = world.describe_starsystems();
    send(world, id, &chart);
}

pub fn do_hyperspace(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    let Some(here) = world.entity(id).map(|e| e.location()) else { return };
    let in_cockpit = world
        .ship(here.ship)
        .map(|s| s.cockpit == here.room)
        .unwrap_or(false);
    if !in_cockpit {
        send(world, id, "\r\nYou must be in the cockpit of a ship to do that.\r\n");
        return;
    }
    if args.is_empty() {
        send(world, id, "\r\nJump to which system?\r\n");
        return;
    }
    match world.jump_hyperspace(here.ship, &rest(args), &mut rand::thread_rng()) {
        Ok(seconds) => {
            let msg = format!(
                "\r\n&YThe stars stretch into lines as the ship jumps to lightspeed. Arrival in {} seconds.&d\r\n",
                seconds
            );
            for e in world.entities().filter(|e| e.char.ship == here.ship) {
                e.send(msg.as_str());
            }
        }
        Err(msg) => send(world, id, &format!("\r\n{}\r\n", msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::space::tests::with_ship;
    use crate::world::tests::{add_player, drain};
    use crate::world::RoomKey;

    const FALCON: u64 = 300_000_001;

    #[test]
    fn test_board_looks_inside() {
        let mut world = with_ship();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        do_board(&mut world, &services, han, &["falcon".to_string()]);
        assert!(drain(&mut rx).contains("There is no ship called 'falcon' here."));
        do_board(&mut world, &services, han, &["millennium".to_string()]);
        assert!(drain(&mut rx).contains("Boarding Ramp"));
        do_leave(&mut world, &services, han, &[]);
        assert_eq!(world.entity(han).unwrap().location(), RoomKey::planet(100));
    }

    #[test]
    fn test_hyperspace_needs_cockpit() {
        let mut world = with_ship();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        do_board(&mut world, &services, han, &["mill".to_string()]);
        drain(&mut rx);

        do_hyperspace(&mut world, &services, han, &["corellia".to_string()]);
        assert!(drain(&mut rx).contains("cockpit"));
        assert!(!world.ship(FALCON).unwrap().in_hyper);

        world.entity_mut(han).unwrap().char.room = 2;
        do_hyperspace(&mut world, &services, han, &["corellia".to_string()]);
        assert!(drain(&mut rx).contains("Arrival in 5 seconds."));
        assert!(world.ship(FALCON).unwrap().in_hyper);
    }
}
