//! The world pump: once a second, in this order, age idle connections,
//! resolve combat, regenerate, then run the background simulations.
//!
//! Each pass takes the world lock for its own duration. A panic while
//! handling one entity is logged and the pass moves on to the next.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::Rng;

use crate::config::Config;
use crate::entities::EntityId;
use crate::network::Outbound;
use crate::persistence;
use crate::services::Services;
use crate::world::combat::fight_round;
use crate::world::{lock_world, ClientId, World};

/// Count one idle second on every client in the game. Warns at each
/// configured mark and closes a client the moment it reaches the ceiling.
/// Returns the ids that were closed. Connections still logging in run on
/// their own timeout.
pub fn idle_sweep(world: &mut World, config: &Config) -> Vec<ClientId> {
    let marks = config.idle_warning_marks();
    let ceiling = config.idle_timeout_secs;
    let mut closed = Vec::new();
    for client in world.clients_mut().filter(|c| c.entity.is_some()) {
        client.idle = client.idle.saturating_add(1);
        if client.idle == ceiling {
            client.send(Outbound::Text("\r\n&RIdle timeout. Goodbye.&d\r\n".into()));
            client.send(Outbound::Close);
            closed.push(client.id);
        } else if marks.contains(&client.idle) {
            client.send(Outbound::Text(format!(
                "\r\n&RYou have been idle too long. You will be disconnected in {} seconds.&d\r\n",
                ceiling - client.idle
            )));
        }
    }
    for id in &closed {
        info!("Client {} timed out", id);
    }
    closed
}

/// Who `id` should swing at this round, if anyone. Drops fights whose
/// target has gone or wandered off.
fn combat_target(world: &mut World, id: EntityId) -> Option<EntityId> {
    let e = world.entity(id)?;
    if !e.is_fighting() {
        return None;
    }
    let here = e.location();
    let target = e.attacker?;
    let valid = world
        .entity(target)
        .map(|t| !t.is_dead() && t.location() == here)
        .unwrap_or(false);
    if !valid {
        if let Some(e) = world.entity_mut(id) {
            e.stop_fighting();
        }
        return None;
    }
    Some(target)
}

/// One combat round for every fighting entity, in roster order.
pub fn combat_pass(world: &mut World, services: &Services) -> usize {
    let mut rounds = 0;
    for id in world.entity_ids() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let target = combat_target(world, id)?;
            fight_round(world, services, id, target)
        }));
        match result {
            Ok(Some(_)) => rounds += 1,
            Ok(None) => {}
            Err(_) => error!("Combat round for entity {} panicked", id),
        }
    }
    rounds
}

/// One regeneration step for every live entity.
pub fn regen_pass<R: Rng>(world: &mut World, rng: &mut R) {
    for e in world.entities_mut() {
        let id = e.id();
        if catch_unwind(AssertUnwindSafe(|| e.regen_tick(rng))).is_err() {
            error!("Regeneration for entity {} panicked", id);
        }
    }
}

/// Lottery draw and hyperspace travel.
pub fn background_pass<R: Rng>(world: &mut World, services: &Services, rng: &mut R) {
    for winner in world.run_lottery(rng) {
        if let Some(e) = world.entity(winner) {
            if !persistence::save_entity(services, e) {
                warn!("Could not save lottery winner {}", e.name());
            }
        }
    }
    let arrived = world.tick_hyperspace();
    if !arrived.is_empty() {
        debug!("{} ships left hyperspace", arrived.len());
    }
}

/// Run every pass once.
pub fn tick(services: &Services) {
    let mut rng = rand::thread_rng();
    {
        let mut world = lock_world(&services.world);
        idle_sweep(&mut world, &services.config);
    }
    {
        let mut world = lock_world(&services.world);
        combat_pass(&mut world, services);
    }
    {
        let mut world = lock_world(&services.world);
        regen_pass(&mut world, &mut rng);
    }
    let mut world = lock_world(&services.world);
    background_pass(&mut world, services, &mut rng);
}

/// Tick once a second until the process ends.
pub async fn run(services: Services) {
    info!("World pump started");
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        tick(&services);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{add_npc, add_player, drain, test_world};
    use mud_shared::EntityState;

    #[test]
    fn test_idle_warns_then_closes() {
        let mut world = test_world();
        let (_han, mut rx) = add_player(&mut world, "Han", 100);
        let config = Config { idle_timeout_secs: 4, idle_warnings: vec![2], ..Config::default() };

        assert!(idle_sweep(&mut world, &config).is_empty());
        assert!(idle_sweep(&mut world, &config).is_empty());
        assert!(drain(&mut rx).contains("disconnected in 2 seconds"));
        assert!(idle_sweep(&mut world, &config).is_empty());
        let closed = idle_sweep(&mut world, &config);
        assert_eq!(closed.len(), 1);

        let mut got_close = false;
        while let Ok(msg) = rx.try_recv() {
            got_close |= msg == Outbound::Close;
        }
        assert!(got_close);
        // already closing, not closed twice
        assert!(idle_sweep(&mut world, &config).is_empty());
    }

    #[test]
    fn test_logging_in_client_is_not_aged() {
        let mut world = test_world();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        world.add_client(crate::world::ClientRecord::new(77, None, tx));
        let config = Config { idle_timeout_secs: 3, idle_warnings: vec![1], ..Config::default() };
        for _ in 0..5 {
            assert!(idle_sweep(&mut world, &config).is_empty());
        }
        assert_eq!(world.client(77).unwrap().idle, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_touch_resets_idle() {
        let mut world = test_world();
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let config = Config { idle_timeout_secs: 2, ..Config::default() };
        idle_sweep(&mut world, &config);
        world.touch_client(han);
        assert!(idle_sweep(&mut world, &config).is_empty());
    }

    #[test]
    fn test_combat_pass_tells_both_sides() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        let greedo = add_npc(&mut world, "Greedo", 100);
        world.entity_mut(greedo).unwrap().char.hp.max = 500;
        world.entity_mut(greedo).unwrap().char.hp.current = 500;
        world.entity_mut(han).unwrap().begin_fighting(greedo);

        assert_eq!(combat_pass(&mut world, &services), 2);
        assert!(drain(&mut rx).contains("Greedo"));
        assert_eq!(world.entity(greedo).unwrap().attacker, Some(han));
    }

    #[test]
    fn test_fight_with_vanished_target_ends() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let greedo = add_npc(&mut world, "Greedo", 100);
        let (luke, _rx_luke) = add_player(&mut world, "Luke", 100);
        world.entity_mut(han).unwrap().begin_fighting(greedo);
        world.entity_mut(luke).unwrap().begin_fighting(999);
        world.remove_entity(greedo);

        assert_eq!(combat_pass(&mut world, &services), 0);
        assert!(!world.entity(han).unwrap().is_fighting());
        assert_eq!(world.entity(luke).unwrap().state(), EntityState::Normal);
    }

    #[test]
    fn test_regen_skips_the_dead() {
        let mut world = test_world();
        let (han, _rx) = add_player(&mut world, "Han", 100);
        {
            let e = world.entity_mut(han).unwrap();
            e.char.hp.current = 0;
            e.char.state = EntityState::Dead;
        }
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            regen_pass(&mut world, &mut rng);
        }
        assert_eq!(world.entity(han).unwrap().char.hp.current, 0);
    }
}
