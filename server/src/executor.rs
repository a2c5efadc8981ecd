//! The serialized command executor.
//!
//! Every connection pushes its lines onto one shared queue. A single task
//! drains it, running one command at a time under the world lock with a
//! short pause between commands.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use log::{error, info};
use tokio::sync::mpsc;

use crate::commands;
use crate::entities::EntityId;
use crate::network::EditTarget;
use crate::services::Services;
use crate::world::lock_world;

/// A unit of work for the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedCommand {
    /// A typed line. Trusted lines come from scripts and skip privilege checks.
    Line { entity: EntityId, line: String, trusted: bool },
    /// The line editor closed; `text` is `None` when it was aborted.
    EditFinished { entity: EntityId, target: EditTarget, text: Option<String> },
}

pub type CommandSender = mpsc::UnboundedSender<QueuedCommand>;

/// Run one queued command. A panicking handler is logged and contained.
pub fn execute(services: &Services, cmd: QueuedCommand) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut world = lock_world(&services.world);
        match cmd {
            QueuedCommand::Line { entity, line, trusted } => {
                commands::interpret(&mut world, services, entity, &line, trusted);
            }
            QueuedCommand::EditFinished { entity, target, text } => {
                commands::finish_edit(&mut world, services, entity, target, text);
            }
        }
    }));
    if result.is_err() {
        error!("Command handler panicked; world lock released and play continues");
    }
}

/// Drain the queue until every sender is gone.
pub async fn run(services: Services, mut rx: mpsc::UnboundedReceiver<QueuedCommand>) {
    let delay = Duration::from_millis(services.config.command_delay_ms);
    info!("Command executor running ({}ms between commands)", delay.as_millis());
    while let Some(cmd) = rx.recv().await {
        execute(&services, cmd);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    info!("Command executor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{add_player, test_world};
    use crate::world::RoomKey;
    use mud_shared::ItemData;

    fn line(entity: EntityId, line: &str) -> QueuedCommand {
        QueuedCommand::Line { entity, line: line.into(), trusted: false }
    }

    #[test]
    fn test_concurrent_get_and_drop_keep_one_copy() {
        for _ in 0..50 {
            let mut world = test_world();
            let (han, _rx) = add_player(&mut world, "Han", 100);
            world.entity_mut(han).unwrap().char.inventory.push(ItemData {
                id: 42,
                name: "a thermal detonator".into(),
                keywords: vec!["detonator".into()],
                ..Default::default()
            });
            let (services, _q) = Services::detached(world);

            let a = services.clone();
            let b = services.clone();
            let t1 = std::thread::spawn(move || execute(&a, line(han, "drop detonator")));
            let t2 = std::thread::spawn(move || execute(&b, line(han, "get detonator")));
            t1.join().unwrap();
            t2.join().unwrap();

            let world = lock_world(&services.world);
            let carried = world.entity(han).unwrap().char.inventory.iter().filter(|i| i.id == 42).count();
            let on_floor = world
                .get_room(RoomKey::planet(100))
                .unwrap()
                .items
                .iter()
                .filter(|i| i.id == 42)
                .count();
            assert_eq!(carried + on_floor, 1);
        }
    }

    #[tokio::test]
    async fn test_run_drains_in_order() {
        let mut world = test_world();
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let (services, _q) = Services::detached(world);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(line(han, "sit")).unwrap();
        tx.send(line(han, "stand")).unwrap();
        tx.send(line(han, "north")).unwrap();
        drop(tx);
        run(services.clone(), rx).await;
        let world = lock_world(&services.world);
        assert_eq!(world.entity(han).unwrap().char.room, 101);
    }
}
