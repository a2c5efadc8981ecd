//! Handles to the long-lived services, passed explicitly to everything that
//! needs them instead of living in globals.

use std::sync::Arc;

use log::warn;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::executor::{CommandSender, QueuedCommand};
use crate::persistence::PersistenceHandle;
use crate::scheduler::Scheduler;
use crate::world::{World, WorldHandle};

/// Everything a command handler, hook or timer may reach besides the world
/// it is already holding.
#[derive(Clone)]
pub struct Services {
    pub world: WorldHandle,
    pub scheduler: Scheduler,
    pub commands: CommandSender,
    pub persistence: Option<PersistenceHandle>,
    pub config: Arc<Config>,
}

impl Services {
    /// Queue a command for the serialized executor.
    pub fn queue(&self, cmd: QueuedCommand) {
        if self.commands.send(cmd).is_err() {
            warn!("Command executor is gone, dropping queued command");
        }
    }

    /// Services around a fresh world with no executor, persistence or timer
    /// task running. Queued commands land in the returned receiver.
    pub fn detached(world: World) -> (Self, mpsc::UnboundedReceiver<QueuedCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let services = Self {
            world: crate::world::new_handle(world),
            scheduler: Scheduler::new(),
            commands: tx,
            persistence: None,
            config: Arc::new(Config::default()),
        };
        (services, rx)
    }
}
