//! Persistence layer.
//!
//! The world is loaded from the data directory once at startup. After that
//! every write goes through a background task so the executor and the pump
//! never wait on the disk: saves are fire-and-forget, loads answer over a
//! oneshot channel.

pub(crate) mod store;
mod backup;

pub use store::FileStore;
pub use backup::{prune_backups, write_backup};

use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, info, warn};
use tokio::sync::{mpsc, oneshot};

use mud_shared::{AreaData, PlayerProfile};

use crate::commands::CommandTable;
use crate::entities::Entity;
use crate::error::{MudError, MudResult};
use crate::services::Services;
use crate::world::{lock_world, World};

/// Commands sent to the persistence background task
#[derive(Debug)]
pub enum PersistenceCommand {
    SavePlayer { profile: Box<PlayerProfile> },
    /// Load a profile by character name (response sent via oneshot channel)
    LoadPlayer {
        name: String,
        response: oneshot::Sender<MudResult<Option<PlayerProfile>>>,
    },
    /// Save a new character unless the name is taken (answers whether it was saved)
    CreatePlayer {
        profile: Box<PlayerProfile>,
        response: oneshot::Sender<MudResult<bool>>,
    },
    SaveArea { area: Box<AreaData> },
    /// Snapshot all players and prune snapshots older than the retention
    Backup { retention_secs: u64 },
    /// Stop after everything queued before it; acknowledged once stopped
    Shutdown { done: oneshot::Sender<()> },
}

/// Handle for sending commands to the persistence task
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    /// Queue a profile for saving (fire and forget). False if the queue is
    /// full or the task is gone.
    pub fn save_player(&self, profile: PlayerProfile) -> bool {
        self.try_send(PersistenceCommand::SavePlayer { profile: Box::new(profile) })
    }

    pub fn save_area(&self, area: AreaData) -> bool {
        self.try_send(PersistenceCommand::SaveArea { area: Box::new(area) })
    }

    pub fn backup(&self, retention_secs: u64) -> bool {
        self.try_send(PersistenceCommand::Backup { retention_secs })
    }

    /// Load a profile. Queued behind any pending saves, so a character that
    /// just logged out reads back what it saved.
    pub async fn load_player(&self, name: &str) -> MudResult<Option<PlayerProfile>> {
        let (tx, rx) = oneshot::channel();
        let cmd = PersistenceCommand::LoadPlayer { name: name.to_string(), response: tx };
        if self.sender.send(cmd).await.is_err() {
            return Err(MudError::user("persistence task is not running"));
        }
        rx.await.map_err(|_| MudError::user("persistence task dropped the request"))?
    }

    /// Claim a name for a new character. Checked and written in one step on
    /// the persistence task, so two connections creating the same name at
    /// once cannot both succeed.
    pub async fn create_player(&self, profile: PlayerProfile) -> MudResult<bool> {
        let (tx, rx) = oneshot::channel();
        let cmd = PersistenceCommand::CreatePlayer { profile: Box::new(profile), response: tx };
        if self.sender.send(cmd).await.is_err() {
            return Err(MudError::user("persistence task is not running"));
        }
        rx.await.map_err(|_| MudError::user("persistence task dropped the request"))?
    }

    /// Stop the persistence task once everything queued is written, and
    /// wait for it.
    pub async fn shutdown(&self) {
        let (done, stopped) = oneshot::channel();
        if self.sender.send(PersistenceCommand::Shutdown { done }).await.is_ok() {
            let _ = stopped.await;
        }
    }

    fn try_send(&self, cmd: PersistenceCommand) -> bool {
        match self.sender.try_send(cmd) {
            Ok(()) => true,
            Err(e) => {
                warn!("Persistence queue rejected a request: {}", e);
                false
            }
        }
    }
}

/// Spawn the background task over a store and return its handle.
pub fn init(store: FileStore) -> PersistenceHandle {
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(persistence_task(store, rx));
    info!("Persistence background task started");
    PersistenceHandle { sender: tx }
}

/// Run a blocking store call off the async workers.
async fn blocking<T, F>(store: &FileStore, f: F) -> MudResult<T>
where
    T: Send + 'static,
    F: FnOnce(&FileStore) -> MudResult<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| MudError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

async fn persistence_task(store: FileStore, mut rx: mpsc::Receiver<PersistenceCommand>) {
    info!("Persistence task running in {}", store.root().display());

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistenceCommand::SavePlayer { profile } => {
                let name = profile.char.name.clone();
                if let Err(e) = blocking(&store, move |s| s.save_player(&profile)).await {
                    error!("Failed to save player {}: {}", name, e);
                }
            }

            PersistenceCommand::LoadPlayer { name, response } => {
                let result = blocking(&store, move |s| s.load_player(&name)).await;
                let _ = response.send(result);
            }

            PersistenceCommand::CreatePlayer { profile, response } => {
                let result = blocking(&store, move |s| s.create_player(&profile)).await;
                let _ = response.send(result);
            }

            PersistenceCommand::SaveArea { area } => {
                match blocking(&store, move |s| s.save_area(&area)).await {
                    Ok(path) => info!("Saved area to {}", path.display()),
                    Err(e) => error!("Failed to save area: {}", e),
                }
            }

            PersistenceCommand::Backup { retention_secs } => {
                let now = unix_now();
                let result = blocking(&store, move |s| {
                    write_backup(s, now)?;
                    prune_backups(s, now, retention_secs)
                })
                .await;
                if let Err(e) = result {
                    error!("Backup failed: {}", e);
                }
            }

            PersistenceCommand::Shutdown { done } => {
                info!("Persistence task shutting down");
                let _ = done.send(());
                break;
            }
        }
    }

    info!("Persistence task stopped");
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Queue a save of a player entity. False for non-players or when nothing
/// could be queued.
pub fn save_entity(services: &Services, entity: &Entity) -> bool {
    match (&services.persistence, entity.to_profile()) {
        (Some(p), Some(profile)) => p.save_player(profile),
        _ => false,
    }
}

/// Queue a save for every player in the world, linkdead ones included.
pub fn save_all_players(world: &World, services: &Services) -> usize {
    world
        .entities()
        .filter(|e| e.is_player())
        .filter(|e| save_entity(services, e))
        .count()
}

/// Build the world from the data directory.
pub fn load_world(store: &FileStore) -> MudResult<World> {
    let commands = match store.load_commands()? {
        Some(defs) => {
            info!("Loaded {} commands from sys/commands.json", defs.len());
            CommandTable::from_defs(defs)
        }
        None => CommandTable::builtin(),
    };
    let mut world = World::new(commands);

    for item in store.load_items()? {
        world.item_protos.insert(item.id, item);
    }
    for mob in store.load_mobs()? {
        world.mob_protos.insert(mob.id, mob);
    }
    for area in store.load_areas()? {
        world.add_area(area);
    }
    for ship in store.load_ships()? {
        world.add_ship(ship);
    }
    world.starsystems = store.load_starsystems()?;
    world.helps = store.load_helps()?;

    info!(
        "World loaded: {} areas, {} rooms, {} item and {} mob prototypes, {} ships, {} systems, {} helps, {} commands",
        world.areas.len(),
        world.room_count(),
        world.item_protos.len(),
        world.mob_protos.len(),
        world.ships.len(),
        world.starsystems.len(),
        world.helps.len(),
        world.commands.len()
    );
    Ok(world)
}

/// Save every connected player periodically.
pub fn schedule_autosave(services: &Services) {
    let seconds = services.config.autosave_secs.clamp(1, u32::MAX as u64) as u32;
    let svc = services.clone();
    services.scheduler.every(seconds, move || {
        let world = lock_world(&svc.world);
        let saved = world
            .entities()
            .filter(|e| e.is_connected())
            .filter(|e| save_entity(&svc, e))
            .count();
        if saved > 0 {
            info!("Autosaved {} players", saved);
        }
    });
}

/// Register the periodic player backup, if enabled.
pub fn schedule_backups(services: &Services) {
    let config = &services.config;
    if !config.backups_enabled {
        info!("Player backups disabled");
        return;
    }
    let Some(handle) = services.persistence.clone() else { return };
    let seconds = config.backup_interval_secs.clamp(1, u32::MAX as u64) as u32;
    let retention_secs = config.backup_retention_hours.saturating_mul(3600);
    services.scheduler.every(seconds, move || {
        handle.backup(retention_secs);
    });
}
