//! Multi-user text world server.
//!
//! Loads the world from the data directory, then runs the listener, the
//! command executor, the one-second world pump and the scheduler side by
//! side until one of them stops or the process is interrupted.

mod config;
mod error;
mod scheduler;
mod services;
mod world;
mod entities;
mod commands;
mod executor;
mod hooks;
mod language;
mod economy;
mod pump;
mod network;
mod persistence;

use std::sync::Arc;

use clap::Parser;
use futures::future::select_all;
use log::{error, info};
use tokio::sync::mpsc;

use crate::config::{Args, Config};
use crate::network::Server;
use crate::persistence::FileStore;
use crate::scheduler::Scheduler;
use crate::services::Services;
use crate::world::lock_world;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match Config::load(&args.data_dir) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to read configuration: {}", e);
            return;
        }
    };
    config.apply_args(&args);
    info!("Starting {}...", config.name);

    let store = FileStore::new(config.data_dir.clone());
    let world = match persistence::load_world(&store) {
        Ok(world) => world,
        Err(e) => {
            error!("Failed to load the world from {}: {}", config.data_dir.display(), e);
            return;
        }
    };

    let persistence = persistence::init(store);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let services = Services {
        world: world::new_handle(world),
        scheduler: Scheduler::new(),
        commands: command_tx,
        persistence: Some(persistence.clone()),
        config: Arc::new(config),
    };

    world::area::schedule_resets(&services);
    persistence::schedule_autosave(&services);
    persistence::schedule_backups(&services);
    language::schedule_decay(&services);

    let server = match Server::bind(services.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", services.config.addr, e);
            return;
        }
    };

    let tasks = vec![
        tokio::spawn(services.scheduler.clone().run()),
        tokio::spawn(pump::run(services.clone())),
        tokio::spawn(executor::run(services.clone(), command_rx)),
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Listener stopped: {}", e);
            }
        }),
    ];
    info!("Server started successfully!");

    tokio::select! {
        (result, index, _) = select_all(tasks) => {
            if let Err(e) = result {
                error!("Service task {} failed: {}", index, e);
            } else {
                error!("Service task {} exited", index);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    let saved = {
        let world = lock_world(&services.world);
        world.broadcast("\r\n&RThe server is shutting down.&d\r\n");
        persistence::save_all_players(&world, &services)
    };
    info!("Saved {} players", saved);
    persistence.shutdown().await;
}
