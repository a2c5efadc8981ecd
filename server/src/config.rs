//! Server configuration: `config.json` in the data directory, overridden by
//! command line flags.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use mud_shared::DEFAULT_PORT;

use crate::error::MudResult;

/// Command line flags
#[derive(Debug, Parser)]
#[command(name = "mud-server", about = "Multi-user text world server")]
pub struct Args {
    /// Directory holding areas, accounts and system files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Listen address, overrides the config file
    #[arg(long)]
    pub addr: Option<String>,

    /// Disable the periodic player backup job
    #[arg(long)]
    pub no_backup: bool,
}

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub addr: String,
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Room new and respawned characters start in
    pub start_room: u64,
    /// Seconds of silence before a connection is closed
    pub idle_timeout_secs: u32,
    /// Seconds before the ceiling at which a warning is sent
    pub idle_warnings: Vec<u32>,
    /// Pause between two dequeued commands
    pub command_delay_ms: u64,
    pub autosave_secs: u64,
    pub backups_enabled: bool,
    pub backup_interval_secs: u64,
    pub backup_retention_hours: u64,
    pub language_decay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "Space Wars Rebellion".into(),
            addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            data_dir: PathBuf::from("data"),
            start_room: 100,
            idle_timeout_secs: 3600,
            idle_warnings: vec![60, 30, 15],
            command_delay_ms: 100,
            autosave_secs: 300,
            backups_enabled: true,
            backup_interval_secs: 3600,
            backup_retention_hours: 72,
            language_decay_secs: 3600,
        }
    }
}

impl Config {
    /// Read `config.json` from the data directory. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load(data_dir: &Path) -> MudResult<Self> {
        let path = data_dir.join("config.json");
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&text)?;
            info!("Loaded config from {}", path.display());
            config
        } else {
            warn!("{} not found, using defaults", path.display());
            Config::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(addr) = &args.addr {
            self.addr = addr.clone();
        }
        if args.no_backup {
            self.backups_enabled = false;
        }
    }

    /// Idle counts at which a warning goes out, ascending.
    pub fn idle_warning_marks(&self) -> Vec<u32> {
        let mut marks: Vec<u32> = self
            .idle_warnings
            .iter()
            .filter(|w| **w < self.idle_timeout_secs)
            .map(|w| self.idle_timeout_secs - w)
            .collect();
        marks.sort_unstable();
        marks
    }
}
