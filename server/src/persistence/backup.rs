//! Compressed snapshots of every saved player, kept for a limited time.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};

use super::store::{write_atomic, FileStore};
use crate::error::MudResult;

const PREFIX: &str = "players-";
const SUFFIX: &str = ".json.gz";

fn backup_dir(store: &FileStore) -> PathBuf {
    store.root().join("backup")
}

/// Write `backup/players-<now>.json.gz` holding every saved profile.
pub fn write_backup(store: &FileStore, now: u64) -> MudResult<PathBuf> {
    let players = store.all_players()?;
    let json = serde_json::to_vec(&players)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let bytes = encoder.finish()?;

    let path = backup_dir(store).join(format!("{}{}{}", PREFIX, now, SUFFIX));
    write_atomic(&path, &bytes)?;
    info!("Backed up {} players to {}", players.len(), path.display());
    Ok(path)
}

/// Timestamp encoded in a backup file name.
fn taken_at(name: &str) -> Option<u64> {
    name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?.parse().ok()
}

/// Delete snapshots older than `retention_secs`. Returns how many went.
pub fn prune_backups(store: &FileStore, now: u64, retention_secs: u64) -> MudResult<usize> {
    let dir = backup_dir(store);
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let Some(stamp) = path.file_name().and_then(|n| n.to_str()).and_then(taken_at) else {
            continue;
        };
        if now.saturating_sub(stamp) > retention_secs {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not remove old backup {}: {}", path.display(), e),
            }
        }
    }
    if removed > 0 {
        info!("Pruned {} old backups", removed);
    }
    Ok(removed)
}
