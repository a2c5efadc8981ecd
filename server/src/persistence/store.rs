//! JSON files under the data directory.
//!
//! ```text
//! accounts/<initial>/<name>.json   one player profile each
//! areas/ items/ mobs/ ships/ starsystems/ helps/
//! sys/commands.json
//! ```
//!
//! The world directories may hold one record or a list of records per file.
//! Every write goes to a temp file first and is renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use mud_shared::{AreaData, CharData, CommandDef, HelpData, ItemData, PlayerProfile, ShipData, StarSystemData};

use crate::error::{MudError, MudResult};

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// Handle on the data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn account_path(&self, name: &str) -> MudResult<PathBuf> {
        let name = name.to_lowercase();
        let initial = name
            .chars()
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| MudError::user(format!("'{}' is not a valid character name", name)))?;
        Ok(self.root.join("accounts").join(initial.to_string()).join(format!("{}.json", name)))
    }

    pub fn player_exists(&self, name: &str) -> bool {
        self.account_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// A player's profile, `None` if no such character was ever saved.
    pub fn load_player(&self, name: &str) -> MudResult<Option<PlayerProfile>> {
        let path = self.account_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn save_player(&self, profile: &PlayerProfile) -> MudResult<()> {
        let path = self.account_path(&profile.char.name)?;
        write_atomic(&path, &serde_json::to_vec_pretty(profile)?)
    }

    /// Save a brand new character. False, and nothing written, if the name
    /// is already taken.
    pub fn create_player(&self, profile: &PlayerProfile) -> MudResult<bool> {
        if self.player_exists(&profile.char.name) {
            return Ok(false);
        }
        self.save_player(profile)?;
        Ok(true)
    }

    /// Every saved profile. Unreadable files are logged and skipped.
    pub fn all_players(&self) -> MudResult<Vec<PlayerProfile>> {
        let accounts = self.root.join("accounts");
        let mut out = Vec::new();
        if !accounts.exists() {
            return Ok(out);
        }
        for bucket in fs::read_dir(&accounts)? {
            let bucket = bucket?.path();
            if !bucket.is_dir() {
                continue;
            }
            for file in json_files(&bucket)? {
                match fs::read_to_string(&file).map_err(MudError::from).and_then(|t| Ok(serde_json::from_str(&t)?)) {
                    Ok(profile) => out.push(profile),
                    Err(e) => error!("Skipping unreadable account {}: {}", file.display(), e),
                }
            }
        }
        Ok(out)
    }

    /// Write an area file named after the area.
    pub fn save_area(&self, area: &AreaData) -> MudResult<PathBuf> {
        let path = self.root.join("areas").join(format!("{}.json", slug(&area.name)));
        write_atomic(&path, &serde_json::to_vec_pretty(area)?)?;
        Ok(path)
    }

    fn load_dir<T: DeserializeOwned>(&self, dir: &str) -> MudResult<Vec<T>> {
        let path = self.root.join(dir);
        let mut out = Vec::new();
        if !path.exists() {
            debug!("{} does not exist", path.display());
            return Ok(out);
        }
        for file in json_files(&path)? {
            let text = fs::read_to_string(&file)?;
            match serde_json::from_str::<OneOrMany<T>>(&text) {
                Ok(OneOrMany::One(record)) => out.push(record),
                Ok(OneOrMany::Many(records)) => out.extend(records),
                Err(e) => {
                    error!("Cannot parse {}: {}", file.display(), e);
                    return Err(e.into());
                }
            }
        }
        Ok(out)
    }

    pub fn load_areas(&self) -> MudResult<Vec<AreaData>> {
        self.load_dir("areas")
    }

    pub fn load_items(&self) -> MudResult<Vec<ItemData>> {
        self.load_dir("items")
    }

    pub fn load_mobs(&self) -> MudResult<Vec<CharData>> {
        self.load_dir("mobs")
    }

    pub fn load_ships(&self) -> MudResult<Vec<ShipData>> {
        self.load_dir("ships")
    }

    pub fn load_starsystems(&self) -> MudResult<Vec<StarSystemData>> {
        self.load_dir("starsystems")
    }

    pub fn load_helps(&self) -> MudResult<Vec<HelpData>> {
        self.load_dir("helps")
    }

    /// The command table override, if the data directory carries one.
    pub fn load_commands(&self) -> MudResult<Option<Vec<CommandDef>>> {
        let path = self.root.join("sys").join("commands.json");
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

/// `*.json` files in a directory, sorted by name.
pub(crate) fn json_files(dir: &Path) -> MudResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|x| x == "json").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// Write to `<path>.tmp`, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> MudResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn slug(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if slug.is_empty() {
        "unnamed".into()
    } else {
        slug
    }
}
