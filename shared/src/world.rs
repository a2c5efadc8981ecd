//! Static world data: areas, rooms, help entries and the command table.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::items::ItemData;

/// Door state on one side of an exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExitFlag {
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub locked: bool,
    /// Key id that fits this lock, zero when any key fits nothing
    #[serde(default)]
    pub key: u64,
}

impl ExitFlag {
    pub fn is_blocked(&self) -> bool {
        self.closed || self.locked
    }

    /// Suffix shown next to the exit in room listings.
    pub fn status(&self) -> &'static str {
        match (self.closed, self.locked) {
            (true, true) => " (closed) (locked)",
            (true, false) => " (closed)",
            (false, true) => " (locked)",
            (false, false) => "",
        }
    }
}

/// A single room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoomData {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub exits: BTreeMap<String, u64>,
    #[serde(default, rename = "exflags")]
    pub exit_flags: BTreeMap<String, ExitFlag>,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Script bodies keyed by event name
    #[serde(default, rename = "roomProgs")]
    pub progs: HashMap<String, String>,
    /// Items lying in the room; live state only
    #[serde(skip)]
    pub items: Vec<ItemData>,
}

impl RoomData {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn exit_flag(&self, direction: &str) -> ExitFlag {
        self.exit_flags.get(direction).copied().unwrap_or_default()
    }

    pub fn is_exit_blocked(&self, direction: &str) -> bool {
        self.exit_flag(direction).is_blocked()
    }
}

/// Places one mob prototype in a room on reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobSpawn {
    pub mob: u64,
    pub room: u64,
}

/// Places one item prototype in a room on reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpawn {
    pub item: u64,
    pub room: u64,
}

/// An area file: rooms plus the spawn tables re-applied on each reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AreaData {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub levels: [u32; 2],
    /// Seconds between resets, zero disables the cycle
    #[serde(default)]
    pub reset: u64,
    #[serde(default)]
    pub reset_msg: String,
    #[serde(default)]
    pub rooms: Vec<RoomData>,
    #[serde(default)]
    pub mobs: Vec<MobSpawn>,
    #[serde(default)]
    pub items: Vec<ItemSpawn>,
}

/// A help topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpData {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub level: u32,
    pub desc: String,
}

/// One row of the command table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDef {
    pub name: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub level: u32,
    /// Name of the registered handler
    pub func: String,
}

impl CommandDef {
    pub fn new(name: &str, keywords: &[&str], level: u32, func: &str) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            level,
            func: func.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_from_json() {
        let json = r#"{
            "id": 100,
            "name": "Docking Bay 94",
            "exits": {"north": 101},
            "exflags": {"north": {"closed": true, "key": 7}}
        }"#;
        let room: RoomData = serde_json::from_str(json).unwrap();
        assert_eq!(room.exits["north"], 101);
        assert!(room.is_exit_blocked("north"));
        assert_eq!(room.exit_flag("north").key, 7);
        assert!(!room.is_exit_blocked("south"));
    }

    #[test]
    fn test_exit_status() {
        let flag = ExitFlag { closed: true, locked: true, key: 0 };
        assert_eq!(flag.status(), " (closed) (locked)");
        assert_eq!(ExitFlag::default().status(), "");
    }
}
