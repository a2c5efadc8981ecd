//! Character records shared between the server and its data files.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::items::ItemData;

/// Stat indices into `CharData::stats`
pub const STAT_STR: usize = 0;
pub const STAT_INT: usize = 1;
pub const STAT_DEX: usize = 2;
pub const STAT_WIS: usize = 3;
pub const STAT_CON: usize = 4;
pub const STAT_CHA: usize = 5;

/// Display names for the six stats
pub const STAT_NAMES: [&str; 6] = ["Str", "Int", "Dex", "Wis", "Con", "Cha"];

/// Language every character understands natively
pub const NATIVE_LANGUAGE: &str = "basic";

/// Character state machine positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    #[default]
    Normal,
    Fighting,
    Sedated,
    Unconscious,
    Sleeping,
    Sitting,
    Piloting,
    Gunning,
    Editing,
    Crafting,
    Dead,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fighting => "fighting",
            Self::Sedated => "sedated",
            Self::Unconscious => "unconscious",
            Self::Sleeping => "sleeping",
            Self::Sitting => "sitting",
            Self::Piloting => "piloting",
            Self::Gunning => "gunning",
            Self::Editing => "editing",
            Self::Crafting => "crafting",
            Self::Dead => "dead",
        }
    }
}

/// A current/max pool (hit points, movement, magic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vital {
    pub current: u16,
    pub max: u16,
}

impl Vital {
    pub const fn new(current: u16, max: u16) -> Self {
        Self { current, max }
    }

    pub const fn full(max: u16) -> Self {
        Self { current: max, max }
    }

    /// Add points, never exceeding max.
    pub fn gain(&mut self, amount: u16) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }

    /// Remove points, never dropping below zero. Returns what could not be taken.
    pub fn lose(&mut self, amount: u16) -> u16 {
        let taken = amount.min(self.current);
        self.current -= taken;
        amount - taken
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }
}

impl Default for Vital {
    fn default() -> Self {
        Self::full(10)
    }
}

/// Persisted character record, common to players and mob prototypes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharData {
    #[serde(default)]
    pub id: u64,
    /// Prototype id for spawned mobs, zero for players
    #[serde(default)]
    pub oid: u64,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub room: u64,
    /// Ship instance the character is aboard, zero when planetside
    #[serde(default)]
    pub ship: u64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub hp: Vital,
    #[serde(default)]
    pub mp: Vital,
    #[serde(default)]
    pub mv: Vital,
    /// Damage taken past zero hit points
    #[serde(default, skip_serializing_if = "is_zero")]
    pub wounds: u32,
    #[serde(default = "default_stats")]
    pub stats: [u16; 6],
    #[serde(default)]
    pub skills: HashMap<String, u8>,
    #[serde(default)]
    pub languages: HashMap<String, u8>,
    #[serde(default)]
    pub speaking: String,
    #[serde(default)]
    pub equipment: BTreeMap<String, ItemData>,
    #[serde(default)]
    pub inventory: Vec<ItemData>,
    #[serde(default)]
    pub state: EntityState,
    /// Script bodies keyed by event name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub progs: HashMap<String, String>,
}

fn default_level() -> u32 {
    1
}

fn default_stats() -> [u16; 6] {
    [10; 6]
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl CharData {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: 0,
            oid: 0,
            keywords: vec![name.to_lowercase()],
            name,
            title: String::new(),
            desc: String::new(),
            race: "Human".into(),
            gender: "n".into(),
            room: 0,
            ship: 0,
            level: 1,
            xp: 0,
            gold: 0,
            hp: Vital::full(10),
            mp: Vital::full(10),
            mv: Vital::full(10),
            wounds: 0,
            stats: default_stats(),
            skills: HashMap::new(),
            languages: HashMap::from([(NATIVE_LANGUAGE.to_string(), 100)]),
            speaking: NATIVE_LANGUAGE.into(),
            equipment: BTreeMap::new(),
            inventory: Vec::new(),
            state: EntityState::Normal,
            progs: HashMap::new(),
        }
    }

    /// Case-insensitive prefix match against the character's keywords and name.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        if query.is_empty() {
            return false;
        }
        self.keywords
            .iter()
            .map(|k| k.to_lowercase())
            .chain(std::iter::once(self.name.to_lowercase()))
            .any(|k| k.starts_with(&query))
    }

    pub fn weapon(&self) -> Option<&ItemData> {
        self.equipment.values().find(|i| i.is_weapon())
    }

    pub fn skill(&self, name: &str) -> u8 {
        self.skills.get(name).copied().unwrap_or(0)
    }

    /// Raise a skill, capped at 100.
    pub fn improve_skill(&mut self, name: &str, amount: u8) {
        let entry = self.skills.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount).min(100);
    }

    /// Base armor class plus worn armor.
    pub fn armor_class(&self) -> u32 {
        10 + self.equipment.values().map(|i| i.ac).sum::<u32>()
    }

    pub fn carried_weight(&self) -> u32 {
        self.inventory
            .iter()
            .chain(self.equipment.values())
            .map(|i| i.total_weight())
            .sum()
    }
}

/// Persisted player account: the character plus login data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(flatten)]
    pub char: CharData,
    #[serde(default)]
    pub email: String,
    /// Argon2 PHC hash string
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub priv_level: u32,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub bank: u64,
    #[serde(default)]
    pub banned: bool,
    /// Unix seconds of the last save
    #[serde(default)]
    pub last_seen: u64,
}
