//! Item definitions shared between the server and its data files.

use serde::{Deserialize, Serialize};

/// Wear slots an item may occupy
pub const WEAR_SLOTS: [&str; 10] = [
    "head", "neck", "torso", "body", "arms", "hands", "waist", "legs", "feet", "weapon",
];

/// Skill used when fighting without a weapon
pub const UNARMED_SKILL: &str = "martial-arts";

/// Item types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    #[default]
    Generic,
    Comlink,
    Weapon,
    #[serde(rename = "weapon-2h")]
    Weapon2h,
    Container,
    Armor,
    Bin,
    Key,
    Corpse,
}

/// Item record. Prototypes and live instances share this shape; an instance
/// carries a fresh `id` and keeps its prototype's id in `oid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ItemData {
    pub id: u64,
    #[serde(default)]
    pub oid: u64,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub desc: String,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub value: u32,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub ac: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wear_loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dmg_roll: Option<String>,
    /// Door key id this item opens (key items only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<ItemData>,
}

impl ItemData {
    pub fn is_weapon(&self) -> bool {
        matches!(self.item_type, ItemType::Weapon | ItemType::Weapon2h)
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self.item_type,
            ItemType::Container | ItemType::Corpse | ItemType::Bin
        )
    }

    /// Skill trained by fighting with this item.
    pub fn weapon_skill(&self) -> &str {
        match (&self.weapon_type, self.is_weapon()) {
            (Some(kind), true) => kind,
            _ => UNARMED_SKILL,
        }
    }

    /// Case-insensitive prefix match against the name words and keywords.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        if query.is_empty() {
            return false;
        }
        self.keywords
            .iter()
            .map(|k| k.to_lowercase())
            .chain(self.name.split_whitespace().map(|w| w.to_lowercase()))
            .any(|k| k.starts_with(&query))
    }

    /// Total weight including nested contents.
    pub fn total_weight(&self) -> u32 {
        self.weight + self.contents.iter().map(|i| i.total_weight()).sum::<u32>()
    }

    /// Clone this item as a fresh instance. Every nested item gets an id from
    /// `next_id` too; the original record is left untouched.
    pub fn instantiate(&self, next_id: &mut impl FnMut() -> u64) -> ItemData {
        let mut copy = self.clone();
        copy.oid = if self.oid == 0 { self.id } else { self.oid };
        copy.id = next_id();
        copy.contents.clear();
        for child in &self.contents {
            copy.contents.push(child.instantiate(&mut *next_id));
        }
        copy
    }
}

/// A parsed `NdS+M` dice expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceRoll {
    pub const fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self { count, sides, modifier }
    }

    /// Parse `2d6`, `1d20+3` or `1d4-1`. Anything malformed yields `None`.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim().to_lowercase();
        let (dice, modifier) = if let Some((d, m)) = expr.split_once('+') {
            (d.to_string(), m.trim().parse::<i32>().ok()?)
        } else if let Some((d, m)) = expr.split_once('-') {
            (d.to_string(), -m.trim().parse::<i32>().ok()?)
        } else {
            (expr.clone(), 0)
        };
        let (count, sides) = dice.split_once('d')?;
        let count = count.trim().parse::<u32>().ok()?;
        let sides = sides.trim().parse::<u32>().ok()?;
        if count == 0 || sides == 0 {
            return None;
        }
        Some(Self::new(count, sides, modifier))
    }

    /// Roll using the provided die function, which returns 1..=sides.
    pub fn roll_with(&self, mut die: impl FnMut(u32) -> u32) -> u32 {
        let total: i64 = (0..self.count).map(|_| die(self.sides) as i64).sum::<i64>()
            + self.modifier as i64;
        total.max(0) as u32
    }
}
