//! Ships and star systems.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::world::RoomData;

/// A starship. Its interior rooms have ids local to the ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ShipData {
    /// Instance id once loaded
    #[serde(default)]
    pub id: u64,
    /// Prototype id
    #[serde(default)]
    pub oid: u64,
    pub name: String,
    #[serde(default, rename = "type")]
    pub ship_type: String,
    #[serde(default)]
    pub desc: String,
    /// Room where the ship is docked, or where it lifted off from
    #[serde(default)]
    pub location_id: u64,
    #[serde(skip)]
    pub in_space: bool,
    #[serde(default)]
    pub current_system: String,
    #[serde(default)]
    pub rooms: Vec<RoomData>,
    #[serde(default)]
    pub modules: BTreeMap<String, u32>,
    #[serde(default)]
    pub ramp: u64,
    #[serde(default)]
    pub cockpit: u64,
    #[serde(default)]
    pub hp: [u32; 2],
    #[serde(default)]
    pub sp: [u32; 2],
    #[serde(default)]
    pub position: [f32; 2],
    #[serde(skip)]
    pub heading: f32,
    #[serde(skip)]
    pub in_hyper: bool,
    #[serde(skip)]
    pub hyper_destination: Option<String>,
    /// Seconds until the ship drops out of hyperspace
    #[serde(skip)]
    pub hyper_time_until: u32,
    /// Entity currently at the controls
    #[serde(skip)]
    pub pilot: Option<u64>,
}

impl ShipData {
    pub fn is_docked(&self) -> bool {
        !self.in_space
    }
}

/// A body orbiting in a star system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrbitalData {
    pub name: String,
    #[serde(default, rename = "type")]
    pub orbital_type: String,
    /// Landing rooms; empty means the body cannot be landed on
    #[serde(default)]
    pub spaceports: Vec<u64>,
}

/// A star system on the galactic map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StarSystemData {
    pub name: String,
    #[serde(default)]
    pub sector: String,
    /// Position in parsecs
    #[serde(default)]
    pub position: [f32; 2],
    #[serde(default)]
    pub orbits: Vec<OrbitalData>,
}

impl StarSystemData {
    pub fn distance_to(&self, other: &StarSystemData) -> f32 {
        let dx = other.position[0] - self.position[0];
        let dy = other.position[1] - self.position[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// First room a ship may land in, if any.
    pub fn landing_room(&self) -> Option<u64> {
        self.orbits.iter().flat_map(|o| o.spaceports.iter()).copied().next()
    }
}
