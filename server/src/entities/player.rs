//! Player-specific entity data: session handle, account fields, character
//! creation helpers.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::sync::mpsc;

use mud_shared::{CharData, EntityState, PlayerProfile, Vital, NATIVE_LANGUAGE};

use super::{Entity, EntityKind};
use crate::network::Outbound;
use crate::world::ClientId;

/// Races offered during character creation
pub const RACES: [&str; 12] = [
    "Human", "Wookiee", "Twi'lek", "Rodian", "Mon Calamari", "Bothan", "Duros", "Sullustan",
    "Zabrak", "Trandoshan", "Ithorian", "Gand",
];

/// Privilege level of a fresh account
pub const DEFAULT_PRIV: u32 = 1;

/// Privilege level of an immortal
pub const ADMIN_PRIV: u32 = 100;

/// Comlink band limits in MHz
const FREQ_MIN: f64 = 100.0;
const FREQ_MAX: f64 = 500.0;

/// Outbound half of a live connection
#[derive(Debug, Clone)]
pub struct Session {
    pub client_id: ClientId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    pub fn new(client_id: ClientId, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { client_id, tx }
    }

    /// Queue a message. Returns false if the connection is gone.
    pub fn send(&self, out: Outbound) -> bool {
        self.tx.send(out).is_ok()
    }
}

/// Account data that only players carry
#[derive(Debug)]
pub struct PlayerData {
    /// None while linkdead
    pub session: Option<Session>,
    pub priv_level: u32,
    /// Comlink frequency, e.g. `"123.250"`
    pub frequency: String,
    /// Last line typed, replayed by `!`
    pub last_command: String,
    pub email: String,
    /// Argon2 PHC hash string
    pub password: String,
    pub bank: u64,
    pub banned: bool,
}

impl PlayerData {
    pub fn new(priv_level: u32) -> Self {
        Self {
            session: None,
            priv_level,
            frequency: random_frequency(&mut rand::thread_rng()),
            last_command: String::new(),
            email: String::new(),
            password: String::new(),
            bank: 0,
            banned: false,
        }
    }
}

impl Entity {
    /// Build a live player from its persisted profile. The session is
    /// attached separately by the connection layer.
    pub fn from_profile(profile: PlayerProfile) -> Self {
        let mut frequency = profile.frequency;
        if parse_frequency(&frequency).is_none() {
            frequency = random_frequency(&mut rand::thread_rng());
        }
        let mut char = profile.char;
        if char.state == EntityState::Fighting {
            char.state = EntityState::Normal;
        }
        Self {
            char,
            kind: EntityKind::Player(PlayerData {
                session: None,
                priv_level: profile.priv_level,
                frequency,
                last_command: String::new(),
                email: profile.email,
                password: profile.password,
                bank: profile.bank,
                banned: profile.banned,
            }),
            attacker: None,
        }
    }

    /// Snapshot for saving. `None` for non-players.
    pub fn to_profile(&self) -> Option<PlayerProfile> {
        let player = self.player()?;
        let last_seen = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Some(PlayerProfile {
            char: self.char.clone(),
            email: player.email.clone(),
            password: player.password.clone(),
            priv_level: player.priv_level,
            frequency: player.frequency.clone(),
            bank: player.bank,
            banned: player.banned,
            last_seen,
        })
    }

    /// Bring a dead player back to life in `room`.
    pub fn respawn(&mut self, room: u64) {
        self.attacker = None;
        self.char.room = room;
        self.char.ship = 0;
        self.char.wounds = 0;
        self.char.hp.current = self.char.hp.max;
        self.char.state = EntityState::Normal;
    }
}

/// Fields gathered by the new-character dialogue
#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub name: String,
    pub password_hash: String,
    pub email: String,
    pub race: String,
    pub gender: String,
    pub stats: [u16; 6],
}

/// Assemble the profile of a brand-new character.
pub fn create_profile<R: Rng>(new: NewCharacter, start_room: u64, rng: &mut R) -> PlayerProfile {
    let mut char = CharData::new(new.name.clone());
    char.id = super::item::new_player_id(rng);
    char.keywords = vec![new.name.to_lowercase()];
    char.title = format!("{} the newcomer", new.name);
    char.desc = format!("A {} {}.", gender_name(&new.gender), new.race.to_lowercase());
    char.race = new.race;
    char.gender = new.gender;
    char.room = start_room;
    char.hp = Vital::full(10);
    char.mv = Vital::full(10);
    char.mp = Vital::full(10);
    char.stats = new.stats;
    char.languages.insert(NATIVE_LANGUAGE.into(), 100);
    char.speaking = NATIVE_LANGUAGE.into();
    PlayerProfile {
        char,
        email: new.email,
        password: new.password_hash,
        priv_level: DEFAULT_PRIV,
        frequency: random_frequency(rng),
        bank: 0,
        banned: false,
        last_seen: 0,
    }
}

/// Best three of four six-sided dice for each stat.
pub fn roll_stats<R: Rng>(rng: &mut R) -> [u16; 6] {
    let mut stats = [0u16; 6];
    for stat in stats.iter_mut() {
        let mut dice: Vec<u16> = (0..4).map(|_| rng.gen_range(1..=6)).collect();
        dice.sort_unstable();
        *stat = dice[1..].iter().sum();
    }
    stats
}

/// Printable gender for a `m`/`f`/`n` code.
pub fn gender_name(code: &str) -> &'static str {
    match code.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('f') => "female",
        Some('n') => "neuter",
        _ => "male",
    }
}

/// Names are 3-16 ASCII letters.
pub fn valid_name(name: &str) -> bool {
    (3..=16).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphabetic())
}

/// Normalise a player name: first letter upper, rest lower.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// A random channel inside the comlink band.
pub fn random_frequency<R: Rng>(rng: &mut R) -> String {
    let steps = ((FREQ_MAX - FREQ_MIN) * 4.0) as u32;
    let step = rng.gen_range(0..steps);
    format!("{:.3}", FREQ_MIN + step as f64 * 0.25)
}

/// Validate a typed frequency: 100-500 MHz in quarter steps.
/// Returns the canonical `NNN.NNN` form.
pub fn parse_frequency(input: &str) -> Option<String> {
    let value: f64 = input.trim().parse().ok()?;
    if !(FREQ_MIN..=FREQ_MAX).contains(&value) {
        return None;
    }
    let quarters = value * 4.0;
    if (quarters - quarters.round()).abs() > 1e-9 {
        return None;
    }
    Some(format!("{:.3}", value))
}
