//! Live characters: the tagged Player / NonPlayer entity, its state machine,
//! damage, regeneration and experience rules.

pub mod player;
pub mod npc;
pub mod item;

pub use player::{PlayerData, Session};
pub use npc::MobData;

use rand::Rng;

use mud_shared::{CharData, EntityState, ItemData};

use crate::network::Outbound;
use crate::world::RoomKey;

/// Instance id of a live entity
pub type EntityId = u64;

/// XP per level squared
const XP_PER_LEVEL: u64 = 500;

/// Level derived from experience: `floor(sqrt(xp / 500))`
pub fn level_for_xp(xp: u64) -> u32 {
    ((xp / XP_PER_LEVEL) as f64).sqrt().floor() as u32
}

/// Experience needed to reach `level` (inverse of `level_for_xp`)
pub fn xp_for_level(level: u32) -> u64 {
    (level as u64).pow(2) * XP_PER_LEVEL
}

/// Variant-specific data
#[derive(Debug)]
pub enum EntityKind {
    Player(PlayerData),
    NonPlayer(MobData),
}

/// A character present in the world
#[derive(Debug)]
pub struct Entity {
    pub char: CharData,
    pub kind: EntityKind,
    /// Who this entity is fighting. Only set while `Fighting`.
    pub attacker: Option<EntityId>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.char.id
    }

    pub fn name(&self) -> &str {
        &self.char.name
    }

    pub fn location(&self) -> RoomKey {
        RoomKey::new(self.char.room, self.char.ship)
    }

    pub fn state(&self) -> EntityState {
        self.char.state
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    pub fn player(&self) -> Option<&PlayerData> {
        match &self.kind {
            EntityKind::Player(p) => Some(p),
            EntityKind::NonPlayer(_) => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            EntityKind::Player(p) => Some(p),
            EntityKind::NonPlayer(_) => None,
        }
    }

    /// Privilege level used for command gating; non-players have none.
    pub fn privilege(&self) -> u32 {
        self.player().map(|p| p.priv_level).unwrap_or(0)
    }

    /// True if a connection is attached
    pub fn is_connected(&self) -> bool {
        self.player().map(|p| p.session.is_some()).unwrap_or(false)
    }

    /// Push text to the entity's connection. Non-players and linkdead
    /// players silently drop it.
    pub fn send(&self, msg: impl Into<String>) {
        self.send_outbound(Outbound::Text(msg.into()));
    }

    pub fn send_outbound(&self, out: Outbound) {
        if let Some(session) = self.player().and_then(|p| p.session.as_ref()) {
            session.send(out);
        }
    }

    pub fn is_dead(&self) -> bool {
        self.char.state == EntityState::Dead
    }

    pub fn is_fighting(&self) -> bool {
        self.char.state == EntityState::Fighting && self.attacker.is_some()
    }

    /// Dead, unconscious and sleeping entities neither speak nor hear speech.
    pub fn is_unspeakable(&self) -> bool {
        matches!(
            self.char.state,
            EntityState::Dead | EntityState::Unconscious | EntityState::Sleeping
        )
    }

    /// Hit points counting damage taken past zero
    pub fn effective_hp(&self) -> i64 {
        self.char.hp.current as i64 - self.char.wounds as i64
    }

    /// Check whether the entity may walk through an exit right now.
    pub fn can_move(&self) -> Result<(), &'static str> {
        match self.char.state {
            EntityState::Dead => Err("You are dead."),
            EntityState::Unconscious => Err("You are unconscious."),
            EntityState::Sleeping => Err("You are asleep."),
            EntityState::Fighting => Err("You are fighting!"),
            EntityState::Sitting => Err("You can't move while sitting."),
            EntityState::Piloting | EntityState::Gunning => Err("You are at your station."),
            _ if self.char.mv.current == 0 => Err("You are exhausted."),
            _ => Ok(()),
        }
    }

    pub fn begin_fighting(&mut self, target: EntityId) {
        self.attacker = Some(target);
        self.char.state = EntityState::Fighting;
    }

    pub fn stop_fighting(&mut self) {
        self.attacker = None;
        if self.char.state == EntityState::Fighting {
            self.char.state = EntityState::Normal;
        }
    }

    /// Apply damage and advance the state machine. Players drop unconscious
    /// at zero and die at minus twice their max; anyone else dies at zero.
    pub fn apply_damage(&mut self, damage: u32) -> EntityState {
        if self.is_dead() || damage == 0 {
            return self.char.state;
        }
        let chunk = damage.min(u16::MAX as u32) as u16;
        let overflow = self.char.hp.lose(chunk) as u32 + (damage - chunk as u32);
        self.char.wounds = self.char.wounds.saturating_add(overflow);

        if self.char.hp.current == 0 {
            let death_line = 2 * self.char.hp.max as u32;
            if !self.is_player() || self.char.wounds >= death_line {
                self.char.state = EntityState::Dead;
                self.attacker = None;
            } else {
                self.char.state = EntityState::Unconscious;
                self.attacker = None;
            }
        }
        self.char.state
    }

    /// Restore hit points. Wounds past zero close first; an unconscious
    /// entity wakes once it is back above zero.
    pub fn heal(&mut self, amount: u16) {
        if self.is_dead() {
            return;
        }
        let mut amount = amount;
        let closed = (amount as u32).min(self.char.wounds);
        self.char.wounds -= closed;
        amount -= closed as u16;
        self.char.hp.gain(amount);
        if self.char.state == EntityState::Unconscious && self.effective_hp() > 0 {
            self.char.state = EntityState::Normal;
            self.send("\r\n&YYou regain consciousness.&d\r\n");
        }
    }

    /// One regeneration step. Healing odds depend on the state; sedation
    /// drains movement instead. A separate small chance restores magic and
    /// movement regardless of state.
    pub fn regen_tick<R: Rng>(&mut self, rng: &mut R) {
        match self.char.state {
            EntityState::Dead => return,
            EntityState::Sedated => {
                if rng.gen_range(1..=4) == 1 {
                    self.char.mv.lose(1);
                }
            }
            state => {
                let odds = match state {
                    EntityState::Sitting => 3,
                    EntityState::Sleeping => 2,
                    EntityState::Unconscious => 8,
                    _ => 5,
                };
                if rng.gen_range(1..=odds) == 1 {
                    self.heal(1);
                    self.char.mv.gain(1);
                }
            }
        }
        if rng.gen_range(1..=10) == 1 {
            self.char.mp.gain(1);
            self.char.mv.gain(1);
        }
    }

    /// Add (or with a negative amount, remove) experience. XP never drops
    /// below zero and level never drops. Returns the number of levels gained.
    pub fn add_xp(&mut self, amount: i64) -> u32 {
        let xp = (self.char.xp as i64).saturating_add(amount).max(0);
        self.char.xp = xp as u64;
        let target = level_for_xp(self.char.xp) + 1;
        let mut gained = 0;
        while self.char.level < target {
            self.advance_level();
            gained += 1;
        }
        if gained > 0 {
            self.send(format!(
                "\r\n&YYou have advanced to level &W{}&Y!&d\r\n",
                self.char.level
            ));
        }
        gained
    }

    /// Raise the level by one, growing the pools and filling them.
    pub fn advance_level(&mut self) {
        let ch = &mut self.char;
        ch.level += 1;
        ch.hp.max = ch.hp.max.saturating_add(10);
        ch.mp.max = ch.mp.max.saturating_add(5);
        ch.mv.max = ch.mv.max.saturating_add(5);
        ch.hp.current = ch.hp.max;
        ch.mp.current = ch.mp.max;
        ch.mv.current = ch.mv.max;
        ch.wounds = 0;
    }

    /// Status prompt shown after each command.
    pub fn prompt(&self) -> String {
        if self.is_dead() {
            return "\r\n&R[DEAD]&d: ".to_string();
        }
        let ch = &self.char;
        format!(
            "\r\n&Y[&GHp:&W{}&G/&W{} &GMv:&W{}&G/&W{}&Y]&d: ",
            self.effective_hp().max(0),
            ch.hp.max,
            ch.mv.current,
            ch.mv.max
        )
    }

    /// Add an item to the inventory. Refuses an item whose id is already
    /// carried, handing it back.
    pub fn give_item(&mut self, item: ItemData) -> Result<(), ItemData> {
        item::add_unique(&mut self.char.inventory, item)
    }

    /// Remove the first inventory item matching `query`.
    pub fn take_item(&mut self, query: &str) -> Option<ItemData> {
        item::take_matching(&mut self.char.inventory, query)
    }

    /// Does the entity carry (or wear) an item with this prototype or key id?
    pub fn has_key(&self, key: u64) -> bool {
        key != 0
            && self
                .char
                .inventory
                .iter()
                .chain(self.char.equipment.values())
                .any(|i| i.key_id == Some(key) || i.oid == key || i.id == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mud_shared::Vital;
    use rand::rngs::mock::StepRng;

    fn npc(hp: u16) -> Entity {
        let mut ch = CharData::new("stormtrooper");
        ch.id = 1;
        ch.hp = Vital::full(hp);
        Entity {
            char: ch,
            kind: EntityKind::NonPlayer(MobData { prototype: 1 }),
            attacker: None,
        }
    }

    fn player(hp: u16) -> Entity {
        let mut ch = CharData::new("Han");
        ch.id = 900_000_001;
        ch.hp = Vital::full(hp);
        Entity {
            char: ch,
            kind: EntityKind::Player(PlayerData::new(1)),
            attacker: None,
        }
    }

    #[test]
    fn test_level_curve() {
        assert_eq!(level_for_xp(0), 0);
        assert_eq!(level_for_xp(499), 0);
        assert_eq!(level_for_xp(500), 1);
        assert_eq!(level_for_xp(2000), 2);
        assert_eq!(level_for_xp(4499), 2);
        assert_eq!(xp_for_level(2), 2000);
        assert_eq!(level_for_xp(xp_for_level(7)), 7);
    }

    #[test]
    fn test_regen_forced_roll_heals_one() {
        let mut e = npc(50);
        e.char.hp = Vital::new(10, 50);
        let mut rng = StepRng::new(0, 0);
        e.regen_tick(&mut rng);
        assert_eq!(e.char.hp, Vital::new(11, 50));
    }

    #[test]
    fn test_regen_skips_dead() {
        let mut e = npc(10);
        e.apply_damage(10);
        assert!(e.is_dead());
        e.regen_tick(&mut StepRng::new(0, 0));
        assert_eq!(e.char.hp.current, 0);
    }

    #[test]
    fn test_sedated_drains_movement() {
        let mut e = npc(10);
        e.char.state = EntityState::Sedated;
        e.char.mv = Vital::new(5, 10);
        e.char.hp = Vital::new(5, 10);
        e.regen_tick(&mut StepRng::new(0, 0));
        // drained by one, then the uniform bonus gives one back
        assert_eq!(e.char.mv.current, 5);
        assert_eq!(e.char.hp.current, 5);
    }

    #[test]
    fn test_npc_dies_at_zero() {
        let mut e = npc(10);
        assert_eq!(e.apply_damage(4), EntityState::Normal);
        assert_eq!(e.apply_damage(6), EntityState::Dead);
        assert_eq!(e.char.hp.current, 0);
    }

    #[test]
    fn test_player_unconscious_then_dead() {
        let mut p = player(10);
        assert_eq!(p.apply_damage(10), EntityState::Unconscious);
        assert_eq!(p.apply_damage(19), EntityState::Unconscious);
        assert_eq!(p.char.hp.current, 0);
        assert_eq!(p.apply_damage(1), EntityState::Dead);
        // terminal
        p.heal(100);
        assert!(p.is_dead());
    }

    #[test]
    fn test_unconscious_wakes_when_healed_above_zero() {
        let mut p = player(10);
        p.apply_damage(12);
        assert_eq!(p.effective_hp(), -2);
        p.heal(2);
        assert_eq!(p.state(), EntityState::Unconscious);
        p.heal(1);
        assert_eq!(p.state(), EntityState::Normal);
        assert_eq!(p.char.hp.current, 1);
    }

    #[test]
    fn test_add_xp_levels_and_refills() {
        let mut p = player(10);
        p.char.hp.current = 3;
        assert_eq!(p.add_xp(2000), 2);
        assert_eq!(p.char.level, 3);
        assert_eq!(p.char.hp, Vital::full(30));
        // losing xp never lowers level or goes negative
        assert_eq!(p.add_xp(-5000), 0);
        assert_eq!(p.char.xp, 0);
        assert_eq!(p.char.level, 3);
    }

    #[test]
    fn test_can_move_rules() {
        let mut p = player(10);
        assert!(p.can_move().is_ok());
        p.char.state = EntityState::Sitting;
        assert!(p.can_move().is_err());
        p.char.state = EntityState::Normal;
        p.char.mv.current = 0;
        assert_eq!(p.can_move(), Err("You are exhausted."));
    }

    #[test]
    fn test_unspeakable() {
        let mut p = player(10);
        assert!(!p.is_unspeakable());
        p.char.state = EntityState::Sleeping;
        assert!(p.is_unspeakable());
    }
}
