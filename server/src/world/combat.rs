//! Combat rounds, death and corpses.

use log::info;
use rand::Rng;

use mud_shared::{DiceRoll, EntityState, STAT_DEX, STAT_STR, UNARMED_SKILL};

use super::World;
use crate::entities::{item, EntityId};
use crate::hooks::{self, HookContext, HookEvent};
use crate::services::Services;

/// Damage rolled by bare hands
const UNARMED_DAMAGE: DiceRoll = DiceRoll::new(1, 2, 0);

/// Severity word for a damage amount.
pub fn damage_word(damage: u32) -> &'static str {
    match damage {
        d if d > 20 => "ANNIHILATES",
        d if d > 15 => "EVISCERATES",
        d if d > 10 => "BRUISES",
        d if d > 5 => "HITS",
        d if d > 1 => "NICKS",
        _ => "MISSES",
    }
}

/// One line of combat text from a given point of view.
pub fn damage_message(damage: u32, attacker: &str, defender: &str, weapon: &str) -> String {
    let word = damage_word(damage);
    if word == "MISSES" {
        format!("\r\n&R{} {} {}.&d\r\n", attacker, word, defender)
    } else {
        format!("\r\n&R{} {} {} with {}.&d\r\n", attacker, word, defender, weapon)
    }
}

/// What happened in a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub hit: bool,
    pub damage: u32,
    pub defender_state: EntityState,
}

impl World {
    /// Resolve one round of `attacker` against `defender` with a given d20
    /// roll. A hit needs the roll to beat the defender's armor class. Both
    /// sides, and onlookers, are told the result either way.
    pub fn resolve_round<R: Rng>(
        &mut self,
        attacker: EntityId,
        defender: EntityId,
        hit_roll: u32,
        rng: &mut R,
    ) -> Option<RoundOutcome> {
        let att = self.entity(attacker)?;
        let def = self.entity(defender)?;
        let room = att.location();
        let att_name = att.name().to_string();
        let def_name = def.name().to_string();
        let armor = def.char.armor_class();

        let (weapon_name, dice, skill, stat) = match att.char.weapon() {
            Some(w) => {
                // A broken damage expression does no damage of its own
                let dice = match w.dmg_roll.as_deref() {
                    Some(expr) => DiceRoll::parse(expr),
                    None => Some(UNARMED_DAMAGE),
                };
                let stat = if w.weapon_skill().contains("blaster") || w.weapon_skill() == "rifle" {
                    STAT_DEX
                } else {
                    STAT_STR
                };
                (w.name.clone(), dice, w.weapon_skill().to_string(), stat)
            }
            None => ("fists".to_string(), Some(UNARMED_DAMAGE), UNARMED_SKILL.to_string(), STAT_STR),
        };
        let stat_bonus = (att.char.stats[stat] as i32 - 10).max(0) as u32 / 2;
        let skill_bonus = att.char.skill(&skill) as u32 / 20;

        let hit = hit_roll > armor;
        let damage = if hit {
            let rolled = dice.map(|d| d.roll_with(|sides| rng.gen_range(1..=sides))).unwrap_or(0);
            rolled + stat_bonus + skill_bonus
        } else {
            0
        };

        let def = self.entity_mut(defender)?;
        if def.attacker.is_none() && !def.is_unspeakable() {
            def.begin_fighting(attacker);
        }
        let defender_state = def.apply_damage(damage);

        if let Some(att) = self.entity(attacker) {
            att.send(damage_message(damage, "You", &def_name, &format!("your {}", weapon_name)));
        }
        if let Some(def) = self.entity(defender) {
            def.send(damage_message(damage, &att_name, "you", &format!("their {}", weapon_name)));
        }
        self.send_to_room(
            room,
            &damage_message(damage, &att_name, &def_name, &format!("their {}", weapon_name)),
            &[attacker, defender],
        );

        if hit_roll == 20 {
            if let Some(att) = self.entity_mut(attacker) {
                att.char.improve_skill(&skill, 1);
            }
        }

        match defender_state {
            EntityState::Unconscious => {
                if let Some(def) = self.entity(defender) {
                    def.send(format!("\r\n&W{} &Rhas knocked you out.&d\r\n", att_name));
                }
                if let Some(att) = self.entity_mut(attacker) {
                    att.stop_fighting();
                    att.send(format!("\r\n&RYou have knocked out &W{}&R.&d\r\n", def_name));
                }
            }
            EntityState::Dead => {
                if let Some(def) = self.entity(defender) {
                    def.send(format!("\r\n&R{} has killed you.&d\r\n", att_name));
                }
                if let Some(att) = self.entity_mut(attacker) {
                    att.stop_fighting();
                    att.send(format!("\r\n&RYou have killed &W{}&R.&d\r\n", def_name));
                }
            }
            _ => {}
        }

        Some(RoundOutcome { hit, damage, defender_state })
    }

    /// Turn a dead entity into a corpse. NPCs leave the roster; each worn
    /// item has a one in four chance to survive onto the corpse. Players keep
    /// their equipment and stay in the roster, dead.
    pub fn make_corpse<R: Rng>(&mut self, victim: EntityId, rng: &mut R) -> Option<u64> {
        let entity = self.entity_mut(victim)?;
        if !entity.is_dead() {
            return None;
        }
        let mut contents = std::mem::take(&mut entity.char.inventory);
        if !entity.is_player() {
            let worn = std::mem::take(&mut entity.char.equipment);
            contents.extend(worn.into_values().filter(|_| rng.gen_range(1..=4) == 4));
        }
        let corpse = item::make_corpse(&entity.char, contents, rng);
        let corpse_id = corpse.id;
        let room = entity.location();
        let is_player = entity.is_player();
        info!("Entity {} [{}] has been killed", entity.name(), victim);

        match self.get_room_mut(room) {
            Ok(r) => r.items.push(corpse),
            Err(e) => log::error!("Corpse of {} has nowhere to go: {}", victim, e),
        }
        if !is_player {
            self.remove_entity(victim);
        }
        Some(corpse_id)
    }
}

/// Settle a death: award experience, fire hooks, leave a corpse.
pub fn handle_death(world: &mut World, services: &Services, killer: Option<EntityId>, victim: EntityId) {
    let mut rng = rand::thread_rng();
    let Some(dead) = world.entity(victim) else {
        return;
    };
    let victim_name = dead.name().to_string();
    let victim_level = dead.char.level as i64;
    let room = dead.location();

    let killer_name = killer
        .and_then(|k| world.entity(k))
        .map(|k| k.name().to_string());
    if let Some(k) = killer {
        if let Some(killer) = world.entity_mut(k) {
            let xp = victim_level * rng.gen_range(1..=20);
            killer.send(format!("\r\n&YYou receive &W{}&Y experience points.&d\r\n", xp));
            killer.add_xp(xp);
        }
    }

    world.send_to_room(
        room,
        &format!("\r\n&R{} is DEAD!&d\r\n", victim_name),
        &[victim],
    );
    let ctx = HookContext {
        actor: killer_name.clone(),
        ..Default::default()
    };
    hooks::fire_entity(world, services, victim, HookEvent::Death, &ctx);
    if let Some(k) = killer {
        let ctx = HookContext {
            actor: Some(victim_name),
            ..Default::default()
        };
        hooks::fire_entity(world, services, k, HookEvent::Kill, &ctx);
    }

    if let Some(dead) = world.entity(victim) {
        if dead.is_player() {
            dead.send("\r\n&RYou have been killed.&d\r\n");
        }
    }
    world.make_corpse(victim, &mut rng);
}

/// Roll a d20 and run one round, settling the defender's death if the
/// round kills them. Returns the outcome when both sides still existed.
pub fn fight_round(
    world: &mut World,
    services: &Services,
    attacker: EntityId,
    defender: EntityId,
) -> Option<RoundOutcome> {
    let mut rng = rand::thread_rng();
    let roll = rng.gen_range(1..=20);
    let outcome = world.resolve_round(attacker, defender, roll, &mut rng)?;
    if outcome.defender_state == EntityState::Dead {
        handle_death(world, services, Some(attacker), defender);
    }
    Some(outcome)
}
