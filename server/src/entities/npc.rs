//! Server-side NPC entity.

use rand::Rng;

use mud_shared::{CharData, EntityState};

use super::{item, Entity, EntityKind};

/// Data only non-player entities carry
#[derive(Debug, Clone)]
pub struct MobData {
    /// Prototype this instance was spawned from
    pub prototype: u64,
}

impl Entity {
    /// Clone a mob prototype into a fresh instance. The instance and every
    /// item it carries get new ids; the prototype is not touched. The room
    /// is left for the caller to set.
    pub fn spawn_from<R: Rng>(proto: &CharData, rng: &mut R) -> Self {
        let mut char = proto.clone();
        char.id = item::new_npc_id(rng);
        char.oid = proto.id;
        char.state = EntityState::Normal;
        char.wounds = 0;
        char.hp.current = char.hp.max;
        char.mv.current = char.mv.max;
        char.mp.current = char.mp.max;

        let mut next_id = || item::new_item_id(&mut *rng);
        char.inventory = proto
            .inventory
            .iter()
            .map(|i| i.instantiate(&mut next_id))
            .collect();
        char.equipment = proto
            .equipment
            .iter()
            .map(|(slot, i)| (slot.clone(), i.instantiate(&mut next_id)))
            .collect();

        Self {
            char,
            kind: EntityKind::NonPlayer(MobData { prototype: proto.id }),
            attacker: None,
        }
    }

    /// Prototype id for NPCs, None for players
    pub fn prototype(&self) -> Option<u64> {
        match &self.kind {
            EntityKind::NonPlayer(mob) => Some(mob.prototype),
            EntityKind::Player(_) => None,
        }
    }
}
