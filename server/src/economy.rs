//! The mining lottery: a tiny background reward that gets harder to win
//! every time someone wins it.

use log::info;
use rand::Rng;

use crate::entities::EntityId;
use crate::world::World;

/// Lowest difficulty the lottery decays to
pub const MIN_DIFFICULTY: u32 = 4;
/// Credits paid out to a winner
pub const PRIZE: u64 = 10_000;

/// Lottery state. Each draw wins with odds of one in 16^difficulty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lottery {
    pub difficulty: u32,
}

impl Default for Lottery {
    fn default() -> Self {
        Self { difficulty: MIN_DIFFICULTY }
    }
}

impl Lottery {
    /// One draw: every one of `difficulty` hex digits must come up zero.
    /// A win makes the next one harder.
    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> bool {
        let won = (0..self.difficulty).all(|_| rng.gen_range(0..16) == 0);
        if won {
            self.difficulty += 2;
        }
        won
    }

    /// Occasional easing back toward the floor.
    pub fn relax<R: Rng>(&mut self, rng: &mut R) {
        if rng.gen_range(1..=100) == 100 && self.difficulty > MIN_DIFFICULTY {
            self.difficulty -= 1;
        }
    }
}

impl World {
    /// One lottery pass over every player. Winners are credited and told;
    /// their ids are returned so the caller can save them.
    pub fn run_lottery<R: Rng>(&mut self, rng: &mut R) -> Vec<EntityId> {
        let mut winners = Vec::new();
        let ids: Vec<EntityId> = self.entities().filter(|e| e.is_player()).map(|e| e.id()).collect();
        for id in ids {
            if !self.lottery.draw(rng) {
                continue;
            }
            let difficulty = self.lottery.difficulty;
            if let Some(e) = self.entity_mut(id) {
                if let Some(p) = e.player_mut() {
                    p.bank += PRIZE;
                }
                e.send(format!(
                    "\r\n&YYou have won the lottery. You have been awarded &W{}&Y credits!&d\r\n",
                    PRIZE
                ));
                info!("{} won the lottery, difficulty now {}", e.name(), difficulty);
                winners.push(id);
            }
        }
        self.lottery.relax(rng);
        winners
    }
}
