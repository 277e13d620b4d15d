//! Wave state: a bounded set of zombie slots with a spawn budget.

use rand::Rng;
use rand::rngs::SmallRng;
use rand_distr::Normal;
use tracing::trace;

use crate::actor::Zombie;
use crate::geometry::{Position, Velocity};
use crate::path::PlannedPath;

/// Maximum number of zombies active at once in any session.
pub const MAX_ZOMBIES: usize = 25;

/// One difficulty episode. Zombies occupy fixed slots; slot `i`'s path may
/// only be present while slot `i`'s zombie is (the converse is allowed, a
/// freshly spawned zombie has no path yet).
#[derive(Debug)]
pub struct Wave {
    number: u32,
    zombie_health: i32,
    remaining_spawns: u32,
    zombies: [Option<Zombie>; MAX_ZOMBIES],
    paths: [Option<PlannedPath>; MAX_ZOMBIES],
    rng: SmallRng,
    speed_noise: Normal<f64>,
}

impl Wave {
    /// Builds wave `number` with its difficulty-scaled health and spawn
    /// budget: `125 * number` health, `floor(5 * 1.2^number)` spawns.
    #[must_use]
    pub fn new(number: u32, rng: SmallRng) -> Self {
        let remaining_spawns = (5.0 * 1.2_f64.powi(number as i32)) as u32;
        Self {
            number,
            zombie_health: 125 * number as i32,
            remaining_spawns,
            zombies: std::array::from_fn(|_| None),
            paths: std::array::from_fn(|_| None),
            rng,
            speed_noise: Normal::new(0.0, 10.0).expect("constant std dev is positive"),
        }
    }

    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn remaining_spawns(&self) -> u32 {
        self.remaining_spawns
    }

    #[must_use]
    pub fn zombie_at(&self, slot: usize) -> Option<&Zombie> {
        self.zombies[slot].as_ref()
    }

    #[must_use]
    pub fn zombie_at_mut(&mut self, slot: usize) -> Option<&mut Zombie> {
        self.zombies[slot].as_mut()
    }

    #[must_use]
    pub fn path_at(&self, slot: usize) -> Option<&PlannedPath> {
        self.paths[slot].as_ref()
    }

    #[must_use]
    pub fn path_at_mut(&mut self, slot: usize) -> Option<&mut PlannedPath> {
        self.paths[slot].as_mut()
    }

    /// Installs a path for a slot. Refused (returning false) when the slot
    /// has no zombie, which keeps the slot invariant intact even if the
    /// zombie died between path computation and installation.
    pub fn install_path(&mut self, slot: usize, path: PlannedPath) -> bool {
        if self.zombies[slot].is_none() {
            return false;
        }
        self.paths[slot] = Some(path);
        true
    }

    pub fn clear_path(&mut self, slot: usize) {
        self.paths[slot] = None;
    }

    /// Spawns a zombie into the lowest empty slot while budget remains.
    /// Returns false when the budget is exhausted or every slot is full.
    pub fn spawn_zombie(&mut self, spawn: Position) -> bool {
        if self.remaining_spawns == 0 {
            return false;
        }
        let Some(slot) = self.zombies.iter().position(Option::is_none) else {
            return false;
        };
        let speed = self.random_speed();
        trace!(slot, speed, "Spawning zombie");
        self.zombies[slot] = Some(Zombie::new(spawn, self.zombie_health, speed));
        self.paths[slot] = None;
        self.remaining_spawns -= 1;
        true
    }

    /// Marks a zombie dead, clearing both the zombie and its path slot.
    pub fn killed_zombie_at(&mut self, slot: usize) -> bool {
        if self.zombies[slot].is_none() {
            return false;
        }
        self.zombies[slot] = None;
        self.paths[slot] = None;
        true
    }

    /// Moves an existing zombie to a respawn point: velocity zeroed, path
    /// cleared, health preserved.
    pub fn respawn_zombie(&mut self, slot: usize, spawn: Position) -> bool {
        let Some(zombie) = self.zombies[slot].as_mut() else {
            return false;
        };
        zombie.actor.velocity = Velocity::ZERO;
        zombie.actor.position = spawn;
        self.paths[slot] = None;
        true
    }

    #[must_use]
    pub fn is_done_spawning(&self) -> bool {
        self.remaining_spawns == 0
    }

    /// Whether the wave is over: nothing left to spawn and no slot occupied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.is_done_spawning() && self.zombies.iter().all(Option::is_none)
    }

    /// Indices of slots currently holding a zombie.
    pub fn live_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.zombies
            .iter()
            .enumerate()
            .filter_map(|(slot, z)| z.as_ref().map(|_| slot))
    }

    /// Samples a spawn speed from a normal distribution skewed upward by the
    /// wave number, clamped into the zombie speed band.
    fn random_speed(&mut self) -> f64 {
        let noise = self.rng.sample(self.speed_noise);
        let base = f64::from(self.number.min(60) + 15);
        let percentile = (base + noise).clamp(1.0, 100.0) / 100.0;
        Zombie::MIN_SPEED + (Zombie::MAX_SPEED - Zombie::MIN_SPEED) * percentile
    }
}
