//! A game session: the map, the shared actor world, and its listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use thiserror::Error;
use tracing::{debug, info};

use crate::actor::Player;
use crate::config::{ConfigError, SimConfig};
use crate::geometry::Position;
use crate::map::MapData;
use crate::sync::{FairGuard, FairLock};
use crate::wave::Wave;

/// Errors raised while constructing a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Fired when a new wave opens. Dispatched while the actor lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveChangeEvent {
    pub wave_number: u32,
}

/// Fired when the player's point balance changes. Dispatched without the
/// actor lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsChangeEvent {
    pub points: u32,
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type WaveListener = Arc<dyn Fn(&WaveChangeEvent) + Send + Sync>;
type PointsListener = Arc<dyn Fn(&PointsChangeEvent) + Send + Sync>;

/// Everything the actor lock protects: the player, the current wave, and
/// the RNG feeding spawn decisions.
#[derive(Debug)]
pub struct ActorWorld {
    pub player: Player,
    pub wave: Option<Wave>,
    rng: SmallRng,
}

impl ActorWorld {
    /// Picks a random zombie spawn point from the map's table.
    pub fn random_zombie_spawn(&mut self, map: &MapData) -> Position {
        map.random_zombie_spawn(&mut self.rng)
    }
}

/// Owns one running game: immutable map data, the actor world behind the
/// fair actor lock, and the wave/points listener lists.
pub struct Session {
    map: Arc<MapData>,
    config: SimConfig,
    actors: FairLock<ActorWorld>,
    wave_listeners: Mutex<Vec<(ListenerId, WaveListener)>>,
    points_listeners: Mutex<Vec<(ListenerId, PointsListener)>>,
    next_listener_id: AtomicU64,
}

impl Session {
    pub fn new(map: Arc<MapData>, config: SimConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        // Seed the world RNG from the config RNG so a fixed seed pins the
        // whole session.
        let world_rng = SmallRng::from_rng(&mut rng);
        let player = Player::new(map.player_spawn(), config.initial_points);
        info!(
            player_spawn = ?map.player_spawn(),
            planner = config.planner.as_str(),
            "Opening session"
        );
        Ok(Self {
            map,
            config,
            actors: FairLock::new(ActorWorld {
                player,
                wave: None,
                rng: world_rng,
            }),
            wave_listeners: Mutex::new(Vec::new()),
            points_listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn map(&self) -> &Arc<MapData> {
        &self.map
    }

    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Acquires the actor lock, blocking fairly behind earlier arrivals.
    pub fn actors(&self) -> FairGuard<'_, ActorWorld> {
        self.actors.lock()
    }

    /// Acquires the actor lock unless the wait exceeds `timeout`.
    pub fn actors_timeout(&self, timeout: Duration) -> Option<FairGuard<'_, ActorWorld>> {
        self.actors.lock_timeout(timeout)
    }

    /// Opens the next wave (the first when none is active) and notifies wave
    /// listeners. Listeners run while the actor lock is held and must not
    /// reacquire it.
    pub fn start_next_wave(&self) -> u32 {
        let mut world = self.actors.lock();
        let number = world.wave.as_ref().map_or(1, |wave| wave.number() + 1);
        let wave_rng = SmallRng::from_rng(&mut world.rng);
        world.wave = Some(Wave::new(number, wave_rng));
        debug!(wave = number, "Starting wave");

        let event = WaveChangeEvent {
            wave_number: number,
        };
        for listener in self.wave_listener_snapshot() {
            listener(&event);
        }
        drop(world);
        number
    }

    /// Adjusts the player's point balance and notifies points listeners
    /// after the lock is released.
    pub fn change_player_points(&self, delta: i64) {
        let points = {
            let mut world = self.actors.lock();
            world.player.change_points(delta);
            world.player.points()
        };
        let event = PointsChangeEvent { points };
        for listener in self.points_listener_snapshot() {
            listener(&event);
        }
    }

    /// Adjusts the player's health under the lock.
    pub fn change_player_health(&self, delta: i32) {
        self.actors.lock().player.change_health(delta);
    }

    pub fn add_wave_listener(
        &self,
        listener: impl Fn(&WaveChangeEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.allocate_listener_id();
        self.wave_listeners
            .lock()
            .expect("wave listener list poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_wave_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .wave_listeners
            .lock()
            .expect("wave listener list poisoned");
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn add_points_listener(
        &self,
        listener: impl Fn(&PointsChangeEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.allocate_listener_id();
        self.points_listeners
            .lock()
            .expect("points listener list poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_points_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .points_listeners
            .lock()
            .expect("points listener list poisoned");
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn allocate_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Dispatch iterates a snapshot so listeners may add or remove entries
    /// without invalidating the walk.
    fn wave_listener_snapshot(&self) -> Vec<WaveListener> {
        self.wave_listeners
            .lock()
            .expect("wave listener list poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    fn points_listener_snapshot(&self) -> Vec<PointsListener> {
        self.points_listeners
            .lock()
            .expect("points listener list poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
