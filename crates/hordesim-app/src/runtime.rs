//! The simulation's two worker threads and their cooperative shutdown.
//!
//! A physics tick advances every actor at the frame rate and a planner tick
//! refreshes zombie paths ten times a second. Both share the session's
//! actor lock; neither holds it across a sleep. Shutdown flips an atomic
//! flag both loops poll at their head, then joins them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, trace, warn};

use hordesim_core::{
    InputState, MAX_ZOMBIES, PlannedPath, Player, Position, Session, Wave, Zombie,
};
use hordesim_planning::PlannerRegistry;

use crate::{SharedInput, SharedRegistry, SharedSession};

/// Distance at which a zombie counts as having reached its next waypoint.
const WAYPOINT_RADIUS: f64 = 2.0;

/// Handle over the two running worker threads.
pub struct SimulationRuntime {
    keep_alive: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    physics: Option<JoinHandle<()>>,
    planner: Option<JoinHandle<()>>,
}

impl SimulationRuntime {
    /// Opens the first wave, spawns the initial zombie burst, and starts
    /// both worker threads.
    pub fn launch(
        session: SharedSession,
        input: SharedInput,
        registry: SharedRegistry,
    ) -> Result<Self> {
        session.start_next_wave();
        spawn_burst(&session, session.config().initial_zombie_burst);

        let keep_alive = Arc::new(AtomicBool::new(false));
        if keep_alive
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("keep-alive flag raised before launch");
        }
        let frames = Arc::new(AtomicU64::new(0));

        let physics = {
            let session = Arc::clone(&session);
            let input = Arc::clone(&input);
            let keep_alive = Arc::clone(&keep_alive);
            let frames = Arc::clone(&frames);
            thread::Builder::new()
                .name("physics-tick".into())
                .spawn(move || physics_loop(&session, &input, &keep_alive, &frames))
                .context("failed to spawn physics tick")?
        };

        let planner = {
            let session = Arc::clone(&session);
            let registry = Arc::clone(&registry);
            let keep_alive = Arc::clone(&keep_alive);
            thread::Builder::new()
                .name("planner-tick".into())
                .spawn(move || planner_loop(&session, &registry, &keep_alive))
                .context("failed to spawn planner tick")?
        };

        info!("Simulation workers running");
        Ok(Self {
            keep_alive,
            frames,
            physics: Some(physics),
            planner: Some(planner),
        })
    }

    /// Number of physics ticks completed so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    /// Lowers the keep-alive flag and joins both workers.
    pub fn shutdown(mut self) -> Result<()> {
        if self
            .keep_alive
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("simulation already shut down");
        }
        self.join_workers()
    }

    fn join_workers(&mut self) -> Result<()> {
        for (name, handle) in [
            ("physics", self.physics.take()),
            ("planner", self.planner.take()),
        ] {
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                bail!("{name} worker panicked");
            }
        }
        info!(frames = self.frames(), "Simulation workers joined");
        Ok(())
    }
}

impl Drop for SimulationRuntime {
    fn drop(&mut self) {
        // A dropped runtime still stops its workers; errors are only
        // reportable through the explicit shutdown path.
        if self
            .keep_alive
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let _ = self.join_workers();
        }
    }
}

/// Fills the lowest free slots with freshly spawned zombies, stopping at
/// the wave's remaining budget.
fn spawn_burst(session: &Session, count: u32) {
    let map = Arc::clone(session.map());
    let mut world = session.actors();
    let mut spawned = 0;
    for _ in 0..count {
        let spawn = world.random_zombie_spawn(&map);
        if !world.wave.as_mut().is_some_and(|wave| wave.spawn_zombie(spawn)) {
            break;
        }
        spawned += 1;
    }
    debug!(spawned, "Spawned initial zombie burst");
}

/// Physics tick: translate the player by the velocity computed on the
/// previous iteration, refresh it from the key state, then translate every
/// live zombie. The lock wait is bounded by half a frame; a miss skips the
/// step entirely rather than stalling the frame cadence.
fn physics_loop(
    session: &Session,
    input: &InputState,
    keep_alive: &AtomicBool,
    frames: &AtomicU64,
) {
    let frame_period = session.config().frame_period();
    let dt = frame_period.as_secs_f64();
    let map = Arc::clone(session.map());

    while keep_alive.load(Ordering::SeqCst) {
        let (vx, vy) = input.axis();
        let sprinting = input.sprinting();

        if let Some(mut world) = session.actors_timeout(frame_period / 2) {
            let velocity = world.player.actor.velocity;
            world
                .player
                .actor
                .attempt_translation_in(velocity.dx * dt, velocity.dy * dt, &map);

            let speed = if sprinting {
                Player::RUN_SPEED
            } else {
                Player::WALK_SPEED
            };
            world
                .player
                .actor
                .set_velocity(vy.atan2(vx), (vx * vx + vy * vy).sqrt() * speed);

            if let Some(wave) = world.wave.as_mut() {
                for slot in 0..MAX_ZOMBIES {
                    if let Some(zombie) = wave.zombie_at_mut(slot) {
                        let v = zombie.actor.velocity;
                        zombie.actor.attempt_translation_in(v.dx * dt, v.dy * dt, &map);
                    }
                }
            }
        } else {
            trace!("Physics tick skipped; actor lock stayed busy");
        }

        // Frame publication: snapshot consumers key off this counter.
        frames.fetch_add(1, Ordering::SeqCst);
        thread::sleep(frame_period);
    }
}

/// One planner pass over every live zombie slot.
///
/// The actor state is snapshotted under the lock, paths are salvaged or
/// regenerated outside it, and the results are installed in a second short
/// critical section that also respawns path-less zombies and steers the
/// rest toward their next waypoint.
fn planner_loop(session: &Session, registry: &PlannerRegistry, keep_alive: &AtomicBool) {
    let period = session.config().planner_period();

    while keep_alive.load(Ordering::SeqCst) {
        let started = Instant::now();

        let (goal, mut slots) = snapshot_slots(session);
        plan_paths(registry, goal, &mut slots);
        install_and_steer(session, goal, slots);

        let elapsed = started.elapsed();
        match period.checked_sub(elapsed) {
            Some(remaining) => thread::sleep(remaining),
            None => warn!(?elapsed, "Planner tick overran its period"),
        }
    }
}

/// Per-slot view taken under the lock: the zombie's position, its current
/// path, and whether this pass replaced the path.
struct SlotPlan {
    position: Position,
    path: Option<PlannedPath>,
    recomputed: bool,
}

fn snapshot_slots(session: &Session) -> (Position, [Option<SlotPlan>; MAX_ZOMBIES]) {
    let world = session.actors();
    let goal = world.player.actor.position;
    let mut slots = std::array::from_fn(|_| None);
    if let Some(wave) = world.wave.as_ref() {
        for (slot, entry) in slots.iter_mut().enumerate() {
            if let Some(zombie) = wave.zombie_at(slot) {
                *entry = Some(SlotPlan {
                    position: zombie.actor.position,
                    path: wave.path_at(slot).cloned(),
                    recomputed: false,
                });
            }
        }
    }
    (goal, slots)
}

/// Salvages or regenerates each live slot's path. The registry handle is
/// read once for the whole pass so a concurrent planner swap cannot split
/// it.
fn plan_paths(
    registry: &PlannerRegistry,
    goal: Position,
    slots: &mut [Option<SlotPlan>; MAX_ZOMBIES],
) {
    let handle = registry.current();
    let mut planner = handle.lock().expect("planner handle poisoned");
    for plan in slots.iter_mut().flatten() {
        let salvaged = plan
            .path
            .as_mut()
            .is_some_and(|path| planner.salvage_path(path, plan.position, goal));
        if !salvaged {
            plan.path = planner.generate_path(plan.position, goal);
            plan.recomputed = true;
        }
    }
}

fn install_and_steer(
    session: &Session,
    goal: Position,
    slots: [Option<SlotPlan>; MAX_ZOMBIES],
) {
    let map = Arc::clone(session.map());
    let mut world = session.actors();

    // Install the pass's results into slots whose zombie survived.
    if let Some(wave) = world.wave.as_mut() {
        for (slot, plan) in slots.iter().enumerate() {
            let Some(plan) = plan else { continue };
            match (&plan.path, plan.recomputed) {
                // Salvage rewrote the snapshot's tail; a recompute replaced
                // it outright. Either way the slot takes the fresh copy.
                (Some(path), _) => {
                    wave.install_path(slot, path.clone());
                }
                (None, true) => wave.clear_path(slot),
                (None, false) => {}
            }
        }
    }

    // Respawn zombies left with no route to the player.
    let stranded: Vec<usize> = world
        .wave
        .as_ref()
        .map(|wave| {
            wave.live_slots()
                .filter(|&slot| wave.path_at(slot).is_none())
                .collect()
        })
        .unwrap_or_default();
    for slot in stranded {
        let spawn = world.random_zombie_spawn(&map);
        if let Some(wave) = world.wave.as_mut() {
            trace!(slot, "Respawning stranded zombie");
            wave.respawn_zombie(slot, spawn);
        }
    }

    // Steer everything that still has a route.
    if let Some(wave) = world.wave.as_mut() {
        for (slot, plan) in slots.iter().enumerate() {
            let Some(plan) = plan else { continue };
            let velocity = match wave.path_at_mut(slot) {
                Some(path) => {
                    if path.at_next_position(plan.position, WAYPOINT_RADIUS) {
                        path.consume_next();
                    }
                    Some(path.next_movement(plan.position, Zombie::MIN_SPEED))
                }
                None => None,
            };
            if let Some(velocity) = velocity
                && let Some(zombie) = wave.zombie_at_mut(slot)
            {
                zombie.actor.velocity = velocity;
            }
        }
    }

    let wave_finished = world.wave.as_ref().is_some_and(Wave::is_finished);
    drop(world);

    if wave_finished {
        let number = session.start_next_wave();
        debug!(wave = number, ?goal, "Wave exhausted; starting the next");
        spawn_burst(session, session.config().initial_zombie_burst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hordesim_core::{MAP_HEIGHT, MAP_WIDTH, MapData, ObstacleRaster, SimConfig};
    use hordesim_planning::PlannerSpec;

    fn session() -> SharedSession {
        let map = MapData::from_rasters(
            ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT),
            Position::new(300.0, 200.0),
            vec![Position::new(30.0, 30.0), Position::new(570.0, 370.0)],
            Vec::new(),
        )
        .expect("map");
        let config = SimConfig {
            rng_seed: Some(21),
            initial_zombie_burst: 4,
            ..SimConfig::default()
        };
        Arc::new(Session::new(Arc::new(map), config).expect("session"))
    }

    fn registry(session: &Session) -> SharedRegistry {
        Arc::new(
            PlannerRegistry::new(
                PlannerSpec::from_config(session.config()),
                session.map(),
            )
            .expect("registry"),
        )
    }

    #[test]
    fn spawn_burst_respects_slot_capacity() {
        let session = session();
        session.start_next_wave();
        spawn_burst(&session, 100);
        let world = session.actors();
        let wave = world.wave.as_ref().expect("wave");
        // Wave one budgets six spawns.
        assert_eq!(wave.live_slots().count(), 6);
        assert!(wave.is_done_spawning());
    }

    #[test]
    fn planner_pass_installs_paths_and_velocities() {
        let session = session();
        session.start_next_wave();
        spawn_burst(&session, 3);
        let registry = registry(&session);

        let (goal, mut slots) = snapshot_slots(&session);
        assert_eq!(goal, Position::new(300.0, 200.0));
        assert_eq!(slots.iter().flatten().count(), 3);

        plan_paths(&registry, goal, &mut slots);
        install_and_steer(&session, goal, slots);

        let world = session.actors();
        let wave = world.wave.as_ref().expect("wave");
        for slot in wave.live_slots() {
            let zombie = wave.zombie_at(slot).expect("zombie");
            assert!(wave.path_at(slot).is_some(), "slot {slot} has no path");
            let speed = zombie.actor.velocity.magnitude();
            assert!(
                (speed - Zombie::MIN_SPEED).abs() < 1e-9,
                "slot {slot} speed {speed}"
            );
        }
    }

    #[test]
    fn runtime_launches_and_shuts_down() {
        let session = session();
        let registry = registry(&session);
        let input = Arc::new(InputState::new());
        let runtime = SimulationRuntime::launch(
            Arc::clone(&session),
            Arc::clone(&input),
            registry,
        )
        .expect("launch");

        while runtime.frames() < 3 {
            thread::yield_now();
        }
        runtime.shutdown().expect("shutdown");
    }
}
