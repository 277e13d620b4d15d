//! Live two-ticker run against a walled map.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use hordesim_app::SimulationRuntime;
use hordesim_core::{
    Control, InputState, MAP_HEIGHT, MAP_WIDTH, MapData, MAX_ZOMBIES, ObstacleRaster, PlannerKind,
    Position, Session, SimConfig,
};
use hordesim_planning::{PlannerRegistry, PlannerSpec};

/// A thin wall hanging from the top edge, splitting the arena into two
/// halves joined along the bottom.
fn walled_map() -> MapData {
    let mut raster = ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT);
    for y in 0..=300 {
        raster.block(300, y);
    }
    MapData::from_rasters(
        raster,
        Position::new(100.0, 200.0),
        vec![Position::new(500.0, 200.0), Position::new(550.0, 350.0)],
        Vec::new(),
    )
    .expect("map")
}

#[test]
fn two_tickers_keep_every_actor_on_valid_ground() {
    let map = Arc::new(walled_map());
    let config = SimConfig {
        planner: PlannerKind::VgAstar,
        // Tight enough to keep a route-carrying vertex on each side of the
        // thin wall's cap.
        cleanliness_threshold: 2.0,
        rng_seed: Some(0xABCD),
        initial_zombie_burst: 5,
        ..SimConfig::default()
    };
    let session = Arc::new(Session::new(Arc::clone(&map), config).expect("session"));
    let registry = Arc::new(
        PlannerRegistry::new(PlannerSpec::from_config(session.config()), &map)
            .expect("registry"),
    );
    let input = Arc::new(InputState::new());

    let wave_changes = Arc::new(AtomicUsize::new(0));
    {
        let wave_changes = Arc::clone(&wave_changes);
        session.add_wave_listener(move |event| {
            assert_eq!(event.wave_number, 1, "only the first wave should open");
            wave_changes.fetch_add(1, Ordering::SeqCst);
        });
    }

    let runtime = SimulationRuntime::launch(
        Arc::clone(&session),
        Arc::clone(&input),
        Arc::clone(&registry),
    )
    .expect("launch");

    // Walk the player down-right into the map while both tickers run.
    input.set(Control::Right, true);
    input.set(Control::Down, true);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut observations = 0;
    while Instant::now() < deadline {
        {
            let world = session.actors();
            assert!(
                map.position_is_valid(world.player.actor.position),
                "player at invalid {:?}",
                world.player.actor.position
            );
            if let Some(wave) = world.wave.as_ref() {
                for slot in 0..MAX_ZOMBIES {
                    if let Some(zombie) = wave.zombie_at(slot) {
                        assert!(
                            map.position_is_valid(zombie.actor.position),
                            "zombie {slot} at invalid {:?}",
                            zombie.actor.position
                        );
                    } else {
                        assert!(
                            wave.path_at(slot).is_none(),
                            "path without a zombie in slot {slot}"
                        );
                    }
                }
            }
            observations += 1;
        }
        thread::sleep(Duration::from_millis(40));
    }

    let frames_seen = runtime.frames();
    runtime.shutdown().expect("shutdown");

    assert!(observations > 10, "too few consistency observations");
    assert!(frames_seen > 20, "physics tick barely ran: {frames_seen}");
    assert_eq!(
        wave_changes.load(Ordering::SeqCst),
        1,
        "wave listener must fire exactly once"
    );

    // The player held right+down the whole run, so they must have moved.
    let world = session.actors();
    assert!(world.player.actor.position.x > 100.0);
    assert!(world.player.actor.position.y > 200.0);
    assert!(world.wave.is_some());
}
