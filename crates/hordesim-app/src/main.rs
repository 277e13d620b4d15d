use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueEnum};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use hordesim_app::{SimulationRuntime, demo, hud};
use hordesim_core::{InputState, MapData, PlannerKind, Session, SimConfig};
use hordesim_planning::{PlannerRegistry, PlannerSpec};

fn main() -> Result<()> {
    let cli = AppCli::parse();
    init_tracing();

    let config = compose_config(&cli)?;
    let map = Arc::new(load_map(&cli)?);
    let session = Arc::new(Session::new(Arc::clone(&map), config.clone())?);
    let registry = Arc::new(PlannerRegistry::new(
        PlannerSpec::from_config(&config),
        &map,
    )?);
    let input = Arc::new(InputState::new());

    session.add_wave_listener(|event| info!(wave = event.wave_number, "Wave started"));
    session.add_points_listener(|event| info!(points = event.points, "Point balance changed"));

    info!(
        planner = config.planner.as_str(),
        duration_secs = cli.duration_secs,
        "Starting Hordesim session"
    );
    let runtime = SimulationRuntime::launch(
        Arc::clone(&session),
        Arc::clone(&input),
        Arc::clone(&registry),
    )?;

    run_headless(&cli, &config, &session)?;

    runtime.shutdown()?;
    let world = session.actors();
    info!(
        wave = world.wave.as_ref().map(|wave| wave.number()),
        points = world.player.points(),
        player = ?world.player.actor.position,
        "Session finished"
    );
    Ok(())
}

fn load_map(cli: &AppCli) -> Result<MapData> {
    match (&cli.map_dir, cli.demo) {
        (Some(dir), false) => MapData::load(dir)
            .with_context(|| format!("failed to load map directory {}", dir.display())),
        (None, true) => Ok(demo::demo_map()),
        (Some(dir), true) => {
            // Materialize the demo arena so the directory can be reused and
            // tweaked, then load it through the regular path.
            demo::write_demo_map(dir)?;
            info!(dir = %dir.display(), "Wrote demo map directory");
            MapData::load(dir)
                .with_context(|| format!("failed to load map directory {}", dir.display()))
        }
        (None, false) => bail!("either a map directory or --demo is required"),
    }
}

/// Sleeps out the configured duration, logging the session status once a
/// second and emitting periodic PNG snapshots when a snapshot directory was
/// given.
fn run_headless(cli: &AppCli, config: &SimConfig, session: &Session) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(cli.duration_secs);
    let snapshot_period = Duration::from_millis(cli.snapshot_period_ms.max(1));
    let mut next_snapshot = Instant::now();
    let mut next_status = Instant::now();
    let mut index = 0u32;

    if let Some(dir) = &cli.snapshot_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;
    }

    while Instant::now() < deadline {
        if Instant::now() >= next_status {
            info!(status = %hud::status_line(session), "Session status");
            next_status += Duration::from_secs(1);
        }
        if let Some(dir) = &cli.snapshot_dir
            && Instant::now() >= next_snapshot
        {
            let bytes = hordesim_render::snapshot_png(session, config.draw_paths)?;
            let path = dir.join(format!("frame-{index:05}.png"));
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write snapshot {}", path.display()))?;
            info!(snapshot = %path.display(), "Wrote frame snapshot");
            index += 1;
            next_snapshot += snapshot_period;
        }
        thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Parser, Debug)]
#[command(name = "hordesim-app", version, about = "Hordesim simulation shell")]
struct AppCli {
    /// Directory holding `map.png` and `data.txt`.
    #[arg(required_unless_present = "demo")]
    map_dir: Option<PathBuf>,
    /// Run the built-in demo arena; with a map directory, write the demo
    /// assets there first.
    #[arg(long)]
    demo: bool,
    /// Planning strategy for the zombies.
    #[arg(long, value_enum, env = "HORDESIM_PLANNER")]
    planner: Option<PlannerArg>,
    /// Layered TOML configuration files applied in order.
    #[arg(
        long = "config",
        value_name = "FILE",
        action = ArgAction::Append,
        env = "HORDESIM_CONFIG",
        value_delimiter = ';'
    )]
    config_layers: Vec<PathBuf>,
    /// How long to run before shutting down.
    #[arg(long, default_value_t = 30, value_name = "SECONDS")]
    duration_secs: u64,
    /// RNG seed for a deterministic session.
    #[arg(long, env = "HORDESIM_SEED")]
    seed: Option<u64>,
    /// Directory to drop periodic PNG frame snapshots into.
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,
    /// Milliseconds between snapshots.
    #[arg(long, default_value_t = 1_000, value_name = "MS")]
    snapshot_period_ms: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum PlannerArg {
    GridDijkstra,
    GridAstar,
    VgDijkstra,
    VgAstar,
    Rrt,
}

impl From<PlannerArg> for PlannerKind {
    fn from(arg: PlannerArg) -> Self {
        match arg {
            PlannerArg::GridDijkstra => PlannerKind::GridDijkstra,
            PlannerArg::GridAstar => PlannerKind::GridAstar,
            PlannerArg::VgDijkstra => PlannerKind::VgDijkstra,
            PlannerArg::VgAstar => PlannerKind::VgAstar,
            PlannerArg::Rrt => PlannerKind::Rrt,
        }
    }
}

fn compose_config(cli: &AppCli) -> Result<SimConfig> {
    let mut config = apply_config_layers(SimConfig::default(), &cli.config_layers)?;
    apply_env_overrides(&mut config);
    if let Some(planner) = cli.planner {
        config.planner = planner.into();
    }
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    Ok(config)
}

fn apply_config_layers(base: SimConfig, layers: &[PathBuf]) -> Result<SimConfig> {
    if layers.is_empty() {
        return Ok(base);
    }

    let mut merged = serde_json::to_value(&base).expect("serialize base config");
    for path in layers {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration layer {}", path.display()))?;
        let layer: JsonValue = toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config layer {}", path.display()))?;
        info!(layer = %path.display(), "Applying configuration layer");
        merge_layer(&mut merged, layer);
    }

    serde_json::from_value(merged).context("failed to deserialize merged configuration")
}

fn merge_layer(base: &mut JsonValue, layer: JsonValue) {
    match (base, layer) {
        (JsonValue::Object(base_map), JsonValue::Object(layer_map)) => {
            for (key, value) in layer_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_layer(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (target, value) => {
            *target = value;
        }
    }
}

fn apply_env_overrides(config: &mut SimConfig) {
    if let Ok(value) = env::var("HORDESIM_DRAW_PATHS") {
        match parse_bool(&value) {
            Some(flag) => config.draw_paths = flag,
            None => {
                warn!(value = %value, "Invalid HORDESIM_DRAW_PATHS value; expected true/false")
            }
        }
    }

    if let Ok(value) = env::var("HORDESIM_INITIAL_BURST") {
        match value.trim().parse() {
            Ok(count) => config.initial_zombie_burst = count,
            Err(_) => {
                warn!(value = %value, "Invalid HORDESIM_INITIAL_BURST value; expected an integer")
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
