//! Simulation configuration.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Which planning strategy drives the zombies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PlannerKind {
    GridDijkstra,
    #[default]
    GridAstar,
    VgDijkstra,
    VgAstar,
    Rrt,
}

impl PlannerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GridDijkstra => "grid-dijkstra",
            Self::GridAstar => "grid-astar",
            Self::VgDijkstra => "vg-dijkstra",
            Self::VgAstar => "vg-astar",
            Self::Rrt => "rrt",
        }
    }
}

/// Tunables for a session and its two tickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Physics/render tick rate.
    pub frames_per_second: u32,
    /// Planner tick budget, in milliseconds.
    pub planner_period_ms: u64,
    /// Cell edge length of the planning grid, in inflated-map pixels.
    pub discretization_ratio: u32,
    /// Visibility-graph vertex dedup radius in grid cells; zero disables.
    pub cleanliness_threshold: f64,
    /// Endpoint drift below which an existing path is reused.
    pub salvage_threshold: f64,
    /// Strategy used for zombie paths.
    pub planner: PlannerKind,
    /// Whether RRT may extend through partially blocked rays.
    pub rrt_best_effort: bool,
    /// Zombies spawned up-front when a wave opens.
    pub initial_zombie_burst: u32,
    /// Point balance the player starts with.
    pub initial_points: u32,
    /// Seed for deterministic runs; absent means seeded from the OS.
    pub rng_seed: Option<u64>,
    /// Draw the zombies' planned paths into rendered frames.
    pub draw_paths: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 40,
            planner_period_ms: 100,
            discretization_ratio: 3,
            cleanliness_threshold: 10.0,
            salvage_threshold: 5.0,
            planner: PlannerKind::default(),
            rrt_best_effort: true,
            initial_zombie_burst: 12,
            initial_points: 0,
            rng_seed: None,
            draw_paths: true,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_per_second == 0 {
            return Err(ConfigError::Invalid("frames_per_second must be positive"));
        }
        if self.planner_period_ms == 0 {
            return Err(ConfigError::Invalid("planner_period_ms must be positive"));
        }
        if self.discretization_ratio == 0 {
            return Err(ConfigError::Invalid(
                "discretization_ratio must be at least 1",
            ));
        }
        if self.salvage_threshold < 0.0 {
            return Err(ConfigError::Invalid("salvage_threshold must not be negative"));
        }
        if self.cleanliness_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "cleanliness_threshold must not be negative",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(1_000 / u64::from(self.frames_per_second))
    }

    #[must_use]
    pub fn planner_period(&self) -> Duration {
        Duration::from_millis(self.planner_period_ms)
    }

    /// RNG honoring the configured seed, freshly seeded otherwise.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = SimConfig::default();
        config.validate().expect("default config");
        assert_eq!(config.frame_period(), Duration::from_millis(25));
        assert_eq!(config.planner_period(), Duration::from_millis(100));
    }

    #[test]
    fn zero_rates_are_rejected() {
        let mut config = SimConfig {
            frames_per_second: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());

        config.frames_per_second = 40;
        config.discretization_ratio = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        use rand::Rng;
        let config = SimConfig {
            rng_seed: Some(42),
            ..SimConfig::default()
        };
        let a: u64 = config.seeded_rng().random();
        let b: u64 = config.seeded_rng().random();
        assert_eq!(a, b);
    }

    #[test]
    fn planner_kind_round_trips_through_serde() {
        let text = "planner = \"vg-astar\"\n";
        let config: SimConfig = toml::from_str(text).expect("parse");
        assert_eq!(config.planner, PlannerKind::VgAstar);
        assert_eq!(config.planner.as_str(), "vg-astar");
    }
}
