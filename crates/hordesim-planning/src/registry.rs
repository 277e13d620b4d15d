//! Process-wide handle to the zombie planner, swappable at runtime.

use std::sync::{Arc, Mutex, RwLock};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use thiserror::Error;
use tracing::info;

use hordesim_core::{MapData, PlannerKind, SimConfig};

use crate::planner::{GridPlanner, Planner, VgPlanner};
use crate::rrt::RrtPlanner;

/// Errors raised when constructing planners.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanningError {
    #[error("invalid planner parameters: {0}")]
    InvalidSpec(&'static str),
}

/// Everything needed to instantiate a planner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSpec {
    pub kind: PlannerKind,
    pub discretization_ratio: u32,
    pub cleanliness_threshold: f64,
    pub salvage_threshold: f64,
    pub rrt_best_effort: bool,
    pub rng_seed: Option<u64>,
}

impl PlannerSpec {
    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            kind: config.planner,
            discretization_ratio: config.discretization_ratio,
            cleanliness_threshold: config.cleanliness_threshold,
            salvage_threshold: config.salvage_threshold,
            rrt_best_effort: config.rrt_best_effort,
            rng_seed: config.rng_seed,
        }
    }

    /// Builds the planner this spec describes. Invalid parameters are the
    /// construction-time failure mode; planning failures stay `None` at
    /// query time.
    pub fn build(&self, map: &MapData) -> Result<Box<dyn Planner>, PlanningError> {
        if self.discretization_ratio == 0 {
            return Err(PlanningError::InvalidSpec(
                "discretization_ratio must be at least 1",
            ));
        }
        if self.salvage_threshold < 0.0 {
            return Err(PlanningError::InvalidSpec(
                "salvage_threshold must not be negative",
            ));
        }
        if self.cleanliness_threshold < 0.0 {
            return Err(PlanningError::InvalidSpec(
                "cleanliness_threshold must not be negative",
            ));
        }

        let planner: Box<dyn Planner> = match self.kind {
            PlannerKind::GridDijkstra => Box::new(GridPlanner::dijkstra(
                map,
                self.discretization_ratio,
                self.salvage_threshold,
            )),
            PlannerKind::GridAstar => Box::new(GridPlanner::astar(
                map,
                self.discretization_ratio,
                self.salvage_threshold,
            )),
            PlannerKind::VgDijkstra => Box::new(VgPlanner::dijkstra(
                map,
                self.discretization_ratio,
                self.cleanliness_threshold,
                self.salvage_threshold,
            )),
            PlannerKind::VgAstar => Box::new(VgPlanner::astar(
                map,
                self.discretization_ratio,
                self.cleanliness_threshold,
                self.salvage_threshold,
            )),
            PlannerKind::Rrt => {
                let rng = match self.rng_seed {
                    Some(seed) => SmallRng::seed_from_u64(seed),
                    None => SmallRng::from_rng(&mut rand::rng()),
                };
                Box::new(RrtPlanner::new(
                    map,
                    self.rrt_best_effort,
                    self.salvage_threshold,
                    rng,
                ))
            }
        };
        Ok(planner)
    }
}

/// Shared, lockable handle to one planner instance.
pub type SharedPlanner = Arc<Mutex<Box<dyn Planner>>>;

/// Holds the planner used for zombie paths.
///
/// Compute passes must call [`PlannerRegistry::current`] exactly once and
/// keep using that handle: a concurrent [`PlannerRegistry::renew`] then
/// swaps the registry without splitting a pass across two planners.
pub struct PlannerRegistry {
    current: RwLock<SharedPlanner>,
    spec: RwLock<PlannerSpec>,
}

impl PlannerRegistry {
    pub fn new(spec: PlannerSpec, map: &MapData) -> Result<Self, PlanningError> {
        let planner = spec.build(map)?;
        Ok(Self {
            current: RwLock::new(Arc::new(Mutex::new(planner))),
            spec: RwLock::new(spec),
        })
    }

    /// The active planner handle.
    #[must_use]
    pub fn current(&self) -> SharedPlanner {
        Arc::clone(&self.current.read().expect("planner handle poisoned"))
    }

    /// The spec the active planner was built from.
    #[must_use]
    pub fn spec(&self) -> PlannerSpec {
        self.spec.read().expect("planner spec poisoned").clone()
    }

    /// Builds a fresh planner from `spec` and atomically replaces the
    /// handle. On failure the previous planner stays active.
    pub fn renew(&self, spec: PlannerSpec, map: &MapData) -> Result<(), PlanningError> {
        let planner = spec.build(map)?;
        info!(kind = spec.kind.as_str(), "Renewing zombie planner");
        *self.current.write().expect("planner handle poisoned") = Arc::new(Mutex::new(planner));
        *self.spec.write().expect("planner spec poisoned") = spec;
        Ok(())
    }
}

impl std::fmt::Debug for PlannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerRegistry")
            .field("spec", &self.spec())
            .finish_non_exhaustive()
    }
}
