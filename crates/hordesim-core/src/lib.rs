//! Core types shared across the Hordesim workspace.
//!
//! This crate holds the world model for the survival arena: geometry
//! primitives, the obstacle map with its actor-inflated companion raster,
//! the actors themselves, planned waypoint paths, the wave container, and
//! the session that guards all mutable actor state behind a fair lock.
//! Path planning lives in `hordesim-planning`; this crate only defines the
//! data those planners consume and produce.

pub mod actor;
pub mod config;
pub mod geometry;
pub mod input;
pub mod map;
pub mod path;
pub mod session;
pub mod sync;
pub mod wave;

pub use actor::{Actor, Player, Rgb, Zombie};
pub use config::{ConfigError, PlannerKind, SimConfig};
pub use geometry::{POSITION_EPSILON, Position, Velocity};
pub use input::{Control, InputState};
pub use map::{ACTOR_RADIUS, MAP_HEIGHT, MAP_WIDTH, MapData, MapError, ObstacleRaster};
pub use path::PlannedPath;
pub use session::{
    ActorWorld, ListenerId, PointsChangeEvent, Session, SessionError, WaveChangeEvent,
};
pub use sync::{FairGuard, FairLock};
pub use wave::{MAX_ZOMBIES, Wave};
