//! Shared application plumbing for the Hordesim shell.

use std::sync::Arc;

use hordesim_core::{InputState, Session};
use hordesim_planning::PlannerRegistry;

pub mod demo;
pub mod hud;
pub mod runtime;

pub use runtime::SimulationRuntime;

pub type SharedSession = Arc<Session>;
pub type SharedInput = Arc<InputState>;
pub type SharedRegistry = Arc<PlannerRegistry>;
