//! Sampling-based RRT planner over the raw inflated raster.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::SmallRng;
use tracing::{debug, trace};

use hordesim_core::{MapData, PlannedPath, Position};

use crate::grid::{DiscretizedMap, Raycast};
use crate::planner::Planner;
use crate::search::salvage_path;

/// Maximum extension distance per tree growth step.
const INTERP_DISTANCE: f64 = 2.5;

/// Tree growth gives up after this long without reaching the goal.
const GROWTH_TIMEOUT: Duration = Duration::from_millis(1_500);

/// RRT salvage keeps even a straight two-point path alive.
const RRT_SALVAGE_MINIMUM: usize = 2;

struct TreeNode {
    position: Position,
    parent: Option<usize>,
}

/// Rapidly-exploring random tree planner.
///
/// Best-effort mode appends the furthest reachable point of a blocked
/// growth ray instead of discarding it, trading path quality for a better
/// chance of threading narrow corridors before the timeout.
pub struct RrtPlanner {
    grid: DiscretizedMap,
    best_effort: bool,
    salvage_threshold: f64,
    timeout: Duration,
    rng: SmallRng,
}

impl RrtPlanner {
    #[must_use]
    pub fn new(map: &MapData, best_effort: bool, salvage_threshold: f64, rng: SmallRng) -> Self {
        Self {
            // Ratio 1 keeps the tree working at pixel resolution.
            grid: DiscretizedMap::build(map, 1),
            best_effort,
            salvage_threshold,
            timeout: GROWTH_TIMEOUT,
            rng,
        }
    }

    /// Overrides the growth timeout, for tests that need a fast failure.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn ray(&self, start: Position, goal: Position) -> Raycast {
        self.grid.path_is_clear(start, goal, -1.0)
    }

    fn nearest(nodes: &[TreeNode], target: Position) -> usize {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (index, node) in nodes.iter().enumerate() {
            let distance = node.position.distance_to(target);
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }
        best
    }

    /// Grows the tree until the goal attaches or the timeout expires,
    /// returning the goal node's index.
    fn grow(&mut self, start: Position, goal: Position) -> Option<(Vec<TreeNode>, usize)> {
        let width = self.grid.width() as f64;
        let height = self.grid.height() as f64;
        let deadline = Instant::now() + self.timeout;

        let mut nodes = vec![TreeNode {
            position: start,
            parent: None,
        }];

        loop {
            if Instant::now() >= deadline {
                trace!(tree_size = nodes.len(), "Tree growth timed out");
                return None;
            }
            let sample = Position::new(
                self.rng.random_range(0.0..width),
                self.rng.random_range(0.0..height),
            );
            let nearest = Self::nearest(&nodes, sample);
            let anchor = nodes[nearest].position;

            let target = if anchor.distance_to(sample) < INTERP_DISTANCE {
                sample
            } else {
                let angle = anchor.angle_to(sample);
                anchor.translated(
                    INTERP_DISTANCE * angle.cos(),
                    INTERP_DISTANCE * angle.sin(),
                )
            };

            let ray = self.ray(anchor, target);
            let reachable = match ray.furthest {
                Some(furthest) if ray.clear || self.best_effort => furthest,
                _ => continue,
            };

            nodes.push(TreeNode {
                position: reachable,
                parent: Some(nearest),
            });
            let added = nodes.len() - 1;

            if self.ray(reachable, goal).clear {
                nodes.push(TreeNode {
                    position: goal,
                    parent: Some(added),
                });
                return Some((nodes, added + 1));
            }
        }
    }

    /// Walks from the goal back to the root, reconnecting each waypoint to
    /// the earliest ancestor it can see so the emitted polyline skips the
    /// tree's wander.
    fn shortcut(&self, nodes: &[TreeNode], goal_index: usize) -> Vec<Position> {
        let mut waypoints = Vec::new();
        let mut cursor = Some(goal_index);
        while let Some(index) = cursor {
            let tail = nodes[index].position;
            waypoints.push(tail);

            // The parent link is traversable by construction; any earlier
            // ancestor with a clear line supersedes it.
            let mut next = nodes[index].parent;
            if let Some(parent) = next {
                let mut scan = nodes[parent].parent;
                while let Some(ancestor) = scan {
                    if self.ray(nodes[ancestor].position, tail).clear {
                        next = Some(ancestor);
                    }
                    scan = nodes[ancestor].parent;
                }
            }
            cursor = next;
        }
        waypoints.reverse();
        waypoints
    }
}

impl Planner for RrtPlanner {
    fn generate_path(&mut self, start: Position, goal: Position) -> Option<PlannedPath> {
        if self.ray(start, goal).clear {
            let mut path = PlannedPath::from_waypoints(vec![start, goal]);
            path.record_endpoints(start, goal);
            return Some(path);
        }

        let (nodes, goal_index) = self.grow(start, goal)?;
        debug!(tree_size = nodes.len(), "Attached goal to tree");

        let waypoints = self.shortcut(&nodes, goal_index);
        let mut path = PlannedPath::from_waypoints(waypoints);
        path.record_endpoints(start, goal);
        Some(path)
    }

    fn salvage_path(
        &self,
        path: &mut PlannedPath,
        new_start: Position,
        new_goal: Position,
    ) -> bool {
        // A clear straight line regenerates in one raycast; salvaging it
        // would only preserve stale detours.
        if self.ray(new_start, new_goal).clear {
            return false;
        }
        salvage_path(
            path,
            new_start,
            new_goal,
            self.salvage_threshold,
            RRT_SALVAGE_MINIMUM,
        )
    }
}
