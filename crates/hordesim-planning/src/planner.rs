//! Concrete planners over the grid and visibility-graph media.

use std::hash::{Hash, Hasher};

use tracing::debug;

use hordesim_core::{MapData, PlannedPath, Position};

use crate::graph::VisibilityGraph;
use crate::grid::DiscretizedMap;
use crate::search::{Heuristic, SearchMedium, salvage_path, search};

/// Salvage needs the untouched start, at least one interior waypoint, and
/// the goal, so graph-search paths shorter than three points regenerate.
const SEARCH_SALVAGE_MINIMUM: usize = 3;

/// A path planner for one actor class.
pub trait Planner: Send {
    /// Plans a path between two world positions, `None` when unreachable.
    fn generate_path(&mut self, start: Position, goal: Position) -> Option<PlannedPath>;

    /// Attempts to reuse `path` for slightly moved endpoints. On refusal the
    /// path is untouched and the caller regenerates.
    fn salvage_path(&self, path: &mut PlannedPath, new_start: Position, new_goal: Position)
    -> bool;
}

impl std::fmt::Debug for dyn Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Planner")
    }
}

/// Integer grid cell with a stable row-major hash (`y * width + x`), so
/// search bookkeeping hashes cells the same way across runs.
#[derive(Debug, Clone, Copy)]
pub struct LatticePoint {
    pub x: i64,
    pub y: i64,
    width: i64,
}

impl LatticePoint {
    fn new(x: i64, y: i64, width: i64) -> Self {
        Self { x, y, width }
    }
}

impl PartialEq for LatticePoint {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for LatticePoint {}

impl Hash for LatticePoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i64(self.y * self.width + self.x);
    }
}

/// King-move offsets of the 8-connected grid.
const KING_MOVES: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

struct GridMedium {
    grid: DiscretizedMap,
}

impl GridMedium {
    fn scale(&self) -> f64 {
        f64::from(self.grid.ratio())
    }

    fn cell(&self, x: i64, y: i64) -> LatticePoint {
        LatticePoint::new(x, y, self.grid.width() as i64)
    }
}

impl SearchMedium for GridMedium {
    type Node = LatticePoint;

    fn path_is_clear(&self, start: Position, goal: Position) -> bool {
        self.grid
            .path_is_clear(
                start.scaled(1.0 / self.scale()),
                goal.scaled(1.0 / self.scale()),
                -1.0,
            )
            .clear
    }

    fn local_position(&self, node: &LatticePoint) -> Position {
        Position::new(node.x as f64, node.y as f64)
    }

    fn position_of(&self, node: &LatticePoint) -> Position {
        self.local_position(node).scaled(self.scale())
    }

    fn all_nodes(&self) -> Vec<LatticePoint> {
        let mut nodes = Vec::with_capacity(self.grid.width() * self.grid.height());
        for y in 0..self.grid.height() as i64 {
            for x in 0..self.grid.width() as i64 {
                nodes.push(self.cell(x, y));
            }
        }
        nodes
    }

    fn prepare(&mut self, start: Position, goal: Position) -> Option<(LatticePoint, LatticePoint)> {
        let lift = |p: Position| {
            let x = (p.x / self.scale()).floor() as i64;
            let y = (p.y / self.scale()).floor() as i64;
            self.grid.in_bounds(x, y).then(|| self.cell(x, y))
        };
        Some((lift(start)?, lift(goal)?))
    }

    fn neighbors(&self, node: &LatticePoint) -> Vec<LatticePoint> {
        KING_MOVES
            .iter()
            .map(|(dx, dy)| (node.x + dx, node.y + dy))
            .filter(|&(x, y)| self.grid.open_at(x, y))
            .map(|(x, y)| self.cell(x, y))
            .collect()
    }

    fn edge_cost(&self, from: &LatticePoint, to: &LatticePoint) -> f64 {
        self.local_position(from).distance_to(self.local_position(to))
    }

    fn close(&mut self, _start: &LatticePoint, _goal: &LatticePoint) {}
}

/// Planner running the generic search over the discretized grid.
pub struct GridPlanner {
    medium: GridMedium,
    heuristic: Heuristic,
    salvage_threshold: f64,
}

impl GridPlanner {
    /// Grid search without a heuristic (uniform-cost Dijkstra).
    #[must_use]
    pub fn dijkstra(map: &MapData, ratio: u32, salvage_threshold: f64) -> Self {
        Self::with_heuristic(map, ratio, salvage_threshold, Heuristic::Zero)
    }

    /// Grid search with the straight-line heuristic (A*).
    #[must_use]
    pub fn astar(map: &MapData, ratio: u32, salvage_threshold: f64) -> Self {
        Self::with_heuristic(map, ratio, salvage_threshold, Heuristic::Euclidean)
    }

    fn with_heuristic(
        map: &MapData,
        ratio: u32,
        salvage_threshold: f64,
        heuristic: Heuristic,
    ) -> Self {
        let grid = DiscretizedMap::build(map, ratio);
        debug!(
            ratio,
            width = grid.width(),
            height = grid.height(),
            ?heuristic,
            "Built grid planner"
        );
        Self {
            medium: GridMedium { grid },
            heuristic,
            salvage_threshold,
        }
    }
}

impl Planner for GridPlanner {
    fn generate_path(&mut self, start: Position, goal: Position) -> Option<PlannedPath> {
        search(&mut self.medium, self.heuristic, start, goal)
    }

    fn salvage_path(
        &self,
        path: &mut PlannedPath,
        new_start: Position,
        new_goal: Position,
    ) -> bool {
        salvage_path(
            path,
            new_start,
            new_goal,
            self.salvage_threshold,
            SEARCH_SALVAGE_MINIMUM,
        )
    }
}

struct VgMedium {
    graph: VisibilityGraph,
}

impl VgMedium {
    fn scale(&self) -> f64 {
        f64::from(self.graph.grid().ratio())
    }
}

impl SearchMedium for VgMedium {
    type Node = usize;

    fn path_is_clear(&self, start: Position, goal: Position) -> bool {
        self.graph
            .grid()
            .path_is_clear(
                start.scaled(1.0 / self.scale()),
                goal.scaled(1.0 / self.scale()),
                -1.0,
            )
            .clear
    }

    fn local_position(&self, node: &usize) -> Position {
        self.graph.position(*node)
    }

    fn position_of(&self, node: &usize) -> Position {
        self.graph.position(*node).scaled(self.scale())
    }

    fn all_nodes(&self) -> Vec<usize> {
        (0..self.graph.node_count()).collect()
    }

    fn prepare(&mut self, start: Position, goal: Position) -> Option<(usize, usize)> {
        let scale = 1.0 / self.scale();
        let start_node = self.graph.push_node(start.scaled(scale));
        let goal_node = self.graph.push_node(goal.scaled(scale));
        self.graph.add_edges_for(start_node);
        self.graph.add_edges_for(goal_node);
        Some((start_node, goal_node))
    }

    fn neighbors(&self, node: &usize) -> Vec<usize> {
        self.graph
            .edges_of(*node)
            .iter()
            .map(|edge| edge.to)
            .collect()
    }

    fn edge_cost(&self, from: &usize, to: &usize) -> f64 {
        self.graph
            .edge_weight(*from, *to)
            .expect("visibility edge missing for a reported neighbor")
    }

    fn close(&mut self, _start: &usize, _goal: &usize) {
        self.graph.reset_transients();
    }
}

/// Planner running the generic search over the visibility graph.
pub struct VgPlanner {
    medium: VgMedium,
    heuristic: Heuristic,
    salvage_threshold: f64,
}

impl VgPlanner {
    #[must_use]
    pub fn dijkstra(
        map: &MapData,
        ratio: u32,
        cleanliness_threshold: f64,
        salvage_threshold: f64,
    ) -> Self {
        Self::with_heuristic(
            map,
            ratio,
            cleanliness_threshold,
            salvage_threshold,
            Heuristic::Zero,
        )
    }

    #[must_use]
    pub fn astar(
        map: &MapData,
        ratio: u32,
        cleanliness_threshold: f64,
        salvage_threshold: f64,
    ) -> Self {
        Self::with_heuristic(
            map,
            ratio,
            cleanliness_threshold,
            salvage_threshold,
            Heuristic::Euclidean,
        )
    }

    fn with_heuristic(
        map: &MapData,
        ratio: u32,
        cleanliness_threshold: f64,
        salvage_threshold: f64,
        heuristic: Heuristic,
    ) -> Self {
        let graph = VisibilityGraph::build(map, ratio, cleanliness_threshold);
        debug!(
            ratio,
            vertices = graph.permanent_count(),
            ?heuristic,
            "Built visibility-graph planner"
        );
        Self {
            medium: VgMedium { graph },
            heuristic,
            salvage_threshold,
        }
    }
}

impl Planner for VgPlanner {
    fn generate_path(&mut self, start: Position, goal: Position) -> Option<PlannedPath> {
        search(&mut self.medium, self.heuristic, start, goal)
    }

    fn salvage_path(
        &self,
        path: &mut PlannedPath,
        new_start: Position,
        new_goal: Position,
    ) -> bool {
        salvage_path(
            path,
            new_start,
            new_goal,
            self.salvage_threshold,
            SEARCH_SALVAGE_MINIMUM,
        )
    }
}
