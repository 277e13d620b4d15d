//! Visibility graph over the discretized obstacle grid.
//!
//! Construction scans the grid for obstacle vertices, classifying each
//! occupied cell by the shape of its 8-neighborhood, merges redundant
//! detections, and connects every mutually visible pair of vertices with a
//! symmetric weighted edge. Query endpoints enter the graph as transient
//! nodes and are dropped again once the search finishes.

use std::collections::HashMap;

use tracing::debug;

use hordesim_core::{MapData, Position};

use crate::grid::DiscretizedMap;

/// Ring offsets of a cell's 8-neighborhood, scanned in reading order:
///
/// ```text
/// 0 | 1 | 2
/// 3 | P | 4
/// 5 | 6 | 7
/// ```
const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Fraction of the discretization ratio excluded around raycast endpoints
/// when wiring edges, so a vertex sitting on an obstacle corner can still
/// reach away from it.
const EDGE_EXCLUSION_RATIO: f64 = 0.75;

/// One directed half of a bidirectional visibility edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VgEdge {
    pub to: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellStatus {
    OutOfBounds,
    Open,
    Occupied,
    Node,
}

/// Bookkeeping for the vertex scan: detected cells in discovery order with
/// a constant-time membership probe.
#[derive(Default)]
struct FoundCells {
    list: Vec<(i64, i64)>,
    set: std::collections::HashSet<(i64, i64)>,
}

impl FoundCells {
    fn contains(&self, cell: (i64, i64)) -> bool {
        self.set.contains(&cell)
    }

    fn push(&mut self, cell: (i64, i64)) {
        if self.set.insert(cell) {
            self.list.push(cell);
        }
    }
}

/// Graph of mutually visible obstacle vertices.
///
/// Nodes indexed `0..permanent` come from construction; anything above is a
/// transient query endpoint awaiting [`VisibilityGraph::reset_transients`].
#[derive(Debug, Clone)]
pub struct VisibilityGraph {
    grid: DiscretizedMap,
    positions: Vec<Position>,
    edges: Vec<Vec<VgEdge>>,
    permanent: usize,
}

impl VisibilityGraph {
    /// Builds the graph for a map at the given discretization ratio.
    /// A positive `cleanliness_threshold` (in grid cells) merges clusters of
    /// vertices closer together than the threshold.
    #[must_use]
    pub fn build(map: &MapData, ratio: u32, cleanliness_threshold: f64) -> Self {
        let grid = DiscretizedMap::build(map, ratio);

        let mut found = FoundCells::default();
        for x in 0..grid.width() as i64 {
            for y in 0..grid.height() as i64 {
                if let Some(vertex) = find_vertex(&grid, x, y, &found) {
                    found.push(vertex);
                }
            }
        }

        let mut vertices = found.list;
        let detected = vertices.len();
        if cleanliness_threshold > 0.0 {
            dedupe_vertices(&mut vertices, cleanliness_threshold);
        }
        debug!(
            ratio,
            detected,
            kept = vertices.len(),
            "Built visibility graph vertices"
        );

        let positions: Vec<Position> = vertices
            .iter()
            .map(|&(x, y)| Position::new(x as f64, y as f64))
            .collect();
        let permanent = positions.len();
        let mut graph = Self {
            grid,
            edges: vec![Vec::new(); permanent],
            positions,
            permanent,
        };
        for id in 0..permanent {
            graph.add_edges_for(id);
        }
        graph
    }

    #[must_use]
    pub fn grid(&self) -> &DiscretizedMap {
        &self.grid
    }

    /// All nodes currently present, transients included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// Nodes created at construction time.
    #[must_use]
    pub fn permanent_count(&self) -> usize {
        self.permanent
    }

    /// Node position in grid coordinates.
    #[must_use]
    pub fn position(&self, id: usize) -> Position {
        self.positions[id]
    }

    #[must_use]
    pub fn edges_of(&self, id: usize) -> &[VgEdge] {
        &self.edges[id]
    }

    /// Weight of the edge `from -> to`, if the nodes are connected.
    #[must_use]
    pub fn edge_weight(&self, from: usize, to: usize) -> Option<f64> {
        self.edges[from]
            .iter()
            .find(|edge| edge.to == to)
            .map(|edge| edge.weight)
    }

    /// Adds a transient node (a query endpoint) without any edges yet.
    pub fn push_node(&mut self, position: Position) -> usize {
        self.positions.push(position);
        self.edges.push(Vec::new());
        self.positions.len() - 1
    }

    /// Connects `id` to every permanent vertex it can see, both ways.
    /// Raycasts exclude the immediate endpoint surroundings so a node
    /// standing against an obstacle still reaches away from it.
    pub fn add_edges_for(&mut self, id: usize) {
        let exclusion = EDGE_EXCLUSION_RATIO * f64::from(self.grid.ratio());
        let existing: Vec<usize> = self.edges[id].iter().map(|edge| edge.to).collect();
        for other in 0..self.permanent {
            if other == id || existing.contains(&other) {
                continue;
            }
            if self
                .grid
                .path_is_clear(self.positions[id], self.positions[other], exclusion)
                .clear
            {
                let weight = self.positions[id].distance_to(self.positions[other]);
                self.edges[id].push(VgEdge { to: other, weight });
                self.edges[other].push(VgEdge { to: id, weight });
            }
        }
    }

    /// Drops every transient node and the edges that reached them.
    pub fn reset_transients(&mut self) {
        let keep = self.permanent;
        self.positions.truncate(keep);
        self.edges.truncate(keep);
        for list in &mut self.edges {
            list.retain(|edge| edge.to < keep);
        }
    }
}

fn status_of(grid: &DiscretizedMap, x: i64, y: i64, found: &FoundCells) -> CellStatus {
    if !grid.in_bounds(x, y) {
        CellStatus::OutOfBounds
    } else if grid.open_at(x, y) {
        CellStatus::Open
    } else if found.contains((x, y)) {
        CellStatus::Node
    } else {
        CellStatus::Occupied
    }
}

/// Neighborhood slots that are not open (obstacle, map edge, or an already
/// detected vertex), in ring order.
fn occupied_neighbors(
    grid: &DiscretizedMap,
    x: i64,
    y: i64,
    found: &FoundCells,
) -> Vec<usize> {
    NEIGHBOR_OFFSETS
        .iter()
        .enumerate()
        .filter(|&(_, &(dx, dy))| status_of(grid, x + dx, y + dy, found) != CellStatus::Open)
        .map(|(index, _)| index)
        .collect()
}

/// Classifies the cell at `(x, y)`, returning a newly detected vertex cell.
///
/// Occupancy-count signatures of the 8-neighborhood separate corners from
/// straight runs; five occupied neighbors may mean the cell belongs to a
/// diagonal surface, which gets a single vertex at the run's midpoint.
fn find_vertex(
    grid: &DiscretizedMap,
    x: i64,
    y: i64,
    found: &FoundCells,
) -> Option<(i64, i64)> {
    if status_of(grid, x, y, found) != CellStatus::Occupied {
        return None;
    }

    let indices = occupied_neighbors(grid, x, y, found);
    match indices.len() {
        // An isolated speck is always a vertex.
        0 | 1 => Some((x, y)),
        // Two neighbors form a vertex unless they run straight through the
        // cell; the four straight-through pairs each sum to seven.
        2 => (indices[0] + indices[1] != 7).then_some((x, y)),
        // Three neighbors make a right-angle corner when their sorted
        // differences are one and two, in either order.
        3 => {
            let d1 = indices[1] - indices[0];
            let d2 = indices[2] - indices[1];
            ((d1 == 1 && d2 == 2) || (d1 == 2 && d2 == 1)).then_some((x, y))
        }
        // Four neighbors make an L around the cell for these signatures.
        4 => {
            let diffs = [
                indices[1] - indices[0],
                indices[2] - indices[1],
                indices[3] - indices[2],
            ];
            matches!(
                diffs,
                [1, 1, 1] | [1, 1, 2] | [1, 2, 2] | [2, 1, 1] | [2, 2, 1] | [1, 2, 3] | [3, 2, 1]
            )
            .then_some((x, y))
        }
        5 => diagonal_run_vertex(grid, x, y, found, &indices),
        _ => None,
    }
}

/// A cell with five occupied neighbors may sit on a diagonal surface. The
/// three open slots name the diagonal's direction; the run is walked both
/// ways and represented by one vertex at its midpoint. Runs already holding
/// a vertex are skipped.
fn diagonal_run_vertex(
    grid: &DiscretizedMap,
    x: i64,
    y: i64,
    found: &FoundCells,
    indices: &[usize],
) -> Option<(i64, i64)> {
    let open: Vec<usize> = (0..8).filter(|i| !indices.contains(i)).collect();
    let dx = if open == [0, 1, 3] || open == [4, 6, 7] {
        -1
    } else if open == [1, 2, 4] || open == [3, 5, 6] {
        1
    } else {
        return None;
    };
    let dy = 1;

    let walk = |direction: i64| -> Option<i64> {
        let mut steps = 0;
        let (mut nx, mut ny) = (x, y);
        loop {
            nx += dx * direction;
            ny += dy * direction;
            if status_of(grid, nx, ny, found) == CellStatus::Node {
                // This diagonal already has its vertex.
                return None;
            }
            if occupied_neighbors(grid, nx, ny, found).len() != 5 {
                return Some(steps);
            }
            steps += 1;
        }
    };

    let backward = walk(-1)?;
    let forward = walk(1)?;

    let min_x = x - backward * dx;
    let min_y = y - backward * dy;
    let max_x = x + forward * dx;
    let max_y = y + forward * dy;
    Some((min_x + (max_x - min_x) / 2, min_y + (max_y - min_y) / 2))
}

/// Greedy redundancy removal: repeatedly keep the vertex with the most
/// neighbors inside the threshold and delete those neighbors, until every
/// surviving neighborhood is empty.
fn dedupe_vertices(vertices: &mut Vec<(i64, i64)>, threshold: f64) {
    let distance = |a: (i64, i64), b: (i64, i64)| -> f64 {
        (((a.0 - b.0) * (a.0 - b.0) + (a.1 - b.1) * (a.1 - b.1)) as f64).sqrt()
    };

    let mut neighborhoods: HashMap<(i64, i64), Vec<(i64, i64)>> = vertices
        .iter()
        .map(|&v| {
            let close = vertices
                .iter()
                .copied()
                .filter(|&o| o != v && distance(v, o) <= threshold)
                .collect();
            (v, close)
        })
        .collect();

    loop {
        let mut stale = Vec::new();
        let mut best: Option<((i64, i64), usize)> = None;
        // Deterministic scan in current discovery order.
        for &vertex in vertices.iter() {
            let Some(neighborhood) = neighborhoods.get(&vertex) else {
                continue;
            };
            if neighborhood.is_empty() {
                stale.push(vertex);
            } else if best.is_none_or(|(_, size)| neighborhood.len() > size) {
                best = Some((vertex, neighborhood.len()));
            }
        }

        let Some((winner, _)) = best else {
            break;
        };
        let losers = neighborhoods
            .get_mut(&winner)
            .map(std::mem::take)
            .unwrap_or_default();
        vertices.retain(|v| !losers.contains(v));
        for vertex in stale {
            neighborhoods.remove(&vertex);
        }
        // Entries for deleted vertices fall out on later passes via the
        // vertex-list scan; their map entries are unreachable already.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hordesim_core::{MAP_HEIGHT, MAP_WIDTH, ObstacleRaster};

    fn map_with_rect(x0: i64, x1: i64, y0: i64, y1: i64) -> MapData {
        let mut raster = ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT);
        for y in y0..=y1 {
            for x in x0..=x1 {
                raster.block(x, y);
            }
        }
        MapData::from_rasters(
            raster,
            Position::new(10.0, 10.0),
            vec![Position::new(20.0, 20.0)],
            Vec::new(),
        )
        .expect("map")
    }

    fn blank_map() -> MapData {
        MapData::from_rasters(
            ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT),
            Position::new(10.0, 10.0),
            vec![Position::new(20.0, 20.0)],
            Vec::new(),
        )
        .expect("map")
    }

    /// A one-pixel wall hanging from the top edge; inflation turns it into
    /// a 13-pixel band whose lower cap detects a small vertex cluster.
    fn thin_wall_map() -> MapData {
        map_with_rect(300, 300, 0, 300)
    }

    #[test]
    fn blank_map_has_no_vertices() {
        let graph = VisibilityGraph::build(&blank_map(), 3, 10.0);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.permanent_count(), 0);
    }

    #[test]
    fn corner_cells_become_vertices() {
        // The inflated square covers cells 38..=62 on both axes; exactly
        // its four corner cells carry the right-angle signature.
        let graph = VisibilityGraph::build(&map_with_rect(120, 180, 120, 180), 3, 0.0);
        assert_eq!(graph.node_count(), 4);
        let mut corners: Vec<(i64, i64)> = (0..graph.node_count())
            .map(|id| {
                let p = graph.position(id);
                (p.x as i64, p.y as i64)
            })
            .collect();
        corners.sort_unstable();
        assert_eq!(corners, vec![(38, 38), (38, 62), (62, 38), (62, 62)]);
    }

    #[test]
    fn edges_are_symmetric_without_self_loops() {
        let graph = VisibilityGraph::build(&thin_wall_map(), 3, 2.0);
        let edge_total: usize = (0..graph.node_count())
            .map(|id| graph.edges_of(id).len())
            .sum();
        assert!(edge_total > 0, "thin wall cap produced no edges");
        for id in 0..graph.node_count() {
            for edge in graph.edges_of(id) {
                assert_ne!(edge.to, id, "self loop at node {id}");
                let inverse = graph
                    .edge_weight(edge.to, id)
                    .expect("inverse edge present");
                assert!((inverse - edge.weight).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn every_edge_was_clear_at_insertion() {
        let graph = VisibilityGraph::build(&thin_wall_map(), 3, 2.0);
        let exclusion = 0.75 * f64::from(graph.grid().ratio());
        for id in 0..graph.node_count() {
            for edge in graph.edges_of(id) {
                let ray = graph.grid().path_is_clear(
                    graph.position(id),
                    graph.position(edge.to),
                    exclusion,
                );
                assert!(ray.clear, "edge {id} -> {} is not clear", edge.to);
            }
        }
    }

    #[test]
    fn cleanliness_merges_clustered_vertices() {
        let loose = VisibilityGraph::build(&map_with_rect(290, 310, 0, 300), 3, 0.0);
        let clean = VisibilityGraph::build(&map_with_rect(290, 310, 0, 300), 3, 10.0);
        assert!(clean.node_count() > 0);
        assert!(clean.node_count() < loose.node_count());
    }

    #[test]
    fn thin_wall_cap_keeps_one_vertex_per_side() {
        // Routes around a thin wall pivot on its lower cap: after cleanup
        // one vertex survives on each side of the wall column, and the pair
        // stays mutually visible under the edge-construction exclusion.
        let graph = VisibilityGraph::build(&thin_wall_map(), 3, 2.0);
        assert_eq!(graph.node_count(), 2);

        let wall_column = 100.0; // pixel x = 300 at ratio 3
        let left: Vec<usize> = (0..graph.node_count())
            .filter(|&id| graph.position(id).x < wall_column)
            .collect();
        let right: Vec<usize> = (0..graph.node_count())
            .filter(|&id| graph.position(id).x >= wall_column)
            .collect();
        assert_eq!(left.len(), 1, "no vertex left of the wall");
        assert_eq!(right.len(), 1, "no vertex right of the wall");
        assert!(
            graph.edge_weight(left[0], right[0]).is_some(),
            "no edge across the wall cap"
        );
    }

    #[test]
    fn diagonal_surfaces_collapse_to_run_midpoints() {
        // A thick diagonal band across the arena. Its slanted edges are
        // long runs of cells with five occupied neighbors each; every such
        // run must be represented by a single midpoint vertex instead of a
        // vertex per cell.
        let mut raster = ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT);
        for y in 0..i64::from(MAP_HEIGHT) {
            for x in (y + 80)..(y + 140) {
                raster.block(x, y);
            }
        }
        let map = MapData::from_rasters(
            raster,
            Position::new(10.0, 300.0),
            vec![Position::new(20.0, 350.0)],
            Vec::new(),
        )
        .expect("map");

        let graph = VisibilityGraph::build(&map, 3, 0.0);
        assert!(graph.node_count() > 0, "diagonal edges produced no vertices");
        assert!(
            graph.node_count() <= 12,
            "diagonal runs did not collapse: {} vertices",
            graph.node_count()
        );
    }

    #[test]
    fn transient_nodes_come_and_go() {
        let mut graph = VisibilityGraph::build(&thin_wall_map(), 3, 2.0);
        let permanent = graph.permanent_count();
        let edge_counts: Vec<usize> = (0..permanent).map(|id| graph.edges_of(id).len()).collect();

        let start = graph.push_node(Position::new(33.0, 66.0));
        let goal = graph.push_node(Position::new(166.0, 66.0));
        graph.add_edges_for(start);
        graph.add_edges_for(goal);
        assert_eq!(graph.node_count(), permanent + 2);
        assert!(!graph.edges_of(start).is_empty(), "start connects to nothing");
        assert!(!graph.edges_of(goal).is_empty(), "goal connects to nothing");

        graph.reset_transients();
        assert_eq!(graph.node_count(), permanent);
        for id in 0..permanent {
            assert_eq!(graph.edges_of(id).len(), edge_counts[id]);
            assert!(graph.edges_of(id).iter().all(|edge| edge.to < permanent));
        }
    }
}
