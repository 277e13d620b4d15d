//! Representation-agnostic best-first path search.
//!
//! Both the grid and the visibility graph expose the same traversal shape:
//! nodes with neighbors, non-negative edge costs, and a way back to world
//! coordinates. One engine runs over either medium; the heuristic decides
//! whether it behaves as Dijkstra or A*.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;

use ordered_float::OrderedFloat;
use tracing::trace;

use hordesim_core::{PlannedPath, Position};

/// A traversable representation of the environment.
///
/// `prepare` lifts world coordinates into node space and may mutate the
/// medium (the visibility graph inserts transient endpoint nodes); `close`
/// undoes whatever `prepare` did. Node positions come in two flavors:
/// `local_position` in the medium's own coordinates, commensurate with
/// [`SearchMedium::edge_cost`], and `position_of` in world pixels for the
/// emitted path.
pub trait SearchMedium {
    type Node: Clone + Eq + Hash;

    /// Whether the straight world-coordinate segment is traversable.
    fn path_is_clear(&self, start: Position, goal: Position) -> bool;

    /// Node location in medium coordinates.
    fn local_position(&self, node: &Self::Node) -> Position;

    /// Node location in world coordinates.
    fn position_of(&self, node: &Self::Node) -> Position;

    /// Every node currently available to the search.
    fn all_nodes(&self) -> Vec<Self::Node>;

    /// Lifts the endpoints into node space, mutating the medium if needed.
    /// `None` means the endpoints cannot be represented (e.g. out of
    /// bounds), which the search reports as "no path".
    fn prepare(&mut self, start: Position, goal: Position)
    -> Option<(Self::Node, Self::Node)>;

    fn neighbors(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Non-negative traversal cost between adjacent nodes, in medium
    /// coordinates.
    fn edge_cost(&self, from: &Self::Node, to: &Self::Node) -> f64;

    /// Undoes [`SearchMedium::prepare`].
    fn close(&mut self, start: &Self::Node, goal: &Self::Node);
}

/// Remaining-distance estimate. Zero makes the search plain Dijkstra;
/// Euclidean straight-line distance makes it A*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    Zero,
    Euclidean,
}

impl Heuristic {
    #[must_use]
    pub fn estimate(self, from: Position, goal: Position) -> f64 {
        match self {
            Heuristic::Zero => 0.0,
            Heuristic::Euclidean => from.distance_to(goal),
        }
    }
}

/// Frontier entry ordered by ascending priority; stale entries left behind
/// by a cost decrease are discarded when popped.
struct FrontierEntry<N> {
    priority: OrderedFloat<f64>,
    node: N,
}

impl<N> PartialEq for FrontierEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl<N> Eq for FrontierEntry<N> {}

impl<N> PartialOrd for FrontierEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for FrontierEntry<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, the search wants the minimum.
        other.priority.cmp(&self.priority)
    }
}

/// Searches the medium for a path from `start` to `goal`, both in world
/// coordinates. Returns `None` when the goal is unreachable.
///
/// A clear straight line short-circuits to a two-point path. Otherwise the
/// search relaxes nodes best-first by `distance + heuristic`, re-inserting
/// on every cost decrease so stale frontier entries never mask a better
/// route, and finally walks the source chain backwards to emit waypoints.
pub fn search<M: SearchMedium>(
    medium: &mut M,
    heuristic: Heuristic,
    start: Position,
    goal: Position,
) -> Option<PlannedPath> {
    if medium.path_is_clear(start, goal) {
        let mut path = PlannedPath::from_waypoints(vec![start, goal]);
        path.record_endpoints(start, goal);
        return Some(path);
    }

    let (start_node, goal_node) = medium.prepare(start, goal)?;
    let result = run_search(medium, heuristic, &start_node, &goal_node);
    medium.close(&start_node, &goal_node);
    result
}

fn run_search<M: SearchMedium>(
    medium: &M,
    heuristic: Heuristic,
    start_node: &M::Node,
    goal_node: &M::Node,
) -> Option<PlannedPath> {
    let nodes = medium.all_nodes();
    if nodes.is_empty() {
        return None;
    }

    let goal_local = medium.local_position(goal_node);
    let mut distances: HashMap<M::Node, f64> =
        nodes.iter().map(|node| (node.clone(), f64::INFINITY)).collect();
    let mut sources: HashMap<M::Node, M::Node> = HashMap::new();
    let mut visited: HashSet<M::Node> = HashSet::new();
    let mut frontier = BinaryHeap::new();

    distances.insert(start_node.clone(), 0.0);
    frontier.push(FrontierEntry {
        priority: OrderedFloat(heuristic.estimate(medium.local_position(start_node), goal_local)),
        node: start_node.clone(),
    });

    let mut reached = false;
    while let Some(FrontierEntry { node: current, .. }) = frontier.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if current == *goal_node {
            reached = true;
            break;
        }

        let current_distance = distances.get(&current).copied().unwrap_or(f64::INFINITY);
        for neighbor in medium.neighbors(&current) {
            if visited.contains(&neighbor) {
                continue;
            }
            let alternate = current_distance + medium.edge_cost(&current, &neighbor);
            let best = distances.get(&neighbor).copied().unwrap_or(f64::INFINITY);
            if alternate < best {
                distances.insert(neighbor.clone(), alternate);
                sources.insert(neighbor.clone(), current.clone());
                let priority =
                    alternate + heuristic.estimate(medium.local_position(&neighbor), goal_local);
                frontier.push(FrontierEntry {
                    priority: OrderedFloat(priority),
                    node: neighbor,
                });
            }
        }
    }

    if !reached {
        trace!(visited = visited.len(), "Search exhausted without a path");
        return None;
    }

    let mut waypoints = Vec::new();
    let mut cursor = Some(goal_node.clone());
    while let Some(node) = cursor {
        waypoints.push(medium.position_of(&node));
        cursor = sources.get(&node).cloned();
    }
    waypoints.reverse();

    let mut path = PlannedPath::from_waypoints(waypoints);
    path.record_endpoints(medium.position_of(start_node), medium.position_of(goal_node));
    Some(path)
}

/// Reuses an existing path when its endpoints have barely moved: both
/// original endpoints must lie within `threshold` of the new ones and the
/// path must still hold at least `minimum_points` waypoints. Only the final
/// waypoint is rewritten; refusal leaves the path untouched.
pub fn salvage_path(
    path: &mut PlannedPath,
    new_start: Position,
    new_goal: Position,
    threshold: f64,
    minimum_points: usize,
) -> bool {
    if path.len() < minimum_points {
        return false;
    }
    let (Some(original_start), Some(original_goal)) =
        (path.original_start(), path.original_goal())
    else {
        return false;
    };
    if original_start.distance_to(new_start) < threshold
        && original_goal.distance_to(new_goal) < threshold
    {
        path.replace_last(new_goal)
    } else {
        false
    }
}
