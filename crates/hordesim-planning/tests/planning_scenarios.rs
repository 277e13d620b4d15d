//! End-to-end planning scenarios over synthetic maps.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::SmallRng;

use hordesim_core::{MAP_HEIGHT, MAP_WIDTH, MapData, ObstacleRaster, PlannedPath, Position};
use hordesim_planning::{DiscretizedMap, GridPlanner, Planner, RrtPlanner, VgPlanner};

fn map_from_rects(rects: &[(i64, i64, i64, i64)]) -> MapData {
    let mut raster = ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT);
    for &(x0, x1, y0, y1) in rects {
        for y in y0..=y1 {
            for x in x0..=x1 {
                raster.block(x, y);
            }
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
    map_from_rects(&[])
}

/// A wall hanging from the top edge with a gap along the bottom.
fn single_wall_map() -> MapData {
    map_from_rects(&[(290, 310, 0, 300)])
}

/// A one-pixel wall hanging from the top edge. Inflation widens it to a
/// 13-pixel band, thin enough that the vertices on its lower cap stay
/// mutually visible under the graph's endpoint exclusion.
fn thin_wall_map() -> MapData {
    map_from_rects(&[(300, 300, 0, 300)])
}

fn total_length(path: &PlannedPath) -> f64 {
    path.remaining()
        .windows(2)
        .map(|pair| pair[0].distance_to(pair[1]))
        .sum()
}

fn assert_segments_clear(map: &MapData, path: &PlannedPath) {
    let pixels = DiscretizedMap::build(map, 1);
    for pair in path.remaining().windows(2) {
        assert!(
            pixels.path_is_clear(pair[0], pair[1], -1.0).clear,
            "segment {:?} -> {:?} crosses an obstacle",
            pair[0],
            pair[1]
        );
    }
}

/// Line-of-sight as the visibility graph itself judges it: waypoints land
/// on obstacle corner cells, so each segment is checked on the planning
/// grid with the same endpoint exclusion that edge insertion used.
fn assert_segments_clear_in_graph(map: &MapData, path: &PlannedPath, ratio: u32) {
    let grid = DiscretizedMap::build(map, ratio);
    let exclusion = 0.75 * f64::from(ratio);
    for pair in path.remaining().windows(2) {
        assert!(
            grid.path_is_clear_in_original(pair[0], pair[1], exclusion).clear,
            "segment {:?} -> {:?} has no line of sight",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn straight_line_on_a_blank_map_is_two_points() {
    let map = blank_map();
    let mut planner = GridPlanner::astar(&map, 3, 5.0);

    let start = Position::new(10.0, 10.0);
    let goal = Position::new(590.0, 390.0);
    let before = Instant::now();
    let path = planner.generate_path(start, goal).expect("path");
    let elapsed = before.elapsed();

    assert_eq!(path.remaining(), &[start, goal]);
    assert_eq!(path.original_start(), Some(start));
    assert_eq!(path.original_goal(), Some(goal));
    assert!(
        elapsed < Duration::from_millis(100),
        "straight-line shortcut took {elapsed:?}"
    );
}

#[test]
fn visibility_graph_routes_around_a_single_wall() {
    let map = thin_wall_map();
    let mut planner = VgPlanner::astar(&map, 3, 2.0, 5.0);

    let start = Position::new(100.0, 200.0);
    let goal = Position::new(500.0, 200.0);
    let path = planner.generate_path(start, goal).expect("path");

    let points = path.remaining().len();
    assert!(
        (3..=4).contains(&points),
        "expected a 3-4 point detour, got {points}: {path:?}"
    );
    // Endpoints ride through the grid scaling, so compare within epsilon.
    assert!(path.first().expect("first waypoint").near(start));
    assert!(path.last().expect("last waypoint").near(goal));
    assert_segments_clear_in_graph(&map, &path, 3);

    // The detour should hug the wall's lower cap: compare against the
    // corridor pinched between the inflated wall bottom and the map edge.
    let pinch_left = Position::new(294.0, 307.0);
    let pinch_right = Position::new(306.0, 307.0);
    let envelope = start.distance_to(pinch_left)
        + pinch_left.distance_to(pinch_right)
        + pinch_right.distance_to(goal);
    let length = total_length(&path);
    assert!(length >= start.distance_to(goal), "shorter than straight line");
    assert!(
        length <= 1.2 * envelope,
        "path length {length:.1} exceeds 1.2 x envelope {envelope:.1}"
    );
}

#[test]
fn grid_planner_detours_through_open_cells_only() {
    let map = single_wall_map();
    let mut planner = GridPlanner::astar(&map, 3, 5.0);

    let start = Position::new(100.0, 200.0);
    let goal = Position::new(500.0, 200.0);
    let path = planner.generate_path(start, goal).expect("path");

    assert!(path.remaining().len() >= 3);
    // Endpoints land on the enclosing cells, one discretization step at
    // most from the requested points.
    let first = path.first().expect("first");
    let last = path.last().expect("last");
    assert!(first.distance_to(start) < 2.0 * 3.0_f64.sqrt() * 3.0);
    assert!(last.distance_to(goal) < 2.0 * 3.0_f64.sqrt() * 3.0);

    for &waypoint in path.remaining() {
        assert!(
            map.position_is_valid(waypoint),
            "waypoint {waypoint:?} is not traversable"
        );
    }
    assert!(total_length(&path) >= first.distance_to(last));
}

#[test]
fn full_width_wall_is_unreachable() {
    let map = map_from_rects(&[(0, 599, 195, 205)]);
    let start = Position::new(100.0, 100.0);
    let goal = Position::new(500.0, 300.0);

    let mut grid = GridPlanner::astar(&map, 3, 5.0);
    assert!(grid.generate_path(start, goal).is_none());

    let mut vg = VgPlanner::astar(&map, 3, 10.0, 5.0);
    assert!(vg.generate_path(start, goal).is_none());
}

#[test]
fn salvage_rewrites_only_the_final_waypoint() {
    let map = thin_wall_map();
    let mut planner = VgPlanner::astar(&map, 3, 2.0, 5.0);

    let start = Position::new(100.0, 200.0);
    let goal = Position::new(500.0, 200.0);
    let mut path = planner.generate_path(start, goal).expect("path");
    let before: Vec<Position> = path.remaining().to_vec();

    let new_start = Position::new(101.0, 201.0);
    let new_goal = Position::new(499.0, 199.0);
    assert!(planner.salvage_path(&mut path, new_start, new_goal));

    let after = path.remaining();
    assert_eq!(after.last(), Some(&new_goal));
    assert_eq!(&after[..after.len() - 1], &before[..before.len() - 1]);

    // A fresh drift beyond the threshold refuses and leaves the path alone.
    assert!(!planner.salvage_path(
        &mut path,
        Position::new(120.0, 220.0),
        new_goal
    ));
    assert_eq!(path.remaining().last(), Some(&new_goal));
}

#[test]
fn two_point_paths_are_never_salvaged_by_graph_planners() {
    let map = blank_map();
    let planner = GridPlanner::astar(&map, 3, 5.0);

    let start = Position::new(10.0, 10.0);
    let goal = Position::new(100.0, 100.0);
    let mut path = PlannedPath::from_waypoints(vec![start, goal]);
    path.record_endpoints(start, goal);
    assert!(!planner.salvage_path(&mut path, start, goal));
}

#[test]
fn zero_heuristic_grid_search_matches_dijkstra() {
    let map = single_wall_map();
    let start = Position::new(100.0, 200.0);
    let goal = Position::new(500.0, 200.0);

    let mut astar = GridPlanner::astar(&map, 3, 5.0);
    let mut dijkstra = GridPlanner::dijkstra(&map, 3, 5.0);
    let fast = astar.generate_path(start, goal).expect("astar path");
    let thorough = dijkstra.generate_path(start, goal).expect("dijkstra path");

    assert!(
        (total_length(&fast) - total_length(&thorough)).abs() < 1e-6,
        "astar {:.3} vs dijkstra {:.3}",
        total_length(&fast),
        total_length(&thorough)
    );
    assert!(total_length(&fast) >= start.distance_to(goal));
}

#[test]
fn best_effort_rrt_threads_a_narrow_corridor() {
    // A wall split by a 28-pixel corridor, the only way through.
    let map = map_from_rects(&[(200, 210, 0, 340), (200, 210, 380, 399)]);
    let mut planner = RrtPlanner::new(&map, true, 5.0, SmallRng::seed_from_u64(0xC0FFEE));
    // The production timeout assumes a release build; give the tree room on
    // slower test machines since the assertion is about reachability.
    planner.set_timeout(Duration::from_secs(30));

    let start = Position::new(60.0, 200.0);
    let goal = Position::new(350.0, 200.0);
    let path = planner.generate_path(start, goal).expect("path");

    assert_eq!(path.first(), Some(start));
    assert_eq!(path.last(), Some(goal));
    assert!(path.remaining().len() >= 3);
    assert_segments_clear(&map, &path);
}
