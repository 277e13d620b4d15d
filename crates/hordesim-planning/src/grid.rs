//! Downsampled occupancy grid over the inflated obstacle raster.

use hordesim_core::{MapData, Position};

/// Fraction of the discretization ratio used as the default raycast step.
const DEFAULT_STEP_RATIO: f64 = 0.5;

/// Result of walking a straight ray across the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Raycast {
    /// Whether the entire segment ran through open cells.
    pub clear: bool,
    /// The furthest valid point probed: the goal itself when the ray is
    /// clear, the last open probe before the hit otherwise, or nothing when
    /// the very first probe was blocked.
    pub furthest: Option<Position>,
}

/// Occupancy grid at a fixed downsampling ratio. A cell covering any
/// obstacle pixel of the inflated raster is occupied, so the grid never
/// under-reports an obstacle.
#[derive(Debug, Clone)]
pub struct DiscretizedMap {
    ratio: u32,
    width: usize,
    height: usize,
    occupied: Vec<bool>,
}

impl DiscretizedMap {
    /// Downsamples the map's inflated raster by `ratio`.
    #[must_use]
    pub fn build(map: &MapData, ratio: u32) -> Self {
        let inflated = map.inflated();
        let width = (inflated.width() / ratio) as usize;
        let height = (inflated.height() / ratio) as usize;
        let mut occupied = vec![false; width * height];

        for cy in 0..height {
            for cx in 0..width {
                'cell: for py in 0..ratio {
                    for px in 0..ratio {
                        if inflated.is_blocked(
                            (cx as u32 * ratio + px) as i64,
                            (cy as u32 * ratio + py) as i64,
                        ) {
                            occupied[cy * width + cx] = true;
                            break 'cell;
                        }
                    }
                }
            }
        }

        Self {
            ratio,
            width,
            height,
            occupied,
        }
    }

    #[must_use]
    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Whether the cell is habitable. Out-of-bounds cells are not.
    #[must_use]
    pub fn open_at(&self, x: i64, y: i64) -> bool {
        self.in_bounds(x, y) && !self.occupied[y as usize * self.width + x as usize]
    }

    /// [`DiscretizedMap::open_at`] addressed in inflated-raster pixels.
    #[must_use]
    pub fn open_at_original(&self, x: i64, y: i64) -> bool {
        self.open_at(x / i64::from(self.ratio), y / i64::from(self.ratio))
    }

    /// Walks the segment between two grid-coordinate points, probing every
    /// `step` along it (plus the exact endpoint). Probes within `exclusion`
    /// of either endpoint are skipped; a non-positive `exclusion` disables
    /// the skip.
    #[must_use]
    pub fn raycast(
        &self,
        start: Position,
        goal: Position,
        exclusion: f64,
        step: f64,
    ) -> Raycast {
        let angle = start.angle_to(goal);
        let (sin, cos) = angle.sin_cos();
        let total = start.distance_to(goal);

        let mut displacement = 0.0;
        let mut furthest: Option<Position> = None;
        loop {
            let at_end = displacement >= total;
            let along = if at_end { total } else { displacement };
            let probe = Position::new(start.x + along * cos, start.y + along * sin);

            let skip = exclusion > 0.0
                && (start.approx_eq(probe, exclusion) || goal.approx_eq(probe, exclusion));
            if !skip {
                let px = probe.x.round() as i64;
                let py = probe.y.round() as i64;
                if !self.open_at(px, py) {
                    return Raycast {
                        clear: false,
                        furthest,
                    };
                }
                furthest = Some(Position::new(px as f64, py as f64));
            }

            if at_end {
                break;
            }
            displacement += step;
        }

        Raycast {
            clear: true,
            furthest: Some(goal),
        }
    }

    /// Raycast with the default step of half a cell worth of pixels.
    #[must_use]
    pub fn path_is_clear(&self, start: Position, goal: Position, exclusion: f64) -> Raycast {
        self.raycast(
            start,
            goal,
            exclusion,
            DEFAULT_STEP_RATIO * f64::from(self.ratio),
        )
    }

    /// Raycast between points given in inflated-raster pixels; endpoints are
    /// rescaled into grid coordinates and probed every half cell.
    #[must_use]
    pub fn path_is_clear_in_original(
        &self,
        start: Position,
        goal: Position,
        exclusion: f64,
    ) -> Raycast {
        let scale = 1.0 / f64::from(self.ratio);
        self.raycast(
            start.scaled(scale),
            goal.scaled(scale),
            exclusion,
            DEFAULT_STEP_RATIO,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hordesim_core::{MAP_HEIGHT, MAP_WIDTH, ObstacleRaster};

    fn map_with_blocks(blocks: &[(i64, i64)]) -> MapData {
        let mut raster = ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT);
        for &(x, y) in blocks {
            raster.block(x, y);
        }
        MapData::from_rasters(
            raster,
            Position::new(10.0, 10.0),
            vec![Position::new(20.0, 20.0)],
            Vec::new(),
        )
        .expect("map")
    }

    #[test]
    fn any_blocked_pixel_occupies_the_cell() {
        let map = map_with_blocks(&[(100, 100)]);
        let grid = DiscretizedMap::build(&map, 4);
        // Inflation spreads the obstacle across neighbouring cells too; the
        // one containing the pixel itself must be occupied.
        assert!(!grid.open_at(25, 25));
        assert!(grid.open_at(50, 50));
        assert_eq!(grid.width(), 150);
        assert_eq!(grid.height(), 100);
    }

    #[test]
    fn original_coordinates_divide_down() {
        let map = map_with_blocks(&[(100, 100)]);
        let grid = DiscretizedMap::build(&map, 4);
        assert!(!grid.open_at_original(100, 100));
        assert!(grid.open_at_original(202, 202));
    }

    #[test]
    fn out_of_bounds_cells_are_closed() {
        let map = map_with_blocks(&[]);
        let grid = DiscretizedMap::build(&map, 3);
        assert!(!grid.open_at(-1, 0));
        assert!(!grid.open_at(grid.width() as i64, 0));
        assert!(grid.open_at(0, 0));
    }

    #[test]
    fn clear_ray_reports_the_goal() {
        let map = map_with_blocks(&[]);
        let grid = DiscretizedMap::build(&map, 3);
        let start = Position::new(5.0, 5.0);
        let goal = Position::new(150.0, 100.0);
        let ray = grid.path_is_clear(start, goal, -1.0);
        assert!(ray.clear);
        assert_eq!(ray.furthest, Some(goal));
    }

    #[test]
    fn degenerate_ray_is_clear_at_its_point() {
        let map = map_with_blocks(&[]);
        let grid = DiscretizedMap::build(&map, 3);
        let p = Position::new(40.0, 40.0);
        let ray = grid.path_is_clear(p, p, -1.0);
        assert!(ray.clear);
        assert_eq!(ray.furthest, Some(p));
    }

    #[test]
    fn blocked_ray_stops_short_of_the_wall() {
        // Vertical wall of pixels at x = 300.
        let blocks: Vec<(i64, i64)> = (0..i64::from(MAP_HEIGHT)).map(|y| (300, y)).collect();
        let map = map_with_blocks(&blocks);
        let grid = DiscretizedMap::build(&map, 3);

        let ray = grid.path_is_clear(Position::new(10.0, 50.0), Position::new(190.0, 50.0), -1.0);
        assert!(!ray.clear);
        let furthest = ray.furthest.expect("made progress before the wall");
        assert!(furthest.x < 98.0, "stopped at {furthest:?}");
        assert!(furthest.x > 80.0, "made it near the wall: {furthest:?}");
    }

    #[test]
    fn first_probe_blocked_yields_no_progress() {
        let blocks: Vec<(i64, i64)> = (0..i64::from(MAP_HEIGHT)).map(|y| (300, y)).collect();
        let map = map_with_blocks(&blocks);
        let grid = DiscretizedMap::build(&map, 3);
        let ray = grid.path_is_clear(Position::new(100.0, 50.0), Position::new(110.0, 50.0), -1.0);
        assert!(!ray.clear);
        assert_eq!(ray.furthest, None);
    }

    #[test]
    fn exclusion_skips_endpoint_probes() {
        let blocks: Vec<(i64, i64)> = (0..i64::from(MAP_HEIGHT)).map(|y| (300, y)).collect();
        let map = map_with_blocks(&blocks);
        let grid = DiscretizedMap::build(&map, 3);

        // Both endpoints sit inside the occupied band; with a wide enough
        // exclusion the whole short segment is skipped and counts as clear.
        let start = Position::new(99.0, 50.0);
        let goal = Position::new(101.0, 50.0);
        assert!(!grid.path_is_clear(start, goal, -1.0).clear);
        assert!(grid.path_is_clear(start, goal, 3.0).clear);
    }
}
