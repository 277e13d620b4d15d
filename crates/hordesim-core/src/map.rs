//! Obstacle map data: the displayed raster, its actor-inflated companion,
//! and the spawn-point tables parsed from the map directory.
//!
//! Every traversability decision in the simulation goes through the
//! inflated raster, where each obstacle pixel has been dilated by the actor
//! radius. That keeps both movement and path planning honest about the
//! actors being disks rather than points.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::rngs::SmallRng;
use thiserror::Error;
use tracing::debug;

use crate::geometry::Position;

/// Required width of a map image, in pixels.
pub const MAP_WIDTH: u32 = 600;
/// Required height of a map image, in pixels.
pub const MAP_HEIGHT: u32 = 400;
/// Radius of every actor disk; obstacle inflation uses the same value.
pub const ACTOR_RADIUS: i32 = 6;

/// Errors raised while constructing map data.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode map image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("map image must be {MAP_WIDTH}x{MAP_HEIGHT} pixels, got {width}x{height}")]
    WrongDimensions { width: u32, height: u32 },
    #[error("malformed spawn entry on line {line}: {text:?}")]
    MalformedEntry { line: usize, text: String },
    #[error("spawn entry on line {line} appears before any section header")]
    EntryOutsideSection { line: usize },
    #[error("map data file declares no player spawn")]
    MissingPlayerSpawn,
    #[error("map declares no zombie spawn points")]
    NoZombieSpawns,
}

/// Dense boolean raster marking obstacle pixels, stored row-major.
#[derive(Debug, Clone)]
pub struct ObstacleRaster {
    width: u32,
    height: u32,
    blocked: Vec<bool>,
}

impl ObstacleRaster {
    /// Fully-free raster of the given dimensions.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            blocked: vec![false; (width as usize) * (height as usize)],
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Marks a single pixel as an obstacle. Out-of-bounds writes are ignored.
    pub fn block(&mut self, x: i64, y: i64) {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            let index = y as usize * self.width as usize + x as usize;
            self.blocked[index] = true;
        }
    }

    /// Whether the pixel is an obstacle. Out-of-bounds reads as blocked.
    #[must_use]
    pub fn is_blocked(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return true;
        }
        self.blocked[y as usize * self.width as usize + x as usize]
    }

    #[must_use]
    pub fn is_free(&self, x: i64, y: i64) -> bool {
        !self.is_blocked(x, y)
    }

    /// Dilates every obstacle pixel into a filled disk of the given radius.
    #[must_use]
    pub fn inflate(&self, radius: i32) -> ObstacleRaster {
        let mut offsets = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    offsets.push((dx as i64, dy as i64));
                }
            }
        }

        let mut inflated = ObstacleRaster::open(self.width, self.height);
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                if self.is_blocked(x, y) {
                    for &(dx, dy) in &offsets {
                        inflated.block(x + dx, y + dy);
                    }
                }
            }
        }
        inflated
    }
}

/// Immutable environment description for one arena map.
#[derive(Debug, Clone)]
pub struct MapData {
    displayed: ObstacleRaster,
    inflated: ObstacleRaster,
    player_spawn: Position,
    zombie_spawns: Vec<Position>,
    robot_stations: Vec<Position>,
}

impl MapData {
    /// Loads `map.png` and `data.txt` from a map directory.
    ///
    /// A pixel is free only when it is pure white; anything else is an
    /// obstacle. The image must be exactly [`MAP_WIDTH`]x[`MAP_HEIGHT`].
    pub fn load(dir: &Path) -> Result<Self, MapError> {
        let image_path = dir.join("map.png");
        let image = image::open(&image_path)
            .map_err(|source| MapError::Image {
                path: image_path.clone(),
                source,
            })?
            .to_rgb8();
        let (width, height) = image.dimensions();
        if width != MAP_WIDTH || height != MAP_HEIGHT {
            return Err(MapError::WrongDimensions { width, height });
        }

        let mut displayed = ObstacleRaster::open(width, height);
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel.0 != [0xFF, 0xFF, 0xFF] {
                displayed.block(i64::from(x), i64::from(y));
            }
        }

        let data_path = dir.join("data.txt");
        let text = std::fs::read_to_string(&data_path).map_err(|source| MapError::Io {
            path: data_path,
            source,
        })?;
        let (player_spawn, zombie_spawns, robot_stations) = parse_data_file(&text)?;

        Self::from_rasters(displayed, player_spawn, zombie_spawns, robot_stations)
    }

    /// Builds map data from an already-populated raster, inflating it here.
    /// Used by [`MapData::load`] and by tests that synthesize maps directly.
    pub fn from_rasters(
        displayed: ObstacleRaster,
        player_spawn: Position,
        zombie_spawns: Vec<Position>,
        robot_stations: Vec<Position>,
    ) -> Result<Self, MapError> {
        if displayed.width() != MAP_WIDTH || displayed.height() != MAP_HEIGHT {
            return Err(MapError::WrongDimensions {
                width: displayed.width(),
                height: displayed.height(),
            });
        }
        if zombie_spawns.is_empty() {
            return Err(MapError::NoZombieSpawns);
        }

        let inflated = displayed.inflate(ACTOR_RADIUS);
        debug!(
            zombie_spawns = zombie_spawns.len(),
            robot_stations = robot_stations.len(),
            "Built map data"
        );
        Ok(Self {
            displayed,
            inflated,
            player_spawn,
            zombie_spawns,
            robot_stations,
        })
    }

    #[must_use]
    pub fn displayed(&self) -> &ObstacleRaster {
        &self.displayed
    }

    #[must_use]
    pub fn inflated(&self) -> &ObstacleRaster {
        &self.inflated
    }

    /// Whether an actor center may occupy this position. Positions outside
    /// the map are invalid.
    #[must_use]
    pub fn position_is_valid(&self, position: Position) -> bool {
        self.inflated
            .is_free(position.x.floor() as i64, position.y.floor() as i64)
    }

    #[must_use]
    pub fn player_spawn(&self) -> Position {
        self.player_spawn
    }

    #[must_use]
    pub fn zombie_spawns(&self) -> &[Position] {
        &self.zombie_spawns
    }

    #[must_use]
    pub fn robot_stations(&self) -> &[Position] {
        &self.robot_stations
    }

    /// Picks a zombie spawn point uniformly at random. The spawn table is
    /// guaranteed non-empty by construction.
    #[must_use]
    pub fn random_zombie_spawn(&self, rng: &mut SmallRng) -> Position {
        self.zombie_spawns[rng.random_range(0..self.zombie_spawns.len())]
    }
}

/// Parses the line-oriented `data.txt` format: a `playerSpawn: X,Y` line,
/// section headers `zombieSpawns` / `robotStations`, and tab-indented `X,Y`
/// entries appended to the currently open section.
fn parse_data_file(text: &str) -> Result<(Position, Vec<Position>, Vec<Position>), MapError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Section {
        None,
        ZombieSpawns,
        RobotStations,
    }

    let mut player_spawn = None;
    let mut zombie_spawns = Vec::new();
    let mut robot_stations = Vec::new();
    let mut section = Section::None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.starts_with('\t') {
            let point = parse_point(raw.trim()).ok_or_else(|| MapError::MalformedEntry {
                line,
                text: raw.trim().to_string(),
            })?;
            match section {
                Section::ZombieSpawns => zombie_spawns.push(point),
                Section::RobotStations => robot_stations.push(point),
                Section::None => return Err(MapError::EntryOutsideSection { line }),
            }
        } else if raw.starts_with("playerSpawn") {
            let value = raw.split_once(':').map(|(_, rest)| rest.trim());
            player_spawn = Some(value.and_then(parse_point).ok_or_else(|| {
                MapError::MalformedEntry {
                    line,
                    text: raw.to_string(),
                }
            })?);
        } else {
            match raw.trim() {
                "" => {}
                "zombieSpawns" => section = Section::ZombieSpawns,
                "robotStations" => section = Section::RobotStations,
                // Unknown headers are skipped, matching the tolerant reader
                // this format grew up with.
                _ => {}
            }
        }
    }

    let player_spawn = player_spawn.ok_or(MapError::MissingPlayerSpawn)?;
    Ok((player_spawn, zombie_spawns, robot_stations))
}

fn parse_point(text: &str) -> Option<Position> {
    let (x, y) = text.split_once(',')?;
    let x: i64 = x.trim().parse().ok()?;
    let y: i64 = y.trim().parse().ok()?;
    Some(Position::new(x as f64, y as f64))
}
