//! Built-in demo arena, for running the shell without map assets on disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use hordesim_core::{MAP_HEIGHT, MAP_WIDTH, MapData, ObstacleRaster, Position};

/// Rectangles (x0, x1, y0, y1) forming the demo arena's walls: a broken
/// center wall and two side pillars, leaving corridors wide enough for an
/// actor disk.
const DEMO_WALLS: [(i64, i64, i64, i64); 4] = [
    (290, 310, 0, 160),
    (290, 310, 240, 399),
    (140, 170, 120, 150),
    (430, 460, 250, 280),
];

const DEMO_PLAYER_SPAWN: Position = Position::new(80.0, 200.0);
const DEMO_ZOMBIE_SPAWNS: [Position; 4] = [
    Position::new(540.0, 60.0),
    Position::new(540.0, 340.0),
    Position::new(380.0, 200.0),
    Position::new(60.0, 40.0),
];
const DEMO_ROBOT_STATIONS: [Position; 2] =
    [Position::new(40.0, 370.0), Position::new(560.0, 30.0)];

fn demo_raster() -> ObstacleRaster {
    let mut raster = ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT);
    for (x0, x1, y0, y1) in DEMO_WALLS {
        for y in y0..=y1 {
            for x in x0..=x1 {
                raster.block(x, y);
            }
        }
    }
    raster
}

/// The demo arena as ready-made map data.
pub fn demo_map() -> MapData {
    MapData::from_rasters(
        demo_raster(),
        DEMO_PLAYER_SPAWN,
        DEMO_ZOMBIE_SPAWNS.to_vec(),
        DEMO_ROBOT_STATIONS.to_vec(),
    )
    .expect("demo arena is a valid map")
}

/// Writes the demo arena as a loadable map directory (`map.png` plus
/// `data.txt`), so the on-disk format stays exercised end to end.
pub fn write_demo_map(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create map directory {}", dir.display()))?;

    let raster = demo_raster();
    let mut png = RgbImage::from_pixel(MAP_WIDTH, MAP_HEIGHT, Rgb([255, 255, 255]));
    for y in 0..MAP_HEIGHT {
        for x in 0..MAP_WIDTH {
            if raster.is_blocked(i64::from(x), i64::from(y)) {
                png.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }
    let png_path = dir.join("map.png");
    png.save(&png_path)
        .with_context(|| format!("failed to write {}", png_path.display()))?;

    let mut data = format!(
        "playerSpawn: {},{}\n\nzombieSpawns\n",
        DEMO_PLAYER_SPAWN.x as i64, DEMO_PLAYER_SPAWN.y as i64
    );
    for spawn in DEMO_ZOMBIE_SPAWNS {
        data.push_str(&format!("\t{},{}\n", spawn.x as i64, spawn.y as i64));
    }
    data.push_str("\nrobotStations\n");
    for station in DEMO_ROBOT_STATIONS {
        data.push_str(&format!("\t{},{}\n", station.x as i64, station.y as i64));
    }
    let data_path = dir.join("data.txt");
    fs::write(&data_path, data)
        .with_context(|| format!("failed to write {}", data_path.display()))?;
    Ok(())
}
