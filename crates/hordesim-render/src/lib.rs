//! CPU frame composition for Hordesim.
//!
//! Rendering is two-phase to keep the actor lock short: a capture step
//! copies positions, colors, and pending paths into private buffers under
//! the lock, then drawing works entirely on the copies. Frames compose the
//! displayed map raster, actor disks, and an optional path overlay, and can
//! be encoded to PNG for offscreen snapshots.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::trace;

use hordesim_core::{ACTOR_RADIUS, MAX_ZOMBIES, MapData, PlannedPath, Position, Rgb, Session};

const FREE_COLOR: Rgb = [255, 255, 255];
const OBSTACLE_COLOR: Rgb = [0, 0, 0];
const PATH_COLOR: Rgb = [255, 0, 0];

/// Errors raised while encoding rendered frames.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

/// Drawable state of one actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSprite {
    pub position: Position,
    pub color: Rgb,
}

/// A zombie's pending route: its position followed by the waypoints it has
/// not consumed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PathOverlay {
    pub from: Position,
    pub waypoints: Vec<Position>,
}

/// Private copy of everything a frame needs, taken under the actor lock.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub player: ActorSprite,
    pub zombies: Vec<ActorSprite>,
    pub paths: Vec<PathOverlay>,
    pub wave_number: Option<u32>,
    pub points: u32,
}

impl FrameSnapshot {
    /// Captures the current actor state. The lock is held only for the
    /// copy; drawing happens without it.
    #[must_use]
    pub fn capture(session: &Session, include_paths: bool) -> FrameSnapshot {
        let world = session.actors();
        let player = ActorSprite {
            position: world.player.actor.position,
            color: world.player.actor.color,
        };

        let mut zombies = Vec::new();
        let mut paths = Vec::new();
        let mut wave_number = None;
        if let Some(wave) = world.wave.as_ref() {
            wave_number = Some(wave.number());
            for slot in 0..MAX_ZOMBIES {
                let Some(zombie) = wave.zombie_at(slot) else {
                    continue;
                };
                zombies.push(ActorSprite {
                    position: zombie.actor.position,
                    color: zombie.actor.color,
                });
                if include_paths
                    && let Some(overlay) = path_overlay(zombie.actor.position, wave.path_at(slot))
                {
                    paths.push(overlay);
                }
            }
        }

        FrameSnapshot {
            player,
            zombies,
            paths,
            wave_number,
            points: world.player.points(),
        }
    }
}

/// An overlay is only worth drawing while the path still has a route left.
fn path_overlay(from: Position, path: Option<&PlannedPath>) -> Option<PathOverlay> {
    let path = path?;
    if path.len() < 2 {
        return None;
    }
    Some(PathOverlay {
        from,
        waypoints: path.remaining().to_vec(),
    })
}

/// An RGBA8 pixel buffer in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaFrame {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
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

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[offset] = color[0];
        self.pixels[offset + 1] = color[1];
        self.pixels[offset + 2] = color[2];
        self.pixels[offset + 3] = 0xFF;
    }

    fn fill_disk(&mut self, center: Position, radius: i32, color: Rgb) {
        let cx = center.x.round() as i64;
        let cy = center.y.round() as i64;
        let r = i64::from(radius);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Bresenham segment between two world points.
    fn draw_line(&mut self, from: Position, to: Position, color: Rgb) {
        let (mut x, mut y) = (from.x.round() as i64, from.y.round() as i64);
        let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut error = dx + dy;
        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += sx;
            }
            if doubled <= dx {
                error += dx;
                y += sy;
            }
        }
    }
}

/// Composes one frame: map raster, then the debug path overlay, then actor
/// disks on top.
#[must_use]
pub fn compose_frame(map: &MapData, snapshot: &FrameSnapshot) -> RgbaFrame {
    let raster = map.displayed();
    let mut frame = RgbaFrame::new(raster.width(), raster.height());

    for y in 0..raster.height() as i64 {
        for x in 0..raster.width() as i64 {
            let color = if raster.is_blocked(x, y) {
                OBSTACLE_COLOR
            } else {
                FREE_COLOR
            };
            frame.put(x, y, color);
        }
    }

    for overlay in &snapshot.paths {
        let mut previous = overlay.from;
        for &waypoint in &overlay.waypoints {
            frame.draw_line(previous, waypoint, PATH_COLOR);
            previous = waypoint;
        }
    }

    for zombie in &snapshot.zombies {
        frame.fill_disk(zombie.position, ACTOR_RADIUS, zombie.color);
    }
    frame.fill_disk(snapshot.player.position, ACTOR_RADIUS, snapshot.player.color);

    trace!(
        zombies = snapshot.zombies.len(),
        overlays = snapshot.paths.len(),
        "Composed frame"
    );
    frame
}

/// Encodes a frame as PNG bytes.
pub fn encode_png(frame: &RgbaFrame) -> Result<Vec<u8>, RenderError> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .expect("frame buffer matches its dimensions");
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image).write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Captures and renders the session into PNG bytes without a live window.
pub fn snapshot_png(session: &Session, include_paths: bool) -> Result<Vec<u8>, RenderError> {
    let snapshot = FrameSnapshot::capture(session, include_paths);
    let frame = compose_frame(session.map(), &snapshot);
    encode_png(&frame)
}
