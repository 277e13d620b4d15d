//! 2D kinematic primitives.

use serde::{Deserialize, Serialize};

/// Distance below which two positions count as the same point.
pub const POSITION_EPSILON: f64 = 0.01;

/// A point in world (pixel) coordinates. The y axis grows downward, matching
/// the raster layout of the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx.hypot(dy)
    }

    /// Angle of the ray from this point toward `other`, in radians.
    #[must_use]
    pub fn angle_to(&self, other: Position) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }

    /// Uniform rescaling, used to move between world and grid coordinates.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Position {
        Position::new(self.x * factor, self.y * factor)
    }

    /// Equality within an explicit distance threshold.
    #[must_use]
    pub fn approx_eq(&self, other: Position, epsilon: f64) -> bool {
        self.distance_to(other) < epsilon
    }

    /// Equality within [`POSITION_EPSILON`].
    #[must_use]
    pub fn near(&self, other: Position) -> bool {
        self.approx_eq(other, POSITION_EPSILON)
    }
}

/// A velocity in world units per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f64,
    pub dy: f64,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { dx: 0.0, dy: 0.0 };

    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Build a velocity from a heading (radians) and a net speed.
    #[must_use]
    pub fn from_polar(direction: f64, magnitude: f64) -> Self {
        Self {
            dx: direction.cos() * magnitude,
            dy: direction.sin() * magnitude,
        }
    }

    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}
