//! Actors: the player and the zombies that pursue them.

use crate::geometry::{Position, Velocity};
use crate::map::MapData;

/// Packed display color.
pub type Rgb = [u8; 3];

const PLAYER_FULL_HEALTH: Rgb = [0, 255, 255];
const PLAYER_LOW_HEALTH: Rgb = [255, 0, 0];
const ZOMBIE_FULL_HEALTH: Rgb = [0, 200, 0];
const ZOMBIE_LOW_HEALTH: Rgb = [192, 192, 192];

/// Interpolates between a depleted and a full-health color by health ratio.
fn health_color(low: Rgb, full: Rgb, health: i32, max_health: i32) -> Rgb {
    let mut color = [0u8; 3];
    for channel in 0..3 {
        let span = (f64::from(full[channel]) - f64::from(low[channel])) / f64::from(max_health);
        let value = f64::from(low[channel]) + span * f64::from(health);
        color[channel] = value.clamp(0.0, 255.0) as u8;
    }
    color
}

/// Shared actor state: a colored disk with a position, velocity, and health.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub color: Rgb,
    pub position: Position,
    pub velocity: Velocity,
    pub health: i32,
}

impl Actor {
    #[must_use]
    fn new(color: Rgb, position: Position, health: i32) -> Self {
        Self {
            color,
            position,
            velocity: Velocity::ZERO,
            health,
        }
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Moves by `(dx, dy)` with axis-separated sliding: the full translation
    /// is tried first, then each axis alone, and the actor stays put when
    /// every candidate lands in an obstacle.
    pub fn attempt_translation_in(&mut self, dx: f64, dy: f64, map: &MapData) {
        let full = self.position.translated(dx, dy);
        if map.position_is_valid(full) {
            self.position = full;
            return;
        }
        let horizontal = self.position.translated(dx, 0.0);
        if map.position_is_valid(horizontal) {
            self.position = horizontal;
            return;
        }
        let vertical = self.position.translated(0.0, dy);
        if map.position_is_valid(vertical) {
            self.position = vertical;
        }
    }

    /// Advances one time step along the current velocity.
    pub fn step(&mut self, dt: f64, map: &MapData) {
        self.attempt_translation_in(self.velocity.dx * dt, self.velocity.dy * dt, map);
    }

    pub fn set_velocity(&mut self, direction: f64, magnitude: f64) {
        self.velocity = Velocity::from_polar(direction, magnitude);
    }
}

/// The user-controlled actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub actor: Actor,
    points: u32,
}

impl Player {
    pub const MAX_HEALTH: i32 = 250;
    pub const WALK_SPEED: f64 = 65.0;
    pub const RUN_SPEED: f64 = 100.0;

    #[must_use]
    pub fn new(spawn: Position, initial_points: u32) -> Self {
        Self {
            actor: Actor::new(PLAYER_FULL_HEALTH, spawn, Self::MAX_HEALTH),
            points: initial_points,
        }
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Adjusts the spendable point balance, saturating at zero.
    pub fn change_points(&mut self, delta: i64) {
        let next = i64::from(self.points) + delta;
        self.points = next.clamp(0, i64::from(u32::MAX)) as u32;
    }

    /// Adjusts health, clamped to `[0, MAX_HEALTH]`, and refreshes color.
    pub fn change_health(&mut self, delta: i32) {
        self.actor.health = (self.actor.health + delta).clamp(0, Self::MAX_HEALTH);
        self.actor.color = health_color(
            PLAYER_LOW_HEALTH,
            PLAYER_FULL_HEALTH,
            self.actor.health,
            Self::MAX_HEALTH,
        );
    }
}

/// A pursuing actor with a per-instance speed sampled at spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Zombie {
    pub actor: Actor,
    initial_health: i32,
    speed: f64,
}

impl Zombie {
    pub const MIN_SPEED: f64 = 10.0;
    pub const MAX_SPEED: f64 = Player::WALK_SPEED;

    #[must_use]
    pub fn new(spawn: Position, health: i32, speed: f64) -> Self {
        Self {
            actor: Actor::new(ZOMBIE_FULL_HEALTH, spawn, health),
            initial_health: health,
            speed,
        }
    }

    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn change_health(&mut self, delta: i32) {
        self.actor.health += delta;
        self.actor.color = health_color(
            ZOMBIE_LOW_HEALTH,
            ZOMBIE_FULL_HEALTH,
            self.actor.health,
            self.initial_health,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{MAP_HEIGHT, MAP_WIDTH, MapData, ObstacleRaster};

    fn walled_map() -> MapData {
        // Vertical wall at x = 300 spanning the full height.
        let mut raster = ObstacleRaster::open(MAP_WIDTH, MAP_HEIGHT);
        for y in 0..i64::from(MAP_HEIGHT) {
            raster.block(300, y);
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
    fn blocked_diagonal_slides_along_the_wall() {
        let map = walled_map();
        let mut actor = Actor::new([0; 3], Position::new(290.0, 200.0), 100);

        // Pushing up-right into the wall keeps the vertical component.
        actor.attempt_translation_in(10.0, -10.0, &map);
        assert_eq!(actor.position, Position::new(290.0, 190.0));

        // A clear move applies both components.
        actor.attempt_translation_in(-10.0, -10.0, &map);
        assert_eq!(actor.position, Position::new(280.0, 180.0));
    }

    #[test]
    fn fully_blocked_actor_stays_put() {
        let map = walled_map();
        // Inflation reaches 6px from the wall, so x = 295 is invalid for
        // either axis move of length 0 and the diagonal.
        let mut actor = Actor::new([0; 3], Position::new(290.0, 200.0), 100);
        actor.attempt_translation_in(8.0, 0.0, &map);
        assert_eq!(actor.position, Position::new(290.0, 200.0));
    }

    #[test]
    fn step_scales_velocity_by_dt() {
        let map = walled_map();
        let mut actor = Actor::new([0; 3], Position::new(100.0, 100.0), 100);
        actor.velocity = Velocity::new(40.0, -20.0);
        actor.step(0.5, &map);
        assert_eq!(actor.position, Position::new(120.0, 90.0));
    }

    #[test]
    fn player_health_clamps_to_its_range() {
        let mut player = Player::new(Position::new(10.0, 10.0), 0);
        player.change_health(100);
        assert_eq!(player.actor.health, Player::MAX_HEALTH);
        player.change_health(-1000);
        assert_eq!(player.actor.health, 0);
        assert!(player.actor.is_dead());
        assert_eq!(player.actor.color, PLAYER_LOW_HEALTH);
    }

    #[test]
    fn points_never_go_negative() {
        let mut player = Player::new(Position::default(), 10);
        player.change_points(-25);
        assert_eq!(player.points(), 0);
        player.change_points(40);
        assert_eq!(player.points(), 40);
    }

    #[test]
    fn zombie_color_tracks_health() {
        let mut zombie = Zombie::new(Position::default(), 200, Zombie::MIN_SPEED);
        assert_eq!(zombie.actor.color, ZOMBIE_FULL_HEALTH);
        zombie.change_health(-200);
        assert!(zombie.actor.is_dead());
        assert_eq!(zombie.actor.color, ZOMBIE_LOW_HEALTH);
    }
}
