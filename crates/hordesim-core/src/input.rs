//! Thread-safe player input flags.
//!
//! The input decoder writes, the physics tick reads. Keys map to controls
//! the classic way: WASD for movement, shift to sprint, escape to quit.

use std::sync::atomic::{AtomicBool, Ordering};

/// Player intents the simulation understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Left,
    Right,
    Up,
    Down,
    Sprint,
}

impl Control {
    pub const ALL: [Control; 5] = [
        Control::Left,
        Control::Right,
        Control::Up,
        Control::Down,
        Control::Sprint,
    ];

    /// Maps a movement key to its control. Sprint rides on a modifier key
    /// and shutdown on escape, so neither appears here.
    #[must_use]
    pub fn from_key(key: char) -> Option<Control> {
        match key.to_ascii_lowercase() {
            'a' => Some(Control::Left),
            'd' => Some(Control::Right),
            'w' => Some(Control::Up),
            's' => Some(Control::Down),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Control::Left => 0,
            Control::Right => 1,
            Control::Up => 2,
            Control::Down => 3,
            Control::Sprint => 4,
        }
    }
}

/// Current pressed-state of every control.
#[derive(Debug, Default)]
pub struct InputState {
    pressed: [AtomicBool; 5],
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, control: Control, pressed: bool) {
        self.pressed[control.index()].store(pressed, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_pressed(&self, control: Control) -> bool {
        self.pressed[control.index()].load(Ordering::Relaxed)
    }

    /// Releases every control.
    pub fn clear(&self) {
        for control in Control::ALL {
            self.set(control, false);
        }
    }

    /// Unit-step movement intent. The y axis grows downward, so `Up` is
    /// negative.
    #[must_use]
    pub fn axis(&self) -> (f64, f64) {
        let mut vx = 0.0;
        let mut vy = 0.0;
        if self.is_pressed(Control::Left) {
            vx -= 1.0;
        }
        if self.is_pressed(Control::Right) {
            vx += 1.0;
        }
        if self.is_pressed(Control::Up) {
            vy -= 1.0;
        }
        if self.is_pressed(Control::Down) {
            vy += 1.0;
        }
        (vx, vy)
    }

    #[must_use]
    pub fn sprinting(&self) -> bool {
        self.is_pressed(Control::Sprint)
    }
}
