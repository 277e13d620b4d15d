//! Textual session status, the headless stand-in for the info side panel.

use hordesim_core::{MAX_ZOMBIES, Session};

/// One-line session summary: wave, spawn budget, live zombies, player
/// state. Takes the actor lock briefly.
#[must_use]
pub fn status_line(session: &Session) -> String {
    let world = session.actors();
    let player = &world.player;
    match world.wave.as_ref() {
        Some(wave) => format!(
            "wave {} | zombies {}/{} (spawns left {}) | points {} | player ({:.0}, {:.0}) hp {}",
            wave.number(),
            wave.live_slots().count(),
            MAX_ZOMBIES,
            wave.remaining_spawns(),
            player.points(),
            player.actor.position.x,
            player.actor.position.y,
            player.actor.health,
        ),
        None => format!(
            "no wave | points {} | player ({:.0}, {:.0}) hp {}",
            player.points(),
            player.actor.position.x,
            player.actor.position.y,
            player.actor.health,
        ),
    }
}
