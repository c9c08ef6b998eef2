//! Victory Evaluator
//!
//! Terminal-condition checks, run after every state-affecting event.

use resist_events::SessionOutcome;

use crate::state::{WorldState, LIBERATION_THRESHOLD};

pub const POWER_VICTORY: f64 = 80.0;
pub const SURVEILLANCE_DEFEAT: f64 = 95.0;
/// Power at which a timed-out session counts as having held its ground.
pub const HELD_GROUND: f64 = 50.0;

/// Checks power victory, then liberation victory, then defeat.
pub fn evaluate(world: &WorldState) -> Option<SessionOutcome> {
    if world.power() >= POWER_VICTORY {
        return Some(SessionOutcome::power_victory());
    }
    let targets = world.targets();
    if !targets.is_empty() && targets.iter().all(|t| t.resistance() >= LIBERATION_THRESHOLD) {
        return Some(SessionOutcome::liberation_victory());
    }
    if world.heat() >= SURVEILLANCE_DEFEAT {
        return Some(SessionOutcome::surveillance_defeat());
    }
    None
}

/// Neutral ending when the session clock runs out.
pub fn timeout_outcome(power: f64) -> SessionOutcome {
    SessionOutcome::timeout(power >= HELD_GROUND)
}
