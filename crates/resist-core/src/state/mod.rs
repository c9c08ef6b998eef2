//! State Store
//!
//! The world-state record owned by a session and the contested zones it
//! contains.

mod target;
mod world;

pub use target::{
    Target, TargetId, TimerOutcome, DEFENSE_RESISTANCE_BONUS, DEFENSE_THRESHOLD,
    LIBERATION_THRESHOLD,
};
pub use world::{TimerEvent, WorldState, MAX_POWER};
