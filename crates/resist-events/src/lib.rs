//! Shared log, snapshot and outcome types for the resistance simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is what presentation layers depend on.

pub mod log;
pub mod outcome;
pub mod snapshot;
pub mod timestamp;

pub use log::{LogCategory, LogEntry};
pub use outcome::{EndReason, OutcomeKind, SessionOutcome};
pub use snapshot::{TargetSnapshot, WorldSnapshot};
pub use timestamp::{SessionTime, MILLIS_PER_MINUTE, MILLIS_PER_SECOND};
