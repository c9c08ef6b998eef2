//! Gameplay event log.

mod logger;

pub use logger::{EventLog, JsonlWriter};
