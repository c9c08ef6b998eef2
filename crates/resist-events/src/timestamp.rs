//! Session Clock Types
//!
//! All engine timestamps are milliseconds since the session clock origin.
//!
//! # Example
//!
//! ```
//! use resist_events::SessionTime;
//!
//! let elapsed = SessionTime::from_millis(125_000);
//! assert_eq!(elapsed.to_string(), "02:05");
//! assert_eq!(elapsed.remaining_of(SessionTime::from_secs(900)).to_string(), "12:55");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds per second.
pub const MILLIS_PER_SECOND: u64 = 1_000;

/// Milliseconds per minute.
pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// A point (or span) on the session clock, in milliseconds.
///
/// Displays as `mm:ss`, the format of the in-game countdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionTime(pub u64);

impl SessionTime {
    /// The clock origin.
    pub const ZERO: SessionTime = SessionTime(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(MILLIS_PER_SECOND))
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Time left until `total`, saturating at zero.
    pub fn remaining_of(self, total: SessionTime) -> SessionTime {
        SessionTime(total.0.saturating_sub(self.0))
    }

    /// Adds a span, saturating on overflow.
    pub fn saturating_add(self, span_ms: u64) -> SessionTime {
        SessionTime(self.0.saturating_add(span_ms))
    }

    /// Whole seconds, rounded up. Used for "N s remaining" messages.
    pub fn ceil_secs(self) -> u64 {
        self.0.div_ceil(MILLIS_PER_SECOND)
    }
}

impl fmt::Display for SessionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.0 / MILLIS_PER_MINUTE;
        let seconds = (self.0 % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND;
        write!(f, "{:02}:{:02}", minutes, seconds)
    }
}

impl From<u64> for SessionTime {
    fn from(ms: u64) -> Self {
        Self(ms)
    }
}
