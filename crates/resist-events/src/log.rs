//! Log Stream Types
//!
//! The short, categorised lines the engine publishes for presentation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SessionTime;

/// Who a log line speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// Results of the player's own actions
    Player,
    /// Engine notices: cooldowns, rejections, mining, timers
    System,
    /// The adversary speaking or acting
    Ai,
    /// The community reacting
    Citizen,
}

impl LogCategory {
    /// Returns all categories.
    pub fn all() -> &'static [LogCategory] {
        &[
            LogCategory::Player,
            LogCategory::System,
            LogCategory::Ai,
            LogCategory::Citizen,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogCategory::Player => "player",
            LogCategory::System => "system",
            LogCategory::Ai => "ai",
            LogCategory::Citizen => "citizen",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Session clock time the line was produced
    pub at: SessionTime,
    pub category: LogCategory,
    pub message: String,
}

impl LogEntry {
    pub fn new(at: SessionTime, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            at,
            category,
            message: message.into(),
        }
    }

    /// Serializes to a single JSON line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a single JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:<7} {}", self.at, self.category, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serialization() {
        assert_eq!(serde_json::to_string(&LogCategory::Ai).unwrap(), r#""ai""#);
        assert_eq!(
            serde_json::to_string(&LogCategory::Citizen).unwrap(),
            r#""citizen""#
        );
        for category in LogCategory::all() {
            let json = serde_json::to_string(category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_entry_jsonl_shape() {
        let entry = LogEntry::new(SessionTime::from_millis(4200), LogCategory::Player, "Planted community garden in Riverside");
        let line = entry.to_jsonl().unwrap();

        assert!(!line.contains('\n'));
        assert!(line.contains(r#""at":4200"#));
        assert!(line.contains(r#""category":"player""#));
        assert_eq!(LogEntry::from_jsonl(&line).unwrap(), entry);
    }

    #[test]
    fn test_entry_display() {
        let entry = LogEntry::new(SessionTime::from_secs(65), LogCategory::System, "Mining inactive");
        assert_eq!(entry.to_string(), "[01:05] system  Mining inactive");
    }
}
