//! Snapshot Types
//!
//! Read-only views of the world state handed to presentation.
//!
//! Snapshots are plain data: they are produced by the engine and never fed
//! back into it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{SessionOutcome, SessionTime};

/// A contested zone as seen by presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub id: String,
    pub name: String,
    pub resistance: f64,
    /// Minutes until the adversary moves on the zone
    pub timer_minutes: f64,
    pub threatened: bool,
    #[serde(default)]
    pub liberated: bool,
    #[serde(default)]
    pub gentrified: bool,
    pub population: u64,
}

/// Full world state at a point on the session clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Identifies one run; a restart produces a new id
    pub session_id: Uuid,
    pub active: bool,
    pub elapsed: SessionTime,
    pub remaining: SessionTime,
    pub power: f64,
    pub heat: f64,
    pub min_heat: f64,
    pub active_participants: u64,
    pub total_population: u64,
    pub imprisoned: u64,
    pub killed: u64,
    pub currency: u64,
    pub infrastructure_bonus: u32,
    pub actions_completed: u32,
    #[serde(default)]
    pub selected_target: Option<String>,
    pub targets: Vec<TargetSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SessionOutcome>,
}

impl WorldSnapshot {
    /// Looks up a target by id.
    pub fn target(&self, id: &str) -> Option<&TargetSnapshot> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Number of targets at or above the liberation threshold.
    pub fn liberated_count(&self) -> usize {
        self.targets.iter().filter(|t| t.liberated).count()
    }

    /// Fraction of the population actively participating.
    pub fn participation(&self) -> f64 {
        if self.total_population == 0 {
            return 0.0;
        }
        self.active_participants as f64 / self.total_population as f64
    }
}
