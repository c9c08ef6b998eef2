//! Session Outcome Types
//!
//! Terminal results of a session and the ending lines shown for them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad result of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Victory,
    Defeat,
    /// Session clock ran out without a decisive result
    Timeout,
}

/// What ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Collective power reached the victory threshold
    PowerThreshold,
    /// Every target reached the liberation threshold
    AllTargetsLiberated,
    /// Heat reached the surveillance-state threshold
    SurveillanceState,
    /// Session duration elapsed
    TimeExpired,
}

/// A recorded terminal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub kind: OutcomeKind,
    pub reason: EndReason,
    pub message: String,
}

impl SessionOutcome {
    pub fn power_victory() -> Self {
        Self {
            kind: OutcomeKind::Victory,
            reason: EndReason::PowerThreshold,
            message: "Community power reached critical mass! Participatory democracy established."
                .to_string(),
        }
    }

    pub fn liberation_victory() -> Self {
        Self {
            kind: OutcomeKind::Victory,
            reason: EndReason::AllTargetsLiberated,
            message: "All neighborhoods liberated! The AI Mayor has been overthrown.".to_string(),
        }
    }

    pub fn surveillance_defeat() -> Self {
        Self {
            kind: OutcomeKind::Defeat,
            reason: EndReason::SurveillanceState,
            message: "Surveillance state fully implemented. The resistance has been crushed."
                .to_string(),
        }
    }

    /// Neutral ending; the tone depends on whether the movement held its ground.
    pub fn timeout(held_ground: bool) -> Self {
        let message = if held_ground {
            "Time's up! The resistance continues, but the struggle is far from over."
        } else {
            "Time's up! The AI Mayor's optimization proceeded unchallenged."
        };
        Self {
            kind: OutcomeKind::Timeout,
            reason: EndReason::TimeExpired,
            message: message.to_string(),
        }
    }

    pub fn is_victory(&self) -> bool {
        self.kind == OutcomeKind::Victory
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self.kind {
            OutcomeKind::Victory => "VICTORY",
            OutcomeKind::Defeat => "DEFEAT",
            OutcomeKind::Timeout => "TIME UP",
        };
        write!(f, "{}: {}", title, self.message)
    }
}
