//! Risk Engine
//!
//! Classifies an action's risk from the heat it would push the city to and
//! rolls the arrests and deaths the adversary inflicts in response.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actions::ActionKind;
use crate::rng::RandomSource;

/// Risk tier of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskTier {
    /// Tier boundaries are right-open: heat 25 is already medium.
    pub fn from_heat(heat: f64) -> Self {
        if heat < 25.0 {
            RiskTier::Low
        } else if heat < 50.0 {
            RiskTier::Medium
        } else if heat < 75.0 {
            RiskTier::High
        } else {
            RiskTier::Extreme
        }
    }

    /// Tier of the heat an action would reach if noticed.
    pub fn projected(heat: f64, incoming_heat: f64) -> Self {
        Self::from_heat((heat + incoming_heat).min(100.0))
    }

    /// Chance that the action draws a casualty roll.
    pub fn trigger_probability(self) -> f64 {
        match self {
            RiskTier::Low => 0.05,
            RiskTier::Medium => 0.25,
            RiskTier::High => 0.55,
            RiskTier::Extreme => 0.75,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Extreme => "extreme",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arrests and deaths from one roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Casualties {
    pub imprisoned: u64,
    pub killed: u64,
}

impl Casualties {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.imprisoned == 0 && self.killed == 0
    }
}

/// Larger movements put more people on the street.
pub fn size_factor(active_participants: u64) -> f64 {
    if active_participants < 100 {
        0.1
    } else if active_participants < 1000 {
        0.3
    } else {
        0.5
    }
}

pub fn heat_factor(heat: f64) -> f64 {
    (heat / 100.0).max(0.5)
}

/// Samples the integer range `low..=high` as a real in `[low, high + 1)`.
fn span(rng: &mut dyn RandomSource, low: u64, high: u64) -> f64 {
    rng.uniform(low as f64, (high + 1) as f64)
}

/// Rolls casualties for a triggered risk.
///
/// Draw order: imprisoned, killed (high and extreme only), then the direct
/// bonus draws.
pub fn roll_casualties(
    tier: RiskTier,
    kind: ActionKind,
    active_participants: u64,
    heat: f64,
    rng: &mut dyn RandomSource,
) -> Casualties {
    let low_risk = if kind.is_low_exposure() { 0.1 } else { 1.0 };
    let factor = size_factor(active_participants) * low_risk;
    let hf = heat_factor(heat);
    let direct = kind.is_direct();

    let mut out = Casualties::none();
    match tier {
        RiskTier::Low => {
            out.imprisoned = (span(rng, 1, 2) * factor).floor() as u64;
            if direct && rng.chance(0.05) {
                out.killed += 1;
            }
        }
        RiskTier::Medium => {
            out.imprisoned = (span(rng, 2, 6) * factor).floor() as u64;
            if direct && rng.chance(0.15) {
                out.killed += span(rng, 1, 2).floor() as u64;
            }
        }
        RiskTier::High => {
            out.imprisoned = (span(rng, 3, 10) * factor * hf).floor() as u64;
            out.killed = (span(rng, 1, 3) * factor * hf).floor() as u64;
            if direct {
                out.killed += span(rng, 1, 2).floor() as u64;
            }
        }
        RiskTier::Extreme => {
            out.imprisoned = (span(rng, 5, 16) * factor * hf).floor() as u64;
            out.killed = (span(rng, 2, 6) * factor * hf).floor() as u64;
            if direct {
                out.killed += (span(rng, 1, 3) * hf).floor() as u64;
            }
        }
    }
    out
}

/// Result of assessing one action's risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub trigger_probability: f64,
    pub triggered: bool,
    pub casualties: Casualties,
}

/// Classifies the action and, if the trigger draw lands, rolls casualties.
///
/// Consumes one trigger draw plus the casualty draws when triggered.
pub fn assess(
    kind: ActionKind,
    heat: f64,
    heat_gain: u64,
    active_participants: u64,
    rng: &mut dyn RandomSource,
) -> RiskAssessment {
    let tier = RiskTier::projected(heat, heat_gain as f64);
    let trigger_probability = tier.trigger_probability();
    let triggered = rng.chance(trigger_probability);
    let casualties = if triggered {
        roll_casualties(tier, kind, active_participants, heat, rng)
    } else {
        Casualties::none()
    };

    tracing::debug!(
        action = %kind,
        tier = %tier,
        triggered,
        imprisoned = casualties.imprisoned,
        killed = casualties.killed,
        "risk assessed"
    );

    RiskAssessment {
        tier,
        trigger_probability,
        triggered,
        casualties,
    }
}
