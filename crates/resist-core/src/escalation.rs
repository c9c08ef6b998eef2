//! Escalation Controller
//!
//! The adversary's side of the feedback loop: whether it notices an action,
//! how often it acts on its own, what an escalation costs the movement, and
//! the heat floor that ratchets up as surveillance tightens.

use serde::{Deserialize, Serialize};

use crate::actions::Exposure;
use crate::config::EscalationConfig;
use crate::risk::Casualties;
use crate::rng::RandomSource;

/// Heat levels that, once crossed, become the new floor.
pub const HEAT_THRESHOLDS: [f64; 3] = [25.0, 50.0, 75.0];
pub const MAX_HEAT: f64 = 100.0;
pub const MAX_AGGRESSION: f64 = 0.80;

/// Non-decreasing heat floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatRatchet {
    min_heat: f64,
}

impl HeatRatchet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_heat(&self) -> f64 {
        self.min_heat
    }

    /// Applies a heat delta and returns the new heat.
    ///
    /// The result is clamped into `[min_heat, 100]`, then every threshold the
    /// new heat has reached is locked in as the floor.
    pub fn apply(&mut self, heat: f64, delta: f64) -> f64 {
        let next = (heat + delta).clamp(self.min_heat, MAX_HEAT);
        for threshold in HEAT_THRESHOLDS {
            if next >= threshold && self.min_heat < threshold {
                self.min_heat = threshold;
            }
        }
        next.max(self.min_heat)
    }
}

/// Chance the adversary notices an action at this heat, before exposure.
pub fn base_notice_probability(heat: f64) -> f64 {
    if heat < 20.0 {
        0.10
    } else if heat < 40.0 {
        0.30
    } else if heat < 60.0 {
        0.60
    } else {
        0.90
    }
}

/// Notice chance adjusted for how visible the action is.
pub fn notice_probability(heat: f64, exposure: Exposure) -> f64 {
    let base = base_notice_probability(heat);
    match exposure {
        Exposure::Stealth => (base * 0.7).min(0.50),
        Exposure::Loud => (base * 1.5).min(1.0),
        Exposure::Normal => base,
    }
}

/// Outcome of a detection roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoticeRoll {
    pub probability: f64,
    pub noticed: bool,
}

/// Rolls detection. Consumes one draw.
pub fn roll_notice(heat: f64, exposure: Exposure, rng: &mut dyn RandomSource) -> NoticeRoll {
    let probability = notice_probability(heat, exposure);
    NoticeRoll {
        probability,
        noticed: rng.chance(probability),
    }
}

/// Chance the adversary acts on an autonomous tick.
pub fn aggression_probability(power: f64, liberated_count: usize, heat: f64) -> f64 {
    let pressure = if heat > 50.0 { 0.01 * (heat - 50.0) } else { 0.0 };
    (0.30 + 0.005 * power + 0.10 * liberated_count as f64 + pressure).clamp(0.0, MAX_AGGRESSION)
}

/// What the adversary does on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdversaryMove {
    /// Crackdown: more heat, arrests, shorter timers
    Escalation,
    /// Flavor only, with arrests once heat is high
    Routine,
}

/// Decides whether and how the adversary acts.
///
/// Consumes the aggression draw and, when it lands, the escalation draw.
pub fn decide_move(
    power: f64,
    liberated_count: usize,
    heat: f64,
    rng: &mut dyn RandomSource,
) -> Option<AdversaryMove> {
    if !rng.chance(aggression_probability(power, liberated_count, heat)) {
        return None;
    }
    if rng.chance(heat / 100.0) {
        Some(AdversaryMove::Escalation)
    } else {
        Some(AdversaryMove::Routine)
    }
}

/// Arrests and deaths of an escalation. Consumes two draws.
pub fn escalation_casualties(
    active_participants: u64,
    heat: f64,
    rng: &mut dyn RandomSource,
) -> Casualties {
    let scale = (active_participants as f64 / 1000.0).max(0.1);
    let pressure = (heat / 40.0).max(1.0);
    Casualties {
        imprisoned: (rng.uniform(1.0, 5.0) * scale * pressure).floor() as u64,
        killed: (rng.uniform(0.0, 2.0) * scale * pressure).floor() as u64,
    }
}

/// Arrests from a routine move. Only draws when heat is above 50.
pub fn routine_arrests(heat: f64, total_population: u64, rng: &mut dyn RandomSource) -> u64 {
    if heat <= 50.0 {
        return 0;
    }
    (total_population as f64 * rng.uniform(1e-6, 5e-6)).floor() as u64
}

/// A threatened timer after an escalation cut.
pub fn cut_timer(timer_minutes: f64, config: &EscalationConfig) -> f64 {
    if timer_minutes <= 0.0 {
        return timer_minutes;
    }
    (timer_minutes - config.timer_cut_minutes).max(config.timer_floor_minutes)
}
