//! Community Activity
//!
//! Citizens organize on their own between player actions, a little more
//! when zones are under threat and a little less under heavy surveillance.

use crate::rng::RandomSource;

pub const MAX_ACTIVITY: f64 = 0.20;
/// Organic growth stops once power is this high.
pub const ORGANIC_POWER_CAP: f64 = 90.0;
/// Heat above which an escalation provokes a community response.
pub const RESPONSE_HEAT: f64 = 70.0;
/// Power the community response needs before it adds any.
pub const RESPONSE_MIN_POWER: f64 = 30.0;
pub const RESPONSE_POWER: f64 = 2.0;

/// Chance citizens act on an autonomous tick.
pub fn activity_probability(power: f64, threatened_count: usize, heat: f64) -> f64 {
    let base = 0.05 + 0.001 * power + 0.02 * threatened_count as f64;
    let suppression = if heat > RESPONSE_HEAT { 0.7 } else { 1.0 };
    (base * suppression).min(MAX_ACTIVITY)
}

/// Rolls community activity. Consumes one draw.
pub fn roll_activity(
    power: f64,
    threatened_count: usize,
    heat: f64,
    rng: &mut dyn RandomSource,
) -> bool {
    rng.chance(activity_probability(power, threatened_count, heat))
}

/// Power the community adds when it acts.
pub fn organic_power(power: f64) -> f64 {
    if power < ORGANIC_POWER_CAP {
        1.0
    } else {
        0.0
    }
}

/// Power added by the community's response to an escalation.
pub fn escalation_response_power(heat: f64, power: f64) -> Option<f64> {
    if heat <= RESPONSE_HEAT {
        return None;
    }
    Some(if power > RESPONSE_MIN_POWER { RESPONSE_POWER } else { 0.0 })
}
