//! Recruitment Engine
//!
//! Organic growth of active participants. Growth follows the existing
//! network, slows as the movement saturates the city and stalls under heavy
//! surveillance.

use crate::actions::ActionCategory;
use crate::rng::RandomSource;

/// Participation at which the city is treated as saturated.
pub const SATURATION_CEILING: f64 = 0.25;
pub const MIN_RECRUITMENT: u64 = 50;

/// How an action category recruits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecruitmentStyle {
    Mobilizing,
    Organizing,
    Cultural,
}

impl RecruitmentStyle {
    /// Direct and digital actions do not recruit.
    pub fn for_category(category: ActionCategory) -> Option<Self> {
        match category {
            ActionCategory::Mobilizing => Some(RecruitmentStyle::Mobilizing),
            ActionCategory::Organizing => Some(RecruitmentStyle::Organizing),
            ActionCategory::Cultural => Some(RecruitmentStyle::Cultural),
            ActionCategory::Direct | ActionCategory::Digital => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            RecruitmentStyle::Mobilizing => 1.5,
            RecruitmentStyle::Organizing => 1.2,
            RecruitmentStyle::Cultural => 0.8,
        }
    }
}

fn safety_bonus(heat: f64) -> f64 {
    if heat < 40.0 {
        1.5
    } else if heat < 70.0 {
        1.0
    } else {
        0.5
    }
}

/// Participants gained by one action.
///
/// Bounded by `[50, floor(0.05 * headroom)]`; when the headroom bound is
/// below 50 it wins. Consumes one draw unless the population is exhausted.
pub fn recruitment_gain(
    style: RecruitmentStyle,
    active_participants: u64,
    total_population: u64,
    heat: f64,
    power: f64,
    rng: &mut dyn RandomSource,
) -> u64 {
    if total_population == 0 || active_participants >= total_population {
        return 0;
    }

    let base = rng.uniform(100.0, 200.0);
    let active = active_participants as f64;
    let participation = active / total_population as f64;

    let network = active.powf(0.85);
    let saturation = (1.0 - participation / SATURATION_CEILING).max(0.0);
    let critical_mass = if participation > 0.001 { 5.0 } else { 1.0 };
    let morale = 1.0 + power / 50.0;

    let raw = base
        + network * saturation * critical_mass * safety_bonus(heat) * morale * style.multiplier();
    let gain = raw.floor() as u64;

    let upper = (0.05 * (total_population - active_participants) as f64).floor() as u64;
    gain.max(MIN_RECRUITMENT).min(upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;

    #[test]
    fn test_style_for_category() {
        assert_eq!(
            RecruitmentStyle::for_category(ActionCategory::Mobilizing),
            Some(RecruitmentStyle::Mobilizing)
        );
        assert_eq!(RecruitmentStyle::for_category(ActionCategory::Direct), None);
        assert_eq!(RecruitmentStyle::for_category(ActionCategory::Digital), None);
    }

    #[test]
    fn test_small_movement_gain() {
        let mut rng = ScriptedRng::constant(0.0);
        // base 100, network 100^0.85 = 50.12, f tiny → no critical mass,
        // heat 10 → safety 1.5, power 0 → morale 1, cultural 0.8
        let gain = recruitment_gain(
            RecruitmentStyle::Cultural,
            100,
            10_000_000,
            10.0,
            0.0,
            &mut rng,
        );
        assert_eq!(gain, 160);
    }

    #[test]
    fn test_gain_within_bounds() {
        let cases = [
            (50, 8_000_000),
            (1_000, 10_000_000),
            (50_000, 10_000_000),
            (2_000_000, 10_000_000),
            (2_600_000, 10_000_000),
            (1_000, 1_100),
        ];
        for (active, total) in cases {
            for heat in [0.0, 50.0, 90.0] {
                for draw in [0.0, 0.5, 0.999] {
                    let mut rng = ScriptedRng::constant(draw);
                    let gain = recruitment_gain(
                        RecruitmentStyle::Mobilizing,
                        active,
                        total,
                        heat,
                        60.0,
                        &mut rng,
                    );
                    let upper = (0.05 * (total - active) as f64).floor() as u64;
                    assert!(gain <= upper);
                    if upper >= MIN_RECRUITMENT {
                        assert!(gain >= MIN_RECRUITMENT, "{} of {}", active, total);
                    }
                }
            }
        }
    }

    #[test]
    fn test_headroom_bound_wins_over_minimum() {
        let mut rng = ScriptedRng::constant(0.5);
        // headroom 100 → upper bound 5
        let gain = recruitment_gain(RecruitmentStyle::Organizing, 900, 1_000, 0.0, 0.0, &mut rng);
        assert_eq!(gain, 5);
    }

    #[test]
    fn test_exhausted_population() {
        let mut rng = ScriptedRng::constant(0.5);
        assert_eq!(
            recruitment_gain(RecruitmentStyle::Mobilizing, 0, 0, 0.0, 0.0, &mut rng),
            0
        );
        assert_eq!(
            recruitment_gain(RecruitmentStyle::Mobilizing, 500, 500, 0.0, 0.0, &mut rng),
            0
        );
        // neither call consumed a draw
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn test_heat_slows_growth() {
        let calm = recruitment_gain(
            RecruitmentStyle::Mobilizing,
            20_000,
            10_000_000,
            10.0,
            20.0,
            &mut ScriptedRng::constant(0.5),
        );
        let hot = recruitment_gain(
            RecruitmentStyle::Mobilizing,
            20_000,
            10_000_000,
            80.0,
            20.0,
            &mut ScriptedRng::constant(0.5),
        );
        assert!(calm > hot);
    }
}
