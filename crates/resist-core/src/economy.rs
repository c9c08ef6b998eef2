//! Economy Engine
//!
//! Action pricing, passive income ("mining") and the two burst income
//! mechanisms. All functions here are pure; the session applies their
//! results through the world-state mutators.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actions::ActionKind;
use crate::rng::RandomSource;

/// No action is ever sold for less than this.
pub const MIN_ACTION_PRICE: u64 = 100;

/// Fraction of the city that must be active before income unlocks.
pub const INCOME_THRESHOLD_FRACTION: f64 = 0.0001;

/// Mining never pays more than this per cycle.
pub const MINING_CAP: u64 = 5_000;
pub const MINING_FLOOR: u64 = 10;
/// Mining is visible to surveillance and always adds this much heat.
pub const MINING_HEAT: f64 = 1.0;

pub const CROWDFUNDING_COST: u64 = 500;
pub const CROWDFUNDING_HEAT: f64 = 3.0;
pub const COLLECTIBLE_HEAT: f64 = 8.0;

/// Burst income mechanisms, each with its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningKind {
    /// Tiered digital collectible sale
    CollectibleSale,
    Crowdfunding,
}

impl EarningKind {
    pub fn all() -> &'static [EarningKind] {
        &[EarningKind::CollectibleSale, EarningKind::Crowdfunding]
    }

    pub fn cooldown_ms(self) -> u64 {
        match self {
            EarningKind::CollectibleSale => 45_000,
            EarningKind::Crowdfunding => 60_000,
        }
    }

    /// Heat added on a successful earning.
    pub fn heat(self) -> f64 {
        match self {
            EarningKind::CollectibleSale => COLLECTIBLE_HEAT,
            EarningKind::Crowdfunding => CROWDFUNDING_HEAT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EarningKind::CollectibleSale => "collectible_sale",
            EarningKind::Crowdfunding => "crowdfunding",
        }
    }
}

impl fmt::Display for EarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EarningKind::CollectibleSale => "Collectible sale",
            EarningKind::Crowdfunding => "Crowdfunding",
        };
        f.write_str(label)
    }
}

/// Price of an action given the current heat, the selected target and power.
pub fn action_price(kind: ActionKind, heat: f64, target_threatened: bool, power: f64) -> u64 {
    let heat_multiplier = 1.0 + heat / 200.0;
    let emergency_discount = if target_threatened { 0.5 } else { 1.0 };
    let bulk_discount = if power > 50.0 { 0.9 } else { 1.0 };

    let price = kind.spec().base_cost as f64 * heat_multiplier * emergency_discount * bulk_discount;
    (price.floor() as u64).max(MIN_ACTION_PRICE)
}

/// Active participants needed before mining and crowdfunding unlock.
pub fn population_threshold(total_population: u64) -> u64 {
    (total_population as f64 * INCOME_THRESHOLD_FRACTION).floor() as u64
}

pub fn income_unlocked(active_participants: u64, total_population: u64) -> bool {
    active_participants >= population_threshold(total_population)
}

/// Currency produced by one mining cycle. Consumes one draw.
pub fn mining_rate(
    active_participants: u64,
    infrastructure_bonus: u32,
    heat: f64,
    rng: &mut dyn RandomSource,
) -> u64 {
    let network = (active_participants as f64).powf(1.5) / 1000.0;
    let base = network + rng.uniform(50.0, 150.0);
    let infrastructure = 1.0 + 0.3 * infrastructure_bonus as f64;
    let heat_penalty = (1.0 - heat / 200.0).max(0.1);

    let rate = (base * infrastructure * heat_penalty).floor() as u64;
    rate.clamp(MINING_FLOOR, MINING_CAP)
}

/// Cost and reward range of one collectible tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectibleTier {
    pub cost: u64,
    pub reward: (u64, u64),
}

/// Tier selected by current power.
pub fn collectible_tier(power: f64) -> CollectibleTier {
    if power <= 25.0 {
        CollectibleTier {
            cost: 1_000,
            reward: (2_000, 4_000),
        }
    } else if power <= 50.0 {
        CollectibleTier {
            cost: 2_500,
            reward: (6_000, 10_000),
        }
    } else {
        CollectibleTier {
            cost: 5_000,
            reward: (15_000, 25_000),
        }
    }
}

impl CollectibleTier {
    /// Samples the reward. Consumes one draw.
    pub fn roll_reward(&self, rng: &mut dyn RandomSource) -> u64 {
        rng.int_inclusive(self.reward.0, self.reward.1)
    }
}

pub fn crowdfunding_reward(active_participants: u64, power: f64) -> u64 {
    let raw = active_participants as f64 * 10.0 + power * 100.0;
    (raw.floor() as u64).clamp(2_000, 30_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;

    #[test]
    fn test_price_modifiers() {
        // base 2000, heat 0, not threatened, low power
        assert_eq!(action_price(ActionKind::Protest, 0.0, false, 0.0), 2000);
        // heat 100 → ×1.5
        assert_eq!(action_price(ActionKind::Protest, 100.0, false, 0.0), 3000);
        // threatened → ×0.5
        assert_eq!(action_price(ActionKind::Protest, 0.0, true, 0.0), 1000);
        // power > 50 → ×0.9
        assert_eq!(action_price(ActionKind::Protest, 0.0, false, 51.0), 1800);
        assert_eq!(action_price(ActionKind::Protest, 0.0, false, 50.0), 2000);
    }

    #[test]
    fn test_price_never_below_minimum() {
        for kind in ActionKind::all() {
            for heat in [0.0, 25.0, 50.0, 100.0] {
                assert!(action_price(*kind, heat, true, 90.0) >= MIN_ACTION_PRICE);
            }
        }
        assert_eq!(action_price(ActionKind::Garden, 0.0, true, 0.0), MIN_ACTION_PRICE);
    }

    #[test]
    fn test_price_monotonic_in_heat() {
        for kind in ActionKind::all() {
            let mut last = 0;
            for heat in 0..=100 {
                let price = action_price(*kind, heat as f64, false, 0.0);
                assert!(price >= last, "{} at heat {}", kind, heat);
                last = price;
            }
        }
    }

    #[test]
    fn test_population_threshold_scenario() {
        assert_eq!(population_threshold(10_000_000), 1000);
        assert!(!income_unlocked(50, 10_000_000));
        assert!(!income_unlocked(999, 10_000_000));
        assert!(income_unlocked(1001, 10_000_000));
    }

    #[test]
    fn test_mining_rate_bounds() {
        let mut rng = ScriptedRng::constant(0.0);
        // tiny network, max heat: (0.0 + 50) * 1 * 0.5 = 25
        assert_eq!(mining_rate(1, 0, 100.0, &mut rng), 25);

        // huge network is capped
        assert_eq!(mining_rate(1_000_000, 3, 0.0, &mut rng), MINING_CAP);
    }

    #[test]
    fn test_mining_rate_infrastructure_bonus() {
        let mut rng = ScriptedRng::constant(0.5);
        // network 1000^1.5/1000 = 31.62..; base 131.62; ×1.6 = 210.6
        assert_eq!(mining_rate(1000, 2, 0.0, &mut rng), 210);
    }

    #[test]
    fn test_collectible_tiers() {
        assert_eq!(collectible_tier(25.0).cost, 1_000);
        assert_eq!(collectible_tier(25.1).cost, 2_500);
        assert_eq!(collectible_tier(50.0).cost, 2_500);
        assert_eq!(collectible_tier(80.0).reward, (15_000, 25_000));

        let mut rng = ScriptedRng::new([0.0, 0.999_999]);
        let tier = collectible_tier(10.0);
        assert_eq!(tier.roll_reward(&mut rng), 2_000);
        assert_eq!(tier.roll_reward(&mut rng), 4_000);
    }

    #[test]
    fn test_crowdfunding_reward_clamped() {
        assert_eq!(crowdfunding_reward(50, 0.0), 2_000);
        assert_eq!(crowdfunding_reward(1_500, 20.0), 17_000);
        assert_eq!(crowdfunding_reward(1_000_000, 100.0), 30_000);
    }

    #[test]
    fn test_earning_kind_display() {
        assert_eq!(EarningKind::Crowdfunding.to_string(), "Crowdfunding");
        assert_eq!(
            serde_json::to_string(&EarningKind::CollectibleSale).unwrap(),
            r#""collectible_sale""#
        );
        assert_eq!(EarningKind::CollectibleSale.cooldown_ms(), 45_000);
    }
}
