//! Contested zones.

use serde::{Deserialize, Serialize};
use std::fmt;

use resist_events::TargetSnapshot;

use crate::config::{EscalationConfig, TargetConfig};
use crate::escalation::cut_timer;

/// Resistance at which a zone is liberated.
pub const LIBERATION_THRESHOLD: f64 = 60.0;
/// Below this a zone whose timer runs out is gentrified.
pub const DEFENSE_THRESHOLD: f64 = 40.0;
pub const DEFENSE_RESISTANCE_BONUS: f64 = 10.0;

/// Identifier of a target, e.g. `"market"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened when a threatened zone's timer ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The adversary took the zone
    Gentrified,
    /// The community held it; `liberated` is set if the bonus crossed the
    /// liberation threshold
    Defended { liberated: bool },
}

/// A contested zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub(crate) id: TargetId,
    pub(crate) name: String,
    pub(crate) resistance: f64,
    pub(crate) timer_minutes: f64,
    pub(crate) threatened: bool,
    pub(crate) liberated: bool,
    pub(crate) gentrified: bool,
    pub(crate) population: u64,
}

impl Target {
    pub fn from_config(config: &TargetConfig) -> Self {
        let resistance = config.resistance.clamp(0.0, 100.0);
        let liberated = resistance >= LIBERATION_THRESHOLD;
        Self {
            id: TargetId::new(config.id.clone()),
            name: config.name.clone(),
            resistance,
            timer_minutes: config.timer_minutes.max(0.0),
            threatened: config.threatened && !liberated,
            liberated,
            gentrified: false,
            population: config.population,
        }
    }

    pub fn id(&self) -> &TargetId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    pub fn timer_minutes(&self) -> f64 {
        self.timer_minutes
    }

    pub fn is_threatened(&self) -> bool {
        self.threatened
    }

    pub fn is_liberated(&self) -> bool {
        self.liberated
    }

    pub fn is_gentrified(&self) -> bool {
        self.gentrified
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    /// Adds resistance, clamped to `[0, 100]`. Returns true exactly once,
    /// on the call that liberates the zone.
    pub(crate) fn add_resistance(&mut self, amount: f64) -> bool {
        self.resistance = (self.resistance + amount).clamp(0.0, 100.0);
        if self.resistance >= LIBERATION_THRESHOLD {
            self.threatened = false;
            if !self.liberated {
                self.liberated = true;
                return true;
            }
        }
        false
    }

    /// Runs the gentrification clock down by `minutes`.
    pub(crate) fn advance_timer(&mut self, minutes: f64) -> Option<TimerOutcome> {
        if !self.threatened {
            return None;
        }
        let next = (self.timer_minutes - minutes).max(0.0);
        self.timer_minutes = (next * 100.0).round() / 100.0;
        if self.timer_minutes > 0.0 {
            return None;
        }

        self.threatened = false;
        if self.resistance < DEFENSE_THRESHOLD {
            self.gentrified = true;
            self.resistance = 0.0;
            Some(TimerOutcome::Gentrified)
        } else {
            let liberated = self.add_resistance(DEFENSE_RESISTANCE_BONUS);
            Some(TimerOutcome::Defended { liberated })
        }
    }

    /// Escalation cut on a threatened zone's clock.
    pub(crate) fn shorten_timer(&mut self, config: &EscalationConfig) {
        if self.threatened {
            self.timer_minutes = cut_timer(self.timer_minutes, config);
        }
    }

    pub fn snapshot(&self) -> TargetSnapshot {
        TargetSnapshot {
            id: self.id.to_string(),
            name: self.name.clone(),
            resistance: self.resistance,
            timer_minutes: self.timer_minutes,
            threatened: self.threatened,
            liberated: self.liberated,
            gentrified: self.gentrified,
            population: self.population,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> Target {
        Target::from_config(&TargetConfig::new("market", "Market District", 5.0, 6.5, true, 1200))
    }

    #[test]
    fn test_liberation_happens_once() {
        let mut t = market();
        assert!(!t.add_resistance(50.0));
        assert!(t.is_threatened());

        assert!(t.add_resistance(10.0));
        assert!(!t.is_threatened());
        assert!(t.is_liberated());

        assert!(!t.add_resistance(10.0));
        assert!(!t.add_resistance(100.0));
        assert_eq!(t.resistance(), 100.0);
    }

    #[test]
    fn test_timer_decay_rounds_to_hundredths() {
        let mut t = market();
        assert_eq!(t.advance_timer(5.0 / 60.0), None);
        assert_eq!(t.timer_minutes(), 6.42);
    }

    #[test]
    fn test_gentrified_when_weak() {
        let mut t = market();
        t.timer_minutes = 0.05;
        assert_eq!(t.advance_timer(0.0833), Some(TimerOutcome::Gentrified));
        assert!(t.is_gentrified());
        assert!(!t.is_threatened());
        assert_eq!(t.resistance(), 0.0);

        // no further outcomes once resolved
        assert_eq!(t.advance_timer(1.0), None);
    }

    #[test]
    fn test_defended_when_strong() {
        let mut t = market();
        t.resistance = 45.0;
        t.timer_minutes = 0.01;
        assert_eq!(
            t.advance_timer(0.5),
            Some(TimerOutcome::Defended { liberated: false })
        );
        assert_eq!(t.resistance(), 55.0);
        assert!(!t.is_threatened());

        let mut t = market();
        t.resistance = 52.0;
        t.timer_minutes = 0.01;
        assert_eq!(
            t.advance_timer(0.5),
            Some(TimerOutcome::Defended { liberated: true })
        );
    }

    #[test]
    fn test_unthreatened_timer_is_frozen() {
        let mut t = Target::from_config(&TargetConfig::new("oldtown", "Old Town", 25.0, 18.0, false, 950));
        assert_eq!(t.advance_timer(100.0), None);
        assert_eq!(t.timer_minutes(), 18.0);

        t.shorten_timer(&EscalationConfig::default());
        assert_eq!(t.timer_minutes(), 18.0);
    }

    #[test]
    fn test_shorten_timer_floors_at_one_minute() {
        let mut t = market();
        t.shorten_timer(&EscalationConfig::default());
        assert_eq!(t.timer_minutes(), 1.0);
    }
}
