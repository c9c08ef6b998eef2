//! Configuration System
//!
//! Session tuning loaded from TOML. Every section is optional; missing
//! values fall back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Default tuning file path
pub const DEFAULT_TUNING_PATH: &str = "tuning.toml";

/// Complete session tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Session length and starting values
    #[serde(default)]
    pub session: SessionConfig,
    /// Timer intervals
    #[serde(default)]
    pub timing: TimingConfig,
    /// Adversary escalation knobs
    #[serde(default)]
    pub escalation: EscalationConfig,
    /// Contested zones, in display order
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetConfig>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            timing: TimingConfig::default(),
            escalation: EscalationConfig::default(),
            targets: default_targets(),
        }
    }
}

impl Tuning {
    /// Loads tuning from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses tuning from a TOML string and validates it.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let tuning: Tuning = toml::from_str(content)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Serializes the tuning back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects tunings the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        if s.duration_secs == 0 {
            return Err(ConfigError::Invalid("session.duration_secs must be positive".into()));
        }
        if s.participants_min > s.participants_max {
            return Err(ConfigError::Invalid(
                "session.participants_min exceeds participants_max".into(),
            ));
        }
        if s.population_min > s.population_max {
            return Err(ConfigError::Invalid(
                "session.population_min exceeds population_max".into(),
            ));
        }
        if s.participants_max > s.population_min {
            return Err(ConfigError::Invalid(
                "session.participants_max exceeds population_min".into(),
            ));
        }

        let t = &self.timing;
        if t.tick_interval_ms == 0 || t.mining_interval_ms == 0 {
            return Err(ConfigError::Invalid("timing intervals must be positive".into()));
        }

        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("at least one target is required".into()));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate target id '{}'", target.id)));
            }
            if !(0.0..=100.0).contains(&target.resistance) || target.timer_minutes < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "target '{}' has out-of-range resistance or timer",
                    target.id
                )));
            }
        }
        Ok(())
    }
}

/// Session length and starting values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed session length
    pub duration_secs: u64,
    pub starting_currency: u64,
    /// Inclusive range for the randomized starting participant count
    pub participants_min: u64,
    pub participants_max: u64,
    /// Inclusive range for the randomized city population
    pub population_min: u64,
    pub population_max: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 15 * 60,
            starting_currency: 1500,
            participants_min: 50,
            participants_max: 200,
            population_min: 8_000_000,
            population_max: 12_000_000,
        }
    }
}

/// Timer intervals, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Autonomous adversary / community tick
    pub tick_interval_ms: u64,
    /// Passive income cycle
    pub mining_interval_ms: u64,
    /// Anti-spam gate between any two actions
    pub global_cooldown_ms: u64,
    /// Pause before the adversary reacts to an action
    pub notice_delay_ms: u64,
    /// Pause before the neighborhood reacts to an action
    pub citizen_delay_ms: u64,
    /// How long the narrative collaborator may take before the fallback is used
    pub judge_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            mining_interval_ms: 15_000,
            global_cooldown_ms: 3_000,
            notice_delay_ms: 1_000,
            citizen_delay_ms: 2_500,
            judge_timeout_ms: 5_000,
        }
    }
}

/// Adversary escalation knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Heat added by each escalation
    pub heat_per_escalation: f64,
    /// Minutes cut from every threatened timer by an escalation
    pub timer_cut_minutes: f64,
    /// Escalations never push a timer below this
    pub timer_floor_minutes: f64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            heat_per_escalation: 3.0,
            timer_cut_minutes: 8.0,
            timer_floor_minutes: 1.0,
        }
    }
}

/// Starting definition of one contested zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    pub name: String,
    pub resistance: f64,
    pub timer_minutes: f64,
    pub threatened: bool,
    pub population: u64,
}

impl TargetConfig {
    pub fn new(
        id: &str,
        name: &str,
        resistance: f64,
        timer_minutes: f64,
        threatened: bool,
        population: u64,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            resistance,
            timer_minutes,
            threatened,
            population,
        }
    }
}

fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig::new("market", "Market District", 5.0, 6.5, true, 1200),
        TargetConfig::new("riverside", "Riverside", 12.0, 10.5, true, 850),
        TargetConfig::new("oldtown", "Old Town", 25.0, 18.0, false, 950),
        TargetConfig::new("industrial", "Industrial Quarter", 8.0, 4.2, true, 600),
    ]
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid tuning: {0}")]
    Invalid(String),
}

/// Generates a default tuning file content.
pub fn default_tuning_toml() -> String {
    r#"# Resistance simulation tuning

[session]
duration_secs = 900
starting_currency = 1500
participants_min = 50
participants_max = 200
population_min = 8000000
population_max = 12000000

[timing]
tick_interval_ms = 5000
mining_interval_ms = 15000
global_cooldown_ms = 3000
notice_delay_ms = 1000
citizen_delay_ms = 2500
judge_timeout_ms = 5000

[escalation]
heat_per_escalation = 3.0
timer_cut_minutes = 8.0
timer_floor_minutes = 1.0

[[targets]]
id = "market"
name = "Market District"
resistance = 5.0
timer_minutes = 6.5
threatened = true
population = 1200

[[targets]]
id = "riverside"
name = "Riverside"
resistance = 12.0
timer_minutes = 10.5
threatened = true
population = 850

[[targets]]
id = "oldtown"
name = "Old Town"
resistance = 25.0
timer_minutes = 18.0
threatened = false
population = 950

[[targets]]
id = "industrial"
name = "Industrial Quarter"
resistance = 8.0
timer_minutes = 4.2
threatened = true
population = 600
"#
    .to_string()
}
