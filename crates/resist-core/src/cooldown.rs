//! Cooldown Manager
//!
//! Per-action-per-target cooldowns, earning cooldowns and the global
//! anti-spam gate. Expiries are absolute session timestamps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use resist_events::SessionTime;

use crate::actions::ActionKind;
use crate::economy::EarningKind;
use crate::state::TargetId;

pub const MIN_ACTION_COOLDOWN_MS: u64 = 500;
pub const MAX_ACTION_COOLDOWN_MS: u64 = 180_000;

/// Cooldown earned by an action, from the heat and power it generated.
///
/// Base 500 ms, up to +150 s from heat intensity and +30 s from power
/// intensity, capped at three minutes.
pub fn action_cooldown_ms(heat_gain: u64, power_gain: u64) -> u64 {
    let heat_part = heat_gain as f64 / 25.0 * 150_000.0;
    let power_part = power_gain as f64 / 12.0 * 30_000.0;
    let total = (MIN_ACTION_COOLDOWN_MS as f64 + heat_part + power_part).floor() as u64;
    total.clamp(MIN_ACTION_COOLDOWN_MS, MAX_ACTION_COOLDOWN_MS)
}

/// Key of a per-action-per-target cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionTargetKey {
    pub action: ActionKind,
    pub target: TargetId,
}

impl ActionTargetKey {
    pub fn new(action: ActionKind, target: TargetId) -> Self {
        Self { action, target }
    }
}

impl fmt::Display for ActionTargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.action, self.target)
    }
}

/// Map of key to expiry timestamp.
#[derive(Debug, Clone)]
pub struct KeyedCooldowns<K> {
    expiries: HashMap<K, SessionTime>,
}

impl<K> Default for KeyedCooldowns<K> {
    fn default() -> Self {
        Self {
            expiries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedCooldowns<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on_cooldown(&self, key: &K, now: SessionTime) -> bool {
        self.remaining(key, now) > 0
    }

    /// Milliseconds left, zero when the key is free.
    pub fn remaining(&self, key: &K, now: SessionTime) -> u64 {
        self.expiries
            .get(key)
            .map(|expiry| expiry.as_millis().saturating_sub(now.as_millis()))
            .unwrap_or(0)
    }

    /// Starts a cooldown and returns its expiry.
    pub fn set(&mut self, key: K, now: SessionTime, duration_ms: u64) -> SessionTime {
        let expiry = now.saturating_add(duration_ms);
        self.expiries.insert(key, expiry);
        expiry
    }

    pub fn clear(&mut self, key: &K) {
        self.expiries.remove(key);
    }

    /// Clears the key only if its expiry has passed. Returns true if removed.
    ///
    /// Scheduled expiry timers call this, so a late timer never clears a
    /// newer cooldown on the same key.
    pub fn clear_if_expired(&mut self, key: &K, now: SessionTime) -> bool {
        match self.expiries.get(key) {
            Some(expiry) if *expiry <= now => {
                self.expiries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn sweep(&mut self, now: SessionTime) -> usize {
        let before = self.expiries.len();
        self.expiries.retain(|_, expiry| *expiry > now);
        before - self.expiries.len()
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    pub fn clear_all(&mut self) {
        self.expiries.clear();
    }
}

/// Fixed cooldown measured from the last action, independent of its kind.
#[derive(Debug, Clone)]
pub struct GlobalCooldown {
    duration_ms: u64,
    last_action: Option<SessionTime>,
}

impl GlobalCooldown {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            last_action: None,
        }
    }

    pub fn remaining(&self, now: SessionTime) -> u64 {
        match self.last_action {
            Some(last) => last
                .saturating_add(self.duration_ms)
                .as_millis()
                .saturating_sub(now.as_millis()),
            None => 0,
        }
    }

    pub fn is_on_cooldown(&self, now: SessionTime) -> bool {
        self.remaining(now) > 0
    }

    /// Records an action at `now`.
    pub fn set(&mut self, now: SessionTime) {
        self.last_action = Some(now);
    }

    pub fn clear(&mut self) {
        self.last_action = None;
    }

    pub fn last_action(&self) -> Option<SessionTime> {
        self.last_action
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// All cooldown state of one session.
#[derive(Debug, Clone)]
pub struct Cooldowns {
    pub actions: KeyedCooldowns<ActionTargetKey>,
    pub earnings: KeyedCooldowns<EarningKind>,
    pub global: GlobalCooldown,
}

impl Cooldowns {
    pub fn new(global_cooldown_ms: u64) -> Self {
        Self {
            actions: KeyedCooldowns::new(),
            earnings: KeyedCooldowns::new(),
            global: GlobalCooldown::new(global_cooldown_ms),
        }
    }

    /// Removes every expired keyed entry.
    pub fn sweep(&mut self, now: SessionTime) -> usize {
        self.actions.sweep(now) + self.earnings.sweep(now)
    }

    /// Drops all cooldowns. Used when a session ends.
    pub fn clear_all(&mut self) {
        self.actions.clear_all();
        self.earnings.clear_all();
        self.global.clear();
    }
}
