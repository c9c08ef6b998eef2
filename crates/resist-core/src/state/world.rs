//! The world-state record and its clamped mutators.

use uuid::Uuid;

use resist_events::{SessionOutcome, SessionTime, WorldSnapshot};

use crate::config::{EscalationConfig, Tuning};
use crate::cooldown::Cooldowns;
use crate::escalation::HeatRatchet;
use crate::rejection::Rejection;
use crate::risk::Casualties;
use crate::rng::RandomSource;

use super::target::{Target, TargetId, TimerOutcome};

pub const MAX_POWER: f64 = 100.0;

/// A zone whose timer ran out on this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerEvent {
    pub target: TargetId,
    pub name: String,
    pub outcome: TimerOutcome,
}

/// Single mutable world state of a session.
///
/// Fields are private; every change goes through a mutator that clamps
/// instead of failing, so no sequence of calls can leave the state out of
/// range.
#[derive(Debug, Clone)]
pub struct WorldState {
    session_id: Uuid,
    active: bool,
    duration: SessionTime,
    power: f64,
    heat: f64,
    ratchet: HeatRatchet,
    active_participants: u64,
    total_population: u64,
    imprisoned: u64,
    killed: u64,
    currency: u64,
    infrastructure_bonus: u32,
    actions_completed: u32,
    selected_target: Option<TargetId>,
    targets: Vec<Target>,
    cooldowns: Cooldowns,
    outcome: Option<SessionOutcome>,
}

impl WorldState {
    /// Builds a fresh world with randomized participants and population.
    ///
    /// Consumes two draws: participants, then population.
    pub fn generate(tuning: &Tuning, rng: &mut dyn RandomSource) -> Self {
        let s = &tuning.session;
        let active_participants = rng.int_inclusive(s.participants_min, s.participants_max);
        let total_population = rng.int_inclusive(s.population_min, s.population_max);

        Self {
            session_id: Uuid::new_v4(),
            active: true,
            duration: SessionTime::from_secs(s.duration_secs),
            power: 0.0,
            heat: 0.0,
            ratchet: HeatRatchet::new(),
            active_participants,
            total_population,
            imprisoned: 0,
            killed: 0,
            currency: s.starting_currency,
            infrastructure_bonus: 0,
            actions_completed: 0,
            selected_target: None,
            targets: tuning.targets.iter().map(Target::from_config).collect(),
            cooldowns: Cooldowns::new(tuning.timing.global_cooldown_ms),
            outcome: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn duration(&self) -> SessionTime {
        self.duration
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn heat(&self) -> f64 {
        self.heat
    }

    pub fn min_heat(&self) -> f64 {
        self.ratchet.min_heat()
    }

    pub fn active_participants(&self) -> u64 {
        self.active_participants
    }

    pub fn total_population(&self) -> u64 {
        self.total_population
    }

    pub fn imprisoned(&self) -> u64 {
        self.imprisoned
    }

    pub fn killed(&self) -> u64 {
        self.killed
    }

    pub fn currency(&self) -> u64 {
        self.currency
    }

    pub fn infrastructure_bonus(&self) -> u32 {
        self.infrastructure_bonus
    }

    pub fn actions_completed(&self) -> u32 {
        self.actions_completed
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, id: &TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| &t.id == id)
    }

    pub fn selected_target(&self) -> Option<&Target> {
        self.selected_target.as_ref().and_then(|id| self.target(id))
    }

    pub fn selected_target_id(&self) -> Option<&TargetId> {
        self.selected_target.as_ref()
    }

    pub fn liberated_count(&self) -> usize {
        self.targets.iter().filter(|t| t.liberated).count()
    }

    pub fn threatened_count(&self) -> usize {
        self.targets.iter().filter(|t| t.threatened).count()
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    pub fn cooldowns_mut(&mut self) -> &mut Cooldowns {
        &mut self.cooldowns
    }

    // Mutators

    /// Adds power, clamped to `[0, 100]`. Returns the applied delta.
    pub fn add_power(&mut self, delta: f64) -> f64 {
        let before = self.power;
        self.power = (self.power + delta).clamp(0.0, MAX_POWER);
        self.power - before
    }

    /// Adds heat through the ratchet. Returns the applied delta.
    pub fn add_heat(&mut self, delta: f64) -> f64 {
        let before = self.heat;
        self.heat = self.ratchet.apply(self.heat, delta);
        self.heat - before
    }

    /// Adds participants, never more than the population. Returns the number added.
    pub fn add_participants(&mut self, count: u64) -> u64 {
        let headroom = self.total_population.saturating_sub(self.active_participants);
        let added = count.min(headroom);
        self.active_participants += added;
        added
    }

    /// Takes casualties out of the active participants.
    ///
    /// Arrests are applied first, then deaths, each clamped to whoever is
    /// still active. Every death also leaves the population. Returns what
    /// was actually applied.
    pub fn apply_casualties(&mut self, casualties: Casualties) -> Casualties {
        let imprisoned = casualties.imprisoned.min(self.active_participants);
        self.active_participants -= imprisoned;
        self.imprisoned += imprisoned;

        let killed = casualties.killed.min(self.active_participants);
        self.active_participants -= killed;
        self.killed += killed;
        self.total_population = self.total_population.saturating_sub(killed);

        Casualties { imprisoned, killed }
    }

    pub fn add_currency(&mut self, amount: u64) {
        self.currency = self.currency.saturating_add(amount);
    }

    /// Deducts currency, or rejects without touching the balance.
    pub fn spend(&mut self, amount: u64) -> Result<(), Rejection> {
        if amount > self.currency {
            return Err(Rejection::InsufficientFunds {
                needed: amount,
                available: self.currency,
            });
        }
        self.currency -= amount;
        Ok(())
    }

    pub fn increment_actions(&mut self) {
        self.actions_completed = self.actions_completed.saturating_add(1);
    }

    pub fn add_infrastructure(&mut self) {
        self.infrastructure_bonus = self.infrastructure_bonus.saturating_add(1);
    }

    pub fn select_target(&mut self, id: &TargetId) -> Result<&Target, Rejection> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| Rejection::UnknownTarget(id.to_string()))?;
        self.selected_target = Some(id.clone());
        Ok(&self.targets[idx])
    }

    /// Adds resistance to a target. Returns true if this liberated it.
    pub fn add_resistance(&mut self, id: &TargetId, amount: f64) -> bool {
        match self.index_of(id) {
            Some(idx) => self.targets[idx].add_resistance(amount),
            None => false,
        }
    }

    /// Gives `amount` resistance to each non-threatened zone adjacent to
    /// `id` in target order. Returns the names of the zones that gained,
    /// paired with whether they were liberated by it.
    pub fn spread_to_neighbors(&mut self, id: &TargetId, amount: f64) -> Vec<(String, bool)> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        let mut neighbors = Vec::with_capacity(2);
        if idx > 0 {
            neighbors.push(idx - 1);
        }
        if idx + 1 < self.targets.len() {
            neighbors.push(idx + 1);
        }

        neighbors.retain(|&n| !self.targets[n].threatened);

        neighbors
            .into_iter()
            .map(|n| {
                let target = &mut self.targets[n];
                let liberated = target.add_resistance(amount);
                (target.name.clone(), liberated)
            })
            .collect()
    }

    /// Runs every threatened timer down by `minutes`.
    pub fn advance_timers(&mut self, minutes: f64) -> Vec<TimerEvent> {
        self.targets
            .iter_mut()
            .filter_map(|t| {
                t.advance_timer(minutes).map(|outcome| TimerEvent {
                    target: t.id.clone(),
                    name: t.name.clone(),
                    outcome,
                })
            })
            .collect()
    }

    /// Escalation cut on every threatened timer.
    pub fn shorten_threatened_timers(&mut self, config: &EscalationConfig) {
        for target in &mut self.targets {
            target.shorten_timer(config);
        }
    }

    /// Records a terminal outcome and deactivates the session. The first
    /// outcome wins.
    pub fn set_outcome(&mut self, outcome: SessionOutcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        self.active = false;
        self.cooldowns.clear_all();
        true
    }

    fn index_of(&self, id: &TargetId) -> Option<usize> {
        self.targets.iter().position(|t| &t.id == id)
    }

    /// Read-only view at session time `now`.
    pub fn snapshot(&self, now: SessionTime) -> WorldSnapshot {
        let elapsed = now.min(self.duration);
        WorldSnapshot {
            session_id: self.session_id,
            active: self.active,
            elapsed,
            remaining: elapsed.remaining_of(self.duration),
            power: self.power,
            heat: self.heat,
            min_heat: self.ratchet.min_heat(),
            active_participants: self.active_participants,
            total_population: self.total_population,
            imprisoned: self.imprisoned,
            killed: self.killed,
            currency: self.currency,
            infrastructure_bonus: self.infrastructure_bonus,
            actions_completed: self.actions_completed,
            selected_target: self.selected_target.as_ref().map(TargetId::to_string),
            targets: self.targets.iter().map(Target::snapshot).collect(),
            outcome: self.outcome.clone(),
        }
    }
}
