//! Session Orchestrator
//!
//! A [`Session`] owns the world state, the random source, and the event log,
//! and turns requests into state changes. It is synchronous: every operation
//! takes the current session time explicitly, and the asynchronous half of an
//! action (the adversary noticing it) is handed back to the caller as a
//! [`PendingNotice`] to resolve later through [`Session::resolve_notice`].
//!
//! Draw order of an action's synchronous phase: power gain, heat gain, risk
//! trigger, casualty draws, recruitment base, notice roll, then any flavor
//! line draws.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use resist_events::{LogEntry, SessionOutcome, SessionTime, WorldSnapshot, MILLIS_PER_MINUTE};

use crate::actions::{ActionCategory, ActionKind};
use crate::community;
use crate::config::Tuning;
use crate::cooldown::{action_cooldown_ms, ActionTargetKey};
use crate::economy::{self, EarningKind, CROWDFUNDING_COST, MINING_HEAT};
use crate::escalation::{self, AdversaryMove};
use crate::events::{EventLog, JsonlWriter};
use crate::narrative::{self, CitizenRequest, Narration, NoticeRequest};
use crate::recruitment::{recruitment_gain, RecruitmentStyle};
use crate::rejection::Rejection;
use crate::risk::{self, Casualties, RiskAssessment, RiskTier};
use crate::rng::{RandomSource, SimRng};
use crate::state::{TargetId, TimerEvent, TimerOutcome, WorldState};
use crate::victory;

/// Power gained by the movement when a zone is liberated.
pub const LIBERATION_POWER: f64 = 5.0;
/// Power gained when a zone is defended at timer expiry.
pub const DEFENSE_POWER: f64 = 10.0;
/// Resistance mobilizing actions spread to quiet neighbors.
pub const SOLIDARITY_SPREAD: f64 = 1.0;

/// The deferred half of an action: the adversary's reaction.
///
/// The detection roll already happened; `noticed` says whether resolving
/// this notice will apply `heat_gain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingNotice {
    pub ticket: u64,
    /// Session generation the action belongs to
    pub generation: u64,
    pub action: ActionKind,
    pub target_name: String,
    pub description: String,
    pub heat_gain: u64,
    pub noticed: bool,
    pub probability: f64,
    /// Heat when the action was taken
    pub heat_at_action: f64,
}

impl PendingNotice {
    /// What the narrative collaborator is asked about.
    pub fn request(&self) -> NoticeRequest {
        NoticeRequest {
            action: self.action,
            description: self.description.clone(),
            target_name: self.target_name.clone(),
            heat: self.heat_at_action,
        }
    }
}

/// The neighborhood's reaction owed to a completed action, noticed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReaction {
    pub generation: u64,
    pub action: ActionKind,
    pub target_name: String,
    pub description: String,
    /// Community power once the action landed
    pub power: f64,
}

impl PendingReaction {
    pub fn request(&self) -> CitizenRequest {
        CitizenRequest {
            action: self.action,
            description: self.description.clone(),
            target_name: self.target_name.clone(),
            power: self.power,
        }
    }
}

/// Result of a successful action's synchronous phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReceipt {
    pub action: ActionKind,
    pub target: TargetId,
    pub price: u64,
    pub power_gain: u64,
    pub heat_gain: u64,
    pub risk: RiskAssessment,
    /// Casualties actually applied, after clamping
    pub casualties: Casualties,
    pub recruited: u64,
    pub liberated: bool,
    pub cooldown_key: ActionTargetKey,
    pub cooldown_expiry: SessionTime,
    pub notice: PendingNotice,
    pub reaction: PendingReaction,
}

/// Result of resolving a notice.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeResolution {
    pub ticket: u64,
    pub noticed: bool,
    pub heat_applied: f64,
    pub narration: Option<Narration>,
}

/// Result of a successful burst income.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarningReceipt {
    pub kind: EarningKind,
    pub cost: u64,
    pub reward: u64,
    pub heat: f64,
    pub cooldown_expiry: SessionTime,
}

/// What happened on one autonomous tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub adversary: Option<AdversaryMove>,
    pub casualties: Casualties,
    pub community_acted: bool,
    pub timer_events: Vec<TimerEvent>,
}

/// One running game.
pub struct Session {
    tuning: Tuning,
    world: WorldState,
    rng: Box<dyn RandomSource>,
    log: EventLog,
    generation: u64,
    next_ticket: u64,
    /// Last reported mining gate state, so the advisory is logged on change
    mining_unlocked: Option<bool>,
}

impl Session {
    pub fn new(tuning: Tuning, mut rng: Box<dyn RandomSource>) -> Self {
        let world = WorldState::generate(&tuning, rng.as_mut());
        let mut session = Self {
            tuning,
            world,
            rng,
            log: EventLog::new(),
            generation: 1,
            next_ticket: 1,
            mining_unlocked: None,
        };
        session.announce_start();
        session
    }

    pub fn with_seed(tuning: Tuning, seed: u64) -> Self {
        Self::new(tuning, Box::new(SimRng::seeded(seed)))
    }

    /// Mirrors the log to a JSONL file from now on.
    pub fn set_event_sink(&mut self, sink: JsonlWriter) {
        self.log.set_sink(Some(sink));
    }

    /// Discards the world and starts over on a fresh clock.
    pub fn restart(&mut self) {
        self.world = WorldState::generate(&self.tuning, self.rng.as_mut());
        self.generation += 1;
        self.mining_unlocked = None;
        self.announce_start();
    }

    fn announce_start(&mut self) {
        info!(
            session_id = %self.world.session_id(),
            generation = self.generation,
            participants = self.world.active_participants(),
            population = self.world.total_population(),
            "session started"
        );
        self.log.system(
            SessionTime::ZERO,
            "Resistance network activated. Organize, resist, liberate!",
        );
        self.log.system(
            SessionTime::ZERO,
            "Select a neighborhood and choose your first action.",
        );
    }

    // Accessors

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Direct access to the world's mutators.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.world.is_active()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.world.outcome()
    }

    pub fn snapshot(&self, now: SessionTime) -> WorldSnapshot {
        self.world.snapshot(now)
    }

    pub fn drain_log(&mut self) -> Vec<LogEntry> {
        self.log.drain()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn flush_log(&mut self) -> std::io::Result<()> {
        self.log.flush()
    }

    // Cooldown queries

    /// Milliseconds left on `action` in target `target`.
    pub fn cooldown_remaining(&self, action: ActionKind, target: &TargetId, now: SessionTime) -> u64 {
        let key = ActionTargetKey::new(action, target.clone());
        self.world.cooldowns().actions.remaining(&key, now)
    }

    pub fn earning_cooldown_remaining(&self, kind: EarningKind, now: SessionTime) -> u64 {
        self.world.cooldowns().earnings.remaining(&kind, now)
    }

    pub fn global_cooldown_remaining(&self, now: SessionTime) -> u64 {
        self.world.cooldowns().global.remaining(now)
    }

    /// Price of `action` against the selected target, if one is selected.
    pub fn action_price(&self, action: ActionKind) -> Option<u64> {
        let target = self.world.selected_target()?;
        Some(economy::action_price(
            action,
            self.world.heat(),
            target.is_threatened(),
            self.world.power(),
        ))
    }

    /// Clears an action cooldown if it has run out. Called by expiry timers.
    pub fn expire_action_cooldown(&mut self, key: &ActionTargetKey, now: SessionTime) -> bool {
        let cleared = self.world.cooldowns_mut().actions.clear_if_expired(key, now);
        if cleared {
            debug!(key = %key, "action cooldown expired");
        }
        cleared
    }

    pub fn expire_earning_cooldown(&mut self, kind: EarningKind, now: SessionTime) -> bool {
        self.world.cooldowns_mut().earnings.clear_if_expired(&kind, now)
    }

    pub fn sweep_cooldowns(&mut self, now: SessionTime) -> usize {
        self.world.cooldowns_mut().sweep(now)
    }

    // Player requests

    pub fn select_target(&mut self, id: &str, now: SessionTime) -> Result<(), Rejection> {
        self.ensure_active(now)?;
        let id = TargetId::from(id);
        let selected = self
            .world
            .select_target(&id)
            .map(|target| target.name().to_string());
        match selected {
            Ok(name) => {
                self.log.system(now, format!("Selected {} for resistance action.", name));
                Ok(())
            }
            Err(rejection) => Err(self.reject(rejection, now)),
        }
    }

    /// Parses an action identifier and performs it.
    pub fn perform_named(&mut self, name: &str, now: SessionTime) -> Result<ActionReceipt, Rejection> {
        match name.parse::<ActionKind>() {
            Ok(kind) => self.perform(kind, now),
            Err(rejection) => Err(self.reject(rejection, now)),
        }
    }

    /// Runs an action's synchronous phase.
    ///
    /// Every gate is checked before anything changes, so a rejection leaves
    /// the world untouched. Heat is not applied here; it waits for the
    /// returned notice to be resolved.
    pub fn perform(&mut self, kind: ActionKind, now: SessionTime) -> Result<ActionReceipt, Rejection> {
        self.ensure_active(now)?;
        let plan = match self.check_action(kind, now) {
            Ok(plan) => plan,
            Err(rejection) => return Err(self.reject(rejection, now)),
        };
        match self.world.spend(plan.price) {
            Ok(()) => Ok(self.execute_action(kind, plan, now)),
            Err(rejection) => Err(self.reject(rejection, now)),
        }
    }

    /// Whether `kind` would be accepted at `now`. Logs nothing.
    pub fn check(&self, kind: ActionKind, now: SessionTime) -> Result<(), Rejection> {
        if !self.world.is_active() {
            return Err(Rejection::SessionInactive);
        }
        self.check_action(kind, now).map(|_| ())
    }

    fn check_action(&self, kind: ActionKind, now: SessionTime) -> Result<ActionPlan, Rejection> {
        let target = self
            .world
            .selected_target()
            .ok_or(Rejection::NoTargetSelected)?;
        let key = ActionTargetKey::new(kind, target.id().clone());

        let cooldowns = self.world.cooldowns();
        let remaining = cooldowns.actions.remaining(&key, now);
        if remaining > 0 {
            return Err(Rejection::ActionOnCooldown {
                action: kind,
                target: target.name().to_string(),
                remaining_ms: remaining,
            });
        }
        let global = cooldowns.global.remaining(now);
        if global > 0 {
            return Err(Rejection::GlobalCooldown { remaining_ms: global });
        }

        if let Some(requirement) = kind.requirement() {
            if !requirement.is_met(target.is_threatened(), self.world.power()) {
                return Err(Rejection::RequirementNotMet {
                    action: kind,
                    requirement: requirement.describe(),
                });
            }
        }

        let price = economy::action_price(
            kind,
            self.world.heat(),
            target.is_threatened(),
            self.world.power(),
        );
        if price > self.world.currency() {
            return Err(Rejection::InsufficientFunds {
                needed: price,
                available: self.world.currency(),
            });
        }

        Ok(ActionPlan {
            key,
            target_name: target.name().to_string(),
            price,
        })
    }

    /// Everything after the purchase. The price has already been paid.
    fn execute_action(&mut self, kind: ActionKind, plan: ActionPlan, now: SessionTime) -> ActionReceipt {
        let spec = kind.spec();
        let heat = self.world.heat();

        let power_gain = self.rng.int_inclusive(spec.power.0, spec.power.1);
        let heat_gain = self.rng.int_inclusive(spec.heat.0, spec.heat.1);
        let risk = risk::assess(
            kind,
            heat,
            heat_gain,
            self.world.active_participants(),
            self.rng.as_mut(),
        );
        let recruitment = RecruitmentStyle::for_category(spec.category).map(|style| {
            recruitment_gain(
                style,
                self.world.active_participants(),
                self.world.total_population(),
                heat,
                self.world.power(),
                self.rng.as_mut(),
            )
        });
        let notice_roll = escalation::roll_notice(heat, kind.exposure(), self.rng.as_mut());

        self.world.increment_actions();
        if kind.is_infrastructure() {
            self.world.add_infrastructure();
        }

        // Effects
        self.world.add_power(power_gain as f64);
        let target_id = plan.key.target.clone();
        let liberated = self.world.add_resistance(&target_id, power_gain as f64);

        self.log.player(now, format!("{} in {}", spec.description, plan.target_name));
        self.log.player(
            now,
            format!("+{} community power, +{} heat if noticed", power_gain, heat_gain),
        );
        if matches!(risk.tier, RiskTier::High | RiskTier::Extreme) {
            self.log.player(
                now,
                format!("{} risk operation - surveillance heavy", risk.tier.as_str().to_uppercase()),
            );
        }

        let casualties = self.world.apply_casualties(risk.casualties);
        self.log_casualties(casualties, now);

        let recruited = match recruitment {
            Some(gain) => {
                let added = self.world.add_participants(gain);
                if added > 0 {
                    self.log.citizen(now, format!("{} new participants joined the movement.", added));
                }
                added
            }
            None => 0,
        };

        if liberated {
            self.celebrate_liberation(&plan.target_name, now);
        }
        if spec.category == ActionCategory::Mobilizing {
            let boosted = self.world.spread_to_neighbors(&target_id, SOLIDARITY_SPREAD);
            if !boosted.is_empty() {
                self.log.citizen(
                    now,
                    format!("{}'s action inspires solidarity in nearby areas.", plan.target_name),
                );
            }
            for (name, newly_liberated) in boosted {
                if newly_liberated {
                    self.celebrate_liberation(&name, now);
                }
            }
        }

        // Cooldowns
        let cooldown_ms = action_cooldown_ms(heat_gain, power_gain);
        let cooldowns = self.world.cooldowns_mut();
        let cooldown_expiry = cooldowns.actions.set(plan.key.clone(), now, cooldown_ms);
        cooldowns.global.set(now);
        self.log.system(
            now,
            format!(
                "{} cooldown in {}: {}s",
                kind,
                plan.target_name,
                SessionTime::from_millis(cooldown_ms).ceil_secs()
            ),
        );

        if !notice_roll.noticed {
            self.log.system(now, "The action slipped past city surveillance.");
        }

        let notice = PendingNotice {
            ticket: self.next_ticket,
            generation: self.generation,
            action: kind,
            target_name: plan.target_name.clone(),
            description: spec.description.to_string(),
            heat_gain,
            noticed: notice_roll.noticed,
            probability: notice_roll.probability,
            heat_at_action: heat,
        };
        self.next_ticket += 1;
        let reaction = PendingReaction {
            generation: self.generation,
            action: kind,
            target_name: plan.target_name.clone(),
            description: spec.description.to_string(),
            power: self.world.power(),
        };

        debug!(
            action = %kind,
            target = %target_id,
            price = plan.price,
            power_gain,
            heat_gain,
            noticed = notice.noticed,
            "action performed"
        );

        self.evaluate(now);

        ActionReceipt {
            action: kind,
            target: target_id,
            price: plan.price,
            power_gain,
            heat_gain,
            risk,
            casualties,
            recruited,
            liberated,
            cooldown_key: plan.key,
            cooldown_expiry,
            notice,
            reaction,
        }
    }

    /// Applies the deferred half of an action.
    ///
    /// Noticed actions add their heat and log the adversary's reply. Notices
    /// from an earlier generation or arriving after the session ended are
    /// dropped.
    pub fn resolve_notice(
        &mut self,
        notice: &PendingNotice,
        narration: Option<Narration>,
        now: SessionTime,
    ) -> Option<NoticeResolution> {
        if notice.generation != self.generation {
            debug!(ticket = notice.ticket, "dropping notice from a previous session");
            return None;
        }
        if !self.world.is_active() {
            debug!(ticket = notice.ticket, "dropping notice after session end");
            return None;
        }
        if !notice.noticed {
            return Some(NoticeResolution {
                ticket: notice.ticket,
                noticed: false,
                heat_applied: 0.0,
                narration: None,
            });
        }

        let heat_applied = self.world.add_heat(notice.heat_gain as f64);
        let narration = narration.unwrap_or_else(|| {
            Narration::fallback(narrative::fallback_response(
                notice.heat_at_action,
                &notice.description,
                &notice.target_name,
            ))
        });
        self.log.ai(now, narration.text.clone());
        self.evaluate(now);

        Some(NoticeResolution {
            ticket: notice.ticket,
            noticed: true,
            heat_applied,
            narration: Some(narration),
        })
    }

    /// Logs the citizens' reaction to an action, falling back to the
    /// morale-tiered line when no narration is supplied. Dropped like a
    /// notice when stale or after the session ended.
    pub fn record_reaction(
        &mut self,
        reaction: &PendingReaction,
        narration: Option<Narration>,
        now: SessionTime,
    ) -> Option<Narration> {
        if reaction.generation != self.generation || !self.world.is_active() {
            debug!(action = %reaction.action, "dropping citizen reaction");
            return None;
        }
        let narration = narration.unwrap_or_else(|| {
            Narration::fallback(narrative::citizen_fallback(
                reaction.power,
                &reaction.description,
                &reaction.target_name,
            ))
        });
        self.log.citizen(now, narration.text.clone());
        Some(narration)
    }

    // Income

    /// One passive income cycle.
    pub fn mine(&mut self, now: SessionTime) -> Result<u64, Rejection> {
        if !self.still_running(now) {
            return Err(Rejection::SessionInactive);
        }
        let active = self.world.active_participants();
        let total = self.world.total_population();
        let unlocked = economy::income_unlocked(active, total);

        if self.mining_unlocked != Some(unlocked) {
            self.mining_unlocked = Some(unlocked);
            if !unlocked {
                self.log.system(
                    now,
                    format!(
                        "Mining inactive: need {}+ active participants (have {})",
                        economy::population_threshold(total),
                        active
                    ),
                );
            } else {
                self.log.system(now, "Mining network online.");
            }
        }
        if !unlocked {
            return Err(Rejection::PopulationThreshold {
                required: economy::population_threshold(total),
                current: active,
            });
        }

        let amount = economy::mining_rate(
            active,
            self.world.infrastructure_bonus(),
            self.world.heat(),
            self.rng.as_mut(),
        );
        self.world.add_currency(amount);
        self.world.add_heat(MINING_HEAT);
        self.log.system(now, format!("Mining: +{} currency ({} participants)", amount, active));
        self.evaluate(now);
        Ok(amount)
    }

    /// Sells a digital collectible at the tier matching current power.
    pub fn sell_collectible(&mut self, now: SessionTime) -> Result<EarningReceipt, Rejection> {
        self.ensure_active(now)?;
        let kind = EarningKind::CollectibleSale;
        let tier = economy::collectible_tier(self.world.power());

        if let Err(rejection) = self.check_earning(kind, tier.cost, now) {
            return Err(self.reject(rejection, now));
        }
        let reward = tier.roll_reward(self.rng.as_mut());
        self.complete_earning(kind, tier.cost, reward, now)
    }

    /// Crowdfunds from the movement's supporters.
    pub fn crowdfund(&mut self, now: SessionTime) -> Result<EarningReceipt, Rejection> {
        self.ensure_active(now)?;
        let kind = EarningKind::Crowdfunding;
        let active = self.world.active_participants();
        let total = self.world.total_population();

        if !economy::income_unlocked(active, total) {
            let rejection = Rejection::PopulationThreshold {
                required: economy::population_threshold(total),
                current: active,
            };
            return Err(self.reject(rejection, now));
        }
        if let Err(rejection) = self.check_earning(kind, CROWDFUNDING_COST, now) {
            return Err(self.reject(rejection, now));
        }
        let reward = economy::crowdfunding_reward(active, self.world.power());
        self.complete_earning(kind, CROWDFUNDING_COST, reward, now)
    }

    fn check_earning(&self, kind: EarningKind, cost: u64, now: SessionTime) -> Result<(), Rejection> {
        let remaining = self.world.cooldowns().earnings.remaining(&kind, now);
        if remaining > 0 {
            return Err(Rejection::EarningOnCooldown {
                kind,
                remaining_ms: remaining,
            });
        }
        if cost > self.world.currency() {
            return Err(Rejection::InsufficientFunds {
                needed: cost,
                available: self.world.currency(),
            });
        }
        Ok(())
    }

    fn complete_earning(
        &mut self,
        kind: EarningKind,
        cost: u64,
        reward: u64,
        now: SessionTime,
    ) -> Result<EarningReceipt, Rejection> {
        self.world.spend(cost)?;
        self.world.add_currency(reward);
        self.world.add_heat(kind.heat());
        let cooldown_expiry = self
            .world
            .cooldowns_mut()
            .earnings
            .set(kind, now, kind.cooldown_ms());

        self.log.player(now, format!("{}: -{}, +{} currency", kind, cost, reward));
        self.evaluate(now);

        Ok(EarningReceipt {
            kind,
            cost,
            reward,
            heat: kind.heat(),
            cooldown_expiry,
        })
    }

    // Autonomous tick

    /// Adversary move, community activity, then neighborhood timers.
    pub fn autonomous_tick(&mut self, now: SessionTime) -> TickReport {
        let mut report = TickReport::default();
        if !self.still_running(now) {
            return report;
        }

        report.adversary = escalation::decide_move(
            self.world.power(),
            self.world.liberated_count(),
            self.world.heat(),
            self.rng.as_mut(),
        );
        match report.adversary {
            Some(AdversaryMove::Escalation) => {
                report.casualties = self.escalate(now);
            }
            Some(AdversaryMove::Routine) => {
                let line = narrative::routine_line(self.rng.as_mut());
                self.log.ai(now, line);
                let arrests = escalation::routine_arrests(
                    self.world.heat(),
                    self.world.total_population(),
                    self.rng.as_mut(),
                );
                report.casualties = self.world.apply_casualties(Casualties {
                    imprisoned: arrests,
                    killed: 0,
                });
                self.log_casualties(report.casualties, now);
            }
            None => {}
        }

        let threatened = self.world.threatened_count();
        if community::roll_activity(self.world.power(), threatened, self.world.heat(), self.rng.as_mut()) {
            report.community_acted = true;
            let line = narrative::community_line(self.world.power(), self.rng.as_mut());
            self.log.citizen(now, line);
            self.world.add_power(community::organic_power(self.world.power()));
        }

        let minutes = self.tuning.timing.tick_interval_ms as f64 / MILLIS_PER_MINUTE as f64;
        report.timer_events = self.world.advance_timers(minutes);
        for event in report.timer_events.clone() {
            match event.outcome {
                TimerOutcome::Gentrified => {
                    self.log.ai(now, format!("{} has been gentrified. Residents displaced.", event.name));
                }
                TimerOutcome::Defended { liberated } => {
                    self.world.add_power(DEFENSE_POWER);
                    self.log.citizen(
                        now,
                        format!("{} successfully defended against gentrification!", event.name),
                    );
                    if liberated {
                        self.celebrate_liberation(&event.name, now);
                    }
                }
            }
        }

        self.evaluate(now);
        report
    }

    fn escalate(&mut self, now: SessionTime) -> Casualties {
        let line = narrative::escalation_line(self.rng.as_mut());
        self.log.ai(now, line);

        let casualties = escalation::escalation_casualties(
            self.world.active_participants(),
            self.world.heat(),
            self.rng.as_mut(),
        );
        self.world.add_heat(self.tuning.escalation.heat_per_escalation);
        let applied = self.world.apply_casualties(casualties);
        self.log_casualties(applied, now);
        self.world.shorten_threatened_timers(&self.tuning.escalation);

        if let Some(power) =
            community::escalation_response_power(self.world.heat(), self.world.power())
        {
            let line = narrative::repression_response(self.rng.as_mut());
            self.log.citizen(now, line);
            self.world.add_power(power);
        }
        applied
    }

    /// Ends the session on the clock if its duration has elapsed.
    pub fn check_timeout(&mut self, now: SessionTime) -> Option<SessionOutcome> {
        if !self.world.is_active() || now < self.world.duration() {
            return None;
        }
        let outcome = victory::timeout_outcome(self.world.power());
        self.finish(outcome.clone(), now);
        Some(outcome)
    }

    // Helpers

    /// Gate for player requests. Refusals are logged like any other.
    fn ensure_active(&mut self, now: SessionTime) -> Result<(), Rejection> {
        if self.still_running(now) {
            Ok(())
        } else {
            Err(self.reject(Rejection::SessionInactive, now))
        }
    }

    /// Timer-driven work stops quietly once the session is over.
    fn still_running(&mut self, now: SessionTime) -> bool {
        self.check_timeout(now);
        self.world.is_active()
    }

    fn reject(&mut self, rejection: Rejection, now: SessionTime) -> Rejection {
        debug!(code = rejection.code(), "request rejected");
        self.log.system(now, rejection.to_string());
        rejection
    }

    fn log_casualties(&mut self, casualties: Casualties, now: SessionTime) {
        if casualties.killed > 0 {
            self.log.ai(
                now,
                format!("{} citizens killed by AI Mayor forces", casualties.killed),
            );
        }
        if casualties.imprisoned > 0 {
            self.log.ai(now, format!("{} citizens arrested", casualties.imprisoned));
        }
    }

    fn celebrate_liberation(&mut self, name: &str, now: SessionTime) {
        self.log.citizen(
            now,
            format!("{} has been LIBERATED! Community control established.", name),
        );
        let line = narrative::celebration_line(name, self.rng.as_mut());
        self.log.citizen(now, line);
        self.world.add_power(LIBERATION_POWER);
        self.world.add_participants(1);
    }

    fn evaluate(&mut self, now: SessionTime) {
        if let Some(outcome) = victory::evaluate(&self.world) {
            self.finish(outcome, now);
        }
    }

    fn finish(&mut self, outcome: SessionOutcome, now: SessionTime) {
        let message = outcome.to_string();
        if self.world.set_outcome(outcome) {
            info!(
                outcome = %message,
                power = self.world.power(),
                heat = self.world.heat(),
                elapsed = %now,
                "session ended"
            );
            self.log.system(now, message);
        }
    }
}

/// Gate results carried into the mutation phase.
struct ActionPlan {
    key: ActionTargetKey,
    target_name: String,
    price: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;
    use resist_events::{EndReason, LogCategory};

    fn session(values: impl IntoIterator<Item = f64>) -> Session {
        // first two draws size the world: 50 participants, 8M population
        let rng = ScriptedRng::new([0.0, 0.0].into_iter().chain(values)).with_fallback(0.5);
        Session::new(Tuning::default(), Box::new(rng))
    }

    fn at(secs: u64) -> SessionTime {
        SessionTime::from_secs(secs)
    }

    #[test]
    fn test_start_logs() {
        let mut s = session([]);
        let log = s.drain_log();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.category == LogCategory::System));
        assert_eq!(s.generation(), 1);
    }

    #[test]
    fn test_action_without_target_rejected() {
        let mut s = session([]);
        let before = serde_json::to_string(&s.snapshot(at(1))).unwrap();

        let err = s.perform(ActionKind::Garden, at(1)).unwrap_err();
        assert_eq!(err, Rejection::NoTargetSelected);
        assert_eq!(serde_json::to_string(&s.snapshot(at(1))).unwrap(), before);

        let last = s.drain_log().pop().unwrap();
        assert_eq!(last.message, "Select a neighborhood first to take action.");
    }

    #[test]
    fn test_unknown_action_rejected() {
        let mut s = session([]);
        s.select_target("market", at(0)).unwrap();
        assert_eq!(
            s.perform_named("riot", at(1)).unwrap_err(),
            Rejection::UnknownAction("riot".to_string())
        );
    }

    #[test]
    fn test_garden_applies_power_but_defers_heat() {
        // power 4, heat 2, no risk trigger, recruitment base, noticed
        let mut s = session([0.0, 0.0, 0.99, 0.0, 0.0]);
        s.select_target("riverside", at(0)).unwrap();

        let receipt = s.perform(ActionKind::Garden, at(1)).unwrap();
        assert_eq!(receipt.power_gain, 4);
        assert_eq!(receipt.heat_gain, 2);
        assert!(!receipt.risk.triggered);
        assert!(receipt.notice.noticed);
        // threatened target halves the price, floored at the minimum
        assert_eq!(receipt.price, 100);

        let w = s.world();
        assert_eq!(w.power(), 4.0);
        assert_eq!(w.heat(), 0.0);
        assert_eq!(w.currency(), 1400);
        assert_eq!(w.actions_completed(), 1);
        assert_eq!(w.target(&TargetId::from("riverside")).unwrap().resistance(), 16.0);
        assert!(w.active_participants() > 50);

        let resolution = s.resolve_notice(&receipt.notice, None, at(2)).unwrap();
        assert_eq!(resolution.heat_applied, 2.0);
        assert_eq!(s.world().heat(), 2.0);
        assert_eq!(s.drain_log().last().unwrap().category, LogCategory::Ai);
    }

    #[test]
    fn test_unnoticed_action_adds_no_heat() {
        // notice roll 0.99 fails every gate
        let mut s = session([0.0, 0.0, 0.99, 0.0, 0.99]);
        s.select_target("oldtown", at(0)).unwrap();

        let receipt = s.perform(ActionKind::Meeting, at(1)).unwrap();
        assert!(!receipt.notice.noticed);

        let resolution = s.resolve_notice(&receipt.notice, None, at(2)).unwrap();
        assert_eq!(resolution.heat_applied, 0.0);
        assert_eq!(s.world().heat(), 0.0);
    }

    #[test]
    fn test_unnoticed_action_still_draws_citizen_reaction() {
        let mut s = session([0.0, 0.0, 0.99, 0.0, 0.99]);
        s.select_target("oldtown", at(0)).unwrap();
        let receipt = s.perform(ActionKind::Meeting, at(1)).unwrap();
        assert!(!receipt.notice.noticed);
        assert_eq!(receipt.reaction.power, s.world().power());
        s.drain_log();

        let narration = s.record_reaction(&receipt.reaction, None, at(3)).unwrap();
        let expected = narrative::citizen_fallback(
            receipt.reaction.power,
            "Held secret organizing meeting",
            "Old Town",
        );
        assert_eq!(narration.text, expected);

        let log = s.drain_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].category, LogCategory::Citizen);
        assert_eq!(log[0].message, expected);
    }

    #[test]
    fn test_stale_citizen_reaction_dropped() {
        let mut s = session([]);
        s.select_target("oldtown", at(0)).unwrap();
        let receipt = s.perform(ActionKind::Intel, at(1)).unwrap();

        s.restart();
        s.drain_log();
        assert!(s.record_reaction(&receipt.reaction, None, at(3)).is_none());
        assert!(s.drain_log().is_empty());
    }

    #[test]
    fn test_cooldowns_gate_before_mutation() {
        let mut s = session([]);
        s.select_target("oldtown", at(0)).unwrap();
        let receipt = s.perform(ActionKind::Intel, at(1)).unwrap();

        // global gate applies to a different action
        let err = s.perform(ActionKind::Meeting, at(2)).unwrap_err();
        assert!(matches!(err, Rejection::GlobalCooldown { remaining_ms: 2000 }));

        // per-action gate outlives the global one
        let currency = s.world().currency();
        let err = s.perform(ActionKind::Intel, at(5)).unwrap_err();
        assert!(matches!(err, Rejection::ActionOnCooldown { .. }));
        assert_eq!(s.world().currency(), currency);

        assert!(s.cooldown_remaining(ActionKind::Intel, &TargetId::from("oldtown"), at(5)) > 0);
        assert!(receipt.cooldown_expiry > at(5));

        // same action on another target is free once the global gate clears
        s.select_target("market", at(5)).unwrap();
        assert!(s.perform(ActionKind::Intel, at(5)).is_ok());
    }

    #[test]
    fn test_requirements_checked() {
        let mut s = session([]);
        s.select_target("oldtown", at(0)).unwrap();
        assert!(matches!(
            s.perform(ActionKind::BlockDemo, at(1)),
            Err(Rejection::RequirementNotMet { .. })
        ));
        assert!(matches!(
            s.perform(ActionKind::PirateBroad, at(1)),
            Err(Rejection::RequirementNotMet { .. })
        ));
    }

    #[test]
    fn test_insufficient_funds() {
        let mut s = session([]);
        s.select_target("oldtown", at(0)).unwrap();
        let err = s.perform(ActionKind::Occupy, at(1)).unwrap_err();
        assert_eq!(err, Rejection::InsufficientFunds { needed: 3500, available: 1500 });
        assert_eq!(s.world().actions_completed(), 0);
    }

    #[test]
    fn test_liberation_logged_once() {
        let mut s = session([]);
        s.world_mut().add_resistance(&TargetId::from("oldtown"), 33.0);
        s.select_target("oldtown", at(0)).unwrap();
        s.drain_log();

        // 58 + 3 crosses 60
        let receipt = s.perform(ActionKind::Intel, at(1)).unwrap();
        assert!(receipt.liberated);
        let liberations = s
            .drain_log()
            .iter()
            .filter(|e| e.message.contains("LIBERATED"))
            .count();
        assert_eq!(liberations, 1);

        let receipt = s.perform(ActionKind::Meeting, at(10)).unwrap();
        assert!(!receipt.liberated);
        assert!(!s.drain_log().iter().any(|e| e.message.contains("LIBERATED")));
    }

    #[test]
    fn test_mobilizing_spreads_to_quiet_neighbors() {
        let mut s = session([]);
        s.select_target("riverside", at(0)).unwrap();
        s.perform(ActionKind::Recruit, at(1)).unwrap();

        // oldtown is adjacent and not threatened
        assert_eq!(s.world().target(&TargetId::from("oldtown")).unwrap().resistance(), 26.0);
        assert_eq!(s.world().target(&TargetId::from("market")).unwrap().resistance(), 5.0);
    }

    #[test]
    fn test_power_victory_ends_session() {
        let mut s = session([]);
        s.world_mut().add_power(85.0);
        s.select_target("oldtown", at(0)).unwrap();
        let receipt = s.perform(ActionKind::Intel, at(1)).unwrap();

        let outcome = s.outcome().unwrap();
        assert_eq!(outcome.reason, EndReason::PowerThreshold);
        assert!(!s.is_active());
        assert_eq!(s.perform(ActionKind::Meeting, at(10)).unwrap_err(), Rejection::SessionInactive);

        // late notices are dropped
        assert!(s.resolve_notice(&receipt.notice, None, at(2)).is_none());
    }

    #[test]
    fn test_mining_gate() {
        let mut s = session([]);
        let err = s.mine(at(15)).unwrap_err();
        assert!(matches!(err, Rejection::PopulationThreshold { required: 800, current: 50 }));

        // advisory logged once while the gate stays closed
        s.mine(at(30)).unwrap_err();
        let advisories = s
            .drain_log()
            .iter()
            .filter(|e| e.message.starts_with("Mining inactive"))
            .count();
        assert_eq!(advisories, 1);

        s.world_mut().add_participants(800);
        let currency = s.world().currency();
        let amount = s.mine(at(45)).unwrap();
        assert!(amount >= 10);
        assert_eq!(s.world().currency(), currency + amount);
        assert_eq!(s.world().heat(), 1.0);
    }

    #[test]
    fn test_collectible_sale_and_cooldown() {
        let mut s = session([0.0]);
        let receipt = s.sell_collectible(at(1)).unwrap();
        assert_eq!(receipt.cost, 1_000);
        assert_eq!(receipt.reward, 2_000);
        assert_eq!(s.world().currency(), 2_500);
        assert_eq!(s.world().heat(), 8.0);

        let err = s.sell_collectible(at(10)).unwrap_err();
        assert!(matches!(err, Rejection::EarningOnCooldown { remaining_ms: 36_000, .. }));
        assert_eq!(s.earning_cooldown_remaining(EarningKind::CollectibleSale, at(10)), 36_000);
        assert!(s.sell_collectible(at(46)).is_ok());
    }

    #[test]
    fn test_crowdfunding_gated_by_population() {
        let mut s = session([]);
        assert!(matches!(
            s.crowdfund(at(1)),
            Err(Rejection::PopulationThreshold { .. })
        ));

        s.world_mut().add_participants(1_000);
        let receipt = s.crowdfund(at(2)).unwrap();
        assert_eq!(receipt.cost, 500);
        assert_eq!(receipt.reward, 10_500);
        assert_eq!(s.world().heat(), 3.0);
    }

    #[test]
    fn test_quiet_tick_only_runs_timers() {
        // aggression miss, community miss
        let mut s = session([0.99, 0.99]);
        let report = s.autonomous_tick(at(5));

        assert_eq!(report.adversary, None);
        assert!(!report.community_acted);
        assert_eq!(s.world().target(&TargetId::from("market")).unwrap().timer_minutes(), 6.42);
        assert_eq!(s.world().target(&TargetId::from("oldtown")).unwrap().timer_minutes(), 18.0);
    }

    #[test]
    fn test_escalation_tick() {
        let mut s = session([]);
        s.world_mut().add_heat(80.0);
        s.world_mut().add_power(40.0);
        // aggression hit, escalation hit, line, arrests, deaths, response line, community miss
        s.rng = Box::new(ScriptedRng::new([0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.99]));

        let report = s.autonomous_tick(at(5));
        assert_eq!(report.adversary, Some(AdversaryMove::Escalation));
        assert_eq!(s.world().heat(), 83.0);
        // heat > 70 and power > 30: community responds
        assert_eq!(s.world().power(), 42.0);
        // threatened timers cut to the floor then decayed
        let market = s.world().target(&TargetId::from("market")).unwrap();
        assert!(market.timer_minutes() < 1.0);
    }

    #[test]
    fn test_timer_expiry_outcomes() {
        let mut s = session([]);
        s.rng = Box::new(ScriptedRng::constant(0.99));
        // industrial is weak, riverside is strong
        s.world_mut().add_resistance(&TargetId::from("riverside"), 30.0);
        // each tick takes 0.08 minutes off; riverside needs the longest
        for _ in 0..140 {
            s.autonomous_tick(at(5));
        }

        let industrial = s.world().target(&TargetId::from("industrial")).unwrap();
        assert!(industrial.is_gentrified());
        assert_eq!(industrial.resistance(), 0.0);

        let riverside = s.world().target(&TargetId::from("riverside")).unwrap();
        assert!(!riverside.is_threatened());
        assert_eq!(riverside.resistance(), 52.0);
    }

    #[test]
    fn test_timeout() {
        let mut s = session([]);
        assert!(s.check_timeout(at(899)).is_none());
        let outcome = s.check_timeout(at(900)).unwrap();
        assert_eq!(outcome.reason, EndReason::TimeExpired);
        assert!(!s.is_active());
        assert_eq!(s.autonomous_tick(at(905)), TickReport::default());
    }

    #[test]
    fn test_restart_discards_old_notices() {
        let mut s = session([]);
        s.select_target("oldtown", at(0)).unwrap();
        let receipt = s.perform(ActionKind::Intel, at(1)).unwrap();

        s.restart();
        assert_eq!(s.generation(), 2);
        assert_eq!(s.world().actions_completed(), 0);
        assert!(s.world().selected_target().is_none());
        assert!(s.resolve_notice(&receipt.notice, None, at(2)).is_none());
    }

    #[test]
    fn test_last_coin_buys_the_action() {
        let mut s = session([]);
        s.select_target("oldtown", at(0)).unwrap();
        let price = s.action_price(ActionKind::Meeting).unwrap();
        let spare = s.world().currency() - price;
        s.world_mut().spend(spare).unwrap();

        let receipt = s.perform(ActionKind::Meeting, at(1)).unwrap();
        assert_eq!(receipt.price, price);
        assert_eq!(s.world().currency(), 0);
        assert_eq!(s.world().actions_completed(), 1);

        let err = s.perform(ActionKind::Intel, at(10)).unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");
        assert_eq!(s.world().actions_completed(), 1);
    }

    #[test]
    fn test_requests_after_end_are_logged() {
        let mut s = session([]);
        s.check_timeout(at(900)).unwrap();
        s.drain_log();

        assert_eq!(s.perform(ActionKind::Meeting, at(901)).unwrap_err(), Rejection::SessionInactive);
        assert_eq!(s.select_target("market", at(901)).unwrap_err(), Rejection::SessionInactive);
        assert_eq!(s.crowdfund(at(901)).unwrap_err(), Rejection::SessionInactive);

        let log = s.drain_log();
        assert_eq!(log.len(), 3);
        assert!(log
            .iter()
            .all(|e| e.category == LogCategory::System && e.message == "The session is not active."));

        // timer-driven work stays silent
        s.autonomous_tick(at(905));
        assert!(s.mine(at(915)).is_err());
        assert!(s.drain_log().is_empty());
    }
}
