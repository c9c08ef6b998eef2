//! Autoplay and Headless Runs
//!
//! A simple player policy plus a driver that plays a whole session on a
//! virtual clock, stepping through ticks, income cycles, notice resolutions
//! and citizen reactions in time order without waiting on the wall clock.

use tracing::{debug, info};

use resist_events::{LogEntry, SessionTime, WorldSnapshot};

use crate::actions::ActionKind;
use crate::economy::{self, EarningKind, CROWDFUNDING_COST};
use crate::session::{ActionReceipt, PendingNotice, PendingReaction, Session};
use crate::state::{Target, TargetId};

/// Virtual clock resolution of a headless run
pub const STEP_MS: u64 = 250;

/// One decision of the autopilot.
#[derive(Debug, Clone, PartialEq)]
pub enum Move {
    Select(TargetId),
    Act(ActionKind),
    Earn(EarningKind),
}

/// Greedy player policy.
///
/// Defends the most urgent threatened neighborhood, keeps a currency
/// reserve topped up through earnings, and favours quieter actions as heat
/// climbs.
#[derive(Debug, Clone)]
pub struct Autopilot {
    /// Heat at which an action's heat cost weighs as much as its power
    pub heat_caution: f64,
    /// Earn before acting when currency drops below this
    pub reserve: u64,
    /// Skip collectible sales above this heat
    pub max_sale_heat: f64,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self {
            heat_caution: 60.0,
            reserve: 800,
            max_sale_heat: 85.0,
        }
    }
}

impl Autopilot {
    /// The next move, or `None` when nothing useful can be done right now.
    pub fn next_move(&self, session: &Session, now: SessionTime) -> Option<Move> {
        if !session.is_active() {
            return None;
        }
        let world = session.world();

        if let Some(choice) = choose_target(world.targets()) {
            if world.selected_target_id() != Some(choice.id()) {
                return Some(Move::Select(choice.id().clone()));
            }
        }

        if world.currency() < self.reserve {
            if let Some(kind) = self.affordable_earning(session, now) {
                return Some(Move::Earn(kind));
            }
        }

        let heat = world.heat();
        ActionKind::all()
            .iter()
            .copied()
            .filter(|kind| session.check(*kind, now).is_ok())
            .max_by(|a, b| self.score(*a, heat).total_cmp(&self.score(*b, heat)))
            .map(Move::Act)
    }

    /// Expected power minus heat, with heat weighted up as it rises.
    pub fn score(&self, kind: ActionKind, heat: f64) -> f64 {
        let spec = kind.spec();
        let power = (spec.power.0 + spec.power.1) as f64 / 2.0;
        let exposure = (spec.heat.0 + spec.heat.1) as f64 / 2.0;
        power - exposure * (heat / self.heat_caution)
    }

    fn affordable_earning(&self, session: &Session, now: SessionTime) -> Option<EarningKind> {
        let world = session.world();
        let ready = |kind: EarningKind| session.earning_cooldown_remaining(kind, now) == 0;

        let unlocked =
            economy::income_unlocked(world.active_participants(), world.total_population());
        if unlocked && ready(EarningKind::Crowdfunding) && world.currency() >= CROWDFUNDING_COST {
            return Some(EarningKind::Crowdfunding);
        }

        let tier = economy::collectible_tier(world.power());
        if ready(EarningKind::CollectibleSale)
            && world.currency() >= tier.cost
            && world.heat() <= self.max_sale_heat
        {
            return Some(EarningKind::CollectibleSale);
        }
        None
    }

    /// Plays one move. Returns the receipt when the move was an action.
    pub fn play(&self, session: &mut Session, now: SessionTime) -> Option<ActionReceipt> {
        let next = self.next_move(session, now)?;
        debug!(?next, "autopilot move");

        let result = match next {
            Move::Select(id) => session.select_target(id.as_str(), now).map(|_| None),
            Move::Act(kind) => session.perform(kind, now).map(Some),
            Move::Earn(EarningKind::Crowdfunding) => session.crowdfund(now).map(|_| None),
            Move::Earn(EarningKind::CollectibleSale) => {
                session.sell_collectible(now).map(|_| None)
            }
        };

        match result {
            Ok(receipt) => receipt,
            Err(rejection) => {
                debug!(code = rejection.code(), "autopilot move rejected");
                None
            }
        }
    }
}

/// Threatened zones with the least time left first, then the strongest
/// uncontested zone.
fn choose_target(targets: &[Target]) -> Option<&Target> {
    let contested = || targets.iter().filter(|t| !t.is_liberated() && !t.is_gentrified());

    contested()
        .filter(|t| t.is_threatened())
        .min_by(|a, b| a.timer_minutes().total_cmp(&b.timer_minutes()))
        .or_else(|| contested().max_by(|a, b| a.resistance().total_cmp(&b.resistance())))
}

/// Deferred halves of an action, due at a later step.
enum Deferred {
    Notice(PendingNotice),
    Reaction(PendingReaction),
}

/// Plays `session` to its end on a virtual clock.
///
/// Notices and citizen reactions resolve with the local fallback after
/// their configured delays.
/// Every log entry is handed to `on_entry` in order. Returns the final
/// snapshot.
pub fn run_headless(
    session: &mut Session,
    autopilot: Option<&Autopilot>,
    mut on_entry: impl FnMut(LogEntry),
) -> WorldSnapshot {
    let timing = session.tuning().timing.clone();
    let mut pending: Vec<(SessionTime, Deferred)> = Vec::new();
    let mut now = SessionTime::ZERO;
    let mut next_tick = SessionTime::from_millis(timing.tick_interval_ms);
    let mut next_mining = SessionTime::from_millis(timing.mining_interval_ms);

    for entry in session.drain_log() {
        on_entry(entry);
    }

    while session.is_active() {
        now = now.saturating_add(STEP_MS);

        let (mut due, waiting): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|(at, _)| *at <= now);
        pending = waiting;
        due.sort_by_key(|(at, _)| *at);
        for (_, deferred) in due {
            match deferred {
                Deferred::Notice(notice) => {
                    session.resolve_notice(&notice, None, now);
                }
                Deferred::Reaction(reaction) => {
                    session.record_reaction(&reaction, None, now);
                }
            }
        }

        session.sweep_cooldowns(now);
        if now >= next_tick {
            session.autonomous_tick(now);
            next_tick = next_tick.saturating_add(timing.tick_interval_ms);
        }
        if now >= next_mining {
            // gated cycles log their own advisory
            let _ = session.mine(now);
            next_mining = next_mining.saturating_add(timing.mining_interval_ms);
        }
        session.check_timeout(now);

        if let Some(autopilot) = autopilot {
            if let Some(receipt) = autopilot.play(session, now) {
                let reaction_at = now.saturating_add(timing.citizen_delay_ms);
                pending.push((reaction_at, Deferred::Reaction(receipt.reaction)));
                if receipt.notice.noticed {
                    let notice_at = now.saturating_add(timing.notice_delay_ms);
                    pending.push((notice_at, Deferred::Notice(receipt.notice)));
                }
            }
        }

        for entry in session.drain_log() {
            on_entry(entry);
        }
    }

    let snapshot = session.snapshot(now);
    info!(
        elapsed_ms = now.as_millis(),
        power = snapshot.power,
        heat = snapshot.heat,
        actions = snapshot.actions_completed,
        "headless run finished"
    );
    snapshot
}
