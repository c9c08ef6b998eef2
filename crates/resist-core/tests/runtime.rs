//! Timer-driven runtime tests.
//!
//! All of these run on tokio's paused clock, so sleeps complete instantly
//! while still firing ticks, notices and deadlines in time order.

use std::sync::Arc;
use std::time::Duration;

use resist_core::config::Tuning;
use resist_core::narrative::{
    self, CitizenRequest, Judge, JudgeError, JudgeFuture, NoopJudge, NoticeRequest,
};
use resist_core::runtime::{spawn_session, RuntimeError, SessionHandle};
use resist_core::session::Session;
use resist_core::{Rejection, ScriptedRng};
use resist_events::{LogCategory, LogEntry, OutcomeKind};
use tokio::sync::broadcast;
use tokio::time::sleep;

/// Garden in Riverside: power 4, heat 2, risk roll fails, recruitment at
/// base, noticed. Every later draw is 0.99, so ticks stay quiet.
fn garden_session(tuning: Tuning) -> Session {
    let draws = [0.0, 0.0, 0.0, 0.0, 0.99, 0.0, 0.0];
    Session::new(tuning, Box::new(ScriptedRng::new(draws).with_fallback(0.99)))
}

struct FailingJudge;

impl Judge for FailingJudge {
    fn respond<'a>(&'a self, _request: &'a NoticeRequest) -> JudgeFuture<'a> {
        Box::pin(async { Err(JudgeError::Unavailable("service down".into())) })
    }

    fn react<'a>(&'a self, _request: &'a CitizenRequest) -> JudgeFuture<'a> {
        Box::pin(async { Err(JudgeError::Unavailable("service down".into())) })
    }
}

struct StalledJudge;

impl Judge for StalledJudge {
    fn respond<'a>(&'a self, _request: &'a NoticeRequest) -> JudgeFuture<'a> {
        Box::pin(async {
            sleep(Duration::from_secs(600)).await;
            Ok(Some("far too late".to_string()))
        })
    }
}

struct ScriptJudge;

impl Judge for ScriptJudge {
    fn respond<'a>(&'a self, request: &'a NoticeRequest) -> JudgeFuture<'a> {
        let reply = format!("  Drones dispatched to {}.  ", request.target_name);
        Box::pin(async move { Ok(Some(reply)) })
    }
}

async fn plant_garden(handle: &SessionHandle) {
    handle.select_target("riverside").await.unwrap();
    let receipt = handle.perform("garden").await.unwrap();
    assert!(receipt.notice.noticed);
    assert_eq!(receipt.heat_gain, 2);
}

fn drain(events: &mut broadcast::Receiver<LogEntry>) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    while let Ok(entry) = events.try_recv() {
        entries.push(entry);
    }
    entries
}

fn fallback_line() -> &'static str {
    narrative::fallback_response(0.0, "Planted community garden", "Riverside")
}

#[tokio::test(start_paused = true)]
async fn test_heat_arrives_after_notice_delay() {
    let (handle, _actor) = spawn_session(garden_session(Tuning::default()), Arc::new(NoopJudge));
    plant_garden(&handle).await;

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.power, 4.0);
    assert_eq!(snap.heat, 0.0);

    sleep(Duration::from_millis(1500)).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.heat, 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_judge_uses_fallback() {
    let (handle, _actor) = spawn_session(garden_session(Tuning::default()), Arc::new(FailingJudge));
    let mut events = handle.subscribe();
    plant_garden(&handle).await;

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(handle.snapshot().await.unwrap().heat, 2.0);

    let ai: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| e.category == LogCategory::Ai)
        .collect();
    assert_eq!(ai.len(), 1);
    assert_eq!(ai[0].message, fallback_line());
}

fn citizen_line() -> &'static str {
    // power 4 after the garden
    narrative::citizen_fallback(4.0, "Planted community garden", "Riverside")
}

#[tokio::test(start_paused = true)]
async fn test_citizen_reaction_after_delay() {
    let (handle, _actor) = spawn_session(garden_session(Tuning::default()), Arc::new(FailingJudge));
    let mut events = handle.subscribe();
    plant_garden(&handle).await;

    sleep(Duration::from_secs(2)).await;
    let early = drain(&mut events);
    assert!(early.iter().all(|e| e.message != citizen_line()));

    sleep(Duration::from_secs(1)).await;
    let reactions: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| e.category == LogCategory::Citizen && e.message == citizen_line())
        .collect();
    assert_eq!(reactions.len(), 1);
    assert!(reactions[0].at.as_millis() >= 2_500);
}

#[tokio::test(start_paused = true)]
async fn test_unnoticed_action_gets_citizen_reaction() {
    // meeting in Old Town whose notice roll fails
    let draws = [0.0, 0.0, 0.0, 0.0, 0.99, 0.0, 0.99];
    let session = Session::new(
        Tuning::default(),
        Box::new(ScriptedRng::new(draws).with_fallback(0.99)),
    );
    let (handle, _actor) = spawn_session(session, Arc::new(NoopJudge));
    let mut events = handle.subscribe();

    handle.select_target("oldtown").await.unwrap();
    let receipt = handle.perform("meeting").await.unwrap();
    assert!(!receipt.notice.noticed);

    sleep(Duration::from_secs(3)).await;
    let expected = narrative::citizen_fallback(
        receipt.reaction.power,
        "Held secret organizing meeting",
        "Old Town",
    );
    let entries = drain(&mut events);
    assert!(entries
        .iter()
        .any(|e| e.category == LogCategory::Citizen && e.message == expected));
    assert!(entries.iter().all(|e| e.category != LogCategory::Ai));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_judge_times_out() {
    let (handle, _actor) = spawn_session(garden_session(Tuning::default()), Arc::new(StalledJudge));
    let mut events = handle.subscribe();
    plant_garden(&handle).await;

    // 1 s notice delay plus 5 s judge timeout
    sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.snapshot().await.unwrap().heat, 0.0);

    sleep(Duration::from_secs(4)).await;
    assert_eq!(handle.snapshot().await.unwrap().heat, 2.0);
    let entries = drain(&mut events);
    assert!(entries.iter().any(|e| e.message == fallback_line()));
}

#[tokio::test(start_paused = true)]
async fn test_judge_reply_is_logged() {
    let (handle, _actor) = spawn_session(garden_session(Tuning::default()), Arc::new(ScriptJudge));
    let mut events = handle.subscribe();
    plant_garden(&handle).await;

    sleep(Duration::from_millis(1500)).await;
    let entries = drain(&mut events);
    assert!(entries
        .iter()
        .any(|e| e.category == LogCategory::Ai && e.message == "Drones dispatched to Riverside."));
}

#[tokio::test(start_paused = true)]
async fn test_tick_runs_while_notice_pending() {
    let mut tuning = Tuning::default();
    tuning.timing.notice_delay_ms = 10_000;
    let (handle, _actor) = spawn_session(garden_session(tuning), Arc::new(NoopJudge));
    plant_garden(&handle).await;

    // one tick at 5 s, notice still waiting
    sleep(Duration::from_secs(6)).await;
    let snap = handle.snapshot().await.unwrap();
    let riverside = snap.target("riverside").unwrap();
    assert!(riverside.timer_minutes < 10.5);
    assert_eq!(snap.power, 4.0);
    assert_eq!(snap.heat, 0.0);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.snapshot().await.unwrap().heat, 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_expires_on_timer() {
    let (handle, _actor) = spawn_session(garden_session(Tuning::default()), Arc::new(NoopJudge));
    plant_garden(&handle).await;

    let remaining = handle
        .cooldown_remaining(resist_core::ActionKind::Garden, "riverside")
        .await
        .unwrap();
    assert!(remaining > 0);

    sleep(Duration::from_millis(remaining + 100)).await;
    let remaining = handle
        .cooldown_remaining(resist_core::ActionKind::Garden, "riverside")
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_deadline() {
    let mut tuning = Tuning::default();
    tuning.session.duration_secs = 20;
    let (handle, _actor) = spawn_session(garden_session(tuning), Arc::new(NoopJudge));

    sleep(Duration::from_secs(21)).await;
    let snap = handle.snapshot().await.unwrap();
    assert!(!snap.active);
    assert_eq!(snap.outcome.unwrap().kind, OutcomeKind::Timeout);

    let err = handle.select_target("riverside").await.unwrap_err();
    assert_eq!(err, RuntimeError::Rejected(Rejection::SessionInactive));
}

#[tokio::test(start_paused = true)]
async fn test_restart_drops_stale_notice() {
    let (handle, _actor) = spawn_session(garden_session(Tuning::default()), Arc::new(NoopJudge));
    plant_garden(&handle).await;

    handle.restart().await.unwrap();
    sleep(Duration::from_secs(2)).await;

    let snap = handle.snapshot().await.unwrap();
    assert!(snap.active);
    assert_eq!(snap.power, 0.0);
    assert_eq!(snap.heat, 0.0);
    assert!(snap.selected_target.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_handle_closed_after_shutdown() {
    let (handle, actor) = spawn_session(garden_session(Tuning::default()), Arc::new(NoopJudge));
    handle.shutdown().await.unwrap();

    let session = actor.await.unwrap();
    assert_eq!(session.generation(), 1);
    assert_eq!(handle.snapshot().await.unwrap_err(), RuntimeError::Closed);
}
