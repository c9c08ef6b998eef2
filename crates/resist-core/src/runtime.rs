//! Real-time Runtime
//!
//! Drives a [`Session`] on the wall clock. One actor task owns the session
//! and reacts to player commands, the autonomous tick, the mining cycle, the
//! session deadline, and messages from the tasks it spawns (notice
//! resolution, citizen reactions and cooldown expiry). Everything that touches the world runs
//! on that one task, one message at a time.
//!
//! A noticed action's heat arrives through its own task after the notice
//! delay and the judge call, so ticks and further actions can land in
//! between. Every action also gets a citizen reaction on its own, longer
//! delay.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use resist_events::{LogEntry, SessionTime, WorldSnapshot};

use crate::actions::ActionKind;
use crate::config::TimingConfig;
use crate::cooldown::ActionTargetKey;
use crate::economy::EarningKind;
use crate::narrative::{self, Judge, Narration};
use crate::rejection::Rejection;
use crate::session::{ActionReceipt, EarningReceipt, PendingNotice, PendingReaction, Session};
use crate::state::TargetId;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

/// Errors returned through a [`SessionHandle`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("request rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("session runtime has shut down")]
    Closed,
}

type Reply<T> = oneshot::Sender<T>;

/// Requests accepted by the actor.
enum Command {
    SelectTarget {
        id: String,
        reply: Reply<Result<(), Rejection>>,
    },
    Perform {
        action: String,
        reply: Reply<Result<ActionReceipt, Rejection>>,
    },
    SellCollectible {
        reply: Reply<Result<EarningReceipt, Rejection>>,
    },
    Crowdfund {
        reply: Reply<Result<EarningReceipt, Rejection>>,
    },
    Snapshot {
        reply: Reply<WorldSnapshot>,
    },
    CooldownRemaining {
        action: ActionKind,
        target: TargetId,
        reply: Reply<u64>,
    },
    EarningCooldownRemaining {
        kind: EarningKind,
        reply: Reply<u64>,
    },
    Restart {
        reply: Reply<()>,
    },
    Shutdown,
}

/// Messages from tasks the actor spawned.
enum Internal {
    NoticeResolved {
        notice: PendingNotice,
        narration: Narration,
    },
    ReactionReady {
        reaction: PendingReaction,
        narration: Narration,
    },
    ActionCooldownExpired {
        generation: u64,
        key: ActionTargetKey,
    },
    EarningCooldownExpired {
        generation: u64,
        kind: EarningKind,
    },
}

enum Flow {
    Continue,
    Restarted,
    Shutdown,
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<LogEntry>,
}

impl SessionHandle {
    /// Log entries published after each message the actor handles.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.events.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    pub async fn select_target(&self, id: &str) -> Result<(), RuntimeError> {
        let id = id.to_string();
        self.request(|reply| Command::SelectTarget { id, reply })
            .await?
            .map_err(RuntimeError::from)
    }

    /// Performs an action by identifier, e.g. `"blockDemo"`.
    pub async fn perform(&self, action: &str) -> Result<ActionReceipt, RuntimeError> {
        let action = action.to_string();
        self.request(|reply| Command::Perform { action, reply })
            .await?
            .map_err(RuntimeError::from)
    }

    pub async fn sell_collectible(&self) -> Result<EarningReceipt, RuntimeError> {
        self.request(|reply| Command::SellCollectible { reply })
            .await?
            .map_err(RuntimeError::from)
    }

    pub async fn crowdfund(&self) -> Result<EarningReceipt, RuntimeError> {
        self.request(|reply| Command::Crowdfund { reply })
            .await?
            .map_err(RuntimeError::from)
    }

    pub async fn snapshot(&self) -> Result<WorldSnapshot, RuntimeError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn cooldown_remaining(
        &self,
        action: ActionKind,
        target: &str,
    ) -> Result<u64, RuntimeError> {
        let target = TargetId::from(target);
        self.request(|reply| Command::CooldownRemaining {
            action,
            target,
            reply,
        })
        .await
    }

    pub async fn earning_cooldown_remaining(&self, kind: EarningKind) -> Result<u64, RuntimeError> {
        self.request(|reply| Command::EarningCooldownRemaining { kind, reply })
            .await
    }

    /// Rebuilds the world and restarts the clock.
    pub async fn restart(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Restart { reply }).await
    }

    /// Stops the actor. The session is returned from its join handle.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| RuntimeError::Closed)
    }
}

/// Spawns the actor for `session` on the current tokio runtime.
///
/// The session clock starts now. The join handle yields the session once
/// the actor stops.
pub fn spawn_session(session: Session, judge: Arc<dyn Judge>) -> (SessionHandle, JoinHandle<Session>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();

    let timing = session.tuning().timing.clone();
    let actor = SessionActor {
        session,
        judge,
        timing,
        origin: Instant::now(),
        commands: commands_rx,
        internal_tx,
        internal_rx,
        events: events_tx.clone(),
    };

    let handle = SessionHandle {
        commands: commands_tx,
        events: events_tx,
    };
    (handle, tokio::spawn(actor.run()))
}

struct SessionActor {
    session: Session,
    judge: Arc<dyn Judge>,
    timing: TimingConfig,
    /// Wall-clock instant of session time zero
    origin: Instant,
    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    events: broadcast::Sender<LogEntry>,
}

impl SessionActor {
    fn now(&self) -> SessionTime {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        SessionTime::from_millis(elapsed.as_millis() as u64)
    }

    fn at(&self, time: SessionTime) -> Instant {
        self.origin + Duration::from_millis(time.as_millis())
    }

    fn interval(&self, period_ms: u64) -> Interval {
        let period = Duration::from_millis(period_ms);
        let mut interval = interval_at(self.origin + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    async fn run(mut self) -> Session {
        info!(
            session_id = %self.session.world().session_id(),
            "session runtime started"
        );

        let mut tick = self.interval(self.timing.tick_interval_ms);
        let mut mining = self.interval(self.timing.mining_interval_ms);
        let deadline = sleep_until(self.at(self.session.world().duration()));
        tokio::pin!(deadline);
        self.publish();

        loop {
            let active = self.session.is_active();
            let flow = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => Flow::Shutdown,
                },
                Some(message) = self.internal_rx.recv() => {
                    self.handle_internal(message);
                    Flow::Continue
                }
                _ = tick.tick(), if active => {
                    let now = self.now();
                    self.session.autonomous_tick(now);
                    Flow::Continue
                }
                _ = mining.tick(), if active => {
                    let now = self.now();
                    // gate advisories are logged by the session
                    let _ = self.session.mine(now);
                    Flow::Continue
                }
                _ = &mut deadline, if active => {
                    let now = self.now();
                    self.session.check_timeout(now);
                    Flow::Continue
                }
            };

            self.publish();
            match flow {
                Flow::Continue => {}
                Flow::Restarted => {
                    tick = self.interval(self.timing.tick_interval_ms);
                    mining = self.interval(self.timing.mining_interval_ms);
                    deadline
                        .as_mut()
                        .reset(self.at(self.session.world().duration()));
                }
                Flow::Shutdown => break,
            }
        }

        if let Err(e) = self.session.flush_log() {
            tracing::warn!(error = %e, "failed to flush event log");
        }
        info!("session runtime stopped");
        self.session
    }

    fn handle_command(&mut self, command: Command) -> Flow {
        let now = self.now();
        match command {
            Command::SelectTarget { id, reply } => {
                let _ = reply.send(self.session.select_target(&id, now));
            }
            Command::Perform { action, reply } => {
                let result = self.session.perform_named(&action, now);
                if let Ok(receipt) = &result {
                    self.schedule_action(receipt);
                }
                let _ = reply.send(result);
            }
            Command::SellCollectible { reply } => {
                let result = self.session.sell_collectible(now);
                if let Ok(receipt) = &result {
                    self.schedule_earning(receipt);
                }
                let _ = reply.send(result);
            }
            Command::Crowdfund { reply } => {
                let result = self.session.crowdfund(now);
                if let Ok(receipt) = &result {
                    self.schedule_earning(receipt);
                }
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot(now));
            }
            Command::CooldownRemaining {
                action,
                target,
                reply,
            } => {
                let _ = reply.send(self.session.cooldown_remaining(action, &target, now));
            }
            Command::EarningCooldownRemaining { kind, reply } => {
                let _ = reply.send(self.session.earning_cooldown_remaining(kind, now));
            }
            Command::Restart { reply } => {
                self.session.restart();
                self.origin = Instant::now();
                info!(generation = self.session.generation(), "session restarted");
                let _ = reply.send(());
                return Flow::Restarted;
            }
            Command::Shutdown => return Flow::Shutdown,
        }
        Flow::Continue
    }

    fn handle_internal(&mut self, message: Internal) {
        let now = self.now();
        match message {
            Internal::NoticeResolved { notice, narration } => {
                self.session.resolve_notice(&notice, Some(narration), now);
            }
            Internal::ReactionReady {
                reaction,
                narration,
            } => {
                self.session.record_reaction(&reaction, Some(narration), now);
            }
            Internal::ActionCooldownExpired { generation, key } => {
                if generation == self.session.generation() {
                    self.session.expire_action_cooldown(&key, now);
                }
            }
            Internal::EarningCooldownExpired { generation, kind } => {
                if generation == self.session.generation() {
                    self.session.expire_earning_cooldown(kind, now);
                }
            }
        }
    }

    /// Spawns the expiry timer, the citizen reaction and, if noticed, the
    /// notice resolution.
    fn schedule_action(&self, receipt: &ActionReceipt) {
        let generation = self.session.generation();
        let expiry = self.at(receipt.cooldown_expiry);
        let key = receipt.cooldown_key.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            sleep_until(expiry).await;
            let _ = tx.send(Internal::ActionCooldownExpired { generation, key });
        });

        let timeout = Duration::from_millis(self.timing.judge_timeout_ms);

        let reaction = receipt.reaction.clone();
        let judge = Arc::clone(&self.judge);
        let delay = Duration::from_millis(self.timing.citizen_delay_ms);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let request = reaction.request();
            let narration = narrative::narrate_citizen(judge.as_ref(), &request, timeout).await;
            let _ = tx.send(Internal::ReactionReady {
                reaction,
                narration,
            });
        });

        if !receipt.notice.noticed {
            return;
        }
        let notice = receipt.notice.clone();
        let judge = Arc::clone(&self.judge);
        let delay = Duration::from_millis(self.timing.notice_delay_ms);
        let tx = self.internal_tx.clone();
        debug!(ticket = notice.ticket, "notice resolution scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let request = notice.request();
            let narration = narrative::narrate(judge.as_ref(), &request, timeout).await;
            let _ = tx.send(Internal::NoticeResolved { notice, narration });
        });
    }

    fn schedule_earning(&self, receipt: &EarningReceipt) {
        let generation = self.session.generation();
        let expiry = self.at(receipt.cooldown_expiry);
        let kind = receipt.kind;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            sleep_until(expiry).await;
            let _ = tx.send(Internal::EarningCooldownExpired { generation, kind });
        });
    }

    fn publish(&mut self) {
        for entry in self.session.drain_log() {
            // no subscribers is fine
            let _ = self.events.send(entry);
        }
    }
}
