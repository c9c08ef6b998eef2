//! Core engine of the resistance simulation: world state, the action
//! pipeline, adversary escalation, income and victory rules, plus the
//! real-time runtime that drives them.

pub mod actions;
pub mod autoplay;
pub mod community;
pub mod config;
pub mod cooldown;
pub mod economy;
pub mod escalation;
pub mod events;
pub mod narrative;
pub mod recruitment;
pub mod rejection;
pub mod risk;
pub mod rng;
pub mod runtime;
pub mod session;
pub mod state;
pub mod victory;

pub use actions::{ActionCategory, ActionKind, Exposure};
pub use config::{ConfigError, Tuning};
pub use narrative::{CitizenRequest, Judge, JudgeError, NoopJudge, NoticeRequest};
pub use rejection::Rejection;
pub use rng::{RandomSource, ScriptedRng, SimRng};
pub use runtime::{spawn_session, RuntimeError, SessionHandle};
pub use session::{ActionReceipt, PendingNotice, PendingReaction, Session};
pub use state::{Target, TargetId, WorldState};
