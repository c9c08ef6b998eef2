//! Request Rejections
//!
//! Invalid player requests are answered with a reason, never a panic. A
//! rejection guarantees the world state was left untouched.

use thiserror::Error;

use crate::actions::ActionKind;
use crate::economy::EarningKind;

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("Unknown action '{0}'.")]
    UnknownAction(String),

    #[error("Select a neighborhood first to take action.")]
    NoTargetSelected,

    #[error("Unknown neighborhood '{0}'.")]
    UnknownTarget(String),

    #[error("Insufficient funds. Need {needed}, have {available}.")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("{action} is still on cooldown in {target} ({remaining_ms} ms left).")]
    ActionOnCooldown {
        action: ActionKind,
        target: String,
        remaining_ms: u64,
    },

    #[error("Slow down: global cooldown active ({remaining_ms} ms left).")]
    GlobalCooldown { remaining_ms: u64 },

    #[error("{kind} on cooldown ({remaining_ms} ms left).")]
    EarningOnCooldown { kind: EarningKind, remaining_ms: u64 },

    #[error("Needs {required}+ active participants (have {current}).")]
    PopulationThreshold { required: u64, current: u64 },

    #[error("{action} unavailable: {requirement}.")]
    RequirementNotMet {
        action: ActionKind,
        requirement: String,
    },

    #[error("The session is not active.")]
    SessionInactive,
}

impl Rejection {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::UnknownAction(_) => "unknown_action",
            Rejection::NoTargetSelected => "no_target_selected",
            Rejection::UnknownTarget(_) => "unknown_target",
            Rejection::InsufficientFunds { .. } => "insufficient_funds",
            Rejection::ActionOnCooldown { .. } => "action_on_cooldown",
            Rejection::GlobalCooldown { .. } => "global_cooldown",
            Rejection::EarningOnCooldown { .. } => "earning_on_cooldown",
            Rejection::PopulationThreshold { .. } => "population_threshold",
            Rejection::RequirementNotMet { .. } => "requirement_not_met",
            Rejection::SessionInactive => "session_inactive",
        }
    }

    /// True for rejections that will clear on their own with time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Rejection::ActionOnCooldown { .. }
                | Rejection::GlobalCooldown { .. }
                | Rejection::EarningOnCooldown { .. }
        )
    }
}
