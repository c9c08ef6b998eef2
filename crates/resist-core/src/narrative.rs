//! Narrative Collaborator
//!
//! The engine does not write the adversary's replies to noticed actions, nor
//! the neighborhood's reaction to each action. It asks a [`Judge`] for a line
//! of text and fails open: anything other than a usable reply in time falls
//! back to a fixed phrase chosen deterministically from the action and either
//! the heat tier (adversary) or the morale tier (citizens).
//!
//! This module also holds the canned flavor lines used by the autonomous
//! adversary and community.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::ActionKind;
use crate::rng::RandomSource;

/// Upper bound on a cleaned response, in characters.
pub const MAX_RESPONSE_CHARS: usize = 1000;

/// What the judge is told about a noticed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeRequest {
    pub action: ActionKind,
    pub description: String,
    pub target_name: String,
    /// Heat when the action was taken
    pub heat: f64,
}

/// What the judge is told when asking how citizens react to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenRequest {
    pub action: ActionKind,
    pub description: String,
    pub target_name: String,
    /// Community power once the action landed
    pub power: f64,
}

/// Why a judge produced nothing usable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JudgeError {
    #[error("judge unavailable: {0}")]
    Unavailable(String),

    #[error("judge timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed judge response: {0}")]
    Malformed(String),
}

pub type JudgeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<String>, JudgeError>> + Send + 'a>>;

/// External producer of narrative lines: the adversary's reply to a noticed
/// action and the citizens' reaction to any action.
///
/// `Ok(None)` means the judge has nothing to say; the engine then uses the
/// local fallback line.
pub trait Judge: Send + Sync {
    fn respond<'a>(&'a self, request: &'a NoticeRequest) -> JudgeFuture<'a>;

    /// Citizen voice. Judges that only play the adversary keep the default.
    fn react<'a>(&'a self, _request: &'a CitizenRequest) -> JudgeFuture<'a> {
        Box::pin(async { Ok(None) })
    }
}

/// Judge that never responds. The default collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopJudge;

impl Judge for NoopJudge {
    fn respond<'a>(&'a self, _request: &'a NoticeRequest) -> JudgeFuture<'a> {
        Box::pin(async { Ok(None) })
    }
}

/// Where a notice line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationSource {
    Judge,
    Fallback,
}

/// Display line for a noticed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    pub text: String,
    pub source: NarrationSource,
}

impl Narration {
    pub fn fallback(text: &str) -> Self {
        Self {
            text: text.to_string(),
            source: NarrationSource::Fallback,
        }
    }
}

/// Asks the judge for the adversary's reply, bounded by `timeout`. Never fails.
pub async fn narrate(judge: &dyn Judge, request: &NoticeRequest, timeout: Duration) -> Narration {
    let fallback = fallback_response(request.heat, &request.description, &request.target_name);
    consult(judge.respond(request), timeout, request.action, "adversary", fallback).await
}

/// Asks the judge for the citizens' reaction, bounded by `timeout`. Never fails.
pub async fn narrate_citizen(
    judge: &dyn Judge,
    request: &CitizenRequest,
    timeout: Duration,
) -> Narration {
    let fallback = citizen_fallback(request.power, &request.description, &request.target_name);
    consult(judge.react(request), timeout, request.action, "citizen", fallback).await
}

async fn consult(
    reply: JudgeFuture<'_>,
    timeout: Duration,
    action: ActionKind,
    voice: &'static str,
    fallback: &'static str,
) -> Narration {
    let result = match tokio::time::timeout(timeout, reply).await {
        Ok(result) => result,
        Err(_) => Err(JudgeError::Timeout(timeout)),
    };

    match result {
        Ok(Some(raw)) => {
            let text = clean_response(&raw);
            if text.is_empty() {
                tracing::warn!(action = %action, voice, "judge returned an empty reply, using fallback");
                return Narration::fallback(fallback);
            }
            Narration {
                text,
                source: NarrationSource::Judge,
            }
        }
        Ok(None) => {
            tracing::debug!(action = %action, voice, "judge declined, using fallback");
            Narration::fallback(fallback)
        }
        Err(err) => {
            tracing::warn!(action = %action, voice, error = %err, "judge failed, using fallback");
            Narration::fallback(fallback)
        }
    }
}

/// Trims, strips one pair of surrounding quotes, collapses whitespace and
/// truncates to [`MAX_RESPONSE_CHARS`].
pub fn clean_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);

    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_RESPONSE_CHARS).collect()
}

/// 64-bit FNV-1a.
pub fn stable_hash(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

/// Severity of the adversary's tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTier {
    Low,
    Medium,
    High,
}

impl EscalationTier {
    pub fn from_heat(heat: f64) -> Self {
        if heat > 50.0 {
            EscalationTier::High
        } else if heat > 20.0 {
            EscalationTier::Medium
        } else {
            EscalationTier::Low
        }
    }

    fn lines(self) -> &'static [&'static str] {
        match self {
            EscalationTier::Low => &FALLBACK_LOW,
            EscalationTier::Medium => &FALLBACK_MEDIUM,
            EscalationTier::High => &FALLBACK_HIGH,
        }
    }
}

/// Fallback reply for a noticed action. Same inputs, same line.
pub fn fallback_response(heat: f64, description: &str, target_name: &str) -> &'static str {
    let lines = EscalationTier::from_heat(heat).lines();
    let key = format!("{}{}", description, target_name);
    let idx = (stable_hash(key.as_bytes()) % lines.len() as u64) as usize;
    lines[idx]
}

/// Community morale, read from power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoraleTier {
    Low,
    Medium,
    High,
}

impl MoraleTier {
    pub fn from_power(power: f64) -> Self {
        if power > 50.0 {
            MoraleTier::High
        } else if power > 20.0 {
            MoraleTier::Medium
        } else {
            MoraleTier::Low
        }
    }

    /// Fallback reactions for this tier.
    pub fn lines(self) -> &'static [&'static str] {
        match self {
            MoraleTier::Low => &CITIZEN_LOW,
            MoraleTier::Medium => &CITIZEN_MEDIUM,
            MoraleTier::High => &CITIZEN_HIGH,
        }
    }
}

/// Fallback citizen reaction to an action. Same inputs, same line.
pub fn citizen_fallback(power: f64, description: &str, target_name: &str) -> &'static str {
    let lines = MoraleTier::from_power(power).lines();
    let key = format!("{}{}", description, target_name);
    let idx = (stable_hash(key.as_bytes()) % lines.len() as u64) as usize;
    lines[idx]
}

const FALLBACK_LOW: [&str; 5] = [
    "Deploying additional surveillance units to target area.",
    "Efficiency algorithms updated to counter disruption patterns.",
    "Property optimization protocols activated.",
    "Citizen behavior patterns flagged for enhanced monitoring.",
    "Automated patrol routes recalibrated for maximum coverage.",
];

const FALLBACK_MEDIUM: [&str; 5] = [
    "Escalating surveillance protocols in response to inefficiency.",
    "Economic pressure algorithms activated for non-compliant zones.",
    "Predictive policing models deployed to prevent further disruption.",
    "Property value optimization accelerated in affected areas.",
    "Social media monitoring increased 200% in target demographics.",
];

const FALLBACK_HIGH: [&str; 5] = [
    "CRITICAL THREAT: Deploying emergency optimization protocols.",
    "All available enforcement algorithms directed to resistance zones.",
    "Immediate eviction procedures initiated for efficiency restoration.",
    "Emergency gentrification acceleration approved for target areas.",
    "Maximum surveillance state protocols now active city-wide.",
];

const CITIZEN_LOW: [&str; 5] = [
    "Community center organizing emergency response meeting tonight.",
    "Neighbors sharing resources and child care for organizers.",
    "Local business offering safe space for resistance planning.",
    "Elders sharing organizing wisdom and historical strategies.",
    "Youth setting up secure communication networks for coordination.",
];

const CITIZEN_MEDIUM: [&str; 5] = [
    "Mutual aid network expanding to support more families.",
    "Local artists creating solidarity murals across the neighborhood.",
    "Community kitchen providing free meals for all organizers.",
    "Residents documenting police misconduct and sharing evidence.",
    "Small businesses coordinating boycott of corporate developments.",
];

const CITIZEN_HIGH: [&str; 5] = [
    "Multiple neighborhoods coordinating simultaneous resistance actions.",
    "Community land trust forming to protect affordable housing.",
    "Neighborhood assemblies planning participatory democracy structures.",
    "Cross-community solidarity networks sharing successful strategies.",
    "Alternative economic systems emerging through mutual aid networks.",
];

const ESCALATION_LINES: [&str; 5] = [
    "Emergency optimization protocols activated across all districts.",
    "Deploying autonomous enforcement units to resistance hotspots.",
    "Predictive arrest algorithms now targeting potential dissidents.",
    "Economic sanctions applied to non-compliant neighborhood businesses.",
    "Emergency gentrification orders fast-tracked through automated systems.",
];

const ROUTINE_LINES: [&str; 5] = [
    "Efficiency optimization protocols updated across city systems.",
    "Property value algorithms recalibrated for maximum ROI.",
    "Citizen movement patterns analyzed for behavioral optimization.",
    "Resource allocation algorithms fine-tuned for peak efficiency.",
    "Automated zoning adjustments implemented per optimization models.",
];

const COMMUNITY_STRONG: [&str; 5] = [
    "Neighborhood assembly discussing participatory budgeting proposals.",
    "Community land trust organizing to prevent further gentrification.",
    "Multiple blocks coordinating resistance strategy sharing.",
    "Local businesses forming cooperative network for mutual support.",
    "Residents establishing community-controlled broadband infrastructure.",
];

const COMMUNITY_BUILDING: [&str; 5] = [
    "Community garden providing fresh food for organizing meetings.",
    "Local clinic offering free healthcare for resistance members.",
    "Neighbor-to-neighbor wellness checks ensuring everyone's safety.",
    "Community tool library opening for neighborhood infrastructure projects.",
    "Residents creating phone trees for rapid emergency response.",
];

const COMMUNITY_STRUGGLING: [&str; 5] = [
    "Families sharing meals and child care during difficult times.",
    "Elderly residents offering homes as safe meeting spaces.",
    "Community members quietly documenting surveillance and harassment.",
    "Local volunteers providing transportation for those in need.",
    "Neighbors creating informal support networks for basic needs.",
];

const REPRESSION_RESPONSES: [&str; 5] = [
    "Emergency mutual aid networks activating across all neighborhoods.",
    "Community members going underground to protect organizing infrastructure.",
    "Rapid response teams forming to document and resist police actions.",
    "Alternative communication networks bypassing monitored channels.",
    "Community defense groups organizing know-your-rights trainings.",
];

/// Picks the adversary's escalation line. Consumes one draw.
pub fn escalation_line(rng: &mut dyn RandomSource) -> &'static str {
    ESCALATION_LINES[rng.index(ESCALATION_LINES.len())]
}

/// Picks the adversary's routine line. Consumes one draw.
pub fn routine_line(rng: &mut dyn RandomSource) -> &'static str {
    ROUTINE_LINES[rng.index(ROUTINE_LINES.len())]
}

/// Picks a community activity line matched to morale. Consumes one draw.
pub fn community_line(power: f64, rng: &mut dyn RandomSource) -> &'static str {
    let lines: &[&str] = if power >= 50.0 {
        &COMMUNITY_STRONG
    } else if power >= 20.0 {
        &COMMUNITY_BUILDING
    } else {
        &COMMUNITY_STRUGGLING
    };
    lines[rng.index(lines.len())]
}

/// Picks the community's answer to a crackdown. Consumes one draw.
pub fn repression_response(rng: &mut dyn RandomSource) -> &'static str {
    REPRESSION_RESPONSES[rng.index(REPRESSION_RESPONSES.len())]
}

/// Citywide celebration of a liberated zone. Consumes one draw.
pub fn celebration_line(target_name: &str, rng: &mut dyn RandomSource) -> String {
    match rng.index(5) {
        0 => format!("Block parties erupting across the city celebrating {}'s liberation!", target_name),
        1 => format!("Communities citywide inspired by {}'s successful resistance.", target_name),
        2 => format!("{} shares organizing strategies with other neighborhoods.", target_name),
        3 => format!("Liberation of {} proves community power can defeat algorithms.", target_name),
        _ => format!("Mutual aid networks strengthened by {}'s victory example.", target_name),
    }
}
