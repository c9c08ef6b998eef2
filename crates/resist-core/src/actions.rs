//! Action Catalog
//!
//! The twelve player actions, their gain ranges, prices, and the fixed sets
//! (direct, low-exposure, stealth, loud, infrastructure) the subsystems key on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rejection::Rejection;

/// A player action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Occupy,
    BlockDemo,
    Protest,
    StreetArt,
    Garden,
    Festival,
    HackCams,
    MeshNet,
    PirateBroad,
    Meeting,
    Recruit,
    Intel,
}

/// Broad family an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Physical confrontation
    Direct,
    /// Brings crowds into the street
    Mobilizing,
    /// Quiet network building
    Organizing,
    /// Art and community life
    Cultural,
    /// Technical operations
    Digital,
}

/// How visible an action is to the adversary's detection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    Stealth,
    Normal,
    Loud,
}

/// Precondition an action places on the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Requirement {
    /// The selected target must be threatened
    ThreatenedTarget,
    /// Collective power must be at least this high
    MinPower(f64),
}

/// Static definition of an action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSpec {
    pub kind: ActionKind,
    /// Log text, also sent to the narrative collaborator
    pub description: &'static str,
    /// Inclusive range of power gained
    pub power: (u64, u64),
    /// Inclusive range of heat generated if the adversary notices
    pub heat: (u64, u64),
    /// Price before heat, emergency and bulk modifiers
    pub base_cost: u64,
    pub category: ActionCategory,
}

const CATALOG: [ActionSpec; 12] = [
    ActionSpec {
        kind: ActionKind::Occupy,
        description: "Organized building occupation",
        power: (6, 10),
        heat: (12, 18),
        base_cost: 3500,
        category: ActionCategory::Direct,
    },
    ActionSpec {
        kind: ActionKind::BlockDemo,
        description: "Blocked demolition crews",
        power: (8, 12),
        heat: (15, 25),
        base_cost: 4000,
        category: ActionCategory::Direct,
    },
    ActionSpec {
        kind: ActionKind::Protest,
        description: "Led protest march",
        power: (5, 8),
        heat: (10, 15),
        base_cost: 2000,
        category: ActionCategory::Mobilizing,
    },
    ActionSpec {
        kind: ActionKind::StreetArt,
        description: "Created inspiring mural",
        power: (3, 6),
        heat: (4, 8),
        base_cost: 125,
        category: ActionCategory::Cultural,
    },
    ActionSpec {
        kind: ActionKind::Garden,
        description: "Planted community garden",
        power: (4, 7),
        heat: (2, 5),
        base_cost: 50,
        category: ActionCategory::Cultural,
    },
    ActionSpec {
        kind: ActionKind::Festival,
        description: "Organized block festival",
        power: (6, 9),
        heat: (6, 10),
        base_cost: 600,
        category: ActionCategory::Mobilizing,
    },
    ActionSpec {
        kind: ActionKind::HackCams,
        description: "Disabled surveillance cameras",
        power: (5, 8),
        heat: (8, 12),
        base_cost: 750,
        category: ActionCategory::Digital,
    },
    ActionSpec {
        kind: ActionKind::MeshNet,
        description: "Installed mesh network nodes",
        power: (4, 6),
        heat: (5, 8),
        base_cost: 700,
        category: ActionCategory::Digital,
    },
    ActionSpec {
        kind: ActionKind::PirateBroad,
        description: "Hijacked city communications",
        power: (7, 10),
        heat: (12, 16),
        base_cost: 3000,
        category: ActionCategory::Digital,
    },
    ActionSpec {
        kind: ActionKind::Meeting,
        description: "Held secret organizing meeting",
        power: (3, 5),
        heat: (1, 3),
        base_cost: 75,
        category: ActionCategory::Organizing,
    },
    ActionSpec {
        kind: ActionKind::Recruit,
        description: "Recruited new allies",
        power: (5, 8),
        heat: (3, 6),
        base_cost: 500,
        category: ActionCategory::Mobilizing,
    },
    ActionSpec {
        kind: ActionKind::Intel,
        description: "Gathered intelligence on AI Mayor",
        power: (2, 4),
        heat: (1, 2),
        base_cost: 100,
        category: ActionCategory::Organizing,
    },
];

impl ActionKind {
    /// Returns all action kinds in catalog order.
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::Occupy,
            ActionKind::BlockDemo,
            ActionKind::Protest,
            ActionKind::StreetArt,
            ActionKind::Garden,
            ActionKind::Festival,
            ActionKind::HackCams,
            ActionKind::MeshNet,
            ActionKind::PirateBroad,
            ActionKind::Meeting,
            ActionKind::Recruit,
            ActionKind::Intel,
        ]
    }

    pub fn spec(self) -> &'static ActionSpec {
        &CATALOG[self as usize]
    }

    /// Identifier used on the wire and in cooldown keys.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Occupy => "occupy",
            ActionKind::BlockDemo => "blockDemo",
            ActionKind::Protest => "protest",
            ActionKind::StreetArt => "streetArt",
            ActionKind::Garden => "garden",
            ActionKind::Festival => "festival",
            ActionKind::HackCams => "hackCams",
            ActionKind::MeshNet => "meshNet",
            ActionKind::PirateBroad => "pirateBroad",
            ActionKind::Meeting => "meeting",
            ActionKind::Recruit => "recruit",
            ActionKind::Intel => "intel",
        }
    }

    pub fn category(self) -> ActionCategory {
        self.spec().category
    }

    /// High-exposure actions that add extra deaths to casualty rolls.
    pub fn is_direct(self) -> bool {
        matches!(
            self,
            ActionKind::Occupy | ActionKind::BlockDemo | ActionKind::Protest
        )
    }

    /// Actions whose casualties are cut to a tenth.
    pub fn is_low_exposure(self) -> bool {
        matches!(
            self,
            ActionKind::Garden | ActionKind::Meeting | ActionKind::Intel
        )
    }

    /// Actions that raise the passive mining multiplier.
    pub fn is_infrastructure(self) -> bool {
        matches!(
            self,
            ActionKind::MeshNet | ActionKind::HackCams | ActionKind::PirateBroad
        )
    }

    pub fn exposure(self) -> Exposure {
        match self {
            ActionKind::Meeting
            | ActionKind::Intel
            | ActionKind::Garden
            | ActionKind::HackCams
            | ActionKind::MeshNet => Exposure::Stealth,
            ActionKind::Occupy
            | ActionKind::BlockDemo
            | ActionKind::Protest
            | ActionKind::PirateBroad
            | ActionKind::Festival => Exposure::Loud,
            ActionKind::StreetArt | ActionKind::Recruit => Exposure::Normal,
        }
    }

    pub fn requirement(self) -> Option<Requirement> {
        match self {
            ActionKind::BlockDemo => Some(Requirement::ThreatenedTarget),
            ActionKind::PirateBroad => Some(Requirement::MinPower(20.0)),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Rejection::UnknownAction(s.to_string()))
    }
}

impl Requirement {
    /// Checks the requirement against the selected target and current power.
    pub fn is_met(self, target_threatened: bool, power: f64) -> bool {
        match self {
            Requirement::ThreatenedTarget => target_threatened,
            Requirement::MinPower(min) => power >= min,
        }
    }

    pub fn describe(self) -> String {
        match self {
            Requirement::ThreatenedTarget => "target must be under threat".to_string(),
            Requirement::MinPower(min) => format!("requires {} community power", min),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_matches_kinds() {
        for kind in ActionKind::all() {
            assert_eq!(kind.spec().kind, *kind);
        }
    }

    #[test]
    fn test_base_cost_tiers() {
        for kind in ActionKind::all() {
            let cost = kind.spec().base_cost;
            assert!(
                (50..=125).contains(&cost) || (500..=750).contains(&cost) || (2000..=4000).contains(&cost),
                "{} costs {}",
                kind,
                cost
            );
        }
    }

    #[test]
    fn test_parse_round_trips_identifiers() {
        for kind in ActionKind::all() {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), *kind);
        }
        assert_eq!(
            "teaParty".parse::<ActionKind>(),
            Err(Rejection::UnknownAction("teaParty".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_camel_case() {
        assert_eq!(
            serde_json::to_string(&ActionKind::PirateBroad).unwrap(),
            r#""pirateBroad""#
        );
    }

    #[test]
    fn test_exposure_sets_are_disjoint_from_each_other() {
        let stealth: Vec<_> = ActionKind::all()
            .iter()
            .filter(|k| k.exposure() == Exposure::Stealth)
            .collect();
        let loud: Vec<_> = ActionKind::all()
            .iter()
            .filter(|k| k.exposure() == Exposure::Loud)
            .collect();

        assert_eq!(stealth.len(), 5);
        assert_eq!(loud.len(), 5);
        assert!(ActionKind::Meeting.is_low_exposure());
        assert!(ActionKind::Protest.is_direct());
        assert!(!ActionKind::Festival.is_direct());
    }

    #[test]
    fn test_requirements() {
        let block = ActionKind::BlockDemo.requirement().unwrap();
        assert!(block.is_met(true, 0.0));
        assert!(!block.is_met(false, 99.0));

        let broadcast = ActionKind::PirateBroad.requirement().unwrap();
        assert!(!broadcast.is_met(true, 19.9));
        assert!(broadcast.is_met(false, 20.0));
        assert!(ActionKind::Garden.requirement().is_none());
    }
}
