//! Static catalog: action kinds, generators ("crew"), upgrades and contracts.

use serde::{Deserialize, Serialize};

/// Kinds of throttled actions. Each has its own cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// The hunt button: earns credits or contract progress.
    Action,
    /// Hiring crew; shared by every generator type.
    Hire,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[ActionKind::Action, ActionKind::Hire]
    }

    pub fn id(&self) -> &'static str {
        match self {
            ActionKind::Action => "action",
            ActionKind::Hire => "hire",
        }
    }

    pub fn from_id(id: &str) -> Option<ActionKind> {
        Self::all().iter().copied().find(|k| k.id() == id)
    }
}

/// Automated clicking driven by a generator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Autoclick {
    pub target: ActionKind,
    /// Interval with a single unit owned, in ticks.
    pub base_interval_ticks: f64,
}

/// Hireable crew members.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneratorId {
    Novice,
    Snitch,
}

impl GeneratorId {
    /// All generators in display (and legacy save) order.
    pub fn all() -> &'static [GeneratorId] {
        &[GeneratorId::Novice, GeneratorId::Snitch]
    }

    pub fn id(&self) -> &'static str {
        match self {
            GeneratorId::Novice => "novice",
            GeneratorId::Snitch => "snitch",
        }
    }

    pub fn from_id(id: &str) -> Option<GeneratorId> {
        Self::all().iter().copied().find(|g| g.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeneratorId::Novice => "Novice Hunter",
            GeneratorId::Snitch => "Snitch",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GeneratorId::Novice => "A rookie bounty hunter eager to prove themselves",
            GeneratorId::Snitch => "Provides intel and automates hunting",
        }
    }

    pub fn base_cost(&self) -> f64 {
        match self {
            GeneratorId::Novice => 20.0,
            GeneratorId::Snitch => 1_000.0,
        }
    }

    pub fn cost_growth(&self) -> f64 {
        match self {
            GeneratorId::Novice => 1.15,
            GeneratorId::Snitch => 10.0,
        }
    }

    /// Passive credits per tick per unit.
    pub fn per_tick(&self) -> f64 {
        match self {
            GeneratorId::Novice => 0.5,
            GeneratorId::Snitch => 0.0,
        }
    }

    pub fn autoclick(&self) -> Option<Autoclick> {
        match self {
            GeneratorId::Novice => None,
            GeneratorId::Snitch => Some(Autoclick {
                target: ActionKind::Action,
                base_interval_ticks: 1.0,
            }),
        }
    }
}

/// What an upgrade changes when its level moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpgradeEffect {
    /// Shortens every cooldown by a percentage per level.
    CooldownReduction,
    /// Click power of `kind` becomes `2^level`.
    ClickMultiplier { kind: ActionKind },
}

/// Permanent, levelled upgrades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeId {
    ReduceCooldown,
    DoubleClick,
}

impl UpgradeId {
    pub fn all() -> &'static [UpgradeId] {
        &[UpgradeId::ReduceCooldown, UpgradeId::DoubleClick]
    }

    pub fn id(&self) -> &'static str {
        match self {
            UpgradeId::ReduceCooldown => "reduceCooldown",
            UpgradeId::DoubleClick => "doubleClick",
        }
    }

    pub fn from_id(id: &str) -> Option<UpgradeId> {
        Self::all().iter().copied().find(|u| u.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            UpgradeId::ReduceCooldown => "Quick Draw",
            UpgradeId::DoubleClick => "Precision Shot",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            UpgradeId::ReduceCooldown => "Reduces action cooldown by 5% per level",
            UpgradeId::DoubleClick => "Doubles your hunting effectiveness per level",
        }
    }

    pub fn base_cost(&self) -> f64 {
        match self {
            UpgradeId::ReduceCooldown => 10.0,
            UpgradeId::DoubleClick => 20.0,
        }
    }

    pub fn cost_growth(&self) -> f64 {
        match self {
            UpgradeId::ReduceCooldown => 1.15,
            UpgradeId::DoubleClick => 2.5,
        }
    }

    /// Level cap, if any. The cooldown upgrade is capped by the configured
    /// reduction max level.
    pub fn max_level(&self, cooldown_max_level: u32) -> Option<u32> {
        match self {
            UpgradeId::ReduceCooldown => Some(cooldown_max_level),
            UpgradeId::DoubleClick => None,
        }
    }

    pub fn effect(&self) -> UpgradeEffect {
        match self {
            UpgradeId::ReduceCooldown => UpgradeEffect::CooldownReduction,
            UpgradeId::DoubleClick => UpgradeEffect::ClickMultiplier {
                kind: ActionKind::Action,
            },
        }
    }
}

/// A bounded-goal task paying a one-time reward.
#[derive(Clone, Debug, PartialEq)]
pub struct Contract {
    pub id: &'static str,
    pub title: &'static str,
    pub details: &'static str,
    /// Cumulative progress needed to complete.
    pub goal: f64,
    pub reward: f64,
}

/// Contracts in progression order. Completing one makes the next current;
/// the last one stays current and can be repeated.
pub const CONTRACTS: &[Contract] = &[
    Contract {
        id: "familiar-face",
        title: "A Familiar Face",
        details: "Your former partner needs help tracking down a high-value target.",
        goal: 1_000.0,
        reward: 2_000.0,
    },
    Contract {
        id: "stolen-goods",
        title: "Stolen Goods Recovery",
        details: "A merchant's entire shipment was stolen. Track down the thieves.",
        goal: 2_500.0,
        reward: 5_000.0,
    },
    Contract {
        id: "dangerous-fugitive",
        title: "Dangerous Fugitive",
        details: "This one's dangerous. Bring backup and expect resistance.",
        goal: 5_000.0,
        reward: 12_000.0,
    },
    Contract {
        id: "corporate-espionage",
        title: "Corporate Espionage",
        details: "A rival company is stealing trade secrets. Gather evidence discreetly.",
        goal: 10_000.0,
        reward: 25_000.0,
    },
    Contract {
        id: "gang-leader",
        title: "Gang Leader Takedown",
        details: "Take down the leader and their entire operation. This is the big one.",
        goal: 25_000.0,
        reward: 75_000.0,
    },
];

pub fn contract(index: usize) -> Option<&'static Contract> {
    CONTRACTS.get(index)
}
