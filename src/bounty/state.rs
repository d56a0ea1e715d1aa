//! The mutable game aggregate.
//!
//! `GameState` is plain data. Every mutation goes through `logic` (commands
//! and the tick) or through load-time normalization in `save`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::catalog::{self, ActionKind, Contract, GeneratorId, UpgradeId};
use super::config::EngineConfig;
use super::cooldown::Cooldown;
use super::economy;
use crate::time::Millis;

/// Click power of one action kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonType {
    pub base: f64,
    pub multiplier: f64,
}

impl Default for ButtonType {
    fn default() -> Self {
        Self {
            base: 1.0,
            multiplier: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorState {
    pub count: u32,
    pub revealed: bool,
}

/// Named unlock gates. Stored by name so saves keep flags this build
/// does not know about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    ContractsUnlocked,
    ContractsHintRemoved,
    UpgradesRevealed,
}

impl Flag {
    pub fn name(&self) -> &'static str {
        match self {
            Flag::ContractsUnlocked => "contractsUnlocked",
            Flag::ContractsHintRemoved => "contractsHintRemoved",
            Flag::UpgradesRevealed => "upgradesRevealed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    pub credits: f64,
    /// Production not yet converted to credits.
    pub unbanked: f64,
    pub ticks: u64,
    pub button_types: BTreeMap<ActionKind, ButtonType>,
    pub cooldowns: BTreeMap<ActionKind, Cooldown>,
    pub upgrades: BTreeMap<UpgradeId, u32>,
    pub revealed_upgrades: BTreeSet<UpgradeId>,
    pub generators: BTreeMap<GeneratorId, GeneratorState>,
    pub flags: BTreeMap<String, bool>,
    pub contract_active: bool,
    pub contract_progress: f64,
    /// Index into [`catalog::CONTRACTS`].
    pub current_contract: usize,
    pub last_saved_at: Millis,
}

impl GameState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            credits: 0.0,
            unbanked: 0.0,
            ticks: 0,
            button_types: ActionKind::all()
                .iter()
                .map(|&k| (k, ButtonType::default()))
                .collect(),
            cooldowns: ActionKind::all()
                .iter()
                .map(|&k| (k, Cooldown::new(config.base_cooldown_ms)))
                .collect(),
            upgrades: UpgradeId::all().iter().map(|&u| (u, 0)).collect(),
            revealed_upgrades: BTreeSet::new(),
            generators: GeneratorId::all()
                .iter()
                .map(|&g| (g, GeneratorState::default()))
                .collect(),
            flags: BTreeMap::new(),
            contract_active: false,
            contract_progress: 0.0,
            current_contract: 0,
            last_saved_at: 0,
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.flags.get(flag.name()).copied().unwrap_or(false)
    }

    /// Flags only ever turn on. Returns true if this call flipped it.
    pub fn raise_flag(&mut self, flag: Flag) -> bool {
        let slot = self.flags.entry(flag.name().to_string()).or_insert(false);
        let flipped = !*slot;
        *slot = true;
        flipped
    }

    pub fn generator_count(&self, id: GeneratorId) -> u32 {
        self.generators.get(&id).map(|g| g.count).unwrap_or(0)
    }

    pub fn generator_revealed(&self, id: GeneratorId) -> bool {
        self.generators.get(&id).map(|g| g.revealed).unwrap_or(false)
    }

    pub fn total_generators(&self) -> u32 {
        self.generators
            .values()
            .fold(0u32, |acc, g| acc.saturating_add(g.count))
    }

    pub fn generator_cost(&self, id: GeneratorId) -> u64 {
        economy::cost(id.base_cost(), id.cost_growth(), self.generator_count(id))
    }

    pub fn upgrade_level(&self, id: UpgradeId) -> u32 {
        self.upgrades.get(&id).copied().unwrap_or(0)
    }

    pub fn upgrade_cost(&self, id: UpgradeId) -> u64 {
        economy::cost(id.base_cost(), id.cost_growth(), self.upgrade_level(id))
    }

    pub fn upgrade_maxed(&self, id: UpgradeId, config: &EngineConfig) -> bool {
        id.max_level(config.cooldown_reduction_max_level)
            .is_some_and(|max| self.upgrade_level(id) >= max)
    }

    pub fn click_value(&self, kind: ActionKind) -> f64 {
        self.button_types
            .get(&kind)
            .map(|b| economy::click_value(b.base, b.multiplier))
            .unwrap_or(1.0)
    }

    pub fn cooldown(&self, kind: ActionKind) -> Option<&Cooldown> {
        self.cooldowns.get(&kind)
    }

    pub fn can_perform(&self, kind: ActionKind, now: Millis) -> bool {
        self.cooldown(kind).map(|c| c.is_ready(now)).unwrap_or(true)
    }

    pub fn cooldown_progress(&self, kind: ActionKind, now: Millis) -> f64 {
        self.cooldown(kind).map(|c| c.progress(now)).unwrap_or(1.0)
    }

    /// Passive production of one tick across every generator.
    pub fn production_per_tick(&self) -> f64 {
        economy::passive_production(
            self.generators
                .iter()
                .map(|(id, g)| (id.per_tick(), g.count)),
        )
    }

    pub fn contract(&self) -> Option<&'static Contract> {
        catalog::contract(self.current_contract)
    }

    pub fn contract_goal(&self) -> f64 {
        self.contract().map(|c| c.goal).unwrap_or(0.0)
    }

    /// Whether the snitch is offered at all: once the cooldown upgrade is
    /// maxed, or as soon as one is owned.
    pub fn snitch_available(&self, config: &EngineConfig) -> bool {
        self.upgrade_maxed(UpgradeId::ReduceCooldown, config)
            || self.generator_count(GeneratorId::Snitch) > 0
    }

    pub fn generator_visible(&self, id: GeneratorId, config: &EngineConfig) -> bool {
        if id == GeneratorId::Snitch && !self.snitch_available(config) {
            return false;
        }
        self.generator_revealed(id)
    }

    pub fn upgrade_visible(&self, id: UpgradeId) -> bool {
        self.revealed_upgrades.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState {
        GameState::new(&EngineConfig::default())
    }

    #[test]
    fn defaults() {
        let s = state();
        assert_eq!(s.credits, 0.0);
        assert_eq!(s.ticks, 0);
        assert_eq!(s.generator_count(GeneratorId::Novice), 0);
        assert_eq!(s.upgrade_level(UpgradeId::DoubleClick), 0);
        assert_eq!(s.click_value(ActionKind::Action), 1.0);
        assert!(s.can_perform(ActionKind::Action, 0));
        assert!(!s.contract_active);
        assert_eq!(s.contract_goal(), 1_000.0);
    }

    #[test]
    fn every_action_kind_has_a_cooldown() {
        let s = state();
        for kind in ActionKind::all() {
            assert_eq!(s.cooldown(*kind).map(|c| c.ms), Some(1_000));
        }
    }

    #[test]
    fn raise_flag_reports_first_flip_only() {
        let mut s = state();
        assert!(!s.flag(Flag::ContractsUnlocked));
        assert!(s.raise_flag(Flag::ContractsUnlocked));
        assert!(!s.raise_flag(Flag::ContractsUnlocked));
        assert!(s.flag(Flag::ContractsUnlocked));
    }

    #[test]
    fn generator_cost_follows_count() {
        let mut s = state();
        assert_eq!(s.generator_cost(GeneratorId::Novice), 20);
        s.generators.get_mut(&GeneratorId::Novice).unwrap().count = 1;
        assert_eq!(s.generator_cost(GeneratorId::Novice), 23);
    }

    #[test]
    fn production_sums_novices_only() {
        let mut s = state();
        s.generators.get_mut(&GeneratorId::Novice).unwrap().count = 4;
        s.generators.get_mut(&GeneratorId::Snitch).unwrap().count = 2;
        assert_eq!(s.production_per_tick(), 2.0);
        assert_eq!(s.total_generators(), 6);
    }

    #[test]
    fn snitch_hidden_until_cooldown_maxed() {
        let config = EngineConfig::default();
        let mut s = state();
        s.generators.get_mut(&GeneratorId::Snitch).unwrap().revealed = true;
        assert!(!s.generator_visible(GeneratorId::Snitch, &config));
        s.upgrades.insert(UpgradeId::ReduceCooldown, 20);
        assert!(s.generator_visible(GeneratorId::Snitch, &config));
    }

    #[test]
    fn only_cooldown_upgrade_has_a_cap() {
        let config = EngineConfig::default();
        let mut s = state();
        s.upgrades.insert(UpgradeId::DoubleClick, 500);
        assert!(!s.upgrade_maxed(UpgradeId::DoubleClick, &config));
        s.upgrades.insert(UpgradeId::ReduceCooldown, 20);
        assert!(s.upgrade_maxed(UpgradeId::ReduceCooldown, &config));
    }
}
