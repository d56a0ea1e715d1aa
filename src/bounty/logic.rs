//! Game logic: atomic state operations.
//!
//! Every command validates all of its preconditions before touching the
//! state, so a rejected command leaves `GameState` exactly as it was.

use thiserror::Error;

use super::catalog::{self, ActionKind, GeneratorId, UpgradeEffect, UpgradeId};
use super::config::{BankingPolicy, EngineConfig};
use super::economy;
use super::state::{Flag, GameState};
use crate::time::Millis;

/// Why a command was a no-op. Expected during normal play, never fatal.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Rejection {
    #[error("{} is on cooldown", .0.id())]
    OnCooldown(ActionKind),

    #[error("not enough credits (need {cost})")]
    InsufficientCredits { cost: u64 },

    #[error("{} is already at max level", .0.name())]
    MaxLevel(UpgradeId),

    #[error("{} is not available yet", .0.name())]
    Unavailable(GeneratorId),

    #[error("a contract is already active")]
    ContractActive,

    #[error("no contract is available")]
    NoContract,
}

/// A contract that just paid out.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub index: usize,
    pub reward: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub value: f64,
    /// Whether the value went to the active contract rather than credits.
    pub to_contract: bool,
    pub completed: Option<Completion>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HireOutcome {
    pub cost: u64,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpgradeOutcome {
    pub cost: u64,
    pub level: u32,
}

/// Something became visible or unlocked for the first time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Unlock {
    Flag(Flag),
    Generator(GeneratorId),
    Upgrade(UpgradeId),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub production: f64,
    /// Bonus credits paid by threshold banking this tick.
    pub bank_bonus: Option<f64>,
    pub completed: Option<Completion>,
    pub unlocks: Vec<Unlock>,
}

/// Hunt (or any throttled action) at time `now`.
pub fn perform_action_at(
    state: &mut GameState,
    kind: ActionKind,
    now: Millis,
) -> Result<ActionOutcome, Rejection> {
    if !state.can_perform(kind, now) {
        return Err(Rejection::OnCooldown(kind));
    }
    if let Some(cd) = state.cooldowns.get_mut(&kind) {
        cd.start(now);
    }

    let value = state.click_value(kind);
    if state.contract_active {
        let completed = add_contract_progress(state, value);
        Ok(ActionOutcome {
            value,
            to_contract: true,
            completed,
        })
    } else {
        state.credits += value;
        Ok(ActionOutcome {
            value,
            to_contract: false,
            completed: None,
        })
    }
}

/// Hire one unit of `id`. Shares the `hire` cooldown across all generators.
pub fn hire_generator(
    state: &mut GameState,
    config: &EngineConfig,
    id: GeneratorId,
    now: Millis,
) -> Result<HireOutcome, Rejection> {
    if id == GeneratorId::Snitch && !state.snitch_available(config) {
        return Err(Rejection::Unavailable(id));
    }
    if !state.can_perform(ActionKind::Hire, now) {
        return Err(Rejection::OnCooldown(ActionKind::Hire));
    }
    let cost = state.generator_cost(id);
    if state.credits < cost as f64 {
        return Err(Rejection::InsufficientCredits { cost });
    }

    state.credits -= cost as f64;
    let generator = state.generators.entry(id).or_default();
    generator.count = generator.count.saturating_add(1);
    generator.revealed = true;
    let count = generator.count;
    if let Some(cd) = state.cooldowns.get_mut(&ActionKind::Hire) {
        cd.start(now);
    }
    Ok(HireOutcome { cost, count })
}

/// Buy the next level of `id`. Purchases are not throttled.
pub fn purchase_upgrade(
    state: &mut GameState,
    config: &EngineConfig,
    id: UpgradeId,
) -> Result<UpgradeOutcome, Rejection> {
    if state.upgrade_maxed(id, config) {
        return Err(Rejection::MaxLevel(id));
    }
    let cost = state.upgrade_cost(id);
    if state.credits < cost as f64 {
        return Err(Rejection::InsufficientCredits { cost });
    }

    state.credits -= cost as f64;
    let level = state.upgrade_level(id).saturating_add(1);
    state.upgrades.insert(id, level);
    state.revealed_upgrades.insert(id);
    apply_upgrade(state, config, id);
    Ok(UpgradeOutcome { cost, level })
}

/// Recompute the values derived from `id`'s current level.
pub fn apply_upgrade(state: &mut GameState, config: &EngineConfig, id: UpgradeId) {
    let level = state.upgrade_level(id);
    match id.effect() {
        UpgradeEffect::CooldownReduction => {
            for cd in state.cooldowns.values_mut() {
                cd.ms = economy::cooldown_duration(
                    cd.base_ms,
                    level,
                    config.cooldown_reduction_max_level,
                    config.cooldown_reduction_per_level,
                    config.cooldown_floor_ms,
                );
            }
        }
        UpgradeEffect::ClickMultiplier { kind } => {
            state.button_types.entry(kind).or_default().multiplier =
                economy::click_multiplier(level);
        }
    }
}

pub fn apply_all_upgrades(state: &mut GameState, config: &EngineConfig) {
    for &id in UpgradeId::all() {
        apply_upgrade(state, config, id);
    }
}

/// Start the current contract. Returns its catalog index.
pub fn take_contract(state: &mut GameState) -> Result<usize, Rejection> {
    if state.contract_active {
        return Err(Rejection::ContractActive);
    }
    if state.contract().is_none() {
        return Err(Rejection::NoContract);
    }
    state.contract_active = true;
    state.contract_progress = 0.0;
    state.raise_flag(Flag::ContractsHintRemoved);
    Ok(state.current_contract)
}

pub fn add_contract_progress(state: &mut GameState, amount: f64) -> Option<Completion> {
    if !state.contract_active {
        return None;
    }
    state.contract_progress += amount;
    check_contract_completion(state)
}

/// Pay out the active contract if its goal is met. The reward is credited
/// once; the contract is cleared in the same call.
pub fn check_contract_completion(state: &mut GameState) -> Option<Completion> {
    if !state.contract_active {
        return None;
    }
    let contract = state.contract()?;
    if state.contract_progress < contract.goal {
        return None;
    }

    let index = state.current_contract;
    state.credits += contract.reward;
    state.contract_active = false;
    state.contract_progress = 0.0;
    if index + 1 < catalog::CONTRACTS.len() {
        state.current_contract = index + 1;
    }
    Some(Completion {
        index,
        reward: contract.reward,
    })
}

/// One simulation step: production, banking, unlocks.
pub fn tick(state: &mut GameState, config: &EngineConfig) -> TickReport {
    state.ticks = state.ticks.saturating_add(1);
    let production = state.production_per_tick();
    let mut report = TickReport {
        production,
        ..TickReport::default()
    };

    if production > 0.0 {
        if state.contract_active {
            report.completed = add_contract_progress(state, production);
        } else {
            report.bank_bonus = bank(state, config, production);
        }
    }

    report.unlocks = evaluate_unlocks(state, config);
    report
}

fn bank(state: &mut GameState, config: &EngineConfig, production: f64) -> Option<f64> {
    match config.banking_policy {
        BankingPolicy::Immediate => {
            state.credits += production;
            None
        }
        BankingPolicy::Fractional => {
            state.unbanked += production;
            let whole = state.unbanked.floor();
            if whole >= 1.0 {
                state.credits += whole;
                state.unbanked -= whole;
            }
            None
        }
        BankingPolicy::ThresholdBonus => {
            state.credits += production;
            state.unbanked += production;
            let target = economy::bank_target(
                state.total_generators(),
                config.initial_bank_target,
                config.bank_target_multiplier,
            );
            if state.unbanked < target {
                return None;
            }
            let reward = economy::bank_reward(state.unbanked, config.bank_reward_fraction);
            state.credits += reward;
            state.unbanked = 0.0;
            Some(reward)
        }
    }
}

/// Flip every unlock whose predicate now holds. Unlocks are irreversible.
pub fn evaluate_unlocks(state: &mut GameState, config: &EngineConfig) -> Vec<Unlock> {
    let mut unlocks = Vec::new();

    let crew_threshold_met = state
        .generators
        .values()
        .any(|g| g.count >= config.contract_unlock_crew_count);
    if crew_threshold_met && state.raise_flag(Flag::ContractsUnlocked) {
        unlocks.push(Unlock::Flag(Flag::ContractsUnlocked));
    }
    if state.credits >= config.upgrades_reveal_credits && state.raise_flag(Flag::UpgradesRevealed)
    {
        unlocks.push(Unlock::Flag(Flag::UpgradesRevealed));
    }

    for &id in GeneratorId::all() {
        if state.generator_revealed(id) {
            continue;
        }
        if id == GeneratorId::Snitch && !state.snitch_available(config) {
            continue;
        }
        let affordable = state.credits >= state.generator_cost(id) as f64;
        if affordable || state.generator_count(id) > 0 {
            state.generators.entry(id).or_default().revealed = true;
            unlocks.push(Unlock::Generator(id));
        }
    }

    for &id in UpgradeId::all() {
        if state.revealed_upgrades.contains(&id) {
            continue;
        }
        let affordable = state.credits >= state.upgrade_cost(id) as f64;
        if affordable || state.upgrade_level(id) > 0 {
            state.revealed_upgrades.insert(id);
            unlocks.push(Unlock::Upgrade(id));
        }
    }

    unlocks
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug)]
    enum Op {
        Act(Millis),
        Hire(GeneratorId, Millis),
        Buy(UpgradeId),
        Take,
        Tick,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..2_000).prop_map(Op::Act),
            (
                prop_oneof![Just(GeneratorId::Novice), Just(GeneratorId::Snitch)],
                0u64..2_000
            )
                .prop_map(|(g, dt)| Op::Hire(g, dt)),
            prop_oneof![Just(UpgradeId::ReduceCooldown), Just(UpgradeId::DoubleClick)]
                .prop_map(Op::Buy),
            Just(Op::Take),
            Just(Op::Tick),
        ]
    }

    proptest! {
        #[test]
        fn prop_action_within_cooldown_changes_nothing(
            start in 0u64..1_000_000,
            offset in 0u64..1_000,
            credits in 0.0f64..1_000.0,
            contract in any::<bool>(),
        ) {
            let config = EngineConfig::default();
            let mut s = GameState::new(&config);
            s.credits = credits;
            if contract {
                take_contract(&mut s).unwrap();
            }
            perform_action_at(&mut s, ActionKind::Action, start).unwrap();
            let before = s.clone();
            let result = perform_action_at(&mut s, ActionKind::Action, start + offset);
            prop_assert!(result.is_err());
            prop_assert_eq!(s, before);
        }

        #[test]
        fn prop_commands_are_atomic_and_credits_never_negative(
            credits in 0.0f64..5_000.0,
            ops in prop::collection::vec(arb_op(), 0..60),
        ) {
            let config = EngineConfig::default();
            let mut s = GameState::new(&config);
            s.credits = credits;
            let mut now = 0;
            for op in ops {
                let before = s.clone();
                let rejected = match op {
                    Op::Act(dt) => {
                        now += dt;
                        perform_action_at(&mut s, ActionKind::Action, now).is_err()
                    }
                    Op::Hire(g, dt) => {
                        now += dt;
                        hire_generator(&mut s, &config, g, now).is_err()
                    }
                    Op::Buy(u) => purchase_upgrade(&mut s, &config, u).is_err(),
                    Op::Take => take_contract(&mut s).is_err(),
                    Op::Tick => {
                        tick(&mut s, &config);
                        false
                    }
                };
                if rejected {
                    prop_assert_eq!(&s, &before);
                }
                prop_assert!(s.credits >= 0.0);
                prop_assert!(s.unbanked >= 0.0);
                prop_assert!(s.contract_progress >= 0.0);
            }
        }

        #[test]
        fn prop_contract_pays_exactly_once(amount in 1_000.0f64..100_000.0) {
            let config = EngineConfig::default();
            let mut s = GameState::new(&config);
            take_contract(&mut s).unwrap();
            let completed = add_contract_progress(&mut s, amount);
            prop_assert_eq!(completed.map(|c| c.reward), Some(2_000.0));
            prop_assert_eq!(s.contract_progress, 0.0);
            prop_assert_eq!(check_contract_completion(&mut s), None);
            prop_assert_eq!(s.credits, 2_000.0);
        }
    }
}
