//! Tunable constants of the Bounty Office engine.
//!
//! Every field has a default matching the shipped balance. A partial JSON
//! object can override any subset of them:
//!
//! ```json
//! { "tickMs": 500, "bankingPolicy": "thresholdBonus" }
//! ```

use serde::{Deserialize, Serialize};

use crate::time::Millis;

/// How passive production turns into spendable credits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BankingPolicy {
    /// Production is added to credits as-is, fractions included.
    Immediate,
    /// Production accumulates in `unbanked`; whole credits move over each tick.
    Fractional,
    /// Production is credited immediately and mirrored into `unbanked`.
    /// Crossing the bank target pays a bonus and empties `unbanked`.
    ThresholdBonus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Real-time length of one simulation tick.
    pub tick_ms: Millis,
    /// Unmodified cooldown of every action kind.
    pub base_cooldown_ms: Millis,
    /// Shortest cooldown below the max reduction level.
    pub cooldown_floor_ms: Millis,
    pub cooldown_reduction_per_level: f64,
    /// Reduction level at which cooldowns collapse to zero.
    pub cooldown_reduction_max_level: u32,
    /// Fastest allowed autoclick period.
    pub min_autoclick_ms: Millis,
    pub autosave_interval_ms: Millis,
    /// Debounce window of the "save soon" path.
    pub save_soon_delay_ms: Millis,
    /// Longest wall-clock gap replayed by `Engine::advance`.
    pub max_catch_up_ms: Millis,
    /// Any generator count at or above this unlocks contracts.
    pub contract_unlock_crew_count: u32,
    /// Credits at or above this reveal the upgrades panel.
    pub upgrades_reveal_credits: f64,
    pub banking_policy: BankingPolicy,
    pub initial_bank_target: f64,
    pub bank_target_multiplier: f64,
    pub bank_reward_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            base_cooldown_ms: 1_000,
            cooldown_floor_ms: 100,
            cooldown_reduction_per_level: 0.05,
            cooldown_reduction_max_level: 20,
            min_autoclick_ms: 50,
            autosave_interval_ms: 30_000,
            save_soon_delay_ms: 1_000,
            max_catch_up_ms: 10 * 60 * 1_000,
            contract_unlock_crew_count: 10,
            upgrades_reveal_credits: 10.0,
            banking_policy: BankingPolicy::Fractional,
            initial_bank_target: 1.0,
            bank_target_multiplier: 1.5,
            bank_reward_fraction: 0.1,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON override on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Clamp values that would break the engine's arithmetic.
    fn sanitized(mut self) -> Self {
        self.tick_ms = self.tick_ms.max(1);
        self.min_autoclick_ms = self.min_autoclick_ms.max(1);
        self.autosave_interval_ms = self.autosave_interval_ms.max(1_000);
        if !(self.cooldown_reduction_per_level.is_finite() && self.cooldown_reduction_per_level >= 0.0) {
            self.cooldown_reduction_per_level = 0.0;
        }
        if !(self.bank_target_multiplier.is_finite() && self.bank_target_multiplier >= 1.0) {
            self.bank_target_multiplier = 1.0;
        }
        self
    }
}
