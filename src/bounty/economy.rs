//! Economy formulas. Pure functions of counts and levels; callers validate
//! their inputs (non-negative counts, growth factors above one).

use crate::time::Millis;

/// Exponents beyond this saturate: 2^1023 is the largest finite power of two.
const MAX_EXPONENT: u32 = 1_023;

/// Price of the next unit: `floor(base * growth^owned)`.
///
/// Saturates at `u64::MAX` once the price leaves the representable range.
pub fn cost(base_cost: f64, growth: f64, owned: u32) -> u64 {
    let raw = (base_cost * growth.powi(owned.min(MAX_EXPONENT) as i32)).floor();
    if raw.is_nan() || raw <= 0.0 {
        0
    } else {
        // float -> int casts saturate, so infinity lands on u64::MAX
        raw as u64
    }
}

/// Credits earned by one click of an action kind.
pub fn click_value(base: f64, multiplier: f64) -> f64 {
    base * multiplier
}

/// Click multiplier granted by the doubling upgrade: `2^level`.
pub fn click_multiplier(level: u32) -> f64 {
    2f64.powi(level.min(MAX_EXPONENT) as i32)
}

/// Cooldown length after `level` reduction upgrades.
///
/// At `max_level` the cooldown disappears entirely; below it the result never
/// drops under `floor_ms`.
pub fn cooldown_duration(
    base_ms: Millis,
    level: u32,
    max_level: u32,
    per_level_pct: f64,
    floor_ms: Millis,
) -> Millis {
    if level >= max_level {
        return 0;
    }
    let factor = (1.0 - per_level_pct * level as f64).max(0.0);
    let reduced = (base_ms as f64 * factor).round() as Millis;
    reduced.max(floor_ms)
}

/// Autoclick period in ticks: halves with every unit beyond the first.
/// `None` while no unit is owned.
pub fn autoclick_interval_ticks(owned: u32, base_interval_ticks: f64) -> Option<f64> {
    if owned == 0 {
        return None;
    }
    let halvings = (owned - 1).min(MAX_EXPONENT) as i32;
    Some(base_interval_ticks / 2f64.powi(halvings))
}

/// Autoclick period in real milliseconds, never faster than `min_ms`.
pub fn autoclick_interval_ms(
    owned: u32,
    base_interval_ticks: f64,
    tick_ms: Millis,
    min_ms: Millis,
) -> Option<Millis> {
    let ticks = autoclick_interval_ticks(owned, base_interval_ticks)?;
    let ms = (ticks * tick_ms as f64).round() as Millis;
    Some(ms.max(min_ms))
}

/// Production that must accumulate before the threshold bonus pays out.
pub fn bank_target(total_generators: u32, initial: f64, multiplier: f64) -> f64 {
    initial * multiplier.powi(total_generators.min(MAX_EXPONENT) as i32)
}

/// Bonus credits paid when banking `unbanked`.
pub fn bank_reward(unbanked: f64, reward_fraction: f64) -> f64 {
    (unbanked * reward_fraction).floor().max(0.0)
}

/// Total passive production per tick from `(per_tick, count)` pairs.
pub fn passive_production<I>(generators: I) -> f64
where
    I: IntoIterator<Item = (f64, u32)>,
{
    generators
        .into_iter()
        .filter(|(per_tick, _)| *per_tick > 0.0)
        .map(|(per_tick, count)| per_tick * count as f64)
        .sum()
}
