//! Per-action cooldowns.
//!
//! A cooldown is just a `ready_at` timestamp plus the duration that will be
//! applied the next time the action is committed. Whether it is Ready or
//! Cooling is recomputed from the clock on every check; nothing ever has to
//! fire when a cooldown expires.

use serde::{Deserialize, Deserializer, Serialize};

use crate::time::Millis;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownPhase {
    Ready,
    Cooling { remaining_ms: Millis },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cooldown {
    /// Unmodified duration.
    #[serde(deserialize_with = "lenient_u64")]
    pub base_ms: Millis,
    /// Current duration after upgrades. Zero means no cooldown at all.
    #[serde(deserialize_with = "lenient_u64")]
    pub ms: Millis,
    #[serde(deserialize_with = "lenient_u64")]
    pub ready_at: Millis,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl Cooldown {
    pub fn new(base_ms: Millis) -> Self {
        Self {
            base_ms,
            ms: base_ms,
            ready_at: 0,
        }
    }

    pub fn phase(&self, now: Millis) -> CooldownPhase {
        match self.remaining_ms(now) {
            0 => CooldownPhase::Ready,
            remaining_ms => CooldownPhase::Cooling { remaining_ms },
        }
    }

    pub fn is_ready(&self, now: Millis) -> bool {
        self.phase(now) == CooldownPhase::Ready
    }

    /// Commit an action: Ready -> Cooling. No-op for an instant cooldown.
    pub fn start(&mut self, now: Millis) {
        if self.ms == 0 {
            return;
        }
        self.ready_at = now.saturating_add(self.ms);
    }

    pub fn remaining_ms(&self, now: Millis) -> Millis {
        if self.ms == 0 {
            return 0;
        }
        self.ready_at.saturating_sub(now)
    }

    /// Fraction of the cooldown that has elapsed, in `0.0..=1.0`.
    pub fn progress(&self, now: Millis) -> f64 {
        if self.ms == 0 {
            return 1.0;
        }
        let duration = self.ms as f64;
        let remaining = self.remaining_ms(now) as f64;
        ((duration - remaining) / duration).clamp(0.0, 1.0)
    }
}

/// Accept any JSON number for a non-negative integer field. Older saves wrote
/// `Date.now()`-style floats; negatives and garbage collapse to 0.
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Millis, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(if value.is_finite() && value > 0.0 {
        value.round() as Millis
    } else {
        0
    })
}
