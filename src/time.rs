//! Wall-clock access for the engine.
//!
//! Cooldowns are stored as epoch-millisecond `ready_at` timestamps, so the
//! engine only ever needs "what time is it now". Production code reads the
//! browser clock; tests substitute a [`ManualClock`] and move time by hand,
//! which keeps every timer-driven behaviour deterministic.

use std::cell::Cell;
use std::rc::Rc;

/// Epoch milliseconds (or a duration in milliseconds).
pub type Millis = u64;

/// Source of the current wall-clock time.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Real clock: `Date.now()` in the browser, `SystemTime` elsewhere.
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> Millis {
        js_sys::Date::now().max(0.0) as Millis
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> Millis {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as Millis)
            .unwrap_or(0)
    }
}

/// Virtual clock whose time only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give the other to the engine.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: Millis) {
        self.now.set(ms);
    }

    pub fn advance(&self, delta_ms: Millis) {
        self.now.set(self.now.get().saturating_add(delta_ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}
