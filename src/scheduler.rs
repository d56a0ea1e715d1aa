//! Timer scheduling decoupled from the platform's `setInterval`.
//!
//! The engine never owns a real timer. It registers tasks with a
//! [`Scheduler`] and, whenever the host gives it a chance (every animation
//! frame in the browser, or explicitly in tests), drains every task that has
//! come due in chronological order. Because draining is driven by a time
//! argument, the same code runs against the real clock and a virtual one.

use std::collections::BTreeMap;

use crate::time::Millis;

/// Opaque handle to a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

/// Registration and draining of time-triggered tasks.
///
/// Cancelling is unconditional and idempotent: cancelling a handle that has
/// already fired (one-shot) or was cancelled before is a no-op.
pub trait Scheduler<T> {
    /// Fire `task` at `first_due` and then every `period` milliseconds.
    fn schedule_repeating(&mut self, first_due: Millis, period: Millis, task: T) -> TimerHandle;

    /// Fire `task` once at `due`.
    fn schedule_once(&mut self, due: Millis, task: T) -> TimerHandle;

    fn cancel(&mut self, handle: TimerHandle);

    fn cancel_all(&mut self);

    fn is_scheduled(&self, handle: TimerHandle) -> bool;

    /// Remove and return the earliest task due at or before `now`, together
    /// with the time it was due. Repeating timers are re-armed one period
    /// later. Ties fire in registration order.
    fn pop_due(&mut self, now: Millis) -> Option<(Millis, T)>;

    /// Drop every firing scheduled before `horizon` without running it.
    /// Repeating timers keep their phase; overdue one-shots move to `horizon`.
    fn skip_until(&mut self, horizon: Millis);
}

#[derive(Clone, Debug)]
struct Timer<T> {
    due: Millis,
    period: Option<Millis>,
    task: T,
}

/// In-memory [`Scheduler`] used both in the browser and in tests.
#[derive(Debug)]
pub struct TimerQueue<T> {
    timers: BTreeMap<TimerHandle, Timer<T>>,
    next_id: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn insert(&mut self, timer: Timer<T>) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.timers.insert(handle, timer);
        handle
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Scheduler<T> for TimerQueue<T> {
    fn schedule_repeating(&mut self, first_due: Millis, period: Millis, task: T) -> TimerHandle {
        // A zero period would make `pop_due` spin forever at one instant.
        self.insert(Timer {
            due: first_due,
            period: Some(period.max(1)),
            task,
        })
    }

    fn schedule_once(&mut self, due: Millis, task: T) -> TimerHandle {
        self.insert(Timer {
            due,
            period: None,
            task,
        })
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.remove(&handle);
    }

    fn cancel_all(&mut self) {
        self.timers.clear();
    }

    fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    fn pop_due(&mut self, now: Millis) -> Option<(Millis, T)> {
        let (&handle, _) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(h, t)| (t.due, **h))?;

        let timer = self.timers.get_mut(&handle)?;
        let fired_at = timer.due;
        match timer.period {
            Some(period) => {
                timer.due = fired_at.saturating_add(period);
                Some((fired_at, timer.task.clone()))
            }
            None => self
                .timers
                .remove(&handle)
                .map(|t| (fired_at, t.task)),
        }
    }

    fn skip_until(&mut self, horizon: Millis) {
        for timer in self.timers.values_mut() {
            if timer.due >= horizon {
                continue;
            }
            match timer.period {
                Some(period) => {
                    let behind = horizon - timer.due;
                    let periods = behind.div_ceil(period);
                    timer.due = timer.due.saturating_add(periods.saturating_mul(period));
                }
                None => timer.due = horizon,
            }
        }
    }
}
