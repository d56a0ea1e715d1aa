//! The Bounty Office engine: command layer, timers and persistence wiring.
//!
//! `Engine` owns the game state together with everything that touches the
//! outside world (clock, store, scheduler). Commands return `bool` like the
//! rest of the game code; a `false` is an expected no-op (cooldown, funds),
//! never an error. Timers are tasks in an injected [`Scheduler`]; the host
//! calls [`Engine::advance`] with the current time and every due task runs
//! in chronological order.

use std::collections::{BTreeMap, VecDeque};

use log::{debug, error, info, warn};

use super::catalog::{self, ActionKind, GeneratorId, UpgradeId};
use super::config::EngineConfig;
use super::economy;
use super::logic::{self, Completion, Unlock};
use super::save::{self, LoadSource};
use super::state::{Flag, GameState};
use crate::scheduler::{Scheduler, TimerHandle, TimerQueue};
use crate::store::KeyValueStore;
use crate::time::{Clock, Millis};

/// Newest notices kept; older ones are dropped.
pub const MAX_NOTICES: usize = 5;

/// Timer-driven work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    Tick,
    Autoclick(GeneratorId),
    Autosave,
    SaveSoon,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, non-blocking message for the player.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
}

pub struct Engine {
    state: GameState,
    config: EngineConfig,
    clock: Box<dyn Clock>,
    store: Box<dyn KeyValueStore>,
    scheduler: Box<dyn Scheduler<Task>>,
    tick_timer: Option<TimerHandle>,
    autosave_timer: Option<TimerHandle>,
    save_soon_timer: Option<TimerHandle>,
    autoclick_timers: BTreeMap<GeneratorId, TimerHandle>,
    autosave_enabled: bool,
    last_advance: Millis,
    notices: VecDeque<Notice>,
}

impl Engine {
    /// Load the saved game (or start fresh) and arm every timer.
    pub fn new(
        config: EngineConfig,
        clock: Box<dyn Clock>,
        mut store: Box<dyn KeyValueStore>,
        scheduler: Box<dyn Scheduler<Task>>,
    ) -> Self {
        let now = clock.now_ms();
        let loaded = save::load(store.as_mut(), &config, now);

        let mut engine = Self {
            state: loaded.state,
            config,
            clock,
            store,
            scheduler,
            tick_timer: None,
            autosave_timer: None,
            save_soon_timer: None,
            autoclick_timers: BTreeMap::new(),
            autosave_enabled: true,
            last_advance: now,
            notices: VecDeque::new(),
        };

        match loaded.source {
            LoadSource::Migrated { .. } => {
                engine.notify("Save data migrated to new format", NoticeLevel::Success)
            }
            LoadSource::Recovered { .. } => {
                engine.notify("Failed to load save data", NoticeLevel::Error)
            }
            LoadSource::Fresh | LoadSource::Current => {}
        }
        logic::evaluate_unlocks(&mut engine.state, &engine.config);
        engine.start_timers(now);
        engine
    }

    /// [`Engine::new`] with the in-memory timer queue.
    pub fn with_timer_queue(
        config: EngineConfig,
        clock: Box<dyn Clock>,
        store: Box<dyn KeyValueStore>,
    ) -> Self {
        Self::new(config, clock, store, Box::new(TimerQueue::new()))
    }

    fn start_timers(&mut self, now: Millis) {
        let tick = self.config.tick_ms;
        self.tick_timer = Some(
            self.scheduler
                .schedule_repeating(now.saturating_add(tick), tick, Task::Tick),
        );
        if self.autosave_enabled {
            self.arm_autosave(now);
        }
        for &id in GeneratorId::all() {
            self.rebuild_autoclick(id, now);
        }
    }

    fn stop_timers(&mut self) {
        self.scheduler.cancel_all();
        self.tick_timer = None;
        self.autosave_timer = None;
        self.save_soon_timer = None;
        self.autoclick_timers.clear();
    }

    fn arm_autosave(&mut self, now: Millis) {
        if let Some(handle) = self.autosave_timer.take() {
            self.scheduler.cancel(handle);
        }
        let period = self.config.autosave_interval_ms;
        self.autosave_timer = Some(self.scheduler.schedule_repeating(
            now.saturating_add(period),
            period,
            Task::Autosave,
        ));
    }

    /// Tear down and recreate the autoclick timer of `id`; its period
    /// depends on the owned count.
    fn rebuild_autoclick(&mut self, id: GeneratorId, now: Millis) {
        if let Some(handle) = self.autoclick_timers.remove(&id) {
            self.scheduler.cancel(handle);
        }
        let Some(period) = self.autoclick_interval_ms(id) else {
            return;
        };
        let handle = self.scheduler.schedule_repeating(
            now.saturating_add(period),
            period,
            Task::Autoclick(id),
        );
        self.autoclick_timers.insert(id, handle);
    }

    fn rebuild_all_autoclicks(&mut self, now: Millis) {
        for &id in GeneratorId::all() {
            self.rebuild_autoclick(id, now);
        }
    }

    // ── Commands ───────────────────────────────────────────────

    pub fn perform_action(&mut self, kind: ActionKind) -> bool {
        let now = self.clock.now_ms();
        match logic::perform_action_at(&mut self.state, kind, now) {
            Ok(outcome) => {
                if let Some(done) = outcome.completed {
                    self.announce_completion(&done);
                }
                self.after_change(now);
                true
            }
            Err(e) => {
                debug!("action rejected: {e}");
                false
            }
        }
    }

    pub fn hire_generator(&mut self, id: GeneratorId) -> bool {
        let now = self.clock.now_ms();
        match logic::hire_generator(&mut self.state, &self.config, id, now) {
            Ok(outcome) => {
                let detail = if id.per_tick() > 0.0 {
                    format!("+{} credits/tick", id.per_tick())
                } else {
                    "Autoclick enabled".to_string()
                };
                self.notify(format!("Hired {}! {detail}", id.name()), NoticeLevel::Info);
                info!("hired {} (now {})", id.id(), outcome.count);
                if id.autoclick().is_some() {
                    self.rebuild_autoclick(id, now);
                }
                self.after_change(now);
                true
            }
            Err(e) => {
                debug!("hire rejected: {e}");
                false
            }
        }
    }

    pub fn purchase_upgrade(&mut self, id: UpgradeId) -> bool {
        let now = self.clock.now_ms();
        match logic::purchase_upgrade(&mut self.state, &self.config, id) {
            Ok(outcome) => {
                self.notify(format!("Purchased: {}", id.name()), NoticeLevel::Info);
                info!("upgraded {} to level {}", id.id(), outcome.level);
                self.after_change(now);
                true
            }
            Err(e) => {
                debug!("purchase rejected: {e}");
                false
            }
        }
    }

    pub fn take_contract(&mut self) -> bool {
        let now = self.clock.now_ms();
        match logic::take_contract(&mut self.state) {
            Ok(index) => {
                if let Some(contract) = catalog::contract(index) {
                    self.notify(
                        format!("Contract taken: {}", contract.title),
                        NoticeLevel::Info,
                    );
                }
                self.after_change(now);
                true
            }
            Err(e) => {
                debug!("take contract rejected: {e}");
                false
            }
        }
    }

    /// Manual save.
    pub fn save(&mut self) -> bool {
        let now = self.clock.now_ms();
        let saved = self.save_now(now);
        if saved {
            self.notify("Game saved manually!", NoticeLevel::Success);
        }
        saved
    }

    /// Wipe all progress and every stored save, then start a new session.
    pub fn reset_all(&mut self) {
        let now = self.clock.now_ms();
        self.stop_timers();
        if let Err(e) = save::clear(self.store.as_mut()) {
            error!("failed to clear saved data: {e}");
        }
        self.state = GameState::new(&self.config);
        self.notices.clear();
        self.start_timers(now);
        info!("progress reset");
        self.notify("Progress reset", NoticeLevel::Warning);
    }

    /// Pretty-printed snapshot for download.
    pub fn export_save(&mut self) -> Option<String> {
        match save::export(&self.state) {
            Ok(text) => {
                self.notify("Save exported!", NoticeLevel::Success);
                Some(text)
            }
            Err(e) => {
                error!("export failed: {e}");
                self.notify("Export failed", NoticeLevel::Error);
                None
            }
        }
    }

    /// Replace the game with an imported save of any supported version.
    /// On failure the current game is untouched.
    pub fn import_save(&mut self, text: &str) -> bool {
        let now = self.clock.now_ms();
        match save::decode(text, &self.config, now) {
            Ok((state, from)) => {
                info!("imported v{from} save");
                self.state = state;
                logic::evaluate_unlocks(&mut self.state, &self.config);
                self.rebuild_all_autoclicks(now);
                self.save_now(now);
                self.notify("Save imported successfully!", NoticeLevel::Success);
                true
            }
            Err(e) => {
                warn!("import failed: {e}");
                self.notify("Invalid save file format", NoticeLevel::Error);
                false
            }
        }
    }

    pub fn set_autosave(&mut self, enabled: bool) {
        if enabled == self.autosave_enabled {
            return;
        }
        self.autosave_enabled = enabled;
        if enabled {
            let now = self.clock.now_ms();
            self.arm_autosave(now);
        } else if let Some(handle) = self.autosave_timer.take() {
            self.scheduler.cancel(handle);
        }
        let text = if enabled { "Autosave on" } else { "Autosave off" };
        self.notify(text, NoticeLevel::Info);
    }

    pub fn toggle_autosave(&mut self) {
        self.set_autosave(!self.autosave_enabled);
    }

    pub fn on_visibility_hidden(&mut self) {
        let now = self.clock.now_ms();
        self.save_now(now);
    }

    pub fn on_unload(&mut self) {
        let now = self.clock.now_ms();
        self.save_now(now);
    }

    /// Run every task due at or before `now`, each at its own due time.
    /// Returns how many ran.
    pub fn advance(&mut self, now: Millis) -> usize {
        if now <= self.last_advance {
            return 0;
        }
        let horizon = now.saturating_sub(self.config.max_catch_up_ms);
        if horizon > self.last_advance {
            debug!(
                "skipping {}ms of catch-up",
                horizon - self.last_advance
            );
            self.scheduler.skip_until(horizon);
        }
        self.last_advance = now;

        let mut ran = 0;
        while let Some((due, task)) = self.scheduler.pop_due(now) {
            self.run_task(task, due);
            ran += 1;
        }
        ran
    }

    /// [`Engine::advance`] to the clock's current time.
    pub fn update(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.advance(now)
    }

    fn run_task(&mut self, task: Task, at: Millis) {
        match task {
            Task::Tick => {
                let report = logic::tick(&mut self.state, &self.config);
                if let Some(done) = &report.completed {
                    self.announce_completion(done);
                }
                if let Some(bonus) = report.bank_bonus {
                    if bonus > 0.0 {
                        self.notify(
                            format!("Banked! +{} bonus credits", format_number(bonus)),
                            NoticeLevel::Success,
                        );
                    }
                }
                self.announce_unlocks(&report.unlocks);
            }
            Task::Autoclick(id) => {
                let Some(auto) = id.autoclick() else {
                    return;
                };
                // Same cooldown gate as a manual click, checked at the firing time.
                if let Ok(outcome) = logic::perform_action_at(&mut self.state, auto.target, at) {
                    if let Some(done) = outcome.completed {
                        self.announce_completion(&done);
                    }
                    let unlocks = logic::evaluate_unlocks(&mut self.state, &self.config);
                    self.announce_unlocks(&unlocks);
                }
            }
            Task::Autosave => {
                if self.autosave_enabled && self.save_now(at) {
                    self.notify("Game autosaved", NoticeLevel::Success);
                }
            }
            Task::SaveSoon => {
                self.save_soon_timer = None;
                self.save_now(at);
            }
        }
    }

    fn after_change(&mut self, now: Millis) {
        let unlocks = logic::evaluate_unlocks(&mut self.state, &self.config);
        self.announce_unlocks(&unlocks);
        self.save_soon(now);
    }

    /// Debounced save: restarts the delay on every call so a burst of
    /// commands produces one write.
    fn save_soon(&mut self, now: Millis) {
        if let Some(handle) = self.save_soon_timer.take() {
            self.scheduler.cancel(handle);
        }
        let due = now.saturating_add(self.config.save_soon_delay_ms);
        self.save_soon_timer = Some(self.scheduler.schedule_once(due, Task::SaveSoon));
    }

    fn save_now(&mut self, now: Millis) -> bool {
        let previous = self.state.last_saved_at;
        self.state.last_saved_at = now;
        match save::write(self.store.as_mut(), &self.state) {
            Ok(()) => {
                debug!("saved at {now}");
                true
            }
            Err(e) => {
                self.state.last_saved_at = previous;
                error!("failed to save game: {e}");
                self.notify("Failed to save game", NoticeLevel::Error);
                false
            }
        }
    }

    fn announce_completion(&mut self, done: &Completion) {
        info!("contract {} completed", done.index);
        self.notify(
            format!("Contract completed! +{} credits", format_number(done.reward)),
            NoticeLevel::Success,
        );
    }

    fn announce_unlocks(&mut self, unlocks: &[Unlock]) {
        for unlock in unlocks {
            let (text, level) = match unlock {
                Unlock::Flag(Flag::ContractsUnlocked) => {
                    ("Contracts unlocked!".to_string(), NoticeLevel::Success)
                }
                Unlock::Flag(Flag::UpgradesRevealed) => {
                    ("Upgrades available!".to_string(), NoticeLevel::Info)
                }
                Unlock::Flag(Flag::ContractsHintRemoved) => continue,
                Unlock::Generator(id) => {
                    (format!("New recruit: {}", id.name()), NoticeLevel::Info)
                }
                Unlock::Upgrade(id) => {
                    (format!("New upgrade: {}", id.name()), NoticeLevel::Info)
                }
            };
            debug!("unlocked {unlock:?}");
            self.notify(text, level);
        }
    }

    fn notify(&mut self, text: impl Into<String>, level: NoticeLevel) {
        self.notices.push_back(Notice {
            text: text.into(),
            level,
        });
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
    }

    // ── Read accessors ─────────────────────────────────────────

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    pub fn autosave_enabled(&self) -> bool {
        self.autosave_enabled
    }

    /// Pending notices, oldest first, without consuming them.
    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn cooldown_progress(&self, kind: ActionKind) -> f64 {
        self.state.cooldown_progress(kind, self.clock.now_ms())
    }

    pub fn can_perform(&self, kind: ActionKind) -> bool {
        self.state.can_perform(kind, self.clock.now_ms())
    }

    /// Real-time autoclick period of `id`, if it autoclicks and is owned.
    pub fn autoclick_interval_ms(&self, id: GeneratorId) -> Option<Millis> {
        let auto = id.autoclick()?;
        economy::autoclick_interval_ms(
            self.state.generator_count(id),
            auto.base_interval_ticks,
            self.config.tick_ms,
            self.config.min_autoclick_ms,
        )
    }

    #[cfg(test)]
    pub fn has_autoclick_timer(&self, id: GeneratorId) -> bool {
        self.autoclick_timers
            .get(&id)
            .is_some_and(|h| self.scheduler.is_scheduled(*h))
    }

    /// Whole seconds since the last successful save, `None` if never saved.
    pub fn seconds_since_save(&self, now: Millis) -> Option<u64> {
        match self.state.last_saved_at {
            0 => None,
            at => Some(now.saturating_sub(at) / 1_000),
        }
    }
}

/// Compact number display: `999`, `1.5K`, `2.3M`, `4.0B`.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "∞".to_string();
    }
    if n < 0.0 {
        return format!("-{}", format_number(-n));
    }
    // Units are picked on the rounded value, so 999.96 reads 1.0K, not 1000.0.
    let tenths = |x: f64| (x * 10.0).round() / 10.0;
    let plain = tenths(n);
    if plain < 1e3 {
        return if plain.fract() == 0.0 {
            format!("{}", plain as u64)
        } else {
            format!("{plain:.1}")
        };
    }
    const UNITS: [(f64, &str); 4] = [(1e3, "K"), (1e6, "M"), (1e9, "B"), (1e12, "T")];
    let mut shown = String::new();
    for (scale, suffix) in UNITS {
        let scaled = tenths(n / scale);
        shown = format!("{scaled:.1}{suffix}");
        if scaled < 1e3 {
            break;
        }
    }
    shown
}

/// Short duration display: `350ms`, `1.5s`, `2m 05s`.
pub fn format_duration(ms: Millis) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else {
        let secs = ms / 1_000;
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounty::config::BankingPolicy;
    use crate::bounty::save::{LEGACY_V1_KEY, SAVE_KEY};
    use crate::store::MemoryStore;
    use crate::time::ManualClock;

    const START: Millis = 1_000_000;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn engine_with(config: EngineConfig) -> (Engine, ManualClock, MemoryStore) {
        init_logger();
        let clock = ManualClock::new(START);
        let store = MemoryStore::new();
        let engine =
            Engine::with_timer_queue(config, Box::new(clock.clone()), Box::new(store.clone()));
        (engine, clock, store)
    }

    fn engine() -> (Engine, ManualClock, MemoryStore) {
        engine_with(EngineConfig::default())
    }

    /// Move the clock and run due timers.
    fn step(engine: &mut Engine, clock: &ManualClock, ms: Millis) -> usize {
        clock.advance(ms);
        engine.update()
    }

    #[test]
    fn manual_action_respects_cooldown() {
        let (mut e, clock, _) = engine();
        assert!(e.perform_action(ActionKind::Action));
        assert!(!e.perform_action(ActionKind::Action));
        assert_eq!(e.state().credits, 1.0);
        clock.advance(999);
        assert!(!e.perform_action(ActionKind::Action));
        clock.advance(1);
        assert!(e.perform_action(ActionKind::Action));
        assert_eq!(e.state().credits, 2.0);
    }

    #[test]
    fn ticks_fire_once_per_period() {
        let (mut e, clock, _) = engine();
        step(&mut e, &clock, 3_500);
        assert_eq!(e.state().ticks, 3);
        step(&mut e, &clock, 500);
        assert_eq!(e.state().ticks, 4);
    }

    #[test]
    fn hire_then_tick_accumulates_unbanked() {
        let (mut e, clock, _) = engine();
        e.state.credits = 25.0;
        assert!(e.hire_generator(GeneratorId::Novice));
        assert_eq!(e.state().credits, 5.0);
        step(&mut e, &clock, 1_000);
        assert_eq!(e.state().unbanked, 0.5);
        assert_eq!(e.state().credits, 5.0);
        step(&mut e, &clock, 1_000);
        assert_eq!(e.state().credits, 6.0);
    }

    #[test]
    fn hire_without_funds_is_noop() {
        let (mut e, _, _) = engine();
        let before = e.state().clone();
        assert!(!e.hire_generator(GeneratorId::Novice));
        assert_eq!(e.state(), &before);
        assert_eq!(e.notices().count(), 0);
    }

    #[test]
    fn snitch_autoclick_timer_tracks_count() {
        let (mut e, clock, _) = engine();
        e.state.upgrades.insert(UpgradeId::ReduceCooldown, 20);
        logic::apply_all_upgrades(&mut e.state, &e.config);
        e.state.credits = 1_000_000.0;
        assert!(!e.has_autoclick_timer(GeneratorId::Snitch));

        assert!(e.hire_generator(GeneratorId::Snitch));
        assert!(e.has_autoclick_timer(GeneratorId::Snitch));
        assert_eq!(e.autoclick_interval_ms(GeneratorId::Snitch), Some(1_000));

        // hire cooldown is 0 at max reduction
        assert!(e.hire_generator(GeneratorId::Snitch));
        assert!(e.hire_generator(GeneratorId::Snitch));
        assert_eq!(e.autoclick_interval_ms(GeneratorId::Snitch), Some(250));
        assert!(!e.has_autoclick_timer(GeneratorId::Novice));

        let credits = e.state().credits;
        step(&mut e, &clock, 1_000);
        // four autoclicks at 250ms each, instant cooldown
        assert_eq!(e.state().credits, credits + 4.0);
    }

    #[test]
    fn autoclick_cannot_bypass_cooldown() {
        let (mut e, clock, _) = engine();
        e.state.generators.get_mut(&GeneratorId::Snitch).unwrap().count = 3;
        e.rebuild_autoclick(GeneratorId::Snitch, START);
        assert_eq!(e.autoclick_interval_ms(GeneratorId::Snitch), Some(250));

        // 1000ms cooldown: over 2s only clicks at +250 and +1250 succeed
        step(&mut e, &clock, 2_000);
        assert_eq!(e.state().credits, 2.0);
    }

    #[test]
    fn manual_click_and_autoclick_share_cooldown() {
        let (mut e, clock, _) = engine();
        e.state.generators.get_mut(&GeneratorId::Snitch).unwrap().count = 1;
        e.rebuild_autoclick(GeneratorId::Snitch, START);
        assert!(e.perform_action(ActionKind::Action));
        // autoclick at +1000 is exactly when the manual cooldown ends
        step(&mut e, &clock, 999);
        assert_eq!(e.state().credits, 1.0);
        step(&mut e, &clock, 1);
        assert_eq!(e.state().credits, 2.0);
        assert!(!e.perform_action(ActionKind::Action));
    }

    #[test]
    fn contract_scenario() {
        let (mut e, _, _) = engine();
        e.state.button_types.get_mut(&ActionKind::Action).unwrap().base = 1_000.0;
        assert!(e.take_contract());
        assert_eq!(e.state().contract_progress, 0.0);
        assert!(!e.take_contract());

        assert!(e.perform_action(ActionKind::Action));
        assert_eq!(e.state().credits, 2_000.0);
        assert_eq!(e.state().contract_progress, 0.0);
        assert!(!e.state().contract_active);
        let texts: Vec<String> = e.drain_notices().into_iter().map(|n| n.text).collect();
        assert!(texts.iter().any(|t| t.starts_with("Contract completed!")));
    }

    #[test]
    fn passive_production_feeds_active_contract() {
        let (mut e, clock, _) = engine();
        e.state.generators.get_mut(&GeneratorId::Novice).unwrap().count = 4;
        assert!(e.take_contract());
        step(&mut e, &clock, 2_000);
        assert_eq!(e.state().contract_progress, 4.0);
        assert_eq!(e.state().credits, 0.0);
    }

    #[test]
    fn commands_trigger_debounced_save() {
        let (mut e, clock, store) = engine();
        assert!(e.perform_action(ActionKind::Action));
        assert!(!store.contains(SAVE_KEY));
        step(&mut e, &clock, 500);
        e.state.credits += 20.0;
        assert!(e.hire_generator(GeneratorId::Novice));
        // first deadline moved out by the second command
        step(&mut e, &clock, 600);
        assert!(!store.contains(SAVE_KEY));
        step(&mut e, &clock, 400);
        assert!(store.contains(SAVE_KEY));
        assert_eq!(e.state().last_saved_at, START + 1_500);
    }

    #[test]
    fn autosave_runs_on_interval_and_can_be_toggled() {
        let (mut e, clock, store) = engine();
        step(&mut e, &clock, 30_000);
        assert!(store.contains(SAVE_KEY));
        assert_eq!(e.seconds_since_save(e.now()), Some(0));

        e.set_autosave(false);
        assert!(!e.autosave_enabled());
        step(&mut e, &clock, 60_000);
        assert_eq!(e.seconds_since_save(e.now()), Some(60));

        e.set_autosave(true);
        step(&mut e, &clock, 30_000);
        assert_eq!(e.seconds_since_save(e.now()), Some(0));
    }

    #[test]
    fn seconds_since_save_none_before_first_save() {
        let (e, _, _) = engine();
        assert_eq!(e.seconds_since_save(START), None);
    }

    #[test]
    fn save_failure_is_reported_not_fatal() {
        let (mut e, _, store) = engine();
        store.set_fail_writes(true);
        assert!(!e.save());
        assert_eq!(e.state().last_saved_at, 0);
        let notice = e.drain_notices().pop().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        // still playable
        assert!(e.perform_action(ActionKind::Action));
    }

    #[test]
    fn visibility_and_unload_save() {
        let (mut e, clock, store) = engine();
        e.on_visibility_hidden();
        assert!(store.contains(SAVE_KEY));
        clock.advance(5_000);
        e.on_unload();
        assert_eq!(e.state().last_saved_at, START + 5_000);
    }

    #[test]
    fn session_resumes_from_store() {
        let (mut e, clock, store) = engine();
        e.state.credits = 100.0;
        assert!(e.purchase_upgrade(UpgradeId::DoubleClick));
        assert!(e.save());

        let resumed = Engine::with_timer_queue(
            EngineConfig::default(),
            Box::new(clock.clone()),
            Box::new(store.clone()),
        );
        assert_eq!(resumed.state(), e.state());
        assert_eq!(resumed.state().click_value(ActionKind::Action), 2.0);
    }

    #[test]
    fn legacy_save_migrates_on_startup() {
        init_logger();
        let store = MemoryStore::new();
        store.insert_raw(LEGACY_V1_KEY, r#"{"state": {"credits": 42}}"#);
        let e = Engine::with_timer_queue(
            EngineConfig::default(),
            Box::new(ManualClock::new(START)),
            Box::new(store.clone()),
        );
        assert_eq!(e.state().credits, 42.0);
        assert!(store.contains(SAVE_KEY));
        assert!(!store.contains(LEGACY_V1_KEY));
        assert_eq!(
            e.notices().next().map(|n| n.level),
            Some(NoticeLevel::Success)
        );
    }

    #[test]
    fn reset_clears_state_store_and_timers() {
        let (mut e, clock, store) = engine();
        e.state.credits = 5_000.0;
        e.state.upgrades.insert(UpgradeId::ReduceCooldown, 20);
        logic::apply_all_upgrades(&mut e.state, &e.config);
        assert!(e.hire_generator(GeneratorId::Snitch));
        assert!(e.save());
        store.insert_raw(LEGACY_V1_KEY, "{}");

        e.reset_all();
        assert_eq!(e.state(), &GameState::new(&EngineConfig::default()));
        assert!(!store.contains(SAVE_KEY));
        assert!(!store.contains(LEGACY_V1_KEY));
        assert!(!e.has_autoclick_timer(GeneratorId::Snitch));

        // the simulation keeps running for the new session
        step(&mut e, &clock, 1_000);
        assert_eq!(e.state().ticks, 1);
        assert_eq!(e.state().credits, 0.0);
    }

    #[test]
    fn export_then_import_restores_game() {
        let (mut e, _, store) = engine();
        e.state.credits = 500.0;
        assert!(e.hire_generator(GeneratorId::Novice));
        let text = e.export_save().unwrap();
        let exported_state = e.state().clone();

        e.reset_all();
        assert!(e.import_save(&text));
        assert_eq!(e.state().credits, exported_state.credits);
        assert_eq!(e.state().generator_count(GeneratorId::Novice), 1);
        assert!(store.contains(SAVE_KEY));
    }

    #[test]
    fn bad_import_leaves_game_untouched() {
        let (mut e, _, _) = engine();
        e.state.credits = 77.0;
        let before = e.state().clone();
        assert!(!e.import_save("definitely not json"));
        assert!(!e.import_save(r#"{"version": "7.0"}"#));
        assert_eq!(e.state(), &before);
    }

    #[test]
    fn import_rebuilds_autoclick_timers() {
        let (mut e, _, _) = engine();
        let text = r#"{"version":"3.0","generators":{"snitch":{"count":2,"revealed":true}}}"#;
        assert!(e.import_save(text));
        assert!(e.has_autoclick_timer(GeneratorId::Snitch));
        assert_eq!(e.autoclick_interval_ms(GeneratorId::Snitch), Some(500));
    }

    #[test]
    fn long_gap_is_capped() {
        let mut config = EngineConfig::default();
        config.max_catch_up_ms = 10_000;
        config.autosave_interval_ms = 1_000_000;
        let (mut e, clock, _) = engine_with(config);
        // only the ticks of the last 10s are replayed
        step(&mut e, &clock, 3_600_500);
        assert_eq!(e.state().ticks, 10);
    }

    #[test]
    fn clock_going_backwards_runs_nothing() {
        let (mut e, clock, _) = engine();
        step(&mut e, &clock, 2_000);
        clock.set(START);
        assert_eq!(e.update(), 0);
        assert_eq!(e.state().ticks, 2);
    }

    #[test]
    fn threshold_policy_announces_bonus() {
        let mut config = EngineConfig::default();
        config.banking_policy = BankingPolicy::ThresholdBonus;
        config.bank_reward_fraction = 1.0;
        let (mut e, clock, _) = engine_with(config);
        e.state.generators.get_mut(&GeneratorId::Novice).unwrap().count = 2;
        // target 1.5^2 = 2.25, production 1/tick
        step(&mut e, &clock, 3_000);
        assert_eq!(e.state().unbanked, 0.0);
        assert_eq!(e.state().credits, 3.0 + 3.0);
        assert!(e.notices().any(|n| n.text.starts_with("Banked!")));
    }

    #[test]
    fn unlock_notices_fire_once() {
        let (mut e, clock, _) = engine();
        e.state.generators.get_mut(&GeneratorId::Novice).unwrap().count = 10;
        step(&mut e, &clock, 1_000);
        let count = |e: &Engine| {
            e.notices()
                .filter(|n| n.text == "Contracts unlocked!")
                .count()
        };
        assert_eq!(count(&e), 1);
        e.drain_notices();
        step(&mut e, &clock, 5_000);
        assert_eq!(count(&e), 0);
    }

    #[test]
    fn notices_are_capped() {
        let (mut e, _, _) = engine();
        for i in 0..12 {
            e.notify(format!("n{i}"), NoticeLevel::Info);
        }
        let texts: Vec<&str> = e.notices().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["n7", "n8", "n9", "n10", "n11"]);
    }

    #[test]
    fn format_number_suffixes() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(1_500.0), "1.5K");
        assert_eq!(format_number(2_300_000.0), "2.3M");
        assert_eq!(format_number(4e9), "4.0B");
        assert_eq!(format_number(-1_500.0), "-1.5K");
    }

    #[test]
    fn format_number_rounds_before_picking_a_unit() {
        assert_eq!(format_number(999.94), "999.9");
        assert_eq!(format_number(999.96), "1.0K");
        assert_eq!(format_number(12.96), "13");
        assert_eq!(format_number(999_940.0), "999.9K");
        assert_eq!(format_number(999_960.0), "1.0M");
        assert_eq!(format_number(5e15), "5000.0T");
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(950), "950ms");
        assert_eq!(format_duration(1_500), "1.5s");
        assert_eq!(format_duration(125_000), "2m 05s");
    }
}
