//! Bounty Office: hunt bounties, hire a crew, take contracts.
//!
//! [`BountyGame`] is the thin UI shell around the [`engine::Engine`]: it maps
//! keys and taps to engine commands and holds purely presentational state
//! (selected tab, visible toasts, reset confirmation). Everything that
//! affects the game itself lives in the engine.

pub mod actions;
pub mod catalog;
pub mod config;
pub mod cooldown;
pub mod economy;
pub mod engine;
pub mod logic;
pub mod render;
pub mod save;
pub mod state;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ratzilla::ratatui::layout::Rect;
use ratzilla::ratatui::Frame;

use crate::input::{ClickState, InputEvent};
use crate::time::Millis;

use actions::*;
use catalog::{ActionKind, GeneratorId, UpgradeId};
use engine::{Engine, Notice};
use state::Flag;

/// How long a toast stays on screen.
pub const TOAST_MS: Millis = 3_000;
/// Presses of the reset key needed within [`RESET_WINDOW_MS`].
pub const RESET_PRESSES: usize = 3;
pub const RESET_WINDOW_MS: Millis = 2_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Crew,
    Upgrades,
    Contracts,
    Office,
}

/// Work only the browser host can do.
#[derive(Clone, Debug, PartialEq)]
pub enum HostRequest {
    /// Offer the exported save as a file download.
    Download { contents: String },
    /// Ask the player for save text and hand it to [`BountyGame::import`].
    PromptImport,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub notice: Notice,
    pub expires_at: Millis,
}

pub struct BountyGame {
    pub engine: Engine,
    pub tab: Tab,
    pub toasts: VecDeque<Toast>,
    /// Timestamps of recent reset presses.
    pub reset_presses: Vec<Millis>,
    request: Option<HostRequest>,
}

impl BountyGame {
    pub fn new(engine: Engine) -> Self {
        let mut game = Self {
            engine,
            tab: Tab::Crew,
            toasts: VecDeque::new(),
            reset_presses: Vec::new(),
            request: None,
        };
        // Load-time notices (migration, recovery).
        let now = game.engine.now();
        game.collect_notices(now);
        game
    }

    /// Run due timers and refresh toasts. Called once per frame.
    pub fn update(&mut self, now: Millis) {
        self.engine.advance(now);
        self.collect_notices(now);
    }

    fn collect_notices(&mut self, now: Millis) {
        self.toasts.retain(|t| t.expires_at > now);
        for notice in self.engine.drain_notices() {
            self.toasts.push_back(Toast {
                notice,
                expires_at: now.saturating_add(TOAST_MS),
            });
        }
        while self.toasts.len() > engine::MAX_NOTICES {
            self.toasts.pop_front();
        }
    }

    pub fn take_request(&mut self) -> Option<HostRequest> {
        self.request.take()
    }

    /// Save text supplied by the host after [`HostRequest::PromptImport`].
    pub fn import(&mut self, text: &str) -> bool {
        let imported = self.engine.import_save(text);
        let now = self.engine.now();
        self.collect_notices(now);
        imported
    }

    pub fn tab_visible(&self, tab: Tab) -> bool {
        let state = self.engine.state();
        match tab {
            Tab::Crew | Tab::Office => true,
            Tab::Upgrades => state.flag(Flag::UpgradesRevealed),
            Tab::Contracts => state.flag(Flag::ContractsUnlocked),
        }
    }

    pub fn visible_tabs(&self) -> Vec<Tab> {
        [Tab::Crew, Tab::Upgrades, Tab::Contracts, Tab::Office]
            .into_iter()
            .filter(|&t| self.tab_visible(t))
            .collect()
    }

    /// Generators shown on the crew tab, in display order.
    pub fn visible_generators(&self) -> Vec<GeneratorId> {
        let state = self.engine.state();
        let config = self.engine.config();
        GeneratorId::all()
            .iter()
            .copied()
            .filter(|&id| state.generator_visible(id, config))
            .collect()
    }

    pub fn visible_upgrades(&self) -> Vec<UpgradeId> {
        let state = self.engine.state();
        UpgradeId::all()
            .iter()
            .copied()
            .filter(|&id| state.upgrade_visible(id))
            .collect()
    }

    /// Presses left before a reset goes through.
    pub fn reset_presses_remaining(&self, now: Millis) -> usize {
        let recent = self
            .reset_presses
            .iter()
            .filter(|&&at| now.saturating_sub(at) < RESET_WINDOW_MS)
            .count();
        RESET_PRESSES.saturating_sub(recent)
    }

    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        let handled = match event {
            InputEvent::Key(c) => self.handle_key(*c),
            InputEvent::Click(id) => self.handle_click(*id),
        };
        let now = self.engine.now();
        self.collect_notices(now);
        handled
    }

    fn handle_click(&mut self, action_id: u16) -> bool {
        match action_id {
            HUNT => self.engine.perform_action(ActionKind::Action),
            TAKE_CONTRACT => self.take_contract(),
            TAB_CREW => self.select_tab(Tab::Crew),
            TAB_UPGRADES => self.select_tab(Tab::Upgrades),
            TAB_CONTRACTS => self.select_tab(Tab::Contracts),
            TAB_OFFICE => self.select_tab(Tab::Office),
            id if (HIRE_BASE..HIRE_BASE + GeneratorId::all().len() as u16).contains(&id) => {
                self.hire((id - HIRE_BASE) as usize)
            }
            id if (BUY_UPGRADE_BASE..BUY_UPGRADE_BASE + UpgradeId::all().len() as u16)
                .contains(&id) =>
            {
                self.buy((id - BUY_UPGRADE_BASE) as usize)
            }
            SAVE_NOW => self.engine.save(),
            TOGGLE_AUTOSAVE => {
                self.engine.toggle_autosave();
                true
            }
            EXPORT_SAVE => self.export(),
            IMPORT_SAVE => {
                self.request = Some(HostRequest::PromptImport);
                true
            }
            RESET_PROGRESS => self.press_reset(),
            _ => false,
        }
    }

    fn handle_key(&mut self, key: char) -> bool {
        match key {
            'h' | ' ' => return self.engine.perform_action(ActionKind::Action),
            'c' => return self.select_tab(Tab::Crew),
            'u' => return self.select_tab(Tab::Upgrades),
            'k' => return self.select_tab(Tab::Contracts),
            'o' => return self.select_tab(Tab::Office),
            _ => {}
        }

        match self.tab {
            Tab::Crew => match key.to_digit(10) {
                Some(d @ 1..=9) => self.hire(d as usize - 1),
                _ => false,
            },
            Tab::Upgrades => match key.to_digit(10) {
                Some(d @ 1..=9) => self.buy(d as usize - 1),
                _ => false,
            },
            Tab::Contracts => match key {
                't' => self.take_contract(),
                _ => false,
            },
            Tab::Office => match key {
                's' => self.engine.save(),
                'a' => {
                    self.engine.toggle_autosave();
                    true
                }
                'x' => self.export(),
                'i' => {
                    self.request = Some(HostRequest::PromptImport);
                    true
                }
                'r' => self.press_reset(),
                _ => false,
            },
        }
    }

    fn select_tab(&mut self, tab: Tab) -> bool {
        if !self.tab_visible(tab) {
            return false;
        }
        self.tab = tab;
        true
    }

    /// Hire by display position among the visible generators.
    fn hire(&mut self, display_idx: usize) -> bool {
        let visible = self.visible_generators();
        match visible.get(display_idx) {
            Some(&id) => self.engine.hire_generator(id),
            None => false,
        }
    }

    /// Buy by display position among the visible upgrades.
    fn buy(&mut self, display_idx: usize) -> bool {
        let visible = self.visible_upgrades();
        match visible.get(display_idx) {
            Some(&id) => self.engine.purchase_upgrade(id),
            None => false,
        }
    }

    fn take_contract(&mut self) -> bool {
        if !self.tab_visible(Tab::Contracts) {
            return false;
        }
        self.engine.take_contract()
    }

    fn export(&mut self) -> bool {
        match self.engine.export_save() {
            Some(contents) => {
                self.request = Some(HostRequest::Download { contents });
                true
            }
            None => false,
        }
    }

    /// Reset only after [`RESET_PRESSES`] presses within [`RESET_WINDOW_MS`].
    fn press_reset(&mut self) -> bool {
        let now = self.engine.now();
        self.reset_presses
            .retain(|&at| now.saturating_sub(at) < RESET_WINDOW_MS);
        self.reset_presses.push(now);
        if self.reset_presses.len() >= RESET_PRESSES {
            self.reset_presses.clear();
            self.engine.reset_all();
            self.toasts.clear();
            self.tab = Tab::Crew;
        }
        true
    }

    pub fn render(&self, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
        render::render(self, f, area, click_state);
    }
}
