//! Semantic action IDs for Bounty Office click targets.

// ── Core actions ────────────────────────────────────────────────
pub const HUNT: u16 = 0;
pub const TAKE_CONTRACT: u16 = 1;

// ── Tab navigation ──────────────────────────────────────────────
pub const TAB_CREW: u16 = 10;
pub const TAB_UPGRADES: u16 = 11;
pub const TAB_CONTRACTS: u16 = 12;
pub const TAB_OFFICE: u16 = 13;

// ── Hire (base + generator index) ───────────────────────────────
pub const HIRE_BASE: u16 = 100;

// ── Upgrade purchase (base + upgrade index) ─────────────────────
pub const BUY_UPGRADE_BASE: u16 = 200;

// ── Office (persistence) ────────────────────────────────────────
pub const SAVE_NOW: u16 = 300;
pub const TOGGLE_AUTOSAVE: u16 = 301;
pub const EXPORT_SAVE: u16 = 302;
pub const IMPORT_SAVE: u16 = 303;
pub const RESET_PROGRESS: u16 = 304;
