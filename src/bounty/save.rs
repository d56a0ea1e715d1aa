//! Bounty Office セーブ/ロード機能。
//!
//! ## バージョニング方針
//!
//! - `SAVE_VERSION`: 現在のスナップショット形式。`SAVE_KEY` に書き込む。
//! - `MIN_COMPATIBLE_VERSION`: [`migrate`] で変換できる最古の形式。
//!
//! 旧形式のデータは 1 段ずつ変換する (`migrate_v1_to_v2`, `migrate_v2_to_v3`)。
//! どれも JSON 値に対する純粋関数。不足フィールドはデフォルト値で補完し、
//! 未知の id は捨てる。クールダウン時間やクリック倍率などの派生値は
//! 保存値を信用せず、常にレベルから再計算する。

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::catalog::{self, ActionKind, GeneratorId, UpgradeId};
use super::config::EngineConfig;
use super::cooldown::{lenient_u64, Cooldown};
use super::logic;
use super::state::{ButtonType, Flag, GameState, GeneratorState};
use crate::error::{SaveError, SaveResult};
use crate::store::KeyValueStore;
use crate::time::Millis;

pub const SAVE_VERSION: u32 = 3;
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

pub const SAVE_KEY: &str = "bountySaveV3";
pub const LEGACY_V2_KEY: &str = "bountySaveV2";
pub const LEGACY_V1_KEY: &str = "bountySaveV1";
/// 初期ビルドが書いていたフラットな v1 形式。
pub const LEGACY_FLAT_KEY: &str = "bountyOfficeState";

/// 旧キー。この順に探す。
const LEGACY_KEYS: &[&str] = &[LEGACY_V2_KEY, LEGACY_V1_KEY, LEGACY_FLAT_KEY];

fn version_tag(version: u32) -> String {
    format!("{version}.0")
}

/// 現在の保存形式。マップは id 文字列をキーにするので、
/// このビルドが知らないエントリはロード全体を失敗させずに読み飛ばされる。
#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(default, rename_all = "camelCase")]
struct Snapshot {
    version: String,
    credits: f64,
    #[serde(deserialize_with = "lenient_u64")]
    ticks: u64,
    unbanked: f64,
    button_types: BTreeMap<String, ButtonType>,
    cooldowns: BTreeMap<String, Cooldown>,
    upgrades: BTreeMap<String, u32>,
    revealed_upgrades: Vec<String>,
    generators: BTreeMap<String, GeneratorState>,
    flags: BTreeMap<String, bool>,
    contract_active: bool,
    contract_progress: f64,
    #[serde(deserialize_with = "lenient_u64")]
    current_contract: u64,
    #[serde(deserialize_with = "lenient_u64")]
    last_saved_at: Millis,
}

fn extract_snapshot(state: &GameState) -> Snapshot {
    Snapshot {
        version: version_tag(SAVE_VERSION),
        credits: state.credits,
        ticks: state.ticks,
        unbanked: state.unbanked,
        button_types: state
            .button_types
            .iter()
            .map(|(k, b)| (k.id().to_string(), b.clone()))
            .collect(),
        cooldowns: state
            .cooldowns
            .iter()
            .map(|(k, c)| (k.id().to_string(), c.clone()))
            .collect(),
        upgrades: state
            .upgrades
            .iter()
            .map(|(u, lvl)| (u.id().to_string(), *lvl))
            .collect(),
        revealed_upgrades: state
            .revealed_upgrades
            .iter()
            .map(|u| u.id().to_string())
            .collect(),
        generators: state
            .generators
            .iter()
            .map(|(g, s)| (g.id().to_string(), s.clone()))
            .collect(),
        flags: state.flags.clone(),
        contract_active: state.contract_active,
        contract_progress: state.contract_progress,
        current_contract: state.current_contract as u64,
        last_saved_at: state.last_saved_at,
    }
}

/// デフォルト状態の上にスナップショットを重ねる。
fn apply_snapshot(snapshot: Snapshot, config: &EngineConfig) -> GameState {
    let mut state = GameState::new(config);
    state.credits = snapshot.credits;
    state.ticks = snapshot.ticks;
    state.unbanked = snapshot.unbanked;

    for (id, button) in snapshot.button_types {
        if let Some(kind) = ActionKind::from_id(&id) {
            state.button_types.insert(kind, button);
        }
    }
    for (id, cooldown) in snapshot.cooldowns {
        if let Some(kind) = ActionKind::from_id(&id) {
            state.cooldowns.insert(kind, cooldown);
        }
    }
    for (id, level) in snapshot.upgrades {
        if let Some(upgrade) = UpgradeId::from_id(&id) {
            state.upgrades.insert(upgrade, level);
        }
    }
    state.revealed_upgrades = snapshot
        .revealed_upgrades
        .iter()
        .filter_map(|id| UpgradeId::from_id(id))
        .collect();
    for (id, generator) in snapshot.generators {
        if let Some(gen) = GeneratorId::from_id(&id) {
            state.generators.insert(gen, generator);
        }
    }
    state.flags.extend(snapshot.flags);
    state.contract_active = snapshot.contract_active;
    state.contract_progress = snapshot.contract_progress;
    state.current_contract = usize::try_from(snapshot.current_contract).unwrap_or(usize::MAX);
    state.last_saved_at = snapshot.last_saved_at;
    state
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// ロード・インポート後に状態の整合性を回復する。
///
/// 派生値はレベルから再計算し、負の値は 0 に、契約インデックスはカタログの範囲に丸める。
/// 進捗がすでに目標に達している進行中の契約は報酬なしで破棄する。
pub fn normalize(state: &mut GameState, config: &EngineConfig, now: Millis) {
    state.credits = non_negative(state.credits);
    state.unbanked = non_negative(state.unbanked);
    state.contract_progress = non_negative(state.contract_progress);
    state.current_contract = state
        .current_contract
        .min(catalog::CONTRACTS.len().saturating_sub(1));

    let cap = config.cooldown_reduction_max_level;
    if let Some(level) = state.upgrades.get_mut(&UpgradeId::ReduceCooldown) {
        *level = (*level).min(cap);
    }

    for &kind in ActionKind::all() {
        let button = state.button_types.entry(kind).or_default();
        if !(button.base.is_finite() && button.base > 0.0) {
            button.base = ButtonType::default().base;
        }
        if !(button.multiplier.is_finite() && button.multiplier > 0.0) {
            button.multiplier = ButtonType::default().multiplier;
        }
        let cooldown = state
            .cooldowns
            .entry(kind)
            .or_insert_with(|| Cooldown::new(config.base_cooldown_ms));
        cooldown.base_ms = config.base_cooldown_ms;
    }
    logic::apply_all_upgrades(state, config);

    // クールダウン 1 回分より先の時刻は、保存後に時計が戻ったということ。
    // プレイヤーを締め出さない。
    for cooldown in state.cooldowns.values_mut() {
        cooldown.ready_at = cooldown.ready_at.min(now.saturating_add(cooldown.ms));
    }

    for generator in state.generators.values_mut() {
        if generator.count > 0 {
            generator.revealed = true;
        }
    }
    for (&id, &level) in &state.upgrades {
        if level > 0 {
            state.revealed_upgrades.insert(id);
        }
    }

    if state.contract_active && state.contract_progress >= state.contract_goal() {
        state.contract_active = false;
        state.contract_progress = 0.0;
    }
}

// ── マイグレーションチェーン ─────────────────────────────────────

fn as_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn as_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

/// ドキュメントのメジャーバージョン。`version` タグがあればそれを、
/// 無ければ形から推定する。
pub fn detect_version(doc: &Value) -> SaveResult<u32> {
    let Some(obj) = doc.as_object() else {
        return Err(SaveError::Corrupt("save is not a JSON object".into()));
    };
    let tagged = match obj.get("version") {
        Some(Value::String(tag)) => Some(
            tag.split('.')
                .next()
                .and_then(|major| major.trim().parse::<u32>().ok())
                .ok_or_else(|| SaveError::UnsupportedVersion(tag.clone()))?,
        ),
        Some(Value::Number(n)) => n.as_f64().map(|v| v.floor().max(0.0) as u32),
        _ => None,
    };
    let version = match tagged {
        Some(v) => v,
        None if obj.contains_key("gameState") => 2,
        None => 1,
    };
    if !(MIN_COMPATIBLE_VERSION..=SAVE_VERSION).contains(&version) {
        return Err(SaveError::UnsupportedVersion(version.to_string()));
    }
    Ok(version)
}

/// v1 (`{state, crewTypes}` またはフラットな state オブジェクト) -> v2。
pub fn migrate_v1_to_v2(doc: &Value) -> Value {
    let empty = Map::new();
    let state = match as_object(doc.get("state")) {
        Some(state) => state,
        None => doc.as_object().unwrap_or(&empty),
    };

    let mut game = Map::new();
    for field in ["credits", "unbanked", "contractProgress"] {
        if let Some(n) = as_number(state.get(field)) {
            game.insert(field.into(), json!(n.max(0.0)));
        }
    }
    for field in ["ticks", "currentContract"] {
        if let Some(n) = as_number(state.get(field)) {
            game.insert(field.into(), json!(n.max(0.0).floor() as u64));
        }
    }
    if let Some(active) = state.get("contractActive").and_then(Value::as_bool) {
        game.insert("contractActive".into(), json!(active));
    }

    let mut flags: Map<String, Value> = as_object(state.get("flags"))
        .map(|f| {
            f.iter()
                .filter(|(_, v)| v.is_boolean())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    let mut upgrades: BTreeMap<String, f64> = BTreeMap::new();
    match state.get("upgrades") {
        Some(Value::Object(map)) => {
            for (id, value) in map {
                match (id.as_str(), value) {
                    ("reduceCooldownPurchased", Value::Bool(true)) => {
                        upgrades.entry("reduceCooldown".into()).or_insert(1.0);
                        flags.insert(Flag::UpgradesRevealed.name().into(), json!(true));
                    }
                    ("reduceCooldownCount", Value::Number(n)) => {
                        if let Some(n) = n.as_f64() {
                            upgrades.insert("reduceCooldown".into(), n);
                            flags.insert(Flag::UpgradesRevealed.name().into(), json!(true));
                        }
                    }
                    (_, Value::Number(n)) => {
                        if let Some(n) = n.as_f64() {
                            upgrades.entry(id.clone()).or_insert(n);
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(Value::Array(pairs)) => {
            for pair in pairs {
                if let (Some(id), Some(n)) = (
                    pair.get(0).and_then(Value::as_str),
                    as_number(pair.get(1)),
                ) {
                    upgrades.insert(id.into(), n);
                }
            }
        }
        _ => {}
    }
    // 倍々アップグレードになる前は倍率そのものを保存していた。
    if let Some(mult) = as_number(state.get("clickMultiplier")) {
        if mult >= 1.0 {
            upgrades
                .entry(UpgradeId::DoubleClick.id().into())
                .or_insert(mult.log2().round());
        }
    }
    let upgrade_pairs: Vec<Value> = upgrades
        .into_iter()
        .map(|(id, n)| json!([id, n.max(0.0).floor()]))
        .collect();
    game.insert("upgrades".into(), Value::Array(upgrade_pairs));

    let revealed: Vec<Value> = match state.get("revealedUpgrades") {
        Some(Value::Array(ids)) => ids.iter().filter(|v| v.is_string()).cloned().collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| json!(k))
            .collect(),
        _ => Vec::new(),
    };
    game.insert("revealedUpgrades".into(), Value::Array(revealed));

    let mut buttons = as_object(state.get("buttonTypes")).cloned().unwrap_or_default();
    if let Some(mult) = as_number(state.get("clickMultiplier")) {
        let action = buttons
            .entry(ActionKind::Action.id())
            .or_insert_with(|| json!({}));
        if let Some(action) = action.as_object_mut() {
            action.insert("multiplier".into(), json!(mult));
        }
    }
    game.insert("buttonTypes".into(), Value::Object(buttons));

    let mut cooldowns = as_object(state.get("cooldowns")).cloned().unwrap_or_default();
    if let Some(ready_at) = as_number(state.get("huntReadyAt")) {
        let action = cooldowns
            .entry(ActionKind::Action.id())
            .or_insert_with(|| json!({}));
        if let Some(action) = action.as_object_mut() {
            action.insert("readyAt".into(), json!(ready_at));
        }
    }
    game.insert("cooldowns".into(), Value::Object(cooldowns));
    game.insert("flags".into(), Value::Object(flags));

    // クルー: 順序付きの `crewTypes` 配列、または個数/オブジェクトの `crew` マップ。
    let crew: Vec<Value> = if let Some(list) = doc.get("crewTypes").and_then(Value::as_array) {
        list.iter()
            .enumerate()
            .filter_map(|(i, c)| crew_entry(c.get("id").and_then(Value::as_str), i, c))
            .collect()
    } else if let Some(map) = as_object(state.get("crew")) {
        map.iter()
            .filter_map(|(id, c)| {
                let entry = match c {
                    Value::Number(_) => json!({ "count": c }),
                    other => other.clone(),
                };
                crew_entry(Some(id), usize::MAX, &entry)
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut out = json!({
        "version": version_tag(2),
        "gameState": Value::Object(game),
        "crewTypes": crew,
    });
    if let Some(ts) = as_number(state.get("lastSavedAt")) {
        out["timestamp"] = json!(ts);
    }
    out
}

fn crew_entry(id: Option<&str>, index: usize, entry: &Value) -> Option<Value> {
    let id = match id {
        Some(id) => id.to_string(),
        None => GeneratorId::all().get(index)?.id().to_string(),
    };
    let count = as_number(entry.get("count")).unwrap_or(0.0).max(0.0).floor();
    let revealed = entry.get("revealed").and_then(Value::as_bool).unwrap_or(false);
    Some(json!({ "id": id, "count": count, "revealed": revealed }))
}

/// オブジェクトのエントリだけを残し、その中でも数値フィールドだけを残す。
fn numeric_records(value: Option<Value>) -> Value {
    let records: Map<String, Value> = match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(id, record)| {
                let fields: Map<String, Value> = record
                    .as_object()?
                    .iter()
                    .filter(|(_, v)| v.is_number())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some((id, Value::Object(fields)))
            })
            .collect(),
        _ => Map::new(),
    };
    Value::Object(records)
}

/// v2 (`{gameState, crewTypes, timestamp}`) -> v3 (フラット、generators は id キー)。
pub fn migrate_v2_to_v3(doc: &Value) -> Value {
    let mut out: Map<String, Value> = as_object(doc.get("gameState")).cloned().unwrap_or_default();

    for field in ["credits", "ticks", "unbanked", "contractProgress", "currentContract", "lastSavedAt"] {
        if out.get(field).is_some_and(|v| !v.is_number()) {
            out.remove(field);
        }
    }
    if out.get("contractActive").is_some_and(|v| !v.is_boolean()) {
        out.remove("contractActive");
    }
    let flags: Map<String, Value> = match out.remove("flags") {
        Some(Value::Object(map)) => map.into_iter().filter(|(_, v)| v.is_boolean()).collect(),
        _ => Map::new(),
    };
    out.insert("flags".into(), Value::Object(flags));
    let revealed: Vec<Value> = match out.remove("revealedUpgrades") {
        Some(Value::Array(ids)) => ids.into_iter().filter(Value::is_string).collect(),
        _ => Vec::new(),
    };
    out.insert("revealedUpgrades".into(), Value::Array(revealed));
    let buttons = numeric_records(out.remove("buttonTypes"));
    out.insert("buttonTypes".into(), buttons);
    let cooldowns = numeric_records(out.remove("cooldowns"));
    out.insert("cooldowns".into(), cooldowns);

    let upgrades: Map<String, Value> = match out.remove("upgrades") {
        Some(Value::Array(pairs)) => pairs
            .iter()
            .filter_map(|pair| {
                let id = pair.get(0)?.as_str()?;
                let level = as_number(pair.get(1))?;
                Some((id.to_string(), json!(level.max(0.0).floor() as u64)))
            })
            .collect(),
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(id, v)| {
                let level = v.as_f64()?;
                Some((id, json!(level.max(0.0).floor() as u64)))
            })
            .collect(),
        _ => Map::new(),
    };
    out.insert("upgrades".into(), Value::Object(upgrades));

    let generators: Map<String, Value> = doc
        .get("crewTypes")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .enumerate()
                .filter_map(|(i, c)| {
                    let entry = crew_entry(c.get("id").and_then(Value::as_str), i, c)?;
                    let id = entry.get("id")?.as_str()?.to_string();
                    Some((
                        id,
                        json!({
                            "count": entry.get("count").and_then(Value::as_f64).unwrap_or(0.0) as u64,
                            "revealed": entry.get("revealed").cloned().unwrap_or(json!(false)),
                        }),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();
    out.insert("generators".into(), Value::Object(generators));
    out.remove("crewTypes");

    if !out.contains_key("lastSavedAt") {
        if let Some(ts) = as_number(doc.get("timestamp")) {
            out.insert("lastSavedAt".into(), json!(ts));
        }
    }
    out.insert("version".into(), json!(version_tag(3)));
    Value::Object(out)
}

/// サポート対象のドキュメントを現在の形式に変換する。
/// 現在の形式のドキュメントはそのまま返す。
pub fn migrate(doc: Value) -> SaveResult<(Value, u32)> {
    let from = detect_version(&doc)?;
    let mut doc = doc;
    if from < 2 {
        doc = migrate_v1_to_v2(&doc);
    }
    if from < 3 {
        doc = migrate_v2_to_v3(&doc);
    }
    Ok((doc, from))
}

/// セーブデータをパースし、変換し、整合性を回復する。
/// 状態と、ドキュメントが書かれた時のバージョンを返す。
pub fn decode(
    text: &str,
    config: &EngineConfig,
    now: Millis,
) -> SaveResult<(GameState, u32)> {
    let doc: Value = serde_json::from_str(text)?;
    let (doc, from) = migrate(doc)?;
    let snapshot: Snapshot = serde_json::from_value(doc)?;
    let mut state = apply_snapshot(snapshot, config);
    normalize(&mut state, config, now);
    Ok((state, from))
}

pub fn encode(state: &GameState) -> SaveResult<String> {
    Ok(serde_json::to_string(&extract_snapshot(state))?)
}

/// 現在の状態を人が読める形でエクスポートする。
pub fn export(state: &GameState) -> SaveResult<String> {
    Ok(serde_json::to_string_pretty(&extract_snapshot(state))?)
}

/// 現在のキーに状態を書き込む。
pub fn write(store: &mut dyn KeyValueStore, state: &GameState) -> SaveResult<()> {
    let text = encode(state)?;
    store.set(SAVE_KEY, &text)?;
    Ok(())
}

/// 現在のキーとすべての旧キーを削除する。
/// 全キーの削除を試み、最初の失敗を返す。
pub fn clear(store: &mut dyn KeyValueStore) -> SaveResult<()> {
    let mut first_err = None;
    for key in std::iter::once(SAVE_KEY).chain(LEGACY_KEYS.iter().copied()) {
        if let Err(e) = store.remove(key) {
            warn!("failed to remove {key}: {e}");
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// ロードした状態の出どころ。
#[derive(Clone, Debug, PartialEq)]
pub enum LoadSource {
    /// 保存データなし。デフォルト値。
    Fresh,
    Current,
    /// 旧キーから変換し、現在のキーに書き戻した。
    Migrated { key: &'static str, from: u32 },
    /// 保存データが使えなかった。デフォルト値。
    Recovered { reason: String },
}

#[derive(Debug)]
pub struct Loaded {
    pub state: GameState,
    pub source: LoadSource,
}

/// ゲームをロードする。失敗はしない。
/// 使えないデータはログを残してデフォルト値に置き換える。
pub fn load(store: &mut dyn KeyValueStore, config: &EngineConfig, now: Millis) -> Loaded {
    let fresh = || GameState::new(config);

    match store.get(SAVE_KEY) {
        Ok(Some(text)) => {
            return match decode(&text, config, now) {
                Ok((state, _)) => {
                    info!("loaded save ({} ticks)", state.ticks);
                    Loaded {
                        state,
                        source: LoadSource::Current,
                    }
                }
                Err(e) => {
                    warn!("save data unusable, starting fresh: {e}");
                    if let Err(e) = store.remove(SAVE_KEY) {
                        warn!("failed to discard corrupt save: {e}");
                    }
                    Loaded {
                        state: fresh(),
                        source: LoadSource::Recovered {
                            reason: e.to_string(),
                        },
                    }
                }
            };
        }
        Ok(None) => {}
        Err(e) => {
            warn!("storage unreadable, continuing without a save: {e}");
            return Loaded {
                state: fresh(),
                source: LoadSource::Recovered {
                    reason: e.to_string(),
                },
            };
        }
    }

    for &key in LEGACY_KEYS {
        let text = match store.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => continue,
            Err(e) => {
                warn!("failed to read legacy key {key}: {e}");
                continue;
            }
        };
        match decode(&text, config, now) {
            Ok((state, from)) => {
                info!("migrated v{from} save from {key}");
                match write(store, &state) {
                    Ok(()) => {
                        for &legacy in LEGACY_KEYS {
                            if let Err(e) = store.remove(legacy) {
                                warn!("failed to remove legacy key {legacy}: {e}");
                            }
                        }
                    }
                    // 次回に再挑戦できるよう旧データは残す。
                    Err(e) => warn!("failed to write migrated save: {e}"),
                }
                return Loaded {
                    state,
                    source: LoadSource::Migrated { key, from },
                };
            }
            Err(e) => warn!("skipping malformed legacy save in {key}: {e}"),
        }
    }

    Loaded {
        state: fresh(),
        source: LoadSource::Fresh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn played_state() -> GameState {
        let config = config();
        let mut s = GameState::new(&config);
        s.credits = 10_000.0;
        logic::hire_generator(&mut s, &config, GeneratorId::Novice, 0).unwrap();
        logic::purchase_upgrade(&mut s, &config, UpgradeId::ReduceCooldown).unwrap();
        logic::purchase_upgrade(&mut s, &config, UpgradeId::DoubleClick).unwrap();
        logic::perform_action_at(&mut s, ActionKind::Action, 5_000).unwrap();
        logic::take_contract(&mut s).unwrap();
        s.contract_progress = 123.5;
        s.unbanked = 0.5;
        s.ticks = 77;
        s.raise_flag(Flag::UpgradesRevealed);
        s.flags.insert("futureFlag".into(), true);
        s.last_saved_at = 4_000;
        s
    }

    #[test]
    fn roundtrip_preserves_state() {
        let s = played_state();
        let mut store = MemoryStore::new();
        write(&mut store, &s).unwrap();
        let loaded = load(&mut store, &config(), 5_000);
        assert_eq!(loaded.source, LoadSource::Current);
        assert_eq!(loaded.state, s);
    }

    #[test]
    fn snapshot_uses_camel_case_ids() {
        let text = encode(&played_state()).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["version"], "3.0");
        assert_eq!(doc["generators"]["novice"]["count"], 1);
        assert_eq!(doc["upgrades"]["reduceCooldown"], 1);
        assert!(doc["cooldowns"]["action"]["readyAt"].is_u64());
        assert!(doc["revealedUpgrades"].is_array());
    }

    #[test]
    fn export_is_pretty_and_importable() {
        let s = played_state();
        let text = export(&s).unwrap();
        assert!(text.contains('\n'));
        let (imported, from) = decode(&text, &config(), 5_000).unwrap();
        assert_eq!(from, SAVE_VERSION);
        assert_eq!(imported, s);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let (s, _) = decode(r#"{"version": "3.0", "credits": 50}"#, &config(), 0).unwrap();
        assert_eq!(s.credits, 50.0);
        assert_eq!(s.generator_count(GeneratorId::Novice), 0);
        assert_eq!(s.cooldown(ActionKind::Hire).map(|c| c.ms), Some(1_000));
    }

    #[test]
    fn unknown_ids_are_dropped() {
        let text = r#"{"version":"3.0","generators":{"dragon":{"count":3},"novice":{"count":2}},
                       "upgrades":{"laser":4},"revealedUpgrades":["laser","doubleClick"]}"#;
        let (s, _) = decode(text, &config(), 0).unwrap();
        assert_eq!(s.generator_count(GeneratorId::Novice), 2);
        assert_eq!(s.generators.len(), GeneratorId::all().len());
        assert_eq!(s.upgrades.len(), UpgradeId::all().len());
        assert!(s.revealed_upgrades.contains(&UpgradeId::DoubleClick));
    }

    #[test]
    fn normalize_recomputes_derived_values() {
        let text = r#"{"version":"3.0","upgrades":{"reduceCooldown":3,"doubleClick":2},
                       "cooldowns":{"action":{"baseMs":1,"ms":1,"readyAt":0}},
                       "buttonTypes":{"action":{"base":1,"multiplier":999}}}"#;
        let (s, _) = decode(text, &config(), 0).unwrap();
        assert_eq!(s.cooldown(ActionKind::Action).unwrap().ms, 850);
        assert_eq!(s.cooldown(ActionKind::Action).unwrap().base_ms, 1_000);
        assert_eq!(s.click_value(ActionKind::Action), 4.0);
    }

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let text = r#"{"version":"3.0","credits":-5,"unbanked":-1,"contractProgress":-3,
                       "currentContract":99,"upgrades":{"reduceCooldown":50}}"#;
        let (s, _) = decode(text, &config(), 0).unwrap();
        assert_eq!(s.credits, 0.0);
        assert_eq!(s.unbanked, 0.0);
        assert_eq!(s.contract_progress, 0.0);
        assert_eq!(s.current_contract, catalog::CONTRACTS.len() - 1);
        assert_eq!(s.upgrade_level(UpgradeId::ReduceCooldown), 20);
        assert_eq!(s.cooldown(ActionKind::Action).unwrap().ms, 0);
    }

    #[test]
    fn normalize_clears_already_met_contract_without_reward() {
        let text = r#"{"version":"3.0","credits":10,"contractActive":true,
                       "contractProgress":1500,"currentContract":0}"#;
        let (s, _) = decode(text, &config(), 0).unwrap();
        assert!(!s.contract_active);
        assert_eq!(s.contract_progress, 0.0);
        assert_eq!(s.credits, 10.0);
    }

    #[test]
    fn normalize_pulls_back_future_ready_at() {
        let text = r#"{"version":"3.0","cooldowns":{"action":{"readyAt":99999999}}}"#;
        let (s, _) = decode(text, &config(), 1_000).unwrap();
        assert_eq!(s.cooldown(ActionKind::Action).unwrap().ready_at, 2_000);
    }

    const V2_SAVE: &str = r#"{
        "version": "2.0",
        "timestamp": 1700000000000,
        "gameState": {
            "credits": 321.5, "ticks": 40, "unbanked": 0.5,
            "revealedUpgrades": ["reduceCooldown"],
            "buttonTypes": {"action": {"base": 1, "multiplier": 2}},
            "cooldowns": {
                "action": {"baseMs": 1000, "ms": 950, "readyAt": 1700000000500},
                "hire": {"baseMs": 1000, "ms": 950, "readyAt": 0}
            },
            "upgrades": [["reduceCooldown", 1], ["doubleClick", 1]],
            "flags": {"contractsUnlocked": true, "contractsHintRemoved": false},
            "contractActive": true, "contractProgress": 10, "currentContract": 1
        },
        "crewTypes": [
            {"id": "novice", "name": "Novice Hunter", "baseCost": 20, "count": 12, "revealed": true},
            {"id": "snitch", "name": "Snitch", "count": 0, "revealed": false}
        ]
    }"#;

    #[test]
    fn migrates_v2_document() {
        let (s, from) = decode(V2_SAVE, &config(), 1_700_000_000_000).unwrap();
        assert_eq!(from, 2);
        assert_eq!(s.credits, 321.5);
        assert_eq!(s.ticks, 40);
        assert_eq!(s.generator_count(GeneratorId::Novice), 12);
        assert!(s.generator_revealed(GeneratorId::Novice));
        assert_eq!(s.upgrade_level(UpgradeId::DoubleClick), 1);
        assert_eq!(s.click_value(ActionKind::Action), 2.0);
        assert_eq!(s.cooldown(ActionKind::Action).unwrap().ready_at, 1_700_000_000_500);
        assert!(s.flag(Flag::ContractsUnlocked));
        assert!(s.contract_active);
        assert_eq!(s.current_contract, 1);
        assert_eq!(s.last_saved_at, 1_700_000_000_000);
    }

    const V1_SAVE: &str = r#"{
        "state": {
            "credits": 75, "ticks": 12,
            "clickMultiplier": 4,
            "huntReadyAt": 5000,
            "upgrades": {"reduceCooldownCount": 3},
            "revealedUpgrades": {"doubleClick": true, "reduceCooldown": false},
            "flags": {"contractsUnlocked": false, "bogus": 7}
        },
        "crewTypes": [{"count": 3, "revealed": true}, {"count": 0}]
    }"#;

    #[test]
    fn migrates_v1_document() {
        let (s, from) = decode(V1_SAVE, &config(), 0).unwrap();
        assert_eq!(from, 1);
        assert_eq!(s.credits, 75.0);
        assert_eq!(s.generator_count(GeneratorId::Novice), 3);
        assert_eq!(s.upgrade_level(UpgradeId::ReduceCooldown), 3);
        assert!(s.flag(Flag::UpgradesRevealed));
        assert!(!s.flags.contains_key("bogus"));
        // 保存済みの x4 倍率は倍々レベル 2 になる
        assert_eq!(s.upgrade_level(UpgradeId::DoubleClick), 2);
        assert_eq!(s.click_value(ActionKind::Action), 4.0);
        assert!(s.revealed_upgrades.contains(&UpgradeId::DoubleClick));
        // レベルがあるので reduceCooldown は公開済み
        assert!(s.revealed_upgrades.contains(&UpgradeId::ReduceCooldown));
    }

    #[test]
    fn v1_hunt_timestamp_maps_to_action_cooldown() {
        let doc: Value = serde_json::from_str(V1_SAVE).unwrap();
        let v2 = migrate_v1_to_v2(&doc);
        assert_eq!(v2["gameState"]["cooldowns"]["action"]["readyAt"], 5000.0);
        assert_eq!(v2["gameState"]["buttonTypes"]["action"]["multiplier"], 4.0);
    }

    #[test]
    fn migrates_flat_v1_with_purchased_flag() {
        let text = r#"{"credits": 5, "upgrades": {"reduceCooldownPurchased": true},
                       "crew": {"novice": 2, "snitch": {"count": 1, "revealed": true}}}"#;
        let (s, from) = decode(text, &config(), 0).unwrap();
        assert_eq!(from, 1);
        assert_eq!(s.upgrade_level(UpgradeId::ReduceCooldown), 1);
        assert_eq!(s.generator_count(GeneratorId::Novice), 2);
        assert_eq!(s.generator_count(GeneratorId::Snitch), 1);
        assert!(s.flag(Flag::UpgradesRevealed));
    }

    #[test]
    fn migration_is_idempotent() {
        for text in [V1_SAVE, V2_SAVE] {
            let doc: Value = serde_json::from_str(text).unwrap();
            let (once, _) = migrate(doc).unwrap();
            let (twice, from) = migrate(once.clone()).unwrap();
            assert_eq!(from, SAVE_VERSION);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn malformed_legacy_fields_are_skipped() {
        let text = r#"{"state": {"credits": "lots", "ticks": 3, "upgrades": {"doubleClick": "x"}},
                       "crewTypes": "nope"}"#;
        let (s, _) = decode(text, &config(), 0).unwrap();
        assert_eq!(s.credits, 0.0);
        assert_eq!(s.ticks, 3);
        assert_eq!(s.upgrade_level(UpgradeId::DoubleClick), 0);
    }

    #[test]
    fn newer_version_is_rejected() {
        let err = decode(r#"{"version": "9.1"}"#, &config(), 0).unwrap_err();
        assert!(matches!(err, SaveError::UnsupportedVersion(_)));
    }

    #[test]
    fn non_object_is_corrupt() {
        assert!(matches!(
            decode("[1,2,3]", &config(), 0),
            Err(SaveError::Corrupt(_))
        ));
        assert!(matches!(
            decode("{not json", &config(), 0),
            Err(SaveError::Serialization(_))
        ));
    }

    #[test]
    fn load_without_data_is_fresh() {
        let mut store = MemoryStore::new();
        let loaded = load(&mut store, &config(), 0);
        assert_eq!(loaded.source, LoadSource::Fresh);
        assert_eq!(loaded.state, GameState::new(&config()));
    }

    #[test]
    fn load_legacy_writes_forward_and_removes_old_keys() {
        let mut store = MemoryStore::new();
        store.insert_raw(LEGACY_V2_KEY, V2_SAVE);
        store.insert_raw(LEGACY_V1_KEY, V1_SAVE);
        let loaded = load(&mut store, &config(), 0);
        assert_eq!(
            loaded.source,
            LoadSource::Migrated {
                key: LEGACY_V2_KEY,
                from: 2
            }
        );
        assert!(store.contains(SAVE_KEY));
        assert!(!store.contains(LEGACY_V2_KEY));
        assert!(!store.contains(LEGACY_V1_KEY));

        // 2 回目のロードは書き戻された現在のセーブを読む
        let again = load(&mut store, &config(), 0);
        assert_eq!(again.source, LoadSource::Current);
        assert_eq!(again.state, loaded.state);
    }

    #[test]
    fn malformed_legacy_falls_through_to_next_key() {
        let mut store = MemoryStore::new();
        store.insert_raw(LEGACY_V2_KEY, "garbage{");
        store.insert_raw(LEGACY_FLAT_KEY, r#"{"credits": 9}"#);
        let loaded = load(&mut store, &config(), 0);
        assert_eq!(
            loaded.source,
            LoadSource::Migrated {
                key: LEGACY_FLAT_KEY,
                from: 1
            }
        );
        assert_eq!(loaded.state.credits, 9.0);
    }

    #[test]
    fn migrated_save_kept_when_write_forward_fails() {
        let mut store = MemoryStore::new();
        store.insert_raw(LEGACY_V1_KEY, V1_SAVE);
        store.set_fail_writes(true);
        let loaded = load(&mut store, &config(), 0);
        assert!(matches!(loaded.source, LoadSource::Migrated { .. }));
        assert!(store.contains(LEGACY_V1_KEY));
        assert!(!store.contains(SAVE_KEY));
    }

    #[test]
    fn corrupt_current_save_is_discarded() {
        let mut store = MemoryStore::new();
        store.insert_raw(SAVE_KEY, "{{{{");
        let loaded = load(&mut store, &config(), 0);
        assert!(matches!(loaded.source, LoadSource::Recovered { .. }));
        assert!(!store.contains(SAVE_KEY));
        assert_eq!(loaded.state.credits, 0.0);
    }

    #[test]
    fn unreadable_store_degrades_to_defaults() {
        let mut store = MemoryStore::new();
        store.set_fail_reads(true);
        let loaded = load(&mut store, &config(), 0);
        assert!(matches!(loaded.source, LoadSource::Recovered { .. }));
    }

    #[test]
    fn write_failure_is_reported() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        let err = write(&mut store, &played_state()).unwrap_err();
        assert!(matches!(err, SaveError::Store(StoreError::Write { .. })));
    }

    #[test]
    fn clear_removes_every_key() {
        let mut store = MemoryStore::new();
        for key in [SAVE_KEY, LEGACY_V2_KEY, LEGACY_V1_KEY, LEGACY_FLAT_KEY] {
            store.insert_raw(key, "{}");
        }
        clear(&mut store).unwrap();
        for key in [SAVE_KEY, LEGACY_V2_KEY, LEGACY_V1_KEY, LEGACY_FLAT_KEY] {
            assert!(!store.contains(key));
        }
    }
}
