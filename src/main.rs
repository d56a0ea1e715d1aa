mod bounty;
mod error;
mod input;
mod logging;
mod scheduler;
mod store;
mod time;
mod widgets;

use std::{cell::RefCell, io, rc::Rc};

use log::{info, warn, LevelFilter};
use ratzilla::event::{KeyCode, MouseButton, MouseEventKind};
use ratzilla::ratatui::Terminal;
use ratzilla::{DomBackend, WebRenderer};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use bounty::config::EngineConfig;
use bounty::engine::Engine;
use bounty::{BountyGame, HostRequest};
use input::{pixel_x_to_col, pixel_y_to_row, ClickState, InputEvent};
use store::KeyValueStore;
use time::{Clock, SystemClock};

/// Store key holding an optional JSON override of [`EngineConfig`].
const CONFIG_KEY: &str = "bountyConfig";

/// Map a mouse position to a terminal cell using the grid container's rect.
fn dom_pixel_to_cell(mouse_x: u32, mouse_y: u32, cs: &ClickState) -> Option<(u16, u16)> {
    let window = web_sys::window()?;
    let document = window.document()?;

    // DomBackend renders into a <div> directly under <body>.
    let grid = document.query_selector("body > div").ok()??;
    let rect = grid.get_bounding_client_rect();

    let col = pixel_x_to_col(mouse_x as f64 - rect.left(), rect.width(), cs.terminal_cols)?;
    let row = pixel_y_to_row(mouse_y as f64 - rect.top(), rect.height(), cs.terminal_rows)?;
    Some((col, row))
}

#[cfg(target_arch = "wasm32")]
fn open_store() -> Box<dyn KeyValueStore> {
    Box::new(store::LocalStorage)
}

#[cfg(not(target_arch = "wasm32"))]
fn open_store() -> Box<dyn KeyValueStore> {
    Box::new(store::MemoryStore::new())
}

fn load_config(store: &dyn KeyValueStore) -> EngineConfig {
    match store.get(CONFIG_KEY) {
        Ok(Some(json)) => match EngineConfig::from_json(&json) {
            Ok(config) => {
                info!("using config override from {CONFIG_KEY}");
                config
            }
            Err(e) => {
                warn!("ignoring malformed {CONFIG_KEY}: {e}");
                EngineConfig::default()
            }
        },
        Ok(None) => EngineConfig::default(),
        Err(e) => {
            warn!("could not read {CONFIG_KEY}: {e}");
            EngineConfig::default()
        }
    }
}

/// Offer `contents` as `bounty-save-<date>.json`.
fn download_save(contents: &str) -> Option<()> {
    let window = web_sys::window()?;
    let document = window.document()?;

    let parts = js_sys::Array::of1(&JsValue::from_str(contents));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/json");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options).ok()?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).ok()?;

    let date: String = js_sys::Date::new_0().to_iso_string().into();
    let file_name = format!("bounty-save-{}.json", date.get(..10).unwrap_or("export"));

    let anchor: web_sys::HtmlAnchorElement = document.create_element("a").ok()?.dyn_into().ok()?;
    anchor.set_href(&url);
    anchor.set_download(&file_name);
    anchor.click();
    web_sys::Url::revoke_object_url(&url).ok()
}

fn prompt_import() -> Option<String> {
    let window = web_sys::window()?;
    window
        .prompt_with_message("Paste your save data:")
        .ok()
        .flatten()
        .filter(|text| !text.trim().is_empty())
}

fn fulfil_request(game: &mut BountyGame) {
    match game.take_request() {
        Some(HostRequest::Download { contents }) => {
            if download_save(&contents).is_none() {
                warn!("save download failed");
            }
        }
        Some(HostRequest::PromptImport) => {
            if let Some(text) = prompt_import() {
                game.import(&text);
            }
        }
        None => {}
    }
}

/// Save when the tab is hidden or the page unloads.
fn install_page_hooks(game: &Rc<RefCell<BountyGame>>) -> Option<()> {
    let window = web_sys::window()?;
    let document = window.document()?;

    let on_visibility = Closure::wrap(Box::new({
        let game = game.clone();
        let document = document.clone();
        move || {
            if !document.hidden() {
                return;
            }
            if let Ok(mut g) = game.try_borrow_mut() {
                g.engine.on_visibility_hidden();
            }
        }
    }) as Box<dyn FnMut()>);
    document
        .add_event_listener_with_callback("visibilitychange", on_visibility.as_ref().unchecked_ref())
        .ok()?;
    // Listeners live as long as the page.
    on_visibility.forget();

    let on_unload = Closure::wrap(Box::new({
        let game = game.clone();
        move || {
            if let Ok(mut g) = game.try_borrow_mut() {
                g.engine.on_unload();
            }
        }
    }) as Box<dyn FnMut()>);
    window
        .add_event_listener_with_callback("beforeunload", on_unload.as_ref().unchecked_ref())
        .ok()?;
    on_unload.forget();
    Some(())
}

fn main() -> io::Result<()> {
    console_error_panic_hook::set_once();
    logging::init(LevelFilter::Info);

    let store = open_store();
    let config = load_config(store.as_ref());
    let engine = Engine::with_timer_queue(config, Box::new(SystemClock), store);
    let game = Rc::new(RefCell::new(BountyGame::new(engine)));
    let click_state = Rc::new(RefCell::new(ClickState::new()));

    if install_page_hooks(&game).is_none() {
        warn!("page lifecycle hooks unavailable; relying on autosave");
    }

    let backend = DomBackend::new()?;
    let terminal = Terminal::new(backend)?;

    terminal.on_mouse_event({
        let game = game.clone();
        let click_state = click_state.clone();
        move |mouse_event| {
            if mouse_event.event != MouseEventKind::Pressed
                || mouse_event.button != MouseButton::Left
            {
                return;
            }

            let cs = click_state.borrow();
            if cs.terminal_rows == 0 || cs.terminal_cols == 0 {
                return;
            }
            let Some((col, row)) = dom_pixel_to_cell(mouse_event.x, mouse_event.y, &cs) else {
                return;
            };
            let action = cs.hit_test(col, row);
            drop(cs);

            if let Some(action_id) = action {
                let mut g = game.borrow_mut();
                g.handle_input(&InputEvent::Click(action_id));
                fulfil_request(&mut g);
            }
        }
    });

    terminal.on_key_event({
        let game = game.clone();
        move |key_event| {
            if let KeyCode::Char(c) = key_event.code {
                let mut g = game.borrow_mut();
                g.handle_input(&InputEvent::Key(c.to_ascii_lowercase()));
                fulfil_request(&mut g);
            }
        }
    });

    terminal.draw_web({
        let click_state = click_state.clone();
        move |f| {
            let mut g = game.borrow_mut();
            g.update(SystemClock.now_ms());

            let size = f.area();
            {
                let mut cs = click_state.borrow_mut();
                cs.terminal_cols = size.width;
                cs.terminal_rows = size.height;
                cs.clear_targets();
            }
            g.render(f, size, &click_state);
        }
    });

    Ok(())
}
