//! Bounty Office rendering. Read-only: nothing here mutates the game.

use std::cell::RefCell;
use std::rc::Rc;

use ratzilla::ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratzilla::ratatui::style::{Color, Modifier, Style};
use ratzilla::ratatui::text::{Line, Span};
use ratzilla::ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratzilla::ratatui::Frame;

use crate::input::{is_narrow_layout, ClickState};
use crate::time::Millis;
use crate::widgets::{gauge_line, ClickableList, TabBar};

use super::actions::*;
use super::catalog::{self, ActionKind};
use super::engine::{format_duration, format_number, NoticeLevel};
use super::state::Flag;
use super::{BountyGame, Tab};

const GAUGE_WIDTH: usize = 16;

pub fn render(game: &BountyGame, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
    let now = game.engine.now();

    // Notices get their own column when there is room for it.
    let (main_area, side_area) = if area.width >= 80 {
        let h_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(area);
        (h_chunks[0], Some(h_chunks[1]))
    } else {
        (area, None)
    };

    let hunt = hunt_lines(game, now);
    let hunt_height = hunt.len() as u16 + 2;
    let toast_height = match side_area {
        Some(_) => 0,
        None if game.toasts.is_empty() => 0,
        None => game.toasts.len() as u16 + 2,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(hunt_height),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(toast_height),
            Constraint::Length(1),
        ])
        .split(main_area);

    let mut cs = click_state.borrow_mut();
    render_header(game, f, chunks[0], now);
    render_hunt(hunt, f, chunks[1], &mut cs);
    render_tab_bar(game, f, chunks[2], &mut cs);

    let content = match game.tab {
        Tab::Crew => crew_lines(game),
        Tab::Upgrades => upgrade_lines(game),
        Tab::Contracts => contract_lines(game),
        Tab::Office => office_lines(game, now),
    };
    render_list(content, tab_title(game.tab), tab_color(game.tab), f, chunks[3], &mut cs);

    if toast_height > 0 {
        render_toasts(game, f, chunks[4]);
    }
    if let Some(side) = side_area {
        render_toasts(game, f, side);
    }
    render_help(f, chunks[5]);
}

fn render_header(game: &BountyGame, f: &mut Frame, area: Rect, now: Millis) {
    let state = game.engine.state();
    let saved = match game.engine.seconds_since_save(now) {
        Some(secs) => format!("saved {secs}s ago"),
        None => "not saved yet".to_string(),
    };
    let autosave = if game.engine.autosave_enabled() {
        "autosave on"
    } else {
        "autosave off"
    };

    let mut top = vec![
        Span::styled(
            format!(" ◆ {} credits", format_number(state.credits.floor())),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  +{}/tick", format_number(state.production_per_tick())),
            Style::default().fg(Color::Green),
        ),
    ];
    if state.unbanked > 0.0 {
        top.push(Span::styled(
            format!("  ({} unbanked)", format_number(state.unbanked)),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let lines = vec![
        Line::from(top),
        Line::from(Span::styled(
            format!(" tick {}  ·  {saved}  ·  {autosave}", state.ticks),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Bounty Office "),
    );
    f.render_widget(widget, area);
}

/// Hunt button plus cooldown and contract gauges.
fn hunt_lines(game: &BountyGame, now: Millis) -> ClickableList<'static> {
    let state = game.engine.state();
    let mut cl = ClickableList::new();

    let ready = state.can_perform(ActionKind::Action, now);
    let value = format_number(state.click_value(ActionKind::Action));
    let target = if state.contract_active {
        "toward contract"
    } else {
        "credits"
    };
    let hunt_style = if ready {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let hunt_label = format!(" [H] Hunt  +{value} {target}");
    cl.push_clickable(Line::from(Span::styled(hunt_label, hunt_style)), HUNT);

    cl.push(cooldown_gauge(game, ActionKind::Action, " hunt ", now));
    cl.push(cooldown_gauge(game, ActionKind::Hire, " hire ", now));

    if state.contract_active {
        if let Some(contract) = state.contract() {
            let fraction = state.contract_progress / contract.goal;
            cl.push(gauge_line(
                " job  ",
                fraction,
                GAUGE_WIDTH,
                Color::Magenta,
                format!(
                    " {}/{}",
                    format_number(state.contract_progress),
                    format_number(contract.goal)
                ),
            ));
        }
    }
    cl
}

fn cooldown_gauge(
    game: &BountyGame,
    kind: ActionKind,
    label: &'static str,
    now: Millis,
) -> Line<'static> {
    let state = game.engine.state();
    let remaining = state.cooldown(kind).map(|c| c.remaining_ms(now)).unwrap_or(0);
    let suffix = match remaining {
        0 => " ready".to_string(),
        ms => format!(" {}", format_duration(ms)),
    };
    let color = if remaining == 0 { Color::Green } else { Color::Cyan };
    gauge_line(
        label,
        state.cooldown_progress(kind, now),
        GAUGE_WIDTH,
        color,
        suffix,
    )
}

fn render_hunt(cl: ClickableList<'static>, f: &mut Frame, area: Rect, cs: &mut ClickState) {
    cl.register_targets(area, cs, 1, 1, 0);
    let widget = Paragraph::new(cl.into_lines()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(widget, area);
}

fn tab_title(tab: Tab) -> &'static str {
    match tab {
        Tab::Crew => " Crew ",
        Tab::Upgrades => " Upgrades ",
        Tab::Contracts => " Contracts ",
        Tab::Office => " Office ",
    }
}

fn tab_color(tab: Tab) -> Color {
    match tab {
        Tab::Crew => Color::Green,
        Tab::Upgrades => Color::Magenta,
        Tab::Contracts => Color::Red,
        Tab::Office => Color::Blue,
    }
}

fn tab_label(game: &BountyGame, tab: Tab) -> String {
    let state = game.engine.state();
    match tab {
        Tab::Crew => "Crew".to_string(),
        Tab::Upgrades => "Upgrades".to_string(),
        // Hint until the first contract is taken.
        Tab::Contracts if !state.flag(Flag::ContractsHintRemoved) => "Contracts (!)".to_string(),
        Tab::Contracts => "Contracts".to_string(),
        Tab::Office => "Office".to_string(),
    }
}

fn tab_action(tab: Tab) -> u16 {
    match tab {
        Tab::Crew => TAB_CREW,
        Tab::Upgrades => TAB_UPGRADES,
        Tab::Contracts => TAB_CONTRACTS,
        Tab::Office => TAB_OFFICE,
    }
}

fn render_tab_bar(game: &BountyGame, f: &mut Frame, area: Rect, cs: &mut ClickState) {
    let mut bar = TabBar::new(" │ ");
    for tab in game.visible_tabs() {
        let color = tab_color(tab);
        let style = if tab == game.tab {
            Style::default()
                .fg(Color::Black)
                .bg(color)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        };
        bar = bar.tab(tab_label(game, tab), style, tab_action(tab));
    }
    bar.block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    )
    .render(f, area, cs);
}

fn crew_lines(game: &BountyGame) -> ClickableList<'static> {
    let state = game.engine.state();
    let mut cl = ClickableList::new();
    let visible = game.visible_generators();

    if visible.is_empty() {
        cl.push(Line::from(Span::styled(
            " Nobody wants to work for you yet. Keep hunting.",
            Style::default().fg(Color::DarkGray),
        )));
        return cl;
    }

    for (i, &id) in visible.iter().enumerate() {
        let cost = state.generator_cost(id);
        let affordable = state.credits >= cost as f64;
        let count = state.generator_count(id);
        let name_style = if affordable {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let key = format!(" [{}] ", i + 1);
        cl.push_clickable(
            Line::from(vec![
                Span::styled(key, Style::default().fg(Color::Yellow)),
                Span::styled(id.name(), name_style),
                Span::styled(format!(" ×{count}"), Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!("  {} cr", format_number(cost as f64)),
                    Style::default().fg(if affordable { Color::Green } else { Color::Red }),
                ),
            ]),
            HIRE_BASE + i as u16,
        );

        let detail = match game.engine.autoclick_interval_ms(id) {
            Some(ms) => format!("     {} · hunts every {}", id.description(), format_duration(ms)),
            None if id.per_tick() > 0.0 => format!(
                "     {} · +{}/tick each",
                id.description(),
                format_number(id.per_tick())
            ),
            None => format!("     {}", id.description()),
        };
        cl.push(Line::from(Span::styled(
            detail,
            Style::default().fg(Color::Gray),
        )));
    }
    cl
}

fn upgrade_lines(game: &BountyGame) -> ClickableList<'static> {
    let state = game.engine.state();
    let config = game.engine.config();
    let mut cl = ClickableList::new();

    for (i, &id) in game.visible_upgrades().iter().enumerate() {
        let level = state.upgrade_level(id);
        let maxed = state.upgrade_maxed(id, config);
        let cost = state.upgrade_cost(id);
        let affordable = !maxed && state.credits >= cost as f64;

        let price = if maxed {
            Span::styled("  MAX", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(
                format!("  {} cr", format_number(cost as f64)),
                Style::default().fg(if affordable { Color::Green } else { Color::Red }),
            )
        };
        let level_text = match id.max_level(config.cooldown_reduction_max_level) {
            Some(max) => format!(" Lv {level}/{max}"),
            None => format!(" Lv {level}"),
        };
        let key = format!(" [{}] ", i + 1);
        cl.push_clickable(
            Line::from(vec![
                Span::styled(key, Style::default().fg(Color::Yellow)),
                Span::styled(
                    id.name(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ),
                Span::styled(level_text, Style::default().fg(Color::Cyan)),
                price,
            ]),
            BUY_UPGRADE_BASE + i as u16,
        );
        cl.push(Line::from(Span::styled(
            format!("     {}", id.description()),
            Style::default().fg(Color::Gray),
        )));
    }
    cl
}

fn contract_lines(game: &BountyGame) -> ClickableList<'static> {
    let state = game.engine.state();
    let mut cl = ClickableList::new();
    let Some(contract) = state.contract() else {
        return cl;
    };

    cl.push(Line::from(Span::styled(
        format!(" {}", contract.title),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    )));
    cl.push(Line::from(Span::styled(
        format!(" {}", contract.details),
        Style::default().fg(Color::Gray),
    )));
    cl.push(Line::from(Span::styled(
        format!(
            " Goal {}  ·  Reward {} cr",
            format_number(contract.goal),
            format_number(contract.reward)
        ),
        Style::default().fg(Color::White),
    )));
    cl.push(Line::from(""));

    if state.contract_active {
        cl.push(gauge_line(
            " progress ",
            state.contract_progress / contract.goal,
            GAUGE_WIDTH,
            Color::Magenta,
            format!(" {:.0}%", 100.0 * (state.contract_progress / contract.goal).min(1.0)),
        ));
        cl.push(Line::from(Span::styled(
            " Hunts and crew output go to the contract until it is done.",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        let label = " [T] Take contract";
        cl.push_clickable(
            Line::from(Span::styled(
                label,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            TAKE_CONTRACT,
        );
    }

    let done = state.current_contract;
    if done > 0 {
        cl.push(Line::from(""));
        cl.push(Line::from(Span::styled(
            format!(" ✓ {done}/{} contracts closed", catalog::CONTRACTS.len()),
            Style::default().fg(Color::DarkGray),
        )));
    }
    cl
}

fn office_lines(game: &BountyGame, now: Millis) -> ClickableList<'static> {
    let mut cl = ClickableList::new();
    let key_style = Style::default().fg(Color::Yellow);
    let text_style = Style::default().fg(Color::White);

    let autosave = if game.engine.autosave_enabled() { "on" } else { "off" };
    let remaining = game.reset_presses_remaining(now);
    let reset_text = if remaining < super::RESET_PRESSES {
        format!("Reset progress (press {remaining} more)")
    } else {
        "Reset progress (press 3 times)".to_string()
    };

    let entries: [(&str, String, u16); 5] = [
        (" [S] ", "Save now".to_string(), SAVE_NOW),
        (" [A] ", format!("Autosave: {autosave}"), TOGGLE_AUTOSAVE),
        (" [X] ", "Export save".to_string(), EXPORT_SAVE),
        (" [I] ", "Import save".to_string(), IMPORT_SAVE),
        (" [R] ", reset_text, RESET_PROGRESS),
    ];
    for (key, text, action) in entries {
        let style = if action == RESET_PROGRESS {
            Style::default().fg(Color::Red)
        } else {
            text_style
        };
        cl.push_clickable(
            Line::from(vec![Span::styled(key, key_style), Span::styled(text, style)]),
            action,
        );
    }
    cl
}

fn render_list(
    cl: ClickableList<'static>,
    title: &'static str,
    color: Color,
    f: &mut Frame,
    area: Rect,
    cs: &mut ClickState,
) {
    cl.register_targets(area, cs, 1, 1, 0);
    let widget = Paragraph::new(cl.into_lines()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(title),
    );
    f.render_widget(widget, area);
}

fn notice_style(level: NoticeLevel) -> Style {
    match level {
        NoticeLevel::Info => Style::default().fg(Color::White),
        NoticeLevel::Success => Style::default().fg(Color::Green),
        NoticeLevel::Warning => Style::default().fg(Color::Yellow),
        NoticeLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

fn render_toasts(game: &BountyGame, f: &mut Frame, area: Rect) {
    let lines: Vec<Line> = game
        .toasts
        .iter()
        .map(|t| {
            Line::from(Span::styled(
                format!(" {}", t.notice.text),
                notice_style(t.notice.level),
            ))
        })
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    // Newest notices are at the bottom; scroll wrapped overflow off the top.
    let visible = area.height.saturating_sub(2);
    let wrapped = paragraph.line_count(area.width.saturating_sub(2)) as u16;
    let widget = paragraph
        .scroll((wrapped.saturating_sub(visible), 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(" News "),
        );
    f.render_widget(widget, area);
}

fn help_text(width: u16) -> &'static str {
    if is_narrow_layout(width) {
        " h hunt · c/u/k/o tabs"
    } else {
        " h hunt · c crew · u upgrades · k contracts · o office"
    }
}

fn render_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(Line::from(Span::styled(
        help_text(area.width),
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(help, area);
}
