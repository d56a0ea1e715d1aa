//! Reusable clickable UI components.
//!
//! Each component renders and registers its own click targets, so the row a
//! button is drawn on and the row that reacts to a tap can never drift apart.
//!
//! - [`TabBar`]: one-row tab navigation.
//! - [`ClickableList`]: lines paired with click actions.
//! - [`gauge_line`]: a text progress bar for cooldowns and contracts.

use ratzilla::ratatui::layout::Rect;
use ratzilla::ratatui::style::{Color, Style};
use ratzilla::ratatui::text::{Line, Span};
use ratzilla::ratatui::widgets::{Block, Paragraph};
use ratzilla::ratatui::Frame;

use crate::input::ClickState;

// ── TabBar ─────────────────────────────────────────────────────

/// A horizontal tab bar.
///
/// Click targets are computed from the rendered label widths, so dynamic
/// labels like `Contracts (!)` stay tappable where they are drawn.
///
/// ```ignore
/// TabBar::new(" │ ")
///     .tab("Crew", tab_style(0), TAB_CREW)
///     .tab("Upgrades", tab_style(1), TAB_UPGRADES)
///     .render(f, area, &mut cs);
/// ```
pub struct TabBar<'a> {
    tabs: Vec<(String, Style, u16)>,
    separator: &'a str,
    block: Option<Block<'a>>,
}

impl<'a> TabBar<'a> {
    pub fn new(separator: &'a str) -> Self {
        Self {
            tabs: Vec::new(),
            separator,
            block: None,
        }
    }

    pub fn tab(mut self, label: impl Into<String>, style: Style, action_id: u16) -> Self {
        self.tabs.push((label.into(), style, action_id));
        self
    }

    /// Wrap the bar in a [`Block`]; targets are shifted to its inner area.
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn render(self, f: &mut Frame, area: Rect, cs: &mut ClickState) {
        let mut spans: Vec<Span> = Vec::new();
        let sep_width = Line::from(self.separator).width() as u16;
        let mut tab_widths: Vec<(u16, u16)> = Vec::new();

        for (i, (label, style, action_id)) in self.tabs.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(
                    self.separator,
                    Style::default().fg(Color::DarkGray),
                ));
            }
            let padded = format!(" {label} ");
            tab_widths.push((Line::from(padded.as_str()).width() as u16, *action_id));
            spans.push(Span::styled(padded, *style));
        }

        let inner = match &self.block {
            Some(block) => block.inner(area),
            None => area,
        };

        let line = Line::from(spans);
        let paragraph = match self.block {
            Some(block) => Paragraph::new(line).block(block),
            None => Paragraph::new(line),
        };
        f.render_widget(paragraph, area);

        // Inner x/width for accuracy, full height for tap tolerance.
        cs.register_tab_targets(
            &tab_widths,
            sep_width,
            inner.x,
            area.y,
            inner.width,
            area.height.max(1),
        );
    }
}

// ── ClickableList ──────────────────────────────────────────────

/// Lines annotated with click actions as they are added.
///
/// ```ignore
/// let mut cl = ClickableList::new();
/// cl.push(Line::from("Crew"));
/// cl.push_clickable(Line::from(" [1] Hire Novice Hunter"), HIRE_BASE);
/// cl.register_targets(area, &mut cs, 1, 1, 0);
/// f.render_widget(Paragraph::new(cl.into_lines()).block(block), area);
/// ```
pub struct ClickableList<'a> {
    lines: Vec<Line<'a>>,
    /// `(line_index, action_id)`
    actions: Vec<(u16, u16)>,
}

impl<'a> Default for ClickableList<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ClickableList<'a> {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, line: Line<'a>) {
        self.lines.push(line);
    }

    /// The action follows the line: inserting lines above moves the target too.
    pub fn push_clickable(&mut self, line: Line<'a>, action_id: u16) {
        let idx = self.lines.len() as u16;
        self.actions.push((idx, action_id));
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<Line<'a>> {
        self.lines
    }

    /// Register a row target for every clickable line that is on screen.
    ///
    /// * `top_offset` / `bottom_offset`: rows taken by borders.
    /// * `scroll`: lines scrolled out above the first visible row.
    ///
    /// Lines are assumed not to wrap.
    pub fn register_targets(
        &self,
        area: Rect,
        cs: &mut ClickState,
        top_offset: u16,
        bottom_offset: u16,
        scroll: u16,
    ) {
        let content_y = area.y + top_offset;
        let content_end = area.y + area.height.saturating_sub(bottom_offset);

        for &(line_idx, action_id) in &self.actions {
            if line_idx < scroll {
                continue;
            }
            let row = content_y + (line_idx - scroll);
            if row >= content_end {
                continue;
            }
            cs.add_row_target(area, row, action_id);
        }
    }
}

// ── Gauge ──────────────────────────────────────────────────────

/// `label ████░░░░ suffix`, with `fraction` clamped to `0.0..=1.0`.
pub fn gauge_line<'a>(
    label: impl Into<String>,
    fraction: f64,
    bar_width: usize,
    color: Color,
    suffix: impl Into<String>,
) -> Line<'a> {
    let filled = filled_cells(fraction, bar_width);
    Line::from(vec![
        Span::styled(label.into(), Style::default().fg(Color::White)),
        Span::styled("█".repeat(filled), Style::default().fg(color)),
        Span::styled(
            "░".repeat(bar_width - filled),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(suffix.into(), Style::default().fg(Color::Gray)),
    ])
}

fn filled_cells(fraction: f64, bar_width: usize) -> usize {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((fraction * bar_width as f64).round() as usize).min(bar_width)
}
