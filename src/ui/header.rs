//! Header and common widget rendering
//!
//! This module contains the banner, title rendering, progress bars, the
//! navigation bar, toasts and the help overlay.

use crate::app::{AppState, ToastLevel};
use crate::components::help_overlay::HelpOverlay;
use crate::components::keybindings::KeybindingContext;
use crate::theme::{Colors, Styles};
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::Color,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

/// Header renderer containing the banner lines
pub struct HeaderRenderer {
    header_lines: Vec<Line<'static>>,
}

impl Default for HeaderRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderRenderer {
    /// Create a new header renderer
    pub fn new() -> Self {
        Self {
            header_lines: Self::create_header(),
        }
    }

    /// Render the banner
    pub fn render_header(&self, f: &mut Frame, area: Rect) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let header = Paragraph::new(self.header_lines.clone())
            .block(Block::default().borders(Borders::NONE))
            .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    /// Render a title section
    pub fn render_title(&self, f: &mut Frame, area: Rect, title: &str) {
        let title_widget = Paragraph::new(title.to_string())
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center)
            .style(Styles::title());
        f.render_widget(title_widget, area);
    }

    fn create_header() -> Vec<Line<'static>> {
        [
            "╔═╗┌┐┌   ╔╦╗┌─┐┌┬┐┌─┐┌┐┌┌┬┐",
            "║ ║│││ ─  ║║├┤ │││├─┤│││ ││",
            "╚═╝┘└┘   ═╩╝└─┘┴ ┴┴ ┴┘└┘─┴┘",
        ]
        .into_iter()
        .map(|line| Line::from(Span::styled(line, Styles::title())))
        .collect()
    }
}

/// Render a bordered progress gauge
pub fn render_progress_bar(f: &mut Frame, area: Rect, title: &str, percent: u16, fill: Color) {
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border_active())
                .title(title.to_string()),
        )
        .gauge_style(Styles::gauge(fill))
        .percent(percent.min(100));
    f.render_widget(gauge, area);
}

/// Render the navigation bar
pub fn render_nav_bar(
    f: &mut Frame,
    state: &AppState,
    keybinding_ctx: &KeybindingContext,
    area: Rect,
) {
    let mut spans = Vec::new();
    for (i, item) in keybinding_ctx.get_nav_items(&state.mode).into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  │  ", Styles::nav_hint()));
        }
        spans.push(Span::styled(item.key_display, Styles::nav_key()));
        spans.push(Span::styled(format!(" {}", item.action_label), Styles::nav_hint()));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

/// Render the most recent toasts, newest last
pub fn render_toasts(f: &mut Frame, state: &AppState, area: Rect) {
    let visible = usize::from(area.height);
    let start = state.toasts.len().saturating_sub(visible);
    let lines: Vec<Line> = state.toasts[start..]
        .iter()
        .map(|toast| {
            let (marker, style) = match toast.level {
                ToastLevel::Info => ("•", Styles::info()),
                ToastLevel::Success => ("✓", Styles::success()),
                ToastLevel::Error => ("✗", Styles::error()),
            };
            Line::from(vec![
                Span::styled(format!("{marker} "), style),
                Span::styled(toast.message.replace('\n', " "), Styles::text()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), area);
}

/// Render the help overlay
pub fn render_help_overlay(f: &mut Frame, state: &AppState, keybinding_ctx: &KeybindingContext) {
    let help_overlay = HelpOverlay::new(&state.mode, keybinding_ctx);
    help_overlay.render(f, f.area());
}

/// Border style for a panel depending on focus
pub fn panel_block(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(format!(" {title} "), Styles::title()))
        .border_style(if focused {
            Styles::border_active()
        } else {
            Styles::border_inactive()
        })
}

/// Gauge fill color for download progress
pub const DOWNLOAD_FILL: Color = Colors::PROGRESS;
