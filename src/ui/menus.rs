//! Main screen rendering
//!
//! The module buttons, or the progress panel while a request is running.

use super::MenuItem;
use super::header::{self, HeaderRenderer};
use crate::acquisition::{Phase, ViewPhase};
use crate::app::AppState;
use crate::theme::Styles;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph, Wrap},
};

/// Render the main screen in the specified area
pub fn render_main_menu_in_area(
    f: &mut Frame,
    state: &AppState,
    items: &[MenuItem],
    area: Rect,
    header: &HeaderRenderer,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Title
            Constraint::Min(6),    // Buttons or progress
        ])
        .split(area);

    header.render_header(f, chunks[0]);
    header.render_title(f, chunks[1], "On-demand modules");

    match state.ui.view {
        ViewPhase::Buttons => render_buttons(f, state, items, chunks[2]),
        ViewPhase::Progress => render_progress(f, state, chunks[2]),
    }
}

fn render_buttons(f: &mut Frame, state: &AppState, items: &[MenuItem], area: Rect) {
    let list_items: Vec<ListItem> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let line = match item {
                MenuItem::Module {
                    title,
                    installed,
                    phase,
                    ..
                } => {
                    let status = match phase {
                        Phase::Failed { .. } | Phase::Canceled => Span::styled(
                            format!("  [{phase}]"),
                            Styles::error(),
                        ),
                        _ if *installed => Span::styled("  [installed]", Styles::success()),
                        _ => Span::styled("  [on demand]", Styles::text_muted()),
                    };
                    Line::from(vec![Span::raw(format!(" ▶ {title}")), status])
                }
                MenuItem::UninstallAll => Line::from(" ▶ Uninstall all modules"),
            };

            let item = ListItem::new(line);
            if index == state.selection {
                item.style(Styles::selected())
            } else {
                item.style(Styles::text())
            }
        })
        .collect();

    let list = List::new(list_items).block(header::panel_block("Modules", true));
    f.render_widget(list, area);
}

fn render_progress(f: &mut Frame, state: &AppState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Gauge
            Constraint::Min(2),    // Message
        ])
        .split(area);

    header::render_progress_bar(
        f,
        chunks[0],
        "Loading",
        u16::from(state.ui.percent()),
        header::DOWNLOAD_FILL,
    );

    let message = Paragraph::new(state.ui.message.clone())
        .block(header::panel_block("Status", false))
        .style(Styles::text_secondary())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(message, chunks[1]);
}
