//! Dialog rendering
//!
//! Confirmation dialog shown when a session needs the user to allow a
//! download.

use crate::app::AppState;
use crate::components::help_overlay::centered_rect;
use crate::theme::Styles;
use crate::types::SessionState;
use ratatui::{
    Frame,
    layout::Alignment,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const DIALOG_WIDTH: u16 = 56;
const DIALOG_HEIGHT: u16 = 9;

/// Render the confirmation dialog over the current screen
pub fn render_confirm_dialog(f: &mut Frame, state: &AppState) {
    let Some(pending) = state.confirmation.as_ref() else {
        return;
    };

    let area = centered_rect(f.area(), DIALOG_WIDTH, DIALOG_HEIGHT);
    f.render_widget(Clear, area);

    let dialog = Paragraph::new(confirm_lines(pending))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border_active())
                .title(Span::styled(" Confirm download ", Styles::title())),
        )
        .style(Styles::dialog())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(dialog, area);
}

fn confirm_lines(pending: &SessionState) -> Vec<Line<'static>> {
    let mib = pending.total_bytes_to_download as f64 / (1024.0 * 1024.0);
    vec![
        Line::from(""),
        Line::from(Span::styled(
            pending.module_names.to_string(),
            Styles::nav_key(),
        )),
        Line::from(format!("needs to download {mib:.1} MiB.")),
        Line::from(""),
        Line::from(vec![
            Span::styled("Y", Styles::nav_key()),
            Span::styled(" allow   ", Styles::text_muted()),
            Span::styled("N", Styles::nav_key()),
            Span::styled(" decline", Styles::text_muted()),
        ]),
    ]
}
