//! Module screens
//!
//! Rendered after a module is launched. Modules that ship a video get a
//! "Play video" button backed by a simulated playback gauge.

use super::header::{self, HeaderRenderer};
use crate::app::ModuleScreenState;
use crate::theme::{Colors, Styles};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};

/// Render a launched module in the specified area
pub fn render_module_screen_in_area(
    f: &mut Frame,
    screen: &ModuleScreenState,
    area: Rect,
    header: &HeaderRenderer,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(4),    // Description
            Constraint::Length(3), // Play button
            Constraint::Length(3), // Playback
        ])
        .split(area);

    header.render_title(f, chunks[0], &screen.title);

    let description = Paragraph::new(vec![
        Line::from(screen.description.clone()),
        Line::from(""),
        Line::from(vec![
            Span::styled("Entry point: ", Styles::text_muted()),
            Span::styled(screen.entry_point.to_string(), Styles::text_secondary()),
        ]),
    ])
    .block(header::panel_block(&screen.name, false))
    .wrap(Wrap { trim: true });
    f.render_widget(description, chunks[1]);

    let Some(video) = screen.video.as_ref() else {
        return;
    };

    let button = Paragraph::new(Line::from(Span::styled(
        format!(" ▶ Play video ({video}) "),
        Styles::selected(),
    )))
    .block(header::panel_block("Video", true));
    f.render_widget(button, chunks[2]);

    if let Some(playback) = screen.playback.as_ref() {
        let title = if playback.is_finished() {
            format!("{} finished", playback.source)
        } else {
            format!(
                "Playing {} {:.1}s / {:.1}s",
                playback.source,
                playback.position_ms as f64 / 1000.0,
                playback.duration_ms as f64 / 1000.0
            )
        };
        header::render_progress_bar(f, chunks[3], &title, playback.percent(), Colors::PLAYBACK);
    }
}
