//! User interface rendering module
//!
//! This module is organized into submodules:
//! - `header` - Banner, title, gauges, nav bar and toasts
//! - `menus` - Main screen (module buttons and progress panel)
//! - `dialogs` - Confirmation dialog
//! - `screens` - Launched module screens

mod dialogs;
mod header;
mod menus;
mod screens;

use crate::acquisition::Phase;
use crate::app::{AppMode, AppState};
use crate::components::keybindings::KeybindingContext;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

pub use header::HeaderRenderer;

/// Button of the main screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    /// Load (install, then launch) a module
    Module {
        name: String,
        title: String,
        installed: bool,
        phase: Phase,
    },
    UninstallAll,
}

impl MenuItem {
    pub fn label(&self) -> &str {
        match self {
            Self::Module { title, .. } => title,
            Self::UninstallAll => "Uninstall all modules",
        }
    }
}

/// UI renderer for the application
///
/// This is the main entry point for UI rendering. It delegates to specialized
/// submodules for different parts of the UI.
pub struct UiRenderer {
    header: HeaderRenderer,
}

impl Default for UiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl UiRenderer {
    pub fn new() -> Self {
        Self {
            header: HeaderRenderer::new(),
        }
    }

    /// Render the complete UI based on application state
    pub fn render(
        &self,
        f: &mut Frame,
        state: &AppState,
        items: &[MenuItem],
        keybinding_ctx: &KeybindingContext,
    ) {
        let toast_lines = u16::try_from(state.toasts.len().min(3)).unwrap_or(3);
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),              // Main content area
                Constraint::Length(toast_lines), // Toasts
                Constraint::Length(1),           // Navigation bar
            ])
            .split(f.area());

        let content_area = main_chunks[0];

        match (state.mode, state.module_screen.as_ref()) {
            (AppMode::ModuleScreen, Some(screen)) => {
                screens::render_module_screen_in_area(f, screen, content_area, &self.header);
            }
            (AppMode::ConfirmDialog, _) => {
                menus::render_main_menu_in_area(f, state, items, content_area, &self.header);
                dialogs::render_confirm_dialog(f, state);
            }
            _ => menus::render_main_menu_in_area(f, state, items, content_area, &self.header),
        }

        header::render_toasts(f, state, main_chunks[1]);
        header::render_nav_bar(f, state, keybinding_ctx, main_chunks[2]);

        // Help overlay is drawn on top of everything
        if state.help_visible {
            header::render_help_overlay(f, state, keybinding_ctx);
        }
    }
}
