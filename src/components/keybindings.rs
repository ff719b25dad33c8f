//! Keybinding system for context-aware keyboard shortcuts
//!
//! Provides a registry of keybindings that change based on the current application mode.

use crate::app::AppMode;
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

/// Actions that can be triggered by keybindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    NavigateUp,
    NavigateDown,
    Select,
    Back,
    Quit,
    Help,
    Confirm,
    Decline,
    CancelDownload,
    Play,
}

/// A keybinding definition
#[derive(Debug, Clone)]
pub struct Keybinding {
    pub key: KeyCode,
    pub modifiers: KeyModifiers,
    pub action: KeyAction,
    pub display: String,
    pub description: String,
}

impl Keybinding {
    /// Create a new keybinding with no modifiers
    pub fn new(key: KeyCode, action: KeyAction, display: &str, description: &str) -> Self {
        Self::with_modifiers(key, KeyModifiers::NONE, action, display, description)
    }

    /// Create a keybinding with modifiers
    pub fn with_modifiers(
        key: KeyCode,
        modifiers: KeyModifiers,
        action: KeyAction,
        display: &str,
        description: &str,
    ) -> Self {
        Self {
            key,
            modifiers,
            action,
            display: display.to_string(),
            description: description.to_string(),
        }
    }

    /// Shift is ignored so that '?' and upper-case letters match as typed
    fn matches(&self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        self.key == key && self.modifiers == modifiers.difference(KeyModifiers::SHIFT)
    }
}

/// Navigation bar item for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavBarItem {
    pub key_display: String,
    pub action_label: String,
}

/// Help section for the help overlay
#[derive(Debug, Clone)]
pub struct HelpSection {
    pub title: String,
    pub items: Vec<(String, String)>,
}

/// Context-aware keybinding registry
pub struct KeybindingContext {
    /// Mode-specific keybindings
    mode_bindings: HashMap<AppMode, Vec<Keybinding>>,
    /// Global keybindings (available in all modes)
    global_bindings: Vec<Keybinding>,
}

impl Default for KeybindingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl KeybindingContext {
    /// Create a new keybinding context with default bindings
    pub fn new() -> Self {
        let mut ctx = Self {
            mode_bindings: HashMap::new(),
            global_bindings: Vec::new(),
        };
        ctx.register_defaults();
        ctx
    }

    /// Register default keybindings for all modes
    fn register_defaults(&mut self) {
        self.global_bindings = vec![
            Keybinding::new(KeyCode::Char('?'), KeyAction::Help, "?", "Help"),
            Keybinding::new(KeyCode::Char('q'), KeyAction::Quit, "Q", "Quit"),
            Keybinding::with_modifiers(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL,
                KeyAction::Quit,
                "Ctrl+C",
                "Quit",
            ),
        ];

        self.mode_bindings.insert(
            AppMode::MainMenu,
            vec![
                Keybinding::new(KeyCode::Up, KeyAction::NavigateUp, "Up", "Navigate up"),
                Keybinding::new(KeyCode::Char('k'), KeyAction::NavigateUp, "k", "Navigate up"),
                Keybinding::new(KeyCode::Down, KeyAction::NavigateDown, "Down", "Navigate down"),
                Keybinding::new(KeyCode::Char('j'), KeyAction::NavigateDown, "j", "Navigate down"),
                Keybinding::new(KeyCode::Enter, KeyAction::Select, "Enter", "Load module"),
                Keybinding::new(KeyCode::Esc, KeyAction::CancelDownload, "Esc", "Cancel download"),
            ],
        );

        self.mode_bindings.insert(
            AppMode::ConfirmDialog,
            vec![
                Keybinding::new(KeyCode::Char('y'), KeyAction::Confirm, "Y", "Allow download"),
                Keybinding::new(KeyCode::Enter, KeyAction::Confirm, "Enter", "Allow download"),
                Keybinding::new(KeyCode::Char('n'), KeyAction::Decline, "N", "Decline"),
                Keybinding::new(KeyCode::Esc, KeyAction::Decline, "Esc", "Decline"),
            ],
        );

        self.mode_bindings.insert(
            AppMode::ModuleScreen,
            vec![
                Keybinding::new(KeyCode::Enter, KeyAction::Play, "Enter", "Play video"),
                Keybinding::new(KeyCode::Char('p'), KeyAction::Play, "P", "Play video"),
                Keybinding::new(KeyCode::Esc, KeyAction::Back, "Esc", "Back"),
                Keybinding::new(KeyCode::Backspace, KeyAction::Back, "Bksp", "Back"),
            ],
        );
    }

    /// Get keybindings for a specific mode (includes global bindings)
    pub fn get_bindings(&self, mode: &AppMode) -> Vec<&Keybinding> {
        let mut bindings: Vec<&Keybinding> = Vec::new();

        if let Some(mode_bindings) = self.mode_bindings.get(mode) {
            bindings.extend(mode_bindings.iter());
        }
        bindings.extend(self.global_bindings.iter());

        bindings
    }

    /// Resolve a key press to an action; mode bindings win over global ones
    pub fn action_for(
        &self,
        mode: &AppMode,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Option<KeyAction> {
        self.get_bindings(mode)
            .into_iter()
            .find(|b| b.matches(key, modifiers))
            .map(|b| b.action)
    }

    /// Get navigation bar items for display
    pub fn get_nav_items(&self, mode: &AppMode) -> Vec<NavBarItem> {
        let bindings = self.get_bindings(mode);

        let priority_actions = match mode {
            AppMode::MainMenu => vec![
                KeyAction::NavigateUp,
                KeyAction::Select,
                KeyAction::CancelDownload,
                KeyAction::Help,
                KeyAction::Quit,
            ],
            AppMode::ConfirmDialog => vec![KeyAction::Confirm, KeyAction::Decline],
            AppMode::ModuleScreen => vec![KeyAction::Play, KeyAction::Back, KeyAction::Quit],
        };

        let mut items = Vec::new();
        for action in priority_actions {
            if action == KeyAction::NavigateUp {
                // Up/Down are shown as one item
                items.push(NavBarItem {
                    key_display: "Up/Dn".to_string(),
                    action_label: "Navigate".to_string(),
                });
            } else if let Some(binding) = bindings.iter().find(|b| b.action == action) {
                items.push(NavBarItem {
                    key_display: binding.display.clone(),
                    action_label: binding.description.clone(),
                });
            }
        }

        items
    }

    /// Get full help content for a mode (for help overlay)
    pub fn get_help_content(&self, mode: &AppMode) -> Vec<HelpSection> {
        let section = |title: &str, filter: fn(KeyAction) -> bool| {
            let items: Vec<_> = self
                .get_bindings(mode)
                .into_iter()
                .filter(|b| filter(b.action))
                .map(|b| (b.display.clone(), b.description.clone()))
                .collect();
            (!items.is_empty()).then(|| HelpSection {
                title: title.to_string(),
                items,
            })
        };

        [
            section("Navigation", |a| {
                matches!(a, KeyAction::NavigateUp | KeyAction::NavigateDown)
            }),
            section("Actions", |a| {
                matches!(
                    a,
                    KeyAction::Select
                        | KeyAction::Confirm
                        | KeyAction::Decline
                        | KeyAction::CancelDownload
                        | KeyAction::Play
                )
            }),
            section("General", |a| {
                matches!(a, KeyAction::Back | KeyAction::Help | KeyAction::Quit)
            }),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_binding_wins_over_global() {
        let ctx = KeybindingContext::new();
        assert_eq!(
            ctx.action_for(&AppMode::MainMenu, KeyCode::Esc, KeyModifiers::NONE),
            Some(KeyAction::CancelDownload)
        );
        assert_eq!(
            ctx.action_for(&AppMode::ModuleScreen, KeyCode::Esc, KeyModifiers::NONE),
            Some(KeyAction::Back)
        );
    }

    #[test]
    fn test_shift_is_ignored() {
        let ctx = KeybindingContext::new();
        assert_eq!(
            ctx.action_for(&AppMode::MainMenu, KeyCode::Char('?'), KeyModifiers::SHIFT),
            Some(KeyAction::Help)
        );
    }

    #[test]
    fn test_ctrl_c_quits_everywhere() {
        let ctx = KeybindingContext::new();
        for mode in [AppMode::MainMenu, AppMode::ConfirmDialog, AppMode::ModuleScreen] {
            assert_eq!(
                ctx.action_for(&mode, KeyCode::Char('c'), KeyModifiers::CONTROL),
                Some(KeyAction::Quit)
            );
        }
        assert_eq!(
            ctx.action_for(&AppMode::MainMenu, KeyCode::Char('c'), KeyModifiers::NONE),
            None
        );
    }

    #[test]
    fn test_nav_items_combine_up_down() {
        let ctx = KeybindingContext::new();
        let items = ctx.get_nav_items(&AppMode::MainMenu);
        assert_eq!(items[0].key_display, "Up/Dn");
        assert_eq!(
            items.iter().filter(|i| i.action_label == "Navigate").count(),
            1
        );
    }

    #[test]
    fn test_help_content_sections() {
        let ctx = KeybindingContext::new();
        let sections = ctx.get_help_content(&AppMode::ConfirmDialog);
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Actions", "General"]);
    }
}
