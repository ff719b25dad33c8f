//! Application state definitions
//!
//! Contains the state rendered by the TUI: current mode, the progress view
//! fed by the acquisition machine, toasts, the pending confirmation and the
//! open module screen.

use crate::acquisition::{RenderSink, UiState};
use crate::config_file::ModuleConfig;
use crate::registry::EntryPoint;
use crate::types::SessionState;
use std::time::{Duration, Instant};

/// How long a toast stays on screen
pub const TOAST_LIFETIME: Duration = Duration::from_secs(4);

/// Application operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AppMode {
    /// Module buttons and the download progress panel
    #[default]
    MainMenu,
    /// A session waits for the user to allow a large download
    ConfirmDialog,
    /// A launched module
    ModuleScreen,
}

impl AppMode {
    pub fn title(&self) -> &'static str {
        match self {
            Self::MainMenu => "Main Menu",
            Self::ConfirmDialog => "Confirmation",
            Self::ModuleScreen => "Module",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// Short message shown at the bottom of the screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub created: Instant,
}

impl Toast {
    pub fn new(message: impl Into<String>, level: ToastLevel) -> Self {
        Self {
            message: message.into(),
            level,
            created: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= TOAST_LIFETIME
    }
}

/// Simulated video playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    pub source: String,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl Playback {
    /// Length of the simulated clip
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);

    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            position_ms: 0,
            duration_ms: Self::DEFAULT_DURATION.as_millis() as u64,
        }
    }

    pub fn advance(&mut self, elapsed: Duration) {
        let elapsed = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.position_ms = self.position_ms.saturating_add(elapsed).min(self.duration_ms);
    }

    pub fn is_finished(&self) -> bool {
        self.position_ms >= self.duration_ms
    }

    pub fn percent(&self) -> u16 {
        if self.duration_ms == 0 {
            return 100;
        }
        (self.position_ms * 100 / self.duration_ms).min(100) as u16
    }
}

/// State of an open module screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleScreenState {
    pub name: String,
    pub title: String,
    pub entry_point: EntryPoint,
    pub description: String,
    pub video: Option<String>,
    pub playback: Option<Playback>,
}

impl ModuleScreenState {
    pub fn new(module: &ModuleConfig, entry_point: EntryPoint) -> Self {
        Self {
            name: module.name.clone(),
            title: module.title.clone(),
            entry_point,
            description: module.description.clone(),
            video: module.video.clone(),
            playback: None,
        }
    }
}

/// Main application state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Current application mode
    pub mode: AppMode,
    /// Progress view driven by the acquisition machine
    pub ui: UiState,
    /// Main menu selection
    pub selection: usize,
    pub toasts: Vec<Toast>,
    /// Whether help overlay is visible
    pub help_visible: bool,
    pub module_screen: Option<ModuleScreenState>,
    /// Confirmation currently shown to the user
    pub confirmation: Option<SessionState>,
    /// Entry point launched by the last completed request, not yet opened
    pub pending_launch: Option<EntryPoint>,
}

impl AppState {
    pub fn push_toast(&mut self, message: impl Into<String>, level: ToastLevel) {
        self.toasts.push(Toast::new(message, level));
    }

    /// Drop toasts older than `TOAST_LIFETIME`
    pub fn expire_toasts(&mut self, now: Instant) {
        self.toasts.retain(|t| !t.is_expired(now));
    }

    /// Move the selection down, wrapping around `len` items
    pub fn select_next(&mut self, len: usize) {
        if len > 0 {
            self.selection = (self.selection + 1) % len;
        }
    }

    pub fn select_prev(&mut self, len: usize) {
        if len > 0 {
            self.selection = (self.selection + len - 1) % len;
        }
    }
}

impl RenderSink for AppState {
    fn on_progress(&mut self, message: &str, current: u64, max: u64) {
        self.ui.on_progress(message, current, max);
    }

    fn on_idle(&mut self) {
        self.ui.on_idle();
    }

    fn on_error(&mut self, message: &str) {
        self.ui.on_error(message);
        self.push_toast(message, ToastLevel::Error);
    }

    fn on_ready_to_launch(&mut self, entry_point: &EntryPoint) {
        self.pending_launch = Some(entry_point.clone());
    }

    fn on_notice(&mut self, message: &str) {
        self.ui.on_notice(message);
        self.push_toast(message, ToastLevel::Info);
    }
}
