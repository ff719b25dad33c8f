//! Application module
//!
//! Contains the TUI application: the event loop, key handling and the glue
//! between the acquisition machine and the simulated delivery service.
//!
//! # Module Structure
//! - `state` - Application state types (AppState, AppMode, Toast, etc.)
//! - Main module - App struct and event loop

mod state;

pub use state::{
    AppMode, AppState, ModuleScreenState, Playback, TOAST_LIFETIME, Toast, ToastLevel,
};

use crate::acquisition::AcquisitionMachine;
use crate::components::keybindings::{KeyAction, KeybindingContext};
use crate::config_file::DeliveryConfig;
use crate::registry::{EntryPoint, ModuleRegistry};
use crate::service::{InstallSessionService, Subscription, UninstallTicket};
use crate::simulator::SimulatedDeliveryService;
use crate::ui::{MenuItem, UiRenderer};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::Backend};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Input poll interval, also the UI refresh rate
const TICK: Duration = Duration::from_millis(50);

/// Main application struct
pub struct App {
    config: DeliveryConfig,
    service: SimulatedDeliveryService,
    machine: AcquisitionMachine,
    state: AppState,
    /// Held only while the main screen is visible
    subscription: Option<Subscription<SimulatedDeliveryService>>,
    uninstall_tickets: Vec<UninstallTicket>,
    keybindings: KeybindingContext,
    renderer: UiRenderer,
    last_tick: Instant,
}

impl App {
    /// Create a new application backed by a simulator built from `config`
    pub fn new(config: DeliveryConfig) -> Self {
        let service = SimulatedDeliveryService::from_config(&config);
        Self::with_service(config, service)
    }

    /// Create a new application using an existing service
    pub fn with_service(config: DeliveryConfig, service: SimulatedDeliveryService) -> Self {
        info!("Creating new App instance for {}", config.application_id);
        let machine = AcquisitionMachine::new(ModuleRegistry::from_config(&config))
            .with_stall_timeout(config.stall_timeout());
        let subscription = Some(Subscription::acquire(service.clone()));

        Self {
            config,
            service,
            machine,
            state: AppState::default(),
            subscription,
            uninstall_tickets: Vec::new(),
            keybindings: KeybindingContext::new(),
            renderer: UiRenderer::new(),
            last_tick: Instant::now(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn machine(&self) -> &AcquisitionMachine {
        &self.machine
    }

    pub fn service(&self) -> &SimulatedDeliveryService {
        &self.service
    }

    pub fn keybinding_context(&self) -> &KeybindingContext {
        &self.keybindings
    }

    /// Whether a session listener is currently registered
    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    /// Buttons of the main screen: one per module, then "Uninstall all modules"
    pub fn menu_items(&self) -> Vec<MenuItem> {
        let installed = self.service.installed_modules();
        let mut items: Vec<MenuItem> = self
            .machine
            .registry()
            .names()
            .map(|name| MenuItem::Module {
                name: name.to_string(),
                title: self
                    .machine
                    .registry()
                    .title(name)
                    .unwrap_or(name)
                    .to_string(),
                installed: installed.contains(name),
                phase: self.machine.phase_of(name),
            })
            .collect();
        items.push(MenuItem::UninstallAll);
        items
    }

    /// Run the main application loop until the user quits
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        info!("Starting main application loop");

        let result = self.event_loop(terminal);
        self.shutdown();
        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            self.tick(Instant::now());

            let items = self.menu_items();
            terminal.draw(|f| {
                self.renderer
                    .render(f, &self.state, &items, &self.keybindings);
            })?;

            if event::poll(TICK)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Release the listener and forget all requests
    pub fn shutdown(&mut self) {
        self.subscription = None;
        self.machine.reset();
        debug!("App shut down");
    }

    /// Process everything that happened since the last tick
    pub fn tick(&mut self, now: Instant) {
        let events = self
            .subscription
            .as_ref()
            .map(Subscription::drain)
            .unwrap_or_default();
        for event in &events {
            self.machine
                .handle_event(event, &self.service, &mut self.state);
        }

        if let Some(entry_point) = self.state.pending_launch.take() {
            self.open_module_screen(&entry_point);
        }

        if self.state.mode == AppMode::MainMenu && self.state.confirmation.is_none() {
            if let Some(pending) = self.service.next_confirmation() {
                info!("Showing confirmation for {}", pending.module_names);
                self.state.confirmation = Some(pending);
                self.state.mode = AppMode::ConfirmDialog;
            }
        }

        self.poll_uninstalls();
        self.machine
            .expire_stalled(now, &self.service, &mut self.state);
        self.drop_stale_confirmation();
        self.state.expire_toasts(now);

        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        if let Some(playback) = self
            .state
            .module_screen
            .as_mut()
            .and_then(|s| s.playback.as_mut())
        {
            playback.advance(elapsed);
        }
    }

    /// Close the confirmation dialog once its request has finished
    fn drop_stale_confirmation(&mut self) {
        let finished = self
            .state
            .confirmation
            .as_ref()
            .is_some_and(|pending| self.machine.phase(&pending.module_names).is_terminal());
        if finished {
            debug!("Dropping confirmation of a finished request");
            self.state.confirmation = None;
            if self.state.mode == AppMode::ConfirmDialog {
                self.state.mode = AppMode::MainMenu;
            }
        }
    }

    fn poll_uninstalls(&mut self) {
        let mut pending = Vec::new();
        for ticket in self.uninstall_tickets.drain(..) {
            match ticket.try_outcome() {
                Some(outcome) => {
                    // Errors are already reported through the render sink
                    let _ = self.machine.finish_uninstall(outcome, &mut self.state);
                }
                None => pending.push(ticket),
            }
        }
        self.uninstall_tickets = pending;
    }

    /// Handle a key press. Returns true when the application should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let action = self
            .keybindings
            .action_for(&self.state.mode, key.code, key.modifiers);

        if self.state.help_visible {
            // Help swallows every key except quit
            match action {
                Some(KeyAction::Quit) => return true,
                Some(
                    KeyAction::Help
                    | KeyAction::Back
                    | KeyAction::CancelDownload
                    | KeyAction::Decline,
                ) => {
                    self.state.help_visible = false;
                }
                _ => {}
            }
            return false;
        }

        match action {
            Some(action) => self.handle_action(action),
            None => false,
        }
    }

    /// Apply a resolved action. Returns true when the application should exit.
    pub fn handle_action(&mut self, action: KeyAction) -> bool {
        debug!("Action {:?} in {:?}", action, self.state.mode);
        match action {
            KeyAction::Quit => return true,
            KeyAction::Help => self.state.help_visible = !self.state.help_visible,
            KeyAction::NavigateUp => {
                let len = self.menu_items().len();
                self.state.select_prev(len);
            }
            KeyAction::NavigateDown => {
                let len = self.menu_items().len();
                self.state.select_next(len);
            }
            KeyAction::Select => self.activate_selection(),
            KeyAction::Confirm => self.answer_confirmation(true),
            KeyAction::Decline => self.answer_confirmation(false),
            KeyAction::CancelDownload => self.cancel_downloads(),
            KeyAction::Play => self.play_video(),
            KeyAction::Back => self.close_module_screen(),
        }
        false
    }

    fn activate_selection(&mut self) {
        let items = self.menu_items();
        let Some(item) = items.get(self.state.selection) else {
            return;
        };

        match item {
            MenuItem::Module { name, .. } => {
                // Failures are reported through the render sink
                if let Err(err) = self
                    .machine
                    .request_install(name, &self.service, &mut self.state)
                {
                    debug!("Install request for {} not started: {}", name, err);
                }
            }
            MenuItem::UninstallAll => {
                match self
                    .machine
                    .request_uninstall_all(&self.service, &mut self.state)
                {
                    Ok(ticket) => self.uninstall_tickets.push(ticket),
                    Err(err) => debug!("Uninstall not requested: {}", err),
                }
            }
        }
    }

    fn answer_confirmation(&mut self, accepted: bool) {
        let Some(pending) = self.state.confirmation.take() else {
            return;
        };
        self.state.mode = AppMode::MainMenu;
        if let Err(err) = self
            .service
            .answer_confirmation(pending.session_id, accepted)
        {
            warn!("Could not answer confirmation: {}", err);
            self.state.push_toast(err.to_string(), ToastLevel::Error);
        }
    }

    fn cancel_downloads(&mut self) {
        let sessions: Vec<_> = self
            .machine
            .active()
            .filter_map(|a| a.session_id())
            .collect();
        if sessions.is_empty() {
            self.state.push_toast("No download in progress", ToastLevel::Info);
            return;
        }
        for session_id in sessions {
            if let Err(err) = self.service.cancel_install(session_id) {
                warn!("Could not cancel session {}: {}", session_id, err);
            }
        }
    }

    fn open_module_screen(&mut self, entry_point: &EntryPoint) {
        let module = self
            .machine
            .registry()
            .module_for(entry_point)
            .and_then(|name| self.config.module(name));
        let Some(module) = module else {
            warn!("No module registered for {}", entry_point);
            return;
        };

        info!("Opening {} ({})", module.name, entry_point);
        self.state.module_screen = Some(ModuleScreenState::new(module, entry_point.clone()));
        self.state.mode = AppMode::ModuleScreen;
        self.state
            .push_toast(format!("Launching {}", module.title), ToastLevel::Success);
        // The main screen is hidden: stop listening
        self.subscription = None;
    }

    fn close_module_screen(&mut self) {
        if self.state.mode != AppMode::ModuleScreen {
            return;
        }
        self.state.module_screen = None;
        self.state.mode = AppMode::MainMenu;
        self.subscription = Some(Subscription::acquire(self.service.clone()));
    }

    fn play_video(&mut self) {
        let Some(screen) = self.state.module_screen.as_mut() else {
            return;
        };
        let message = match screen.video.clone() {
            Some(video) => {
                info!("Playing {} from {}", video, screen.name);
                screen.playback = Some(Playback::new(video));
                "Play Video Clicked".to_string()
            }
            None => format!("{} has no video", screen.title),
        };
        self.state.push_toast(message, ToastLevel::Info);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Covers early returns and panics in the event loop
        self.subscription = None;
    }
}
