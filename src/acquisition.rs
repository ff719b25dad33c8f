//! Module Acquisition State Machine
//!
//! Translates install-session events into UI state and side effects. Every
//! request is keyed by its module set so concurrent requests for different
//! modules never update each other's state.
//!
//! # Phase Flow
//!
//! ```text
//! Idle ──(already installed)──────────────────────────┐
//!   ↓ request_install                                  │
//! Pending                                              │
//!   ↓                                                  │
//! Downloading ⇄ AwaitingConfirmation                   │
//!   ↓                                                  ↓
//! Installing ──────────────────────────────────────→ Installed
//!
//! (Any non-terminal phase can move to Failed or Canceled)
//! ```
//!
//! Terminal phases are `Installed`, `Failed` and `Canceled`. A new request
//! for the same modules discards the terminal record and starts from `Idle`.
//!
//! Events are processed one at a time on the caller's thread: each call to
//! `handle_event` produces all of its side effects before returning.
//!
//! The render sink has a single progress panel. When a request ends while
//! others are still active, the panel switches to the most recently updated
//! active request instead of going idle.

use crate::error::{DeliveryError, Result};
use crate::registry::{EntryPoint, ModuleRegistry};
use crate::service::{
    CONFIRMATION_REQUEST_CODE, InstallSessionService, UninstallOutcome, UninstallTicket,
};
use crate::types::{
    ModuleRequest, ModuleSet, SessionEvent, SessionId, SessionState, error_code,
};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Download progress as a whole percentage.
///
/// Returns `floor(bytes * 100 / total)`. An unknown total (`0`) yields 0%.
/// Values past the total are capped at 100%.
pub fn percentage(bytes: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = u128::from(bytes) * 100 / u128::from(total);
    pct.min(100) as u8
}

/// Render callbacks driven by the state machine
pub trait RenderSink {
    /// Show the progress view with `message` and `current` of `max`
    fn on_progress(&mut self, message: &str, current: u64, max: u64);
    /// Return to the module buttons
    fn on_idle(&mut self);
    fn on_error(&mut self, message: &str);
    /// A single requested module is installed and should be opened
    fn on_ready_to_launch(&mut self, entry_point: &EntryPoint);
    /// Short informational message (cancellation, uninstall, multi-install ready)
    fn on_notice(&mut self, message: &str);
}

/// Phase of one acquisition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Pending,
    Downloading,
    AwaitingConfirmation,
    Installing,
    Installed,
    Failed { error_code: i32 },
    Canceled,
}

impl Phase {
    /// Returns true for Installed, Failed and Canceled
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Installed | Self::Failed { .. } | Self::Canceled)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Pending => "Pending",
            Self::Downloading => "Downloading",
            Self::AwaitingConfirmation => "Awaiting confirmation",
            Self::Installing => "Installing",
            Self::Installed => "Installed",
            Self::Failed { .. } => "Failed",
            Self::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { error_code } => write!(f, "Failed ({error_code})"),
            _ => f.write_str(self.description()),
        }
    }
}

/// Which part of the main screen is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewPhase {
    #[default]
    Buttons,
    Progress,
}

/// UI-facing state derived from session events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub view: ViewPhase,
    pub message: String,
    pub progress_current: u64,
    pub progress_max: u64,
}

impl UiState {
    pub fn percent(&self) -> u8 {
        percentage(self.progress_current, self.progress_max)
    }
}

impl RenderSink for UiState {
    fn on_progress(&mut self, message: &str, current: u64, max: u64) {
        self.view = ViewPhase::Progress;
        self.message = message.to_string();
        self.progress_current = current;
        self.progress_max = max;
    }

    fn on_idle(&mut self) {
        self.view = ViewPhase::Buttons;
    }

    fn on_error(&mut self, message: &str) {
        self.message = message.to_string();
    }

    fn on_ready_to_launch(&mut self, _entry_point: &EntryPoint) {}

    fn on_notice(&mut self, message: &str) {
        self.message = message.to_string();
    }
}

/// Tracking record of one request
#[derive(Debug, Clone)]
pub struct Acquisition {
    request: ModuleRequest,
    phase: Phase,
    session_id: Option<SessionId>,
    last_event_at: Instant,
    bytes_downloaded: u64,
    total_bytes: u64,
    /// Last progress rendered for this request
    shown: Option<(String, u64, u64)>,
}

impl Acquisition {
    fn new(modules: ModuleSet, phase: Phase) -> Self {
        Self {
            request: ModuleRequest::new(modules),
            phase,
            session_id: None,
            last_event_at: Instant::now(),
            bytes_downloaded: 0,
            total_bytes: 0,
            shown: None,
        }
    }

    fn show<R>(&mut self, sink: &mut R, message: String, current: u64, max: u64)
    where
        R: RenderSink + ?Sized,
    {
        sink.on_progress(&message, current, max);
        self.shown = Some((message, current, max));
    }

    pub fn request(&self) -> &ModuleRequest {
        &self.request
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.request.modules
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Session assigned by the service, once the install was started
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn percent(&self) -> u8 {
        percentage(self.bytes_downloaded, self.total_bytes)
    }
}

/// Drives acquisition requests from session events
#[derive(Debug, Clone)]
pub struct AcquisitionMachine {
    registry: ModuleRegistry,
    requests: BTreeMap<ModuleSet, Acquisition>,
    stall_timeout: Option<Duration>,
}

impl AcquisitionMachine {
    /// Create a machine with no stall timeout
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry,
            requests: BTreeMap::new(),
            stall_timeout: None,
        }
    }

    /// Fail requests that see no event for `timeout` (None disables)
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Phase of the request for `modules` (`Idle` when none was made)
    pub fn phase(&self, modules: &ModuleSet) -> Phase {
        self.requests
            .get(modules)
            .map_or(Phase::Idle, Acquisition::phase)
    }

    /// Phase of the single-module request for `name`
    pub fn phase_of(&self, name: &str) -> Phase {
        self.phase(&ModuleSet::single(name))
    }

    pub fn acquisition(&self, modules: &ModuleSet) -> Option<&Acquisition> {
        self.requests.get(modules)
    }

    /// Requests that have not reached a terminal phase
    pub fn active(&self) -> impl Iterator<Item = &Acquisition> {
        self.requests.values().filter(|a| !a.phase.is_terminal())
    }

    pub fn has_active(&self) -> bool {
        self.active().next().is_some()
    }

    /// Forget every request (UI teardown)
    pub fn reset(&mut self) {
        self.requests.clear();
    }

    /// Request installation of a single module
    pub fn request_install<S, R>(&mut self, name: &str, service: &S, sink: &mut R) -> Result<Phase>
    where
        S: InstallSessionService + ?Sized,
        R: RenderSink + ?Sized,
    {
        self.request_install_many(ModuleSet::single(name), service, sink)
    }

    /// Request installation of one or more modules as a single session.
    ///
    /// # Errors
    ///
    /// - `EmptyRequest` if `modules` is empty
    /// - `ModuleNotInRegistry` if any name is unregistered (the service is not contacted)
    /// - Whatever `start_install` reports; the request is then `Failed`
    pub fn request_install_many<S, R>(
        &mut self,
        modules: ModuleSet,
        service: &S,
        sink: &mut R,
    ) -> Result<Phase>
    where
        S: InstallSessionService + ?Sized,
        R: RenderSink + ?Sized,
    {
        if modules.is_empty() {
            sink.on_error(&DeliveryError::EmptyRequest.to_string());
            return Err(DeliveryError::EmptyRequest);
        }

        if let Some(missing) = modules.iter().find(|m| !self.registry.contains(m)) {
            let err = DeliveryError::ModuleNotInRegistry {
                name: missing.to_string(),
            };
            warn!("Rejecting install request: {}", err);
            sink.on_error(&err.to_string());
            return Err(err);
        }

        if let Some(existing) = self.requests.get(&modules) {
            if !existing.phase.is_terminal() {
                debug!(
                    "Install of {} already in progress ({})",
                    modules, existing.phase
                );
                return Ok(existing.phase);
            }
        }
        // Any terminal record is discarded: the request restarts from Idle
        self.requests.remove(&modules);

        sink.on_progress(&format!("Loading module {modules}"), 0, 0);

        let installed = service.installed_modules();
        if modules.is_subset(&installed) {
            info!("{} already installed", modules);
            self.requests
                .insert(modules.clone(), Acquisition::new(modules.clone(), Phase::Installed));
            self.complete(&modules, sink);
            return Ok(Phase::Installed);
        }

        match service.start_install(&modules) {
            Ok(session_id) => {
                let mut acquisition = Acquisition::new(modules.clone(), Phase::Pending);
                acquisition.session_id = Some(session_id);
                info!("Install of {} started as session {}", modules, session_id);
                acquisition.show(sink, format!("Starting install for {modules}"), 0, 0);
                self.requests.insert(modules, acquisition);
                Ok(Phase::Pending)
            }
            Err(err) => {
                let code = err.error_code().unwrap_or(error_code::INTERNAL_ERROR);
                warn!(
                    "Install of {} could not start: {} ({})",
                    modules,
                    err,
                    error_code::describe(code)
                );
                self.requests.insert(
                    modules.clone(),
                    Acquisition::new(modules, Phase::Failed { error_code: code }),
                );
                sink.on_error(&err.to_string());
                self.show_remaining(sink);
                Err(err)
            }
        }
    }

    /// Apply one session event and return the resulting phase of its request.
    ///
    /// Events for unknown requests, for older sessions of the same modules,
    /// or for requests already in a terminal phase are ignored.
    pub fn handle_event<S, R>(&mut self, state: &SessionState, service: &S, sink: &mut R) -> Phase
    where
        S: InstallSessionService + ?Sized,
        R: RenderSink + ?Sized,
    {
        let modules = &state.module_names;
        let Some(acquisition) = self.requests.get_mut(modules) else {
            debug!(
                "Ignoring {} for untracked request {}",
                state.status, modules
            );
            return Phase::Idle;
        };

        if acquisition.phase.is_terminal() {
            debug!(
                "Ignoring {} for finished request {} ({})",
                state.status, modules, acquisition.phase
            );
            return acquisition.phase;
        }
        if let Some(expected) = acquisition.session_id {
            if expected != state.session_id {
                debug!(
                    "Ignoring session {} event, request {} belongs to session {}",
                    state.session_id, modules, expected
                );
                return acquisition.phase;
            }
        }

        acquisition.session_id = Some(state.session_id);
        acquisition.last_event_at = Instant::now();
        acquisition.bytes_downloaded = state.bytes_downloaded;
        acquisition.total_bytes = state.total_bytes_to_download;

        let event = SessionEvent::from(state);
        debug!("Session {} event {:?}", state.session_id, event);

        match event {
            SessionEvent::Pending { total } => {
                acquisition.phase = Phase::Pending;
                acquisition.show(sink, format!("Pending {modules}"), 0, total);
            }
            SessionEvent::Downloading { bytes, total } => {
                acquisition.phase = Phase::Downloading;
                let pct = percentage(bytes, total);
                acquisition.show(
                    sink,
                    format!("Downloading {modules}\n{bytes} of {total} bytes ({pct}%)"),
                    bytes,
                    total,
                );
            }
            SessionEvent::RequiresUserConfirmation => {
                acquisition.phase = Phase::AwaitingConfirmation;
                info!("{} requires user confirmation", modules);
                if let Err(err) =
                    service.start_confirmation_dialog_for_result(state, CONFIRMATION_REQUEST_CODE)
                {
                    warn!("Could not forward confirmation for {}: {}", modules, err);
                    sink.on_error(&err.to_string());
                }
            }
            SessionEvent::Installing { bytes, total } => {
                acquisition.phase = Phase::Installing;
                acquisition.show(sink, format!("Installing {modules}"), bytes, total);
            }
            SessionEvent::Installed => {
                acquisition.phase = Phase::Installed;
                info!("{} installed", modules);
                let modules = modules.clone();
                self.complete(&modules, sink);
                return Phase::Installed;
            }
            SessionEvent::Failed { error_code } => {
                acquisition.phase = Phase::Failed { error_code };
                let err = DeliveryError::InstallFailed {
                    error_code,
                    modules: modules.clone(),
                };
                warn!("{} ({})", err, error_code::describe(error_code));
                sink.on_error(&err.to_string());
                self.show_remaining(sink);
                return Phase::Failed { error_code };
            }
            SessionEvent::Canceled => {
                acquisition.phase = Phase::Canceled;
                let err = DeliveryError::InstallCanceled {
                    modules: modules.clone(),
                };
                info!("{}", err);
                sink.on_notice(&err.to_string());
                self.show_remaining(sink);
                return Phase::Canceled;
            }
        }

        acquisition.phase
    }

    /// Success side effects: launch single-module requests, then update the panel
    fn complete<R: RenderSink + ?Sized>(&self, modules: &ModuleSet, sink: &mut R) {
        match modules.single_name() {
            Some(name) => match self.registry.resolve(name) {
                Ok(entry_point) => {
                    info!("Launching {} via {}", name, entry_point);
                    sink.on_ready_to_launch(entry_point);
                }
                Err(err) => {
                    warn!("{}", err);
                    sink.on_error(&err.to_string());
                }
            },
            None => sink.on_notice(&format!("{modules} ready")),
        }
        self.show_remaining(sink);
    }

    /// Show the buttons, or the progress of the most recently updated active
    /// request when one remains
    fn show_remaining<R: RenderSink + ?Sized>(&self, sink: &mut R) {
        let latest = self
            .active()
            .filter_map(|a| a.shown.as_ref().map(|shown| (a.last_event_at, shown)))
            .max_by_key(|(at, _)| *at);
        match latest {
            Some((_, (message, current, max))) => sink.on_progress(message, *current, *max),
            None => sink.on_idle(),
        }
    }

    /// Fail every active request that has seen no event for longer than the
    /// stall timeout and cancel its session. Returns the errors reported.
    ///
    /// Requests awaiting user confirmation never stall: they wait for the
    /// user, not the service.
    pub fn expire_stalled<S, R>(
        &mut self,
        now: Instant,
        service: &S,
        sink: &mut R,
    ) -> Vec<DeliveryError>
    where
        S: InstallSessionService + ?Sized,
        R: RenderSink + ?Sized,
    {
        let Some(timeout) = self.stall_timeout else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        for acquisition in self.requests.values_mut() {
            if acquisition.phase.is_terminal()
                || acquisition.phase == Phase::AwaitingConfirmation
            {
                continue;
            }
            let waited = now.saturating_duration_since(acquisition.last_event_at);
            if waited <= timeout {
                continue;
            }

            acquisition.phase = Phase::Failed {
                error_code: error_code::INTERNAL_ERROR,
            };
            if let Some(session_id) = acquisition.session_id {
                // Later events are ignored either way
                if let Err(err) = service.cancel_install(session_id) {
                    debug!("Stalled session {} not canceled: {}", session_id, err);
                }
            }
            let err = DeliveryError::SessionStalled {
                modules: acquisition.modules().clone(),
                waited_secs: waited.as_secs(),
            };
            warn!("{}", err);
            sink.on_error(&err.to_string());
            expired.push(err);
        }

        if !expired.is_empty() {
            self.show_remaining(sink);
        }
        expired
    }

    /// Request a deferred uninstall of `modules`.
    ///
    /// # Errors
    ///
    /// - `NothingToUninstall` if `modules` is empty (the service is not contacted)
    pub fn request_uninstall<S, R>(
        &self,
        modules: ModuleSet,
        service: &S,
        sink: &mut R,
    ) -> Result<UninstallTicket>
    where
        S: InstallSessionService + ?Sized,
        R: RenderSink + ?Sized,
    {
        if modules.is_empty() {
            let err = DeliveryError::NothingToUninstall;
            info!("{}", err);
            sink.on_notice(&err.to_string());
            return Err(err);
        }

        sink.on_notice(&format!(
            "Requesting uninstall of {modules}.\nThis will happen at some point in the future."
        ));
        info!("Requesting deferred uninstall of {}", modules);
        Ok(service.deferred_uninstall(&modules))
    }

    /// Request a deferred uninstall of every installed module
    pub fn request_uninstall_all<S, R>(&self, service: &S, sink: &mut R) -> Result<UninstallTicket>
    where
        S: InstallSessionService + ?Sized,
        R: RenderSink + ?Sized,
    {
        self.request_uninstall(service.installed_modules(), service, sink)
    }

    /// Report the outcome of a deferred uninstall.
    ///
    /// # Errors
    ///
    /// - `UninstallRejected` when the service refused the request
    pub fn finish_uninstall<R: RenderSink + ?Sized>(
        &self,
        outcome: UninstallOutcome,
        sink: &mut R,
    ) -> Result<ModuleSet> {
        match outcome {
            UninstallOutcome::Accepted { modules } => {
                info!("Uninstall of {} accepted", modules);
                sink.on_notice(&format!("Uninstalling {modules}"));
                Ok(modules)
            }
            UninstallOutcome::Rejected { modules } => {
                let err = DeliveryError::UninstallRejected { modules };
                warn!("{}", err);
                sink.on_error(&err.to_string());
                Err(err)
            }
        }
    }
}
