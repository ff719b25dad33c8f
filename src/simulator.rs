//! Simulated delivery service
//!
//! Implements `InstallSessionService` in-process so the acquisition state
//! machine can be driven end to end without a platform store. Each install
//! session runs on its own worker thread and broadcasts `SessionState`
//! snapshots to every registered listener.
//!
//! # Session flow
//!
//! ```text
//! Pending
//!     ↓
//! RequiresUserConfirmation   (only above the confirmation threshold)
//!     ↓
//! Downloading × n            (chunk_bytes per tick)
//!     ↓
//! Installing
//!     ↓
//! Installed
//!
//! (Failed after the first chunk for modules listed in fail_modules,
//!  Canceled when a confirmation is declined or the session is canceled)
//! ```
//!
//! Confirmations are queued first-in first-out, so a UI only ever shows one
//! confirmation at a time even when several sessions wait for one.

use crate::config_file::{DeliveryConfig, SimulationConfig};
use crate::error::{DeliveryError, Result};
use crate::service::{InstallSessionService, ListenerId, UninstallTicket};
use crate::types::{ModuleSet, SessionId, SessionState, SessionStatus, error_code};
use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, info, warn};

/// Commands sent from the service handle to a session worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionControl {
    Confirm(bool),
    Cancel,
}

#[derive(Debug)]
struct ActiveSession {
    modules: ModuleSet,
    control: Sender<SessionControl>,
}

#[derive(Debug, Default)]
struct SimState {
    /// Module name -> download size
    catalog: BTreeMap<String, u64>,
    installed: ModuleSet,
    listeners: BTreeMap<ListenerId, Sender<SessionState>>,
    next_listener: u64,
    next_session: SessionId,
    sessions: BTreeMap<SessionId, ActiveSession>,
    confirmations: VecDeque<(SessionState, i32)>,
    install_calls: Vec<ModuleSet>,
    uninstall_calls: Vec<ModuleSet>,
}

/// In-process delivery service. Clones share the same state.
#[derive(Debug, Clone)]
pub struct SimulatedDeliveryService {
    state: Arc<Mutex<SimState>>,
    settings: Arc<SimulationConfig>,
}

impl SimulatedDeliveryService {
    /// Create a service offering `catalog` (name, size in bytes)
    pub fn new<I, N>(catalog: I, settings: SimulationConfig) -> Self
    where
        I: IntoIterator<Item = (N, u64)>,
        N: Into<String>,
    {
        let catalog: BTreeMap<String, u64> =
            catalog.into_iter().map(|(n, size)| (n.into(), size)).collect();
        let installed = settings
            .preinstalled
            .iter()
            .filter(|name| catalog.contains_key(name.as_str()))
            .cloned()
            .collect();

        Self {
            state: Arc::new(Mutex::new(SimState {
                catalog,
                installed,
                next_session: 1,
                ..SimState::default()
            })),
            settings: Arc::new(settings),
        }
    }

    /// Create a service offering every module of the configuration
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(
            config.modules.iter().map(|m| (m.name.clone(), m.size_bytes)),
            config.simulation.clone(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // Session workers never panic while holding the lock; recover the data if one did
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Oldest confirmation forwarded to the service and not yet answered
    pub fn next_confirmation(&self) -> Option<SessionState> {
        self.lock().confirmations.front().map(|(state, _)| state.clone())
    }

    /// Answer a forwarded confirmation. Declining cancels the session.
    ///
    /// # Errors
    ///
    /// - `Service` if no confirmation is pending for `session_id`
    pub fn answer_confirmation(&self, session_id: SessionId, accepted: bool) -> Result<()> {
        let mut state = self.lock();
        let position = state
            .confirmations
            .iter()
            .position(|(s, _)| s.session_id == session_id)
            .ok_or_else(|| {
                DeliveryError::service(format!("no confirmation pending for session {session_id}"))
            })?;
        state.confirmations.remove(position);

        info!(
            "Session {} confirmation {}",
            session_id,
            if accepted { "accepted" } else { "declined" }
        );
        if let Some(session) = state.sessions.get(&session_id) {
            // A finished worker has dropped its receiver; nothing left to resume
            let _ = session.control.send(SessionControl::Confirm(accepted));
        }
        Ok(())
    }

    /// Every module set passed to `start_install`, in call order
    pub fn install_calls(&self) -> Vec<ModuleSet> {
        self.lock().install_calls.clone()
    }

    /// Every module set passed to `deferred_uninstall`, in call order
    pub fn uninstall_calls(&self) -> Vec<ModuleSet> {
        self.lock().uninstall_calls.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn active_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Send `snapshot` to every listener, dropping listeners whose receiver is gone
    fn emit(&self, snapshot: SessionState) {
        debug!(
            "Session {} -> {} ({}/{})",
            snapshot.session_id,
            snapshot.status,
            snapshot.bytes_downloaded,
            snapshot.total_bytes_to_download
        );
        let mut state = self.lock();
        state
            .listeners
            .retain(|_, listener| listener.send(snapshot.clone()).is_ok());
    }

    fn finish_session(&self, session_id: SessionId) {
        let mut state = self.lock();
        state.sessions.remove(&session_id);
        state.confirmations.retain(|(s, _)| s.session_id != session_id);
    }

    /// Worker body of one install session
    fn run_session(
        &self,
        session_id: SessionId,
        modules: ModuleSet,
        total: u64,
        fail_code: Option<i32>,
        control: Receiver<SessionControl>,
    ) {
        let tick = self.settings.tick();
        let snapshot = |status: SessionStatus, bytes: u64| {
            SessionState::new(session_id, modules.clone(), status).with_progress(bytes, total)
        };

        self.emit(snapshot(SessionStatus::Pending, 0));
        thread::sleep(tick);

        if self.settings.requires_confirmation(total) {
            self.emit(snapshot(SessionStatus::RequiresUserConfirmation, 0));
            match control.recv() {
                Ok(SessionControl::Confirm(true)) => {}
                Ok(SessionControl::Confirm(false) | SessionControl::Cancel) | Err(_) => {
                    self.emit(snapshot(SessionStatus::Canceled, 0));
                    self.finish_session(session_id);
                    return;
                }
            }
        }

        let chunk = self.settings.chunk_bytes.max(1);
        let mut bytes = 0u64;
        while bytes < total {
            if let Ok(SessionControl::Cancel) = control.try_recv() {
                self.emit(snapshot(SessionStatus::Canceled, bytes));
                self.finish_session(session_id);
                return;
            }

            bytes = bytes.saturating_add(chunk).min(total);
            self.emit(snapshot(SessionStatus::Downloading, bytes));

            if let Some(code) = fail_code {
                warn!("Session {} failing with error code {}", session_id, code);
                self.emit(snapshot(SessionStatus::Failed, bytes).with_error_code(code));
                self.finish_session(session_id);
                return;
            }
            thread::sleep(tick);
        }

        if let Some(code) = fail_code {
            // Empty downloads fail before installing
            self.emit(snapshot(SessionStatus::Failed, bytes).with_error_code(code));
            self.finish_session(session_id);
            return;
        }

        self.emit(snapshot(SessionStatus::Installing, total));
        thread::sleep(tick);

        {
            let mut state = self.lock();
            state.installed.extend(modules.iter());
            state.sessions.remove(&session_id);
        }
        info!("Session {} installed {}", session_id, modules);
        self.emit(snapshot(SessionStatus::Installed, total));
    }
}

impl InstallSessionService for SimulatedDeliveryService {
    fn start_install(&self, modules: &ModuleSet) -> Result<SessionId> {
        let (session_id, total, fail_code, control_rx) = {
            let mut state = self.lock();
            state.install_calls.push(modules.clone());

            if modules.is_empty() {
                return Err(DeliveryError::InstallFailed {
                    error_code: error_code::INVALID_REQUEST,
                    modules: modules.clone(),
                });
            }
            if let Some(missing) = modules.iter().find(|m| !state.catalog.contains_key(*m)) {
                warn!("Module {} is not offered by the service", missing);
                return Err(DeliveryError::InstallFailed {
                    error_code: error_code::MODULE_UNAVAILABLE,
                    modules: modules.clone(),
                });
            }
            if state.sessions.values().any(|s| s.modules.overlaps(modules)) {
                return Err(DeliveryError::InstallFailed {
                    error_code: error_code::INCOMPATIBLE_WITH_EXISTING_SESSION,
                    modules: modules.clone(),
                });
            }

            // Only the modules not yet installed are downloaded
            let total = modules
                .iter()
                .filter(|m| !state.installed.contains(m))
                .filter_map(|m| state.catalog.get(m))
                .sum::<u64>();
            let fail_code = modules
                .iter()
                .find_map(|m| self.settings.fail_modules.get(m).copied());

            let session_id = state.next_session;
            state.next_session = state.next_session.wrapping_add(1);
            let (control_tx, control_rx) = mpsc::channel();
            state.sessions.insert(
                session_id,
                ActiveSession {
                    modules: modules.clone(),
                    control: control_tx,
                },
            );
            (session_id, total, fail_code, control_rx)
        };

        info!(
            "Session {} started for {} ({} bytes)",
            session_id, modules, total
        );
        let service = self.clone();
        let modules = modules.clone();
        thread::spawn(move || {
            service.run_session(session_id, modules, total, fail_code, control_rx)
        });

        Ok(session_id)
    }

    fn register_listener(&self, listener: Sender<SessionState>) -> ListenerId {
        let mut state = self.lock();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.insert(id, listener);
        id
    }

    fn unregister_listener(&self, id: ListenerId) {
        self.lock().listeners.remove(&id);
    }

    fn installed_modules(&self) -> ModuleSet {
        self.lock().installed.clone()
    }

    fn deferred_uninstall(&self, modules: &ModuleSet) -> UninstallTicket {
        let (tx, rx) = mpsc::channel();
        let accepted = {
            let mut state = self.lock();
            state.uninstall_calls.push(modules.clone());
            !modules.is_empty() && modules.is_subset(&state.installed)
        };

        info!(
            "Deferred uninstall of {} {}",
            modules,
            if accepted { "accepted" } else { "rejected" }
        );

        let service = self.clone();
        let to_remove = modules.clone();
        let delay = self.settings.uninstall_delay();
        thread::spawn(move || {
            // The requester may have stopped waiting
            let _ = tx.send(accepted);
            if accepted {
                thread::sleep(delay);
                let mut state = service.lock();
                for name in to_remove.iter() {
                    state.installed.remove(name);
                }
                debug!("Uninstalled {}", to_remove);
            }
        });

        UninstallTicket::new(modules.clone(), rx)
    }

    /// Cancel a running session
    ///
    /// # Errors
    ///
    /// - `Service` if the session is unknown or already finished
    fn cancel_install(&self, session_id: SessionId) -> Result<()> {
        let mut state = self.lock();
        state.confirmations.retain(|(s, _)| s.session_id != session_id);
        let session = state
            .sessions
            .get(&session_id)
            .ok_or_else(|| DeliveryError::service(format!("session {session_id} not found")))?;
        session
            .control
            .send(SessionControl::Cancel)
            .map_err(|_| DeliveryError::service(format!("session {session_id} already finished")))?;
        info!("Cancel requested for session {}", session_id);
        Ok(())
    }

    fn start_confirmation_dialog_for_result(
        &self,
        state: &SessionState,
        request_code: i32,
    ) -> Result<()> {
        let mut sim = self.lock();
        if !sim.sessions.contains_key(&state.session_id) {
            return Err(DeliveryError::service(format!(
                "session {} not found",
                state.session_id
            )));
        }
        if !sim
            .confirmations
            .iter()
            .any(|(s, _)| s.session_id == state.session_id)
        {
            sim.confirmations.push_back((state.clone(), request_code));
        }
        debug!(
            "Confirmation for session {} queued (request code {})",
            state.session_id, request_code
        );
        Ok(())
    }
}
