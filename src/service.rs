//! Install-session service seam
//!
//! The delivery service is an opaque collaborator: install requests are
//! fire-and-forget and every result arrives as a `SessionState` on a
//! registered listener channel.
//!
//! # Listener lifetime
//!
//! A `Subscription` registers a listener on creation and unregisters it when
//! dropped, so the registration is released on every exit path of the screen
//! that owns it.

use crate::error::Result;
use crate::types::{ModuleSet, SessionId, SessionState};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use tracing::{debug, info};

/// Request code passed along with a forwarded confirmation
pub const CONFIRMATION_REQUEST_CODE: i32 = 101;

/// Handle of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Operations exposed by the platform's module-delivery service
pub trait InstallSessionService {
    /// Request installation of `modules`; progress arrives via listeners
    fn start_install(&self, modules: &ModuleSet) -> Result<SessionId>;

    /// Ask the service to abandon a running session. The session reports
    /// `Canceled` through its listeners.
    fn cancel_install(&self, session_id: SessionId) -> Result<()>;

    fn register_listener(&self, listener: Sender<SessionState>) -> ListenerId;

    fn unregister_listener(&self, id: ListenerId);

    /// Modules currently installed
    fn installed_modules(&self) -> ModuleSet;

    /// Request removal of `modules` at some future time
    fn deferred_uninstall(&self, modules: &ModuleSet) -> UninstallTicket;

    /// Hand a session waiting for user confirmation to the service's own
    /// confirmation flow. The session resumes via later listener events.
    fn start_confirmation_dialog_for_result(
        &self,
        state: &SessionState,
        request_code: i32,
    ) -> Result<()>;
}

impl<T: InstallSessionService + ?Sized> InstallSessionService for &T {
    fn start_install(&self, modules: &ModuleSet) -> Result<SessionId> {
        (**self).start_install(modules)
    }

    fn cancel_install(&self, session_id: SessionId) -> Result<()> {
        (**self).cancel_install(session_id)
    }

    fn register_listener(&self, listener: Sender<SessionState>) -> ListenerId {
        (**self).register_listener(listener)
    }

    fn unregister_listener(&self, id: ListenerId) {
        (**self).unregister_listener(id)
    }

    fn installed_modules(&self) -> ModuleSet {
        (**self).installed_modules()
    }

    fn deferred_uninstall(&self, modules: &ModuleSet) -> UninstallTicket {
        (**self).deferred_uninstall(modules)
    }

    fn start_confirmation_dialog_for_result(
        &self,
        state: &SessionState,
        request_code: i32,
    ) -> Result<()> {
        (**self).start_confirmation_dialog_for_result(state, request_code)
    }
}

impl<T: InstallSessionService + ?Sized> InstallSessionService for Arc<T> {
    fn start_install(&self, modules: &ModuleSet) -> Result<SessionId> {
        (**self).start_install(modules)
    }

    fn cancel_install(&self, session_id: SessionId) -> Result<()> {
        (**self).cancel_install(session_id)
    }

    fn register_listener(&self, listener: Sender<SessionState>) -> ListenerId {
        (**self).register_listener(listener)
    }

    fn unregister_listener(&self, id: ListenerId) {
        (**self).unregister_listener(id)
    }

    fn installed_modules(&self) -> ModuleSet {
        (**self).installed_modules()
    }

    fn deferred_uninstall(&self, modules: &ModuleSet) -> UninstallTicket {
        (**self).deferred_uninstall(modules)
    }

    fn start_confirmation_dialog_for_result(
        &self,
        state: &SessionState,
        request_code: i32,
    ) -> Result<()> {
        (**self).start_confirmation_dialog_for_result(state, request_code)
    }
}

/// Final result of a deferred uninstall request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    Accepted { modules: ModuleSet },
    Rejected { modules: ModuleSet },
}

impl UninstallOutcome {
    pub fn modules(&self) -> &ModuleSet {
        match self {
            Self::Accepted { modules } | Self::Rejected { modules } => modules,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Pending result of a deferred uninstall.
///
/// The service answers once with `true` (accepted) or `false` (rejected).
/// A service that drops its end without answering counts as a rejection.
#[derive(Debug)]
pub struct UninstallTicket {
    modules: ModuleSet,
    result: Receiver<bool>,
}

impl UninstallTicket {
    pub fn new(modules: ModuleSet, result: Receiver<bool>) -> Self {
        Self { modules, result }
    }

    /// A ticket whose answer is already known
    pub fn resolved(modules: ModuleSet, accepted: bool) -> Self {
        let (tx, rx) = mpsc::channel();
        // The receiver is alive, so the send cannot fail
        let _ = tx.send(accepted);
        Self::new(modules, rx)
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    /// Non-blocking poll. Returns the outcome the first time it is known.
    pub fn try_outcome(&self) -> Option<UninstallOutcome> {
        match self.result.try_recv() {
            Ok(accepted) => Some(self.outcome(accepted)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.outcome(false)),
        }
    }

    /// Block until the service answers or `timeout` elapses (counted as rejection)
    pub fn wait(self, timeout: Duration) -> UninstallOutcome {
        match self.result.recv_timeout(timeout) {
            Ok(accepted) => self.outcome(accepted),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => self.outcome(false),
        }
    }

    fn outcome(&self, accepted: bool) -> UninstallOutcome {
        let modules = self.modules.clone();
        if accepted {
            UninstallOutcome::Accepted { modules }
        } else {
            UninstallOutcome::Rejected { modules }
        }
    }
}

/// A registered listener, released when dropped
pub struct Subscription<S: InstallSessionService> {
    service: S,
    id: ListenerId,
    events: Receiver<SessionState>,
}

impl<S: InstallSessionService> Subscription<S> {
    /// Register a new listener on `service`
    pub fn acquire(service: S) -> Self {
        let (tx, events) = mpsc::channel();
        let id = service.register_listener(tx);
        info!("Session listener {:?} registered", id);
        Self {
            service,
            id,
            events,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Next queued event, if any
    pub fn try_next(&self) -> Option<SessionState> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn next_timeout(&self, timeout: Duration) -> Option<SessionState> {
        self.events.recv_timeout(timeout).ok()
    }

    /// All events queued so far, in arrival order
    pub fn drain(&self) -> Vec<SessionState> {
        self.events.try_iter().collect()
    }
}

impl<S: InstallSessionService> Drop for Subscription<S> {
    fn drop(&mut self) {
        self.service.unregister_listener(self.id);
        debug!("Session listener {:?} unregistered", self.id);
    }
}
