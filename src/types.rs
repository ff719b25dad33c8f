//! Core data types shared by the registry, the install-session service and
//! the acquisition state machine.
//!
//! Session snapshots are produced by the delivery service and consumed
//! read-only. `SessionEvent` is the tagged form the state machine matches on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;
use strum::{Display, EnumIter, EnumString};

/// Identifier assigned by the delivery service to one install session
pub type SessionId = u32;

/// Ordered set of module names targeted by one request.
///
/// Ordering is lexical so the same modules always produce the same key,
/// whatever order the caller listed them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleSet(BTreeSet<String>);

impl ModuleSet {
    /// Create an empty module set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding exactly one module
    pub fn single(name: impl Into<String>) -> Self {
        let mut set = Self::new();
        set.insert(name);
        set
    }

    /// Add a module; returns false if it was already present
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    /// Remove a module; returns false if it was not present
    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the request targets more than one module
    pub fn is_multi(&self) -> bool {
        self.0.len() > 1
    }

    /// The module name when the set holds exactly one module
    pub fn single_name(&self) -> Option<&str> {
        if self.0.len() == 1 {
            self.0.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    /// True when every module of `self` is also in `other`
    pub fn is_subset(&self, other: &ModuleSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// True when the two sets share at least one module
    pub fn overlaps(&self, other: &ModuleSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ModuleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for ModuleSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl fmt::Display for ModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for name in &self.0 {
            if !first {
                f.write_str(" - ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// A user's request to acquire one or more modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    pub modules: ModuleSet,
    pub requested_at: SystemTime,
}

impl ModuleRequest {
    pub fn new(modules: ModuleSet) -> Self {
        Self {
            modules,
            requested_at: SystemTime::now(),
        }
    }
}

/// Status reported by the delivery service for an install session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Downloading,
    RequiresUserConfirmation,
    Installing,
    Installed,
    Failed,
    Canceled,
}

impl SessionStatus {
    /// Installed, Failed and Canceled end a session
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Installed | Self::Failed | Self::Canceled)
    }
}

/// Immutable snapshot of one install session, delivered once per event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub module_names: ModuleSet,
    pub status: SessionStatus,
    pub bytes_downloaded: u64,
    pub total_bytes_to_download: u64,
    pub error_code: Option<i32>,
}

impl SessionState {
    pub fn new(session_id: SessionId, module_names: ModuleSet, status: SessionStatus) -> Self {
        Self {
            session_id,
            module_names,
            status,
            bytes_downloaded: 0,
            total_bytes_to_download: 0,
            error_code: None,
        }
    }

    pub fn with_progress(mut self, bytes_downloaded: u64, total_bytes_to_download: u64) -> Self {
        self.bytes_downloaded = bytes_downloaded;
        self.total_bytes_to_download = total_bytes_to_download;
        self
    }

    pub fn with_error_code(mut self, error_code: i32) -> Self {
        self.error_code = Some(error_code);
        self
    }
}

/// Tagged view of a session snapshot carrying exactly the data each status needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Pending { total: u64 },
    Downloading { bytes: u64, total: u64 },
    RequiresUserConfirmation,
    Installing { bytes: u64, total: u64 },
    Installed,
    Failed { error_code: i32 },
    Canceled,
}

impl From<&SessionState> for SessionEvent {
    fn from(state: &SessionState) -> Self {
        let bytes = state.bytes_downloaded;
        let total = state.total_bytes_to_download;
        match state.status {
            SessionStatus::Pending => Self::Pending { total },
            SessionStatus::Downloading => Self::Downloading { bytes, total },
            SessionStatus::RequiresUserConfirmation => Self::RequiresUserConfirmation,
            SessionStatus::Installing => Self::Installing { bytes, total },
            SessionStatus::Installed => Self::Installed,
            SessionStatus::Failed => Self::Failed {
                // A failure without a code is reported as an internal error
                error_code: state.error_code.unwrap_or(error_code::INTERNAL_ERROR),
            },
            SessionStatus::Canceled => Self::Canceled,
        }
    }
}

/// Error codes reported by the install-session service
pub mod error_code {
    pub const ACTIVE_SESSIONS_LIMIT_EXCEEDED: i32 = -1;
    pub const MODULE_UNAVAILABLE: i32 = -2;
    pub const INVALID_REQUEST: i32 = -3;
    pub const SESSION_NOT_FOUND: i32 = -4;
    pub const API_NOT_AVAILABLE: i32 = -5;
    pub const NETWORK_ERROR: i32 = -6;
    pub const ACCESS_DENIED: i32 = -7;
    pub const INCOMPATIBLE_WITH_EXISTING_SESSION: i32 = -8;
    pub const SERVICE_DIED: i32 = -9;
    pub const INSUFFICIENT_STORAGE: i32 = -10;
    pub const VERIFICATION_ERROR: i32 = -11;
    pub const EMULATION_ERROR: i32 = -12;
    pub const COPY_ERROR: i32 = -13;
    pub const STORE_NOT_FOUND: i32 = -14;
    pub const INTERNAL_ERROR: i32 = -100;

    /// Human-readable description of a service error code
    pub fn describe(code: i32) -> &'static str {
        match code {
            ACTIVE_SESSIONS_LIMIT_EXCEEDED => "too many active sessions",
            MODULE_UNAVAILABLE => "module unavailable",
            INVALID_REQUEST => "invalid request",
            SESSION_NOT_FOUND => "session not found",
            API_NOT_AVAILABLE => "install API not available",
            NETWORK_ERROR => "network error",
            ACCESS_DENIED => "access denied",
            INCOMPATIBLE_WITH_EXISTING_SESSION => "conflicts with an existing session",
            SERVICE_DIED => "install service died",
            INSUFFICIENT_STORAGE => "insufficient storage",
            VERIFICATION_ERROR => "module verification failed",
            EMULATION_ERROR => "module emulation failed",
            COPY_ERROR => "module copy failed",
            STORE_NOT_FOUND => "store not found",
            INTERNAL_ERROR => "internal error",
            _ => "unknown error",
        }
    }
}
