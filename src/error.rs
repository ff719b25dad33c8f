//! Error handling module for module delivery
//!
//! Provides the error taxonomy reported to the UI layer using thiserror.
//! Every outcome here is terminal for the affected request and never fatal
//! to the process.

use crate::types::ModuleSet;
use thiserror::Error;

/// Main error type for module delivery
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The delivery service reported a failed install session
    #[error("Error: {error_code} for module {modules}")]
    InstallFailed { error_code: i32, modules: ModuleSet },

    /// The install session was canceled (by the user or the service)
    #[error("Cancel download module {modules}")]
    InstallCanceled { modules: ModuleSet },

    /// Local precondition failure: no entry point is registered for the name
    #[error("Module {name} is not in the registry")]
    ModuleNotInRegistry { name: String },

    /// An install request named no modules
    #[error("No module requested")]
    EmptyRequest,

    /// The delivery service refused a deferred uninstall
    #[error("Failed uninstall of {modules}")]
    UninstallRejected { modules: ModuleSet },

    /// Uninstall requested with nothing installed
    #[error("No module to uninstall.")]
    NothingToUninstall,

    /// No session event arrived within the stall timeout
    #[error("No progress for module {modules} after {waited_secs}s")]
    SessionStalled { modules: ModuleSet, waited_secs: u64 },

    /// Install-session service errors (unknown session, bad confirmation)
    #[error("Install service error: {0}")]
    Service(String),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (terminal, log files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for delivery operations
pub type Result<T> = std::result::Result<T, DeliveryError>;

impl DeliveryError {
    /// Create an install-service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Service error code carried by this error, if any
    pub fn error_code(&self) -> Option<i32> {
        match self {
            Self::InstallFailed { error_code, .. } => Some(*error_code),
            _ => None,
        }
    }
}
