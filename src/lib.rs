//! ondemand Library
//!
//! On-demand delivery of feature modules: a module registry, the acquisition
//! state machine driven by install-session events, the install-session
//! service seam with an in-process simulator, and the TUI and headless front
//! ends built on them.

pub mod acquisition;
pub mod app;
pub mod cli;
pub mod components;
pub mod config_file;
pub mod error;
pub mod headless;
pub mod registry;
pub mod service;
pub mod simulator;
pub mod theme;
pub mod types;
pub mod ui;

// Re-export main types for convenience
pub use acquisition::{AcquisitionMachine, Phase, RenderSink, UiState, ViewPhase, percentage};
pub use config_file::{DeliveryConfig, ModuleConfig, SimulationConfig};
pub use error::{DeliveryError, Result};
pub use registry::{EntryPoint, ModuleRegistry};
pub use service::{
    CONFIRMATION_REQUEST_CODE, InstallSessionService, ListenerId, Subscription, UninstallOutcome,
    UninstallTicket,
};
pub use simulator::SimulatedDeliveryService;
pub use types::{ModuleRequest, ModuleSet, SessionEvent, SessionId, SessionState, SessionStatus};
