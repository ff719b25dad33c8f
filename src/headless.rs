//! Headless driver
//!
//! Runs the acquisition state machine against the simulated delivery service
//! without a terminal UI, printing every render callback as a line of text.
//! Used by the `install` and `uninstall` subcommands.

use crate::acquisition::{AcquisitionMachine, Phase, RenderSink, percentage};
use crate::config_file::DeliveryConfig;
use crate::error::{DeliveryError, Result};
use crate::registry::{EntryPoint, ModuleRegistry};
use crate::service::{Subscription, UninstallOutcome};
use crate::simulator::SimulatedDeliveryService;
use crate::types::ModuleSet;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How often the driver checks confirmations and stalls while waiting for events
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Render sink printing one line per callback
pub struct ConsoleSink<W: Write> {
    out: W,
    launched: Vec<EntryPoint>,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            launched: Vec::new(),
        }
    }

    /// Entry points launched so far
    pub fn launched(&self) -> &[EntryPoint] {
        &self.launched
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // Console output is best effort; a closed pipe must not abort the session
        let _ = writeln!(self.out, "{text}");
    }
}

impl<W: Write> RenderSink for ConsoleSink<W> {
    fn on_progress(&mut self, message: &str, current: u64, max: u64) {
        let message = message.replace('\n', " | ");
        if max > 0 {
            self.line(&format!("[{:>3}%] {}", percentage(current, max), message));
        } else {
            self.line(&format!("[ .. ] {message}"));
        }
    }

    fn on_idle(&mut self) {
        debug!("Console sink idle");
    }

    fn on_error(&mut self, message: &str) {
        self.line(&format!("✗ {message}"));
    }

    fn on_ready_to_launch(&mut self, entry_point: &EntryPoint) {
        self.line(&format!("✓ Launching {entry_point}"));
        self.launched.push(entry_point.clone());
    }

    fn on_notice(&mut self, message: &str) {
        self.line(&format!("• {}", message.replace('\n', " ")));
    }
}

/// Options of a headless install
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Accept confirmation requests instead of declining them
    pub auto_confirm: bool,
    /// Give up after this long without reaching a terminal phase
    pub timeout: Duration,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            auto_confirm: false,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Install `modules` (one session) and wait for a terminal phase
///
/// # Errors
///
/// - Any precondition error of `request_install_many`
/// - `SessionStalled` if no terminal phase is reached before `options.timeout`
pub fn run_install<W: Write>(
    config: &DeliveryConfig,
    modules: ModuleSet,
    options: &InstallOptions,
    sink: &mut ConsoleSink<W>,
) -> Result<Phase> {
    let service = SimulatedDeliveryService::from_config(config);
    run_install_with(&service, config, modules, options, sink)
}

/// Same as `run_install`, against an existing service
pub fn run_install_with<W: Write>(
    service: &SimulatedDeliveryService,
    config: &DeliveryConfig,
    modules: ModuleSet,
    options: &InstallOptions,
    sink: &mut ConsoleSink<W>,
) -> Result<Phase> {
    let mut machine = AcquisitionMachine::new(ModuleRegistry::from_config(config))
        .with_stall_timeout(config.stall_timeout());
    // Registered before the request so no early event is missed
    let subscription = Subscription::acquire(service.clone());

    let phase = machine.request_install_many(modules.clone(), service, sink)?;
    if phase.is_terminal() {
        return Ok(phase);
    }

    let deadline = Instant::now() + options.timeout;
    loop {
        if let Some(state) = subscription.next_timeout(POLL_INTERVAL) {
            machine.handle_event(&state, service, sink);
        }

        if let Some(pending) = service.next_confirmation() {
            let accept = options.auto_confirm;
            sink.on_notice(&format!(
                "{} requires confirmation: {}",
                pending.module_names,
                if accept { "accepting" } else { "declining (pass --yes to accept)" }
            ));
            service.answer_confirmation(pending.session_id, accept)?;
        }

        machine.expire_stalled(Instant::now(), service, sink);

        let phase = machine.phase(&modules);
        if phase.is_terminal() {
            info!("Headless install of {} finished: {}", modules, phase);
            return Ok(phase);
        }
        if Instant::now() >= deadline {
            let err = DeliveryError::SessionStalled {
                modules,
                waited_secs: options.timeout.as_secs(),
            };
            sink.on_error(&err.to_string());
            return Err(err);
        }
    }
}

/// Request a deferred uninstall and wait for the service's answer.
/// An empty `modules` uninstalls everything currently installed.
pub fn run_uninstall<W: Write>(
    service: &SimulatedDeliveryService,
    config: &DeliveryConfig,
    modules: ModuleSet,
    timeout: Duration,
    sink: &mut ConsoleSink<W>,
) -> Result<ModuleSet> {
    let machine = AcquisitionMachine::new(ModuleRegistry::from_config(config));
    let ticket = if modules.is_empty() {
        machine.request_uninstall_all(service, sink)?
    } else {
        machine.request_uninstall(modules, service, sink)?
    };

    let outcome: UninstallOutcome = ticket.wait(timeout);
    machine.finish_uninstall(outcome, sink)
}
