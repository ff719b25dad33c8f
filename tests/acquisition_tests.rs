//! Acquisition state machine tests
//!
//! Drives `AcquisitionMachine` with a scripted service and a recording render
//! sink, covering the install, failure, cancellation and uninstall flows.

use ondemand::acquisition::{AcquisitionMachine, Phase, RenderSink, percentage};
use ondemand::error::{DeliveryError, Result};
use ondemand::registry::{EntryPoint, ModuleRegistry};
use ondemand::service::{
    CONFIRMATION_REQUEST_CODE, InstallSessionService, ListenerId, UninstallOutcome,
    UninstallTicket,
};
use ondemand::types::{ModuleSet, SessionId, SessionState, SessionStatus};
use std::cell::RefCell;
use std::sync::mpsc::Sender;

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Rendered {
    Progress(String, u64, u64),
    Idle,
    Error(String),
    Launch(String),
    Notice(String),
}

#[derive(Default)]
struct RecordingSink {
    calls: Vec<Rendered>,
}

impl RecordingSink {
    fn launches(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Rendered::Launch(ep) => Some(ep.as_str()),
                _ => None,
            })
            .collect()
    }

    fn errors(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Rendered::Error(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn on_progress(&mut self, message: &str, current: u64, max: u64) {
        self.calls
            .push(Rendered::Progress(message.to_string(), current, max));
    }

    fn on_idle(&mut self) {
        self.calls.push(Rendered::Idle);
    }

    fn on_error(&mut self, message: &str) {
        self.calls.push(Rendered::Error(message.to_string()));
    }

    fn on_ready_to_launch(&mut self, entry_point: &EntryPoint) {
        self.calls.push(Rendered::Launch(entry_point.to_string()));
    }

    fn on_notice(&mut self, message: &str) {
        self.calls.push(Rendered::Notice(message.to_string()));
    }
}

/// Service double: records calls, answers uninstalls with a fixed verdict
#[derive(Default)]
struct ScriptedService {
    installed: ModuleSet,
    accept_uninstall: bool,
    start_error: Option<i32>,
    started: RefCell<Vec<ModuleSet>>,
    uninstalls: RefCell<Vec<ModuleSet>>,
    confirmations: RefCell<Vec<(SessionId, i32)>>,
    canceled: RefCell<Vec<SessionId>>,
}

impl InstallSessionService for ScriptedService {
    fn start_install(&self, modules: &ModuleSet) -> Result<SessionId> {
        self.started.borrow_mut().push(modules.clone());
        match self.start_error {
            Some(error_code) => Err(DeliveryError::InstallFailed {
                error_code,
                modules: modules.clone(),
            }),
            None => Ok(self.started.borrow().len() as SessionId),
        }
    }

    fn cancel_install(&self, session_id: SessionId) -> Result<()> {
        self.canceled.borrow_mut().push(session_id);
        Ok(())
    }

    fn register_listener(&self, _listener: Sender<SessionState>) -> ListenerId {
        ListenerId(1)
    }

    fn unregister_listener(&self, _id: ListenerId) {}

    fn installed_modules(&self) -> ModuleSet {
        self.installed.clone()
    }

    fn deferred_uninstall(&self, modules: &ModuleSet) -> UninstallTicket {
        self.uninstalls.borrow_mut().push(modules.clone());
        UninstallTicket::resolved(modules.clone(), self.accept_uninstall)
    }

    fn start_confirmation_dialog_for_result(
        &self,
        state: &SessionState,
        request_code: i32,
    ) -> Result<()> {
        self.confirmations
            .borrow_mut()
            .push((state.session_id, request_code));
        Ok(())
    }
}

fn registry() -> ModuleRegistry {
    ModuleRegistry::from_pairs([
        ("video", "org.demo.feature.video.ui.PageVideoActivity"),
        ("audio", "org.demo.feature.audio.ui.PageAudioActivity"),
        ("x", "org.demo.feature.x.ui.PageXActivity"),
    ])
}

fn snapshot(id: SessionId, modules: &ModuleSet, status: SessionStatus) -> SessionState {
    SessionState::new(id, modules.clone(), status)
}

// =============================================================================
// Install scenarios
// =============================================================================

#[test]
fn single_module_progresses_then_launches() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let video = ModuleSet::single("video");

    machine
        .request_install("video", &service, &mut sink)
        .expect("Request should start");

    for (status, bytes) in [
        (SessionStatus::Pending, 0),
        (SessionStatus::Downloading, 50),
        (SessionStatus::Downloading, 100),
        (SessionStatus::Installing, 100),
        (SessionStatus::Installed, 100),
    ] {
        machine.handle_event(
            &snapshot(1, &video, status).with_progress(bytes, 100),
            &service,
            &mut sink,
        );
    }

    let percents: Vec<u8> = sink
        .calls
        .iter()
        .filter_map(|c| match c {
            Rendered::Progress(_, current, max) => Some(percentage(*current, *max)),
            _ => None,
        })
        .collect();
    // Loading, starting, pending, two downloads, installing
    assert_eq!(percents, vec![0, 0, 0, 50, 100, 100]);
    assert!(sink.calls.contains(&Rendered::Progress(
        "Downloading video\n50 of 100 bytes (50%)".to_string(),
        50,
        100
    )));

    assert!(sink
        .calls
        .contains(&Rendered::Progress("Installing video".to_string(), 100, 100)));
    let tail = &sink.calls[sink.calls.len() - 2..];
    assert_eq!(
        tail,
        &[
            Rendered::Launch("org.demo.feature.video.ui.PageVideoActivity".to_string()),
            Rendered::Idle,
        ]
    );
    assert_eq!(machine.phase(&video), Phase::Installed);
}

#[test]
fn loading_message_precedes_start() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();

    machine
        .request_install("video", &service, &mut sink)
        .expect("Request should start");
    assert_eq!(
        sink.calls,
        vec![
            Rendered::Progress("Loading module video".to_string(), 0, 0),
            Rendered::Progress("Starting install for video".to_string(), 0, 0),
        ]
    );
}

#[test]
fn multi_module_install_goes_idle_without_launch() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let both: ModuleSet = ["video", "audio"].into_iter().collect();

    machine
        .request_install_many(both.clone(), &service, &mut sink)
        .expect("Request should start");
    assert!(sink
        .calls
        .contains(&Rendered::Progress("Loading module audio - video".to_string(), 0, 0)));

    let phase = machine.handle_event(
        &snapshot(1, &both, SessionStatus::Installed),
        &service,
        &mut sink,
    );

    assert_eq!(phase, Phase::Installed);
    assert!(sink.launches().is_empty());
    assert_eq!(sink.calls.last(), Some(&Rendered::Idle));
}

#[test]
fn failure_reports_code_and_module() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let x = ModuleSet::single("x");

    machine
        .request_install("x", &service, &mut sink)
        .expect("Request should start");
    let phase = machine.handle_event(
        &snapshot(1, &x, SessionStatus::Failed).with_error_code(-3),
        &service,
        &mut sink,
    );

    assert_eq!(phase, Phase::Failed { error_code: -3 });
    assert_eq!(sink.errors(), vec!["Error: -3 for module x"]);
    assert!(sink.launches().is_empty());
}

#[test]
fn failure_without_code_is_internal_error() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let x = ModuleSet::single("x");

    machine
        .request_install("x", &service, &mut sink)
        .expect("Request should start");
    let phase = machine.handle_event(&snapshot(1, &x, SessionStatus::Failed), &service, &mut sink);
    assert_eq!(phase, Phase::Failed { error_code: -100 });
}

#[test]
fn cancellation_is_terminal_and_notified() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let x = ModuleSet::single("x");

    machine
        .request_install("x", &service, &mut sink)
        .expect("Request should start");
    let phase = machine.handle_event(&snapshot(1, &x, SessionStatus::Canceled), &service, &mut sink);

    assert_eq!(phase, Phase::Canceled);
    assert!(sink
        .calls
        .contains(&Rendered::Notice("Cancel download module x".to_string())));
    assert_eq!(sink.calls.last(), Some(&Rendered::Idle));
}

#[test]
fn start_error_fails_request() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService {
        start_error: Some(-9),
        ..ScriptedService::default()
    };
    let mut sink = RecordingSink::default();

    let err = machine
        .request_install("x", &service, &mut sink)
        .unwrap_err();
    assert_eq!(err.error_code(), Some(-9));
    assert_eq!(machine.phase_of("x"), Phase::Failed { error_code: -9 });
}

#[test]
fn already_installed_launches_without_starting_session() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService {
        installed: ModuleSet::single("video"),
        ..ScriptedService::default()
    };
    let mut sink = RecordingSink::default();

    let phase = machine
        .request_install("video", &service, &mut sink)
        .expect("Request should succeed");

    assert_eq!(phase, Phase::Installed);
    assert!(service.started.borrow().is_empty());
    assert_eq!(
        sink.launches(),
        vec!["org.demo.feature.video.ui.PageVideoActivity"]
    );
}

#[test]
fn confirmation_forwarded_with_request_code() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let video = ModuleSet::single("video");

    machine
        .request_install("video", &service, &mut sink)
        .expect("Request should start");
    let phase = machine.handle_event(
        &snapshot(1, &video, SessionStatus::RequiresUserConfirmation).with_progress(0, 100),
        &service,
        &mut sink,
    );

    assert_eq!(phase, Phase::AwaitingConfirmation);
    assert_eq!(
        *service.confirmations.borrow(),
        vec![(1, CONFIRMATION_REQUEST_CODE)]
    );
}

#[test]
fn terminal_request_resets_on_new_request() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let x = ModuleSet::single("x");

    machine
        .request_install("x", &service, &mut sink)
        .expect("Request should start");
    machine.handle_event(
        &snapshot(1, &x, SessionStatus::Failed).with_error_code(-6),
        &service,
        &mut sink,
    );
    assert!(machine.phase_of("x").is_terminal());

    let phase = machine
        .request_install("x", &service, &mut sink)
        .expect("Retry should start");
    assert_eq!(phase, Phase::Pending);
    assert_eq!(service.started.borrow().len(), 2);

    // Late events of the first session no longer apply
    let phase = machine.handle_event(
        &snapshot(1, &x, SessionStatus::Installed),
        &service,
        &mut sink,
    );
    assert_eq!(phase, Phase::Pending);
}

#[test]
fn concurrent_requests_are_independent() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let video = ModuleSet::single("video");
    let x = ModuleSet::single("x");

    machine
        .request_install("video", &service, &mut sink)
        .expect("Request should start");
    machine
        .request_install("x", &service, &mut sink)
        .expect("Request should start");

    machine.handle_event(
        &snapshot(2, &x, SessionStatus::Failed).with_error_code(-3),
        &service,
        &mut sink,
    );
    machine.handle_event(
        &snapshot(1, &video, SessionStatus::Downloading).with_progress(10, 100),
        &service,
        &mut sink,
    );

    assert_eq!(machine.phase(&x), Phase::Failed { error_code: -3 });
    assert_eq!(machine.phase(&video), Phase::Downloading);
    assert_eq!(machine.active().count(), 1);
}

#[test]
fn finished_request_leaves_panel_to_active_one() {
    let mut machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();
    let video = ModuleSet::single("video");
    let x = ModuleSet::single("x");

    machine
        .request_install("x", &service, &mut sink)
        .expect("Request should start");
    machine
        .request_install("video", &service, &mut sink)
        .expect("Request should start");
    machine.handle_event(
        &snapshot(2, &video, SessionStatus::Downloading).with_progress(10, 100),
        &service,
        &mut sink,
    );

    machine.handle_event(&snapshot(1, &x, SessionStatus::Canceled), &service, &mut sink);
    assert_eq!(
        sink.calls.last(),
        Some(&Rendered::Progress(
            "Downloading video\n10 of 100 bytes (10%)".to_string(),
            10,
            100
        ))
    );
    assert!(!sink.calls.contains(&Rendered::Idle));

    machine.handle_event(&snapshot(2, &video, SessionStatus::Installed), &service, &mut sink);
    assert_eq!(sink.calls.last(), Some(&Rendered::Idle));
}

// =============================================================================
// Uninstall
// =============================================================================

#[test]
fn empty_uninstall_never_contacts_service() {
    let machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();

    let err = machine
        .request_uninstall(ModuleSet::new(), &service, &mut sink)
        .unwrap_err();
    assert!(matches!(err, DeliveryError::NothingToUninstall));
    assert!(service.uninstalls.borrow().is_empty());
    assert_eq!(
        sink.calls,
        vec![Rendered::Notice("No module to uninstall.".to_string())]
    );
}

#[test]
fn uninstall_all_with_nothing_installed() {
    let machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();

    let err = machine
        .request_uninstall_all(&service, &mut sink)
        .unwrap_err();
    assert!(matches!(err, DeliveryError::NothingToUninstall));
    assert!(service.uninstalls.borrow().is_empty());
}

#[test]
fn accepted_uninstall_reports_modules() {
    let machine = AcquisitionMachine::new(registry());
    let service = ScriptedService {
        accept_uninstall: true,
        ..ScriptedService::default()
    };
    let mut sink = RecordingSink::default();

    let ticket = machine
        .request_uninstall(ModuleSet::single("x"), &service, &mut sink)
        .expect("Request should be sent");
    let outcome = ticket.try_outcome().expect("Ticket should be resolved");
    assert_eq!(
        outcome,
        UninstallOutcome::Accepted {
            modules: ModuleSet::single("x")
        }
    );

    let removed = machine
        .finish_uninstall(outcome, &mut sink)
        .expect("Uninstall should be accepted");
    assert_eq!(removed, ModuleSet::single("x"));
    assert_eq!(
        sink.calls.last(),
        Some(&Rendered::Notice("Uninstalling x".to_string()))
    );
}

#[test]
fn rejected_uninstall_reports_error() {
    let machine = AcquisitionMachine::new(registry());
    let service = ScriptedService::default();
    let mut sink = RecordingSink::default();

    let ticket = machine
        .request_uninstall(ModuleSet::single("x"), &service, &mut sink)
        .expect("Request should be sent");
    let outcome = ticket.try_outcome().expect("Ticket should be resolved");
    assert!(!outcome.is_accepted());

    let err = machine.finish_uninstall(outcome, &mut sink).unwrap_err();
    assert!(matches!(err, DeliveryError::UninstallRejected { .. }));
    assert_eq!(sink.errors(), vec!["Failed uninstall of x"]);
}
