//! TUI application state tests
//!
//! Drives `App` through key actions and ticks without a terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ondemand::acquisition::Phase;
use ondemand::app::{App, AppMode, ToastLevel};
use ondemand::components::keybindings::KeyAction;
use ondemand::config_file::DeliveryConfig;
use ondemand::service::InstallSessionService;
use ondemand::simulator::SimulatedDeliveryService;
use ondemand::ui::MenuItem;
use std::time::{Duration, Instant};

fn fast_config() -> DeliveryConfig {
    let mut config = DeliveryConfig::default();
    config.simulation.tick_ms = 0;
    config.simulation.uninstall_delay_ms = 0;
    config
}

/// Tick the app until `done` holds or the deadline passes
fn tick_until(app: &mut App, done: impl Fn(&App) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done(app) {
        assert!(Instant::now() < deadline, "Condition never reached");
        app.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Select the menu entry for `name`
fn select_module(app: &mut App, name: &str) {
    let index = app
        .menu_items()
        .iter()
        .position(|item| matches!(item, MenuItem::Module { name: n, .. } if n == name))
        .expect("Module should be listed");
    while app.state().selection != index {
        app.handle_action(KeyAction::NavigateDown);
    }
}

#[test]
fn test_app_starts_listening_on_main_menu() {
    let app = App::new(fast_config());
    assert_eq!(app.state().mode, AppMode::MainMenu);
    assert!(app.is_listening());
    assert_eq!(app.service().listener_count(), 1);
}

#[test]
fn test_menu_lists_modules_then_uninstall() {
    let app = App::new(fast_config());
    let items = app.menu_items();
    assert_eq!(items.len(), 4);
    assert_eq!(items.last(), Some(&MenuItem::UninstallAll));
    assert_eq!(items[3].label(), "Uninstall all modules");
}

#[test]
fn test_install_opens_module_screen_and_releases_listener() {
    let mut app = App::new(fast_config());
    select_module(&mut app, "instantmodule");
    app.handle_action(KeyAction::Select);

    tick_until(&mut app, |a| a.state().mode == AppMode::ModuleScreen);
    let screen = app.state().module_screen.as_ref().expect("Screen should be open");
    assert_eq!(screen.name, "instantmodule");
    assert!(!app.is_listening());
    assert_eq!(app.service().listener_count(), 0);

    app.handle_action(KeyAction::Back);
    assert_eq!(app.state().mode, AppMode::MainMenu);
    assert!(app.is_listening());
    assert_eq!(app.service().listener_count(), 1);
}

#[test]
fn test_confirmation_dialog_accept() {
    let mut app = App::new(fast_config());
    select_module(&mut app, "bigvideo");
    app.handle_action(KeyAction::Select);

    tick_until(&mut app, |a| a.state().mode == AppMode::ConfirmDialog);
    assert!(app.state().confirmation.is_some());

    app.handle_action(KeyAction::Confirm);
    tick_until(&mut app, |a| a.state().mode == AppMode::ModuleScreen);

    app.handle_action(KeyAction::Play);
    let screen = app.state().module_screen.as_ref().expect("Screen should be open");
    assert!(screen.playback.is_some());
    assert!(app
        .state()
        .toasts
        .iter()
        .any(|t| t.message == "Play Video Clicked"));
}

#[test]
fn test_open_confirmation_survives_stall_timeout() {
    let mut config = fast_config();
    config.stall_timeout_secs = 1;
    let mut app = App::new(config);
    select_module(&mut app, "bigvideo");
    app.handle_action(KeyAction::Select);

    tick_until(&mut app, |a| a.state().mode == AppMode::ConfirmDialog);
    app.tick(Instant::now() + Duration::from_secs(30));
    assert_eq!(app.state().mode, AppMode::ConfirmDialog);
    assert_eq!(
        app.machine().phase_of("bigvideo"),
        Phase::AwaitingConfirmation
    );

    app.handle_action(KeyAction::Confirm);
    tick_until(&mut app, |a| a.state().mode == AppMode::ModuleScreen);
}

#[test]
fn test_confirmation_dialog_decline_cancels() {
    let mut app = App::new(fast_config());
    select_module(&mut app, "bigvideo");
    app.handle_action(KeyAction::Select);

    tick_until(&mut app, |a| a.state().mode == AppMode::ConfirmDialog);
    app.handle_action(KeyAction::Decline);

    tick_until(&mut app, |a| a.machine().phase_of("bigvideo") == Phase::Canceled);
    assert_eq!(app.state().mode, AppMode::MainMenu);
    assert!(app
        .state()
        .toasts
        .iter()
        .any(|t| t.message == "Cancel download module bigvideo"));
}

#[test]
fn test_uninstall_all_with_nothing_installed() {
    let mut app = App::new(fast_config());
    let last = app.menu_items().len() - 1;
    while app.state().selection != last {
        app.handle_action(KeyAction::NavigateDown);
    }
    app.handle_action(KeyAction::Select);

    assert!(app.service().uninstall_calls().is_empty());
    assert_eq!(app.state().toasts[0].message, "No module to uninstall.");
}

#[test]
fn test_uninstall_all_after_install() {
    let mut config = fast_config();
    config.simulation.preinstalled = vec!["separatemodule".to_string()];
    let service = SimulatedDeliveryService::from_config(&config);
    let mut app = App::with_service(config, service);

    let last = app.menu_items().len() - 1;
    while app.state().selection != last {
        app.handle_action(KeyAction::NavigateDown);
    }
    app.handle_action(KeyAction::Select);

    tick_until(&mut app, |a| {
        a.state()
            .toasts
            .iter()
            .any(|t| t.message == "Uninstalling separatemodule")
    });
    tick_until(&mut app, |a| a.service().installed_modules().is_empty());
}

#[test]
fn test_cancel_without_download_shows_toast() {
    let mut app = App::new(fast_config());
    app.handle_action(KeyAction::CancelDownload);
    assert_eq!(app.state().toasts[0].level, ToastLevel::Info);
}

#[test]
fn test_help_toggle_and_quit_keys() {
    let mut app = App::new(fast_config());
    let quit = app.handle_key(KeyEvent::new(KeyCode::Char('?'), KeyModifiers::SHIFT));
    assert!(!quit);
    assert!(app.state().help_visible);

    // Esc closes help without cancelling anything
    app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
    assert!(!app.state().help_visible);
    assert!(app.state().toasts.is_empty());

    assert!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
}

#[test]
fn test_shutdown_releases_listener() {
    let mut app = App::new(fast_config());
    let service = app.service().clone();
    app.shutdown();
    assert_eq!(service.listener_count(), 0);
    drop(app);
    assert_eq!(service.listener_count(), 0);
}
