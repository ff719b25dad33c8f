//! ondemand - Main entry point
//!
//! Launches the TUI by default; the subcommands drive the same acquisition
//! state machine headlessly.

use anyhow::{Context, Result, bail};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ondemand::acquisition::Phase;
use ondemand::app::App;
use ondemand::cli::{Cli, Commands};
use ondemand::config_file::DeliveryConfig;
use ondemand::headless::{self, ConsoleSink, InstallOptions};
use ondemand::simulator::SimulatedDeliveryService;
use ondemand::types::ModuleSet;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::fs::File;
use std::io::stdout;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// How long `uninstall` waits for the service's answer
const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize tracing. `RUST_LOG` overrides `default_directive`.
fn init_tracing(log_file: Option<&Path>, default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Load the configuration given on the command line, or the built-in demo catalog
fn load_config(path: Option<&Path>) -> Result<DeliveryConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            DeliveryConfig::load_from_file(path)?
        }
        None => DeliveryConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Main application entry point
fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let interactive = matches!(cli.command, None | Some(Commands::Run));
    // Logging to stderr would draw over the TUI
    let default_directive = if interactive && cli.log_file.is_none() {
        "off"
    } else {
        "info"
    };
    init_tracing(cli.log_file.as_deref(), default_directive)?;
    info!("ondemand starting up");
    debug!("CLI arguments parsed: {:?}", cli);

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(cli.config.as_deref())?;
            run_tui(config)
        }
        Some(Commands::Install {
            modules,
            yes,
            timeout,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let modules: ModuleSet = modules.into_iter().collect();
            let options = InstallOptions {
                auto_confirm: yes,
                timeout: Duration::from_secs(timeout),
            };
            run_install(&config, modules, &options)
        }
        Some(Commands::Uninstall { modules }) => {
            let config = load_config(cli.config.as_deref())?;
            let service = SimulatedDeliveryService::from_config(&config);
            let mut sink = ConsoleSink::new(stdout());
            match headless::run_uninstall(
                &service,
                &config,
                modules.into_iter().collect(),
                UNINSTALL_TIMEOUT,
                &mut sink,
            ) {
                Ok(removed) => {
                    info!("Uninstall of {} accepted", removed);
                    Ok(())
                }
                Err(e) => {
                    error!("Uninstall failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Modules) => {
            let config = load_config(cli.config.as_deref())?;
            list_modules(&config);
            Ok(())
        }
        Some(Commands::Validate { config }) => {
            info!("Validating configuration file: {:?}", config);
            match DeliveryConfig::load_from_file(&config).and_then(|c| c.validate()) {
                Ok(()) => {
                    println!("✓ Configuration file is valid: {}", config.display());
                    Ok(())
                }
                Err(e) => {
                    error!("Configuration validation failed: {:#}", e);
                    eprintln!("✗ Configuration validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::InitConfig { path, force }) => {
            if path.exists() && !force {
                bail!("{} already exists (pass --force to overwrite)", path.display());
            }
            DeliveryConfig::default().save_to_file(&path)?;
            println!("✓ Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

/// Run the TUI
fn run_tui(config: DeliveryConfig) -> Result<()> {
    debug!("Initializing terminal for TUI mode");

    enable_raw_mode().context("Failed to enable raw mode")?;
    crossterm::execute!(stdout(), EnterAlternateScreen)
        .context("Failed to enter alternate screen")?;

    let result = Terminal::new(CrosstermBackend::new(stdout()))
        .context("Failed to create terminal")
        .and_then(|mut terminal| {
            let mut app = App::new(config);
            app.run(&mut terminal)
        });

    // Cleanup terminal (always attempt cleanup, even if app failed)
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(stdout(), LeaveAlternateScreen);

    result
}

/// Install modules headlessly; exits non-zero unless they end up installed
fn run_install(config: &DeliveryConfig, modules: ModuleSet, options: &InstallOptions) -> Result<()> {
    info!("Running headless install of {}", modules);
    let mut sink = ConsoleSink::new(stdout());

    match headless::run_install(config, modules, options, &mut sink) {
        Ok(Phase::Installed) => Ok(()),
        Ok(phase) => {
            error!("Install finished as {}", phase);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Install failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn list_modules(config: &DeliveryConfig) {
    let preinstalled: ModuleSet = config.simulation.preinstalled.iter().cloned().collect();
    println!("{} ({} modules)", config.application_id, config.modules.len());
    for module in &config.modules {
        let marker = if preinstalled.contains(&module.name) {
            "installed"
        } else {
            "on demand"
        };
        println!(
            "  {:<16} {:>10} bytes  [{}]  {}",
            module.name, module.size_bytes, marker, module.entry_point
        );
    }
}
