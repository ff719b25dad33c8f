use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ondemand - on-demand module delivery console
#[derive(Parser, Debug)]
#[command(name = "ondemand")]
#[command(about = "Install, launch and uninstall on-demand modules against a simulated store")]
#[command(version)]
pub struct Cli {
    /// Delivery configuration (JSON). The built-in demo catalog is used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file. The TUI only logs when this is set.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the interactive TUI (default)
    Run,
    /// Install modules as one session, then launch a single module
    Install {
        /// Module names
        #[arg(required = true)]
        modules: Vec<String>,

        /// Accept download confirmations instead of declining them
        #[arg(short, long)]
        yes: bool,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
    /// Request a deferred uninstall (all installed modules when none are given)
    Uninstall {
        /// Module names
        modules: Vec<String>,
    },
    /// List the modules of the catalog
    Modules,
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_no_args() {
        // Running with no args should succeed (defaults to TUI mode)
        let cli = Cli::try_parse_from(["ondemand"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_install_modules() {
        let cli = Cli::try_parse_from([
            "ondemand",
            "install",
            "instantmodule",
            "bigvideo",
            "--yes",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Install {
                modules,
                yes,
                timeout,
            }) => {
                assert_eq!(modules, vec!["instantmodule", "bigvideo"]);
                assert!(yes);
                assert_eq!(timeout, 300);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_install_requires_module() {
        assert!(Cli::try_parse_from(["ondemand", "install"]).is_err());
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ondemand",
            "uninstall",
            "--config",
            "/path/to/config.json",
        ])
        .unwrap();
        assert_eq!(
            cli.config.unwrap().to_str().unwrap(),
            "/path/to/config.json"
        );
        match cli.command {
            Some(Commands::Uninstall { modules }) => assert!(modules.is_empty()),
            _ => panic!("Expected Uninstall command"),
        }
    }

    #[test]
    fn test_cli_init_config() {
        let cli = Cli::try_parse_from(["ondemand", "init-config", "out.json", "--force"]).unwrap();
        match cli.command {
            Some(Commands::InitConfig { path, force }) => {
                assert_eq!(path, PathBuf::from("out.json"));
                assert!(force);
            }
            _ => panic!("Expected InitConfig command"),
        }
    }
}
