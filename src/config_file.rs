//! Delivery configuration file handling.
//!
//! The configuration declares the application id, the module catalog the
//! registry is built from, and the parameters of the simulated delivery
//! service. It is stored as JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Application id used by the default catalog
pub const DEFAULT_APPLICATION_ID: &str = "org.ondemand.demo";

/// Delivery configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Prefix of every entry point identifier
    pub application_id: String,

    /// Modules available for on-demand delivery
    pub modules: Vec<ModuleConfig>,

    /// Behaviour of the simulated delivery service
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Seconds without a session event before a request is failed (0 disables)
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

/// One deliverable module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module name as known to the delivery service
    pub name: String,
    /// Button label
    pub title: String,
    /// Identifier launched once the module is installed
    pub entry_point: String,
    /// Download size reported by the simulated service
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub description: String,
    /// Bundled video played by the module screen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

/// Simulated delivery service parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Bytes "downloaded" per tick
    pub chunk_bytes: u64,
    /// Delay between two session events in milliseconds
    pub tick_ms: u64,
    /// Sessions larger than this require user confirmation (0 disables)
    pub confirmation_threshold_bytes: u64,
    /// Delay before an accepted deferred uninstall removes the modules
    pub uninstall_delay_ms: u64,
    /// Modules whose install fails, with the error code reported
    pub fail_modules: BTreeMap<String, i32>,
    /// Modules already installed at startup
    pub preinstalled: Vec<String>,
}

fn default_stall_timeout_secs() -> u64 {
    120
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 2 * MIB,
            tick_ms: 120,
            confirmation_threshold_bytes: 32 * MIB,
            uninstall_delay_ms: 1_500,
            fail_modules: BTreeMap::new(),
            preinstalled: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn uninstall_delay(&self) -> Duration {
        Duration::from_millis(self.uninstall_delay_ms)
    }

    /// Whether a session of `total_bytes` must be confirmed by the user
    pub fn requires_confirmation(&self, total_bytes: u64) -> bool {
        self.confirmation_threshold_bytes > 0 && total_bytes > self.confirmation_threshold_bytes
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let app = DEFAULT_APPLICATION_ID;
        Self {
            application_id: app.to_string(),
            modules: vec![
                ModuleConfig {
                    name: "instantmodule".to_string(),
                    title: "Instant page detail".to_string(),
                    entry_point: format!("{app}.feature.instantmodule.ui.PageInstantActivity"),
                    size_bytes: 256 * 1024,
                    description: "Small instant-enabled module".to_string(),
                    video: None,
                },
                ModuleConfig {
                    name: "separatemodule".to_string(),
                    title: "On-demand separate page".to_string(),
                    entry_point: format!("{app}.feature.separatemodule.ui.PageSeparateActivity"),
                    size_bytes: 3 * MIB,
                    description: "Module delivered on demand".to_string(),
                    video: None,
                },
                ModuleConfig {
                    name: "bigvideo".to_string(),
                    title: "On-demand video page".to_string(),
                    entry_point: format!("{app}.feature.bigvideo.ui.PageVideoActivity"),
                    size_bytes: 64 * MIB,
                    description: "Large module bundling a video".to_string(),
                    video: Some("big_buck_bunny.mp4".to_string()),
                },
            ],
            simulation: SimulationConfig::default(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

impl DeliveryConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.application_id.trim().is_empty() {
            anyhow::bail!("Application id must be specified");
        }

        if self.modules.is_empty() {
            anyhow::bail!("At least one module must be configured");
        }

        let mut seen = BTreeSet::new();
        for module in &self.modules {
            let name = module.name.trim();
            if name.is_empty() {
                anyhow::bail!("Module names must not be empty");
            }
            if name.contains(char::is_whitespace) {
                anyhow::bail!("Module name '{}' must not contain whitespace", name);
            }
            if !seen.insert(name) {
                anyhow::bail!("Module '{}' is configured twice", name);
            }
            if module.entry_point.trim().is_empty() {
                anyhow::bail!("Module '{}' has no entry point", name);
            }
        }

        if self.simulation.chunk_bytes == 0 {
            anyhow::bail!("Simulation chunk size must be greater than zero");
        }

        for name in self
            .simulation
            .fail_modules
            .keys()
            .chain(self.simulation.preinstalled.iter())
        {
            if !seen.contains(name.as_str()) {
                anyhow::bail!("Simulation references unknown module '{}'", name);
            }
        }

        Ok(())
    }

    /// Stall timeout, or None when disabled
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_secs > 0).then(|| Duration::from_secs(self.stall_timeout_secs))
    }

    /// Look up a module by name
    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DeliveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.modules.len(), 3);
    }

    #[test]
    fn test_default_entry_points_use_application_id() {
        let config = DeliveryConfig::default();
        for module in &config.modules {
            assert!(module.entry_point.starts_with(DEFAULT_APPLICATION_ID));
            assert!(module.entry_point.contains(&module.name));
        }
    }

    #[test]
    fn test_only_big_module_requires_confirmation() {
        let config = DeliveryConfig::default();
        let confirming: Vec<_> = config
            .modules
            .iter()
            .filter(|m| config.simulation.requires_confirmation(m.size_bytes))
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(confirming, vec!["bigvideo"]);
    }

    #[test]
    fn test_zero_threshold_disables_confirmation() {
        let sim = SimulationConfig {
            confirmation_threshold_bytes: 0,
            ..SimulationConfig::default()
        };
        assert!(!sim.requires_confirmation(u64::MAX));
    }

    #[test]
    fn test_duplicate_module_rejected() {
        let mut config = DeliveryConfig::default();
        let dup = config.modules[0].clone();
        config.modules.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_unknown_failure_module_rejected() {
        let mut config = DeliveryConfig::default();
        config.simulation.fail_modules.insert("ghost".to_string(), -6);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let mut config = DeliveryConfig::default();
        config.simulation.chunk_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stall_timeout_zero_disables() {
        let mut config = DeliveryConfig::default();
        assert_eq!(config.stall_timeout(), Some(Duration::from_secs(120)));
        config.stall_timeout_secs = 0;
        assert!(config.stall_timeout().is_none());
    }

    #[test]
    fn test_missing_simulation_section_uses_defaults() {
        let json = r#"{
            "application_id": "app",
            "modules": [{"name": "x", "title": "X", "entry_point": "app.X"}]
        }"#;
        let config: DeliveryConfig = serde_json::from_str(json).expect("Should parse");
        assert_eq!(config.simulation, SimulationConfig::default());
        assert_eq!(config.stall_timeout_secs, 120);
        assert_eq!(config.modules[0].size_bytes, 0);
    }
}
