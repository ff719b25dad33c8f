//! Module registry
//!
//! Static, read-only mapping from module name to the entry point launched
//! once the module is available. Built once at startup from configuration.

use crate::config_file::DeliveryConfig;
use crate::error::{DeliveryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier used to launch a module's primary screen
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryPoint(String);

impl EntryPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegistryEntry {
    entry_point: EntryPoint,
    title: String,
}

/// Name -> entry point lookup table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl ModuleRegistry {
    /// Build the registry from a delivery configuration
    pub fn from_config(config: &DeliveryConfig) -> Self {
        let entries = config
            .modules
            .iter()
            .map(|m| {
                (
                    m.name.clone(),
                    RegistryEntry {
                        entry_point: EntryPoint::new(m.entry_point.clone()),
                        title: m.title.clone(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Build the registry from `(name, entry point)` pairs; titles default to the name
    pub fn from_pairs<I, N, E>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(name, entry)| {
                let name = name.into();
                let title = name.clone();
                (
                    name,
                    RegistryEntry {
                        entry_point: EntryPoint::new(entry),
                        title,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Resolve a module name to its entry point
    ///
    /// # Errors
    ///
    /// - `ModuleNotInRegistry` if the name has no entry
    pub fn resolve(&self, name: &str) -> Result<&EntryPoint> {
        self.entries
            .get(name)
            .map(|e| &e.entry_point)
            .ok_or_else(|| DeliveryError::ModuleNotInRegistry {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Display title of a module
    pub fn title(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.title.as_str())
    }

    /// Reverse lookup: the module launched by an entry point
    pub fn module_for(&self, entry_point: &EntryPoint) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, e)| &e.entry_point == entry_point)
            .map(|(name, _)| name.as_str())
    }

    /// Registered module names in lexical order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
