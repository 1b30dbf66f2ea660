//! Engine configuration file format.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Default number of undo steps kept in the command history.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default number of plugins a single chain can hold.
pub const DEFAULT_MAX_PLUGINS: usize = 16;

/// Top-level engine configuration.
///
/// Every section and field is optional in the file; missing values fall back
/// to their defaults.
///
/// # TOML Format
///
/// ```toml
/// [history]
/// max_depth = 200
/// coalesce_parameters = true
///
/// [chain]
/// max_plugins = 32
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Undo/redo history settings.
    pub history: HistoryConfig,
    /// Plugin chain settings.
    pub chain: ChainConfig,
}

/// Undo/redo history settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undoable commands. The oldest entry is dropped when
    /// a new command would exceed it.
    pub max_depth: usize,
    /// Merge consecutive same-direction edits of one parameter into a single
    /// history entry.
    pub coalesce_parameters: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            coalesce_parameters: true,
        }
    }
}

/// Plugin chain settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChainConfig {
    /// Capacity of every chain. Bounds the work done while the structural
    /// lock is held.
    pub max_plugins: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_plugins: DEFAULT_MAX_PLUGINS,
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_depth == 0 {
            return Err(ConfigError::invalid(
                "history.max_depth",
                "must keep at least one command",
            ));
        }
        if self.chain.max_plugins == 0 {
            return Err(ConfigError::invalid(
                "chain.max_plugins",
                "a chain must hold at least one plugin",
            ));
        }
        Ok(())
    }

    /// Builder-style override of the history depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.history.max_depth = max_depth;
        self
    }

    /// Builder-style override of the chain capacity.
    pub fn with_max_plugins(mut self, max_plugins: usize) -> Self {
        self.chain.max_plugins = max_plugins;
        self
    }

    /// Builder-style toggle of parameter edit coalescing.
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.history.coalesce_parameters = enabled;
        self
    }
}
