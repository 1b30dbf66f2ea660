//! Configuration and preset management for the plugrack edit engine.
//!
//! # Features
//!
//! - **Engine Config**: history depth, parameter coalescing and chain capacity,
//!   loaded from TOML and validated
//! - **Plugin Presets**: named value lists for one plugin type, loaded and
//!   saved as TOML files
//!
//! # Example
//!
//! ```rust,no_run
//! use plugrack_config::{EngineConfig, PluginPreset};
//!
//! let config = EngineConfig::load("plugrack.toml").unwrap();
//! assert!(config.history.max_depth > 0);
//!
//! let preset = PluginPreset::new("Bright", "eq").with_values([0.8, 0.2, 0.5]);
//! preset.save("presets/bright.toml").unwrap();
//! ```

mod engine_config;
mod error;
mod preset;

pub use engine_config::{
    ChainConfig, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PLUGINS, EngineConfig, HistoryConfig,
};
pub use error::ConfigError;
pub use preset::PluginPreset;
