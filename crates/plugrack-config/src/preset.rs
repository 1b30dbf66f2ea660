//! Plugin preset file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// A named set of parameter values for one plugin type.
///
/// Values are stored in parameter index order, which is also the order of a
/// plugin's value list, so a loaded preset can be handed straight to a
/// preset command.
///
/// # TOML Format
///
/// ```toml
/// name = "Warm Room"
/// description = "Short, dark reverb"
/// plugin = "reverb"
/// values = [0.35, 0.8, 0.2]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginPreset {
    /// Name of the preset.
    pub name: String,

    /// Optional description of the preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Plugin type the values belong to (matched against the plugin name).
    pub plugin: String,

    /// Parameter values in index order.
    #[serde(default)]
    pub values: Vec<f32>,
}

impl PluginPreset {
    /// Create a new empty preset for the given plugin type.
    pub fn new(name: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            plugin: plugin.into(),
            values: Vec::new(),
        }
    }

    /// Create a preset with a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the parameter values.
    pub fn with_values(mut self, values: impl IntoIterator<Item = f32>) -> Self {
        self.values = values.into_iter().collect();
        self
    }

    /// Load a preset from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a preset from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let preset: PluginPreset = toml::from_str(toml_str)?;
        preset.validate()?;
        Ok(preset)
    }

    /// Save the preset to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the preset to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject presets with an empty plugin type or non-finite values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plugin.trim().is_empty() {
            return Err(ConfigError::invalid("plugin", "plugin type is empty"));
        }
        if let Some(index) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(ConfigError::invalid(
                "values",
                format!("value at index {index} is not finite"),
            ));
        }
        Ok(())
    }

    /// Number of values in the preset.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the preset carries no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether this preset was made for the given plugin type.
    pub fn matches(&self, plugin: &str) -> bool {
        self.plugin.eq_ignore_ascii_case(plugin)
    }
}
