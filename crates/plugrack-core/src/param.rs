//! Plugin parameters.
//!
//! A [`PluginParameter`] is written by the UI thread (directly while a knob is
//! dragged, or through a [`ParameterCommand`](crate::ParameterCommand)) and
//! read by the audio thread on every block. Values are `f32` bit-cast into
//! `AtomicU32`, so both sides see whole values without taking the structural
//! lock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use crate::plugin::Plugin;

/// Static description of one parameter: display name, range and default.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    /// Display name (e.g. `"Cutoff"`).
    pub name: String,
    /// Smallest accepted value.
    pub min: f32,
    /// Largest accepted value.
    pub max: f32,
    /// Value restored by a plugin reset.
    pub default: f32,
}

impl ParamDescriptor {
    /// Describe a parameter with an explicit range.
    pub fn new(name: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        debug_assert!(min <= max, "inverted parameter range");
        Self {
            name: name.into(),
            min,
            max,
            default: default.clamp(min, max),
        }
    }

    /// Describe a normalized `0.0..=1.0` parameter.
    pub fn unit(name: impl Into<String>, default: f32) -> Self {
        Self::new(name, 0.0, 1.0, default)
    }

    /// Clamp a value into this parameter's range.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// One parameter of a [`Plugin`].
///
/// Besides the current value it remembers the value it held right before the
/// last write. A parameter command created after an external write (a knob
/// drag) uses that previous value as its rollback point.
#[derive(Debug)]
pub struct PluginParameter {
    index: usize,
    descriptor: ParamDescriptor,
    value: AtomicU32,
    prev_value: AtomicU32,
    plugin: Weak<Plugin>,
}

impl PluginParameter {
    pub(crate) fn new(index: usize, descriptor: ParamDescriptor, plugin: Weak<Plugin>) -> Self {
        let bits = descriptor.default.to_bits();
        Self {
            index,
            descriptor,
            value: AtomicU32::new(bits),
            prev_value: AtomicU32::new(bits),
            plugin,
        }
    }

    /// Position of this parameter in its plugin.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Range and default.
    pub fn descriptor(&self) -> &ParamDescriptor {
        &self.descriptor
    }

    /// Current value (lock-free, safe from the audio thread).
    pub fn value(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Acquire))
    }

    /// Value held right before the last write.
    pub fn prev_value(&self) -> f32 {
        f32::from_bits(self.prev_value.load(Ordering::Acquire))
    }

    /// The owning plugin, or `None` once it has been destroyed.
    pub fn plugin(&self) -> Option<Arc<Plugin>> {
        self.plugin.upgrade()
    }

    /// Write a new value, clamped to the descriptor range.
    ///
    /// The overwritten value becomes [`prev_value`](Self::prev_value). With
    /// `update` set, the owning plugin's host is asked to apply the value to
    /// the running instance right away.
    pub fn set_value(&self, value: f32, update: bool) {
        let clamped = self.descriptor.clamp(value);
        let old = self.value.swap(clamped.to_bits(), Ordering::AcqRel);
        self.prev_value.store(old, Ordering::Release);

        if update && let Some(plugin) = self.plugin() {
            plugin.host().update_param(self.index, clamped);
        }
    }

    /// Restore the descriptor default without notifying the host.
    pub fn reset(&self) {
        self.set_value(self.descriptor.default, false);
    }
}
