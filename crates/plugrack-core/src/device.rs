//! Devices whose output routing can be toggled by a command.

use std::sync::atomic::{AtomicBool, Ordering};

/// A device (typically a MIDI instrument manager) that can route its audio
/// through dedicated output buses instead of the track's own output.
pub trait AudioOutputBus: Send + Sync {
    /// Whether dedicated audio outputs are enabled.
    fn is_audio_output_bus(&self) -> bool;

    /// Enable or disable dedicated audio outputs.
    fn set_audio_output_bus(&self, enabled: bool);
}

/// Atomic flag implementation of [`AudioOutputBus`].
#[derive(Debug, Default)]
pub struct OutputBusFlag {
    enabled: AtomicBool,
}

impl OutputBusFlag {
    /// Create a flag in the given state.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }
}

impl AudioOutputBus for OutputBusFlag {
    fn is_audio_output_bus(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_audio_output_bus(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}
