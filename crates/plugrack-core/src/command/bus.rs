//! Dedicated audio output toggle.

use std::any::Any;
use std::sync::{Arc, Weak};

use super::Command;
use crate::device::AudioOutputBus;
use crate::error::CommandError;

/// Switch a device between its track output and dedicated output buses.
pub struct AudioOutputBusCommand {
    device: Weak<dyn AudioOutputBus>,
    enabled: bool,
}

impl AudioOutputBusCommand {
    /// Set the dedicated-outputs flag of `device` to `enabled`.
    pub fn new(device: &Arc<dyn AudioOutputBus>, enabled: bool) -> Self {
        Self {
            device: Arc::downgrade(device),
            enabled,
        }
    }

    fn swap(&mut self) -> Result<(), CommandError> {
        let device = self.device.upgrade().ok_or(CommandError::MissingTarget)?;
        let previous = device.is_audio_output_bus();
        device.set_audio_output_bus(self.enabled);
        tracing::debug!(enabled = self.enabled, "dedicated audio outputs");
        self.enabled = previous;
        Ok(())
    }
}

impl Command for AudioOutputBusCommand {
    fn name(&self) -> &str {
        "dedicated audio outputs"
    }

    fn redo(&mut self) -> Result<(), CommandError> {
        self.swap()
    }

    fn undo(&mut self) -> Result<(), CommandError> {
        self.swap()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for AudioOutputBusCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOutputBusCommand")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::OutputBusFlag;

    #[test]
    fn running_twice_returns_to_start() {
        let flag: Arc<dyn AudioOutputBus> = Arc::new(OutputBusFlag::new(false));
        let mut cmd = AudioOutputBusCommand::new(&flag, true);
        cmd.redo().unwrap();
        assert!(flag.is_audio_output_bus());
        cmd.redo().unwrap();
        assert!(!flag.is_audio_output_bus());
    }

    #[test]
    fn refreshes_views() {
        let flag: Arc<dyn AudioOutputBus> = Arc::new(OutputBusFlag::default());
        let cmd = AudioOutputBusCommand::new(&flag, true);
        assert!(cmd.causes_refresh());
        assert_eq!(cmd.name(), "dedicated audio outputs");
    }

    #[test]
    fn dropped_device_is_missing() {
        let flag: Arc<dyn AudioOutputBus> = Arc::new(OutputBusFlag::default());
        let mut cmd = AudioOutputBusCommand::new(&flag, true);
        drop(flag);
        assert_eq!(cmd.redo().unwrap_err(), CommandError::MissingTarget);
    }
}
