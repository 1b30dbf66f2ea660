//! Reversible commands and the history that drives them.
//!
//! # Toggle-in-place commands
//!
//! Most commands here keep a single pending value. `redo()` applies it to the
//! target, captures what it overwrote and stores that as the new pending
//! value, so `undo()` is just another `redo()`. As a consequence these
//! commands are **not idempotent**: two `redo()` calls in a row bring the
//! target back to where it started. [`CommandHistory`] never calls `redo()`
//! twice without an `undo()` in between.
//!
//! # Ownership of detached plugins
//!
//! Structural plugin commands record who owns their target plugins in an
//! [`Ownership`] tag. While a target is unlinked from every chain the command
//! owns it. Several history entries can own the same detached plugin; it is
//! freed when the last of them is dropped.

mod bus;
mod history;
mod param;
mod plugin;

use std::any::Any;

use crate::error::CommandError;

pub use bus::AudioOutputBusCommand;
pub use history::CommandHistory;
pub use param::ParameterCommand;
pub use plugin::{
    ActivatePluginCommand, AddInsertPluginCommand, AddPluginCommand, InsertPluginCommand,
    MovePluginCommand, Ownership, PluginCommand, PresetPluginCommand, RemovePluginCommand,
    ResetPluginCommand, Slot,
};

/// A reversible edit.
pub trait Command: Send + 'static {
    /// Text shown in the undo/redo menu entries.
    fn name(&self) -> &str;

    /// Apply (or re-apply) the edit.
    fn redo(&mut self) -> Result<(), CommandError>;

    /// Revert the edit.
    fn undo(&mut self) -> Result<(), CommandError>;

    /// Whether a successful run should trigger a global refresh of the views.
    fn causes_refresh(&self) -> bool {
        true
    }

    /// Downcasting hook used by parameter edit coalescing.
    fn as_any(&self) -> &dyn Any;
}
