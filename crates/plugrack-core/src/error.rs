//! Error types for command execution and presentation callbacks.

use thiserror::Error;

use crate::ids::{ChainId, PluginId};

/// Why a command, or a history move, could not be carried out.
///
/// A failed command leaves the chain untouched. The caller (normally the UI
/// layer) decides how to report it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The session the command was built for is closed or gone.
    #[error("no active session")]
    NoSession,

    /// The plugin, parameter, chain or device a command targets no longer exists.
    #[error("command target is missing")]
    MissingTarget,

    /// The plugin is not bound to any chain, so there is nowhere to place it.
    #[error("plugin {0} has no chain")]
    NoChain(PluginId),

    /// Inserting would exceed the chain's capacity.
    #[error("chain {chain} is full ({capacity} plugins)")]
    ChainFull {
        /// The chain that has no room left.
        chain: ChainId,
        /// Configured capacity of that chain.
        capacity: usize,
    },

    /// `undo()` was called with an empty undo stack.
    #[error("nothing to undo")]
    NothingToUndo,

    /// `redo()` was called with an empty redo stack.
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Failure reported by a presentation surface.
///
/// Never fails the command that triggered the refresh; it is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("editor update failed: {0}")]
pub struct EditorError(pub String);

impl EditorError {
    /// Create an editor error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
