//! Undoable plugin-chain editing for a real-time audio engine.
//!
//! Every track and bus owns a [`PluginChain`]. Edits to chains and plugins
//! are expressed as [`Command`]s and run through the session's
//! [`CommandHistory`], so each can be undone and redone. The audio thread
//! reads chain order, bypass flags and parameter values concurrently through
//! a [`ProcessView`] and never blocks on an edit.
//!
//! # Features
//!
//! - **Plugin chains**: ordered, capacity-bounded, published atomically
//! - **Plugin commands**: add, insert, remove, move, activate, preset, reset
//! - **Parameter edits**: continuous control gestures collapse into one undo step
//! - **History**: bounded undo/redo stacks with a refresh callback
//! - **Audio side**: wait-free per-chain reads, non-blocking session snapshots
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use plugrack_core::{
//!     AddPluginCommand, EngineConfig, NullHost, ParamDescriptor, ProcessView, Session,
//! };
//!
//! let session = Session::new(EngineConfig::default());
//! let track = session.create_chain("Track 1");
//! let eq = session.create_plugin(
//!     &track,
//!     "eq",
//!     vec![ParamDescriptor::unit("Gain", 0.5)],
//!     Box::new(NullHost),
//! );
//!
//! session
//!     .execute(Box::new(AddPluginCommand::new(&session, Arc::clone(&eq))))
//!     .unwrap();
//! session.edit_parameter(&eq.params()[0], 0.8, true).unwrap();
//!
//! let mut view = ProcessView::new();
//! assert!(view.refresh(&session));
//! assert_eq!(view.chain(track.id()).len(), 1);
//!
//! session.undo().unwrap();
//! assert_eq!(eq.params()[0].value(), 0.5);
//! ```

pub mod chain;
pub mod command;
pub mod device;
pub mod error;
pub mod ids;
pub mod param;
pub mod plugin;
pub mod session;

pub use chain::PluginChain;
pub use command::{
    ActivatePluginCommand, AddInsertPluginCommand, AddPluginCommand, AudioOutputBusCommand,
    Command, CommandHistory, InsertPluginCommand, MovePluginCommand, Ownership,
    ParameterCommand, PluginCommand, PresetPluginCommand, RemovePluginCommand,
    ResetPluginCommand, Slot,
};
pub use device::{AudioOutputBus, OutputBusFlag};
pub use error::{CommandError, EditorError};
pub use ids::{ChainId, PluginId};
pub use param::{ParamDescriptor, PluginParameter};
pub use plugin::{NullHost, Plugin, PluginEditor, PluginHost};
pub use session::{ChainSnapshot, ProcessView, Session, SessionSnapshot, StructuralGuard};

/// Re-export the configuration types sessions are built from.
pub use plugrack_config::{ChainConfig, EngineConfig, HistoryConfig, PluginPreset};
