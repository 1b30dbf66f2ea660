//! Undo/redo stacks.

use std::collections::VecDeque;
use std::fmt;

use plugrack_config::HistoryConfig;

use super::Command;
use crate::error::CommandError;

type RefreshCallback = Box<dyn FnMut(&str) + Send>;

/// Session-wide stack of executed commands.
///
/// The undo side is bounded by `max_depth`; the oldest command is dropped
/// (and with it any plugin it owns) when a new one would exceed it.
pub struct CommandHistory {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_depth: usize,
    coalesce_parameters: bool,
    /// True while the top of the undo stack is the most recently executed
    /// command and nothing was undone or redone since.
    fresh: bool,
    on_refresh: Option<RefreshCallback>,
}

impl CommandHistory {
    /// Create an empty history.
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: config.max_depth.max(1),
            coalesce_parameters: config.coalesce_parameters,
            fresh: false,
            on_refresh: None,
        }
    }

    /// Install the callback fired after a command that
    /// [causes a refresh](Command::causes_refresh) ran successfully. It
    /// receives the command name.
    pub fn set_refresh_callback(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_refresh = Some(Box::new(callback));
    }

    /// Run a command and record it.
    ///
    /// On failure the command is dropped and the stacks are left untouched.
    pub fn execute(&mut self, mut command: Box<dyn Command>) -> Result<(), CommandError> {
        if let Err(err) = command.redo() {
            tracing::warn!(command = command.name(), "execute failed: {err}");
            return Err(err);
        }
        tracing::debug!(command = command.name(), "executed");
        self.notify(command.as_ref());

        if self.undo_stack.len() >= self.max_depth {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(command);
        self.redo_stack.clear();
        self.fresh = true;
        Ok(())
    }

    /// Undo the newest command.
    ///
    /// The command moves to the redo stack even if its `undo()` fails.
    pub fn undo(&mut self) -> Result<(), CommandError> {
        let mut command = self.undo_stack.pop_back().ok_or(CommandError::NothingToUndo)?;
        self.fresh = false;
        let result = command.undo();
        match &result {
            Ok(()) => {
                tracing::debug!(command = command.name(), "undone");
                self.notify(command.as_ref());
            }
            Err(err) => tracing::warn!(command = command.name(), "undo failed: {err}"),
        }
        self.redo_stack.push(command);
        result
    }

    /// Redo the newest undone command.
    ///
    /// The command moves back to the undo stack even if its `redo()` fails.
    pub fn redo(&mut self) -> Result<(), CommandError> {
        let mut command = self.redo_stack.pop().ok_or(CommandError::NothingToRedo)?;
        self.fresh = false;
        let result = command.redo();
        match &result {
            Ok(()) => {
                tracing::debug!(command = command.name(), "redone");
                self.notify(command.as_ref());
            }
            Err(err) => tracing::warn!(command = command.name(), "redo failed: {err}"),
        }
        self.undo_stack.push_back(command);
        result
    }

    /// The most recently executed command, if nothing was undone or redone
    /// since.
    pub fn last_command(&self) -> Option<&dyn Command> {
        if self.fresh {
            self.undo_stack.back().map(|c| c.as_ref())
        } else {
            None
        }
    }

    /// Take the most recently executed command off the history without
    /// undoing it. Same freshness rule as [`last_command`](Self::last_command).
    pub fn remove_last_command(&mut self) -> Option<Box<dyn Command>> {
        if !self.fresh {
            return None;
        }
        self.fresh = false;
        self.undo_stack.pop_back()
    }

    /// Whether parameter edits may be merged.
    pub fn coalesce_parameters(&self) -> bool {
        self.coalesce_parameters
    }

    /// Whether there is anything to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether there is anything to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Name of the command `undo()` would revert.
    pub fn undo_name(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.name())
    }

    /// Name of the command `redo()` would re-apply.
    pub fn redo_name(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.name())
    }

    /// Number of undoable commands.
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Whether there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    /// Number of redoable commands.
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Configured depth limit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Drop every command.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.fresh = false;
    }

    fn notify(&mut self, command: &dyn Command) {
        if command.causes_refresh()
            && let Some(callback) = self.on_refresh.as_mut()
        {
            callback(command.name());
        }
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHistory")
            .field("undo", &self.undo_stack.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("redo", &self.redo_stack.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    /// Adds `delta` to a shared counter; undo subtracts it.
    struct Step {
        name: String,
        counter: Arc<AtomicI32>,
        delta: i32,
        fail: bool,
        refresh: bool,
    }

    impl Step {
        fn boxed(name: &str, counter: &Arc<AtomicI32>, delta: i32) -> Box<Self> {
            Box::new(Self {
                name: name.to_owned(),
                counter: Arc::clone(counter),
                delta,
                fail: false,
                refresh: false,
            })
        }
    }

    impl Command for Step {
        fn name(&self) -> &str {
            &self.name
        }
        fn redo(&mut self) -> Result<(), CommandError> {
            if self.fail {
                return Err(CommandError::NoSession);
            }
            self.counter.fetch_add(self.delta, Ordering::SeqCst);
            Ok(())
        }
        fn undo(&mut self) -> Result<(), CommandError> {
            self.counter.fetch_sub(self.delta, Ordering::SeqCst);
            Ok(())
        }
        fn causes_refresh(&self) -> bool {
            self.refresh
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn execute_undo_redo() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut history = CommandHistory::default();

        history.execute(Step::boxed("a", &counter, 1)).unwrap();
        history.execute(Step::boxed("b", &counter, 10)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert_eq!(history.undo_name(), Some("b"));

        history.undo().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(history.redo_name(), Some("b"));

        history.redo().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert!(!history.can_redo());
    }

    #[test]
    fn execute_truncates_redo_side() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut history = CommandHistory::default();
        history.execute(Step::boxed("a", &counter, 1)).unwrap();
        history.undo().unwrap();
        assert!(history.can_redo());

        history.execute(Step::boxed("b", &counter, 2)).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn failed_execute_leaves_stacks_alone() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut history = CommandHistory::default();
        history.execute(Step::boxed("a", &counter, 1)).unwrap();
        history.execute(Step::boxed("b", &counter, 1)).unwrap();
        history.undo().unwrap();

        let mut bad = Step::boxed("bad", &counter, 100);
        bad.fail = true;
        assert_eq!(history.execute(bad).unwrap_err(), CommandError::NoSession);

        assert_eq!(history.len(), 1);
        assert_eq!(history.redo_len(), 1);
        assert_eq!(history.undo_name(), Some("a"));
        assert_eq!(history.redo_name(), Some("b"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_history_errors() {
        let mut history = CommandHistory::default();
        assert_eq!(history.undo().unwrap_err(), CommandError::NothingToUndo);
        assert_eq!(history.redo().unwrap_err(), CommandError::NothingToRedo);
    }

    #[test]
    fn depth_limit_drops_oldest() {
        let counter = Arc::new(AtomicI32::new(0));
        let config = HistoryConfig {
            max_depth: 2,
            coalesce_parameters: true,
        };
        let mut history = CommandHistory::new(&config);
        for name in ["a", "b", "c"] {
            history.execute(Step::boxed(name, &counter, 1)).unwrap();
        }
        assert_eq!(history.len(), 2);
        history.undo().unwrap();
        history.undo().unwrap();
        assert_eq!(history.undo().unwrap_err(), CommandError::NothingToUndo);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_command_only_while_fresh() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut history = CommandHistory::default();
        assert!(history.last_command().is_none());

        history.execute(Step::boxed("a", &counter, 1)).unwrap();
        history.execute(Step::boxed("b", &counter, 1)).unwrap();
        assert_eq!(history.last_command().unwrap().name(), "b");

        history.undo().unwrap();
        assert!(history.last_command().is_none());
        assert!(history.remove_last_command().is_none());

        history.redo().unwrap();
        assert!(history.last_command().is_none());
    }

    #[test]
    fn remove_last_command_pops_without_undo() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut history = CommandHistory::default();
        history.execute(Step::boxed("a", &counter, 5)).unwrap();
        let removed = history.remove_last_command().unwrap();
        assert_eq!(removed.name(), "a");
        assert!(history.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert!(history.remove_last_command().is_none());
    }

    #[test]
    fn refresh_callback_fires_for_refreshing_commands() {
        let counter = Arc::new(AtomicI32::new(0));
        let fired = Arc::new(AtomicUsize::new(0));
        let mut history = CommandHistory::default();
        let seen = Arc::clone(&fired);
        history.set_refresh_callback(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        history.execute(Step::boxed("quiet", &counter, 1)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let mut loud = Step::boxed("loud", &counter, 1);
        loud.refresh = true;
        history.execute(loud).unwrap();
        history.undo().unwrap();
        history.redo().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clear_empties_both_sides() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut history = CommandHistory::default();
        history.execute(Step::boxed("a", &counter, 1)).unwrap();
        history.execute(Step::boxed("b", &counter, 1)).unwrap();
        history.undo().unwrap();
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
