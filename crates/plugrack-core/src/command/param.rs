//! Parameter edits, with coalescing of continuous gestures.

use std::any::Any;
use std::sync::Arc;

use super::{Command, CommandHistory};
use crate::error::CommandError;
use crate::param::PluginParameter;

/// Set one plugin parameter.
///
/// Holds a pending value and a rollback value; every run applies the pending
/// one and swaps the two.
#[derive(Debug)]
pub struct ParameterCommand {
    name: String,
    param: Arc<PluginParameter>,
    value: f32,
    prev_value: f32,
    update: bool,
}

impl ParameterCommand {
    /// Set `param` to `value`.
    ///
    /// If the parameter already holds `value` (a control moved it live), the
    /// rollback point is the value it held before that write; otherwise it is
    /// the current value. `update` decides whether the first run pushes the
    /// value to the running instance; later runs always do.
    pub fn new(param: Arc<PluginParameter>, value: f32, update: bool) -> Self {
        let value = param.descriptor().clamp(value);
        let prev_value = if param.value() == value {
            param.prev_value()
        } else {
            param.value()
        };
        Self {
            name: param.name().to_lowercase(),
            param,
            value,
            prev_value,
            update,
        }
    }

    /// Like [`new`](Self::new), but merge with the newest history entry when
    /// it is an edit of the same parameter moving in the same direction.
    ///
    /// The merged entry is taken off `history` and its rollback point is
    /// kept, so one undo reverts the whole gesture. Nothing is merged when
    /// coalescing is disabled or when anything was executed, undone or
    /// redone since that entry.
    pub fn coalescing(
        history: &mut CommandHistory,
        param: Arc<PluginParameter>,
        value: f32,
        update: bool,
    ) -> Self {
        let mut command = Self::new(param, value, update);
        if !history.coalesce_parameters() {
            return command;
        }

        let rollback = history
            .last_command()
            .and_then(|last| last.as_any().downcast_ref::<ParameterCommand>())
            .filter(|last| Arc::ptr_eq(&last.param, &command.param))
            .and_then(|last| {
                // after a run `prev_value` is what was applied, `value` is the
                // rollback point
                let applied = last.prev_value;
                let rollback = last.value;
                let prev_sign = if applied > rollback { 1 } else { -1 };
                let curr_sign = if applied < command.value { 1 } else { -1 };
                (prev_sign == curr_sign).then_some(rollback)
            });

        if let Some(rollback) = rollback {
            history.remove_last_command();
            command.prev_value = rollback;
            tracing::trace!(param = %command.name, rollback, "coalesced parameter edit");
        }
        command
    }

    /// The edited parameter.
    pub fn param(&self) -> &Arc<PluginParameter> {
        &self.param
    }

    /// Value the next run applies.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Value the next run captures as its own rollback point; after a run,
    /// the value that was applied.
    pub fn prev_value(&self) -> f32 {
        self.prev_value
    }

    fn swap(&mut self) -> Result<(), CommandError> {
        let plugin = self.param.plugin().ok_or(CommandError::MissingTarget)?;

        self.param.set_value(self.value, self.update);
        std::mem::swap(&mut self.value, &mut self.prev_value);
        self.update = true;

        plugin.update_editor_control(self.param.index());
        Ok(())
    }
}

impl Command for ParameterCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn redo(&mut self) -> Result<(), CommandError> {
        self.swap()
    }

    fn undo(&mut self) -> Result<(), CommandError> {
        self.swap()
    }

    fn causes_refresh(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ActivatePluginCommand;
    use crate::param::ParamDescriptor;
    use crate::plugin::{NullHost, Plugin};
    use crate::session::Session;
    use plugrack_config::{EngineConfig, HistoryConfig};

    fn plugin() -> (Arc<Session>, Arc<Plugin>) {
        let session = Session::new(EngineConfig::default());
        let chain = session.create_chain("Track 1");
        let plugin = session.create_plugin(
            &chain,
            "Comp",
            vec![
                ParamDescriptor::unit("Threshold", 0.2),
                ParamDescriptor::unit("Ratio", 0.5),
            ],
            Box::new(NullHost),
        );
        (session, plugin)
    }

    /// A control moves the parameter, then the edit is recorded.
    fn drag(history: &mut CommandHistory, param: &Arc<PluginParameter>, value: f32) {
        param.set_value(value, true);
        let command = ParameterCommand::coalescing(history, Arc::clone(param), value, false);
        history.execute(Box::new(command)).unwrap();
    }

    fn top(history: &CommandHistory) -> &ParameterCommand {
        history
            .last_command()
            .and_then(|c| c.as_any().downcast_ref::<ParameterCommand>())
            .unwrap()
    }

    #[test]
    fn name_is_lowercase_param_name() {
        let (_session, plugin) = plugin();
        let cmd = ParameterCommand::new(Arc::clone(&plugin.params()[0]), 0.4, false);
        assert_eq!(cmd.name(), "threshold");
        assert!(!cmd.causes_refresh());
    }

    #[test]
    fn redo_undo_swaps_values() {
        let (_session, plugin) = plugin();
        let param = Arc::clone(&plugin.params()[1]);
        let mut cmd = ParameterCommand::new(Arc::clone(&param), 0.9, false);
        cmd.redo().unwrap();
        assert_eq!(param.value(), 0.9);
        cmd.undo().unwrap();
        assert_eq!(param.value(), 0.5);
        cmd.redo().unwrap();
        assert_eq!(param.value(), 0.9);
    }

    #[test]
    fn live_edit_rolls_back_to_previous_value() {
        let (_session, plugin) = plugin();
        let param = Arc::clone(&plugin.params()[1]);
        param.set_value(0.7, false);
        let mut cmd = ParameterCommand::new(Arc::clone(&param), 0.7, false);
        cmd.redo().unwrap();
        cmd.undo().unwrap();
        assert_eq!(param.value(), 0.5);
    }

    #[test]
    fn same_direction_edits_coalesce() {
        let (_session, plugin) = plugin();
        let param = Arc::clone(&plugin.params()[0]);
        let mut history = CommandHistory::default();

        drag(&mut history, &param, 0.5);
        drag(&mut history, &param, 0.8);
        assert_eq!(history.len(), 1);
        assert_eq!(top(&history).value(), 0.2);
        assert_eq!(top(&history).prev_value(), 0.8);

        drag(&mut history, &param, 0.3);
        assert_eq!(history.len(), 2);
        assert_eq!(top(&history).value(), 0.8);

        history.undo().unwrap();
        assert_eq!(param.value(), 0.8);
        history.undo().unwrap();
        assert_eq!(param.value(), 0.2);
    }

    #[test]
    fn different_parameter_does_not_coalesce() {
        let (_session, plugin) = plugin();
        let mut history = CommandHistory::default();
        drag(&mut history, &plugin.params()[0], 0.5);
        drag(&mut history, &plugin.params()[1], 0.8);
        drag(&mut history, &plugin.params()[0], 0.9);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn intervening_command_breaks_coalescing() {
        let (session, plugin) = plugin();
        let param = Arc::clone(&plugin.params()[0]);
        let mut history = CommandHistory::default();
        drag(&mut history, &param, 0.5);
        history
            .execute(Box::new(ActivatePluginCommand::new(
                &session,
                Arc::clone(&plugin),
                false,
            )))
            .unwrap();
        drag(&mut history, &param, 0.8);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn undo_breaks_coalescing() {
        let (_session, plugin) = plugin();
        let param = Arc::clone(&plugin.params()[0]);
        let mut history = CommandHistory::default();
        drag(&mut history, &param, 0.4);
        drag(&mut history, &param, 0.5);
        history.undo().unwrap();
        history.redo().unwrap();
        drag(&mut history, &param, 0.8);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn coalescing_can_be_disabled() {
        let (_session, plugin) = plugin();
        let param = Arc::clone(&plugin.params()[0]);
        let mut history = CommandHistory::new(&HistoryConfig {
            max_depth: 10,
            coalesce_parameters: false,
        });
        drag(&mut history, &param, 0.5);
        drag(&mut history, &param, 0.8);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn missing_plugin_fails() {
        let (session, plugin) = plugin();
        let param = Arc::clone(&plugin.params()[0]);
        let mut cmd = ParameterCommand::new(Arc::clone(&param), 0.9, false);
        drop(plugin);
        drop(session);
        assert_eq!(cmd.redo().unwrap_err(), CommandError::MissingTarget);
    }
}
