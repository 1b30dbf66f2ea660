//! Commands that edit plugin chains and plugin-wide state.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use plugrack_config::PluginPreset;

use super::Command;
use crate::chain::PluginChain;
use crate::error::CommandError;
use crate::plugin::Plugin;
use crate::session::Session;

/// Who keeps a command's target plugins alive.
///
/// A plugin is freed with its last handle, so an owning command frees only
/// the targets no other chain or history entry still refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The targets are detached and the command holds them until dropped.
    Owned,
    /// The targets are linked into chains, which keep them alive.
    NotOwned,
}

/// Target list and ownership state shared by every plugin command.
pub struct PluginCommand {
    name: String,
    session: Weak<Session>,
    plugins: Vec<Arc<Plugin>>,
    /// Successor each target had when it was last detached, parallel to
    /// `plugins`. Used by `attach_all` to put targets back where they were.
    anchors: Vec<Option<Arc<Plugin>>>,
    ownership: Ownership,
}

impl PluginCommand {
    /// Create a command targeting one plugin.
    pub fn new(name: impl Into<String>, session: &Session, plugin: Arc<Plugin>) -> Self {
        let ownership = Self::initial_ownership(std::slice::from_ref(&plugin));
        Self {
            name: name.into(),
            session: session.handle(),
            plugins: vec![plugin],
            anchors: vec![None],
            ownership,
        }
    }

    /// Append another target.
    pub fn add_plugin(&mut self, plugin: Arc<Plugin>) {
        self.plugins.push(plugin);
        self.anchors.push(None);
        self.ownership = Self::initial_ownership(&self.plugins);
    }

    /// Targets in the order they were added.
    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    /// Current ownership of the targets.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Link every target into its home chain, in target order.
    ///
    /// Targets return in front of the successor they had when
    /// [`detach_all`](Self::detach_all) unlinked them, or at the end of the
    /// chain if there is none. Fails without changing anything when a home
    /// chain lacks room for all the targets bound to it.
    pub fn attach_all(&mut self) -> Result<(), CommandError> {
        let session = Session::active(&self.session)?;
        let guard = session.lock();

        let mut demand: Vec<(Arc<PluginChain>, usize)> = Vec::new();
        for plugin in &self.plugins {
            let chain = plugin.chain().ok_or(CommandError::NoChain(plugin.id()))?;
            if chain.contains(plugin) {
                continue;
            }
            match demand.iter_mut().find(|(c, _)| c.id() == chain.id()) {
                Some((_, count)) => *count += 1,
                None => demand.push((chain, 1)),
            }
        }
        if let Some((chain, _)) = demand.iter().find(|(c, count)| c.vacancy() < *count) {
            return Err(CommandError::ChainFull {
                chain: chain.id(),
                capacity: chain.capacity(),
            });
        }

        for (plugin, anchor) in self.plugins.iter().zip(&mut self.anchors) {
            if let Some(chain) = plugin.chain()
                && !chain.contains(plugin)
            {
                let before = anchor.take();
                chain.insert(&guard, plugin, before.as_deref())?;
            }
        }
        self.ownership = Ownership::NotOwned;
        tracing::debug!(command = %self.name, count = self.plugins.len(), "attached");
        Ok(())
    }

    /// Unlink every target from its chain, in reverse target order.
    pub fn detach_all(&mut self) -> Result<(), CommandError> {
        let session = Session::active(&self.session)?;
        let guard = session.lock();

        for (plugin, anchor) in self.plugins.iter().zip(&mut self.anchors).rev() {
            if let Some(chain) = plugin.chain() {
                *anchor = chain.next(plugin);
                chain.remove(&guard, plugin);
            }
        }
        self.ownership = Ownership::Owned;
        tracing::debug!(command = %self.name, count = self.plugins.len(), "detached");
        Ok(())
    }

    fn target(&self) -> &Arc<Plugin> {
        // constructors always store one target
        &self.plugins[0]
    }

    fn initial_ownership(plugins: &[Arc<Plugin>]) -> Ownership {
        if plugins.iter().any(|p| p.is_attached()) {
            Ownership::NotOwned
        } else {
            Ownership::Owned
        }
    }
}

impl Drop for PluginCommand {
    fn drop(&mut self) {
        if self.ownership == Ownership::Owned {
            let last = self
                .plugins
                .iter()
                .filter(|&p| Arc::strong_count(p) == 1)
                .count();
            if last > 0 {
                tracing::debug!(command = %self.name, count = last, "freeing detached plugins");
            }
        }
    }
}

impl fmt::Debug for PluginCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCommand")
            .field("name", &self.name)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.id()).collect::<Vec<_>>(),
            )
            .field("ownership", &self.ownership)
            .finish_non_exhaustive()
    }
}

/// Implement [`Command`] for a struct holding a `base: PluginCommand`, given
/// the inherent methods that do the work.
macro_rules! impl_plugin_command {
    ($command:ty, redo = $redo:ident, undo = $undo:ident) => {
        impl $command {
            /// Shared target list and ownership state.
            pub fn base(&self) -> &PluginCommand {
                &self.base
            }

            /// Append another target.
            pub fn add_plugin(&mut self, plugin: Arc<Plugin>) {
                self.base.add_plugin(plugin);
            }

            /// Builder form of [`add_plugin`](Self::add_plugin).
            pub fn with_plugin(mut self, plugin: Arc<Plugin>) -> Self {
                self.base.add_plugin(plugin);
                self
            }
        }

        impl Command for $command {
            fn name(&self) -> &str {
                self.base.name()
            }
            fn redo(&mut self) -> Result<(), CommandError> {
                self.$redo()
            }
            fn undo(&mut self) -> Result<(), CommandError> {
                self.$undo()
            }
            fn causes_refresh(&self) -> bool {
                false
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

// ── Add / remove ────────────────────────────────────────────────────────────

/// Link new plugins into their home chains.
#[derive(Debug)]
pub struct AddPluginCommand {
    base: PluginCommand,
}

impl AddPluginCommand {
    /// Add `plugin` to the end of its home chain.
    pub fn new(session: &Session, plugin: Arc<Plugin>) -> Self {
        Self {
            base: PluginCommand::new("add plugin", session, plugin),
        }
    }

    fn attach(&mut self) -> Result<(), CommandError> {
        self.base.attach_all()
    }

    fn detach(&mut self) -> Result<(), CommandError> {
        self.base.detach_all()
    }
}

impl_plugin_command!(AddPluginCommand, redo = attach, undo = detach);

/// Link a new insert (send/return) pseudo-plugin into its home chain.
#[derive(Debug)]
pub struct AddInsertPluginCommand {
    base: PluginCommand,
}

impl AddInsertPluginCommand {
    /// Add the insert `plugin` to the end of its home chain.
    pub fn new(session: &Session, plugin: Arc<Plugin>) -> Self {
        Self {
            base: PluginCommand::new("add insert", session, plugin),
        }
    }

    fn attach(&mut self) -> Result<(), CommandError> {
        self.base.attach_all()
    }

    fn detach(&mut self) -> Result<(), CommandError> {
        self.base.detach_all()
    }
}

impl_plugin_command!(AddInsertPluginCommand, redo = attach, undo = detach);

/// Unlink plugins from their chains.
#[derive(Debug)]
pub struct RemovePluginCommand {
    base: PluginCommand,
}

impl RemovePluginCommand {
    /// Remove `plugin` from its chain.
    pub fn new(session: &Session, plugin: Arc<Plugin>) -> Self {
        Self {
            base: PluginCommand::new("remove plugin", session, plugin),
        }
    }

    fn detach(&mut self) -> Result<(), CommandError> {
        self.base.detach_all()
    }

    fn attach(&mut self) -> Result<(), CommandError> {
        self.base.attach_all()
    }
}

impl_plugin_command!(RemovePluginCommand, redo = detach, undo = attach);

// ── Positioning ─────────────────────────────────────────────────────────────

/// Where a plugin sits in its home chain.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Not linked into the chain.
    Detached,
    /// Linked in front of the given plugin, or last when `None`.
    Before(Option<Arc<Plugin>>),
}

/// Place a plugin at a position in its home chain.
///
/// Each run stores the slot the plugin occupied before, so running it again
/// puts the plugin back, including taking it out of the chain if it was not
/// linked in.
#[derive(Debug)]
pub struct InsertPluginCommand {
    base: PluginCommand,
    slot: Slot,
}

impl InsertPluginCommand {
    /// Insert `plugin` in front of `before` (at the end when `None`).
    pub fn new(session: &Session, plugin: Arc<Plugin>, before: Option<Arc<Plugin>>) -> Self {
        Self::named("insert plugin", session, plugin, before)
    }

    /// Same as [`new`](Self::new) with a custom display name.
    pub fn named(
        name: impl Into<String>,
        session: &Session,
        plugin: Arc<Plugin>,
        before: Option<Arc<Plugin>>,
    ) -> Self {
        Self {
            base: PluginCommand::new(name, session, plugin),
            slot: Slot::Before(before),
        }
    }

    /// The slot the next run will apply.
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    fn swap(&mut self) -> Result<(), CommandError> {
        let session = Session::active(&self.base.session)?;
        let plugin = Arc::clone(self.base.target());
        let chain = plugin.chain().ok_or(CommandError::NoChain(plugin.id()))?;
        let guard = session.lock();

        let previous = if chain.contains(&plugin) {
            Slot::Before(chain.next(&plugin))
        } else {
            Slot::Detached
        };
        match &self.slot {
            Slot::Detached => {
                chain.remove(&guard, &plugin);
                self.base.ownership = Ownership::Owned;
            }
            Slot::Before(before) => {
                chain.insert(&guard, &plugin, before.as_deref())?;
                self.base.ownership = Ownership::NotOwned;
            }
        }
        self.slot = previous;
        Ok(())
    }
}

impl_plugin_command!(InsertPluginCommand, redo = swap, undo = swap);

/// Move a plugin to a position in any chain of the session.
///
/// A plugin that was not linked in when the move ran is taken out again on
/// undo and gets its old home chain back.
#[derive(Debug)]
pub struct MovePluginCommand {
    base: PluginCommand,
    /// Destination of the next run, or the home chain to restore when
    /// `slot` is [`Slot::Detached`].
    chain: Weak<PluginChain>,
    slot: Slot,
}

impl MovePluginCommand {
    /// Move `plugin` into `chain`, in front of `before` (at the end when
    /// `None`).
    pub fn new(
        session: &Session,
        plugin: Arc<Plugin>,
        before: Option<Arc<Plugin>>,
        chain: &Arc<PluginChain>,
    ) -> Self {
        Self {
            base: PluginCommand::new("move plugin", session, plugin),
            chain: Arc::downgrade(chain),
            slot: Slot::Before(before),
        }
    }

    /// The slot the next run will apply.
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    fn swap(&mut self) -> Result<(), CommandError> {
        let session = Session::active(&self.base.session)?;
        let plugin = Arc::clone(self.base.target());
        let guard = session.lock();

        let home = plugin.chain();
        let previous = if plugin.is_attached() {
            Slot::Before(plugin.next())
        } else {
            Slot::Detached
        };
        match &self.slot {
            Slot::Before(before) => {
                let destination = self.chain.upgrade().ok_or(CommandError::MissingTarget)?;
                destination.move_plugin(&guard, &plugin, before.as_deref())?;
                self.base.ownership = Ownership::NotOwned;
            }
            Slot::Detached => {
                if let Some(home) = &home {
                    home.remove(&guard, &plugin);
                }
                plugin.set_chain(self.chain.clone());
                self.base.ownership = Ownership::Owned;
            }
        }
        self.chain = home.as_ref().map_or_else(Weak::new, Arc::downgrade);
        self.slot = previous;
        Ok(())
    }
}

impl_plugin_command!(MovePluginCommand, redo = swap, undo = swap);

// ── Plugin-wide state ───────────────────────────────────────────────────────

/// Bypass or enable plugins.
#[derive(Debug)]
pub struct ActivatePluginCommand {
    base: PluginCommand,
    activated: bool,
}

impl ActivatePluginCommand {
    /// Set the activated flag of `plugin` (and later added targets).
    pub fn new(session: &Session, plugin: Arc<Plugin>, activated: bool) -> Self {
        Self {
            base: PluginCommand::new("activate plugin", session, plugin),
            activated,
        }
    }

    fn toggle(&mut self) -> Result<(), CommandError> {
        for plugin in self.base.plugins() {
            plugin.set_activated(self.activated);
        }
        self.activated = !self.activated;
        Ok(())
    }
}

impl_plugin_command!(ActivatePluginCommand, redo = toggle, undo = toggle);

/// Load a whole value list into a plugin.
#[derive(Debug)]
pub struct PresetPluginCommand {
    base: PluginCommand,
    values: Vec<f32>,
}

impl PresetPluginCommand {
    /// Apply `values` (parameter index order) to `plugin`.
    pub fn new(session: &Session, plugin: Arc<Plugin>, values: Vec<f32>) -> Self {
        Self {
            base: PluginCommand::new("preset plugin", session, plugin),
            values,
        }
    }

    /// Apply a stored preset.
    pub fn from_preset(session: &Session, plugin: Arc<Plugin>, preset: &PluginPreset) -> Self {
        if !preset.matches(plugin.name()) {
            tracing::warn!(
                plugin = %plugin.id(),
                preset = %preset.name,
                made_for = %preset.plugin,
                "preset made for a different plugin type"
            );
        }
        Self::new(session, plugin, preset.values.clone())
    }

    fn swap(&mut self) -> Result<(), CommandError> {
        let plugin = self.base.target();
        let previous = plugin.value_list();
        plugin.set_value_list(&self.values);
        plugin.realize_values();
        self.values = previous;
        plugin.refresh_editor();
        Ok(())
    }
}

impl_plugin_command!(PresetPluginCommand, redo = swap, undo = swap);

/// Restore a plugin's defaults.
#[derive(Debug)]
pub struct ResetPluginCommand {
    base: PluginCommand,
    reset: bool,
    values: Vec<f32>,
}

impl ResetPluginCommand {
    /// Reset `plugin` to its defaults.
    pub fn new(session: &Session, plugin: Arc<Plugin>) -> Self {
        Self {
            base: PluginCommand::new("reset plugin", session, plugin),
            reset: false,
            values: Vec::new(),
        }
    }

    fn toggle(&mut self) -> Result<(), CommandError> {
        let plugin = self.base.target();
        self.reset = !self.reset;
        if self.reset {
            self.values = plugin.value_list();
            plugin.reset();
        } else {
            plugin.set_value_list(&self.values);
            plugin.realize_values();
        }
        plugin.refresh_editor();
        Ok(())
    }
}

impl_plugin_command!(ResetPluginCommand, redo = toggle, undo = toggle);
