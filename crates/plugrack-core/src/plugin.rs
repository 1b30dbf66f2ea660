//! Plugin instances and the collaborators they talk to.
//!
//! A [`Plugin`] is shared between its chain, the commands that target it and
//! the audio thread, so it lives behind an `Arc` and every field the audio
//! thread reads (activated flag, parameter values) is atomic.
//!
//! The DSP side of a plugin is reached through [`PluginHost`] and its editor
//! window through [`PluginEditor`]; both are implemented outside this crate.
//! The host is released when the last `Arc<Plugin>` goes away, so a plugin
//! that any chain or command can still reach always has a live instance.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::chain::PluginChain;
use crate::error::EditorError;
use crate::ids::PluginId;
use crate::param::{ParamDescriptor, PluginParameter};

/// The running DSP instance behind a [`Plugin`].
///
/// Every method has an empty default so hosts only implement what they need.
pub trait PluginHost: Send + Sync {
    /// Push a full value list into the running instance.
    fn realize_values(&self, _values: &[f32]) {}

    /// Push a single parameter value into the running instance.
    fn update_param(&self, _index: usize, _value: f32) {}

    /// Restore the instance's factory state.
    fn reset(&self) {}

    /// The last handle to the plugin was dropped; free the instance.
    fn release(&self) {}
}

/// A host that does nothing, for plugins without a DSP instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl PluginHost for NullHost {}

/// The presentation surface of a plugin (its editor form).
pub trait PluginEditor: Send + Sync {
    /// Repaint every control.
    fn refresh(&self) -> Result<(), EditorError>;

    /// Repaint the control of one parameter.
    fn update_control(&self, index: usize) -> Result<(), EditorError>;
}

/// A plugin instance in (or destined for) a [`PluginChain`].
pub struct Plugin {
    id: PluginId,
    name: String,
    /// Bypass gate read by the audio thread.
    activated: AtomicBool,
    params: Vec<Arc<PluginParameter>>,
    /// Home chain. Kept after the plugin is unlinked so that undo can put it
    /// back; only written under the structural lock.
    chain: RwLock<Weak<PluginChain>>,
    editor: RwLock<Option<Arc<dyn PluginEditor>>>,
    host: Box<dyn PluginHost>,
}

impl Plugin {
    pub(crate) fn new(
        id: PluginId,
        name: impl Into<String>,
        descriptors: Vec<ParamDescriptor>,
        host: Box<dyn PluginHost>,
        chain: Weak<PluginChain>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|weak: &Weak<Plugin>| Plugin {
            id,
            name,
            activated: AtomicBool::new(true),
            params: descriptors
                .into_iter()
                .enumerate()
                .map(|(index, desc)| Arc::new(PluginParameter::new(index, desc, weak.clone())))
                .collect(),
            chain: RwLock::new(chain),
            editor: RwLock::new(None),
            host,
        })
    }

    /// Session-unique identity.
    pub fn id(&self) -> PluginId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Activation ──────────────────────────────────────────────────────────

    /// Whether the plugin processes audio (false means bypassed).
    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::Acquire)
    }

    /// Set the bypass gate.
    pub fn set_activated(&self, activated: bool) {
        self.activated.store(activated, Ordering::Release);
    }

    // ── Parameters and value list ───────────────────────────────────────────

    /// All parameters in index order.
    pub fn params(&self) -> &[Arc<PluginParameter>] {
        &self.params
    }

    /// Parameter by index.
    pub fn param(&self, index: usize) -> Option<&Arc<PluginParameter>> {
        self.params.get(index)
    }

    /// Parameter by display name.
    pub fn param_by_name(&self, name: &str) -> Option<&Arc<PluginParameter>> {
        self.params.iter().find(|p| p.name() == name)
    }

    /// Number of parameters.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Current values of all parameters, in index order.
    ///
    /// This is the persisted configuration of the plugin.
    pub fn value_list(&self) -> Vec<f32> {
        self.params.iter().map(|p| p.value()).collect()
    }

    /// Store a value list without pushing it to the host.
    ///
    /// Extra values are ignored; parameters beyond the list keep their value.
    pub fn set_value_list(&self, values: &[f32]) {
        if values.len() != self.params.len() {
            tracing::debug!(
                plugin = %self.id,
                expected = self.params.len(),
                got = values.len(),
                "value list length mismatch"
            );
        }
        for (param, &value) in self.params.iter().zip(values) {
            param.set_value(value, false);
        }
    }

    /// Push the stored values into the running instance.
    pub fn realize_values(&self) {
        self.host.realize_values(&self.value_list());
    }

    /// Restore every parameter default and reset the running instance.
    pub fn reset(&self) {
        for param in &self.params {
            param.reset();
        }
        self.host.reset();
    }

    // ── Chain membership ────────────────────────────────────────────────────

    /// The home chain, if it still exists.
    ///
    /// A plugin keeps its home chain while detached; use
    /// [`is_attached`](Self::is_attached) to ask whether it is linked in.
    pub fn chain(&self) -> Option<Arc<PluginChain>> {
        self.chain.read().upgrade()
    }

    pub(crate) fn set_chain(&self, chain: Weak<PluginChain>) {
        *self.chain.write() = chain;
    }

    /// Whether the home chain currently contains this plugin.
    pub fn is_attached(&self) -> bool {
        self.chain().is_some_and(|chain| chain.contains(self))
    }

    /// The plugin that follows this one in its chain.
    pub fn next(&self) -> Option<Arc<Plugin>> {
        self.chain().and_then(|chain| chain.next(self))
    }

    // ── Editor ──────────────────────────────────────────────────────────────

    /// Attach or detach the presentation surface.
    pub fn set_editor(&self, editor: Option<Arc<dyn PluginEditor>>) {
        *self.editor.write() = editor;
    }

    /// The presentation surface, if one is open.
    pub fn editor(&self) -> Option<Arc<dyn PluginEditor>> {
        self.editor.read().clone()
    }

    /// Ask the editor to repaint everything. Failures are only logged.
    pub fn refresh_editor(&self) {
        if let Some(editor) = self.editor()
            && let Err(err) = editor.refresh()
        {
            tracing::warn!(plugin = %self.id, "{err}");
        }
    }

    /// Ask the editor to repaint one control. Failures are only logged.
    pub fn update_editor_control(&self, index: usize) {
        if let Some(editor) = self.editor()
            && let Err(err) = editor.update_control(index)
        {
            tracing::warn!(plugin = %self.id, index, "{err}");
        }
    }

    // ── Host ────────────────────────────────────────────────────────────────

    /// The DSP instance behind this plugin.
    pub fn host(&self) -> &dyn PluginHost {
        self.host.as_ref()
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        tracing::debug!(plugin = %self.id, name = %self.name, "releasing plugin");
        self.host.release();
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("activated", &self.is_activated())
            .field("values", &self.value_list())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingHost {
        realized: AtomicUsize,
        resets: AtomicUsize,
        releases: AtomicUsize,
    }

    impl PluginHost for Arc<CountingHost> {
        fn realize_values(&self, _values: &[f32]) {
            self.realized.fetch_add(1, Ordering::Relaxed);
        }
        fn reset(&self) {
            self.resets.fetch_add(1, Ordering::Relaxed);
        }
        fn release(&self) {
            self.releases.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct BrokenEditor;

    impl PluginEditor for BrokenEditor {
        fn refresh(&self) -> Result<(), EditorError> {
            Err(EditorError::new("no window"))
        }
        fn update_control(&self, _index: usize) -> Result<(), EditorError> {
            Err(EditorError::new("no window"))
        }
    }

    fn plugin_with(host: Box<dyn PluginHost>) -> Arc<Plugin> {
        Plugin::new(
            PluginId(1),
            "eq",
            vec![
                ParamDescriptor::unit("Low", 0.5),
                ParamDescriptor::unit("Mid", 0.5),
                ParamDescriptor::unit("High", 0.5),
            ],
            host,
            Weak::new(),
        )
    }

    #[test]
    fn parameters_point_back_to_plugin() {
        let plugin = plugin_with(Box::new(NullHost));
        for (i, param) in plugin.params().iter().enumerate() {
            assert_eq!(param.index(), i);
            assert!(Arc::ptr_eq(&param.plugin().unwrap(), &plugin));
        }
    }

    #[test]
    fn parameter_outlives_plugin_without_target() {
        let plugin = plugin_with(Box::new(NullHost));
        let param = Arc::clone(plugin.param(0).unwrap());
        drop(plugin);
        assert!(param.plugin().is_none());
    }

    #[test]
    fn value_list_roundtrip() {
        let plugin = plugin_with(Box::new(NullHost));
        plugin.set_value_list(&[0.1, 0.2, 0.3]);
        assert_eq!(plugin.value_list(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn short_value_list_leaves_tail() {
        let plugin = plugin_with(Box::new(NullHost));
        plugin.set_value_list(&[0.9]);
        assert_eq!(plugin.value_list(), vec![0.9, 0.5, 0.5]);
    }

    #[test]
    fn reset_restores_defaults_and_notifies_host() {
        let host = Arc::new(CountingHost::default());
        let plugin = plugin_with(Box::new(Arc::clone(&host)));
        plugin.set_value_list(&[0.0, 1.0, 0.0]);
        plugin.reset();
        assert_eq!(plugin.value_list(), vec![0.5, 0.5, 0.5]);
        assert_eq!(host.resets.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn realize_values_reaches_host() {
        let host = Arc::new(CountingHost::default());
        let plugin = plugin_with(Box::new(Arc::clone(&host)));
        plugin.realize_values();
        assert_eq!(host.realized.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn host_released_with_last_handle() {
        let host = Arc::new(CountingHost::default());
        let plugin = plugin_with(Box::new(Arc::clone(&host)));
        let second = Arc::clone(&plugin);
        drop(plugin);
        assert_eq!(host.releases.load(Ordering::Relaxed), 0);
        drop(second);
        assert_eq!(host.releases.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn activation_flag() {
        let plugin = plugin_with(Box::new(NullHost));
        assert!(plugin.is_activated());
        plugin.set_activated(false);
        assert!(!plugin.is_activated());
    }

    #[test]
    fn unbound_plugin_is_not_attached() {
        let plugin = plugin_with(Box::new(NullHost));
        assert!(plugin.chain().is_none());
        assert!(!plugin.is_attached());
        assert!(plugin.next().is_none());
    }

    #[test]
    fn editor_failures_do_not_panic() {
        let plugin = plugin_with(Box::new(NullHost));
        plugin.set_editor(Some(Arc::new(BrokenEditor)));
        plugin.refresh_editor();
        plugin.update_editor_control(2);
        assert!(plugin.editor().is_some());
    }

    #[test]
    fn param_lookup_by_name() {
        let plugin = plugin_with(Box::new(NullHost));
        assert_eq!(plugin.param_by_name("Mid").unwrap().index(), 1);
        assert!(plugin.param_by_name("Presence").is_none());
        assert_eq!(plugin.param_count(), 3);
    }
}
