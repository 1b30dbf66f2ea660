//! The ordered plugin chain of one track or bus.
//!
//! # Publication
//!
//! The order lives in an `ArcSwap<Vec<Arc<Plugin>>>`. Readers (the audio
//! thread included) get a wait-free snapshot with [`PluginChain::plugins`].
//! Writers build the complete new order and publish it with one `store`, so
//! a reader sees either the whole edit or none of it.
//!
//! Writers must hold the session's structural lock, which they prove by
//! passing the [`StructuralGuard`]. The lock serializes writers and lets the
//! audio thread take a consistent view across several chains (see
//! [`Session::try_snapshot`](crate::Session::try_snapshot)).

use std::fmt;
use std::sync::{Arc, Weak};

use arc_swap::{ArcSwap, Guard};

use crate::error::CommandError;
use crate::ids::{ChainId, PluginId};
use crate::plugin::Plugin;
use crate::session::{Session, StructuralGuard};

/// Ordered, lock-protected container of plugins.
pub struct PluginChain {
    id: ChainId,
    name: String,
    capacity: usize,
    session: Weak<Session>,
    /// Weak handle to this chain, handed to plugins as their home chain.
    this: Weak<PluginChain>,
    plugins: ArcSwap<Vec<Arc<Plugin>>>,
}

impl PluginChain {
    pub(crate) fn new(
        id: ChainId,
        name: impl Into<String>,
        capacity: usize,
        session: Weak<Session>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| PluginChain {
            id,
            name,
            capacity,
            session,
            this: this.clone(),
            plugins: ArcSwap::from_pointee(Vec::with_capacity(capacity)),
        })
    }

    /// Session-unique identity.
    pub fn id(&self) -> ChainId {
        self.id
    }

    /// Display name (usually the track name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of plugins.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The owning session, if it still exists.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    // ── Reads (wait-free) ───────────────────────────────────────────────────

    /// Current order (wait-free read).
    pub fn plugins(&self) -> Guard<Arc<Vec<Arc<Plugin>>>> {
        self.plugins.load()
    }

    /// Current order as an owned handle.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Plugin>>> {
        self.plugins.load_full()
    }

    /// Whether `order` is the order this chain currently publishes.
    pub(crate) fn is_current(&self, order: &Arc<Vec<Arc<Plugin>>>) -> bool {
        let current = self.plugins.load();
        Arc::ptr_eq(&*current, order)
    }

    /// Plugin ids in signal-flow order.
    ///
    /// Together with each plugin's value list this is all a session
    /// serializer needs.
    pub fn ids(&self) -> Vec<PluginId> {
        self.plugins.load().iter().map(|p| p.id()).collect()
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.plugins.load().len()
    }

    /// Whether the chain holds no plugins.
    pub fn is_empty(&self) -> bool {
        self.plugins.load().is_empty()
    }

    /// Free places left.
    pub fn vacancy(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Whether the plugin is linked into this chain.
    pub fn contains(&self, plugin: &Plugin) -> bool {
        self.position(plugin).is_some()
    }

    /// Index of the plugin in this chain.
    pub fn position(&self, plugin: &Plugin) -> Option<usize> {
        self.plugins.load().iter().position(|p| p.id() == plugin.id())
    }

    /// The plugin following `plugin`, or `None` if it is last or absent.
    pub fn next(&self, plugin: &Plugin) -> Option<Arc<Plugin>> {
        let plugins = self.plugins.load();
        let index = plugins.iter().position(|p| p.id() == plugin.id())?;
        plugins.get(index + 1).cloned()
    }

    /// Plugin at a position.
    pub fn get(&self, index: usize) -> Option<Arc<Plugin>> {
        self.plugins.load().get(index).cloned()
    }

    // ── Structural edits (structural lock required) ─────────────────────────

    /// Link `plugin` in right before `before`, or at the end when `before`
    /// is `None` or not in this chain.
    ///
    /// A plugin already in this chain is relocated; a plugin linked into
    /// another chain is unlinked from it first. Either way the plugin's home
    /// chain becomes this chain.
    pub fn insert(
        &self,
        guard: &StructuralGuard<'_>,
        plugin: &Arc<Plugin>,
        before: Option<&Plugin>,
    ) -> Result<(), CommandError> {
        self.place(guard, plugin, before)
    }

    /// Move `plugin` (from whichever chain holds it) in front of `before`.
    ///
    /// Equivalent to a remove followed by an insert. Within one chain the
    /// result is published at once; across chains both stores happen inside
    /// the same critical section.
    pub fn move_plugin(
        &self,
        guard: &StructuralGuard<'_>,
        plugin: &Arc<Plugin>,
        before: Option<&Plugin>,
    ) -> Result<(), CommandError> {
        self.place(guard, plugin, before)
    }

    /// Unlink `plugin`. Returns `false` if it was not in this chain.
    ///
    /// The plugin keeps this chain as its home chain.
    pub fn remove(&self, guard: &StructuralGuard<'_>, plugin: &Plugin) -> bool {
        self.check_guard(guard);
        let current = self.plugins.load();
        let order: Vec<Arc<Plugin>> = current
            .iter()
            .filter(|p| p.id() != plugin.id())
            .cloned()
            .collect();
        if order.len() == current.len() {
            return false;
        }
        drop(current);
        tracing::debug!(chain = %self.id, plugin = %plugin.id(), "unlink");
        self.publish(order);
        true
    }

    fn place(
        &self,
        guard: &StructuralGuard<'_>,
        plugin: &Arc<Plugin>,
        before: Option<&Plugin>,
    ) -> Result<(), CommandError> {
        self.check_guard(guard);

        let current = self.plugins.load();
        let mut order: Vec<Arc<Plugin>> = current
            .iter()
            .filter(|p| p.id() != plugin.id())
            .cloned()
            .collect();
        let relocating = order.len() != current.len();
        drop(current);

        if !relocating {
            if order.len() >= self.capacity {
                return Err(CommandError::ChainFull {
                    chain: self.id,
                    capacity: self.capacity,
                });
            }
            if let Some(holder) = plugin.chain()
                && holder.id != self.id
            {
                holder.remove(guard, plugin);
            }
        }

        let index = before
            .and_then(|b| order.iter().position(|p| p.id() == b.id()))
            .unwrap_or(order.len());
        order.insert(index, Arc::clone(plugin));

        tracing::debug!(chain = %self.id, plugin = %plugin.id(), index, "link");
        self.publish(order);
        plugin.set_chain(self.this.clone());
        Ok(())
    }

    fn publish(&self, order: Vec<Arc<Plugin>>) {
        debug_assert!(order.len() <= self.capacity, "chain over capacity");
        debug_assert!(
            order
                .iter()
                .enumerate()
                .all(|(i, p)| order[i + 1..].iter().all(|q| q.id() != p.id())),
            "plugin linked twice into chain {}",
            self.id
        );
        self.plugins.store(Arc::new(order));
    }

    fn check_guard(&self, guard: &StructuralGuard<'_>) {
        debug_assert!(
            guard.belongs_to(&self.session),
            "structural lock of another session held for chain {}",
            self.id
        );
    }
}

impl fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginChain")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("plugins", &self.ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::NullHost;
    use plugrack_config::EngineConfig;

    fn setup(count: usize) -> (Arc<Session>, Arc<PluginChain>, Vec<Arc<Plugin>>) {
        let session = Session::new(EngineConfig::default().with_max_plugins(4));
        let chain = session.create_chain("Track 1");
        let plugins: Vec<_> = (0..count)
            .map(|i| session.create_plugin(&chain, format!("fx{i}"), Vec::new(), Box::new(NullHost)))
            .collect();
        (session, chain, plugins)
    }

    #[test]
    fn insert_appends_without_before() {
        let (session, chain, p) = setup(3);
        let guard = session.lock();
        for plugin in &p {
            chain.insert(&guard, plugin, None).unwrap();
        }
        assert_eq!(chain.ids(), vec![p[0].id(), p[1].id(), p[2].id()]);
    }

    #[test]
    fn insert_before_reference() {
        let (session, chain, p) = setup(3);
        let guard = session.lock();
        chain.insert(&guard, &p[0], None).unwrap();
        chain.insert(&guard, &p[1], None).unwrap();
        chain.insert(&guard, &p[2], Some(&p[1])).unwrap();
        assert_eq!(chain.ids(), vec![p[0].id(), p[2].id(), p[1].id()]);
    }

    #[test]
    fn insert_before_absent_reference_appends() {
        let (session, chain, p) = setup(3);
        let guard = session.lock();
        chain.insert(&guard, &p[0], None).unwrap();
        chain.insert(&guard, &p[1], Some(&p[2])).unwrap();
        assert_eq!(chain.ids(), vec![p[0].id(), p[1].id()]);
    }

    #[test]
    fn insert_existing_relocates() {
        let (session, chain, p) = setup(3);
        let guard = session.lock();
        for plugin in &p {
            chain.insert(&guard, plugin, None).unwrap();
        }
        chain.insert(&guard, &p[2], Some(&p[0])).unwrap();
        assert_eq!(chain.ids(), vec![p[2].id(), p[0].id(), p[1].id()]);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn remove_keeps_home_chain() {
        let (session, chain, p) = setup(2);
        let guard = session.lock();
        chain.insert(&guard, &p[0], None).unwrap();
        chain.insert(&guard, &p[1], None).unwrap();
        assert!(chain.remove(&guard, &p[0]));
        assert!(!chain.remove(&guard, &p[0]));
        drop(guard);

        assert_eq!(chain.ids(), vec![p[1].id()]);
        assert!(!p[0].is_attached());
        assert_eq!(p[0].chain().unwrap().id(), chain.id());
    }

    #[test]
    fn next_and_position() {
        let (session, chain, p) = setup(3);
        let guard = session.lock();
        for plugin in &p {
            chain.insert(&guard, plugin, None).unwrap();
        }
        drop(guard);
        assert_eq!(chain.next(&p[0]).unwrap().id(), p[1].id());
        assert!(chain.next(&p[2]).is_none());
        assert_eq!(chain.position(&p[1]), Some(1));
        assert_eq!(p[1].next().unwrap().id(), p[2].id());
    }

    #[test]
    fn full_chain_rejects_insert() {
        let (session, chain, p) = setup(5);
        let guard = session.lock();
        for plugin in &p[..4] {
            chain.insert(&guard, plugin, None).unwrap();
        }
        let err = chain.insert(&guard, &p[4], None).unwrap_err();
        assert_eq!(
            err,
            CommandError::ChainFull {
                chain: chain.id(),
                capacity: 4
            }
        );
        assert_eq!(chain.len(), 4);
        // relocating inside a full chain is fine
        chain.insert(&guard, &p[3], Some(&p[0])).unwrap();
        assert_eq!(chain.vacancy(), 0);
    }

    #[test]
    fn move_across_chains() {
        let (session, a, p) = setup(2);
        let b = session.create_chain("Bus");
        let guard = session.lock();
        a.insert(&guard, &p[0], None).unwrap();
        a.insert(&guard, &p[1], None).unwrap();
        b.move_plugin(&guard, &p[0], None).unwrap();
        drop(guard);

        assert_eq!(a.ids(), vec![p[1].id()]);
        assert_eq!(b.ids(), vec![p[0].id()]);
        assert_eq!(p[0].chain().unwrap().id(), b.id());
        assert!(p[0].is_attached());
    }

    #[test]
    fn readers_keep_old_snapshot() {
        let (session, chain, p) = setup(2);
        let guard = session.lock();
        chain.insert(&guard, &p[0], None).unwrap();
        let before = chain.snapshot();
        chain.insert(&guard, &p[1], None).unwrap();
        drop(guard);
        assert_eq!(before.len(), 1);
        assert_eq!(chain.len(), 2);
    }
}
