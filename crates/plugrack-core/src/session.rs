//! The editing session: structural lock, chain registry and command history.
//!
//! ```text
//! UI thread                              Audio thread
//! ─────────                              ────────────
//! builds command                         ProcessView::refresh()
//! history.execute(cmd)                     try_lock (never blocks)
//!   cmd.redo()                             loads every chain order
//!     session.lock()   ◄── excludes ──►   reads activated flags and
//!     chain.insert/remove/move             parameter values (atomics)
//! ```
//!
//! Structural edits run inside the session-wide mutex. The audio thread only
//! ever `try_lock`s it; when an edit is in progress it keeps processing with
//! the previous snapshot.
//!
//! The audio thread neither allocates nor frees in steady state. A
//! [`ProcessView`] refills the same snapshot buffer on every refresh, and
//! chain orders it stops using are parked in a retire list kept behind the
//! structural mutex. The control thread empties that list in
//! [`Session::collect_garbage`], which `execute`, `undo` and `redo` call, so
//! the last handle to a removed plugin is dropped there.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard, RwLock};
use plugrack_config::EngineConfig;

use crate::chain::PluginChain;
use crate::command::{Command, CommandHistory, ParameterCommand};
use crate::error::CommandError;
use crate::ids::{ChainId, PluginId};
use crate::param::{ParamDescriptor, PluginParameter};
use crate::plugin::{Plugin, PluginHost};

/// Chain orders the audio thread has stopped reading, awaiting the control
/// thread.
type Retired = Vec<Arc<Vec<Arc<Plugin>>>>;

/// Initial room in the retire list, grown as chains are created.
const RETIRE_RESERVE: usize = 16;

/// Proof that the structural lock of a session is held.
///
/// Chain edits take a `&StructuralGuard`, so calling them without the lock
/// does not compile.
pub struct StructuralGuard<'a> {
    retired: MutexGuard<'a, Retired>,
    session: &'a Session,
}

impl StructuralGuard<'_> {
    pub(crate) fn belongs_to(&self, session: &Weak<Session>) -> bool {
        std::ptr::eq(session.as_ptr(), self.session)
    }
}

/// One open editing session.
pub struct Session {
    config: EngineConfig,
    open: AtomicBool,
    structural: Mutex<Retired>,
    chains: RwLock<Vec<Arc<PluginChain>>>,
    next_plugin: AtomicU32,
    next_chain: AtomicU32,
    history: Mutex<CommandHistory>,
    this: Weak<Session>,
}

impl Session {
    /// Open a session.
    pub fn new(config: EngineConfig) -> Arc<Self> {
        debug_assert!(config.validate().is_ok(), "invalid engine config");
        tracing::info!(
            max_depth = config.history.max_depth,
            max_plugins = config.chain.max_plugins,
            "session opened"
        );
        let history = CommandHistory::new(&config.history);
        Arc::new_cyclic(|this| Session {
            config,
            open: AtomicBool::new(true),
            structural: Mutex::new(Vec::with_capacity(RETIRE_RESERVE)),
            chains: RwLock::new(Vec::new()),
            next_plugin: AtomicU32::new(0),
            next_chain: AtomicU32::new(0),
            history: Mutex::new(history),
            this: this.clone(),
        })
    }

    /// Resolve a command's session handle, failing if it is closed or gone.
    pub fn active(session: &Weak<Session>) -> Result<Arc<Session>, CommandError> {
        session
            .upgrade()
            .filter(|s| s.is_open())
            .ok_or(CommandError::NoSession)
    }

    /// A weak handle for commands.
    pub fn handle(&self) -> Weak<Session> {
        self.this.clone()
    }

    /// The configuration the session was opened with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close the session.
    ///
    /// Every later structural command fails with
    /// [`CommandError::NoSession`]. The history is emptied, which frees
    /// detached plugins no caller still holds.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::info!("session closed");
            let dropped = std::mem::replace(
                &mut *self.history.lock(),
                CommandHistory::new(&self.config.history),
            );
            drop(dropped);
            self.collect_garbage();
        }
    }

    // ── Structural lock ─────────────────────────────────────────────────────

    /// Acquire the structural lock. Not reentrant.
    pub fn lock(&self) -> StructuralGuard<'_> {
        StructuralGuard {
            retired: self.structural.lock(),
            session: self,
        }
    }

    /// Acquire the structural lock if nobody holds it.
    pub fn try_lock(&self) -> Option<StructuralGuard<'_>> {
        self.structural.try_lock().map(|retired| StructuralGuard {
            retired,
            session: self,
        })
    }

    // ── Chains and plugins ──────────────────────────────────────────────────

    /// Create an empty chain for a new track or bus.
    pub fn create_chain(&self, name: impl Into<String>) -> Arc<PluginChain> {
        let id = ChainId(self.next_chain.fetch_add(1, Ordering::Relaxed));
        let chain = PluginChain::new(
            id,
            name,
            self.config.chain.max_plugins,
            self.this.clone(),
        );
        let mut guard = self.lock();
        let mut chains = self.chains.write();
        chains.push(Arc::clone(&chain));
        // a refresh retires at most one order per chain
        let room = RETIRE_RESERVE + 2 * chains.len();
        let len = guard.retired.len();
        guard.retired.reserve(room.saturating_sub(len));
        drop(chains);
        tracing::debug!(chain = %id, name = chain.name(), "chain created");
        chain
    }

    /// Drop a chain from the session (its track was deleted).
    pub fn remove_chain(&self, id: ChainId) -> Option<Arc<PluginChain>> {
        let _guard = self.lock();
        let mut chains = self.chains.write();
        let index = chains.iter().position(|c| c.id() == id)?;
        tracing::debug!(chain = %id, "chain removed");
        Some(chains.remove(index))
    }

    /// Chain by id.
    pub fn chain(&self, id: ChainId) -> Option<Arc<PluginChain>> {
        self.chains.read().iter().find(|c| c.id() == id).cloned()
    }

    /// All chains in creation order.
    pub fn chains(&self) -> Vec<Arc<PluginChain>> {
        self.chains.read().clone()
    }

    /// Create a plugin whose home chain is `chain`.
    ///
    /// The plugin is not linked in; an add command does that.
    pub fn create_plugin(
        &self,
        chain: &Arc<PluginChain>,
        name: impl Into<String>,
        descriptors: Vec<ParamDescriptor>,
        host: Box<dyn PluginHost>,
    ) -> Arc<Plugin> {
        Plugin::new(
            self.allocate_plugin_id(),
            name,
            descriptors,
            host,
            Arc::downgrade(chain),
        )
    }

    /// Create a plugin with no home chain.
    pub fn create_unbound_plugin(
        &self,
        name: impl Into<String>,
        descriptors: Vec<ParamDescriptor>,
        host: Box<dyn PluginHost>,
    ) -> Arc<Plugin> {
        Plugin::new(self.allocate_plugin_id(), name, descriptors, host, Weak::new())
    }

    fn allocate_plugin_id(&self) -> PluginId {
        PluginId(self.next_plugin.fetch_add(1, Ordering::Relaxed))
    }

    // ── Command history ─────────────────────────────────────────────────────

    /// The session's command history.
    ///
    /// Do not hold the returned guard while calling
    /// [`close`](Self::close).
    pub fn commands(&self) -> MutexGuard<'_, CommandHistory> {
        self.history.lock()
    }

    /// Execute a command through the session history.
    pub fn execute(&self, command: Box<dyn Command>) -> Result<(), CommandError> {
        let result = self.history.lock().execute(command);
        self.collect_garbage();
        result
    }

    /// Record a parameter edit, merging it into the previous edit of the same
    /// parameter when they form one gesture.
    pub fn edit_parameter(
        &self,
        param: &Arc<PluginParameter>,
        value: f32,
        update: bool,
    ) -> Result<(), CommandError> {
        let mut history = self.history.lock();
        let command = ParameterCommand::coalescing(&mut history, Arc::clone(param), value, update);
        history.execute(Box::new(command))
    }

    /// Undo the newest command.
    pub fn undo(&self) -> Result<(), CommandError> {
        let result = self.history.lock().undo();
        self.collect_garbage();
        result
    }

    /// Redo the newest undone command.
    pub fn redo(&self) -> Result<(), CommandError> {
        let result = self.history.lock().redo();
        self.collect_garbage();
        result
    }

    /// Drop the chain orders the audio thread has retired. Returns how many
    /// were collected.
    ///
    /// Control thread only. Plugins whose last handle was in a retired order
    /// are freed here, outside the structural lock.
    pub fn collect_garbage(&self) -> usize {
        let garbage: Retired = self.lock().retired.drain(..).collect();
        if !garbage.is_empty() {
            tracing::trace!(count = garbage.len(), "collecting retired chain orders");
        }
        garbage.len()
    }

    // ── Audio side ──────────────────────────────────────────────────────────

    /// Consistent view of every chain, or `None` while an edit is running.
    ///
    /// Never blocks, but allocates a new snapshot; the audio thread should
    /// go through [`ProcessView`] instead.
    pub fn try_snapshot(&self) -> Option<SessionSnapshot> {
        let mut snapshot = SessionSnapshot::default();
        self.try_snapshot_into(&mut snapshot).then_some(snapshot)
    }

    /// Refill `snapshot` in place with the current order of every chain.
    ///
    /// Returns `false`, leaving `snapshot` untouched, while an edit holds the
    /// structural lock. Orders that `snapshot` held and no chain still
    /// publishes are moved to the retire list instead of being dropped.
    pub fn try_snapshot_into(&self, snapshot: &mut SessionSnapshot) -> bool {
        let Some(mut guard) = self.try_lock() else {
            return false;
        };
        let chains = self.chains.read();
        for old in snapshot.chains.drain(..) {
            let live = chains
                .iter()
                .any(|chain| chain.id() == old.id && chain.is_current(&old.plugins));
            if !live {
                guard.retired.push(old.plugins);
            }
        }
        snapshot
            .chains
            .extend(chains.iter().map(|chain| ChainSnapshot {
                id: chain.id(),
                plugins: chain.snapshot(),
            }));
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .field("chains", &self.chains.read().len())
            .finish_non_exhaustive()
    }
}

/// The order of one chain at the moment a snapshot was taken.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    /// Chain identity.
    pub id: ChainId,
    /// Plugins in signal-flow order.
    pub plugins: Arc<Vec<Arc<Plugin>>>,
}

/// All chain orders taken inside one critical section.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    chains: Vec<ChainSnapshot>,
}

impl SessionSnapshot {
    /// Plugins of one chain.
    pub fn chain(&self, id: ChainId) -> Option<&[Arc<Plugin>]> {
        self.chains
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.plugins.as_slice())
    }

    /// Every chain.
    pub fn chains(&self) -> &[ChainSnapshot] {
        &self.chains
    }

    /// Total number of linked plugins.
    pub fn plugin_count(&self) -> usize {
        self.chains.iter().map(|c| c.plugins.len()).sum()
    }
}

/// The audio thread's view of the session.
///
/// Call [`refresh`](Self::refresh) at the start of every block; it picks up
/// new chain orders when the structural lock is free and otherwise keeps the
/// previous ones. The snapshot buffer is reused across refreshes. Dropping
/// the view drops its last snapshot on the dropping thread.
#[derive(Debug, Default)]
pub struct ProcessView {
    snapshot: SessionSnapshot,
    skipped: u64,
}

impl ProcessView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take a fresh snapshot. Returns `false` if the previous one is
    /// kept because an edit held the lock.
    pub fn refresh(&mut self, session: &Session) -> bool {
        if session.try_snapshot_into(&mut self.snapshot) {
            true
        } else {
            self.skipped += 1;
            false
        }
    }

    /// Number of refreshes that found the lock taken.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    /// Plugins of one chain, in order.
    pub fn chain(&self, id: ChainId) -> &[Arc<Plugin>] {
        self.snapshot.chain(id).unwrap_or(&[])
    }

    /// Plugins of one chain that are not bypassed, in order.
    pub fn active_plugins(&self, id: ChainId) -> impl Iterator<Item = &Arc<Plugin>> {
        self.chain(id).iter().filter(|p| p.is_activated())
    }
}
