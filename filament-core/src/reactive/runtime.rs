//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos,
//! effects, and scopes. It owns every node in the graph, tracks which
//! computation is currently executing, and schedules propagation when
//! signals change.
//!
//! # How It Works
//!
//! 1. When a signal or computation is created, the runtime stores its node
//!    and hands back a lightweight id-based handle.
//!
//! 2. When a computation's body reads a signal or memo, the runtime records
//!    a dependency edge from the source to the reader.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks the signal's direct observers stale
//!    b. Walks the graph forward, marking everything reachable pending
//!    c. Executes the dirty set in dependency order
//!    d. Lets memos that produced an unchanged value prune their branch
//!
//! # Execution Model
//!
//! The runtime is strictly single-threaded and cooperative: all graph
//! mutation happens on the thread that owns it, so interior mutability is
//! `RefCell`/`Cell` with no locking. The coordinator is an explicit object
//! passed by reference into every graph operation rather than an ambient
//! global, so independent graphs (one per embedded script context) coexist
//! freely and can be tested in isolation.
//!
//! Writes that happen while a propagation pass is already running are
//! absorbed into that pass; a single external write produces exactly one
//! coherent flush no matter how much of the graph it touches.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::error::{ReactiveError, Result};
use crate::graph::{FlushScheduler, NodeId, NodeState};

/// Upper bound on mark/execute rounds within one flush. A graph that keeps
/// re-staleing itself through writes past this point is in a feedback loop
/// that static cycle detection cannot see.
const MAX_FLUSH_ROUNDS: usize = 100_000;

/// A computation body. Memo bodies produce a value; effect bodies produce
/// `None`. The `Rc<RefCell<..>>` lets the runtime call the body without
/// holding a borrow of the node arena.
pub(crate) type Body<V> = Rc<RefCell<dyn FnMut(&Runtime<V>) -> Option<V>>>;

/// A cleanup callback registered on a scope.
pub(crate) type CleanupFn = Box<dyn FnOnce()>;

/// What a scope node is: a bare ownership container, a side-effecting
/// computation, or a memoized computation that caches and exposes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Ownership container with no re-executable body (roots, control-flow
    /// branches).
    PureScope,

    /// Side-effecting computation with no externally visible value. Always
    /// treated as "changed" when it re-executes.
    PureComputation,

    /// Computation that caches its result and propagates downstream only
    /// when the result actually changed.
    MemoComputation,
}

/// An entry in a scope's owned list. Children and cleanup callbacks share
/// one sequence so disposal can honor strict reverse-registration order
/// across both kinds.
pub(crate) enum Owned {
    Node(NodeId),
    Cleanup(CleanupFn),
}

/// A mutable value cell: the leaf data source of the graph.
struct SignalCell<V> {
    value: V,
    version: u64,
    /// Computations that read this signal during their latest run.
    observers: IndexSet<NodeId>,
}

/// A scope node. Computations are scopes with a body; bare scopes have
/// none. Ownership (parent/owned) and dependency (dependencies/observers)
/// edges are kept separate: the former is a forest, the latter a DAG.
struct ScopeNode<V>
where
    V: Clone + PartialEq + 'static,
{
    kind: ScopeKind,
    parent: Option<NodeId>,
    owned: Vec<Owned>,
    state: NodeState,
    /// Logical-clock value of the latest completed run. Zero means the node
    /// has never run (the clock starts at one).
    updated_at: u64,
    body: Option<Body<V>>,
    /// Cached output, memo computations only.
    value: Option<V>,
    /// Sources (signals or memos) read during the latest run.
    dependencies: IndexSet<NodeId>,
    /// Computations that read this node's cached value during their latest
    /// run. Only memos accumulate observers.
    observers: IndexSet<NodeId>,
}

/// The graph coordinator for one embedded runtime instance.
///
/// All handle types ([`Signal`](super::Signal), [`Memo`](super::Memo),
/// [`Effect`](super::Effect), [`Scope`](super::Scope)) are ids into this
/// object and take `&Runtime` on every operation.
pub struct Runtime<V>
where
    V: Clone + PartialEq + 'static,
{
    signals: RefCell<HashMap<NodeId, SignalCell<V>>>,
    scopes: RefCell<HashMap<NodeId, ScopeNode<V>>>,

    /// The computation currently executing its body, if any. Reads that
    /// happen while this is set establish dependency edges.
    active: Cell<Option<NodeId>>,

    /// Monotonic logical clock, incremented once per completed flush.
    clock: Cell<u64>,

    /// Stale computations awaiting execution.
    pending: RefCell<IndexSet<NodeId>>,

    /// Depth of nested `begin_batch` calls. Writes are deferred while
    /// non-zero.
    batch_depth: Cell<u32>,

    /// Whether a flush is currently running.
    flushing: Cell<bool>,
}

impl<V> Runtime<V>
where
    V: Clone + PartialEq + 'static,
{
    /// Create an empty runtime with its logical clock at one.
    pub fn new() -> Self {
        Self {
            signals: RefCell::new(HashMap::new()),
            scopes: RefCell::new(HashMap::new()),
            active: Cell::new(None),
            clock: Cell::new(1),
            pending: RefCell::new(IndexSet::new()),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
        }
    }

    /// Current value of the logical clock.
    pub fn clock(&self) -> u64 {
        self.clock.get()
    }

    /// Whether a batch is currently open.
    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    // ------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------

    /// Open a batch: writes are collected but not propagated until the
    /// matching [`end_batch`](Self::end_batch).
    pub fn begin_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    /// Close a batch. Closing the outermost batch runs a single flush
    /// reflecting the final written values.
    pub fn end_batch(&self) -> Result<()> {
        let depth = self.batch_depth.get();
        if depth == 0 {
            warn!("end_batch called with no open batch");
            return Ok(());
        }
        self.batch_depth.set(depth - 1);
        self.maybe_flush()
    }

    /// Run `f` inside a batch. All writes made by `f` propagate in one
    /// flush when the batch closes.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> R) -> Result<R> {
        self.begin_batch();
        let result = f(self);
        self.end_batch()?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    pub(crate) fn create_signal(&self, value: V) -> NodeId {
        let id = NodeId::new();
        self.signals.borrow_mut().insert(
            id,
            SignalCell {
                value,
                version: 0,
                observers: IndexSet::new(),
            },
        );
        trace!(signal = %id, "signal created");
        id
    }

    pub(crate) fn signal_get(&self, id: NodeId, track: bool) -> Result<V> {
        let value = {
            let signals = self.signals.borrow();
            let cell = signals.get(&id).ok_or(ReactiveError::UseAfterDispose(id))?;
            cell.value.clone()
        };
        if track {
            self.track_read(id);
        }
        Ok(value)
    }

    pub(crate) fn signal_set(&self, id: NodeId, value: V) -> Result<()> {
        let observers: Vec<NodeId> = {
            let mut signals = self.signals.borrow_mut();
            let cell = signals
                .get_mut(&id)
                .ok_or(ReactiveError::UseAfterDispose(id))?;
            if cell.value == value {
                trace!(signal = %id, "write ignored, value unchanged");
                return Ok(());
            }
            cell.value = value;
            cell.version += 1;
            cell.observers.iter().copied().collect()
        };
        self.mark_stale(id, observers);
        self.maybe_flush()
    }

    pub(crate) fn signal_version(&self, id: NodeId) -> Result<u64> {
        let signals = self.signals.borrow();
        let cell = signals.get(&id).ok_or(ReactiveError::UseAfterDispose(id))?;
        Ok(cell.version)
    }

    pub(crate) fn signal_observer_count(&self, id: NodeId) -> Result<usize> {
        let signals = self.signals.borrow();
        let cell = signals.get(&id).ok_or(ReactiveError::UseAfterDispose(id))?;
        Ok(cell.observers.len())
    }

    pub(crate) fn dispose_signal(&self, id: NodeId) -> Result<()> {
        self.signals
            .borrow_mut()
            .remove(&id)
            .ok_or(ReactiveError::UseAfterDispose(id))?;
        // Observers still listing this id in their dependency sets shed the
        // edge on their next recompute; ids are never reused.
        trace!(signal = %id, "signal disposed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scopes and computations
    // ------------------------------------------------------------------

    pub(crate) fn create_root_scope(&self) -> NodeId {
        let id = NodeId::new();
        self.scopes
            .borrow_mut()
            .insert(id, Self::blank_scope(ScopeKind::PureScope, None));
        trace!(scope = %id, "root scope created");
        id
    }

    pub(crate) fn create_child_scope(&self, parent: NodeId) -> Result<NodeId> {
        let id = NodeId::new();
        {
            let mut scopes = self.scopes.borrow_mut();
            let owner = scopes
                .get_mut(&parent)
                .ok_or(ReactiveError::UseAfterDispose(parent))?;
            owner.owned.push(Owned::Node(id));
            scopes.insert(id, Self::blank_scope(ScopeKind::PureScope, Some(parent)));
        }
        trace!(scope = %id, parent = %parent, "child scope created");
        Ok(id)
    }

    /// Create a computation owned by `owner` and execute it immediately.
    /// The first run establishes the initial dependency set and, for memos,
    /// the initial cached value.
    pub(crate) fn create_computation(
        &self,
        owner: NodeId,
        kind: ScopeKind,
        body: Body<V>,
    ) -> Result<NodeId> {
        debug_assert!(kind != ScopeKind::PureScope);
        let id = NodeId::new();
        {
            let mut scopes = self.scopes.borrow_mut();
            let parent = scopes
                .get_mut(&owner)
                .ok_or(ReactiveError::UseAfterDispose(owner))?;
            parent.owned.push(Owned::Node(id));
            let mut node = Self::blank_scope(kind, Some(owner));
            node.body = Some(body);
            scopes.insert(id, node);
        }
        trace!(computation = %id, owner = %owner, ?kind, "computation created");
        self.recompute(id);
        // A body may write signals during its first run; those writes are
        // deferred until it finishes.
        self.maybe_flush()?;
        Ok(id)
    }

    fn blank_scope(kind: ScopeKind, parent: Option<NodeId>) -> ScopeNode<V> {
        ScopeNode {
            kind,
            parent,
            owned: Vec::new(),
            state: NodeState::Clean,
            updated_at: 0,
            body: None,
            value: None,
            dependencies: IndexSet::new(),
            observers: IndexSet::new(),
        }
    }

    pub(crate) fn register_cleanup(&self, scope: NodeId, callback: CleanupFn) -> Result<()> {
        let mut scopes = self.scopes.borrow_mut();
        let node = scopes
            .get_mut(&scope)
            .ok_or(ReactiveError::UseAfterDispose(scope))?;
        node.owned.push(Owned::Cleanup(callback));
        Ok(())
    }

    /// Transfer ownership of a parentless node to `new_owner`.
    pub(crate) fn adopt(&self, new_owner: NodeId, target: NodeId) -> Result<()> {
        let mut scopes = self.scopes.borrow_mut();
        if !scopes.contains_key(&new_owner) {
            return Err(ReactiveError::UseAfterDispose(new_owner));
        }
        {
            let node = scopes
                .get(&target)
                .ok_or(ReactiveError::UseAfterDispose(target))?;
            if node.parent.is_some() {
                return Err(ReactiveError::DoubleOwnership(target));
            }
        }
        // Adopting an ancestor of the new owner would close an ownership
        // loop; ownership must stay a forest.
        let mut cursor = Some(new_owner);
        while let Some(current) = cursor {
            if current == target {
                return Err(ReactiveError::DoubleOwnership(target));
            }
            cursor = scopes.get(&current).and_then(|node| node.parent);
        }
        if let Some(node) = scopes.get_mut(&target) {
            node.parent = Some(new_owner);
        }
        if let Some(node) = scopes.get_mut(&new_owner) {
            node.owned.push(Owned::Node(target));
        }
        trace!(scope = %target, owner = %new_owner, "scope adopted");
        Ok(())
    }

    pub(crate) fn owner_of(&self, id: NodeId) -> Result<Option<NodeId>> {
        let scopes = self.scopes.borrow();
        scopes
            .get(&id)
            .map(|node| node.parent)
            .ok_or(ReactiveError::UseAfterDispose(id))
    }

    pub(crate) fn active_id(&self) -> Option<NodeId> {
        self.active.get()
    }

    pub(crate) fn state_of(&self, id: NodeId) -> Result<NodeState> {
        let scopes = self.scopes.borrow();
        scopes
            .get(&id)
            .map(|node| node.state)
            .ok_or(ReactiveError::UseAfterDispose(id))
    }

    pub(crate) fn updated_at(&self, id: NodeId) -> Result<u64> {
        let scopes = self.scopes.borrow();
        scopes
            .get(&id)
            .map(|node| node.updated_at)
            .ok_or(ReactiveError::UseAfterDispose(id))
    }

    pub(crate) fn is_scope_alive(&self, id: NodeId) -> bool {
        self.scopes.borrow().contains_key(&id)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub(crate) fn memo_get(&self, id: NodeId, track: bool) -> Result<V> {
        // A memo reading itself (directly or through a child created during
        // its own body) can never settle.
        if self.active.get() == Some(id) {
            return Err(ReactiveError::CyclicDependency(id));
        }
        let value = {
            let scopes = self.scopes.borrow();
            let node = scopes.get(&id).ok_or(ReactiveError::UseAfterDispose(id))?;
            match &node.value {
                Some(value) => value.clone(),
                // No cached value means the first run has not finished,
                // which is only reachable through a cycle.
                None => return Err(ReactiveError::CyclicDependency(id)),
            }
        };
        if track {
            self.track_read(id);
        }
        Ok(value)
    }

    pub(crate) fn memo_observer_count(&self, id: NodeId) -> Result<usize> {
        let scopes = self.scopes.borrow();
        let node = scopes.get(&id).ok_or(ReactiveError::UseAfterDispose(id))?;
        Ok(node.observers.len())
    }

    /// Record a dependency edge from `source` to the computation currently
    /// executing, if any. Adding an existing edge is a no-op.
    fn track_read(&self, source: NodeId) {
        let Some(reader) = self.active.get() else {
            return;
        };
        if reader == source {
            return;
        }
        if let Some(cell) = self.signals.borrow_mut().get_mut(&source) {
            cell.observers.insert(reader);
        } else if let Some(node) = self.scopes.borrow_mut().get_mut(&source) {
            node.observers.insert(reader);
        }
        if let Some(node) = self.scopes.borrow_mut().get_mut(&reader) {
            node.dependencies.insert(source);
        }
    }

    // ------------------------------------------------------------------
    // Disposal
    // ------------------------------------------------------------------

    pub(crate) fn dispose_scope(&self, id: NodeId) -> Result<()> {
        if !self.scopes.borrow().contains_key(&id) {
            return Err(ReactiveError::UseAfterDispose(id));
        }
        self.dispose_node(id);
        Ok(())
    }

    /// Tear a node down: children depth-first most-recently-created first,
    /// cleanup callbacks in reverse registration order, then sever the
    /// node's own dependency edges. Missing nodes are ignored so an owner
    /// disposing an already-disposed child is harmless.
    fn dispose_node(&self, id: NodeId) {
        let Some(node) = self.scopes.borrow_mut().remove(&id) else {
            return;
        };
        trace!(scope = %id, "disposing scope");
        self.teardown_owned(node.owned);
        {
            let mut signals = self.signals.borrow_mut();
            let mut scopes = self.scopes.borrow_mut();
            for dep in &node.dependencies {
                if let Some(cell) = signals.get_mut(dep) {
                    cell.observers.shift_remove(&id);
                } else if let Some(source) = scopes.get_mut(dep) {
                    source.observers.shift_remove(&id);
                }
            }
        }
        self.pending.borrow_mut().shift_remove(&id);
        // Downstream readers may still list this id as a dependency; those
        // stale entries are dropped on their next recompute.
    }

    /// Drain an owned list in reverse registration order. Children and
    /// cleanup callbacks interleave in exactly the order they were
    /// registered, so popping gives strict LIFO across both kinds.
    fn teardown_owned(&self, mut owned: Vec<Owned>) {
        while let Some(item) = owned.pop() {
            match item {
                Owned::Node(child) => self.dispose_node(child),
                Owned::Cleanup(callback) => callback(),
            }
        }
    }

    /// Remove this node from the observer set of every source it read
    /// during its previous run, and forget those edges. The next run
    /// re-establishes exactly the set it actually reads.
    fn clear_dependencies(&self, id: NodeId) {
        let dependencies: Vec<NodeId> = match self.scopes.borrow_mut().get_mut(&id) {
            Some(node) => node.dependencies.drain(..).collect(),
            None => return,
        };
        let mut signals = self.signals.borrow_mut();
        let mut scopes = self.scopes.borrow_mut();
        for dep in dependencies {
            if let Some(cell) = signals.get_mut(&dep) {
                cell.observers.shift_remove(&id);
            } else if let Some(source) = scopes.get_mut(&dep) {
                source.observers.shift_remove(&id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Mark `observers` of `source` stale and queue them for execution.
    /// Observer edges pointing at disposed nodes are pruned here.
    fn mark_stale(&self, source: NodeId, observers: Vec<NodeId>) {
        if observers.is_empty() {
            return;
        }
        let mut dead: SmallVec<[NodeId; 4]> = SmallVec::new();
        {
            let mut scopes = self.scopes.borrow_mut();
            let mut pending = self.pending.borrow_mut();
            for observer in observers {
                match scopes.get_mut(&observer) {
                    Some(node) => {
                        node.state = NodeState::Stale;
                        pending.insert(observer);
                    }
                    None => dead.push(observer),
                }
            }
        }
        if !dead.is_empty() {
            self.prune_observers(source, &dead);
        }
    }

    fn prune_observers(&self, source: NodeId, dead: &[NodeId]) {
        if let Some(cell) = self.signals.borrow_mut().get_mut(&source) {
            for id in dead {
                cell.observers.shift_remove(id);
            }
        } else if let Some(node) = self.scopes.borrow_mut().get_mut(&source) {
            for id in dead {
                node.observers.shift_remove(id);
            }
        }
        debug!(source = %source, pruned = dead.len(), "pruned observer edges to disposed nodes");
    }

    /// Flush unless writes are currently being absorbed (open batch, a
    /// flush already running, or a computation body executing).
    fn maybe_flush(&self) -> Result<()> {
        if self.flushing.get()
            || self.batch_depth.get() > 0
            || self.active.get().is_some()
            || self.pending.borrow().is_empty()
        {
            return Ok(());
        }
        self.flush()
    }

    /// One coordinated propagation cycle: repeat mark/order/execute rounds
    /// until no stale work remains, then advance the logical clock.
    fn flush(&self) -> Result<()> {
        self.flushing.set(true);
        trace!(clock = self.clock.get(), "flush begin");
        let result = self.flush_rounds();
        self.flushing.set(false);
        self.active.set(None);
        match &result {
            Ok(()) => {
                self.clock.set(self.clock.get() + 1);
                trace!(clock = self.clock.get(), "flush complete");
            }
            Err(err) => debug!(%err, "flush aborted"),
        }
        result
    }

    fn flush_rounds(&self) -> Result<()> {
        let mut rounds = 0usize;
        loop {
            let roots: Vec<NodeId> = self.pending.borrow().iter().copied().collect();
            if roots.is_empty() {
                return Ok(());
            }
            rounds += 1;
            if rounds > MAX_FLUSH_ROUNDS {
                debug!(round = rounds, "flush round limit hit");
                return Err(ReactiveError::CyclicDependency(roots[0]));
            }

            let order = self.plan_round(&roots)?;
            for id in order {
                self.pending.borrow_mut().shift_remove(&id);
                let state = match self.scopes.borrow().get(&id) {
                    Some(node) => node.state,
                    // Disposed mid-round by an upstream recompute.
                    None => continue,
                };
                match state {
                    NodeState::Stale => self.recompute(id),
                    NodeState::Pending => {
                        // Every upstream branch pruned; nothing changed
                        // underneath this node after all.
                        if let Some(node) = self.scopes.borrow_mut().get_mut(&id) {
                            node.state = NodeState::Clean;
                        }
                    }
                    NodeState::Clean => {}
                }
            }
        }
    }

    /// Mark phase plus ordering for one round: walk forward from the stale
    /// roots marking reachable computations pending, then order the marked
    /// set so every node runs after all of its marked ancestors.
    fn plan_round(&self, roots: &[NodeId]) -> Result<Vec<NodeId>> {
        let mut marked: IndexSet<NodeId> = IndexSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        for &root in roots {
            if self.scopes.borrow().contains_key(&root) && marked.insert(root) {
                queue.push_back(root);
            }
        }

        while let Some(id) = queue.pop_front() {
            let observers: SmallVec<[NodeId; 8]> = match self.scopes.borrow().get(&id) {
                Some(node) => node.observers.iter().copied().collect(),
                None => continue,
            };
            let mut dead: SmallVec<[NodeId; 4]> = SmallVec::new();
            for observer in observers {
                let alive = {
                    let mut scopes = self.scopes.borrow_mut();
                    match scopes.get_mut(&observer) {
                        Some(node) => {
                            if node.state == NodeState::Clean {
                                node.state = NodeState::Pending;
                            }
                            true
                        }
                        None => false,
                    }
                };
                if alive {
                    if marked.insert(observer) {
                        queue.push_back(observer);
                    }
                } else {
                    dead.push(observer);
                }
            }
            if !dead.is_empty() {
                self.prune_observers(id, &dead);
            }
        }

        let mut scheduler = FlushScheduler::new();
        {
            let scopes = self.scopes.borrow();
            for &id in &marked {
                let Some(node) = scopes.get(&id) else { continue };
                let in_degree = node
                    .dependencies
                    .iter()
                    .filter(|dep| marked.contains(*dep))
                    .count();
                let dependents: SmallVec<[NodeId; 4]> = node
                    .observers
                    .iter()
                    .copied()
                    .filter(|observer| marked.contains(observer))
                    .collect();
                scheduler.add_node(id, in_degree, dependents);
            }
        }
        scheduler
            .topological_order()
            .map_err(ReactiveError::CyclicDependency)
    }

    /// Re-execute a computation: tear down everything its previous run
    /// created, rebuild its dependency set from what the body actually
    /// reads, and propagate downstream only if its output changed.
    fn recompute(&self, id: NodeId) {
        let owned = match self.scopes.borrow_mut().get_mut(&id) {
            Some(node) => std::mem::take(&mut node.owned),
            None => return,
        };
        self.teardown_owned(owned);
        self.clear_dependencies(id);

        let body = {
            let mut scopes = self.scopes.borrow_mut();
            match scopes.get_mut(&id) {
                Some(node) => {
                    // Clean before running: the body may legitimately
                    // re-stale this node by writing one of its own sources,
                    // and that mark must survive the run.
                    node.state = NodeState::Clean;
                    node.body.clone()
                }
                // Torn down by one of its own cleanups.
                None => return,
            }
        };
        let Some(body) = body else {
            return;
        };

        trace!(computation = %id, "recompute");
        let new_value = {
            let _guard = ActiveGuard::enter(self, id);
            (&mut *body.borrow_mut())(self)
        };

        let changed_observers: Option<Vec<NodeId>> = {
            let mut scopes = self.scopes.borrow_mut();
            let Some(node) = scopes.get_mut(&id) else {
                // Disposed itself mid-body; nothing left to update.
                return;
            };
            let changed = match node.kind {
                ScopeKind::MemoComputation => node.value != new_value,
                _ => true,
            };
            if node.kind == ScopeKind::MemoComputation {
                node.value = new_value;
            }
            node.updated_at = self.clock.get();
            if changed && !node.observers.is_empty() {
                Some(node.observers.iter().copied().collect())
            } else {
                if !changed {
                    trace!(computation = %id, "memo unchanged, pruning branch");
                }
                None
            }
        };

        if let Some(observers) = changed_observers {
            self.mark_stale(id, observers);
        }
    }
}

impl<V> Default for Runtime<V>
where
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores the previously active computation when dropped.
///
/// This keeps the tracking pointer consistent even if a host body panics
/// and the host catches the unwind above the engine.
struct ActiveGuard<'a, V>
where
    V: Clone + PartialEq + 'static,
{
    runtime: &'a Runtime<V>,
    previous: Option<NodeId>,
}

impl<'a, V> ActiveGuard<'a, V>
where
    V: Clone + PartialEq + 'static,
{
    fn enter(runtime: &'a Runtime<V>, id: NodeId) -> Self {
        let previous = runtime.active.replace(Some(id));
        Self { runtime, previous }
    }
}

impl<V> Drop for ActiveGuard<'_, V>
where
    V: Clone + PartialEq + 'static,
{
    fn drop(&mut self) {
        self.runtime.active.set(self.previous);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::reactive::{Effect, Scope, Signal};

    #[test]
    fn clock_advances_once_per_flush() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 0);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        Effect::new(&rt, root, move |rt| {
            let _ = signal.get(rt);
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();

        let before = rt.clock();
        signal.set(&rt, 1).unwrap();
        assert_eq!(rt.clock(), before + 1);

        signal.set(&rt, 2).unwrap();
        assert_eq!(rt.clock(), before + 2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn noop_write_does_not_flush() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 7);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        Effect::new(&rt, root, move |rt| {
            let _ = signal.get(rt);
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();
        assert_eq!(runs.get(), 1);

        let before = rt.clock();
        signal.set(&rt, 7).unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(rt.clock(), before);
        assert_eq!(signal.version(&rt).unwrap(), 0);
    }

    #[test]
    fn batch_collapses_writes_into_one_flush() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let a = Signal::new(&rt, 0);
        let b = Signal::new(&rt, 0);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        Effect::new(&rt, root, move |rt| {
            let _ = a.get(rt);
            let _ = b.get(rt);
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();
        assert_eq!(runs.get(), 1);

        let before = rt.clock();
        rt.batch(|rt| {
            a.set(rt, 1).unwrap();
            b.set(rt, 2).unwrap();
            a.set(rt, 3).unwrap();
            // Nothing has propagated yet.
            assert_eq!(runs.get(), 1);
        })
        .unwrap();

        assert_eq!(runs.get(), 2);
        assert_eq!(rt.clock(), before + 1);
    }

    #[test]
    fn nested_batches_flush_at_outermost_close() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 0);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        Effect::new(&rt, root, move |rt| {
            let _ = signal.get(rt);
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();

        rt.begin_batch();
        rt.begin_batch();
        signal.set(&rt, 1).unwrap();
        rt.end_batch().unwrap();
        // Inner close: still batching.
        assert!(rt.is_batching());
        assert_eq!(runs.get(), 1);
        rt.end_batch().unwrap();

        assert!(!rt.is_batching());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unbalanced_end_batch_is_tolerated() {
        let rt: Runtime<i32> = Runtime::new();
        rt.end_batch().unwrap();
        assert!(!rt.is_batching());
    }

    #[test]
    fn writes_inside_a_body_are_absorbed_into_the_same_flush() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let input = Signal::new(&rt, 0);
        let derived = Signal::new(&rt, 0);

        Effect::new(&rt, root, move |rt| {
            let value = input.get(rt).unwrap();
            derived.set(rt, value * 10).unwrap();
        })
        .unwrap();

        let runs = Rc::new(Cell::new(0));
        let seen = Rc::new(Cell::new(-1));
        let runs_inner = runs.clone();
        let seen_inner = seen.clone();
        Effect::new(&rt, root, move |rt| {
            seen_inner.set(derived.get(rt).unwrap());
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(seen.get(), 0);

        let before = rt.clock();
        input.set(&rt, 4).unwrap();

        // One external write, one flush, downstream saw the final value.
        assert_eq!(rt.clock(), before + 1);
        assert_eq!(seen.get(), 40);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn independent_runtimes_do_not_interfere() {
        let rt_a: Runtime<i32> = Runtime::new();
        let rt_b: Runtime<i32> = Runtime::new();
        let root_a = Scope::root(&rt_a);
        let signal_a = Signal::new(&rt_a, 0);
        let signal_b = Signal::new(&rt_b, 0);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        Effect::new(&rt_a, root_a, move |rt| {
            let _ = signal_a.get(rt);
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();

        let clock_a = rt_a.clock();
        signal_b.set(&rt_b, 5).unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(rt_a.clock(), clock_a);
    }
}
