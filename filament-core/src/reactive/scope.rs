//! Scope Implementation
//!
//! A Scope is an ownership container: it owns computations and nested
//! scopes created under it, plus a list of cleanup callbacks, and disposes
//! all of them deterministically when it is torn down or its owning
//! computation re-runs.
//!
//! # Ownership Model
//!
//! Scopes form a forest. Every computation is itself a scope; bare scopes
//! (no body) exist as pure containers, at the graph root or inside
//! control-flow branches. The owner of a newly created node is the scope
//! passed at creation, which for nested work is the computation currently
//! executing; obtain it with [`Scope::active`].
//!
//! Children and cleanup callbacks live in one registration-ordered list;
//! disposal walks it backwards, so teardown is strict LIFO across both
//! kinds.

use std::fmt::Debug;
use std::marker::PhantomData;

use tracing::warn;

use super::error::Result;
use super::runtime::Runtime;
use crate::graph::NodeId;

#[cfg(doc)]
use super::error::ReactiveError;

/// An ownership node in the scope forest.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let root = Scope::root(&rt);
///
/// Effect::new(&rt, root, move |rt| {
///     // Nested work belongs to the effect and is torn down on re-run.
///     let here = Scope::active(rt).unwrap();
///     on_cleanup(rt, || println!("torn down"));
///     Effect::new(rt, here, move |rt| { /* ... */ }).unwrap();
/// })?;
///
/// root.clean_up(&rt)?; // dispose the whole tree
/// ```
pub struct Scope<V>
where
    V: Clone + PartialEq + 'static,
{
    id: NodeId,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Scope<V>
where
    V: Clone + PartialEq + 'static,
{
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Create a parentless root scope.
    pub fn root(runtime: &Runtime<V>) -> Self {
        Self::from_id(runtime.create_root_scope())
    }

    /// Create a bare child scope under `parent`.
    pub fn child(runtime: &Runtime<V>, parent: Scope<V>) -> Result<Self> {
        Ok(Self::from_id(runtime.create_child_scope(parent.id)?))
    }

    /// The scope of the computation currently executing, if any.
    ///
    /// This is how user-supplied callbacks locate the correct owner for
    /// computations they create.
    pub fn active(runtime: &Runtime<V>) -> Option<Self> {
        runtime.active_id().map(Self::from_id)
    }

    /// Get the scope's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Append a callback to run when the scope is disposed or its owning
    /// computation re-runs. Callbacks run in reverse registration order,
    /// interleaved with child disposal.
    pub fn register_cleanup<F>(&self, runtime: &Runtime<V>, callback: F) -> Result<()>
    where
        F: FnOnce() + 'static,
    {
        runtime.register_cleanup(self.id, Box::new(callback))
    }

    /// Take ownership of a parentless scope or computation.
    ///
    /// Fails with [`ReactiveError::DoubleOwnership`] if `node` already has
    /// a live owner or is an ancestor of this scope.
    pub fn adopt(&self, runtime: &Runtime<V>, node: Scope<V>) -> Result<()> {
        runtime.adopt(self.id, node.id)
    }

    /// Dispose the scope and everything it transitively owns.
    ///
    /// Children are disposed most-recently-created first and cleanup
    /// callbacks run in reverse registration order; afterwards the scope is
    /// permanently inert.
    pub fn clean_up(&self, runtime: &Runtime<V>) -> Result<()> {
        runtime.dispose_scope(self.id)
    }

    /// The nearest ancestor scope, or `None` at a root.
    pub fn owner(&self, runtime: &Runtime<V>) -> Result<Option<Scope<V>>> {
        Ok(runtime.owner_of(self.id)?.map(Self::from_id))
    }

    /// Whether the scope is still alive.
    pub fn is_alive(&self, runtime: &Runtime<V>) -> bool {
        runtime.is_scope_alive(self.id)
    }
}

/// Register a cleanup callback on the scope of the computation currently
/// executing.
///
/// Outside any computation there is nothing to attach to; the callback is
/// dropped without running and a warning is logged.
pub fn on_cleanup<V, F>(runtime: &Runtime<V>, callback: F)
where
    V: Clone + PartialEq + 'static,
    F: FnOnce() + 'static,
{
    match runtime.active_id() {
        Some(active) => {
            // The active computation is always alive.
            let _ = runtime.register_cleanup(active, Box::new(callback));
        }
        None => warn!("on_cleanup called outside any computation; callback dropped"),
    }
}

impl<V> Clone for Scope<V>
where
    V: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Scope<V> where V: Clone + PartialEq + 'static {}

impl<V> PartialEq for Scope<V>
where
    V: Clone + PartialEq + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<V> Eq for Scope<V> where V: Clone + PartialEq + 'static {}

impl<V> Debug for Scope<V>
where
    V: Clone + PartialEq + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::reactive::{Effect, ReactiveError, Signal};

    #[test]
    fn cleanups_run_in_reverse_registration_order() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);

        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let log_a = log.clone();
        let log_b = log.clone();
        root.register_cleanup(&rt, move || log_a.borrow_mut().push("first"))
            .unwrap();
        root.register_cleanup(&rt, move || log_b.borrow_mut().push("second"))
            .unwrap();

        root.clean_up(&rt).unwrap();
        assert_eq!(*log.borrow(), vec!["second", "first"]);
    }

    #[test]
    fn owner_chain_ends_at_root() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let child = Scope::child(&rt, root).unwrap();
        let grandchild = Scope::child(&rt, child).unwrap();

        assert_eq!(root.owner(&rt).unwrap(), None);
        assert_eq!(child.owner(&rt).unwrap(), Some(root));
        assert_eq!(grandchild.owner(&rt).unwrap(), Some(child));
    }

    #[test]
    fn disposal_is_transitive() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let child = Scope::child(&rt, root).unwrap();
        let grandchild = Scope::child(&rt, child).unwrap();

        root.clean_up(&rt).unwrap();

        assert!(!root.is_alive(&rt));
        assert!(!child.is_alive(&rt));
        assert!(!grandchild.is_alive(&rt));
        assert_eq!(
            grandchild.owner(&rt),
            Err(ReactiveError::UseAfterDispose(grandchild.id()))
        );
    }

    #[test]
    fn adopt_takes_over_a_parentless_scope() {
        let rt: Runtime<i32> = Runtime::new();
        let host = Scope::root(&rt);
        let orphan = Scope::root(&rt);
        assert_eq!(orphan.owner(&rt).unwrap(), None);

        host.adopt(&rt, orphan).unwrap();
        assert_eq!(orphan.owner(&rt).unwrap(), Some(host));

        // Disposal now reaches the adopted scope.
        host.clean_up(&rt).unwrap();
        assert!(!orphan.is_alive(&rt));
    }

    #[test]
    fn adopt_rejects_owned_nodes() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let other = Scope::root(&rt);
        let effect = Effect::new(&rt, root, |_| {}).unwrap();

        assert_eq!(
            other.adopt(&rt, effect.scope()),
            Err(ReactiveError::DoubleOwnership(effect.id()))
        );
    }

    #[test]
    fn adopt_rejects_ownership_cycles() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let child = Scope::child(&rt, root).unwrap();

        // `root` is parentless but sits above `child`; adopting it from
        // below would close a loop.
        assert_eq!(
            child.adopt(&rt, root),
            Err(ReactiveError::DoubleOwnership(root.id()))
        );
    }

    #[test]
    fn on_cleanup_attaches_to_the_running_computation() {
        let rt = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 0);

        let log: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        let log_inner = log.clone();
        Effect::new(&rt, root, move |rt| {
            let value = signal.get(rt).unwrap();
            let log_cb = log_inner.clone();
            on_cleanup(rt, move || log_cb.borrow_mut().push(value));
        })
        .unwrap();
        assert!(log.borrow().is_empty());

        // Each rerun first tears down the previous run's cleanup.
        signal.set(&rt, 1).unwrap();
        assert_eq!(*log.borrow(), vec![0]);

        signal.set(&rt, 2).unwrap();
        assert_eq!(*log.borrow(), vec![0, 1]);
    }

    #[test]
    fn on_cleanup_outside_computation_is_dropped() {
        let rt: Runtime<i32> = Runtime::new();
        let ran: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));
        let ran_inner = ran.clone();
        on_cleanup(&rt, move || *ran_inner.borrow_mut() = true);
        assert!(!*ran.borrow());
    }

    #[test]
    fn child_scope_under_disposed_parent_is_rejected() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        root.clean_up(&rt).unwrap();

        assert_eq!(
            Scope::child(&rt, root).map(|scope| scope.id()),
            Err(ReactiveError::UseAfterDispose(root.id()))
        );
    }
}
