//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates when its dependencies
//! change and propagates downstream only when the cached value actually
//! changed.
//!
//! # How Memos Work
//!
//! 1. On creation, the memo runs its body immediately, establishing its
//!    dependency set and initial cached value.
//!
//! 2. When an upstream source changes, the propagation pass re-runs the
//!    body in dependency order.
//!
//! 3. The new result is compared (host equality) against the cache. Equal
//!    results stop propagation right there: observers of the memo are not
//!    re-executed.
//!
//! # Ownership
//!
//! A memo is also a scope: computations and cleanups created during its
//! body belong to it and are torn down before every re-run and on
//! disposal. Use [`Memo::scope`] to address it as an ownership node.

use std::cell::RefCell;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use super::error::Result;
use super::runtime::{Body, Runtime, ScopeKind};
use super::scope::Scope;
use crate::graph::{NodeId, NodeState};

#[cfg(doc)]
use super::error::ReactiveError;

/// A cached derived value that recomputes when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let root = Scope::root(&rt);
/// let count = Signal::new(&rt, 2);
/// let doubled = Memo::new(&rt, root, move |rt| count.get(rt).unwrap() * 2)?;
///
/// assert_eq!(doubled.get(&rt)?, 4);
/// ```
pub struct Memo<V>
where
    V: Clone + PartialEq + 'static,
{
    id: NodeId,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Memo<V>
where
    V: Clone + PartialEq + 'static,
{
    /// Create a memo owned by `owner` and run it immediately.
    ///
    /// Fails with [`ReactiveError::UseAfterDispose`] if the owner is gone.
    pub fn new<F>(runtime: &Runtime<V>, owner: Scope<V>, mut compute: F) -> Result<Self>
    where
        F: FnMut(&Runtime<V>) -> V + 'static,
    {
        let body: Body<V> = Rc::new(RefCell::new(move |rt: &Runtime<V>| Some(compute(rt))));
        let id = runtime.create_computation(owner.id(), ScopeKind::MemoComputation, body)?;
        Ok(Self {
            id,
            _marker: PhantomData,
        })
    }

    /// Get the memo's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the cached value.
    ///
    /// If called while another computation is executing, registers that
    /// computation as an observer of this memo. Reading a memo from inside
    /// its own body fails with [`ReactiveError::CyclicDependency`].
    pub fn get(&self, runtime: &Runtime<V>) -> Result<V> {
        runtime.memo_get(self.id, true)
    }

    /// Get the cached value without establishing a dependency edge.
    pub fn get_untracked(&self, runtime: &Runtime<V>) -> Result<V> {
        runtime.memo_get(self.id, false)
    }

    /// Current scheduling state of the memo.
    pub fn state(&self, runtime: &Runtime<V>) -> Result<NodeState> {
        runtime.state_of(self.id)
    }

    /// Logical-clock value of the latest completed run.
    pub fn updated_at(&self, runtime: &Runtime<V>) -> Result<u64> {
        runtime.updated_at(self.id)
    }

    /// Get the number of observers.
    pub fn observer_count(&self, runtime: &Runtime<V>) -> Result<usize> {
        runtime.memo_observer_count(self.id)
    }

    /// Address this memo as an ownership node.
    pub fn scope(&self) -> Scope<V> {
        Scope::from_id(self.id)
    }

    /// Dispose the memo: tear down everything it owns, sever its edges,
    /// and mark it permanently inert.
    pub fn dispose(&self, runtime: &Runtime<V>) -> Result<()> {
        runtime.dispose_scope(self.id)
    }
}

impl<V> Clone for Memo<V>
where
    V: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Memo<V> where V: Clone + PartialEq + 'static {}

impl<V> PartialEq for Memo<V>
where
    V: Clone + PartialEq + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<V> Eq for Memo<V> where V: Clone + PartialEq + 'static {}

impl<V> Debug for Memo<V>
where
    V: Clone + PartialEq + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
