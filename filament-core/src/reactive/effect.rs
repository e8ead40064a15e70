//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever one of
//! its dependencies changes. It exposes no value, so it always counts as
//! "changed" and never prunes propagation the way a memo can.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish its
//!    initial dependency set.
//!
//! 2. When any dependency changes, the propagation pass re-runs the body.
//!
//! 3. Before each re-run, everything the previous run created (nested
//!    computations, cleanup callbacks) is torn down, and the dependency
//!    set is rebuilt from the reads the new run actually performs.
//!
//! # Use Cases
//!
//! Effects synchronize reactive state with the world outside the graph:
//! pushing values into the element tree, notifying the host runtime,
//! logging. Anything that needs a value downstream should be a
//! [`Memo`](super::Memo) instead.

use std::cell::RefCell;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use super::error::Result;
use super::runtime::{Body, Runtime, ScopeKind};
use super::scope::Scope;
use crate::graph::NodeId;

#[cfg(doc)]
use super::error::ReactiveError;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let root = Scope::root(&rt);
/// let count = Signal::new(&rt, 0);
///
/// Effect::new(&rt, root, move |rt| {
///     println!("count is {}", count.get(rt).unwrap());
/// })?;
///
/// count.set(&rt, 5)?; // prints "count is 5"
/// ```
pub struct Effect<V>
where
    V: Clone + PartialEq + 'static,
{
    id: NodeId,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Effect<V>
where
    V: Clone + PartialEq + 'static,
{
    /// Create an effect owned by `owner` and run it immediately.
    ///
    /// Fails with [`ReactiveError::UseAfterDispose`] if the owner is gone.
    pub fn new<F>(runtime: &Runtime<V>, owner: Scope<V>, mut run: F) -> Result<Self>
    where
        F: FnMut(&Runtime<V>) + 'static,
    {
        let body: Body<V> = Rc::new(RefCell::new(move |rt: &Runtime<V>| {
            run(rt);
            None
        }));
        let id = runtime.create_computation(owner.id(), ScopeKind::PureComputation, body)?;
        Ok(Self {
            id,
            _marker: PhantomData,
        })
    }

    /// Get the effect's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Address this effect as an ownership node.
    pub fn scope(&self) -> Scope<V> {
        Scope::from_id(self.id)
    }

    /// Whether the effect is still alive.
    pub fn is_alive(&self, runtime: &Runtime<V>) -> bool {
        runtime.is_scope_alive(self.id)
    }

    /// Dispose the effect: tear down everything it owns, sever its edges,
    /// and mark it permanently inert.
    pub fn dispose(&self, runtime: &Runtime<V>) -> Result<()> {
        runtime.dispose_scope(self.id)
    }
}

impl<V> Clone for Effect<V>
where
    V: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Effect<V> where V: Clone + PartialEq + 'static {}

impl<V> PartialEq for Effect<V>
where
    V: Clone + PartialEq + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<V> Eq for Effect<V> where V: Clone + PartialEq + 'static {}

impl<V> Debug for Effect<V>
where
    V: Clone + PartialEq + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect").field("id", &self.id).finish()
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
    use crate::reactive::{ReactiveError, Signal};

    #[test]
    fn effect_runs_on_creation() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        Effect::new(&rt, root, move |_| {
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let rt = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 0);

        let observed = Rc::new(Cell::new(-1));
        let observed_inner = observed.clone();
        Effect::new(&rt, root, move |rt| {
            observed_inner.set(signal.get(rt).unwrap());
        })
        .unwrap();
        assert_eq!(observed.get(), 0);

        signal.set(&rt, 42).unwrap();
        assert_eq!(observed.get(), 42);
    }

    #[test]
    fn disposed_effect_does_not_run() {
        let rt = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 0);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        let effect = Effect::new(&rt, root, move |rt| {
            let _ = signal.get(rt);
            runs_inner.set(runs_inner.get() + 1);
        })
        .unwrap();
        assert_eq!(runs.get(), 1);

        effect.dispose(&rt).unwrap();
        assert!(!effect.is_alive(&rt));

        signal.set(&rt, 1).unwrap();
        signal.set(&rt, 2).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn double_dispose_is_rejected() {
        let rt: Runtime<i32> = Runtime::new();
        let root = Scope::root(&rt);
        let effect = Effect::new(&rt, root, |_| {}).unwrap();

        effect.dispose(&rt).unwrap();
        assert_eq!(
            effect.dispose(&rt),
            Err(ReactiveError::UseAfterDispose(effect.id()))
        );
    }

    #[test]
    fn stopped_reading_means_stopped_reacting() {
        let rt = Runtime::new();
        let root = Scope::root(&rt);
        let gate = Signal::new(&rt, 1);
        let word = Signal::new(&rt, 0);

        let runs = Rc::new(Cell::new(0));
        let runs_inner = runs.clone();
        Effect::new(&rt, root, move |rt| {
            runs_inner.set(runs_inner.get() + 1);
            if gate.get(rt).unwrap() != 0 {
                let _ = word.get(rt).unwrap();
            }
        })
        .unwrap();
        assert_eq!(runs.get(), 1);

        word.set(&rt, 1).unwrap();
        assert_eq!(runs.get(), 2);

        // Close the gate; the rerun drops the edge to `word`.
        gate.set(&rt, 0).unwrap();
        assert_eq!(runs.get(), 3);
        assert_eq!(word.observer_count(&rt).unwrap(), 0);

        word.set(&rt, 2).unwrap();
        assert_eq!(runs.get(), 3);
    }
}
