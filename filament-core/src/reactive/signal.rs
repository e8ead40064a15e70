//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a computation is executing, the signal
//!    registers that computation as an observer.
//!
//! 2. When a signal's value changes, its observers are marked stale and the
//!    runtime runs one propagation pass over everything reachable.
//!
//! 3. Writing a value equal (by host equality) to the current one is a
//!    complete no-op: no version bump, no propagation.
//!
//! # Handles
//!
//! `Signal<V>` is a copyable id. The cell itself lives inside the
//! [`Runtime`], so every operation takes `&Runtime<V>`; a handle whose cell
//! has been disposed reports [`ReactiveError::UseAfterDispose`].

use std::fmt::Debug;
use std::marker::PhantomData;

use super::error::Result;
use super::runtime::Runtime;
use crate::graph::NodeId;

#[cfg(doc)]
use super::error::ReactiveError;

/// A reactive signal holding a value of type `V`.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// // Read the value
/// let value = count.get(&rt)?;
///
/// // Update the value (propagates to observers)
/// count.set(&rt, 5)?;
/// ```
pub struct Signal<V>
where
    V: Clone + PartialEq + 'static,
{
    id: NodeId,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Signal<V>
where
    V: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime<V>, value: V) -> Self {
        Self {
            id: runtime.create_signal(value),
            _marker: PhantomData,
        }
    }

    /// Get the signal's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value.
    ///
    /// If called while a computation is executing, registers that
    /// computation as an observer of this signal. Registering the same
    /// observer twice is a no-op.
    pub fn get(&self, runtime: &Runtime<V>) -> Result<V> {
        runtime.signal_get(self.id, true)
    }

    /// Get the current value without establishing a dependency edge.
    pub fn get_untracked(&self, runtime: &Runtime<V>) -> Result<V> {
        runtime.signal_get(self.id, false)
    }

    /// Set a new value and propagate to observers.
    ///
    /// If the new value equals the current one under host equality the
    /// write is ignored entirely. A propagation pass triggered by this
    /// write can surface [`ReactiveError::CyclicDependency`].
    pub fn set(&self, runtime: &Runtime<V>, value: V) -> Result<()> {
        runtime.signal_set(self.id, value)
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, runtime: &Runtime<V>, f: F) -> Result<()>
    where
        F: FnOnce(&V) -> V,
    {
        let current = self.get_untracked(runtime)?;
        self.set(runtime, f(&current))
    }

    /// How many times the signal has been written with a distinct value.
    pub fn version(&self, runtime: &Runtime<V>) -> Result<u64> {
        runtime.signal_version(self.id)
    }

    /// Get the number of observers.
    pub fn observer_count(&self, runtime: &Runtime<V>) -> Result<usize> {
        runtime.signal_observer_count(self.id)
    }

    /// Remove the cell from the runtime. Further reads and writes through
    /// any handle to it fail with [`ReactiveError::UseAfterDispose`].
    pub fn dispose(&self, runtime: &Runtime<V>) -> Result<()> {
        runtime.dispose_signal(self.id)
    }
}

impl<V> Clone for Signal<V>
where
    V: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Signal<V> where V: Clone + PartialEq + 'static {}

impl<V> PartialEq for Signal<V>
where
    V: Clone + PartialEq + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<V> Eq for Signal<V> where V: Clone + PartialEq + 'static {}

impl<V> Debug for Signal<V>
where
    V: Clone + PartialEq + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("id", &self.id).finish()
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
    use crate::reactive::{Effect, ReactiveError, Scope};

    #[test]
    fn signal_get_and_set() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        assert_eq!(signal.get(&rt).unwrap(), 0);

        signal.set(&rt, 42).unwrap();
        assert_eq!(signal.get(&rt).unwrap(), 42);
    }

    #[test]
    fn signal_update() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 10);
        signal.update(&rt, |v| v + 5).unwrap();
        assert_eq!(signal.get(&rt).unwrap(), 15);
    }

    #[test]
    fn signal_version_counts_distinct_writes() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        assert_eq!(signal.version(&rt).unwrap(), 0);

        signal.set(&rt, 1).unwrap();
        signal.set(&rt, 1).unwrap();
        signal.set(&rt, 2).unwrap();

        assert_eq!(signal.version(&rt).unwrap(), 2);
    }

    #[test]
    fn reads_inside_a_computation_register_an_observer() {
        let rt = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 0);
        assert_eq!(signal.observer_count(&rt).unwrap(), 0);

        Effect::new(&rt, root, move |rt| {
            let _ = signal.get(rt);
            let _ = signal.get(rt);
        })
        .unwrap();

        // Two reads, one edge.
        assert_eq!(signal.observer_count(&rt).unwrap(), 1);
    }

    #[test]
    fn untracked_reads_do_not_register() {
        let rt = Runtime::new();
        let root = Scope::root(&rt);
        let signal = Signal::new(&rt, 0);

        Effect::new(&rt, root, move |rt| {
            let _ = signal.get_untracked(rt);
        })
        .unwrap();

        assert_eq!(signal.observer_count(&rt).unwrap(), 0);
    }

    #[test]
    fn reads_outside_any_computation_do_not_register() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 1);

        assert_eq!(signal.get(&rt).unwrap(), 1);
        assert_eq!(signal.observer_count(&rt).unwrap(), 0);
    }

    #[test]
    fn disposed_signal_rejects_access() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        signal.dispose(&rt).unwrap();

        assert_eq!(
            signal.get(&rt),
            Err(ReactiveError::UseAfterDispose(signal.id()))
        );
        assert_eq!(
            signal.set(&rt, 1),
            Err(ReactiveError::UseAfterDispose(signal.id()))
        );
        assert_eq!(
            signal.dispose(&rt),
            Err(ReactiveError::UseAfterDispose(signal.id()))
        );
    }

    #[test]
    fn writes_after_observer_disposal_do_nothing() {
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
        assert_eq!(signal.observer_count(&rt).unwrap(), 1);

        effect.dispose(&rt).unwrap();
        assert_eq!(signal.observer_count(&rt).unwrap(), 0);

        signal.set(&rt, 1).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn signal_handles_are_copyable_ids() {
        let rt = Runtime::new();
        let signal = Signal::new(&rt, 0);
        let alias = signal;

        alias.set(&rt, 9).unwrap();
        assert_eq!(signal.get(&rt).unwrap(), 9);
        assert_eq!(signal, alias);
    }
}
