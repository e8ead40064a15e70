//! Filament Core
//!
//! This crate provides the reactive engine at the heart of the Filament
//! scripting runtime. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Automatic dependency tracking with glitch-free propagation
//! - Ownership scopes with deterministic, structured disposal
//! - Batched writes collapsing into a single coherent flush
//!
//! The crate is designed to be used both as a native Rust library and as a
//! Python extension module via PyO3 (behind the `python` feature).
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: the engine: signals, memos, effects, scopes, and the
//!   runtime coordinator that schedules propagation
//! - `graph`: dependency-graph bookkeeping: node identity, dirty states,
//!   and the per-round execution-order planner
//!
//! Everything hangs off an explicit [`reactive::Runtime`]: there are no
//! ambient globals, so one process can host any number of isolated graphs
//! (one per embedded script context).
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::reactive::{Runtime, Scope, Signal, Memo, Effect};
//!
//! let rt = Runtime::new();
//! let root = Scope::root(&rt);
//!
//! // Create a signal
//! let count = Signal::new(&rt, 0);
//!
//! // Create a derived value
//! let doubled = Memo::new(&rt, root, move |rt| count.get(rt).unwrap() * 2)?;
//!
//! // Create an effect
//! Effect::new(&rt, root, move |rt| {
//!     println!("count: {}, doubled: {}",
//!         count.get(rt).unwrap(), doubled.get(rt).unwrap());
//! })?;
//!
//! // Update the signal; the memo and effect re-run in dependency order.
//! count.set(&rt, 5)?;
//! ```

pub mod graph;
pub mod reactive;

#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
/// It registers all Python-exposed types and functions.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyRuntime>()?;
    m.add_class::<python::PySignal>()?;
    m.add_class::<python::PyMemo>()?;
    m.add_class::<python::PyScope>()?;

    // Add version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
