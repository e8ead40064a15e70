//! Reactive Primitives
//!
//! This module implements the engine's reactive system: signals, memos,
//! effects, and the scopes that own them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while a computation is executing, the signal automatically registers
//! that computation as an observer. When the signal's value changes, every
//! observer is re-executed in dependency order.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates when a
//! dependency changes, and propagates further downstream only when the new
//! result differs from the cached one.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects synchronize reactive state with external
//! systems, such as the host's element tree.
//!
//! ## Scopes
//!
//! Every computation doubles as an ownership scope: nested computations and
//! cleanup callbacks created during its body belong to it, and are torn
//! down automatically before each re-run and on disposal. Bare scopes are
//! pure containers for structuring teardown at the root or inside
//! control-flow branches.
//!
//! # Implementation Notes
//!
//! Dependency tracking is dynamic: each run of a computation records
//! exactly the set of sources it actually read, so dropping a conditional
//! read also drops the subscription. This approach ("automatic dependency
//! tracking") is the same one used by SolidJS, Vue 3, and Leptos.
//!
//! All state lives in an explicit [`Runtime`] object passed by reference
//! into every operation; there is no ambient global, so independent graphs
//! can coexist in one process.

mod effect;
mod error;
mod memo;
mod runtime;
mod scope;
mod signal;

pub use effect::Effect;
pub use error::{ReactiveError, Result};
pub use memo::Memo;
pub use runtime::{Runtime, ScopeKind};
pub use scope::{on_cleanup, Scope};
pub use signal::Signal;
