//! Graph Node Identity and Dirty States
//!
//! This module defines the identity and scheduling state shared by every
//! participant in the dependency graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a node in the dependency graph.
///
/// Ids are allocated from a process-wide counter and never reused. A disposed
/// node's id therefore stays invalid forever, which is what makes
/// use-after-dispose detectable by a simple arena lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling state of a computation node.
///
/// A signal write moves its direct observers to `Stale`. The propagation
/// walk then moves everything reachable further downstream to `Pending`,
/// which means "dirty, but do not execute yet: an ancestor may still change
/// my inputs". A node executes only once it is `Stale` and every dirty
/// ancestor has already settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The node's last run is up-to-date.
    Clean,

    /// A direct upstream source changed. The node will re-execute during
    /// the current propagation pass.
    Stale,

    /// The node is reachable from a changed source through one or more
    /// intermediate computations. Whether it actually re-executes depends
    /// on those ancestors propagating a change.
    Pending,
}

impl NodeState {
    /// Whether the node needs attention from the propagation pass.
    pub fn is_dirty(&self) -> bool {
        !matches!(self, NodeState::Clean)
    }
}
