//! Error Types
//!
//! All three error kinds are programming errors in the host's use of the
//! engine rather than recoverable runtime conditions. A cyclic dependency
//! aborts the propagation pass that detected it (writes already applied
//! stand); the other two are rejected synchronously before any graph
//! mutation takes place. The engine never retries on the host's behalf.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors surfaced by graph operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The propagation pass found a dependency path leading back into
    /// itself. The offending subgraph is left unexecuted and the error
    /// resurfaces on the next write that reaches it.
    #[error("cyclic dependency detected at node {0}")]
    CyclicDependency(NodeId),

    /// A read, write, recompute, or ownership operation referenced a node
    /// that has already been disposed.
    #[error("use of disposed node {0}")]
    UseAfterDispose(NodeId),

    /// An ownership transfer targeted a node that already has a live owner,
    /// or would have turned the ownership forest into a cycle.
    #[error("node {0} already has a live owner")]
    DoubleOwnership(NodeId),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ReactiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_node_identity() {
        let id = NodeId::new();
        let message = ReactiveError::UseAfterDispose(id).to_string();
        assert!(message.contains(&format!("{id}")));
    }
}
