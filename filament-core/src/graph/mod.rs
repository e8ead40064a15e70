//! Dependency Graph
//!
//! This module provides the bookkeeping shared by every node in the
//! reactive dependency graph: stable node identity, the per-node dirty
//! state machine, and the per-round execution-order planner.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent reactive values (signals) or computations
//! - Edges represent dependencies: if A reads B, there is an edge from B to A
//!
//! When a signal changes, the runtime walks the graph forward to find every
//! affected computation, then uses [`FlushScheduler`] to execute them in
//! dependency order. Diamond-shaped fan-in is the reason ordering matters: a
//! computation reachable over two paths must run once, after both paths have
//! settled, never in between.
//!
//! Ownership edges (which scope owns which computation) are deliberately not
//! represented here; they form a separate forest kept by the runtime and
//! never participate in propagation ordering.

mod node;
mod scheduler;

pub use node::{NodeId, NodeState};
pub use scheduler::FlushScheduler;
