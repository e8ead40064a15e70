//! Flush Scheduler
//!
//! The scheduler determines the order in which dirty nodes are executed
//! during one propagation round. It ensures that dependencies are always
//! processed before their dependents.
//!
//! # Algorithm
//!
//! The propagation pass hands the scheduler the subgraph it marked: every
//! dirty node together with its edges *within* that set (edges to clean,
//! untouched parts of the graph are irrelevant for ordering). The scheduler
//! then runs Kahn's algorithm:
//!
//! 1. Seed a queue with every node whose in-set in-degree is zero.
//! 2. Pop a node, append it to the order, decrement each in-set dependent.
//! 3. Dependents that reach zero join the queue.
//!
//! If the queue drains before every node has been ordered, the remaining
//! nodes all sit on a dependency cycle; the scheduler reports one of them
//! so the caller can abort before executing anything in the round.

use std::collections::VecDeque;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::node::NodeId;

/// Per-node bookkeeping for one propagation round.
struct Entry {
    /// Number of in-set nodes this node depends on.
    in_degree: usize,
    /// In-set nodes that depend on this node.
    dependents: SmallVec<[NodeId; 4]>,
}

/// Execution-order planner for a single propagation round.
///
/// Built fresh for every round from the marked subgraph; insertion order is
/// preserved so that independent nodes execute in a deterministic order.
pub struct FlushScheduler {
    entries: IndexMap<NodeId, Entry>,
}

impl FlushScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Add a marked node with its in-set in-degree and in-set dependents.
    pub fn add_node(&mut self, id: NodeId, in_degree: usize, dependents: SmallVec<[NodeId; 4]>) {
        self.entries.insert(
            id,
            Entry {
                in_degree,
                dependents,
            },
        );
    }

    /// Number of nodes in the round.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the round is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produce the execution order, dependencies before dependents.
    ///
    /// Returns `Err` with a node that sits on a dependency cycle if the
    /// subgraph cannot be ordered.
    pub fn topological_order(mut self) -> Result<Vec<NodeId>, NodeId> {
        let mut ready: VecDeque<NodeId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.in_degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.entries.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);

            let dependents = match self.entries.get(&id) {
                Some(entry) => entry.dependents.clone(),
                None => continue,
            };

            for dependent in dependents {
                if let Some(entry) = self.entries.get_mut(&dependent) {
                    entry.in_degree = entry.in_degree.saturating_sub(1);
                    if entry.in_degree == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        if order.len() < self.entries.len() {
            // Whatever never reached in-degree zero is part of a cycle.
            if let Some((id, _)) = self.entries.iter().find(|(_, entry)| entry.in_degree > 0) {
                return Err(*id);
            }
        }

        Ok(order)
    }
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::new()
    }
}
