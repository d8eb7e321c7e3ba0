//! Leak tracking for tests and debug builds.
//!
//! Every node the arena creates is recorded, as is every disposal. A node
//! that was created, never disposed and is no longer reachable from an
//! artifact root was dropped from the tree without going through dispose.

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::base::NodeId;

#[derive(Debug, Default, Clone)]
pub struct LeakTracker {
    created: FxHashSet<NodeId>,
    disposed: FxHashSet<NodeId>,
    double_disposals: Vec<NodeId>,
}

impl LeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&mut self, node: NodeId) {
        self.created.insert(node);
    }

    /// Returns `false` (and remembers it) when `node` was already disposed.
    pub fn record_disposed(&mut self, node: NodeId) -> bool {
        if self.disposed.insert(node) {
            true
        } else {
            warn!("[LEAK] {} disposed twice", node);
            self.double_disposals.push(node);
            false
        }
    }

    /// Created and not yet disposed, sorted.
    pub fn outstanding(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.created.difference(&self.disposed).copied().collect();
        nodes.sort();
        nodes
    }

    /// Outstanding nodes that are not in `reachable`.
    pub fn leaked(&self, reachable: &FxHashSet<NodeId>) -> Vec<NodeId> {
        self.outstanding()
            .into_iter()
            .filter(|node| !reachable.contains(node))
            .collect()
    }

    pub fn double_disposals(&self) -> &[NodeId] {
        &self.double_disposals
    }
}
