//! Anti-dependency index.
//!
//! Maps a target node to the nodes whose bindings reference it. Used to find
//! what has to be rebound when a target disappears or changes name.

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::base::NodeId;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// target → items referencing it
    anti: FxHashMap<NodeId, Vec<NodeId>>,
    /// item → targets (only when forward tracking is enabled)
    forward: Option<FxHashMap<NodeId, Vec<NodeId>>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also maintain the item → target direction.
    pub fn with_forward_tracking() -> Self {
        Self {
            anti: FxHashMap::default(),
            forward: Some(FxHashMap::default()),
        }
    }

    pub fn tracks_forward(&self) -> bool {
        self.forward.is_some()
    }

    /// Record that `item` depends on `target`. Self edges and repeated edges
    /// are rejected.
    pub fn add_dependency(&mut self, item: NodeId, target: NodeId) -> bool {
        if item == target {
            trace!("[DEPS] rejected self edge on {}", item);
            return false;
        }
        let items = self.anti.entry(target).or_default();
        if items.contains(&item) {
            return false;
        }
        items.push(item);
        if let Some(forward) = &mut self.forward {
            forward.entry(item).or_default().push(target);
        }
        trace!("[DEPS] add {} -> {}", item, target);
        true
    }

    /// Remove one edge. Removing the last edge of a target removes the key.
    pub fn remove_dependency(&mut self, item: NodeId, target: NodeId) -> bool {
        let Some(items) = self.anti.get_mut(&target) else {
            return false;
        };
        let before = items.len();
        items.retain(|&i| i != item);
        let removed = items.len() != before;
        if items.is_empty() {
            self.anti.remove(&target);
        }
        if let Some(forward) = &mut self.forward {
            if let Some(targets) = forward.get_mut(&item) {
                targets.retain(|&t| t != target);
                if targets.is_empty() {
                    forward.remove(&item);
                }
            }
        }
        if removed {
            trace!("[DEPS] remove {} -> {}", item, target);
        }
        removed
    }

    /// Items directly depending on `target`.
    pub fn anti_dependencies(&self, target: NodeId) -> &[NodeId] {
        self.anti.get(&target).map(Vec::as_slice).unwrap_or_default()
    }

    /// Targets `item` depends on. Empty unless forward tracking is enabled.
    pub fn dependencies(&self, item: NodeId) -> &[NodeId] {
        self.forward
            .as_ref()
            .and_then(|forward| forward.get(&item))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Everything that transitively depends on `target`, breadth first.
    pub fn anti_dependencies_closure(&self, target: NodeId) -> Vec<NodeId> {
        self.anti_dependencies_closure_by(target, |item| Some(item))
    }

    /// Breadth-first closure where each visited item is mapped by `key_of` to
    /// the node whose anti-dependencies are explored next (e.g. a binding to
    /// the element owning it). Each node is visited once; `target` itself is
    /// never part of the result.
    pub fn anti_dependencies_closure_by(
        &self,
        target: NodeId,
        key_of: impl Fn(NodeId) -> Option<NodeId>,
    ) -> Vec<NodeId> {
        let mut queue: IndexSet<NodeId> = IndexSet::new();
        let mut expanded: IndexSet<NodeId> = IndexSet::new();
        expanded.insert(target);
        let mut head = 0;
        let mut frontier = vec![target];

        loop {
            for key in frontier.drain(..) {
                for &item in self.anti_dependencies(key) {
                    if item != target {
                        queue.insert(item);
                    }
                }
            }
            let Some(&item) = queue.get_index(head) else {
                break;
            };
            head += 1;
            if let Some(key) = key_of(item) {
                if expanded.insert(key) {
                    frontier.push(key);
                }
            }
        }
        queue.into_iter().collect()
    }

    /// All edges as (item, target).
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.anti
            .iter()
            .flat_map(|(&target, items)| items.iter().map(move |&item| (item, target)))
    }

    pub fn contains(&self, item: NodeId, target: NodeId) -> bool {
        self.anti_dependencies(target).contains(&item)
    }

    /// Number of targets with at least one anti-dependency.
    pub fn len(&self) -> usize {
        self.anti.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anti.is_empty()
    }

    pub fn clear(&mut self) {
        self.anti.clear();
        if let Some(forward) = &mut self.forward {
            forward.clear();
        }
    }
}
