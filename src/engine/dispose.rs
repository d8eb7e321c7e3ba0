//! Dispose: tear nodes down, releasing everything they hold.

use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use tracing::trace;

use super::Engine;
use crate::base::NodeId;
use crate::model::Hosting;
use crate::semantic::ErrorClass;

impl Engine {
    /// Dispose `id` and its subtree: symbols, owned edges, diagnostics and
    /// markup annotations are released and the node leaves its parent.
    /// Disposing a node that is already gone is a no-op returning `false`.
    pub(crate) fn dispose(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            trace!("[DISPOSE] {} already disposed", id);
            return false;
        };
        let children = node.children.clone();
        let parent = node.parent;
        let hosting = node.hosting;
        for &child in children.iter().rev() {
            self.dispose(child);
        }

        if let Some(set_id) = self.owning_set(id) {
            if let Some(set) = self.sets.get_mut(&set_id) {
                set.remove_symbol(id);
                let binding = self
                    .nodes
                    .get_mut(id)
                    .and_then(|node| node.kind.as_binding_mut())
                    .map(|slot| std::mem::take(&mut slot.binding));
                if let Some(binding) = binding {
                    binding.release(id, &mut set.dependencies);
                }
                set.remove_diagnostics(id, ErrorClass::ALL);
            }
        }
        if let Hosting::Hosted(x) = hosting {
            if self.provider.annotation(x) == Some(id) {
                self.provider.set_annotation(x, None);
            }
        }
        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(parent)) {
            parent.children.retain(|&child| child != id);
        }
        self.nodes.remove(id);
        trace!("[DISPOSE] {}", id);
        true
    }

    /// Bindings outside the subtree of `root` that depend on a node inside it.
    pub(crate) fn external_dependents(&self, root: NodeId) -> Vec<NodeId> {
        let Some(set) = self.owning_set(root).and_then(|set| self.sets.get(&set)) else {
            return Vec::new();
        };
        let order = self.nodes.preorder(root);
        let inside: FxHashSet<NodeId> = order.iter().copied().collect();
        let mut dependents: IndexSet<NodeId> = IndexSet::new();
        for id in order {
            for &dependent in set.dependencies.anti_dependencies(id) {
                if !inside.contains(&dependent) {
                    dependents.insert(dependent);
                }
            }
        }
        dependents.into_iter().collect()
    }

    /// Drop edges whose target no longer exists, restarting their bindings.
    pub(crate) fn sweep_dangling_edges(&mut self) {
        let mut dangling = Vec::new();
        for set in self.sets.values() {
            for (item, target) in set.dependencies.edges() {
                if !self.nodes.contains(target) || !self.nodes.contains(item) {
                    dangling.push((set.id, item, target));
                }
            }
        }
        for (set_id, item, target) in dangling {
            trace!("[DISPOSE] dangling edge {} -> {}", item, target);
            if self.nodes.contains(item) {
                self.restart_binding(item);
            }
            if let Some(set) = self.sets.get_mut(&set_id) {
                set.dependencies.remove_dependency(item, target);
            }
        }
    }
}
