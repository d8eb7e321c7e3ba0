//! Consistency checks between the node tree, the markup and the sets.

use rustc_hash::{FxHashMap, FxHashSet};

use super::Engine;
use crate::base::{NodeId, XNodeId};
use crate::model::Hosting;
use crate::semantic::{Binding, BindingStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Alive but not reachable from any artifact node.
    Unreachable(NodeId),
    /// The markup node does not point back at the node it hosts.
    AnnotationMismatch { node: NodeId, host: XNodeId },
    /// Several nodes hosted by one markup node.
    SharedHost { host: XNodeId, nodes: Vec<NodeId> },
    /// An edge whose item or target is gone.
    DanglingEdge { item: NodeId, target: NodeId },
    /// A known or duplicate binding without its edge.
    MissingEdge { binding: NodeId, target: NodeId },
    /// A resolved binding whose status no longer matches the symbol table.
    StaleBinding {
        binding: NodeId,
        recorded: BindingStatus,
        current: BindingStatus,
    },
}

impl Engine {
    /// Every violated invariant, in no particular order. Empty when the
    /// model is consistent.
    pub fn verify_integrity(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();
        let reachable = self.reachable_nodes();

        let mut hosts: FxHashMap<XNodeId, Vec<NodeId>> = FxHashMap::default();
        for node in self.nodes.iter() {
            if !reachable.contains(&node.id) {
                violations.push(IntegrityViolation::Unreachable(node.id));
                continue;
            }
            if let Hosting::Hosted(x) = node.hosting {
                if self.provider.annotation(x) != Some(node.id) {
                    violations.push(IntegrityViolation::AnnotationMismatch {
                        node: node.id,
                        host: x,
                    });
                }
                hosts.entry(x).or_default().push(node.id);
            }
        }
        for (host, nodes) in hosts {
            if nodes.len() > 1 {
                violations.push(IntegrityViolation::SharedHost { host, nodes });
            }
        }

        for set in self.sets.values() {
            for (item, target) in set.dependencies.edges() {
                if !self.nodes.contains(item) || !self.nodes.contains(target) {
                    violations.push(IntegrityViolation::DanglingEdge { item, target });
                }
            }
        }
        for node in self.nodes.iter() {
            let Some(slot) = node.kind.as_binding() else {
                continue;
            };
            let (true, Some(target)) = (slot.binding.owns_edge(), slot.binding.target()) else {
                continue;
            };
            let present = self
                .owning_set(node.id)
                .and_then(|set| self.sets.get(&set))
                .is_some_and(|set| set.dependencies.contains(node.id, target));
            if !present {
                violations.push(IntegrityViolation::MissingEdge {
                    binding: node.id,
                    target,
                });
            }
        }
        violations.extend(self.stale_bindings());
        violations
    }

    /// Resolved bindings that would bind differently against the current
    /// symbol table.
    fn stale_bindings(&self) -> Vec<IntegrityViolation> {
        let mut stale = Vec::new();
        for node in self.nodes.iter() {
            if !node.state.is_resolved() {
                continue;
            }
            let Some(slot) = node.kind.as_binding() else {
                continue;
            };
            let Some(reference) = &slot.reference else {
                continue;
            };
            let Some(set) = self.owning_set(node.id).and_then(|set| self.sets.get(&set)) else {
                continue;
            };
            let current = Binding::resolve(&set.symbols, reference, |candidate| {
                self.nodes
                    .get(candidate)
                    .and_then(|candidate| candidate.kind.tag())
                    .is_some_and(|tag| tag == slot.target.as_str())
            });
            if current != slot.binding {
                stale.push(IntegrityViolation::StaleBinding {
                    binding: node.id,
                    recorded: slot.binding.status(),
                    current: current.status(),
                });
            }
        }
        stale
    }

    fn reachable_nodes(&self) -> FxHashSet<NodeId> {
        self.artifacts
            .values()
            .flat_map(|artifact| self.nodes.preorder(artifact.root))
            .collect()
    }

    /// Nodes created but neither disposed nor reachable.
    #[cfg(debug_assertions)]
    pub fn leaked_nodes(&self) -> Vec<NodeId> {
        self.nodes.leak_tracker().leaked(&self.reachable_nodes())
    }
}
