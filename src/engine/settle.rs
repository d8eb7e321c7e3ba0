//! Local fixed point after an incremental change.
//!
//! Edits and reconciliation only collect work: subtrees whose symbols must be
//! recomputed ("containers"), bindings that must be bound again, and symbols
//! that appeared or disappeared along the way. [`Engine::settle`] then brings
//! the set back to a consistent state without touching unrelated nodes.

use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use tracing::debug;

use super::Engine;
use crate::base::{ArtifactId, ArtifactSetId, NodeId};
use crate::error::EngineError;
use crate::model::{NodeKind, NodeState};
use crate::semantic::Symbol;

#[derive(Debug, Default)]
pub(crate) struct Settle {
    pub(crate) containers: IndexSet<NodeId>,
    pub(crate) rebind: IndexSet<NodeId>,
    pub(crate) touched: FxHashSet<Symbol>,
}

impl Settle {
    pub(crate) fn container(node: NodeId) -> Self {
        let mut work = Self::default();
        work.containers.insert(node);
        work
    }

    pub(crate) fn rebind(node: NodeId) -> Self {
        let mut work = Self::default();
        work.rebind.insert(node);
        work
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.rebind.is_empty() && self.touched.is_empty()
    }
}

impl Engine {
    pub(crate) fn settle(&mut self, set_id: ArtifactSetId, work: Settle) -> Result<(), EngineError> {
        if work.is_empty() {
            return Ok(());
        }
        let Settle {
            containers,
            mut rebind,
            mut touched,
        } = work;

        // 1. tear down container subtrees; symbols stay filed so an owner
        //    that keeps its name keeps its place
        let mut roots = Vec::new();
        let mut subtree: IndexSet<NodeId> = IndexSet::new();
        for &container in &containers {
            if self.nodes.contains(container) && !subtree.contains(&container) {
                roots.push(container);
                subtree.extend(self.nodes.preorder(container));
            }
        }
        for &id in &subtree {
            if let Some(set) = self.sets.get_mut(&set_id) {
                if let Some(symbol) = set.symbols.symbol_of(id) {
                    touched.insert(symbol.clone());
                }
                for &dependent in set.dependencies.anti_dependencies(id) {
                    if !subtree.contains(&dependent) {
                        rebind.insert(dependent);
                    }
                }
            }
            self.unbind_slot(id);
            if let Some(node) = self.nodes.get_mut(id) {
                node.rewind(NodeState::Parsed);
            }
        }

        // 2. queued bindings start over
        rebind.retain(|id| self.nodes.contains(*id) && !subtree.contains(id));
        for &id in &rebind {
            self.unbind_slot(id);
            if let Some(node) = self.nodes.get_mut(id) {
                node.rewind(NodeState::Parsed);
            }
        }

        // 3. normalize
        let mut order: Vec<NodeId> = subtree.iter().copied().collect();
        order.extend(rebind.iter().copied());
        self.normalize_nodes(&order)?;
        for &id in &subtree {
            if let Some(symbol) = self.symbol_of(id) {
                touched.insert(symbol.clone());
            }
        }

        // 4. bindings elsewhere that name a symbol that came or went
        if !touched.is_empty() {
            for id in self.set_preorder(set_id) {
                if subtree.contains(&id) || rebind.contains(&id) {
                    continue;
                }
                let hit = self
                    .nodes
                    .get(id)
                    .and_then(|node| node.kind.as_binding())
                    .and_then(|slot| slot.reference.as_ref())
                    .is_some_and(|reference| touched.contains(reference));
                if hit {
                    self.unbind_slot(id);
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.rewind(NodeState::Normalized);
                    }
                    rebind.insert(id);
                }
            }
        }

        // 5. resolve
        let mut order: Vec<NodeId> = rebind.iter().copied().collect();
        for &root in &roots {
            order.extend(self.nodes.postorder(root));
        }
        let report = self.resolve_nodes(&order)?;

        // 6. owners of rebound bindings
        let owners: IndexSet<NodeId> = rebind
            .iter()
            .filter_map(|&id| self.nodes.get(id)?.parent)
            .filter(|&owner| {
                self.nodes
                    .get(owner)
                    .is_some_and(|node| matches!(node.kind, NodeKind::Element(_)))
            })
            .collect();
        for owner in owners {
            self.refresh_element_state(owner);
        }

        // 7. diagnostics
        self.report_bindings(&order);
        debug!(
            "[SETTLE] {}: {} containers, {} rebound, {} symbols touched, {} unresolved",
            set_id,
            roots.len(),
            rebind.len(),
            touched.len(),
            report.unresolved
        );
        Ok(())
    }

    /// Queue bindings outside `artifacts` that name a symbol defined inside
    /// them, so a newly loaded or reloaded artifact is seen by the rest of
    /// the set (including new duplicates). `retired` adds symbols the
    /// artifacts defined before their trees were thrown away.
    pub(crate) fn invalidate_references(
        &mut self,
        set_id: ArtifactSetId,
        artifacts: &[ArtifactId],
        retired: FxHashSet<Symbol>,
    ) {
        let roots: Vec<NodeId> = artifacts
            .iter()
            .filter_map(|artifact| self.artifacts.get(artifact))
            .map(|artifact| artifact.root)
            .collect();
        let mut inside: FxHashSet<NodeId> = FxHashSet::default();
        let mut symbols = retired;
        for &root in &roots {
            symbols.extend(self.symbols_under(root));
            inside.extend(self.nodes.preorder(root));
        }
        if symbols.is_empty() {
            return;
        }
        for id in self.set_preorder(set_id) {
            if inside.contains(&id) {
                continue;
            }
            let hit = self
                .nodes
                .get(id)
                .filter(|node| node.state.is_resolved())
                .and_then(|node| node.kind.as_binding())
                .and_then(|slot| slot.reference.as_ref())
                .is_some_and(|reference| symbols.contains(reference));
            if hit {
                self.restart_binding(id);
            }
        }
    }

    /// Symbols owned anywhere in `root`'s subtree.
    pub(crate) fn symbols_under(&self, root: NodeId) -> FxHashSet<Symbol> {
        self.nodes
            .preorder(root)
            .into_iter()
            .filter_map(|id| self.symbol_of(id).cloned())
            .collect()
    }

    /// Unbind `id` and rewind it (and its owner) so the next resolve pass
    /// binds it again.
    pub(crate) fn restart_binding(&mut self, id: NodeId) {
        self.unbind_slot(id);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.rewind(NodeState::Normalized);
        let owner = node.parent;
        if let Some(owner) = owner.and_then(|owner| self.nodes.get_mut(owner)) {
            owner.rewind(NodeState::Normalized);
        }
    }
}
