//! Resolve: bind references, children before parents.

use tracing::{debug, trace};

use super::Engine;
use super::normalize::run_fixed_point;
use crate::base::{ArtifactSetId, NodeId};
use crate::error::EngineError;
use crate::model::{NodeKind, NodeState};
use crate::semantic::{Binding, BindingStatus, Diagnostic, ErrorClass, codes};

/// Outcome of a resolve run. Unresolved references are not an error; the
/// run simply stops once a pass makes no progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveReport {
    pub passes: usize,
    /// Nodes still unresolved after the last pass.
    pub unresolved: usize,
    pub converged: bool,
}

impl Engine {
    /// Resolve every node of `set` and refresh reference diagnostics.
    pub(crate) fn resolve_set(&mut self, set: ArtifactSetId) -> Result<ResolveReport, EngineError> {
        let order = self.set_postorder(set);
        let report = self.resolve_nodes(&order)?;
        self.report_bindings(&order);
        debug!(
            "[RESOLVE] {}: {} passes, {} unresolved",
            set, report.passes, report.unresolved
        );
        Ok(report)
    }

    pub(crate) fn resolve_nodes(&mut self, order: &[NodeId]) -> Result<ResolveReport, EngineError> {
        let max = self.options.max_resolve_passes;
        let report = run_fixed_point("RESOLVE", max, || {
            let mut missed = 0;
            for &id in order {
                if self.nodes.contains(id) && !self.resolve_node(id)? {
                    missed += 1;
                }
            }
            Ok(missed)
        })?;
        Ok(ResolveReport {
            passes: report.passes,
            unresolved: report.missed,
            converged: report.converged,
        })
    }

    /// Whether `id` is resolved after this attempt.
    fn resolve_node(&mut self, id: NodeId) -> Result<bool, EngineError> {
        let node = self.node_ref(id)?;
        if node.state.is_resolved() {
            return Ok(true);
        }
        if !node.state.is_normalized() {
            return Ok(false);
        }
        let done = if matches!(node.kind, NodeKind::ItemBinding(_)) {
            self.resolve_binding(id)?
        } else if matches!(node.kind, NodeKind::Element(_)) {
            self.bindings_resolved(id)
        } else {
            true
        };
        let node = self.node_mut(id)?;
        node.advance(NodeState::ResolveAttempted);
        if done {
            node.advance(NodeState::Resolved);
        }
        Ok(done)
    }

    /// Bind one reference. Only `Unknown` counts as unresolved: absent text
    /// stays `None`, malformed text is `Undefined`.
    fn resolve_binding(&mut self, id: NodeId) -> Result<bool, EngineError> {
        let set_id = self.owning_set(id).ok_or(EngineError::UnknownNode(id))?;
        let slot = self
            .nodes
            .get_mut(id)
            .and_then(|node| node.kind.as_binding_mut())
            .ok_or_else(|| EngineError::wrong_kind(id, "item binding"))?;
        let previous = std::mem::take(&mut slot.binding);
        let present = slot.text.is_some();
        let reference = slot.reference.clone();
        let target = slot.target.clone();

        let Some(set) = self.sets.get_mut(&set_id) else {
            return Err(EngineError::unknown_artifact(set_id));
        };
        previous.release(id, &mut set.dependencies);
        let nodes = &self.nodes;
        let binding = match (present, reference) {
            (false, _) => Binding::none(),
            (true, None) => Binding::undefined(),
            (true, Some(reference)) => Binding::bind(
                id,
                &reference,
                &set.symbols,
                &mut set.dependencies,
                |candidate| {
                    nodes
                        .get(candidate)
                        .and_then(|node| node.kind.tag())
                        .is_some_and(|tag| tag == target.as_str())
                },
            ),
        };
        let resolved = binding.status() != BindingStatus::Unknown;
        if let Some(slot) = self.nodes.get_mut(id).and_then(|node| node.kind.as_binding_mut()) {
            slot.binding = binding;
        }
        Ok(resolved)
    }

    /// Whether every direct binding of `element` is resolved.
    pub(crate) fn bindings_resolved(&self, element: NodeId) -> bool {
        self.nodes.get(element).is_some_and(|node| {
            node.children.iter().all(|&child| {
                self.nodes.get(child).is_none_or(|child| {
                    !matches!(child.kind, NodeKind::ItemBinding(_)) || child.state.is_resolved()
                })
            })
        })
    }

    /// Bring an element's state in line with its bindings.
    pub(crate) fn refresh_element_state(&mut self, element: NodeId) {
        let resolved = self.bindings_resolved(element);
        let Some(node) = self.nodes.get_mut(element) else {
            return;
        };
        if !node.kind.is_element() || !node.state.is_normalized() {
            return;
        }
        if resolved {
            node.advance(NodeState::Resolved);
        } else {
            node.rewind(NodeState::Normalized);
            node.advance(NodeState::ResolveAttempted);
        }
    }

    /// Drop the binding of `id` and its edge. No-op for other nodes.
    pub(crate) fn unbind_slot(&mut self, id: NodeId) {
        let Some(set_id) = self.owning_set(id) else {
            return;
        };
        let Some(slot) = self.nodes.get_mut(id).and_then(|node| node.kind.as_binding_mut()) else {
            return;
        };
        let previous = std::mem::take(&mut slot.binding);
        if let Some(set) = self.sets.get_mut(&set_id) {
            previous.release(id, &mut set.dependencies);
            clear_reference_diagnostics(set, id);
        }
        trace!("[RESOLVE] unbind {}", id);
    }

    /// Replace the reference diagnostics of every binding in `nodes`.
    pub(crate) fn report_bindings(&mut self, nodes: &[NodeId]) {
        for &id in nodes {
            self.report_binding(id);
        }
    }

    fn report_binding(&mut self, id: NodeId) {
        let Some(slot) = self.nodes.get(id).and_then(|node| node.kind.as_binding()) else {
            return;
        };
        let text = slot.text.clone().unwrap_or_default();
        let diagnostic = match slot.binding.status() {
            BindingStatus::Unknown => Some(
                Diagnostic::error(
                    id,
                    ErrorClass::RESOLVE_ERROR,
                    format!("'{text}' does not name a known {}", slot.target),
                )
                .with_code(codes::UNRESOLVED_REFERENCE),
            ),
            BindingStatus::Undefined => Some(
                Diagnostic::error(
                    id,
                    ErrorClass::RESOLVE_ERROR,
                    format!("'{text}' is not a valid reference"),
                )
                .with_code(codes::MALFORMED_REFERENCE),
            ),
            BindingStatus::Duplicate => Some(
                Diagnostic::warning(
                    id,
                    ErrorClass::RESOLVE_ERROR,
                    format!("'{text}' is ambiguous"),
                )
                .with_code(codes::AMBIGUOUS_REFERENCE),
            ),
            BindingStatus::None | BindingStatus::Known => None,
        };
        let Some(artifact) = self.owning_artifact(id) else {
            return;
        };
        let Some(set) = self
            .artifacts
            .get(&artifact)
            .and_then(|artifact| self.sets.get_mut(&artifact.set))
        else {
            return;
        };
        clear_reference_diagnostics(set, id);
        if let Some(diagnostic) = diagnostic {
            set.add_diagnostic(artifact, diagnostic);
        }
    }
}

fn clear_reference_diagnostics(set: &mut crate::artifact::ArtifactSet, id: NodeId) {
    set.diagnostics
        .remove_where(id, ErrorClass::RESOLVE_ERROR, |d| {
            d.has_code(codes::UNRESOLVED_REFERENCE)
                || d.has_code(codes::MALFORMED_REFERENCE)
                || d.has_code(codes::AMBIGUOUS_REFERENCE)
        });
}
