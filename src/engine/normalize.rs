//! Normalize: compute element symbols and reference symbols.
//!
//! Both global passes share [`run_fixed_point`]: walk the node list
//! repeatedly, counting nodes that could not make progress, until nothing is
//! missed, the budget is spent, or a pass misses as many nodes as the one
//! before it.

use std::sync::Arc;

use tracing::{debug, trace};

use super::Engine;
use crate::base::{ArtifactSetId, NodeId};
use crate::error::EngineError;
use crate::model::{NodeKind, NodeState};
use crate::schema::{NameRule, RefScope};
use crate::semantic::Symbol;

/// Outcome of one fixed-point run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub passes: usize,
    /// Nodes missed by the last pass.
    pub missed: usize,
    pub converged: bool,
}

pub(crate) fn run_fixed_point(
    label: &str,
    max_passes: usize,
    mut pass: impl FnMut() -> Result<usize, EngineError>,
) -> Result<PassReport, EngineError> {
    let mut previous: Option<usize> = None;
    let mut passes = 0;
    loop {
        passes += 1;
        let missed = pass()?;
        debug!("[{}] pass {} missed {}", label, passes, missed);
        if missed == 0 {
            return Ok(PassReport {
                passes,
                missed,
                converged: true,
            });
        }
        let stalled = previous.is_some_and(|before| missed >= before);
        if stalled || passes >= max_passes.max(1) {
            return Ok(PassReport {
                passes,
                missed,
                converged: false,
            });
        }
        previous = Some(missed);
    }
}

/// Where a scoped name or reference is anchored.
enum Scope {
    /// A named ancestor is not normalized yet.
    Pending,
    Found(Symbol),
    /// No named ancestor.
    Unscoped,
}

impl Engine {
    /// Normalize every node of `set`, parents first.
    pub(crate) fn normalize_set(&mut self, set: ArtifactSetId) -> Result<PassReport, EngineError> {
        let order = self.set_preorder(set);
        self.normalize_nodes(&order)
    }

    /// Fixed point over `order`; failing to converge is fatal.
    pub(crate) fn normalize_nodes(&mut self, order: &[NodeId]) -> Result<PassReport, EngineError> {
        let max = self.options.max_normalize_passes;
        let report = run_fixed_point("NORMALIZE", max, || {
            let mut missed = 0;
            for &id in order {
                if self.nodes.contains(id) && !self.normalize_node(id)? {
                    missed += 1;
                }
            }
            Ok(missed)
        })?;
        if !report.converged {
            return Err(EngineError::NormalizeDidNotConverge {
                passes: report.passes,
                missed: report.missed,
            });
        }
        Ok(report)
    }

    /// Whether `id` is normalized after this attempt.
    fn normalize_node(&mut self, id: NodeId) -> Result<bool, EngineError> {
        let node = self.node_ref(id)?;
        if node.state.is_normalized() {
            return Ok(true);
        }
        if !node.state.is_parsed() {
            return Ok(false);
        }
        let done = if matches!(node.kind, NodeKind::Element(_)) {
            self.normalize_element(id)?
        } else if matches!(node.kind, NodeKind::ItemBinding(_)) {
            self.normalize_binding(id)?
        } else {
            true
        };
        let node = self.node_mut(id)?;
        node.advance(NodeState::NormalizeAttempted);
        if done {
            node.advance(NodeState::Normalized);
        }
        Ok(done)
    }

    /// File the element's symbol. An element that no longer has a name
    /// loses the symbol it had.
    fn normalize_element(&mut self, id: NodeId) -> Result<bool, EngineError> {
        let schema = Arc::clone(&self.schema);
        let Some(spec) = self.node_ref(id)?.kind.tag().and_then(|tag| schema.spec(tag)) else {
            self.forget_symbol(id);
            return Ok(true);
        };
        let Some(attribute) = spec.name.attribute() else {
            self.forget_symbol(id);
            return Ok(true);
        };
        let name = self.slot_text(id, attribute);
        if name.is_empty() {
            self.forget_symbol(id);
            return Ok(true);
        }
        let symbol = match spec.name {
            NameRule::Root(_) => Symbol::from_dotted(&name),
            _ => match self.enclosing_scope(id) {
                Scope::Pending => return Ok(false),
                Scope::Found(scope) => scope.child(name.as_str()),
                Scope::Unscoped => Symbol::new([name.as_str()]),
            },
        };
        let artifact = self
            .owning_artifact(id)
            .ok_or(EngineError::UnknownNode(id))?;
        let set = self.require_artifact(artifact)?.set;
        if let Some(set) = self.sets.get_mut(&set) {
            trace!("[NORMALIZE] {} defines '{}'", id, symbol);
            set.add_symbol(artifact, id, symbol);
        }
        Ok(true)
    }

    fn forget_symbol(&mut self, id: NodeId) {
        let Some(set_id) = self.owning_set(id) else {
            return;
        };
        if let Some(set) = self.sets.get_mut(&set_id) {
            if let Some(removal) = set.remove_symbol(id) {
                trace!("[NORMALIZE] {} no longer defines '{}'", id, removal.symbol);
            }
        }
    }

    fn normalize_binding(&mut self, id: NodeId) -> Result<bool, EngineError> {
        let slot = self
            .node_ref(id)?
            .kind
            .as_binding()
            .ok_or_else(|| EngineError::wrong_kind(id, "item binding"))?;
        let scope = slot.scope;
        let raw = slot
            .text
            .as_deref()
            .map(Symbol::from_dotted)
            .filter(Symbol::is_well_formed);

        let reference = match raw {
            None => None,
            Some(raw) => match scope {
                RefScope::Global => Some(raw),
                RefScope::Namespace => match self.root_scope(id) {
                    None => return Ok(false),
                    Some(None) => Some(raw),
                    Some(Some((scope, alias))) => Some(qualify(raw, &scope, &alias)),
                },
                RefScope::Parent => {
                    let owner = self.node_ref(id)?.parent.ok_or(EngineError::UnknownNode(id))?;
                    match self.enclosing_scope(owner) {
                        Scope::Pending => return Ok(false),
                        Scope::Found(scope) => Some(scope.join(&raw)),
                        Scope::Unscoped => Some(raw),
                    }
                }
            },
        };

        trace!("[NORMALIZE] {} reference {:?}", id, reference);
        if let Some(slot) = self.node_mut(id)?.kind.as_binding_mut() {
            slot.reference = reference;
        }
        Ok(true)
    }

    /// Symbol of the nearest named ancestor of `id` (exclusive).
    fn enclosing_scope(&self, id: NodeId) -> Scope {
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(ancestor) = current {
            let Some(node) = self.nodes.get(ancestor) else {
                break;
            };
            let named = self
                .element_spec(ancestor)
                .is_some_and(|spec| spec.name != NameRule::Unnamed);
            if named {
                if !node.state.is_normalized() {
                    return Scope::Pending;
                }
                if let Some(symbol) = self.symbol_of(ancestor) {
                    return Scope::Found(symbol.clone());
                }
            }
            current = node.parent;
        }
        Scope::Unscoped
    }

    /// Symbol and alias of the enclosing root scope. `None` while it is not
    /// normalized yet, `Some(None)` when there is none.
    fn root_scope(&self, id: NodeId) -> Option<Option<(Symbol, String)>> {
        let mut current = self.nodes.get(id).and_then(|node| node.parent);
        while let Some(ancestor) = current {
            let Some(node) = self.nodes.get(ancestor) else {
                break;
            };
            let is_root = self
                .element_spec(ancestor)
                .is_some_and(|spec| matches!(spec.name, NameRule::Root(_)));
            if is_root {
                if !node.state.is_normalized() {
                    return None;
                }
                let alias = self
                    .schema
                    .alias_attribute()
                    .map(|attribute| self.slot_text(ancestor, attribute))
                    .unwrap_or_default();
                return Some(self.symbol_of(ancestor).map(|symbol| (symbol.clone(), alias)));
            }
            current = node.parent;
        }
        Some(None)
    }

    /// Text of the value slot for `attribute` under `element`, empty when
    /// there is none.
    pub(crate) fn slot_text(&self, element: NodeId, attribute: &str) -> String {
        self.nodes
            .get(element)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|&child| self.nodes.get(child)?.kind.as_value())
            .find(|value| value.attribute == attribute)
            .map(|value| value.value.to_string())
            .unwrap_or_default()
    }

    /// Every node of `set`, parents before children.
    pub(crate) fn set_preorder(&self, set: ArtifactSetId) -> Vec<NodeId> {
        self.set_roots(set)
            .into_iter()
            .flat_map(|root| self.nodes.preorder(root))
            .collect()
    }

    /// Every node of `set`, children before parents.
    pub(crate) fn set_postorder(&self, set: ArtifactSetId) -> Vec<NodeId> {
        self.set_roots(set)
            .into_iter()
            .flat_map(|root| self.nodes.postorder(root))
            .collect()
    }

    fn set_roots(&self, set: ArtifactSetId) -> Vec<NodeId> {
        self.sets
            .get(&set)
            .map(|set| {
                set.artifacts
                    .iter()
                    .filter_map(|artifact| self.artifacts.get(artifact))
                    .map(|artifact| artifact.root)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Qualify `raw` by the root scope: text starting with the scope is kept,
/// text starting with the alias gets the scope substituted, anything else is
/// appended to the scope.
fn qualify(raw: Symbol, scope: &Symbol, alias: &str) -> Symbol {
    if raw.len() > scope.len() && raw.starts_with(scope) {
        raw
    } else if !alias.is_empty() && raw.len() > 1 && raw.first() == Some(alias) {
        raw.with_first_replaced(scope)
    } else {
        scope.join(&raw)
    }
}
