//! Read-only queries plus the per-node rebind operations.

use smol_str::SmolStr;
use text_size::TextSize;

use super::Engine;
use super::settle::Settle;
use crate::base::{ArtifactId, ArtifactSetId, NodeId};
use crate::error::EngineError;
use crate::model::{Node, NodeKind, NodeState, Value};
use crate::semantic::{BindingStatus, Diagnostic, ErrorClass, Symbol, candidates};

/// Everything known about one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub status: BindingStatus,
    pub target: Option<NodeId>,
    /// Raw attribute text.
    pub text: Option<SmolStr>,
    /// Normalized reference.
    pub reference: Option<Symbol>,
    /// Every element of the expected kind owning the reference symbol,
    /// canonical first.
    pub candidates: Vec<NodeId>,
}

impl Engine {
    pub fn artifact_by_uri(&self, uri: &str) -> Option<ArtifactId> {
        self.artifacts
            .values()
            .find(|artifact| artifact.uri.as_str() == uri)
            .map(|artifact| artifact.id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn artifact_of(&self, id: NodeId) -> Option<ArtifactId> {
        self.owning_artifact(id)
    }

    pub fn set_of(&self, id: NodeId) -> Option<ArtifactSetId> {
        self.owning_set(id)
    }

    /// The element hosted by the document's root element.
    pub fn root_element(&self, artifact: ArtifactId) -> Option<NodeId> {
        let root = self.artifacts.get(&artifact)?.root;
        self.children(root)
            .iter()
            .copied()
            .find(|&child| self.nodes.get(child).is_some_and(|n| n.kind.is_element()))
    }

    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.nodes.get(id).map(|node| node.state)
    }

    pub fn symbol_of(&self, id: NodeId) -> Option<&Symbol> {
        let set = self.owning_set(id)?;
        self.sets.get(&set)?.symbols.symbol_of(id)
    }

    /// Owners of `symbol` in `set`, canonical first.
    pub fn lookup(&self, set: ArtifactSetId, symbol: &Symbol) -> &[NodeId] {
        self.sets
            .get(&set)
            .map(|set| set.symbols.lookup(symbol))
            .unwrap_or_default()
    }

    /// Canonical owner of dotted `name` in `set`.
    pub fn find_symbol(&self, set: ArtifactSetId, name: &str) -> Option<NodeId> {
        self.lookup(set, &Symbol::from_dotted(name)).first().copied()
    }

    /// Value or binding slot of `element` for `attribute`.
    pub fn slot(&self, element: NodeId, attribute: &str) -> Option<NodeId> {
        self.slot_for_attribute(element, attribute)
    }

    /// Current typed value of `element`'s `attribute` (the default when the
    /// attribute is absent).
    pub fn value(&self, element: NodeId, attribute: &str) -> Option<&Value> {
        let slot = self.slot(element, attribute)?;
        self.nodes
            .get(slot)?
            .kind
            .as_value()
            .map(|value| &value.value)
    }

    pub fn binding(&self, id: NodeId) -> Option<BindingInfo> {
        let slot = self.nodes.get(id)?.kind.as_binding()?;
        let candidates = match (&slot.reference, self.owning_set(id).and_then(|s| self.sets.get(&s))) {
            (Some(reference), Some(set)) => candidates(&set.symbols, reference, |candidate| {
                self.nodes
                    .get(candidate)
                    .and_then(|node| node.kind.tag())
                    .is_some_and(|tag| tag == slot.target.as_str())
            }),
            _ => Vec::new(),
        };
        Some(BindingInfo {
            status: slot.binding.status(),
            target: slot.binding.target(),
            text: slot.text.clone(),
            reference: slot.reference.clone(),
            candidates,
        })
    }

    /// Bind `id` again from scratch, along with anything that depends on it.
    pub fn rebind(&mut self, id: NodeId) -> Result<BindingStatus, EngineError> {
        if self.node_ref(id)?.kind.as_binding().is_none() {
            return Err(EngineError::wrong_kind(id, "item binding"));
        }
        let set = self.owning_set(id).ok_or(EngineError::UnknownNode(id))?;
        self.settle(set, Settle::rebind(id))?;
        Ok(self
            .binding(id)
            .map(|info| info.status)
            .unwrap_or_default())
    }

    /// Drop the binding of `id`: its edge is removed, its status is `None`
    /// and it waits for the next resolve.
    pub fn unbind(&mut self, id: NodeId) -> Result<(), EngineError> {
        let node = self.node_ref(id)?;
        if node.kind.as_binding().is_none() {
            return Err(EngineError::wrong_kind(id, "item binding"));
        }
        let owner = node.parent;
        self.unbind_slot(id);
        self.node_mut(id)?.rewind(NodeState::Normalized);
        if let Some(owner) = owner {
            self.refresh_element_state(owner);
        }
        Ok(())
    }

    /// Recompute the symbols and bindings of `id`'s subtree (an element) or
    /// of `id` itself (a binding), rebinding dependents.
    pub fn refresh(&mut self, id: NodeId) -> Result<(), EngineError> {
        let set = self.owning_set(id).ok_or(EngineError::UnknownNode(id))?;
        let work = match self.node_ref(id)?.kind {
            NodeKind::Element(_) => Settle::container(id),
            NodeKind::ItemBinding(_) => Settle::rebind(id),
            _ => return Err(EngineError::wrong_kind(id, "element or item binding")),
        };
        self.settle(set, work)
    }

    /// Diagnostics of `artifact` in the classes of `mask`.
    pub fn diagnostics(&self, artifact: ArtifactId, mask: ErrorClass) -> Vec<&Diagnostic> {
        self.artifacts
            .get(&artifact)
            .and_then(|a| self.sets.get(&a.set))
            .map(|set| set.diagnostics_for(artifact, mask))
            .unwrap_or_default()
    }

    pub fn all_diagnostics(&self, set: ArtifactSetId, mask: ErrorClass) -> Vec<&Diagnostic> {
        self.sets
            .get(&set)
            .map(|set| set.diagnostics.all(mask))
            .unwrap_or_default()
    }

    pub fn node_diagnostics(&self, id: NodeId, mask: ErrorClass) -> Vec<&Diagnostic> {
        self.owning_set(id)
            .and_then(|set| self.sets.get(&set))
            .map(|set| set.diagnostics.for_node(id, mask))
            .unwrap_or_default()
    }

    /// Bindings whose edge points at `target`.
    pub fn anti_dependencies(&self, target: NodeId) -> Vec<NodeId> {
        self.owning_set(target)
            .and_then(|set| self.sets.get(&set))
            .map(|set| set.dependencies.anti_dependencies(target).to_vec())
            .unwrap_or_default()
    }

    /// Bindings depending on `target` directly or through the elements
    /// owning other dependent bindings.
    pub fn anti_dependencies_closure(&self, target: NodeId) -> Vec<NodeId> {
        let Some(set) = self.owning_set(target).and_then(|set| self.sets.get(&set)) else {
            return Vec::new();
        };
        set.dependencies
            .anti_dependencies_closure_by(target, |binding| self.parent(binding))
    }

    /// Bindings of `artifact` that are `Unknown` or `Undefined`.
    pub fn unresolved_bindings(&self, artifact: ArtifactId) -> Vec<NodeId> {
        let Some(artifact) = self.artifacts.get(&artifact) else {
            return Vec::new();
        };
        self.nodes
            .preorder(artifact.root)
            .into_iter()
            .filter(|&id| {
                self.nodes
                    .get(id)
                    .and_then(|node| node.kind.as_binding())
                    .is_some_and(|slot| {
                        matches!(
                            slot.binding.status(),
                            BindingStatus::Unknown | BindingStatus::Undefined
                        )
                    })
            })
            .collect()
    }

    /// Stable textual identity: the artifact uri, then `Tag[i]` per element
    /// (index among same-tag siblings) and `@attribute` for slots.
    pub fn identity(&self, id: NodeId) -> Option<String> {
        let node = self.nodes.get(id)?;
        match &node.kind {
            NodeKind::Artifact(artifact) => {
                Some(self.artifacts.get(artifact)?.uri.to_string())
            }
            NodeKind::Element(data) => {
                let parent = node.parent?;
                let index = self
                    .children(parent)
                    .iter()
                    .filter_map(|&sibling| self.nodes.get(sibling))
                    .filter(|sibling| sibling.kind.tag() == Some(data.tag.as_str()))
                    .position(|sibling| sibling.id == id)?;
                Some(format!("{}/{}[{}]", self.identity(parent)?, data.tag, index))
            }
            NodeKind::ItemBinding(_) | NodeKind::DefaultableValue(_) => {
                let attribute = node.kind.attribute()?;
                Some(format!("{}/@{}", self.identity(node.parent?)?, attribute))
            }
        }
    }

    /// Innermost domain node whose markup encloses `offset` in the
    /// serialized document, or the artifact node.
    pub fn find_node_at_offset(
        &self,
        artifact: ArtifactId,
        offset: TextSize,
    ) -> Result<NodeId, EngineError> {
        let artifact = self.require_artifact(artifact)?;
        let mut current = self
            .provider
            .find_element_at_offset(&artifact.uri, offset)?;
        while let Some(x) = current {
            if let Some(node) = self.live_annotation(x) {
                return Ok(node);
            }
            current = self.provider.parent(x);
        }
        Ok(artifact.root)
    }

    pub fn designer_safe(&self, artifact: ArtifactId) -> bool {
        self.artifacts
            .get(&artifact)
            .is_some_and(|artifact| artifact.designer_safe)
    }

    /// Serialized markup of `artifact`'s document.
    pub fn to_xml_string(&self, artifact: ArtifactId) -> Result<String, EngineError> {
        let uri = &self.require_artifact(artifact)?.uri;
        Ok(self.provider.to_xml_string(uri)?)
    }
}
