//! Parse: build domain nodes from markup, driven by the schema.

use std::sync::Arc;

use smol_str::SmolStr;
use tracing::trace;

use super::Engine;
use crate::base::{ArtifactId, NodeId, XNodeId};
use crate::error::EngineError;
use crate::markup::XNodeKind;
use crate::model::{BindingSlot, ElementData, Hosting, NodeKind, NodeState, ValueSlot};
use crate::schema::{BindingSpec, ValueSpec};
use crate::semantic::{Diagnostic, ErrorClass, codes};

/// What parsing a single markup node produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseOutcome {
    /// A new element (with its subtree).
    Fresh(NodeId),
    /// An existing slot now backed by the given markup.
    Rehosted(NodeId),
    /// Nothing the schema cares about.
    Ignored,
}

impl Engine {
    /// Parse the whole document of `artifact` under its artifact node.
    pub(crate) fn parse_artifact(&mut self, artifact: ArtifactId) -> Result<(), EngineError> {
        let (root, document) = {
            let artifact = self.require_artifact(artifact)?;
            (artifact.root, artifact.document)
        };
        self.node_mut(root)?.advance(NodeState::ParseAttempted);

        match self.provider.root_element(document) {
            Some(element) => {
                let tag = SmolStr::new(self.provider.node(element)?.local_name());
                let namespace = self.provider.namespace_of(element);
                let known = self.schema.is_root(&tag)
                    && self.schema.owns_namespace(namespace.as_deref())
                    && self.schema.spec(&tag).is_some();
                if known {
                    self.build_element(root, None, Hosting::Hosted(element), &tag)?;
                } else {
                    self.report(
                        Diagnostic::error(
                            root,
                            ErrorClass::PARSE_ERROR,
                            format!("'{tag}' is not a known root element"),
                        )
                        .with_code(codes::UNKNOWN_ROOT),
                    );
                }
            }
            None => self.report(
                Diagnostic::error(root, ErrorClass::PARSE_ERROR, "document has no root element")
                    .with_code(codes::UNKNOWN_ROOT),
            ),
        }

        self.node_mut(root)?.advance(NodeState::Parsed);
        Ok(())
    }

    /// Allocate an element under `parent` and parse its subtree.
    pub(crate) fn build_element(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        hosting: Hosting,
        tag: &str,
    ) -> Result<NodeId, EngineError> {
        let kind = NodeKind::Element(ElementData {
            tag: SmolStr::new(tag),
        });
        let id = self
            .nodes
            .alloc_child(parent, index, kind, hosting)
            .ok_or(EngineError::UnknownNode(parent))?;
        if let Hosting::Hosted(x) = hosting {
            self.provider.set_annotation(x, Some(id));
        }
        trace!("[PARSE] {} <{}> under {}", id, tag, parent);
        self.parse_element(id)?;
        Ok(id)
    }

    fn parse_element(&mut self, id: NodeId) -> Result<(), EngineError> {
        self.node_mut(id)?.advance(NodeState::ParseAttempted);
        let schema = Arc::clone(&self.schema);
        let node = self.node_ref(id)?;
        let tag = node
            .kind
            .tag()
            .map(SmolStr::new)
            .ok_or_else(|| EngineError::wrong_kind(id, "element"))?;
        let is_ghost = node.hosting.is_ghost();
        let owner_spec = node
            .parent
            .filter(|_| is_ghost)
            .and_then(|parent| self.nodes.get(parent))
            .and_then(|parent| parent.kind.tag())
            .and_then(|owner| schema.spec(owner));
        let spec = schema
            .spec(&tag)
            .ok_or_else(|| EngineError::invalid_edit(format!("no handler for '{tag}'")))?;
        let host = self
            .host_of(id)
            .ok_or_else(|| EngineError::invalid_edit(format!("{id} has no markup")))?;

        for value in &spec.values {
            self.parse_value_slot(id, host, value)?;
        }
        for binding in &spec.bindings {
            self.parse_binding_slot(id, host, binding)?;
        }

        let mut ghost_spec = None;
        if let Some(rule) = spec.ghost.as_ref().filter(|_| !is_ghost) {
            let triggered = self.provider.attribute(host, &rule.trigger).is_some();
            if triggered && schema.spec(&rule.child).is_some() {
                self.build_element(id, None, Hosting::Ghost, &rule.child)?;
                ghost_spec = schema.spec(&rule.child);
            }
        }

        let elements: Vec<XNodeId> = self.provider.elements(host).collect();
        for x in elements {
            let namespace = self.provider.namespace_of(x);
            if !schema.owns_namespace(namespace.as_deref()) {
                continue;
            }
            let child = SmolStr::new(self.provider.node(x)?.local_name());
            let known = schema.spec(&child).is_some();
            if is_ghost {
                // a ghost claims the children its owner does not accept
                let owner_accepts = owner_spec.is_some_and(|owner| owner.allows_child(&child));
                if known && spec.allows_child(&child) && !owner_accepts {
                    self.build_element(id, None, Hosting::Hosted(x), &child)?;
                }
                continue;
            }
            if known && spec.allows_child(&child) {
                self.build_element(id, None, Hosting::Hosted(x), &child)?;
            } else if known && ghost_spec.is_some_and(|ghost| ghost.allows_child(&child)) {
                continue;
            } else {
                self.report(
                    Diagnostic::warning(
                        id,
                        ErrorClass::PARSE_ERROR,
                        format!("'{child}' is not allowed in '{tag}'"),
                    )
                    .with_code(codes::UNEXPECTED_ELEMENT),
                );
            }
        }

        self.node_mut(id)?.advance(NodeState::Parsed);
        Ok(())
    }

    fn parse_value_slot(
        &mut self,
        owner: NodeId,
        host: XNodeId,
        spec: &ValueSpec,
    ) -> Result<NodeId, EngineError> {
        let attribute = self.provider.attribute(host, &spec.attribute);
        let hosting = attribute.map_or(Hosting::Detached, Hosting::Hosted);
        let kind = NodeKind::DefaultableValue(ValueSlot::new(spec));
        let id = self
            .nodes
            .alloc_child(owner, None, kind, hosting)
            .ok_or(EngineError::UnknownNode(owner))?;
        if let Some(x) = attribute {
            self.provider.set_annotation(x, Some(id));
            self.load_value(id, x)?;
        }
        let node = self.node_mut(id)?;
        node.advance(NodeState::ParseAttempted);
        node.advance(NodeState::Parsed);
        Ok(id)
    }

    fn parse_binding_slot(
        &mut self,
        owner: NodeId,
        host: XNodeId,
        spec: &BindingSpec,
    ) -> Result<NodeId, EngineError> {
        let attribute = self.provider.attribute(host, &spec.attribute);
        let text = match attribute {
            Some(x) => Some(SmolStr::new(self.provider.node(x)?.value())),
            None => None,
        };
        let hosting = attribute.map_or(Hosting::Detached, Hosting::Hosted);
        let kind = NodeKind::ItemBinding(BindingSlot::new(spec, text));
        let id = self
            .nodes
            .alloc_child(owner, None, kind, hosting)
            .ok_or(EngineError::UnknownNode(owner))?;
        if let Some(x) = attribute {
            self.provider.set_annotation(x, Some(id));
        }
        let node = self.node_mut(id)?;
        node.advance(NodeState::ParseAttempted);
        node.advance(NodeState::Parsed);
        Ok(id)
    }

    /// Read the typed value of `slot` from attribute `x`. A conversion
    /// failure is reported and keeps the current value.
    fn load_value(&mut self, slot: NodeId, x: XNodeId) -> Result<(), EngineError> {
        let text = self.provider.node(x)?.value().to_string();
        if let Some(set) = self.owning_set(slot).and_then(|set| self.sets.get_mut(&set)) {
            set.diagnostics
                .remove_where(slot, ErrorClass::PARSE_ERROR, |d| {
                    d.has_code(codes::INVALID_VALUE)
                });
        }
        let value = self
            .node_mut(slot)?
            .kind
            .as_value_mut()
            .ok_or_else(|| EngineError::wrong_kind(slot, "defaultable value"))?;
        value.is_set = true;
        let ty = value.ty;
        match ty.convert(&text) {
            Some(converted) => {
                value.value = converted;
                Ok(())
            }
            None => {
                let attribute = value.attribute.clone();
                self.report(
                    Diagnostic::error(
                        slot,
                        ErrorClass::PARSE_ERROR,
                        format!("'{text}' is not a valid {} for '{attribute}'", ty.as_str()),
                    )
                    .with_code(codes::INVALID_VALUE),
                );
                Ok(())
            }
        }
    }

    // ========================================================================
    // SINGLE NODES (reconciliation and engine edits)
    // ========================================================================

    /// Parse markup node `x` under the domain node `owner` that hosts its
    /// markup parent.
    pub(crate) fn parse_single(
        &mut self,
        owner: NodeId,
        x: XNodeId,
    ) -> Result<ParseOutcome, EngineError> {
        let xnode = self.provider.node(x)?;
        match xnode.kind() {
            XNodeKind::Element => {
                if self.live_annotation(x).is_some() {
                    return Ok(ParseOutcome::Ignored);
                }
                let tag = SmolStr::new(xnode.local_name());
                let namespace = self.provider.namespace_of(x);
                if !self.schema.owns_namespace(namespace.as_deref()) {
                    return Ok(ParseOutcome::Ignored);
                }
                let Some(parent) = self.accepting_parent(owner, &tag) else {
                    self.report(
                        Diagnostic::warning(
                            owner,
                            ErrorClass::PARSE_ERROR,
                            format!("'{tag}' is not allowed here"),
                        )
                        .with_code(codes::UNEXPECTED_ELEMENT),
                    );
                    return Ok(ParseOutcome::Ignored);
                };
                let index = self.insertion_index(parent, x);
                let id = self.build_element(parent, Some(index), Hosting::Hosted(x), &tag)?;
                Ok(ParseOutcome::Fresh(id))
            }
            XNodeKind::Attribute => {
                let name = SmolStr::new(xnode.name());
                if let Some(slot) = self.slot_for_attribute(owner, &name) {
                    self.rehost(slot, x)?;
                    return Ok(ParseOutcome::Rehosted(slot));
                }
                let schema = Arc::clone(&self.schema);
                let rule = self
                    .element_spec(owner)
                    .and_then(|spec| spec.ghost.clone())
                    .filter(|rule| rule.trigger == name);
                match rule {
                    Some(rule)
                        if self.ghost_child(owner).is_none()
                            && schema.spec(&rule.child).is_some() =>
                    {
                        let index = self
                            .node_ref(owner)?
                            .children
                            .iter()
                            .position(|&child| {
                                self.nodes
                                    .get(child)
                                    .is_some_and(|c| c.kind.is_element())
                            });
                        let ghost = self.build_element(owner, index, Hosting::Ghost, &rule.child)?;
                        Ok(ParseOutcome::Fresh(ghost))
                    }
                    _ => Ok(ParseOutcome::Ignored),
                }
            }
            _ => Ok(ParseOutcome::Ignored),
        }
    }

    /// `owner` itself or its ghost, whichever accepts `tag`.
    fn accepting_parent(&self, owner: NodeId, tag: &str) -> Option<NodeId> {
        self.schema.spec(tag)?;
        if self.element_spec(owner)?.allows_child(tag) {
            return Some(owner);
        }
        self.ghost_child(owner)
            .filter(|&ghost| self.element_spec(ghost).is_some_and(|spec| spec.allows_child(tag)))
    }

    /// Slot of `owner` (or of its ghost) for `attribute`.
    pub(crate) fn slot_for_attribute(&self, owner: NodeId, attribute: &str) -> Option<NodeId> {
        let mut holders = vec![owner];
        holders.extend(self.ghost_child(owner));
        holders.into_iter().find_map(|holder| {
            self.nodes.get(holder)?.children.iter().copied().find(|&child| {
                self.nodes
                    .get(child)
                    .and_then(|c| c.kind.attribute())
                    .is_some_and(|a| a == attribute)
            })
        })
    }

    /// Position among `parent`'s children that keeps element order aligned
    /// with the markup. Slots and ghosts always come first.
    fn insertion_index(&self, parent: NodeId, x: XNodeId) -> usize {
        let Some(node) = self.nodes.get(parent) else {
            return 0;
        };
        let Some(host) = self.host_of(parent) else {
            return node.children.len();
        };
        let siblings = self.provider.children(host);
        let position = |h: XNodeId| siblings.iter().position(|&s| s == h);
        let Some(target) = position(x) else {
            return node.children.len();
        };
        let mut index = 0;
        for (i, &child) in node.children.iter().enumerate() {
            let Some(child) = self.nodes.get(child) else {
                continue;
            };
            match (child.kind.is_element(), child.hosting) {
                (true, Hosting::Hosted(h)) => {
                    if position(h).is_some_and(|p| p < target) {
                        index = i + 1;
                    }
                }
                _ => index = index.max(i + 1),
            }
        }
        index
    }

    /// Back `slot` with attribute `x` and re-read its content.
    pub(crate) fn rehost(&mut self, slot: NodeId, x: XNodeId) -> Result<(), EngineError> {
        let previous = self.node_ref(slot)?.hosting;
        if let Hosting::Hosted(old) = previous {
            if old != x && self.provider.annotation(old) == Some(slot) {
                self.provider.set_annotation(old, None);
            }
        }
        self.node_mut(slot)?.hosting = Hosting::Hosted(x);
        self.provider.set_annotation(x, Some(slot));
        trace!("[PARSE] rehost {} onto {}", slot, x);

        if self.node_ref(slot)?.kind.as_value().is_some() {
            self.load_value(slot, x)?;
        } else {
            let text = SmolStr::new(self.provider.node(x)?.value());
            let binding = self
                .node_mut(slot)?
                .kind
                .as_binding_mut()
                .ok_or_else(|| EngineError::wrong_kind(slot, "slot"))?;
            binding.text = Some(text);
            binding.reference = None;
        }
        self.node_mut(slot)?.rewind(NodeState::Parsed);
        Ok(())
    }

    /// Detach `slot` from its markup: values fall back to their default,
    /// bindings lose their text.
    pub(crate) fn unhost(&mut self, slot: NodeId) -> Result<(), EngineError> {
        if let Hosting::Hosted(x) = self.node_ref(slot)?.hosting {
            if self.provider.annotation(x) == Some(slot) {
                self.provider.set_annotation(x, None);
            }
        }
        if let Some(set) = self.owning_set(slot).and_then(|set| self.sets.get_mut(&set)) {
            set.diagnostics.remove_for_node(slot, ErrorClass::PARSE_ERROR);
        }
        let node = self.node_mut(slot)?;
        node.hosting = Hosting::Detached;
        match &mut node.kind {
            NodeKind::DefaultableValue(value) => {
                value.value = value.default.clone();
                value.is_set = false;
            }
            NodeKind::ItemBinding(binding) => {
                binding.text = None;
                binding.reference = None;
            }
            _ => return Err(EngineError::wrong_kind(slot, "slot")),
        }
        node.rewind(NodeState::Parsed);
        trace!("[PARSE] unhost {}", slot);
        Ok(())
    }
}
