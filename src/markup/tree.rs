//! Arena-backed markup tree.

use smol_str::SmolStr;

use crate::base::constants::{XMLNS, XMLNS_PREFIX};
use crate::base::{NodeId, XNodeId};
use crate::error::MarkupError;

/// Kind of a markup node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XNodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
}

impl XNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            XNodeKind::Document => "document",
            XNodeKind::Element => "element",
            XNodeKind::Attribute => "attribute",
            XNodeKind::Text => "text",
            XNodeKind::Comment => "comment",
        }
    }
}

/// A node of the markup tree.
///
/// Documents carry their location in `name` and the XML declaration (if any)
/// in `value`. Detached nodes stay in the arena with `parent == None` and keep
/// their annotation, so a later undo can re-attach the very same node.
#[derive(Debug, Clone)]
pub struct XNode {
    pub(crate) kind: XNodeKind,
    pub(crate) name: SmolStr,
    pub(crate) value: String,
    pub(crate) parent: Option<XNodeId>,
    pub(crate) children: Vec<XNodeId>,
    pub(crate) attributes: Vec<XNodeId>,
    pub(crate) annotation: Option<NodeId>,
}

impl XNode {
    pub fn kind(&self) -> XNodeKind {
        self.kind
    }

    /// Qualified name (`prefix:local`) of an element or attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        prefix_of(&self.name)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn parent(&self) -> Option<XNodeId> {
        self.parent
    }

    /// Content children: elements, text and comments, in document order.
    pub fn children(&self) -> &[XNodeId] {
        &self.children
    }

    pub fn attributes(&self) -> &[XNodeId] {
        &self.attributes
    }

    /// Domain node hosted by this markup node, if any.
    pub fn annotation(&self) -> Option<NodeId> {
        self.annotation
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == XNodeKind::Text && self.value.chars().all(char::is_whitespace)
    }
}

/// Local part of a qualified name.
pub fn local_name(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

/// Prefix part of a qualified name.
pub fn prefix_of(name: &str) -> Option<&str> {
    name.split_once(':').map(|(prefix, _)| prefix)
}

/// Arena holding the nodes of every open document.
#[derive(Debug, Default)]
pub struct XTree {
    nodes: Vec<XNode>,
}

impl XTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(
        &mut self,
        kind: XNodeKind,
        name: impl Into<SmolStr>,
        value: impl Into<String>,
    ) -> XNodeId {
        let id = XNodeId::new(self.nodes.len());
        self.nodes.push(XNode {
            kind,
            name: name.into(),
            value: value.into(),
            parent: None,
            children: Vec::new(),
            attributes: Vec::new(),
            annotation: None,
        });
        id
    }

    pub fn get(&self, id: XNodeId) -> Option<&XNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: XNodeId) -> Option<&mut XNode> {
        self.nodes.get_mut(id.index())
    }

    /// Like [`get`](Self::get), but an unknown handle is an error.
    pub fn node(&self, id: XNodeId) -> Result<&XNode, MarkupError> {
        self.get(id).ok_or(MarkupError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: XNodeId) -> Result<&mut XNode, MarkupError> {
        self.get_mut(id).ok_or(MarkupError::UnknownNode(id))
    }

    /// Attach a detached node under `parent` at `index`.
    ///
    /// Attributes go to the attribute list, everything else to the content
    /// list. An index past the end appends.
    pub(crate) fn attach(
        &mut self,
        node: XNodeId,
        parent: XNodeId,
        index: usize,
    ) -> Result<(), MarkupError> {
        let kind = self.node(node)?.kind;
        if self.node(node)?.parent.is_some() {
            return Err(MarkupError::invalid(kind.as_str(), "node is already attached"));
        }
        let parent_node = self.node_mut(parent)?;
        let list = if kind == XNodeKind::Attribute {
            &mut parent_node.attributes
        } else {
            &mut parent_node.children
        };
        let index = index.min(list.len());
        list.insert(index, node);
        self.node_mut(node)?.parent = Some(parent);
        Ok(())
    }

    /// Detach a node from its parent, returning the parent and the position
    /// it occupied.
    pub(crate) fn detach(&mut self, node: XNodeId) -> Result<(XNodeId, usize), MarkupError> {
        let current = self.node(node)?;
        let kind = current.kind;
        let parent = current
            .parent
            .ok_or_else(|| MarkupError::invalid(kind.as_str(), "node is not attached"))?;
        let parent_node = self.node_mut(parent)?;
        let list = if kind == XNodeKind::Attribute {
            &mut parent_node.attributes
        } else {
            &mut parent_node.children
        };
        let index = list
            .iter()
            .position(|&child| child == node)
            .ok_or(MarkupError::UnknownNode(node))?;
        list.remove(index);
        self.node_mut(node)?.parent = None;
        Ok((parent, index))
    }

    /// Position of `node` within its parent's attribute or content list.
    pub fn index_in_parent(&self, node: XNodeId) -> Option<usize> {
        let current = self.get(node)?;
        let parent = self.get(current.parent?)?;
        let list = if current.kind == XNodeKind::Attribute {
            &parent.attributes
        } else {
            &parent.children
        };
        list.iter().position(|&child| child == node)
    }

    /// Walk up to the owning document. `None` for detached subtrees.
    pub fn document_of(&self, node: XNodeId) -> Option<XNodeId> {
        let mut current = node;
        loop {
            let x = self.get(current)?;
            if x.kind == XNodeKind::Document {
                return Some(current);
            }
            current = x.parent?;
        }
    }

    /// Number of element ancestors.
    pub fn depth(&self, node: XNodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(node).and_then(|x| x.parent);
        while let Some(id) = current {
            match self.get(id) {
                Some(x) if x.kind == XNodeKind::Element => {
                    depth += 1;
                    current = x.parent;
                }
                _ => break,
            }
        }
        depth
    }

    /// Element children of `parent`, in document order.
    pub fn elements(&self, parent: XNodeId) -> impl Iterator<Item = XNodeId> + '_ {
        self.get(parent)
            .map(|x| x.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|&child| {
                self.get(child)
                    .is_some_and(|x| x.kind == XNodeKind::Element)
            })
    }

    /// First element child of a document.
    pub fn root_element(&self, document: XNodeId) -> Option<XNodeId> {
        self.elements(document).next()
    }

    /// Attribute of `element` with the given qualified name.
    pub fn attribute(&self, element: XNodeId, name: &str) -> Option<XNodeId> {
        self.get(element)?
            .attributes
            .iter()
            .copied()
            .find(|&attr| self.get(attr).is_some_and(|x| x.name == name))
    }

    /// Value of an attribute of `element`.
    pub fn attribute_value(&self, element: XNodeId, name: &str) -> Option<&str> {
        self.attribute(element, name)
            .and_then(|attr| self.get(attr))
            .map(|x| x.value.as_str())
    }

    /// Namespace URI bound to `prefix` (the default namespace for `None`),
    /// looked up from `start` towards the document.
    pub fn resolve_prefix(&self, prefix: Option<&str>, start: XNodeId) -> Option<SmolStr> {
        let declaration = match prefix {
            Some(prefix) => format!("{XMLNS_PREFIX}{prefix}"),
            None => XMLNS.to_string(),
        };
        let mut current = Some(start);
        while let Some(id) = current {
            let x = self.get(id)?;
            if x.kind == XNodeKind::Element {
                if let Some(value) = self.attribute_value(id, &declaration) {
                    return Some(SmolStr::new(value));
                }
            }
            current = x.parent;
        }
        None
    }

    /// Namespace of an element or attribute.
    ///
    /// Unprefixed attributes and namespace declarations themselves have no
    /// namespace. Detached nodes only see declarations on themselves.
    pub fn namespace_of(&self, node: XNodeId) -> Option<SmolStr> {
        let x = self.get(node)?;
        match x.kind {
            XNodeKind::Element => self.resolve_prefix(x.prefix(), node),
            XNodeKind::Attribute => {
                let prefix = x.prefix()?;
                if prefix == XMLNS {
                    return None;
                }
                self.resolve_prefix(Some(prefix), x.parent?)
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
