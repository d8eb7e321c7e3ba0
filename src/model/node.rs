//! Domain nodes.

use tracing::trace;

use super::kind::NodeKind;
use super::state::NodeState;
use crate::base::{NodeId, XNodeId};

/// How a node relates to the external markup tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hosting {
    /// Backed by exactly this markup node.
    Hosted(XNodeId),
    /// Shares the parent's markup node (schema shorthand).
    Ghost,
    /// No markup node (absent attribute, or the artifact node).
    Detached,
}

impl Hosting {
    pub fn host(&self) -> Option<XNodeId> {
        match self {
            Hosting::Hosted(x) => Some(*x),
            Hosting::Ghost | Hosting::Detached => None,
        }
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, Hosting::Ghost)
    }
}

/// A node of the domain tree. Parents own their children exclusively.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) state: NodeState,
    pub(crate) hosting: Hosting,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, parent: Option<NodeId>, hosting: Hosting) -> Self {
        Self {
            id,
            kind,
            state: NodeState::None,
            hosting,
            parent,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn hosting(&self) -> Hosting {
        self.hosting
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Move forward to `to`.
    pub(crate) fn advance(&mut self, to: NodeState) {
        debug_assert!(
            to >= self.state,
            "{} cannot advance from {:?} to {:?}",
            self.id,
            self.state,
            to
        );
        self.state = to;
    }

    /// Legal rewind to `Parsed` or `Normalized`. Rewinding to a later state
    /// than the current one is a no-op.
    pub(crate) fn rewind(&mut self, to: NodeState) {
        if self.state.can_rewind_to(to) {
            trace!("[NODE] {} rewind {:?} -> {:?}", self.id, self.state, to);
            self.state = to;
        }
    }

    /// Back to `None`; only used when an artifact is reloaded.
    pub(crate) fn reset(&mut self) {
        self.state = NodeState::None;
    }
}
