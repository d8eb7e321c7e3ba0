//! Node storage.
//!
//! Slots are never reused, so a [`NodeId`] seen in a stale markup annotation
//! either names a live node or nothing at all.

use super::kind::NodeKind;
#[cfg(debug_assertions)]
use super::leak::LeakTracker;
use super::node::{Hosting, Node};
use crate::base::NodeId;

#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Option<Node>>,
    live: usize,
    #[cfg(debug_assertions)]
    leaks: LeakTracker,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a root node (no parent).
    pub fn alloc_root(&mut self, kind: NodeKind) -> NodeId {
        self.alloc(kind, None, Hosting::Detached)
    }

    /// Allocate a child of `parent`, inserted at `index` among its children
    /// (or last). Returns `None` if `parent` is not alive.
    pub fn alloc_child(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        kind: NodeKind,
        hosting: Hosting,
    ) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let id = self.alloc(kind, Some(parent), hosting);
        let children = &mut self.get_mut(parent)?.children;
        let index = index.unwrap_or(children.len()).min(children.len());
        children.insert(index, id);
        Some(id)
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>, hosting: Hosting) -> NodeId {
        let id = NodeId::new(self.slots.len());
        self.slots.push(Some(Node::new(id, kind, parent, hosting)));
        self.live += 1;
        #[cfg(debug_assertions)]
        self.leaks.record_created(id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Take a node out of the arena. Does not touch its parent's child list.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.slots.get_mut(id.index())?.take()?;
        self.live -= 1;
        #[cfg(debug_assertions)]
        self.leaks.record_disposed(id);
        Some(node)
    }

    /// Live nodes in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// `root` and its descendants, parents before children.
    pub fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    /// `root` and its descendants, children before parents.
    pub fn postorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            if expanded {
                order.push(id);
            } else {
                stack.push((id, true));
                stack.extend(node.children.iter().rev().map(|&child| (child, false)));
            }
        }
        order
    }

    /// Walk up to the root of `id`'s tree.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            match self.get(current)?.parent {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
    }

    #[cfg(debug_assertions)]
    pub fn leak_tracker(&self) -> &LeakTracker {
        &self.leaks
    }
}
