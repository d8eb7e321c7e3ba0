//! Untyped change notifications.

use crate::base::XNodeId;

/// What happened to a markup node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    NameChanged,
    ValueChanged,
}

/// One entry of a transaction's ordered change list.
///
/// `parent` is recorded at the time of the change, so a `Remove` still says
/// where the node used to live after it has been detached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub node: XNodeId,
    pub parent: Option<XNodeId>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, node: XNodeId, parent: Option<XNodeId>) -> Self {
        Self {
            kind,
            node,
            parent,
            old_value: None,
            new_value: None,
        }
    }

    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// The record describing the opposite change (used when undoing).
    pub fn inverse(&self) -> Self {
        let kind = match self.kind {
            ChangeKind::Add => ChangeKind::Remove,
            ChangeKind::Remove => ChangeKind::Add,
            other => other,
        };
        Self {
            kind,
            node: self.node,
            parent: self.parent,
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }
}
