//! Change groups: what a transaction did to the object model.

use smol_str::SmolStr;

use crate::base::{ArtifactId, NodeId, TransactionId};

/// Where a change group came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ChangeOrigin {
    /// An engine transaction.
    Engine,
    /// A host transaction without engine user state.
    External,
    /// Undo or redo.
    UndoRedo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ModelChangeKind {
    Create,
    Delete,
    Update,
}

/// One object-model change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelChange {
    pub kind: ModelChangeKind,
    pub node: NodeId,
    /// Identity of the node when the change was recorded.
    pub identity: String,
    /// Attribute affected by an update.
    pub property: Option<SmolStr>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl ModelChange {
    pub fn create(node: NodeId, identity: String) -> Self {
        Self {
            kind: ModelChangeKind::Create,
            node,
            identity,
            property: None,
            old_value: None,
            new_value: None,
        }
    }

    pub fn delete(node: NodeId, identity: String) -> Self {
        Self {
            kind: ModelChangeKind::Delete,
            ..Self::create(node, identity)
        }
    }

    pub fn update(
        node: NodeId,
        identity: String,
        property: SmolStr,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            kind: ModelChangeKind::Update,
            node,
            identity,
            property: Some(property),
            old_value,
            new_value,
        }
    }
}

/// The model changes of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ChangeGroup {
    /// Set for engine transactions.
    pub transaction: Option<TransactionId>,
    pub name: String,
    pub artifact: ArtifactId,
    pub origin: ChangeOrigin,
    pub changes: Vec<ModelChange>,
}

impl ChangeGroup {
    pub fn count(&self, kind: ModelChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
