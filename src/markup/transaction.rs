//! Transactions, reversible edit commands and provider notifications.

use smol_str::SmolStr;
use uuid::Uuid;

use super::change::ChangeRecord;
use super::tree::XTree;
use crate::base::XNodeId;
use crate::error::MarkupError;

/// Outcome of a finished transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Committed,
    Aborted,
}

/// A transaction as seen by listeners after it finished.
#[derive(Debug, Clone)]
pub struct CompletedTransaction {
    pub serial: u64,
    pub name: String,
    pub uri: SmolStr,
    pub document: XNodeId,
    /// Set by whoever began the transaction; `None` for external edits.
    pub user_state: Option<Uuid>,
    pub status: TransactionStatus,
    pub changes: Vec<ChangeRecord>,
}

/// Synchronous notification delivered after a transaction finished.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A normal commit (or an abort, see [`TransactionStatus`]).
    TransactionCompleted(CompletedTransaction),
    /// An undo or redo performed by the host; never carries user state.
    UndoRedoCompleted(CompletedTransaction),
}

impl ProviderEvent {
    pub fn transaction(&self) -> &CompletedTransaction {
        match self {
            ProviderEvent::TransactionCompleted(tx) | ProviderEvent::UndoRedoCompleted(tx) => tx,
        }
    }

    pub fn is_undo_redo(&self) -> bool {
        matches!(self, ProviderEvent::UndoRedoCompleted(_))
    }
}

/// A primitive, reversible tree edit.
#[derive(Debug, Clone)]
pub(crate) enum EditCommand {
    Insert {
        node: XNodeId,
        parent: XNodeId,
        index: usize,
    },
    Detach {
        node: XNodeId,
        parent: XNodeId,
        index: usize,
    },
    SetValue {
        node: XNodeId,
        old: String,
        new: String,
    },
    SetName {
        node: XNodeId,
        old: SmolStr,
        new: SmolStr,
    },
}

impl EditCommand {
    pub(crate) fn apply(&self, tree: &mut XTree) -> Result<(), MarkupError> {
        match self {
            EditCommand::Insert {
                node,
                parent,
                index,
            } => tree.attach(*node, *parent, *index),
            EditCommand::Detach { node, .. } => tree.detach(*node).map(|_| ()),
            EditCommand::SetValue { node, new, .. } => {
                tree.node_mut(*node)?.value = new.clone();
                Ok(())
            }
            EditCommand::SetName { node, new, .. } => {
                tree.node_mut(*node)?.name = new.clone();
                Ok(())
            }
        }
    }

    pub(crate) fn revert(&self, tree: &mut XTree) -> Result<(), MarkupError> {
        self.inverse().apply(tree)
    }

    fn inverse(&self) -> EditCommand {
        match self.clone() {
            EditCommand::Insert {
                node,
                parent,
                index,
            } => EditCommand::Detach {
                node,
                parent,
                index,
            },
            EditCommand::Detach {
                node,
                parent,
                index,
            } => EditCommand::Insert {
                node,
                parent,
                index,
            },
            EditCommand::SetValue { node, old, new } => EditCommand::SetValue {
                node,
                old: new,
                new: old,
            },
            EditCommand::SetName { node, old, new } => EditCommand::SetName {
                node,
                old: new,
                new: old,
            },
        }
    }
}

/// The transaction currently collecting edits.
#[derive(Debug)]
pub(crate) struct OpenTransaction {
    pub(crate) serial: u64,
    pub(crate) name: String,
    pub(crate) document: XNodeId,
    pub(crate) user_state: Option<Uuid>,
    pub(crate) commands: Vec<EditCommand>,
    pub(crate) changes: Vec<ChangeRecord>,
}

/// A committed transaction kept for undo/redo.
#[derive(Debug, Clone)]
pub(crate) struct UndoUnit {
    pub(crate) serial: u64,
    pub(crate) name: String,
    pub(crate) commands: Vec<EditCommand>,
    pub(crate) changes: Vec<ChangeRecord>,
}

/// Per-document undo history.
#[derive(Debug, Default)]
pub(crate) struct UndoStack {
    pub(crate) undo: Vec<UndoUnit>,
    pub(crate) redo: Vec<UndoUnit>,
}
