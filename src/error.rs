//! Error types.
//!
//! Only provider failures and normalize non-convergence ever reach a caller.
//! Everything data-level (bad values, unresolved or duplicate names) becomes a
//! diagnostic instead, and [`ReconcileError`] is always caught by the engine
//! and converted into a full reload.

use smol_str::SmolStr;
use thiserror::Error;

use crate::base::{ArtifactId, NodeId, XNodeId};

/// Errors raised by the markup provider.
#[derive(Debug, Error)]
pub enum MarkupError {
    /// XML parsing or serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// IO error while reading a document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No document is open under this location.
    #[error("Unknown document: {0}")]
    UnknownDocument(SmolStr),

    /// A document is already open under this location.
    #[error("Document already open: {0}")]
    DocumentAlreadyOpen(SmolStr),

    /// Handle does not name a node of the tree.
    #[error("Unknown markup node: {0}")]
    UnknownNode(XNodeId),

    /// Transaction misuse (nested begin, commit without begin, edit outside).
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The operation does not apply to this kind of node.
    #[error("Invalid operation on {kind} node: {message}")]
    InvalidOperation { kind: &'static str, message: String },
}

impl MarkupError {
    /// Create an XML error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    /// Create an invalid-operation error.
    pub fn invalid(kind: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            kind,
            message: message.into(),
        }
    }
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The provider rejected an operation.
    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error("Unknown artifact: {0}")]
    UnknownArtifact(String),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("No engine transaction is active")]
    NoActiveTransaction,

    #[error("An engine transaction is already active on {0}")]
    TransactionAlreadyActive(ArtifactId),

    /// Node exists but is of the wrong kind for the operation.
    #[error("Node {node} is not {expected}")]
    InvalidNodeKind { node: NodeId, expected: &'static str },

    /// Edit is structurally not allowed (unknown tag, root deletion, ...).
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    /// The global normalize loop stopped making progress.
    #[error("Normalization did not converge after {passes} passes ({missed} nodes left)")]
    NormalizeDidNotConverge { passes: usize, missed: usize },
}

impl EngineError {
    /// Create an unknown-artifact error from a location or id.
    pub fn unknown_artifact(what: impl ToString) -> Self {
        Self::UnknownArtifact(what.to_string())
    }

    /// Create an invalid-edit error.
    pub fn invalid_edit(message: impl Into<String>) -> Self {
        Self::InvalidEdit(message.into())
    }

    /// Create an invalid-node-kind error.
    pub fn wrong_kind(node: NodeId, expected: &'static str) -> Self {
        Self::InvalidNodeKind { node, expected }
    }
}

/// Why reconciliation of an external change list was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileReason {
    /// The document node or its root element changed.
    RootDocumentChange,
    /// A changed schema node has no domain node.
    MissingDomainNode(XNodeId),
    /// The parent of an added node has no domain node.
    MissingParent(XNodeId),
    /// The change kind cannot be mapped onto the object model.
    UnsupportedChange(String),
    /// The domain node found for a change has an unexpected kind.
    UnexpectedNodeKind(NodeId),
    /// The model failed its integrity check after reconciling.
    IntegrityViolation(usize),
}

/// Reconciliation failed; the artifact must be reloaded.
#[derive(Debug, Clone, Error)]
#[error("Reconciliation failed: {reason:?}")]
pub struct ReconcileError {
    pub reason: ReconcileReason,
}

impl ReconcileError {
    pub fn new(reason: ReconcileReason) -> Self {
        Self { reason }
    }

    pub fn root_change() -> Self {
        Self::new(ReconcileReason::RootDocumentChange)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ReconcileReason::UnsupportedChange(message.into()))
    }
}
