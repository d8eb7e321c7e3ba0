//! # trellis-base
//!
//! Incremental synchronization between an external markup tree and a typed
//! object model: parse, normalize and resolve to a fixed point, then keep
//! the model in step with engine edits, host edits, undo and redo.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! engine    → Orchestrator: load/reload, passes, edits, reconciliation
//!   ↓
//! artifact  → Artifacts and artifact sets (resolution universes)
//!   ↓
//! semantic  → Symbols, bindings, dependency graph, diagnostics
//!   ↓
//! model     → Domain nodes, node states, node arena
//!   ↓
//! schema    → Element handler table
//!   ↓
//! markup    → External tree provider: documents, transactions, undo/redo
//!   ↓
//! base      → Primitives (ids, constants)
//! ```

// ============================================================================
// MODULES (dependency order: base → markup → schema → model → semantic → artifact → engine)
// ============================================================================

/// Foundation types: arena ids, transaction ids, constants
pub mod base;

/// Engine options
pub mod config;

/// Error types
pub mod error;

/// External markup tree: documents, annotations, transactions, XML I/O
pub mod markup;

/// Element handlers, typed values
pub mod schema;

/// Domain nodes and their life-cycle
pub mod model;

/// Symbols, bindings, dependency graph, diagnostics
pub mod semantic;

/// Artifacts and artifact sets
pub mod artifact;

/// Orchestrator and thread-safe handle
pub mod engine;

// Re-export foundation types
pub use base::{ArtifactId, ArtifactSetId, NodeId, TransactionId, XNodeId};
pub use config::{EngineOptions, IndentStyle};
pub use error::{EngineError, MarkupError, ReconcileError, ReconcileReason};

// Re-export the main entry points
pub use artifact::{Artifact, ArtifactSet};
pub use engine::{
    ArtifactFactory, BindingInfo, ChangeGroup, ChangeOrigin, DocumentSource, Engine, EngineEvent,
    FileFactory, InMemoryFactory, IntegrityViolation, LoadRequest, ModelChange, ModelChangeKind,
    ModelManager, ResolveReport,
};
pub use markup::{MarkupProvider, ProviderEvent};
pub use model::{Hosting, Node, NodeKind, NodeState, Value};
pub use schema::Schema;
pub use semantic::{BindingStatus, Diagnostic, ErrorClass, Severity, Symbol};

// Re-export text positions
pub use text_size::{TextRange, TextSize};
