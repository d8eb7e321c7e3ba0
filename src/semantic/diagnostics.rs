//! Diagnostics: error classes, messages and their per-artifact buckets.
//!
//! Every stored diagnostic carries exactly one atomic [`ErrorClass`]; queries
//! may combine classes into a mask.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::base::{ArtifactId, NodeId};

// ============================================================================
// ERROR CLASSES
// ============================================================================

bitflags::bitflags! {
    /// Kind of a diagnostic; combine with `|` to query several at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize))]
    pub struct ErrorClass: u32 {
        /// Structure or typed-value problems found while parsing.
        const PARSE_ERROR = 1 << 0;
        /// Duplicate symbols, unresolved or malformed references.
        const RESOLVE_ERROR = 1 << 1;
        /// Semantic validation rules.
        const VALIDATION_ERROR = 1 << 2;
        /// Problems only detectable while running a command.
        const RUNTIME_ERROR = 1 << 3;
        /// Every class.
        const ALL = Self::PARSE_ERROR.bits()
            | Self::RESOLVE_ERROR.bits()
            | Self::VALIDATION_ERROR.bits()
            | Self::RUNTIME_ERROR.bits();
    }
}

impl ErrorClass {
    /// Whether this is a single class (the only kind that can be stored).
    pub fn is_atomic(&self) -> bool {
        self.bits().count_ones() == 1
    }

    /// The atomic classes contained in this mask.
    pub fn atoms(&self) -> impl Iterator<Item = ErrorClass> + '_ {
        self.iter().filter(|class| class.is_atomic())
    }
}

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A diagnostic recorded against a domain node.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    /// The node the diagnostic is about.
    pub node: NodeId,
    /// The single class it belongs to.
    pub class: ErrorClass,
    pub severity: Severity,
    /// Error/warning code (e.g., "E0001").
    pub code: Option<Arc<str>>,
    pub message: Arc<str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(node: NodeId, class: ErrorClass, message: impl Into<Arc<str>>) -> Self {
        Self {
            node,
            class,
            severity: Severity::Error,
            code: None,
            message: message.into(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(node: NodeId, class: ErrorClass, message: impl Into<Arc<str>>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(node, class, message)
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Diagnostic codes.
///
/// ## Error Code Ranges
///
/// - **E0001-E0099**: Resolution (symbols and references)
/// - **E0101-E0199**: Parsing (structure and typed values)
pub mod codes {
    /// Reference does not name an element of the expected kind.
    pub const UNRESOLVED_REFERENCE: &str = "E0001";
    /// Reference names several elements.
    pub const AMBIGUOUS_REFERENCE: &str = "E0002";
    /// Reference text is not a valid name.
    pub const MALFORMED_REFERENCE: &str = "E0003";
    /// Symbol already owned by another element.
    pub const DUPLICATE_SYMBOL: &str = "E0004";

    /// Document root is not a known root element.
    pub const UNKNOWN_ROOT: &str = "E0101";
    /// Child element not allowed here.
    pub const UNEXPECTED_ELEMENT: &str = "E0102";
    /// Attribute text does not convert to the declared type.
    pub const INVALID_VALUE: &str = "E0103";
}

// ============================================================================
// DIAGNOSTIC STORE
// ============================================================================

/// Diagnostics bucketed by (artifact, class), then by node.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticStore {
    buckets: IndexMap<(ArtifactId, ErrorClass), IndexMap<NodeId, Vec<Diagnostic>>>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a diagnostic. Composite classes are refused.
    pub fn add(&mut self, artifact: ArtifactId, diagnostic: Diagnostic) -> bool {
        if !diagnostic.class.is_atomic() {
            warn!(
                "[DIAG] refusing diagnostic with composite class {:?}",
                diagnostic.class
            );
            return false;
        }
        self.buckets
            .entry((artifact, diagnostic.class))
            .or_default()
            .entry(diagnostic.node)
            .or_default()
            .push(diagnostic);
        true
    }

    /// Remove diagnostics of `node` in the classes of `mask`.
    pub fn remove_for_node(&mut self, node: NodeId, mask: ErrorClass) -> usize {
        self.remove_where(node, mask, |_| true)
    }

    /// Remove diagnostics of `node` in `mask` for which `pred` holds.
    pub fn remove_where(
        &mut self,
        node: NodeId,
        mask: ErrorClass,
        pred: impl Fn(&Diagnostic) -> bool,
    ) -> usize {
        let mut removed = 0;
        for ((_, class), by_node) in self.buckets.iter_mut() {
            if !mask.contains(*class) {
                continue;
            }
            if let Some(list) = by_node.get_mut(&node) {
                let before = list.len();
                list.retain(|d| !pred(d));
                removed += before - list.len();
                if list.is_empty() {
                    by_node.shift_remove(&node);
                }
            }
        }
        self.prune();
        removed
    }

    /// Remove everything recorded for `artifact` in `mask`.
    pub fn remove_for_artifact(&mut self, artifact: ArtifactId, mask: ErrorClass) -> usize {
        let mut removed = 0;
        self.buckets.retain(|(owner, class), by_node| {
            if *owner == artifact && mask.contains(*class) {
                removed += by_node.values().map(Vec::len).sum::<usize>();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove every diagnostic of the classes in `mask`.
    pub fn clear_class(&mut self, mask: ErrorClass) -> usize {
        let mut removed = 0;
        self.buckets.retain(|(_, class), by_node| {
            if mask.contains(*class) {
                removed += by_node.values().map(Vec::len).sum::<usize>();
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn for_artifact(&self, artifact: ArtifactId, mask: ErrorClass) -> Vec<&Diagnostic> {
        self.buckets
            .iter()
            .filter(|((owner, class), _)| *owner == artifact && mask.contains(*class))
            .flat_map(|(_, by_node)| by_node.values().flatten())
            .collect()
    }

    pub fn for_node(&self, node: NodeId, mask: ErrorClass) -> Vec<&Diagnostic> {
        self.buckets
            .iter()
            .filter(|((_, class), _)| mask.contains(*class))
            .filter_map(|(_, by_node)| by_node.get(&node))
            .flatten()
            .collect()
    }

    pub fn all(&self, mask: ErrorClass) -> Vec<&Diagnostic> {
        self.buckets
            .iter()
            .filter(|((_, class), _)| mask.contains(*class))
            .flat_map(|(_, by_node)| by_node.values().flatten())
            .collect()
    }

    /// Nodes with at least one diagnostic in `mask`.
    pub fn nodes(&self, mask: ErrorClass) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .buckets
            .iter()
            .filter(|((_, class), _)| mask.contains(*class))
            .flat_map(|(_, by_node)| by_node.keys().copied())
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    pub fn len(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|by_node| by_node.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn prune(&mut self) {
        self.buckets.retain(|_, by_node| !by_node.is_empty());
    }
}
