//! Binding resolver.
//!
//! A [`Binding`] is the immutable outcome of looking a reference symbol up in
//! the [`SymbolTable`]. `Known` and `Duplicate` bindings own exactly one
//! dependency edge (owner → target): [`Binding::bind`] is the only place that
//! adds it and [`Binding::release`] the only place that removes it.

use tracing::trace;

use super::dependency::DependencyGraph;
use super::symbol::Symbol;
use super::symbol_table::SymbolTable;
use crate::base::NodeId;

/// Resolution status of a reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BindingStatus {
    /// Not resolved (or nothing to resolve).
    #[default]
    None,
    /// Exactly one owner, of the expected type.
    Known,
    /// No owner of the expected type.
    Unknown,
    /// Several owners; the target is the first of the expected type.
    Duplicate,
    /// The reference text is malformed.
    Undefined,
}

impl BindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStatus::None => "none",
            BindingStatus::Known => "known",
            BindingStatus::Unknown => "unknown",
            BindingStatus::Duplicate => "duplicate",
            BindingStatus::Undefined => "undefined",
        }
    }
}

/// A (status, target) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    status: BindingStatus,
    target: Option<NodeId>,
}

impl Binding {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn undefined() -> Self {
        Self {
            status: BindingStatus::Undefined,
            target: None,
        }
    }

    pub fn status(&self) -> BindingStatus {
        self.status
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// Whether this binding owns a dependency edge.
    pub fn owns_edge(&self) -> bool {
        matches!(self.status, BindingStatus::Known | BindingStatus::Duplicate)
    }

    /// Look `symbol` up, accepting only owners for which `matches` holds.
    ///
    /// 1. no owners → `Unknown`
    /// 2. no owner of the expected type → `Unknown`
    /// 3. a single owner, of the expected type → `Known`
    /// 4. several owners, at least one of the expected type → `Duplicate`,
    ///    targeting the first one that matches
    pub fn resolve(table: &SymbolTable, symbol: &Symbol, matches: impl Fn(NodeId) -> bool) -> Self {
        let owners = table.lookup(symbol);
        let Some(&target) = owners.iter().find(|&&owner| matches(owner)) else {
            return Self {
                status: BindingStatus::Unknown,
                target: None,
            };
        };
        let status = if owners.len() == 1 {
            BindingStatus::Known
        } else {
            BindingStatus::Duplicate
        };
        Self {
            status,
            target: Some(target),
        }
    }

    /// Resolve and register the owner → target edge.
    pub fn bind(
        owner: NodeId,
        symbol: &Symbol,
        table: &SymbolTable,
        graph: &mut DependencyGraph,
        matches: impl Fn(NodeId) -> bool,
    ) -> Self {
        let binding = Self::resolve(table, symbol, matches);
        if let (true, Some(target)) = (binding.owns_edge(), binding.target) {
            graph.add_dependency(owner, target);
        }
        trace!(
            "[BIND] {} '{}' -> {:?} {:?}",
            owner, symbol, binding.status, binding.target
        );
        binding
    }

    /// Remove the edge this binding owns. Consumes the binding, so releasing
    /// the same edge twice is impossible.
    pub fn release(self, owner: NodeId, graph: &mut DependencyGraph) {
        if let (true, Some(target)) = (self.owns_edge(), self.target) {
            graph.remove_dependency(owner, target);
        }
    }
}

/// All owners of `symbol` that match, canonical first.
pub fn candidates(table: &SymbolTable, symbol: &Symbol, matches: impl Fn(NodeId) -> bool) -> Vec<NodeId> {
    table
        .lookup(symbol)
        .iter()
        .copied()
        .filter(|&owner| matches(owner))
        .collect()
}
