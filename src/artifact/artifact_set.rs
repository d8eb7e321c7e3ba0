//! Shared resolution universe.
//!
//! An artifact set owns the symbol table, the dependency graph and the
//! diagnostics of every artifact registered in it. Duplicate symbol
//! bookkeeping lives here because it touches both the table and the
//! diagnostics: the second (third, ...) owner of a symbol gets a
//! `RESOLVE_ERROR`, and when only one owner is left its error is cleared.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::base::{ArtifactId, ArtifactSetId, NodeId};
use crate::semantic::{
    DependencyGraph, Diagnostic, DiagnosticStore, ErrorClass, Symbol, SymbolInsert, SymbolRemoval,
    SymbolTable, codes,
};

#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub(crate) id: ArtifactSetId,
    pub(crate) artifacts: Vec<ArtifactId>,
    pub(crate) symbols: SymbolTable,
    pub(crate) dependencies: DependencyGraph,
    pub(crate) diagnostics: DiagnosticStore,
    /// Artifact owning each node filed in the symbol table.
    symbol_owners: FxHashMap<NodeId, ArtifactId>,
}

impl ArtifactSet {
    pub fn new(id: ArtifactSetId, track_forward_dependencies: bool) -> Self {
        let dependencies = if track_forward_dependencies {
            DependencyGraph::with_forward_tracking()
        } else {
            DependencyGraph::new()
        };
        Self {
            id,
            artifacts: Vec::new(),
            symbols: SymbolTable::new(),
            dependencies,
            diagnostics: DiagnosticStore::new(),
            symbol_owners: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> ArtifactSetId {
        self.id
    }

    pub fn artifacts(&self) -> &[ArtifactId] {
        &self.artifacts
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    pub fn diagnostics(&self) -> &DiagnosticStore {
        &self.diagnostics
    }

    // ========================================================================
    // ARTIFACTS
    // ========================================================================

    pub fn add_artifact(&mut self, artifact: ArtifactId) {
        if !self.artifacts.contains(&artifact) {
            self.artifacts.push(artifact);
        }
    }

    /// Unregister `artifact`, dropping its symbols and diagnostics.
    pub fn remove_artifact(&mut self, artifact: ArtifactId) {
        self.artifacts.retain(|&a| a != artifact);
        let owned: Vec<NodeId> = self
            .symbol_owners
            .iter()
            .filter(|&(_, &owner)| owner == artifact)
            .map(|(&node, _)| node)
            .collect();
        for node in owned {
            self.remove_symbol(node);
        }
        let removed = self.diagnostics.remove_for_artifact(artifact, ErrorClass::ALL);
        debug!(
            "[SET] {} removed {} ({} diagnostics dropped)",
            self.id, artifact, removed
        );
    }

    // ========================================================================
    // SYMBOLS
    // ========================================================================

    /// File `node` (of `artifact`) under `symbol`, reporting a duplicate on
    /// `node` if the symbol is already owned.
    pub fn add_symbol(&mut self, artifact: ArtifactId, node: NodeId, symbol: Symbol) -> SymbolInsert {
        if self.symbols.symbol_of(node) == Some(&symbol) {
            return self.symbols.add(symbol, node);
        }
        if self.symbol_owners.contains_key(&node) {
            self.remove_symbol(node);
        }
        let display = symbol.to_string();
        let outcome = self.symbols.add(symbol, node);
        self.symbol_owners.insert(node, artifact);
        if let SymbolInsert::Duplicate { canonical } = outcome {
            self.diagnostics.add(
                artifact,
                Diagnostic::error(
                    node,
                    ErrorClass::RESOLVE_ERROR,
                    format!("'{display}' is already defined (first definition: {canonical})"),
                )
                .with_code(codes::DUPLICATE_SYMBOL),
            );
        }
        outcome
    }

    /// Drop `node` from the table. When exactly one owner remains, its
    /// duplicate error is cleared.
    pub fn remove_symbol(&mut self, node: NodeId) -> Option<SymbolRemoval> {
        self.symbol_owners.remove(&node);
        let removal = self.symbols.remove(node)?;
        self.clear_duplicate(node);
        if let [survivor] = removal.remaining.as_slice() {
            self.clear_duplicate(*survivor);
        }
        Some(removal)
    }

    fn clear_duplicate(&mut self, node: NodeId) {
        self.diagnostics
            .remove_where(node, ErrorClass::RESOLVE_ERROR, |d| {
                d.has_code(codes::DUPLICATE_SYMBOL)
            });
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    pub fn add_diagnostic(&mut self, artifact: ArtifactId, diagnostic: Diagnostic) -> bool {
        self.diagnostics.add(artifact, diagnostic)
    }

    pub fn remove_diagnostics(&mut self, node: NodeId, mask: ErrorClass) -> usize {
        self.diagnostics.remove_for_node(node, mask)
    }

    pub fn remove_artifact_diagnostics(&mut self, artifact: ArtifactId, mask: ErrorClass) -> usize {
        self.diagnostics.remove_for_artifact(artifact, mask)
    }

    pub fn clear_diagnostics(&mut self, mask: ErrorClass) -> usize {
        self.diagnostics.clear_class(mask)
    }

    pub fn diagnostics_for(&self, artifact: ArtifactId, mask: ErrorClass) -> Vec<&Diagnostic> {
        self.diagnostics.for_artifact(artifact, mask)
    }
}
