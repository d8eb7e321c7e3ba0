//! Symbol → owning nodes.
//!
//! The first node filed under a symbol is canonical. Further nodes under the
//! same symbol are legal duplicates; the caller decides how to report them.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use super::symbol::Symbol;
use crate::base::NodeId;

/// Result of filing a node under a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolInsert {
    /// First node under this symbol.
    Canonical,
    /// Another node already owns the symbol.
    Duplicate { canonical: NodeId },
}

/// Result of removing a node from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRemoval {
    pub symbol: Symbol,
    /// Nodes still filed under the symbol, canonical first.
    pub remaining: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_symbol: IndexMap<Symbol, Vec<NodeId>>,
    by_node: FxHashMap<NodeId, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `node` under `symbol`. A node owns at most one symbol; filing it
    /// under another symbol first removes the previous entry. Filing it under
    /// the same symbol keeps its position.
    pub fn add(&mut self, symbol: Symbol, node: NodeId) -> SymbolInsert {
        match self.by_node.get(&node) {
            Some(current) if *current == symbol => return self.position_of(&symbol, node),
            Some(_) => {
                self.remove(node);
            }
            None => {}
        }
        trace!("[SYMBOLS] add '{}' -> {}", symbol, node);
        let owners = self.by_symbol.entry(symbol.clone()).or_default();
        owners.push(node);
        self.by_node.insert(node, symbol);
        match owners.first() {
            Some(&canonical) if canonical != node => SymbolInsert::Duplicate { canonical },
            _ => SymbolInsert::Canonical,
        }
    }

    fn position_of(&self, symbol: &Symbol, node: NodeId) -> SymbolInsert {
        match self.lookup(symbol).first() {
            Some(&canonical) if canonical != node => SymbolInsert::Duplicate { canonical },
            _ => SymbolInsert::Canonical,
        }
    }

    /// Drop `node` from its symbol's list. Empty lists are pruned.
    pub fn remove(&mut self, node: NodeId) -> Option<SymbolRemoval> {
        let symbol = self.by_node.remove(&node)?;
        trace!("[SYMBOLS] remove '{}' -> {}", symbol, node);
        let remaining = match self.by_symbol.get_mut(&symbol) {
            Some(owners) => {
                owners.retain(|&owner| owner != node);
                owners.clone()
            }
            None => Vec::new(),
        };
        if remaining.is_empty() {
            self.by_symbol.swap_remove(&symbol);
        }
        Some(SymbolRemoval { symbol, remaining })
    }

    /// Nodes filed under `symbol`, canonical first.
    pub fn lookup(&self, symbol: &Symbol) -> &[NodeId] {
        self.by_symbol.get(symbol).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn symbol_of(&self, node: NodeId) -> Option<&Symbol> {
        self.by_node.get(&node)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    /// Symbols owned by more than one node.
    pub fn duplicates(&self) -> impl Iterator<Item = (&Symbol, &[NodeId])> {
        self.by_symbol
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(symbol, owners)| (symbol, owners.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &[NodeId])> {
        self.by_symbol
            .iter()
            .map(|(symbol, owners)| (symbol, owners.as_slice()))
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
