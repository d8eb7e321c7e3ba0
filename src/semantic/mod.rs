//! Names, references and what depends on what.
//!
//! - [`Symbol`] / [`SymbolTable`] - structured names and their owners
//! - [`Binding`] - the resolver's typed result for one reference
//! - [`DependencyGraph`] - anti-dependency index driving invalidation
//! - [`Diagnostic`] / [`DiagnosticStore`] - bit-flag classed diagnostics

mod binding;
mod dependency;
pub mod diagnostics;
mod symbol;
mod symbol_table;

pub use binding::{Binding, BindingStatus, candidates};
pub use dependency::DependencyGraph;
pub use diagnostics::{Diagnostic, DiagnosticStore, ErrorClass, Severity, codes};
pub use symbol::{Symbol, is_identifier};
pub use symbol_table::{SymbolInsert, SymbolRemoval, SymbolTable};
