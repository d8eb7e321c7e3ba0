//! The external markup tree and its transaction provider.
//!
//! The engine never owns the markup: it reads it, annotates nodes with the
//! domain node hosting them, and edits it inside transactions. Everything a
//! host editor would do to the same tree (including undo and redo) arrives
//! back as a [`ProviderEvent`] carrying an ordered list of [`ChangeRecord`]s.
//!
//! - [`XTree`] / [`XNode`] - arena tree of documents, elements, attributes, text
//! - [`MarkupProvider`] - documents, annotations, transactions, undo/redo
//! - reader / writer - quick-xml based (de)serialization preserving whitespace

mod change;
mod provider;
mod reader;
mod transaction;
mod tree;
mod writer;

pub use change::{ChangeKind, ChangeRecord};
pub use provider::MarkupProvider;
pub use transaction::{CompletedTransaction, ProviderEvent, TransactionStatus};
pub use tree::{XNode, XNodeKind, XTree, local_name, prefix_of};
pub use writer::ElementSpan;
