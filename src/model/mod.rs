//! The domain node tree.
//!
//! Nodes live in a [`NodeArena`] and form strict trees rooted at artifact
//! nodes: each node has one parent, parents list their children in order, and
//! the owning artifact is found by walking up. A node is optionally backed by
//! one markup node ([`Hosting`]).

mod arena;
mod kind;
pub mod leak;
mod node;
mod state;

pub use arena::NodeArena;
pub use kind::{BindingSlot, ElementData, NodeKind, ValueSlot};
pub use leak::LeakTracker;
pub use node::{Hosting, Node};
pub use state::NodeState;
pub use crate::schema::{Value, ValueType};
