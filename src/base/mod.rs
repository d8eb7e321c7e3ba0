//! Foundation types for the trellis engine.
//!
//! This module provides the handles used throughout the crate:
//! - [`NodeId`] - Domain node handle inside the node arena
//! - [`XNodeId`] - Handle of a node in the external markup tree
//! - [`ArtifactId`], [`ArtifactSetId`] - Loaded documents and their shared universe
//! - [`TransactionId`] - User state attached to engine-initiated transactions
//! - Domain constants (namespaces, attribute names)
//!
//! This module has NO dependencies on other trellis modules.

pub mod constants;
mod ids;

pub use ids::{ArtifactId, ArtifactSetId, NodeId, TransactionId, XNodeId};
