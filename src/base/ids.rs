//! Typed handles.
//!
//! Every handle is a plain index into an arena owned elsewhere. Handles are
//! never reused: a disposed node keeps its id forever, so a stale handle found
//! in an external annotation can always be told apart from a live one.

use std::fmt;

use uuid::Uuid;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub struct $name(pub u32);

        impl $name {
            /// Create a new id from an arena index.
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            /// Get the index into the arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle of a domain node in the engine's node arena.
    NodeId,
    "n"
);

arena_id!(
    /// Handle of a node in the external markup tree.
    XNodeId,
    "x"
);

arena_id!(
    /// Handle of a loaded artifact.
    ArtifactId,
    "artifact#"
);

arena_id!(
    /// Handle of an artifact set (one resolution universe).
    ArtifactSetId,
    "set#"
);

/// Identifies an engine-initiated transaction.
///
/// Stored as the provider transaction's user state; a transaction without
/// user state (or with one the engine does not recognise) is external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    /// Create a fresh, random transaction id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}
