//! Node life-cycle state.

/// `None → ParseAttempted → Parsed → NormalizeAttempted → Normalized →
/// ResolveAttempted → Resolved`.
///
/// States only move forward, except for the two legal rewinds: back to
/// `Parsed` (forces re-normalization) or back to `Normalized` (forces
/// re-resolution). A full reset to `None` only happens when an artifact is
/// reloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeState {
    #[default]
    None,
    ParseAttempted,
    Parsed,
    NormalizeAttempted,
    Normalized,
    ResolveAttempted,
    Resolved,
}

impl NodeState {
    pub fn is_parsed(&self) -> bool {
        *self >= NodeState::Parsed
    }

    pub fn is_normalized(&self) -> bool {
        *self >= NodeState::Normalized
    }

    pub fn is_resolved(&self) -> bool {
        *self == NodeState::Resolved
    }

    /// Whether moving from `self` to `to` is a legal rewind.
    pub fn can_rewind_to(&self, to: NodeState) -> bool {
        matches!(to, NodeState::Parsed | NodeState::Normalized) && *self >= to
    }
}
