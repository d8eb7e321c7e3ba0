//! One loaded document.

use smol_str::SmolStr;

use crate::base::{ArtifactId, ArtifactSetId, NodeId, XNodeId};
use crate::semantic::ErrorClass;

/// A loaded document: the root of one node tree, backed by one markup
/// document, member of exactly one [`ArtifactSet`](super::ArtifactSet).
#[derive(Debug, Clone)]
pub struct Artifact {
    pub(crate) id: ArtifactId,
    pub(crate) uri: SmolStr,
    pub(crate) root: NodeId,
    pub(crate) document: XNodeId,
    pub(crate) set: ArtifactSetId,
    /// Edited since load (by the engine or by undo/redo).
    pub(crate) is_dirty: bool,
    pub(crate) is_reloading: bool,
    /// Reconciliation gave up; the next reload is mandatory.
    pub(crate) requires_reload: bool,
    /// No error-severity parse diagnostics.
    pub(crate) designer_safe: bool,
    /// Error classes whose diagnostics are stale since the last transaction.
    pub(crate) validity_dirty: ErrorClass,
    pub(crate) reload_count: u32,
}

impl Artifact {
    pub(crate) fn new(
        id: ArtifactId,
        uri: SmolStr,
        root: NodeId,
        document: XNodeId,
        set: ArtifactSetId,
    ) -> Self {
        Self {
            id,
            uri,
            root,
            document,
            set,
            is_dirty: false,
            is_reloading: false,
            requires_reload: false,
            designer_safe: true,
            validity_dirty: ErrorClass::empty(),
            reload_count: 0,
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The artifact node at the top of this artifact's node tree.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn document(&self) -> XNodeId {
        self.document
    }

    pub fn set(&self) -> ArtifactSetId {
        self.set
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_reloading(&self) -> bool {
        self.is_reloading
    }

    pub fn requires_reload(&self) -> bool {
        self.requires_reload
    }

    pub fn is_designer_safe(&self) -> bool {
        self.designer_safe
    }

    pub fn validity_dirty(&self) -> ErrorClass {
        self.validity_dirty
    }

    pub fn reload_count(&self) -> u32 {
        self.reload_count
    }

    pub(crate) fn mark_validity_dirty(&mut self, mask: ErrorClass) {
        self.validity_dirty |= mask;
    }

    /// Validation for `mask` has been rerun.
    pub fn clear_validity_dirty(&mut self, mask: ErrorClass) {
        self.validity_dirty.remove(mask);
    }
}
