//! Artifacts and the sets that share a resolution universe.

mod artifact;
mod artifact_set;

pub use artifact::Artifact;
pub use artifact_set::ArtifactSet;
