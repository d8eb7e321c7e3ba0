//! Artifact life cycle: load, reload, close, rename.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::{info, warn};

use super::factory::{DocumentSource, LoadRequest};
use super::resolve::ResolveReport;
use super::settle::Settle;
use super::{Engine, EngineEvent};
use crate::artifact::Artifact;
use crate::base::{ArtifactId, ArtifactSetId, XNodeId};
use crate::error::{EngineError, MarkupError};
use crate::model::{NodeKind, NodeState};
use crate::semantic::{ErrorClass, Severity};

impl Engine {
    /// Fetch the requested documents through the factory and load them into
    /// one artifact set.
    pub fn load(&mut self, request: LoadRequest) -> Result<Vec<ArtifactId>, EngineError> {
        let sources = self.factory.create(&request)?;
        self.load_documents(sources, request.set)
    }

    /// Load documents whose text is already at hand. Artifacts are parsed,
    /// then the whole set is normalized and resolved to a fixed point.
    pub fn load_documents(
        &mut self,
        sources: Vec<DocumentSource>,
        set: Option<ArtifactSetId>,
    ) -> Result<Vec<ArtifactId>, EngineError> {
        if let Some(set) = set {
            if !self.sets.contains_key(&set) {
                return Err(EngineError::unknown_artifact(set));
            }
        }

        let mut documents: Vec<(SmolStr, XNodeId)> = Vec::new();
        for source in &sources {
            match self.provider.open_document(&source.uri, &source.text) {
                Ok(document) => documents.push((source.uri.clone(), document)),
                Err(err) => {
                    for (uri, _) in &documents {
                        self.provider.close_document(uri)?;
                    }
                    return Err(err.into());
                }
            }
        }

        let set_id = match set {
            Some(set) => set,
            None => self.create_set(),
        };
        let mut loaded = Vec::new();
        for (uri, document) in documents {
            let id = self.alloc_artifact_id();
            let root = self.nodes.alloc_root(NodeKind::Artifact(id));
            self.artifacts
                .insert(id, Artifact::new(id, uri, root, document, set_id));
            if let Some(set) = self.sets.get_mut(&set_id) {
                set.add_artifact(id);
            }
            loaded.push(id);
        }

        for &id in &loaded {
            self.parse_artifact(id)?;
        }
        self.normalize_set(set_id)?;
        self.invalidate_references(set_id, &loaded, FxHashSet::default());
        let report = self.resolve_set(set_id)?;

        for &id in &loaded {
            self.refresh_designer_safe(id);
            let uri = self.require_artifact(id)?.uri.clone();
            info!(
                "[LOAD] {} '{}' ({} unresolved in {})",
                id, uri, report.unresolved, set_id
            );
            self.emit(EngineEvent::ArtifactLoaded { artifact: id, uri });
        }
        Ok(loaded)
    }

    /// Throw the node tree of `artifact` away and rebuild it from the
    /// current markup. Bindings elsewhere in the set are rebound.
    pub fn reload(&mut self, artifact: ArtifactId) -> Result<(), EngineError> {
        let (root, set_id) = {
            let artifact = self.require_artifact(artifact)?;
            (artifact.root, artifact.set)
        };
        info!("[RELOAD] {}", artifact);
        if let Some(artifact) = self.artifacts.get_mut(&artifact) {
            artifact.is_reloading = true;
        }

        let dependents = self.external_dependents(root);
        let retired = self.symbols_under(root);
        let children = self.node_ref(root)?.children.clone();
        for child in children.into_iter().rev() {
            self.dispose(child);
        }
        if let Some(set) = self.sets.get_mut(&set_id) {
            set.remove_artifact_diagnostics(artifact, ErrorClass::ALL);
        }
        self.node_mut(root)?.reset();
        let root_state = self.node_ref(root)?.state;
        self.emit(EngineEvent::ReloadStarted {
            artifact,
            root_state,
        });

        self.parse_artifact(artifact)?;
        self.normalize_set(set_id)?;
        for dependent in dependents {
            self.restart_binding(dependent);
        }
        self.sweep_dangling_edges();
        self.invalidate_references(set_id, &[artifact], retired);
        self.resolve_set(set_id)?;

        if let Some(artifact) = self.artifacts.get_mut(&artifact) {
            artifact.is_reloading = false;
            artifact.requires_reload = false;
            artifact.reload_count += 1;
            artifact.mark_validity_dirty(ErrorClass::ALL);
        }
        self.refresh_designer_safe(artifact);
        let root_state = self.node_ref(root)?.state;
        if root_state != NodeState::Resolved {
            warn!("[RELOAD] {} root ended in {:?}", artifact, root_state);
        }
        self.emit(EngineEvent::ArtifactReloaded {
            artifact,
            root_state,
        });
        Ok(())
    }

    /// Like [`reload`](Self::reload), for every artifact of `set`.
    pub fn reload_set(&mut self, set: ArtifactSetId) -> Result<(), EngineError> {
        let artifacts = self
            .sets
            .get(&set)
            .map(|set| set.artifacts.clone())
            .ok_or_else(|| EngineError::unknown_artifact(set))?;
        for artifact in artifacts {
            self.reload(artifact)?;
        }
        Ok(())
    }

    /// Dispose an artifact's tree and close its document. Bindings in other
    /// artifacts that pointed into it become unresolved; bindings naming one
    /// of its symbols are bound again against the owners left behind.
    pub fn close_artifact(&mut self, artifact: ArtifactId) -> Result<(), EngineError> {
        if self.active.as_ref().is_some_and(|tx| tx.artifact == artifact) {
            return Err(EngineError::TransactionAlreadyActive(artifact));
        }
        let (root, set_id, uri) = {
            let artifact = self.require_artifact(artifact)?;
            (artifact.root, artifact.set, artifact.uri.clone())
        };
        let dependents = self.external_dependents(root);
        let retired = self.symbols_under(root);
        self.dispose(root);
        self.artifacts.shift_remove(&artifact);
        let mut empty = false;
        if let Some(set) = self.sets.get_mut(&set_id) {
            set.remove_artifact(artifact);
            empty = set.artifacts.is_empty();
        }
        self.provider.close_document(&uri)?;

        if empty {
            self.sets.shift_remove(&set_id);
        } else {
            let mut work = Settle::default();
            work.rebind.extend(dependents);
            work.touched.extend(retired);
            self.settle(set_id, work)?;
        }
        info!("[CLOSE] {} '{}'", artifact, uri);
        self.emit(EngineEvent::ArtifactClosed { artifact });
        Ok(())
    }

    /// Point `artifact` at a new location.
    pub fn rename_artifact(&mut self, artifact: ArtifactId, uri: &str) -> Result<(), EngineError> {
        let old = self.require_artifact(artifact)?.uri.clone();
        if self.provider.document(uri).is_some() {
            return Err(MarkupError::DocumentAlreadyOpen(SmolStr::new(uri)).into());
        }
        self.provider.rename_document(&old, uri)?;
        if let Some(artifact) = self.artifacts.get_mut(&artifact) {
            artifact.uri = SmolStr::new(uri);
        }
        info!("[RENAME] {} '{}' -> '{}'", artifact, old, uri);
        Ok(())
    }

    /// Re-run both global passes over `set`.
    pub fn normalize_and_resolve(&mut self, set: ArtifactSetId) -> Result<ResolveReport, EngineError> {
        if !self.sets.contains_key(&set) {
            return Err(EngineError::unknown_artifact(set));
        }
        self.normalize_set(set)?;
        self.resolve_set(set)
    }

    /// An artifact is designer-safe while it has no parse errors.
    pub(crate) fn refresh_designer_safe(&mut self, artifact: ArtifactId) {
        let Some(set) = self.artifacts.get(&artifact).map(|a| a.set) else {
            return;
        };
        let safe = self.sets.get(&set).is_none_or(|set| {
            set.diagnostics_for(artifact, ErrorClass::PARSE_ERROR)
                .iter()
                .all(|d| d.severity != Severity::Error)
        });
        if let Some(artifact) = self.artifacts.get_mut(&artifact) {
            artifact.designer_safe = safe;
        }
    }
}
