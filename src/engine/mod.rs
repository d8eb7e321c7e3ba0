//! The orchestrator.
//!
//! [`Engine`] is the single-threaded core: it owns the markup provider, the
//! node arena, every artifact and artifact set, and drives
//!
//! 1. load: parse → normalize (fixed point) → resolve (fixed point)
//! 2. engine-initiated edits inside engine transactions
//! 3. reconciliation of externally-originated change lists (undo/redo or a
//!    host editor's own transactions), falling back to a full reload
//!
//! [`ModelManager`] wraps the engine in the single coarse lock all mutation
//! goes through.

mod change;
mod dispose;
mod edit;
mod factory;
mod integrity;
mod load;
mod normalize;
mod parse;
mod query;
mod reconcile;
mod resolve;
mod settle;

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use smol_str::SmolStr;

use crate::artifact::{Artifact, ArtifactSet};
use crate::base::{ArtifactId, ArtifactSetId, NodeId, XNodeId};
use crate::config::EngineOptions;
use crate::error::{EngineError, ReconcileReason};
use crate::markup::{MarkupProvider, ProviderEvent};
use crate::model::{Hosting, Node, NodeArena, NodeKind, NodeState};
use crate::schema::{ElementSpec, Schema};
use crate::semantic::Diagnostic;

pub use change::{ChangeGroup, ChangeOrigin, ModelChange, ModelChangeKind};
pub use factory::{ArtifactFactory, DocumentSource, FileFactory, InMemoryFactory, LoadRequest};
pub use integrity::IntegrityViolation;
pub use normalize::PassReport;
pub use query::BindingInfo;
pub use resolve::ResolveReport;

use edit::ActiveTransaction;

/// Something observable that happened inside the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ArtifactLoaded {
        artifact: ArtifactId,
        uri: SmolStr,
    },
    /// The artifact's node tree was discarded; its root is back to `None`.
    ReloadStarted {
        artifact: ArtifactId,
        root_state: NodeState,
    },
    ArtifactReloaded {
        artifact: ArtifactId,
        root_state: NodeState,
    },
    ReconciliationFailed {
        artifact: ArtifactId,
        reason: ReconcileReason,
    },
    ChangeGroupRecorded {
        artifact: ArtifactId,
        origin: ChangeOrigin,
        changes: usize,
    },
    ArtifactClosed {
        artifact: ArtifactId,
    },
}

/// Single-threaded core. All methods take `&mut self`; share it through
/// [`ModelManager`].
pub struct Engine {
    pub(crate) options: EngineOptions,
    pub(crate) schema: Arc<Schema>,
    pub(crate) provider: MarkupProvider,
    pub(crate) nodes: NodeArena,
    pub(crate) artifacts: IndexMap<ArtifactId, Artifact>,
    pub(crate) sets: IndexMap<ArtifactSetId, ArtifactSet>,
    pub(crate) factory: Box<dyn ArtifactFactory>,
    pub(crate) active: Option<ActiveTransaction>,
    pub(crate) history: Vec<ChangeGroup>,
    pub(crate) events: Vec<EngineEvent>,
    next_artifact: u32,
    next_set: u32,
}

impl Engine {
    pub fn new(schema: Schema, options: EngineOptions) -> Self {
        Self::with_factory(schema, options, Box::new(InMemoryFactory::new()))
    }

    pub fn with_factory(
        schema: Schema,
        options: EngineOptions,
        factory: Box<dyn ArtifactFactory>,
    ) -> Self {
        let provider = MarkupProvider::with_indent(options.indent.clone());
        Self {
            options,
            schema: Arc::new(schema),
            provider,
            nodes: NodeArena::new(),
            artifacts: IndexMap::new(),
            sets: IndexMap::new(),
            factory,
            active: None,
            history: Vec::new(),
            events: Vec::new(),
            next_artifact: 0,
            next_set: 0,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn provider(&self) -> &MarkupProvider {
        &self.provider
    }

    /// Direct access for host-side (external) edits. Changes made here only
    /// reach the model through [`handle_provider_event`](Self::handle_provider_event).
    pub fn provider_mut(&mut self) -> &mut MarkupProvider {
        &mut self.provider
    }

    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn artifact(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.get(&id)
    }

    pub fn artifact_set(&self, id: ArtifactSetId) -> Option<&ArtifactSet> {
        self.sets.get(&id)
    }

    /// The most recent change groups, oldest first, at most
    /// `max_history` of them.
    pub fn history(&self) -> &[ChangeGroup] {
        &self.history
    }

    /// Take the recorded change groups, leaving the history empty.
    pub fn drain_history(&mut self) -> Vec<ChangeGroup> {
        std::mem::take(&mut self.history)
    }

    /// Take every event recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // INTERNAL HELPERS
    // ========================================================================

    pub(crate) fn node_ref(&self, id: NodeId) -> Result<&Node, EngineError> {
        self.nodes.get(id).ok_or(EngineError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, EngineError> {
        self.nodes.get_mut(id).ok_or(EngineError::UnknownNode(id))
    }

    pub(crate) fn require_artifact(&self, id: ArtifactId) -> Result<&Artifact, EngineError> {
        self.artifacts
            .get(&id)
            .ok_or_else(|| EngineError::unknown_artifact(id))
    }

    pub(crate) fn alloc_artifact_id(&mut self) -> ArtifactId {
        let id = ArtifactId(self.next_artifact);
        self.next_artifact += 1;
        id
    }

    pub(crate) fn create_set(&mut self) -> ArtifactSetId {
        let id = ArtifactSetId(self.next_set);
        self.next_set += 1;
        self.sets.insert(
            id,
            ArtifactSet::new(id, self.options.track_forward_dependencies),
        );
        id
    }

    /// Artifact owning `id`, found by walking up to the artifact node.
    pub(crate) fn owning_artifact(&self, id: NodeId) -> Option<ArtifactId> {
        let root = self.nodes.root_of(id)?;
        match self.nodes.get(root)?.kind {
            NodeKind::Artifact(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub(crate) fn owning_set(&self, id: NodeId) -> Option<ArtifactSetId> {
        let artifact = self.owning_artifact(id)?;
        self.artifacts.get(&artifact).map(|a| a.set)
    }

    /// Markup node backing `id`; ghosts resolve to their parent's.
    pub(crate) fn host_of(&self, id: NodeId) -> Option<XNodeId> {
        let node = self.nodes.get(id)?;
        match node.hosting {
            Hosting::Hosted(x) => Some(x),
            Hosting::Ghost => self.host_of(node.parent?),
            Hosting::Detached => None,
        }
    }

    /// Domain node hosted by markup node `x`, if it is alive and really
    /// hosted there (annotations of detached markup may be stale).
    pub(crate) fn live_annotation(&self, x: XNodeId) -> Option<NodeId> {
        let id = self.provider.annotation(x)?;
        let node = self.nodes.get(id)?;
        (node.hosting == Hosting::Hosted(x)).then_some(id)
    }

    pub(crate) fn element_spec(&self, id: NodeId) -> Option<&ElementSpec> {
        let tag = self.nodes.get(id)?.kind.tag()?;
        self.schema.spec(tag)
    }

    /// Ghost child of `id`, if any.
    pub(crate) fn ghost_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes
            .get(id)?
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes.get(child).is_some_and(|c| c.hosting.is_ghost()))
    }

    /// Record a diagnostic against `node` in its artifact's bucket.
    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        let Some(artifact) = self.owning_artifact(diagnostic.node) else {
            return;
        };
        let Some(set) = self.artifacts.get(&artifact).map(|a| a.set) else {
            return;
        };
        if let Some(set) = self.sets.get_mut(&set) {
            set.add_diagnostic(artifact, diagnostic);
        }
    }

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}

// ============================================================================
// MODEL MANAGER
// ============================================================================

/// Thread-safe handle: every mutation runs under one coarse lock.
pub struct ModelManager {
    engine: Mutex<Engine>,
}

impl ModelManager {
    pub fn new(schema: Schema, options: EngineOptions) -> Self {
        Self {
            engine: Mutex::new(Engine::new(schema, options)),
        }
    }

    pub fn with_factory(
        schema: Schema,
        options: EngineOptions,
        factory: Box<dyn ArtifactFactory>,
    ) -> Self {
        Self {
            engine: Mutex::new(Engine::with_factory(schema, options, factory)),
        }
    }

    /// Acquire the single-writer lock.
    pub fn lock(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock()
    }

    pub fn load(&self, request: LoadRequest) -> Result<Vec<ArtifactId>, EngineError> {
        self.lock().load(request)
    }

    pub fn reload(&self, artifact: ArtifactId) -> Result<(), EngineError> {
        self.lock().reload(artifact)
    }

    pub fn artifact_by_uri(&self, uri: &str) -> Option<ArtifactId> {
        self.lock().artifact_by_uri(uri)
    }

    /// Deliver a provider notification.
    pub fn notify(&self, event: &ProviderEvent) -> Result<(), EngineError> {
        self.lock().handle_provider_event(event)
    }

    pub fn into_inner(self) -> Engine {
        self.engine.into_inner()
    }
}
