//! Reconciliation of externally-originated markup changes.
//!
//! Every change of a completed transaction is mapped onto the object model
//! (delete, rehost or parse), the collected work is settled, and the result
//! is recorded as a change group. Any shape the engine does not understand
//! aborts the batch with a [`ReconcileError`]; the caller then reloads the
//! whole artifact from the markup.

use smol_str::SmolStr;
use tracing::{debug, trace, warn};

use super::change::{ChangeGroup, ChangeOrigin, ModelChange};
use super::parse::ParseOutcome;
use super::settle::Settle;
use super::{Engine, EngineEvent};
use crate::base::{ArtifactId, NodeId, XNodeId};
use crate::error::{EngineError, ReconcileError, ReconcileReason};
use crate::markup::{ChangeKind, ChangeRecord, CompletedTransaction, ProviderEvent, TransactionStatus, XNodeKind};
use crate::model::NodeKind;
use crate::semantic::ErrorClass;

impl Engine {
    /// Deliver a provider notification.
    ///
    /// Transactions begun by the engine itself are already reflected in the
    /// model; everything else (host commits, undo, redo) is reconciled. A
    /// failed reconciliation is reported as an event and repaired by reload.
    pub fn handle_provider_event(&mut self, event: &ProviderEvent) -> Result<(), EngineError> {
        let tx = event.transaction();
        let Some(artifact) = self
            .artifacts
            .values()
            .find(|artifact| artifact.document == tx.document)
            .map(|artifact| artifact.id)
        else {
            trace!("[RECONCILE] '{}' is not loaded", tx.uri);
            return Ok(());
        };

        if tx.status == TransactionStatus::Aborted {
            debug!("[RECONCILE] '{}' aborted on {}", tx.name, artifact);
            if self.options.reload_on_aborted_transaction {
                return self.reload(artifact);
            }
            return Ok(());
        }

        if let Some(entry) = self.artifacts.get_mut(&artifact) {
            entry.mark_validity_dirty(ErrorClass::ALL);
        }
        if !event.is_undo_redo() && tx.user_state.is_some() {
            return Ok(());
        }
        let origin = if event.is_undo_redo() {
            ChangeOrigin::UndoRedo
        } else {
            ChangeOrigin::External
        };

        match self.reconcile(artifact, tx) {
            Ok(changes) => {
                if let Some(entry) = self.artifacts.get_mut(&artifact) {
                    entry.is_dirty = true;
                }
                self.record_group(ChangeGroup {
                    transaction: None,
                    name: tx.name.clone(),
                    artifact,
                    origin,
                    changes,
                });
                Ok(())
            }
            Err(err) => {
                warn!(
                    "[RECONCILE] '{}' on {} failed: {}; reloading",
                    tx.name, artifact, err
                );
                if let Some(entry) = self.artifacts.get_mut(&artifact) {
                    entry.requires_reload = true;
                }
                self.emit(EngineEvent::ReconciliationFailed {
                    artifact,
                    reason: err.reason,
                });
                self.reload(artifact)
            }
        }
    }

    fn reconcile(
        &mut self,
        artifact: ArtifactId,
        tx: &CompletedTransaction,
    ) -> Result<Vec<ModelChange>, ReconcileError> {
        let (document, set) = {
            let artifact = self
                .artifacts
                .get(&artifact)
                .ok_or_else(|| ReconcileError::unsupported(format!("{artifact} is gone")))?;
            (artifact.document, artifact.set)
        };
        let mut work = Settle::default();
        let mut changes = Vec::new();

        for change in &tx.changes {
            let Some(kind) = self.provider.tree().get(change.node).map(|x| x.kind()) else {
                return Err(ReconcileError::new(ReconcileReason::UnsupportedChange(
                    format!("unknown markup node {}", change.node),
                )));
            };
            let owner_document = self
                .provider
                .tree()
                .document_of(change.node)
                .or_else(|| change.parent.and_then(|p| self.provider.tree().document_of(p)));
            if owner_document.is_some_and(|d| d != document) {
                continue;
            }
            match kind {
                XNodeKind::Document => return Err(ReconcileError::root_change()),
                XNodeKind::Text | XNodeKind::Comment => continue,
                XNodeKind::Element if change.parent == Some(document) => {
                    return Err(ReconcileError::root_change());
                }
                _ => {}
            }
            match change.kind {
                ChangeKind::NameChanged => {
                    return Err(ReconcileError::unsupported(format!(
                        "rename of {}",
                        change.node
                    )));
                }
                ChangeKind::ValueChanged if kind == XNodeKind::Element => continue,
                _ => {}
            }

            let domain = self.live_annotation(change.node);
            let namespace = self.namespace_near(change.node, change.parent);
            if domain.is_none() && !self.schema.owns_namespace(namespace.as_deref()) {
                continue;
            }
            trace!("[RECONCILE] {:?} {} ({:?})", change.kind, change.node, domain);

            match change.kind {
                ChangeKind::Remove => {
                    self.reconcile_remove(change, kind, domain, &mut work, &mut changes)?;
                }
                ChangeKind::Add | ChangeKind::ValueChanged => {
                    self.reconcile_add(change, kind, domain, &mut work, &mut changes)?;
                }
                ChangeKind::NameChanged => {}
            }
        }

        self.settle(set, work)
            .map_err(|err| ReconcileError::unsupported(err.to_string()))?;

        if self.options.verify_integrity_after_reconcile {
            let violations = self.verify_integrity();
            if !violations.is_empty() {
                for violation in &violations {
                    warn!("[RECONCILE] integrity: {:?}", violation);
                }
                return Err(ReconcileError::new(ReconcileReason::IntegrityViolation(
                    violations.len(),
                )));
            }
        }
        debug!(
            "[RECONCILE] '{}' on {}: {} changes",
            tx.name,
            artifact,
            changes.len()
        );
        Ok(changes)
    }

    fn reconcile_remove(
        &mut self,
        change: &ChangeRecord,
        kind: XNodeKind,
        domain: Option<NodeId>,
        work: &mut Settle,
        changes: &mut Vec<ModelChange>,
    ) -> Result<(), ReconcileError> {
        let Some(node) = domain else {
            if kind == XNodeKind::Element && self.expects_domain_node(change.node, change.parent) {
                return Err(ReconcileError::new(ReconcileReason::MissingDomainNode(
                    change.node,
                )));
            }
            return Ok(());
        };
        let identity = self.identity(node).unwrap_or_default();
        let current = self
            .nodes
            .get(node)
            .ok_or_else(|| ReconcileError::unsupported(format!("{node} is gone")))?;
        match &current.kind {
            NodeKind::Artifact(_) => Err(ReconcileError::new(
                ReconcileReason::UnexpectedNodeKind(node),
            )),
            NodeKind::Element(_) => {
                self.retire(node, work);
                changes.push(ModelChange::delete(node, identity));
                Ok(())
            }
            NodeKind::ItemBinding(_) | NodeKind::DefaultableValue(_) => {
                let is_binding = matches!(current.kind, NodeKind::ItemBinding(_));
                let attribute = current.kind.attribute().map(SmolStr::new).unwrap_or_default();
                let owner = current.parent;
                self.unhost(node)
                    .map_err(|err| ReconcileError::unsupported(err.to_string()))?;
                if is_binding {
                    work.rebind.insert(node);
                } else if let Some(owner) = owner {
                    work.containers.insert(owner);
                }
                changes.push(ModelChange::update(
                    node,
                    identity,
                    attribute,
                    change.old_value.clone(),
                    None,
                ));
                Ok(())
            }
        }
    }

    fn reconcile_add(
        &mut self,
        change: &ChangeRecord,
        kind: XNodeKind,
        domain: Option<NodeId>,
        work: &mut Settle,
        changes: &mut Vec<ModelChange>,
    ) -> Result<(), ReconcileError> {
        let outcome = match (kind, domain) {
            // already parsed along with its parent earlier in this batch
            (XNodeKind::Element, Some(_)) => ParseOutcome::Ignored,
            (XNodeKind::Attribute, Some(slot)) => {
                self.rehost(slot, change.node)
                    .map_err(|err| ReconcileError::unsupported(err.to_string()))?;
                ParseOutcome::Rehosted(slot)
            }
            _ => {
                let parent = change
                    .parent
                    .or_else(|| self.provider.parent(change.node));
                let Some(owner) = parent.and_then(|parent| self.live_annotation(parent)) else {
                    let grandparent = parent.and_then(|parent| self.provider.parent(parent));
                    if let Some(parent) = parent.filter(|&p| self.expects_domain_node(p, grandparent)) {
                        return Err(ReconcileError::new(ReconcileReason::MissingParent(parent)));
                    }
                    return Ok(());
                };
                self.parse_single(owner, change.node)
                    .map_err(|err| ReconcileError::unsupported(err.to_string()))?
            }
        };

        match outcome {
            ParseOutcome::Fresh(node) => {
                work.containers.insert(node);
                let identity = self.identity(node).unwrap_or_default();
                changes.push(ModelChange::create(node, identity));
            }
            ParseOutcome::Rehosted(slot) => {
                let Some(current) = self.nodes.get(slot) else {
                    return Ok(());
                };
                let attribute = current.kind.attribute().map(SmolStr::new).unwrap_or_default();
                if matches!(current.kind, NodeKind::ItemBinding(_)) {
                    work.rebind.insert(slot);
                } else if let Some(owner) = current.parent {
                    work.containers.insert(owner);
                }
                let identity = self.identity(slot).unwrap_or_default();
                changes.push(ModelChange::update(
                    slot,
                    identity,
                    attribute,
                    change.old_value.clone(),
                    change.new_value.clone(),
                ));
            }
            ParseOutcome::Ignored => {}
        }
        Ok(())
    }

    /// Whether element `x` under markup `parent` should have a domain node:
    /// it is a schema element its domain parent (or that parent's ghost)
    /// accepts, or a known root element directly under a document.
    fn expects_domain_node(&self, x: XNodeId, parent: Option<XNodeId>) -> bool {
        let Some(element) = self.provider.tree().get(x) else {
            return false;
        };
        if element.kind() != XNodeKind::Element {
            return false;
        }
        let namespace = self.namespace_near(x, parent);
        if !self.schema.owns_namespace(namespace.as_deref()) {
            return false;
        }
        let tag = element.local_name();
        if self.schema.spec(tag).is_none() {
            return false;
        }
        let Some(parent) = parent else {
            return false;
        };
        if self
            .provider
            .tree()
            .get(parent)
            .is_some_and(|p| p.kind() == XNodeKind::Document)
        {
            return self.schema.is_root(tag);
        }
        let Some(owner) = self.live_annotation(parent) else {
            return false;
        };
        let accepts = |id: NodeId| self.element_spec(id).is_some_and(|spec| spec.allows_child(tag));
        accepts(owner) || self.ghost_child(owner).is_some_and(accepts)
    }

    /// Namespace of `x`, looked up through `parent` (where it lives or used
    /// to live) when `x` is detached.
    fn namespace_near(&self, x: XNodeId, parent: Option<XNodeId>) -> Option<SmolStr> {
        let tree = self.provider.tree();
        let node = tree.get(x)?;
        if node.parent().is_some() || node.kind() != XNodeKind::Element {
            return tree.namespace_of(x);
        }
        tree.resolve_prefix(node.prefix(), x)
            .or_else(|| tree.resolve_prefix(node.prefix(), parent?))
    }
}
