//! Engine transactions and host-side transactions.
//!
//! Engine edits patch the markup first, then bring the model along
//! synchronously through [`Engine::settle`]. The provider transaction carries
//! the engine transaction id as user state, so its completion is not
//! reconciled a second time.

use smol_str::SmolStr;
use tracing::{debug, info};

use super::change::{ChangeGroup, ChangeOrigin, ModelChange};
use super::parse::ParseOutcome;
use super::settle::Settle;
use super::{Engine, EngineEvent};
use crate::base::{ArtifactId, ArtifactSetId, NodeId, TransactionId, XNodeId};
use crate::error::{EngineError, MarkupError};
use crate::markup::{MarkupProvider, ProviderEvent, prefix_of};
use crate::model::{Hosting, NodeKind};
use crate::semantic::ErrorClass;

#[derive(Debug)]
pub(crate) struct ActiveTransaction {
    pub(crate) id: TransactionId,
    pub(crate) artifact: ArtifactId,
    pub(crate) name: String,
    pub(crate) changes: Vec<ModelChange>,
}

impl Engine {
    /// Open the single engine transaction, on `artifact`'s document.
    pub fn begin_transaction(
        &mut self,
        artifact: ArtifactId,
        name: &str,
    ) -> Result<TransactionId, EngineError> {
        if let Some(active) = &self.active {
            return Err(EngineError::TransactionAlreadyActive(active.artifact));
        }
        let uri = self.require_artifact(artifact)?.uri.clone();
        let id = TransactionId::new();
        self.provider
            .begin_transaction(&uri, name, Some(id.as_uuid()))?;
        debug!("[EDIT] begin {} '{}' on {}", id, name, artifact);
        self.active = Some(ActiveTransaction {
            id,
            artifact,
            name: name.to_string(),
            changes: Vec::new(),
        });
        Ok(id)
    }

    pub fn is_in_transaction(&self) -> bool {
        self.active.is_some()
    }

    /// Append a `tag` element under `parent` with the given attributes.
    pub fn create_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<NodeId, EngineError> {
        let (_, set) = self.editing(parent)?;
        if !self.node_ref(parent)?.kind.is_element() {
            return Err(EngineError::wrong_kind(parent, "element"));
        }
        let allowed = self.schema.spec(tag).is_some()
            && self
                .element_spec(parent)
                .is_some_and(|spec| spec.allows_child(tag));
        if !allowed {
            return Err(EngineError::invalid_edit(format!(
                "'{tag}' is not allowed under {parent}"
            )));
        }
        let host = self.require_host(parent)?;
        let owner = self
            .live_annotation(host)
            .ok_or_else(|| EngineError::invalid_edit(format!("{parent} lost its markup")))?;
        let name = match prefix_of(self.provider.node(host)?.name()) {
            Some(prefix) => format!("{prefix}:{tag}"),
            None => tag.to_string(),
        };

        let x = self.provider.append_element_formatted(host, &name)?;
        for (attribute, value) in attributes {
            self.provider.add_attribute(x, attribute, value)?;
        }
        let node = match self.parse_single(owner, x)? {
            ParseOutcome::Fresh(node) => node,
            _ => {
                return Err(EngineError::invalid_edit(format!(
                    "'{tag}' could not be parsed under {parent}"
                )));
            }
        };
        self.settle(set, Settle::container(node))?;
        let identity = self.identity(node).unwrap_or_default();
        debug!("[EDIT] created {} {}", node, identity);
        self.record(ModelChange::create(node, identity));
        Ok(node)
    }

    /// Set a typed attribute, adding it to the markup when absent.
    pub fn set_value(&mut self, slot: NodeId, text: &str) -> Result<(), EngineError> {
        let (_, set) = self.editing(slot)?;
        let node = self.node_ref(slot)?;
        let value = node
            .kind
            .as_value()
            .ok_or_else(|| EngineError::wrong_kind(slot, "defaultable value"))?;
        if value.ty.convert(text).is_none() {
            return Err(EngineError::invalid_edit(format!(
                "'{text}' is not a valid {}",
                value.ty.as_str()
            )));
        }
        let attribute = value.attribute.clone();
        let old = value.is_set.then(|| value.value.to_string());
        let owner = node.parent.ok_or(EngineError::UnknownNode(slot))?;

        self.write_attribute(slot, owner, &attribute, text)?;
        self.settle(set, Settle::container(owner))?;
        let identity = self.identity(slot).unwrap_or_default();
        self.record(ModelChange::update(
            slot,
            identity,
            attribute,
            old,
            Some(text.to_string()),
        ));
        Ok(())
    }

    /// Point a reference attribute at new text, adding it when absent.
    pub fn set_reference(&mut self, slot: NodeId, text: &str) -> Result<(), EngineError> {
        let (_, set) = self.editing(slot)?;
        let node = self.node_ref(slot)?;
        let binding = node
            .kind
            .as_binding()
            .ok_or_else(|| EngineError::wrong_kind(slot, "item binding"))?;
        let attribute = binding.attribute.clone();
        let old = binding.text.as_ref().map(SmolStr::to_string);
        let owner = node.parent.ok_or(EngineError::UnknownNode(slot))?;

        self.write_attribute(slot, owner, &attribute, text)?;
        self.settle(set, Settle::rebind(slot))?;
        let identity = self.identity(slot).unwrap_or_default();
        self.record(ModelChange::update(
            slot,
            identity,
            attribute,
            old,
            Some(text.to_string()),
        ));
        Ok(())
    }

    /// Remove an element together with its markup.
    pub fn delete_node(&mut self, node: NodeId) -> Result<(), EngineError> {
        let (_, set) = self.editing(node)?;
        let current = self.node_ref(node)?;
        if !current.kind.is_element() {
            return Err(EngineError::wrong_kind(node, "element"));
        }
        let Hosting::Hosted(x) = current.hosting else {
            return Err(EngineError::invalid_edit(format!(
                "{node} shares its parent's markup and cannot be deleted on its own"
            )));
        };
        let is_root = current
            .parent
            .and_then(|parent| self.nodes.get(parent))
            .is_some_and(|parent| matches!(parent.kind, NodeKind::Artifact(_)));
        if is_root {
            return Err(EngineError::invalid_edit("the root element cannot be deleted"));
        }

        let identity = self.identity(node).unwrap_or_default();
        self.provider.remove(x)?;
        let mut work = Settle::default();
        self.retire(node, &mut work);
        self.settle(set, work)?;
        debug!("[EDIT] deleted {} {}", node, identity);
        self.record(ModelChange::delete(node, identity));
        Ok(())
    }

    /// Commit the engine transaction and record its change group.
    pub fn commit_transaction(&mut self) -> Result<ChangeGroup, EngineError> {
        let active = self.active.take().ok_or(EngineError::NoActiveTransaction)?;
        self.provider.commit()?;
        if let Some(artifact) = self.artifacts.get_mut(&active.artifact) {
            artifact.is_dirty = true;
            artifact.mark_validity_dirty(ErrorClass::ALL);
        }
        let group = ChangeGroup {
            transaction: Some(active.id),
            name: active.name,
            artifact: active.artifact,
            origin: ChangeOrigin::Engine,
            changes: active.changes,
        };
        info!(
            "[EDIT] committed {} ({} changes)",
            active.id,
            group.changes.len()
        );
        self.record_group(group.clone());
        Ok(group)
    }

    /// Abort the engine transaction. The markup is restored by the provider;
    /// the model is rebuilt from it.
    pub fn rollback_transaction(&mut self) -> Result<(), EngineError> {
        let active = self.active.take().ok_or(EngineError::NoActiveTransaction)?;
        self.provider.rollback()?;
        info!("[EDIT] rolled back {}", active.id);
        self.reload(active.artifact)
    }

    // ========================================================================
    // HOST-SIDE TRANSACTIONS
    // ========================================================================

    /// Run `edit` as a host transaction (no engine user state) on `uri` and
    /// deliver its completion. A failing edit is rolled back and delivered as
    /// aborted.
    pub fn apply_external_transaction<F>(
        &mut self,
        uri: &str,
        name: &str,
        edit: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&mut MarkupProvider) -> Result<(), MarkupError>,
    {
        if let Some(active) = &self.active {
            return Err(EngineError::TransactionAlreadyActive(active.artifact));
        }
        self.provider.begin_transaction(uri, name, None)?;
        let outcome = edit(&mut self.provider);
        let event = match &outcome {
            Ok(()) => self.provider.commit()?,
            Err(_) => self.provider.rollback()?,
        };
        self.handle_provider_event(&event)?;
        outcome.map_err(EngineError::from)
    }

    /// Undo the latest transaction on `uri`. Returns `false` when there was
    /// nothing to undo.
    pub fn undo(&mut self, uri: &str) -> Result<bool, EngineError> {
        let event = self.provider.undo(uri)?;
        self.deliver(event)
    }

    pub fn redo(&mut self, uri: &str) -> Result<bool, EngineError> {
        let event = self.provider.redo(uri)?;
        self.deliver(event)
    }

    fn deliver(&mut self, event: Option<ProviderEvent>) -> Result<bool, EngineError> {
        match event {
            Some(event) => {
                self.handle_provider_event(&event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Artifact and set of `node`, checked against the active transaction.
    fn editing(&self, node: NodeId) -> Result<(ArtifactId, ArtifactSetId), EngineError> {
        let active = self.active.as_ref().ok_or(EngineError::NoActiveTransaction)?;
        let artifact = self
            .owning_artifact(node)
            .ok_or(EngineError::UnknownNode(node))?;
        if artifact != active.artifact {
            return Err(EngineError::invalid_edit(format!(
                "{node} is not part of {}",
                active.artifact
            )));
        }
        Ok((artifact, self.require_artifact(artifact)?.set))
    }

    fn require_host(&self, node: NodeId) -> Result<XNodeId, EngineError> {
        self.host_of(node)
            .ok_or_else(|| EngineError::invalid_edit(format!("{node} has no markup")))
    }

    /// Write `text` into the attribute backing `slot`, creating it on the
    /// owner's markup when the slot is detached.
    fn write_attribute(
        &mut self,
        slot: NodeId,
        owner: NodeId,
        attribute: &str,
        text: &str,
    ) -> Result<(), EngineError> {
        match self.node_ref(slot)?.hosting {
            Hosting::Hosted(x) => {
                self.provider.set_value(x, text)?;
                self.rehost(slot, x)
            }
            Hosting::Ghost | Hosting::Detached => {
                let host = self.require_host(owner)?;
                let x = self.provider.add_attribute(host, attribute, text)?;
                self.rehost(slot, x)
            }
        }
    }

    /// Queue everything that depends on `node`'s subtree, then dispose it.
    pub(crate) fn retire(&mut self, node: NodeId, work: &mut Settle) {
        work.rebind.extend(self.external_dependents(node));
        work.touched.extend(self.symbols_under(node));
        self.dispose(node);
    }

    fn record(&mut self, change: ModelChange) {
        if let Some(active) = self.active.as_mut() {
            active.changes.push(change);
        }
    }

    pub(crate) fn record_group(&mut self, group: ChangeGroup) {
        self.refresh_designer_safe(group.artifact);
        self.emit(EngineEvent::ChangeGroupRecorded {
            artifact: group.artifact,
            origin: group.origin,
            changes: group.changes.len(),
        });
        self.history.push(group);
        let overflow = self.history.len().saturating_sub(self.options.max_history);
        if overflow > 0 {
            self.history.drain(..overflow);
        }
    }
}
