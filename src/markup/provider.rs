//! In-memory markup provider.
//!
//! Owns every open document, the single active transaction and the per
//! document undo history. Finishing a transaction (commit, rollback, undo,
//! redo) returns the [`ProviderEvent`] a listener has to be notified with;
//! delivery is synchronous and left to the caller.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use text_size::TextSize;
use tracing::{debug, trace};
use uuid::Uuid;

use super::change::{ChangeKind, ChangeRecord};
use super::reader::read_document;
use super::transaction::{
    CompletedTransaction, EditCommand, OpenTransaction, ProviderEvent, TransactionStatus,
    UndoStack, UndoUnit,
};
use super::tree::{XNode, XNodeKind, XTree};
use super::writer::{ElementSpan, element_at, write_document};
use crate::base::{NodeId, XNodeId};
use crate::config::IndentStyle;
use crate::error::MarkupError;

/// Documents, annotations, transactions and undo/redo over one [`XTree`].
#[derive(Debug, Default)]
pub struct MarkupProvider {
    tree: XTree,
    documents: IndexMap<SmolStr, XNodeId>,
    active: Option<OpenTransaction>,
    history: FxHashMap<XNodeId, UndoStack>,
    next_serial: u64,
    indent: IndentStyle,
}

impl MarkupProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider that formats appended elements with `indent`.
    pub fn with_indent(indent: IndentStyle) -> Self {
        Self {
            indent,
            ..Self::default()
        }
    }

    // ========================================================================
    // DOCUMENTS
    // ========================================================================

    /// Parse `text` and register it under `uri`.
    pub fn open_document(&mut self, uri: &str, text: &str) -> Result<XNodeId, MarkupError> {
        if self.documents.contains_key(uri) {
            return Err(MarkupError::DocumentAlreadyOpen(SmolStr::new(uri)));
        }
        let document = read_document(&mut self.tree, uri, text)?;
        self.documents.insert(SmolStr::new(uri), document);
        debug!("[MARKUP] opened '{}' as {}", uri, document);
        Ok(document)
    }

    /// Forget a document and its undo history. Its nodes stay in the arena.
    pub fn close_document(&mut self, uri: &str) -> Result<(), MarkupError> {
        let document = self
            .documents
            .shift_remove(uri)
            .ok_or_else(|| MarkupError::UnknownDocument(SmolStr::new(uri)))?;
        if self.active.as_ref().is_some_and(|tx| tx.document == document) {
            self.active = None;
        }
        self.history.remove(&document);
        Ok(())
    }

    /// Register an open document under a new location.
    pub fn rename_document(&mut self, old: &str, new: &str) -> Result<(), MarkupError> {
        if self.documents.contains_key(new) {
            return Err(MarkupError::DocumentAlreadyOpen(SmolStr::new(new)));
        }
        let index = self
            .documents
            .get_index_of(old)
            .ok_or_else(|| MarkupError::UnknownDocument(SmolStr::new(old)))?;
        let document = self.documents[index];
        self.documents.shift_remove_index(index);
        self.documents.shift_insert(index, SmolStr::new(new), document);
        self.tree.node_mut(document)?.name = SmolStr::new(new);
        Ok(())
    }

    pub fn document(&self, uri: &str) -> Option<XNodeId> {
        self.documents.get(uri).copied()
    }

    pub fn documents(&self) -> impl Iterator<Item = (&SmolStr, XNodeId)> {
        self.documents.iter().map(|(uri, &doc)| (uri, doc))
    }

    /// Location of the document containing `node`.
    pub fn uri_of(&self, node: XNodeId) -> Option<SmolStr> {
        let document = self.tree.document_of(node)?;
        Some(self.tree.get(document)?.name.clone())
    }

    pub fn root_element(&self, document: XNodeId) -> Option<XNodeId> {
        self.tree.root_element(document)
    }

    // ========================================================================
    // NAVIGATION & ANNOTATIONS
    // ========================================================================

    pub fn tree(&self) -> &XTree {
        &self.tree
    }

    pub fn node(&self, id: XNodeId) -> Result<&XNode, MarkupError> {
        self.tree.node(id)
    }

    pub fn parent(&self, id: XNodeId) -> Option<XNodeId> {
        self.tree.get(id).and_then(|x| x.parent)
    }

    pub fn children(&self, id: XNodeId) -> &[XNodeId] {
        self.tree.get(id).map(|x| x.children()).unwrap_or_default()
    }

    pub fn elements(&self, id: XNodeId) -> impl Iterator<Item = XNodeId> + '_ {
        self.tree.elements(id)
    }

    pub fn attributes(&self, id: XNodeId) -> &[XNodeId] {
        self.tree.get(id).map(|x| x.attributes()).unwrap_or_default()
    }

    pub fn attribute(&self, element: XNodeId, name: &str) -> Option<XNodeId> {
        self.tree.attribute(element, name)
    }

    pub fn namespace_of(&self, node: XNodeId) -> Option<SmolStr> {
        self.tree.namespace_of(node)
    }

    pub fn annotation(&self, node: XNodeId) -> Option<NodeId> {
        self.tree.get(node).and_then(|x| x.annotation)
    }

    /// Annotations are not part of the undoable state.
    pub fn set_annotation(&mut self, node: XNodeId, annotation: Option<NodeId>) {
        if let Some(x) = self.tree.get_mut(node) {
            x.annotation = annotation;
        }
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    pub fn to_xml_string(&self, uri: &str) -> Result<String, MarkupError> {
        let document = self.require_document(uri)?;
        write_document(&self.tree, document).map(|(text, _)| text)
    }

    /// Byte spans of every element as the document would be written now.
    pub fn element_spans(&self, uri: &str) -> Result<Vec<ElementSpan>, MarkupError> {
        let document = self.require_document(uri)?;
        write_document(&self.tree, document).map(|(_, spans)| spans)
    }

    /// Innermost element at `offset` of the written document.
    pub fn find_element_at_offset(
        &self,
        uri: &str,
        offset: TextSize,
    ) -> Result<Option<XNodeId>, MarkupError> {
        let spans = self.element_spans(uri)?;
        Ok(element_at(&spans, offset))
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// Begin the single active transaction on document `uri`.
    pub fn begin_transaction(
        &mut self,
        uri: &str,
        name: &str,
        user_state: Option<Uuid>,
    ) -> Result<u64, MarkupError> {
        if let Some(active) = &self.active {
            return Err(MarkupError::transaction(format!(
                "transaction '{}' is still active",
                active.name
            )));
        }
        let document = self.require_document(uri)?;
        self.next_serial += 1;
        let serial = self.next_serial;
        trace!("[MARKUP] begin transaction #{} '{}' on '{}'", serial, name, uri);
        self.active = Some(OpenTransaction {
            serial,
            name: name.to_string(),
            document,
            user_state,
            commands: Vec::new(),
            changes: Vec::new(),
        });
        Ok(serial)
    }

    pub fn is_in_transaction(&self) -> bool {
        self.active.is_some()
    }

    /// User state of the active transaction.
    pub fn active_user_state(&self) -> Option<Uuid> {
        self.active.as_ref().and_then(|tx| tx.user_state)
    }

    /// Finish the active transaction and push it onto the undo stack.
    pub fn commit(&mut self) -> Result<ProviderEvent, MarkupError> {
        let tx = self
            .active
            .take()
            .ok_or_else(|| MarkupError::transaction("commit without an active transaction"))?;
        let uri = self.uri_of_document(tx.document)?;
        let stack = self.history.entry(tx.document).or_default();
        stack.redo.clear();
        if !tx.commands.is_empty() {
            stack.undo.push(UndoUnit {
                serial: tx.serial,
                name: tx.name.clone(),
                commands: tx.commands,
                changes: tx.changes.clone(),
            });
        }
        debug!(
            "[MARKUP] committed #{} '{}' ({} changes)",
            tx.serial,
            tx.name,
            tx.changes.len()
        );
        Ok(ProviderEvent::TransactionCompleted(CompletedTransaction {
            serial: tx.serial,
            name: tx.name,
            uri,
            document: tx.document,
            user_state: tx.user_state,
            status: TransactionStatus::Committed,
            changes: tx.changes,
        }))
    }

    /// Revert every edit of the active transaction.
    pub fn rollback(&mut self) -> Result<ProviderEvent, MarkupError> {
        let tx = self
            .active
            .take()
            .ok_or_else(|| MarkupError::transaction("rollback without an active transaction"))?;
        for command in tx.commands.iter().rev() {
            command.revert(&mut self.tree)?;
        }
        let uri = self.uri_of_document(tx.document)?;
        debug!("[MARKUP] rolled back #{} '{}'", tx.serial, tx.name);
        Ok(ProviderEvent::TransactionCompleted(CompletedTransaction {
            serial: tx.serial,
            name: tx.name,
            uri,
            document: tx.document,
            user_state: tx.user_state,
            status: TransactionStatus::Aborted,
            changes: tx.changes,
        }))
    }

    pub fn can_undo(&self, uri: &str) -> bool {
        self.stack(uri).is_some_and(|stack| !stack.undo.is_empty())
    }

    pub fn can_redo(&self, uri: &str) -> bool {
        self.stack(uri).is_some_and(|stack| !stack.redo.is_empty())
    }

    /// Undo the latest committed transaction on `uri`.
    ///
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self, uri: &str) -> Result<Option<ProviderEvent>, MarkupError> {
        self.ensure_idle()?;
        let document = self.require_document(uri)?;
        let Some(unit) = self
            .history
            .get_mut(&document)
            .and_then(|stack| stack.undo.pop())
        else {
            return Ok(None);
        };
        for command in unit.commands.iter().rev() {
            command.revert(&mut self.tree)?;
        }
        let changes = unit.changes.iter().rev().map(ChangeRecord::inverse).collect();
        let event = self.undo_redo_event(document, &unit, changes)?;
        self.history.entry(document).or_default().redo.push(unit);
        Ok(Some(event))
    }

    /// Redo the latest undone transaction on `uri`.
    pub fn redo(&mut self, uri: &str) -> Result<Option<ProviderEvent>, MarkupError> {
        self.ensure_idle()?;
        let document = self.require_document(uri)?;
        let Some(unit) = self
            .history
            .get_mut(&document)
            .and_then(|stack| stack.redo.pop())
        else {
            return Ok(None);
        };
        for command in &unit.commands {
            command.apply(&mut self.tree)?;
        }
        let event = self.undo_redo_event(document, &unit, unit.changes.clone())?;
        self.history.entry(document).or_default().undo.push(unit);
        Ok(Some(event))
    }

    // ========================================================================
    // EDITS (require an active transaction on the node's document)
    // ========================================================================

    /// Add a new element under `parent` (at `index` among its content, or last).
    pub fn add_element(
        &mut self,
        parent: XNodeId,
        name: &str,
        index: Option<usize>,
    ) -> Result<XNodeId, MarkupError> {
        self.ensure_editable(parent)?;
        self.expect_kind(parent, &[XNodeKind::Element, XNodeKind::Document])?;
        let element = self.tree.alloc(XNodeKind::Element, name, "");
        let index = index.unwrap_or_else(|| self.children(parent).len());
        self.insert(element, parent, index, None)?;
        Ok(element)
    }

    /// Append a new element after the last element child of `parent`,
    /// indented like its siblings.
    pub fn append_element_formatted(
        &mut self,
        parent: XNodeId,
        name: &str,
    ) -> Result<XNodeId, MarkupError> {
        self.ensure_editable(parent)?;
        self.expect_kind(parent, &[XNodeKind::Element])?;
        let depth = self.tree.depth(parent);
        let children = self.children(parent).to_vec();
        let last = children.iter().rposition(|&child| {
            self.tree
                .get(child)
                .is_some_and(|x| matches!(x.kind, XNodeKind::Element | XNodeKind::Comment))
        });

        match last {
            Some(position) => {
                let indent = position
                    .checked_sub(1)
                    .and_then(|before| self.tree.get(children[before]))
                    .filter(|x| x.is_whitespace())
                    .map(|x| x.value.clone())
                    .unwrap_or_else(|| format!("\n{}", self.indent.indent(depth + 1)));
                self.insert_text(parent, position + 1, &indent)?;
                self.add_element(parent, name, Some(position + 2))
            }
            None => {
                let indent = format!("\n{}", self.indent.indent(depth + 1));
                let has_closing = children
                    .last()
                    .and_then(|&child| self.tree.get(child))
                    .is_some_and(|x| x.is_whitespace());
                self.insert_text(parent, 0, &indent)?;
                let element = self.add_element(parent, name, Some(1))?;
                if !has_closing {
                    let closing = format!("\n{}", self.indent.indent(depth));
                    self.insert_text(parent, 2, &closing)?;
                }
                Ok(element)
            }
        }
    }

    /// Add an attribute to `element`. The name must not be in use.
    pub fn add_attribute(
        &mut self,
        element: XNodeId,
        name: &str,
        value: &str,
    ) -> Result<XNodeId, MarkupError> {
        self.ensure_editable(element)?;
        self.expect_kind(element, &[XNodeKind::Element])?;
        if self.tree.attribute(element, name).is_some() {
            return Err(MarkupError::invalid(
                "attribute",
                format!("'{name}' already exists"),
            ));
        }
        let attr = self.tree.alloc(XNodeKind::Attribute, name, value);
        let index = self.attributes(element).len();
        self.insert(attr, element, index, Some(value.to_string()))?;
        Ok(attr)
    }

    /// Insert a text node under `parent` at `index`.
    pub fn insert_text(
        &mut self,
        parent: XNodeId,
        index: usize,
        text: &str,
    ) -> Result<XNodeId, MarkupError> {
        self.ensure_editable(parent)?;
        self.expect_kind(parent, &[XNodeKind::Element])?;
        let node = self.tree.alloc(XNodeKind::Text, "", text);
        self.insert(node, parent, index, Some(text.to_string()))?;
        Ok(node)
    }

    /// Change the value of an attribute or text node.
    pub fn set_value(&mut self, node: XNodeId, value: &str) -> Result<(), MarkupError> {
        self.ensure_editable(node)?;
        self.expect_kind(node, &[XNodeKind::Attribute, XNodeKind::Text])?;
        let current = self.tree.node(node)?;
        let old = current.value.clone();
        let parent = current.parent;
        if old == value {
            return Ok(());
        }
        let command = EditCommand::SetValue {
            node,
            old: old.clone(),
            new: value.to_string(),
        };
        let change = ChangeRecord::new(ChangeKind::ValueChanged, node, parent)
            .with_values(Some(old), Some(value.to_string()));
        self.record(command, change)
    }

    /// Rename an element or attribute.
    pub fn set_name(&mut self, node: XNodeId, name: &str) -> Result<(), MarkupError> {
        self.ensure_editable(node)?;
        self.expect_kind(node, &[XNodeKind::Element, XNodeKind::Attribute])?;
        let current = self.tree.node(node)?;
        let old = current.name.clone();
        let parent = current.parent;
        let command = EditCommand::SetName {
            node,
            old: old.clone(),
            new: SmolStr::new(name),
        };
        let change = ChangeRecord::new(ChangeKind::NameChanged, node, parent)
            .with_values(Some(old.to_string()), Some(name.to_string()));
        self.record(command, change)
    }

    /// Detach a node (and its subtree) from the document.
    pub fn remove(&mut self, node: XNodeId) -> Result<(), MarkupError> {
        self.ensure_editable(node)?;
        let current = self.tree.node(node)?;
        if current.kind == XNodeKind::Document {
            return Err(MarkupError::invalid("document", "cannot be removed"));
        }
        let old = (current.kind == XNodeKind::Attribute).then(|| current.value.clone());
        let (parent, index) = self.tree.detach(node)?;
        let change = ChangeRecord::new(ChangeKind::Remove, node, Some(parent)).with_values(old, None);
        self.push(
            EditCommand::Detach {
                node,
                parent,
                index,
            },
            change,
        )
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    fn insert(
        &mut self,
        node: XNodeId,
        parent: XNodeId,
        index: usize,
        value: Option<String>,
    ) -> Result<(), MarkupError> {
        let command = EditCommand::Insert {
            node,
            parent,
            index,
        };
        let change = ChangeRecord::new(ChangeKind::Add, node, Some(parent)).with_values(None, value);
        self.record(command, change)
    }

    fn record(&mut self, command: EditCommand, change: ChangeRecord) -> Result<(), MarkupError> {
        command.apply(&mut self.tree)?;
        self.push(command, change)
    }

    fn push(&mut self, command: EditCommand, change: ChangeRecord) -> Result<(), MarkupError> {
        let tx = self
            .active
            .as_mut()
            .ok_or_else(|| MarkupError::transaction("edit outside of a transaction"))?;
        trace!("[MARKUP] #{} {:?} {}", tx.serial, change.kind, change.node);
        tx.commands.push(command);
        tx.changes.push(change);
        Ok(())
    }

    fn ensure_editable(&self, node: XNodeId) -> Result<(), MarkupError> {
        let tx = self
            .active
            .as_ref()
            .ok_or_else(|| MarkupError::transaction("edit outside of a transaction"))?;
        self.tree.node(node)?;
        if self.tree.document_of(node) != Some(tx.document) {
            return Err(MarkupError::transaction(format!(
                "{node} is not part of the transaction's document"
            )));
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), MarkupError> {
        match &self.active {
            Some(tx) => Err(MarkupError::transaction(format!(
                "transaction '{}' is still active",
                tx.name
            ))),
            None => Ok(()),
        }
    }

    fn expect_kind(&self, node: XNodeId, allowed: &[XNodeKind]) -> Result<(), MarkupError> {
        let kind = self.tree.node(node)?.kind;
        if allowed.contains(&kind) {
            Ok(())
        } else {
            Err(MarkupError::invalid(kind.as_str(), "operation not supported"))
        }
    }

    fn require_document(&self, uri: &str) -> Result<XNodeId, MarkupError> {
        self.document(uri)
            .ok_or_else(|| MarkupError::UnknownDocument(SmolStr::new(uri)))
    }

    fn uri_of_document(&self, document: XNodeId) -> Result<SmolStr, MarkupError> {
        Ok(self.tree.node(document)?.name.clone())
    }

    fn stack(&self, uri: &str) -> Option<&UndoStack> {
        self.history.get(&self.document(uri)?)
    }

    fn undo_redo_event(
        &self,
        document: XNodeId,
        unit: &UndoUnit,
        changes: Vec<ChangeRecord>,
    ) -> Result<ProviderEvent, MarkupError> {
        Ok(ProviderEvent::UndoRedoCompleted(CompletedTransaction {
            serial: unit.serial,
            name: unit.name.clone(),
            uri: self.uri_of_document(document)?,
            document,
            user_state: None,
            status: TransactionStatus::Committed,
            changes,
        }))
    }
}
