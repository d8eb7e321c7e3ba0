//! Tests for the markup provider on its own: documents, transactions,
//! undo/redo history and formatting preservation.

use rstest::rstest;
use trellis::markup::{ChangeKind, TransactionStatus, XNodeKind};
use trellis::{IndentStyle, MarkupError, MarkupProvider, TextSize, XNodeId};

use crate::helpers::model_fixtures::*;

const URI: &str = "mem://small.csdl";
const SMALL: &str = "<Schema Namespace=\"M\">\n  <EntityType Name=\"A\" Abstract=\"false\"/>\n</Schema>";

fn open(text: &str) -> (MarkupProvider, XNodeId) {
    let mut provider = MarkupProvider::new();
    let document = provider.open_document(URI, text).unwrap();
    let root = provider.root_element(document).unwrap();
    (provider, root)
}

// ============================================================================
// DOCUMENTS
// ============================================================================

#[rstest]
#[case::conceptual(CONCEPTUAL)]
#[case::mapping(MAPPING)]
#[case::duplicates(DUPLICATE_TYPES)]
#[case::broken(BROKEN_REFERENCES)]
#[case::bad_values(BAD_VALUES)]
#[case::unknown_root(UNKNOWN_ROOT)]
#[case::foreign(FOREIGN_ELEMENTS)]
fn test_documents_round_trip(#[case] text: &str) {
    let (provider, _) = open(text);
    assert_eq!(provider.to_xml_string(URI).unwrap(), text);
}

#[test]
fn test_open_twice_is_rejected() {
    let (mut provider, _) = open(SMALL);
    assert!(matches!(
        provider.open_document(URI, SMALL),
        Err(MarkupError::DocumentAlreadyOpen(_))
    ));
}

#[test]
fn test_close_forgets_document_and_history() {
    let (mut provider, root) = open(SMALL);
    provider.begin_transaction(URI, "alias", None).unwrap();
    provider.add_attribute(root, "Alias", "Self").unwrap();
    provider.commit().unwrap();
    assert!(provider.can_undo(URI));

    provider.close_document(URI).unwrap();
    assert!(provider.document(URI).is_none());
    assert!(!provider.can_undo(URI));
    assert!(matches!(
        provider.close_document(URI),
        Err(MarkupError::UnknownDocument(_))
    ));

    provider.open_document(URI, SMALL).unwrap();
    assert!(!provider.can_undo(URI));
}

#[test]
fn test_malformed_text_is_an_xml_error() {
    let mut provider = MarkupProvider::new();
    assert!(matches!(
        provider.open_document(URI, "<Schema><EntityType></Schema>"),
        Err(MarkupError::Xml(_))
    ));
    assert!(provider.document(URI).is_none());
}

#[test]
fn test_namespaces_follow_prefixes() {
    let (provider, root) = open(FOREIGN_ELEMENTS);
    let mut elements = provider.elements(root);
    let note = elements.next().unwrap();
    let entity = elements.next().unwrap();

    assert_eq!(provider.namespace_of(note).as_deref(), Some("urn:example:docs"));
    assert_eq!(
        provider.namespace_of(entity).as_deref(),
        Some("http://schemas.microsoft.com/ado/2009/11/edm")
    );
    let text = provider.attribute(note, "Text").unwrap();
    assert_eq!(provider.namespace_of(text), None);
    assert_eq!(provider.node(note).unwrap().local_name(), "Note");
}

#[test]
fn test_offsets_map_to_innermost_element() {
    let (provider, root) = open(SMALL);
    let entity = provider.elements(root).next().unwrap();
    let offset = SMALL.find("Abstract").unwrap() as u32;

    assert_eq!(
        provider.find_element_at_offset(URI, TextSize::from(offset)).unwrap(),
        Some(entity)
    );
    assert_eq!(
        provider.find_element_at_offset(URI, TextSize::from(0)).unwrap(),
        Some(root)
    );
    assert_eq!(
        provider
            .find_element_at_offset(URI, TextSize::from(SMALL.len() as u32))
            .unwrap(),
        None
    );
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

#[test]
fn test_edits_stay_inside_the_transaction_document() {
    let (mut provider, _) = open(SMALL);
    let other = provider.open_document("mem://other.csdl", SMALL).unwrap();
    let other_root = provider.root_element(other).unwrap();

    provider.begin_transaction(URI, "edit", None).unwrap();
    assert!(matches!(
        provider.add_attribute(other_root, "Alias", "Self"),
        Err(MarkupError::Transaction(_))
    ));
    assert!(provider.undo(URI).is_err());
    provider.commit().unwrap();
}

#[test]
fn test_invalid_operations_are_rejected() {
    let (mut provider, root) = open(SMALL);
    let document = provider.document(URI).unwrap();
    provider.begin_transaction(URI, "edit", None).unwrap();

    assert!(matches!(
        provider.remove(document),
        Err(MarkupError::InvalidOperation { .. })
    ));
    assert!(provider.add_attribute(root, "Namespace", "N").is_err());
    let namespace = provider.attribute(root, "Namespace").unwrap();
    assert!(provider.add_element(namespace, "Key", None).is_err());
    assert!(provider.set_value(root, "text").is_err());

    let event = provider.commit().unwrap();
    assert!(event.transaction().changes.is_empty());
    assert!(!provider.can_undo(URI), "an empty commit leaves no undo unit");
}

#[test]
fn test_change_records_describe_each_edit() {
    let (mut provider, root) = open(SMALL);
    let entity = provider.elements(root).next().unwrap();
    let abstract_attr = provider.attribute(entity, "Abstract").unwrap();

    provider.begin_transaction(URI, "edit", None).unwrap();
    provider.set_value(abstract_attr, "true").unwrap();
    provider.set_value(abstract_attr, "true").unwrap();
    provider.set_name(entity, "ComplexType").unwrap();
    provider.remove(abstract_attr).unwrap();
    let event = provider.commit().unwrap();

    let changes = &event.transaction().changes;
    let kinds: Vec<_> = changes.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::ValueChanged, ChangeKind::NameChanged, ChangeKind::Remove]
    );
    assert_eq!(changes[0].old_value.as_deref(), Some("false"));
    assert_eq!(changes[0].new_value.as_deref(), Some("true"));
    assert_eq!(changes[1].new_value.as_deref(), Some("ComplexType"));
    assert_eq!(changes[2].parent, Some(entity));
    assert_eq!(changes[2].old_value.as_deref(), Some("true"));
    assert_eq!(event.transaction().status, TransactionStatus::Committed);
    assert_eq!(
        provider.to_xml_string(URI).unwrap(),
        "<Schema Namespace=\"M\">\n  <ComplexType Name=\"A\"/>\n</Schema>"
    );
}

// ============================================================================
// UNDO / REDO
// ============================================================================

#[test]
fn test_undo_restores_attribute_position() {
    let (mut provider, root) = open(SMALL);
    let entity = provider.elements(root).next().unwrap();
    let name = provider.attribute(entity, "Name").unwrap();

    provider.begin_transaction(URI, "drop name", None).unwrap();
    provider.remove(name).unwrap();
    provider.commit().unwrap();
    assert_eq!(
        provider.to_xml_string(URI).unwrap(),
        "<Schema Namespace=\"M\">\n  <EntityType Abstract=\"false\"/>\n</Schema>"
    );

    let event = provider.undo(URI).unwrap().unwrap();
    let change = &event.transaction().changes[0];
    assert_eq!(change.kind, ChangeKind::Add);
    assert_eq!(change.new_value.as_deref(), Some("A"));
    assert_eq!(provider.to_xml_string(URI).unwrap(), SMALL);
    assert!(provider.can_redo(URI));
}

#[test]
fn test_undo_lists_inverse_changes_in_reverse_order() {
    let (mut provider, root) = open(SMALL);
    provider.begin_transaction(URI, "add", None).unwrap();
    let added = provider.append_element_formatted(root, "EntityType").unwrap();
    provider.add_attribute(added, "Name", "B").unwrap();
    provider.commit().unwrap();

    let event = provider.undo(URI).unwrap().unwrap();
    let tx = event.transaction();
    assert_eq!(tx.name, "add");
    let removed: Vec<_> = tx
        .changes
        .iter()
        .filter(|c| c.kind == ChangeKind::Remove)
        .map(|c| provider.node(c.node).unwrap().kind())
        .collect();
    assert_eq!(
        removed,
        vec![XNodeKind::Attribute, XNodeKind::Element, XNodeKind::Text]
    );
    assert_eq!(provider.to_xml_string(URI).unwrap(), SMALL);
}

#[test]
fn test_new_commit_clears_redo() {
    let (mut provider, root) = open(SMALL);
    for alias in ["One", "Two"] {
        provider.begin_transaction(URI, alias, None).unwrap();
        match provider.attribute(root, "Alias") {
            Some(attr) => provider.set_value(attr, alias).unwrap(),
            None => {
                provider.add_attribute(root, "Alias", alias).unwrap();
            }
        }
        provider.commit().unwrap();
    }
    provider.undo(URI).unwrap();
    assert!(provider.can_redo(URI));

    provider.begin_transaction(URI, "Three", None).unwrap();
    let attr = provider.attribute(root, "Alias").unwrap();
    provider.set_value(attr, "Three").unwrap();
    provider.commit().unwrap();

    assert!(!provider.can_redo(URI));
    assert!(provider.redo(URI).unwrap().is_none());
    provider.undo(URI).unwrap();
    assert_eq!(
        provider.node(attr).unwrap().value(),
        "One",
        "undo goes back past the discarded redo"
    );
}

#[test]
fn test_nothing_to_undo() {
    let (mut provider, _) = open(SMALL);
    assert!(provider.undo(URI).unwrap().is_none());
    assert!(provider.undo("mem://absent.csdl").is_err());
}

// ============================================================================
// FORMATTING
// ============================================================================

#[test]
fn test_tab_indentation_for_empty_parents() {
    let text = "<Schema Namespace=\"M\">\n\t<EntityType Name=\"A\"/>\n</Schema>";
    let mut provider = MarkupProvider::with_indent(IndentStyle {
        tab_size: 4,
        insert_spaces: false,
    });
    let document = provider.open_document(URI, text).unwrap();
    let root = provider.root_element(document).unwrap();
    let entity = provider.elements(root).next().unwrap();

    provider.begin_transaction(URI, "key", None).unwrap();
    provider.append_element_formatted(entity, "Key").unwrap();
    provider.append_element_formatted(root, "EntityType").unwrap();
    provider.commit().unwrap();

    assert_eq!(
        provider.to_xml_string(URI).unwrap(),
        "<Schema Namespace=\"M\">\n\t<EntityType Name=\"A\">\n\t\t<Key/>\n\t</EntityType>\n\t<EntityType/>\n</Schema>"
    );
}

#[test]
fn test_comments_and_declaration_survive_edits() {
    let text = "<?xml version=\"1.0\"?>\n<Schema Namespace=\"M\">\n  <!-- types -->\n  <EntityType Name=\"A\"/>\n</Schema>";
    let mut provider = MarkupProvider::new();
    let document = provider.open_document(URI, text).unwrap();
    let root = provider.root_element(document).unwrap();
    let entity = provider.elements(root).next().unwrap();

    provider.begin_transaction(URI, "remove", None).unwrap();
    provider.remove(entity).unwrap();
    provider.commit().unwrap();

    assert_eq!(
        provider.to_xml_string(URI).unwrap(),
        "<?xml version=\"1.0\"?>\n<Schema Namespace=\"M\">\n  <!-- types -->\n  \n</Schema>"
    );
}
