//! Tests for reconciling host-side edits, undo and redo with the model,
//! and the reload fallback when a change cannot be mapped.

use trellis::base::constants::CONCEPTUAL_NAMESPACE;
use trellis::{
    BindingStatus, ChangeOrigin, EngineEvent, ErrorClass, MarkupError, ModelChangeKind,
    NodeState, ReconcileReason, Value,
};

use crate::helpers::engine_helpers::*;
use crate::helpers::model_assertions::*;
use crate::helpers::model_fixtures::*;

// ============================================================================
// ELEMENT REMOVAL AND UNDO
// ============================================================================

#[test]
fn test_external_delete_unbinds_without_reload() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let customers = element(engine, model.set, "Model.Container.Customers");
    let end = first_by_tag(engine, model.conceptual, "End");
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");
    let esm = first_by_tag(engine, model.mapping, "EntitySetMapping");
    let x = host(engine, customer);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "delete customer", |p| p.remove(x))
        .unwrap();

    assert!(engine.node(customer).is_none());
    assert_eq!(status(engine, customers, "EntityType"), BindingStatus::Unknown);
    assert_eq!(status(engine, end, "Type"), BindingStatus::Unknown);
    assert_eq!(status(engine, etm, "TypeName"), BindingStatus::Unknown);
    assert_eq!(status(engine, esm, "Name"), BindingStatus::Known);
    assert_eq!(engine.state(etm), Some(NodeState::ResolveAttempted));
    assert_eq!(error_codes(engine, model.conceptual), vec!["E0001", "E0001"]);
    assert_eq!(error_codes(engine, model.mapping), vec!["E0001"]);

    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 0);
    assert_eq!(
        engine.drain_events(),
        vec![EngineEvent::ChangeGroupRecorded {
            artifact: model.conceptual,
            origin: ChangeOrigin::External,
            changes: 1,
        }]
    );
    let group = engine.history().last().unwrap();
    assert_eq!(group.count(ModelChangeKind::Delete), 1);
    assert_eq!(
        group.changes[0].identity,
        "mem://model.csdl/Schema[0]/EntityType[0]"
    );
    assert_consistent(engine);
}

#[test]
fn test_undo_of_external_delete_restores_bindings() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let old_customer = element(engine, model.set, "Model.Customer");
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");
    let x = host(engine, old_customer);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "delete customer", |p| p.remove(x))
        .unwrap();
    engine.drain_events();
    assert!(engine.undo(CONCEPTUAL_URI).unwrap());

    let customer = element(engine, model.set, "Model.Customer");
    assert_ne!(customer, old_customer, "node ids are never reused");
    assert_eq!(host(engine, customer), x);
    assert_eq!(target(engine, etm, "TypeName"), Some(customer));
    assert_eq!(
        target(engine, element(engine, model.set, "Model.Container.Customers"), "EntityType"),
        Some(customer)
    );
    let key_ref = elements_by_tag(engine, model.conceptual, "PropertyRef")[0];
    assert_eq!(
        target(engine, key_ref, "Name"),
        Some(element(engine, model.set, "Model.Customer.Id"))
    );

    assert!(error_codes(engine, model.conceptual).is_empty());
    assert!(error_codes(engine, model.mapping).is_empty());
    assert_eq!(engine.to_xml_string(model.conceptual).unwrap(), CONCEPTUAL);
    assert_eq!(
        engine.drain_events(),
        vec![EngineEvent::ChangeGroupRecorded {
            artifact: model.conceptual,
            origin: ChangeOrigin::UndoRedo,
            changes: 1,
        }]
    );
    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 0);
    assert_resolved(engine, model.conceptual);
    assert_resolved(engine, model.mapping);
    assert_consistent(engine);
}

#[test]
fn test_redo_deletes_again() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let order = element(engine, model.set, "Model.Order");
    let x = host(engine, order);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "delete order", |p| p.remove(x))
        .unwrap();
    engine.undo(CONCEPTUAL_URI).unwrap();
    assert!(engine.find_symbol(model.set, "Model.Order").is_some());
    engine.redo(CONCEPTUAL_URI).unwrap();

    assert!(engine.find_symbol(model.set, "Model.Order").is_none());
    let orders = element(engine, model.set, "Model.Container.Orders");
    assert_eq!(status(engine, orders, "EntityType"), BindingStatus::Unknown);
    assert_consistent(engine);
}

// ============================================================================
// ELEMENT ADDITION
// ============================================================================

#[test]
fn test_external_element_is_parsed_in_place() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let container = element(engine, model.set, "Model.Container");
    let container_x = host(engine, container);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "add set", |p| {
            let set = p.add_element(container_x, "EntitySet", Some(0))?;
            p.add_attribute(set, "Name", "Buyers")?;
            p.add_attribute(set, "EntityType", "Self.Customer")?;
            Ok(())
        })
        .unwrap();

    let buyers = element(engine, model.set, "Model.Container.Buyers");
    assert_eq!(
        target(engine, buyers, "EntityType"),
        Some(element(engine, model.set, "Model.Customer"))
    );
    let sets: Vec<_> = engine
        .children(container)
        .iter()
        .copied()
        .filter(|&child| engine.node(child).unwrap().kind().is_element())
        .collect();
    assert_eq!(sets[0], buyers, "domain order follows markup order");
    let group = engine.history().last().unwrap();
    assert_eq!(group.origin, ChangeOrigin::External);
    assert_eq!(group.count(ModelChangeKind::Create), 1);
    assert_consistent(engine);
}

#[test]
fn test_unknown_element_is_reported_not_fatal() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let x = host(engine, customer);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "widget", |p| {
            p.add_element(x, "Widget", None).map(|_| ())
        })
        .unwrap();

    let warnings = engine.node_diagnostics(customer, ErrorClass::PARSE_ERROR);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].has_code("E0102"));
    assert!(engine.designer_safe(model.conceptual));
    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 0);
}

#[test]
fn test_foreign_namespace_changes_are_skipped() {
    let (mut engine, artifact) = load_single("mem://mixed.csdl", FOREIGN_ELEMENTS);
    let schema = engine.root_element(artifact).unwrap();
    let x = host(&engine, schema);
    let before = engine.nodes().len();

    engine
        .apply_external_transaction("mem://mixed.csdl", "notes", |p| {
            p.add_element(x, "doc:Note", None)?;
            let existing = p.elements(x).next().expect("fixture has a note");
            p.remove(existing)
        })
        .unwrap();

    assert_eq!(engine.nodes().len(), before);
    assert!(engine.diagnostics(artifact, ErrorClass::ALL).is_empty());
    assert!(engine.history().last().unwrap().is_empty());
    assert_eq!(engine.artifact(artifact).unwrap().reload_count(), 0);
}

#[test]
fn test_whitespace_edits_are_ignored() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let schema = engine.root_element(model.conceptual).unwrap();
    let x = host(engine, schema);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "reformat", |p| {
            p.insert_text(x, 0, "\n\n").map(|_| ())
        })
        .unwrap();

    assert!(engine.history().last().unwrap().is_empty());
    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 0);
    assert_resolved(engine, model.conceptual);
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

#[test]
fn test_reference_attribute_change_rebinds() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customers = element(engine, model.set, "Model.Container.Customers");
    let reference = slot(engine, customers, "EntityType");
    let x = host(engine, reference);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "retarget", |p| p.set_value(x, "Model.Order"))
        .unwrap();

    assert_eq!(
        engine.binding(reference).unwrap().target,
        Some(element(engine, model.set, "Model.Order"))
    );
    let change = &engine.history().last().unwrap().changes[0];
    assert_eq!(change.kind, ModelChangeKind::Update);
    assert_eq!(change.property.as_deref(), Some("EntityType"));
    assert_eq!(change.old_value.as_deref(), Some("Model.Customer"));
    assert_eq!(change.new_value.as_deref(), Some("Model.Order"));
    assert_consistent(engine);
}

#[test]
fn test_name_attribute_change_moves_symbol() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");
    let x = host(engine, slot(engine, customer, "Name"));

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "rename", |p| p.set_value(x, "Client"))
        .unwrap();

    assert_eq!(engine.find_symbol(model.set, "Model.Client"), Some(customer));
    assert!(engine.find_symbol(model.set, "Model.Client.Id").is_some());
    assert_eq!(status(engine, etm, "TypeName"), BindingStatus::Unknown);

    engine.undo(CONCEPTUAL_URI).unwrap();
    assert_eq!(engine.find_symbol(model.set, "Model.Customer"), Some(customer));
    assert_eq!(target(engine, etm, "TypeName"), Some(customer));
    assert_consistent(engine);
}

#[test]
fn test_value_attribute_removal_restores_default() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let id = element(engine, model.set, "Model.Customer.Id");
    let nullable = slot(engine, id, "Nullable");
    let x = host(engine, nullable);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "drop nullable", |p| p.remove(x))
        .unwrap();
    assert_eq!(engine.value(id, "Nullable"), Some(&Value::Bool(true)));
    assert!(engine.node(nullable).unwrap().hosting().host().is_none());
    let change = &engine.history().last().unwrap().changes[0];
    assert_eq!(change.old_value.as_deref(), Some("false"));
    assert_eq!(change.new_value, None);

    engine.undo(CONCEPTUAL_URI).unwrap();
    assert_eq!(engine.value(id, "Nullable"), Some(&Value::Bool(false)));
    assert_eq!(host(engine, nullable), x);
    assert_consistent(engine);
}

#[test]
fn test_invalid_external_value_keeps_previous_value() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let name = element(engine, model.set, "Model.Customer.Name");
    let x = host(engine, slot(engine, name, "MaxLength"));

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "garbage", |p| p.set_value(x, "lots"))
        .unwrap();

    assert_eq!(engine.value(name, "MaxLength"), Some(&Value::Int(50)));
    assert_eq!(error_codes(engine, model.conceptual), vec!["E0103"]);
    assert!(!engine.designer_safe(model.conceptual));
    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 0);
}

// ============================================================================
// GHOSTS
// ============================================================================

#[test]
fn test_trigger_attribute_creates_ghost() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let esm = first_by_tag(engine, model.mapping, "EntitySetMapping");
    let esm_x = host(engine, esm);

    engine
        .apply_external_transaction(MAPPING_URI, "map orders", |p| {
            let etm = p.add_element(esm_x, "EntityTypeMapping", None)?;
            p.add_attribute(etm, "TypeName", "Model.Order")?;
            Ok(())
        })
        .unwrap();
    let etm = elements_by_tag(engine, model.mapping, "EntityTypeMapping")[1];
    assert_eq!(
        target(engine, etm, "TypeName"),
        Some(element(engine, model.set, "Model.Order"))
    );
    assert_eq!(elements_by_tag(engine, model.mapping, "MappingFragment").len(), 1);

    let etm_x = host(engine, etm);
    engine
        .apply_external_transaction(MAPPING_URI, "inline fragment", |p| {
            p.add_attribute(etm_x, "StoreEntitySet", "OrderTable").map(|_| ())
        })
        .unwrap();

    let fragments = elements_by_tag(engine, model.mapping, "MappingFragment");
    assert_eq!(fragments.len(), 2);
    let ghost = fragments[1];
    assert_eq!(engine.parent(ghost), Some(etm));
    assert!(engine.node(ghost).unwrap().hosting().is_ghost());
    assert_eq!(
        engine.value(ghost, "StoreEntitySet"),
        Some(&Value::Str("OrderTable".into()))
    );
    assert_consistent(engine);
}

#[test]
fn test_removing_trigger_attribute_keeps_ghost() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let ghost = first_by_tag(engine, model.mapping, "MappingFragment");
    let store = slot(engine, ghost, "StoreEntitySet");
    let x = host(engine, store);

    engine
        .apply_external_transaction(MAPPING_URI, "drop store set", |p| p.remove(x))
        .unwrap();

    assert!(engine.node(ghost).is_some());
    assert_eq!(engine.value(ghost, "StoreEntitySet"), Some(&Value::Str("".into())));
    assert_eq!(engine.children(ghost).len(), 3);

    engine.undo(MAPPING_URI).unwrap();
    assert_eq!(
        engine.value(ghost, "StoreEntitySet"),
        Some(&Value::Str("CustomerTable".into()))
    );
    assert_consistent(engine);
}

// ============================================================================
// RELOAD FALLBACK
// ============================================================================

#[test]
fn test_root_replacement_reloads() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");
    let old_root = engine.root_element(model.conceptual).unwrap();

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "replace root", |p| {
            let document = p.document(CONCEPTUAL_URI).expect("document is open");
            let root = p.root_element(document).expect("document has a root");
            p.remove(root)?;
            let fresh = p.add_element(document, "Schema", None)?;
            p.add_attribute(fresh, "xmlns", CONCEPTUAL_NAMESPACE)?;
            p.add_attribute(fresh, "Namespace", "Model")?;
            Ok(())
        })
        .unwrap();

    assert_eq!(
        engine.drain_events(),
        vec![
            EngineEvent::ReconciliationFailed {
                artifact: model.conceptual,
                reason: ReconcileReason::RootDocumentChange,
            },
            EngineEvent::ReloadStarted {
                artifact: model.conceptual,
                root_state: NodeState::None,
            },
            EngineEvent::ArtifactReloaded {
                artifact: model.conceptual,
                root_state: NodeState::Resolved,
            },
        ]
    );

    let artifact = engine.artifact(model.conceptual).unwrap();
    assert_eq!(artifact.reload_count(), 1);
    assert!(!artifact.requires_reload());
    assert!(!artifact.is_reloading());

    let root = engine.root_element(model.conceptual).unwrap();
    assert_ne!(root, old_root);
    assert!(engine.node(old_root).is_none());
    assert_eq!(engine.find_symbol(model.set, "Model"), Some(root));
    assert!(engine.find_symbol(model.set, "Model.Customer").is_none());
    assert_eq!(status(engine, etm, "TypeName"), BindingStatus::Unknown);
    assert_consistent(engine);
}

#[test]
fn test_element_rename_reloads() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let x = host(engine, customer);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "retag", |p| p.set_name(x, "ComplexType"))
        .unwrap();

    let events = engine.drain_events();
    assert!(matches!(
        events.first(),
        Some(EngineEvent::ReconciliationFailed {
            reason: ReconcileReason::UnsupportedChange(_),
            ..
        })
    ));
    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 1);
    assert!(engine.find_symbol(model.set, "Model.Customer").is_none());
    let schema = engine.root_element(model.conceptual).unwrap();
    assert!(engine
        .node_diagnostics(schema, ErrorClass::PARSE_ERROR)
        .iter()
        .any(|d| d.has_code("E0102")));
    assert_consistent(engine);
}

#[test]
fn test_missing_domain_node_reloads() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let x = host(engine, customer);
    engine.provider_mut().set_annotation(x, None);

    engine
        .apply_external_transaction(CONCEPTUAL_URI, "delete customer", |p| p.remove(x))
        .unwrap();

    assert!(matches!(
        engine.drain_events().first(),
        Some(EngineEvent::ReconciliationFailed {
            reason: ReconcileReason::MissingDomainNode(_),
            ..
        })
    ));
    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 1);
    assert!(engine.find_symbol(model.set, "Model.Customer").is_none());
    assert_consistent(engine);
}

#[test]
fn test_aborted_external_transaction_reloads() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let x = host(engine, customer);

    let result = engine.apply_external_transaction(CONCEPTUAL_URI, "cancelled", |p| {
        p.remove(x)?;
        Err(MarkupError::transaction("cancelled by host"))
    });

    assert!(result.is_err());
    assert_eq!(engine.to_xml_string(model.conceptual).unwrap(), CONCEPTUAL);
    assert_eq!(engine.artifact(model.conceptual).unwrap().reload_count(), 1);
    assert!(engine.find_symbol(model.set, "Model.Customer").is_some());
    assert!(!engine.provider().can_undo(CONCEPTUAL_URI));
    assert_resolved(engine, model.conceptual);
    assert_resolved(engine, model.mapping);
}
