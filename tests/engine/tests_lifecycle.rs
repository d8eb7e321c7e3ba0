//! Tests for artifact life-cycle: reload, close, rename and the shared
//! model manager.

use std::sync::Arc;
use std::thread;

use trellis::{
    ArtifactId, BindingStatus, DocumentSource, EngineError, EngineEvent, EngineOptions,
    InMemoryFactory, LoadRequest, ModelManager, NodeState, Schema, Symbol,
};

use crate::helpers::engine_helpers::*;
use crate::helpers::model_assertions::*;
use crate::helpers::model_fixtures::*;

// ============================================================================
// RELOAD
// ============================================================================

#[test]
fn test_reload_rebuilds_tree_and_rebinds_dependents() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let old_customer = element(engine, model.set, "Model.Customer");
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");

    engine.reload(model.conceptual).unwrap();

    let customer = element(engine, model.set, "Model.Customer");
    assert_ne!(customer, old_customer);
    assert!(engine.node(old_customer).is_none());
    assert_eq!(target(engine, etm, "TypeName"), Some(customer));
    assert_eq!(
        engine.drain_events(),
        vec![
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
    assert!(!artifact.is_reloading());
    assert!(artifact.is_designer_safe());
    assert_resolved(engine, model.conceptual);
    assert_resolved(engine, model.mapping);
    assert_consistent(engine);
}

#[test]
fn test_reload_keeps_diagnostics_current() {
    let (mut engine, artifact) = load_single("mem://broken.csdl", BROKEN_REFERENCES);
    let before = all_codes(&engine, artifact);
    engine.reload(artifact).unwrap();
    assert_eq!(all_codes(&engine, artifact), before);
    assert_consistent(&engine);
}

#[test]
fn test_reload_set_reloads_every_artifact() {
    let mut model = load_model();
    model.engine.reload_set(model.set).unwrap();

    for artifact in [model.conceptual, model.mapping] {
        assert_eq!(model.engine.artifact(artifact).unwrap().reload_count(), 1);
        assert_resolved(&model.engine, artifact);
    }
    assert_consistent(&model.engine);
}

// ============================================================================
// CLOSE
// ============================================================================

#[test]
fn test_closing_target_artifact_unbinds_references() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");
    let ecm = first_by_tag(engine, model.mapping, "EntityContainerMapping");

    engine.close_artifact(model.conceptual).unwrap();

    assert!(engine.artifact(model.conceptual).is_none());
    assert!(engine.artifact_by_uri(CONCEPTUAL_URI).is_none());
    assert!(engine.provider().document(CONCEPTUAL_URI).is_none());
    assert!(engine.find_symbol(model.set, "Model.Customer").is_none());
    assert_eq!(status(engine, etm, "TypeName"), BindingStatus::Unknown);
    assert_eq!(status(engine, ecm, "CdmEntityContainer"), BindingStatus::Unknown);
    assert_eq!(
        error_codes(engine, model.mapping),
        vec!["E0001", "E0001", "E0001"]
    );
    assert_eq!(
        engine.drain_events(),
        vec![EngineEvent::ArtifactClosed {
            artifact: model.conceptual
        }]
    );
    assert_consistent(engine);
}

#[test]
fn test_closing_last_artifact_drops_the_set() {
    let mut model = load_model();
    model.engine.close_artifact(model.mapping).unwrap();
    assert!(model.engine.artifact_set(model.set).is_some());
    assert_resolved(&model.engine, model.conceptual);

    model.engine.close_artifact(model.conceptual).unwrap();
    assert!(model.engine.artifact_set(model.set).is_none());
    assert_eq!(model.engine.artifacts().count(), 0);
    assert_consistent(&model.engine);
}

#[test]
fn test_close_refuses_artifact_under_edit() {
    let mut model = load_model();
    model
        .engine
        .begin_transaction(model.conceptual, "edit")
        .unwrap();
    assert!(matches!(
        model.engine.close_artifact(model.conceptual),
        Err(EngineError::TransactionAlreadyActive(_))
    ));
    model.engine.rollback_transaction().unwrap();
    model.engine.close_artifact(model.conceptual).unwrap();
}

#[test]
fn test_close_unknown_artifact_fails() {
    let mut model = load_model();
    model.engine.close_artifact(model.mapping).unwrap();
    assert!(matches!(
        model.engine.close_artifact(model.mapping),
        Err(EngineError::UnknownArtifact(_))
    ));
}

// ============================================================================
// DUPLICATES ACROSS ARTIFACTS
// ============================================================================

/// Load [`EXTRA_CUSTOMER`] next to the model, making `Model.Customer`
/// ambiguous for every reference to it.
fn load_extra(model: &mut LoadedModel) -> ArtifactId {
    let loaded = model
        .engine
        .load_documents(
            vec![DocumentSource::new(EXTRA_URI, EXTRA_CUSTOMER)],
            Some(model.set),
        )
        .unwrap();
    model.engine.drain_events();

    let etm = first_by_tag(&model.engine, model.mapping, "EntityTypeMapping");
    assert_eq!(status(&model.engine, etm, "TypeName"), BindingStatus::Duplicate);
    assert_eq!(all_codes(&model.engine, model.mapping), vec!["E0002"]);
    loaded[0]
}

fn assert_customer_is_unambiguous(model: &LoadedModel) {
    let engine = &model.engine;
    let owners = engine.lookup(model.set, &Symbol::from_dotted("Model.Customer"));
    assert_eq!(owners.len(), 1, "owners of Model.Customer: {owners:?}");
    let customer = owners[0];
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");
    let customers = element(engine, model.set, "Model.Container.Customers");
    let end = first_by_tag(engine, model.conceptual, "End");

    assert_eq!(status(engine, etm, "TypeName"), BindingStatus::Known);
    assert_eq!(target(engine, etm, "TypeName"), Some(customer));
    assert_eq!(status(engine, customers, "EntityType"), BindingStatus::Known);
    assert_eq!(status(engine, end, "Type"), BindingStatus::Known);
    assert!(all_codes(engine, model.mapping).is_empty());
    assert!(all_codes(engine, model.conceptual).is_empty());
    assert_consistent(engine);
}

#[test]
fn test_closing_a_duplicate_owner_rebinds_references() {
    let mut model = load_model();
    let extra = load_extra(&mut model);

    model.engine.close_artifact(extra).unwrap();

    assert_customer_is_unambiguous(&model);
}

#[test]
fn test_reload_dropping_a_duplicate_owner_rebinds_references() {
    let mut model = load_model();
    let extra = load_extra(&mut model);
    let duplicate = first_by_tag(&model.engine, extra, "EntityType");
    let x = host(&model.engine, duplicate);

    model
        .engine
        .apply_external_transaction(EXTRA_URI, "retag", |p| p.set_name(x, "ComplexType"))
        .unwrap();

    assert_eq!(model.engine.artifact(extra).unwrap().reload_count(), 1);
    assert_customer_is_unambiguous(&model);
}

#[test]
fn test_external_removal_of_a_duplicate_owner_rebinds_references() {
    let mut model = load_model();
    let extra = load_extra(&mut model);
    let duplicate = first_by_tag(&model.engine, extra, "EntityType");
    let x = host(&model.engine, duplicate);

    model
        .engine
        .apply_external_transaction(EXTRA_URI, "delete customer", |p| p.remove(x))
        .unwrap();

    assert_eq!(model.engine.artifact(extra).unwrap().reload_count(), 0);
    assert_customer_is_unambiguous(&model);
}

#[test]
fn test_undoing_a_duplicate_creation_rebinds_references() {
    let mut model = load_model();
    let extra = load_extra(&mut model);
    let engine = &mut model.engine;
    let orders = element(engine, model.set, "Model.Container.Orders");
    let schema = engine.root_element(extra).unwrap();
    let before = all_codes(engine, model.conceptual);

    engine.begin_transaction(extra, "add order").unwrap();
    engine
        .create_element(schema, "EntityType", &[("Name", "Order")])
        .unwrap();
    engine.commit_transaction().unwrap();
    assert_eq!(status(engine, orders, "EntityType"), BindingStatus::Duplicate);

    assert!(engine.undo(EXTRA_URI).unwrap());

    let order = element(engine, model.set, "Model.Order");
    assert_eq!(
        engine.lookup(model.set, &Symbol::from_dotted("Model.Order")),
        &[order]
    );
    assert_eq!(status(engine, orders, "EntityType"), BindingStatus::Known);
    assert_eq!(target(engine, orders, "EntityType"), Some(order));
    assert_eq!(engine.artifact(extra).unwrap().reload_count(), 0);
    assert_eq!(all_codes(engine, model.conceptual), before);
    assert_consistent(engine);
}

// ============================================================================
// RENAME
// ============================================================================

#[test]
fn test_rename_moves_uri_and_identities() {
    let mut model = load_model();
    let engine = &mut model.engine;
    let customer = element(engine, model.set, "Model.Customer");

    engine
        .rename_artifact(model.conceptual, "mem://renamed.csdl")
        .unwrap();

    assert_eq!(engine.artifact_by_uri("mem://renamed.csdl"), Some(model.conceptual));
    assert!(engine.artifact_by_uri(CONCEPTUAL_URI).is_none());
    assert_eq!(
        engine.identity(customer).unwrap(),
        "mem://renamed.csdl/Schema[0]/EntityType[0]"
    );
    assert_eq!(
        engine.to_xml_string(model.conceptual).unwrap(),
        CONCEPTUAL
    );
}

#[test]
fn test_rename_onto_open_document_fails() {
    let mut model = load_model();
    assert!(
        model
            .engine
            .rename_artifact(model.conceptual, MAPPING_URI)
            .is_err()
    );
    assert_eq!(
        model.engine.artifact(model.conceptual).unwrap().uri(),
        CONCEPTUAL_URI
    );
}

// ============================================================================
// MODEL MANAGER
// ============================================================================

fn shared_manager() -> Arc<ModelManager> {
    let factory = InMemoryFactory::new()
        .with(CONCEPTUAL_URI, CONCEPTUAL)
        .with(MAPPING_URI, MAPPING);
    let manager = ModelManager::with_factory(
        Schema::conceptual(),
        EngineOptions::default(),
        Box::new(factory),
    );
    manager
        .load(LoadRequest::new(CONCEPTUAL_URI).with(MAPPING_URI))
        .unwrap();
    Arc::new(manager)
}

#[test]
fn test_model_manager_serializes_writers() {
    let manager = shared_manager();
    let conceptual = manager.artifact_by_uri(CONCEPTUAL_URI).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.reload(conceptual))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let engine = manager.lock();
    assert_eq!(engine.artifact(conceptual).unwrap().reload_count(), 4);
    assert_resolved(&engine, conceptual);
    assert_consistent(&engine);
}

#[test]
fn test_model_manager_readers_see_a_settled_model() {
    let manager = shared_manager();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let engine = manager.lock();
                let mapping = engine.artifact_by_uri(MAPPING_URI).unwrap();
                let etm = first_by_tag(&engine, mapping, "EntityTypeMapping");
                status(&engine, etm, "TypeName")
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), BindingStatus::Known);
    }
}

#[test]
fn test_model_manager_reports_unknown_documents() {
    let manager = ModelManager::new(Schema::conceptual(), EngineOptions::default());
    assert!(manager.load(LoadRequest::new("mem://absent.csdl")).is_err());
    assert!(manager.artifact_by_uri("mem://absent.csdl").is_none());
}

// ============================================================================
// SERIALIZATION
// ============================================================================

#[cfg(feature = "serde")]
#[test]
fn test_change_group_serializes_to_json() {
    let mut model = load_model();
    let order = element(&model.engine, model.set, "Model.Order");
    model
        .engine
        .begin_transaction(model.conceptual, "delete order")
        .unwrap();
    model.engine.delete_node(order).unwrap();
    let group = model.engine.commit_transaction().unwrap();

    let json = serde_json::to_value(&group).unwrap();
    assert_eq!(json["name"], "delete order");
    assert_eq!(json["origin"], "Engine");
    assert_eq!(json["changes"][0]["kind"], "Delete");
    assert_eq!(
        json["changes"][0]["identity"],
        "mem://model.csdl/Schema[0]/EntityType[1]"
    );
}
