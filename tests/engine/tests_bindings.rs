//! Tests for reference binding: duplicates, determinism, dependency edges
//! and explicit rebind/unbind.

use rstest::rstest;
use trellis::{BindingStatus, DocumentSource, ErrorClass, NodeState};

use crate::helpers::engine_helpers::*;
use crate::helpers::model_assertions::*;
use crate::helpers::model_fixtures::*;

const DUPLICATES_URI: &str = "mem://dup.csdl";

// ============================================================================
// DUPLICATE SYMBOLS
// ============================================================================

#[test]
fn test_duplicate_symbol_binds_to_first_owner() {
    let (engine, artifact) = load_single(DUPLICATES_URI, DUPLICATE_TYPES);
    let types = elements_by_tag(&engine, artifact, "EntityType");
    let entity_set = first_by_tag(&engine, artifact, "EntitySet");

    let info = engine.binding(slot(&engine, entity_set, "EntityType")).unwrap();
    assert_eq!(info.status, BindingStatus::Duplicate);
    assert_eq!(info.target, Some(types[0]));
    assert_eq!(info.candidates, types);
    assert_eq!(all_codes(&engine, artifact), vec!["E0002", "E0004"]);
    assert_eq!(
        engine.state(entity_set),
        Some(NodeState::Resolved),
        "an ambiguous reference still counts as resolved"
    );
}

#[test]
fn test_duplicate_error_sits_on_later_owner() {
    let (engine, artifact) = load_single(DUPLICATES_URI, DUPLICATE_TYPES);
    let types = elements_by_tag(&engine, artifact, "EntityType");

    assert!(engine.node_diagnostics(types[0], ErrorClass::ALL).is_empty());
    let later = engine.node_diagnostics(types[1], ErrorClass::RESOLVE_ERROR);
    assert_eq!(later.len(), 1);
    assert!(later[0].has_code("E0004"));
}

#[rstest]
#[case::later_owner(1, 0)]
#[case::first_owner(0, 1)]
fn test_deleting_one_duplicate_leaves_a_known_binding(
    #[case] deleted: usize,
    #[case] survivor: usize,
) {
    let (mut engine, artifact) = load_single(DUPLICATES_URI, DUPLICATE_TYPES);
    let types = elements_by_tag(&engine, artifact, "EntityType");
    let entity_set = first_by_tag(&engine, artifact, "EntitySet");

    engine.begin_transaction(artifact, "delete duplicate").unwrap();
    engine.delete_node(types[deleted]).unwrap();
    engine.commit_transaction().unwrap();

    assert_eq!(status(&engine, entity_set, "EntityType"), BindingStatus::Known);
    assert_eq!(target(&engine, entity_set, "EntityType"), Some(types[survivor]));
    assert!(all_codes(&engine, artifact).is_empty());
    assert_consistent(&engine);
}

#[test]
fn test_renaming_a_duplicate_splits_the_symbol() {
    let (mut engine, artifact) = load_single(DUPLICATES_URI, DUPLICATE_TYPES);
    let set = engine.artifact(artifact).unwrap().set();
    let types = elements_by_tag(&engine, artifact, "EntityType");
    let entity_set = first_by_tag(&engine, artifact, "EntitySet");

    engine.begin_transaction(artifact, "rename").unwrap();
    engine
        .set_value(slot(&engine, types[1], "Name"), "Supplier")
        .unwrap();
    engine.commit_transaction().unwrap();

    assert_eq!(engine.find_symbol(set, "Dup.Supplier"), Some(types[1]));
    assert_eq!(engine.lookup(set, &trellis::Symbol::from_dotted("Dup.Customer")), &[types[0]]);
    assert_eq!(status(&engine, entity_set, "EntityType"), BindingStatus::Known);
    assert!(all_codes(&engine, artifact).is_empty());
}

#[test]
fn test_refreshing_the_first_owner_keeps_it_canonical() {
    let (mut engine, artifact) = load_single(DUPLICATES_URI, DUPLICATE_TYPES);
    let set = engine.artifact(artifact).unwrap().set();
    let types = elements_by_tag(&engine, artifact, "EntityType");
    let entity_set = first_by_tag(&engine, artifact, "EntitySet");

    engine.refresh(types[0]).unwrap();

    assert_eq!(
        engine.lookup(set, &trellis::Symbol::from_dotted("Dup.Customer")),
        types.as_slice()
    );
    assert_eq!(status(&engine, entity_set, "EntityType"), BindingStatus::Duplicate);
    assert_eq!(target(&engine, entity_set, "EntityType"), Some(types[0]));
    assert!(engine.node_diagnostics(types[0], ErrorClass::ALL).is_empty());
    assert!(engine.node_diagnostics(types[1], ErrorClass::RESOLVE_ERROR)[0].has_code("E0004"));
    assert_eq!(all_codes(&engine, artifact), vec!["E0002", "E0004"]);
    assert_consistent(&engine);
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[rstest]
fn test_binding_does_not_depend_on_load_order(#[values(false, true)] mapping_first: bool) {
    let mut sources = vec![
        DocumentSource::new(CONCEPTUAL_URI, CONCEPTUAL),
        DocumentSource::new(MAPPING_URI, MAPPING),
    ];
    if mapping_first {
        sources.reverse();
    }
    let mut engine = new_engine();
    engine.load_documents(sources, None).unwrap();
    let conceptual = engine.artifact_by_uri(CONCEPTUAL_URI).unwrap();
    let mapping = engine.artifact_by_uri(MAPPING_URI).unwrap();
    let set = engine.artifact(conceptual).unwrap().set();

    let etm = first_by_tag(&engine, mapping, "EntityTypeMapping");
    let target = target(&engine, etm, "TypeName").unwrap();
    assert_eq!(
        engine.identity(target).unwrap(),
        "mem://model.csdl/Schema[0]/EntityType[0]"
    );
    assert_eq!(target, element(&engine, set, "Model.Customer"));
    assert_resolved(&engine, conceptual);
    assert_resolved(&engine, mapping);
}

#[rstest]
#[case("Model.Customer", BindingStatus::Known)]
#[case("Self.Customer", BindingStatus::Known)]
#[case("Customer", BindingStatus::Known)]
#[case("Model.Missing", BindingStatus::Unknown)]
#[case("Model.Container", BindingStatus::Unknown)]
#[case("Model..Customer", BindingStatus::Undefined)]
#[case("", BindingStatus::Undefined)]
fn test_reference_text_decides_status(#[case] text: &str, #[case] expected: BindingStatus) {
    let mut model = load_model();
    let entity_set = element(&model.engine, model.set, "Model.Container.Customers");
    let reference = slot(&model.engine, entity_set, "EntityType");

    model
        .engine
        .begin_transaction(model.conceptual, "retarget")
        .unwrap();
    model.engine.set_reference(reference, text).unwrap();
    model.engine.commit_transaction().unwrap();

    assert_eq!(model.engine.binding(reference).unwrap().status, expected);
    assert_consistent(&model.engine);
}

// ============================================================================
// ANTI-DEPENDENCIES
// ============================================================================

#[test]
fn test_anti_dependencies_span_artifacts() {
    let model = load_model();
    let engine = &model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let entity_set = element(engine, model.set, "Model.Container.Customers");
    let end = first_by_tag(engine, model.conceptual, "End");
    let etm = first_by_tag(engine, model.mapping, "EntityTypeMapping");

    let mut direct = engine.anti_dependencies(customer);
    direct.sort();
    let mut expected = vec![
        slot(engine, entity_set, "EntityType"),
        slot(engine, end, "Type"),
        slot(engine, etm, "TypeName"),
    ];
    expected.sort();
    assert_eq!(direct, expected);
}

#[test]
fn test_anti_dependency_closure_follows_owners() {
    let model = load_model();
    let engine = &model.engine;
    let customer = element(engine, model.set, "Model.Customer");
    let esm = first_by_tag(engine, model.mapping, "EntitySetMapping");
    let esm_name = slot(engine, esm, "Name");

    let closure = engine.anti_dependencies_closure(customer);
    assert_eq!(closure.len(), 4);
    assert!(closure.contains(&esm_name));
    assert!(!engine.anti_dependencies(customer).contains(&esm_name));
    assert!(engine.anti_dependencies_closure(esm).is_empty());
}

// ============================================================================
// REBIND / UNBIND / REFRESH
// ============================================================================

#[test]
fn test_unbind_then_rebind() {
    let mut model = load_model();
    let customer = element(&model.engine, model.set, "Model.Customer");
    let etm = first_by_tag(&model.engine, model.mapping, "EntityTypeMapping");
    let type_name = slot(&model.engine, etm, "TypeName");

    model.engine.unbind(type_name).unwrap();
    assert_eq!(model.engine.binding(type_name).unwrap().status, BindingStatus::None);
    assert_eq!(model.engine.state(type_name), Some(NodeState::Normalized));
    assert_eq!(model.engine.state(etm), Some(NodeState::ResolveAttempted));
    assert!(!model.engine.anti_dependencies(customer).contains(&type_name));

    assert_eq!(model.engine.rebind(type_name).unwrap(), BindingStatus::Known);
    assert_eq!(model.engine.state(etm), Some(NodeState::Resolved));
    assert!(model.engine.anti_dependencies(customer).contains(&type_name));
    assert_consistent(&model.engine);
}

#[test]
fn test_unbind_rejects_values() {
    let mut model = load_model();
    let property = element(&model.engine, model.set, "Model.Customer.Id");
    let nullable = slot(&model.engine, property, "Nullable");
    assert!(model.engine.unbind(nullable).is_err());
    assert!(model.engine.rebind(nullable).is_err());
}

#[test]
fn test_refresh_element_keeps_model_stable() {
    let mut model = load_model();
    let customer = element(&model.engine, model.set, "Model.Customer");
    let etm = first_by_tag(&model.engine, model.mapping, "EntityTypeMapping");

    model.engine.refresh(customer).unwrap();

    assert_eq!(model.engine.find_symbol(model.set, "Model.Customer"), Some(customer));
    assert_eq!(target(&model.engine, etm, "TypeName"), Some(customer));
    assert_resolved(&model.engine, model.conceptual);
    assert_resolved(&model.engine, model.mapping);
    assert_consistent(&model.engine);
}

#[test]
fn test_normalize_and_resolve_is_idempotent() {
    let mut model = load_model();
    let report = model.engine.normalize_and_resolve(model.set).unwrap();
    assert!(report.converged);
    assert_eq!(report.unresolved, 0);
    assert_eq!(report.passes, 1);
    assert_resolved(&model.engine, model.conceptual);
}
