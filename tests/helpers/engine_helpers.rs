//! Engine construction and lookup helpers.

use trellis::{
    ArtifactId, ArtifactSetId, BindingStatus, DocumentSource, Engine, EngineOptions, NodeId,
    Schema, XNodeId,
};

use crate::helpers::model_fixtures::{CONCEPTUAL, CONCEPTUAL_URI, MAPPING, MAPPING_URI};

/// Engine over the conceptual schema that checks integrity after every
/// reconciliation, in any build profile.
pub fn new_engine() -> Engine {
    let options = EngineOptions {
        verify_integrity_after_reconcile: true,
        ..EngineOptions::default()
    };
    Engine::new(Schema::conceptual(), options)
}

/// The conceptual model and its mapping, loaded into one set.
pub struct LoadedModel {
    pub engine: Engine,
    pub set: ArtifactSetId,
    pub conceptual: ArtifactId,
    pub mapping: ArtifactId,
}

pub fn load_model() -> LoadedModel {
    let mut engine = new_engine();
    let loaded = engine
        .load_documents(
            vec![
                DocumentSource::new(CONCEPTUAL_URI, CONCEPTUAL),
                DocumentSource::new(MAPPING_URI, MAPPING),
            ],
            None,
        )
        .expect("fixture model should load");
    let set = engine.artifact(loaded[0]).expect("artifact").set();
    engine.drain_events();
    LoadedModel {
        engine,
        set,
        conceptual: loaded[0],
        mapping: loaded[1],
    }
}

/// Load a single document into a fresh set.
pub fn load_single(uri: &str, text: &str) -> (Engine, ArtifactId) {
    let mut engine = new_engine();
    let loaded = engine
        .load_documents(vec![DocumentSource::new(uri, text)], None)
        .expect("document should load");
    engine.drain_events();
    (engine, loaded[0])
}

/// The element owning `name`, panicking when there is none.
pub fn element(engine: &Engine, set: ArtifactSetId, name: &str) -> NodeId {
    engine
        .find_symbol(set, name)
        .unwrap_or_else(|| panic!("no element owns '{name}'"))
}

/// The slot for `attribute` under `element`.
pub fn slot(engine: &Engine, element: NodeId, attribute: &str) -> NodeId {
    engine
        .slot(element, attribute)
        .unwrap_or_else(|| panic!("{element} has no slot '{attribute}'"))
}

pub fn status(engine: &Engine, element: NodeId, attribute: &str) -> BindingStatus {
    let slot = slot(engine, element, attribute);
    engine.binding(slot).expect("binding slot").status
}

pub fn target(engine: &Engine, element: NodeId, attribute: &str) -> Option<NodeId> {
    let slot = slot(engine, element, attribute);
    engine.binding(slot).expect("binding slot").target
}

/// Markup node hosting `node`.
pub fn host(engine: &Engine, node: NodeId) -> XNodeId {
    engine
        .node(node)
        .and_then(|n| n.hosting().host())
        .unwrap_or_else(|| panic!("{node} is not hosted"))
}

/// Every element of `artifact` with the given tag, in document order.
pub fn elements_by_tag(engine: &Engine, artifact: ArtifactId, tag: &str) -> Vec<NodeId> {
    let root = engine.artifact(artifact).expect("artifact").root();
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(node) = engine.node(id) else {
            continue;
        };
        if node.kind().tag() == Some(tag) {
            found.push(id);
        }
        stack.extend(node.children().iter().rev().copied());
    }
    found
}

/// First element of `artifact` with the given tag.
pub fn first_by_tag(engine: &Engine, artifact: ArtifactId, tag: &str) -> NodeId {
    elements_by_tag(engine, artifact, tag)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{tag}> in {artifact}"))
}
