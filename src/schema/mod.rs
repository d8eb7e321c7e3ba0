//! Element handler table.
//!
//! Node shapes are fixed: each element tag the engine understands has one
//! [`ElementSpec`] saying how it is named, which attributes are typed values,
//! which attributes are references and which child tags it accepts. The parse,
//! normalize and resolve passes are driven entirely by this table.

mod conceptual;
mod spec;
mod value;

use indexmap::IndexMap;
use smol_str::SmolStr;

pub use spec::{BindingSpec, ElementSpec, GhostRule, NameRule, RefScope, ValueSpec};
pub use value::{Value, ValueType};

/// The set of element handlers, root tags and namespaces of a document family.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    namespaces: Vec<SmolStr>,
    roots: Vec<SmolStr>,
    alias_attribute: Option<SmolStr>,
    elements: IndexMap<SmolStr, ElementSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept elements from `namespace`.
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespaces.push(SmolStr::new(namespace));
        self
    }

    /// Accept `tag` as a document's root element.
    pub fn root_tag(mut self, tag: &str) -> Self {
        self.roots.push(SmolStr::new(tag));
        self
    }

    /// Value slot of root elements that holds the scope's short alias.
    pub fn alias(mut self, attribute: &str) -> Self {
        self.alias_attribute = Some(SmolStr::new(attribute));
        self
    }

    pub fn element(mut self, spec: ElementSpec) -> Self {
        self.elements.insert(spec.tag.clone(), spec);
        self
    }

    pub fn spec(&self, tag: &str) -> Option<&ElementSpec> {
        self.elements.get(tag)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ElementSpec> {
        self.elements.values()
    }

    pub fn is_root(&self, tag: &str) -> bool {
        self.roots.iter().any(|root| root == tag)
    }

    pub fn alias_attribute(&self) -> Option<&str> {
        self.alias_attribute.as_deref()
    }

    pub fn namespaces(&self) -> &[SmolStr] {
        &self.namespaces
    }

    /// Whether markup in `namespace` belongs to this schema. Markup without a
    /// namespace always does.
    pub fn owns_namespace(&self, namespace: Option<&str>) -> bool {
        match namespace {
            None => true,
            Some(ns) => self.namespaces.iter().any(|own| own == ns),
        }
    }
}
