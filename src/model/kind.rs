//! The closed set of domain node kinds.

use smol_str::SmolStr;

use crate::base::ArtifactId;
use crate::schema::{BindingSpec, RefScope, Value, ValueSpec, ValueType};
use crate::semantic::{Binding, Symbol};

/// What a domain node is. Every operation dispatches on this with `match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of a node tree; has no parent.
    Artifact(ArtifactId),
    /// A schema element.
    Element(ElementData),
    /// A reference-valued attribute of its parent element.
    ItemBinding(BindingSlot),
    /// A typed, defaultable attribute of its parent element.
    DefaultableValue(ValueSlot),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: SmolStr,
}

/// State of one reference attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlot {
    pub attribute: SmolStr,
    /// Tag of acceptable targets.
    pub target: SmolStr,
    pub scope: RefScope,
    /// Raw attribute text; `None` when the attribute is absent.
    pub text: Option<SmolStr>,
    /// Normalized reference; `None` when absent or malformed.
    pub reference: Option<Symbol>,
    pub binding: Binding,
}

impl BindingSlot {
    pub fn new(spec: &BindingSpec, text: Option<SmolStr>) -> Self {
        Self {
            attribute: spec.attribute.clone(),
            target: spec.target.clone(),
            scope: spec.scope,
            text,
            reference: None,
            binding: Binding::none(),
        }
    }
}

/// State of one typed attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSlot {
    pub attribute: SmolStr,
    pub ty: ValueType,
    pub default: Value,
    pub value: Value,
    /// Whether the attribute is present in the markup.
    pub is_set: bool,
}

impl ValueSlot {
    pub fn new(spec: &ValueSpec) -> Self {
        Self {
            attribute: spec.attribute.clone(),
            ty: spec.ty,
            default: spec.default.clone(),
            value: spec.default.clone(),
            is_set: false,
        }
    }

    /// Text of a string value, empty for other types.
    pub fn text(&self) -> &str {
        self.value.as_str().unwrap_or_default()
    }
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Artifact(_) => "artifact",
            NodeKind::Element(_) => "element",
            NodeKind::ItemBinding(_) => "item binding",
            NodeKind::DefaultableValue(_) => "defaultable value",
        }
    }

    /// Element tag.
    pub fn tag(&self) -> Option<&str> {
        match self {
            NodeKind::Element(data) => Some(&data.tag),
            _ => None,
        }
    }

    /// Attribute backing an ItemBinding or DefaultableValue.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            NodeKind::ItemBinding(slot) => Some(&slot.attribute),
            NodeKind::DefaultableValue(slot) => Some(&slot.attribute),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element(_))
    }

    pub fn is_slot(&self) -> bool {
        matches!(self, NodeKind::ItemBinding(_) | NodeKind::DefaultableValue(_))
    }

    pub fn as_binding(&self) -> Option<&BindingSlot> {
        match self {
            NodeKind::ItemBinding(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn as_binding_mut(&mut self) -> Option<&mut BindingSlot> {
        match self {
            NodeKind::ItemBinding(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ValueSlot> {
        match self {
            NodeKind::DefaultableValue(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn as_value_mut(&mut self) -> Option<&mut ValueSlot> {
        match self {
            NodeKind::DefaultableValue(slot) => Some(slot),
            _ => None,
        }
    }
}
