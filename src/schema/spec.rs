//! Per-element handler descriptions.

use smol_str::SmolStr;

use super::value::{Value, ValueType};

/// How an element contributes a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRule {
    /// The element is not nameable.
    Unnamed,
    /// Named by this attribute, under the nearest named ancestor.
    Scoped(SmolStr),
    /// Named by this attribute, starting a new scope.
    Root(SmolStr),
}

impl NameRule {
    pub fn attribute(&self) -> Option<&str> {
        match self {
            NameRule::Unnamed => None,
            NameRule::Scoped(attr) | NameRule::Root(attr) => Some(attr),
        }
    }
}

/// Where the text of a reference is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefScope {
    /// Fully qualified dotted text.
    Global,
    /// Qualified by the enclosing root scope (or its alias) unless already so.
    Namespace,
    /// Appended to the nearest named ancestor of the owning element.
    Parent,
}

/// A typed, defaultable attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSpec {
    pub attribute: SmolStr,
    pub ty: ValueType,
    pub default: Value,
}

impl ValueSpec {
    pub fn string(attribute: &str, default: &str) -> Self {
        Self {
            attribute: SmolStr::new(attribute),
            ty: ValueType::String,
            default: Value::Str(SmolStr::new(default)),
        }
    }

    pub fn integer(attribute: &str, default: i64) -> Self {
        Self {
            attribute: SmolStr::new(attribute),
            ty: ValueType::Integer,
            default: Value::Int(default),
        }
    }

    pub fn boolean(attribute: &str, default: bool) -> Self {
        Self {
            attribute: SmolStr::new(attribute),
            ty: ValueType::Boolean,
            default: Value::Bool(default),
        }
    }
}

/// An attribute holding a reference to another element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub attribute: SmolStr,
    /// Tag of the elements this reference may resolve to.
    pub target: SmolStr,
    pub scope: RefScope,
}

impl BindingSpec {
    pub fn new(attribute: &str, target: &str, scope: RefScope) -> Self {
        Self {
            attribute: SmolStr::new(attribute),
            target: SmolStr::new(target),
            scope,
        }
    }
}

/// Schema shorthand: the presence of `trigger` on an element implies a
/// `child` element that shares the parent's markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostRule {
    pub child: SmolStr,
    pub trigger: SmolStr,
}

/// Everything the engine knows about one element tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: SmolStr,
    pub name: NameRule,
    pub values: Vec<ValueSpec>,
    pub bindings: Vec<BindingSpec>,
    pub children: Vec<SmolStr>,
    pub ghost: Option<GhostRule>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: SmolStr::new(tag),
            name: NameRule::Unnamed,
            values: Vec::new(),
            bindings: Vec::new(),
            children: Vec::new(),
            ghost: None,
        }
    }

    /// Named under the nearest named ancestor. The name attribute becomes a
    /// string value slot.
    pub fn scoped(mut self, attribute: &str) -> Self {
        self.name = NameRule::Scoped(SmolStr::new(attribute));
        self.values.insert(0, ValueSpec::string(attribute, ""));
        self
    }

    /// Starts a new naming scope.
    pub fn root(mut self, attribute: &str) -> Self {
        self.name = NameRule::Root(SmolStr::new(attribute));
        self.values.insert(0, ValueSpec::string(attribute, ""));
        self
    }

    pub fn value(mut self, value: ValueSpec) -> Self {
        self.values.push(value);
        self
    }

    pub fn binding(mut self, binding: BindingSpec) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn children<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.children.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn ghost(mut self, child: &str, trigger: &str) -> Self {
        self.ghost = Some(GhostRule {
            child: SmolStr::new(child),
            trigger: SmolStr::new(trigger),
        });
        self
    }

    pub fn allows_child(&self, tag: &str) -> bool {
        self.children.iter().any(|child| child == tag)
    }

    pub fn value_spec(&self, attribute: &str) -> Option<&ValueSpec> {
        self.values.iter().find(|v| v.attribute == attribute)
    }

    pub fn binding_spec(&self, attribute: &str) -> Option<&BindingSpec> {
        self.bindings.iter().find(|b| b.attribute == attribute)
    }
}
