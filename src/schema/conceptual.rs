//! Built-in schema for conceptual models and their mappings.

use super::spec::{BindingSpec, ElementSpec, RefScope, ValueSpec};
use super::Schema;
use crate::base::constants::{
    ALIAS_ATTRIBUTE, CONCEPTUAL_NAMESPACE, MAPPING_NAMESPACE, NAMESPACE_ATTRIBUTE,
};

impl Schema {
    /// Entity types, associations and containers (`Schema` documents) plus
    /// the mappings that bind them to storage (`Mapping` documents).
    pub fn conceptual() -> Self {
        Schema::new()
            .namespace(CONCEPTUAL_NAMESPACE)
            .namespace(MAPPING_NAMESPACE)
            .root_tag("Schema")
            .root_tag("Mapping")
            .alias(ALIAS_ATTRIBUTE)
            // conceptual side
            .element(
                ElementSpec::new("Schema")
                    .root(NAMESPACE_ATTRIBUTE)
                    .value(ValueSpec::string(ALIAS_ATTRIBUTE, ""))
                    .children(["EntityType", "Association", "EntityContainer"]),
            )
            .element(
                ElementSpec::new("EntityType")
                    .scoped("Name")
                    .value(ValueSpec::boolean("Abstract", false))
                    .binding(BindingSpec::new("BaseType", "EntityType", RefScope::Namespace))
                    .children(["Key", "Property"]),
            )
            .element(ElementSpec::new("Key").children(["PropertyRef"]))
            .element(
                ElementSpec::new("PropertyRef")
                    .binding(BindingSpec::new("Name", "Property", RefScope::Parent)),
            )
            .element(
                ElementSpec::new("Property")
                    .scoped("Name")
                    .value(ValueSpec::string("Type", "String"))
                    .value(ValueSpec::boolean("Nullable", true))
                    .value(ValueSpec::integer("MaxLength", 0)),
            )
            .element(
                ElementSpec::new("Association")
                    .scoped("Name")
                    .children(["End"]),
            )
            .element(
                ElementSpec::new("End")
                    .value(ValueSpec::string("Role", ""))
                    .value(ValueSpec::string("Multiplicity", "1"))
                    .binding(BindingSpec::new("Type", "EntityType", RefScope::Namespace)),
            )
            .element(
                ElementSpec::new("EntityContainer")
                    .scoped("Name")
                    .children(["EntitySet"]),
            )
            .element(
                ElementSpec::new("EntitySet")
                    .scoped("Name")
                    .binding(BindingSpec::new("EntityType", "EntityType", RefScope::Namespace)),
            )
            // mapping side
            .element(ElementSpec::new("Mapping").children(["EntityContainerMapping"]))
            .element(
                ElementSpec::new("EntityContainerMapping")
                    .value(ValueSpec::string("StorageEntityContainer", ""))
                    .binding(BindingSpec::new(
                        "CdmEntityContainer",
                        "EntityContainer",
                        RefScope::Global,
                    ))
                    .children(["EntitySetMapping"]),
            )
            .element(
                ElementSpec::new("EntitySetMapping")
                    .binding(BindingSpec::new("Name", "EntitySet", RefScope::Global))
                    .children(["EntityTypeMapping"]),
            )
            .element(
                ElementSpec::new("EntityTypeMapping")
                    .binding(BindingSpec::new("TypeName", "EntityType", RefScope::Global))
                    .children(["MappingFragment"])
                    .ghost("MappingFragment", "StoreEntitySet"),
            )
            .element(
                ElementSpec::new("MappingFragment")
                    .value(ValueSpec::string("StoreEntitySet", ""))
                    .children(["ScalarProperty"]),
            )
            .element(
                ElementSpec::new("ScalarProperty")
                    .value(ValueSpec::string("Name", ""))
                    .value(ValueSpec::string("ColumnName", "")),
            )
    }
}
