//! Domain constants.

/// Namespace of conceptual model (CSDL) documents.
pub const CONCEPTUAL_NAMESPACE: &str = "http://schemas.microsoft.com/ado/2009/11/edm";

/// Namespace of mapping (MSL) documents.
pub const MAPPING_NAMESPACE: &str = "http://schemas.microsoft.com/ado/2009/11/mapping/cs";

/// Namespace of storage model (SSDL) documents.
pub const STORAGE_NAMESPACE: &str = "http://schemas.microsoft.com/ado/2009/11/edm/ssdl";

/// Attribute declaring the default namespace of an element.
pub const XMLNS: &str = "xmlns";

/// Prefix of attributes declaring a prefixed namespace (`xmlns:p="…"`).
pub const XMLNS_PREFIX: &str = "xmlns:";

/// Separator between symbol parts in their display form.
pub const SYMBOL_SEPARATOR: char = '.';

/// Attribute that names the scope of a conceptual schema.
pub const NAMESPACE_ATTRIBUTE: &str = "Namespace";

/// Attribute carrying a scope's short alias.
pub const ALIAS_ATTRIBUTE: &str = "Alias";
