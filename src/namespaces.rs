//! XML namespace handling for DML names
//!
//! DML names carry an optional `Prefix:` scope component. In XML that prefix
//! is written as a namespace prefix; the `DML` prefix is bound to a fixed
//! namespace URI and any other prefix gets a synthetic `urn:dml:prefix:` URI
//! so the exported XML stays namespace-well-formed.

use crate::names::split_prefix;
use indexmap::IndexMap;

/// Namespace prefix reserved for the built-in DML vocabulary
pub const DML_PREFIX: &str = "DML";

/// Namespace URI bound to the `DML` prefix
pub const DML_NAMESPACE: &str = "urn:dml:dml3";

/// Base of the synthetic URIs bound to other prefixes on export
pub const PREFIX_NAMESPACE_BASE: &str = "urn:dml:prefix:";

/// Check whether an XML attribute name is a namespace declaration
pub fn is_namespace_declaration(attr_name: &str) -> bool {
    attr_name == "xmlns" || attr_name.starts_with("xmlns:")
}

/// The namespace URI a prefix is bound to on export
pub fn namespace_for_prefix(prefix: &str) -> String {
    if prefix == DML_PREFIX {
        DML_NAMESPACE.to_string()
    } else {
        format!("{}{}", PREFIX_NAMESPACE_BASE, prefix)
    }
}

/// Prefix declarations collected while exporting a tree
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI, in first-use order
    prefixes: IndexMap<String, String>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the prefix of a name, if it has one
    pub fn note_name(&mut self, name: &str) {
        if let (Some(prefix), _) = split_prefix(name) {
            if !self.prefixes.contains_key(prefix) {
                self.prefixes
                    .insert(prefix.to_string(), namespace_for_prefix(prefix));
            }
        }
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// `xmlns:<prefix>` attribute pairs for every recorded prefix
    pub fn declarations(&self) -> Vec<(String, String)> {
        self.prefixes
            .iter()
            .map(|(prefix, uri)| (format!("xmlns:{}", prefix), uri.clone()))
            .collect()
    }

    /// Check whether no prefix was recorded
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
