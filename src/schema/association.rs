//! Associations: schema entries binding an id and a name to a node kind

use std::fmt;
use std::sync::Arc;

use super::translation::Translation;
use super::types::{ElementType, NodeKind, PrimitiveType};
use crate::names::names_equal;

/// Id reserved for nodes identified by name instead of by id
pub const INLINE_ID: u32 = 0;

/// A schema entry
///
/// Associations are immutable once built and are shared (`Arc`) between the
/// translation that declares them and every node bound to them.
#[derive(Debug, Clone)]
pub struct Association {
    id: u32,
    name: String,
    kind: NodeKind,
    element_type: Option<ElementType>,
    local: Option<Arc<Translation>>,
}

impl Association {
    /// Create a container association
    pub fn container(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Container,
            element_type: None,
            local: None,
        }
    }

    /// Create a primitive association
    pub fn primitive(id: u32, name: impl Into<String>, ty: PrimitiveType) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Primitive(ty),
            element_type: None,
            local: None,
        }
    }

    /// Create an array or matrix association with its element type
    pub fn array(id: u32, name: impl Into<String>, ty: PrimitiveType, element: ElementType) -> Self {
        Self::primitive(id, name, ty).with_element_type(element)
    }

    /// Create an association for a node identified by name only
    pub fn inline(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: INLINE_ID,
            name: name.into(),
            kind,
            element_type: None,
            local: None,
        }
    }

    /// Create a placeholder for an id no translation in scope declares
    pub fn unknown(id: u32, kind: NodeKind) -> Self {
        Self {
            id,
            name: format!("Unknown-{}", id),
            kind,
            element_type: None,
            local: None,
        }
    }

    /// Set the element type (arrays and matrices)
    pub fn with_element_type(mut self, element: ElementType) -> Self {
        self.element_type = Some(element);
        self
    }

    /// Attach a translation valid only inside nodes of this association
    pub fn with_local_translation(mut self, local: Arc<Translation>) -> Self {
        self.local = Some(local);
        self
    }

    /// Numeric id ([`INLINE_ID`] for inline-identified nodes)
    pub fn id(&self) -> u32 {
        self.id
    }

    /// External name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared node kind
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Check if this declares a container
    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Declared primitive type, for primitive associations
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        self.kind.primitive_type()
    }

    /// Element type of an array or matrix association
    pub fn element_type(&self) -> Option<ElementType> {
        self.element_type
    }

    /// Translation scoped to nodes of this association
    pub fn local_translation(&self) -> Option<&Arc<Translation>> {
        self.local.as_ref()
    }

    /// Check if nodes of this association are identified by name
    pub fn is_inline(&self) -> bool {
        self.id == INLINE_ID
    }

    /// Check whether two associations declare the same entry.
    ///
    /// Local translations are not compared; an identical re-add of an entry
    /// keeps the first declaration.
    pub fn same_declaration(&self, other: &Association) -> bool {
        self.id == other.id
            && names_equal(&self.name, &other.name)
            && self.kind == other.kind
            && self.element_type == other.element_type
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.name, self.kind)?;
        if let Some(element) = self.element_type {
            write!(f, " of {}", element)?;
        }
        if self.is_inline() {
            f.write_str(", inline)")
        } else {
            write!(f, ", id {})", self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let width = Association::primitive(3, "Width", PrimitiveType::UInt);
        assert_eq!(width.id(), 3);
        assert_eq!(width.primitive_type(), Some(PrimitiveType::UInt));
        assert!(!width.is_container());

        let data = Association::array(4, "Data", PrimitiveType::Array, ElementType::UInt8);
        assert_eq!(data.element_type(), Some(ElementType::UInt8));

        let text = Association::inline("Note", NodeKind::Primitive(PrimitiveType::String));
        assert!(text.is_inline());

        let unknown = Association::unknown(77, NodeKind::Container);
        assert_eq!(unknown.name(), "Unknown-77");
    }

    #[test]
    fn test_same_declaration_ignores_name_case() {
        let a = Association::container(1, "Image");
        let b = Association::container(1, "IMAGE");
        let c = Association::primitive(1, "Image", PrimitiveType::String);

        assert!(a.same_declaration(&b));
        assert!(!a.same_declaration(&c));
    }

    #[test]
    fn test_display() {
        let data = Association::array(4, "Data", PrimitiveType::Array, ElementType::UInt8);
        assert_eq!(data.to_string(), "Data (array of u8, id 4)");
    }
}
