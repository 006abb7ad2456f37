//! Document header: out-of-band metadata identifying a document's schema

use tracing::debug;

use super::document::{builtin_association, Document};
use super::node::NodeId;
use super::value::Value;
use crate::error::{FormatError, Result};
use crate::names::names_equal;
use crate::schema::builtin::{ids, names, DML_VERSION};
use crate::schema::primitive_sets::merge_into;
use crate::schema::PrimitiveSet;

/// Metadata carried ahead of a document's content
///
/// In the binary form and in XML the header is a `DML:Header` container
/// with `DML:Version`, `DML:ReadVersion` and `DML:DocType` attributes and
/// one `DML:Include-Translation` or `DML:Include-Primitives` child per
/// requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format version the document was written with
    pub version: u64,
    /// Minimum format version a reader needs
    pub read_version: u64,
    /// Name of the content root, if declared
    pub doc_type: Option<String>,
    /// URIs of the translations making up the global translation
    pub translations: Vec<String>,
    /// Primitive sets the document depends on
    pub primitive_sets: Vec<PrimitiveSet>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: DML_VERSION,
            read_version: DML_VERSION,
            doc_type: None,
            translations: Vec::new(),
            primitive_sets: Vec::new(),
        }
    }
}

impl Header {
    /// Create a header for the current format version
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a translation URI
    pub fn with_translation(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        if !self.translations.contains(&uri) {
            self.translations.push(uri);
        }
        self
    }

    /// Add a primitive-set requirement
    pub fn with_primitive_set(mut self, set: PrimitiveSet) -> Self {
        merge_into(&mut self.primitive_sets, set);
        self
    }

    /// Set the document type
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Fail if a reader of this crate's format version cannot read the
    /// document, or if a required primitive set is not supported
    pub fn check_readable(&self) -> Result<()> {
        if self.read_version > DML_VERSION {
            return Err(FormatError::Malformed(format!(
                "document needs reader version {}, this reader supports {}",
                self.read_version, DML_VERSION
            ))
            .into());
        }
        if let Some(set) = self.primitive_sets.iter().find(|s| !s.is_supported()) {
            return Err(FormatError::UnsupportedPrimitiveSet(set.to_string()).into());
        }
        Ok(())
    }

    /// Build the detached `DML:Header` container for this header
    pub fn to_container(&self, doc: &mut Document) -> Result<NodeId> {
        let header = doc.new_container(builtin_association(ids::HEADER)?);
        doc.set_attribute(
            header,
            builtin_association(ids::VERSION)?,
            Value::UInt(self.version),
        )?;
        doc.set_attribute(
            header,
            builtin_association(ids::READ_VERSION)?,
            Value::UInt(self.read_version),
        )?;
        if let Some(doc_type) = &self.doc_type {
            doc.set_attribute(
                header,
                builtin_association(ids::DOC_TYPE)?,
                Value::String(doc_type.clone()),
            )?;
        }

        for uri in &self.translations {
            let include = doc.new_container(builtin_association(ids::INCLUDE_TRANSLATION)?);
            doc.set_attribute(include, builtin_association(ids::URI)?, Value::String(uri.clone()))?;
            doc.append_child(header, include)?;
        }
        for set in &self.primitive_sets {
            let include = doc.new_container(builtin_association(ids::INCLUDE_PRIMITIVES)?);
            doc.set_attribute(include, builtin_association(ids::SET)?, Value::String(set.set.clone()))?;
            if let Some(codec) = &set.codec {
                doc.set_attribute(include, builtin_association(ids::CODEC)?, Value::String(codec.clone()))?;
            }
            doc.append_child(header, include)?;
        }
        Ok(header)
    }

    /// Read a header from a `DML:Header` container
    pub fn from_container(doc: &Document, node: NodeId) -> Result<Self> {
        if !names_equal(doc.name(node), names::HEADER) {
            return Err(FormatError::Malformed(format!(
                "expected {}, found '{}'",
                names::HEADER,
                doc.name(node)
            ))
            .into());
        }

        let mut header = Header {
            version: doc.attribute_u64_or(node, names::VERSION, DML_VERSION),
            read_version: doc.attribute_u64_or(node, names::READ_VERSION, DML_VERSION),
            doc_type: doc.attribute_str(node, names::DOC_TYPE).map(str::to_string),
            ..Header::default()
        };

        for child in doc.logical_children(node).0 {
            let name = doc.name(child);
            if names_equal(name, names::INCLUDE_TRANSLATION) {
                let uri = doc.attribute_str(child, names::URI).ok_or_else(|| {
                    FormatError::Malformed(format!("{} without {}", name, names::URI))
                })?;
                header = header.with_translation(uri);
            } else if names_equal(name, names::INCLUDE_PRIMITIVES) {
                let set = doc.attribute_str(child, names::SET).ok_or_else(|| {
                    FormatError::Malformed(format!("{} without {}", name, names::SET))
                })?;
                let codec = doc.attribute_str(child, names::CODEC);
                header = header.with_primitive_set(PrimitiveSet::new(set, codec));
            } else {
                debug!(name, "ignoring unknown header entry");
            }
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;

    #[test]
    fn test_header_container_round_trip() {
        let header = Header::new()
            .with_doc_type("Image")
            .with_translation("urn:test:image")
            .with_primitive_set(PrimitiveSet::new("common", Some("le")));

        let mut doc = Document::new(builtin::base());
        let node = header.to_container(&mut doc).unwrap();
        assert_eq!(doc.name(node), names::HEADER);
        assert_eq!(Header::from_container(&doc, node).unwrap(), header);
    }

    #[test]
    fn test_duplicate_entries_collapse() {
        let header = Header::new()
            .with_translation("urn:a")
            .with_translation("urn:a")
            .with_primitive_set(PrimitiveSet::new("common", Some("le")))
            .with_primitive_set(PrimitiveSet::new("common", Some("le")));
        assert_eq!(header.translations.len(), 1);
        assert_eq!(header.primitive_sets.len(), 1);
    }

    #[test]
    fn test_check_readable() {
        assert!(Header::new().check_readable().is_ok());

        let future = Header {
            read_version: DML_VERSION + 1,
            ..Header::new()
        };
        assert!(future.check_readable().is_err());

        let exotic = Header::new().with_primitive_set(PrimitiveSet::new("common", Some("be")));
        let err = exotic.check_readable().unwrap_err();
        assert!(matches!(err, crate::Error::Format(FormatError::UnsupportedPrimitiveSet(_))));
    }
}
