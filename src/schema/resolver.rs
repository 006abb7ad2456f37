//! Translation resolution
//!
//! Expands a translation-description document (or a document header) into a
//! flat, query-ready translation: include directives are resolved and merged,
//! `Container` declarations get their nested declarations as a local
//! translation, and primitive-set requirements are unioned in order of first
//! appearance.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::association::Association;
use super::builtin::{self, names};
use super::primitive_sets::PrimitiveSet;
use super::resolution::ResourceResolution;
use super::translation::Translation;
use super::types::{ElementType, PrimitiveType};
use crate::dom::{Document, Header, NodeId};
use crate::error::{Result, ResultExt, SchemaError};
use crate::limits::Limits;
use crate::names::{names_equal, validate_name};

/// A translation with every inclusion expanded
#[derive(Debug, Clone)]
pub struct ResolvedTranslation {
    /// The flattened translation
    pub translation: Arc<Translation>,
    /// Aggregated, de-duplicated primitive-set requirements
    pub required_sets: Vec<PrimitiveSet>,
}

impl ResolvedTranslation {
    /// Wrap a finished translation
    pub fn new(translation: Translation) -> Self {
        let required_sets = translation.required_sets().to_vec();
        Self {
            translation: Arc::new(translation),
            required_sets,
        }
    }

    /// JSON description of the resolved vocabulary
    pub fn to_json(&self) -> serde_json::Value {
        let dump = TranslationDump::from_translation(&self.translation, &self.required_sets);
        serde_json::to_value(dump).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationDump {
    uri: Option<String>,
    required_primitive_sets: Vec<PrimitiveSet>,
    associations: Vec<AssociationDump>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssociationDump {
    id: u32,
    name: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    element_type: Option<ElementType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    local: Vec<AssociationDump>,
}

impl TranslationDump {
    fn from_translation(t: &Translation, required: &[PrimitiveSet]) -> Self {
        Self {
            uri: t.uri().map(str::to_string),
            required_primitive_sets: required.to_vec(),
            associations: t.iter().map(|a| AssociationDump::from_association(a)).collect(),
        }
    }
}

impl AssociationDump {
    fn from_association(a: &Association) -> Self {
        Self {
            id: a.id(),
            name: a.name().to_string(),
            kind: a.kind().to_string(),
            element_type: a.element_type(),
            local: a
                .local_translation()
                .map(|t| t.iter().map(|a| Self::from_association(a)).collect())
                .unwrap_or_default(),
        }
    }
}

/// Resolves translation documents and headers
pub struct TranslationResolver<'r> {
    resolution: &'r dyn ResourceResolution,
    limits: Limits,
}

impl<'r> TranslationResolver<'r> {
    /// Create a resolver using `resolution` for external URIs
    pub fn new(resolution: &'r dyn ResourceResolution) -> Self {
        Self {
            resolution,
            limits: Limits::default(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Resolve a URI, recognising the built-in translations first
    pub fn resolve_uri(&self, uri: &str) -> Result<Arc<Translation>> {
        if let Some(builtin) = builtin::lookup(uri) {
            return Ok(builtin);
        }
        self.resolution
            .resolve(uri)?
            .ok_or_else(|| SchemaError::UnresolvedUri(uri.to_string()).into())
    }

    /// Resolve a translation-description document
    pub fn resolve_document(&self, document: &Document) -> Result<ResolvedTranslation> {
        let root = document.root_container().ok_or_else(|| {
            SchemaError::Malformed("translation document has no content".to_string())
        })?;
        let root_name = document.name(root);
        if !names_equal(root_name, names::TRANSLATION) {
            return Err(SchemaError::Malformed(format!(
                "expected {} as the document root, found '{}'",
                names::TRANSLATION,
                root_name
            ))
            .into());
        }

        let mut translation = match document.attribute_str(root, names::URI) {
            Some(uri) => Translation::with_uri(uri),
            None => Translation::new(),
        };
        self.build_scope(document, root, &mut translation, 0)
            .within(root_name)?;

        debug!(
            uri = translation.uri().unwrap_or("<anonymous>"),
            associations = translation.len(),
            "resolved translation document"
        );
        Ok(ResolvedTranslation::new(translation))
    }

    /// Resolve the global translation a document header declares
    pub fn resolve_header(&self, header: &Header) -> Result<ResolvedTranslation> {
        let mut translation = Translation::new();
        translation.include(&builtin::base())?;

        for uri in &header.translations {
            let included = self.resolve_uri(uri).within(names::INCLUDE_TRANSLATION)?;
            translation.include(&included)?;
            debug!(uri = uri.as_str(), "header translation included");
        }
        for set in &header.primitive_sets {
            translation.require(set.clone());
        }
        Ok(ResolvedTranslation::new(translation))
    }

    fn build_scope(
        &self,
        document: &Document,
        container: NodeId,
        translation: &mut Translation,
        depth: usize,
    ) -> Result<()> {
        self.limits.check_depth(depth)?;

        let (children, _) = document.logical_children(container);
        for child in children {
            let name = document.name(child);
            if names_equal(name, names::COMMENT) {
                continue;
            }

            if names_equal(name, names::INCLUDE_TRANSLATION) {
                let uri = self.required_str(document, child, names::URI).within(name)?;
                let included = self.resolve_uri(uri).within(name)?;
                translation.include(&included).within(name)?;
                debug!(uri, "translation included");
            } else if names_equal(name, names::INCLUDE_PRIMITIVES) {
                let set = self.required_str(document, child, names::SET).within(name)?;
                let codec = document.attribute_str(child, names::CODEC);
                translation.require(PrimitiveSet::new(set, codec));
            } else if names_equal(name, names::TSL_NODE) {
                let association = self.node_declaration(document, child).within(name)?;
                translation.add(association).within(name)?;
            } else if names_equal(name, names::TSL_CONTAINER) {
                let (id, declared) = self.declaration(document, child).within(name)?;
                let mut local = Translation::new();
                self.build_scope(document, child, &mut local, depth + 1)
                    .within(declared.as_str())?;

                let mut association = Association::container(id, declared);
                if !local.is_empty() {
                    for set in local.required_sets() {
                        translation.require(set.clone());
                    }
                    association = association.with_local_translation(Arc::new(local));
                }
                translation.add(association).within(name)?;
            } else {
                return Err(SchemaError::Malformed(format!(
                    "unexpected '{}' in translation",
                    name
                ))
                .into());
            }
        }
        Ok(())
    }

    fn declaration(&self, document: &Document, node: NodeId) -> Result<(u32, String)> {
        let id = document
            .attribute_value(node, names::TSL_ID)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SchemaError::Malformed("missing or invalid 'id'".to_string()))?;
        let id = u32::try_from(id)
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| SchemaError::Malformed(format!("id {} is out of range", id)))?;

        let name = self.required_str(document, node, names::TSL_NAME)?;
        validate_name(name).map_err(|_| SchemaError::Malformed(format!("invalid name '{}'", name)))?;
        Ok((id, name.to_string()))
    }

    fn node_declaration(&self, document: &Document, node: NodeId) -> Result<Association> {
        let (id, name) = self.declaration(document, node)?;
        let type_name = self.required_str(document, node, names::TSL_TYPE)?;
        let ty = PrimitiveType::from_name(type_name)
            .ok_or_else(|| SchemaError::Malformed(format!("unknown type '{}'", type_name)))?;

        let mut association = Association::primitive(id, name, ty);
        if let Some(element) = document.attribute_str(node, names::TSL_ELEMENT_TYPE) {
            if !ty.has_elements() {
                return Err(SchemaError::Malformed(format!(
                    "element-type given for non-array type '{}'",
                    ty
                ))
                .into());
            }
            let element = ElementType::from_name(element).ok_or_else(|| {
                SchemaError::Malformed(format!("unknown element type '{}'", element))
            })?;
            association = association.with_element_type(element);
        }
        Ok(association)
    }

    fn required_str<'d>(&self, document: &'d Document, node: NodeId, name: &str) -> Result<&'d str> {
        document
            .attribute_str(node, name)
            .ok_or_else(|| SchemaError::Malformed(format!("missing '{}'", name)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Value;
    use crate::schema::{builtin::ids, MemoryResolver, NoResolver};

    fn tsl_assoc(id: u32) -> Arc<Association> {
        Arc::clone(builtin::tsl_document().get(id).unwrap())
    }

    fn attr(doc: &mut Document, parent: NodeId, id: u32, value: Value) {
        let node = doc.new_attribute(tsl_assoc(id), value).unwrap();
        doc.append_child(parent, node).unwrap();
    }

    fn node_decl(doc: &mut Document, parent: NodeId, id: u64, name: &str, ty: &str) -> NodeId {
        let node = doc.new_container(tsl_assoc(ids::TSL_NODE));
        attr(doc, node, ids::TSL_ID, Value::UInt(id));
        attr(doc, node, ids::TSL_NAME, Value::String(name.into()));
        attr(doc, node, ids::TSL_TYPE, Value::String(ty.into()));
        doc.append_child(parent, node).unwrap();
        node
    }

    fn translation_doc() -> (Document, NodeId) {
        let mut doc = Document::new(builtin::tsl_document());
        let root = doc.new_container(tsl_assoc(ids::TRANSLATION));
        let body = doc.body();
        doc.append_child(body, root).unwrap();
        (doc, root)
    }

    #[test]
    fn test_resolve_nodes_and_local_containers() {
        let (mut doc, root) = translation_doc();
        node_decl(&mut doc, root, 1, "Width", "uint");

        let image = doc.new_container(tsl_assoc(ids::TSL_CONTAINER));
        attr(&mut doc, image, ids::TSL_ID, Value::UInt(2));
        attr(&mut doc, image, ids::TSL_NAME, Value::String("Image".into()));
        node_decl(&mut doc, image, 3, "Format", "string");
        doc.append_child(root, image).unwrap();

        let resolved = TranslationResolver::new(&NoResolver)
            .resolve_document(&doc)
            .unwrap();
        let t = &resolved.translation;
        assert_eq!(t.len(), 2);
        let image = t.get(2).unwrap();
        assert!(image.is_container());
        let local = image.local_translation().unwrap();
        assert_eq!(local.get(3).unwrap().primitive_type(), Some(PrimitiveType::String));
    }

    #[test]
    fn test_unresolved_include_is_an_error() {
        let (mut doc, root) = translation_doc();
        let include = doc.new_container(tsl_assoc(ids::INCLUDE_TRANSLATION));
        attr(&mut doc, include, ids::URI, Value::String("urn:test:missing".into()));
        doc.append_child(root, include).unwrap();

        let err = TranslationResolver::new(&NoResolver)
            .resolve_document(&doc)
            .unwrap_err();
        assert!(matches!(
            err.root(),
            crate::Error::Schema(SchemaError::UnresolvedUri(uri)) if uri == "urn:test:missing"
        ));
    }

    #[test]
    fn test_builtin_uri_needs_no_resolver() {
        let resolver = TranslationResolver::new(&NoResolver);
        assert!(resolver.resolve_uri(builtin::DML3_URN).is_ok());
        assert!(resolver.resolve_uri(builtin::TSL2_URN).is_ok());
    }

    #[test]
    fn test_resolve_header_includes_base() {
        let mut shapes = Translation::with_uri("urn:test:shapes");
        shapes
            .add(Association::primitive(1, "X", PrimitiveType::Double))
            .unwrap();
        shapes.require(PrimitiveSet::new("common", Some("le")));
        let resolver = MemoryResolver::new().with("urn:test:shapes", shapes);

        let header = Header::new()
            .with_translation("urn:test:shapes")
            .with_primitive_set(PrimitiveSet::new("common", Some("le")));
        let resolved = TranslationResolver::new(&resolver)
            .resolve_header(&header)
            .unwrap();

        assert!(resolved.translation.get(ids::HEADER).is_some());
        assert!(resolved.translation.get(1).is_some());
        assert_eq!(resolved.required_sets.len(), 1);
    }

    #[test]
    fn test_json_dump_lists_associations() {
        let mut t = Translation::with_uri("urn:test:dump");
        t.add(Association::array(5, "Data", PrimitiveType::Array, ElementType::UInt8))
            .unwrap();
        let json = ResolvedTranslation::new(t).to_json();

        assert_eq!(json["uri"], "urn:test:dump");
        assert_eq!(json["associations"][0]["name"], "Data");
        assert_eq!(json["associations"][0]["elementType"], "u8");
    }
}
