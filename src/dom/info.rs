//! Typed views over generic containers
//!
//! A view reads a container's attributes with typed defaults and collects
//! its logical children through any compressed wrapper. It remembers
//! whether it crossed one, so writing the view back reapplies the same
//! compression policy.

use std::sync::Arc;

use super::document::Document;
use super::node::NodeId;
use super::value::{ArrayValue, Value};
use crate::error::{Error, Result};
use crate::names::names_equal;
use crate::schema::{Association, ElementType, NodeKind, PrimitiveType, Scope};

const WIDTH: &str = "Width";
const HEIGHT: &str = "Height";
const FORMAT: &str = "Format";
const DATA: &str = "Data";
const COLUMN: &str = "Column";
const NAME: &str = "Name";

/// Pixel format assumed when an image does not declare one
pub const DEFAULT_FORMAT: &str = "raw";

/// An image: dimensions, pixel format and raw pixel data
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u64,
    /// Height in pixels
    pub height: u64,
    /// Pixel format name
    pub format: String,
    /// Pixel data
    pub data: ArrayValue,
    /// Whether the data was found inside a compressed fragment
    pub saw_compression: bool,
}

impl ImageInfo {
    /// Create an uncompressed image view
    pub fn new(width: u64, height: u64, format: impl Into<String>, data: ArrayValue) -> Self {
        Self {
            width,
            height,
            format: format.into(),
            data,
            saw_compression: false,
        }
    }

    /// Read the view from an image container
    pub fn read(doc: &Document, image: NodeId) -> Result<Self> {
        require_container(doc, image)?;
        let (children, saw_compression) = doc.logical_children(image);
        let data = find_array(doc, &children, DATA)
            .cloned()
            .unwrap_or_else(|| ArrayValue::empty(ElementType::UInt8));

        Ok(Self {
            width: doc.attribute_u64_or(image, WIDTH, 0),
            height: doc.attribute_u64_or(image, HEIGHT, 0),
            format: doc.attribute_str_or(image, FORMAT, DEFAULT_FORMAT).to_string(),
            data,
            saw_compression,
        })
    }

    /// Write the view back into an image container
    pub fn write(&self, doc: &mut Document, image: NodeId) -> Result<()> {
        require_container(doc, image)?;
        let scope = doc.scope_of(image);

        let width = association_for(&scope, WIDTH, PrimitiveType::UInt, None);
        doc.set_attribute(image, width, Value::UInt(self.width))?;
        let height = association_for(&scope, HEIGHT, PrimitiveType::UInt, None);
        doc.set_attribute(image, height, Value::UInt(self.height))?;
        let format = association_for(&scope, FORMAT, PrimitiveType::String, None);
        doc.set_attribute(image, format, Value::String(self.format.clone()))?;

        let data = array_association(&scope, DATA, &self.data);
        let node = doc.new_primitive(data, Value::Array(self.data.clone()))?;

        doc.set_compress_children(image, self.saw_compression)?;
        doc.replace_children_by_role(
            image,
            DATA,
            NodeKind::Primitive(PrimitiveType::Array),
            vec![node],
        )
    }
}

/// One named column of a table
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Column values
    pub data: ArrayValue,
}

/// A table: an ordered list of named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableInfo {
    /// Columns in order
    pub columns: Vec<ColumnInfo>,
    /// Whether the columns were found inside a compressed fragment
    pub saw_compression: bool,
}

impl TableInfo {
    /// Read the view from a table container
    pub fn read(doc: &Document, table: NodeId) -> Result<Self> {
        require_container(doc, table)?;
        let (children, saw_compression) = doc.logical_children(table);

        let mut columns = Vec::new();
        for column in children {
            if !doc.is_container(column) || !names_equal(doc.name(column), COLUMN) {
                continue;
            }
            let (cells, _) = doc.logical_children(column);
            let name = doc
                .attribute_str(column, NAME)
                .or_else(|| {
                    cells
                        .iter()
                        .find(|c| names_equal(doc.name(**c), NAME))
                        .and_then(|c| doc.value(*c))
                        .and_then(|v| v.as_str())
                })
                .unwrap_or_default()
                .to_string();
            let data = find_array(doc, &cells, DATA)
                .cloned()
                .unwrap_or_else(|| ArrayValue::empty(ElementType::Double));
            columns.push(ColumnInfo { name, data });
        }

        Ok(Self {
            columns,
            saw_compression,
        })
    }

    /// Write the view back into a table container
    pub fn write(&self, doc: &mut Document, table: NodeId) -> Result<()> {
        require_container(doc, table)?;
        let scope = doc.scope_of(table);
        let column_association = match scope.get_association(COLUMN) {
            Some(a) if a.is_container() => Arc::clone(a),
            _ => Arc::new(Association::inline(COLUMN, NodeKind::Container)),
        };
        let column_scope = scope.enter(&column_association);

        let mut nodes = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let node = doc.new_container(Arc::clone(&column_association));
            let name = association_for(&column_scope, NAME, PrimitiveType::String, None);
            doc.set_attribute(node, name, Value::String(column.name.clone()))?;
            let data = array_association(&column_scope, DATA, &column.data);
            let cell = doc.new_primitive(data, Value::Array(column.data.clone()))?;
            doc.append_child(node, cell)?;
            nodes.push(node);
        }

        doc.set_compress_children(table, self.saw_compression)?;
        doc.replace_children_by_role(table, COLUMN, NodeKind::Container, nodes)
    }
}

fn require_container(doc: &Document, node: NodeId) -> Result<()> {
    if doc.is_container(node) {
        Ok(())
    } else {
        Err(Error::Value(format!("'{}' is not a container", doc.name(node))))
    }
}

fn find_array<'d>(doc: &'d Document, children: &[NodeId], name: &str) -> Option<&'d ArrayValue> {
    children
        .iter()
        .filter(|c| names_equal(doc.name(**c), name))
        .find_map(|c| doc.value(*c).and_then(|v| v.as_array()))
}

/// The association in scope for `name` if it declares `ty`, otherwise an
/// inline one
fn association_for(
    scope: &Scope,
    name: &str,
    ty: PrimitiveType,
    element: Option<ElementType>,
) -> Arc<Association> {
    match scope.get_association(name) {
        Some(a)
            if a.primitive_type() == Some(ty)
                && (element.is_none() || a.element_type().is_none() || a.element_type() == element) =>
        {
            Arc::clone(a)
        }
        _ => {
            let inline = Association::inline(name, NodeKind::Primitive(ty));
            Arc::new(match element {
                Some(element) => inline.with_element_type(element),
                None => inline,
            })
        }
    }
}

fn array_association(scope: &Scope, name: &str, data: &ArrayValue) -> Arc<Association> {
    association_for(scope, name, PrimitiveType::Array, Some(data.element_type()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{builtin, Translation};

    fn image_doc() -> (Document, NodeId) {
        let mut t = Translation::new();
        t.include(&builtin::base()).unwrap();
        t.add(Association::container(1, "Image")).unwrap();
        t.add(Association::primitive(2, WIDTH, PrimitiveType::UInt))
            .unwrap();
        t.add(Association::array(3, DATA, PrimitiveType::Array, ElementType::UInt8))
            .unwrap();
        let mut doc = Document::new(Arc::new(t));
        let image = doc.new_container(Arc::clone(doc.global_translation().get(1).unwrap()));
        let body = doc.body();
        doc.append_child(body, image).unwrap();
        (doc, image)
    }

    #[test]
    fn test_image_defaults_when_empty() {
        let (doc, image) = image_doc();
        let info = ImageInfo::read(&doc, image).unwrap();
        assert_eq!(info.width, 0);
        assert_eq!(info.format, DEFAULT_FORMAT);
        assert!(info.data.is_empty());
        assert!(!info.saw_compression);
    }

    #[test]
    fn test_image_write_then_read() {
        let (mut doc, image) = image_doc();
        let info = ImageInfo::new(2, 1, "gray8", ArrayValue::UInt8(vec![10, 20]));
        info.write(&mut doc, image).unwrap();

        let width = doc.attribute(image, WIDTH).unwrap();
        assert_eq!(doc.association(width).unwrap().id(), 2);
        assert_eq!(ImageInfo::read(&doc, image).unwrap(), info);
    }

    #[test]
    fn test_image_keeps_compression_policy() {
        let (mut doc, image) = image_doc();
        let mut info = ImageInfo::new(1, 1, "gray8", ArrayValue::UInt8(vec![1]));
        info.saw_compression = true;
        info.write(&mut doc, image).unwrap();

        let read = ImageInfo::read(&doc, image).unwrap();
        assert!(read.saw_compression);

        let mut updated = read.clone();
        updated.data = ArrayValue::UInt8(vec![2]);
        updated.write(&mut doc, image).unwrap();

        assert_eq!(doc.children(image).len(), 1);
        let again = ImageInfo::read(&doc, image).unwrap();
        assert!(again.saw_compression);
        assert_eq!(again.data, ArrayValue::UInt8(vec![2]));
    }

    #[test]
    fn test_table_columns() {
        let mut doc = Document::new(builtin::base());
        let table = doc.new_inline_container("Table");
        let body = doc.body();
        doc.append_child(body, table).unwrap();

        let info = TableInfo {
            columns: vec![
                ColumnInfo {
                    name: "x".into(),
                    data: ArrayValue::Double(vec![1.0, 2.0]),
                },
                ColumnInfo {
                    name: "y".into(),
                    data: ArrayValue::Int32(vec![-1, 1]),
                },
            ],
            saw_compression: false,
        };
        info.write(&mut doc, table).unwrap();
        assert_eq!(TableInfo::read(&doc, table).unwrap(), info);

        let shorter = TableInfo {
            columns: info.columns[..1].to_vec(),
            saw_compression: false,
        };
        shorter.write(&mut doc, table).unwrap();
        assert_eq!(TableInfo::read(&doc, table).unwrap().columns.len(), 1);
    }
}
