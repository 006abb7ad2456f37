//! Node encoding
//!
//! Writing is two passes over the tree. [`NodeWriter::measure`] computes the
//! encoded length of every node and records container body sizes;
//! compressed fragments are compressed here, and the result stays in their
//! cache. [`NodeWriter::write`] then emits the bytes, reusing the recorded
//! sizes and the cached payloads.

use std::collections::HashMap;
use std::io::Write;

use super::{compressed, kind_code, wire, WriteOptions};
use crate::dom::{ArrayValue, CompressedFragment, Document, LoadState, NodeId, Value};
use crate::error::{Error, FormatError, Result};
use crate::schema::Association;
use crate::stream::{blob_len, varint_len, varuint_len, ByteWriter};

pub(crate) struct NodeWriter<'d> {
    doc: &'d Document,
    options: &'d WriteOptions,
    sizes: HashMap<NodeId, u64>,
}

impl<'d> NodeWriter<'d> {
    pub(crate) fn new(doc: &'d Document, options: &'d WriteOptions) -> Self {
        Self {
            doc,
            options,
            sizes: HashMap::new(),
        }
    }

    /// Encoded length of a node, recording container body sizes
    pub(crate) fn measure(&mut self, node: NodeId) -> Result<u64> {
        let doc = self.doc;
        let association = doc.association(node).ok_or_else(|| {
            Error::Value("a fragment is only written through its parent".to_string())
        })?;
        let head = 1 + id_len(association);

        let payload = if doc.is_container(node) {
            if doc.load_state(node) != LoadState::Full {
                return Err(FormatError::Malformed(format!(
                    "'{}' is not fully loaded",
                    doc.name(node)
                ))
                .into());
            }
            let attributes = doc.attributes(node);
            let mut body = varuint_len(attributes.len() as u64);
            for &attribute in attributes {
                body += self.measure(attribute)?;
            }
            for &child in doc.children(node) {
                body += self.measure(child)?;
            }
            if self.options.open_ended {
                body += 1;
            }
            self.sizes.insert(node, body);
            self.size_field_len(body) + body
        } else if let Some(fragment) = doc.compressed(node) {
            let len = self.encoded(fragment)?.bytes.len() as u64;
            let checksum = if self.options.write_checksums { 4 } else { 0 };
            1 + varuint_len(len) + len + checksum
        } else if let Some(value) = doc.value(node) {
            value_len(value)
        } else {
            return Err(Error::Value(format!("'{}' has no encoding", doc.name(node))));
        };
        Ok(head + payload)
    }

    fn size_field_len(&self, body: u64) -> u64 {
        if self.options.open_ended {
            1
        } else {
            varuint_len(body + 1)
        }
    }

    fn encoded(
        &self,
        fragment: &'d CompressedFragment,
    ) -> Result<std::cell::Ref<'d, crate::dom::EncodedPayload>> {
        let doc = self.doc;
        let options = self.options;
        fragment.encoded_with(|| compressed::compress_content(doc, fragment.content(), options))
    }

    /// Write a measured node
    pub(crate) fn write<W: Write>(&self, out: &mut ByteWriter<W>, node: NodeId) -> Result<()> {
        let doc = self.doc;
        let association = doc.association(node).ok_or_else(|| {
            Error::Value("a fragment is only written through its parent".to_string())
        })?;
        let code = doc
            .kind(node)
            .and_then(kind_code)
            .ok_or_else(|| Error::Value(format!("'{}' has no wire kind", doc.name(node))))?;
        let type_byte = if doc.is_attribute(node) {
            code | wire::ATTRIBUTE_FLAG
        } else {
            code
        };
        out.write_u8(type_byte)?;
        if association.is_inline() {
            out.write_varuint(0)?;
            out.write_string(association.name())?;
        } else {
            out.write_varuint(u64::from(association.id()))?;
        }

        if doc.is_container(node) {
            let body = *self.sizes.get(&node).ok_or_else(|| {
                Error::Value(format!("'{}' was not measured", doc.name(node)))
            })?;
            out.write_varuint(if self.options.open_ended { 0 } else { body + 1 })?;

            let start = out.position();
            let attributes = doc.attributes(node);
            out.write_varuint(attributes.len() as u64)?;
            for &attribute in attributes {
                self.write(out, attribute)?;
            }
            for &child in doc.children(node) {
                self.write(out, child)?;
            }
            if self.options.open_ended {
                out.write_u8(wire::END)?;
            }
            if out.position() - start != body {
                return Err(Error::Value(format!(
                    "'{}' changed size between measuring and writing",
                    doc.name(node)
                )));
            }
        } else if let Some(fragment) = doc.compressed(node) {
            let payload = self.encoded(fragment)?;
            let flags = if self.options.write_checksums {
                wire::CHECKSUM_PRESENT
            } else {
                0
            };
            out.write_u8(flags)?;
            out.write_blob(&payload.bytes)?;
            if self.options.write_checksums {
                out.write_u32(payload.checksum)?;
            }
        } else if let Some(value) = doc.value(node) {
            write_value(out, value)?;
        }
        Ok(())
    }
}

fn id_len(association: &Association) -> u64 {
    if association.is_inline() {
        varuint_len(0) + blob_len(association.name().len())
    } else {
        varuint_len(u64::from(association.id()))
    }
}

fn value_len(value: &Value) -> u64 {
    match value {
        Value::Boolean(_) => 1,
        Value::Int(i) => varint_len(*i),
        Value::UInt(u) => varuint_len(*u),
        Value::Single(_) => 4,
        Value::Double(_) | Value::DateTime(_) => 8,
        Value::String(s) => blob_len(s.len()),
        Value::Extension(bytes) => blob_len(bytes.len()),
        Value::Array(items) => 1 + varuint_len(items.len() as u64) + items_len(items),
        Value::Matrix(m) => {
            1 + varuint_len(m.rows() as u64) + varuint_len(m.columns() as u64) + items_len(m.data())
        }
    }
}

fn items_len(items: &ArrayValue) -> u64 {
    match items {
        ArrayValue::String(strings) => strings.iter().map(|s| blob_len(s.len())).sum(),
        other => {
            let width = other.element_type().width().unwrap_or(0) as u64;
            width * other.len() as u64
        }
    }
}

fn datetime_nanos(dt: &chrono::DateTime<chrono::Utc>) -> Result<i64> {
    dt.timestamp_nanos_opt()
        .ok_or_else(|| Error::Value(format!("{} is outside the encodable date range", dt)))
}

fn write_value<W: Write>(out: &mut ByteWriter<W>, value: &Value) -> Result<()> {
    match value {
        Value::Boolean(b) => out.write_u8(u8::from(*b)),
        Value::Int(i) => out.write_varint(*i),
        Value::UInt(u) => out.write_varuint(*u),
        Value::Single(f) => out.write_f32(*f),
        Value::Double(d) => out.write_f64(*d),
        Value::String(s) => out.write_string(s),
        Value::DateTime(dt) => out.write_i64(datetime_nanos(dt)?),
        Value::Extension(bytes) => out.write_blob(bytes),
        Value::Array(items) => {
            out.write_u8(items.element_type().code())?;
            out.write_varuint(items.len() as u64)?;
            write_items(out, items)
        }
        Value::Matrix(m) => {
            out.write_u8(m.element_type().code())?;
            out.write_varuint(m.rows() as u64)?;
            out.write_varuint(m.columns() as u64)?;
            write_items(out, m.data())
        }
    }
}

fn write_items<W: Write>(out: &mut ByteWriter<W>, items: &ArrayValue) -> Result<()> {
    match items {
        ArrayValue::UInt8(v) => out.write_bytes(v)?,
        ArrayValue::UInt16(v) => v.iter().try_for_each(|x| out.write_u16(*x))?,
        ArrayValue::UInt32(v) => v.iter().try_for_each(|x| out.write_u32(*x))?,
        ArrayValue::UInt64(v) => v.iter().try_for_each(|x| out.write_u64(*x))?,
        ArrayValue::Int8(v) => v.iter().try_for_each(|x| out.write_u8(*x as u8))?,
        ArrayValue::Int16(v) => v.iter().try_for_each(|x| out.write_u16(*x as u16))?,
        ArrayValue::Int32(v) => v.iter().try_for_each(|x| out.write_u32(*x as u32))?,
        ArrayValue::Int64(v) => v.iter().try_for_each(|x| out.write_i64(*x))?,
        ArrayValue::Single(v) => v.iter().try_for_each(|x| out.write_f32(*x))?,
        ArrayValue::Double(v) => v.iter().try_for_each(|x| out.write_f64(*x))?,
        ArrayValue::DateTime(v) => v
            .iter()
            .try_for_each(|x| datetime_nanos(x).and_then(|n| out.write_i64(n)))?,
        ArrayValue::String(v) => v.iter().try_for_each(|x| out.write_string(x))?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{builtin, PrimitiveType};
    use std::sync::Arc;

    fn measured_len(doc: &Document, node: NodeId, options: &WriteOptions) -> (u64, Vec<u8>) {
        let mut writer = NodeWriter::new(doc, options);
        let len = writer.measure(node).unwrap();
        let mut out = ByteWriter::new(Vec::new());
        writer.write(&mut out, node).unwrap();
        (len, out.into_inner().unwrap())
    }

    #[test]
    fn test_measure_matches_written_length() {
        let mut doc = Document::new(builtin::base());
        let root = doc.new_inline_container("Root");
        let body = doc.body();
        doc.append_child(body, root).unwrap();
        let name = doc.new_untyped("name", "value", true);
        doc.append_child(root, name).unwrap();
        let count = Arc::new(Association::inline(
            "count",
            crate::schema::NodeKind::Primitive(PrimitiveType::Int),
        ));
        let count = doc.new_primitive(count, Value::Int(-300)).unwrap();
        doc.append_child(root, count).unwrap();
        let data = Arc::new(Association::inline(
            "data",
            crate::schema::NodeKind::Primitive(PrimitiveType::Array),
        ));
        let data = doc
            .new_primitive(data, Value::Array(ArrayValue::String(vec!["a".into(), "bc".into()])))
            .unwrap();
        doc.append_child(root, data).unwrap();

        for options in [WriteOptions::default(), WriteOptions::default().with_open_ended(true)] {
            let (len, bytes) = measured_len(&doc, root, &options);
            assert_eq!(len, bytes.len() as u64);
        }
    }

    #[test]
    fn test_attribute_flag_set() {
        let mut doc = Document::new(builtin::base());
        let attr = doc.new_untyped("a", "", true);
        let (_, bytes) = measured_len(&doc, attr, &WriteOptions::default());
        assert_eq!(bytes[0] & wire::ATTRIBUTE_FLAG, wire::ATTRIBUTE_FLAG);
        assert_eq!(bytes[1], 0);
    }
}
