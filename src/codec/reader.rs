//! Node decoding

use chrono::{DateTime, TimeZone, Utc};
use std::io::Read;
use std::sync::Arc;
use tracing::{trace, warn};

use super::{compressed, kind_from_code, wire, ReadOptions};
use crate::dom::{ArrayValue, Document, LoadState, MatrixValue, NodeId, Value};
use crate::error::{FormatError, Result};
use crate::limits::Limits;
use crate::names::names_equal;
use crate::schema::builtin::{self, names};
use crate::schema::{Association, ElementType, NodeKind, PrimitiveType, Scope, INLINE_ID};
use crate::stream::{Bookmark, ByteReader};

/// Upper bound on capacity reserved ahead of reading untrusted counts
const PREALLOCATE: usize = 4096;

/// How much of a container to materialize while reading it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Materialize {
    /// The whole subtree
    Full,
    /// Attributes and primitive children; sized child containers become
    /// unread shells
    Shallow,
    /// Nothing below the size field when the container is sized
    Shell,
}

pub(crate) struct NodeReader<'o> {
    options: &'o ReadOptions,
}

impl<'o> NodeReader<'o> {
    pub(crate) fn new(options: &'o ReadOptions) -> Self {
        Self { options }
    }

    pub(crate) fn options(&self) -> &ReadOptions {
        self.options
    }

    /// Read one node; `None` for an end marker
    pub(crate) fn read_node<R: Read>(
        &self,
        reader: &mut ByteReader<R>,
        doc: &mut Document,
        scope: &Scope,
        depth: usize,
    ) -> Result<Option<NodeId>> {
        let type_byte = reader.read_u8()?;
        self.read_node_with_type(type_byte, reader, doc, scope, depth, Materialize::Full)
    }

    /// Read one node whose type byte was already consumed
    pub(crate) fn read_node_with_type<R: Read>(
        &self,
        type_byte: u8,
        reader: &mut ByteReader<R>,
        doc: &mut Document,
        scope: &Scope,
        depth: usize,
        mode: Materialize,
    ) -> Result<Option<NodeId>> {
        if type_byte == wire::END {
            return Ok(None);
        }
        self.options.limits.check_depth(depth)?;

        let is_attribute = type_byte & wire::ATTRIBUTE_FLAG != 0;
        let kind = kind_from_code(type_byte & wire::KIND_MASK).ok_or_else(|| {
            FormatError::Malformed(format!("unknown node type {:#04x}", type_byte))
        })?;
        let association = self.read_association(reader, scope, kind)?;
        trace!(name = association.name(), id = association.id(), %kind, "reading node");

        let context = Arc::clone(&association);
        let node = match kind {
            NodeKind::Primitive(PrimitiveType::Boolean)
            | NodeKind::Primitive(PrimitiveType::Int)
            | NodeKind::Primitive(PrimitiveType::UInt)
            | NodeKind::Primitive(PrimitiveType::Single)
            | NodeKind::Primitive(PrimitiveType::Double)
            | NodeKind::Primitive(PrimitiveType::String)
            | NodeKind::Primitive(PrimitiveType::DateTime)
            | NodeKind::Primitive(PrimitiveType::Array)
            | NodeKind::Primitive(PrimitiveType::Matrix)
            | NodeKind::Primitive(PrimitiveType::Extension) => {
                let ty = kind.primitive_type().unwrap_or(PrimitiveType::Unknown);
                read_value(reader, ty, &self.options.limits).and_then(|value| {
                    if is_attribute {
                        doc.new_attribute(association, value)
                    } else {
                        doc.new_primitive(association, value)
                    }
                })
            }
            _ if is_attribute => Err(FormatError::Malformed(format!(
                "{} cannot be in attribute position",
                kind
            ))
            .into()),
            NodeKind::Container => self.read_container(reader, doc, association, scope, depth, mode),
            NodeKind::Primitive(PrimitiveType::CompressedFragment) => {
                compressed::decode(self, reader, doc, association, scope, depth)
            }
            NodeKind::Primitive(_) => Err(FormatError::Malformed(format!(
                "{} fragments cannot be decoded",
                kind
            ))
            .into()),
        };
        node.map(Some).map_err(|e| e.within(context.name()))
    }

    fn read_association<R: Read>(
        &self,
        reader: &mut ByteReader<R>,
        scope: &Scope,
        kind: NodeKind,
    ) -> Result<Arc<Association>> {
        let id = reader.read_varuint()?;
        if id == u64::from(INLINE_ID) {
            let name = reader.read_string(&self.options.limits)?;
            if name.is_empty() {
                return Err(FormatError::Malformed("empty inline name".to_string()).into());
            }
            return Ok(Arc::new(Association::inline(name, kind)));
        }

        let id = u32::try_from(id)
            .map_err(|_| FormatError::Malformed(format!("association id {} out of range", id)))?;
        let declared = scope
            .get_by_id(id)
            .cloned()
            .or_else(|| builtin::base().get(id).cloned());

        match declared {
            Some(association) if kind_matches(&association, kind) => Ok(association),
            Some(association) => Err(FormatError::TypeMismatch {
                name: association.name().to_string(),
                expected: association.kind().to_string(),
                found: kind.to_string(),
            }
            .into()),
            None if self.options.strict_ids => Err(FormatError::UnknownId(id).into()),
            None => {
                warn!(id, %kind, "unknown association id, reading as placeholder");
                Ok(Arc::new(Association::unknown(id, kind)))
            }
        }
    }

    fn read_container<R: Read>(
        &self,
        reader: &mut ByteReader<R>,
        doc: &mut Document,
        association: Arc<Association>,
        scope: &Scope,
        depth: usize,
        mode: Materialize,
    ) -> Result<NodeId> {
        let size = reader.read_varuint()?;
        let end = match size {
            0 => None,
            size => Some(reader.position().checked_add(size - 1).ok_or_else(|| {
                FormatError::Malformed(format!("container size {} out of range", size))
            })?),
        };
        let inner = scope.enter(&association);
        let mode = if names_equal(association.name(), names::HEADER) {
            Materialize::Full
        } else {
            mode
        };
        let node = doc.new_container(association);

        if let (Materialize::Shell, Some(end)) = (mode, end) {
            let position = reader.position();
            doc.set_bookmark(
                node,
                Some(Bookmark {
                    position,
                    length: Some(end - position),
                }),
            );
            doc.set_load_state(node, LoadState::None);
            reader.skip(end - position)?;
            return Ok(node);
        }

        self.read_attributes(reader, doc, node, &inner, depth + 1)?;
        let children = match mode {
            Materialize::Shallow => Materialize::Shell,
            _ => Materialize::Full,
        };
        self.read_children(reader, doc, node, &inner, depth + 1, end, children)?;

        let unread = doc
            .children(node)
            .iter()
            .any(|c| doc.load_state(*c) == LoadState::None);
        if unread {
            doc.set_load_state(node, LoadState::Partial);
        }
        Ok(node)
    }

    /// Read the attribute count and the attributes of a container
    pub(crate) fn read_attributes<R: Read>(
        &self,
        reader: &mut ByteReader<R>,
        doc: &mut Document,
        node: NodeId,
        scope: &Scope,
        depth: usize,
    ) -> Result<()> {
        let attribute_count = reader.read_varuint()?;
        for _ in 0..attribute_count {
            let attribute = self
                .read_node(reader, doc, scope, depth)?
                .ok_or_else(|| FormatError::Malformed("end marker among attributes".to_string()))?;
            if !doc.is_attribute(attribute) {
                return Err(FormatError::Malformed(format!(
                    "'{}' in attribute position is not an attribute",
                    doc.name(attribute)
                ))
                .into());
            }
            doc.append_child(node, attribute)?;
        }
        Ok(())
    }

    /// Read element children up to `end`, or up to an end marker when the
    /// container is open-ended
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn read_children<R: Read>(
        &self,
        reader: &mut ByteReader<R>,
        doc: &mut Document,
        node: NodeId,
        scope: &Scope,
        depth: usize,
        end: Option<u64>,
        mode: Materialize,
    ) -> Result<()> {
        match end {
            None => loop {
                let type_byte = reader
                    .read_u8_or_eof()?
                    .ok_or_else(|| FormatError::Unterminated(doc.name(node).to_string()))?;
                match self.read_node_with_type(type_byte, reader, doc, scope, depth, mode)? {
                    Some(child) => append_element(doc, node, child)?,
                    None => break,
                }
            },
            Some(end) => {
                while reader.position() < end {
                    let type_byte = reader.read_u8()?;
                    let child = self
                        .read_node_with_type(type_byte, reader, doc, scope, depth, mode)?
                        .ok_or_else(|| {
                            FormatError::Malformed("end marker inside a sized container".to_string())
                        })?;
                    append_element(doc, node, child)?;
                }
                if reader.position() != end {
                    return Err(FormatError::Malformed(format!(
                        "children overrun container by {} bytes",
                        reader.position() - end
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn append_element(doc: &mut Document, parent: NodeId, child: NodeId) -> Result<()> {
    if doc.is_attribute(child) {
        return Err(FormatError::Malformed(format!(
            "attribute '{}' after element children",
            doc.name(child)
        ))
        .into());
    }
    doc.append_child(parent, child)
}

fn kind_matches(association: &Association, kind: NodeKind) -> bool {
    match (association.kind(), kind) {
        (NodeKind::Primitive(PrimitiveType::Unknown), NodeKind::Primitive(_)) => true,
        (declared, found) => declared == found,
    }
}

pub(crate) fn datetime_from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

fn read_count<R: Read>(reader: &mut ByteReader<R>, limits: &Limits) -> Result<usize> {
    let count = reader.read_varuint()?;
    limits.check_array_len(count)?;
    usize::try_from(count)
        .map_err(|_| FormatError::Malformed(format!("item count {} out of range", count)).into())
}

fn read_element_type<R: Read>(reader: &mut ByteReader<R>) -> Result<ElementType> {
    let code = reader.read_u8()?;
    ElementType::from_code(code)
        .ok_or_else(|| FormatError::Malformed(format!("unknown element type {}", code)).into())
}

fn read_value<R: Read>(reader: &mut ByteReader<R>, ty: PrimitiveType, limits: &Limits) -> Result<Value> {
    Ok(match ty {
        PrimitiveType::Boolean => match reader.read_u8()? {
            0 => Value::Boolean(false),
            1 => Value::Boolean(true),
            other => {
                return Err(FormatError::Malformed(format!("invalid boolean byte {}", other)).into())
            }
        },
        PrimitiveType::Int => Value::Int(reader.read_varint()?),
        PrimitiveType::UInt => Value::UInt(reader.read_varuint()?),
        PrimitiveType::Single => Value::Single(reader.read_f32()?),
        PrimitiveType::Double => Value::Double(reader.read_f64()?),
        PrimitiveType::String => Value::String(reader.read_string(limits)?),
        PrimitiveType::DateTime => Value::DateTime(datetime_from_nanos(reader.read_i64()?)),
        PrimitiveType::Extension => Value::Extension(reader.read_blob(limits)?),
        PrimitiveType::Array => {
            let element = read_element_type(reader)?;
            let count = read_count(reader, limits)?;
            Value::Array(read_items(reader, element, count, limits)?)
        }
        PrimitiveType::Matrix => {
            let element = read_element_type(reader)?;
            let rows = read_count(reader, limits)?;
            let columns = read_count(reader, limits)?;
            let count = rows.checked_mul(columns).ok_or_else(|| {
                FormatError::Malformed(format!("{}x{} matrix is too large", rows, columns))
            })?;
            limits.check_array_len(count as u64)?;
            let items = read_items(reader, element, count, limits)?;
            Value::Matrix(MatrixValue::new(rows, columns, items)?)
        }
        PrimitiveType::CompressedFragment
        | PrimitiveType::EncryptedFragment
        | PrimitiveType::Unknown => {
            return Err(FormatError::Malformed(format!("{} has no value encoding", ty)).into())
        }
    })
}

fn read_items<R: Read>(
    reader: &mut ByteReader<R>,
    element: ElementType,
    count: usize,
    limits: &Limits,
) -> Result<ArrayValue> {
    macro_rules! items {
        ($variant:ident, $read:expr) => {{
            let mut items = Vec::with_capacity(count.min(PREALLOCATE));
            for _ in 0..count {
                items.push($read);
            }
            ArrayValue::$variant(items)
        }};
    }

    Ok(match element {
        ElementType::UInt8 => ArrayValue::UInt8(reader.read_exact_vec(count)?),
        ElementType::UInt16 => items!(UInt16, reader.read_u16()?),
        ElementType::UInt32 => items!(UInt32, reader.read_u32()?),
        ElementType::UInt64 => items!(UInt64, reader.read_u64()?),
        ElementType::Int8 => items!(Int8, reader.read_u8()? as i8),
        ElementType::Int16 => items!(Int16, reader.read_u16()? as i16),
        ElementType::Int32 => items!(Int32, reader.read_u32()? as i32),
        ElementType::Int64 => items!(Int64, reader.read_i64()?),
        ElementType::Single => items!(Single, reader.read_f32()?),
        ElementType::Double => items!(Double, reader.read_f64()?),
        ElementType::DateTime => items!(DateTime, datetime_from_nanos(reader.read_i64()?)),
        ElementType::String => items!(String, reader.read_string(limits)?),
    })
}
