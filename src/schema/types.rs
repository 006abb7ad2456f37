//! Node kinds and primitive types of the DML type system

use serde::{Serialize, Serializer};
use std::fmt;

/// The type of a primitive node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `true` / `false`
    Boolean,
    /// Signed 64-bit integer
    Int,
    /// Unsigned 64-bit integer
    UInt,
    /// 32-bit float
    Single,
    /// 64-bit float
    Double,
    /// UTF-8 text
    String,
    /// Instant in UTC
    DateTime,
    /// Homogeneous one-dimensional array
    Array,
    /// Homogeneous two-dimensional matrix
    Matrix,
    /// Embedded fragment stored compressed
    CompressedFragment,
    /// Embedded fragment stored encrypted (reserved, not implemented)
    EncryptedFragment,
    /// Opaque bytes
    Extension,
    /// Type not known to this reader
    Unknown,
}

impl PrimitiveType {
    /// All primitive types, in declaration order
    pub const ALL: [PrimitiveType; 13] = [
        PrimitiveType::Boolean,
        PrimitiveType::Int,
        PrimitiveType::UInt,
        PrimitiveType::Single,
        PrimitiveType::Double,
        PrimitiveType::String,
        PrimitiveType::DateTime,
        PrimitiveType::Array,
        PrimitiveType::Matrix,
        PrimitiveType::CompressedFragment,
        PrimitiveType::EncryptedFragment,
        PrimitiveType::Extension,
        PrimitiveType::Unknown,
    ];

    /// The name used in translation documents
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Int => "int",
            PrimitiveType::UInt => "uint",
            PrimitiveType::Single => "single",
            PrimitiveType::Double => "double",
            PrimitiveType::String => "string",
            PrimitiveType::DateTime => "datetime",
            PrimitiveType::Array => "array",
            PrimitiveType::Matrix => "matrix",
            PrimitiveType::CompressedFragment => "compressed",
            PrimitiveType::EncryptedFragment => "encrypted",
            PrimitiveType::Extension => "extension",
            PrimitiveType::Unknown => "unknown",
        }
    }

    /// Parse a translation-document type name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Whether values of this type carry an element type
    pub fn has_elements(&self) -> bool {
        matches!(self, PrimitiveType::Array | PrimitiveType::Matrix)
    }

    /// Whether this type embeds a fragment rather than a value
    pub fn is_fragment(&self) -> bool {
        matches!(
            self,
            PrimitiveType::CompressedFragment | PrimitiveType::EncryptedFragment
        )
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for PrimitiveType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Element type of an array or matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 8-bit unsigned
    UInt8,
    /// 16-bit unsigned
    UInt16,
    /// 32-bit unsigned
    UInt32,
    /// 64-bit unsigned
    UInt64,
    /// 8-bit signed
    Int8,
    /// 16-bit signed
    Int16,
    /// 32-bit signed
    Int32,
    /// 64-bit signed
    Int64,
    /// 32-bit float
    Single,
    /// 64-bit float
    Double,
    /// Instant in UTC
    DateTime,
    /// UTF-8 text
    String,
}

impl ElementType {
    /// All element types, in wire-code order
    pub const ALL: [ElementType; 12] = [
        ElementType::UInt8,
        ElementType::UInt16,
        ElementType::UInt32,
        ElementType::UInt64,
        ElementType::Int8,
        ElementType::Int16,
        ElementType::Int32,
        ElementType::Int64,
        ElementType::Single,
        ElementType::Double,
        ElementType::DateTime,
        ElementType::String,
    ];

    /// The name used in translation documents
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::UInt8 => "u8",
            ElementType::UInt16 => "u16",
            ElementType::UInt32 => "u32",
            ElementType::UInt64 => "u64",
            ElementType::Int8 => "i8",
            ElementType::Int16 => "i16",
            ElementType::Int32 => "i32",
            ElementType::Int64 => "i64",
            ElementType::Single => "single",
            ElementType::Double => "double",
            ElementType::DateTime => "datetime",
            ElementType::String => "string",
        }
    }

    /// Parse a translation-document element type name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Code written on the wire
    pub fn code(&self) -> u8 {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0) as u8 + 1
    }

    /// Element type for a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        (code as usize)
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Fixed width of one item on the wire, if fixed
    pub fn width(&self) -> Option<usize> {
        match self {
            ElementType::UInt8 | ElementType::Int8 => Some(1),
            ElementType::UInt16 | ElementType::Int16 => Some(2),
            ElementType::UInt32 | ElementType::Int32 | ElementType::Single => Some(4),
            ElementType::UInt64
            | ElementType::Int64
            | ElementType::Double
            | ElementType::DateTime => Some(8),
            ElementType::String => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ElementType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// What an association declares its nodes to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A container with attributes and children
    Container,
    /// A typed leaf
    Primitive(PrimitiveType),
}

impl NodeKind {
    /// Check if this is a container
    pub fn is_container(&self) -> bool {
        matches!(self, NodeKind::Container)
    }

    /// The primitive type, if this is a primitive kind
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match self {
            NodeKind::Container => None,
            NodeKind::Primitive(t) => Some(*t),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Container => f.write_str("container"),
            NodeKind::Primitive(t) => write!(f, "{}", t),
        }
    }
}
