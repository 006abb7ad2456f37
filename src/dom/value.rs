//! Typed primitive values

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::{Association, ElementType, PrimitiveType};

/// Homogeneous one-dimensional array
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    /// `u8` items
    UInt8(Vec<u8>),
    /// `u16` items
    UInt16(Vec<u16>),
    /// `u32` items
    UInt32(Vec<u32>),
    /// `u64` items
    UInt64(Vec<u64>),
    /// `i8` items
    Int8(Vec<i8>),
    /// `i16` items
    Int16(Vec<i16>),
    /// `i32` items
    Int32(Vec<i32>),
    /// `i64` items
    Int64(Vec<i64>),
    /// `f32` items
    Single(Vec<f32>),
    /// `f64` items
    Double(Vec<f64>),
    /// UTC instants
    DateTime(Vec<DateTime<Utc>>),
    /// Strings
    String(Vec<String>),
}

macro_rules! for_each_array {
    ($value:expr, $items:ident => $body:expr) => {
        match $value {
            ArrayValue::UInt8($items) => $body,
            ArrayValue::UInt16($items) => $body,
            ArrayValue::UInt32($items) => $body,
            ArrayValue::UInt64($items) => $body,
            ArrayValue::Int8($items) => $body,
            ArrayValue::Int16($items) => $body,
            ArrayValue::Int32($items) => $body,
            ArrayValue::Int64($items) => $body,
            ArrayValue::Single($items) => $body,
            ArrayValue::Double($items) => $body,
            ArrayValue::DateTime($items) => $body,
            ArrayValue::String($items) => $body,
        }
    };
}

impl ArrayValue {
    /// An empty array of the given element type
    pub fn empty(element: ElementType) -> Self {
        match element {
            ElementType::UInt8 => ArrayValue::UInt8(Vec::new()),
            ElementType::UInt16 => ArrayValue::UInt16(Vec::new()),
            ElementType::UInt32 => ArrayValue::UInt32(Vec::new()),
            ElementType::UInt64 => ArrayValue::UInt64(Vec::new()),
            ElementType::Int8 => ArrayValue::Int8(Vec::new()),
            ElementType::Int16 => ArrayValue::Int16(Vec::new()),
            ElementType::Int32 => ArrayValue::Int32(Vec::new()),
            ElementType::Int64 => ArrayValue::Int64(Vec::new()),
            ElementType::Single => ArrayValue::Single(Vec::new()),
            ElementType::Double => ArrayValue::Double(Vec::new()),
            ElementType::DateTime => ArrayValue::DateTime(Vec::new()),
            ElementType::String => ArrayValue::String(Vec::new()),
        }
    }

    /// Element type of the items
    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayValue::UInt8(_) => ElementType::UInt8,
            ArrayValue::UInt16(_) => ElementType::UInt16,
            ArrayValue::UInt32(_) => ElementType::UInt32,
            ArrayValue::UInt64(_) => ElementType::UInt64,
            ArrayValue::Int8(_) => ElementType::Int8,
            ArrayValue::Int16(_) => ElementType::Int16,
            ArrayValue::Int32(_) => ElementType::Int32,
            ArrayValue::Int64(_) => ElementType::Int64,
            ArrayValue::Single(_) => ElementType::Single,
            ArrayValue::Double(_) => ElementType::Double,
            ArrayValue::DateTime(_) => ElementType::DateTime,
            ArrayValue::String(_) => ElementType::String,
        }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        for_each_array!(self, items => items.len())
    }

    /// Check if there are no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Homogeneous two-dimensional matrix, stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixValue {
    rows: usize,
    columns: usize,
    data: ArrayValue,
}

impl MatrixValue {
    /// Create a matrix; `data` must hold exactly `rows * columns` items
    pub fn new(rows: usize, columns: usize, data: ArrayValue) -> Result<Self> {
        let expected = rows
            .checked_mul(columns)
            .ok_or_else(|| Error::Value(format!("{}x{} matrix is too large", rows, columns)))?;
        if data.len() != expected {
            return Err(Error::Value(format!(
                "{}x{} matrix needs {} items, got {}",
                rows,
                columns,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            rows,
            columns,
            data,
        })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Items in row-major order
    pub fn data(&self) -> &ArrayValue {
        &self.data
    }

    /// Element type of the items
    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }
}

/// Value held by a primitive node
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean
    Boolean(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// 32-bit float
    Single(f32),
    /// 64-bit float
    Double(f64),
    /// Text
    String(String),
    /// Instant in UTC
    DateTime(DateTime<Utc>),
    /// One-dimensional array
    Array(ArrayValue),
    /// Two-dimensional matrix
    Matrix(MatrixValue),
    /// Opaque bytes
    Extension(Vec<u8>),
}

impl Value {
    /// The primitive type this value belongs to
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Value::Boolean(_) => PrimitiveType::Boolean,
            Value::Int(_) => PrimitiveType::Int,
            Value::UInt(_) => PrimitiveType::UInt,
            Value::Single(_) => PrimitiveType::Single,
            Value::Double(_) => PrimitiveType::Double,
            Value::String(_) => PrimitiveType::String,
            Value::DateTime(_) => PrimitiveType::DateTime,
            Value::Array(_) => PrimitiveType::Array,
            Value::Matrix(_) => PrimitiveType::Matrix,
            Value::Extension(_) => PrimitiveType::Extension,
        }
    }

    /// Element type of an array or matrix value
    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            Value::Array(a) => Some(a.element_type()),
            Value::Matrix(m) => Some(m.element_type()),
            _ => None,
        }
    }

    /// Check whether this value may be stored under `association`
    pub fn fits(&self, association: &Association) -> bool {
        match association.primitive_type() {
            None => false,
            Some(PrimitiveType::Unknown) => true,
            Some(ty) if ty != self.primitive_type() => false,
            Some(_) => match (association.element_type(), self.element_type()) {
                (Some(declared), Some(actual)) => declared == actual,
                _ => true,
            },
        }
    }

    /// Strictly parse text as a value of `ty`.
    ///
    /// Returns `None` when the text is not a valid value of the type, and for
    /// types that have no text form (arrays, matrices, fragments, unknown).
    pub fn parse(ty: PrimitiveType, text: &str) -> Option<Value> {
        let trimmed = text.trim();
        match ty {
            PrimitiveType::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(Value::Boolean(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(Value::Boolean(false))
                } else {
                    None
                }
            }
            PrimitiveType::Int => trimmed.parse().ok().map(Value::Int),
            PrimitiveType::UInt => trimmed.parse().ok().map(Value::UInt),
            PrimitiveType::Single => trimmed.parse().ok().map(Value::Single),
            PrimitiveType::Double => trimmed.parse().ok().map(Value::Double),
            PrimitiveType::String => Some(Value::String(text.to_string())),
            PrimitiveType::DateTime => DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
            PrimitiveType::Extension => STANDARD.decode(trimmed).ok().map(Value::Extension),
            PrimitiveType::Array
            | PrimitiveType::Matrix
            | PrimitiveType::CompressedFragment
            | PrimitiveType::EncryptedFragment
            | PrimitiveType::Unknown => None,
        }
    }

    /// Text form used in XML.
    ///
    /// Floating-point values use plain decimal notation, instants the
    /// canonical UTC form, and extension bytes base64. Arrays and matrices
    /// have no text form; a short opaque description stands in for them.
    pub fn to_text(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Single(f) => f.to_string(),
            Value::Double(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => format_datetime(dt),
            Value::Extension(bytes) => STANDARD.encode(bytes),
            Value::Array(a) => format!("array of {} {}", a.len(), a.element_type()),
            Value::Matrix(m) => format!(
                "matrix of {}x{} {}",
                m.rows(),
                m.columns(),
                m.element_type()
            ),
        }
    }

    /// Has a text form that parses back to the same value
    pub fn has_text_form(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Matrix(_))
    }

    /// Interpret as an unsigned integer, parsing text if needed
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as a signed integer, parsing text if needed
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as a double, parsing text if needed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Single(f) => Some(f64::from(*f)),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret as a boolean, parsing text if needed
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => match Value::parse(PrimitiveType::Boolean, s) {
                Some(Value::Boolean(b)) => Some(b),
                _ => None,
            },
            _ => None,
        }
    }

    /// Borrow the text of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow an array value
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Canonical UTC text form of an instant
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_strict_parse() {
        assert_eq!(Value::parse(PrimitiveType::UInt, "42"), Some(Value::UInt(42)));
        assert_eq!(Value::parse(PrimitiveType::UInt, " 42 "), Some(Value::UInt(42)));
        assert_eq!(Value::parse(PrimitiveType::UInt, "-1"), None);
        assert_eq!(Value::parse(PrimitiveType::Int, "-1"), Some(Value::Int(-1)));
        assert_eq!(Value::parse(PrimitiveType::Int, "1.5"), None);
        assert_eq!(Value::parse(PrimitiveType::Double, "2.5"), Some(Value::Double(2.5)));
        assert_eq!(Value::parse(PrimitiveType::Boolean, "TRUE"), Some(Value::Boolean(true)));
        assert_eq!(Value::parse(PrimitiveType::Boolean, "yes"), None);
        assert_eq!(Value::parse(PrimitiveType::Array, "1 2 3"), None);
    }

    #[test]
    fn test_string_parse_keeps_whitespace() {
        assert_eq!(
            Value::parse(PrimitiveType::String, "  padded "),
            Some(Value::String("  padded ".into()))
        );
    }

    #[test]
    fn test_datetime_text_is_canonical_utc() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let value = Value::DateTime(dt);
        assert_eq!(value.to_text(), "2024-03-01T12:30:00Z");

        let parsed = Value::parse(PrimitiveType::DateTime, "2024-03-01T14:30:00+02:00");
        assert_eq!(parsed, Some(value));
    }

    #[test]
    fn test_double_text_is_fixed_notation() {
        assert_eq!(Value::Double(1e21).to_text(), "1000000000000000000000");
        assert_eq!(Value::Double(0.25).to_text(), "0.25");
        assert_eq!(Value::Single(1.5).to_text(), "1.5");
    }

    #[test]
    fn test_extension_is_base64() {
        let value = Value::Extension(vec![0, 1, 2, 255]);
        let text = value.to_text();
        assert_eq!(Value::parse(PrimitiveType::Extension, &text), Some(value));
    }

    #[test]
    fn test_fits_checks_type_and_element() {
        let data = Association::array(1, "Data", PrimitiveType::Array, ElementType::UInt8);
        assert!(Value::Array(ArrayValue::UInt8(vec![1])).fits(&data));
        assert!(!Value::Array(ArrayValue::Int32(vec![1])).fits(&data));
        assert!(!Value::UInt(1).fits(&data));

        let any = Association::primitive(2, "Any", PrimitiveType::Unknown);
        assert!(Value::UInt(1).fits(&any));
    }

    #[test]
    fn test_matrix_shape_checked() {
        assert!(MatrixValue::new(2, 2, ArrayValue::Double(vec![1.0; 4])).is_ok());
        assert!(MatrixValue::new(2, 3, ArrayValue::Double(vec![1.0; 4])).is_err());
    }

    #[test]
    fn test_lenient_accessors() {
        assert_eq!(Value::String("7".into()).as_u64(), Some(7));
        assert_eq!(Value::Int(-7).as_u64(), None);
        assert_eq!(Value::UInt(3).as_f64(), Some(3.0));
        assert_eq!(Value::String("false".into()).as_bool(), Some(false));
    }
}
