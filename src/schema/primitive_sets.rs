//! Primitive sets: named codec capabilities a document depends on

use serde::Serialize;
use std::fmt;

/// Primitive set covering the scalar types
pub const COMMON_SET: &str = "common";

/// Primitive set covering arrays and matrices
pub const ARRAYS_SET: &str = "arrays";

/// Primitive set covering compressed fragments and extension blobs
pub const EXTENSION_SET: &str = "dml-ext";

/// Little-endian codec
pub const LITTLE_ENDIAN: &str = "le";

/// Raw deflate codec for compressed fragments
pub const DEFLATE: &str = "deflate";

/// A primitive-set requirement: set name plus optional codec
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PrimitiveSet {
    /// Set name, e.g. `common`
    pub set: String,
    /// Codec, e.g. `le`
    pub codec: Option<String>,
}

impl PrimitiveSet {
    /// Create a requirement
    pub fn new(set: impl Into<String>, codec: Option<&str>) -> Self {
        Self {
            set: set.into(),
            codec: codec.map(str::to_string),
        }
    }

    /// Check whether this crate's codecs satisfy the requirement
    pub fn is_supported(&self) -> bool {
        let codec = self.codec.as_deref();
        match self.set.as_str() {
            COMMON_SET | ARRAYS_SET => matches!(codec, None | Some(LITTLE_ENDIAN)),
            EXTENSION_SET => matches!(codec, None | Some(DEFLATE)),
            "base" => true,
            _ => false,
        }
    }
}

impl fmt::Display for PrimitiveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.codec {
            Some(codec) => write!(f, "'{}' (codec '{}')", self.set, codec),
            None => write!(f, "'{}'", self.set),
        }
    }
}

/// Append `set` unless an equal requirement is already present
pub fn merge_into(sets: &mut Vec<PrimitiveSet>, set: PrimitiveSet) {
    if !sets.contains(&set) {
        sets.push(set);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_sets() {
        assert!(PrimitiveSet::new(COMMON_SET, Some(LITTLE_ENDIAN)).is_supported());
        assert!(PrimitiveSet::new(ARRAYS_SET, None).is_supported());
        assert!(PrimitiveSet::new(EXTENSION_SET, Some(DEFLATE)).is_supported());
        assert!(!PrimitiveSet::new(COMMON_SET, Some("be")).is_supported());
        assert!(!PrimitiveSet::new("decimal-float", None).is_supported());
    }

    #[test]
    fn test_merge_keeps_first_appearance() {
        let mut sets = Vec::new();
        merge_into(&mut sets, PrimitiveSet::new("common", Some("le")));
        merge_into(&mut sets, PrimitiveSet::new("arrays", Some("le")));
        merge_into(&mut sets, PrimitiveSet::new("common", Some("le")));
        merge_into(&mut sets, PrimitiveSet::new("common", Some("be")));

        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0], PrimitiveSet::new("common", Some("le")));
        assert_eq!(sets[2].codec.as_deref(), Some("be"));
    }
}
