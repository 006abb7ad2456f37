//! DML name validation and utilities
//!
//! Association names double as XML element and attribute names, so they
//! follow the XML Name production with an optional `Prefix:` scope
//! component. Name lookups in DML are case-insensitive.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Separator between a scope prefix and a local name
pub const SCOPE_SEPARATOR: char = ':';

static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\-\.0-9\u{B7}]*$")
        .unwrap()
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    NCNAME.is_match(name)
}

/// Check if a string is a valid association name (`Local` or `Prefix:Local`)
pub fn is_valid_name(name: &str) -> bool {
    match split_prefix(name) {
        (Some(prefix), local) => is_valid_ncname(prefix) && is_valid_ncname(local),
        (None, local) => is_valid_ncname(local),
    }
}

/// Validate an association name and return an error if invalid
pub fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::Value(format!("invalid DML name: '{}'", name)))
    }
}

/// Split a name into its scope prefix and local name
pub fn split_prefix(name: &str) -> (Option<&str>, &str) {
    match name.split_once(SCOPE_SEPARATOR) {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Normalize a name for case-insensitive lookup
pub fn lookup_key(name: &str) -> String {
    name.to_lowercase()
}

/// Compare two names the way association lookup does
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("Image"));
        assert!(is_valid_name("Include-Translation"));
        assert!(is_valid_name("DML:Header"));
        assert!(is_valid_name("_private"));

        assert!(!is_valid_name(""));
        assert!(!is_valid_name("123"));
        assert!(!is_valid_name(":Header"));
        assert!(!is_valid_name("DML:"));
        assert!(!is_valid_name("a:b:c"));
    }

    #[test]
    fn test_split_prefix() {
        assert_eq!(split_prefix("Width"), (None, "Width"));
        assert_eq!(split_prefix("DML:Version"), (Some("DML"), "Version"));
    }

    #[test]
    fn test_names_equal_ignores_case() {
        assert!(names_equal("Width", "WIDTH"));
        assert!(names_equal("dml:header", "DML:Header"));
        assert!(names_equal("Ärger", "ärger"));
        assert!(!names_equal("Width", "Height"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Point").is_ok());
        assert!(validate_name("1Point").is_err());
    }
}
