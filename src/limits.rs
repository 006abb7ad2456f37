//! Limits and constraints for DML processing
//!
//! This module defines limits that bound resource usage while reading
//! untrusted input: nesting depth, string and blob sizes, the inflated size
//! of compressed fragments (decompression bombs), translation include depth,
//! and the size of XML input.

use crate::error::{Error, Result};

/// Resource bounds applied while reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum container nesting depth
    pub max_depth: usize,

    /// Maximum length in bytes of a single string or extension blob
    pub max_string_len: usize,

    /// Maximum number of items in a single array or matrix
    pub max_array_len: usize,

    /// Maximum inflated size of one compressed fragment
    pub max_decompressed_size: usize,

    /// Maximum depth of nested translation includes
    pub max_include_depth: usize,

    /// Maximum XML input size in bytes
    pub max_xml_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_string_len: 64 * 1024 * 1024,           // 64 MB
            max_array_len: 256 * 1024 * 1024,           // 256 M items
            max_decompressed_size: 512 * 1024 * 1024,   // 512 MB
            max_include_depth: 32,
            max_xml_size: 256 * 1024 * 1024,            // 256 MB
        }
    }
}

impl Limits {
    /// Default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits for documents from untrusted sources
    pub fn strict() -> Self {
        Self {
            max_depth: 100,
            max_string_len: 1024 * 1024,           // 1 MB
            max_array_len: 16 * 1024 * 1024,
            max_decompressed_size: 16 * 1024 * 1024, // 16 MB
            max_include_depth: 8,
            max_xml_size: 10 * 1024 * 1024,        // 10 MB
        }
    }

    /// Limits for large trusted archives
    pub fn permissive() -> Self {
        Self {
            max_depth: 10000,
            max_string_len: 1024 * 1024 * 1024,
            max_array_len: usize::MAX / 16,
            max_decompressed_size: 4 * 1024 * 1024 * 1024,
            max_include_depth: 256,
            max_xml_size: 4 * 1024 * 1024 * 1024,
        }
    }

    /// Set the maximum inflated size of a compressed fragment
    pub fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Set the maximum nesting depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Container nesting depth
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        within("nesting depth", depth as u64, self.max_depth, "")
    }

    /// Declared length of a string or extension blob
    pub fn check_string_len(&self, len: u64) -> Result<()> {
        within("string length", len, self.max_string_len, " bytes")
    }

    /// Declared item count of an array or matrix
    pub fn check_array_len(&self, len: u64) -> Result<()> {
        within("array item count", len, self.max_array_len, "")
    }

    /// Inflated size of a compressed fragment
    pub fn check_decompressed_size(&self, size: u64) -> Result<()> {
        within("decompressed fragment size", size, self.max_decompressed_size, " bytes")
    }

    /// Number of translation includes being loaded at once
    pub fn check_include_depth(&self, depth: usize) -> Result<()> {
        within("translation include depth", depth as u64, self.max_include_depth, "")
    }

    /// Size of XML input or of a translation file
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        within("input size", size as u64, self.max_xml_size, " bytes")
    }
}

fn within(what: &str, value: u64, max: usize, unit: &str) -> Result<()> {
    if value > max as u64 {
        return Err(Error::LimitExceeded(format!(
            "{} {}{} exceeds maximum {}{}",
            what, value, unit, max, unit
        )));
    }
    Ok(())
}
