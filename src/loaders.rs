//! Loading of translation resources
//!
//! Include directives that name a file are read here. The encoding of the
//! file (XML or binary DML) is taken from its extension when it has a known
//! one and sniffed from the leading bytes otherwise.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs;

/// Encoding of a loaded resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFormat {
    /// XML text
    Xml,
    /// Binary DML
    Binary,
}

impl ResourceFormat {
    /// Guess the format from the first bytes of a resource.
    ///
    /// XML starts with `<` once an optional UTF-8 byte order mark and
    /// leading whitespace are skipped. A binary document starts with a
    /// type byte, which is never `<`.
    pub fn sniff(bytes: &[u8]) -> Self {
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => ResourceFormat::Xml,
            _ => ResourceFormat::Binary,
        }
    }
}

/// A loaded resource
#[derive(Debug, Clone)]
pub struct Resource {
    /// Raw content
    pub bytes: Vec<u8>,
    /// How the content is encoded
    pub format: ResourceFormat,
}

/// Reads translation resources within the configured limits
#[derive(Debug, Clone, Default)]
pub struct Loader {
    limits: Limits,
}

impl Loader {
    /// Create a loader with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `limits` for reading and for the documents read
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The limits this loader enforces
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Read a resource and settle its format
    pub fn load(&self, location: &Location) -> Result<Resource> {
        let bytes = self.load_bytes(location)?;
        let format = match location.extension().as_deref() {
            Some("xml") | Some("tsl") => ResourceFormat::Xml,
            Some("dml") => ResourceFormat::Binary,
            _ => ResourceFormat::sniff(&bytes),
        };
        Ok(Resource { bytes, format })
    }

    /// Read the raw bytes of a file location
    pub fn load_bytes(&self, location: &Location) -> Result<Vec<u8>> {
        let path = match location {
            Location::Path(path) => path,
            Location::Url(url) => {
                return Err(Error::Resource(format!(
                    "remote translations are not supported: {}",
                    url
                )))
            }
            Location::Urn(urn) => {
                return Err(Error::Resource(format!(
                    "'{}' does not name a loadable resource",
                    urn
                )))
            }
        };

        let size = fs::metadata(path)
            .map_err(|e| Error::Resource(format!("cannot open '{}': {}", path.display(), e)))?
            .len();
        self.limits
            .check_xml_size(usize::try_from(size).unwrap_or(usize::MAX))?;

        fs::read(path).map_err(|e| Error::Resource(format!("cannot read '{}': {}", path.display(), e)))
    }
}
