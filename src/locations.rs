//! Resource location resolution
//!
//! Translation include directives name a URI. This module classifies those
//! URIs into file paths, URLs, and opaque URNs, and resolves relative paths
//! against the directory of the including document.

use std::path::{Path, PathBuf};
use url::Url;

/// Resource location - can be a URL, file path, or URN identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ...)
    Url(Url),
    /// Opaque identifier such as `urn:dml:dml3`
    Urn(String),
}

impl Location {
    /// Classify a URI, resolving relative paths against `base_dir`
    pub fn parse(uri: &str, base_dir: Option<&Path>) -> Self {
        if let Ok(url) = Url::parse(uri) {
            match url.scheme() {
                "file" => {
                    if let Ok(path) = url.to_file_path() {
                        return Location::Path(path);
                    }
                }
                "urn" => return Location::Urn(uri.to_string()),
                // Windows drive letters parse as single-letter schemes
                scheme if scheme.len() > 1 => return Location::Url(url),
                _ => {}
            }
        }

        let path = PathBuf::from(uri);
        if path.is_relative() {
            if let Some(base) = base_dir {
                return Location::Path(base.join(path));
            }
        }
        Location::Path(path)
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::Urn(s) => s.clone(),
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }

    /// Lowercased extension of the last path segment, if any
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Location::Path(p) => return p.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()),
            Location::Url(u) => u.path().rsplit('/').next().unwrap_or(""),
            Location::Urn(_) => return None,
        };
        name.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}
