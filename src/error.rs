//! Error types for dml
//!
//! This module defines all error types used throughout the library.
//! Errors raised while descending into a document are wrapped with the name
//! of every node being processed, so the rendered message reads as a path of
//! containers from the outermost element down to the point of failure, while
//! [`Error::root`] still exposes the original kind for programmatic handling.

use thiserror::Error;

/// Result type alias using dml Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dml operations
#[derive(Error, Debug)]
pub enum Error {
    /// Translation (schema) error
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Structural or encoding error in a document
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Checksum validation failure
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Value error (value does not fit the declared type)
    #[error("value error: {0}")]
    Value(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// An error raised while processing a named node
    #[error("while reading {}: {source}", .path.join(" > "))]
    InContext {
        /// Node names, outermost first
        path: Vec<String>,
        /// The original error
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the name of the node being processed.
    ///
    /// Wrapping an already wrapped error prepends to its path instead of
    /// nesting, so the innermost name stays last.
    pub fn within(self, name: impl Into<String>) -> Self {
        match self {
            Error::InContext { mut path, source } => {
                path.insert(0, name.into());
                Error::InContext { path, source }
            }
            other => Error::InContext {
                path: vec![name.into()],
                source: Box::new(other),
            },
        }
    }

    /// The original error with all context stripped
    pub fn root(&self) -> &Error {
        match self {
            Error::InContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// The context path, outermost first (empty when unwrapped)
    pub fn context_path(&self) -> &[String] {
        match self {
            Error::InContext { path, .. } => path,
            _ => &[],
        }
    }

    /// Check whether the root cause is a schema error
    pub fn is_schema(&self) -> bool {
        matches!(self.root(), Error::Schema(_))
    }

    /// Check whether the root cause is a format error
    pub fn is_format(&self) -> bool {
        matches!(self.root(), Error::Format(_))
    }

    /// Check whether the root cause is an integrity error
    pub fn is_integrity(&self) -> bool {
        matches!(self.root(), Error::Integrity(_))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Extension for attaching node context to results
pub trait ResultExt<T> {
    /// Wrap the error (if any) with the name of the node being processed
    fn within(self, name: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn within(self, name: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.within(name))
    }
}

/// Translation (schema) errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Two different associations were declared with the same id in one scope
    #[error("duplicate association id {id} ('{existing}' and '{name}')")]
    DuplicateId {
        /// The conflicting id
        id: u32,
        /// Name of the association already in scope
        existing: String,
        /// Name of the association being added
        name: String,
    },

    /// An include directive named a URI nobody could resolve
    #[error("unable to resolve translation '{0}'")]
    UnresolvedUri(String),

    /// A translation includes itself, directly or indirectly
    #[error("circular inclusion of translation '{0}'")]
    CircularInclude(String),

    /// The translation document is not shaped as expected
    #[error("malformed translation: {0}")]
    Malformed(String),
}

/// Document structure and encoding errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    /// Unexpected top-level structure
    #[error("unexpected top-level structure: {0}")]
    TopLevel(String),

    /// A second document header was found
    #[error("duplicate document header")]
    DuplicateHeader,

    /// The stream ended inside a node
    #[error("truncated {0}")]
    Truncated(String),

    /// A container was never closed
    #[error("unterminated container '{0}'")]
    Unterminated(String),

    /// The encountered node kind differs from the declared association
    #[error("'{name}' is declared as {expected} but encountered {found}")]
    TypeMismatch {
        /// Association name
        name: String,
        /// Declared kind
        expected: String,
        /// Kind found in the stream or value
        found: String,
    },

    /// An id is not declared in any translation in scope
    #[error("unknown association id {0}")]
    UnknownId(u32),

    /// A primitive-set requirement cannot be satisfied
    #[error("unsupported primitive set {0}")]
    UnsupportedPrimitiveSet(String),

    /// The compressed payload could not be inflated or deflated
    #[error("compression failure: {0}")]
    Compression(String),

    /// Anything else malformed in the stream
    #[error("{0}")]
    Malformed(String),
}

/// Integrity errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    /// A compressed fragment's checksum did not match its payload
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch {
        /// Checksum read from the stream
        stored: u32,
        /// Checksum computed over the compressed bytes
        computed: u32,
    },
}
