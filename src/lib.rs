//! # dml
//!
//! A schema-driven, self-describing binary document format with lossless XML
//! interchange.
//!
//! A DML document is a tree of containers and typed primitives. Every node
//! is bound to an association (id, name, kind) drawn from a translation; the
//! document header names the translations the content uses, and container
//! declarations can carry nested local translations.
//!
//! ## Features
//!
//! - Compact binary encoding with variable-length ids and sizes
//! - Compressed fragments with CRC-32 integrity checks and a cached encoding
//! - Partial loading of large documents from seekable streams
//! - XML import with text-to-primitive type inference, and XML export
//! - Translation-description documents with includes and local scopes
//! - Typed views over common structures (images, tables)
//!
//! ## Example
//!
//! ```rust,ignore
//! use dml::schema::NoResolver;
//! use dml::xml::{import_str, ImportOptions};
//! use dml::codec::{to_bytes, read_document, ReadOptions, WriteOptions};
//!
//! let doc = import_str("<Root><Name>value</Name></Root>", &NoResolver, &ImportOptions::default())?;
//! let bytes = to_bytes(&doc, &WriteOptions::default())?;
//! let back = read_document(&bytes[..], &NoResolver, &ReadOptions::default())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod locations;
pub mod names;
pub mod namespaces;

// Resource loading
pub mod loaders;

// Schema and document model
pub mod dom;
pub mod schema;

// Encodings
pub mod codec;
pub mod stream;
pub mod xml;

// Re-exports for convenience
pub use dom::{Document, Header, NodeId, Value};
pub use error::{Error, Result};
pub use limits::Limits;
pub use schema::{Association, ResourceResolution, Translation};

/// Version of the dml library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
