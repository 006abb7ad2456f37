//! Document model
//!
//! A document is a tree of fragments, containers and typed primitives held
//! in an arena owned by [`Document`]. Containers carry attributes and bind
//! to one association; primitives hold a [`Value`] or, for compressed
//! fragments, an embedded fragment with a lazily computed encoding.

mod compressed;
mod document;
mod header;
mod info;
mod node;
mod value;

pub use compressed::{checksum, CacheState, CompressedFragment, EncodedPayload};
pub use document::{Document, FRAGMENT_NAME};
pub(crate) use document::builtin_association;
pub use header::Header;
pub use info::{ColumnInfo, ImageInfo, TableInfo, DEFAULT_FORMAT};
pub use node::{LoadState, NodeId, NodeSnapshot};
pub use value::{format_datetime, ArrayValue, MatrixValue, Value};
