//! Binary DML encoding
//!
//! A binary document is an optional leading `DML:Header` container followed
//! by the top-level content. Each node starts with a type byte (wire kind in
//! the low seven bits, attribute flag in bit 7) and a variable-length
//! association id; id 0 is followed by the node's name instead. Containers
//! carry their body length (or 0 for an open-ended body closed by an end
//! marker), then an attribute count, the attributes and the children.

mod compressed;
mod reader;
mod writer;

use std::io::{Read, Seek, Write};
use std::sync::Arc;
use tracing::debug;

use crate::dom::{Document, Header, LoadState, NodeId};
use crate::error::{FormatError, Result, ResultExt};
use crate::limits::Limits;
use crate::names::names_equal;
use crate::schema::builtin::{self, names};
use crate::schema::{
    NodeKind, PrimitiveType, ResourceResolution, Scope, Translation, TranslationResolver,
};
use crate::stream::{ByteReader, ByteWriter};

pub use compressed::{deflate, inflate};

use reader::{Materialize, NodeReader};
use writer::NodeWriter;

/// Wire constants
pub mod wire {
    /// Closes an open-ended container
    pub const END: u8 = 0x00;
    /// Container node
    pub const CONTAINER: u8 = 0x01;
    /// Set on the type byte of attribute-position primitives
    pub const ATTRIBUTE_FLAG: u8 = 0x80;
    /// Bits of the type byte holding the wire kind
    pub const KIND_MASK: u8 = 0x7F;
    /// Compressed-fragment flag: a CRC-32 follows the payload
    pub const CHECKSUM_PRESENT: u8 = 0x01;
}

/// Wire code of a node kind; [`PrimitiveType::Unknown`] has none
pub fn kind_code(kind: NodeKind) -> Option<u8> {
    match kind {
        NodeKind::Container => Some(wire::CONTAINER),
        NodeKind::Primitive(PrimitiveType::Unknown) => None,
        NodeKind::Primitive(ty) => PrimitiveType::ALL
            .iter()
            .position(|t| *t == ty)
            .map(|i| i as u8 + 2),
    }
}

/// Node kind for a wire code
pub fn kind_from_code(code: u8) -> Option<NodeKind> {
    match code {
        wire::END => None,
        wire::CONTAINER => Some(NodeKind::Container),
        _ => PrimitiveType::ALL
            .get(code as usize - 2)
            .copied()
            .filter(|t| *t != PrimitiveType::Unknown)
            .map(NodeKind::Primitive),
    }
}

/// How much of the content to materialize while reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Read everything
    #[default]
    Full,
    /// Read the top-level container's attributes and primitives; its
    /// child containers are bookmarked, unread, for
    /// [`DocumentReader::load_children`]
    Partial,
}

/// Options for reading binary documents
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Resource limits
    pub limits: Limits,
    /// Fail on ids no translation in scope declares
    pub strict_ids: bool,
    /// Fail on compressed fragments whose checksum does not match
    pub verify_checksums: bool,
    /// Full or partial loading
    pub load_mode: LoadMode,
    /// Global translation for documents without a header
    pub translation: Option<Arc<Translation>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            strict_ids: false,
            verify_checksums: true,
            load_mode: LoadMode::Full,
            translation: None,
        }
    }
}

impl ReadOptions {
    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Fail on undeclared ids instead of reading them as unknown
    pub fn with_strict_ids(mut self, strict: bool) -> Self {
        self.strict_ids = strict;
        self
    }

    /// Enable or disable checksum verification
    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Set the load mode
    pub fn with_load_mode(mut self, mode: LoadMode) -> Self {
        self.load_mode = mode;
        self
    }

    /// Global translation used when the document has no header
    pub fn with_translation(mut self, translation: Arc<Translation>) -> Self {
        self.translation = Some(translation);
        self
    }
}

/// Options for writing binary documents
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Deflate level, 0 (store) to 9 (best)
    pub compression_level: u32,
    /// Append a CRC-32 to compressed fragments
    pub write_checksums: bool,
    /// Write containers open-ended instead of length-prefixed
    pub open_ended: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
            write_checksums: true,
            open_ended: false,
        }
    }
}

impl WriteOptions {
    /// Set the deflate level (clamped to 9)
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Enable or disable checksums on compressed fragments
    pub fn with_checksums(mut self, checksums: bool) -> Self {
        self.write_checksums = checksums;
        self
    }

    /// Write containers open-ended
    pub fn with_open_ended(mut self, open_ended: bool) -> Self {
        self.open_ended = open_ended;
        self
    }
}

/// Reads binary documents from a stream
///
/// With a seekable stream and [`LoadMode::Partial`], the child containers
/// of the top-level container stay in the stream until
/// [`DocumentReader::load_children`] is called. The reader must not be
/// shared with other consumers of the stream in between.
pub struct DocumentReader<'r, R> {
    reader: ByteReader<R>,
    resolution: &'r dyn ResourceResolution,
    options: ReadOptions,
}

impl<'r, R: Read> DocumentReader<'r, R> {
    /// Create a reader over a plain stream
    pub fn new(source: R, resolution: &'r dyn ResourceResolution, options: ReadOptions) -> Self {
        Self {
            reader: ByteReader::new(source),
            resolution,
            options,
        }
    }

    /// Read the document
    pub fn read(&mut self) -> Result<Document> {
        let initial = self
            .options
            .translation
            .clone()
            .unwrap_or_else(builtin::tsl_document);
        let mut document = Document::new(Arc::clone(&initial));
        let mut scope = Scope::new(initial);
        let nodes = NodeReader::new(&self.options);

        let mut header_seen = false;
        let mut content_seen = false;
        let mut first = true;

        while let Some(type_byte) = self.reader.read_u8_or_eof()? {
            let mode = match self.options.load_mode {
                LoadMode::Partial => Materialize::Shallow,
                LoadMode::Full => Materialize::Full,
            };
            let node = nodes
                .read_node_with_type(type_byte, &mut self.reader, &mut document, &scope, 0, mode)?
                .ok_or_else(|| FormatError::TopLevel("end marker at top level".to_string()))?;
            let is_first = std::mem::replace(&mut first, false);

            if document.is_container(node) && names_equal(document.name(node), names::HEADER) {
                if header_seen {
                    return Err(FormatError::DuplicateHeader.into());
                }
                if !is_first {
                    return Err(FormatError::TopLevel(
                        "document header must come first".to_string(),
                    )
                    .into());
                }
                header_seen = true;
                let header = Header::from_container(&document, node).within(names::HEADER)?;
                let global = self.resolve_header(&header)?;
                document.set_global_translation(Arc::clone(&global));
                document.set_header(Some(header));
                scope = Scope::new(global);
                continue;
            }

            if document.is_container(node) {
                if content_seen {
                    return Err(FormatError::TopLevel(format!(
                        "second content container '{}'",
                        document.name(node)
                    ))
                    .into());
                }
                content_seen = true;
            }
            let body = document.body();
            document.append_child(body, node)?;
        }

        debug!(
            nodes = document.node_count(),
            header = header_seen,
            "binary document read"
        );
        Ok(document)
    }

    fn resolve_header(&self, header: &Header) -> Result<Arc<Translation>> {
        resolve_global(header, self.resolution, &self.options.limits)
    }
}

/// Resolve the global translation a header declares, checking that every
/// required primitive set is supported
pub(crate) fn resolve_global(
    header: &Header,
    resolution: &dyn ResourceResolution,
    limits: &Limits,
) -> Result<Arc<Translation>> {
    header.check_readable()?;
    let resolved = TranslationResolver::new(resolution)
        .with_limits(limits.clone())
        .resolve_header(header)
        .within(names::HEADER)?;
    if let Some(set) = resolved.required_sets.iter().find(|s| !s.is_supported()) {
        return Err(FormatError::UnsupportedPrimitiveSet(set.to_string()).into());
    }
    debug!(
        translations = header.translations.len(),
        associations = resolved.translation.len(),
        "header resolved"
    );
    Ok(resolved.translation)
}

impl<'r, R: Read + Seek> DocumentReader<'r, R> {
    /// Create a reader over a seekable stream
    pub fn seekable(
        source: R,
        resolution: &'r dyn ResourceResolution,
        options: ReadOptions,
    ) -> Result<Self> {
        Ok(Self {
            reader: ByteReader::seekable(source)?,
            resolution,
            options,
        })
    }

    /// Materialize the rest of a container read with [`LoadMode::Partial`].
    ///
    /// An unread container (`LoadState::None`) gets its attributes and
    /// subtree; a partially loaded one has each unread child loaded. A
    /// no-op on fully loaded nodes. The stream position is restored
    /// afterwards.
    pub fn load_children(&mut self, document: &mut Document, node: NodeId) -> Result<()> {
        match document.load_state(node) {
            LoadState::Full => return Ok(()),
            LoadState::Partial => {
                let unread: Vec<NodeId> = document
                    .children(node)
                    .iter()
                    .copied()
                    .filter(|c| document.load_state(*c) == LoadState::None)
                    .collect();
                let name = document.name(node).to_string();
                for child in unread {
                    self.load_children(document, child).within(name.as_str())?;
                }
            }
            LoadState::None => self.load_unread(document, node)?,
        }

        document.set_load_state(node, LoadState::Full);
        document.set_bookmark(node, None);
        Ok(())
    }

    fn load_unread(&mut self, document: &mut Document, node: NodeId) -> Result<()> {
        let bookmark = document.bookmark(node).ok_or_else(|| {
            FormatError::Malformed(format!("'{}' has no bookmark", document.name(node)))
        })?;
        let end = bookmark
            .position
            .checked_add(bookmark.length.unwrap_or(0))
            .ok_or_else(|| FormatError::Malformed("bookmark out of range".to_string()))?;

        let saved = self.reader.position();
        self.reader.seek_to(bookmark.position)?;
        let scope = document.scope_of(node);
        let name = document.name(node).to_string();
        let nodes = NodeReader::new(&self.options);
        let result = match nodes.read_attributes(&mut self.reader, document, node, &scope, 1) {
            Ok(()) => nodes.read_children(
                &mut self.reader,
                document,
                node,
                &scope,
                1,
                Some(end),
                Materialize::Full,
            ),
            Err(e) => Err(e),
        }
        .within(name);
        self.reader.seek_to(saved)?;
        result
    }
}

/// Read a binary document
pub fn read_document<R: Read>(
    source: R,
    resolution: &dyn ResourceResolution,
    options: &ReadOptions,
) -> Result<Document> {
    let options = options.clone().with_load_mode(LoadMode::Full);
    DocumentReader::new(source, resolution, options).read()
}

/// Write a binary document
pub fn write_document<W: Write>(document: &Document, sink: W, options: &WriteOptions) -> Result<()> {
    let body = document.body();
    let containers = document
        .children(body)
        .iter()
        .filter(|n| document.is_container(**n))
        .count();
    if containers > 1 {
        return Err(FormatError::TopLevel(format!(
            "{} top-level containers, at most one allowed",
            containers
        ))
        .into());
    }

    let mut out = ByteWriter::new(sink);
    if let Some(header) = document.header() {
        let mut scratch = Document::new(builtin::base());
        let node = header.to_container(&mut scratch)?;
        let mut header_writer = NodeWriter::new(&scratch, options);
        header_writer.measure(node)?;
        header_writer.write(&mut out, node)?;
    }

    let mut nodes = NodeWriter::new(document, options);
    for &child in document.children(body) {
        nodes.measure(child)?;
    }
    for &child in document.children(body) {
        nodes.write(&mut out, child)?;
    }
    out.into_inner()?;
    Ok(())
}

/// Encode a document to bytes
pub fn to_bytes(document: &Document, options: &WriteOptions) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_document(document, &mut bytes, options)?;
    Ok(bytes)
}

/// Count the compressed fragments of a document whose checksum was verified
/// while reading, and all compressed fragments
pub fn validation_summary(document: &Document) -> (usize, usize) {
    let compressed: Vec<_> = document
        .descendants(document.body())
        .into_iter()
        .filter_map(|n| document.compressed(n))
        .collect();
    let validated = compressed.iter().filter(|c| c.is_validated()).count();
    (validated, compressed.len())
}
