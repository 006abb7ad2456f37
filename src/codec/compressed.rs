//! Compressed-fragment codec
//!
//! Layout: flags byte, payload length, raw deflate payload, then a
//! little-endian CRC-32 of the payload when the checksum flag is set. The
//! checksum covers the compressed bytes and is verified before inflating.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, warn};

use super::reader::{Materialize, NodeReader};
use super::writer::NodeWriter;
use super::{wire, WriteOptions};
use crate::dom::{checksum, Document, EncodedPayload, NodeId};
use crate::error::{Error, FormatError, IntegrityError, Result};
use crate::schema::{Association, Scope};
use crate::stream::ByteReader;

/// Deflate `raw` at the given level
pub fn deflate(raw: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(raw)
        .map_err(|e| FormatError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| FormatError::Compression(e.to_string()).into())
}

/// Inflate `compressed`, failing once the output exceeds `max_size`
pub fn inflate(compressed: &[u8], max_size: usize) -> Result<Vec<u8>> {
    let estimated = compressed.len().saturating_mul(3).clamp(1024, max_size.max(1024));
    let mut inflated = Vec::with_capacity(estimated);
    DeflateDecoder::new(compressed)
        .take(max_size as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| FormatError::Compression(e.to_string()))?;
    if inflated.len() > max_size {
        return Err(Error::LimitExceeded(format!(
            "compressed fragment inflates beyond {} bytes",
            max_size
        )));
    }
    Ok(inflated)
}

/// Serialize and deflate the children of a content fragment
pub(crate) fn compress_content(
    doc: &Document,
    content: NodeId,
    options: &WriteOptions,
) -> Result<Vec<u8>> {
    let children = doc.children(content);
    let mut writer = NodeWriter::new(doc, options);
    let mut raw_len = 0;
    for &child in children {
        raw_len += writer.measure(child)?;
    }

    let mut raw = crate::stream::ByteWriter::new(Vec::with_capacity(raw_len as usize));
    for &child in children {
        writer.write(&mut raw, child)?;
    }
    let raw = raw.into_inner()?;
    let compressed = deflate(&raw, options.compression_level)?;
    debug!(
        raw = raw.len(),
        compressed = compressed.len(),
        "compressed fragment encoded"
    );
    Ok(compressed)
}

/// Decode a compressed fragment whose head was already read
pub(crate) fn decode<R: Read>(
    nodes: &NodeReader<'_>,
    reader: &mut ByteReader<R>,
    doc: &mut Document,
    association: Arc<Association>,
    scope: &Scope,
    depth: usize,
) -> Result<NodeId> {
    let options = nodes.options();
    let limits = &options.limits;

    let flags = reader.read_u8()?;
    let len = reader.read_len(limits.max_decompressed_size, "compressed payload")?;
    let bytes = reader.read_exact_vec(len)?;
    let stored = if flags & wire::CHECKSUM_PRESENT != 0 {
        Some(reader.read_u32()?)
    } else {
        None
    };

    let computed = checksum(&bytes);
    let validated = match stored {
        Some(stored) if options.verify_checksums => {
            if stored != computed {
                warn!(
                    name = association.name(),
                    stored, computed, "compressed fragment checksum mismatch"
                );
                return Err(IntegrityError::ChecksumMismatch { stored, computed }.into());
            }
            true
        }
        _ => false,
    };

    let inflated = inflate(&bytes, limits.max_decompressed_size)?;
    let inner_scope = scope.enter(&association);
    let node = doc.new_compressed(association)?;
    let content = doc
        .compressed_content(node)
        .ok_or_else(|| Error::Value("compressed node without content".to_string()))?;

    let mut inner = ByteReader::new(&inflated[..]);
    while let Some(type_byte) = inner.read_u8_or_eof()? {
        let child = nodes
            .read_node_with_type(type_byte, &mut inner, doc, &inner_scope, depth + 1, Materialize::Full)?
            .ok_or_else(|| {
                FormatError::Malformed("end marker at compressed fragment level".to_string())
            })?;
        if doc.is_attribute(child) {
            return Err(FormatError::Malformed(format!(
                "attribute '{}' inside a compressed fragment",
                doc.name(child)
            ))
            .into());
        }
        doc.append_child(node, child)?;
    }

    if let Some(fragment) = doc.compressed_mut(node) {
        fragment.seed(
            EncodedPayload {
                bytes,
                checksum: computed,
            },
            validated,
        );
    }
    Ok(node)
}
