//! Compressed fragments and their encode cache

use std::cell::{Cell, Ref, RefCell};

use super::node::NodeId;
use crate::error::{FormatError, Result};

/// Compressed payload plus the checksum computed over it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Raw deflate bytes
    pub bytes: Vec<u8>,
    /// CRC-32 of `bytes`
    pub checksum: u32,
}

/// State of the encode cache
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheState {
    /// Must be recomputed before the next write
    #[default]
    Stale,
    /// Computed from the current content
    Valid(EncodedPayload),
}

/// A primitive whose content is a fragment stored compressed
///
/// The cache is `Valid` only while the embedded fragment is the one it was
/// computed from and nothing inside it changed; the document moves it back
/// to `Stale` on every mutation below the wrapper and on reassignment of
/// the content.
#[derive(Debug)]
pub struct CompressedFragment {
    content: NodeId,
    cache: RefCell<CacheState>,
    generation: u64,
    compressions: Cell<u64>,
    validated: bool,
}

impl CompressedFragment {
    pub(crate) fn new(content: NodeId) -> Self {
        Self {
            content,
            cache: RefCell::new(CacheState::Stale),
            generation: 0,
            compressions: Cell::new(0),
            validated: false,
        }
    }

    /// The embedded fragment
    pub fn content(&self) -> NodeId {
        self.content
    }

    pub(crate) fn set_content(&mut self, content: NodeId) {
        self.content = content;
        self.invalidate();
    }

    pub(crate) fn invalidate(&mut self) {
        *self.cache.get_mut() = CacheState::Stale;
        self.generation += 1;
        self.validated = false;
    }

    /// Incremented every time the cache is invalidated
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of times the content was actually compressed
    pub fn compression_count(&self) -> u64 {
        self.compressions.get()
    }

    /// True only if the fragment was decoded with a matching checksum
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Whether a write can reuse the cached payload
    pub fn is_cached(&self) -> bool {
        matches!(*self.cache.borrow(), CacheState::Valid(_))
    }

    /// Snapshot of the cache state
    pub fn cache_state(&self) -> CacheState {
        self.cache.borrow().clone()
    }

    /// Record a payload read from a stream so an unchanged fragment is
    /// written back without recompressing
    pub(crate) fn seed(&mut self, payload: EncodedPayload, validated: bool) {
        *self.cache.get_mut() = CacheState::Valid(payload);
        self.validated = validated;
    }

    /// Return the cached payload, running `compress` first if it is stale.
    ///
    /// The first call after an invalidation compresses; every later call
    /// returns the same bytes and checksum until the next invalidation.
    pub fn encoded_with<F>(&self, compress: F) -> Result<Ref<'_, EncodedPayload>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if !self.is_cached() {
            let bytes = compress()?;
            let checksum = checksum(&bytes);
            self.compressions.set(self.compressions.get() + 1);
            *self.cache.borrow_mut() = CacheState::Valid(EncodedPayload { bytes, checksum });
        }

        Ref::filter_map(self.cache.borrow(), |state| match state {
            CacheState::Valid(payload) => Some(payload),
            CacheState::Stale => None,
        })
        .map_err(|_| FormatError::Compression("encode cache unavailable".to_string()).into())
    }
}

/// CRC-32 of a byte slice
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(bytes);
    crc.sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_reused_until_invalidated() {
        let mut fragment = CompressedFragment::new(NodeId(1));
        let first = fragment.encoded_with(|| Ok(vec![1, 2, 3])).unwrap().clone();
        let second = fragment
            .encoded_with(|| panic!("cache must be reused"))
            .unwrap()
            .clone();
        assert_eq!(first, second);
        assert_eq!(fragment.compression_count(), 1);

        let generation = fragment.generation();
        fragment.set_content(NodeId(2));
        assert!(!fragment.is_cached());
        assert!(fragment.generation() > generation);

        fragment.encoded_with(|| Ok(vec![4])).unwrap();
        assert_eq!(fragment.compression_count(), 2);
    }

    #[test]
    fn test_failed_compress_leaves_cache_stale() {
        let fragment = CompressedFragment::new(NodeId(1));
        let result = fragment.encoded_with(|| Err(FormatError::Compression("boom".into()).into()));
        assert!(result.is_err());
        assert_eq!(fragment.cache_state(), CacheState::Stale);
    }

    #[test]
    fn test_checksum_is_crc32() {
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_seeded_cache_is_validated() {
        let mut fragment = CompressedFragment::new(NodeId(1));
        assert!(!fragment.is_validated());
        fragment.seed(
            EncodedPayload {
                bytes: vec![9],
                checksum: checksum(&[9]),
            },
            true,
        );
        assert!(fragment.is_validated());
        assert!(fragment.is_cached());
        fragment.invalidate();
        assert!(!fragment.is_validated());
    }
}
