//! Built-in translations
//!
//! Two translations are known without external resolution: the base
//! structural translation (`urn:dml:dml3`), in force at the top of every
//! document, and the translation-description translation (`urn:dml:tsl2`)
//! used by documents that declare other translations. Both are built once
//! per process and shared read-only.

use once_cell::sync::Lazy;
use std::sync::Arc;

use super::association::Association;
use super::translation::Translation;
use super::types::PrimitiveType;

/// URI of the base structural translation
pub const DML3_URN: &str = "urn:dml:dml3";

/// URI of the translation-description translation
pub const TSL2_URN: &str = "urn:dml:tsl2";

/// Reserved ids of the built-in associations
pub mod ids {
    /// `DML:Header`
    pub const HEADER: u32 = 0x7F00;
    /// `DML:Version`
    pub const VERSION: u32 = 0x7F01;
    /// `DML:ReadVersion`
    pub const READ_VERSION: u32 = 0x7F02;
    /// `DML:DocType`
    pub const DOC_TYPE: u32 = 0x7F03;
    /// `DML:Include-Translation`
    pub const INCLUDE_TRANSLATION: u32 = 0x7F04;
    /// `DML:URI`
    pub const URI: u32 = 0x7F05;
    /// `DML:Include-Primitives`
    pub const INCLUDE_PRIMITIVES: u32 = 0x7F06;
    /// `DML:Set`
    pub const SET: u32 = 0x7F07;
    /// `DML:Codec`
    pub const CODEC: u32 = 0x7F08;
    /// `DML:Comment`
    pub const COMMENT: u32 = 0x7F09;
    /// `DML:Compressed`
    pub const COMPRESSED: u32 = 0x7F0A;
    /// `DML:Encrypted`
    pub const ENCRYPTED: u32 = 0x7F0B;
    /// `DML:Padding`
    pub const PADDING: u32 = 0x7F0C;

    /// `DML:Translation`
    pub const TRANSLATION: u32 = 0x7E00;
    /// `Container` declaration
    pub const TSL_CONTAINER: u32 = 0x7E01;
    /// `Node` declaration
    pub const TSL_NODE: u32 = 0x7E02;
    /// `id` attribute
    pub const TSL_ID: u32 = 0x7E03;
    /// `name` attribute
    pub const TSL_NAME: u32 = 0x7E04;
    /// `type` attribute
    pub const TSL_TYPE: u32 = 0x7E05;
    /// `element-type` attribute
    pub const TSL_ELEMENT_TYPE: u32 = 0x7E06;
}

/// Names of the built-in associations
pub mod names {
    /// Document header container
    pub const HEADER: &str = "DML:Header";
    /// Format version written
    pub const VERSION: &str = "DML:Version";
    /// Minimum reader version
    pub const READ_VERSION: &str = "DML:ReadVersion";
    /// Name of the document's content root
    pub const DOC_TYPE: &str = "DML:DocType";
    /// Include directive for a translation
    pub const INCLUDE_TRANSLATION: &str = "DML:Include-Translation";
    /// URI attribute
    pub const URI: &str = "DML:URI";
    /// Include directive for a primitive set
    pub const INCLUDE_PRIMITIVES: &str = "DML:Include-Primitives";
    /// Primitive set name attribute
    pub const SET: &str = "DML:Set";
    /// Primitive set codec attribute
    pub const CODEC: &str = "DML:Codec";
    /// Comment node
    pub const COMMENT: &str = "DML:Comment";
    /// Compressed fragment node
    pub const COMPRESSED: &str = "DML:Compressed";
    /// Encrypted fragment node
    pub const ENCRYPTED: &str = "DML:Encrypted";
    /// Padding blob
    pub const PADDING: &str = "DML:Padding";

    /// Root of a translation-description document
    pub const TRANSLATION: &str = "DML:Translation";
    /// Container declaration
    pub const TSL_CONTAINER: &str = "Container";
    /// Primitive declaration
    pub const TSL_NODE: &str = "Node";
    /// Declared id
    pub const TSL_ID: &str = "id";
    /// Declared name
    pub const TSL_NAME: &str = "name";
    /// Declared type
    pub const TSL_TYPE: &str = "type";
    /// Declared element type
    pub const TSL_ELEMENT_TYPE: &str = "element-type";
}

/// Current DML format version
pub const DML_VERSION: u64 = 3;

static BASE: Lazy<Arc<Translation>> = Lazy::new(|| Arc::new(build_base()));

static TSL: Lazy<Arc<Translation>> = Lazy::new(|| Arc::new(build_tsl()));

static TSL_DOCUMENT: Lazy<Arc<Translation>> = Lazy::new(|| {
    let mut t = build_base();
    add_all(&mut t, tsl_entries());
    Arc::new(t)
});

/// The base structural translation
pub fn base() -> Arc<Translation> {
    Arc::clone(&BASE)
}

/// The translation-description translation
pub fn tsl() -> Arc<Translation> {
    Arc::clone(&TSL)
}

/// The global translation of a translation-description document
pub fn tsl_document() -> Arc<Translation> {
    Arc::clone(&TSL_DOCUMENT)
}

/// Look up a built-in translation by URI
pub fn lookup(uri: &str) -> Option<Arc<Translation>> {
    if uri.eq_ignore_ascii_case(DML3_URN) {
        Some(base())
    } else if uri.eq_ignore_ascii_case(TSL2_URN) {
        Some(tsl())
    } else {
        None
    }
}

fn base_entries() -> Vec<Association> {
    use PrimitiveType::*;
    vec![
        Association::container(ids::HEADER, names::HEADER),
        Association::primitive(ids::VERSION, names::VERSION, UInt),
        Association::primitive(ids::READ_VERSION, names::READ_VERSION, UInt),
        Association::primitive(ids::DOC_TYPE, names::DOC_TYPE, String),
        Association::container(ids::INCLUDE_TRANSLATION, names::INCLUDE_TRANSLATION),
        Association::primitive(ids::URI, names::URI, String),
        Association::container(ids::INCLUDE_PRIMITIVES, names::INCLUDE_PRIMITIVES),
        Association::primitive(ids::SET, names::SET, String),
        Association::primitive(ids::CODEC, names::CODEC, String),
        Association::primitive(ids::COMMENT, names::COMMENT, String),
        Association::primitive(ids::COMPRESSED, names::COMPRESSED, CompressedFragment),
        Association::primitive(ids::ENCRYPTED, names::ENCRYPTED, EncryptedFragment),
        Association::primitive(ids::PADDING, names::PADDING, Extension),
    ]
}

fn tsl_entries() -> Vec<Association> {
    use PrimitiveType::*;
    vec![
        Association::container(ids::TRANSLATION, names::TRANSLATION),
        Association::container(ids::TSL_CONTAINER, names::TSL_CONTAINER),
        Association::container(ids::TSL_NODE, names::TSL_NODE),
        Association::primitive(ids::TSL_ID, names::TSL_ID, UInt),
        Association::primitive(ids::TSL_NAME, names::TSL_NAME, String),
        Association::primitive(ids::TSL_TYPE, names::TSL_TYPE, String),
        Association::primitive(ids::TSL_ELEMENT_TYPE, names::TSL_ELEMENT_TYPE, String),
    ]
}

fn build_base() -> Translation {
    let mut t = Translation::with_uri(DML3_URN);
    add_all(&mut t, base_entries());
    t
}

fn build_tsl() -> Translation {
    let mut t = Translation::with_uri(TSL2_URN);
    add_all(&mut t, tsl_entries());
    t
}

fn add_all(t: &mut Translation, entries: Vec<Association>) {
    for association in entries {
        // Built-in ids are distinct constants; a clash is a programming error
        if let Err(e) = t.add(association) {
            panic!("invalid built-in translation: {}", e);
        }
    }
}
