//! XML interchange
//!
//! Every DML document has an XML rendering: containers become elements,
//! attribute-position primitives become XML attributes and element-position
//! primitives become elements with text content. Importing goes the other
//! way, with untyped text first kept as `#text` nodes and then folded into
//! typed primitives by [`optimize`].

mod export;
mod import;
mod optimize;

use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::dom::Document;
use crate::error::Result;
use crate::limits::Limits;
use crate::schema::{ResourceResolution, Translation};

pub use optimize::{optimize, OptimizeStats};

/// Name given to untyped text imported from XML character data
pub const TEXT_NODE_NAME: &str = "#text";

/// Options for XML import
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Resource limits
    pub limits: Limits,
    /// Fold text into typed primitives after parsing
    pub optimize: bool,
    /// Global translation for documents without a header
    pub translation: Option<Arc<Translation>>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            optimize: true,
            translation: None,
        }
    }
}

impl ImportOptions {
    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable the optimization pass
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Use `translation` as the global translation when there is no header
    pub fn with_translation(mut self, translation: Arc<Translation>) -> Self {
        self.translation = Some(translation);
        self
    }
}

/// Where the document header goes in exported XML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPlacement {
    /// A comment ahead of the root element holding the header markup
    #[default]
    Comment,
    /// A `DML:Header` element ahead of the root element
    Element,
}

/// Options for XML export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Spaces per nesting level, or `None` for compact output
    pub indent: Option<usize>,
    /// Header placement
    pub header: HeaderPlacement,
    /// Emit an XML declaration
    pub declaration: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            indent: Some(2),
            header: HeaderPlacement::default(),
            declaration: true,
        }
    }
}

impl ExportOptions {
    /// Set the indentation (`None` for compact output)
    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    /// Set the header placement
    pub fn with_header(mut self, header: HeaderPlacement) -> Self {
        self.header = header;
        self
    }

    /// Enable or disable the XML declaration
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }
}

/// Build a document from XML
pub fn import_xml<R: BufRead>(
    source: R,
    resolution: &dyn ResourceResolution,
    options: &ImportOptions,
) -> Result<Document> {
    import::Importer::new(resolution, options).import(source)
}

/// Build a document from an XML string
pub fn import_str(
    xml: &str,
    resolution: &dyn ResourceResolution,
    options: &ImportOptions,
) -> Result<Document> {
    options.limits.check_xml_size(xml.len())?;
    import_xml(xml.as_bytes(), resolution, options)
}

/// Write a document as XML
pub fn export_xml<W: Write>(doc: &Document, sink: W, options: &ExportOptions) -> Result<()> {
    export::export(doc, sink, options)
}

/// Render a document as an XML string
pub fn export_string(doc: &Document, options: &ExportOptions) -> Result<String> {
    let mut out = Vec::new();
    export_xml(doc, &mut out, options)?;
    String::from_utf8(out).map_err(|e| crate::error::Error::Xml(e.to_string()))
}
