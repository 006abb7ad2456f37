//! XML to document
//!
//! Elements become containers bound to the association their name resolves
//! to in scope (or an inline association), attributes become typed
//! primitives when the name and text allow it, and character data becomes
//! `#text` nodes for the optimization pass to fold. The header arrives
//! either as a top-level `DML:Header` element or as a top-level comment
//! holding the same markup; it is resolved before the content root opens.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use std::sync::Arc;
use tracing::debug;

use super::optimize::{optimize_tracked, typed_or_untyped};
use super::{ImportOptions, TEXT_NODE_NAME};
use crate::codec::resolve_global;
use crate::dom::{builtin_association, Document, Header, NodeId, Value};
use crate::error::{Error, FormatError, Result, ResultExt};
use crate::names::names_equal;
use crate::namespaces::is_namespace_declaration;
use crate::schema::builtin::{self, ids, names};
use crate::schema::{ResourceResolution, Scope};

/// An open element
struct Frame {
    node: NodeId,
    name: String,
    scope: Scope,
    header: bool,
    /// Whitespace-only text seen before any other content
    pending_whitespace: Option<String>,
    has_content: bool,
}

pub(super) struct Importer<'a> {
    resolution: &'a dyn ResourceResolution,
    options: &'a ImportOptions,
    doc: Document,
    global: Scope,
    stack: Vec<Frame>,
    text_nodes: Vec<NodeId>,
    header: Option<Header>,
    activated: bool,
    content_seen: bool,
}

impl<'a> Importer<'a> {
    pub(super) fn new(resolution: &'a dyn ResourceResolution, options: &'a ImportOptions) -> Self {
        let base = builtin::base();
        Self {
            resolution,
            options,
            doc: Document::new(Arc::clone(&base)),
            global: Scope::new(base),
            stack: Vec::new(),
            text_nodes: Vec::new(),
            header: None,
            activated: false,
            content_seen: false,
        }
    }

    pub(super) fn import<R: BufRead>(mut self, source: R) -> Result<Document> {
        self.parse(source)?;
        self.finish()
    }

    fn parse<R: BufRead>(&mut self, source: R) -> Result<()> {
        let mut reader = Reader::from_reader(source);
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                Error::Xml(format!(
                    "parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;
            self.options.limits.check_xml_size(reader.buffer_position())?;

            let eof = matches!(event, Event::Eof);
            self.handle(event).map_err(|e| self.in_context(e))?;
            if eof {
                return Ok(());
            }
            buf.clear();
        }
    }

    fn handle(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::Start(e) => self.start_element(&e, false),
            Event::Empty(e) => self.start_element(&e, true),
            Event::End(_) => self.end_element(),
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::Xml(format!("invalid text: {}", e)))?;
                self.text(&text, false)
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| Error::Xml(format!("invalid CDATA: {}", e)))?;
                self.text(text, true)
            }
            Event::Comment(e) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| Error::Xml(format!("invalid comment: {}", e)))?;
                self.comment(text)
            }
            Event::Eof => match self.stack.last() {
                Some(frame) => Err(FormatError::Unterminated(frame.name.clone()).into()),
                None => Ok(()),
            },
            // declaration, processing instructions, doctype
            _ => Ok(()),
        }
    }

    /// Wrap an error with the names of the open elements
    fn in_context(&self, err: Error) -> Error {
        self.stack
            .iter()
            .rev()
            .fold(err, |err, frame| err.within(frame.name.clone()))
    }

    fn start_element(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<()> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
            .to_string();
        self.options.limits.check_depth(self.stack.len() + 1)?;

        let top_level = self.stack.is_empty();
        let is_header = top_level && names_equal(&name, names::HEADER);
        if top_level {
            self.open_top_level(&name, is_header)?;
        }

        let (parent, scope) = match self.stack.last_mut() {
            Some(frame) => {
                frame.pending_whitespace = None;
                frame.has_content = true;
                (Some(frame.node), frame.scope.clone())
            }
            // the header is detached; it only feeds `Header::from_container`
            None if is_header => (None, Scope::new(builtin::base())),
            None => (Some(self.doc.body()), self.global.clone()),
        };

        let node = if names_equal(&name, names::COMPRESSED) {
            if top_level {
                return Err(FormatError::TopLevel(format!(
                    "{} cannot be the root element",
                    names::COMPRESSED
                ))
                .into());
            }
            self.doc.new_compressed(builtin_association(ids::COMPRESSED)?)?
        } else {
            match scope.get_association(&name) {
                Some(association) if association.is_container() => {
                    self.doc.new_container(Arc::clone(association))
                }
                _ => self.doc.new_inline_container(&name),
            }
        };
        let child_scope = match self.doc.association(node) {
            Some(association) => scope.enter(association),
            None => scope,
        };

        if self.doc.is_container(node) {
            self.import_attributes(start, node, &child_scope)
                .within(name.as_str())?;
        } else {
            reject_attributes(start).within(name.as_str())?;
        }
        if let Some(parent) = parent {
            self.doc.append_child(parent, node)?;
        }

        if empty {
            if is_header {
                self.close_header(node)?;
            }
        } else {
            self.stack.push(Frame {
                node,
                name,
                scope: child_scope,
                header: is_header,
                pending_whitespace: None,
                has_content: false,
            });
        }
        Ok(())
    }

    fn open_top_level(&mut self, name: &str, is_header: bool) -> Result<()> {
        if is_header {
            if self.header.is_some() {
                return Err(FormatError::DuplicateHeader.into());
            }
            if self.content_seen {
                return Err(FormatError::TopLevel(format!(
                    "{} after the root element",
                    names::HEADER
                ))
                .into());
            }
            return Ok(());
        }

        if self.content_seen {
            return Err(FormatError::TopLevel(format!("second root element '{}'", name)).into());
        }
        self.content_seen = true;
        self.activate(name)
    }

    fn import_attributes(&mut self, start: &BytesStart<'_>, node: NodeId, scope: &Scope) -> Result<()> {
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Xml(format!("invalid attribute: {}", e)))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?;
            if is_namespace_declaration(key) {
                continue;
            }
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("invalid value of '{}': {}", key, e)))?;
            let attribute = typed_or_untyped(&mut self.doc, scope, key, &value, true)?;
            self.doc.append_child(node, attribute).within(key)?;
        }
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| Error::Xml("end tag without a start tag".to_string()))?;
        let name = frame.name.clone();
        self.close_frame(frame).within(name)
    }

    fn close_frame(&mut self, frame: Frame) -> Result<()> {
        if let Some(whitespace) = frame.pending_whitespace.filter(|_| !frame.has_content) {
            // whitespace is meaningful when it is all the element holds
            let text = self.doc.new_untyped(TEXT_NODE_NAME, whitespace, false);
            self.doc.append_child(frame.node, text)?;
            self.text_nodes.push(text);
        }
        if frame.header {
            self.close_header(frame.node)?;
        }
        Ok(())
    }

    fn text(&mut self, text: &str, cdata: bool) -> Result<()> {
        let Some(frame) = self.stack.last_mut() else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(FormatError::TopLevel(format!(
                "text outside the root element: '{}'",
                text.trim()
            ))
            .into());
        };

        if !cdata && text.trim().is_empty() {
            if !frame.has_content {
                frame.pending_whitespace = Some(text.to_string());
            }
            return Ok(());
        }

        let mut content = frame.pending_whitespace.take().unwrap_or_default();
        content.push_str(text);
        frame.has_content = true;
        let parent = frame.node;

        let node = self.doc.new_untyped(TEXT_NODE_NAME, content, false);
        self.doc.append_child(parent, node)?;
        self.text_nodes.push(node);
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        if self.stack.is_empty() && is_header_markup(text) {
            return self.header_comment(text.trim());
        }

        let node = self.doc.new_primitive(
            builtin_association(ids::COMMENT)?,
            Value::String(text.to_string()),
        )?;
        let parent = match self.stack.last_mut() {
            Some(frame) => {
                frame.pending_whitespace = None;
                frame.has_content = true;
                frame.node
            }
            None => self.doc.body(),
        };
        self.doc.append_child(parent, node)
    }

    /// Parse header markup carried in a comment
    fn header_comment(&mut self, markup: &str) -> Result<()> {
        if self.header.is_some() {
            return Err(FormatError::DuplicateHeader.into());
        }
        if self.content_seen {
            return Err(FormatError::TopLevel(format!(
                "{} after the root element",
                names::HEADER
            ))
            .into());
        }

        let mut inner = Importer::new(self.resolution, self.options);
        inner.parse(markup.as_bytes()).within(names::HEADER)?;
        let header = inner.header.ok_or_else(|| {
            FormatError::Malformed(format!("comment does not hold a {}", names::HEADER))
        })?;
        debug!(
            translations = header.translations.len(),
            "header read from comment"
        );
        self.header = Some(header);
        Ok(())
    }

    fn close_header(&mut self, node: NodeId) -> Result<()> {
        if self.header.is_some() {
            return Err(FormatError::DuplicateHeader.into());
        }
        let header = Header::from_container(&self.doc, node)?;
        debug!(translations = header.translations.len(), "header element read");
        self.header = Some(header);
        Ok(())
    }

    /// Settle the global translation once the root element opens
    fn activate(&mut self, root_name: &str) -> Result<()> {
        let global = match &self.header {
            Some(header) => resolve_global(header, self.resolution, &self.options.limits)?,
            None => match &self.options.translation {
                Some(translation) => Arc::clone(translation),
                None if names_equal(root_name, names::TRANSLATION) => builtin::tsl_document(),
                None => builtin::base(),
            },
        };
        self.doc.set_global_translation(Arc::clone(&global));
        self.global = Scope::new(global);
        self.activated = true;
        Ok(())
    }

    fn finish(mut self) -> Result<Document> {
        if !self.activated && self.header.is_some() {
            self.activate("")?;
        }
        self.doc.set_header(self.header.take());
        if self.options.optimize {
            optimize_tracked(&mut self.doc, &self.text_nodes)?;
        }
        debug!(
            nodes = self.doc.node_count(),
            text_nodes = self.text_nodes.len(),
            "XML imported"
        );
        Ok(self.doc)
    }
}

fn is_header_markup(comment: &str) -> bool {
    let opening = format!("<{}", names::HEADER);
    comment
        .trim_start()
        .get(..opening.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(&opening))
}

/// Compressed wrappers carry no attributes beyond namespace declarations
fn reject_attributes(start: &BytesStart<'_>) -> Result<()> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml(format!("invalid attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref());
        if !is_namespace_declaration(&key) {
            return Err(FormatError::Malformed(format!(
                "attribute '{}' is not allowed on {}",
                key,
                names::COMPRESSED
            ))
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Association, MemoryResolver, NoResolver, PrimitiveType, Translation};

    fn import(xml: &str) -> Result<Document> {
        super::super::import_str(xml, &NoResolver, &ImportOptions::default())
    }

    fn geometry() -> Translation {
        let mut t = Translation::with_uri("urn:test:geometry");
        t.add(Association::container(1, "Point")).unwrap();
        t.add(Association::primitive(2, "X", PrimitiveType::Double))
            .unwrap();
        t.add(Association::primitive(3, "Y", PrimitiveType::Double))
            .unwrap();
        t.add(Association::primitive(4, "visible", PrimitiveType::Boolean))
            .unwrap();
        t
    }

    #[test]
    fn test_untyped_import() {
        let doc = import(r#"<Root a="1"><Child>text</Child></Root>"#).unwrap();
        let root = doc.root_container().unwrap();
        assert_eq!(doc.name(root), "Root");
        assert_eq!(doc.attribute_str(root, "a"), Some("1"));

        let child = doc.children(root)[0];
        assert!(doc.is_primitive(child));
        assert_eq!(doc.value(child), Some(&Value::String("text".into())));
    }

    #[test]
    fn test_header_comment_resolves_translation() {
        let resolver = MemoryResolver::new().with("urn:test:geometry", geometry());
        let xml = r#"<?xml version="1.0"?>
<!-- <DML:Header xmlns:DML="urn:dml:dml3" DML:Version="3" DML:ReadVersion="3"><DML:Include-Translation DML:URI="urn:test:geometry"/></DML:Header> -->
<Point visible="true"><X>1.5</X><Y>-2</Y></Point>"#;
        let doc = super::super::import_str(xml, &resolver, &ImportOptions::default()).unwrap();

        let header = doc.header().unwrap();
        assert_eq!(header.translations, vec!["urn:test:geometry".to_string()]);

        let point = doc.root_container().unwrap();
        assert_eq!(doc.association(point).unwrap().id(), 1);
        assert_eq!(doc.attribute_value(point, "visible"), Some(&Value::Boolean(true)));
        let x = doc.child_named(point, "X").unwrap();
        assert_eq!(doc.value(x), Some(&Value::Double(1.5)));
        let y = doc.child_named(point, "Y").unwrap();
        assert_eq!(doc.value(y), Some(&Value::Double(-2.0)));
    }

    #[test]
    fn test_header_element() {
        let resolver = MemoryResolver::new().with("urn:test:geometry", geometry());
        let xml = r#"<DML:Header xmlns:DML="urn:dml:dml3"><DML:Include-Translation DML:URI="urn:test:geometry"/></DML:Header>
<Point><X>3</X></Point>"#;
        let doc = super::super::import_str(xml, &resolver, &ImportOptions::default()).unwrap();
        assert!(doc.header().is_some());
        let point = doc.root_container().unwrap();
        assert_eq!(doc.top_level_containers(), vec![point]);
        assert_eq!(doc.value(doc.children(point)[0]), Some(&Value::Double(3.0)));
    }

    #[test]
    fn test_duplicate_header() {
        let xml = r#"<!-- <DML:Header/> --><DML:Header/><Root/>"#;
        let err = import(xml).unwrap_err();
        assert!(matches!(err.root(), Error::Format(FormatError::DuplicateHeader)));
    }

    #[test]
    fn test_second_root_element() {
        let err = import("<A/><B/>").unwrap_err();
        assert!(matches!(err.root(), Error::Format(FormatError::TopLevel(_))));
    }

    #[test]
    fn test_unresolved_header_translation() {
        let xml = r#"<!-- <DML:Header><DML:Include-Translation DML:URI="urn:missing"/></DML:Header> --><Root/>"#;
        let err = import(xml).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_translation_document_uses_tsl_vocabulary() {
        let doc = import(r#"<DML:Translation><Node id="7" name="Speed" type="double"/></DML:Translation>"#)
            .unwrap();
        let root = doc.root_container().unwrap();
        assert!(!doc.association(root).unwrap().is_inline());
        let node = doc.children(root)[0];
        assert!(!doc.association(node).unwrap().is_inline());
    }

    #[test]
    fn test_comments_and_compressed() {
        let doc = import("<!--top--><Root><!--inner--><DML:Compressed><A>x</A></DML:Compressed></Root>")
            .unwrap();
        let body = doc.children(doc.body()).to_vec();
        assert_eq!(doc.name(body[0]), names::COMMENT);
        assert_eq!(doc.value(body[0]), Some(&Value::String("top".into())));

        let root = doc.root_container().unwrap();
        assert_eq!(doc.name(doc.children(root)[0]), names::COMMENT);
        let compressed = doc.children(root)[1];
        assert!(doc.compressed(compressed).is_some());
        let (logical, saw_compression) = doc.logical_children(root);
        assert!(saw_compression);
        assert!(logical.iter().any(|&n| doc.name(n) == "A"));
    }

    #[test]
    fn test_compressed_attributes_rejected() {
        let err = import(r#"<Root><DML:Compressed level="9"><A>x</A></DML:Compressed></Root>"#)
            .unwrap_err();
        assert!(matches!(err.root(), Error::Format(FormatError::Malformed(_))));
        assert!(err.to_string().contains("'level'"));
        assert_eq!(err.context_path().last().map(String::as_str), Some(names::COMPRESSED));

        let declared = r#"<Root><DML:Compressed xmlns:DML="urn:dml:dml3"><A>x</A></DML:Compressed></Root>"#;
        assert!(import(declared).is_ok());
    }

    #[test]
    fn test_whitespace_only_element_keeps_text() {
        let doc = import("<Root>\n  <S>  </S>\n  <E></E>\n</Root>").unwrap();
        let root = doc.root_container().unwrap();
        let s = doc.child_named(root, "S").unwrap();
        assert_eq!(doc.value(s), Some(&Value::String("  ".into())));
        let e = doc.child_named(root, "E").unwrap();
        assert!(doc.is_container(e));
        assert_eq!(doc.children(root).len(), 2);
    }

    #[test]
    fn test_error_names_open_elements() {
        let limits = crate::limits::Limits::default().with_max_depth(2);
        let options = ImportOptions::default().with_limits(limits);
        let err = super::super::import_str("<A><B><C/></B></A>", &NoResolver, &options).unwrap_err();
        assert_eq!(err.context_path(), ["A", "B"]);
        assert!(matches!(err.root(), Error::LimitExceeded(_)));
    }

    #[test]
    fn test_unterminated_element() {
        let err = import("<A><B></B>").unwrap_err();
        assert!(matches!(err.root(), Error::Format(FormatError::Unterminated(_)) | Error::Xml(_)));
    }
}
