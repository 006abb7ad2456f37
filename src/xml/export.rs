//! Document to XML

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use super::{ExportOptions, HeaderPlacement, TEXT_NODE_NAME};
use crate::dom::{Document, LoadState, NodeId, Value};
use crate::error::{Error, FormatError, Result};
use crate::names::names_equal;
use crate::namespaces::NamespaceContext;
use crate::schema::builtin::{self, names};

pub(super) fn export<W: Write>(doc: &Document, sink: W, options: &ExportOptions) -> Result<()> {
    let mut writer = match options.indent {
        Some(indent) if indent > 0 => Writer::new_with_indent(sink, b' ', indent),
        _ => Writer::new(sink),
    };
    if options.declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    }

    if let Some(header) = doc.header() {
        let mut scratch = Document::new(builtin::base());
        let node = header.to_container(&mut scratch)?;
        let declarations = declarations(&scratch, node);
        match options.header {
            HeaderPlacement::Comment => {
                let mut inner = Writer::new(Vec::new());
                write_node(&mut inner, &scratch, node, &declarations)?;
                let markup = String::from_utf8(inner.into_inner())
                    .map_err(|e| Error::Xml(e.to_string()))?;
                if markup.contains("--") {
                    return Err(Error::Xml(format!(
                        "{} cannot be carried in a comment, it contains '--'",
                        names::HEADER
                    )));
                }
                writer.write_event(Event::Comment(BytesText::from_escaped(format!(
                    " {} ",
                    markup
                ))))?;
            }
            HeaderPlacement::Element => write_node(&mut writer, &scratch, node, &declarations)?,
        }
    }

    for &child in doc.children(doc.body()) {
        write_node(&mut writer, doc, child, &declarations(doc, child))?;
    }
    Ok(())
}

/// `xmlns` declarations for every prefix used in a subtree
fn declarations(doc: &Document, node: NodeId) -> Vec<(String, String)> {
    let mut context = NamespaceContext::new();
    for id in doc.descendants(node) {
        context.note_name(doc.name(id));
    }
    context.declarations()
}

fn start_tag<'a>(name: &'a str, declarations: &[(String, String)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, uri) in declarations {
        start.push_attribute((key.as_str(), uri.as_str()));
    }
    start
}

fn write_node<W: Write>(
    writer: &mut Writer<W>,
    doc: &Document,
    node: NodeId,
    declarations: &[(String, String)],
) -> Result<()> {
    let name = doc.name(node);

    if let Some(fragment) = doc.compressed(node) {
        let start = start_tag(name, declarations);
        return write_element(writer, doc, start, doc.children(fragment.content()));
    }

    if doc.is_container(node) {
        if doc.load_state(node) != LoadState::Full {
            return Err(FormatError::Malformed(format!("'{}' is not fully loaded", name)).into());
        }
        let mut start = start_tag(name, declarations);
        for &attribute in doc.attributes(node) {
            let text = doc.value(attribute).map(Value::to_text).unwrap_or_default();
            start.push_attribute((doc.name(attribute), text.as_str()));
        }
        return write_element(writer, doc, start, doc.children(node));
    }

    if doc.is_fragment(node) {
        for &child in doc.children(node) {
            write_node(writer, doc, child, &[])?;
        }
        return Ok(());
    }

    let Some(value) = doc.value(node) else {
        return Ok(());
    };
    let is_inline = doc.association(node).map_or(false, |a| a.is_inline());

    if names_equal(name, names::COMMENT) {
        let text = value.to_text();
        writer.write_event(Event::Comment(BytesText::from_escaped(comment_text(&text))))?;
    } else if is_inline && name == TEXT_NODE_NAME {
        writer.write_event(Event::Text(BytesText::new(&value.to_text())))?;
    } else {
        writer.write_event(Event::Start(start_tag(name, declarations)))?;
        let text = value.to_text();
        if value.has_text_form() {
            writer.write_event(Event::Text(BytesText::new(&text)))?;
        } else {
            // arrays and matrices have no XML form
            writer.write_event(Event::Comment(BytesText::from_escaped(comment_text(&text))))?;
        }
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    doc: &Document,
    start: BytesStart<'_>,
    children: &[NodeId],
) -> Result<()> {
    if children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start))?;
    for &child in children {
        write_node(writer, doc, child, &[])?;
    }
    writer.write_event(Event::End(end))?;
    Ok(())
}

/// Comment text with no `--` and no trailing `-`
fn comment_text(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains("--") {
        out = out.replace("--", "- -");
    }
    if out.ends_with('-') {
        out.push(' ');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ArrayValue, Header};
    use crate::schema::{Association, NoResolver, NodeKind, PrimitiveType};
    use crate::xml::{export_string, import_str, ImportOptions};
    use std::sync::Arc;

    fn sample() -> Document {
        let mut doc = Document::new(builtin::base());
        let root = doc.new_inline_container("Root");
        let body = doc.body();
        doc.append_child(body, root).unwrap();
        let note = doc.new_untyped("note", "a < b & \"c\"", true);
        doc.append_child(root, note).unwrap();
        let count = Arc::new(Association::inline("Count", NodeKind::Primitive(PrimitiveType::UInt)));
        let count = doc.new_primitive(count, Value::UInt(42)).unwrap();
        doc.append_child(root, count).unwrap();
        doc
    }

    fn compact() -> ExportOptions {
        ExportOptions::default().with_indent(None).with_declaration(false)
    }

    #[test]
    fn test_compact_export() {
        let xml = export_string(&sample(), &compact()).unwrap();
        assert_eq!(
            xml,
            r#"<Root note="a &lt; b &amp; &quot;c&quot;"><Count>42</Count></Root>"#
        );
    }

    #[test]
    fn test_export_is_well_formed() {
        let mut doc = sample();
        doc.set_header(Some(Header::new().with_translation("urn:test:sample")));
        let root = doc.root_container().unwrap();
        let comment = doc
            .new_primitive(
                crate::dom::builtin_association(crate::schema::builtin::ids::COMMENT).unwrap(),
                Value::String("a--b-".into()),
            )
            .unwrap();
        doc.append_child(root, comment).unwrap();

        let xml = export_string(&doc, &ExportOptions::default()).unwrap();
        let parsed = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(parsed.root_element().tag_name().name(), "Root");
        assert!(parsed
            .descendants()
            .any(|n| n.is_comment() && n.text() == Some("a- -b- ")));
    }

    #[test]
    fn test_header_element_reimports() {
        let mut doc = sample();
        let header = Header::new().with_doc_type("Root");
        doc.set_header(Some(header.clone()));

        let options = ExportOptions::default().with_header(HeaderPlacement::Element);
        let xml = export_string(&doc, &options).unwrap();
        assert!(xml.contains("<DML:Header xmlns:DML=\"urn:dml:dml3\""));
        let back = import_str(&xml, &NoResolver, &ImportOptions::default()).unwrap();
        assert_eq!(back.header(), Some(&header));
        assert_eq!(back.top_level_containers().len(), 1);
    }

    #[test]
    fn test_prefixes_are_declared() {
        let mut doc = Document::new(builtin::base());
        let root = doc.new_inline_container("geo:Shape");
        let body = doc.body();
        doc.append_child(body, root).unwrap();
        let wrapper = doc.wrap_compressed(vec![]).unwrap();
        doc.append_child(root, wrapper).unwrap();

        let xml = export_string(&doc, &compact()).unwrap();
        assert!(xml.contains(r#"xmlns:geo="urn:dml:prefix:geo""#));
        assert!(xml.contains(r#"xmlns:DML="urn:dml:dml3""#));
        let parsed = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(parsed.root_element().tag_name().namespace(), Some("urn:dml:prefix:geo"));
    }

    #[test]
    fn test_array_placeholder() {
        let mut doc = Document::new(builtin::base());
        let root = doc.new_inline_container("Image");
        let body = doc.body();
        doc.append_child(body, root).unwrap();
        let data = Arc::new(Association::inline("Data", NodeKind::Primitive(PrimitiveType::Array)));
        let data = doc
            .new_primitive(data, Value::Array(ArrayValue::UInt8(vec![1, 2, 3])))
            .unwrap();
        doc.append_child(root, data).unwrap();

        let xml = export_string(&doc, &compact()).unwrap();
        assert!(xml.starts_with("<Image><Data><!--array of 3"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn test_header_comment_reimports() {
        let mut doc = sample();
        let header = Header::new().with_doc_type("Root");
        doc.set_header(Some(header.clone()));

        let xml = export_string(&doc, &ExportOptions::default()).unwrap();
        assert!(xml.contains("<!-- <DML:Header"));
        let back = import_str(&xml, &NoResolver, &ImportOptions::default()).unwrap();
        assert_eq!(back.header(), Some(&header));
    }

    #[test]
    fn test_comment_text() {
        assert_eq!(comment_text("plain"), "plain");
        assert_eq!(comment_text("a--b"), "a- -b");
        assert_eq!(comment_text("a---"), "a- - - ");
    }
}
