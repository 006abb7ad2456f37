//! Integration tests for translation documents and their resolution

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use dml::codec::{read_document, to_bytes, ReadOptions, WriteOptions};
use dml::dom::Value;
use dml::error::{Error, SchemaError};
use dml::schema::{
    FileResolver, NoResolver, PrimitiveSet, PrimitiveType, ResourceResolution, TranslationResolver,
};
use dml::xml::{import_str, ImportOptions};

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// Two translations that both need the common primitive set, and one
/// including both
fn shared_requirements(dir: &Path) {
    write(
        dir,
        "points.xml",
        r#"<DML:Translation DML:URI="urn:test:points">
  <DML:Include-Primitives DML:Set="common" DML:Codec="le"/>
  <Node id="1" name="X" type="double"/>
  <Node id="2" name="Y" type="double"/>
</DML:Translation>"#,
    );
    write(
        dir,
        "labels.xml",
        r#"<DML:Translation DML:URI="urn:test:labels">
  <DML:Include-Primitives DML:Set="common" DML:Codec="le"/>
  <DML:Include-Primitives DML:Set="arrays" DML:Codec="le"/>
  <!-- free text -->
  <Node id="10" name="Label" type="string"/>
</DML:Translation>"#,
    );
    write(
        dir,
        "shapes.xml",
        r#"<DML:Translation DML:URI="urn:test:shapes">
  <DML:Include-Translation DML:URI="points.xml"/>
  <DML:Include-Translation DML:URI="labels.xml"/>
  <Container id="20" name="Shape">
    <Node id="21" name="Sides" type="uint"/>
    <Node id="22" name="Weights" type="array" element-type="single"/>
  </Container>
</DML:Translation>"#,
    );
}

#[test]
fn test_included_requirements_are_deduplicated() {
    let dir = TempDir::new().unwrap();
    shared_requirements(dir.path());

    let resolver = FileResolver::new(dir.path());
    let shapes = resolver.resolve("shapes.xml").unwrap().unwrap();

    assert_eq!(
        shapes.required_sets().to_vec(),
        vec![
            PrimitiveSet::new("common", Some("le")),
            PrimitiveSet::new("arrays", Some("le")),
        ]
    );
    let ids: Vec<u32> = shapes.iter().map(|a| a.id()).collect();
    assert_eq!(ids, vec![1, 2, 10, 20]);
}

#[test]
fn test_container_declarations_carry_local_scope() {
    let dir = TempDir::new().unwrap();
    shared_requirements(dir.path());

    let resolver = FileResolver::new(dir.path());
    let shapes = resolver.resolve("shapes.xml").unwrap().unwrap();
    let shape = shapes.get(20).unwrap();
    assert!(shape.is_container());

    let local = shape.local_translation().unwrap();
    assert_eq!(local.get(21).unwrap().primitive_type(), Some(PrimitiveType::UInt));
    assert_eq!(local.get(22).unwrap().element_type().map(|e| e.to_string()), Some("single".to_string()));
    assert!(shapes.get(21).is_none());
}

#[test]
fn test_header_resolves_through_files() {
    let dir = TempDir::new().unwrap();
    shared_requirements(dir.path());
    let resolver = FileResolver::new(dir.path());

    let xml = r#"<!-- <DML:Header><DML:Include-Translation DML:URI="shapes.xml"/></DML:Header> -->
<Shape Label="triangle">
  <Sides>3</Sides>
  <X>0.5</X>
</Shape>"#;
    let doc = import_str(xml, &resolver, &ImportOptions::default()).unwrap();
    let shape = doc.root_container().unwrap();
    assert_eq!(doc.association(shape).unwrap().id(), 20);
    assert_eq!(doc.attribute_value(shape, "Label"), Some(&Value::String("triangle".into())));
    assert_eq!(doc.association(doc.attribute(shape, "Label").unwrap()).unwrap().id(), 10);

    let sides = doc.child_named(shape, "Sides").unwrap();
    assert_eq!(doc.association(sides).unwrap().id(), 21);
    assert_eq!(doc.value(sides), Some(&Value::UInt(3)));
    let x = doc.child_named(shape, "X").unwrap();
    assert_eq!(doc.value(x), Some(&Value::Double(0.5)));

    let bytes = to_bytes(&doc, &WriteOptions::default()).unwrap();
    let back = read_document(&bytes[..], &resolver, &ReadOptions::default()).unwrap();
    assert_eq!(
        back.snapshot(back.root_container().unwrap()),
        doc.snapshot(shape)
    );
}

#[test]
fn test_binary_translation_document() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<DML:Translation DML:URI="urn:test:binary"><Node id="5" name="Speed" type="double"/></DML:Translation>"#;
    let doc = import_str(xml, &NoResolver, &ImportOptions::default()).unwrap();
    fs::write(
        dir.path().join("speed.dml"),
        to_bytes(&doc, &WriteOptions::default()).unwrap(),
    )
    .unwrap();

    let resolver = FileResolver::new(dir.path());
    let speed = resolver.resolve("speed.dml").unwrap().unwrap();
    assert_eq!(speed.uri(), Some("urn:test:binary"));
    assert_eq!(speed.get(5).unwrap().name(), "Speed");
}

#[test]
fn test_circular_include() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "a.xml",
        r#"<DML:Translation><DML:Include-Translation DML:URI="b.xml"/></DML:Translation>"#,
    );
    write(
        dir.path(),
        "b.xml",
        r#"<DML:Translation><DML:Include-Translation DML:URI="a.xml"/></DML:Translation>"#,
    );

    let resolver = FileResolver::new(dir.path());
    let err = resolver.resolve("a.xml").unwrap_err();
    assert!(matches!(err.root(), Error::Schema(SchemaError::CircularInclude(_))));
}

#[test]
fn test_missing_include_is_reported() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "broken.xml",
        r#"<DML:Translation><DML:Include-Translation DML:URI="nowhere.xml"/></DML:Translation>"#,
    );

    let resolver = FileResolver::new(dir.path());
    let err = resolver.resolve("broken.xml").unwrap_err();
    assert!(matches!(err.root(), Error::Schema(SchemaError::UnresolvedUri(uri)) if uri == "nowhere.xml"));
    assert!(err.to_string().contains("DML:Include-Translation"));
}

#[test]
fn test_malformed_declaration() {
    let xml = r#"<DML:Translation><Node id="1" name="X" type="quaternion"/></DML:Translation>"#;
    let doc = import_str(xml, &NoResolver, &ImportOptions::default()).unwrap();
    let err = TranslationResolver::new(&NoResolver)
        .resolve_document(&doc)
        .unwrap_err();
    assert!(err.is_schema());
    assert_eq!(err.context_path().first().map(String::as_str), Some("DML:Translation"));
}

#[test]
fn test_duplicate_ids_rejected() {
    let xml = r#"<DML:Translation>
  <Node id="1" name="X" type="double"/>
  <Node id="1" name="Y" type="double"/>
</DML:Translation>"#;
    let doc = import_str(xml, &NoResolver, &ImportOptions::default()).unwrap();
    let err = TranslationResolver::new(&NoResolver)
        .resolve_document(&doc)
        .unwrap_err();
    assert!(matches!(err.root(), Error::Schema(SchemaError::DuplicateId { id: 1, .. })));
}

#[test]
fn test_unsupported_required_set() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "exotic.xml",
        r#"<DML:Translation><DML:Include-Primitives DML:Set="quantum" DML:Codec="be"/></DML:Translation>"#,
    );
    let resolver = FileResolver::new(dir.path());

    let xml = r#"<!-- <DML:Header><DML:Include-Translation DML:URI="exotic.xml"/></DML:Header> --><Root/>"#;
    let err = import_str(xml, &resolver, &ImportOptions::default()).unwrap_err();
    assert!(matches!(
        err.root(),
        Error::Format(dml::error::FormatError::UnsupportedPrimitiveSet(_))
    ));
}
