mod common;

use std::fs;

use tempfile::TempDir;
use xml_persist::{
    Node, NodeKind, QualifiedName, SchemaRegistry, StrictParser, Writer, XmlError,
    extract_child_fragment, read_namespace, write,
};

use common::{ORDER_TYPES_XSD, ORDER_XML, ORDER_XSD, OrderFixtures};

fn order_registry(fixtures: &OrderFixtures) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.add_schema(fixtures.path("order.xsd"));
    registry.add_schema(fixtures.path("order-types.xsd"));
    registry
}

fn assert_same_structure(left: Node<'_>, right: Node<'_>) {
    assert_eq!(left.kind(), right.kind());
    assert_eq!(left.local_name(), right.local_name());
    assert_eq!(left.namespace_uri(), right.namespace_uri());
    if matches!(left.kind(), NodeKind::Text | NodeKind::Comment) {
        assert_eq!(left.text_content(), right.text_content());
    }
    let left_children: Vec<_> = left.children().collect();
    let right_children: Vec<_> = right.children().collect();
    assert_eq!(left_children.len(), right_children.len());
    for (l, r) in left_children.into_iter().zip(right_children) {
        assert_same_structure(l, r);
    }
}

#[test]
fn test_extraction_scenario() {
    let document = StrictParser::new()
        .parse(r#"<root xmlns="urn:a"><item>x</item></root>"#)
        .unwrap();

    let fragment = extract_child_fragment(&document, &QualifiedName::new("urn:a", "item")).unwrap();
    let nodes: Vec<_> = fragment.children().collect();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].kind(), NodeKind::Text);
    assert_eq!(nodes[0].text_content(), "x");

    let root = document.root_element().unwrap();
    let children: Vec<_> = root.children().collect();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].local_name().as_deref(), Some("item"));
    assert!(!children[0].has_children());
}

#[test]
fn test_missing_name_scenario() {
    let document = StrictParser::new()
        .parse(r#"<root xmlns="urn:a"><item>x</item></root>"#)
        .unwrap();
    let result = extract_child_fragment(&document, &QualifiedName::new("urn:a", "missing"));
    match result {
        Err(error @ XmlError::NotFound { .. }) => {
            assert_eq!(error.to_string(), "Couldn't find node: {urn:a}missing")
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_ambiguous_name_scenario() {
    let document = StrictParser::new().parse("<r><a>1</a><a>2</a></r>").unwrap();
    let result = extract_child_fragment(&document, &QualifiedName::new("", "a"));
    match result {
        Err(XmlError::AmbiguousMatch { name, count }) => {
            assert_eq!(name.local_part(), "a");
            assert_eq!(count, 2);
        }
        other => panic!("Expected AmbiguousMatch, got {:?}", other),
    }
}

#[test]
fn test_write_then_reparse_round_trip() {
    let fixtures = OrderFixtures::new().unwrap();
    let parser = order_registry(&fixtures).builder_with_schema().unwrap();
    let document = parser.parse(&fixtures.path("order.xml")).unwrap();

    let mut output = fixtures.path("written.xml");
    Writer::new().write_document(&document, &mut output).unwrap();

    let reparsed = parser.parse(&output).unwrap();
    assert_same_structure(document.as_node(), reparsed.as_node());
}

#[test]
fn test_validation_gate_on_file_sink() {
    let fixtures = OrderFixtures::new().unwrap();
    let parser = order_registry(&fixtures).builder_with_schema().unwrap();
    let document = parser.parse(&ORDER_XML.to_string()).unwrap();

    // Emptying the required lines element invalidates the document.
    let lines = extract_child_fragment(&document, &QualifiedName::new("urn:orders", "lines"))
        .unwrap();
    assert_eq!(lines.len(), 2);

    let mut target = fixtures.path("rejected.xml");
    let result = Writer::new().write_document(&document, &mut target);
    assert!(matches!(result, Err(XmlError::Validation { .. })));
    assert!(!target.exists());

    let mut writer = Writer::new();
    writer.set_validate(false);
    writer.write_document(&document, &mut target).unwrap();
    assert!(fs::read_to_string(&target).unwrap().contains("<o:lines/>"));
}

#[test]
fn test_validating_parse_rejects_invalid_document() {
    let fixtures = OrderFixtures::new().unwrap();
    let parser = order_registry(&fixtures).builder_with_schema().unwrap();

    let result = parser.parse(r#"<o:order xmlns:o="urn:orders"><o:id>seven</o:id></o:order>"#);
    assert!(matches!(result, Err(XmlError::Parse(_))));
}

#[test]
fn test_registry_accepts_in_memory_sources() {
    let mut registry = SchemaRegistry::new();
    registry.add_schema(ORDER_XSD);
    registry.add_schema(ORDER_TYPES_XSD.as_bytes().to_vec());
    assert_eq!(registry.len(), 2);

    let parser = registry.builder_with_schema().unwrap();
    assert!(parser.parse(ORDER_XML).is_ok());
}

#[test]
fn test_missing_schema_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let mut registry = SchemaRegistry::new();
    registry.add_schema(dir.path().join("absent.xsd"));
    assert!(matches!(registry.compile(), Err(XmlError::Io(_))));
}

#[test]
fn test_extracted_fragment_written_to_file() {
    let fixtures = OrderFixtures::new().unwrap();
    let document = StrictParser::new()
        .parse(&fixtures.path("order.xml"))
        .unwrap();
    let lines = extract_child_fragment(&document, &QualifiedName::new("urn:orders", "lines"))
        .unwrap();

    let mut target = fixtures.path("lines.xml");
    write(lines.as_node(), &mut target).unwrap();
    let written = fs::read_to_string(&target).unwrap();
    assert_eq!(written.matches(r#"xmlns:o="urn:orders""#).count(), 2);

    let parser = StrictParser::new();
    let mut texts = Vec::new();
    for (index, line) in lines.children().enumerate() {
        let mut target = fixtures.path(&format!("line-{}.xml", index));
        write(line, &mut target).unwrap();

        let reparsed = parser.parse(&target).unwrap();
        let root = reparsed.root_element().unwrap();
        assert_eq!(root.local_name().as_deref(), Some("line"));
        assert_eq!(root.namespace_uri().as_deref(), Some("urn:orders"));
        texts.push(root.text_content());
    }
    assert_eq!(texts, vec!["tea", "milk"]);
}

#[test]
fn test_inner_element_written_to_file_keeps_namespace() {
    let fixtures = OrderFixtures::new().unwrap();
    let document = StrictParser::new()
        .parse(&fixtures.path("order.xml"))
        .unwrap();
    let lines = document
        .select("//o:lines", &[("o", "urn:orders")])
        .unwrap()[0];

    let mut target = fixtures.path("lines-element.xml");
    write(lines, &mut target).unwrap();
    assert_eq!(read_namespace(&target).unwrap().as_deref(), Some("urn:orders"));

    let reparsed = StrictParser::new().parse(&target).unwrap();
    let children: Vec<_> = reparsed.root_element().unwrap().children().collect();
    assert_eq!(children.len(), 2);
    for child in children {
        assert_eq!(child.namespace_uri().as_deref(), Some("urn:orders"));
    }
}

#[test]
fn test_read_namespace_from_file() {
    let fixtures = OrderFixtures::new().unwrap();
    let path = fixtures.path("order.xml");
    assert_eq!(read_namespace(&path).unwrap().as_deref(), Some("urn:orders"));
    assert_eq!(read_namespace(&path).unwrap().as_deref(), Some("urn:orders"));
}

#[test]
fn test_parse_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = StrictParser::new().parse(&dir.path().join("missing.xml"));
    assert!(matches!(result, Err(XmlError::Io(_))));
}
