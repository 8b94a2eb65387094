use divan::Bencher;
use xml_persist::{QualifiedName, Schema, StrictParser, Writer, extract_child_fragment};

fn main() {
    divan::main();
}

const SIMPLE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="element" type="xs:string" maxOccurs="unbounded"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

const VALID_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root>
    <element>Valid content</element>
    <element>More content</element>
</root>"#;

#[divan::bench]
fn compile_schema() -> Schema {
    Schema::from_memory(SIMPLE_XSD.as_bytes()).expect("Failed to compile schema")
}

#[divan::bench]
fn strict_parse(bencher: Bencher) {
    let parser = StrictParser::new();

    bencher.bench_local(move || parser.parse(VALID_XML).expect("Parse failed"));
}

#[divan::bench]
fn validating_parse(bencher: Bencher) {
    let schema = Schema::from_memory(SIMPLE_XSD.as_bytes()).unwrap();
    let parser = StrictParser::new().with_schema(schema);

    bencher.bench_local(move || parser.parse(VALID_XML).expect("Validation failed"));
}

#[divan::bench]
fn extract_fragment(bencher: Bencher) {
    let parser = StrictParser::new();
    let name = QualifiedName::new("", "root");

    bencher.bench_local(move || {
        let document = parser.parse(VALID_XML).unwrap();
        let fragment = extract_child_fragment(&document, &name).expect("Extraction failed");
        fragment.len()
    });
}

#[divan::bench]
fn write_document(bencher: Bencher) {
    let schema = Schema::from_memory(SIMPLE_XSD.as_bytes()).unwrap();
    let document = StrictParser::new()
        .with_schema(schema)
        .parse(VALID_XML)
        .unwrap();
    let writer = Writer::new();

    bencher.bench_local(move || {
        let mut out = Vec::new();
        writer
            .write_document(&document, &mut out)
            .expect("Write failed");
        out
    });
}
