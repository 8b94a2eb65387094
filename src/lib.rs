//! # xml-persist Library
//!
//! Strict, schema-aware persistence of XML document trees on top of libxml2:
//! fail-on-warning parsing, multi-source schema compilation, extraction of a
//! uniquely named element's contents, and validated pretty-printed output.
//!
//! ```no_run
//! use xml_persist::{QualifiedName, SchemaRegistry, Writer, extract_child_fragment};
//! use std::path::PathBuf;
//!
//! # fn main() -> xml_persist::Result<()> {
//! let mut registry = SchemaRegistry::new();
//! registry.add_schema(PathBuf::from("order.xsd"));
//! let parser = registry.builder_with_schema()?;
//!
//! let document = parser.parse(&PathBuf::from("order.xml"))?;
//! let lines = extract_child_fragment(&document, &QualifiedName::new("urn:orders", "lines"))?;
//! println!("{} line(s)", lines.len());
//!
//! Writer::new().write_document(&document, &mut PathBuf::from("out.xml"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod libxml2;
pub mod parser;
pub mod qname;
pub mod schema;
pub mod source;
pub mod tree;
pub mod writer;

pub use config::{ConfigError, ParserConfig, WriterConfig, XmlConfig};
pub use diagnostics::{
    Collecting, Diagnostic, DiagnosticListener, Lenient, Pedantic, Severity, Verdict,
};
pub use error::{Result, XmlError};
pub use extract::{child_text_contents, extract_child_fragment};
pub use parser::{StrictParser, read_namespace, read_node};
pub use qname::QualifiedName;
pub use schema::{Schema, SchemaRegistry, ValidationResult};
pub use source::{ByteSink, ByteSource};
pub use tree::{Children, Document, DocumentFragment, Node, NodeKind};
pub use writer::{
    Writer, copy_document, first_success, put_in_document, to_display_string, write,
};
