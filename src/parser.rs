//! Strict, namespace-aware document parsing
//!
//! Parsing is pedantic: every warning, recoverable error or fatal error the
//! engine reports fails the parse. Each call wires a fresh [`Pedantic`]
//! listener into the engine and stops the parser on the first report.

use std::ptr::NonNull;

use libc::{c_char, c_int};

use crate::config::ParserConfig;
use crate::diagnostics::{
    Diagnostic, DiagnosticListener, DiagnosticSink, HandlerGuard, Lenient, Pedantic,
};
use crate::error::{Result, XmlError};
use crate::libxml2::{
    XmlParserCtxt, ensure_initialized, xmlCtxtReadMemory, xmlFreeParserCtxt, xmlNewParserCtxt,
};
use crate::schema::{Schema, ValidationResult};
use crate::source::{ByteSource, read_all};
use crate::tree::Document;

/// Document builder that fails on any engine diagnostic, optionally
/// validating against a compiled schema.
#[derive(Debug, Clone, Default)]
pub struct StrictParser {
    schema: Option<Schema>,
    config: ParserConfig,
}

impl StrictParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Parse a document from `source`, closing the source stream on every
    /// path. With a schema, the document must also be valid, and the schema
    /// is bound to the returned document.
    pub fn parse<S: ByteSource + ?Sized>(&self, source: &S) -> Result<Document> {
        let bytes = read_all(source)?;
        self.parse_bytes(&bytes)
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Document> {
        let mut listener = Pedantic;
        let mut document = parse_with(bytes, &self.config, &mut listener)?;

        if let Some(schema) = &self.schema {
            let (result, abort_cause) = schema.check(&document, &mut listener)?;
            match (result, abort_cause) {
                (_, Some(cause)) => return Err(XmlError::Parse(cause)),
                (ValidationResult::Valid, None) => {}
                (ValidationResult::Invalid { errors, .. }, None) => {
                    let message = errors
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| "document is not valid".to_string());
                    return Err(XmlError::Parse(Diagnostic::synthetic(message)));
                }
                (ValidationResult::InternalError { code }, None) => {
                    return Err(XmlError::internal(format!(
                        "schema validation returned {}",
                        code
                    )));
                }
            }
            document.bind_schema(schema.clone());
        }
        Ok(document)
    }
}

/// Namespace URI of the root element of the document in `source`, or `None`
/// when the root element is unqualified.
pub fn read_namespace<S: ByteSource + ?Sized>(source: &S) -> Result<Option<String>> {
    let document = StrictParser::new().parse(source)?;
    Ok(document
        .root_element()
        .and_then(|root| root.namespace_uri()))
}

/// Parse tolerating warnings and recoverable errors (logged); only fatal
/// errors fail.
pub fn read_node<S: ByteSource + ?Sized>(source: &S) -> Result<Document> {
    let bytes = read_all(source)?;
    parse_with(&bytes, &ParserConfig::default(), &mut Lenient)
}

/// Owned libxml2 parser context
struct ParserContext(NonNull<XmlParserCtxt>);

impl ParserContext {
    fn new() -> Result<Self> {
        let raw = unsafe { xmlNewParserCtxt() };
        NonNull::new(raw)
            .map(ParserContext)
            .ok_or_else(|| XmlError::internal("parser context allocation failed"))
    }

    fn as_ptr(&self) -> *mut XmlParserCtxt {
        self.0.as_ptr()
    }
}

impl Drop for ParserContext {
    fn drop(&mut self) {
        unsafe { xmlFreeParserCtxt(self.0.as_ptr()) };
    }
}

fn parse_with(
    bytes: &[u8],
    config: &ParserConfig,
    listener: &mut dyn DiagnosticListener,
) -> Result<Document> {
    ensure_initialized();
    let size = c_int::try_from(bytes.len())
        .map_err(|_| XmlError::Parse(Diagnostic::synthetic("document exceeds 2 GiB")))?;

    let context = ParserContext::new()?;
    let mut sink = DiagnosticSink::new(listener);
    sink.stop_on_abort(context.as_ptr());

    let raw = unsafe {
        let _guard = HandlerGuard::install(sink.as_user_data());
        xmlCtxtReadMemory(
            context.as_ptr(),
            bytes.as_ptr() as *const c_char,
            size,
            std::ptr::null(),
            std::ptr::null(),
            config.options(),
        )
    };

    // Take ownership before inspecting diagnostics so a document built
    // alongside a reported problem is still freed.
    let document = NonNull::new(raw).map(|ptr| unsafe { Document::from_raw(ptr) });
    if let Some(cause) = sink.abort_cause() {
        return Err(XmlError::Parse(cause.clone()));
    }
    document.ok_or_else(|| XmlError::Parse(Diagnostic::synthetic("parser returned no document")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    const SIMPLE_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root" type="xs:string"/>
</xs:schema>"#;

    #[test]
    fn test_parse_is_namespace_aware() {
        let document = StrictParser::new()
            .parse(r#"<p:root xmlns:p="urn:a"><p:child/></p:root>"#)
            .unwrap();
        let root = document.root_element().unwrap();
        assert_eq!(root.local_name().as_deref(), Some("root"));
        assert_eq!(root.namespace_uri().as_deref(), Some("urn:a"));
        assert!(document.schema().is_none());
    }

    #[test]
    fn test_malformed_document_fails() {
        let result = StrictParser::new().parse("<root><unclosed></root>");
        match result {
            Err(XmlError::Parse(diagnostic)) => assert_eq!(diagnostic.severity, Severity::Fatal),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(
            StrictParser::new().parse(""),
            Err(XmlError::Parse(_))
        ));
    }

    #[test]
    fn test_warning_fails_the_parse() {
        // The engine only warns about XML 1.1 documents.
        let result = StrictParser::new().parse(r#"<?xml version="1.1"?><root/>"#);
        match result {
            Err(XmlError::Parse(diagnostic)) => {
                assert_eq!(diagnostic.severity, Severity::Warning)
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_recoverable_error_fails_the_parse() {
        let result = StrictParser::new().parse("<p:root/>");
        assert!(matches!(result, Err(XmlError::Parse(_))));
    }

    #[test]
    fn test_lenient_reader_tolerates_warnings() {
        let document = read_node(r#"<?xml version="1.1"?><root xmlns="urn:a"/>"#).unwrap();
        let root = document.root_element().unwrap();
        assert_eq!(root.namespace_uri().as_deref(), Some("urn:a"));

        assert!(read_node("<root>").is_err());
    }

    #[test]
    fn test_validating_parse() {
        let schema = Schema::from_memory(SIMPLE_XSD.as_bytes()).unwrap();
        let parser = StrictParser::new().with_schema(schema);

        let document = parser.parse("<root>text</root>").unwrap();
        assert!(document.schema().is_some());
        assert!(document.validate().is_ok());

        let result = parser.parse("<root><child/></root>");
        assert!(matches!(result, Err(XmlError::Parse(_))));
    }

    #[test]
    fn test_read_namespace() {
        assert_eq!(
            read_namespace(r#"<root xmlns="urn:a"/>"#).unwrap().as_deref(),
            Some("urn:a")
        );
        assert_eq!(read_namespace("<root/>").unwrap(), None);
    }

    #[test]
    fn test_read_namespace_is_idempotent() {
        let source = String::from(r#"<x:r xmlns:x="urn:b"/>"#);
        let first = read_namespace(&source).unwrap();
        let second = read_namespace(&source).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_blank_text_is_dropped_by_default() {
        let document = StrictParser::new()
            .parse("<root>\n  <a/>\n  <b/>\n</root>")
            .unwrap();
        assert_eq!(document.root_element().unwrap().children().count(), 2);

        let keep_blanks = ParserConfig {
            drop_blank_text: false,
            ..ParserConfig::default()
        };
        let document = StrictParser::new()
            .with_config(keep_blanks)
            .parse("<root>\n  <a/>\n  <b/>\n</root>")
            .unwrap();
        assert_eq!(document.root_element().unwrap().children().count(), 5);
    }
}
