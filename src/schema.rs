//! Compiled XML Schemas and the registry that merges schema sources
//!
//! A [`Schema`] wraps a libxml2 `xmlSchema`. It is immutable once compiled
//! and shared through an `Arc`, so clones are cheap and may cross threads:
//! libxml2 schema structures are read-only during validation, and each
//! validation run creates its own context.

use std::ffi::CString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use libc::{c_char, c_int};

use crate::diagnostics::{
    Collecting, Diagnostic, DiagnosticListener, DiagnosticSink, HandlerGuard, Pedantic,
    forward_diagnostic,
};
use crate::error::{Result, XmlError};
use crate::libxml2::{
    XmlSchema, XmlSchemaParserCtxt, ensure_initialized, xmlSchemaFree, xmlSchemaFreeParserCtxt,
    xmlSchemaFreeValidCtxt, xmlSchemaNewMemParserCtxt, xmlSchemaNewParserCtxt,
    xmlSchemaNewValidCtxt, xmlSchemaParse, xmlSchemaSetParserStructuredErrors,
    xmlSchemaSetValidStructuredErrors, xmlSchemaValidateDoc,
};
use crate::parser::StrictParser;
use crate::source::ByteSource;
use crate::tree::Document;

const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Compiled from an empty source list: declares nothing, so every document
/// fails validation against it.
const EMPTY_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#;

/// Thread-safe handle to a compiled schema
#[derive(Debug, Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

#[derive(Debug)]
struct SchemaInner {
    ptr: NonNull<XmlSchema>,
}

// Safety: libxml2 documentation states that xmlSchema structures are thread-safe for reading
// See: http://xmlsoft.org/threads.html
unsafe impl Send for SchemaInner {}
unsafe impl Sync for SchemaInner {}

impl Drop for SchemaInner {
    fn drop(&mut self) {
        // The Arc ensures this runs exactly once per compiled schema.
        unsafe { xmlSchemaFree(self.ptr.as_ptr()) };
    }
}

/// Outcome of one validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Validation succeeded (return code 0)
    Valid,
    /// Validation failed with errors (return code > 0)
    Invalid {
        error_count: i32,
        errors: Vec<String>,
    },
    /// Internal error occurred (return code < 0)
    InternalError { code: i32 },
}

impl ValidationResult {
    /// Create ValidationResult from libxml2 return code and captured errors
    pub fn from_code(code: c_int, errors: Vec<String>) -> Self {
        match code {
            0 => ValidationResult::Valid,
            n if n > 0 => ValidationResult::Invalid {
                error_count: n,
                errors,
            },
            n => ValidationResult::InternalError { code: n },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationResult::Invalid { .. })
    }
}

impl Schema {
    /// Compile a single schema document held in memory.
    ///
    /// **IMPORTANT**: Schema parsing is NOT thread-safe in libxml2. Compile
    /// from one thread at a time; validate from as many as you like.
    pub fn from_memory(schema_data: &[u8]) -> Result<Self> {
        ensure_initialized();
        let size = c_int::try_from(schema_data.len())
            .map_err(|_| XmlError::schema("schema source exceeds 2 GiB"))?;
        let ctxt =
            unsafe { xmlSchemaNewMemParserCtxt(schema_data.as_ptr() as *const c_char, size) };
        Self::compile(ctxt)
    }

    /// Compile the schema document at `path`, resolving its includes and
    /// imports relative to it.
    fn from_location(path: &Path) -> Result<Self> {
        ensure_initialized();
        let location = path
            .to_str()
            .and_then(|p| CString::new(p).ok())
            .ok_or_else(|| XmlError::schema(format!("unusable schema path {}", path.display())))?;
        let ctxt = unsafe { xmlSchemaNewParserCtxt(location.as_ptr()) };
        Self::compile(ctxt)
    }

    fn compile(ctxt: *mut XmlSchemaParserCtxt) -> Result<Self> {
        let ctxt = NonNull::new(ctxt)
            .ok_or_else(|| XmlError::internal("schema parser context allocation failed"))?;

        let mut listener = Pedantic;
        let mut sink = DiagnosticSink::new(&mut listener);
        let raw = unsafe {
            let user_data = sink.as_user_data();
            let _guard = HandlerGuard::install(user_data);
            xmlSchemaSetParserStructuredErrors(ctxt.as_ptr(), Some(forward_diagnostic), user_data);
            let raw = xmlSchemaParse(ctxt.as_ptr());
            // Always free the parser context
            xmlSchemaFreeParserCtxt(ctxt.as_ptr());
            raw
        };

        // Wrap first so a schema compiled alongside warnings is still freed.
        let schema = NonNull::new(raw).map(|ptr| Schema {
            inner: Arc::new(SchemaInner { ptr }),
        });
        if let Some(cause) = sink.abort_cause() {
            return Err(XmlError::schema(cause.to_string()));
        }
        schema.ok_or_else(|| XmlError::schema("schema compilation failed"))
    }

    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr.as_ptr()
    }

    /// Validate `document` against this schema, reporting every violation.
    pub fn validate(&self, document: &Document) -> Result<()> {
        let mut listener = Collecting::default();
        match self.check(document, &mut listener)?.0 {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { errors, .. } => Err(XmlError::Validation { errors }),
            ValidationResult::InternalError { code } => Err(XmlError::internal(format!(
                "schema validation returned {}",
                code
            ))),
        }
    }

    /// Run one validation, returning the engine's verdict and the first
    /// diagnostic the listener aborted on.
    pub(crate) fn check(
        &self,
        document: &Document,
        listener: &mut dyn DiagnosticListener,
    ) -> Result<(ValidationResult, Option<Diagnostic>)> {
        ensure_initialized();
        let valid_ctxt = unsafe { xmlSchemaNewValidCtxt(self.as_ptr()) };
        if valid_ctxt.is_null() {
            return Err(XmlError::internal("validation context creation failed"));
        }

        let mut sink = DiagnosticSink::new(listener);
        let code = unsafe {
            let user_data = sink.as_user_data();
            let _guard = HandlerGuard::install(user_data);
            xmlSchemaSetValidStructuredErrors(valid_ctxt, Some(forward_diagnostic), user_data);
            let code = xmlSchemaValidateDoc(valid_ctxt, document.as_ptr());
            // Always free the validation context
            xmlSchemaFreeValidCtxt(valid_ctxt);
            code
        };

        let abort_cause = sink.abort_cause().cloned();
        let errors = sink
            .into_received()
            .into_iter()
            .map(|d| d.message)
            .collect();
        Ok((ValidationResult::from_code(code, errors), abort_cause))
    }
}

/// Ordered list of schema sources compiled together on demand.
///
/// The registry is a plain value: share it by reference and synchronise
/// externally if it is mutated from several threads.
#[derive(Default)]
pub struct SchemaRegistry {
    sources: Vec<Box<dyn ByteSource>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a schema source. Sources are neither checked nor deduplicated
    /// here; problems surface from [`SchemaRegistry::compile`].
    pub fn add_schema<S: ByteSource + 'static>(&mut self, source: S) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Compile every registered source, in registration order, into one
    /// schema. Nothing is cached: each call reads the sources again.
    pub fn compile(&self) -> Result<Schema> {
        let mut streams = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            streams.push(source.open_buffered_stream()?);
        }

        let mut units = Vec::with_capacity(streams.len());
        for stream in &mut streams {
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes)?;
            units.push(bytes);
        }

        let schema = compile_units(&units);
        drop(streams);
        schema
    }

    /// A strict parser validating against a freshly compiled schema
    pub fn builder_with_schema(&self) -> Result<StrictParser> {
        Ok(StrictParser::new().with_schema(self.compile()?))
    }
}

fn compile_units(units: &[Vec<u8>]) -> Result<Schema> {
    match units {
        [] => Schema::from_memory(EMPTY_SCHEMA.as_bytes()),
        [single] => Schema::from_memory(single),
        _ => compile_combined(units),
    }
}

/// Compile several schema documents as one unit.
///
/// libxml2 compiles one root schema, so the sources are laid out in a
/// scratch directory: sources sharing a target namespace are included by a
/// per-namespace aggregate, and a driver schema imports every aggregate and
/// includes the no-namespace sources.
fn compile_combined(units: &[Vec<u8>]) -> Result<Schema> {
    let workspace = tempfile::Builder::new()
        .prefix("xml-persist-schema")
        .tempdir()?;

    let mut groups: Vec<(Option<String>, Vec<String>)> = Vec::new();
    for (index, unit) in units.iter().enumerate() {
        let namespace = target_namespace(unit)?;
        let file_name = format!("source-{}.xsd", index);
        std::fs::write(workspace.path().join(&file_name), unit)?;
        match groups.iter_mut().find(|(ns, _)| *ns == namespace) {
            Some((_, files)) => files.push(file_name),
            None => groups.push((namespace, vec![file_name])),
        }
    }

    let mut driver = schema_open(None);
    for (index, (namespace, files)) in groups.iter().enumerate() {
        match namespace {
            None => {
                for file in files {
                    driver.push_str(&include(file));
                }
            }
            Some(namespace) => {
                let file_name = format!("namespace-{}.xsd", index);
                let mut aggregate = schema_open(Some(namespace));
                for file in files {
                    aggregate.push_str(&include(file));
                }
                aggregate.push_str("</xs:schema>\n");
                std::fs::write(workspace.path().join(&file_name), aggregate)?;
                driver.push_str(&format!(
                    "  <xs:import namespace=\"{}\" schemaLocation=\"{}\"/>\n",
                    escape_attribute(namespace),
                    file_name
                ));
            }
        }
    }
    driver.push_str("</xs:schema>\n");

    let driver_path: PathBuf = workspace.path().join("driver.xsd");
    std::fs::write(&driver_path, &driver)?;
    log::debug!(
        "Compiling {} schema sources across {} namespaces",
        units.len(),
        groups.len()
    );

    // The workspace is removed when it drops, after compilation.
    Schema::from_location(&driver_path)
}

fn target_namespace(unit: &[u8]) -> Result<Option<String>> {
    let document = StrictParser::new()
        .parse_bytes(unit)
        .map_err(|e| XmlError::schema(format!("malformed schema source: {}", e)))?;
    Ok(document
        .root_element()
        .and_then(|root| root.attribute("targetNamespace")))
}

fn schema_open(target_namespace: Option<&str>) -> String {
    match target_namespace {
        Some(namespace) => format!(
            "<xs:schema xmlns:xs=\"{}\" targetNamespace=\"{}\">\n",
            XSD_NAMESPACE,
            escape_attribute(namespace)
        ),
        None => format!("<xs:schema xmlns:xs=\"{}\">\n", XSD_NAMESPACE),
    }
}

fn include(file_name: &str) -> String {
    format!("  <xs:include schemaLocation=\"{}\"/>\n", file_name)
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
