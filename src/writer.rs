//! Serializing documents, nodes and fragments
//!
//! Output is produced entirely in memory before any sink is opened, so a
//! failed transform never leaves partial bytes behind.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::config::WriterConfig;
use crate::diagnostics::{Collecting, DiagnosticSink, HandlerGuard};
use crate::error::{Result, XmlError};
use crate::libxml2::{
    XmlBuffer, XmlSaveCtxt, ensure_initialized, xmlAddChild, xmlBufferContent, xmlBufferCreate,
    xmlBufferFree, xmlBufferLength, xmlDocCopyNode, xmlFreeNode, xmlSaveClose, xmlSaveDoc,
    xmlSaveToBuffer, xmlSaveTree,
};
use crate::source::{ByteSink, write_all};
use crate::tree::{Document, Node, NodeKind};

/// Serializes with configurable save options and an optional validation
/// gate for whole documents.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    config: WriterConfig,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WriterConfig) -> Self {
        Writer { config }
    }

    pub fn does_validate(&self) -> bool {
        self.config.validate
    }

    pub fn set_validate(&mut self, validate: bool) {
        self.config.validate = validate;
    }

    pub fn save_options(&self) -> &WriterConfig {
        &self.config
    }

    pub fn save_options_mut(&mut self) -> &mut WriterConfig {
        &mut self.config
    }

    /// Write `document` to `sink`. When validating, the document must pass
    /// [`Document::validate`] first; otherwise the sink is never opened.
    pub fn write_document<K: ByteSink + ?Sized>(
        &self,
        document: &Document,
        sink: &mut K,
    ) -> Result<()> {
        if self.config.validate {
            document.validate()?;
        }
        self.write_node(document.as_node(), sink)
    }

    /// Write any node with this writer's options, without validation.
    pub fn write_node<K: ByteSink + ?Sized>(&self, node: Node<'_>, sink: &mut K) -> Result<()> {
        let bytes = serialize(node, &self.config)?;
        write_all(sink, &bytes)?;
        Ok(())
    }

    pub fn to_bytes(&self, node: Node<'_>) -> Result<Vec<u8>> {
        serialize(node, &self.config)
    }
}

/// Write `node` pretty-printed as UTF-8 to `sink`.
pub fn write<K: ByteSink + ?Sized>(node: Node<'_>, sink: &mut K) -> Result<()> {
    let bytes = serialize(node, &WriterConfig::default())?;
    write_all(sink, &bytes)?;
    Ok(())
}

/// Run `primary`; if it fails, run `fallback` once.
///
/// When both fail the primary error is returned and the fallback error is
/// only logged.
pub fn first_success<T>(
    primary: impl FnOnce() -> Result<T>,
    fallback: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match primary() {
        Ok(value) => Ok(value),
        Err(primary_error) => {
            log::warn!("Primary attempt failed, trying fallback: {}", primary_error);
            match fallback() {
                Ok(value) => Ok(value),
                Err(fallback_error) => {
                    log::error!("Fallback attempt failed: {}", fallback_error);
                    Err(primary_error)
                }
            }
        }
    }
}

/// Human-readable serialization of `node`. Nodes the engine cannot
/// serialize in place are copied into a fresh document and retried.
pub fn to_display_string(node: Node<'_>) -> Result<String> {
    let config = WriterConfig::default();
    let bytes = first_success(
        || serialize(node, &config),
        || {
            let copy = put_in_document(node)?;
            serialize(copy.as_node(), &config)
        },
    )?;
    String::from_utf8(bytes).map_err(|e| XmlError::write(e.to_string()))
}

/// Deep-copy `node` into a new document.
///
/// A document contributes its root element (an empty document yields an
/// empty copy) and a fragment contributes each of its children in order.
pub fn put_in_document(node: Node<'_>) -> Result<Document> {
    let document = Document::new()?;
    match node.kind() {
        NodeKind::Document => {
            if let Some(root) = node.effective_root() {
                import(&document, root)?;
            }
        }
        NodeKind::Fragment => {
            for child in node.children() {
                import(&document, child)?;
            }
        }
        _ => import(&document, node)?,
    }
    Ok(document)
}

/// Fresh copy of `document`'s root element, bound to the same schema.
pub fn copy_document(document: &Document) -> Result<Document> {
    let mut copy = put_in_document(document.as_node())?;
    if let Some(schema) = document.schema() {
        copy.bind_schema(schema.clone());
    }
    Ok(copy)
}

fn import(document: &Document, node: Node<'_>) -> Result<()> {
    unsafe {
        let copy = xmlDocCopyNode(node.as_ptr(), document.as_ptr(), 1);
        if copy.is_null() {
            return Err(XmlError::internal("xmlDocCopyNode failed"));
        }
        if xmlAddChild(document.as_node().as_ptr(), copy).is_null() {
            xmlFreeNode(copy);
            return Err(XmlError::internal("xmlAddChild failed"));
        }
    }
    Ok(())
}

/// Owned libxml2 output buffer
struct Buffer(NonNull<XmlBuffer>);

impl Buffer {
    fn new() -> Result<Self> {
        let raw = unsafe { xmlBufferCreate() };
        NonNull::new(raw)
            .map(Buffer)
            .ok_or_else(|| XmlError::internal("xmlBufferCreate failed"))
    }

    fn to_vec(&self) -> Vec<u8> {
        unsafe {
            let content = xmlBufferContent(self.0.as_ptr());
            let length = usize::try_from(xmlBufferLength(self.0.as_ptr())).unwrap_or(0);
            if content.is_null() || length == 0 {
                return Vec::new();
            }
            std::slice::from_raw_parts(content, length).to_vec()
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { xmlBufferFree(self.0.as_ptr()) };
    }
}

/// Save context that is closed exactly once
struct SaveContext(Option<NonNull<XmlSaveCtxt>>);

impl SaveContext {
    fn close(&mut self) -> i32 {
        match self.0.take() {
            Some(ctxt) => unsafe { xmlSaveClose(ctxt.as_ptr()) },
            None => 0,
        }
    }
}

impl Drop for SaveContext {
    fn drop(&mut self) {
        self.close();
    }
}

fn serialize(node: Node<'_>, config: &WriterConfig) -> Result<Vec<u8>> {
    if node.kind() == NodeKind::Document {
        return save(node, config);
    }

    // libxml2 only writes the declarations stored on the saved node itself.
    // Copying into a fresh document re-declares every namespace bound on an
    // ancestor, so the output stays self-contained.
    let copy = put_in_document(node)?;
    let separator: &[u8] = if config.pretty_print { b"\n" } else { b"" };
    let mut output = Vec::new();
    for (index, top) in copy.as_node().children().enumerate() {
        if index > 0 {
            output.extend_from_slice(separator);
        }
        output.extend(save(top, config)?);
    }
    Ok(output)
}

fn save(node: Node<'_>, config: &WriterConfig) -> Result<Vec<u8>> {
    ensure_initialized();
    let encoding = CString::new(config.encoding.as_str())
        .map_err(|_| XmlError::write(format!("invalid encoding name '{}'", config.encoding)))?;
    let buffer = Buffer::new()?;

    let mut listener = Collecting::default();
    let mut sink = DiagnosticSink::new(&mut listener);
    let failed = unsafe {
        let _guard = HandlerGuard::install(sink.as_user_data());
        let raw = xmlSaveToBuffer(buffer.0.as_ptr(), encoding.as_ptr(), config.options());
        match NonNull::new(raw) {
            None => true,
            Some(ctxt) => {
                let mut save = SaveContext(Some(ctxt));
                let written = match node.kind() {
                    NodeKind::Document => xmlSaveDoc(ctxt.as_ptr(), node.as_ptr().cast()),
                    _ => xmlSaveTree(ctxt.as_ptr(), node.as_ptr()),
                };
                let closed = save.close();
                written < 0 || closed < 0
            }
        }
    };

    let messages: Vec<String> = sink.into_received().into_iter().map(|d| d.message).collect();
    if failed {
        let details = if messages.is_empty() {
            format!("could not serialize {:?} node as {}", node.kind(), config.encoding)
        } else {
            messages.join("; ")
        };
        return Err(XmlError::write(details));
    }
    Ok(buffer.to_vec())
}
