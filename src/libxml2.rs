//! LibXML2 FFI bindings
//!
//! Direct declarations for the slice of libxml2 this crate drives: document
//! parsing, tree editing, XPath node queries, XML Schema compilation and
//! validation, and buffered serialization.
//!
//! ## Why direct FFI
//!
//! No mature pure Rust library offers XML Schema (XSD) validation, and the
//! `libxml` crate still needs the system library while hiding the pieces we
//! need most (structured error routing, `xmlStopParser`). We bind the
//! functions directly and wrap every handle we own in an RAII type in the
//! modules that use them.
//!
//! ## Struct layouts
//!
//! Only the leading fields of `xmlNode`, `xmlAttr`, `xmlNs`, `xmlNodeSet` and
//! `xmlXPathObject` are declared. They are read through pointers handed out
//! by libxml2 and never allocated on the Rust side, so declaring a prefix of
//! the public layout is sufficient.
//!
//! ## Thread safety
//!
//! libxml2's initialization functions are NOT thread-safe, so they run
//! exactly once behind [`std::sync::Once`]. The structured error handler is
//! a per-thread global in libxml2; see `diagnostics::HandlerGuard`.

use std::sync::Once;

use libc::{c_char, c_int, c_long, c_ushort, c_void};

/// Global initialization flag for libxml2
static LIBXML2_INIT: Once = Once::new();

/// Initialize libxml2's parser and globals exactly once, in a thread-safe
/// manner. Every entry point that touches libxml2 calls this first.
pub(crate) fn ensure_initialized() {
    LIBXML2_INIT.call_once(|| unsafe {
        xmlInitParser();
        xmlInitGlobals();
    });
}

// Node type codes (xmlElementType)
pub const XML_ELEMENT_NODE: c_int = 1;
pub const XML_ATTRIBUTE_NODE: c_int = 2;
pub const XML_TEXT_NODE: c_int = 3;
pub const XML_CDATA_SECTION_NODE: c_int = 4;
pub const XML_PI_NODE: c_int = 7;
pub const XML_COMMENT_NODE: c_int = 8;
pub const XML_DOCUMENT_NODE: c_int = 9;
pub const XML_DOCUMENT_FRAG_NODE: c_int = 11;
pub const XML_HTML_DOCUMENT_NODE: c_int = 13;
pub const XML_NAMESPACE_DECL: c_int = 18;

// Parser options (xmlParserOption)
pub const XML_PARSE_NOBLANKS: c_int = 1 << 8;
pub const XML_PARSE_NONET: c_int = 1 << 11;

// Save options (xmlSaveOption)
pub const XML_SAVE_FORMAT: c_int = 1 << 0;
pub const XML_SAVE_AS_XML: c_int = 1 << 5;

// Error levels (xmlErrorLevel)
pub const XML_ERR_WARNING: c_int = 1;
pub const XML_ERR_ERROR: c_int = 2;
pub const XML_ERR_FATAL: c_int = 3;

// XPath result type (xmlXPathObjectType)
pub const XPATH_NODESET: c_int = 1;

/// ## Opaque libxml2 structures
#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlXPathContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlBuffer {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSaveCtxt {
    _private: [u8; 0],
}

/// Leading fields of `struct _xmlNode`. `xmlDoc` shares the layout up to
/// `doc` and is larger, so a document may be read through this type.
#[repr(C)]
pub struct XmlNode {
    pub _private: *mut c_void,
    pub node_type: c_int,
    pub name: *const c_char,
    pub children: *mut XmlNode,
    pub last: *mut XmlNode,
    pub parent: *mut XmlNode,
    pub next: *mut XmlNode,
    pub prev: *mut XmlNode,
    pub doc: *mut XmlDoc,
    pub ns: *mut XmlNs,
    pub content: *mut c_char,
    pub properties: *mut XmlAttr,
    pub ns_def: *mut XmlNs,
    pub psvi: *mut c_void,
    pub line: c_ushort,
    pub extra: c_ushort,
}

/// Leading fields of `struct _xmlAttr`
#[repr(C)]
pub struct XmlAttr {
    pub _private: *mut c_void,
    pub attr_type: c_int,
    pub name: *const c_char,
    pub children: *mut XmlNode,
    pub last: *mut XmlNode,
    pub parent: *mut XmlNode,
    pub next: *mut XmlAttr,
    pub prev: *mut XmlAttr,
    pub doc: *mut XmlDoc,
    pub ns: *mut XmlNs,
}

/// Leading fields of `struct _xmlNs`
#[repr(C)]
pub struct XmlNs {
    pub next: *mut XmlNs,
    pub ns_type: c_int,
    pub href: *const c_char,
    pub prefix: *const c_char,
}

/// `struct _xmlNodeSet`
#[repr(C)]
pub struct XmlNodeSet {
    pub node_nr: c_int,
    pub node_max: c_int,
    pub node_tab: *mut *mut XmlNode,
}

/// Leading fields of `struct _xmlXPathObject`
#[repr(C)]
pub struct XmlXPathObject {
    pub object_type: c_int,
    pub nodesetval: *mut XmlNodeSet,
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();
    pub fn xmlInitGlobals();

    // Error routing
    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);
    // Thread-local slots behind the xmlStructuredError/xmlStructuredErrorContext macros
    pub fn __xmlStructuredError() -> *mut XmlStructuredErrorFunc;
    pub fn __xmlStructuredErrorContext() -> *mut *mut c_void;

    // Document parsing
    pub fn xmlNewParserCtxt() -> *mut XmlParserCtxt;
    pub fn xmlFreeParserCtxt(ctxt: *mut XmlParserCtxt);
    pub fn xmlCtxtReadMemory(
        ctxt: *mut XmlParserCtxt,
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlStopParser(ctxt: *mut XmlParserCtxt);

    // Tree construction and editing
    pub fn xmlNewDoc(version: *const c_char) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlFreeNode(node: *mut XmlNode);
    pub fn xmlDocGetRootElement(doc: *const XmlDoc) -> *mut XmlNode;
    pub fn xmlNewDocFragment(doc: *mut XmlDoc) -> *mut XmlNode;
    pub fn xmlDocCopyNode(node: *const XmlNode, doc: *mut XmlDoc, extended: c_int)
    -> *mut XmlNode;
    pub fn xmlUnlinkNode(node: *mut XmlNode);
    pub fn xmlAddChild(parent: *mut XmlNode, child: *mut XmlNode) -> *mut XmlNode;

    // XPath
    pub fn xmlXPathNewContext(doc: *mut XmlDoc) -> *mut XmlXPathContext;
    pub fn xmlXPathFreeContext(ctxt: *mut XmlXPathContext);
    pub fn xmlXPathRegisterNs(
        ctxt: *mut XmlXPathContext,
        prefix: *const c_char,
        ns_uri: *const c_char,
    ) -> c_int;
    pub fn xmlXPathEval(expr: *const c_char, ctxt: *mut XmlXPathContext) -> *mut XmlXPathObject;
    pub fn xmlXPathFreeObject(obj: *mut XmlXPathObject);

    // Schema parsing functions
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation functions
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;

    // Serialization
    pub fn xmlBufferCreate() -> *mut XmlBuffer;
    pub fn xmlBufferFree(buf: *mut XmlBuffer);
    pub fn xmlBufferContent(buf: *const XmlBuffer) -> *const u8;
    pub fn xmlBufferLength(buf: *const XmlBuffer) -> c_int;
    pub fn xmlSaveToBuffer(
        buffer: *mut XmlBuffer,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlSaveCtxt;
    pub fn xmlSaveDoc(ctxt: *mut XmlSaveCtxt, doc: *mut XmlDoc) -> c_long;
    pub fn xmlSaveTree(ctxt: *mut XmlSaveCtxt, node: *mut XmlNode) -> c_long;
    pub fn xmlSaveClose(ctxt: *mut XmlSaveCtxt) -> c_int;
}
