//! Namespace-aware document trees
//!
//! A [`Document`] owns one libxml2 document and every fragment extracted
//! from it. [`Node`] is a borrowed handle into that tree: it stays valid for
//! as long as the owning document lives, wherever the node is moved inside
//! it.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use libc::c_char;

use crate::diagnostics::{Collecting, DiagnosticSink, HandlerGuard};
use crate::error::{Result, XmlError};
use crate::libxml2::{
    XML_ATTRIBUTE_NODE, XML_CDATA_SECTION_NODE, XML_COMMENT_NODE, XML_DOCUMENT_FRAG_NODE,
    XML_DOCUMENT_NODE, XML_ELEMENT_NODE, XML_HTML_DOCUMENT_NODE, XML_NAMESPACE_DECL, XML_PI_NODE,
    XML_TEXT_NODE, XPATH_NODESET, XmlDoc, XmlNode, XmlXPathContext, XmlXPathObject,
    ensure_initialized, xmlAddChild, xmlDocGetRootElement, xmlFreeDoc, xmlFreeNode, xmlNewDoc,
    xmlNewDocFragment, xmlUnlinkNode, xmlXPathEval, xmlXPathFreeContext, xmlXPathFreeObject,
    xmlXPathNewContext, xmlXPathRegisterNs,
};
use crate::schema::Schema;

/// Shape of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    /// Character data, including CDATA sections
    Text,
    Comment,
    Fragment,
    ProcessingInstruction,
    /// DTD declarations, entity references and other engine-specific nodes
    Other,
}

impl NodeKind {
    fn from_raw(node_type: i32) -> Self {
        match node_type {
            XML_ELEMENT_NODE => NodeKind::Element,
            XML_TEXT_NODE | XML_CDATA_SECTION_NODE => NodeKind::Text,
            XML_COMMENT_NODE => NodeKind::Comment,
            XML_DOCUMENT_NODE | XML_HTML_DOCUMENT_NODE => NodeKind::Document,
            XML_DOCUMENT_FRAG_NODE => NodeKind::Fragment,
            XML_PI_NODE => NodeKind::ProcessingInstruction,
            _ => NodeKind::Other,
        }
    }
}

/// Copies a NUL-terminated engine string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// An XML document tree
pub struct Document {
    ptr: NonNull<XmlDoc>,
    schema: Option<Schema>,
    fragments: RefCell<Vec<NonNull<XmlNode>>>,
}

impl Document {
    /// Create an empty document (no root element)
    pub fn new() -> Result<Self> {
        ensure_initialized();
        let raw = unsafe { xmlNewDoc(c"1.0".as_ptr()) };
        let ptr = NonNull::new(raw).ok_or_else(|| XmlError::internal("xmlNewDoc failed"))?;
        Ok(unsafe { Document::from_raw(ptr) })
    }

    /// # Safety
    ///
    /// `ptr` must be a document allocated by libxml2 that nothing else frees.
    pub(crate) unsafe fn from_raw(ptr: NonNull<XmlDoc>) -> Self {
        Document {
            ptr,
            schema: None,
            fragments: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr.as_ptr()
    }

    /// The document node itself
    pub fn as_node(&self) -> Node<'_> {
        Node::new(self.ptr.cast::<XmlNode>())
    }

    pub fn root_element(&self) -> Option<Node<'_>> {
        unsafe { Node::from_raw(xmlDocGetRootElement(self.as_ptr())) }
    }

    /// Schema the document was parsed against or explicitly bound to
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn bind_schema(&mut self, schema: Schema) {
        self.schema = Some(schema);
    }

    /// Validate against the bound schema. A document without a bound schema
    /// has nothing to violate and always passes.
    pub fn validate(&self) -> Result<()> {
        match &self.schema {
            Some(schema) => schema.validate(self),
            None => Ok(()),
        }
    }

    /// Evaluate an XPath expression and return the selected nodes in
    /// document order. `namespaces` binds prefixes used by the expression.
    /// Attribute and namespace nodes are not returned.
    pub fn select(&self, expression: &str, namespaces: &[(&str, &str)]) -> Result<Vec<Node<'_>>> {
        ensure_initialized();
        let invalid = |details: String| XmlError::InvalidQuery {
            expression: expression.to_string(),
            details,
        };

        let c_expression = CString::new(expression)
            .map_err(|_| invalid("expression contains a NUL byte".to_string()))?;
        let context = XPathContext::new(self)?;
        for (prefix, uri) in namespaces {
            let c_prefix = CString::new(*prefix)
                .map_err(|_| invalid(format!("prefix '{}' contains a NUL byte", prefix)))?;
            let c_uri = CString::new(*uri)
                .map_err(|_| invalid(format!("namespace '{}' contains a NUL byte", uri)))?;
            let status =
                unsafe { xmlXPathRegisterNs(context.as_ptr(), c_prefix.as_ptr(), c_uri.as_ptr()) };
            if status != 0 {
                return Err(invalid(format!("cannot bind prefix '{}'", prefix)));
            }
        }

        let mut listener = Collecting::default();
        let mut sink = DiagnosticSink::new(&mut listener);
        let raw = {
            let _guard = unsafe { HandlerGuard::install(sink.as_user_data()) };
            unsafe { xmlXPathEval(c_expression.as_ptr(), context.as_ptr()) }
        };
        let Some(object) = NonNull::new(raw).map(XPathObject) else {
            let details = sink
                .received()
                .first()
                .map(|d| d.message.clone())
                .unwrap_or_else(|| "evaluation failed".to_string());
            return Err(invalid(details));
        };

        let result = unsafe { object.0.as_ref() };
        if result.object_type != XPATH_NODESET {
            return Err(invalid("expression does not select nodes".to_string()));
        }

        let mut nodes = Vec::new();
        if let Some(set) = unsafe { result.nodesetval.as_ref() } {
            for index in 0..usize::try_from(set.node_nr).unwrap_or(0) {
                let raw_node = unsafe { *set.node_tab.add(index) };
                if raw_node.is_null() {
                    continue;
                }
                // Attribute and namespace entries are smaller structs that
                // only share the type field's offset with xmlNode.
                let node_type = unsafe { std::ptr::addr_of!((*raw_node).node_type).read() };
                if node_type == XML_ATTRIBUTE_NODE || node_type == XML_NAMESPACE_DECL {
                    continue;
                }
                if let Some(node) = unsafe { Node::from_raw(raw_node) } {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }

    /// New empty fragment owned by this document
    pub(crate) fn new_fragment(&self) -> Result<DocumentFragment<'_>> {
        let raw = unsafe { xmlNewDocFragment(self.as_ptr()) };
        let ptr = NonNull::new(raw).ok_or_else(|| XmlError::internal("xmlNewDocFragment failed"))?;
        self.fragments.borrow_mut().push(ptr);
        Ok(DocumentFragment {
            node: Node::new(ptr),
        })
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        // Fragments are detached from the tree, so xmlFreeDoc would miss them.
        for fragment in self.fragments.get_mut().drain(..) {
            unsafe { xmlFreeNode(fragment.as_ptr()) };
        }
        unsafe { xmlFreeDoc(self.ptr.as_ptr()) };
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root_element())
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

/// Borrowed handle to a node owned by a [`Document`]
#[derive(Clone, Copy)]
pub struct Node<'d> {
    ptr: NonNull<XmlNode>,
    _owner: PhantomData<&'d Document>,
}

impl<'d> Node<'d> {
    fn new(ptr: NonNull<XmlNode>) -> Self {
        Node {
            ptr,
            _owner: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `ptr` must be null or a node owned by a document that outlives `'d`.
    pub(crate) unsafe fn from_raw(ptr: *mut XmlNode) -> Option<Self> {
        NonNull::new(ptr).map(Node::new)
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlNode {
        self.ptr.as_ptr()
    }

    fn raw(&self) -> &XmlNode {
        unsafe { self.ptr.as_ref() }
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_raw(self.raw().node_type)
    }

    /// The root element for a document, the node itself otherwise
    pub fn effective_root(&self) -> Option<Node<'d>> {
        match self.kind() {
            NodeKind::Document => unsafe {
                Node::from_raw(xmlDocGetRootElement(self.ptr.cast::<XmlDoc>().as_ptr()))
            },
            _ => Some(*self),
        }
    }

    /// Local name of an element or processing instruction target
    pub fn local_name(&self) -> Option<String> {
        match self.kind() {
            NodeKind::Element | NodeKind::ProcessingInstruction => unsafe {
                owned_string(self.raw().name)
            },
            _ => None,
        }
    }

    /// Namespace URI of an element, `None` when unqualified
    pub fn namespace_uri(&self) -> Option<String> {
        if self.kind() != NodeKind::Element {
            return None;
        }
        let ns = unsafe { self.raw().ns.as_ref() }?;
        unsafe { owned_string(ns.href) }
    }

    pub fn prefix(&self) -> Option<String> {
        if self.kind() != NodeKind::Element {
            return None;
        }
        let ns = unsafe { self.raw().ns.as_ref() }?;
        unsafe { owned_string(ns.prefix) }
    }

    pub fn parent(&self) -> Option<Node<'d>> {
        unsafe { Node::from_raw(self.raw().parent) }
    }

    pub fn first_child(&self) -> Option<Node<'d>> {
        if !self.has_child_list() {
            return None;
        }
        unsafe { Node::from_raw(self.raw().children) }
    }

    pub fn next_sibling(&self) -> Option<Node<'d>> {
        unsafe { Node::from_raw(self.raw().next) }
    }

    pub fn has_children(&self) -> bool {
        self.first_child().is_some()
    }

    pub fn children(&self) -> Children<'d> {
        Children {
            next: self.first_child(),
        }
    }

    /// Character data of this node and all its descendants, in order
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, text: &mut String) {
        match self.kind() {
            NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction => {
                if let Some(content) = unsafe { owned_string(self.raw().content) } {
                    text.push_str(&content);
                }
            }
            _ => {
                for child in self.children() {
                    if matches!(
                        child.kind(),
                        NodeKind::Element | NodeKind::Text | NodeKind::Fragment
                    ) {
                        child.collect_text(text);
                    }
                }
            }
        }
    }

    /// Value of an attribute in no namespace
    pub fn attribute(&self, name: &str) -> Option<String> {
        if self.kind() != NodeKind::Element {
            return None;
        }
        let mut attr = self.raw().properties;
        while let Some(current) = unsafe { attr.as_ref() } {
            let matches = current.ns.is_null()
                && unsafe { owned_string(current.name) }.as_deref() == Some(name);
            if matches {
                let value = Children {
                    next: unsafe { Node::from_raw(current.children) },
                }
                .map(|text| text.text_content())
                .collect();
                return Some(value);
            }
            attr = current.next;
        }
        None
    }

    /// Text, comment and PI nodes keep their content where containers keep
    /// their first child.
    fn has_child_list(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::Document | NodeKind::Element | NodeKind::Fragment
        )
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Node");
        debug.field("kind", &self.kind());
        if let Some(name) = self.local_name() {
            debug.field("name", &name);
        }
        if let Some(uri) = self.namespace_uri() {
            debug.field("namespace", &uri);
        }
        debug.finish()
    }
}

/// Ordered children of a node
pub struct Children<'d> {
    next: Option<Node<'d>>,
}

impl<'d> Iterator for Children<'d> {
    type Item = Node<'d>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next_sibling();
        Some(current)
    }
}

/// A detached, rootless ordered list of nodes, owned by the document it was
/// extracted from
#[derive(Debug)]
pub struct DocumentFragment<'d> {
    node: Node<'d>,
}

impl<'d> DocumentFragment<'d> {
    pub fn as_node(&self) -> Node<'d> {
        self.node
    }

    pub fn children(&self) -> Children<'d> {
        self.node.children()
    }

    pub fn len(&self) -> usize {
        self.children().count()
    }

    pub fn is_empty(&self) -> bool {
        !self.node.has_children()
    }

    pub fn text_content(&self) -> String {
        self.node.text_content()
    }

    /// Move `node` (with its subtree) to the end of this fragment.
    pub(crate) fn append(&self, node: Node<'d>) -> Result<()> {
        unsafe {
            xmlUnlinkNode(node.as_ptr());
            if xmlAddChild(self.node.as_ptr(), node.as_ptr()).is_null() {
                return Err(XmlError::internal("xmlAddChild failed"));
            }
        }
        Ok(())
    }
}

struct XPathContext(NonNull<XmlXPathContext>);

impl XPathContext {
    fn new(document: &Document) -> Result<Self> {
        let raw = unsafe { xmlXPathNewContext(document.as_ptr()) };
        NonNull::new(raw)
            .map(XPathContext)
            .ok_or_else(|| XmlError::internal("xmlXPathNewContext failed"))
    }

    fn as_ptr(&self) -> *mut XmlXPathContext {
        self.0.as_ptr()
    }
}

impl Drop for XPathContext {
    fn drop(&mut self) {
        unsafe { xmlXPathFreeContext(self.0.as_ptr()) };
    }
}

struct XPathObject(NonNull<XmlXPathObject>);

impl Drop for XPathObject {
    fn drop(&mut self) {
        unsafe { xmlXPathFreeObject(self.0.as_ptr()) };
    }
}
