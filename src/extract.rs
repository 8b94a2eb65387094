//! Detaching the contents of a uniquely named element

use crate::error::{Result, XmlError};
use crate::qname::QualifiedName;
use crate::tree::{Document, DocumentFragment, Node, NodeKind};
use crate::writer::to_display_string;

/// Find the single element named `name` anywhere in `document` and move all
/// of its children, in order, into a new fragment.
///
/// The matched element stays in the tree, now empty. Extracting the same
/// name twice finds the emptied element again and yields an empty fragment.
pub fn extract_child_fragment<'d>(
    document: &'d Document,
    name: &QualifiedName,
) -> Result<DocumentFragment<'d>> {
    let (query, binding) = name.descendant_query();
    let namespaces: Vec<(&str, &str)> = binding.into_iter().collect();
    let matches = document.select(&query, &namespaces)?;

    let matched = match matches.as_slice() {
        [] => {
            return Err(XmlError::NotFound { name: name.clone() });
        }
        [single] => *single,
        _ => {
            return Err(XmlError::AmbiguousMatch {
                name: name.clone(),
                count: matches.len(),
            });
        }
    };

    if log::log_enabled!(log::Level::Debug) {
        log::debug!("Found node: {}", describe(matched));
    }

    let fragment = document.new_fragment()?;
    while let Some(child) = matched.first_child() {
        fragment.append(child)?;
    }

    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "Extracted fragment with {} node(s): {}",
            fragment.len(),
            describe(fragment.as_node())
        );
    }
    Ok(fragment)
}

/// `(local name, text content)` of each element child of `node`, in order.
/// A repeated name keeps its first position and takes its last value.
pub fn child_text_contents(node: Node<'_>) -> Vec<(String, String)> {
    let mut contents: Vec<(String, String)> = Vec::new();
    for child in node.children().filter(|c| c.kind() == NodeKind::Element) {
        let Some(name) = child.local_name() else {
            continue;
        };
        let text = child.text_content();
        match contents.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = text,
            None => contents.push((name, text)),
        }
    }
    contents
}

fn describe(node: Node<'_>) -> String {
    to_display_string(node).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}
