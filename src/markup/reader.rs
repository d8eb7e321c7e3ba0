//! XML → markup tree.
//!
//! Whitespace between elements is kept as text nodes so a document written
//! back out keeps its original formatting.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use super::tree::{XNodeKind, XTree};
use crate::base::XNodeId;
use crate::error::MarkupError;

/// Parse `text` into a new document node of `tree`.
pub(crate) fn read_document(
    tree: &mut XTree,
    uri: &str,
    text: &str,
) -> Result<XNodeId, MarkupError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let document = tree.alloc(XNodeKind::Document, uri, "");
    let mut stack = vec![document];

    loop {
        match reader.read_event() {
            Ok(Event::Decl(decl)) => {
                let content = String::from_utf8_lossy(&decl).into_owned();
                tree.node_mut(document)?.value = content;
            }
            Ok(Event::Start(ref e)) => {
                let element = read_element(tree, e)?;
                append(tree, &stack, element)?;
                stack.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let element = read_element(tree, e)?;
                append(tree, &stack, element)?;
            }
            Ok(Event::End(_)) => {
                if stack.len() <= 1 {
                    return Err(MarkupError::xml("unbalanced end tag"));
                }
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| MarkupError::xml(format!("Text error: {e}")))?;
                let node = tree.alloc(XNodeKind::Text, "", text.into_owned());
                append(tree, &stack, node)?;
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                let node = tree.alloc(XNodeKind::Text, "", text);
                append(tree, &stack, node)?;
            }
            Ok(Event::Comment(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                let node = tree.alloc(XNodeKind::Comment, "", text);
                append(tree, &stack, node)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MarkupError::xml(format!(
                    "XML parse error at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(MarkupError::xml("unexpected end of document"));
    }
    if tree.root_element(document).is_none() {
        return Err(MarkupError::xml("document has no root element"));
    }
    trace!("[MARKUP] read document '{}' ({} nodes in arena)", uri, tree.len());
    Ok(document)
}

fn read_element(tree: &mut XTree, e: &BytesStart<'_>) -> Result<XNodeId, MarkupError> {
    let name_bytes = e.name();
    let tag = std::str::from_utf8(name_bytes.as_ref())
        .map_err(|e| MarkupError::xml(format!("Invalid tag name: {e}")))?;
    let element = tree.alloc(XNodeKind::Element, tag, "");

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| MarkupError::xml(format!("Attribute error: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| MarkupError::xml(format!("Attribute key error: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| MarkupError::xml(format!("Attribute value error: {e}")))?;
        let node = tree.alloc(XNodeKind::Attribute, key, value.into_owned());
        let index = tree.node(element)?.attributes.len();
        tree.attach(node, element, index)?;
    }
    Ok(element)
}

fn append(tree: &mut XTree, stack: &[XNodeId], node: XNodeId) -> Result<(), MarkupError> {
    let parent = *stack
        .last()
        .ok_or_else(|| MarkupError::xml("element outside of document"))?;
    let index = tree.node(parent)?.children.len();
    tree.attach(node, parent, index)
}
