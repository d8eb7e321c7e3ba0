//! Markup tree → XML.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use text_size::{TextRange, TextSize};

use super::tree::{XNodeKind, XTree};
use crate::base::XNodeId;
use crate::error::MarkupError;

/// Byte range an element occupies in the written document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpan {
    pub node: XNodeId,
    pub range: TextRange,
}

/// Serialize a document, returning the text and the span of every element.
pub(crate) fn write_document(
    tree: &XTree,
    document: XNodeId,
) -> Result<(String, Vec<ElementSpan>), MarkupError> {
    let mut writer = Writer::new(Vec::new());
    let mut spans = Vec::new();

    let doc = tree.node(document)?;
    if !doc.value.is_empty() {
        let buffer = writer.get_mut();
        buffer.extend_from_slice(b"<?");
        buffer.extend_from_slice(doc.value.as_bytes());
        buffer.extend_from_slice(b"?>");
    }
    for &child in &doc.children {
        write_node(&mut writer, tree, child, &mut spans)?;
    }

    let text = String::from_utf8(writer.into_inner())
        .map_err(|e| MarkupError::xml(format!("Invalid UTF-8 output: {e}")))?;
    Ok((text, spans))
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    tree: &XTree,
    id: XNodeId,
    spans: &mut Vec<ElementSpan>,
) -> Result<(), MarkupError> {
    let node = tree.node(id)?;
    match node.kind {
        XNodeKind::Element => {
            let start = writer.get_ref().len();
            let mut elem_start = BytesStart::new(node.name.as_str());
            for &attr in &node.attributes {
                let attr = tree.node(attr)?;
                elem_start.push_attribute((attr.name.as_str(), attr.value.as_str()));
            }
            if node.children.is_empty() {
                writer
                    .write_event(Event::Empty(elem_start))
                    .map_err(|e| MarkupError::xml(format!("Write error: {e}")))?;
            } else {
                writer
                    .write_event(Event::Start(elem_start))
                    .map_err(|e| MarkupError::xml(format!("Write error: {e}")))?;
                for &child in &node.children {
                    write_node(writer, tree, child, spans)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(node.name.as_str())))
                    .map_err(|e| MarkupError::xml(format!("Write error: {e}")))?;
            }
            let end = writer.get_ref().len();
            spans.push(ElementSpan {
                node: id,
                range: TextRange::new(TextSize::from(start as u32), TextSize::from(end as u32)),
            });
        }
        XNodeKind::Text => {
            writer
                .write_event(Event::Text(BytesText::new(&node.value)))
                .map_err(|e| MarkupError::xml(format!("Write error: {e}")))?;
        }
        XNodeKind::Comment => {
            writer
                .write_event(Event::Comment(BytesText::from_escaped(node.value.as_str())))
                .map_err(|e| MarkupError::xml(format!("Write error: {e}")))?;
        }
        XNodeKind::Document | XNodeKind::Attribute => {
            return Err(MarkupError::invalid(
                node.kind.as_str(),
                "cannot be written as content",
            ));
        }
    }
    Ok(())
}

/// Innermost element whose span contains `offset`.
pub(crate) fn element_at(spans: &[ElementSpan], offset: TextSize) -> Option<XNodeId> {
    spans
        .iter()
        .filter(|span| span.range.contains(offset))
        .min_by_key(|span| span.range.len())
        .map(|span| span.node)
}
