use crate::dom::document::{Document, MARKER_ATTR, NodeId};
use crate::dom::selector::{is_plain_identifier, quote_attr_value};

/// Build a selector that resolves to exactly `node`.
///
/// Prefers `#id`, then `[name="…"]`, and otherwise tags the element with a
/// page-scoped sequential marker. Ids and names shared by several elements
/// are passed over so the result stays unique.
pub fn selector_for(doc: &mut Document, node: NodeId) -> String {
    if let Some(id) = doc.non_empty_attr(node, "id") {
        if doc.count_with_attr("id", id) == 1 {
            return if is_plain_identifier(id) {
                format!("#{}", id)
            } else {
                format!("[id={}]", quote_attr_value(id))
            };
        }
    }

    if let Some(name) = doc.non_empty_attr(node, "name") {
        if doc.count_with_attr("name", name) == 1 {
            return format!("[name={}]", quote_attr_value(name));
        }
    }

    marker_selector(doc, node)
}

fn marker_selector(doc: &mut Document, node: NodeId) -> String {
    let existing = doc
        .attr(node, MARKER_ATTR)
        .filter(|m| doc.count_with_attr(MARKER_ATTR, m) == 1)
        .map(|m| m.to_string());

    let marker = match existing {
        Some(m) => m,
        None => {
            let m = doc.allocate_marker().to_string();
            doc.set_attr(node, MARKER_ATTR, &m);
            m
        }
    };

    format!("[{}={}]", MARKER_ATTR, quote_attr_value(&marker))
}
