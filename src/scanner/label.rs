use crate::dom::document::{Document, NodeId, collapse_whitespace, is_form_control_tag};

/// Human-readable label for a form control. First match wins:
/// `<label for>`, enclosing `<label>`, then `aria-labelledby`.
pub fn infer_label(doc: &Document, node: NodeId) -> Option<String> {
    label_for_attribute(doc, node)
        .or_else(|| enclosing_label(doc, node))
        .or_else(|| aria_labelledby(doc, node))
}

fn non_empty(text: String) -> Option<String> {
    let collapsed = collapse_whitespace(&text);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn label_for_attribute(doc: &Document, node: NodeId) -> Option<String> {
    let id = doc.non_empty_attr(node, "id")?;

    doc.elements()
        .into_iter()
        .filter(|&l| doc.tag(l) == Some("label") && doc.attr(l, "for") == Some(id))
        .find_map(|l| non_empty(doc.text_content(l)))
}

fn enclosing_label(doc: &Document, node: NodeId) -> Option<String> {
    let label = doc
        .ancestors(node)
        .into_iter()
        .find(|&a| doc.tag(a) == Some("label"))?;

    // Nested controls contribute no text (a select's options, a textarea body).
    non_empty(doc.text_content_excluding(label, |d, n| {
        d.tag(n).is_some_and(is_form_control_tag)
    }))
}

fn aria_labelledby(doc: &Document, node: NodeId) -> Option<String> {
    let ids = doc.non_empty_attr(node, "aria-labelledby")?;

    let text = ids
        .split_whitespace()
        .filter_map(|id| doc.get_element_by_id(id))
        .map(|target| doc.text_content(target))
        .collect::<Vec<_>>()
        .join(" ");

    non_empty(text)
}
