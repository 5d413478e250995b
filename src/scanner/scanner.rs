use sha1::{Digest, Sha1};
use tracing::debug;

use crate::dom::document::{Document, NodeId, is_form_control_tag};
use crate::scanner::label::infer_label;
use crate::scanner::scan_model::{FormElement, ScanResult};
use crate::scanner::selector_gen::selector_for;

/// Input types that never receive a value.
pub const EXCLUDED_INPUT_TYPES: [&str; 6] = ["hidden", "submit", "button", "reset", "file", "image"];

/// Enumerate fillable controls in document order.
///
/// Never fails: subtrees that cannot be introspected are skipped. The only
/// mutation is the marker attribute on controls lacking a usable id or name.
pub fn scan_page(doc: &mut Document) -> ScanResult {
    let controls = fillable_controls(doc);
    let mut elements = Vec::with_capacity(controls.len());

    for node in controls {
        let selector = selector_for(doc, node);
        elements.push(describe(doc, node, selector));
    }

    debug!(count = elements.len(), "scanned page");

    let fingerprint = scan_fingerprint(&elements);
    ScanResult {
        elements,
        fingerprint,
    }
}

fn fillable_controls(doc: &Document) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![doc.root()];

    while let Some(node) = stack.pop() {
        let Some(el) = doc.element(node) else {
            continue;
        };
        if el.is_opaque() {
            debug!(tag = %el.tag, "skipping opaque subtree");
            continue;
        }

        if is_form_control_tag(&el.tag) && !is_excluded(doc, node) {
            out.push(node);
        }

        stack.extend(doc.children(node).iter().rev().copied());
    }

    out
}

fn is_excluded(doc: &Document, node: NodeId) -> bool {
    if doc.tag(node) != Some("input") {
        return false;
    }
    let input_type = doc.attr(node, "type").unwrap_or("text").trim().to_ascii_lowercase();
    EXCLUDED_INPUT_TYPES.contains(&input_type.as_str())
}

fn describe(doc: &Document, node: NodeId, selector: String) -> FormElement {
    let owned = |name: &str| doc.non_empty_attr(node, name).map(|v| v.to_string());

    let input_type = match doc.tag(node) {
        Some("input") => Some(
            doc.non_empty_attr(node, "type")
                .unwrap_or("text")
                .to_ascii_lowercase(),
        ),
        _ => None,
    };

    FormElement {
        selector,
        tag_name: doc.tag(node).unwrap_or_default().to_string(),
        input_type,
        id: owned("id"),
        name: owned("name"),
        placeholder: owned("placeholder"),
        label: infer_label(doc, node),
        aria_label: owned("aria-label"),
        current_value: doc
            .value(node)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string()),
    }
}

/// Stable digest of the scanned controls; changes when the form changes.
pub fn scan_fingerprint(elements: &[FormElement]) -> String {
    let mut hasher = Sha1::new();
    for el in elements {
        hasher.update(el.selector.as_bytes());
        hasher.update(b"|");
        hasher.update(el.label.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(el.input_type.as_deref().unwrap_or(&el.tag_name).as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
