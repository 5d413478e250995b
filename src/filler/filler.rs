use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dom::document::{Document, NodeId, is_form_control_tag};
use crate::dom::events::EventKind;
use crate::dom::selector::query_selector;
use crate::mapper::mapping_model::FieldMapping;

/// Why one mapping could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillError {
    pub selector: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillReport {
    pub filled_count: usize,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FillError>,
}

/// Events dispatched after each assignment, in this order, all bubbling.
pub const FILL_EVENTS: [EventKind; 3] = [EventKind::Input, EventKind::Change, EventKind::Blur];

/// Apply every mapping to the page. One element's failure never stops the
/// rest of the batch; failures are collected in the report.
pub fn fill_page(doc: &mut Document, mappings: &[FieldMapping]) -> FillReport {
    let mut report = FillReport {
        filled_count: 0,
        total_count: mappings.len(),
        errors: Vec::new(),
    };

    for mapping in mappings {
        match fill_one(doc, mapping) {
            Ok(node) => {
                debug!(selector = %mapping.selector, node, "filled");
                report.filled_count += 1;
            }
            Err(reason) => {
                warn!(selector = %mapping.selector, %reason, "skipping mapping");
                report.errors.push(FillError {
                    selector: mapping.selector.clone(),
                    reason,
                });
            }
        }
    }

    report
}

fn fill_one(doc: &mut Document, mapping: &FieldMapping) -> Result<NodeId, String> {
    let node = query_selector(doc, &mapping.selector)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "element not found".to_string())?;

    let tag = doc.tag(node).unwrap_or_default().to_string();
    if !is_form_control_tag(&tag) {
        return Err(format!("<{}> is not a form control", tag));
    }

    match tag.as_str() {
        "select" => {
            let value = resolve_option(doc, node, &mapping.value)
                .ok_or_else(|| format!("no option matches '{}'", mapping.value))?;
            doc.set_native_value(node, &value);
        }
        _ if doc.is_checkable(node) => {
            let checked = checked_state(doc, node, &mapping.value)?;
            doc.set_native_checked(node, checked);
        }
        _ => doc.set_native_value(node, &mapping.value),
    }

    for kind in FILL_EVENTS {
        doc.dispatch_event(node, kind, true);
    }

    Ok(node)
}

/// Option value for `wanted`, matched on value first, then visible text.
fn resolve_option(doc: &Document, select: NodeId, wanted: &str) -> Option<String> {
    let options = doc.options(select);
    let wanted = wanted.trim();

    options
        .iter()
        .find(|&&o| doc.option_value(o) == wanted)
        .or_else(|| {
            options
                .iter()
                .find(|&&o| doc.option_text(o).eq_ignore_ascii_case(wanted))
        })
        .map(|&o| doc.option_value(o))
}

fn checked_state(doc: &Document, node: NodeId, wanted: &str) -> Result<bool, String> {
    let is_radio = doc
        .attr(node, "type")
        .is_some_and(|t| t.eq_ignore_ascii_case("radio"));

    if is_radio {
        let own = doc.value(node).filter(|v| !v.is_empty()).unwrap_or("on");
        return if own.eq_ignore_ascii_case(wanted.trim()) {
            Ok(true)
        } else {
            Err(format!("radio value is '{}', not '{}'", own, wanted))
        };
    }

    match wanted.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "checked" => Ok(true),
        "false" | "no" | "off" | "0" | "unchecked" | "" => Ok(false),
        other => Err(format!("'{}' is not a checkbox state", other)),
    }
}
