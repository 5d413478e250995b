use serde_json::{Value, json};

use form_autofill::dom::document::{Document, NodeId};
use form_autofill::dom::selector::query_selector;

/// Wrap a `root` node in a page snapshot and load it.
pub fn page(root: Value) -> Document {
    Document::from_snapshot(&serde_json::from_value(json!({
        "url": "https://apply.example.edu/form",
        "title": "Application",
        "root": root,
    }))
    .unwrap())
    .unwrap()
}

/// Single text input labelled "Full Name" with id `name`.
pub fn full_name_page() -> Document {
    page(json!({
        "tag": "body",
        "children": [
            {"tag": "form", "children": [
                {"tag": "label", "attrs": {"for": "name"}, "children": ["Full Name"]},
                {"tag": "input", "attrs": {"id": "name", "type": "text"}}
            ]}
        ]
    }))
}

/// A small application form exercising every label and selector rule.
///
/// Fillable, in order: `#name`, `[name="email"]`, a marker-tagged phone
/// input, `#country`, `[name="statement"]`. A hidden and a submit input
/// are present but excluded.
pub fn application_form() -> Document {
    page(application_form_root())
}

pub fn application_form_root() -> Value {
    json!({
        "tag": "body",
        "children": [
            {"tag": "h1", "children": ["Apply now"]},
            {"tag": "form", "attrs": {"id": "application"}, "children": [
                {"tag": "label", "attrs": {"for": "name"}, "children": ["Full Name"]},
                {"tag": "input", "attrs": {"id": "name", "type": "text"}},

                {"tag": "label", "children": [
                    "Email   address ",
                    {"tag": "input", "attrs": {"name": "email", "type": "email"}}
                ]},

                {"tag": "span", "attrs": {"id": "phone-label"}, "children": ["Phone"]},
                {"tag": "input", "attrs": {"type": "tel", "aria-labelledby": "phone-label"}},

                {"tag": "select", "attrs": {"id": "country"}, "children": [
                    {"tag": "option", "attrs": {"value": ""}, "children": ["Choose"]},
                    {"tag": "option", "attrs": {"value": "ca"}, "children": ["Canada"]},
                    {"tag": "option", "attrs": {"value": "in"}, "children": ["India"]}
                ]},

                {"tag": "textarea", "attrs": {"name": "statement", "placeholder": "Personal statement"}},

                {"tag": "input", "attrs": {"type": "hidden", "name": "csrf", "value": "abc"}},
                {"tag": "input", "attrs": {"type": "SUBMIT", "value": "Send"}}
            ]}
        ]
    })
}

/// Same controls as [`application_form`], inside a framework-managed root.
pub fn framework_form() -> Document {
    page(json!({
        "tag": "body",
        "children": [
            {"tag": "div", "attrs": {"id": "app"}, "framework": true, "children": [
                {"tag": "label", "attrs": {"for": "name"}, "children": ["Full Name"]},
                {"tag": "input", "attrs": {"id": "name", "type": "text"}},
                {"tag": "input", "attrs": {"id": "agree", "type": "checkbox"}}
            ]}
        ]
    }))
}

pub fn student() -> Value {
    json!({
        "fullName": "Jane Doe",
        "email": "jane.doe@example.com",
        "phone": "555-010-2030",
        "country": "Canada",
        "academics": {"gpa": 3.9}
    })
}

pub fn node(doc: &Document, selector: &str) -> NodeId {
    query_selector(doc, selector)
        .unwrap()
        .unwrap_or_else(|| panic!("no element matches {}", selector))
}
