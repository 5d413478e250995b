use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node of a serialized page, as emitted by a DOM extraction script.
///
/// Text nodes are bare JSON strings; element nodes are objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Text(String),
    Element(SnapshotElement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotElement {
    pub tag: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,

    /// Live `value` property, when it differs from the `value` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Live `checked` property for checkboxes and radios.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,

    /// Content could not be introspected (cross-origin frame, closed shadow root).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub opaque: bool,

    /// Root of a subtree managed by a reactive UI framework.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub framework: bool,
}

impl SnapshotElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            children: vec![],
            value: None,
            checked: None,
            opaque: false,
            framework: false,
        }
    }
}

/// A full page: its URL, title and the `<body>` (or `<html>`) tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
    /// HTTP status of the navigation, when the extractor recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub root: SnapshotNode,
}
