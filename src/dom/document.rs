use std::collections::BTreeMap;
use std::path::Path;

use crate::dom::error::DomError;
use crate::dom::events::{DispatchedEvent, EventKind, FrameworkChange};
use crate::dom::snapshot::{PageSnapshot, SnapshotElement, SnapshotNode};

pub type NodeId = usize;

/// Attribute written by the scanner on controls that have neither id nor name.
pub const MARKER_ATTR: &str = "data-autofill-id";

#[derive(Debug, Clone)]
pub enum NodeData {
    Text(String),
    Element(ElementData),
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    value: String,
    checked: bool,
    opaque: bool,
    // Last state seen by a framework that intercepts the instance `value`
    // property. None for controls outside a framework-managed subtree.
    tracker: Option<String>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

/// In-memory page: an arena of nodes plus the live form state and the log of
/// synthetic events dispatched into it.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: Option<String>,
    pub title: String,
    pub status: Option<u16>,
    nodes: Vec<Node>,
    root: NodeId,
    framework_roots: Vec<NodeId>,
    events: Vec<DispatchedEvent>,
    framework_changes: Vec<FrameworkChange>,
    next_marker: u64,
}

pub fn is_form_control_tag(tag: &str) -> bool {
    matches!(tag, "input" | "select" | "textarea")
}

fn is_checkable(data: &ElementData) -> bool {
    data.tag == "input"
        && matches!(
            data.attr("type").map(|t| t.to_ascii_lowercase()).as_deref(),
            Some("checkbox") | Some("radio")
        )
}

impl Document {
    // ------------------------------------------------------------------
    // Loading / saving
    // ------------------------------------------------------------------

    pub fn from_snapshot(snapshot: &PageSnapshot) -> Result<Self, DomError> {
        let root_el = match &snapshot.root {
            SnapshotNode::Element(el) => el,
            SnapshotNode::Text(_) => return Err(DomError::TextRoot),
        };

        let mut doc = Document {
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            status: snapshot.status,
            nodes: Vec::new(),
            root: 0,
            framework_roots: Vec::new(),
            events: Vec::new(),
            framework_changes: Vec::new(),
            next_marker: 1,
        };

        let mut pending = Vec::new();
        doc.root = doc.insert_element(None, root_el, &mut pending);
        doc.init_form_state(&pending);
        doc.init_framework_trackers();
        doc.next_marker = doc.max_marker() + 1;

        Ok(doc)
    }

    pub fn from_json_str(json: &str) -> Result<Self, DomError> {
        let snapshot: PageSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(&snapshot)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DomError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn insert_element(
        &mut self,
        parent: Option<NodeId>,
        el: &SnapshotElement,
        pending: &mut Vec<NodeId>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            data: NodeData::Element(ElementData {
                tag: el.tag.to_ascii_lowercase(),
                attrs: el.attrs.clone(),
                value: el.value.clone().unwrap_or_default(),
                checked: el.checked.unwrap_or_else(|| el.attrs.contains_key("checked")),
                opaque: el.opaque,
                tracker: None,
            }),
        });

        if el.framework {
            self.framework_roots.push(id);
        }

        for child in &el.children {
            let child_id = match child {
                SnapshotNode::Text(text) => {
                    let text_id = self.nodes.len();
                    self.nodes.push(Node {
                        parent: Some(id),
                        children: Vec::new(),
                        data: NodeData::Text(text.clone()),
                    });
                    text_id
                }
                SnapshotNode::Element(child_el) => self.insert_element(Some(id), child_el, pending),
            };
            self.nodes[id].children.push(child_id);
        }

        // Explicit live state wins; otherwise it is derived from markup.
        if el.value.is_none() {
            pending.push(id);
        }

        id
    }

    /// Resolve initial `value` for controls whose snapshot omitted it.
    fn init_form_state(&mut self, pending: &[NodeId]) {
        for &id in pending {
            let tag = self.tag(id).unwrap_or_default().to_string();
            let derived = match tag.as_str() {
                "textarea" => self.text_content(id),
                "select" => self.initial_select_value(id),
                "option" => self.markup_option_value(id),
                _ => self.attr(id, "value").unwrap_or_default().to_string(),
            };

            if let NodeData::Element(data) = &mut self.nodes[id].data {
                data.value = derived;
            }
        }
    }

    fn initial_select_value(&self, select: NodeId) -> String {
        let options = self.options(select);
        let chosen = options
            .iter()
            .copied()
            .find(|&o| self.attr(o, "selected").is_some())
            .or_else(|| options.first().copied());

        chosen.map(|o| self.markup_option_value(o)).unwrap_or_default()
    }

    fn markup_option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .map(|v| v.to_string())
            .unwrap_or_else(|| collapse_whitespace(&self.text_content(option)))
    }

    fn init_framework_trackers(&mut self) {
        let roots = self.framework_roots.clone();
        for root in roots {
            for id in self.descendants(root) {
                let is_control = self.tag(id).is_some_and(is_form_control_tag);
                if is_control {
                    let state = self.tracked_state(id);
                    if let NodeData::Element(data) = &mut self.nodes[id].data {
                        data.tracker = Some(state);
                    }
                }
            }
        }
    }

    fn max_marker(&self) -> u64 {
        (0..self.nodes.len())
            .filter_map(|id| self.attr(id, MARKER_ATTR))
            .filter_map(|v| v.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
    }

    pub fn to_snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            url: self.url.clone(),
            title: self.title.clone(),
            status: self.status,
            root: self.snapshot_node(self.root),
        }
    }

    fn snapshot_node(&self, id: NodeId) -> SnapshotNode {
        match &self.nodes[id].data {
            NodeData::Text(text) => SnapshotNode::Text(text.clone()),
            NodeData::Element(data) => {
                let mut el = SnapshotElement::new(&data.tag);
                el.attrs = data.attrs.clone();
                el.children = self.nodes[id]
                    .children
                    .iter()
                    .map(|&c| self.snapshot_node(c))
                    .collect();
                el.opaque = data.opaque;
                el.framework = self.framework_roots.contains(&id);
                if is_form_control_tag(&data.tag) {
                    el.value = Some(data.value.clone());
                }
                if is_checkable(data) {
                    el.checked = Some(data.checked);
                }
                SnapshotNode::Element(el)
            }
        }
    }

    // ------------------------------------------------------------------
    // Tree access
    // ------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(id)?.data {
            NodeData::Element(data) => Some(data),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    /// Attribute value, treating empty strings as absent.
    pub fn non_empty_attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attr(id, name).filter(|v| !v.trim().is_empty())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(Node {
            data: NodeData::Element(data),
            ..
        }) = self.nodes.get_mut(id)
        {
            data.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Every node under `id` (excluding `id`), in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// All element nodes in document order, root included.
    pub fn elements(&self) -> Vec<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|&id| self.attr(id, "id") == Some(element_id))
    }

    pub fn count_with_attr(&self, name: &str, value: &str) -> usize {
        self.elements()
            .into_iter()
            .filter(|&id| self.attr(id, name) == Some(value))
            .count()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.text_content_excluding(id, |_, _| false)
    }

    /// Concatenated text of the subtree, skipping any element for which
    /// `skip` returns true (and everything under it).
    pub fn text_content_excluding<F>(&self, id: NodeId, skip: F) -> String
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            match &self.nodes[n].data {
                NodeData::Text(text) => out.push_str(text),
                NodeData::Element(_) => {
                    if n != id && skip(self, n) {
                        continue;
                    }
                    stack.extend(self.children(n).iter().rev().copied());
                }
            }
        }
        out
    }

    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|&id| self.tag(id) == Some("option"))
            .collect()
    }

    pub fn option_value(&self, option: NodeId) -> String {
        self.element(option)
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }

    pub fn option_text(&self, option: NodeId) -> String {
        collapse_whitespace(&self.text_content(option))
    }

    // ------------------------------------------------------------------
    // Live form state
    // ------------------------------------------------------------------

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id)
            .filter(|e| is_form_control_tag(&e.tag))
            .map(|e| e.value.as_str())
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|e| e.checked)
    }

    pub fn is_checkable(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(is_checkable)
    }

    pub fn is_framework_managed(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|e| e.tracker.is_some())
    }

    fn tracked_state(&self, id: NodeId) -> String {
        match self.element(id) {
            Some(e) if is_checkable(e) => e.checked.to_string(),
            Some(e) => e.value.clone(),
            None => String::new(),
        }
    }

    /// Assignment through the instance `value` property. A framework that
    /// owns the control intercepts this and records the value as already
    /// seen, so its change detection will not fire.
    pub fn set_value_via_property(&mut self, id: NodeId, value: &str) {
        if let Some(Node {
            data: NodeData::Element(data),
            ..
        }) = self.nodes.get_mut(id)
        {
            data.value = value.to_string();
            if let Some(tracker) = data.tracker.as_mut() {
                *tracker = value.to_string();
            }
        }
    }

    /// Assignment through the element type's own (unshadowed) setter.
    pub fn set_native_value(&mut self, id: NodeId, value: &str) {
        if let Some(Node {
            data: NodeData::Element(data),
            ..
        }) = self.nodes.get_mut(id)
        {
            data.value = value.to_string();
        }
    }

    /// Native `checked` setter. Checking a radio unchecks the rest of its group.
    pub fn set_native_checked(&mut self, id: NodeId, checked: bool) {
        let radio_group = match self.element(id) {
            Some(e) if checked && e.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("radio")) => {
                e.attr("name").map(|n| n.to_string())
            }
            _ => None,
        };

        if let Some(group) = radio_group {
            let others: Vec<NodeId> = self
                .elements()
                .into_iter()
                .filter(|&o| o != id && self.is_checkable(o) && self.attr(o, "name") == Some(group.as_str()))
                .collect();
            for o in others {
                if let NodeData::Element(data) = &mut self.nodes[o].data {
                    data.checked = false;
                }
            }
        }

        if let Some(Node {
            data: NodeData::Element(data),
            ..
        }) = self.nodes.get_mut(id)
        {
            data.checked = checked;
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Dispatch a synthetic event at `target`. Bubbling events reach every
    /// ancestor; a framework root on the path runs its change detection.
    pub fn dispatch_event(&mut self, target: NodeId, kind: EventKind, bubbles: bool) {
        let mut path = vec![target];
        if bubbles {
            path.extend(self.ancestors(target));
        }

        let framework_sees_it = self.framework_roots.iter().any(|r| path.contains(r));
        if framework_sees_it && kind.drives_change_detection() {
            let current = self.tracked_state(target);
            let changed = self
                .element(target)
                .and_then(|e| e.tracker.as_ref())
                .is_some_and(|seen| *seen != current);

            if changed {
                if let NodeData::Element(data) = &mut self.nodes[target].data {
                    data.tracker = Some(current.clone());
                }
                self.framework_changes.push(FrameworkChange {
                    node: target,
                    event: kind,
                    value: current,
                });
            }
        }

        self.events.push(DispatchedEvent {
            target,
            kind,
            bubbles,
            path,
        });
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    pub fn events_for(&self, target: NodeId) -> Vec<EventKind> {
        self.events
            .iter()
            .filter(|e| e.target == target)
            .map(|e| e.kind)
            .collect()
    }

    pub fn framework_changes(&self) -> &[FrameworkChange] {
        &self.framework_changes
    }

    pub fn clear_event_log(&mut self) {
        self.events.clear();
        self.framework_changes.clear();
    }

    // ------------------------------------------------------------------
    // Scanner markers
    // ------------------------------------------------------------------

    /// Next page-scoped sequential marker id.
    pub fn allocate_marker(&mut self) -> u64 {
        let id = self.next_marker;
        self.next_marker += 1;
        id
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
