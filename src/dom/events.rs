use serde::Serialize;

use crate::dom::document::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Input,
    Change,
    Blur,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Blur => "blur",
        }
    }

    /// Events a framework's delegated listener uses for change detection.
    pub fn drives_change_detection(&self) -> bool {
        matches!(self, EventKind::Input | EventKind::Change)
    }
}

/// A synthetic event as it travelled through the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedEvent {
    pub target: NodeId,
    pub kind: EventKind,
    pub bubbles: bool,
    /// Target first, then every ancestor the event reached.
    pub path: Vec<NodeId>,
}

impl DispatchedEvent {
    pub fn reached(&self, node: NodeId) -> bool {
        self.path.contains(&node)
    }
}

/// A value change registered by a framework's own change detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameworkChange {
    pub node: NodeId,
    pub event: EventKind,
    pub value: String,
}
