use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Pipeline step a trace event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Access,
    Scan,
    Map,
    Verify,
    Fill,
}

/// One JSONL trace record. Carries selectors and counts only, never the
/// values written into the page.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub step: u64,
    pub stage: PipelineStage,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_count: Option<usize>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceEvent {
    pub fn now(step: u64, stage: PipelineStage) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            step,
            stage,
            element_count: None,
            mapping_count: None,
            filled_count: None,
            selectors: vec![],
            fingerprint: None,
            note: None,
            error: None,
        }
    }

    pub fn with_elements(mut self, count: usize) -> Self {
        self.element_count = Some(count);
        self
    }

    pub fn with_mappings(mut self, count: usize) -> Self {
        self.mapping_count = Some(count);
        self
    }

    pub fn with_filled(mut self, count: usize) -> Self {
        self.filled_count = Some(count);
        self
    }

    pub fn with_selectors<'a>(mut self, selectors: impl IntoIterator<Item = &'a str>) -> Self {
        self.selectors = selectors.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.fingerprint = Some(fingerprint.to_string());
        self
    }

    pub fn with_note(mut self, note: impl ToString) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}
