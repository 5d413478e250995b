use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mappings below this confidence are dropped rather than guessed into a form.
pub const MIN_MAPPING_CONFIDENCE: f32 = 0.8;

/// One value the mapper wants written into one control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub selector: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl FieldMapping {
    pub fn new(selector: &str, value: &str, confidence: Option<f32>) -> Self {
        Self {
            selector: selector.to_string(),
            value: value.to_string(),
            confidence,
        }
    }

    pub fn is_confident(&self) -> bool {
        self.confidence.is_none_or(|c| c >= MIN_MAPPING_CONFIDENCE)
    }
}

/// Drop anything that would not pass the mapper's own filter.
pub fn retain_confident(mappings: &mut Vec<FieldMapping>) {
    mappings.retain(|m| m.is_confident() && !m.selector.trim().is_empty());
}

/// Student profile supplied by the caller. Treated as a read-only document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentData(pub Value);

impl StudentData {
    pub fn is_record(&self) -> bool {
        self.0.is_object()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }

    /// Scalar leaves as `(key path, value)` pairs, e.g. `("contact.email", "…")`.
    pub fn scalar_fields(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        collect_scalars(&self.0, String::new(), &mut out);
        out
    }
}

fn collect_scalars(value: &Value, path: String, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                collect_scalars(child, child_path, out);
            }
        }
        Value::String(s) if !s.trim().is_empty() => out.push((path, s.clone())),
        Value::Number(n) => out.push((path, n.to_string())),
        Value::Bool(b) => out.push((path, b.to_string())),
        _ => {}
    }
}
