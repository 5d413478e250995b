use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::filler::filler::{FillError, FillReport};
use crate::mapper::mapping_model::FieldMapping;
use crate::scanner::scan_model::{FormElement, ScanResult};

pub const SCAN_PAGE: &str = "SCAN_PAGE";
pub const FILL_PAGE: &str = "FILL_PAGE";

/// Messages the page side understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "SCAN_PAGE")]
    ScanPage,
    #[serde(rename = "FILL_PAGE")]
    FillPage { payload: FillPayload },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillPayload {
    pub mapping: Vec<FieldMapping>,
}

impl BridgeMessage {
    pub fn fill(mapping: Vec<FieldMapping>) -> Self {
        BridgeMessage::FillPage {
            payload: FillPayload { mapping },
        }
    }

    /// Decode a raw message, telling unknown kinds apart from bad payloads.
    pub fn decode(raw: &Value) -> Result<Self, BridgeError> {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::UnknownType("<missing>".into()))?;

        match kind {
            SCAN_PAGE => Ok(BridgeMessage::ScanPage),
            FILL_PAGE => serde_json::from_value(raw.clone())
                .map_err(|e| BridgeError::InvalidPayload(e.to_string())),
            other => Err(BridgeError::UnknownType(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Reply sent back over the bridge. Fields present depend on the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub success: bool,

    /// Echo of the request's `id`, for callers multiplexing replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<FormElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FillError>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn scanned(result: ScanResult) -> Self {
        Self {
            success: true,
            elements: Some(result.elements),
            fingerprint: Some(result.fingerprint),
            ..Default::default()
        }
    }

    pub fn filled(report: FillReport) -> Self {
        Self {
            success: true,
            filled: Some(report.filled_count),
            total: Some(report.total_count),
            errors: Some(report.errors),
            ..Default::default()
        }
    }

    pub fn failure(error: &BridgeError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn into_scan(self) -> Result<ScanResult, BridgeError> {
        if !self.success {
            return Err(BridgeError::Failed(self.error.unwrap_or_default()));
        }
        Ok(ScanResult {
            elements: self.elements.unwrap_or_default(),
            fingerprint: self.fingerprint.unwrap_or_default(),
        })
    }

    pub fn into_fill(self) -> Result<FillReport, BridgeError> {
        if !self.success {
            return Err(BridgeError::Failed(self.error.unwrap_or_default()));
        }
        Ok(FillReport {
            filled_count: self.filled.unwrap_or(0),
            total_count: self.total.unwrap_or(0),
            errors: self.errors.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BridgeError {
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid message payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid JSON message: {0}")]
    InvalidJson(String),

    #[error("page bridge is closed")]
    Closed,

    #[error("page reported failure: {0}")]
    Failed(String),
}
