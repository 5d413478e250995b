use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::mapper::error::MapperError;
use crate::mapper::mapper::MappingService;
use crate::mapper::mapping_model::{FieldMapping, StudentData};
use crate::mapper::parse::filter_mappings;
use crate::mapper::prompt::describe_elements;
use crate::scanner::scan_model::FormElement;

/// Body of `POST /api/field-mapping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRequest {
    #[serde(default)]
    pub html_context: Option<String>,
    #[serde(default)]
    pub student_data: Option<Value>,
}

/// Success (`mapping`) or failure (`error`) reply of the endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client for a mapping endpoint served elsewhere, authenticated with a
/// session token.
pub struct RemoteMapper {
    client: Client,
    endpoint: String,
    session_token: Option<String>,
}

impl RemoteMapper {
    pub fn new(
        endpoint: &str,
        session_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MapperError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MapperError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            session_token,
        })
    }
}

#[async_trait]
impl MappingService for RemoteMapper {
    async fn map_fields(
        &self,
        elements: &[FormElement],
        student: &StudentData,
    ) -> Result<Vec<FieldMapping>, MapperError> {
        let body = MappingRequest {
            html_context: Some(describe_elements(elements)),
            student_data: Some(student.0.clone()),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.session_token {
            request = request.bearer_auth(token);
        }

        debug!(endpoint = %self.endpoint, elements = elements.len(), "requesting remote mapping");

        let response = request.send().await.map_err(|e| MapperError::Unavailable {
            attempts: 1,
            reason: e.to_string(),
        })?;

        let status = response.status();
        let reply: MappingReply = response.json().await.unwrap_or_default();
        let message = reply
            .error
            .clone()
            .unwrap_or_else(|| format!("mapping endpoint returned {}", status));

        match status {
            s if s.is_success() => match reply.mapping {
                Some(entries) => Ok(filter_mappings(entries)),
                None => Err(MapperError::Parse("reply carried no mapping".into())),
            },
            StatusCode::UNAUTHORIZED => Err(MapperError::Unauthorized(message)),
            StatusCode::BAD_REQUEST => Err(MapperError::InvalidRequest(message)),
            s => Err(MapperError::Upstream {
                status: s.as_u16(),
                message,
            }),
        }
    }
}
