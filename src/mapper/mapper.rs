use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::auth::CallerIdentity;
use crate::mapper::error::MapperError;
use crate::mapper::inference::TextInference;
use crate::mapper::mapping_model::{FieldMapping, StudentData};
use crate::mapper::parse::parse_mapping_response;
use crate::mapper::prompt::{build_mapping_prompt, describe_elements};
use crate::scanner::scan_model::FormElement;

/// Anything that can turn scanned controls plus a student record into
/// mappings: the in-process mapper, the HTTP endpoint, or the heuristic one.
#[async_trait]
pub trait MappingService: Send + Sync {
    async fn map_fields(
        &self,
        elements: &[FormElement],
        student: &StudentData,
    ) -> Result<Vec<FieldMapping>, MapperError>;
}

/// Prompt-templated field mapping over a [`TextInference`] backend.
pub struct FieldMapper {
    backend: Arc<dyn TextInference>,
}

impl FieldMapper {
    pub fn new(backend: Arc<dyn TextInference>) -> Self {
        Self { backend }
    }

    pub async fn map(
        &self,
        caller: Option<&CallerIdentity>,
        elements: &[FormElement],
        student: &StudentData,
    ) -> Result<Vec<FieldMapping>, MapperError> {
        self.map_context(caller, &describe_elements(elements), student)
            .await
    }

    /// Map from an already-rendered element description.
    pub async fn map_context(
        &self,
        caller: Option<&CallerIdentity>,
        html_context: &str,
        student: &StudentData,
    ) -> Result<Vec<FieldMapping>, MapperError> {
        let caller = caller
            .ok_or_else(|| MapperError::Unauthorized("an authenticated session is required".into()))?;

        if !student.is_record() {
            return Err(MapperError::InvalidRequest(
                "student_data must be a JSON object".into(),
            ));
        }

        if html_context.trim().is_empty() {
            debug!(user = %caller.user_id, "no form fields to map");
            return Ok(Vec::new());
        }

        let prompt = build_mapping_prompt(html_context, student);
        let raw = self.backend.infer_text(&prompt).await?;
        let mappings = parse_mapping_response(&raw)?;

        info!(user = %caller.user_id, mapped = mappings.len(), "field mapping complete");
        Ok(mappings)
    }
}

/// A [`FieldMapper`] bound to the caller identity it runs as.
pub struct AuthorizedMapper {
    mapper: Arc<FieldMapper>,
    caller: Option<CallerIdentity>,
}

impl AuthorizedMapper {
    pub fn new(mapper: Arc<FieldMapper>, caller: Option<CallerIdentity>) -> Self {
        Self { mapper, caller }
    }
}

#[async_trait]
impl MappingService for AuthorizedMapper {
    async fn map_fields(
        &self,
        elements: &[FormElement],
        student: &StudentData,
    ) -> Result<Vec<FieldMapping>, MapperError> {
        self.mapper.map(self.caller.as_ref(), elements, student).await
    }
}
