use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    /// No authenticated caller; never retried.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller sent something the mapper cannot work with.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Retries against the model endpoint were exhausted.
    #[error("AI service unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// Model endpoint rejected the request outright (4xx).
    #[error("AI service rejected the request ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Model output was not a JSON array of mappings.
    #[error("Failed to parse AI response: {0}")]
    Parse(String),

    #[error("AI service not configured: {0}")]
    NotConfigured(String),
}

impl MapperError {
    /// HTTP status the mapping endpoint reports for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            MapperError::Unauthorized(_) => 401,
            MapperError::InvalidRequest(_) => 400,
            _ => 500,
        }
    }
}
