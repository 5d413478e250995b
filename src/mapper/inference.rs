use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cli::config::MapperConfig;
use crate::mapper::error::MapperError;

/// Prompt in, raw model text out.
#[async_trait]
pub trait TextInference: Send + Sync {
    async fn infer_text(&self, prompt: &str) -> Result<String, MapperError>;
}

// ============================================================================
// Gemini generateContent backend
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

enum Attempt {
    Transient(String),
    Fatal(MapperError),
}

/// Hosted model behind the Gemini `generateContent` API, with the mapper's
/// retry policy: timeouts, network errors and 5xx are retried up to
/// `max_retries` times; anything else fails immediately.
pub struct GeminiBackend {
    client: Client,
    config: MapperConfig,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(config: MapperConfig) -> Result<Self, MapperError> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| MapperError::NotConfigured("GEMINI_API_KEY is not set".into()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MapperError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn attempt(&self, request: &GenerateContentRequest) -> Result<String, Attempt> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Attempt::Transient(format!("request timed out after {:?}", self.config.timeout()))
                } else {
                    Attempt::Transient(format!("network error: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Transient(format!("failed to read response body: {}", e)))?;

        if status.is_server_error() {
            return Err(Attempt::Transient(format!("model endpoint returned {}", status)));
        }

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Attempt::Fatal(MapperError::Upstream {
                status: status.as_u16(),
                message,
            }));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            Attempt::Fatal(MapperError::Parse(format!("unexpected model envelope: {}", e)))
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Attempt::Fatal(MapperError::Parse("model returned no text".into())));
        }

        Ok(text)
    }
}

#[async_trait]
impl TextInference for GeminiBackend {
    async fn infer_text(&self, prompt: &str) -> Result<String, MapperError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                response_mime_type: "application/json",
            },
        };

        let attempts = self.config.max_retries + 1;
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            debug!(attempt, model = %self.config.model, "calling model");
            match self.attempt(&request).await {
                Ok(text) => return Ok(text),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Transient(reason)) => {
                    warn!(attempt, attempts, %reason, "model call failed");
                    last_reason = reason;
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_backoff() * attempt).await;
                    }
                }
            }
        }

        Err(MapperError::Unavailable {
            attempts,
            reason: last_reason,
        })
    }
}

/// Stand-in when no model key is configured; every call fails with
/// [`MapperError::NotConfigured`].
pub struct UnconfiguredBackend {
    pub reason: String,
}

#[async_trait]
impl TextInference for UnconfiguredBackend {
    async fn infer_text(&self, _prompt: &str) -> Result<String, MapperError> {
        Err(MapperError::NotConfigured(self.reason.clone()))
    }
}

// ============================================================================
// Mock backend (for testing without a model)
// ============================================================================

/// Returns a canned reply and remembers every prompt it was given.
pub struct MockTextInference {
    pub response: String,
    prompts: Mutex<Vec<String>>,
}

impl MockTextInference {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextInference for MockTextInference {
    async fn infer_text(&self, prompt: &str) -> Result<String, MapperError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(self.response.clone())
    }
}
