//! LLM Backend Module
//!
//! The core consumes narrative generation through a single interface:
//! `GenerateText(system, user, images?) → text + token usage`. The actual
//! client (hosted API, local inference) lives outside this crate; what is
//! here is the contract, the retry/backoff policy, and a template-only
//! backend for offline runs and tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

/// Image resolution hint for vision calls; drives token cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDetail {
    High,
    Auto,
    Low,
}

impl ImageDetail {
    /// Approximate prompt token cost per image at this detail level.
    pub fn token_cost(self) -> usize {
        match self {
            ImageDetail::High => 3000,
            ImageDetail::Auto => 1500,
            ImageDetail::Low => 500,
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "high" => ImageDetail::High,
            "low" => ImageDetail::Low,
            _ => ImageDetail::Auto,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageDetail::High => "high",
            ImageDetail::Auto => "auto",
            ImageDetail::Low => "low",
        }
    }
}

/// One image attached to a generation request. Files are opened read-only by
/// the client and closed before the call returns.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub detail: ImageDetail,
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub images: Vec<ImageAttachment>,
}

impl LlmRequest {
    pub fn text(model: &str, system_prompt: String, user_prompt: String) -> Self {
        Self {
            model: model.to_string(),
            system_prompt,
            user_prompt,
            images: Vec::new(),
        }
    }
}

/// Token usage reported by the client for cost tracking.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM returned empty content")]
    EmptyResponse,

    #[error("LLM call timed out after {0} seconds")]
    Timeout(u64),

    #[error("LLM unavailable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("LLM transport error: {0}")]
    Transport(String),
}

/// The sole interface through which the pipeline reaches a language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_text(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}

/// Call the client with timeout, retry, and exponential backoff.
///
/// Up to `max_retries` attempts; backoff starts at
/// `retry_initial_delay_seconds` and doubles per attempt. Exhausting retries
/// surfaces as `LlmError::Unavailable`. An empty completion is
/// `LlmError::EmptyResponse` and is not retried — a model that answered with
/// nothing will usually do so again.
pub async fn generate_with_retry(
    client: &Arc<dyn LlmClient>,
    request: LlmRequest,
    timeout_seconds: u64,
    max_retries: u32,
    retry_initial_delay_seconds: u64,
) -> Result<LlmResponse, LlmError> {
    let mut delay = Duration::from_secs(retry_initial_delay_seconds);
    let mut last_error = String::new();

    for attempt in 1..=max_retries.max(1) {
        let call = client.generate_text(request.clone());
        match tokio::time::timeout(Duration::from_secs(timeout_seconds), call).await {
            Ok(Ok(response)) => {
                if response.text.trim().is_empty() {
                    return Err(LlmError::EmptyResponse);
                }
                info!(
                    model = %request.model,
                    attempt,
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    "LLM call complete"
                );
                return Ok(response);
            }
            Ok(Err(LlmError::EmptyResponse)) => return Err(LlmError::EmptyResponse),
            Ok(Err(e)) => {
                last_error = e.to_string();
                warn!(model = %request.model, attempt, error = %last_error, "LLM call failed");
            }
            Err(_) => {
                last_error = format!("timed out after {timeout_seconds}s");
                warn!(model = %request.model, attempt, "LLM call timed out");
            }
        }

        if attempt < max_retries {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(LlmError::Unavailable {
        attempts: max_retries.max(1),
        message: last_error,
    })
}

/// Template-only backend: deterministic narratives assembled from the
/// request itself, zero inference. Used by the offline CLI build and tests.
#[derive(Debug, Default)]
pub struct TemplateClient;

#[async_trait]
impl LlmClient for TemplateClient {
    async fn generate_text(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        // Vision requests get an explicitly empty JSON payload so the parser
        // takes its structured-data fallback path.
        let text = if request.user_prompt.contains("Return ONLY valid JSON") {
            r#"{"systems": [], "predicted_swells": [], "frontal_boundaries": []}"#.to_string()
        } else {
            let head = request
                .user_prompt
                .lines()
                .take(30)
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "TEMPLATE NARRATIVE (model {}):\n{}\n\n(Offline template backend; configure a real LLM client for full analysis.)",
                request.model, head
            )
        };

        let usage = TokenUsage {
            prompt_tokens: (request.system_prompt.len() + request.user_prompt.len()) / 4
                + request
                    .images
                    .iter()
                    .map(|i| i.detail.token_cost())
                    .sum::<usize>(),
            completion_tokens: text.len() / 4,
        };
        Ok(LlmResponse { text, usage })
    }
}
