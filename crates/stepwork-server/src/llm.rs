//! Text generation for session reflections.
//!
//! The remote call is best effort: callers go through [`generate_or_fallback`]
//! and always get something to show the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stepwork_core::config::LlmConfig;

/// Shown whenever a reflection cannot be generated.
pub const FALLBACK_REFLECTION: &str = "Thank you for taking the time to reflect today. \
Every honest answer is a step forward. Take a moment to notice how you feel, \
and consider sharing what came up with your sponsor or someone you trust.";

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("text generation is not configured")]
    Disabled,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("text generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("text generation service returned no text")]
    Empty,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// DisabledGenerator
// ---------------------------------------------------------------------------

/// Always fails with [`LlmError::Disabled`].
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

// ---------------------------------------------------------------------------
// HttpTextGenerator
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<MessageParam<'a>>,
}

#[derive(Serialize)]
struct MessageParam<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for an Anthropic-style Messages endpoint.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl HttpTextGenerator {
    /// Reads the API key from the environment variable named in `cfg`.
    pub fn new(cfg: &LlmConfig) -> Self {
        Self::with_api_key(cfg, cfg.resolve_api_key())
    }

    pub fn with_api_key(cfg: &LlmConfig, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmError::Disabled);
        };

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![MessageParam {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: String = resp.text().await.unwrap_or_default().chars().take(300).collect();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = resp.json().await?;
        let text = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::Empty);
        }
        Ok(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// Fallback wrapper
// ---------------------------------------------------------------------------

/// Returns the generated text and `true`, or [`FALLBACK_REFLECTION`] and
/// `false` on any failure including timeout.
pub async fn generate_or_fallback(
    generator: &dyn TextGenerator,
    timeout: Duration,
    system: &str,
    prompt: &str,
) -> (String, bool) {
    match tokio::time::timeout(timeout, generator.generate(system, prompt)).await {
        Ok(Ok(text)) => (text, true),
        Ok(Err(LlmError::Disabled)) => {
            tracing::warn!("text generation disabled; returning fallback reflection");
            (FALLBACK_REFLECTION.to_string(), false)
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "reflection generation failed");
            (FALLBACK_REFLECTION.to_string(), false)
        }
        Err(_) => {
            tracing::warn!("reflection generation timed out after {}s", timeout.as_secs());
            (FALLBACK_REFLECTION.to_string(), false)
        }
    }
}
