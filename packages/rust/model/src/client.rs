//! Language-model gateway over a chat-completions HTTP API.
//!
//! Three model tiers (cheap → accurate) are mapped to configured model ids.
//! Every failure path is converted into an absent result plus a logged
//! cause — the gateway never raises past its boundary, so callers can
//! treat `None` as "no answer" and decide what that means for their stage.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use dealscope_shared::config::ModelConfig;
use dealscope_shared::{DealScopeError, Result, api_key_from_env};

/// Default sampling temperature for research calls.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Default output token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Per-request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Model tiers
// ---------------------------------------------------------------------------

/// Cost/capability tier the gateway can target for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Cheapest — short conversational replies.
    Small,
    /// Mid — identification, reformulation, gap analysis.
    Medium,
    /// Most capable — synthesis and enrichment.
    Large,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Retry discipline for transient gateway failures.
///
/// Only a request timeout on the [`ModelTier::Large`] tier with a token
/// budget above `reduced_max_tokens` qualifies for a retry; throttling,
/// access-denied, and malformed-parameter failures never do.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Token budget used by the retry attempt.
    pub reduced_max_tokens: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            reduced_max_tokens: 2000,
        }
    }
}

impl RetryPolicy {
    /// Whether a timed-out call qualifies for another attempt.
    fn should_retry(&self, attempt: u32, tier: ModelTier, max_tokens: u32) -> bool {
        attempt + 1 < self.max_attempts
            && tier == ModelTier::Large
            && max_tokens > self.reduced_max_tokens
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ModelClient
// ---------------------------------------------------------------------------

/// Gateway to the chat-completions API.
pub struct ModelClient {
    client: Client,
    base_url: String,
    api_key: String,
    small_model: String,
    medium_model: String,
    large_model: String,
    retry: RetryPolicy,
}

impl ModelClient {
    /// Build a client from config, reading the API key from the configured
    /// environment variable.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env).ok_or_else(|| {
            DealScopeError::config(format!(
                "model API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .user_agent(concat!("DealScope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DealScopeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            small_model: config.small_model.clone(),
            medium_model: config.medium_model.clone(),
            large_model: config.large_model.clone(),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the per-request timeout (short timeouts are used in tests
    /// and make sense for latency-sensitive deployments).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .user_agent(concat!("DealScope/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("HTTP client with static settings");
        self
    }

    /// Model id for a tier.
    fn model_id(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Small => &self.small_model,
            ModelTier::Medium => &self.medium_model,
            ModelTier::Large => &self.large_model,
        }
    }

    /// Send a prompt with default generation parameters.
    pub async fn ask(&self, prompt: &str, tier: ModelTier) -> Option<String> {
        self.converse(prompt, tier, DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS)
            .await
    }

    /// Send a prompt to the given tier and return the response text.
    ///
    /// A request timeout on the large tier with a big token budget is
    /// retried once with the budget reduced; every other failure is logged
    /// and surfaced as `None`.
    pub async fn converse(
        &self,
        prompt: &str,
        tier: ModelTier,
        temperature: f32,
        max_tokens: u32,
    ) -> Option<String> {
        if prompt.trim().is_empty() {
            error!("empty prompt provided to converse");
            return None;
        }

        let model = self.model_id(tier);
        info!(model, tier = tier.as_str(), max_tokens, "calling model");

        let mut budget = max_tokens;
        let mut attempt = 0;
        loop {
            match self.send_once(model, prompt, temperature, budget).await {
                Ok(text) => return Some(text),
                Err(CallError::Timeout) if self.retry.should_retry(attempt, tier, budget) => {
                    warn!(model, budget, "model timeout, retrying with reduced max tokens");
                    budget = self.retry.reduced_max_tokens;
                    attempt += 1;
                }
                Err(e) => {
                    error!(model, tier = tier.as_str(), error = %e, "model call failed");
                    return None;
                }
            }
        }
    }

    /// One HTTP round trip, classified for the retry policy.
    async fn send_once(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> std::result::Result<String, CallError> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallError::Timeout
                } else {
                    CallError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => CallError::Throttled,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CallError::AccessDenied,
                StatusCode::BAD_REQUEST => CallError::InvalidParams(body),
                _ => CallError::Network(format!("HTTP {status}: {body}")),
            });
        }

        let decoded: ChatResponse = response
            .json()
            .await
            .map_err(|e| CallError::BadResponse(e.to_string()))?;

        decoded
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| CallError::BadResponse("no text content in response".into()))
    }
}

/// Internal failure classification for one model call.
#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("request timed out")]
    Timeout,
    #[error("throttled by the model API")]
    Throttled,
    #[error("access denied by the model API")]
    AccessDenied,
    #[error("invalid request parameters: {0}")]
    InvalidParams(String),
    #[error("unexpected response structure: {0}")]
    BadResponse(String),
    #[error("network error: {0}")]
    Network(String),
}
