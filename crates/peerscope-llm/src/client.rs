//! Chat-completions client for the xAI API.

use std::time::Duration;

use peerscope_core::{AppConfig, CostEvent, ExternalError, RunContext};
use peerscope_http::{truncate_for_log, AuthHeader, Backoff, ExternalCallClient, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::repair::repair_json;

pub const TARGET: &str = "xai";
pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_MODEL: &str = "grok-2-1212";

/// Chat message for the completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Text of the first choice plus the token usage the API reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Grok chat client. Every successful call is recorded on the run's ledger.
#[derive(Debug, Clone)]
pub struct GrokClient {
    http: ExternalCallClient,
    model: String,
    max_tokens: u32,
}

impl GrokClient {
    /// # Errors
    ///
    /// Returns [`ExternalError::Validation`] if `base_url` is not a valid URL.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, ExternalError> {
        let http = ExternalCallClient::new(
            TARGET,
            base_url,
            AuthHeader::Bearer(api_key.to_string()),
            timeout,
            policy,
        )?;
        Ok(Self {
            http,
            model: model.into(),
            max_tokens,
        })
    }

    /// # Errors
    ///
    /// Returns [`ExternalError::Validation`] if `XAI_API_KEY` is not set or
    /// the base URL is invalid.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ExternalError> {
        let api_key = config
            .llm_api_key
            .as_deref()
            .ok_or_else(|| ExternalError::Validation("XAI_API_KEY is not set".to_string()))?;
        Self::new(
            api_key,
            &config.llm_base_url,
            config.llm_model.clone(),
            config.llm_max_tokens,
            Duration::from_secs(config.llm_timeout_secs),
            Self::retry_policy(config),
        )
    }

    /// Exponential back-off on 429 starting at one second; no courtesy pause.
    #[must_use]
    pub fn retry_policy(config: &AppConfig) -> RetryPolicy {
        RetryPolicy {
            max_retries: config.max_retries,
            rate_limit_backoff: Backoff::Exponential {
                base: Duration::from_secs(1),
            },
            timeout_delay: Duration::from_secs(config.timeout_retry_delay_secs),
            courtesy_delay: None,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one chat completion and returns the first choice's text.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::MalformedResponse`] if the response has no
    /// choices, or the terminal transport error.
    pub async fn complete(
        &self,
        ctx: &RunContext,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<Completion, ExternalError> {
        let request = json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": self.max_tokens,
        });

        let body = self.http.post_json("/chat/completions", &request).await?;
        let response: CompletionResponse =
            serde_json::from_value(body.clone()).map_err(|e| malformed(&body, &e.to_string()))?;

        let usage = response.usage.unwrap_or_default();
        let Some(content) = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            return Err(malformed(&body, "completion has no choices"));
        };

        ctx.record_cost(CostEvent::LanguageModel {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        });
        tracing::debug!(
            model = %self.model,
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "completion received"
        );

        Ok(Completion {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }

    /// [`Self::complete`] followed by JSON repair and parsing.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::MalformedResponse`] if the text is not JSON
    /// after repair, or any error from [`Self::complete`].
    pub async fn complete_json(
        &self,
        ctx: &RunContext,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<Value, ExternalError> {
        let completion = self.complete(ctx, messages, temperature).await?;
        repair_json(&completion.content)
    }
}

fn malformed(body: &Value, reason: &str) -> ExternalError {
    ExternalError::MalformedResponse {
        snippet: truncate_for_log(&body.to_string(), 500),
        reason: reason.to_string(),
    }
}
