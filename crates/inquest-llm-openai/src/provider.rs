//! Chat completions client implementing the [`Provider`] trait.

use async_trait::async_trait;
use inquest_llm::provider::{CompletionOutcome, CompletionRequest, Provider, ProviderError, ProviderResult};
use inquest_llm::{parse_api_error, parse_retry_after_header};
use reqwest::StatusCode;
use tracing::debug;

use crate::convert::{build_request, parse_response};
use crate::types::{ChatResponse, OpenAiConfig, DEFAULT_BASE_URL};

/// Provider backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// Build a provider from config.
    pub fn new(config: OpenAiConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            model: config.model,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionOutcome> {
        let body = build_request(&self.model, request);
        debug!(
            model = self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let payload: ChatResponse = response.json().await?;
            return parse_response(payload);
        }

        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after_header);
        let body_text = response.text().await.unwrap_or_default();
        let info = parse_api_error(&body_text, status.as_u16());

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
                message: info.message,
            },
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
                retry_after_ms: retry_after_ms.unwrap_or(0),
                message: info.message,
            },
            _ => ProviderError::Api {
                status: status.as_u16(),
                message: info.message,
                code: info.code,
                retryable: info.retryable,
            },
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
