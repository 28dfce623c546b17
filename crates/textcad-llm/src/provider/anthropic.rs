//! Anthropic provider implementation

use crate::client::{LLMRequest, LLMResponse, ProviderAdapter};
use crate::error::{LLMError, Result};
use crate::provider::{
    concat_text_parts, http_client, parse_success, require_key, send_raw, ProviderKind,
    DEFAULT_TIMEOUT,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic provider (messages API, `x-api-key` auth, typed content blocks)
pub struct AnthropicProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: http_client(DEFAULT_TIMEOUT),
        }
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    fn build_body(&self, request: &LLMRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": request.prompt
            }],
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }
        body
    }
}

/// Input plus output tokens. Usage is advisory, so a bogus count saturates.
fn usage_tokens(usage: &serde_json::Value) -> u32 {
    let count = |field: &str| {
        usage[field]
            .as_u64()
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
    };
    count("input_tokens").saturating_add(count("output_tokens"))
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn invoke(&self, request: LLMRequest) -> Result<LLMResponse> {
        let api_key = require_key(&self.api_key, self.kind())?;
        let started = Instant::now();
        let body = self.build_body(&request);

        debug!(model = %self.model, prompt_len = request.prompt.len(), "Calling Anthropic");

        let (status, resp_text) = send_raw(
            self.client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", api_key)
                .header("anthropic-version", API_VERSION)
                .header("Content-Type", "application/json")
                .json(&body),
        )
        .await?;

        let resp_json = parse_success(status, resp_text)?;

        let content_blocks = resp_json["content"].as_array().ok_or_else(|| {
            LLMError::InvalidResponse("No content in response".to_string())
        })?;
        let content = concat_text_parts(content_blocks);

        let finish_reason = resp_json["stop_reason"]
            .as_str()
            .unwrap_or("end_turn")
            .to_string();

        let tokens_used = usage_tokens(&resp_json["usage"]);

        Ok(LLMResponse::new(content, self.model.clone())
            .with_tokens(tokens_used)
            .with_finish_reason(finish_reason)
            .with_latency(started.elapsed()))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }
}
