//! OpenAI provider implementation

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI provider (chat completions, bearer auth)
pub struct OpenAIProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider. A `None` key is accepted here and
    /// reported as a configuration error on first use.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: http_client(DEFAULT_TIMEOUT),
        }
    }

    /// Override the API base URL (e.g. Azure OpenAI or a test server)
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
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({
                "role": "system",
                "content": system
            }));
        }
        messages.push(json!({
            "role": "user",
            "content": request.prompt
        }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
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

/// Pull the message text out of a chat-completions envelope.
///
/// `content` is normally a string; newer models may return an array of
/// typed parts, of which only text parts are kept.
pub(crate) fn extract_chat_content(resp_json: &serde_json::Value) -> Result<String> {
    let content = &resp_json["choices"][0]["message"]["content"];
    if let Some(text) = content.as_str() {
        return Ok(text.to_string());
    }
    if let Some(parts) = content.as_array() {
        return Ok(concat_text_parts(parts));
    }
    Err(LLMError::InvalidResponse("No content in response".to_string()))
}

#[async_trait]
impl ProviderAdapter for OpenAIProvider {
    async fn invoke(&self, request: LLMRequest) -> Result<LLMResponse> {
        let api_key = require_key(&self.api_key, self.kind())?;
        let started = Instant::now();
        let body = self.build_body(&request);

        debug!(model = %self.model, prompt_len = request.prompt.len(), "Calling OpenAI");

        let (status, resp_text) = send_raw(
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body),
        )
        .await?;

        let resp_json = parse_success(status, resp_text)?;
        let content = extract_chat_content(&resp_json)?;

        let finish_reason = resp_json["choices"][0]["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();
        let tokens_used = resp_json["usage"]["total_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(LLMResponse::new(content, self.model.clone())
            .with_tokens(tokens_used)
            .with_finish_reason(finish_reason)
            .with_latency(started.elapsed()))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn model(&self) -> &str {
        &self.model
    }
}
