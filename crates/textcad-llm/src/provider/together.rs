//! Together AI provider implementation (DeepSeek models)

use crate::client::{LLMRequest, LLMResponse, ProviderAdapter};
use crate::error::Result;
use crate::provider::openai::extract_chat_content;
use crate::provider::{
    http_client, parse_success, require_key, send_raw, ProviderKind, DEFAULT_TIMEOUT,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";
const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3";

/// Reasoning model used for corpus generation
pub const DEEPSEEK_R1: &str = "deepseek-ai/DeepSeek-R1";

/// Together provider (OpenAI-compatible API)
pub struct TogetherProvider {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: Client,
}

impl TogetherProvider {
    /// Create a new Together provider
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

        // Together takes the newer completion-token field
        if let Some(max_tokens) = request.max_tokens {
            body["max_completion_tokens"] = json!(max_tokens);
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

#[async_trait]
impl ProviderAdapter for TogetherProvider {
    async fn invoke(&self, request: LLMRequest) -> Result<LLMResponse> {
        let api_key = require_key(&self.api_key, self.kind())?;
        let started = Instant::now();
        let body = self.build_body(&request);

        debug!(model = %self.model, prompt_len = request.prompt.len(), "Calling Together");

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
        ProviderKind::Together
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_together_provider_creation() {
        let provider = TogetherProvider::new(Some("k".to_string())).with_model(DEEPSEEK_R1);
        assert_eq!(provider.name(), "together");
        assert_eq!(provider.attribution(), "Together deepseek-ai/DeepSeek-R1");
    }

    #[test]
    fn test_body_uses_completion_token_field() {
        let provider = TogetherProvider::new(None);
        let body = provider.build_body(
            &LLMRequest::new("bracket")
                .with_max_tokens(12000)
                .with_top_p(0.95)
                .with_temperature(0.6),
        );

        assert_eq!(body["max_completion_tokens"], 12000);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }
}
