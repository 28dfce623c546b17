//! LLM provider adapters
//!
//! One module per backend. Each adapter owns its backend's auth scheme,
//! message envelope and response shape; nothing provider-specific leaks
//! past [`ProviderAdapter::invoke`](crate::client::ProviderAdapter::invoke).

use crate::error::{LLMError, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

mod anthropic;
mod gemini;
mod mock;
mod openai;
mod together;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use openai::OpenAIProvider;
pub use together::{TogetherProvider, DEEPSEEK_R1};

/// Default client-side timeout for a single backend call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAI,
    /// Anthropic messages API
    Anthropic,
    /// Together AI (hosts DeepSeek models), OpenAI-compatible
    Together,
    /// Google Gemini generateContent
    Gemini,
}

impl ProviderKind {
    /// All backends, in registry order
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAI,
        ProviderKind::Anthropic,
        ProviderKind::Together,
        ProviderKind::Gemini,
    ];

    /// Canonical selector string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Together => "together",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Display name used in attribution labels
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Together => "Together",
            ProviderKind::Gemini => "Google",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" | "chatgpt" | "gpt-4o" => Ok(ProviderKind::OpenAI),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "together" | "deepseek" | "deepseek-r1" => Ok(ProviderKind::Together),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(LLMError::UnsupportedProvider(format!(
                "'{}'. Valid values: openai, gpt, anthropic, claude, together, deepseek, gemini, google",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Build the HTTP client shared by an adapter's calls
pub(crate) fn http_client(timeout: Duration) -> Client {
    match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(
                error = %e,
                timeout_ms = timeout.as_millis() as u64,
                "HTTP client builder failed, calls will run without a client-side timeout"
            );
            Client::new()
        }
    }
}

/// Return the configured key or fail before touching the network
pub(crate) fn require_key<'a>(key: &'a Option<String>, kind: ProviderKind) -> Result<&'a str> {
    match key.as_deref() {
        Some(k) if !k.trim().is_empty() => Ok(k),
        _ => Err(LLMError::Configuration(format!(
            "missing API key for {}",
            kind.display_name()
        ))),
    }
}

/// Send a request and return status plus raw body
pub(crate) async fn send_raw(builder: RequestBuilder) -> Result<(u16, String)> {
    let resp = builder.send().await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok((status, body))
}

/// Turn a raw exchange into JSON, mapping non-success statuses to `Provider`
pub(crate) fn parse_success(status: u16, body: String) -> Result<serde_json::Value> {
    if !(200..300).contains(&status) {
        return Err(LLMError::Provider { status, body });
    }

    serde_json::from_str(&body)
        .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

/// Concatenate the text of typed parts (`{"type": "text", "text": ...}`), in order
pub(crate) fn concat_text_parts(parts: &[serde_json::Value]) -> String {
    parts
        .iter()
        .filter(|part| part["type"].as_str() == Some("text"))
        .filter_map(|part| part["text"].as_str())
        .collect()
}
