//! Generation dispatcher: selector -> adapter -> sanitized source
//!
//! # Example
//! ```no_run
//! use textcad_llm::{DesignRequest, Dispatcher, OpenAIProvider, ProviderKind};
//! use std::sync::Arc;
//!
//! # async fn example() -> textcad_llm::Result<()> {
//! let dispatcher = Dispatcher::builder()
//!     .with_adapter(Arc::new(OpenAIProvider::new(Some("your-api-key".to_string()))))
//!     .primary(ProviderKind::OpenAI)
//!     .build();
//!
//! let request = DesignRequest::new("a 10x10x10 mm cube")?;
//! let result = dispatcher.generate(&request, Some("gpt")).await?;
//! println!("{}\n// by {}", result.source_text(), result.attribution_label());
//! # Ok(())
//! # }
//! ```

use crate::client::{LLMRequest, ProviderAdapter};
use crate::design::{DesignRequest, GenerationResult};
use crate::error::{LLMError, Result};
use crate::prompt_templates::{user_prompt, SYSTEM_PROMPT};
use crate::provider::ProviderKind;
use crate::sanitizer::Sanitizer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Routes design requests to exactly one provider adapter
pub struct Dispatcher {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    primary: ProviderKind,
    sanitizer: Sanitizer,
}

impl Dispatcher {
    /// Start building a dispatcher
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Provider used when the caller gives no selector
    pub fn primary(&self) -> ProviderKind {
        self.primary
    }

    /// Registered providers, in canonical order
    pub fn providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.adapters.contains_key(kind))
            .collect()
    }

    /// Resolve a selector to its adapter without making any call.
    ///
    /// `None` or a blank selector picks the primary provider; anything else
    /// must name a known backend.
    pub fn resolve(&self, selector: Option<&str>) -> Result<Arc<dyn ProviderAdapter>> {
        let kind = match selector.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => name.parse::<ProviderKind>()?,
            None => self.primary,
        };

        self.adapters.get(&kind).cloned().ok_or_else(|| {
            LLMError::Configuration(format!("provider {} is not configured", kind))
        })
    }

    /// Generate sanitized OpenSCAD source for a design request
    pub async fn generate(
        &self,
        request: &DesignRequest,
        selector: Option<&str>,
    ) -> Result<GenerationResult> {
        let adapter = self.resolve(selector)?;
        let label = adapter.attribution();

        info!(provider = %adapter.kind(), model = adapter.model(), "Dispatching design request");

        let llm_request = LLMRequest::new(user_prompt(request.as_str())).with_system(SYSTEM_PROMPT);
        let response = adapter.invoke(llm_request).await.map_err(|e| {
            error!(provider = %adapter.kind(), "Generation failed: {}", e);
            e
        })?;

        debug!(
            attempts = response.attempts,
            latency_ms = response.latency.as_millis() as u64,
            raw_len = response.content.len(),
            "Provider answered"
        );

        let source = self.sanitizer.sanitize(&response.content);
        if source.is_empty() {
            return Err(LLMError::EmptyGeneration(format!(
                "{} returned no usable code",
                label
            )));
        }

        Ok(GenerationResult::new(source, label))
    }
}

/// Builder for [`Dispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    primary: Option<ProviderKind>,
    sanitizer: Option<Sanitizer>,
}

impl DispatcherBuilder {
    /// Register an adapter under its own kind, replacing any previous one
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// Provider used when no selector is given (default: OpenAI)
    pub fn primary(mut self, kind: ProviderKind) -> Self {
        self.primary = Some(kind);
        self
    }

    /// Replace the default sanitizer
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    /// Finish building
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            adapters: self.adapters,
            primary: self.primary.unwrap_or(ProviderKind::OpenAI),
            sanitizer: self.sanitizer.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    fn dispatcher_with(mock: Arc<MockProvider>) -> Dispatcher {
        Dispatcher::builder()
            .with_adapter(mock)
            .primary(ProviderKind::OpenAI)
            .build()
    }

    #[tokio::test]
    async fn test_generate_sanitizes_output() {
        let mock = Arc::new(MockProvider::with_response(
            "```openscad\ncube([10,10,10]);\n```",
        ));
        let dispatcher = dispatcher_with(mock.clone());

        let request = DesignRequest::new("a cube").unwrap();
        let result = dispatcher.generate(&request, Some("gpt")).await.unwrap();

        assert_eq!(result.source_text(), "cube([10,10,10]);");
        assert_eq!(result.attribution_label(), "OpenAI mock-model");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_sends_shared_system_prompt_and_request() {
        let mock = Arc::new(MockProvider::new());
        let dispatcher = dispatcher_with(mock.clone());

        let request = DesignRequest::new("a hollow cylinder").unwrap();
        dispatcher.generate(&request, None).await.unwrap();

        let sent = &mock.requests()[0];
        assert_eq!(sent.system.as_deref(), Some(SYSTEM_PROMPT));
        assert!(sent.prompt.contains("a hollow cylinder"));
    }

    #[tokio::test]
    async fn test_blank_selector_uses_primary() {
        let mock = Arc::new(MockProvider::new());
        let dispatcher = dispatcher_with(mock.clone());
        let request = DesignRequest::new("a cube").unwrap();

        dispatcher.generate(&request, Some("  ")).await.unwrap();
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_selector_never_calls_adapter() {
        let mock = Arc::new(MockProvider::new());
        let dispatcher = dispatcher_with(mock.clone());
        let request = DesignRequest::new("a cube").unwrap();

        let err = dispatcher
            .generate(&request, Some("llama"))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::UnsupportedProvider(_)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_known_but_unregistered_provider() {
        let mock = Arc::new(MockProvider::new());
        let dispatcher = dispatcher_with(mock.clone());
        let request = DesignRequest::new("a cube").unwrap();

        let err = dispatcher
            .generate(&request, Some("claude"))
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::Configuration(_)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_propagates_unchanged() {
        let mock = Arc::new(MockProvider::new().then_status(401, "invalid key"));
        let dispatcher = dispatcher_with(mock);
        let request = DesignRequest::new("a cube").unwrap();

        let err = dispatcher.generate(&request, None).await.unwrap_err();
        match err {
            LLMError::Provider { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_generation_is_an_error() {
        let mock = Arc::new(MockProvider::with_response("```\n```"));
        let dispatcher = dispatcher_with(mock);
        let request = DesignRequest::new("a cube").unwrap();

        let err = dispatcher.generate(&request, None).await.unwrap_err();
        assert!(matches!(err, LLMError::EmptyGeneration(_)));
    }

    #[test]
    fn test_providers_listing() {
        let dispatcher = Dispatcher::builder()
            .with_adapter(Arc::new(MockProvider::new().as_kind(ProviderKind::Gemini)))
            .with_adapter(Arc::new(MockProvider::new()))
            .primary(ProviderKind::Gemini)
            .build();

        assert_eq!(
            dispatcher.providers(),
            vec![ProviderKind::OpenAI, ProviderKind::Gemini]
        );
        assert_eq!(dispatcher.primary(), ProviderKind::Gemini);
    }
}
