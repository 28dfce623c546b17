//! Generation stack initialization
//!
//! Turns a [`ServerConfig`] into the dispatcher, the optional retrieval gate
//! and the renderer shared by the HTTP handlers.

use crate::api::AppState;
use crate::config::{ProviderSettings, ServerConfig};
use crate::render::{OpenScadRenderer, RenderOptions};
use crate::storage::ArtifactStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use textcad_llm::{
    AnthropicProvider, Dispatcher, GeminiProvider, HttpKnowledgeIndex, OpenAIProvider,
    ProviderAdapter, ProviderKind, RetrievalGate, TogetherProvider,
};
use tracing::{info, warn};

/// Build one adapter from its settings
fn build_adapter(
    kind: ProviderKind,
    settings: &ProviderSettings,
    timeout: Duration,
) -> Arc<dyn ProviderAdapter> {
    let key = settings.api_key.clone();

    macro_rules! configure {
        ($provider:expr) => {{
            let mut provider = $provider.with_timeout(timeout);
            if let Some(model) = &settings.model {
                provider = provider.with_model(model.clone());
            }
            if let Some(base_url) = &settings.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Arc::new(provider) as Arc<dyn ProviderAdapter>
        }};
    }

    match kind {
        ProviderKind::OpenAI => configure!(OpenAIProvider::new(key)),
        ProviderKind::Anthropic => configure!(AnthropicProvider::new(key)),
        ProviderKind::Together => configure!(TogetherProvider::new(key)),
        ProviderKind::Gemini => configure!(GeminiProvider::new(key)),
    }
}

/// Initialize the dispatcher with every backend.
///
/// Backends without a key stay registered so that selecting them reports a
/// configuration error instead of an unknown provider.
pub fn init_dispatcher(config: &ServerConfig) -> Result<Dispatcher> {
    let primary: ProviderKind = config
        .primary_provider
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid primary_provider: {}", e))?;
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let mut builder = Dispatcher::builder().primary(primary);
    for kind in ProviderKind::ALL {
        let settings = config.providers.get(kind);
        if settings.api_key.is_none() {
            warn!(provider = %kind, "No API key configured");
        }
        builder = builder.with_adapter(build_adapter(kind, settings, timeout));
    }

    let configured = config.configured_providers();
    if !configured.contains(&primary) {
        warn!(provider = %primary, "Primary provider has no API key");
    }
    info!(primary = %primary, ?configured, "Dispatcher initialized");

    Ok(builder.build())
}

/// Initialize the full application state
pub fn init_state(config: &ServerConfig) -> Result<AppState> {
    let dispatcher = Arc::new(init_dispatcher(config)?);

    let gate = config.retrieval_url.as_ref().map(|url| {
        info!(url = %url, "Retrieval gate enabled");
        let index = HttpKnowledgeIndex::with_timeout(
            url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        );
        Arc::new(RetrievalGate::new(Arc::new(index), dispatcher.clone()))
    });

    Ok(AppState {
        dispatcher,
        gate,
        renderer: Arc::new(OpenScadRenderer::new(config.render.openscad_bin.clone())),
        store: Arc::new(ArtifactStore::new(
            config.storage.scad_dir.clone(),
            config.storage.image_dir.clone(),
        )),
        render_options: RenderOptions {
            width: config.render.width,
            height: config.render.height,
            mode: config.render.mode,
        },
    })
}
