//! REST API type definitions

use crate::render::{RenderOptions, Renderer};
use crate::storage::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use textcad_llm::{Dispatcher, RetrievalGate};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Present only when a knowledge index is configured
    pub gate: Option<Arc<RetrievalGate>>,
    pub renderer: Arc<dyn Renderer>,
    pub store: Arc<ArtifactStore>,
    pub render_options: RenderOptions,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Form posted to `/submit`
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    /// Free-text design request
    #[serde(default)]
    pub text: String,

    /// Provider selector; the primary provider is used when absent
    #[serde(default)]
    pub provider: Option<String>,

    /// `"on"` routes the request through the retrieval gate
    #[serde(default, rename = "toggleRag")]
    pub toggle_rag: Option<String>,
}

impl SubmitForm {
    pub fn wants_retrieval(&self) -> bool {
        self.toggle_rag.as_deref() == Some("on")
    }
}

/// `/submit` answer. `error` is omitted on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub image: String,
    pub filename: String,
    pub code: String,
    pub source: String,
}

impl SubmitResponse {
    pub fn success(stem: &str, image: String, code: String, source: String) -> Self {
        Self {
            error: None,
            image,
            filename: stem.to_string(),
            code,
            source,
        }
    }

    /// Failure with whatever code was generated before things went wrong
    pub fn failure(error: impl Into<String>, code: String, source: String) -> Self {
        Self {
            error: Some(error.into()),
            image: String::new(),
            filename: String::new(),
            code,
            source,
        }
    }
}
