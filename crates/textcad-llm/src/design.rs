//! Design request and generation result types

use crate::error::{LLMError, Result};
use serde::Serialize;

/// A non-empty free-text description of the desired object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignRequest(String);

impl DesignRequest {
    /// Validate and wrap a design request. Surrounding whitespace is trimmed;
    /// an empty remainder is rejected with [`LLMError::EmptyPrompt`].
    pub fn new(text: impl AsRef<str>) -> Result<Self> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(LLMError::EmptyPrompt);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the request text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DesignRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sanitized source text plus the label of whoever produced it.
///
/// Only the dispatcher and the retrieval gate construct these, and both
/// route the text through the sanitizer first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    source_text: String,
    attribution_label: String,
}

impl GenerationResult {
    pub(crate) fn new(source_text: String, attribution_label: String) -> Self {
        Self {
            source_text,
            attribution_label,
        }
    }

    /// Renderer-ready OpenSCAD source
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Human-readable provider/model label
    pub fn attribution_label(&self) -> &str {
        &self.attribution_label
    }

    /// Same source, different label
    pub(crate) fn relabel(self, attribution_label: String) -> Self {
        Self {
            source_text: self.source_text,
            attribution_label,
        }
    }

    /// Split into `(source_text, attribution_label)`
    pub fn into_parts(self) -> (String, String) {
        (self.source_text, self.attribution_label)
    }
}
