//! Server configuration

use crate::render::RenderMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use textcad_llm::ProviderKind;

/// Per-backend overrides. Anything left unset uses the adapter default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// API key (falls back to the conventional env var, then keys.json)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default)]
    pub model: Option<String>,

    /// Endpoint base URL, mainly for proxies and tests
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Settings for every supported backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub together: ProviderSettings,
    pub gemini: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Together => &self.together,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenAI => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Together => &mut self.together,
            ProviderKind::Gemini => &mut self.gemini,
        }
    }
}

/// Where generated artifacts are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for `.scad` sources and STL exports
    pub scad_dir: PathBuf,

    /// Directory for preview images, also served under `/images`
    pub image_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scad_dir: PathBuf::from("scad_scripts"),
            image_dir: PathBuf::from("static/images"),
        }
    }
}

/// OpenSCAD invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub openscad_bin: PathBuf,
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            openscad_bin: PathBuf::from("openscad"),
            width: 800,
            height: 600,
            mode: RenderMode::Preview,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port (HTTP)
    pub port: u16,

    /// Provider used when a request names none (any accepted selector)
    pub primary_provider: String,

    /// Client-side timeout for one backend call
    pub request_timeout_secs: u64,

    pub storage: StorageConfig,

    pub render: RenderConfig,

    pub providers: ProvidersConfig,

    /// Knowledge index base URL; retrieval is disabled when unset
    pub retrieval_url: Option<String>,

    /// Optional JSON file mapping `gpt`/`claude`/`together`/`gemini` to keys
    pub keys_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            primary_provider: "openai".to_string(),
            request_timeout_secs: 60,
            storage: StorageConfig::default(),
            render: RenderConfig::default(),
            providers: ProvidersConfig::default(),
            retrieval_url: None,
            keys_file: PathBuf::from("keys.json"),
        }
    }
}

/// Conventional environment variable holding a backend's key
pub fn key_env_var(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAI => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::Together => "TOGETHER_API_KEY",
        ProviderKind::Gemini => "GEMINI_API_KEY",
    }
}

/// Entry name of a backend in keys.json
pub fn keys_file_entry(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAI => "gpt",
        ProviderKind::Anthropic => "claude",
        ProviderKind::Together => "together",
        ProviderKind::Gemini => "gemini",
    }
}

/// Read keys.json. A missing file yields an empty map.
pub fn load_keys_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if exists
        dotenvy::dotenv().ok();

        let mut config = Self::from_sources("config/server")?;

        let keys = load_keys_file(&config.keys_file)?;
        config.fill_missing_keys(|name| std::env::var(name).ok(), &keys);

        Ok(config)
    }

    /// Read the optional config file `name` (any supported extension) and
    /// `TEXTCAD_*` overrides, without credential fallbacks
    pub fn from_sources(name: &str) -> anyhow::Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(
                config::Environment::with_prefix("TEXTCAD")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Fill unset API keys from `env`, then from the keys.json map
    pub fn fill_missing_keys<F>(&mut self, env: F, keys_file: &HashMap<String, String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        for kind in ProviderKind::ALL {
            let settings = self.providers.get_mut(kind);
            if settings.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
                continue;
            }

            settings.api_key = env(key_env_var(kind))
                .filter(|k| !k.trim().is_empty())
                .or_else(|| keys_file.get(keys_file_entry(kind)).cloned());
        }
    }

    /// Backends with a usable key
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| {
                self.providers
                    .get(*kind)
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.trim().is_empty())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.primary_provider, "openai");
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.render.width, 800);
        assert_eq!(config.render.height, 600);
        assert_eq!(config.render.mode, RenderMode::Preview);
        assert!(config.retrieval_url.is_none());
        assert!(config.configured_providers().is_empty());
    }

    #[test]
    fn test_env_key_wins_over_keys_file() {
        let mut config = ServerConfig::default();
        let keys: HashMap<String, String> = [
            ("gpt".to_string(), "file-openai".to_string()),
            ("claude".to_string(), "file-claude".to_string()),
        ]
        .into_iter()
        .collect();

        config.fill_missing_keys(
            |name| (name == "OPENAI_API_KEY").then(|| "env-openai".to_string()),
            &keys,
        );

        assert_eq!(config.providers.openai.api_key.as_deref(), Some("env-openai"));
        assert_eq!(config.providers.anthropic.api_key.as_deref(), Some("file-claude"));
        assert!(config.providers.gemini.api_key.is_none());
        assert_eq!(
            config.configured_providers(),
            vec![ProviderKind::OpenAI, ProviderKind::Anthropic]
        );
    }

    #[test]
    fn test_explicit_key_is_kept() {
        let mut config = ServerConfig::default();
        config.providers.gemini.api_key = Some("explicit".to_string());

        config.fill_missing_keys(|_| Some("env".to_string()), &HashMap::new());

        assert_eq!(config.providers.gemini.api_key.as_deref(), Some("explicit"));
        assert_eq!(config.providers.together.api_key.as_deref(), Some("env"));
    }

    #[test]
    fn test_blank_env_key_is_ignored() {
        let mut config = ServerConfig::default();
        config.fill_missing_keys(|_| Some("  ".to_string()), &HashMap::new());
        assert!(config.configured_providers().is_empty());
    }

    #[test]
    fn test_missing_keys_file_is_empty() {
        let keys = load_keys_file(Path::new("/nonexistent/keys.json")).unwrap();
        assert!(keys.is_empty());
    }
}
