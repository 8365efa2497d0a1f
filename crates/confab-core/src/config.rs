//! Configuration types and the YAML loader.
//!
//! Every field has a serde default so the server runs with no config file at
//! all; a file only needs to name the values it overrides. The upstream API
//! key is never stored in the file by default — it is resolved from the
//! environment once, when the client is constructed.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tokio::fs;

use crate::errors::ChatError;

/// Environment variable consulted when the config names no other source.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfabConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Wire key of the persona used when a request names none.
    #[serde(default = "default_persona_key")]
    pub default_persona: String,
}

impl Default for ConfabConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            llm: LlmConfig::default(),
            default_persona: default_persona_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub delivery: ResponseDelivery,
    /// Include upstream error detail in 500 bodies. Off in production.
    #[serde(default)]
    pub verbose_errors: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            delivery: ResponseDelivery::default(),
            verbose_errors: false,
        }
    }
}

/// How `/api/chat` delivers the model's text: one buffered JSON body, or a
/// chunked plain-text stream written as upstream chunks arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseDelivery {
    #[default]
    Buffered,
    Streamed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub auth: LlmAuth,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            auth: LlmAuth::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    /// Gemini-compatible endpoint at a different base URL. Used by test
    /// harnesses and local gateways.
    Custom { base_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl LlmAuth {
    /// Resolve the API key: inline value, then the named environment
    /// variable, then the conventional default variable.
    pub fn resolve(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        if let Some(var) = &self.api_key_env {
            return env::var(var).ok();
        }
        env::var(DEFAULT_API_KEY_ENV).ok()
    }
}

fn default_persona_key() -> String {
    "hex".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// Loader for YAML configuration files.
pub struct ConfigLoader;

impl ConfigLoader {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<ConfabConfig, ChatError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            ChatError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_str(&content)
    }

    /// Like [`ConfigLoader::from_file`], but a missing file yields the
    /// defaults instead of an error.
    pub async fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<ConfabConfig, ChatError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "config file {} not found, using defaults",
                path.display()
            );
            return Ok(ConfabConfig::default());
        }
        Self::from_file(path).await
    }

    pub fn from_str(content: &str) -> Result<ConfabConfig, ChatError> {
        serde_yaml::from_str(content)
            .map_err(|e| ChatError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gets_all_defaults() {
        let config = ConfigLoader::from_str("{}").unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:3001");
        assert_eq!(config.server.delivery, ResponseDelivery::Buffered);
        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.default_persona, "hex");
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config = ConfigLoader::from_str(
            "server:\n  delivery: streamed\nllm:\n  model: gemini-2.5-pro\n",
        )
        .unwrap();
        assert_eq!(config.server.delivery, ResponseDelivery::Streamed);
        assert_eq!(config.llm.model, "gemini-2.5-pro");
        assert_eq!(config.server.bind_addr, "127.0.0.1:3001");
    }

    #[test]
    fn custom_provider_carries_its_base_url() {
        let config = ConfigLoader::from_str(
            "llm:\n  provider: !custom\n    base_url: http://127.0.0.1:9999\n",
        )
        .unwrap();
        match config.llm.provider {
            LlmProvider::Custom { base_url } => {
                assert_eq!(base_url, "http://127.0.0.1:9999")
            }
            other => panic!("unexpected provider: {other:?}"),
        }
    }

    #[test]
    fn inline_api_key_wins_over_environment() {
        let auth = LlmAuth {
            api_key: Some("inline".to_string()),
            api_key_env: Some("CONFAB_TEST_UNSET_VAR".to_string()),
        };
        assert_eq!(auth.resolve().as_deref(), Some("inline"));
    }
}
