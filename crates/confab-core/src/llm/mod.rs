//! Upstream language model abstractions and the Gemini integration.
//!
//! Defines the provider-agnostic `LLM` trait with both delivery shapes the
//! proxy supports: a buffered single response and a chunked text stream.
//! The only production provider is Google Gemini; the `Custom` provider
//! variant exists so tests and local harnesses can point the same client at
//! a different base URL.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;

use crate::config::{LlmConfig, LlmProvider};
use crate::core_types::{LLMResponse, Message};
use crate::errors::ChatError;

pub mod gemini;

pub use gemini::GeminiClient;

/// A stream of response text chunks from the upstream model.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

#[async_trait]
pub trait LLM: Send + Sync {
    /// One buffered completion for the given turn.
    async fn generate(
        &self,
        messages: Vec<Message>,
        web_search: bool,
    ) -> Result<LLMResponse, ChatError>;

    /// The same turn delivered as incremental text chunks.
    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        web_search: bool,
    ) -> Result<TextStream, ChatError>;
}

/// Create the upstream client described by the configuration.
///
/// Never fails on a missing API key: the key is resolved once here and its
/// absence surfaces on the first request instead of at startup.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, ChatError> {
    let api_key = config.auth.resolve();
    if api_key.is_none() {
        log::warn!(
            "no API key found for the upstream provider; requests will fail until one is configured"
        );
    }

    let client = match &config.provider {
        LlmProvider::Gemini => GeminiClient::new(api_key, config.model.clone()),
        LlmProvider::Custom { base_url } => {
            GeminiClient::with_base_url(api_key, config.model.clone(), base_url.clone())
        }
    };

    Ok(Arc::new(client))
}
