//! Provider adapters
//!
//! Each adapter owns its wire format end to end: request conversion, SSE (or
//! single-shot) response handling, and translation into canonical
//! [`StreamEvent`](crate::stream::StreamEvent)s.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use crate::{
    error::{Error, Result},
    stream::EventStream,
    types::{ChatRequest, ChatResponse, ModelConfig, ProviderKind},
};
use async_trait::async_trait;
use std::sync::Arc;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// A chat completion backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name for logging and persistence
    fn name(&self) -> &'static str;

    /// Whether [`Provider::stream`] produces true incremental events.
    ///
    /// Adapters for backends without streaming still implement `stream` by
    /// synthesizing events from a complete response; callers that care about
    /// latency can check this flag first.
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Request a complete response
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Request a streaming response
    async fn stream(&self, request: &ChatRequest) -> Result<EventStream>;
}

/// Construct a provider from configuration
pub fn from_config(config: &ModelConfig) -> Result<Arc<dyn Provider>> {
    match config.provider {
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::new(
            resolve_api_key(config)?,
            config.base_url.clone(),
        ))),
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::new(
            resolve_api_key(config)?,
            config.base_url.clone(),
        ))),
        ProviderKind::Google => Ok(Arc::new(GoogleProvider::new(
            resolve_api_key(config)?,
            config.base_url.clone(),
        ))),
        ProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(config.base_url.clone()))),
    }
}

fn resolve_api_key(config: &ModelConfig) -> Result<String> {
    if let Some(key) = &config.api_key {
        return Ok(key.clone());
    }
    match config.provider.api_key_env() {
        Some(var) => std::env::var(var).map_err(|_| Error::InvalidApiKey),
        None => Err(Error::InvalidApiKey),
    }
}
