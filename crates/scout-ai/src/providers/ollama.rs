//! Ollama adapter
//!
//! Talks to Ollama's OpenAI-compatible endpoint. Local models handle tool
//! calling poorly over SSE, so `supports_streaming` reports false and
//! `stream` synthesizes the canonical event sequence from a single complete
//! response.

use crate::{
    error::{Error, Result},
    stream::{synthesize_events, EventStream},
    types::{ChatRequest, ChatResponse},
};
use super::openai;

const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

/// Ollama client (OpenAI-compatible wire format, no API key)
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl super::Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = openai::build_wire_request(request, false);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(url = %url, model = %request.model, "ollama request");

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_str(), text));
        }

        openai::parse_completion(response.json().await?)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<EventStream> {
        let response = self.chat(request).await?;
        let events = synthesize_events(&response);
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
