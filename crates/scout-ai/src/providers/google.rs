//! Google Gemini (generateContent) adapter
//!
//! Gemini does not assign ids to function calls, so the function name doubles
//! as the call id; function responses are routed back by that same name.

use crate::{
    error::{Error, Result},
    stream::{collect_response, EventStream, StreamEvent},
    types::{ChatRequest, ChatResponse, Message, StopReason, ToolCall, ToolDef, Usage},
};
use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini API client
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl super::Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        collect_response(self.stream(request).await?).await
    }

    async fn stream(&self, request: &ChatRequest) -> Result<EventStream> {
        let body = build_request(request);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );

        tracing::debug!(model = %request.model, "google stream request");

        let request_builder = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }
}

/// Translate Gemini SSE chunks into canonical stream events
fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = StreamEvent> {
    stream! {
        let mut usage = Usage::default();
        let mut stop_reason = StopReason::Stop;
        let mut saw_tool_call = false;
        let mut error_message: Option<String> = None;

        while let Some(event_result) = event_source.next().await {
            match event_result {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    let chunk: GenerateChunk = match serde_json::from_str(&message.data) {
                        Ok(chunk) => chunk,
                        Err(_) => continue,
                    };
                    if let Some(metadata) = chunk.usage_metadata {
                        usage.input_tokens = metadata.prompt_token_count;
                        usage.output_tokens = metadata.candidates_token_count;
                        usage.total_tokens = metadata.total_token_count;
                    }
                    let Some(candidate) = chunk.candidates.into_iter().next() else {
                        continue;
                    };
                    if let Some(content) = candidate.content {
                        for part in content.parts {
                            if let Some(text) = part.text {
                                if !text.is_empty() {
                                    yield StreamEvent::Text { delta: text };
                                }
                            }
                            // Function calls arrive whole in a single chunk
                            if let Some(function_call) = part.function_call {
                                saw_tool_call = true;
                                let call = ToolCall::new(
                                    function_call.name.clone(),
                                    function_call.name,
                                    function_call.args,
                                );
                                yield StreamEvent::ToolCallStart { call: call.clone() };
                                yield StreamEvent::ToolCallEnd { call };
                            }
                        }
                    }
                    if let Some(reason) = candidate.finish_reason {
                        stop_reason = map_finish_reason(&reason);
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    error_message = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(message) = error_message {
            yield StreamEvent::Error { message };
        } else {
            if saw_tool_call && stop_reason == StopReason::Stop {
                stop_reason = StopReason::ToolUse;
            }
            yield StreamEvent::Done { usage, stop_reason };
        }
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTools>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

fn build_request(request: &ChatRequest) -> GenerateRequest {
    GenerateRequest {
        system_instruction: if request.system.is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: vec![serde_json::json!({ "text": request.system })],
            })
        },
        contents: convert_messages(&request.messages),
        tools: if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTools {
                function_declarations: convert_tools(&request.tools),
            }])
        },
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
        },
    }
}

fn convert_messages(messages: &[Message]) -> Vec<GeminiContent> {
    let mut result = vec![];

    for message in messages {
        match message {
            Message::User { content } => result.push(GeminiContent {
                role: "user".to_string(),
                parts: vec![serde_json::json!({ "text": content })],
            }),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts = vec![];
                if let Some(text) = content {
                    if !text.is_empty() {
                        parts.push(serde_json::json!({ "text": text }));
                    }
                }
                for call in tool_calls {
                    parts.push(serde_json::json!({
                        "functionCall": { "name": call.name, "args": call.arguments }
                    }));
                }
                if !parts.is_empty() {
                    result.push(GeminiContent {
                        role: "model".to_string(),
                        parts,
                    });
                }
            }
            Message::Tool {
                tool_call_id,
                content,
                error,
            } => {
                let response = match error {
                    Some(message) => serde_json::json!({ "error": message }),
                    None => serde_json::json!({ "output": content }),
                };
                result.push(GeminiContent {
                    role: "user".to_string(),
                    parts: vec![serde_json::json!({
                        "functionResponse": { "name": tool_call_id, "response": response }
                    })],
                });
            }
        }
    }

    result
}

fn convert_tools(tools: &[ToolDef]) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        })
        .collect()
}

fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "MAX_TOKENS" => StopReason::Length,
        "STOP" => StopReason::Stop,
        "SAFETY" | "RECITATION" | "BLOCKLIST" => StopReason::Error,
        _ => StopReason::Stop,
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
