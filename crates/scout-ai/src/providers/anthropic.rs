//! Anthropic Messages API adapter

use crate::{
    error::{Error, Result},
    stream::{collect_response, EventStream, StreamEvent},
    types::{ChatRequest, ChatResponse, Message, StopReason, ToolCall, ToolDef, Usage},
};
use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn build_request(&self, request: &ChatRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            messages: convert_messages(&request.messages),
            max_tokens: request.max_tokens,
            stream: true,
            system: if request.system.is_empty() {
                None
            } else {
                Some(request.system.clone())
            },
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(convert_tools(&request.tools))
            },
        }
    }
}

#[async_trait::async_trait]
impl super::Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        collect_response(self.stream(request).await?).await
    }

    async fn stream(&self, request: &ChatRequest) -> Result<EventStream> {
        let body = self.build_request(request);
        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!(url = %url, model = %request.model, "anthropic request");

        let request_builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .json(&body);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }
}

/// Translate Anthropic SSE events into canonical stream events
fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = StreamEvent> {
    stream! {
        let mut usage = Usage::default();
        let mut stop_reason = StopReason::Stop;
        // Tool calls indexed by content block, arguments accumulated as raw JSON
        let mut blocks: Vec<Option<PartialToolCall>> = vec![];
        let mut error_message: Option<String> = None;
        let mut completed = false;

        while let Some(event_result) = event_source.next().await {
            match event_result {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => match message.event.as_str() {
                    "message_start" => {
                        if let Ok(data) = serde_json::from_str::<MessageStartEvent>(&message.data) {
                            usage.input_tokens = data.message.usage.input_tokens;
                            usage.output_tokens = data.message.usage.output_tokens;
                        }
                    }
                    "content_block_start" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockStartEvent>(&message.data) {
                            let index = data.index as usize;
                            while blocks.len() <= index {
                                blocks.push(None);
                            }
                            if data.content_block.block_type == "tool_use" {
                                let id = data.content_block.id.unwrap_or_default();
                                let name = data.content_block.name.unwrap_or_default();
                                blocks[index] = Some(PartialToolCall {
                                    id: id.clone(),
                                    name: name.clone(),
                                    arguments_json: String::new(),
                                });
                                yield StreamEvent::ToolCallStart {
                                    call: ToolCall::new(id, name, serde_json::Value::Null),
                                };
                            }
                        }
                    }
                    "content_block_delta" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockDeltaEvent>(&message.data) {
                            let index = data.index as usize;
                            match data.delta.delta_type.as_str() {
                                "text_delta" => {
                                    let delta = data.delta.text.unwrap_or_default();
                                    if !delta.is_empty() {
                                        yield StreamEvent::Text { delta };
                                    }
                                }
                                "input_json_delta" => {
                                    if let Some(Some(partial)) = blocks.get_mut(index) {
                                        partial
                                            .arguments_json
                                            .push_str(&data.delta.partial_json.unwrap_or_default());
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                    "content_block_stop" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockStopEvent>(&message.data) {
                            let index = data.index as usize;
                            if let Some(slot) = blocks.get_mut(index) {
                                if let Some(partial) = slot.take() {
                                    yield StreamEvent::ToolCallEnd { call: partial.finish() };
                                }
                            }
                        }
                    }
                    "message_delta" => {
                        if let Ok(data) = serde_json::from_str::<MessageDeltaEvent>(&message.data) {
                            if let Some(reason) = data.delta.stop_reason {
                                stop_reason = map_stop_reason(&reason);
                            }
                            usage.output_tokens = data.usage.output_tokens;
                        }
                    }
                    "message_stop" => {
                        completed = true;
                        break;
                    }
                    "error" => {
                        if let Ok(data) = serde_json::from_str::<ErrorEvent>(&message.data) {
                            error_message = Some(data.error.message);
                        } else {
                            error_message = Some(message.data.clone());
                        }
                        break;
                    }
                    _ => {}
                },
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    error_message = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(message) = error_message {
            yield StreamEvent::Error { message };
        } else if completed {
            usage.total_tokens = usage.input_tokens + usage.output_tokens;
            yield StreamEvent::Done { usage, stop_reason };
        }
        // Closed without message_stop or error: end the stream and let the
        // consumer surface the truncation.
    }
}

struct PartialToolCall {
    id: String,
    name: String,
    arguments_json: String,
}

impl PartialToolCall {
    fn finish(self) -> ToolCall {
        let arguments = if self.arguments_json.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&self.arguments_json).unwrap_or(serde_json::Value::Null)
        };
        ToolCall::new(self.id, self.name, arguments)
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Response event types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessageStartEvent {
    message: MessageInfo,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStartEvent {
    index: u32,
    content_block: ContentBlockInfo,
}

#[derive(Debug, Deserialize)]
struct ContentBlockInfo {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    index: u32,
    delta: DeltaInfo,
}

#[derive(Debug, Deserialize)]
struct DeltaInfo {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
    partial_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStopEvent {
    index: u32,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDelta,
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    error_type: String,
    message: String,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    let mut result = vec![];

    for message in messages {
        match message {
            Message::User { content } => {
                result.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: serde_json::json!([{ "type": "text", "text": content }]),
                });
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut blocks = vec![];
                if let Some(text) = content {
                    if !text.is_empty() {
                        blocks.push(serde_json::json!({ "type": "text", "text": text }));
                    }
                }
                for call in tool_calls {
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                if !blocks.is_empty() {
                    result.push(AnthropicMessage {
                        role: "assistant".to_string(),
                        content: serde_json::Value::Array(blocks),
                    });
                }
            }
            Message::Tool {
                tool_call_id,
                content,
                error,
            } => {
                result.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: serde_json::json!([{
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": content,
                        "is_error": error.is_some(),
                    }]),
                });
            }
        }
    }

    result
}

fn convert_tools(tools: &[ToolDef]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| AnthropicTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.parameters.clone(),
        })
        .collect()
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "max_tokens" => StopReason::Length,
        "tool_use" => StopReason::ToolUse,
        _ => StopReason::Stop,
    }
}
