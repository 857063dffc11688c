//! OpenAI Chat Completions adapter
//!
//! Also serves any OpenAI-compatible server via `base_url`; the Ollama
//! adapter reuses the wire types defined here.

use crate::{
    error::{Error, Result},
    stream::{EventStream, StreamEvent},
    types::{ChatRequest, ChatResponse, Message, StopReason, ToolCall, ToolDef, Usage},
};
use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI Chat Completions client
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl super::Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = build_wire_request(request, false);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(url = %url, model = %request.model, "openai request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_str(), text));
        }

        parse_completion(response.json::<CompletionResponse>().await?)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<EventStream> {
        let body = build_wire_request(request, true);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(url = %url, model = %request.model, "openai stream request");

        let request_builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("accept", "text/event-stream")
            .json(&body);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }
}

/// Translate Chat Completions SSE chunks into canonical stream events
fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = StreamEvent> {
    stream! {
        let mut usage = Usage::default();
        let mut stop_reason = StopReason::Stop;
        // Tool call fragments accumulated by chunk index
        let mut partials: Vec<PartialToolCall> = vec![];
        let mut error_message: Option<String> = None;
        let mut completed = false;

        while let Some(event_result) = event_source.next().await {
            match event_result {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    if message.data == "[DONE]" {
                        completed = true;
                        break;
                    }
                    let chunk: StreamChunk = match serde_json::from_str(&message.data) {
                        Ok(chunk) => chunk,
                        Err(_) => continue,
                    };
                    if let Some(chunk_usage) = chunk.usage {
                        usage = chunk_usage.into();
                    }
                    let Some(choice) = chunk.choices.into_iter().next() else {
                        continue;
                    };
                    if let Some(reason) = choice.finish_reason {
                        stop_reason = map_finish_reason(&reason);
                    }
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            yield StreamEvent::Text { delta: content };
                        }
                    }
                    for delta in choice.delta.tool_calls {
                        let index = delta.index as usize;
                        while partials.len() <= index {
                            partials.push(PartialToolCall::default());
                        }
                        let partial = &mut partials[index];
                        if let Some(id) = delta.id {
                            partial.id = id;
                        }
                        if let Some(function) = delta.function {
                            if let Some(name) = function.name {
                                partial.name = name;
                            }
                            if let Some(arguments) = function.arguments {
                                partial.arguments_json.push_str(&arguments);
                            }
                        }
                        if !partial.started && !partial.id.is_empty() && !partial.name.is_empty() {
                            partial.started = true;
                            yield StreamEvent::ToolCallStart {
                                call: ToolCall::new(
                                    partial.id.clone(),
                                    partial.name.clone(),
                                    serde_json::Value::Null,
                                ),
                            };
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    completed = true;
                    break;
                }
                Err(e) => {
                    error_message = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(message) = error_message {
            yield StreamEvent::Error { message };
        } else if completed {
            // Arguments are only structurally complete once the stream ends
            for partial in partials.drain(..) {
                if !partial.id.is_empty() {
                    yield StreamEvent::ToolCallEnd { call: partial.finish() };
                }
            }
            if usage.total_tokens == 0 {
                usage.total_tokens = usage.input_tokens + usage.output_tokens;
            }
            yield StreamEvent::Done { usage, stop_reason };
        }
    }
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments_json: String,
    started: bool,
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
// Wire types (shared with the Ollama adapter)
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded arguments object
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireToolFunction,
}

#[derive(Debug, Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

pub(crate) fn build_wire_request(request: &ChatRequest, stream: bool) -> WireRequest {
    let mut messages = vec![];
    if !request.system.is_empty() {
        messages.push(WireMessage {
            role: "system".to_string(),
            content: Some(request.system.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    for message in &request.messages {
        match message {
            Message::User { content } => messages.push(WireMessage {
                role: "user".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            Message::Assistant {
                content,
                tool_calls,
            } => messages.push(WireMessage {
                role: "assistant".to_string(),
                content: content.clone(),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|call| WireToolCall {
                                id: call.id.clone(),
                                call_type: "function".to_string(),
                                function: WireFunction {
                                    name: call.name.clone(),
                                    arguments: call.arguments.to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: None,
            }),
            Message::Tool {
                tool_call_id,
                content,
                ..
            } => messages.push(WireMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
            }),
        }
    }

    WireRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        stream,
        tools: if request.tools.is_empty() {
            None
        } else {
            Some(convert_tools(&request.tools))
        },
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
    }
}

fn convert_tools(tools: &[ToolDef]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| WireTool {
            tool_type: "function".to_string(),
            function: WireToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(wire: WireUsage) -> Self {
        Usage {
            input_tokens: wire.prompt_tokens,
            output_tokens: wire.completion_tokens,
            total_tokens: wire.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

pub(crate) fn parse_completion(response: CompletionResponse) -> Result<ChatResponse> {
    let usage = response.usage.map(Usage::from).unwrap_or_default();
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnexpectedResponse("no choices in completion".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&call.function.arguments)
                    .unwrap_or(serde_json::Value::Null)
            };
            ToolCall::new(call.id, call.function.name, arguments)
        })
        .collect();

    let stop_reason = choice
        .finish_reason
        .as_deref()
        .map(map_finish_reason)
        .unwrap_or(StopReason::Stop);

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        stop_reason,
        usage,
    })
}

pub(crate) fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::Length,
        "tool_calls" => StopReason::ToolUse,
        _ => StopReason::Stop,
    }
}
