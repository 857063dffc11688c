//! The agent loop
//!
//! Drives the question-answer cycle: send the conversation to the provider,
//! execute any tool calls it makes, feed the results back, and repeat until
//! the model answers in plain text or a stopping condition fires. Stuck-loop
//! heuristics live in [`crate::state`]; this module wires them into the loop
//! and assembles a best-effort answer when the model cannot finish on its own.

use crate::{
    conversation::Conversation,
    error::{Error, Result},
    prompt::{self, ResourceInfo},
    registry::ToolRegistry,
    state::{is_empty_result, LoopConfig, LoopState},
    storage::{JsonStorage, Storage},
    tools,
};
use futures::StreamExt;
use scout_ai::{
    ChatRequest, ChatResponse, Message, ModelConfig, Provider, StreamEvent, ToolCall, Usage,
};
use scout_search::SearchEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_TOKENS: u32 = 8192;

const NO_RESPONSE: &str = "I was unable to generate a response for this query.";

const EXHAUSTED_SEARCHES: &str = "I was unable to find specific information about this topic \
in the codebase after multiple searches. The search patterns used did not return relevant \
results. Try rephrasing your question or being more specific about what you're looking for.";

const INCOMPLETE_NOTE: &str = "\n\n[Note: Response may be incomplete due to iteration limit]";

/// How many raw tool results a forced completion stitches together
const FORCED_MAX_RESULTS: usize = 3;
/// Minimum length for a tool result to be worth quoting
const FORCED_MIN_LEN: usize = 100;
/// Per-result cap when quoting raw tool output
const FORCED_SNIPPET_CHARS: usize = 500;

/// Configuration for one agent instance
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: ModelConfig,
    /// Root directory the tools operate under
    pub working_dir: PathBuf,
    /// Searchable codebases listed in the system prompt
    pub resources: Vec<ResourceInfo>,
    /// Where truncated tool outputs are stashed in full; `None` disables the
    /// side channel
    pub output_dir: Option<PathBuf>,
    pub loop_config: LoopConfig,
    pub max_tokens: u32,
}

impl AgentOptions {
    pub fn new(model: ModelConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            working_dir: working_dir.into(),
            resources: Vec::new(),
            output_dir: None,
            loop_config: LoopConfig::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// The final result of a question
#[derive(Debug, Clone)]
pub struct Answer {
    pub content: String,
    /// Every tool call the model made while answering
    pub tool_calls: Vec<ToolCall>,
    /// Token usage summed across rounds
    pub usage: Usage,
}

/// Progress events surfaced to the caller during a question
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Incremental answer text
    Text { delta: String },
    /// A tool is about to run
    ToolStart { call: ToolCall },
    /// A tool finished; `title` is its short result label
    ToolEnd {
        call: ToolCall,
        title: String,
        is_error: bool,
    },
}

type EventCallback<'a> = &'a mut (dyn FnMut(AgentEvent) + Send);

pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    storage: Arc<dyn Storage>,
    options: AgentOptions,
    conversation: Option<Conversation>,
}

impl Agent {
    /// Build an agent with explicit collaborators
    pub fn new(
        provider: Arc<dyn Provider>,
        mut registry: ToolRegistry,
        storage: Arc<dyn Storage>,
        options: AgentOptions,
    ) -> Self {
        if let Some(dir) = &options.output_dir {
            registry.set_output_dir(dir.clone());
        }
        Self {
            provider,
            registry,
            storage,
            options,
            conversation: None,
        }
    }

    /// Build an agent from options alone: provider from the model config, the
    /// default tool set, and file-backed storage.
    pub fn from_options(options: AgentOptions) -> Result<Self> {
        let provider = scout_ai::from_config(&options.model)?;
        let registry =
            tools::default_registry(&options.working_dir, Arc::new(SearchEngine::new()));
        let storage = JsonStorage::default_location("scout")
            .unwrap_or_else(|| JsonStorage::new(options.working_dir.join(".scout")));
        Ok(Self::new(provider, registry, Arc::new(storage), options))
    }

    /// The conversation accumulated so far, if any question has been asked
    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    /// Resume a previously saved conversation
    pub fn continue_conversation(&mut self, id: &str) -> Result<()> {
        let conversation = self.storage.load(id)?;
        self.registry.set_conversation_id(conversation.id.clone());
        self.conversation = Some(conversation);
        Ok(())
    }

    /// Ask a question and wait for the complete answer
    pub async fn ask(&mut self, question: &str, cancel: &CancellationToken) -> Result<Answer> {
        self.run_loop(question, None, cancel).await
    }

    /// Ask a question, receiving progress events as the answer forms
    pub async fn ask_streaming(
        &mut self,
        question: &str,
        on_event: EventCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        self.run_loop(question, Some(on_event), cancel).await
    }

    async fn run_loop(
        &mut self,
        question: &str,
        mut callback: Option<EventCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        if self.conversation.is_none() {
            let conversation = Conversation::new(
                question,
                self.provider.name(),
                &self.options.model.model,
                self.options
                    .resources
                    .iter()
                    .map(|r| r.name.clone())
                    .collect(),
            );
            self.registry.set_conversation_id(conversation.id.clone());
            self.conversation = Some(conversation);
        }
        self.push_message(Message::user(question));

        let config = self.options.loop_config.clone();
        let mut state = LoopState::new();
        let mut usage = Usage::default();
        let mut all_tool_calls: Vec<ToolCall> = Vec::new();

        for round in 0..config.max_rounds {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let request = self.build_request(state.hint_injected);
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = self.complete(&request, &mut callback) => result,
            };
            let response = match result {
                Ok(response) => response,
                // Keep the transcript up to the last appended message so the
                // conversation can be resumed after a transport failure.
                Err(error) => {
                    self.persist();
                    return Err(error);
                }
            };
            usage.add(&response.usage);

            tracing::debug!(
                round,
                tool_calls = response.tool_calls.len(),
                stop_reason = ?response.stop_reason,
                "round complete"
            );

            let content = (!response.content.is_empty()).then(|| response.content.clone());
            self.push_message(Message::assistant(content, response.tool_calls.clone()));

            if response.tool_calls.is_empty() {
                let content = if response.content.is_empty() {
                    self.last_assistant_content()
                        .unwrap_or_else(|| NO_RESPONSE.to_string())
                } else {
                    response.content
                };
                self.persist();
                return Ok(Answer {
                    content,
                    tool_calls: all_tool_calls,
                    usage,
                });
            }

            let mut had_useful = false;
            let mut had_repeat = false;
            for call in &response.tool_calls {
                if state.record_call(call) {
                    had_repeat = true;
                    tracing::debug!(tool = %call.name, "repeated tool call");
                }
                if let Some(cb) = callback.as_deref_mut() {
                    cb(AgentEvent::ToolStart { call: call.clone() });
                }

                let (message, title, is_error) = match self
                    .registry
                    .execute(&call.name, call.arguments.clone(), cancel)
                    .await
                {
                    Ok(result) => {
                        if !is_empty_result(&result.output) {
                            had_useful = true;
                        }
                        (
                            Message::tool_result(&call.id, result.output),
                            result.title,
                            false,
                        )
                    }
                    Err(error) => {
                        if cancel.is_cancelled() {
                            return Err(Error::Cancelled);
                        }
                        (
                            Message::tool_error(&call.id, error.to_string()),
                            call.name.clone(),
                            true,
                        )
                    }
                };
                self.push_message(message);

                if let Some(cb) = callback.as_deref_mut() {
                    cb(AgentEvent::ToolEnd {
                        call: call.clone(),
                        title,
                        is_error,
                    });
                }
            }
            all_tool_calls.extend(response.tool_calls);

            state.finish_round(had_useful, had_repeat, &config);
            self.persist();

            if state.should_force_completion(&config) {
                tracing::debug!(
                    consecutive_empty = state.consecutive_empty,
                    total_calls = state.total_calls,
                    "forcing completion"
                );
                let content = self.force_completion();
                self.persist();
                return Ok(Answer {
                    content,
                    tool_calls: all_tool_calls,
                    usage,
                });
            }
        }

        self.persist();
        match self.last_assistant_content() {
            Some(content) => Ok(Answer {
                content: format!("{content}{INCOMPLETE_NOTE}"),
                tool_calls: all_tool_calls,
                usage,
            }),
            None => Err(Error::MaxIterations),
        }
    }

    pub(crate) fn build_request(&self, hint: bool) -> ChatRequest {
        let mut system = prompt::system_prompt(&self.options.resources);
        if hint {
            system.push_str(prompt::stuck_loop_hint());
        }
        ChatRequest {
            model: self.options.model.model.clone(),
            system,
            messages: self
                .conversation
                .as_ref()
                .map(|c| c.wire_messages())
                .unwrap_or_default(),
            tools: self.registry.definitions(),
            max_tokens: self.options.max_tokens,
        }
    }

    /// One provider round trip, streaming when the caller wants events and
    /// the provider can deliver them incrementally.
    async fn complete(
        &self,
        request: &ChatRequest,
        callback: &mut Option<EventCallback<'_>>,
    ) -> Result<ChatResponse> {
        if callback.is_none() || !self.provider.supports_streaming() {
            return Ok(self.provider.chat(request).await?);
        }

        let mut stream = self.provider.stream(request).await?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut terminal = None;

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Text { delta } => {
                    if let Some(cb) = callback.as_deref_mut() {
                        cb(AgentEvent::Text {
                            delta: delta.clone(),
                        });
                    }
                    content.push_str(&delta);
                }
                StreamEvent::ToolCallStart { .. } => {}
                StreamEvent::ToolCallEnd { call } => tool_calls.push(call),
                StreamEvent::Done { usage, stop_reason } => {
                    terminal = Some((usage, stop_reason));
                }
                StreamEvent::Error { message } => {
                    return Err(scout_ai::Error::api("stream_error", message).into());
                }
            }
        }

        let (usage, stop_reason) = terminal.ok_or_else(|| {
            scout_ai::Error::IncompleteStream("stream closed without a completion event".into())
        })?;
        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
        })
    }

    /// Assemble the best answer available when the loop gives up on the
    /// model: its own last words if it said anything, raw search results if
    /// it found anything, an apology otherwise.
    fn force_completion(&self) -> String {
        if let Some(content) = self.last_assistant_content() {
            return content;
        }

        let conversation = match &self.conversation {
            Some(conversation) => conversation,
            None => return EXHAUSTED_SEARCHES.to_string(),
        };
        let snippets: Vec<String> = conversation
            .messages
            .iter()
            .filter_map(|stored| match &stored.message {
                Message::Tool {
                    content,
                    error: None,
                    ..
                } if content.len() > FORCED_MIN_LEN && !is_empty_result(content) => {
                    Some(snippet(content))
                }
                _ => None,
            })
            .take(FORCED_MAX_RESULTS)
            .collect();

        if snippets.is_empty() {
            EXHAUSTED_SEARCHES.to_string()
        } else {
            format!(
                "Based on the search results, here is what I found:\n\n{}\n\n\
                 [Note: The model was unable to complete the response. Above are the raw search results.]",
                snippets.join("\n\n")
            )
        }
    }

    fn last_assistant_content(&self) -> Option<String> {
        self.conversation
            .as_ref()
            .and_then(|c| c.last_assistant_content())
            .map(str::to_string)
    }

    fn push_message(&mut self, message: Message) {
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.push(message);
        }
    }

    /// Save the conversation; persistence failures are logged, never fatal.
    fn persist(&mut self) {
        if let Some(conversation) = self.conversation.as_mut() {
            if let Err(error) = self.storage.save(conversation) {
                tracing::warn!(%error, "failed to save conversation");
            }
        }
    }
}

fn snippet(text: &str) -> String {
    let mut out: String = text.chars().take(FORCED_SNIPPET_CHARS).collect();
    if text.chars().count() > FORCED_SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}
