//! Conversation records
//!
//! A conversation is the durable transcript of one or more questions: every
//! user, assistant, and tool message in order, plus enough metadata to list
//! and resume it later.

use chrono::{DateTime, Utc};
use scout_ai::Message;
use serde::{Deserialize, Serialize};

const MAX_TITLE_CHARS: usize = 50;

/// A persisted conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Names of the resources that were searchable
    pub resources: Vec<String>,
    pub provider: String,
    pub model: String,
    pub messages: Vec<StoredMessage>,
}

/// A message plus when it happened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(flatten)]
    pub message: Message,
    pub timestamp: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        question: &str,
        provider: impl Into<String>,
        model: impl Into<String>,
        resources: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: truncate_title(question),
            created: now,
            updated: now,
            resources,
            provider: provider.into(),
            model: model.into(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(StoredMessage {
            message,
            timestamp: Utc::now(),
        });
    }

    /// Most recent assistant message with non-empty text content
    pub fn last_assistant_content(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|stored| {
            if let Message::Assistant {
                content: Some(text),
                ..
            } = &stored.message
            {
                if !text.is_empty() {
                    return Some(text.as_str());
                }
            }
            None
        })
    }

    /// The wire messages, stripped of timestamps
    pub fn wire_messages(&self) -> Vec<Message> {
        self.messages
            .iter()
            .map(|stored| stored.message.clone())
            .collect()
    }
}

/// Derive a short title from the first question
fn truncate_title(question: &str) -> String {
    if question.chars().count() > MAX_TITLE_CHARS {
        let cut: String = question.chars().take(MAX_TITLE_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        question.to_string()
    }
}
