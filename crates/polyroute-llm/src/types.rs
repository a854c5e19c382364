//! Wire types for the OpenAI chat completions format.
//!
//! Only the fields the router needs are modelled. Response fields are
//! lenient (`#[serde(default)]`) because vendors differ in what they echo
//! back; the only hard requirement is a first choice with text content.

use serde::{Deserialize, Serialize};

/// A message in a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// The role of the message author ("system", "user", "assistant").
    pub role: String,

    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a message with role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// A chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,

    /// Conversation messages. The router always sends exactly one.
    pub messages: Vec<ChatMessage>,

    /// Completion cap, for vendors that get one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Build a single-turn request.
    pub fn single(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(text)],
            max_tokens: None,
        }
    }

    /// Set the completion cap.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A chat completion response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    /// Completion id, when the vendor sends one.
    #[serde(default)]
    pub id: Option<String>,

    /// Model that produced the response.
    #[serde(default)]
    pub model: Option<String>,

    /// Completion choices.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Text of the first choice, if it is present and not blank.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// One completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    /// The assistant message.
    pub message: ResponseMessage,

    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a choice. `content` may be `null`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseMessage {
    /// Author role.
    #[serde(default)]
    pub role: Option<String>,

    /// Generated text.
    #[serde(default)]
    pub content: Option<String>,
}
