//! Message, Turn and Conversation domain types.
//!
//! These are the core value objects that flow through the system:
//! user request → context pipeline → provider → turn persistence → recency cache.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PersistenceError;

/// Timestamp layout used when a message is rendered into memory text.
pub const MEMORY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d @ %H:%M";

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions and injected context
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message exchanged with the assistant.
///
/// Immutable once created; identity is its `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// Display name of the sender (user name or assistant name)
    pub speaker: String,

    /// The text content
    pub content: String,

    /// When the message was created
    pub timestamp: DateTime<Utc>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Message {
    fn build(role: Role, speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            speaker: speaker.into(),
            content: content.into(),
            timestamp: Utc::now(),
            tags: Vec::new(),
        }
    }

    /// Create a new user message.
    pub fn user(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(Role::User, speaker, content)
    }

    /// Create a new assistant message.
    pub fn assistant(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(Role::Assistant, speaker, content)
    }

    /// Override the creation timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Render as `speaker @ timestamp: content`, in local time like the
    /// prompt's timestamp block.
    pub fn to_memory_string(&self) -> String {
        format!(
            "{} @ {}: {}",
            self.speaker,
            self.timestamp.with_timezone(&Local).format(MEMORY_TIMESTAMP_FORMAT),
            self.content
        )
    }
}

/// The `{role, content}` pair handed to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One user request plus its assistant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub conversation_id: ConversationId,
    pub request: Message,
    pub response: Message,
}

impl Turn {
    /// Create a turn. The request must be a user message and the response an
    /// assistant message; [`Turn::validate`] checks this and the memory
    /// writers refuse turns that fail it.
    pub fn new(conversation_id: ConversationId, request: Message, response: Message) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            request,
            response,
        }
    }

    /// Check the request/response roles.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.request.role != Role::User || self.response.role != Role::Assistant {
            return Err(PersistenceError::InvalidInput(format!(
                "turn {} has roles {}/{}, expected user/assistant",
                self.id, self.request.role, self.response.role
            )));
        }
        Ok(())
    }
}

/// An ordered sequence of turns between a host and a guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub host: String,
    pub host_is_bot: bool,
    pub guest: String,
    pub guest_is_bot: bool,
    #[serde(default)]
    pub turns: Vec<Turn>,
}

impl Conversation {
    /// Start a new, empty conversation.
    pub fn start(
        id: ConversationId,
        host: impl Into<String>,
        host_is_bot: bool,
        guest: impl Into<String>,
        guest_is_bot: bool,
    ) -> Self {
        let host = host.into();
        let guest = guest.into();
        let now = Utc::now();
        Self {
            id,
            description: format!("{host}-{guest}"),
            created_at: now,
            last_active: now,
            host,
            host_is_bot,
            guest,
            guest_is_bot,
            turns: Vec::new(),
        }
    }

    /// Append a turn. `last_active` moves to the response timestamp.
    pub fn push(&mut self, turn: Turn) {
        self.last_active = turn.response.timestamp;
        self.turns.push(turn);
    }
}
