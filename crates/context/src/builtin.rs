//! Built-in adapters with no retrieval: timestamp, user request and the
//! forced assistant prefix.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use juliet_core::error::RetrievalError;
use juliet_core::message::PromptMessage;

use crate::adapter::ContextAdapter;

/// Human-readable clock format, e.g. `Thursday, December 18, 2025 at 02:30 PM`.
pub const TIMESTAMP_FORMAT: &str = "%A, %B %d, %Y at %I:%M %p";

/// Emits the current local date and time.
pub struct TimestampAdapter {
    clock: fn() -> DateTime<Local>,
}

impl TimestampAdapter {
    pub fn new() -> Self {
        Self { clock: Local::now }
    }

    /// Use a fixed clock (tests, replay).
    pub fn with_clock(clock: fn() -> DateTime<Local>) -> Self {
        Self { clock }
    }
}

impl Default for TimestampAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextAdapter for TimestampAdapter {
    async fn build_messages(&self, _user_request: Option<&str>) -> Result<Vec<PromptMessage>, RetrievalError> {
        let now = (self.clock)().format(TIMESTAMP_FORMAT);
        Ok(vec![PromptMessage::system(format!(
            "<timestamp>The current date and time is:\n{now}</timestamp>"
        ))])
    }
}

/// Wraps the live request as `<{tag}>{request}</{tag}>` in a user message.
pub struct UserRequestAdapter {
    tag: String,
}

impl UserRequestAdapter {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Default for UserRequestAdapter {
    fn default() -> Self {
        Self::new("user")
    }
}

#[async_trait]
impl ContextAdapter for UserRequestAdapter {
    fn requires_user_request(&self) -> bool {
        true
    }

    async fn build_messages(&self, user_request: Option<&str>) -> Result<Vec<PromptMessage>, RetrievalError> {
        let Some(request) = user_request else {
            return Ok(Vec::new());
        };
        let tag = &self.tag;
        Ok(vec![PromptMessage::user(format!("<{tag}>{request}</{tag}>"))])
    }
}

/// Opens the assistant's turn so the model continues from it.
pub struct AssistantPrefixAdapter {
    prefix: String,
}

impl AssistantPrefixAdapter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for AssistantPrefixAdapter {
    fn default() -> Self {
        Self::new("<assistant>")
    }
}

#[async_trait]
impl ContextAdapter for AssistantPrefixAdapter {
    async fn build_messages(&self, _user_request: Option<&str>) -> Result<Vec<PromptMessage>, RetrievalError> {
        Ok(vec![PromptMessage::assistant(self.prefix.clone())])
    }
}
