//! Rough prompt sizing for the soft `max_context_tokens` budget.
//!
//! The pipeline never trims on these numbers; they only feed
//! [`AssemblyMetadata`](crate::pipeline::AssemblyMetadata) and the
//! over-budget warning. Four bytes per token, rounded up, plus a fixed
//! charge per message for the role and framing.

use juliet_core::message::PromptMessage;

/// Tokens charged for each message's role and framing.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Approximate tokens in `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

pub fn estimate_message_tokens(message: &PromptMessage) -> usize {
    MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&message.content)
}

/// Approximate tokens of a whole assembled prompt, or of one adapter's
/// contribution.
pub fn estimate_messages_tokens(messages: &[PromptMessage]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
